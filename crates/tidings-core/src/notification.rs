#![forbid(unsafe_code)]

//! In-process notification bus and its publisher adapter.
//!
//! [`NotificationCenter`] is a plain observer registry: observers register
//! for a [`NotificationName`], optionally narrowed to one sender
//! ([`ObjectId`]), and [`post`](NotificationCenter::post) calls every match
//! in registration order.
//!
//! [`NotificationCenter::publisher`] adapts one registration into a
//! [`Publisher`]. The registration stays in place while the publisher or
//! any live subscription token from it exists, and is removed once all of
//! them are gone.

use std::borrow::Cow;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, OnceLock};

use ahash::AHashMap;

use crate::cancellable::AnyCancellable;
use crate::fanout::Fanout;
use crate::publisher::{Never, Publisher, Receiver};
use crate::sync::lock;

/// Name a notification is posted and observed under.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NotificationName(Cow<'static, str>);

impl NotificationName {
    /// A name backed by a static string.
    #[must_use]
    pub const fn from_static(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }

    /// The name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&'static str> for NotificationName {
    fn from(name: &'static str) -> Self {
        Self::from_static(name)
    }
}

impl From<String> for NotificationName {
    fn from(name: String) -> Self {
        Self(Cow::Owned(name))
    }
}

impl fmt::Display for NotificationName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identity of a notification sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectId(u64);

impl ObjectId {
    /// A fresh identity, distinct from every other one in the process.
    #[must_use]
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw numeric value.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

/// A posted notification.
#[derive(Debug, Clone)]
pub struct Notification {
    /// What happened.
    pub name: NotificationName,
    /// Who posted it, if anyone in particular.
    pub object: Option<ObjectId>,
    /// Free-form payload.
    pub user_info: AHashMap<String, String>,
}

impl Notification {
    /// A notification with no sender and no payload.
    #[must_use]
    pub fn new(name: impl Into<NotificationName>) -> Self {
        Self {
            name: name.into(),
            object: None,
            user_info: AHashMap::new(),
        }
    }

    /// Attribute the notification to `object`.
    #[must_use]
    pub fn with_object(mut self, object: ObjectId) -> Self {
        self.object = Some(object);
        self
    }

    /// Add one payload entry.
    #[must_use]
    pub fn with_user_info(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.user_info.insert(key.into(), value.into());
        self
    }
}

/// Handle returned by [`NotificationCenter::add_observer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

type ObserverFn = Arc<dyn Fn(&Notification) + Send + Sync>;

struct Observer {
    id: ObserverId,
    name: NotificationName,
    object: Option<ObjectId>,
    callback: ObserverFn,
}

impl Observer {
    fn matches(&self, notification: &Notification) -> bool {
        self.name == notification.name
            && (self.object.is_none() || self.object == notification.object)
    }
}

struct CenterInner {
    observers: Mutex<Vec<Observer>>,
    next_id: AtomicU64,
}

/// Observer registry keyed by notification name.
///
/// Cloning creates another handle to the same registry.
#[derive(Clone)]
pub struct NotificationCenter {
    inner: Arc<CenterInner>,
}

impl Default for NotificationCenter {
    fn default() -> Self {
        Self {
            inner: Arc::new(CenterInner {
                observers: Mutex::new(Vec::new()),
                next_id: AtomicU64::new(1),
            }),
        }
    }
}

impl NotificationCenter {
    /// A private registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide registry.
    #[must_use]
    pub fn shared() -> &'static NotificationCenter {
        static SHARED: OnceLock<NotificationCenter> = OnceLock::new();
        SHARED.get_or_init(NotificationCenter::new)
    }

    /// Call `callback` for every notification named `name`, restricted to
    /// those posted by `object` when one is given.
    pub fn add_observer(
        &self,
        name: impl Into<NotificationName>,
        object: Option<ObjectId>,
        callback: impl Fn(&Notification) + Send + Sync + 'static,
    ) -> ObserverId {
        let id = ObserverId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        let name = name.into();
        tracing::debug!(message = "notification.observe", observer = id.0, name = %name);
        lock(&self.inner.observers).push(Observer {
            id,
            name,
            object,
            callback: Arc::new(callback),
        });
        id
    }

    /// Remove a registration. Returns `false` if it was already gone.
    pub fn remove_observer(&self, id: ObserverId) -> bool {
        let mut observers = lock(&self.inner.observers);
        let before = observers.len();
        observers.retain(|o| o.id != id);
        let removed = observers.len() != before;
        drop(observers);
        if removed {
            tracing::debug!(message = "notification.unobserve", observer = id.0);
        }
        removed
    }

    /// Deliver `notification` to every matching observer.
    ///
    /// Observers are called outside the registry lock, so they may add,
    /// remove or post freely.
    pub fn post(&self, notification: Notification) {
        let matching: Vec<ObserverFn> = lock(&self.inner.observers)
            .iter()
            .filter(|o| o.matches(&notification))
            .map(|o| Arc::clone(&o.callback))
            .collect();
        tracing::trace!(
            message = "notification.post",
            name = %notification.name,
            observers = matching.len()
        );
        for callback in matching {
            callback(&notification);
        }
    }

    /// Number of registered observers.
    #[must_use]
    pub fn observer_count(&self) -> usize {
        lock(&self.inner.observers).len()
    }

    /// Adapt notifications named `name` (from `object`, if given) into a
    /// publisher.
    #[must_use]
    pub fn publisher(
        &self,
        name: impl Into<NotificationName>,
        object: Option<ObjectId>,
    ) -> NotificationPublisher {
        let fanout = Fanout::new();
        let forward = fanout.clone();
        let observer = self.add_observer(name, object, move |n: &Notification| {
            forward.send(n.clone());
        });
        NotificationPublisher {
            inner: Arc::new(Registration {
                center: self.clone(),
                observer,
                fanout,
            }),
        }
    }
}

impl fmt::Debug for NotificationCenter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotificationCenter")
            .field("observers", &self.observer_count())
            .finish()
    }
}

struct Registration {
    center: NotificationCenter,
    observer: ObserverId,
    fanout: Fanout<Notification>,
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.center.remove_observer(self.observer);
    }
}

/// Publisher of notifications returned by [`NotificationCenter::publisher`].
#[derive(Clone)]
pub struct NotificationPublisher {
    inner: Arc<Registration>,
}

impl fmt::Debug for NotificationPublisher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotificationPublisher")
            .field("observer", &self.inner.observer)
            .field("fanout", &self.inner.fanout)
            .finish()
    }
}

impl Publisher for NotificationPublisher {
    type Output = Notification;
    type Failure = Never;

    fn subscribe(&self, receive: Receiver<Notification>) -> AnyCancellable {
        let subscription = self.inner.fanout.subscribe(receive);
        // Keeps the registration alive for as long as this token is live.
        let registration = Arc::clone(&self.inner);
        AnyCancellable::from_fn(move || {
            subscription.cancel();
            drop(registration);
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prelude::*;
    use std::sync::atomic::AtomicUsize;

    const PING: NotificationName = NotificationName::from_static("ping");

    #[test]
    fn publisher_counts_posts_until_cancelled() {
        let center = NotificationCenter::new();
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        let token = center
            .publisher(PING, None)
            .sink(move |_| {
                c.fetch_add(1, Ordering::SeqCst);
            });

        center.post(Notification::new(PING));
        center.post(Notification::new(PING));
        token.cancel();
        center.post(Notification::new(PING));

        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn registration_lives_until_publisher_and_tokens_are_gone() {
        let center = NotificationCenter::new();
        let publisher = center.publisher("evt", None);
        let token = publisher.sink(|_| {});
        assert_eq!(center.observer_count(), 1);

        drop(publisher);
        assert_eq!(center.observer_count(), 1);

        token.cancel();
        assert_eq!(center.observer_count(), 0);
    }

    #[test]
    fn dropped_token_releases_registration() {
        let center = NotificationCenter::new();
        {
            let _token = center.publisher("evt", None).sink(|_| {});
            assert_eq!(center.observer_count(), 1);
        }
        assert_eq!(center.observer_count(), 0);
    }

    #[test]
    fn object_filter_narrows_delivery() {
        let center = NotificationCenter::new();
        let sender = ObjectId::next();
        let other = ObjectId::next();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let out = Arc::clone(&seen);
        let _token = center
            .publisher(PING, Some(sender))
            .sink(move |n: Notification| out.lock().unwrap().push(n.object));

        center.post(Notification::new(PING).with_object(other));
        center.post(Notification::new(PING).with_object(sender));
        center.post(Notification::new(PING));
        center.post(Notification::new("pong").with_object(sender));

        assert_eq!(*seen.lock().unwrap(), vec![Some(sender)]);
    }

    #[test]
    fn user_info_travels_with_notification() {
        let center = NotificationCenter::new();
        let seen = Arc::new(Mutex::new(None));
        let out = Arc::clone(&seen);
        center.add_observer("login", None, move |n| {
            *out.lock().unwrap() = n.user_info.get("user").cloned();
        });
        center.post(Notification::new("login").with_user_info("user", "ada"));
        assert_eq!(seen.lock().unwrap().as_deref(), Some("ada"));
    }

    #[test]
    fn observer_may_remove_itself_while_posting() {
        let center = NotificationCenter::new();
        let slot: Arc<Mutex<Option<ObserverId>>> = Arc::new(Mutex::new(None));
        let hits = Arc::new(AtomicUsize::new(0));
        let (c, s, h) = (center.clone(), Arc::clone(&slot), Arc::clone(&hits));
        let id = center.add_observer(PING, None, move |_| {
            h.fetch_add(1, Ordering::SeqCst);
            if let Some(id) = *s.lock().unwrap() {
                c.remove_observer(id);
            }
        });
        *slot.lock().unwrap() = Some(id);

        center.post(Notification::new(PING));
        center.post(Notification::new(PING));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert!(!center.remove_observer(id));
    }

    #[test]
    fn shared_center_is_a_singleton() {
        let a = NotificationCenter::shared();
        let b = NotificationCenter::shared();
        assert!(Arc::ptr_eq(&a.inner, &b.inner));
        assert_eq!(PING.to_string(), "ping");
        assert_eq!(NotificationName::from(String::from("x")).as_str(), "x");
    }
}
