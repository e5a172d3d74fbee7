//! Objects that announce changes before they happen.

use tidings_core::ObservableObjectPublisher;

use crate::published::Published;

/// An object with a single "about to change" signal.
///
/// Implementors usually own one [`ObservableObjectPublisher`] and attach
/// each of their [`Published`] properties to it with
/// [`ObservableObject::publish`], so that a change to any property fires
/// the object's signal first.
///
/// ```
/// use std::sync::{Arc, Mutex};
/// use tidings_core::prelude::*;
/// use tidings_model::{ObservableObject, Published, StateTracking};
///
/// struct Counter {
///     will_change: ObservableObjectPublisher,
///     value: Published<i32>,
/// }
///
/// impl ObservableObject for Counter {
///     fn object_will_change(&self) -> &ObservableObjectPublisher {
///         &self.will_change
///     }
/// }
///
/// let tracking = StateTracking::new();
/// let will_change = ObservableObjectPublisher::new();
/// let counter = Arc::new(Counter {
///     value: Published::new_in(0, &tracking),
///     will_change,
/// });
/// counter.publish(&counter.value);
///
/// let seen = Arc::new(Mutex::new(Vec::new()));
/// let (reader, out) = (Arc::clone(&counter), Arc::clone(&seen));
/// let _token = counter
///     .object_will_change()
///     .sink(move |()| out.lock().unwrap().push(reader.value.get()));
///
/// counter.value.set(5);
/// counter.value.set(100);
/// assert_eq!(*seen.lock().unwrap(), vec![0, 5]);
/// ```
pub trait ObservableObject: Send + Sync {
    /// Fires before any observable property of this object changes.
    fn object_will_change(&self) -> &ObservableObjectPublisher;

    /// Route `property`'s changes through this object's signal.
    fn publish<T>(&self, property: &Published<T>)
    where
        T: Clone + Send + Sync + 'static,
        Self: Sized,
    {
        property.attach(self.object_will_change());
    }
}
