#![forbid(unsafe_code)]

//! End-to-end scenarios through the public facade.
//!
//! Each test wires subjects, operators, schedulers and models together the
//! way an application would, and checks what a subscriber observes.

use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread;

use tidings::prelude::*;
use tidings::{LabScheduler, Notification, NotificationCenter, RunLoop, RunLoopConfig, Timer};
use tidings::prelude::model::observe_reads;
use web_time::Duration;

fn recorder<T: Send + 'static>() -> (Arc<Mutex<Vec<T>>>, impl Fn(T) + Send + Sync + 'static) {
    let log = Arc::new(Mutex::new(Vec::new()));
    let out = Arc::clone(&log);
    (log, move |v| out.lock().unwrap().push(v))
}

// ── Subjects and tokens ─────────────────────────────────────────────────

#[test]
fn passthrough_delivers_only_while_subscribed() {
    let subject = PassthroughSubject::<i32>::new();
    subject.send(1);
    subject.send(2);
    subject.send(3);

    let (seen, push) = recorder();
    let token = subject.sink(push);
    subject.send(4);
    token.cancel();
    subject.send(5);

    assert_eq!(*seen.lock().unwrap(), vec![4]);
}

#[test]
fn token_set_keeps_subscriptions_alive_until_dropped() {
    let subject = PassthroughSubject::<&'static str>::new();
    let (seen, push) = recorder();
    let mut bag = CancellableSet::default();
    subject.sink(push).store(&mut bag);

    subject.send("kept");
    drop(bag);
    subject.send("lost");

    assert_eq!(*seen.lock().unwrap(), vec!["kept"]);
    assert_eq!(subject.subscriber_count(), 0);
}

#[test]
fn notification_publisher_counts_posts() {
    let center = NotificationCenter::new();
    let hits = Arc::new(Mutex::new(0));
    let h = Arc::clone(&hits);
    let token = center
        .publisher("did.refresh", None)
        .sink(move |_: Notification| *h.lock().unwrap() += 1);

    center.post(Notification::new("did.refresh"));
    center.post(Notification::new("did.other"));
    center.post(Notification::new("did.refresh"));
    assert_eq!(*hits.lock().unwrap(), 2);

    token.cancel();
    center.post(Notification::new("did.refresh"));
    assert_eq!(*hits.lock().unwrap(), 2);
    assert_eq!(center.observer_count(), 0);
}

// ── Operators ───────────────────────────────────────────────────────────

#[test]
fn search_box_pipeline() {
    let lab = LabScheduler::new();
    let query = PassthroughSubject::<String>::new();
    let (seen, push) = recorder();
    let _token = query
        .clone()
        .map(|q| q.trim().to_lowercase())
        .filter(|q| !q.is_empty())
        .debounce(Duration::from_millis(300), lab.clone())
        .sink(push);

    for partial in ["r", "ru", "rus", "rust "] {
        query.send(partial.to_string());
        lab.advance(Duration::from_millis(100));
    }
    query.send("   ".to_string());
    lab.advance(Duration::from_millis(400));
    query.send("Tokio".to_string());
    lab.advance(Duration::from_millis(400));

    assert_eq!(*seen.lock().unwrap(), vec!["rust".to_string(), "tokio".to_string()]);
}

#[test]
fn combine_latest_waits_for_both_sides() {
    let width = PassthroughSubject::<u32>::new();
    let height = PassthroughSubject::<u32>::new();
    let (seen, push) = recorder();
    let _token = width
        .clone()
        .combine_latest(height.clone())
        .map(|(w, h)| w * h)
        .sink(push);

    width.send(2);
    width.send(3);
    height.send(10);
    height.send(20);
    width.send(4);

    assert_eq!(*seen.lock().unwrap(), vec![30, 60, 80]);
}

#[test]
fn erased_publishers_compose() {
    let subject = PassthroughSubject::<i32>::new();
    let evens: AnyPublisher<i32> = subject.clone().filter(|v| v % 2 == 0).erase();
    let (seen, push) = recorder();
    let _token = evens.clone().drop_first(1).sink(push);

    for v in 0..7 {
        subject.send(v);
    }
    assert_eq!(*seen.lock().unwrap(), vec![2, 4, 6]);
}

#[test]
fn timer_autoconnect_ticks_while_observed() {
    let lab = LabScheduler::new();
    let ticks = Timer::publish(Duration::from_secs(1), lab.clone()).autoconnect();
    let (seen, push) = recorder();

    lab.advance(Duration::from_secs(2));
    let token = ticks.sink(push);
    lab.advance(Duration::from_secs(3));
    token.cancel();
    lab.advance(Duration::from_secs(3));

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 3);
    assert!(seen.windows(2).all(|w| w[1].duration_since(w[0]) == Duration::from_secs(1)));
    assert_eq!(lab.pending_count(), 0);
}

#[test]
fn receive_on_run_loop_hops_threads() {
    let run_loop = RunLoop::start(RunLoopConfig::default().with_thread_name("e2e-ui")).unwrap();
    let loop_thread = run_loop.thread_id();
    let subject = PassthroughSubject::<u8>::new();
    let (tx, rx) = mpsc::channel();
    let tx = Mutex::new(tx);
    let _token = subject
        .clone()
        .receive_on(run_loop.clone())
        .sink(move |v| {
            let _ = tx.lock().unwrap().send((v, thread::current().id()));
        });

    let sender = thread::spawn(move || {
        for v in 1..=3 {
            subject.send(v);
        }
    });
    sender.join().unwrap();

    let got: Vec<_> = (0..3)
        .map(|_| rx.recv_timeout(std::time::Duration::from_secs(5)).unwrap())
        .collect();
    assert_eq!(got.iter().map(|(v, _)| *v).collect::<Vec<_>>(), vec![1, 2, 3]);
    assert!(got.iter().all(|(_, id)| *id == loop_thread));
    run_loop.shutdown();
}

// ── Models ──────────────────────────────────────────────────────────────

struct Settings {
    will_change: ObservableObjectPublisher,
    volume: Published<u8>,
    muted: Published<bool>,
}

impl Settings {
    fn new(tracking: &StateTracking) -> Arc<Self> {
        let settings = Arc::new(Self {
            will_change: ObservableObjectPublisher::new(),
            volume: Published::new_in(0, tracking),
            muted: Published::new_in(false, tracking),
        });
        settings.publish(&settings.volume);
        settings.publish(&settings.muted);
        settings
    }
}

impl ObservableObject for Settings {
    fn object_will_change(&self) -> &ObservableObjectPublisher {
        &self.will_change
    }
}

#[test]
fn published_property_replays_then_streams() {
    let tracking = StateTracking::new();
    let settings = Settings::new(&tracking);
    let (seen, push) = recorder();
    let _token = settings.volume.publisher().sink(push);
    settings.volume.set(5);
    assert_eq!(*seen.lock().unwrap(), vec![0, 5]);
}

#[test]
fn object_will_change_sees_old_values() {
    let tracking = StateTracking::new();
    let settings = Settings::new(&tracking);
    let (seen, push) = recorder();
    let reader = Arc::clone(&settings);
    let _token = settings
        .object_will_change()
        .sink(move |()| push(reader.volume.get()));

    settings.volume.set(5);
    settings.volume.set(100);
    settings.muted.set(true);

    assert_eq!(*seen.lock().unwrap(), vec![0, 5, 100]);
    assert!(settings.muted.get());
}

#[test]
fn child_built_inside_body_does_not_leak_reads() {
    let tracking = StateTracking::new();
    let (child, reads) = {
        let _body = tracking.enter_body();
        observe_reads(|| {
            let count = Observed::new_in(0u32, &tracking);
            count.update(|c| c + 1);
            let _ = count.get();
            count
        })
    };

    assert!(reads.is_empty());
    assert!(child.is_tracking());
    assert_eq!(child.get(), 1);

    let (_, later) = observe_reads(|| child.get());
    assert_eq!(later.len(), 1);
}

#[test]
fn background_thread_tracks_immediately() {
    let tracking = Arc::new(StateTracking::new());
    let _body = tracking.enter_body();
    let worker = Arc::clone(&tracking);
    let tracked = thread::spawn(move || Observed::new_in(7, &worker).is_tracking())
        .join()
        .unwrap();
    assert!(tracked);
    assert_eq!(tracking.pending_count(), 0);
}
