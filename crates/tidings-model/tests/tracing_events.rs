//! Structured log events emitted by state tracking.

use std::sync::{Arc, Mutex};

use tidings_model::{Observed, StateTracking};
use tracing::Subscriber;
use tracing_subscriber::Layer;
use tracing_subscriber::layer::{Context, SubscriberExt};

struct Capture {
    messages: Arc<Mutex<Vec<(tracing::Level, String)>>>,
}

impl<S: Subscriber> Layer<S> for Capture {
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        struct Msg(Option<String>);
        impl tracing::field::Visit for Msg {
            fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
                if field.name() == "message" {
                    self.0 = Some(value.to_string());
                }
            }

            fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
                if field.name() == "message" {
                    self.0 = Some(format!("{value:?}").trim_matches('"').to_string());
                }
            }
        }
        let mut msg = Msg(None);
        event.record(&mut msg);
        if let Some(message) = msg.0 {
            self.messages
                .lock()
                .expect("capture lock")
                .push((*event.metadata().level(), message));
        }
    }
}

fn capture(f: impl FnOnce()) -> Vec<(tracing::Level, String)> {
    let messages = Arc::new(Mutex::new(Vec::new()));
    let subscriber = tracing_subscriber::registry().with(Capture {
        messages: Arc::clone(&messages),
    });
    tracing::subscriber::with_default(subscriber, f);
    std::mem::take(&mut *messages.lock().expect("capture lock"))
}

#[test]
fn deferral_and_flush_are_logged() {
    let messages = capture(|| {
        let tracking = StateTracking::new();
        let scope = tracking.enter_body();
        let value = Observed::new_in(1, &tracking);
        drop(scope);
        assert!(value.is_tracking());
    });
    assert!(messages.contains(&(tracing::Level::DEBUG, "tracking.defer".to_string())));
    assert!(messages.contains(&(tracing::Level::DEBUG, "tracking.flush".to_string())));
}

#[test]
fn unbalanced_pop_warns() {
    let messages = capture(|| StateTracking::new().pop_body());
    assert_eq!(
        messages,
        vec![(tracing::Level::WARN, "tracking.pop_without_push".to_string())]
    );
}

#[test]
fn immediate_activation_is_not_deferred() {
    let messages = capture(|| {
        let tracking = StateTracking::new();
        let _value = Observed::new_in("x", &tracking);
    });
    assert!(!messages.iter().any(|(_, m)| m == "tracking.defer"));
}
