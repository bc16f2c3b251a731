//! Tracing output of the guest `log` host function.

mod common;

use std::sync::{Arc, Mutex};

use tracing::{Event, Subscriber};
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};

use guestfetch_hostapi::CaptureSink;

use common::*;

/// Records the field names of every event under the `guest` target.
#[derive(Clone, Default)]
struct GuestFields(Arc<Mutex<Vec<Vec<String>>>>);

impl<S: Subscriber> Layer<S> for GuestFields {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        if event.metadata().target() != "guest" {
            return;
        }
        let names = event
            .metadata()
            .fields()
            .iter()
            .map(|f| f.name().to_string())
            .collect();
        self.0.lock().unwrap().push(names);
    }
}

// ── Test: each guest log line is one event with a single message ──

#[test]
fn test_guest_log_event_fields() {
    let fields = GuestFields::default();
    let subscriber = tracing_subscriber::registry().with(fields.clone());

    tracing::subscriber::with_default(subscriber, || {
        let bridge = load_bridge();
        bridge
            .transform_with_sink("example.com", Box::new(CaptureSink::new()))
            .unwrap();
    });

    let events = fields.0.lock().unwrap().clone();
    assert_eq!(events.len(), 1);
    let mut names = events[0].clone();
    names.sort();
    assert_eq!(names, vec!["line", "message"]);
}
