#![forbid(unsafe_code)]

//! Log output of the history runtime.
//!
//! Verifies the level and fields of the events emitted on the failure and
//! misuse paths: rejected writes, foreign state, suppressed pops and
//! panicking listeners.
//!
//! Run:
//!   cargo test -p fhist-runtime --test log_events

use std::collections::HashMap;
use std::rc::Rc;
use std::sync::{Arc, Mutex};

use fhist_backend::Host;
use fhist_core::event::NavigationEvent;
use fhist_runtime::{HistoryConfig, HistoryMode, RouterHistory, WebHistory};
use fhist_web::DeterministicHost;
use serde_json::json;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;

// ============================================================================
// Capture layer
// ============================================================================

#[derive(Debug, Clone)]
struct CapturedEvent {
    level: tracing::Level,
    fields: HashMap<String, String>,
    span: Option<String>,
}

impl CapturedEvent {
    fn message(&self) -> &str {
        self.fields.get("message").map_or("", String::as_str)
    }
}

struct FieldVisitor(Vec<(String, String)>);

impl tracing::field::Visit for FieldVisitor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        self.0.push((field.name().to_string(), format!("{value:?}")));
    }

    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        self.0.push((field.name().to_string(), value.to_string()));
    }

    fn record_bool(&mut self, field: &tracing::field::Field, value: bool) {
        self.0.push((field.name().to_string(), value.to_string()));
    }
}

struct EventCapture {
    events: Arc<Mutex<Vec<CapturedEvent>>>,
}

impl<S> tracing_subscriber::Layer<S> for EventCapture
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_event(&self, event: &tracing::Event<'_>, ctx: tracing_subscriber::layer::Context<'_, S>) {
        let mut visitor = FieldVisitor(Vec::new());
        event.record(&mut visitor);
        let span = ctx
            .event_span(event)
            .map(|span_ref| span_ref.name().to_string());
        self.events.lock().unwrap().push(CapturedEvent {
            level: *event.metadata().level(),
            fields: visitor.0.into_iter().collect(),
            span,
        });
    }
}

fn with_captured_events<F>(f: F) -> Vec<CapturedEvent>
where
    F: FnOnce(),
{
    let events = Arc::new(Mutex::new(Vec::new()));
    let subscriber = tracing_subscriber::registry()
        .with(tracing_subscriber::filter::LevelFilter::TRACE)
        .with(EventCapture {
            events: Arc::clone(&events),
        });
    tracing::subscriber::with_default(subscriber, f);
    let captured = events.lock().unwrap().clone();
    captured
}

fn at_level(events: &[CapturedEvent], level: tracing::Level) -> Vec<&CapturedEvent> {
    events.iter().filter(|e| e.level == level).collect()
}

fn host(url: &str) -> Rc<DeterministicHost> {
    Rc::new(DeterministicHost::new(url).expect("valid url"))
}

fn history(host: &Rc<DeterministicHost>, warn_on_foreign_state: bool) -> WebHistory<DeterministicHost> {
    let config = HistoryConfig {
        warn_on_foreign_state,
        ..HistoryConfig::new(HistoryMode::Web, None)
    };
    WebHistory::from_config(Rc::clone(host), &config).expect("web mode")
}

// ============================================================================
// Tests
// ============================================================================

#[test]
fn rejected_write_warns_with_url() {
    let h = host("https://example.com/");
    let history = history(&h, false);
    h.session().fail_writes_after(1, 1);

    let events = with_captured_events(|| history.push("/x", None));

    let warnings = at_level(&events, tracing::Level::WARN);
    assert_eq!(warnings.len(), 1);
    let warning = warnings[0];
    assert_eq!(
        warning.fields.get("url").map(String::as_str),
        Some("https://example.com/x")
    );
    assert!(warning.fields.get("error").is_some_and(|e| e.contains("rejected")));
    assert_eq!(warning.span.as_deref(), Some("fhist.push"));
}

#[test]
fn foreign_state_warns_when_enabled() {
    let h = host("https://example.com/");
    let history = history(&h, true);
    h.session().overwrite_state(None);

    let events = with_captured_events(|| history.push("/x", None));

    let warnings = at_level(&events, tracing::Level::WARN);
    assert_eq!(warnings.len(), 1);
    assert!(warnings[0].message().contains("replace_state"));
    // The push still completes from the cached entry.
    assert_eq!(history.location(), "/x");
    assert_eq!(history.entry().back.as_deref(), Some("/"));
}

#[test]
fn foreign_state_is_silent_when_disabled() {
    let h = host("https://example.com/");
    let history = history(&h, false);
    h.session().overwrite_state(Some(json!("not an object")));

    let events = with_captured_events(|| history.push("/x", None));
    assert!(at_level(&events, tracing::Level::WARN).is_empty());
}

#[test]
fn suppressed_pop_is_logged_at_debug() {
    let h = host("https://example.com/");
    let history = history(&h, false);
    history.push("/a", None);
    history.go(-1, false);

    let events = with_captured_events(|| {
        h.settle();
    });

    let debug = at_level(&events, tracing::Level::DEBUG);
    assert!(
        debug
            .iter()
            .any(|e| e.message().contains("pause marker") && e.span.as_deref() == Some("fhist.pop"))
    );
}

#[test]
fn panicking_listener_is_logged_at_error() {
    let h = host("https://example.com/");
    let history = history(&h, false);
    history.listen(Rc::new(|_: &NavigationEvent| panic!("boom")));
    history.push("/a", None);

    let events = with_captured_events(|| {
        h.traverse(-1);
    });

    let errors = at_level(&events, tracing::Level::ERROR);
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].fields.get("reason").map(String::as_str), Some("boom"));
    assert_eq!(errors[0].fields.get("to").map(String::as_str), Some("/"));
}

#[test]
fn happy_path_emits_no_warnings() {
    let h = host("https://example.com/");
    let events = with_captured_events(|| {
        let history = history(&h, true);
        history.push("/a", None);
        history.replace("/b", None);
        h.traverse(-1);
        h.unload();
        history.destroy();
    });
    assert!(at_level(&events, tracing::Level::WARN).is_empty());
    assert!(at_level(&events, tracing::Level::ERROR).is_empty());
}
