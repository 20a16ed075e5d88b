//! Snapshot-to-delta reconciliation for streamed agent output.
//!
//! Upstream model streams sometimes resend the whole text produced so far
//! instead of the new fragment. A [`DeltaReconciler`] remembers the last full
//! snapshot of one stream and turns each incoming snapshot into the text
//! that is actually new. Non-text events pass straight through.

use futures::{Stream, StreamExt};
use serde_json::{Map, Value};

/// One event from an agent invocation stream.
#[derive(Clone, Debug, PartialEq)]
pub enum StreamEvent {
    /// Text snapshot or delta.
    Text(String),
    /// Error or metadata event forwarded untouched.
    Passthrough(Value),
}

impl StreamEvent {
    /// Classifies a decoded JSON event.
    ///
    /// `{"data": "<text>"}` is text unless the object also carries a truthy
    /// `error` key. Everything else is passed through.
    #[must_use]
    pub fn from_json(value: Value) -> Self {
        let text = match &value {
            Value::Object(object) if !is_error(object) => object
                .get("data")
                .and_then(Value::as_str)
                .map(str::to_owned),
            _ => None,
        };
        text.map_or(Self::Passthrough(value), Self::Text)
    }

    /// Re-encodes the event in its wire shape.
    #[must_use]
    pub fn into_json(self) -> Value {
        match self {
            Self::Text(text) => {
                let mut object = Map::new();
                object.insert(String::from("data"), Value::String(text));
                Value::Object(object)
            }
            Self::Passthrough(value) => value,
        }
    }
}

fn is_error(object: &Map<String, Value>) -> bool {
    match object.get("error") {
        None | Some(Value::Null) => false,
        Some(Value::Bool(flag)) => *flag,
        Some(Value::String(text)) => !text.is_empty(),
        Some(Value::Number(number)) => number.as_f64().is_some_and(|n| n != 0.0),
        Some(Value::Array(items)) => !items.is_empty(),
        Some(Value::Object(fields)) => !fields.is_empty(),
    }
}

/// Per-stream reconciliation state.
///
/// Deliberately not `Clone`: one reconciler belongs to one stream.
#[derive(Debug, Default)]
pub struct DeltaReconciler {
    previous: String,
}

impl DeltaReconciler {
    /// Creates a reconciler with an empty previous snapshot.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Last full snapshot seen.
    #[must_use]
    pub fn previous(&self) -> &str {
        &self.previous
    }

    /// Reconciles one event. Returns `None` when nothing new arrived.
    pub fn reconcile(&mut self, event: StreamEvent) -> Option<StreamEvent> {
        match event {
            StreamEvent::Text(current) => self.reconcile_text(current).map(StreamEvent::Text),
            passthrough @ StreamEvent::Passthrough(_) => Some(passthrough),
        }
    }

    /// Reconciles a text snapshot.
    ///
    /// A strict extension of the previous snapshot yields the new suffix, an
    /// exact repeat yields nothing, and anything else is emitted whole.
    pub fn reconcile_text(&mut self, current: String) -> Option<String> {
        if current == self.previous {
            return None;
        }
        let delta = current
            .strip_prefix(self.previous.as_str())
            .map_or_else(|| current.clone(), str::to_owned);
        self.previous = current;
        Some(delta)
    }
}

/// Wraps `events` with a fresh reconciler, dropping suppressed snapshots.
pub fn reconcile_stream<S>(events: S) -> impl Stream<Item = StreamEvent>
where
    S: Stream<Item = StreamEvent>,
{
    let mut reconciler = DeltaReconciler::new();
    events.filter_map(move |event| std::future::ready(reconciler.reconcile(event)))
}

/// Payload of a `data:` line from a `text/event-stream` body.
#[must_use]
pub fn parse_sse_line(line: &str) -> Option<&str> {
    let payload = line.strip_prefix("data:")?;
    Some(payload.strip_prefix(' ').unwrap_or(payload))
}

/// Joins the `data:` payloads of an event-stream body.
///
/// Payloads that are JSON strings are unquoted first.
#[must_use]
pub fn collect_sse_text(body: &str) -> String {
    body.lines()
        .filter_map(parse_sse_line)
        .map(|payload| match serde_json::from_str::<Value>(payload) {
            Ok(Value::String(text)) => text,
            _ => payload.to_owned(),
        })
        .collect()
}
