use std::{
    any::Any,
    fmt,
    panic::{self, AssertUnwindSafe},
    pin::Pin,
    sync::{
        Arc, Mutex, PoisonError, RwLock, Weak,
        atomic::{AtomicU64, Ordering},
    },
    task::{Context, Poll},
};

use futures::Stream;
use regex::Regex;
use serde_json::Value;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use super::{
    ConfigChange, ConfigError, ListenerFailure, Mapping,
    diff::{ChangeSet, flatten},
    path_ops::{HashPath, format_location},
};

/// Error type listeners may return.
pub type ListenerError = Box<dyn std::error::Error + Send + Sync>;

/// Callback bound to an [`Event`].
pub type Processor = Arc<dyn Fn(&Matched, &EventPattern) -> Result<(), ListenerError> + Send + Sync>;

/// What an event processor receives.
#[derive(Debug, Clone, PartialEq)]
pub enum Matched {
    /// The first match only (singular events).
    Single(Value),
    /// Every match, in document order.
    All(Vec<Value>),
}

impl Matched {
    /// The first matched value.
    pub fn first(&self) -> Option<&Value> {
        match self {
            Matched::Single(value) => Some(value),
            Matched::All(values) => values.first(),
        }
    }

    /// All matched values.
    pub fn values(&self) -> &[Value] {
        match self {
            Matched::Single(value) => std::slice::from_ref(value),
            Matched::All(values) => values,
        }
    }
}

/// The pattern an event listens on.
#[derive(Debug, Clone)]
pub enum EventPattern {
    /// A hash path, possibly containing wildcards, resolved against the diff.
    Path(HashPath),
    /// A regex tested against every flattened dotted key of the diff.
    Regex(Regex),
}

impl EventPattern {
    /// Parses a hash path pattern.
    ///
    /// # Errors
    /// Returns `ConfigError::PatternError` if the path cannot be parsed.
    pub fn path(expr: &str) -> Result<Self, ConfigError> {
        HashPath::parse(expr).map(Self::Path)
    }

    /// Compiles a regex pattern over flattened keys.
    ///
    /// # Errors
    /// Returns `ConfigError::PatternError` if the regex is invalid.
    pub fn regex(expr: &str) -> Result<Self, ConfigError> {
        Regex::new(expr)
            .map(Self::Regex)
            .map_err(|e| ConfigError::PatternError {
                pattern: expr.to_string(),
                reason: e.to_string(),
            })
    }

    /// The source text of the pattern.
    pub fn as_str(&self) -> &str {
        match self {
            EventPattern::Path(path) => path.as_str(),
            EventPattern::Regex(re) => re.as_str(),
        }
    }

    fn resolve(&self, diff: &Mapping) -> Vec<Value> {
        match self {
            EventPattern::Path(path) => path.resolve_all(diff),
            EventPattern::Regex(re) => flatten(diff)
                .into_iter()
                .filter(|(location, _)| re.is_match(&format_location(location)))
                .map(|(_, value)| value)
                .collect(),
        }
    }
}

impl fmt::Display for EventPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A listener bound to a path pattern.
#[derive(Clone)]
pub struct Event {
    pattern: EventPattern,
    processor: Processor,
    singular: bool,
}

impl Event {
    /// Creates a singular event; use [`Event::singular`] to receive every match.
    pub fn new<F>(pattern: EventPattern, processor: F) -> Self
    where
        F: Fn(&Matched, &EventPattern) -> Result<(), ListenerError> + Send + Sync + 'static,
    {
        Self {
            pattern,
            processor: Arc::new(processor),
            singular: true,
        }
    }

    /// Creates a singular event on a hash path.
    ///
    /// # Errors
    /// Returns `ConfigError::PatternError` if the path cannot be parsed.
    pub fn on<F>(path: &str, processor: F) -> Result<Self, ConfigError>
    where
        F: Fn(&Matched, &EventPattern) -> Result<(), ListenerError> + Send + Sync + 'static,
    {
        Ok(Self::new(EventPattern::path(path)?, processor))
    }

    /// Sets whether only the first match is delivered.
    pub fn singular(mut self, singular: bool) -> Self {
        self.singular = singular;
        self
    }

    /// The pattern this event listens on.
    pub fn pattern(&self) -> &EventPattern {
        &self.pattern
    }

    /// Whether only the first match is delivered.
    pub fn is_singular(&self) -> bool {
        self.singular
    }

    /// Runs the processor if the pattern matches anything in `diff`.
    ///
    /// Returns `Ok(false)` when nothing matched.
    ///
    /// # Errors
    /// Propagates the processor's error.
    pub fn call(&self, diff: &Mapping) -> Result<bool, ListenerError> {
        let mut matches = self.pattern.resolve(diff);
        if matches.is_empty() {
            return Ok(false);
        }

        let matched = if self.singular {
            Matched::Single(matches.swap_remove(0))
        } else {
            Matched::All(matches)
        };

        (self.processor)(&matched, &self.pattern)?;
        Ok(true)
    }
}

impl fmt::Debug for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("pattern", &self.pattern)
            .field("singular", &self.singular)
            .finish_non_exhaustive()
    }
}

/// Handle returned when registering an event, used to remove it again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EventId(u64);

struct Subscriber {
    id: u64,
    pattern: HashPath,
    sender: UnboundedSender<ConfigChange>,
}

/// Pattern-bound listeners and change subscriptions.
#[derive(Default)]
pub struct EventRegistry {
    next_id: AtomicU64,
    events: RwLock<Vec<(EventId, Arc<Event>)>>,
    subscribers: Mutex<Vec<Subscriber>>,
}

impl EventRegistry {
    /// Registers an event; events fire in registration order.
    pub fn add(&self, event: Event) -> EventId {
        let id = EventId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.events
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, Arc::new(event)));
        id
    }

    /// Removes an event. Returns false if it was not registered.
    pub fn remove(&self, id: EventId) -> bool {
        let mut events = self.events.write().unwrap_or_else(PoisonError::into_inner);
        let before = events.len();
        events.retain(|(existing, _)| *existing != id);
        events.len() != before
    }

    /// Number of registered events (subscriptions excluded).
    pub fn len(&self) -> usize {
        self.events
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// True when no events are registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True when any event or live subscription would observe a dispatch.
    pub fn has_listeners(&self) -> bool {
        !self.is_empty()
            || self
                .subscribers
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .iter()
                .any(|sub| !sub.sender.is_closed())
    }

    /// Subscribes to changes whose path falls under `pattern`.
    ///
    /// The subscription is removed when the returned handle is dropped.
    pub fn subscribe(self: &Arc<Self>, pattern: HashPath) -> Subscription {
        let (sender, receiver) = mpsc::unbounded_channel();
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);

        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Subscriber {
                id,
                pattern,
                sender,
            });

        Subscription {
            id,
            registry: Arc::downgrade(self),
            receiver,
        }
    }

    fn unsubscribe(&self, id: u64) {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|sub| sub.id != id);
    }

    /// Delivers a change-set to every matching event and subscription.
    ///
    /// Each processor runs in isolation: an error or panic is recorded and the
    /// remaining listeners still run. Returns the failures, if any.
    pub fn dispatch(&self, change_set: &ChangeSet) -> Vec<ListenerFailure> {
        let events: Vec<Arc<Event>> = self
            .events
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, event)| Arc::clone(event))
            .collect();

        let failures = events
            .iter()
            .filter_map(|event| {
                isolate(event.pattern.as_str(), || {
                    event.call(&change_set.diff).map(|_| ())
                })
            })
            .collect();

        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|sub| {
                change_set
                    .changes
                    .iter()
                    .zip(&change_set.locations)
                    .filter(|(_, location)| sub.pattern.matches_location(location))
                    .all(|(change, _)| sub.sender.send(change.clone()).is_ok())
            });

        failures
    }
}

/// Runs a listener, converting errors and panics into a [`ListenerFailure`].
pub(crate) fn isolate<F>(listener: &str, run: F) -> Option<ListenerFailure>
where
    F: FnOnce() -> Result<(), ListenerError>,
{
    let details = match panic::catch_unwind(AssertUnwindSafe(run)) {
        Ok(Ok(())) => return None,
        Ok(Err(e)) => e.to_string(),
        Err(payload) => panic_message(payload.as_ref()),
    };

    tracing::warn!(listener, details = %details, "Configuration listener failed");

    Some(ListenerFailure {
        listener: listener.to_string(),
        details,
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("panicked: {message}")
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("panicked: {message}")
    } else {
        "panicked".to_string()
    }
}

/// A subscription handle that automatically unsubscribes when dropped.
///
/// Receives one [`ConfigChange`] per changed leaf under the subscribed pattern.
/// Also usable as a [`Stream`].
pub struct Subscription {
    id: u64,
    registry: Weak<EventRegistry>,
    receiver: UnboundedReceiver<ConfigChange>,
}

impl Subscription {
    /// Waits for the next change. Returns `None` once the store is gone.
    pub async fn recv(&mut self) -> Option<ConfigChange> {
        self.receiver.recv().await
    }

    /// Returns a pending change without waiting.
    pub fn try_recv(&mut self) -> Option<ConfigChange> {
        self.receiver.try_recv().ok()
    }
}

impl Stream for Subscription {
    type Item = ConfigChange;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().receiver.poll_recv(cx)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.unsubscribe(self.id);
        }
    }
}
