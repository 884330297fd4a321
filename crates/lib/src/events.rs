//! Change notification.
//!
//! A store owns one bus. Every mutating operation emits exactly one event
//! after the mutation is applied and before the operation returns, so any
//! shared view of the store observes the post-mutation state from inside a
//! handler. Multi-step rewrites (moves, bulk loads) run with the bus muted
//! and surface as a single event describing the net change.

use crate::record::Record;
use crate::value::Id;

/// The kinds of events a subscriber can listen for.
///
/// `Any` is subscription-only: it matches every emitted event, and no event
/// of kind `Any` can be constructed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Loading,
    Load,
    Add,
    Update,
    Remove,
    Any,
}

/// A change notification.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// A fetch has started.
    Loading,
    /// A fetch or bulk replace has completed.
    Load,
    /// Records were added.
    Add { items: Vec<Id> },
    /// Records were updated; `data` carries the merged payloads when the
    /// update came through the merge path (structural moves leave it empty).
    Update { items: Vec<Id>, data: Vec<Record> },
    /// Records were removed, cascaded removals included.
    Remove { items: Vec<Id> },
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Event::Loading => EventKind::Loading,
            Event::Load => EventKind::Load,
            Event::Add { .. } => EventKind::Add,
            Event::Update { .. } => EventKind::Update,
            Event::Remove { .. } => EventKind::Remove,
        }
    }
}

/// Handle returned by [`DataSet::on`](crate::DataSet::on), used to
/// unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Subscription(u64);

type Callback = Box<dyn FnMut(&Event, Option<&str>) + Send>;

struct Listener {
    token: Subscription,
    kind: EventKind,
    callback: Callback,
}

/// Subscriber registry with a mute flag.
#[derive(Default)]
pub(crate) struct Bus {
    listeners: Vec<Listener>,
    muted: bool,
    next_token: u64,
}

impl Bus {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn subscribe(&mut self, kind: EventKind, callback: Callback) -> Subscription {
        self.next_token += 1;
        let token = Subscription(self.next_token);
        self.listeners.push(Listener {
            token,
            kind,
            callback,
        });
        token
    }

    pub(crate) fn unsubscribe(&mut self, token: Subscription) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|listener| listener.token != token);
        self.listeners.len() != before
    }

    pub(crate) fn mute(&mut self, flag: bool) {
        self.muted = flag;
    }

    pub(crate) fn is_muted(&self) -> bool {
        self.muted
    }

    /// Delivers the event synchronously: exact-kind subscribers first, then
    /// wildcard subscribers, each set in registration order. No-op while
    /// muted.
    pub(crate) fn emit(&mut self, event: &Event, sender: Option<&str>) {
        if self.muted {
            return;
        }
        let kind = event.kind();
        for listener in &mut self.listeners {
            if listener.kind == kind {
                (listener.callback)(event, sender);
            }
        }
        for listener in &mut self.listeners {
            if listener.kind == EventKind::Any {
                (listener.callback)(event, sender);
            }
        }
    }
}
