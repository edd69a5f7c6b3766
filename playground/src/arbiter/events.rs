// SPDX-FileCopyrightText: OpenTalk GmbH <mail@opentalk.eu>
//
// SPDX-License-Identifier: EUPL-1.2

//! Notifications emitted by the arbiter.

use derivative::Derivative;
use parking_lot::Mutex;
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use crate::PlaybackState;

/// Something observers of the arbiter may want to know about.
#[derive(Debug, Clone, PartialEq)]
pub enum ArbiterEvent<P> {
    /// Another pipeline got connected to the shared sinks.
    CurrentChanged(P),
    /// The current pipeline confirmed a new state.
    CurrentState(PlaybackState),
    /// A pipeline got registered.
    PipelineAdded(P),
    /// A pipeline got unregistered.
    PipelineRemoved(P),
}

impl<P> ArbiterEvent<P> {
    #[must_use]
    pub fn kind(&self) -> EventKind {
        match self {
            ArbiterEvent::CurrentChanged(_) => EventKind::CurrentChanged,
            ArbiterEvent::CurrentState(_) => EventKind::CurrentState,
            ArbiterEvent::PipelineAdded(_) => EventKind::PipelineAdded,
            ArbiterEvent::PipelineRemoved(_) => EventKind::PipelineRemoved,
        }
    }
}

/// Event name to subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    CurrentChanged,
    CurrentState,
    PipelineAdded,
    PipelineRemoved,
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            EventKind::CurrentChanged => "current-changed",
            EventKind::CurrentState => "current-state",
            EventKind::PipelineAdded => "pipeline-added",
            EventKind::PipelineRemoved => "pipeline-removed",
        };
        write!(f, "{name}")
    }
}

/// Identifies a subscription so it can be cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type EventCallback<P> = Arc<dyn Fn(&ArbiterEvent<P>) + Send + Sync>;

#[derive(Derivative)]
#[derivative(Debug(bound = ""))]
struct Subscriber<P> {
    id: SubscriptionId,
    kind: EventKind,
    #[derivative(Debug = "ignore")]
    callback: EventCallback<P>,
}

/// Synchronous dispatcher calling subscribers in registration order.
#[derive(Derivative)]
#[derivative(Debug(bound = ""))]
pub(crate) struct EventDispatcher<P> {
    next_id: AtomicU64,
    subscribers: Mutex<Vec<Subscriber<P>>>,
}

impl<P> Default for EventDispatcher<P> {
    fn default() -> Self {
        Self {
            next_id: AtomicU64::new(0),
            subscribers: Mutex::new(Vec::new()),
        }
    }
}

impl<P> EventDispatcher<P> {
    pub(crate) fn subscribe(&self, kind: EventKind, callback: EventCallback<P>) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.subscribers.lock().push(Subscriber { id, kind, callback });
        id
    }

    pub(crate) fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self.subscribers.lock();
        let before = subscribers.len();
        subscribers.retain(|subscriber| subscriber.id != id);
        subscribers.len() != before
    }

    pub(crate) fn emit(&self, event: &ArbiterEvent<P>) {
        let kind = event.kind();
        trace!("emit {kind}");

        // callbacks run unlocked, they may subscribe or unsubscribe
        let callbacks: Vec<_> = self
            .subscribers
            .lock()
            .iter()
            .filter(|subscriber| subscriber.kind == kind)
            .map(|subscriber| Arc::clone(&subscriber.callback))
            .collect();

        for callback in callbacks {
            callback(event);
        }
    }
}
