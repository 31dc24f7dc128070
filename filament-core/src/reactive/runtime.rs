//! Reactive Runtime
//!
//! The runtime is the central coordinator that connects signals and
//! subscribers. It owns the dependency index and the pending queue, and it
//! schedules flushes when signals change.
//!
//! # How It Works
//!
//! 1. When an effect runs, the signals it reads are collected by the
//!    [`ReactiveContext`](super::ReactiveContext). Afterwards the runtime
//!    replaces the effect's previous subscriptions with exactly that set, so
//!    a signal only ever lists subscribers that read it on their most
//!    recent run.
//!
//! 2. When a signal's value changes, the runtime adds each of its
//!    subscribers to the pending set and, if no flush is scheduled yet,
//!    queues exactly one flush microtask.
//!
//! 3. The flush drains the pending set in insertion order. Many writes in
//!    one synchronous turn therefore coalesce into one flush, and each
//!    affected subscriber runs once per flush.
//!
//! # Ordering
//!
//! Subscribers run in the order they were first queued, not in dependency
//! order. In a diamond-shaped graph a subscriber may observe an
//! intermediate state and run again in a later flush once upstream derived
//! values settle.
//!
//! # Threading
//!
//! Everything here is thread-local. Signals and effects are `!Send`; each
//! thread that renders has its own runtime.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt::Debug;
use std::rc::Rc;

use indexmap::{IndexMap, IndexSet};

use super::context::ReactiveContext;
use super::executor;
use super::subscriber::{SignalId, SubscriberId};
use crate::config::RuntimeConfig;

/// A computation that the runtime can re-run.
pub(crate) trait Reactive {
    /// Get the subscriber ID for this computation.
    fn subscriber_id(&self) -> SubscriberId;

    /// Re-run the computation because a dependency changed.
    fn run(&self, trigger: Option<&Trigger>);
}

/// The write that queued a subscriber, kept for error reports.
///
/// When several writes hit the same subscriber before a flush, the trigger
/// keeps the first old value and the last new value.
#[derive(Clone)]
pub(crate) struct Trigger {
    pub(crate) signal: SignalId,
    pub(crate) old_value: Rc<dyn Debug>,
    pub(crate) new_value: Rc<dyn Debug>,
}

impl Debug for Trigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Trigger")
            .field("signal", &self.signal)
            .field("old_value", &self.old_value)
            .field("new_value", &self.new_value)
            .finish()
    }
}

#[derive(Default)]
struct RuntimeState {
    /// Live subscribers. Entries are removed on dispose.
    registry: HashMap<SubscriberId, Rc<dyn Reactive>>,

    /// Signal -> subscribers that read it on their latest run.
    signal_subscribers: HashMap<SignalId, IndexSet<SubscriberId>>,

    /// Subscriber -> signals it read on its latest run.
    subscriber_sources: HashMap<SubscriberId, Vec<SignalId>>,

    /// Subscribers waiting for the next flush, in insertion order.
    pending: IndexMap<SubscriberId, Option<Trigger>>,

    /// Whether a flush microtask has been queued and not yet started.
    flush_scheduled: bool,

    config: RuntimeConfig,
}

thread_local! {
    static RUNTIME: RefCell<RuntimeState> = RefCell::new(RuntimeState::default());
}

/// The thread's reactive runtime.
pub struct Runtime;

impl Runtime {
    /// Register a subscriber so flushes can find it.
    pub(crate) fn register(reactive: Rc<dyn Reactive>) {
        let id = reactive.subscriber_id();
        RUNTIME.with(|rt| {
            rt.borrow_mut().registry.insert(id, reactive);
        });
    }

    /// Remove a subscriber and every trace of it.
    pub(crate) fn unregister(id: SubscriberId) {
        let removed = RUNTIME.try_with(|rt| {
            let Ok(mut rt) = rt.try_borrow_mut() else {
                return (None, None);
            };
            rt.detach_sources(id);
            let pending = rt.pending.shift_remove(&id).flatten();
            (rt.registry.remove(&id), pending)
        });
        // Dropped outside the borrow: the subscriber's closure may own
        // signals whose destructors call back into the runtime.
        drop(removed);
    }

    /// Replace a subscriber's subscriptions with `sources`.
    pub(crate) fn set_dependencies(id: SubscriberId, sources: &[SignalId]) {
        RUNTIME.with(|rt| {
            let mut rt = rt.borrow_mut();
            rt.detach_sources(id);
            for &signal in sources {
                rt.signal_subscribers.entry(signal).or_default().insert(id);
            }
            rt.subscriber_sources.insert(id, sources.to_vec());
        });
    }

    /// Drop all of a subscriber's subscriptions.
    pub fn clear_dependencies(id: SubscriberId) {
        RUNTIME.with(|rt| rt.borrow_mut().detach_sources(id));
    }

    /// Forget a signal that has been dropped.
    pub(crate) fn forget_signal(signal: SignalId) {
        let _ = RUNTIME.try_with(|rt| {
            if let Ok(mut rt) = rt.try_borrow_mut() {
                rt.signal_subscribers.remove(&signal);
            }
        });
    }

    /// Whether any subscriber currently depends on `signal`.
    pub(crate) fn has_subscribers(signal: SignalId) -> bool {
        Self::subscriber_count(signal) > 0
    }

    /// Number of subscribers that read `signal` on their latest run.
    pub fn subscriber_count(signal: SignalId) -> usize {
        RUNTIME.with(|rt| {
            rt.borrow()
                .signal_subscribers
                .get(&signal)
                .map_or(0, IndexSet::len)
        })
    }

    /// Queue every subscriber of `signal` and schedule a flush if needed.
    pub(crate) fn notify_signal_change(signal: SignalId, trigger: Option<Trigger>) {
        let (schedule, replaced) = RUNTIME.with(|rt| {
            let mut rt = rt.borrow_mut();
            let subscribers: Vec<SubscriberId> = match rt.signal_subscribers.get(&signal) {
                Some(set) if !set.is_empty() => set.iter().copied().collect(),
                _ => return (false, Vec::new()),
            };

            let mut replaced = Vec::new();
            for id in subscribers {
                match rt.pending.get_mut(&id) {
                    Some(Some(existing)) => {
                        if let Some(incoming) = &trigger {
                            let stale = std::mem::replace(
                                &mut existing.new_value,
                                Rc::clone(&incoming.new_value),
                            );
                            replaced.push(stale);
                        }
                    }
                    Some(None) => {}
                    None => {
                        rt.pending.insert(id, trigger.clone());
                    }
                }
            }

            let schedule = !rt.flush_scheduled && !rt.pending.is_empty();
            if schedule {
                rt.flush_scheduled = true;
            }
            (schedule, replaced)
        });
        drop(replaced);

        if schedule {
            executor::queue_microtask(Box::new(Runtime::flush));
        }
    }

    /// Run every pending subscriber once.
    ///
    /// Writes made by subscribers during the flush queue a new flush rather
    /// than extending this one.
    pub fn flush() {
        let (batch, trace) = RUNTIME.with(|rt| {
            let mut rt = rt.borrow_mut();
            rt.flush_scheduled = false;
            (std::mem::take(&mut rt.pending), rt.config.trace_flush)
        });

        if trace {
            tracing::trace!(subscribers = batch.len(), "Flushing pending subscribers");
        }

        for (id, trigger) in batch {
            let reactive = RUNTIME.with(|rt| rt.borrow().registry.get(&id).cloned());
            if let Some(reactive) = reactive {
                reactive.run(trigger.as_ref());
            }
        }
    }

    /// Number of subscribers waiting for the next flush.
    pub fn pending_count() -> usize {
        RUNTIME.with(|rt| rt.borrow().pending.len())
    }

    /// Number of live (registered, not disposed) subscribers.
    pub fn live_subscribers() -> usize {
        RUNTIME.with(|rt| rt.borrow().registry.len())
    }

    /// Replace the runtime settings for this thread.
    pub fn configure(config: RuntimeConfig) {
        RUNTIME.with(|rt| rt.borrow_mut().config = config);
    }

    /// Current runtime settings for this thread.
    pub fn config() -> RuntimeConfig {
        RUNTIME.with(|rt| rt.borrow().config.clone())
    }

    /// Get the current subscriber being tracked, if any.
    pub fn current_subscriber() -> Option<SubscriberId> {
        ReactiveContext::current_subscriber()
    }

    /// Check if we're inside a tracking context.
    pub fn is_tracking() -> bool {
        ReactiveContext::is_active()
    }
}

impl RuntimeState {
    fn detach_sources(&mut self, id: SubscriberId) {
        if let Some(sources) = self.subscriber_sources.remove(&id) {
            for signal in sources {
                if let Some(set) = self.signal_subscribers.get_mut(&signal) {
                    set.shift_remove(&id);
                }
            }
        }
    }
}
