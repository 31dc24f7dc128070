//! Reactive Context
//!
//! The reactive context tracks which computation is currently running.
//! This enables automatic dependency tracking: when a signal is read,
//! we can register the current computation as a dependent.
//!
//! # Implementation
//!
//! We use a thread-local stack to track the currently executing computation.
//! When entering a reactive context (running an effect, a derived
//! computation, or a template binding), we push the subscriber onto the
//! stack. When the computation completes, the guard pops it.
//!
//! Because entries are saved and restored, an effect created while another
//! effect is running only tracks its own reads; the outer effect resumes
//! tracking once the inner one returns.
//!
//! An entry without a subscriber marks an untracked region (see
//! [`untrack`](super::untrack)): reads inside it register nothing.

use std::cell::RefCell;

use smallvec::SmallVec;

use super::subscriber::{SignalId, SubscriberId};

thread_local! {
    static CONTEXT_STACK: RefCell<Vec<ContextEntry>> = const { RefCell::new(Vec::new()) };
}

/// An entry in the reactive context stack.
#[derive(Debug, Clone)]
struct ContextEntry {
    /// The subscriber of the current computation, `None` when untracked.
    subscriber_id: Option<SubscriberId>,
    /// Signals read during this computation, without duplicates.
    dependencies: SmallVec<[SignalId; 4]>,
}

/// Guard that pops the context when dropped.
///
/// This keeps the stack balanced even if the computation panics.
pub struct ReactiveContext {
    subscriber_id: Option<SubscriberId>,
}

impl ReactiveContext {
    /// Enter a new reactive context for the given subscriber.
    ///
    /// While this context is active, any signals that are read will
    /// register the subscriber as a dependent.
    pub fn enter(subscriber_id: SubscriberId) -> Self {
        Self::push(Some(subscriber_id))
    }

    /// Enter a region in which reads are not tracked.
    pub fn enter_untracked() -> Self {
        Self::push(None)
    }

    fn push(subscriber_id: Option<SubscriberId>) -> Self {
        CONTEXT_STACK.with(|stack| {
            stack.borrow_mut().push(ContextEntry {
                subscriber_id,
                dependencies: SmallVec::new(),
            });
        });

        Self { subscriber_id }
    }

    /// Check if reads are currently being tracked.
    pub fn is_active() -> bool {
        Self::current_subscriber().is_some()
    }

    /// Get the current subscriber ID, if any.
    pub fn current_subscriber() -> Option<SubscriberId> {
        CONTEXT_STACK.with(|stack| stack.borrow().last().and_then(|entry| entry.subscriber_id))
    }

    /// Record a dependency on the given signal.
    ///
    /// This is called by signals when they are read.
    pub fn track_dependency(signal_id: SignalId) {
        CONTEXT_STACK.with(|stack| {
            if let Some(entry) = stack.borrow_mut().last_mut() {
                if entry.subscriber_id.is_some() && !entry.dependencies.contains(&signal_id) {
                    entry.dependencies.push(signal_id);
                }
            }
        });
    }

    /// Get the dependencies collected in the current context.
    pub fn get_dependencies() -> Vec<SignalId> {
        CONTEXT_STACK.with(|stack| {
            stack
                .borrow()
                .last()
                .map(|entry| entry.dependencies.to_vec())
                .unwrap_or_default()
        })
    }
}

impl Drop for ReactiveContext {
    fn drop(&mut self) {
        let _ = CONTEXT_STACK.try_with(|stack| {
            let popped = stack.borrow_mut().pop();

            if let Some(entry) = popped {
                debug_assert_eq!(
                    entry.subscriber_id, self.subscriber_id,
                    "ReactiveContext mismatch: expected {:?}, got {:?}",
                    self.subscriber_id, entry.subscriber_id
                );
            }
        });
    }
}
