//! Effect Implementation
//!
//! An Effect is a side-effecting computation that runs whenever its
//! dependencies change.
//!
//! # How Effects Work
//!
//! 1. When created, the effect runs its function immediately to establish
//!    initial dependencies.
//!
//! 2. When any dependency changes, the effect is queued and re-runs in the
//!    next flush.
//!
//! 3. Each run re-collects dependencies from scratch. Signals the effect
//!    stopped reading no longer wake it up.
//!
//! # Failure Isolation
//!
//! A panic or an `Err` returned from the body is caught at the effect
//! boundary and logged; it never reaches the code that wrote the signal,
//! and the rest of the flush still runs. The one exception is
//! [`TemplateError`], which marks a corrupted binding and is re-raised.
//!
//! # Lifetime
//!
//! The runtime owns effects. Dropping the [`Effect`] handle does not stop
//! it; call [`Effect::dispose`] (or dispose the owning
//! [`Fragment`](crate::template::Fragment)) to tear it down.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;

use super::context::ReactiveContext;
use super::runtime::{Reactive, Runtime, Trigger};
use super::subscriber::SubscriberId;
use crate::error::{BoxError, EffectError, TemplateError};

/// What an effect body may return.
pub trait EffectOutput {
    fn into_result(self) -> Result<(), BoxError>;
}

impl EffectOutput for () {
    fn into_result(self) -> Result<(), BoxError> {
        Ok(())
    }
}

impl<E: Into<BoxError>> EffectOutput for Result<(), E> {
    fn into_result(self) -> Result<(), BoxError> {
        self.map_err(Into::into)
    }
}

/// Which public primitive an effect implements. Only affects error reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum EffectKind {
    Effect,
    Derived,
    Binding,
}

type EffectFn = Box<dyn FnMut() -> Result<(), BoxError>>;

struct EffectInner {
    id: SubscriberId,
    kind: EffectKind,
    /// Type name of the body closure, for error reports.
    function: &'static str,
    run: RefCell<EffectFn>,
    disposed: Cell<bool>,
    run_count: Cell<usize>,
    dependency_count: Cell<usize>,
}

impl EffectInner {
    fn execute(&self, trigger: Option<&Trigger>) {
        if self.disposed.get() {
            return;
        }

        let Ok(mut run) = self.run.try_borrow_mut() else {
            tracing::warn!(
                subscriber = %self.id,
                function = self.function,
                "Effect re-entered while running; skipping nested run"
            );
            return;
        };

        let (outcome, dependencies) = {
            let _ctx = ReactiveContext::enter(self.id);
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| (*run)()));
            (outcome, ReactiveContext::get_dependencies())
        };
        drop(run);

        if !self.disposed.get() {
            Runtime::set_dependencies(self.id, &dependencies);
        }
        self.dependency_count.set(dependencies.len());
        self.run_count.set(self.run_count.get() + 1);

        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(error)) => self.report(&EffectError::Failed(error.to_string()), trigger),
            Err(payload) => {
                if payload.is::<TemplateError>() {
                    panic::resume_unwind(payload);
                }
                self.report(&EffectError::from_panic(&*payload), trigger);
            }
        }
    }

    fn report(&self, error: &EffectError, trigger: Option<&Trigger>) {
        let function = self.function;
        match (self.kind, trigger) {
            (EffectKind::Derived, Some(t)) => tracing::error!(
                error = %error,
                old_value = ?t.old_value,
                new_value = ?t.new_value,
                function,
                "Error in derived signal"
            ),
            (EffectKind::Derived, None) => {
                tracing::error!(error = %error, function, "Error in derived signal")
            }
            (_, Some(t)) => tracing::error!(
                error = %error,
                old_value = ?t.old_value,
                new_value = ?t.new_value,
                function,
                "Error in subscriber"
            ),
            (_, None) => tracing::error!(error = %error, function, "Error in effect"),
        }
    }
}

impl Reactive for EffectInner {
    fn subscriber_id(&self) -> SubscriberId {
        self.id
    }

    fn run(&self, trigger: Option<&Trigger>) {
        self.execute(trigger);
    }
}

/// A side-effecting computation that runs when dependencies change.
///
/// # Example
///
/// ```rust
/// use filament_core::reactive::{effect, tick, Signal};
///
/// let count = Signal::new(0);
/// let seen = count.clone();
/// let handle = effect(move || {
///     let _ = seen.get();
/// });
///
/// count.set(5);
/// tick();
/// assert_eq!(handle.run_count(), 2);
/// ```
#[derive(Clone)]
pub struct Effect {
    inner: Rc<EffectInner>,
}

impl Effect {
    /// Create a new effect and run it once.
    pub fn new<F, R>(run: F) -> Self
    where
        F: FnMut() -> R + 'static,
        R: EffectOutput,
    {
        Self::with_kind(EffectKind::Effect, run)
    }

    pub(crate) fn with_kind<F, R>(kind: EffectKind, mut run: F) -> Self
    where
        F: FnMut() -> R + 'static,
        R: EffectOutput,
    {
        let inner = Rc::new(EffectInner {
            id: SubscriberId::new(),
            kind,
            function: std::any::type_name::<F>(),
            run: RefCell::new(Box::new(move || run().into_result())),
            disposed: Cell::new(false),
            run_count: Cell::new(0),
            dependency_count: Cell::new(0),
        });

        Runtime::register(inner.clone());
        inner.execute(None);

        Self { inner }
    }

    /// Get the subscriber ID for this effect.
    pub fn id(&self) -> SubscriberId {
        self.inner.id
    }

    /// Run the effect now, outside of any flush.
    pub fn execute(&self) {
        self.inner.execute(None);
    }

    /// Stop the effect. It will not run again.
    pub fn dispose(&self) {
        if self.inner.disposed.replace(true) {
            return;
        }
        Runtime::unregister(self.inner.id);
    }

    /// Check if the effect has been disposed.
    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.get()
    }

    /// Get the number of times the effect has run.
    pub fn run_count(&self) -> usize {
        self.inner.run_count.get()
    }

    /// Get the number of signals read on the latest run.
    pub fn dependency_count(&self) -> usize {
        self.inner.dependency_count.get()
    }
}

impl fmt::Debug for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Effect")
            .field("id", &self.inner.id)
            .field("kind", &self.inner.kind)
            .field("run_count", &self.run_count())
            .field("dependency_count", &self.dependency_count())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

/// Create an effect: run `f` now and again whenever a signal it read
/// changes.
pub fn effect<F, R>(f: F) -> Effect
where
    F: FnMut() -> R + 'static,
    R: EffectOutput,
{
    Effect::new(f)
}

/// Run `f` without registering dependencies on the current subscriber.
pub fn untrack<R>(f: impl FnOnce() -> R) -> R {
    let _ctx = ReactiveContext::enter_untracked();
    f()
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::{tick, Signal};

    #[test]
    fn effect_runs_on_creation() {
        let run_count = Rc::new(Cell::new(0));
        let run_count_clone = run_count.clone();

        let _effect = Effect::new(move || {
            run_count_clone.set(run_count_clone.get() + 1);
        });

        assert_eq!(run_count.get(), 1);
    }

    #[test]
    fn effect_reruns_after_flush_not_on_write() {
        let signal = Signal::new(0);
        let seen = Rc::new(Cell::new(-1));

        let (reader, sink) = (signal.clone(), seen.clone());
        let effect = Effect::new(move || sink.set(reader.get()));
        assert_eq!(seen.get(), 0);

        signal.set(7);
        assert_eq!(seen.get(), 0, "writes must not run subscribers synchronously");

        tick();
        assert_eq!(seen.get(), 7);
        assert_eq!(effect.run_count(), 2);
    }

    #[test]
    fn effect_does_not_run_after_disposal() {
        let signal = Signal::new(0);
        let reader = signal.clone();
        let effect = Effect::new(move || {
            reader.get();
        });

        effect.dispose();
        assert!(effect.is_disposed());

        signal.set(1);
        tick();
        assert_eq!(effect.run_count(), 1);

        effect.execute();
        assert_eq!(effect.run_count(), 1);
        assert_eq!(signal.subscriber_count(), 0);
    }

    #[test]
    fn effect_drops_stale_dependencies() {
        let use_a = Signal::new(true);
        let a = Signal::new(1);
        let b = Signal::new(2);

        let (flag, ra, rb) = (use_a.clone(), a.clone(), b.clone());
        let effect = Effect::new(move || {
            if flag.get() {
                ra.get();
            } else {
                rb.get();
            }
        });
        assert_eq!(a.subscriber_count(), 1);
        assert_eq!(b.subscriber_count(), 0);

        use_a.set(false);
        tick();
        assert_eq!(a.subscriber_count(), 0);
        assert_eq!(b.subscriber_count(), 1);
        assert_eq!(effect.dependency_count(), 2);

        a.set(10);
        tick();
        assert_eq!(effect.run_count(), 2);
    }

    #[test]
    fn nested_effects_track_separately() {
        let outer_signal = Signal::new(0);
        let inner_signal = Signal::new(0);
        let inner_handle: Rc<RefCell<Option<Effect>>> = Rc::new(RefCell::new(None));

        let (os, is, slot) = (outer_signal.clone(), inner_signal.clone(), inner_handle.clone());
        let outer = Effect::new(move || {
            let is = is.clone();
            let inner = Effect::new(move || {
                is.get();
            });
            if let Some(previous) = slot.borrow_mut().replace(inner) {
                previous.dispose();
            }
            os.get();
        });

        assert_eq!(outer.dependency_count(), 1);
        assert_eq!(outer_signal.subscriber_count(), 1);
        assert_eq!(inner_signal.subscriber_count(), 1);

        inner_signal.set(1);
        tick();
        assert_eq!(outer.run_count(), 1);
    }

    #[test]
    fn fallible_effects_are_isolated() {
        let signal = Signal::new(0);
        let reader = signal.clone();
        let failing = Effect::new(move || -> Result<(), String> {
            if reader.get() == 1 {
                return Err("bad value".to_string());
            }
            Ok(())
        });

        let healthy_runs = Rc::new(Cell::new(0));
        let (reader, runs) = (signal.clone(), healthy_runs.clone());
        let _healthy = Effect::new(move || {
            reader.get();
            runs.set(runs.get() + 1);
        });

        signal.set(1);
        tick();
        assert_eq!(failing.run_count(), 2);
        assert_eq!(healthy_runs.get(), 2);
    }

    #[test]
    fn untrack_hides_reads() {
        let signal = Signal::new(0);
        let reader = signal.clone();
        let effect = Effect::new(move || {
            untrack(|| reader.get());
        });
        assert_eq!(effect.dependency_count(), 0);
        assert_eq!(signal.subscriber_count(), 0);
    }
}
