//! Derived Signals
//!
//! A derived signal is a signal whose value is produced by an effect that
//! recomputes it from other signals. Consumers get a [`ReadSignal`]; the
//! setter stays inside the effect.
//!
//! Because the inner write goes through the ordinary signal path, a
//! recomputation that yields the same primitive value does not wake the
//! derived signal's own subscribers.

use std::cell::RefCell;
use std::rc::Rc;

use super::effect::{Effect, EffectKind};
use super::signal::{ReadSignal, Signal};
use super::value::SignalValue;

/// Create a read-only signal whose value is `compute()`, kept up to date
/// reactively.
///
/// If the very first computation fails, the failure is logged and the
/// signal starts at `T::default()`.
///
/// # Example
///
/// ```rust
/// use filament_core::reactive::{derived, tick, Signal};
///
/// let count = Signal::new(1);
/// let source = count.clone();
/// let doubled = derived(move || source.get() * 2);
/// assert_eq!(doubled.get(), 2);
///
/// count.set(2);
/// tick();
/// assert_eq!(doubled.get(), 4);
/// ```
pub fn derived<T, F>(compute: F) -> ReadSignal<T>
where
    T: SignalValue + Default,
    F: Fn() -> T + 'static,
{
    derived_with_handle(compute).0
}

/// Like [`derived`], also returning the effect that drives it.
pub fn derived_with_handle<T, F>(compute: F) -> (ReadSignal<T>, Effect)
where
    T: SignalValue + Default,
    F: Fn() -> T + 'static,
{
    let slot: Rc<RefCell<Option<Signal<T>>>> = Rc::new(RefCell::new(None));

    let target = slot.clone();
    let effect = Effect::with_kind(EffectKind::Derived, move || {
        let value = compute();
        let existing = target.borrow().clone();
        match existing {
            Some(signal) => signal.set(value),
            None => *target.borrow_mut() = Some(Signal::new(value)),
        }
    });

    let signal = slot
        .borrow_mut()
        .get_or_insert_with(|| Signal::new(T::default()))
        .clone();
    (signal.read_only(), effect)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::{effect, tick};
    use std::cell::Cell;

    #[test]
    fn calculates_immediately() {
        let count = Signal::new(1);
        let source = count.clone();
        let doubled = derived(move || source.get() * 2);
        assert_eq!(doubled.get(), 2);
    }

    #[test]
    fn recalculates_only_when_dependencies_change() {
        let count = Signal::new(1);
        let unrelated = Signal::new(0);
        let computations = Rc::new(Cell::new(0));

        let (source, calls) = (count.clone(), computations.clone());
        let doubled = derived(move || {
            calls.set(calls.get() + 1);
            source.get() * 2
        });
        assert_eq!(computations.get(), 1);

        unrelated.set(5);
        tick();
        assert_eq!(computations.get(), 1);

        count.set(3);
        tick();
        assert_eq!(computations.get(), 2);
        assert_eq!(doubled.get(), 6);
    }

    #[test]
    fn equal_results_do_not_wake_downstream() {
        let count = Signal::new(2);
        let source = count.clone();
        let parity = derived(move || source.get() % 2);

        let runs = Rc::new(Cell::new(0));
        let (reader, counter) = (parity.clone(), runs.clone());
        let _watcher = effect(move || {
            reader.get();
            counter.set(counter.get() + 1);
        });

        count.set(4);
        tick();
        assert_eq!(parity.get(), 0);
        assert_eq!(runs.get(), 1);
    }

    #[test]
    fn failing_first_computation_falls_back_to_default() {
        let (value, driver) = derived_with_handle(|| -> i32 { panic!("not ready") });
        assert_eq!(value.get(), 0);
        assert_eq!(driver.run_count(), 1);
    }

    #[test]
    fn derived_chains_settle() {
        let base = Signal::new(5);
        let source = base.clone();
        let doubled = derived(move || source.get() * 2);
        let upstream = doubled.clone();
        let plus_ten = derived(move || upstream.get() + 10);

        assert_eq!(plus_ten.get(), 20);

        base.set(10);
        tick();
        assert_eq!(doubled.get(), 20);
        assert_eq!(plus_ten.get(), 30);
    }
}
