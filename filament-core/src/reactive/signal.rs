//! Signal Implementation
//!
//! A Signal is the fundamental reactive primitive. It holds a value and
//! tracks which computations depend on it.
//!
//! # How Signals Work
//!
//! 1. When a signal is read within a reactive context (an effect, derived
//!    computation, or template binding), the read is recorded and the
//!    computation becomes a subscriber once it finishes running.
//!
//! 2. When a signal is written with a value that differs from the current
//!    one (see [`SignalValue`]), the new value is stored immediately and
//!    every subscriber is queued for the next flush.
//!
//! 3. Subscribers re-run when the flush microtask runs, never inside
//!    `set`. Reads in the same synchronous turn see the new value at once.
//!
//! # Debug Mode
//!
//! A signal created with [`SignalOptions::debug_mode`], or any individual
//! read or write made with [`DebugOptions::debug_mode`], emits a `debug!`
//! event after the current microtask:
//!
//! - `Signal retrieved` with `value`, `subscribers` and `label`
//! - `Signal set` with `old_value`, `new_value`, `subscribers` and `label`

use std::cell::RefCell;
use std::fmt::{self, Debug};
use std::rc::Rc;

use super::context::ReactiveContext;
use super::executor;
use super::runtime::{Runtime, Trigger};
use super::subscriber::SignalId;
use super::value::SignalValue;

/// Options fixed when a signal is created.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignalOptions {
    /// Log every read and write of this signal.
    pub debug_mode: bool,
    /// Name shown in debug output.
    pub label: Option<String>,
}

impl SignalOptions {
    /// Debug mode on, with a label.
    pub fn debug(label: impl Into<String>) -> Self {
        Self {
            debug_mode: true,
            label: Some(label.into()),
        }
    }
}

/// Options for a single read or write.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DebugOptions {
    /// Log this access even if the signal is not in debug mode.
    pub debug_mode: bool,
    /// Call-site label, appended to the signal's own label.
    pub label: Option<String>,
}

impl DebugOptions {
    /// Debug mode on, with a call-site label.
    pub fn labeled(label: impl Into<String>) -> Self {
        Self {
            debug_mode: true,
            label: Some(label.into()),
        }
    }
}

struct SignalInner<T> {
    id: SignalId,
    value: RefCell<T>,
    options: SignalOptions,
}

impl<T> Drop for SignalInner<T> {
    fn drop(&mut self) {
        Runtime::forget_signal(self.id);
    }
}

/// A reactive signal holding a value of type `T`.
///
/// Cloning a signal clones the handle, not the value: all clones share one
/// cell.
///
/// # Example
///
/// ```rust
/// use filament_core::reactive::Signal;
///
/// let count = Signal::new(0);
/// assert_eq!(count.get(), 0);
///
/// count.set(5);
/// assert_eq!(count.get(), 5);
/// ```
pub struct Signal<T: SignalValue> {
    inner: Rc<SignalInner<T>>,
}

impl<T: SignalValue> Signal<T> {
    /// Create a new signal with the given initial value.
    pub fn new(value: T) -> Self {
        Self::with_options(value, SignalOptions::default())
    }

    /// Create a new signal with debug options.
    pub fn with_options(value: T, options: SignalOptions) -> Self {
        Self {
            inner: Rc::new(SignalInner {
                id: SignalId::new(),
                value: RefCell::new(value),
                options,
            }),
        }
    }

    /// Get the signal's unique ID.
    pub fn id(&self) -> SignalId {
        self.inner.id
    }

    /// Get the current value, registering a dependency if tracking.
    pub fn get(&self) -> T {
        self.read(None)
    }

    /// Get the current value with per-call debug options.
    pub fn get_with(&self, debug: DebugOptions) -> T {
        self.read(Some(debug))
    }

    /// Get the current value without tracking dependencies.
    pub fn get_untracked(&self) -> T {
        self.inner.value.borrow().clone()
    }

    /// Run `f` on the current value, registering a dependency if tracking.
    ///
    /// `f` sees a snapshot, so it may write to this signal.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        ReactiveContext::track_dependency(self.inner.id);
        let value = self.inner.value.borrow().clone();
        f(&value)
    }

    fn read(&self, debug: Option<DebugOptions>) -> T {
        ReactiveContext::track_dependency(self.inner.id);
        let value = self.inner.value.borrow().clone();

        if let Some(label) = self.debug_label(debug.as_ref()) {
            let subscribers = self.subscriber_count();
            let shown = format!("{value:?}");
            executor::queue_microtask(Box::new(move || {
                tracing::debug!(value = %shown, subscribers, label = %label, "Signal retrieved");
            }));
        }

        value
    }

    /// Set a new value and queue subscribers.
    ///
    /// A no-op when the new value is the same as the current one.
    pub fn set(&self, value: T) {
        self.write(value, None);
    }

    /// Set a new value with per-call debug options.
    pub fn set_with(&self, value: T, debug: DebugOptions) {
        self.write(value, Some(debug));
    }

    /// Update the value using a function of the current value.
    pub fn update(&self, f: impl FnOnce(&T) -> T) {
        let current = self.inner.value.borrow().clone();
        let next = f(&current);
        self.set(next);
    }

    fn write(&self, value: T, debug: Option<DebugOptions>) {
        if self.inner.value.borrow().same(&value) {
            return;
        }

        let old = self.inner.value.replace(value);
        let label = self.debug_label(debug.as_ref());
        let notify = Runtime::has_subscribers(self.inner.id);

        if label.is_none() && !notify {
            return;
        }

        let new = self.inner.value.borrow().clone();
        if let Some(label) = label {
            let subscribers = self.subscriber_count();
            let old_shown = format!("{old:?}");
            let new_shown = format!("{new:?}");
            executor::queue_microtask(Box::new(move || {
                tracing::debug!(
                    old_value = %old_shown,
                    new_value = %new_shown,
                    subscribers,
                    label = %label,
                    "Signal set"
                );
            }));
        }

        if notify {
            Runtime::notify_signal_change(
                self.inner.id,
                Some(Trigger {
                    signal: self.inner.id,
                    old_value: Rc::new(old),
                    new_value: Rc::new(new),
                }),
            );
        }
    }

    /// The label to log with, or `None` when this access is not logged.
    fn debug_label(&self, debug: Option<&DebugOptions>) -> Option<String> {
        let call_debug = debug.is_some_and(|d| d.debug_mode);
        if !self.inner.options.debug_mode && !call_debug {
            return None;
        }
        Some(compose_label(
            self.inner.options.label.as_deref(),
            debug.and_then(|d| d.label.as_deref()),
        ))
    }

    /// Get the number of subscribers.
    pub fn subscriber_count(&self) -> usize {
        Runtime::subscriber_count(self.inner.id)
    }

    /// A read-only handle to this signal.
    pub fn read_only(&self) -> ReadSignal<T> {
        ReadSignal {
            signal: self.clone(),
        }
    }

    /// Split into a getter and a setter.
    pub fn split(self) -> (ReadSignal<T>, WriteSignal<T>) {
        (
            ReadSignal {
                signal: self.clone(),
            },
            WriteSignal { signal: self },
        )
    }
}

fn compose_label(signal_label: Option<&str>, call_label: Option<&str>) -> String {
    match (signal_label, call_label) {
        (Some(own), Some(call)) => format!("({own}) {call}"),
        (Some(own), None) => format!("({own})"),
        (None, Some(call)) => call.to_string(),
        (None, None) => "anonymous signal".to_string(),
    }
}

impl<T: SignalValue> Clone for Signal<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: SignalValue> Debug for Signal<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal")
            .field("id", &self.inner.id)
            .field("value", &*self.inner.value.borrow())
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

/// Signals compare by identity, like the cells they are.
impl<T: SignalValue> SignalValue for Signal<T> {
    fn same(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

/// The getter half of a signal.
pub struct ReadSignal<T: SignalValue> {
    signal: Signal<T>,
}

impl<T: SignalValue> ReadSignal<T> {
    pub fn id(&self) -> SignalId {
        self.signal.id()
    }

    /// Get the current value, registering a dependency if tracking.
    pub fn get(&self) -> T {
        self.signal.get()
    }

    pub fn get_with(&self, debug: DebugOptions) -> T {
        self.signal.get_with(debug)
    }

    pub fn get_untracked(&self) -> T {
        self.signal.get_untracked()
    }

    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        self.signal.with(f)
    }

    pub fn subscriber_count(&self) -> usize {
        self.signal.subscriber_count()
    }
}

impl<T: SignalValue> Clone for ReadSignal<T> {
    fn clone(&self) -> Self {
        Self {
            signal: self.signal.clone(),
        }
    }
}

impl<T: SignalValue> Debug for ReadSignal<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ReadSignal").field(&self.signal).finish()
    }
}

impl<T: SignalValue> SignalValue for ReadSignal<T> {
    fn same(&self, other: &Self) -> bool {
        self.signal.same(&other.signal)
    }
}

/// The setter half of a signal.
pub struct WriteSignal<T: SignalValue> {
    signal: Signal<T>,
}

impl<T: SignalValue> WriteSignal<T> {
    /// Set a new value and queue subscribers.
    pub fn set(&self, value: T) {
        self.signal.set(value);
    }

    pub fn set_with(&self, value: T, debug: DebugOptions) {
        self.signal.set_with(value, debug);
    }

    pub fn update(&self, f: impl FnOnce(&T) -> T) {
        self.signal.update(f);
    }
}

impl<T: SignalValue> Clone for WriteSignal<T> {
    fn clone(&self) -> Self {
        Self {
            signal: self.signal.clone(),
        }
    }
}

impl<T: SignalValue> Debug for WriteSignal<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WriteSignal")
            .field("id", &self.signal.id())
            .finish()
    }
}

/// Create a signal and return its getter and setter.
pub fn create_signal<T: SignalValue>(initial: T) -> (ReadSignal<T>, WriteSignal<T>) {
    Signal::new(initial).split()
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
