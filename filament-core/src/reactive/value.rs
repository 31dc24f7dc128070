//! Change detection for signal values.
//!
//! A write only notifies subscribers when the new value differs from the
//! current one. What "differs" means depends on the type:
//!
//! - Primitives (numbers, `bool`, `char`, strings) compare by value, so
//!   writing the same number twice is a no-op.
//! - Everything else is treated as an object: every write counts as a
//!   change, even if the new value is structurally identical. There is no
//!   deep comparison.
//! - `Rc<T>` compares by identity, so re-setting the same allocation is a
//!   no-op while a fresh allocation always notifies.
//!
//! User types opt in with an empty impl, which gives object semantics:
//!
//! ```rust
//! use filament_core::reactive::SignalValue;
//!
//! #[derive(Debug, Clone)]
//! struct Todo { title: String, done: bool }
//!
//! impl SignalValue for Todo {}
//! ```

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::fmt::Debug;
use std::rc::Rc;

/// A value that can live in a signal.
pub trait SignalValue: Clone + Debug + 'static {
    /// Whether `other` is the same value for notification purposes.
    ///
    /// The default treats every write as a change.
    fn same(&self, other: &Self) -> bool {
        let _ = other;
        false
    }
}

macro_rules! primitive_signal_values {
    ($($ty:ty),* $(,)?) => {
        $(
            impl SignalValue for $ty {
                fn same(&self, other: &Self) -> bool {
                    self == other
                }
            }
        )*
    };
}

primitive_signal_values!(
    i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize, f32, f64, bool, char, String,
    &'static str, (),
);

impl<T: SignalValue> SignalValue for Option<T> {
    fn same(&self, other: &Self) -> bool {
        match (self, other) {
            (None, None) => true,
            (Some(a), Some(b)) => a.same(b),
            _ => false,
        }
    }
}

impl<T: Debug + ?Sized + 'static> SignalValue for Rc<T> {
    fn same(&self, other: &Self) -> bool {
        Rc::ptr_eq(self, other)
    }
}

impl<T: Clone + Debug + 'static> SignalValue for Vec<T> {}
impl<T: Clone + Debug + 'static> SignalValue for VecDeque<T> {}
impl<K: Clone + Debug + 'static, V: Clone + Debug + 'static, S: Clone + 'static> SignalValue
    for HashMap<K, V, S>
{
}
impl<K: Clone + Debug + 'static, V: Clone + Debug + 'static> SignalValue for BTreeMap<K, V> {}
