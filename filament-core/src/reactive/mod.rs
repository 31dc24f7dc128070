//! Reactive Primitives
//!
//! This module implements the signal engine: signals, derived signals, and
//! effects. These primitives drive every live binding the template engine
//! creates.
//!
//! # Concepts
//!
//! ## Signals
//!
//! A Signal is a container for mutable state. When a signal's value is read
//! within a tracking context (such as an effect), the signal registers that
//! context as a dependent. When the signal's value changes, all dependents
//! are queued.
//!
//! ## Derived Signals
//!
//! A derived signal is a read-only signal computed by an effect from other
//! signals.
//!
//! ## Effects
//!
//! An Effect is a side-effecting computation that runs whenever its
//! dependencies change. Template bindings are effects that write into the
//! node tree.
//!
//! # Scheduling
//!
//! Writes are applied immediately but subscribers run later, in one batched
//! flush per turn: N writes produce at most one scheduled flush, and each
//! affected subscriber runs once. See [`executor`] for how the flush is
//! deferred.

mod context;
mod derived;
mod effect;
pub mod executor;
mod runtime;
mod signal;
mod subscriber;
mod value;

pub use context::ReactiveContext;
pub use derived::{derived, derived_with_handle};
pub use effect::{effect, untrack, Effect, EffectOutput};
pub use executor::{queue_microtask, set_executor, tick, Executor, QueueExecutor, TokioExecutor};
pub use runtime::Runtime;
pub use signal::{create_signal, DebugOptions, ReadSignal, Signal, SignalOptions, WriteSignal};
pub use subscriber::{SignalId, SubscriberId};
pub use value::SignalValue;

pub(crate) use effect::EffectKind;
