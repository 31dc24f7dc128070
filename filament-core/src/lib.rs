//! Filament Core
//!
//! This crate provides the core of the Filament component framework:
//! fine-grained reactive state and templates whose nodes stay in sync
//! with it, without a virtual DOM diff.
//!
//! It implements:
//!
//! - Reactive primitives (signals, derived signals, effects)
//! - Batched, deferred change propagation
//! - Template evaluation into live node trees
//! - Keyed list reconciliation
//! - Attribute schemas for component properties
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `reactive`: signals, effects and the per-thread runtime
//! - `template`: template evaluation, bindings and reconciliation
//! - `schema`: declared attributes backed by signals
//! - `config`: runtime and template settings
//! - `error`: error types
//!
//! Everything is single-threaded: the runtime, the event table and the
//! node trees all live on the thread that created them.
//!
//! # Example
//!
//! ```rust,ignore
//! use filament_core::html;
//! use filament_core::reactive::{effect, tick, Signal};
//! use filament_core::template::Value;
//!
//! // Create a signal
//! let count = Signal::new(0);
//!
//! // Render it
//! let view = html!(
//!     "<button onclick={}>Clicked {} times</button>",
//!     Value::callback({
//!         let count = count.clone();
//!         move |_| count.update(|n| n + 1)
//!     }),
//!     &count,
//! );
//!
//! // Update the signal
//! count.set(5);
//! tick();
//! // The text node updates in place: "<button>Clicked 5 times</button>"
//! ```

pub mod config;
pub mod error;
pub mod reactive;
pub mod schema;
pub mod template;

pub use config::Config;
pub use error::{BindingKind, ConfigError, EffectError, TemplateError};
pub use template::{html, render_static, Fragment, Value};
