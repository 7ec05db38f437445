//! # cuescript
//!
//! Behavior automation runtime for interactive media presentations.
//!
//! A visual behavior program is compiled (elsewhere) into script text; this
//! crate runs that text inside a capability-scoped sandbox and keeps its
//! side effects (DOM listeners, media cuepoints, reactive watchers,
//! property overrides) consistent while the presentation's active scenario
//! changes, with full idempotent teardown.
//!
//! Built on [rhai](https://rhai.rs) for scripting and
//! [spark-signals](https://github.com/RLabs-Inc/spark-signals) for
//! fine-grained reactivity.
//!
//! ## Architecture
//!
//! ```text
//! program text → Runtime::exec → sandbox prelude + program → rhai engine
//!                                        │
//!                                        └→ capability modules → host services
//! ```
//!
//! The host injects its collaborators through [`host::HostServices`] and
//! drives the runtime from its own event loop: media position changes feed
//! the cuepoint scheduler, and [`runtime::Runtime::tick`] runs once per
//! rendering tick to drain deferred re-binding work.
//!
//! ## Modules
//!
//! - [`types`] - Trigger references and id newtypes
//! - [`host`] - Injected collaborator interfaces and the cuepoint scheduler
//! - [`capability`] - The seven sandbox capability modules
//! - [`runtime`] - Program lifecycle: `exec`, `reset`, `tick`, `context`

pub mod capability;
pub mod error;
pub mod host;
pub mod runtime;
pub mod types;

pub use error::ScriptError;
pub use types::{AnchorId, ComponentId, CuepointId, ListenerId, TriggerRef};

pub use host::{
    CuepointHandler, CuepointHooks, CuepointScheduler, CuepointSpec, Dom, HostServices,
    KeyEvent, Modifiers, Shell, Stage, TickScheduler, Transport,
};

pub use capability::Capability;

pub use runtime::{Runtime, Sandbox, TickQueue};
