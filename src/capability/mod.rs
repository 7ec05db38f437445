//! Capability modules - the host operations exposed into the sandbox.
//!
//! Each capability is an independent unit with a uniform lifecycle:
//!
//! - [`Capability::install`] registers its native functions on the script
//!   engine (once, at runtime construction),
//! - [`Capability::namespace`] emits the script-facing object map bound to
//!   the capability's name in the sandbox prelude,
//! - [`Capability::connect`] runs when a sandbox is assembled and may
//!   subscribe to host state (the Links module watches scenario changes),
//! - [`Capability::reset`] tears down everything the module registered.
//!
//! `reset` must never fail and must tolerate being called repeatedly or
//! before any `connect` - it runs unconditionally on every program swap.

use std::cell::{OnceCell, RefCell};
use std::rc::Rc;

use rhai::{AST, Dynamic, Engine, FnPtr, FuncArgs};

pub mod app;
pub mod components;
pub mod keyboard;
pub mod links;
pub mod media;
pub mod reactive;
pub mod variables;

pub use app::AppCapability;
pub use components::ComponentsCapability;
pub use keyboard::KeyboardCapability;
pub use links::LinksCapability;
pub use media::MediaCapability;
pub use reactive::ReactiveCapability;
pub use variables::VariablesCapability;

// =============================================================================
// Lifecycle contract
// =============================================================================

/// Uniform lifecycle of a capability module.
pub trait Capability {
    /// Fixed sandbox name. Also the object-map identifier scripts use.
    fn name(&self) -> &'static str;

    /// Register this capability's native functions on the engine.
    fn install(&self, engine: &mut Engine);

    /// The script-facing namespace body: an object-map literal whose entries
    /// delegate to the installed native functions.
    fn namespace(&self) -> String;

    /// Called when a sandbox is assembled. May subscribe to host state.
    fn connect(&self) {}

    /// Remove every listener, cuepoint, watcher and override this module
    /// created, unsubscribe from host state, and clear internal collections.
    fn reset(&self);
}

// =============================================================================
// Script environment
// =============================================================================

/// Shared handle to the compiled program, filled in by the runtime
/// controller. Callbacks retained by capability modules resolve the engine
/// and AST through this at invocation time, so a callback registered by a
/// program that has since been reset quietly does nothing.
#[derive(Default)]
pub struct ScriptEnv {
    engine: OnceCell<Rc<Engine>>,
    ast: RefCell<Option<AST>>,
}

impl ScriptEnv {
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    /// Install the engine. Called exactly once after native registration.
    pub(crate) fn set_engine(&self, engine: Engine) {
        let _ = self.engine.set(Rc::new(engine));
    }

    pub(crate) fn engine(&self) -> Option<Rc<Engine>> {
        self.engine.get().cloned()
    }

    pub(crate) fn set_ast(&self, ast: AST) {
        *self.ast.borrow_mut() = Some(ast);
    }

    pub(crate) fn clear_ast(&self) {
        *self.ast.borrow_mut() = None;
    }

    fn ast(&self) -> Option<AST> {
        self.ast.borrow().clone()
    }
}

/// A script-supplied callback (rhai function pointer or closure), retained
/// by a capability module and invoked later from host events.
#[derive(Clone)]
pub struct ScriptCallback {
    env: Rc<ScriptEnv>,
    fn_ptr: FnPtr,
}

impl ScriptCallback {
    pub fn new(env: Rc<ScriptEnv>, fn_ptr: FnPtr) -> Self {
        Self { env, fn_ptr }
    }

    /// Extract a callback from a dynamic argument; `()` or any non-callable
    /// yields `None`.
    pub fn from_dynamic(env: &Rc<ScriptEnv>, value: Dynamic) -> Option<Self> {
        value
            .try_cast::<FnPtr>()
            .map(|fn_ptr| Self::new(Rc::clone(env), fn_ptr))
    }

    /// Invoke the callback. Failures are logged and swallowed: a failing
    /// behavior stops producing effects, nothing propagates to the host.
    pub fn call(&self, args: impl FuncArgs) {
        let Some(engine) = self.env.engine() else {
            return;
        };
        let Some(ast) = self.env.ast() else {
            return;
        };
        if let Err(err) = self.fn_ptr.call::<Dynamic>(&engine, &ast, args) {
            log::error!("behavior callback '{}' failed: {err}", self.fn_ptr.fn_name());
        }
    }
}

// =============================================================================
// Argument coercion helpers
// =============================================================================

/// Read a number out of a dynamic script argument. `()` means absent.
pub(crate) fn opt_seconds(value: &Dynamic) -> Option<f64> {
    if let Ok(f) = value.as_float() {
        Some(f)
    } else if let Ok(i) = value.as_int() {
        Some(i as f64)
    } else {
        None
    }
}

/// Read a single reference string or an ordered collection of them.
pub(crate) fn ref_strings(value: Dynamic) -> Vec<String> {
    if let Some(list) = value.clone().try_cast::<rhai::Array>() {
        list.into_iter()
            .filter_map(|item| item.into_string().ok())
            .collect()
    } else if let Ok(text) = value.into_string() {
        vec![text]
    } else {
        Vec::new()
    }
}
