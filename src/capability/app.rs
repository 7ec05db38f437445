//! App capability - application shell operations and the reset broadcast.
//!
//! `app.reset()` in a script is a *broadcast*, not the runtime lifecycle
//! reset: every registered reset callback is invoked exactly once, guarded
//! against re-entry so a callback that itself triggers another broadcast
//! does not recurse. The host can hook the broadcast natively with
//! [`AppCapability::add_host_reset_callback`]; host hooks survive program
//! swaps while script hooks are dropped by the lifecycle reset.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use rhai::{Engine, FnPtr};

use crate::host::Shell;

use super::{Capability, ScriptCallback, ScriptEnv};

#[derive(Clone)]
enum ResetHook {
    Script(ScriptCallback),
    Host(Rc<dyn Fn()>),
}

impl ResetHook {
    fn call(&self) {
        match self {
            Self::Script(callback) => callback.call(()),
            Self::Host(hook) => hook(),
        }
    }
}

pub struct AppCapability {
    shell: Rc<dyn Shell>,
    env: Rc<ScriptEnv>,
    hooks: Rc<RefCell<Vec<ResetHook>>>,
    broadcasting: Rc<Cell<bool>>,
}

impl AppCapability {
    pub fn new(shell: Rc<dyn Shell>, env: Rc<ScriptEnv>) -> Self {
        Self {
            shell,
            env,
            hooks: Rc::new(RefCell::new(Vec::new())),
            broadcasting: Rc::new(Cell::new(false)),
        }
    }

    /// Register a host-side reset hook. Host hooks persist across runtime
    /// resets.
    pub fn add_host_reset_callback(&self, hook: impl Fn() + 'static) {
        self.hooks.borrow_mut().push(ResetHook::Host(Rc::new(hook)));
    }

    /// Invoke every registered reset hook once. Re-entrant broadcasts are
    /// swallowed.
    pub fn broadcast_reset(&self) {
        broadcast(&self.hooks, &self.broadcasting);
    }
}

fn broadcast(hooks: &Rc<RefCell<Vec<ResetHook>>>, broadcasting: &Rc<Cell<bool>>) {
    if broadcasting.replace(true) {
        return;
    }
    // Snapshot so hooks registered during the broadcast wait for the next one.
    let snapshot: Vec<ResetHook> = hooks.borrow().clone();
    for hook in snapshot {
        hook.call();
    }
    broadcasting.set(false);
}

impl Capability for AppCapability {
    fn name(&self) -> &'static str {
        "app"
    }

    fn install(&self, engine: &mut Engine) {
        let shell = Rc::clone(&self.shell);
        engine.register_fn("app_toggle_fullscreen", move || {
            shell.toggle_fullscreen();
        });

        let shell = Rc::clone(&self.shell);
        engine.register_fn("app_get_idle_time", move || -> f64 {
            shell.idle_seconds()
        });

        let hooks = Rc::clone(&self.hooks);
        let env = Rc::clone(&self.env);
        engine.register_fn("app_add_reset_callback", move |callback: FnPtr| {
            let callback = ScriptCallback::new(Rc::clone(&env), callback);
            hooks.borrow_mut().push(ResetHook::Script(callback));
        });

        let hooks = Rc::clone(&self.hooks);
        let broadcasting = Rc::clone(&self.broadcasting);
        engine.register_fn("app_reset", move || {
            broadcast(&hooks, &broadcasting);
        });
    }

    fn namespace(&self) -> String {
        r#"#{
    toggleFullscreen: || app_toggle_fullscreen(),
    getIdleTime: || app_get_idle_time(),
    addResetCallback: |callback| app_add_reset_callback(callback),
    reset: || app_reset()
}"#
        .to_string()
    }

    fn reset(&self) {
        // Script hooks belong to the program being torn down; host hooks
        // belong to the embedding application and stay.
        self.hooks
            .borrow_mut()
            .retain(|hook| matches!(hook, ResetHook::Host(_)));
        self.broadcasting.set(false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    struct NullShell;

    impl Shell for NullShell {
        fn toggle_fullscreen(&self) {}
        fn idle_seconds(&self) -> f64 {
            0.0
        }
        fn open_url(&self, _url: &str) {}
        fn variable_id(&self, _name: &str) -> Option<String> {
            None
        }
    }

    fn capability() -> AppCapability {
        AppCapability::new(Rc::new(NullShell), ScriptEnv::new())
    }

    #[test]
    fn test_broadcast_calls_each_hook_once() {
        let app = capability();
        let count = Rc::new(Cell::new(0));

        let inner = Rc::clone(&count);
        app.add_host_reset_callback(move || inner.set(inner.get() + 1));

        app.broadcast_reset();
        assert_eq!(count.get(), 1);

        app.broadcast_reset();
        assert_eq!(count.get(), 2);
    }

    #[test]
    fn test_reentrant_broadcast_does_not_recurse() {
        let app = Rc::new(capability());
        let count = Rc::new(Cell::new(0));

        let inner_app = Rc::clone(&app);
        let inner = Rc::clone(&count);
        app.add_host_reset_callback(move || {
            inner.set(inner.get() + 1);
            inner_app.broadcast_reset(); // must be swallowed
        });

        app.broadcast_reset();
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn test_lifecycle_reset_keeps_host_hooks() {
        let app = capability();
        let count = Rc::new(Cell::new(0));

        let inner = Rc::clone(&count);
        app.add_host_reset_callback(move || inner.set(inner.get() + 1));

        app.reset();
        app.broadcast_reset();
        assert_eq!(count.get(), 1);
    }
}
