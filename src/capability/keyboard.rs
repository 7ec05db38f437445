//! Keyboard capability - key listeners at the document root.
//!
//! `keyboard.addEventListener(key, eventType, callback)` binds a listener
//! on the host's root element. The script callback is wrapped so it only
//! fires for the named key (or for any key with the `"*"` wildcard), and a
//! match suppresses the host's default handling of the event.

use std::cell::RefCell;
use std::rc::Rc;

use rhai::{Engine, FnPtr};

use crate::host::{Dom, KeyEvent};
use crate::types::ListenerId;

use super::{Capability, ScriptCallback, ScriptEnv};

/// Wildcard key name matching every key.
pub const ANY_KEY: &str = "*";

pub struct KeyboardCapability {
    dom: Rc<dyn Dom>,
    env: Rc<ScriptEnv>,
    listeners: Rc<RefCell<Vec<ListenerId>>>,
}

impl KeyboardCapability {
    pub fn new(dom: Rc<dyn Dom>, env: Rc<ScriptEnv>) -> Self {
        Self {
            dom,
            env,
            listeners: Rc::new(RefCell::new(Vec::new())),
        }
    }

    /// Number of live root listeners. Mostly useful for leak assertions.
    pub fn listener_count(&self) -> usize {
        self.listeners.borrow().len()
    }
}

fn wrap(key: String, callback: ScriptCallback) -> Rc<dyn Fn(&KeyEvent) -> bool> {
    Rc::new(move |event: &KeyEvent| {
        if key != ANY_KEY && event.key != key {
            return false;
        }
        callback.call(());
        true // suppress default handling for the matched key
    })
}

impl Capability for KeyboardCapability {
    fn name(&self) -> &'static str {
        "keyboard"
    }

    fn install(&self, engine: &mut Engine) {
        let dom = Rc::clone(&self.dom);
        let env = Rc::clone(&self.env);
        let listeners = Rc::clone(&self.listeners);
        engine.register_fn(
            "keyboard_add_event_listener",
            move |key: &str, event_type: &str, callback: FnPtr| {
                let callback = ScriptCallback::new(Rc::clone(&env), callback);
                let id = dom.add_key_listener(event_type, wrap(key.to_string(), callback));
                listeners.borrow_mut().push(id);
            },
        );
    }

    fn namespace(&self) -> String {
        r#"#{
    addEventListener: |key, eventType, callback| keyboard_add_event_listener(key, eventType, callback)
}"#
        .to_string()
    }

    fn reset(&self) {
        for id in self.listeners.borrow_mut().drain(..) {
            self.dom.remove_key_listener(id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::Modifiers;

    #[test]
    fn test_wrap_filters_by_key() {
        // The wrapped closure itself, without a script engine behind it:
        // a callback over a dead ScriptEnv is a no-op, but the match result
        // still decides default suppression.
        let env = ScriptEnv::new();
        let callback = ScriptCallback::new(env, FnPtr::new("missing").unwrap());

        let wrapped = wrap("Enter".to_string(), callback.clone());
        assert!(wrapped(&KeyEvent::new("Enter")));
        assert!(!wrapped(&KeyEvent::new("a")));
        // Matching is by key name; modifiers do not enter into it.
        assert!(wrapped(&KeyEvent::with_modifiers("Enter", Modifiers::SHIFT)));

        let any = wrap(ANY_KEY.to_string(), callback);
        assert!(any(&KeyEvent::new("a")));
        assert!(any(&KeyEvent::with_modifiers("Escape", Modifiers::CTRL | Modifiers::ALT)));
    }

    #[test]
    fn test_wildcard_constant() {
        // Guards the script-facing contract.
        assert_eq!(ANY_KEY, "*");
    }
}
