//! Reactivity capability - reactive values and watch effects for scripts.
//!
//! Built on spark-signals. `reactive.value(initial)` allocates a reactive
//! cell and returns its handle; `reactive.get`/`reactive.set` read and write
//! it with dependency tracking; `reactive.watchEffect(callback)` re-invokes
//! the callback whenever a reactive value it read changes. Re-runs are
//! coalesced: a dependency write only marks the watcher, and the callback
//! runs once on the host's next tick, after the write (and any writes
//! batched with it) completes.
//!
//! Values are primitives so change detection stays well-defined.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use rhai::{Dynamic, Engine, FnPtr};
use spark_signals::{Signal, effect, signal};

use crate::runtime::TickQueue;

use super::{Capability, ScriptCallback, ScriptEnv};

// =============================================================================
// Script values
// =============================================================================

/// A primitive script value held in a reactive cell.
#[derive(Clone, Debug, PartialEq)]
pub enum ScriptValue {
    Unit,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl ScriptValue {
    pub fn from_dynamic(value: Dynamic) -> Self {
        if let Ok(b) = value.as_bool() {
            Self::Bool(b)
        } else if let Ok(i) = value.as_int() {
            Self::Int(i)
        } else if let Ok(f) = value.as_float() {
            Self::Float(f)
        } else if let Ok(s) = value.into_string() {
            Self::Str(s)
        } else {
            Self::Unit
        }
    }

    pub fn to_dynamic(&self) -> Dynamic {
        match self {
            Self::Unit => Dynamic::UNIT,
            Self::Bool(b) => Dynamic::from(*b),
            Self::Int(i) => Dynamic::from(*i),
            Self::Float(f) => Dynamic::from(*f),
            Self::Str(s) => Dynamic::from(s.clone()),
        }
    }
}

// =============================================================================
// Capability
// =============================================================================

/// The stop function of a watcher's currently installed effect. Empty
/// while the watcher is between effects (torn down, or mid-respawn).
type StopSlot = Rc<RefCell<Option<Box<dyn FnOnce()>>>>;

pub struct ReactiveCapability {
    env: Rc<ScriptEnv>,
    queue: Rc<TickQueue>,
    values: Rc<RefCell<Vec<Signal<ScriptValue>>>>,
    watchers: Rc<RefCell<Vec<StopSlot>>>,
}

impl ReactiveCapability {
    pub fn new(env: Rc<ScriptEnv>, queue: Rc<TickQueue>) -> Self {
        Self {
            env,
            queue,
            values: Rc::new(RefCell::new(Vec::new())),
            watchers: Rc::new(RefCell::new(Vec::new())),
        }
    }

    /// Number of live watch effects. Mostly useful for leak assertions.
    pub fn watcher_count(&self) -> usize {
        self.watchers.borrow().len()
    }
}

fn add_watcher(watchers: &Rc<RefCell<Vec<StopSlot>>>, queue: &Rc<TickQueue>, run: Rc<dyn Fn()>) {
    let slot: StopSlot = Rc::new(RefCell::new(None));
    spawn_watcher(Rc::clone(queue), Rc::clone(&slot), run);
    watchers.borrow_mut().push(slot);
}

/// Install one effect generation for a watcher. The callback runs (tracked)
/// immediately; when a dependency later changes, the effect does not re-run
/// the callback in place. It defers a task that disposes this generation and
/// spawns the next one, so the callback runs at most once per host tick and
/// writes made inside it cannot recurse into it synchronously.
fn spawn_watcher(queue: Rc<TickQueue>, slot: StopSlot, run: Rc<dyn Fn()>) {
    let first = Cell::new(true);
    let scheduled = Rc::new(Cell::new(false));
    let stop = effect({
        let queue = Rc::clone(&queue);
        let slot = Rc::clone(&slot);
        let run = Rc::clone(&run);
        move || {
            if first.replace(false) {
                run();
                return;
            }
            if scheduled.replace(true) {
                return;
            }
            let respawn_queue = Rc::clone(&queue);
            let slot = Rc::clone(&slot);
            let run = Rc::clone(&run);
            queue.defer(move || {
                let stop = slot.borrow_mut().take();
                match stop {
                    // Torn down before the tick arrived.
                    None => {}
                    Some(stop) => {
                        stop();
                        spawn_watcher(respawn_queue, slot, run);
                    }
                }
            });
        }
    });
    *slot.borrow_mut() = Some(Box::new(stop));
}

impl Capability for ReactiveCapability {
    fn name(&self) -> &'static str {
        "reactive"
    }

    fn install(&self, engine: &mut Engine) {
        let values = Rc::clone(&self.values);
        engine.register_fn("reactive_value", move |initial: Dynamic| -> i64 {
            let mut values = values.borrow_mut();
            values.push(signal(ScriptValue::from_dynamic(initial)));
            (values.len() - 1) as i64
        });

        let values = Rc::clone(&self.values);
        engine.register_fn("reactive_get", move |handle: i64| -> Dynamic {
            // Cloning the signal handle first keeps the registry borrow out
            // of the tracked read.
            let cell = usize::try_from(handle)
                .ok()
                .and_then(|index| values.borrow().get(index).cloned());
            match cell {
                Some(cell) => cell.get().to_dynamic(),
                None => Dynamic::UNIT,
            }
        });

        let values = Rc::clone(&self.values);
        engine.register_fn("reactive_set", move |handle: i64, value: Dynamic| {
            let cell = usize::try_from(handle)
                .ok()
                .and_then(|index| values.borrow().get(index).cloned());
            if let Some(cell) = cell {
                cell.set(ScriptValue::from_dynamic(value));
            }
        });

        let env = Rc::clone(&self.env);
        let queue = Rc::clone(&self.queue);
        let watchers = Rc::clone(&self.watchers);
        engine.register_fn("reactive_watch", move |callback: FnPtr| {
            let callback = ScriptCallback::new(Rc::clone(&env), callback);
            add_watcher(&watchers, &queue, Rc::new(move || callback.call(())));
        });
    }

    fn namespace(&self) -> String {
        r#"#{
    value: |initial| reactive_value(initial),
    get: |handle| reactive_get(handle),
    set: |handle, value| reactive_set(handle, value),
    watchEffect: |callback| reactive_watch(callback)
}"#
        .to_string()
    }

    fn reset(&self) {
        for slot in self.watchers.borrow_mut().drain(..) {
            let stop = slot.borrow_mut().take();
            if let Some(stop) = stop {
                stop();
            }
        }
        self.values.borrow_mut().clear();
    }
}
