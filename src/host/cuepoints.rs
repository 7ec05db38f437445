//! Cuepoints - time ranges on the media timeline with lifecycle callbacks.
//!
//! A cuepoint spans `[start, end]` (either bound may be open) and owns a
//! [`CuepointHandler`] with four named hooks:
//!
//! - `on_start` - the playback position entered the window
//! - `on_stop` - the position crossed the end bound during forward playback
//! - `on_seekout` - the position left the window because of a seek
//! - `on_destroy` - the cuepoint was removed
//!
//! [`TickScheduler`] is the in-process scheduler. It distinguishes natural
//! completion from seek-exit structurally: `on_time_update` is the only
//! entry point that may emit `on_stop`, and `on_seek` is the only one that
//! may emit `on_seekout`. The host wires its media transport accordingly
//! (position ticks to one, explicit seeks to the other).
//!
//! At most one *global* cuepoint exists at a time; it backs excerpt playback
//! in the media capability. Regular cuepoints (auto-highlight windows) are
//! independent and may coexist.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use crate::types::CuepointId;

// =============================================================================
// Handler contract
// =============================================================================

/// Lifecycle hooks of one cuepoint. All methods default to no-ops, so an
/// implementation only names the transitions it cares about.
pub trait CuepointHandler {
    fn on_start(&self) {}
    fn on_stop(&self) {}
    fn on_seekout(&self) {}
    fn on_destroy(&self) {}
}

/// Closure-based [`CuepointHandler`], built up hook by hook.
///
/// ```ignore
/// let hooks = CuepointHooks::new()
///     .on_start(|| println!("entered"))
///     .on_stop(|| println!("finished"));
/// ```
#[derive(Default)]
pub struct CuepointHooks {
    start: Option<Box<dyn Fn()>>,
    stop: Option<Box<dyn Fn()>>,
    seekout: Option<Box<dyn Fn()>>,
    destroy: Option<Box<dyn Fn()>>,
}

impl CuepointHooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_start(mut self, hook: impl Fn() + 'static) -> Self {
        self.start = Some(Box::new(hook));
        self
    }

    pub fn on_stop(mut self, hook: impl Fn() + 'static) -> Self {
        self.stop = Some(Box::new(hook));
        self
    }

    pub fn on_seekout(mut self, hook: impl Fn() + 'static) -> Self {
        self.seekout = Some(Box::new(hook));
        self
    }

    pub fn on_destroy(mut self, hook: impl Fn() + 'static) -> Self {
        self.destroy = Some(Box::new(hook));
        self
    }
}

impl CuepointHandler for CuepointHooks {
    fn on_start(&self) {
        if let Some(hook) = &self.start {
            hook();
        }
    }

    fn on_stop(&self) {
        if let Some(hook) = &self.stop {
            hook();
        }
    }

    fn on_seekout(&self) {
        if let Some(hook) = &self.seekout {
            hook();
        }
    }

    fn on_destroy(&self) {
        if let Some(hook) = &self.destroy {
            hook();
        }
    }
}

/// A cuepoint registration: the time window plus its handler.
pub struct CuepointSpec {
    /// Window start in seconds; `None` means unbounded below.
    pub start: Option<f64>,
    /// Window end in seconds; `None` means unbounded above.
    pub end: Option<f64>,
    pub handler: Rc<dyn CuepointHandler>,
}

impl CuepointSpec {
    pub fn new(start: Option<f64>, end: Option<f64>, handler: Rc<dyn CuepointHandler>) -> Self {
        Self { start, end, handler }
    }
}

// =============================================================================
// Scheduler contract
// =============================================================================

/// Registration surface of the cuepoint engine, as consumed by capability
/// modules. Removal is idempotent: removing an unknown id is a no-op.
pub trait CuepointScheduler {
    /// Register an independent cuepoint.
    fn add_cuepoint(&self, spec: CuepointSpec) -> CuepointId;

    /// Install the global (excerpt) cuepoint, replacing and destroying any
    /// previous one that is still registered.
    fn set_global_cuepoint(&self, spec: CuepointSpec) -> CuepointId;

    /// The currently installed global cuepoint, if any.
    fn global_cuepoint(&self) -> Option<CuepointId>;

    /// Remove a cuepoint and fire its `on_destroy`.
    fn remove(&self, id: CuepointId);
}

// =============================================================================
// Tick-driven scheduler
// =============================================================================

struct Entry {
    start: Option<f64>,
    end: Option<f64>,
    handler: Rc<dyn CuepointHandler>,
    inside: bool,
}

impl Entry {
    fn contains(&self, time: f64) -> bool {
        self.start.is_none_or(|s| time >= s) && self.end.is_none_or(|e| time <= e)
    }
}

/// Cuepoint engine driven by the host event loop.
///
/// The host forwards every media position change to exactly one of the two
/// entry points: [`on_time_update`](Self::on_time_update) for normal playback
/// ticks, [`on_seek`](Self::on_seek) for explicit seeks. Handlers are
/// dispatched after the internal registry borrow is released, so a handler
/// may add or remove cuepoints (including itself).
#[derive(Default)]
pub struct TickScheduler {
    entries: RefCell<HashMap<CuepointId, Entry>>,
    global: Cell<Option<CuepointId>>,
    next_id: Cell<usize>,
}

impl TickScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    fn insert(&self, spec: CuepointSpec) -> CuepointId {
        let id = CuepointId(self.next_id.get());
        self.next_id.set(id.0 + 1);
        self.entries.borrow_mut().insert(
            id,
            Entry {
                start: spec.start,
                end: spec.end,
                handler: spec.handler,
                inside: false,
            },
        );
        id
    }

    /// Collect window transitions for the new position. `seek` selects which
    /// exit hook the transition maps to.
    fn transitions(&self, time: f64, seek: bool) -> (Vec<Rc<dyn CuepointHandler>>, Vec<Rc<dyn CuepointHandler>>) {
        let mut exits = Vec::new();
        let mut entries_fired = Vec::new();

        let mut entries = self.entries.borrow_mut();
        for entry in entries.values_mut() {
            let inside = entry.contains(time);
            if inside && !entry.inside {
                entry.inside = true;
                entries_fired.push(Rc::clone(&entry.handler));
            } else if !inside && entry.inside {
                entry.inside = false;
                if seek {
                    exits.push(Rc::clone(&entry.handler));
                } else if entry.end.is_some_and(|e| time > e) {
                    // Forward playback past the end bound: natural completion.
                    // A backward move without a seek notification fires
                    // nothing; positions only move backward through seeks.
                    exits.push(Rc::clone(&entry.handler));
                }
            }
        }
        (exits, entries_fired)
    }

    /// Feed a normal playback position tick. May emit `on_stop` (forward
    /// crossing of an end bound) and `on_start` (window entered).
    pub fn on_time_update(&self, time: f64) {
        let (stops, starts) = self.transitions(time, false);
        for handler in stops {
            handler.on_stop();
        }
        for handler in starts {
            handler.on_start();
        }
    }

    /// Feed an explicit seek. May emit `on_seekout` (window left) and
    /// `on_start` (window entered by the seek).
    pub fn on_seek(&self, time: f64) {
        let (seekouts, starts) = self.transitions(time, true);
        for handler in seekouts {
            handler.on_seekout();
        }
        for handler in starts {
            handler.on_start();
        }
    }

    /// Number of live cuepoints. Mostly useful for leak assertions.
    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }
}

impl CuepointScheduler for TickScheduler {
    fn add_cuepoint(&self, spec: CuepointSpec) -> CuepointId {
        self.insert(spec)
    }

    fn set_global_cuepoint(&self, spec: CuepointSpec) -> CuepointId {
        if let Some(previous) = self.global.take() {
            self.remove(previous);
        }
        let id = self.insert(spec);
        self.global.set(Some(id));
        id
    }

    fn global_cuepoint(&self) -> Option<CuepointId> {
        self.global.get()
    }

    fn remove(&self, id: CuepointId) {
        let removed = self.entries.borrow_mut().remove(&id);
        if self.global.get() == Some(id) {
            self.global.set(None);
        }
        // Dispatch after the borrow is released.
        if let Some(entry) = removed {
            entry.handler.on_destroy();
        }
    }
}
