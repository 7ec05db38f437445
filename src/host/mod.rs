//! Host collaborator interfaces.
//!
//! The runtime never reaches into the embedding application by name. Every
//! external dependency (player/component registry, rendered document, media
//! transport, application shell, cuepoint scheduler) is injected at
//! construction time as a trait object, bundled in [`HostServices`].
//!
//! Observable host state is exposed as `spark_signals::Signal` handles so
//! capability modules can read it directly and subscribe to changes with
//! `effect`.
//!
//! # Event-loop contract
//!
//! The runtime is single-threaded and cooperative. The host drives it:
//!
//! - media position ticks go to [`cuepoints::TickScheduler::on_time_update`],
//! - explicit seeks (from the runtime's own `setTime` or from the host's UI)
//!   go to [`cuepoints::TickScheduler::on_seek`],
//! - once per rendering tick the host calls `Runtime::tick` so deferred work
//!   (scenario-change re-binding) runs after the new DOM exists.

use std::rc::Rc;

use bitflags::bitflags;
use rhai::Dynamic;
use spark_signals::Signal;

use crate::types::{AnchorId, ComponentId, ListenerId};

pub mod cuepoints;

pub use cuepoints::{
    CuepointHandler, CuepointHooks, CuepointScheduler, CuepointSpec, TickScheduler,
};

// =============================================================================
// Keyboard events
// =============================================================================

bitflags! {
    /// Modifier keys held during a keyboard event.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct Modifiers: u8 {
        const CTRL = 1;
        const ALT = 1 << 1;
        const SHIFT = 1 << 2;
        const META = 1 << 3;
    }
}

/// A keyboard event routed from the document root.
#[derive(Clone, Debug, PartialEq)]
pub struct KeyEvent {
    /// Key name (e.g. "a", "Enter", "ArrowUp").
    pub key: String,
    pub modifiers: Modifiers,
}

impl KeyEvent {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            modifiers: Modifiers::empty(),
        }
    }

    pub fn with_modifiers(key: impl Into<String>, modifiers: Modifiers) -> Self {
        Self {
            key: key.into(),
            modifiers,
        }
    }
}

// =============================================================================
// Player / component registry
// =============================================================================

/// The player's component registry and scenario state.
pub trait Stage {
    /// Resolve a live component instance by its type and id.
    fn get_component(&self, kind: &str, id: &str) -> Option<ComponentId>;

    /// All live components of the given type.
    fn get_components_by_type(&self, kind: &str) -> Vec<ComponentId>;

    /// Read a component property (effective value, overrides applied).
    fn get_property(&self, component: ComponentId, name: &str) -> Option<Dynamic>;

    /// Apply a named property override under `(key, priority)`. Overrides are
    /// non-destructive patches layered over the authored value and are
    /// distinguishable by their key.
    fn set_override(
        &self,
        component: ComponentId,
        key: &str,
        name: &str,
        value: Dynamic,
        priority: i32,
    );

    /// Clear every override carrying `key` from one component, or from all
    /// components when `component` is `None`.
    fn clear_overrides(&self, component: Option<ComponentId>, key: &str);

    /// The active scenario id, observable.
    fn active_scenario(&self) -> Signal<Option<String>>;

    /// Switch the active scenario.
    fn set_active_scenario(&self, id: &str);

    /// Active page of a block component, 0-based.
    fn block_active_page(&self, component: ComponentId) -> Option<usize>;

    /// Set the active page of a block component, 0-based.
    fn set_block_active_page(&self, component: ComponentId, page: usize);
}

// =============================================================================
// Rendered document
// =============================================================================

/// The rendered document containing trigger anchors and component elements.
pub trait Dom {
    /// All anchors whose trigger attribute equals `trigger_id`. The same
    /// link text may be rendered more than once.
    fn trigger_anchors(&self, trigger_id: &str) -> Vec<AnchorId>;

    /// The single rendered element for a component instance, if any.
    fn component_anchor(&self, kind: &str, id: &str) -> Option<AnchorId>;

    fn add_listener(
        &self,
        anchor: AnchorId,
        event: &str,
        callback: Rc<dyn Fn()>,
    ) -> ListenerId;

    fn remove_listener(&self, listener: ListenerId);

    /// Current inline cursor style of an anchor, if any.
    fn cursor(&self, anchor: AnchorId) -> Option<String>;

    /// Set or clear the inline cursor style of an anchor.
    fn set_cursor(&self, anchor: AnchorId, cursor: Option<&str>);

    fn add_class(&self, anchor: AnchorId, class: &str);

    fn remove_class(&self, anchor: AnchorId, class: &str);

    /// Attach a keyboard listener at the document root. The callback returns
    /// `true` to suppress the host's default handling of the event.
    fn add_key_listener(
        &self,
        event: &str,
        callback: Rc<dyn Fn(&KeyEvent) -> bool>,
    ) -> ListenerId;

    fn remove_key_listener(&self, listener: ListenerId);
}

// =============================================================================
// Media transport
// =============================================================================

/// The media transport driving the presentation timeline.
pub trait Transport {
    fn play(&self);
    fn pause(&self);
    fn stop(&self);

    /// Seek to an absolute position in seconds. Implementations must route
    /// the resulting position change through the scheduler's `on_seek`, not
    /// `on_time_update`.
    fn seek_to(&self, time: f64);

    fn time(&self) -> Signal<f64>;
    fn duration(&self) -> Signal<f64>;
    fn playing(&self) -> Signal<bool>;
    fn playback_rate(&self) -> Signal<f64>;

    fn set_playback_rate(&self, rate: f64);
}

// =============================================================================
// Application shell
// =============================================================================

/// Application-level services outside the player surface.
pub trait Shell {
    fn toggle_fullscreen(&self);

    /// Seconds since the last user interaction.
    fn idle_seconds(&self) -> f64;

    fn open_url(&self, url: &str);

    /// Translate a user-facing variable name to its store identifier.
    fn variable_id(&self, name: &str) -> Option<String>;
}

// =============================================================================
// Bundle
// =============================================================================

/// Everything a [`Runtime`](crate::runtime::Runtime) needs from its host.
#[derive(Clone)]
pub struct HostServices {
    pub stage: Rc<dyn Stage>,
    pub dom: Rc<dyn Dom>,
    pub transport: Rc<dyn Transport>,
    pub shell: Rc<dyn Shell>,
    pub scheduler: Rc<dyn CuepointScheduler>,
}
