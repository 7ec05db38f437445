//! Links capability - trigger listeners, auto-highlight, scenario re-binding.
//!
//! `links.addEventListener(refs, eventType, callback)` resolves each trigger
//! reference to its current DOM anchors and binds the callback on every one.
//! The (reference, eventType, callback) tuple is retained: when the active
//! scenario changes, the new DOM may contain different anchors for the same
//! reference, so all bindings are detached and re-attached one tick after the
//! change (the new scenario's DOM must exist first). Re-binding is
//! idempotent; with no DOM change it yields the same net listener set.
//!
//! Pointer-activation events also swap the anchor's cursor to `pointer` so
//! the element reads as interactive, restoring the original style on
//! teardown.
//!
//! `links.autoHighlight(ref, from, to)` owns a cuepoint that toggles a
//! shared marker class on the reference's anchors while playback is inside
//! the window.

use std::cell::RefCell;
use std::rc::Rc;

use rhai::{Dynamic, Engine, FnPtr};
use spark_signals::effect;

use crate::host::{
    CuepointHandler, CuepointScheduler, CuepointSpec, Dom, Shell, Stage,
};
use crate::runtime::TickQueue;
use crate::types::{AnchorId, CuepointId, ListenerId, TriggerRef};

use super::{Capability, ScriptCallback, ScriptEnv, opt_seconds, ref_strings};

/// Marker class toggled by auto-highlight windows.
pub const HIGHLIGHT_CLASS: &str = "highlighted";

/// Cursor style applied to anchors with a pointer-activation listener.
const POINTER_CURSOR: &str = "pointer";

/// Event types that make an anchor read as clickable.
const POINTER_EVENTS: &[&str] = &["click", "pointerdown", "pointerup"];

// =============================================================================
// Bookkeeping
// =============================================================================

/// One live attachment of a binding to a concrete anchor.
struct Attached {
    anchor: AnchorId,
    listener: ListenerId,
    /// `Some(previous)` when the cursor was swapped; restored on detach.
    saved_cursor: Option<Option<String>>,
}

/// A retained (reference, eventType, callback) registration, replayed on
/// every scenario change.
struct Binding {
    reference: String,
    event: String,
    callback: Rc<dyn Fn()>,
    attached: Vec<Attached>,
}

struct Highlight {
    reference: String,
    from: Option<f64>,
    to: Option<f64>,
    cuepoint: CuepointId,
}

#[derive(Default)]
struct LinksState {
    bindings: Vec<Binding>,
    highlights: Vec<Highlight>,
}

pub struct LinksCapability {
    dom: Rc<dyn Dom>,
    stage: Rc<dyn Stage>,
    shell: Rc<dyn Shell>,
    scheduler: Rc<dyn CuepointScheduler>,
    env: Rc<ScriptEnv>,
    queue: Rc<TickQueue>,
    state: Rc<RefCell<LinksState>>,
    /// Stop function of the scenario-change effect, present while connected.
    unsubscribe: Rc<RefCell<Option<Box<dyn FnOnce()>>>>,
}

impl LinksCapability {
    pub fn new(
        dom: Rc<dyn Dom>,
        stage: Rc<dyn Stage>,
        shell: Rc<dyn Shell>,
        scheduler: Rc<dyn CuepointScheduler>,
        env: Rc<ScriptEnv>,
        queue: Rc<TickQueue>,
    ) -> Self {
        Self {
            dom,
            stage,
            shell,
            scheduler,
            env,
            queue,
            state: Rc::new(RefCell::new(LinksState::default())),
            unsubscribe: Rc::new(RefCell::new(None)),
        }
    }

    /// Number of live anchor listeners. Mostly useful for leak assertions.
    pub fn listener_count(&self) -> usize {
        self.state
            .borrow()
            .bindings
            .iter()
            .map(|binding| binding.attached.len())
            .sum()
    }
}

/// Resolve a trigger reference to its current DOM anchors. A behavior
/// trigger may match several anchors (repeated link text); a component
/// reference matches its single rendered element.
fn resolve_anchors(dom: &Rc<dyn Dom>, reference: &str) -> Vec<AnchorId> {
    match TriggerRef::parse(reference) {
        Some(TriggerRef::BehaviorTrigger { id }) => dom.trigger_anchors(&id),
        Some(TriggerRef::Component { kind, id }) => {
            dom.component_anchor(&kind, &id).into_iter().collect()
        }
        None => Vec::new(),
    }
}

fn attach(dom: &Rc<dyn Dom>, binding: &mut Binding) {
    let pointer = POINTER_EVENTS.contains(&binding.event.as_str());
    for anchor in resolve_anchors(dom, &binding.reference) {
        let callback = Rc::clone(&binding.callback);
        let listener = dom.add_listener(anchor, &binding.event, callback);
        let saved_cursor = pointer.then(|| {
            let previous = dom.cursor(anchor);
            dom.set_cursor(anchor, Some(POINTER_CURSOR));
            previous
        });
        binding.attached.push(Attached {
            anchor,
            listener,
            saved_cursor,
        });
    }
}

fn detach(dom: &Rc<dyn Dom>, binding: &mut Binding) {
    for attached in binding.attached.drain(..) {
        dom.remove_listener(attached.listener);
        if let Some(previous) = attached.saved_cursor {
            dom.set_cursor(attached.anchor, previous.as_deref());
        }
    }
}

/// Tear down and re-create every binding and highlight against the current
/// DOM. Safe to run when nothing changed.
fn rebind_all(
    dom: &Rc<dyn Dom>,
    scheduler: &Rc<dyn CuepointScheduler>,
    state: &Rc<RefCell<LinksState>>,
) {
    let mut state = state.borrow_mut();
    for binding in &mut state.bindings {
        detach(dom, binding);
        attach(dom, binding);
    }
    for highlight in &mut state.highlights {
        scheduler.remove(highlight.cuepoint);
        highlight.cuepoint = scheduler.add_cuepoint(CuepointSpec::new(
            highlight.from,
            highlight.to,
            highlight_hooks(dom, &highlight.reference),
        ));
    }
}

// =============================================================================
// Auto-highlight
// =============================================================================

struct HighlightHooks {
    dom: Rc<dyn Dom>,
    reference: String,
}

impl HighlightHooks {
    /// Anchors are resolved at hook-fire time, never cached.
    fn set_class(&self, present: bool) {
        for anchor in resolve_anchors(&self.dom, &self.reference) {
            if present {
                self.dom.add_class(anchor, HIGHLIGHT_CLASS);
            } else {
                self.dom.remove_class(anchor, HIGHLIGHT_CLASS);
            }
        }
    }
}

impl CuepointHandler for HighlightHooks {
    fn on_start(&self) {
        self.set_class(true);
    }

    fn on_stop(&self) {
        self.set_class(false);
    }

    fn on_seekout(&self) {
        self.set_class(false);
    }

    fn on_destroy(&self) {
        self.set_class(false);
    }
}

fn highlight_hooks(dom: &Rc<dyn Dom>, reference: &str) -> Rc<dyn CuepointHandler> {
    Rc::new(HighlightHooks {
        dom: Rc::clone(dom),
        reference: reference.to_string(),
    })
}

// =============================================================================
// Capability
// =============================================================================

impl Capability for LinksCapability {
    fn name(&self) -> &'static str {
        "links"
    }

    fn install(&self, engine: &mut Engine) {
        let dom = Rc::clone(&self.dom);
        let env = Rc::clone(&self.env);
        let state = Rc::clone(&self.state);
        engine.register_fn(
            "links_add_event_listener",
            move |references: Dynamic, event_type: &str, callback: FnPtr| {
                let callback = ScriptCallback::new(Rc::clone(&env), callback);
                let callback: Rc<dyn Fn()> = Rc::new(move || callback.call(()));
                for reference in ref_strings(references) {
                    let mut binding = Binding {
                        reference,
                        event: event_type.to_string(),
                        callback: Rc::clone(&callback),
                        attached: Vec::new(),
                    };
                    attach(&dom, &mut binding);
                    state.borrow_mut().bindings.push(binding);
                }
            },
        );

        let shell = Rc::clone(&self.shell);
        engine.register_fn("links_open_url", move |url: &str| {
            shell.open_url(url);
        });

        let dom = Rc::clone(&self.dom);
        let scheduler = Rc::clone(&self.scheduler);
        let state = Rc::clone(&self.state);
        engine.register_fn(
            "links_auto_highlight",
            move |reference: &str, from: Dynamic, to: Dynamic| {
                let (from, to) = (opt_seconds(&from), opt_seconds(&to));
                let cuepoint = scheduler.add_cuepoint(CuepointSpec::new(
                    from,
                    to,
                    highlight_hooks(&dom, reference),
                ));
                state.borrow_mut().highlights.push(Highlight {
                    reference: reference.to_string(),
                    from,
                    to,
                    cuepoint,
                });
            },
        );
    }

    fn namespace(&self) -> String {
        r#"#{
    addEventListener: |references, eventType, callback| links_add_event_listener(references, eventType, callback),
    openUrl: |url| links_open_url(url),
    autoHighlight: |reference, from, to| links_auto_highlight(reference, from, to)
}"#
        .to_string()
    }

    fn connect(&self) {
        if self.unsubscribe.borrow().is_some() {
            return;
        }

        let scenario = self.stage.active_scenario();
        let dom = Rc::clone(&self.dom);
        let scheduler = Rc::clone(&self.scheduler);
        let state = Rc::clone(&self.state);
        let queue = Rc::clone(&self.queue);
        let mut first = true;
        let stop = effect(move || {
            // Track the scenario signal; the initial run only subscribes.
            let _ = scenario.get();
            if first {
                first = false;
                return;
            }
            let dom = Rc::clone(&dom);
            let scheduler = Rc::clone(&scheduler);
            let state = Rc::clone(&state);
            // One tick later the new scenario's DOM exists.
            queue.defer(move || rebind_all(&dom, &scheduler, &state));
        });
        *self.unsubscribe.borrow_mut() = Some(Box::new(stop));
    }

    fn reset(&self) {
        if let Some(stop) = self.unsubscribe.borrow_mut().take() {
            stop();
        }
        let mut state = self.state.borrow_mut();
        for binding in &mut state.bindings {
            detach(&self.dom, binding);
        }
        state.bindings.clear();
        let highlights = std::mem::take(&mut state.highlights);
        drop(state);
        // Destroy hooks fire outside the state borrow.
        for highlight in highlights {
            self.scheduler.remove(highlight.cuepoint);
        }
    }
}
