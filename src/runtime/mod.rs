//! Runtime controller - program lifecycle, sandbox assembly, deferred work.
//!
//! One [`Runtime`] runs at most one behavior program at a time:
//!
//! - [`Runtime::exec`] resets unconditionally, then compiles and runs the
//!   program against the sandbox prelude. Failures are logged, never
//!   propagated: a compile error leaves the runtime with no program
//!   running; an execution error keeps whatever the program registered
//!   before failing, until the next reset.
//! - [`Runtime::reset`] tears every capability down in a fixed order and is
//!   safe to call repeatedly or before any program ever ran.
//! - [`Runtime::tick`] drains the one-tick deferral queue; the host calls
//!   it once per rendering tick so scenario-change re-binding happens after
//!   the new scenario's DOM exists.
//!
//! The sandbox prelude binds each capability's namespace to its fixed name
//! (`app`, `components`, `keyboard`, `links`, `media`, `variables`,
//! `reactive`) ahead of the program text. The prelude entries take fixed
//! argument lists; the program compiler passes `()` for omitted optional
//! arguments (`media.play(5.0, 15.0, ())`).

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use rhai::{Dynamic, Engine, Scope};

use crate::capability::{
    AppCapability, Capability, ComponentsCapability, KeyboardCapability, LinksCapability,
    MediaCapability, ReactiveCapability, ScriptEnv, VariablesCapability,
};
use crate::error::ScriptError;
use crate::host::HostServices;

// =============================================================================
// One-tick deferral queue
// =============================================================================

/// Work postponed to the host's next rendering tick.
#[derive(Default)]
pub struct TickQueue {
    tasks: RefCell<Vec<Box<dyn FnOnce()>>>,
}

impl TickQueue {
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    pub fn defer(&self, task: impl FnOnce() + 'static) {
        self.tasks.borrow_mut().push(Box::new(task));
    }

    /// Run the tasks queued before this call. Tasks deferred by a running
    /// task wait for the next call, so deferred work (watcher re-runs,
    /// listener re-binding) happens at most once per host tick.
    pub fn run(&self) {
        let batch = std::mem::take(&mut *self.tasks.borrow_mut());
        for task in batch {
            task();
        }
    }

    /// Drop queued work without running it.
    pub fn clear(&self) {
        self.tasks.borrow_mut().clear();
    }

    pub fn pending(&self) -> usize {
        self.tasks.borrow().len()
    }
}

// =============================================================================
// Sandbox
// =============================================================================

/// The assembled capability record. Field names are the script-facing
/// namespace identifiers, fixed at compile time.
pub struct Sandbox {
    pub app: Rc<AppCapability>,
    pub components: Rc<ComponentsCapability>,
    pub keyboard: Rc<KeyboardCapability>,
    pub links: Rc<LinksCapability>,
    pub media: Rc<MediaCapability>,
    pub variables: Rc<VariablesCapability>,
    pub reactive: Rc<ReactiveCapability>,
}

impl Sandbox {
    /// Every capability, in the fixed lifecycle order. Teardown iterates
    /// this same order so side effects unwind deterministically.
    fn all(&self) -> [&dyn Capability; 7] {
        [
            self.app.as_ref(),
            self.components.as_ref(),
            self.keyboard.as_ref(),
            self.links.as_ref(),
            self.media.as_ref(),
            self.variables.as_ref(),
            self.reactive.as_ref(),
        ]
    }
}

// =============================================================================
// Runtime
// =============================================================================

pub struct Runtime {
    host: HostServices,
    env: Rc<ScriptEnv>,
    queue: Rc<TickQueue>,
    sandbox: Sandbox,
    running: Cell<bool>,
}

impl Runtime {
    pub fn new(host: HostServices) -> Self {
        let env = ScriptEnv::new();
        let queue = TickQueue::new();

        let sandbox = Sandbox {
            app: Rc::new(AppCapability::new(
                Rc::clone(&host.shell),
                Rc::clone(&env),
            )),
            components: Rc::new(ComponentsCapability::new(Rc::clone(&host.stage))),
            keyboard: Rc::new(KeyboardCapability::new(
                Rc::clone(&host.dom),
                Rc::clone(&env),
            )),
            links: Rc::new(LinksCapability::new(
                Rc::clone(&host.dom),
                Rc::clone(&host.stage),
                Rc::clone(&host.shell),
                Rc::clone(&host.scheduler),
                Rc::clone(&env),
                Rc::clone(&queue),
            )),
            media: Rc::new(MediaCapability::new(
                Rc::clone(&host.transport),
                Rc::clone(&host.scheduler),
                Rc::clone(&env),
            )),
            variables: Rc::new(VariablesCapability::new()),
            reactive: Rc::new(ReactiveCapability::new(
                Rc::clone(&env),
                Rc::clone(&queue),
            )),
        };

        let mut engine = Engine::new();
        engine.set_max_expr_depths(64, 64);
        engine.set_max_call_levels(64);
        engine.set_max_operations(100_000);
        engine.set_max_string_size(10_000);
        engine.set_max_array_size(1_000);
        engine.set_max_map_size(500);
        for capability in sandbox.all() {
            capability.install(&mut engine);
        }
        env.set_engine(engine);

        Self {
            host,
            env,
            queue,
            sandbox,
            running: Cell::new(false),
        }
    }

    /// Tear down the previous program and run `code`. An empty program
    /// just resets. Compile and execution failures are logged and do not
    /// propagate.
    pub fn exec(&self, code: &str) {
        self.reset();
        if code.trim().is_empty() {
            return;
        }
        if let Err(err) = self.try_exec(code) {
            log::error!("behavior program failed: {err}");
            if matches!(err, ScriptError::Compile(_)) {
                // Equivalent to an empty program.
                self.reset();
            }
            // An execution error keeps the effects registered before the
            // failure point; they stay live until the next reset.
        }
    }

    fn try_exec(&self, code: &str) -> Result<(), ScriptError> {
        let engine = self
            .env
            .engine()
            .expect("engine installed at construction");

        for capability in self.sandbox.all() {
            capability.connect();
        }

        let mut program = String::new();
        for capability in self.sandbox.all() {
            program.push_str(&format!(
                "let {} = {};\n",
                capability.name(),
                capability.namespace()
            ));
        }
        program.push_str(code);

        let ast = engine.compile(&program)?;
        // Callbacks retained during the run (watch effects fire inside it)
        // resolve the program through the environment, so it is published
        // before execution starts.
        self.env.set_ast(ast.clone());
        self.running.set(true);

        let mut scope = Scope::new();
        engine.run_ast_with_scope(&mut scope, &ast)?;
        log::debug!("behavior program running");
        Ok(())
    }

    /// Tear down everything the current program registered. Idempotent.
    pub fn reset(&self) {
        self.running.set(false);
        for capability in self.sandbox.all() {
            capability.reset();
        }
        self.queue.clear();
        self.env.clear_ast();
        log::debug!("behavior runtime reset");
    }

    /// Drain deferred work. Called by the host once per rendering tick.
    pub fn tick(&self) {
        self.queue.run();
    }

    /// The live sandbox, or `None` when no program is running.
    pub fn context(&self) -> Option<&Sandbox> {
        if self.running.get() {
            Some(&self.sandbox)
        } else {
            None
        }
    }

    /// Read a shared variable by its user-facing name.
    pub fn get_variable(&self, name: &str) -> Option<Dynamic> {
        let id = self.host.shell.variable_id(name)?;
        self.sandbox.variables.get(&id)
    }

    /// Write a shared variable by its user-facing name. Unresolved names
    /// are a silent no-op.
    pub fn set_variable(&self, name: &str, value: Dynamic) {
        if let Some(id) = self.host.shell.variable_id(name) {
            self.sandbox.variables.set(&id, value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_tick_queue_runs_in_order() {
        let queue = TickQueue::new();
        let order = Rc::new(RefCell::new(Vec::new()));

        let inner = Rc::clone(&order);
        queue.defer(move || inner.borrow_mut().push(1));
        let inner = Rc::clone(&order);
        queue.defer(move || inner.borrow_mut().push(2));

        queue.run();
        assert_eq!(*order.borrow(), vec![1, 2]);
        assert_eq!(queue.pending(), 0);
    }

    #[test]
    fn test_tick_queue_holds_nested_deferrals_for_the_next_run() {
        let queue = TickQueue::new();
        let count = Rc::new(Cell::new(0));

        let inner_queue = Rc::clone(&queue);
        let inner = Rc::clone(&count);
        queue.defer(move || {
            inner.set(inner.get() + 1);
            let inner = Rc::clone(&inner);
            inner_queue.defer(move || inner.set(inner.get() + 1));
        });

        queue.run();
        assert_eq!(count.get(), 1);
        assert_eq!(queue.pending(), 1);

        queue.run();
        assert_eq!(count.get(), 2);
    }

    #[test]
    fn test_tick_queue_clear_discards_work() {
        let queue = TickQueue::new();
        let count = Rc::new(Cell::new(0));

        let inner = Rc::clone(&count);
        queue.defer(move || inner.set(inner.get() + 1));
        queue.clear();
        queue.run();
        assert_eq!(count.get(), 0);
    }
}

/// End-to-end tests: real programs through `exec` against a fake host.
#[cfg(test)]
mod program_tests {
    use super::*;
    use crate::host::{
        Dom, KeyEvent, Shell, Stage, TickScheduler, Transport,
    };
    use crate::types::{AnchorId, ComponentId, ListenerId};
    use spark_signals::{Signal, signal};
    use std::cell::Cell;
    use std::collections::HashMap;

    // =========================================================================
    // Fake host
    // =========================================================================

    #[derive(Default)]
    struct FakeStage {
        components: RefCell<HashMap<(String, String), ComponentId>>,
        properties: RefCell<HashMap<(ComponentId, String), Dynamic>>,
        overrides: RefCell<Vec<(ComponentId, String, String, Dynamic, i32)>>,
        scenario: RefCell<Option<Signal<Option<String>>>>,
        pages: RefCell<HashMap<ComponentId, usize>>,
    }

    impl FakeStage {
        fn new() -> Rc<Self> {
            let stage = Self::default();
            *stage.scenario.borrow_mut() = Some(signal(None));
            Rc::new(stage)
        }

        fn add_component(&self, kind: &str, id: &str, component: ComponentId) {
            self.components
                .borrow_mut()
                .insert((kind.to_string(), id.to_string()), component);
        }

        fn set_authored(&self, component: ComponentId, name: &str, value: Dynamic) {
            self.properties
                .borrow_mut()
                .insert((component, name.to_string()), value);
        }
    }

    impl Stage for FakeStage {
        fn get_component(&self, kind: &str, id: &str) -> Option<ComponentId> {
            self.components
                .borrow()
                .get(&(kind.to_string(), id.to_string()))
                .copied()
        }

        fn get_components_by_type(&self, kind: &str) -> Vec<ComponentId> {
            self.components
                .borrow()
                .iter()
                .filter(|((k, _), _)| k == kind)
                .map(|(_, component)| *component)
                .collect()
        }

        fn get_property(&self, component: ComponentId, name: &str) -> Option<Dynamic> {
            // Overrides win over the authored value.
            let layered = self
                .overrides
                .borrow()
                .iter()
                .rev()
                .find(|(c, _, n, _, _)| *c == component && n == name)
                .map(|(_, _, _, value, _)| value.clone());
            layered.or_else(|| {
                self.properties
                    .borrow()
                    .get(&(component, name.to_string()))
                    .cloned()
            })
        }

        fn set_override(
            &self,
            component: ComponentId,
            key: &str,
            name: &str,
            value: Dynamic,
            priority: i32,
        ) {
            self.overrides.borrow_mut().push((
                component,
                key.to_string(),
                name.to_string(),
                value,
                priority,
            ));
        }

        fn clear_overrides(&self, component: Option<ComponentId>, key: &str) {
            self.overrides
                .borrow_mut()
                .retain(|(c, k, _, _, _)| k != key || component.is_some_and(|wanted| *c != wanted));
        }

        fn active_scenario(&self) -> Signal<Option<String>> {
            self.scenario.borrow().as_ref().unwrap().clone()
        }

        fn set_active_scenario(&self, id: &str) {
            self.active_scenario().set(Some(id.to_string()));
        }

        fn block_active_page(&self, component: ComponentId) -> Option<usize> {
            self.pages.borrow().get(&component).copied()
        }

        fn set_block_active_page(&self, component: ComponentId, page: usize) {
            self.pages.borrow_mut().insert(component, page);
        }
    }

    #[derive(Default)]
    struct FakeDom {
        triggers: RefCell<HashMap<String, Vec<AnchorId>>>,
        listeners: RefCell<HashMap<ListenerId, (AnchorId, String, Rc<dyn Fn()>)>>,
        key_listeners: RefCell<HashMap<ListenerId, (String, Rc<dyn Fn(&KeyEvent) -> bool>)>>,
        cursors: RefCell<HashMap<AnchorId, String>>,
        next_listener: Cell<usize>,
    }

    impl FakeDom {
        fn set_trigger(&self, id: &str, anchors: Vec<AnchorId>) {
            self.triggers.borrow_mut().insert(id.to_string(), anchors);
        }

        fn listener_count(&self) -> usize {
            self.listeners.borrow().len()
        }

        fn key_listener_count(&self) -> usize {
            self.key_listeners.borrow().len()
        }

        fn click(&self, anchor: AnchorId) {
            let callbacks: Vec<Rc<dyn Fn()>> = self
                .listeners
                .borrow()
                .values()
                .filter(|(a, e, _)| *a == anchor && e == "click")
                .map(|(_, _, callback)| Rc::clone(callback))
                .collect();
            for callback in callbacks {
                callback();
            }
        }

        fn press(&self, event: &str, key: &str) {
            let callbacks: Vec<Rc<dyn Fn(&KeyEvent) -> bool>> = self
                .key_listeners
                .borrow()
                .values()
                .filter(|(e, _)| e == event)
                .map(|(_, callback)| Rc::clone(callback))
                .collect();
            let event = KeyEvent::new(key);
            for callback in callbacks {
                callback(&event);
            }
        }
    }

    impl Dom for FakeDom {
        fn trigger_anchors(&self, trigger_id: &str) -> Vec<AnchorId> {
            self.triggers
                .borrow()
                .get(trigger_id)
                .cloned()
                .unwrap_or_default()
        }

        fn component_anchor(&self, _kind: &str, _id: &str) -> Option<AnchorId> {
            None
        }

        fn add_listener(&self, anchor: AnchorId, event: &str, callback: Rc<dyn Fn()>) -> ListenerId {
            let id = ListenerId(self.next_listener.get());
            self.next_listener.set(id.0 + 1);
            self.listeners
                .borrow_mut()
                .insert(id, (anchor, event.to_string(), callback));
            id
        }

        fn remove_listener(&self, listener: ListenerId) {
            self.listeners.borrow_mut().remove(&listener);
        }

        fn cursor(&self, anchor: AnchorId) -> Option<String> {
            self.cursors.borrow().get(&anchor).cloned()
        }

        fn set_cursor(&self, anchor: AnchorId, cursor: Option<&str>) {
            match cursor {
                Some(cursor) => {
                    self.cursors.borrow_mut().insert(anchor, cursor.to_string());
                }
                None => {
                    self.cursors.borrow_mut().remove(&anchor);
                }
            }
        }

        fn add_class(&self, _anchor: AnchorId, _class: &str) {}

        fn remove_class(&self, _anchor: AnchorId, _class: &str) {}

        fn add_key_listener(
            &self,
            event: &str,
            callback: Rc<dyn Fn(&KeyEvent) -> bool>,
        ) -> ListenerId {
            let id = ListenerId(self.next_listener.get());
            self.next_listener.set(id.0 + 1);
            self.key_listeners
                .borrow_mut()
                .insert(id, (event.to_string(), callback));
            id
        }

        fn remove_key_listener(&self, listener: ListenerId) {
            self.key_listeners.borrow_mut().remove(&listener);
        }
    }

    struct FakeTransport {
        scheduler: Rc<TickScheduler>,
        time: Signal<f64>,
        duration: Signal<f64>,
        playing: Signal<bool>,
        rate: Signal<f64>,
    }

    impl FakeTransport {
        fn new(scheduler: Rc<TickScheduler>) -> Rc<Self> {
            Rc::new(Self {
                scheduler,
                time: signal(0.0),
                duration: signal(100.0),
                playing: signal(false),
                rate: signal(1.0),
            })
        }

        fn tick(&self, time: f64) {
            self.time.set(time);
            self.scheduler.on_time_update(time);
        }
    }

    impl Transport for FakeTransport {
        fn play(&self) {
            self.playing.set(true);
        }
        fn pause(&self) {
            self.playing.set(false);
        }
        fn stop(&self) {
            self.playing.set(false);
            self.time.set(0.0);
        }
        fn seek_to(&self, time: f64) {
            self.time.set(time);
            self.scheduler.on_seek(time);
        }
        fn time(&self) -> Signal<f64> {
            self.time.clone()
        }
        fn duration(&self) -> Signal<f64> {
            self.duration.clone()
        }
        fn playing(&self) -> Signal<bool> {
            self.playing.clone()
        }
        fn playback_rate(&self) -> Signal<f64> {
            self.rate.clone()
        }
        fn set_playback_rate(&self, rate: f64) {
            self.rate.set(rate);
        }
    }

    #[derive(Default)]
    struct FakeShell {
        variable_names: RefCell<HashMap<String, String>>,
        opened: RefCell<Vec<String>>,
    }

    impl Shell for FakeShell {
        fn toggle_fullscreen(&self) {}
        fn idle_seconds(&self) -> f64 {
            0.0
        }
        fn open_url(&self, url: &str) {
            self.opened.borrow_mut().push(url.to_string());
        }
        fn variable_id(&self, name: &str) -> Option<String> {
            self.variable_names.borrow().get(name).cloned()
        }
    }

    struct Fixture {
        runtime: Runtime,
        scheduler: Rc<TickScheduler>,
        stage: Rc<FakeStage>,
        dom: Rc<FakeDom>,
        transport: Rc<FakeTransport>,
        shell: Rc<FakeShell>,
    }

    fn fixture() -> Fixture {
        let scheduler = Rc::new(TickScheduler::new());
        let stage = FakeStage::new();
        let dom = Rc::new(FakeDom::default());
        let transport = FakeTransport::new(Rc::clone(&scheduler));
        let shell = Rc::new(FakeShell::default());

        let runtime = Runtime::new(HostServices {
            stage: stage.clone(),
            dom: dom.clone(),
            transport: transport.clone(),
            shell: shell.clone(),
            scheduler: scheduler.clone(),
        });

        Fixture {
            runtime,
            scheduler,
            stage,
            dom,
            transport,
            shell,
        }
    }

    fn variable_int(fx: &Fixture, id: &str) -> Option<i64> {
        fx.runtime
            .sandbox
            .variables
            .get(id)
            .and_then(|value| value.as_int().ok())
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    #[test]
    fn test_exec_then_reset_leaves_nothing_behind() {
        let fx = fixture();
        fx.dom.set_trigger("link1", vec![AnchorId(1)]);

        fx.runtime.exec(
            r#"
            variables.set("v1", 42);
            links.addEventListener("BehaviorTrigger:link1", "click", || media.play((), (), ()));
            links.autoHighlight("BehaviorTrigger:link1", 2.0, 8.0);
            keyboard.addEventListener(" ", "keydown", || media.pause());
            media.play(0.0, 10.0, ());
            reactive.watchEffect(|| variables.set("seen", 1));
        "#,
        );
        assert!(fx.runtime.context().is_some());
        assert!(fx.dom.listener_count() > 0);
        assert_eq!(fx.runtime.sandbox.links.listener_count(), 1);
        assert_eq!(fx.runtime.sandbox.keyboard.listener_count(), 1);
        assert!(!fx.scheduler.is_empty());

        fx.runtime.reset();
        assert!(fx.runtime.context().is_none());
        assert_eq!(fx.dom.listener_count(), 0);
        assert_eq!(fx.dom.key_listener_count(), 0);
        assert_eq!(fx.runtime.sandbox.links.listener_count(), 0);
        assert_eq!(fx.runtime.sandbox.keyboard.listener_count(), 0);
        assert!(fx.scheduler.is_empty());
        assert!(fx.runtime.sandbox.variables.is_empty());
        assert_eq!(fx.runtime.sandbox.reactive.watcher_count(), 0);
    }

    #[test]
    fn test_reset_without_any_program_is_safe() {
        let fx = fixture();
        fx.runtime.reset();
        fx.runtime.reset();
        assert!(fx.runtime.context().is_none());
    }

    #[test]
    fn test_empty_program_is_a_noop_after_reset() {
        let fx = fixture();
        fx.runtime.exec("variables.set(\"v1\", 1);");
        fx.runtime.exec("   \n  ");
        assert!(fx.runtime.context().is_none());
        assert!(fx.runtime.sandbox.variables.is_empty());
    }

    #[test]
    fn test_compile_error_means_no_program_running() {
        let fx = fixture();
        fx.runtime.exec("let x = ;");
        assert!(fx.runtime.context().is_none());
        assert!(fx.scheduler.is_empty());
    }

    #[test]
    fn test_execution_error_keeps_prior_effects() {
        let fx = fixture();
        fx.dom.set_trigger("link1", vec![AnchorId(1)]);

        fx.runtime.exec(
            r#"
            links.addEventListener("BehaviorTrigger:link1", "click", || media.play((), (), ()));
            no_such_function();
            variables.set("after", 1);
        "#,
        );
        // The failing statement aborts the rest, but what ran stays live.
        assert!(fx.runtime.context().is_some());
        assert_eq!(fx.dom.listener_count(), 1);
        assert!(variable_int(&fx, "after").is_none());

        fx.dom.click(AnchorId(1));
        assert!(fx.transport.playing.get());
    }

    // =========================================================================
    // Variables
    // =========================================================================

    #[test]
    fn test_host_variable_access_translates_names() {
        let fx = fixture();
        fx.shell
            .variable_names
            .borrow_mut()
            .insert("score".to_string(), "var-17".to_string());

        fx.runtime.exec("variables.set(\"var-17\", 10);");
        assert_eq!(
            fx.runtime
                .get_variable("score")
                .and_then(|value| value.as_int().ok()),
            Some(10)
        );

        fx.runtime.set_variable("score", Dynamic::from(11_i64));
        assert_eq!(variable_int(&fx, "var-17"), Some(11));

        // Unknown names resolve to nothing and write nowhere.
        assert!(fx.runtime.get_variable("missing").is_none());
        fx.runtime.set_variable("missing", Dynamic::from(1_i64));
        assert_eq!(fx.runtime.sandbox.variables.len(), 1);
    }

    // =========================================================================
    // Scenario-change re-binding
    // =========================================================================

    #[test]
    fn test_scenario_change_rebinds_exactly_once() {
        let fx = fixture();
        fx.dom.set_trigger("link1", vec![AnchorId(1)]);

        fx.runtime.exec(
            r#"
            variables.set("clicks", 0);
            links.addEventListener("BehaviorTrigger:link1", "click",
                || variables.set("clicks", variables.get("clicks") + 1));
        "#,
        );
        fx.dom.click(AnchorId(1));
        assert_eq!(variable_int(&fx, "clicks"), Some(1));

        // The new scenario renders the same trigger on a different anchor.
        fx.dom.set_trigger("link1", vec![AnchorId(9)]);
        fx.stage.set_active_scenario("scn-2");
        // Not yet re-bound: the new DOM appears on the next tick.
        fx.runtime.tick();

        assert_eq!(fx.dom.listener_count(), 1);
        fx.dom.click(AnchorId(9));
        assert_eq!(variable_int(&fx, "clicks"), Some(2));
        fx.dom.click(AnchorId(1));
        assert_eq!(variable_int(&fx, "clicks"), Some(2));
    }

    #[test]
    fn test_scenario_change_with_unchanged_dom_is_idempotent() {
        let fx = fixture();
        fx.dom.set_trigger("link1", vec![AnchorId(1)]);

        fx.runtime.exec(
            r#"
            variables.set("clicks", 0);
            links.addEventListener("BehaviorTrigger:link1", "click",
                || variables.set("clicks", variables.get("clicks") + 1));
        "#,
        );
        fx.stage.set_active_scenario("scn-2");
        fx.runtime.tick();
        fx.stage.set_active_scenario("scn-3");
        fx.runtime.tick();

        assert_eq!(fx.dom.listener_count(), 1);
        fx.dom.click(AnchorId(1));
        assert_eq!(variable_int(&fx, "clicks"), Some(1));
    }

    // =========================================================================
    // Media excerpt chaining
    // =========================================================================

    #[test]
    fn test_natural_end_defers_then_to_next_excerpt() {
        let fx = fixture();
        fx.runtime.exec(
            r#"
            variables.set("a", 0);
            media.play(0.0, 10.0, || variables.set("a", variables.get("a") + 1));
            keyboard.addEventListener("n", "keydown",
                || media.play(20.0, 30.0, || variables.set("b", 1)));
        "#,
        );
        fx.transport.tick(1.0);
        fx.transport.tick(10.5);
        assert!(!fx.transport.playing.get());
        assert_eq!(variable_int(&fx, "a"), Some(0)); // deferred, not dropped

        fx.dom.press("keydown", "n");
        fx.transport.tick(21.0);
        assert_eq!(variable_int(&fx, "a"), Some(1));
        assert!(variable_int(&fx, "b").is_none());

        fx.transport.tick(30.5);
        assert_eq!(variable_int(&fx, "a"), Some(1)); // exactly once
    }

    #[test]
    fn test_seek_out_fires_then_immediately_and_only_once() {
        let fx = fixture();
        fx.runtime.exec(
            r#"
            variables.set("a", 0);
            media.play(0.0, 10.0, || variables.set("a", variables.get("a") + 1));
        "#,
        );
        fx.transport.tick(1.0);
        fx.transport.seek_to(20.0);
        assert_eq!(variable_int(&fx, "a"), Some(1));
        assert!(fx.scheduler.is_empty());

        fx.transport.seek_to(25.0); // nothing pending, nothing fires
        assert_eq!(variable_int(&fx, "a"), Some(1));
    }

    // =========================================================================
    // Reactive watchers
    // =========================================================================

    #[test]
    fn test_watch_effect_rerun_waits_for_the_next_tick() {
        let fx = fixture();
        fx.runtime.exec(
            r#"
            let h = reactive.value(0);
            variables.set("runs", 0);
            reactive.watchEffect(|| {
                variables.set("runs", variables.get("runs") + 1);
                reactive.get(h);
            });
            reactive.set(h, 5);
        "#,
        );
        // The write only schedules the re-run.
        assert_eq!(variable_int(&fx, "runs"), Some(1));

        fx.runtime.tick();
        assert_eq!(variable_int(&fx, "runs"), Some(2));

        fx.runtime.tick(); // nothing changed, nothing runs
        assert_eq!(variable_int(&fx, "runs"), Some(2));
    }

    // =========================================================================
    // Component overrides and paging
    // =========================================================================

    #[test]
    fn test_set_property_is_undone_by_reset() {
        let fx = fixture();
        fx.stage.add_component("Block", "a", ComponentId(1));
        fx.stage.add_component("Block", "b", ComponentId(2));
        fx.stage
            .set_authored(ComponentId(1), "hidden", Dynamic::from(false));
        fx.stage
            .set_authored(ComponentId(2), "hidden", Dynamic::from(false));

        fx.runtime
            .exec(r#"components.setProperty(["Block:a", "Block:b"], "hidden", true);"#);
        for component in [ComponentId(1), ComponentId(2)] {
            assert_eq!(
                fx.stage
                    .get_property(component, "hidden")
                    .and_then(|value| value.as_bool().ok()),
                Some(true)
            );
        }

        fx.runtime.reset();
        for component in [ComponentId(1), ComponentId(2)] {
            assert_eq!(
                fx.stage
                    .get_property(component, "hidden")
                    .and_then(|value| value.as_bool().ok()),
                Some(false)
            );
        }
    }

    #[test]
    fn test_block_page_is_one_based_for_scripts() {
        let fx = fixture();
        fx.stage.add_component("Block", "a", ComponentId(1));

        fx.runtime.exec(
            r#"
            components.setBlockPage("Block:a", 3);
            variables.set("page", components.getBlockPage("Block:a"));
        "#,
        );
        assert_eq!(variable_int(&fx, "page"), Some(3));
        assert_eq!(fx.stage.block_active_page(ComponentId(1)), Some(2));
    }

    // =========================================================================
    // End-to-end scenario
    // =========================================================================

    #[test]
    fn test_click_starts_excerpt_that_pauses_at_end() {
        let fx = fixture();
        fx.dom.set_trigger("link1", vec![AnchorId(1)]);

        fx.runtime.exec(
            r#"links.addEventListener("BehaviorTrigger:link1", "click",
                || media.play(5.0, 15.0, ()));"#,
        );
        assert_eq!(fx.dom.cursor(AnchorId(1)).as_deref(), Some("pointer"));

        fx.dom.click(AnchorId(1));
        assert_eq!(fx.transport.time.get(), 5.0);
        assert!(fx.transport.playing.get());

        fx.transport.tick(10.0);
        assert!(fx.transport.playing.get());

        fx.transport.tick(15.2);
        assert!(!fx.transport.playing.get());
    }

    #[test]
    fn test_open_url_reaches_the_shell() {
        let fx = fixture();
        fx.runtime
            .exec(r#"links.openUrl("https://example.com/page");"#);
        assert_eq!(
            fx.shell.opened.borrow().as_slice(),
            ["https://example.com/page"]
        );
    }
}
