//! Components capability - property overrides and scenario/page bridging.
//!
//! Every operation parses its trigger reference and resolves the live
//! component before acting; unresolved references are silent no-ops. A
//! behavior keeps running across scenario changes that remove whatever it
//! was pointed at.
//!
//! `setProperty` never mutates the authored value: it writes a named
//! override under this module's fixed key and priority, so everything this
//! runtime applied can be bulk-cleared on reset without touching overrides
//! from other sources.

use std::rc::Rc;

use rhai::{Dynamic, Engine};

use crate::host::Stage;
use crate::types::{ComponentId, TriggerRef};

use super::{Capability, ref_strings};

/// Override key shared by every write this module performs.
pub const OVERRIDE_KEY: &str = "behavior-runtime";

/// Override priority shared by every write this module performs.
pub const OVERRIDE_PRIORITY: i32 = 100;

pub struct ComponentsCapability {
    stage: Rc<dyn Stage>,
}

impl ComponentsCapability {
    pub fn new(stage: Rc<dyn Stage>) -> Self {
        Self { stage }
    }
}

/// Resolve a textual reference to a live component, or `None`.
fn resolve(stage: &Rc<dyn Stage>, reference: &str) -> Option<ComponentId> {
    match TriggerRef::parse(reference)? {
        TriggerRef::Component { kind, id } => stage.get_component(&kind, &id),
        TriggerRef::BehaviorTrigger { .. } => None,
    }
}

impl Capability for ComponentsCapability {
    fn name(&self) -> &'static str {
        "components"
    }

    fn install(&self, engine: &mut Engine) {
        let stage = Rc::clone(&self.stage);
        engine.register_fn(
            "components_get_property",
            move |reference: &str, name: &str| -> Dynamic {
                resolve(&stage, reference)
                    .and_then(|component| stage.get_property(component, name))
                    .unwrap_or(Dynamic::UNIT)
            },
        );

        let stage = Rc::clone(&self.stage);
        engine.register_fn(
            "components_set_property",
            move |references: Dynamic, name: &str, value: Dynamic| {
                for reference in ref_strings(references) {
                    if let Some(component) = resolve(&stage, &reference) {
                        stage.set_override(
                            component,
                            OVERRIDE_KEY,
                            name,
                            value.clone(),
                            OVERRIDE_PRIORITY,
                        );
                    }
                }
            },
        );

        let stage = Rc::clone(&self.stage);
        engine.register_fn("components_set_scenario", move |reference: &str| {
            if let Some(TriggerRef::Component { id, .. }) = TriggerRef::parse(reference) {
                stage.set_active_scenario(&id);
            }
        });

        let stage = Rc::clone(&self.stage);
        engine.register_fn(
            "components_get_block_page",
            move |reference: &str| -> i64 {
                // Script-facing pages are 1-based; 0 means unresolved.
                resolve(&stage, reference)
                    .and_then(|component| stage.block_active_page(component))
                    .map(|page| page as i64 + 1)
                    .unwrap_or(0)
            },
        );

        let stage = Rc::clone(&self.stage);
        engine.register_fn(
            "components_set_block_page",
            move |reference: &str, page: i64| {
                if page < 1 {
                    return;
                }
                if let Some(component) = resolve(&stage, reference) {
                    stage.set_block_active_page(component, (page - 1) as usize);
                }
            },
        );
    }

    fn namespace(&self) -> String {
        r#"#{
    getProperty: |reference, name| components_get_property(reference, name),
    setProperty: |references, name, value| components_set_property(references, name, value),
    setScenario: |reference| components_set_scenario(reference),
    getBlockPage: |reference| components_get_block_page(reference),
    setBlockPage: |reference, page| components_set_block_page(reference, page)
}"#
        .to_string()
    }

    fn reset(&self) {
        // Bulk-clear every override this runtime applied, wherever it landed.
        self.stage.clear_overrides(None, OVERRIDE_KEY);
    }
}
