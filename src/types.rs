//! Core types shared across the runtime.
//!
//! The most important one is [`TriggerRef`]: the parsed form of the textual
//! `"Type:Id"` reference that compiled behavior programs use to address
//! clickable anchors and live component instances. References are parsed
//! once at the script boundary and carried as values from then on; they are
//! never resolved to direct element handles ahead of time because the
//! underlying DOM/component may be recreated when scenarios change.

use std::fmt;

/// Reference type tag for behavior-trigger anchors.
pub const BEHAVIOR_TRIGGER_KIND: &str = "BehaviorTrigger";

/// A parsed trigger reference.
///
/// `Component` addresses a live component instance by its type and id
/// (e.g. `"Block:abc123"`). `BehaviorTrigger` addresses zero or more
/// clickable anchors in the rendered document that carry the matching
/// trigger attribute (e.g. `"BehaviorTrigger:link42"`; the same link text
/// may be rendered more than once).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum TriggerRef {
    Component { kind: String, id: String },
    BehaviorTrigger { id: String },
}

impl TriggerRef {
    /// Parse a textual `"Type:Id"` reference.
    ///
    /// Returns `None` for text that does not carry both parts. Callers treat
    /// that the same as an unresolved reference: a silent no-op.
    pub fn parse(text: &str) -> Option<Self> {
        let (kind, id) = text.split_once(':')?;
        if kind.is_empty() || id.is_empty() {
            return None;
        }
        if kind == BEHAVIOR_TRIGGER_KIND {
            Some(Self::BehaviorTrigger { id: id.to_string() })
        } else {
            Some(Self::Component {
                kind: kind.to_string(),
                id: id.to_string(),
            })
        }
    }

    /// The id part of the reference, whatever its type.
    pub fn id(&self) -> &str {
        match self {
            Self::Component { id, .. } => id,
            Self::BehaviorTrigger { id } => id,
        }
    }
}

impl fmt::Display for TriggerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Component { kind, id } => write!(f, "{kind}:{id}"),
            Self::BehaviorTrigger { id } => write!(f, "{BEHAVIOR_TRIGGER_KIND}:{id}"),
        }
    }
}

// =============================================================================
// Handle types
// =============================================================================

/// Opaque handle for a live component instance, assigned by the host.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ComponentId(pub usize);

/// Opaque handle for a rendered anchor element, assigned by the host.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct AnchorId(pub usize);

/// Opaque handle for a registered DOM or keyboard listener.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ListenerId(pub usize);

/// Opaque handle for a registered cuepoint.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CuepointId(pub usize);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_component_ref() {
        let parsed = TriggerRef::parse("Block:abc123");
        assert_eq!(
            parsed,
            Some(TriggerRef::Component {
                kind: "Block".to_string(),
                id: "abc123".to_string(),
            })
        );
    }

    #[test]
    fn test_parse_behavior_trigger_ref() {
        let parsed = TriggerRef::parse("BehaviorTrigger:link42");
        assert_eq!(
            parsed,
            Some(TriggerRef::BehaviorTrigger {
                id: "link42".to_string(),
            })
        );
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert_eq!(TriggerRef::parse("no-colon"), None);
        assert_eq!(TriggerRef::parse(":id-only"), None);
        assert_eq!(TriggerRef::parse("Kind:"), None);
        assert_eq!(TriggerRef::parse(""), None);
    }

    #[test]
    fn test_id_keeps_colons_after_first() {
        let parsed = TriggerRef::parse("Scenario:scn:1").unwrap();
        assert_eq!(parsed.id(), "scn:1");
    }

    #[test]
    fn test_display_round_trip() {
        for text in ["Block:a", "BehaviorTrigger:link1", "Scenario:scn-1"] {
            let parsed = TriggerRef::parse(text).unwrap();
            assert_eq!(parsed.to_string(), text);
        }
    }
}
