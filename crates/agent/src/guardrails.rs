use crate::tools::ToolDescriptor;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GuardDecision {
    Allow,
    Deny { reason_code: &'static str, user_message: String },
}

/// Policy applied by the tool registry before any tool runs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ToolGuard {
    pub allow_side_effects: bool,
}

impl Default for ToolGuard {
    fn default() -> Self {
        Self { allow_side_effects: true }
    }
}

impl ToolGuard {
    pub fn new(allow_side_effects: bool) -> Self {
        Self { allow_side_effects }
    }

    pub fn evaluate(&self, descriptor: &ToolDescriptor) -> GuardDecision {
        if !descriptor.side_effect || self.allow_side_effects {
            return GuardDecision::Allow;
        }

        GuardDecision::Deny {
            reason_code: "side_effects_disabled",
            user_message: format!(
                "`{}` changes external systems and is disabled in this deployment.",
                descriptor.name
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{GuardDecision, ToolGuard};
    use crate::tools::ToolDescriptor;

    fn descriptor(name: &str, side_effect: bool) -> ToolDescriptor {
        ToolDescriptor {
            name: name.to_string(),
            description: "test".to_string(),
            input_schema: json!({"type": "object"}),
            output_schema: json!({"type": "object"}),
            side_effect,
        }
    }

    #[test]
    fn read_only_tools_always_pass() {
        let guard = ToolGuard::new(false);
        assert_eq!(guard.evaluate(&descriptor("get_purchase_orders", false)), GuardDecision::Allow);
    }

    #[test]
    fn side_effect_tools_are_denied_when_disabled() {
        let guard = ToolGuard::new(false);
        let decision = guard.evaluate(&descriptor("po_posting_api", true));

        assert!(matches!(
            decision,
            GuardDecision::Deny { reason_code: "side_effects_disabled", ref user_message }
                if user_message.contains("po_posting_api")
        ));
        assert_eq!(
            ToolGuard::default().evaluate(&descriptor("po_posting_api", true)),
            GuardDecision::Allow
        );
    }
}
