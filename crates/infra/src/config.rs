//! Engine configuration.

use serde::{Deserialize, Serialize};

use bloodbank_inventory::AllocationTarget;

fn default_max_conflict_retries() -> u32 {
    3
}

/// Tuning knobs for the fulfillment engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Extra attempts after a version conflict before giving up.
    #[serde(default = "default_max_conflict_retries")]
    pub max_conflict_retries: u32,

    /// Status consumed units move into on approval.
    #[serde(default)]
    pub allocation_target: AllocationTarget,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_conflict_retries: default_max_conflict_retries(),
            allocation_target: AllocationTarget::default(),
        }
    }
}

impl EngineConfig {
    pub fn with_max_conflict_retries(mut self, retries: u32) -> Self {
        self.max_conflict_retries = retries;
        self
    }

    pub fn with_allocation_target(mut self, target: AllocationTarget) -> Self {
        self.allocation_target = target;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let cfg: EngineConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg, EngineConfig::default());
        assert_eq!(cfg.max_conflict_retries, 3);
        assert_eq!(cfg.allocation_target, AllocationTarget::Used);
    }

    #[test]
    fn reserved_target_parses() {
        let cfg: EngineConfig =
            serde_json::from_str(r#"{"allocation_target":"reserved"}"#).unwrap();
        assert_eq!(cfg.allocation_target, AllocationTarget::Reserved);
    }
}
