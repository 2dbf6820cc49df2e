//! Process configuration read from the environment.

use std::net::SocketAddr;

use anyhow::Context;

use bloodbank_infra::EngineConfig;

pub const BIND_ADDR_VAR: &str = "BLOODBANK_BIND_ADDR";
pub const MAX_CONFLICT_RETRIES_VAR: &str = "BLOODBANK_MAX_CONFLICT_RETRIES";
pub const ALLOCATION_TARGET_VAR: &str = "BLOODBANK_ALLOCATION_TARGET";

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiConfig {
    pub bind_addr: SocketAddr,
    pub engine: EngineConfig,
}

impl ApiConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; unset keys take their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let bind_addr = lookup(BIND_ADDR_VAR)
            .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string())
            .parse()
            .with_context(|| format!("{BIND_ADDR_VAR} must be a socket address"))?;

        let mut engine = EngineConfig::default();
        if let Some(raw) = lookup(MAX_CONFLICT_RETRIES_VAR) {
            engine.max_conflict_retries = raw
                .trim()
                .parse()
                .with_context(|| format!("{MAX_CONFLICT_RETRIES_VAR} must be a non-negative integer"))?;
        }
        if let Some(raw) = lookup(ALLOCATION_TARGET_VAR) {
            engine.allocation_target = raw
                .parse()
                .map_err(|e| anyhow::anyhow!("{ALLOCATION_TARGET_VAR}: {e}"))?;
        }

        Ok(Self { bind_addr, engine })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bloodbank_inventory::AllocationTarget;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let cfg = ApiConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(cfg.bind_addr, "0.0.0.0:8080".parse().unwrap());
        assert_eq!(cfg.engine, EngineConfig::default());
    }

    #[test]
    fn overrides_are_parsed() {
        let cfg = ApiConfig::from_lookup(lookup(&[
            (BIND_ADDR_VAR, "127.0.0.1:9000"),
            (MAX_CONFLICT_RETRIES_VAR, "5"),
            (ALLOCATION_TARGET_VAR, "Reserved"),
        ]))
        .unwrap();
        assert_eq!(cfg.bind_addr.port(), 9000);
        assert_eq!(cfg.engine.max_conflict_retries, 5);
        assert_eq!(cfg.engine.allocation_target, AllocationTarget::Reserved);
    }

    #[test]
    fn bad_values_are_reported_with_the_variable_name() {
        let err = ApiConfig::from_lookup(lookup(&[(MAX_CONFLICT_RETRIES_VAR, "many")])).unwrap_err();
        assert!(err.to_string().contains(MAX_CONFLICT_RETRIES_VAR));

        let err = ApiConfig::from_lookup(lookup(&[(ALLOCATION_TARGET_VAR, "burned")])).unwrap_err();
        assert!(err.to_string().contains(ALLOCATION_TARGET_VAR));
    }
}
