// Engine Configuration - Defaults overridable from the environment or a .env file

use log::warn;
use std::str::FromStr;

use crate::bodies::SimulationEpoch;
use crate::catalog;

pub const ENV_POINTS_PER_CHUNK: &str = "SOI_ENGINE_POINTS_PER_CHUNK";
pub const ENV_OUTBOUND_CAPACITY: &str = "SOI_ENGINE_OUTBOUND_CAPACITY";
pub const ENV_MAX_STEPS: &str = "SOI_ENGINE_MAX_STEPS";
pub const ENV_PRELOAD_CATALOG: &str = "SOI_ENGINE_PRELOAD_CATALOG";
pub const ENV_EPOCH: &str = "SOI_ENGINE_EPOCH";

#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Used when a request leaves `pointsPerChunk` unset
    pub default_points_per_chunk: usize,
    /// Outbound messages buffered before the engine waits on the consumer
    pub outbound_capacity: usize,
    /// Requests needing more steps are rejected up front
    pub max_steps: u64,
    /// Seed the registry with the built-in solar system
    pub preload_catalog: bool,
    pub catalog_epoch: SimulationEpoch,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_points_per_chunk: 100,
            outbound_capacity: 32,
            max_steps: 5_000_000,
            preload_catalog: true,
            catalog_epoch: catalog::default_epoch(),
        }
    }
}

impl EngineConfig {
    /// Load `.env` if present, then read overrides from the process environment
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; unset keys keep defaults, bad values warn and keep defaults
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        Self {
            default_points_per_chunk: parse_or(&lookup, ENV_POINTS_PER_CHUNK, defaults.default_points_per_chunk)
                .max(1),
            outbound_capacity: parse_or(&lookup, ENV_OUTBOUND_CAPACITY, defaults.outbound_capacity).max(1),
            max_steps: parse_or(&lookup, ENV_MAX_STEPS, defaults.max_steps),
            preload_catalog: parse_or(&lookup, ENV_PRELOAD_CATALOG, defaults.preload_catalog),
            catalog_epoch: match lookup(ENV_EPOCH) {
                Some(raw) => catalog::parse_epoch(&raw).unwrap_or_else(|| {
                    warn!("{}={:?} is not an ISO-8601 UTC time; using default", ENV_EPOCH, raw);
                    defaults.catalog_epoch
                }),
                None => defaults.catalog_epoch,
            },
        }
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T
where
    T: FromStr + std::fmt::Debug,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("{}={:?} is invalid; using default {:?}", key, raw, default);
            default
        }),
        None => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = EngineConfig::from_lookup(|_| None);
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.default_points_per_chunk, 100);
        assert_eq!(config.max_steps, 5_000_000);
        assert!(config.preload_catalog);
    }

    #[test]
    fn test_overrides() {
        let config = EngineConfig::from_lookup(lookup_from(&[
            (ENV_POINTS_PER_CHUNK, "25"),
            (ENV_OUTBOUND_CAPACITY, " 8 "),
            (ENV_PRELOAD_CATALOG, "false"),
            (ENV_EPOCH, "2000-01-01T12:00:00Z"),
        ]));
        assert_eq!(config.default_points_per_chunk, 25);
        assert_eq!(config.outbound_capacity, 8);
        assert!(!config.preload_catalog);
        assert!((config.catalog_epoch.julian_date() - 2451545.0).abs() < 1e-9);
    }

    #[test]
    fn test_bad_values_fall_back() {
        let config = EngineConfig::from_lookup(lookup_from(&[
            (ENV_MAX_STEPS, "lots"),
            (ENV_POINTS_PER_CHUNK, "0"),
            (ENV_EPOCH, "someday"),
        ]));
        assert_eq!(config.max_steps, 5_000_000);
        assert_eq!(config.default_points_per_chunk, 1);
        assert_eq!(config.catalog_epoch, catalog::default_epoch());
    }
}
