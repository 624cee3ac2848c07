// Optimizer configuration loaded from a JSON file

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;
use crate::models::GeoPoint;
use crate::utils::distance::NOMINAL_SPEED_KMH;
use crate::utils::routing::OPENROUTESERVICE_URL;

/// Environment variable consulted when the file carries no API key
pub const API_KEY_ENV: &str = "ORS_API_KEY";

/// Depot the couriers leave from
pub const DEFAULT_DEPOT: GeoPoint = GeoPoint {
    latitude: 48.7117294,
    longitude: 2.165678,
};

/// Which way the arbiter breaks a tie between equally graded batches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TieBreakKind {
    #[default]
    PreferHigherDiscount,
    PreferLowerDiscount,
}

/// Pool sizes at which the arbiter switches strategy family
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct TierThresholds {
    /// Pools strictly smaller than this are solved exhaustively
    pub brute_force: usize,
    /// Pools strictly smaller than this use subset dynamic programming
    pub genetic: usize,
    /// Pools strictly smaller than this use the genetic algorithm
    pub greedy: usize,
}

impl Default for TierThresholds {
    fn default() -> Self {
        Self {
            brute_force: 5,
            genetic: 20,
            greedy: 50,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct GeneticParams {
    pub population_size: usize,
    pub generations: usize,
    /// Fixed seed for reproducible runs
    pub seed: Option<u64>,
}

impl Default for GeneticParams {
    fn default() -> Self {
        Self {
            population_size: 10,
            generations: 100,
            seed: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OptimizerConfig {
    pub depot: GeoPoint,
    pub nominal_speed_kmh: f64,
    pub cache_dir: PathBuf,
    pub routing_endpoint: String,
    pub api_key: Option<String>,
    pub request_timeout_secs: u64,
    pub cooldown_secs: u64,
    pub tiers: TierThresholds,
    pub genetic: GeneticParams,
    pub tie_break: TieBreakKind,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            depot: DEFAULT_DEPOT,
            nominal_speed_kmh: NOMINAL_SPEED_KMH,
            cache_dir: PathBuf::from("data"),
            routing_endpoint: OPENROUTESERVICE_URL.to_string(),
            api_key: None,
            request_timeout_secs: 10,
            cooldown_secs: 120,
            tiers: TierThresholds::default(),
            genetic: GeneticParams::default(),
            tie_break: TieBreakKind::default(),
        }
    }
}

impl OptimizerConfig {
    /// Loads and validates a JSON configuration file; missing fields take defaults
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        let config: OptimizerConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.nominal_speed_kmh > 0.0) {
            return Err(ConfigError::Invalid(
                "nominal_speed_kmh must be positive".to_string(),
            ));
        }
        let tiers = &self.tiers;
        if !(tiers.brute_force <= tiers.genetic && tiers.genetic <= tiers.greedy) {
            return Err(ConfigError::Invalid(format!(
                "tier thresholds must be non-decreasing, got {} / {} / {}",
                tiers.brute_force, tiers.genetic, tiers.greedy
            )));
        }
        if self.genetic.population_size < 4 {
            return Err(ConfigError::Invalid(
                "genetic population must hold at least 4 individuals".to_string(),
            ));
        }
        Ok(())
    }

    /// API key from the file, else from `ORS_API_KEY`
    pub fn api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .or_else(|| std::env::var(API_KEY_ENV).ok())
            .filter(|key| !key.trim().is_empty())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = OptimizerConfig::default();
        assert_eq!(config.tiers, TierThresholds::default());
        assert_eq!(config.cooldown(), Duration::from_secs(120));
        assert_eq!(config.tie_break, TieBreakKind::PreferHigherDiscount);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(
            &path,
            r#"{
                "depot": {"latitude": 48.0, "longitude": 2.0},
                "tiers": {"greedy": 60},
                "genetic": {"seed": 42},
                "tie_break": "prefer_lower_discount"
            }"#,
        )
        .unwrap();

        let config = OptimizerConfig::from_file(&path).unwrap();
        assert_eq!(config.depot, GeoPoint::new(48.0, 2.0));
        assert_eq!(config.tiers.greedy, 60);
        assert_eq!(config.tiers.genetic, 20);
        assert_eq!(config.genetic.seed, Some(42));
        assert_eq!(config.genetic.generations, 100);
        assert_eq!(config.tie_break, TieBreakKind::PreferLowerDiscount);
    }

    #[test]
    fn test_rejects_inverted_tiers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"tiers": {"brute_force": 30, "genetic": 20}}"#).unwrap();

        assert!(matches!(
            OptimizerConfig::from_file(&path),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            OptimizerConfig::from_file("/nonexistent/config.json"),
            Err(ConfigError::Io(_))
        ));
    }
}
