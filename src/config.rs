use crate::constants::*;
use crate::models::ShapeAdjustment;
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Read `key` from the environment, falling back to `default` when unset.
fn env_or<T: FromStr>(key: &str, default: T) -> Result<T, String> {
    match env::var(key) {
        Ok(raw) => raw.trim().parse().map_err(|_| format!("Invalid {}", key)),
        Err(_) => Ok(default),
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub routing: RoutingConfig,
    pub attributes: AttributeConfig,
    pub scoring: ScoringConfig,
    pub generator: LoopGeneratorConfig,
}

#[derive(Debug, Clone)]
pub struct RoutingConfig {
    pub primary_url: String,
    pub secondary_url: String,
    pub timeout: Duration,
    pub failover_cooldown: Duration,
    pub failover_threshold: u32,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            primary_url: DEFAULT_ROUTING_PRIMARY_URL.to_string(),
            secondary_url: DEFAULT_ROUTING_SECONDARY_URL.to_string(),
            timeout: Duration::from_secs(DEFAULT_ROUTING_TIMEOUT_SECONDS),
            failover_cooldown: Duration::from_secs(DEFAULT_FAILOVER_COOLDOWN_SECONDS),
            failover_threshold: DEFAULT_FAILOVER_THRESHOLD,
        }
    }
}

impl RoutingConfig {
    pub fn from_env() -> Result<Self, String> {
        let defaults = Self::default();

        let failover_threshold: u32 =
            env_or("ROUTING_FAILOVER_THRESHOLD", defaults.failover_threshold)?;
        if failover_threshold == 0 {
            return Err("ROUTING_FAILOVER_THRESHOLD must be at least 1".to_string());
        }

        Ok(Self {
            primary_url: env_or("ROUTING_PRIMARY_URL", defaults.primary_url)?,
            secondary_url: env_or("ROUTING_SECONDARY_URL", defaults.secondary_url)?,
            timeout: Duration::from_secs(env_or(
                "ROUTING_TIMEOUT_SECS",
                DEFAULT_ROUTING_TIMEOUT_SECONDS,
            )?),
            failover_cooldown: Duration::from_secs(env_or(
                "ROUTING_FAILOVER_COOLDOWN_SECS",
                DEFAULT_FAILOVER_COOLDOWN_SECONDS,
            )?),
            failover_threshold,
        })
    }
}

#[derive(Debug, Clone)]
pub struct AttributeConfig {
    pub endpoints: Vec<String>,
    pub timeout: Duration,
    pub cache_ttl: Duration,
    pub cache_max_entries: u64,
}

impl Default for AttributeConfig {
    fn default() -> Self {
        Self {
            endpoints: DEFAULT_OVERPASS_ENDPOINTS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            timeout: Duration::from_secs(DEFAULT_OVERPASS_TIMEOUT_SECONDS),
            cache_ttl: Duration::from_secs(DEFAULT_ATTRIBUTE_CACHE_TTL_SECONDS),
            cache_max_entries: DEFAULT_ATTRIBUTE_CACHE_MAX_ENTRIES,
        }
    }
}

impl AttributeConfig {
    pub fn from_env() -> Result<Self, String> {
        let defaults = Self::default();

        let endpoints = match env::var("OVERPASS_URLS") {
            Ok(raw) => raw
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
            Err(_) => defaults.endpoints,
        };
        if endpoints.is_empty() {
            return Err("OVERPASS_URLS must list at least one endpoint".to_string());
        }

        Ok(Self {
            endpoints,
            timeout: Duration::from_secs(env_or(
                "OVERPASS_TIMEOUT_SECS",
                DEFAULT_OVERPASS_TIMEOUT_SECONDS,
            )?),
            cache_ttl: Duration::from_secs(env_or(
                "ATTRIBUTE_CACHE_TTL_SECS",
                DEFAULT_ATTRIBUTE_CACHE_TTL_SECONDS,
            )?),
            cache_max_entries: env_or(
                "ATTRIBUTE_CACHE_MAX_ENTRIES",
                DEFAULT_ATTRIBUTE_CACHE_MAX_ENTRIES,
            )?,
        })
    }
}

/// Weights, normalisation denominators and thresholds of the floorability score.
/// Empirical values; every one can be overridden from the environment.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoringConfig {
    pub weight_speed_delta: f64,
    pub weight_signal_launch: f64,
    pub weight_ramp_merge: f64,
    pub weight_runway: f64,
    pub weight_road_quality: f64,

    /// Weighted raw total that maps to a score of 100
    pub total_normalizer: f64,
    pub speed_delta_normalizer: f64,
    pub signal_launch_normalizer: f64,
    pub ramp_merge_normalizer: f64,
    pub runway_normalizer: f64,
    pub road_quality_normalizer: f64,

    /// Loops scoring below this are dropped when at least one clears it
    pub min_score_threshold: u32,

    /// Smallest speed step-up (mph) that counts as an event
    pub speed_delta_min_mph: f64,
    /// Runway beyond this many miles earns nothing extra
    pub runway_cap_miles: f64,
    /// Runway sub-score is this many points per runway mile
    pub runway_points_per_mile: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            weight_speed_delta: 0.35,
            weight_signal_launch: 0.25,
            weight_ramp_merge: 0.20,
            weight_runway: 0.10,
            weight_road_quality: 0.10,
            total_normalizer: 150.0,
            speed_delta_normalizer: 50.0,
            signal_launch_normalizer: 40.0,
            ramp_merge_normalizer: 30.0,
            runway_normalizer: 30.0,
            road_quality_normalizer: 20.0,
            min_score_threshold: 25,
            speed_delta_min_mph: 10.0,
            runway_cap_miles: 3.0,
            runway_points_per_mile: 5.0,
        }
    }
}

impl ScoringConfig {
    pub fn from_env() -> Result<Self, String> {
        let d = Self::default();

        let config = Self {
            weight_speed_delta: env_or("SCORING_WEIGHT_SPEED_DELTA", d.weight_speed_delta)?,
            weight_signal_launch: env_or("SCORING_WEIGHT_SIGNAL_LAUNCH", d.weight_signal_launch)?,
            weight_ramp_merge: env_or("SCORING_WEIGHT_RAMP_MERGE", d.weight_ramp_merge)?,
            weight_runway: env_or("SCORING_WEIGHT_RUNWAY", d.weight_runway)?,
            weight_road_quality: env_or("SCORING_WEIGHT_ROAD_QUALITY", d.weight_road_quality)?,
            total_normalizer: env_or("SCORING_TOTAL_NORMALIZER", d.total_normalizer)?,
            speed_delta_normalizer: env_or(
                "SCORING_SPEED_DELTA_NORMALIZER",
                d.speed_delta_normalizer,
            )?,
            signal_launch_normalizer: env_or(
                "SCORING_SIGNAL_LAUNCH_NORMALIZER",
                d.signal_launch_normalizer,
            )?,
            ramp_merge_normalizer: env_or(
                "SCORING_RAMP_MERGE_NORMALIZER",
                d.ramp_merge_normalizer,
            )?,
            runway_normalizer: env_or("SCORING_RUNWAY_NORMALIZER", d.runway_normalizer)?,
            road_quality_normalizer: env_or(
                "SCORING_ROAD_QUALITY_NORMALIZER",
                d.road_quality_normalizer,
            )?,
            min_score_threshold: env_or("SCORING_MIN_SCORE", d.min_score_threshold)?,
            speed_delta_min_mph: env_or("SCORING_SPEED_DELTA_MIN_MPH", d.speed_delta_min_mph)?,
            runway_cap_miles: env_or("SCORING_RUNWAY_CAP_MILES", d.runway_cap_miles)?,
            runway_points_per_mile: env_or(
                "SCORING_RUNWAY_POINTS_PER_MILE",
                d.runway_points_per_mile,
            )?,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), String> {
        let weights = [
            self.weight_speed_delta,
            self.weight_signal_launch,
            self.weight_ramp_merge,
            self.weight_runway,
            self.weight_road_quality,
        ];
        if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err("Scoring weights must be non-negative".to_string());
        }
        let normalizers = [
            self.total_normalizer,
            self.speed_delta_normalizer,
            self.signal_launch_normalizer,
            self.ramp_merge_normalizer,
            self.runway_normalizer,
            self.road_quality_normalizer,
        ];
        if normalizers.iter().any(|n| !n.is_finite() || *n <= 0.0) {
            return Err("Scoring normalizers must be positive".to_string());
        }
        if self.min_score_threshold > 100 {
            return Err("SCORING_MIN_SCORE must be between 0 and 100".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct LoopGeneratorConfig {
    /// Assumed average speed (mph) when turning a duration into a loop length
    pub average_speed_mph: f64,
    /// Road distance / straight-line distance for a typical loop
    pub road_factor: f64,

    /// Route fetches issued concurrently per batch
    pub batch_size: usize,

    /// Duration window, as multiples of the target, for the first filter
    pub min_duration_ratio: f64,
    pub max_duration_ratio: f64,

    /// Hard-reject limits of the shape pre-filter
    pub max_overlap_penalty: f64,
    pub min_circularity: f64,

    /// Shape quality weights
    pub quality_weight_circularity: f64,
    pub quality_weight_overlap: f64,
    pub quality_weight_duration: f64,

    /// Candidates that proceed to attribute scoring
    pub attribute_candidates: usize,
    /// Pause between attribute queries
    pub attribute_delay: Duration,

    /// Loops returned to the caller
    pub max_results: usize,

    pub shape_adjustment: ShapeAdjustment,
}

impl Default for LoopGeneratorConfig {
    fn default() -> Self {
        Self {
            average_speed_mph: 32.0,
            road_factor: 1.35,
            batch_size: 4,
            min_duration_ratio: 0.4,
            max_duration_ratio: 2.2,
            max_overlap_penalty: 0.5,
            min_circularity: 0.05,
            quality_weight_circularity: 0.45,
            quality_weight_overlap: 0.35,
            quality_weight_duration: 0.20,
            attribute_candidates: 7,
            attribute_delay: Duration::from_millis(1000),
            max_results: 5,
            shape_adjustment: ShapeAdjustment::default(),
        }
    }
}

impl LoopGeneratorConfig {
    pub fn from_env() -> Result<Self, String> {
        let d = Self::default();

        let config = Self {
            average_speed_mph: env_or("LOOP_AVERAGE_SPEED_MPH", d.average_speed_mph)?,
            road_factor: env_or("LOOP_ROAD_FACTOR", d.road_factor)?,
            batch_size: env_or("LOOP_BATCH_SIZE", d.batch_size)?,
            min_duration_ratio: env_or("LOOP_MIN_DURATION_RATIO", d.min_duration_ratio)?,
            max_duration_ratio: env_or("LOOP_MAX_DURATION_RATIO", d.max_duration_ratio)?,
            max_overlap_penalty: env_or("LOOP_MAX_OVERLAP_PENALTY", d.max_overlap_penalty)?,
            min_circularity: env_or("LOOP_MIN_CIRCULARITY", d.min_circularity)?,
            quality_weight_circularity: env_or(
                "LOOP_QUALITY_WEIGHT_CIRCULARITY",
                d.quality_weight_circularity,
            )?,
            quality_weight_overlap: env_or(
                "LOOP_QUALITY_WEIGHT_OVERLAP",
                d.quality_weight_overlap,
            )?,
            quality_weight_duration: env_or(
                "LOOP_QUALITY_WEIGHT_DURATION",
                d.quality_weight_duration,
            )?,
            attribute_candidates: env_or("LOOP_ATTRIBUTE_CANDIDATES", d.attribute_candidates)?,
            attribute_delay: Duration::from_millis(env_or(
                "LOOP_ATTRIBUTE_DELAY_MS",
                d.attribute_delay.as_millis() as u64,
            )?),
            max_results: env_or("LOOP_MAX_RESULTS", d.max_results)?,
            shape_adjustment: d.shape_adjustment,
        };

        if config.batch_size == 0 || config.attribute_candidates == 0 || config.max_results == 0 {
            return Err(
                "LOOP_BATCH_SIZE, LOOP_ATTRIBUTE_CANDIDATES and LOOP_MAX_RESULTS must be positive"
                    .to_string(),
            );
        }
        if config.min_duration_ratio >= config.max_duration_ratio {
            return Err("LOOP_MIN_DURATION_RATIO must be below LOOP_MAX_DURATION_RATIO".to_string());
        }

        Ok(config)
    }
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        dotenv::dotenv().ok();

        Ok(Config {
            host: env::var("HOST").unwrap_or_else(|_| DEFAULT_HOST.to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| DEFAULT_PORT.to_string())
                .parse()
                .map_err(|_| "Invalid PORT")?,
            routing: RoutingConfig::from_env()?,
            attributes: AttributeConfig::from_env()?,
            scoring: ScoringConfig::from_env()?,
            generator: LoopGeneratorConfig::from_env()?,
        })
    }

    pub fn server_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_scoring_defaults_match_documented_model() {
        let config = ScoringConfig::default();
        let weight_sum = config.weight_speed_delta
            + config.weight_signal_launch
            + config.weight_ramp_merge
            + config.weight_runway
            + config.weight_road_quality;
        assert!((weight_sum - 1.0).abs() < 1e-9);
        assert_eq!(config.total_normalizer, 150.0);
        assert_eq!(config.min_score_threshold, 25);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_scoring_validation_rejects_bad_values() {
        let config = ScoringConfig {
            total_normalizer: 0.0,
            ..ScoringConfig::default()
        };
        assert!(config.validate().is_err());

        let config = ScoringConfig {
            weight_runway: -0.1,
            ..ScoringConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    #[serial]
    fn test_scoring_env_override() {
        env::set_var("SCORING_MIN_SCORE", "40");
        let config = ScoringConfig::from_env();
        env::remove_var("SCORING_MIN_SCORE");

        assert_eq!(config.unwrap().min_score_threshold, 40);
    }

    #[test]
    #[serial]
    fn test_invalid_env_value_is_reported() {
        env::set_var("LOOP_BATCH_SIZE", "many");
        let result = LoopGeneratorConfig::from_env();
        env::remove_var("LOOP_BATCH_SIZE");

        assert_eq!(result.unwrap_err(), "Invalid LOOP_BATCH_SIZE");
    }

    #[test]
    #[serial]
    fn test_overpass_urls_are_split() {
        env::set_var("OVERPASS_URLS", "http://a/api, http://b/api,");
        let config = AttributeConfig::from_env();
        env::remove_var("OVERPASS_URLS");

        assert_eq!(
            config.unwrap().endpoints,
            vec!["http://a/api".to_string(), "http://b/api".to_string()]
        );
    }
}
