use std::env;
use std::time::Duration;

use crate::error::AppError;

#[derive(Debug, Clone)]
pub struct Config {
    pub http_port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub event_buffer_size: usize,
    pub auto_assign_interval: Duration,
    pub matching: MatchingConfig,
    pub pricing: PricingConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Compact,
    Json,
}

/// Weights and breakpoints of the driver scoring function.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchingConfig {
    pub rating_weight: f64,
    pub experience_weight: f64,
    pub proximity_weight: f64,
    pub hub_weight: f64,
    /// At or below this distance proximity scores 1.0.
    pub near_km: f64,
    /// At or beyond this distance proximity scores `floor_score`.
    pub far_km: f64,
    pub floor_score: f64,
    /// Deliveries after which the experience component saturates at 1.0.
    pub experience_saturation: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PricingConfig {
    pub base_price: f64,
    pub price_per_km: f64,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            rating_weight: 0.30,
            experience_weight: 0.20,
            proximity_weight: 0.40,
            hub_weight: 0.10,
            near_km: 5.0,
            far_km: 50.0,
            floor_score: 0.1,
            experience_saturation: 100,
        }
    }
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            base_price: 50.0,
            price_per_km: 5.0,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http_port: 3000,
            log_level: "info".to_string(),
            log_format: LogFormat::Compact,
            event_buffer_size: 1024,
            auto_assign_interval: Duration::from_secs(300),
            matching: MatchingConfig::default(),
            pricing: PricingConfig::default(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        let _ = dotenvy::dotenv();

        let defaults = MatchingConfig::default();
        let matching = MatchingConfig {
            rating_weight: parse_or_default("MATCH_WEIGHT_RATING", defaults.rating_weight)?,
            experience_weight: parse_or_default(
                "MATCH_WEIGHT_EXPERIENCE",
                defaults.experience_weight,
            )?,
            proximity_weight: parse_or_default("MATCH_WEIGHT_PROXIMITY", defaults.proximity_weight)?,
            hub_weight: parse_or_default("MATCH_WEIGHT_HUB", defaults.hub_weight)?,
            near_km: parse_or_default("PROXIMITY_NEAR_KM", defaults.near_km)?,
            far_km: parse_or_default("PROXIMITY_FAR_KM", defaults.far_km)?,
            floor_score: parse_or_default("PROXIMITY_FLOOR_SCORE", defaults.floor_score)?,
            experience_saturation: parse_or_default(
                "EXPERIENCE_SATURATION",
                defaults.experience_saturation,
            )?,
        };
        matching.validate()?;

        let pricing_defaults = PricingConfig::default();
        let pricing = PricingConfig {
            base_price: parse_or_default("PRICE_BASE", pricing_defaults.base_price)?,
            price_per_km: parse_or_default("PRICE_PER_KM", pricing_defaults.price_per_km)?,
        };

        let interval_secs: u64 = parse_or_default("AUTO_ASSIGN_INTERVAL_SECS", 300)?;
        if interval_secs == 0 {
            return Err(AppError::Internal(
                "invalid AUTO_ASSIGN_INTERVAL_SECS: must be > 0".to_string(),
            ));
        }

        let log_format = match env::var("LOG_FORMAT").as_deref() {
            Ok("json") => LogFormat::Json,
            _ => LogFormat::Compact,
        };

        Ok(Self {
            http_port: parse_or_default("HTTP_PORT", 3000)?,
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            log_format,
            event_buffer_size: parse_or_default("EVENT_BUFFER_SIZE", 1024)?,
            auto_assign_interval: Duration::from_secs(interval_secs),
            matching,
            pricing,
        })
    }
}

impl MatchingConfig {
    pub fn validate(&self) -> Result<(), AppError> {
        let weights = [
            ("rating", self.rating_weight),
            ("experience", self.experience_weight),
            ("proximity", self.proximity_weight),
            ("hub", self.hub_weight),
        ];
        for (name, weight) in weights {
            if !weight.is_finite() || weight < 0.0 {
                return Err(AppError::Internal(format!(
                    "invalid {name} weight: {weight}"
                )));
            }
        }

        if !(self.near_km >= 0.0 && self.near_km < self.far_km) {
            return Err(AppError::Internal(format!(
                "invalid proximity breakpoints: near {} km, far {} km",
                self.near_km, self.far_km
            )));
        }

        if !(0.0..=1.0).contains(&self.floor_score) {
            return Err(AppError::Internal(format!(
                "invalid proximity floor score: {}",
                self.floor_score
            )));
        }

        if self.experience_saturation == 0 {
            return Err(AppError::Internal(
                "invalid experience saturation: must be > 0".to_string(),
            ));
        }

        Ok(())
    }
}

fn parse_or_default<T>(key: &str, default: T) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|err| AppError::Internal(format!("invalid {key}: {err}"))),
        Err(_) => Ok(default),
    }
}
