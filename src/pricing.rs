//! Quote source for new bookings.
//!
//! The full tariff (weight, volume, item surcharges) lives with the pricing
//! service; the dispatch core only needs a number to store on the booking.

use async_trait::async_trait;

use crate::config::PricingConfig;
use crate::error::AppError;
use crate::models::booking::NewBooking;

#[async_trait]
pub trait PricingOracle: Send + Sync {
    async fn quote(&self, request: &NewBooking, distance_km: Option<f64>) -> Result<f64, AppError>;
}

/// Base fare plus a per-kilometre rate, rounded to cents.
#[derive(Debug, Clone)]
pub struct DistanceRatePricing {
    config: PricingConfig,
}

impl DistanceRatePricing {
    pub fn new(config: PricingConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl PricingOracle for DistanceRatePricing {
    async fn quote(&self, _request: &NewBooking, distance_km: Option<f64>) -> Result<f64, AppError> {
        let distance_part = distance_km.unwrap_or(0.0) * self.config.price_per_km;
        let total = self.config.base_price + distance_part;
        Ok((total * 100.0).round() / 100.0)
    }
}
