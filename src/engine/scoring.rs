//! Driver matching: weighted scoring of eligible drivers against a booking.

use std::cmp::Ordering;

use crate::config::MatchingConfig;
use crate::geo::haversine_km;
use crate::models::assignment::{DriverMatch, ScoreBreakdown};
use crate::models::booking::Booking;
use crate::models::driver::{Driver, GeoPoint};

/// Rating component of a driver without any rating yet.
const UNRATED_SCORE: f64 = 0.5;
/// Used whenever a location or hub on either side is unknown.
const NEUTRAL_SCORE: f64 = 0.5;
const PICKUP_HUB_SCORE: f64 = 1.0;
const DELIVERY_HUB_SCORE: f64 = 0.8;

/// An eligible driver together with its resolved home-hub location.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub driver: Driver,
    pub hub_location: Option<GeoPoint>,
}

#[derive(Debug, Clone, Default)]
pub struct MatchingEngine {
    config: MatchingConfig,
}

impl MatchingEngine {
    pub fn new(config: MatchingConfig) -> Self {
        Self { config }
    }

    /// Picks the highest scoring candidate.
    ///
    /// Equal scores go to the lowest driver id. Stores list candidates in id
    /// order, so this is also the first-encountered candidate.
    pub fn select_driver(&self, booking: &Booking, candidates: &[Candidate]) -> Option<DriverMatch> {
        candidates
            .iter()
            .map(|candidate| {
                let (score, breakdown) = self.compute_score(candidate, booking);
                DriverMatch {
                    driver_id: candidate.driver.id,
                    score,
                    score_breakdown: breakdown,
                }
            })
            .min_by(|a, b| match b.score.total_cmp(&a.score) {
                Ordering::Equal => a.driver_id.cmp(&b.driver_id),
                other => other,
            })
    }

    pub fn compute_score(&self, candidate: &Candidate, booking: &Booking) -> (f64, ScoreBreakdown) {
        let driver = &candidate.driver;
        let breakdown = ScoreBreakdown {
            rating_score: rating_score(driver.rating),
            experience_score: self.experience_score(driver.total_deliveries),
            proximity_score: match (candidate.hub_location, booking.pickup) {
                (Some(hub), Some(pickup)) => self.proximity_score(haversine_km(&hub, &pickup)),
                _ => NEUTRAL_SCORE,
            },
            hub_score: hub_score(driver, booking),
        };

        (self.weighted_score(&breakdown), breakdown)
    }

    pub fn weighted_score(&self, breakdown: &ScoreBreakdown) -> f64 {
        (breakdown.rating_score * self.config.rating_weight)
            + (breakdown.experience_score * self.config.experience_weight)
            + (breakdown.proximity_score * self.config.proximity_weight)
            + (breakdown.hub_score * self.config.hub_weight)
    }

    /// 1.0 up to the near breakpoint, the floor from the far breakpoint on,
    /// linear in between.
    pub fn proximity_score(&self, distance_km: f64) -> f64 {
        let MatchingConfig {
            near_km,
            far_km,
            floor_score,
            ..
        } = self.config;

        if distance_km <= near_km {
            1.0
        } else if distance_km >= far_km {
            floor_score
        } else {
            1.0 - ((distance_km - near_km) / (far_km - near_km)) * (1.0 - floor_score)
        }
    }

    fn experience_score(&self, total_deliveries: u32) -> f64 {
        (total_deliveries as f64 / self.config.experience_saturation as f64).min(1.0)
    }
}

fn rating_score(rating: Option<f64>) -> f64 {
    match rating {
        Some(rating) => (rating / 5.0).clamp(0.0, 1.0),
        None => UNRATED_SCORE,
    }
}

fn hub_score(driver: &Driver, booking: &Booking) -> f64 {
    let Some(hub_id) = driver.hub_id else {
        return NEUTRAL_SCORE;
    };

    if booking.pickup_hub_id == Some(hub_id) {
        PICKUP_HUB_SCORE
    } else if booking.delivery_hub_id == Some(hub_id) {
        DELIVERY_HUB_SCORE
    } else {
        NEUTRAL_SCORE
    }
}
