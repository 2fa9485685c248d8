use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ScoreBreakdown {
    pub rating_score: f64,
    pub experience_score: f64,
    pub proximity_score: f64,
    pub hub_score: f64,
}

/// Winning candidate of a matching round.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriverMatch {
    pub driver_id: Uuid,
    pub score: f64,
    pub score_breakdown: ScoreBreakdown,
}
