//! Mapping from the producer's court-plane coordinates (a 1 m x 2 m
//! calibrated plane) into fixed display-stage pixels.
//!
//! Convention: source x maps to display x, source y to display y. The center
//! of the source plane (0.5, 1.0) lands on the center of the drawn court,
//! (600, 300).

use serde::{Deserialize, Serialize};

pub const STAGE_WIDTH: f64 = 1200.0;
pub const STAGE_HEIGHT: f64 = 600.0;

pub const COURT_WIDTH: f64 = 900.0;
pub const COURT_HEIGHT: f64 = 400.0;
pub const COURT_X: f64 = 150.0;
pub const COURT_Y: f64 = 100.0;

pub const SOURCE_WIDTH: f64 = 1.0;
pub const SOURCE_HEIGHT: f64 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourtPoint {
    pub x: i32,
    pub y: i32,
}

/// Scale + offset per axis, rounded to the nearest pixel. Pure and
/// deterministic; out-of-range inputs are mapped without clamping.
pub fn to_court_point(x: f64, y: f64) -> CourtPoint {
    let scale_x = COURT_WIDTH / SOURCE_WIDTH;
    let scale_y = COURT_HEIGHT / SOURCE_HEIGHT;
    CourtPoint {
        x: (COURT_X + x * scale_x).round() as i32,
        y: (COURT_Y + y * scale_y).round() as i32,
    }
}
