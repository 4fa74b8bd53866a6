use anyhow::{Result, anyhow};
use map_range::MapRange;

use crate::{geometry_utils::distance_points, tracking::Keypoint};

/// Smallest pinch (fingertips touching, or nearly)
pub const MIN_DISTANCE: f32 = 0.05;
/// Widest pinch
pub const MAX_DISTANCE: f32 = 0.35;

/// Fixed distance range (in normalised frame units) which maps onto [0,1]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PinchCalibration {
    min_distance: f32,
    max_distance: f32,
}

impl Default for PinchCalibration {
    fn default() -> Self {
        PinchCalibration {
            min_distance: MIN_DISTANCE,
            max_distance: MAX_DISTANCE,
        }
    }
}

impl PinchCalibration {
    pub fn new(min_distance: f32, max_distance: f32) -> Result<Self> {
        if min_distance.is_nan()
            || max_distance.is_nan()
            || min_distance < 0.
            || max_distance <= min_distance
        {
            return Err(anyhow!(
                "Pinch calibration needs 0 <= min < max; got min={}, max={}",
                min_distance,
                max_distance
            ));
        }
        Ok(PinchCalibration {
            min_distance,
            max_distance,
        })
    }

    pub fn min_distance(&self) -> f32 {
        self.min_distance
    }

    pub fn max_distance(&self) -> f32 {
        self.max_distance
    }

    /// Rescale a pinch distance to [0,1]; anything at or below the minimum is 0,
    /// anything at or above the maximum is 1
    pub fn normalise(&self, distance: f32) -> f32 {
        if distance <= self.min_distance {
            0.
        } else if distance >= self.max_distance {
            1.
        } else {
            distance
                .map_range(self.min_distance..self.max_distance, 0. ..1.)
                .clamp(0., 1.)
        }
    }
}

/// 2D distance between thumb tip and index fingertip; depth is ignored
pub fn pinch_distance(thumb: &Keypoint, index: &Keypoint) -> f32 {
    distance_points(&thumb.position(), &index.position())
}
