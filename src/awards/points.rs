//! Bounded random point draws

use crate::config::AwardConfig;
use crate::error::{CoreError, Result};
use rand::Rng;

/// Inclusive `[min, max]` range of points awarded per tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PointRange {
    min: i64,
    max: i64,
}

impl PointRange {
    pub fn new(min: i64, max: i64) -> Result<Self> {
        if min > max {
            return Err(CoreError::Validation(format!(
                "point range is empty: min {} > max {}",
                min, max
            )));
        }
        Ok(PointRange { min, max })
    }

    pub fn from_config(config: &AwardConfig) -> Result<Self> {
        Self::new(config.min_points, config.max_points)
    }

    pub fn min(&self) -> i64 {
        self.min
    }

    pub fn max(&self) -> i64 {
        self.max
    }

    pub fn contains(&self, points: i64) -> bool {
        (self.min..=self.max).contains(&points)
    }

    /// Uniform draw, both ends inclusive
    pub fn draw<R: Rng + ?Sized>(&self, rng: &mut R) -> i64 {
        rng.random_range(self.min..=self.max)
    }
}

impl Default for PointRange {
    fn default() -> Self {
        PointRange { min: 40, max: 79 }
    }
}
