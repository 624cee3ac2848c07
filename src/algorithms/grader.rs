// Batch grading: time tier plus discount penalty

use crate::models::{Grade, Minutes, Order, RouteMetrics, BATCH_SIZE};
use crate::oracle::TravelCostOracle;

/// Upper bound (minutes) on total route time for tiers 10 down to 1
pub const TIER_MAX_TIMES: [Minutes; 10] = [
    60.0, 65.0, 70.0, 75.0, 80.0, 85.0, 90.0, 95.0, 100.0, 105.0,
];

/// Points granted per order delivered without discount
const POINTS_PER_ON_TIME_ORDER: Grade = 2;

/// Grade of a batch together with the metrics it was computed from
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Assessment {
    pub grade: Grade,
    pub total_time: Minutes,
    pub discount_count: usize,
}

/// Time tier of a total route time: 10 when within 60 minutes, 0 past 105
pub fn time_tier(total_time: Minutes) -> Grade {
    TIER_MAX_TIMES
        .iter()
        .position(|max| total_time <= *max)
        .map_or(0, |index| 10 - index as Grade)
}

/// Final grade from a total time and a discount count
///
/// The discount penalty is always measured against a full batch of
/// `BATCH_SIZE` orders, whatever the actual batch length.
pub fn grade_of(total_time: Minutes, discount_count: usize) -> Grade {
    time_tier(total_time) + POINTS_PER_ON_TIME_ORDER * (BATCH_SIZE as Grade - discount_count as Grade)
}

/// Scores batches on a 0-20 scale
pub struct Grader<'a> {
    metrics: RouteMetrics<'a>,
}

impl<'a> Grader<'a> {
    pub fn new(oracle: &'a TravelCostOracle) -> Self {
        Self {
            metrics: RouteMetrics::new(oracle),
        }
    }

    pub fn assess(&self, batch: &[Order]) -> Assessment {
        let total_time = self.metrics.total_time(batch);
        let discount_count = self.metrics.discount_count(batch);

        Assessment {
            grade: grade_of(total_time, discount_count),
            total_time,
            discount_count,
        }
    }

    pub fn grade(&self, batch: &[Order]) -> Grade {
        self.assess(batch).grade
    }
}
