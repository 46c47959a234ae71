//! Descriptive statistics for one center and its points

use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

use crate::geo::{haversine_km, travel_time_min, Coordinate};

/// Distance and travel-time figures of a sector
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ClusterMetrics {
    pub mean_distance_km: f64,
    pub max_distance_km: f64,
    pub mean_travel_min: f64,
    pub max_travel_min: f64,
    /// 95th percentile of the point-to-center distances
    pub p95_distance_km: f64,
}

impl ClusterMetrics {
    /// Compute metrics for `members` around a fixed `center`
    ///
    /// Members with non-finite coordinates are ignored; with nothing left
    /// every figure is zero.
    pub fn compute<I>(members: I, center: Coordinate, speed_kmh: f64) -> Self
    where
        I: IntoIterator<Item = Coordinate>,
    {
        let mut distances: Vec<f64> = members
            .into_iter()
            .filter(|c| c.lat.is_finite() && c.lon.is_finite())
            .map(|c| haversine_km(c, center))
            .collect();

        if distances.is_empty() {
            return Self::default();
        }

        let mean = Statistics::mean(distances.iter());
        let max = Statistics::max(distances.iter());

        distances.sort_by(f64::total_cmp);
        let p95 = percentile_linear(&distances, 95.0);

        Self {
            mean_distance_km: mean,
            max_distance_km: max,
            mean_travel_min: travel_time_min(mean, speed_kmh),
            max_travel_min: travel_time_min(max, speed_kmh),
            p95_distance_km: p95,
        }
    }
}

/// Percentile of sorted data, interpolating linearly between closest ranks
///
/// `q` is in percent. Returns 0.0 for empty input.
pub fn percentile_linear(sorted: &[f64], q: f64) -> f64 {
    match sorted.len() {
        0 => 0.0,
        1 => sorted[0],
        n => {
            let rank = (q.clamp(0.0, 100.0) / 100.0) * (n - 1) as f64;
            let lo = rank.floor() as usize;
            let hi = rank.ceil() as usize;
            let frac = rank - lo as f64;
            sorted[lo] + (sorted[hi] - sorted[lo]) * frac
        }
    }
}
