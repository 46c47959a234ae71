//! Candidate ranking and population bookkeeping
//!
//! A center can receive a point when it still has room under `max_pdv` and
//! the point is reachable within the time ceiling. Candidates are ranked by
//! travel time, then distance, then the order in which they were offered.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use super::engine::BalanceParams;
use crate::geo::{haversine_km, travel_time_min};
use crate::models::{Center, Label, Point};

// ============================================================================
// Populations
// ============================================================================

/// Running point count per active center
///
/// Owned by a single engine call and rebuilt from the point labels at the
/// start of every iteration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Populations {
    counts: BTreeMap<Label, usize>,
}

impl Populations {
    /// Count points per active center; centers without points count zero
    pub fn rebuild(points: &[Point], active: &[Center]) -> Self {
        let mut counts: BTreeMap<Label, usize> = active.iter().map(|c| (c.label, 0)).collect();
        for label in points.iter().filter_map(|p| p.cluster_label) {
            if let Some(count) = counts.get_mut(&label) {
                *count += 1;
            }
        }
        Self { counts }
    }

    /// Current count for a label (zero when unknown)
    pub fn of(&self, label: Label) -> usize {
        self.counts.get(&label).copied().unwrap_or(0)
    }

    /// Room left under `max_pdv`
    pub fn remaining_capacity(&self, label: Label, max_pdv: usize) -> usize {
        max_pdv.saturating_sub(self.of(label))
    }

    /// Move one point's weight from `from` (if tracked) to `to`
    pub fn transfer(&mut self, from: Option<Label>, to: Label) {
        if let Some(count) = from.and_then(|l| self.counts.get_mut(&l)) {
            *count = count.saturating_sub(1);
        }
        *self.counts.entry(to).or_insert(0) += 1;
    }

    /// Stop tracking a removed center
    pub fn forget(&mut self, label: Label) {
        self.counts.remove(&label);
    }

    /// (label, count) pairs in ascending label order
    pub fn iter(&self) -> impl Iterator<Item = (Label, usize)> + '_ {
        self.counts.iter().map(|(l, c)| (*l, *c))
    }

    /// Labels whose count exceeds `max_pdv`, most loaded first
    pub fn over_capacity(&self, max_pdv: usize) -> Vec<(Label, usize)> {
        let mut over: Vec<(Label, usize)> = self.iter().filter(|(_, c)| *c > max_pdv).collect();
        // stable sort keeps ascending label order among equal counts
        over.sort_by(|a, b| b.1.cmp(&a.1));
        over
    }

    /// Labels whose count is below `min_pdv`, emptiest first
    pub fn under_capacity(&self, min_pdv: usize) -> Vec<(Label, usize)> {
        let mut under: Vec<(Label, usize)> = self.iter().filter(|(_, c)| *c < min_pdv).collect();
        under.sort_by(|a, b| a.1.cmp(&b.1));
        under
    }
}

// ============================================================================
// Candidate ranking
// ============================================================================

/// A center able to receive a given point
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
    pub label: Label,
    pub distance_km: f64,
    pub travel_min: f64,
}

impl Candidate {
    fn rank(&self, other: &Self) -> Ordering {
        self.travel_min
            .total_cmp(&other.travel_min)
            .then_with(|| self.distance_km.total_cmp(&other.distance_km))
    }
}

/// Best center among `centers` for `point`, if any qualifies
///
/// A center qualifies when its remaining capacity is strictly positive and
/// the travel time is within `max_time_min`. On a full tie the center
/// offered first wins.
pub fn best_candidate<'a, I>(
    point: &Point,
    centers: I,
    populations: &Populations,
    params: &BalanceParams,
) -> Option<Candidate>
where
    I: IntoIterator<Item = &'a Center>,
{
    let origin = point.coordinate();
    let mut best: Option<Candidate> = None;

    for center in centers {
        if populations.remaining_capacity(center.label, params.max_pdv) == 0 {
            continue;
        }

        let distance_km = haversine_km(origin, center.coordinate());
        let travel_min = travel_time_min(distance_km, params.speed_kmh);
        if travel_min.is_nan() || travel_min > params.max_time_min {
            continue;
        }

        let candidate = Candidate {
            label: center.label,
            distance_km,
            travel_min,
        };
        match best {
            Some(ref current) if candidate.rank(current) != Ordering::Less => {}
            _ => best = Some(candidate),
        }
    }

    best
}

/// Other active centers within `radius_km` of `reference`, nearest first
pub fn neighbors<'a>(reference: &Center, active: &'a [Center], radius_km: f64) -> Vec<&'a Center> {
    let origin = reference.coordinate();
    let mut found: Vec<(&Center, f64)> = active
        .iter()
        .filter(|c| c.label != reference.label)
        .map(|c| (c, haversine_km(origin, c.coordinate())))
        .filter(|(_, d)| *d <= radius_km)
        .collect();

    found.sort_by(|a, b| a.1.total_cmp(&b.1));
    found.into_iter().map(|(c, _)| c).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(max_pdv: usize, max_time_min: f64) -> BalanceParams {
        BalanceParams {
            min_pdv: 1,
            max_pdv,
            max_time_min,
            speed_kmh: 60.0,
            max_iterations: 10,
            neighbor_radius_km: 50.0,
        }
    }

    #[test]
    fn test_populations_rebuild_ignores_inactive_labels() {
        let centers = vec![Center::new(0, 0.0, 0.0), Center::new(1, 1.0, 1.0)];
        let points = vec![
            Point::new(1, 0.0, 0.0).with_label(0),
            Point::new(2, 0.0, 0.0).with_label(0),
            Point::new(3, 0.0, 0.0).with_label(7),
            Point::new(4, 0.0, 0.0),
        ];

        let pops = Populations::rebuild(&points, &centers);
        assert_eq!(pops.of(0), 2);
        assert_eq!(pops.of(1), 0);
        assert_eq!(pops.of(7), 0);
        assert_eq!(pops.iter().count(), 2);
    }

    #[test]
    fn test_populations_transfer() {
        let centers = vec![Center::new(0, 0.0, 0.0), Center::new(1, 1.0, 1.0)];
        let points = vec![Point::new(1, 0.0, 0.0).with_label(0)];
        let mut pops = Populations::rebuild(&points, &centers);

        pops.transfer(Some(0), 1);
        assert_eq!(pops.of(0), 0);
        assert_eq!(pops.of(1), 1);

        pops.transfer(None, 1);
        assert_eq!(pops.of(1), 2);
        assert_eq!(pops.remaining_capacity(1, 2), 0);
    }

    #[test]
    fn test_over_and_under_ordering() {
        let centers: Vec<Center> = (0..4).map(|l| Center::new(l, 0.0, 0.0)).collect();
        let mut points = Vec::new();
        for (label, n) in [(0u32, 3usize), (1, 7), (2, 1), (3, 9)] {
            for _ in 0..n {
                points.push(Point::new(points.len() as i64, 0.0, 0.0).with_label(label));
            }
        }
        let pops = Populations::rebuild(&points, &centers);

        assert_eq!(pops.over_capacity(5), vec![(3, 9), (1, 7)]);
        assert_eq!(pops.under_capacity(4), vec![(2, 1), (0, 3)]);
    }

    #[test]
    fn test_best_candidate_prefers_fastest() {
        let centers = vec![Center::new(0, 0.0, 0.1), Center::new(1, 0.0, 0.05)];
        let point = Point::new(1, 0.0, 0.0);
        let pops = Populations::rebuild(&[], &centers);

        let best = best_candidate(&point, &centers, &pops, &params(5, 60.0)).unwrap();
        assert_eq!(best.label, 1);
        assert!(best.travel_min < 6.0);
    }

    #[test]
    fn test_best_candidate_skips_full_centers() {
        let centers = vec![Center::new(0, 0.0, 0.01), Center::new(1, 0.0, 0.05)];
        let points = vec![Point::new(9, 0.0, 0.01).with_label(0)];
        let pops = Populations::rebuild(&points, &centers);

        let best = best_candidate(&Point::new(1, 0.0, 0.0), &centers, &pops, &params(1, 60.0));
        assert_eq!(best.map(|c| c.label), Some(1));
    }

    #[test]
    fn test_best_candidate_respects_time_ceiling() {
        // ~111 km away at 60 km/h is ~111 minutes
        let centers = vec![Center::new(0, 1.0, 0.0)];
        let pops = Populations::rebuild(&[], &centers);
        let point = Point::new(1, 0.0, 0.0);

        assert!(best_candidate(&point, &centers, &pops, &params(5, 100.0)).is_none());
        assert!(best_candidate(&point, &centers, &pops, &params(5, 120.0)).is_some());
    }

    #[test]
    fn test_best_candidate_zero_speed_excludes_everything() {
        let centers = vec![Center::new(0, 0.0, 0.0)];
        let pops = Populations::rebuild(&[], &centers);
        let mut p = params(5, 1e9);
        p.speed_kmh = 0.0;

        assert!(best_candidate(&Point::new(1, 0.0, 0.0), &centers, &pops, &p).is_none());
    }

    #[test]
    fn test_best_candidate_tie_keeps_first_offered() {
        let centers = vec![Center::new(4, 0.0, 0.1), Center::new(2, 0.0, -0.1)];
        let pops = Populations::rebuild(&[], &centers);
        let point = Point::new(1, 0.0, 0.0);

        let best = best_candidate(&point, &centers, &pops, &params(5, 60.0)).unwrap();
        assert_eq!(best.label, 4);
    }

    #[test]
    fn test_neighbors_sorted_and_filtered() {
        let active = vec![
            Center::new(0, 0.0, 0.0),
            Center::new(1, 0.0, 0.3),
            Center::new(2, 0.0, 0.1),
            Center::new(3, 0.0, 2.0),
        ];

        let found = neighbors(&active[0], &active, 50.0);
        let labels: Vec<Label> = found.iter().map(|c| c.label).collect();
        assert_eq!(labels, vec![2, 1]);
    }

    #[test]
    fn test_neighbors_empty_when_isolated() {
        let active = vec![Center::new(0, 0.0, 0.0), Center::new(1, 5.0, 5.0)];
        assert!(neighbors(&active[0], &active, 10.0).is_empty());
    }
}
