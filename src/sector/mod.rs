//! Sector materialization
//!
//! Turns the final (center, points) groups into immutable [`Sector`]
//! records, ready for persistence.

pub mod metrics;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::models::{Center, CenterMetadata, Label, Point};
pub use metrics::{percentile_linear, ClusterMetrics};

/// Final grouping of a center with its points
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sector {
    pub label: Label,
    pub center_lat: f64,
    pub center_lon: f64,
    pub point_count: usize,
    pub metrics: ClusterMetrics,
    /// Ids of the member points, in input order
    pub point_ids: Vec<i64>,
    /// Center pass-through data
    pub center: CenterMetadata,
}

/// Build one sector per center that still has points
///
/// Centers without points are skipped, in center order otherwise.
pub fn materialize(points: &[Point], centers: &[Center], speed_kmh: f64) -> Vec<Sector> {
    let mut members: BTreeMap<Label, Vec<&Point>> = BTreeMap::new();
    for point in points {
        if let Some(label) = point.cluster_label {
            members.entry(label).or_default().push(point);
        }
    }

    let mut sectors = Vec::with_capacity(centers.len());
    for center in centers {
        let Some(group) = members.get(&center.label).filter(|g| !g.is_empty()) else {
            tracing::debug!(label = center.label, "Center without points skipped");
            continue;
        };

        let metrics = ClusterMetrics::compute(
            group.iter().map(|p| p.coordinate()),
            center.coordinate(),
            speed_kmh,
        );

        sectors.push(Sector {
            label: center.label,
            center_lat: center.lat,
            center_lon: center.lon,
            point_count: group.len(),
            metrics,
            point_ids: group.iter().map(|p| p.id).collect(),
            center: center.metadata.clone(),
        });
    }

    sectors
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_materialize_groups_points() {
        let centers = vec![Center::new(0, 0.0, 0.0), Center::new(1, 1.0, 1.0)];
        let points = vec![
            Point::new(1, 0.0, 0.01).with_label(0),
            Point::new(2, 1.0, 1.01).with_label(1),
            Point::new(3, 0.0, 0.02).with_label(0),
        ];

        let sectors = materialize(&points, &centers, 35.0);

        assert_eq!(sectors.len(), 2);
        assert_eq!(sectors[0].label, 0);
        assert_eq!(sectors[0].point_count, 2);
        assert_eq!(sectors[0].point_ids, vec![1, 3]);
        assert_eq!(sectors[1].point_ids, vec![2]);
        assert!(sectors[0].metrics.max_distance_km > sectors[0].metrics.mean_distance_km);
    }

    #[test]
    fn test_materialize_skips_empty_center() {
        let centers = vec![Center::new(0, 0.0, 0.0), Center::new(1, 1.0, 1.0)];
        let points = vec![Point::new(1, 0.0, 0.01).with_label(0)];

        let sectors = materialize(&points, &centers, 35.0);
        assert_eq!(sectors.len(), 1);
        assert_eq!(sectors[0].label, 0);
    }

    #[test]
    fn test_materialize_keeps_center_coordinates_and_metadata() {
        let meta = CenterMetadata {
            brand: Some("Rede Sul".to_string()),
            center_id: Some(44),
            ..Default::default()
        };
        let centers = vec![Center::new(0, -23.5, -46.6).with_metadata(meta.clone())];
        let points = vec![Point::new(1, -23.51, -46.61).with_label(0)];

        let sectors = materialize(&points, &centers, 35.0);
        assert_eq!(sectors[0].center_lat, -23.5);
        assert_eq!(sectors[0].center_lon, -46.6);
        assert_eq!(sectors[0].center, meta);
    }
}
