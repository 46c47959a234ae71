//! Initial nearest-center assignment
//!
//! Every point is labeled with the closest center by great-circle distance.
//! Ties go to the center that appears first in the supplied list, so the
//! result depends only on input order.

use super::error::{BalanceError, BalanceResult};
use crate::geo::haversine_km;
use crate::models::{Center, Label, Point};

/// Label every point with its nearest center
///
/// Only point labels are touched. Time and capacity limits are ignored here;
/// the engine gets the chance to repair violations afterwards.
pub fn assign_nearest(points: &mut [Point], centers: &[Center]) -> BalanceResult<()> {
    if points.is_empty() {
        return Err(BalanceError::empty_input("points"));
    }
    if centers.is_empty() {
        return Err(BalanceError::empty_input("centers"));
    }

    for point in points.iter_mut() {
        point.cluster_label = nearest_center(point, centers);
    }

    tracing::debug!(
        points = points.len(),
        centers = centers.len(),
        "Initial nearest-center assignment done"
    );
    Ok(())
}

/// Label of the closest center, first one wins on equal distance
pub fn nearest_center(point: &Point, centers: &[Center]) -> Option<Label> {
    let origin = point.coordinate();
    let mut best: Option<(Label, f64)> = None;

    for center in centers {
        let d = haversine_km(origin, center.coordinate());
        match best {
            // strict comparison keeps the earlier center on ties
            Some((_, best_d)) if d >= best_d => {}
            _ => best = Some((center.label, d)),
        }
    }

    best.map(|(label, _)| label)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assigns_nearest() {
        let centers = vec![Center::new(10, 0.0, 0.0), Center::new(20, 1.0, 1.0)];
        let mut points = vec![
            Point::new(1, 0.01, 0.01),
            Point::new(2, 0.99, 0.98),
            Point::new(3, 0.2, 0.1),
        ];

        assign_nearest(&mut points, &centers).unwrap();

        assert_eq!(points[0].cluster_label, Some(10));
        assert_eq!(points[1].cluster_label, Some(20));
        assert_eq!(points[2].cluster_label, Some(10));
    }

    #[test]
    fn test_tie_goes_to_first_center() {
        let centers = vec![Center::new(5, 0.0, 1.0), Center::new(3, 0.0, -1.0)];
        let mut points = vec![Point::new(1, 0.0, 0.0)];

        assign_nearest(&mut points, &centers).unwrap();
        assert_eq!(points[0].cluster_label, Some(5));

        let reversed: Vec<Center> = centers.into_iter().rev().collect();
        assign_nearest(&mut points, &reversed).unwrap();
        assert_eq!(points[0].cluster_label, Some(3));
    }

    #[test]
    fn test_overwrites_existing_label() {
        let centers = vec![Center::new(0, 0.0, 0.0)];
        let mut points = vec![Point::new(1, 0.1, 0.1).with_label(42)];

        assign_nearest(&mut points, &centers).unwrap();
        assert_eq!(points[0].cluster_label, Some(0));
    }

    #[test]
    fn test_empty_points() {
        let centers = vec![Center::new(0, 0.0, 0.0)];
        let err = assign_nearest(&mut [], &centers).unwrap_err();
        assert_eq!(err, BalanceError::EmptyInput { what: "points" });
    }

    #[test]
    fn test_empty_centers() {
        let mut points = vec![Point::new(1, 0.0, 0.0)];
        let err = assign_nearest(&mut points, &[]).unwrap_err();
        assert_eq!(err, BalanceError::EmptyInput { what: "centers" });
    }
}
