//! Property tests for the balancing engine on random instances

use proptest::prelude::*;
use setor::balancer::{assign_nearest, balance, BalanceError, BalanceEvent, BalanceParams};
use setor::geo::{haversine_km, travel_time_min};
use setor::models::{Center, Point};

fn coordinate() -> impl Strategy<Value = (f64, f64)> {
    (-0.2f64..0.2, -0.2f64..0.2)
}

fn instance() -> impl Strategy<Value = (Vec<Point>, Vec<Center>, BalanceParams)> {
    (
        prop::collection::vec(coordinate(), 1..60),
        prop::collection::vec(coordinate(), 1..6),
        1usize..6,
        0usize..20,
        5.0f64..60.0,
        0.0f64..30.0,
    )
        .prop_map(|(points, centers, min_pdv, spread, max_time_min, radius)| {
            let points = points
                .into_iter()
                .enumerate()
                .map(|(i, (lat, lon))| Point::new(i as i64, lat, lon))
                .collect();
            let centers = centers
                .into_iter()
                .enumerate()
                .map(|(i, (lat, lon))| Center::new(i as u32 * 3 + 1, lat, lon))
                .collect();
            let params = BalanceParams {
                min_pdv,
                max_pdv: min_pdv + spread,
                max_time_min,
                speed_kmh: 35.0,
                max_iterations: 8,
                neighbor_radius_km: radius,
            };
            (points, centers, params)
        })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn balance_keeps_structural_invariants((points, centers, params) in instance()) {
        let mut points = points;
        assign_nearest(&mut points, &centers).unwrap();
        let initial = points.clone();

        let outcome = match balance(points, &centers, &params) {
            Ok(outcome) => outcome,
            Err(BalanceError::LastCenter { .. }) => return Ok(()),
            Err(e) => return Err(TestCaseError::fail(format!("unexpected error: {e}"))),
        };

        // Monotonic center count, no invented labels, no drift
        prop_assert!(outcome.centers.len() <= centers.len());
        prop_assert!(!outcome.centers.is_empty());
        for survivor in &outcome.centers {
            let original = centers.iter().find(|c| c.label == survivor.label);
            prop_assert!(original.is_some());
            let original = original.unwrap();
            prop_assert_eq!(survivor.lat.to_bits(), original.lat.to_bits());
            prop_assert_eq!(survivor.lon.to_bits(), original.lon.to_bits());
        }

        // Same points, in the same order, each on a surviving center
        prop_assert_eq!(outcome.points.len(), initial.len());
        for (after, before) in outcome.points.iter().zip(&initial) {
            prop_assert_eq!(after.id, before.id);
            let label = after.cluster_label;
            prop_assert!(outcome.centers.iter().any(|c| Some(c.label) == label));
        }

        // Every surviving center keeps at least one point
        for center in &outcome.centers {
            prop_assert!(outcome.points.iter().any(|p| p.cluster_label == Some(center.label)));
        }

        // Stopped for a reason that is reported
        let exhausted = outcome
            .report
            .events
            .iter()
            .any(|e| matches!(e, BalanceEvent::IterationBudgetExhausted { .. }));
        prop_assert!(outcome.report.converged != exhausted);
    }

    #[test]
    fn moved_points_stay_within_time_ceiling((points, centers, params) in instance()) {
        let mut points = points;
        assign_nearest(&mut points, &centers).unwrap();
        let initial = points.clone();

        let Ok(outcome) = balance(points, &centers, &params) else {
            return Ok(());
        };

        for (after, before) in outcome.points.iter().zip(&initial) {
            if after.cluster_label == before.cluster_label {
                continue;
            }
            let center = outcome
                .centers
                .iter()
                .find(|c| Some(c.label) == after.cluster_label)
                .unwrap();
            let minutes = travel_time_min(
                haversine_km(after.coordinate(), center.coordinate()),
                params.speed_kmh,
            );
            prop_assert!(minutes <= params.max_time_min);
        }
    }

    #[test]
    fn moves_never_push_a_center_over_capacity((points, centers, params) in instance()) {
        let mut points = points;
        assign_nearest(&mut points, &centers).unwrap();
        let initial = points.clone();

        let Ok(outcome) = balance(points, &centers, &params) else {
            return Ok(());
        };

        for center in &outcome.centers {
            let before = initial.iter().filter(|p| p.cluster_label == Some(center.label)).count();
            let after = outcome.points.iter().filter(|p| p.cluster_label == Some(center.label)).count();
            if after > before {
                prop_assert!(after <= params.max_pdv);
            }
        }
    }
}
