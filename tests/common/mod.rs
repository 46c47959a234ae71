//! Common test utilities

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use setor::balancer::BalanceParams;
use setor::models::{Center, Label, Point};

/// `n` points on a short eastward line starting at (lat, lon)
///
/// Ids run from `first_id`; each point is `step` degrees farther east, so
/// higher ids are farther from the start.
pub fn line_of_points(first_id: i64, n: usize, lat: f64, lon: f64, step: f64) -> Vec<Point> {
    (0..n)
        .map(|i| Point::new(first_id + i as i64, lat, lon + step * i as f64))
        .collect()
}

/// Same as [`line_of_points`] with every point labeled `label`
#[allow(dead_code)]
pub fn labeled_line(
    first_id: i64,
    n: usize,
    lat: f64,
    lon: f64,
    step: f64,
    label: Label,
) -> Vec<Point> {
    line_of_points(first_id, n, lat, lon, step)
        .into_iter()
        .map(|p| p.with_label(label))
        .collect()
}

/// Parameters with the given capacity bounds and generous reach
#[allow(dead_code)]
pub fn params(min_pdv: usize, max_pdv: usize, max_time_min: f64, radius_km: f64) -> BalanceParams {
    BalanceParams {
        min_pdv,
        max_pdv,
        max_time_min,
        speed_kmh: 35.0,
        max_iterations: 10,
        neighbor_radius_km: radius_km,
    }
}

/// Four centers around the corners of a ~10 km square near the equator
#[allow(dead_code)]
pub fn square_centers() -> Vec<Center> {
    vec![
        Center::new(0, -0.03, -0.03),
        Center::new(1, -0.03, 0.03),
        Center::new(2, 0.03, -0.03),
        Center::new(3, 0.03, 0.03),
    ]
}

/// `n` points uniformly spread over the same square, reproducible per seed
#[allow(dead_code)]
pub fn uniform_points(n: usize, seed: u64) -> Vec<Point> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    (0..n)
        .map(|i| {
            Point::new(
                i as i64,
                rng.gen_range(-0.045..0.045),
                rng.gen_range(-0.045..0.045),
            )
        })
        .collect()
}

/// Count of points carrying `label`
#[allow(dead_code)]
pub fn count_of(points: &[Point], label: Label) -> usize {
    points
        .iter()
        .filter(|p| p.cluster_label == Some(label))
        .count()
}
