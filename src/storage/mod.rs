//! Input loading and run persistence
//!
//! [`PointSource`] provides the points of sale of a job, [`RunRepository`]
//! records runs, centers, sectors and the final point mapping. Both come
//! with file-backed implementations.

pub mod run_store;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::balancer::BalanceError;
use crate::models::{Center, Label, Point};
use crate::sector::Sector;
use crate::utils::normalize_whitespace;
pub use run_store::{
    Assignment, JsonRunStore, NewRun, RunRecord, RunStatus, StoredCenter, StoredSector, ALGORITHM,
};

// ============================================================================
// Points
// ============================================================================

/// Optional state/city restriction applied when loading points
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointFilter {
    pub state: Option<String>,
    pub city: Option<String>,
}

impl PointFilter {
    pub fn new(state: Option<String>, city: Option<String>) -> Self {
        Self { state, city }
    }

    /// Case-insensitive match; an unset criterion matches everything
    pub fn matches(&self, point: &Point) -> bool {
        fn same(wanted: &Option<String>, actual: &Option<String>) -> bool {
            match wanted.as_deref().map(normalize_whitespace) {
                None => true,
                Some(w) if w.is_empty() => true,
                Some(w) => actual
                    .as_deref()
                    .map(normalize_whitespace)
                    .is_some_and(|a| a.to_lowercase() == w.to_lowercase()),
            }
        }
        same(&self.state, &point.state) && same(&self.city, &point.city)
    }
}

/// Provides the points of a job
pub trait PointSource {
    /// Load points matching `filter`; finding none is an error
    fn load_points(&mut self, filter: &PointFilter) -> crate::error::Result<Vec<Point>>;
}

/// Points stored as a JSON array
#[derive(Debug, Clone)]
pub struct JsonPointSource {
    path: PathBuf,
}

impl JsonPointSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl PointSource for JsonPointSource {
    fn load_points(&mut self, filter: &PointFilter) -> crate::error::Result<Vec<Point>> {
        let content = std::fs::read_to_string(&self.path)?;
        let all: Vec<Point> = serde_json::from_str(&content)?;
        let total = all.len();

        let points: Vec<Point> = all.into_iter().filter(|p| filter.matches(p)).collect();
        tracing::info!(
            total,
            selected = points.len(),
            state = ?filter.state,
            city = ?filter.city,
            "Points loaded"
        );

        if points.is_empty() {
            return Err(BalanceError::empty_input("points").into());
        }
        Ok(points)
    }
}

// ============================================================================
// Runs
// ============================================================================

/// Persists runs and their results
pub trait RunRepository {
    /// Register a new run in `running` state and return its id
    fn create_run(&mut self, new: NewRun) -> Result<String>;

    /// Store centers, returning the repository id of each label
    fn save_centers(&mut self, run_id: &str, centers: &[Center]) -> Result<BTreeMap<Label, i64>>;

    /// Store sectors, returning the repository id of each label
    fn save_sectors(&mut self, run_id: &str, sectors: &[Sector]) -> Result<BTreeMap<Label, i64>>;

    /// Store the point to sector mapping, returning the number of rows
    fn save_assignments(
        &mut self,
        run_id: &str,
        points: &[Point],
        sector_ids: &BTreeMap<Label, i64>,
    ) -> Result<usize>;

    /// Close the run with its final status
    fn finalize_run(
        &mut self,
        run_id: &str,
        status: RunStatus,
        k_final: Option<usize>,
        error: Option<&str>,
    ) -> Result<()>;

    fn load_run(&self, run_id: &str) -> Result<Option<RunRecord>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn located(id: i64, city: &str, state: &str) -> Point {
        Point::new(id, -23.5, -46.6).with_location(city, state)
    }

    #[test]
    fn test_filter_is_case_insensitive() {
        let filter = PointFilter::new(Some("sp".into()), Some("SAO  PAULO".into()));
        assert!(filter.matches(&located(1, "Sao Paulo", "SP")));
        assert!(!filter.matches(&located(2, "Campinas", "SP")));
        assert!(!filter.matches(&Point::new(3, 0.0, 0.0)));
    }

    #[test]
    fn test_empty_filter_matches_all() {
        assert!(PointFilter::default().matches(&Point::new(1, 0.0, 0.0)));
        let blank = PointFilter::new(Some(" ".into()), None);
        assert!(blank.matches(&located(1, "Recife", "PE")));
    }

    #[test]
    fn test_json_point_source() {
        let points = vec![located(1, "Recife", "PE"), located(2, "Olinda", "PE")];
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(serde_json::to_string(&points).unwrap().as_bytes())
            .unwrap();

        let mut source = JsonPointSource::new(file.path());
        let loaded = source
            .load_points(&PointFilter::new(None, Some("olinda".into())))
            .unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].id, 2);

        let err = source
            .load_points(&PointFilter::new(Some("SP".into()), None))
            .unwrap_err();
        assert!(matches!(
            err,
            crate::error::Error::Balance(BalanceError::EmptyInput { what: "points" })
        ));
    }
}
