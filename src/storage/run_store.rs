//! File-backed run repository
//!
//! One JSON document per run under a store directory. Every mutation reads
//! the document, applies the change and writes it back through a temporary
//! file followed by a rename, so a crash never leaves a half-written run.
//!
//! # Example
//!
//! ```no_run
//! use setor::storage::{JsonRunStore, NewRun, RunRepository, RunStatus};
//! use std::path::Path;
//!
//! # fn example() -> anyhow::Result<()> {
//! let mut store = JsonRunStore::new(Path::new("./runs"))?;
//! let run_id = store.create_run(NewRun::new("job-1"))?;
//! store.finalize_run(&run_id, RunStatus::Done, Some(3), None)?;
//!
//! let record = store.load_run(&run_id)?.expect("run exists");
//! assert_eq!(record.status, RunStatus::Done);
//! # Ok(())
//! # }
//! ```

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use super::RunRepository;
use crate::balancer::BalanceParams;
use crate::models::{Center, CenterMetadata, Label, Point};
use crate::sector::Sector;

/// Algorithm tag recorded on every run
pub const ALGORITHM: &str = "fixed_center_balanced";

// ============================================================================
// Record Types
// ============================================================================

/// Lifecycle of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Done,
    Error,
}

/// Everything known when a run starts
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewRun {
    pub clusterization_id: String,
    pub tenant_id: Option<i64>,
    pub input_id: Option<String>,
    pub state: Option<String>,
    pub city: Option<String>,
    pub description: Option<String>,
    pub params: Option<BalanceParams>,
    pub n_points: usize,
    pub n_centers: usize,
}

impl NewRun {
    pub fn new(clusterization_id: impl Into<String>) -> Self {
        Self {
            clusterization_id: clusterization_id.into(),
            ..Default::default()
        }
    }
}

/// Persisted center with its repository id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredCenter {
    pub center_id: i64,
    pub label: Label,
    pub lat: f64,
    pub lon: f64,
    pub metadata: CenterMetadata,
}

/// Persisted sector with its repository id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredSector {
    pub sector_id: i64,
    #[serde(flatten)]
    pub sector: Sector,
}

/// Final point to sector mapping
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    pub point_id: i64,
    pub label: Label,
    pub sector_id: i64,
}

/// A run document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    pub run_id: String,
    pub algorithm: String,
    #[serde(flatten)]
    pub request: NewRun,
    pub status: RunStatus,
    pub created_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub k_final: Option<usize>,
    pub error: Option<String>,
    #[serde(default)]
    pub centers: Vec<StoredCenter>,
    #[serde(default)]
    pub sectors: Vec<StoredSector>,
    #[serde(default)]
    pub assignments: Vec<Assignment>,
}

impl RunRecord {
    /// Sector of a point, if assignments were saved
    pub fn sector_of(&self, point_id: i64) -> Option<i64> {
        self.assignments
            .iter()
            .find(|a| a.point_id == point_id)
            .map(|a| a.sector_id)
    }
}

// ============================================================================
// JSON Store
// ============================================================================

/// Run repository storing one JSON file per run
#[derive(Debug, Clone)]
pub struct JsonRunStore {
    dir: PathBuf,
}

impl JsonRunStore {
    /// Open a store, creating the directory if needed
    pub fn new(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create run store directory: {}", dir.display()))?;

        Ok(Self {
            dir: dir.to_path_buf(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_of(&self, run_id: &str) -> PathBuf {
        self.dir.join(format!("{run_id}.run.json"))
    }

    fn write(&self, record: &RunRecord) -> Result<()> {
        let filepath = self.path_of(&record.run_id);

        // Write to temp file first, then rename (atomic)
        let temp_path = filepath.with_extension("json.tmp");

        let file = File::create(&temp_path)
            .with_context(|| format!("Failed to create run file: {}", temp_path.display()))?;

        let writer = BufWriter::new(file);
        serde_json::to_writer_pretty(writer, record).context("Failed to serialize run")?;

        fs::rename(&temp_path, &filepath)
            .with_context(|| format!("Failed to rename run file: {}", filepath.display()))?;

        tracing::debug!(path = %filepath.display(), status = ?record.status, "Run saved");
        Ok(())
    }

    fn read(&self, run_id: &str) -> Result<RunRecord> {
        match self.load_run(run_id)? {
            Some(record) => Ok(record),
            None => bail!("Run not found: {run_id}"),
        }
    }

    fn update(&self, run_id: &str, change: impl FnOnce(&mut RunRecord) -> Result<()>) -> Result<()> {
        let mut record = self.read(run_id)?;
        change(&mut record)?;
        self.write(&record)
    }

    /// Ids of every stored run
    pub fn list_runs(&self) -> Result<Vec<String>> {
        let mut runs = Vec::new();

        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let path = entry.path();

            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                if let Some(run_id) = name.strip_suffix(".run.json") {
                    runs.push(run_id.to_string());
                }
            }
        }

        runs.sort();
        Ok(runs)
    }
}

impl RunRepository for JsonRunStore {
    fn create_run(&mut self, new: NewRun) -> Result<String> {
        let run_id = uuid::Uuid::new_v4().to_string();
        let record = RunRecord {
            run_id: run_id.clone(),
            algorithm: ALGORITHM.to_string(),
            request: new,
            status: RunStatus::Running,
            created_at: Utc::now(),
            finished_at: None,
            k_final: None,
            error: None,
            centers: Vec::new(),
            sectors: Vec::new(),
            assignments: Vec::new(),
        };
        self.write(&record)?;

        tracing::info!(
            run_id = %run_id,
            clusterization_id = %record.request.clusterization_id,
            "Run created"
        );
        Ok(run_id)
    }

    fn save_centers(&mut self, run_id: &str, centers: &[Center]) -> Result<BTreeMap<Label, i64>> {
        let mut ids = BTreeMap::new();
        self.update(run_id, |record| {
            let mut next_id = record.centers.len() as i64 + 1;
            for center in centers {
                record.centers.push(StoredCenter {
                    center_id: next_id,
                    label: center.label,
                    lat: center.lat,
                    lon: center.lon,
                    metadata: center.metadata.clone(),
                });
                ids.insert(center.label, next_id);
                next_id += 1;
            }
            Ok(())
        })?;
        Ok(ids)
    }

    fn save_sectors(&mut self, run_id: &str, sectors: &[Sector]) -> Result<BTreeMap<Label, i64>> {
        let mut ids = BTreeMap::new();
        self.update(run_id, |record| {
            let mut next_id = record.sectors.len() as i64 + 1;
            for sector in sectors {
                record.sectors.push(StoredSector {
                    sector_id: next_id,
                    sector: sector.clone(),
                });
                ids.insert(sector.label, next_id);
                next_id += 1;
            }
            Ok(())
        })?;
        Ok(ids)
    }

    fn save_assignments(
        &mut self,
        run_id: &str,
        points: &[Point],
        sector_ids: &BTreeMap<Label, i64>,
    ) -> Result<usize> {
        let mut assignments = Vec::with_capacity(points.len());
        for point in points {
            let Some(label) = point.cluster_label else {
                bail!("Point {} has no label", point.id);
            };
            let Some(&sector_id) = sector_ids.get(&label) else {
                bail!("Point {} references label {label} without a sector", point.id);
            };
            assignments.push(Assignment {
                point_id: point.id,
                label,
                sector_id,
            });
        }

        let saved = assignments.len();
        self.update(run_id, |record| {
            record.assignments.extend(assignments);
            Ok(())
        })?;
        Ok(saved)
    }

    fn finalize_run(
        &mut self,
        run_id: &str,
        status: RunStatus,
        k_final: Option<usize>,
        error: Option<&str>,
    ) -> Result<()> {
        self.update(run_id, |record| {
            record.status = status;
            record.finished_at = Some(Utc::now());
            record.k_final = k_final;
            record.error = error.map(str::to_string);
            Ok(())
        })?;

        tracing::info!(run_id, status = ?status, k_final, "Run finalized");
        Ok(())
    }

    fn load_run(&self, run_id: &str) -> Result<Option<RunRecord>> {
        let filepath = self.path_of(run_id);

        if !filepath.exists() {
            return Ok(None);
        }

        let file = File::open(&filepath)
            .with_context(|| format!("Failed to open run file: {}", filepath.display()))?;

        let reader = BufReader::new(file);
        let record = serde_json::from_reader(reader).context("Failed to deserialize run")?;
        Ok(Some(record))
    }
}
