//! End-to-end clustering jobs
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐   ┌─────────────┐   ┌─────────────┐   ┌─────────────┐
//! │ PointSource │   │CenterSource │   │  cluster()  │   │    Run      │
//! │   points    │──▶│   centers   │──▶│ assign/bal/ │──▶│ Repository  │
//! └─────────────┘   └─────────────┘   │ relabel/sec │   └─────────────┘
//!                                     └─────────────┘
//! ```
//!
//! [`cluster`] is the pure in-memory chain. [`BalancedClusteringJob`] wraps it
//! with loading and persistence, and marks the run as failed when any step
//! after run creation errors. [`run_concurrent`] executes independent
//! in-memory jobs on tokio's blocking pool.

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::balancer::{
    assign_nearest, balance, normalize_labels, BalanceOutcome, BalanceParams, BalanceReport,
    Relabeling,
};
use crate::centers::CenterSource;
use crate::error::{Error, Result, SetorErrorTrait};
use crate::metrics;
use crate::models::{Center, Point};
use crate::sector::{self, Sector};
use crate::storage::{NewRun, PointFilter, PointSource, RunRepository, RunStatus};
use crate::utils::format_duration;

// ============================================================================
// In-memory chain
// ============================================================================

/// Result of [`cluster`]
#[derive(Debug, Clone)]
pub struct ClusterOutput {
    /// Points with dense final labels
    pub points: Vec<Point>,
    /// Surviving centers with dense final labels
    pub centers: Vec<Center>,
    pub sectors: Vec<Sector>,
    /// Pre-relabel to final label mapping
    pub relabeling: Relabeling,
    /// Report whose `over_capacity` and `under_capacity` use sector labels;
    /// `eliminated` and `events` keep the input labels (see `relabeling`)
    pub report: BalanceReport,
}

impl ClusterOutput {
    pub fn k_final(&self) -> usize {
        self.sectors.len()
    }
}

/// Assign, balance, relabel and materialize
///
/// Any label already on the points is replaced by the nearest center.
pub fn cluster(
    mut points: Vec<Point>,
    centers: &[Center],
    params: &BalanceParams,
) -> Result<ClusterOutput> {
    let _timer = metrics::start_run_timer();

    let outcome = assign_nearest(&mut points, centers).and_then(|()| balance(points, centers, params));
    let BalanceOutcome {
        mut points,
        mut centers,
        mut report,
    } = match outcome {
        Ok(outcome) => outcome,
        Err(e) => {
            let err = Error::from(e);
            metrics::record_failure(err.category().as_str());
            return Err(err);
        }
    };
    metrics::record_report(&report);

    let relabeling = normalize_labels(&mut centers, &mut points)?;
    relabeling.apply_to_report(&mut report);
    let sectors = sector::materialize(&points, &centers, params.speed_kmh);

    Ok(ClusterOutput {
        points,
        centers,
        sectors,
        relabeling,
        report,
    })
}

// ============================================================================
// Persisted job
// ============================================================================

/// What to run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobRequest {
    /// Caller-supplied job id, generated when absent
    pub clusterization_id: Option<String>,
    pub tenant_id: Option<i64>,
    pub input_id: Option<String>,
    pub filter: PointFilter,
    pub description: Option<String>,
    pub params: BalanceParams,
}

/// Outcome of a successful job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSummary {
    pub clusterization_id: String,
    pub run_id: String,
    pub k_final: usize,
    pub n_points: usize,
    pub duration_secs: f64,
    pub report: BalanceReport,
}

/// Load, balance and persist one territory plan
#[derive(Debug, Clone)]
pub struct BalancedClusteringJob {
    request: JobRequest,
    clusterization_id: String,
}

impl BalancedClusteringJob {
    pub fn new(request: JobRequest) -> Self {
        let clusterization_id = request
            .clusterization_id
            .clone()
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        Self {
            request,
            clusterization_id,
        }
    }

    pub fn clusterization_id(&self) -> &str {
        &self.clusterization_id
    }

    /// Run the job against the given collaborators
    ///
    /// Loading failures happen before any run exists. Once the run is
    /// created, a failure finalizes it as `error` and is then returned.
    pub fn execute(
        &self,
        point_source: &mut dyn PointSource,
        center_source: &mut dyn CenterSource,
        repository: &mut dyn RunRepository,
    ) -> Result<JobSummary> {
        let started = Instant::now();
        let params = self.request.params;
        params.validate()?;

        tracing::info!(
            clusterization_id = %self.clusterization_id,
            state = ?self.request.filter.state,
            city = ?self.request.filter.city,
            "Balanced clustering job started"
        );

        let points = point_source.load_points(&self.request.filter)?;
        let centers = center_source.load_centers()?;
        tracing::info!(points = points.len(), centers = centers.len(), "Inputs loaded");

        let run_id = repository.create_run(NewRun {
            clusterization_id: self.clusterization_id.clone(),
            tenant_id: self.request.tenant_id,
            input_id: self.request.input_id.clone(),
            state: self.request.filter.state.clone(),
            city: self.request.filter.city.clone(),
            description: self.request.description.clone(),
            params: Some(params),
            n_points: points.len(),
            n_centers: centers.len(),
        })?;

        match self.persisted_run(&run_id, points, centers, repository) {
            Ok((k_final, n_points, report)) => {
                let duration_secs = started.elapsed().as_secs_f64();
                tracing::info!(
                    run_id = %run_id,
                    k_final,
                    n_points,
                    duration = %format_duration(duration_secs),
                    "Balanced clustering job finished"
                );
                Ok(JobSummary {
                    clusterization_id: self.clusterization_id.clone(),
                    run_id,
                    k_final,
                    n_points,
                    duration_secs,
                    report,
                })
            }
            Err(err) => {
                tracing::error!(run_id = %run_id, error = %err, "Balanced clustering job failed");
                if let Err(finalize_err) =
                    repository.finalize_run(&run_id, RunStatus::Error, None, Some(&err.to_string()))
                {
                    tracing::error!(run_id = %run_id, error = %finalize_err, "Failed to mark run as failed");
                }
                Err(err)
            }
        }
    }

    fn persisted_run(
        &self,
        run_id: &str,
        points: Vec<Point>,
        mut centers: Vec<Center>,
        repository: &mut dyn RunRepository,
    ) -> Result<(usize, usize, BalanceReport)> {
        let center_ids = repository.save_centers(run_id, &centers)?;
        for center in &mut centers {
            center.metadata.center_id = center_ids.get(&center.label).copied();
        }

        let output = cluster(points, &centers, &self.request.params)?;

        let sector_ids = repository.save_sectors(run_id, &output.sectors)?;
        repository.save_assignments(run_id, &output.points, &sector_ids)?;

        let k_final = output.k_final();
        repository.finalize_run(run_id, RunStatus::Done, Some(k_final), None)?;

        Ok((k_final, output.points.len(), output.report))
    }
}

// ============================================================================
// Concurrent runner
// ============================================================================

/// One independent in-memory job
#[derive(Debug, Clone)]
pub struct ClusterTask {
    pub name: String,
    pub points: Vec<Point>,
    pub centers: Vec<Center>,
    pub params: BalanceParams,
}

/// Run tasks on the blocking pool, results in task order
///
/// Tasks share nothing; a failing task does not affect the others. A
/// panicking task is reported as an error only where panics unwind; the
/// release profile aborts instead.
pub async fn run_concurrent(tasks: Vec<ClusterTask>) -> Vec<(String, Result<ClusterOutput>)> {
    let handles = tasks.into_iter().map(|task| async move {
        let name = task.name.clone();
        let joined = tokio::task::spawn_blocking(move || {
            cluster(task.points, &task.centers, &task.params)
        })
        .await;

        let result = match joined {
            Ok(result) => result,
            Err(e) => Err(Error::with_source(format!("Task {name} did not complete"), e)),
        };
        (name, result)
    });

    join_all(handles).await
}
