//! Iterative excess/deficit balancing with fixed centers
//!
//! Each iteration runs three steps over the current labeling:
//!
//! 1. consistency repair of points whose center is gone,
//! 2. excess resolution, moving border points of overloaded centers to
//!    neighbors with room,
//! 3. deficit resolution, dissolving under-populated centers when every one
//!    of their points can be rehomed, rolling back otherwise.
//!
//! The loop stops after an iteration without label changes or when the
//! iteration budget runs out. Both are successful outcomes; residual
//! imbalance is reported, not raised.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::candidate::{best_candidate, neighbors, Populations};
use super::error::{BalanceError, BalanceResult};
use crate::geo::{haversine_km, Coordinate};
use crate::models::{Center, Label, Point};

// ============================================================================
// Parameters
// ============================================================================

/// Tuning knobs for one balancing run
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BalanceParams {
    /// Minimum points per surviving center
    pub min_pdv: usize,

    /// Maximum points per center
    pub max_pdv: usize,

    /// Travel-time ceiling from a point to its center, in minutes
    pub max_time_min: f64,

    /// Constant average speed used to turn distance into time
    pub speed_kmh: f64,

    /// Iteration budget
    pub max_iterations: usize,

    /// Centers closer than this are neighbors during rebalancing
    pub neighbor_radius_km: f64,
}

impl Default for BalanceParams {
    fn default() -> Self {
        Self {
            min_pdv: 1,
            max_pdv: 200,
            max_time_min: 15.0,
            speed_kmh: 35.0,
            max_iterations: 10,
            neighbor_radius_km: 10.0,
        }
    }
}

impl BalanceParams {
    /// Check parameter consistency
    pub fn validate(&self) -> BalanceResult<()> {
        if self.min_pdv == 0 {
            return Err(BalanceError::invalid_parameter("min_pdv", "must be at least 1"));
        }
        if self.max_pdv == 0 {
            return Err(BalanceError::invalid_parameter("max_pdv", "must be at least 1"));
        }
        if self.min_pdv > self.max_pdv {
            return Err(BalanceError::invalid_parameter(
                "min_pdv",
                format!("{} exceeds max_pdv {}", self.min_pdv, self.max_pdv),
            ));
        }
        if !(self.max_time_min.is_finite() && self.max_time_min > 0.0) {
            return Err(BalanceError::invalid_parameter(
                "max_time_min",
                "must be a positive number of minutes",
            ));
        }
        if !self.speed_kmh.is_finite() {
            return Err(BalanceError::invalid_parameter("speed_kmh", "must be finite"));
        }
        if self.max_iterations == 0 {
            return Err(BalanceError::invalid_parameter(
                "max_iterations",
                "must be at least 1",
            ));
        }
        if !self.neighbor_radius_km.is_finite() || self.neighbor_radius_km < 0.0 {
            return Err(BalanceError::invalid_parameter(
                "neighbor_radius_km",
                "must be a finite distance, zero or positive",
            ));
        }
        Ok(())
    }
}

// ============================================================================
// Report
// ============================================================================

/// Notable, non-fatal things that happened during a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BalanceEvent {
    /// Overloaded center with no other center inside the neighbor radius
    ExcessWithoutNeighbors {
        iteration: usize,
        label: Label,
        count: usize,
    },

    /// Overloaded center whose neighbors could not absorb all of the excess
    ExcessRemaining {
        iteration: usize,
        label: Label,
        remaining: usize,
    },

    /// Center dissolved and its points rehomed
    CenterEliminated {
        iteration: usize,
        label: Label,
        reassigned: usize,
    },

    /// Elimination abandoned because one point had nowhere to go
    EliminationRolledBack {
        iteration: usize,
        label: Label,
        count: usize,
        stuck_point_id: i64,
    },

    /// Budget ran out while the last iteration still moved points
    IterationBudgetExhausted { iterations: usize },
}

/// Per-iteration summary
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IterationStats {
    pub iteration: usize,
    pub repaired: usize,
    pub excess_moves: usize,
    pub deficit_moves: usize,
    pub centers_eliminated: usize,
    pub active_centers: usize,
    pub over_capacity: usize,
    pub under_capacity: usize,
}

impl IterationStats {
    /// Label changes made in this iteration
    pub fn moves(&self) -> usize {
        self.repaired + self.excess_moves + self.deficit_moves
    }
}

/// Outcome details of a balancing run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BalanceReport {
    /// Iterations actually executed
    pub iterations: usize,

    /// Stopped because an iteration made no label change
    pub converged: bool,

    /// Label changes across all iterations
    pub total_moves: usize,

    pub initial_centers: usize,
    pub final_centers: usize,

    /// Labels removed from the active set, in removal order
    ///
    /// Always in the labels the run started with.
    pub eliminated: Vec<Label>,

    /// Surviving centers above `max_pdv` as (label, count)
    pub over_capacity: Vec<(Label, usize)>,

    /// Surviving centers below `min_pdv` as (label, count)
    pub under_capacity: Vec<(Label, usize)>,

    /// Events, in the labels the run started with
    pub events: Vec<BalanceEvent>,
    pub history: Vec<IterationStats>,
}

impl BalanceReport {
    /// Every surviving center is inside `[min_pdv, max_pdv]`
    pub fn is_balanced(&self) -> bool {
        self.over_capacity.is_empty() && self.under_capacity.is_empty()
    }

    /// Number of rolled-back eliminations
    pub fn rollbacks(&self) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e, BalanceEvent::EliminationRolledBack { .. }))
            .count()
    }

    /// Number of excess resolutions blocked by a missing neighbor
    pub fn isolated_excess(&self) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e, BalanceEvent::ExcessWithoutNeighbors { .. }))
            .count()
    }
}

/// Points, surviving centers and report returned by a run
#[derive(Debug, Clone)]
pub struct BalanceOutcome {
    pub points: Vec<Point>,
    pub centers: Vec<Center>,
    pub report: BalanceReport,
}

// ============================================================================
// Engine
// ============================================================================

/// Balancer with validated parameters
#[derive(Debug, Clone)]
pub struct BalanceEngine {
    params: BalanceParams,
}

impl BalanceEngine {
    /// Create an engine, rejecting inconsistent parameters
    pub fn new(params: BalanceParams) -> BalanceResult<Self> {
        params.validate()?;
        Ok(Self { params })
    }

    pub fn params(&self) -> &BalanceParams {
        &self.params
    }

    /// Balance `points` over copies of `centers`
    ///
    /// Points are expected to carry labels (see
    /// [`super::assignment::assign_nearest`]); unlabeled ones are placed by
    /// the consistency repair step. Centers are cloned, the caller's slice is
    /// never touched. On error the points are dropped with the run.
    pub fn run(&self, points: Vec<Point>, centers: &[Center]) -> BalanceResult<BalanceOutcome> {
        check_input(&points, centers)?;

        tracing::info!(
            centers = centers.len(),
            points = points.len(),
            min_pdv = self.params.min_pdv,
            max_pdv = self.params.max_pdv,
            max_time_min = self.params.max_time_min,
            speed_kmh = self.params.speed_kmh,
            neighbor_radius_km = self.params.neighbor_radius_km,
            "Balancing started"
        );

        let mut run = Run {
            params: &self.params,
            points,
            active: centers.to_vec(),
            populations: Populations::default(),
            report: BalanceReport {
                initial_centers: centers.len(),
                ..Default::default()
            },
            iteration: 0,
        };

        for iteration in 1..=self.params.max_iterations {
            run.iteration = iteration;
            let stats = run.step()?;
            let moves = stats.moves();

            tracing::info!(
                iteration,
                max_iterations = self.params.max_iterations,
                moves,
                over = stats.over_capacity,
                under = stats.under_capacity,
                centers = stats.active_centers,
                "Balancing iteration finished"
            );

            run.report.total_moves += moves;
            run.report.iterations = iteration;
            run.report.history.push(stats);

            if moves == 0 {
                run.report.converged = true;
                tracing::info!(iteration, "Balancing converged");
                break;
            }
        }

        if !run.report.converged {
            tracing::warn!(
                iterations = run.report.iterations,
                "Iteration budget exhausted before convergence"
            );
            run.report.events.push(BalanceEvent::IterationBudgetExhausted {
                iterations: run.report.iterations,
            });
        }

        Ok(run.finish())
    }
}

/// Balance `points` over `centers` with `params`
pub fn balance(
    points: Vec<Point>,
    centers: &[Center],
    params: &BalanceParams,
) -> BalanceResult<BalanceOutcome> {
    BalanceEngine::new(*params)?.run(points, centers)
}

fn check_input(points: &[Point], centers: &[Center]) -> BalanceResult<()> {
    if points.is_empty() {
        return Err(BalanceError::empty_input("points"));
    }
    if centers.is_empty() {
        return Err(BalanceError::empty_input("centers"));
    }

    let mut seen = BTreeSet::new();
    for center in centers {
        if !seen.insert(center.label) {
            return Err(BalanceError::invalid_parameter(
                "centers",
                format!("duplicate label {}", center.label),
            ));
        }
        if !(center.lat.is_finite() && center.lon.is_finite()) {
            return Err(BalanceError::invalid_parameter(
                "centers",
                format!("center {} has non-finite coordinates", center.label),
            ));
        }
    }

    if let Some(p) = points.iter().find(|p| !p.has_finite_coordinates()) {
        return Err(BalanceError::invalid_parameter(
            "points",
            format!("point {} has non-finite coordinates", p.id),
        ));
    }

    Ok(())
}

// ============================================================================
// Run state
// ============================================================================

/// Working state owned by one balancing call
struct Run<'p> {
    params: &'p BalanceParams,
    points: Vec<Point>,
    active: Vec<Center>,
    populations: Populations,
    report: BalanceReport,
    iteration: usize,
}

impl Run<'_> {
    fn step(&mut self) -> BalanceResult<IterationStats> {
        self.populations = Populations::rebuild(&self.points, &self.active);

        let repaired = self.repair()?;
        let excess_moves = self.resolve_excess();
        let (deficit_moves, centers_eliminated) = self.resolve_deficit()?;

        Ok(IterationStats {
            iteration: self.iteration,
            repaired,
            excess_moves,
            deficit_moves,
            centers_eliminated,
            active_centers: self.active.len(),
            over_capacity: self.populations.over_capacity(self.params.max_pdv).len(),
            under_capacity: self.populations.under_capacity(self.params.min_pdv).len(),
        })
    }

    /// Place points whose label is unset or points at a removed center
    fn repair(&mut self) -> BalanceResult<usize> {
        let params = self.params;
        let active_labels: BTreeSet<Label> = self.active.iter().map(|c| c.label).collect();
        let mut repaired = 0;

        for idx in 0..self.points.len() {
            if self.points[idx]
                .cluster_label
                .is_some_and(|l| active_labels.contains(&l))
            {
                continue;
            }

            let point = &self.points[idx];
            let best = best_candidate(point, &self.active, &self.populations, params)
                .ok_or(BalanceError::NoViableCandidate { point_id: point.id })?;

            tracing::debug!(
                point_id = point.id,
                from = ?point.cluster_label,
                to = best.label,
                "Orphaned point reassigned"
            );
            self.points[idx].cluster_label = Some(best.label);
            self.populations.transfer(None, best.label);
            repaired += 1;
        }

        Ok(repaired)
    }

    /// Move border points out of centers above `max_pdv`
    fn resolve_excess(&mut self) -> usize {
        let params = self.params;
        let mut moved = 0;

        for (label, _) in self.populations.over_capacity(params.max_pdv) {
            let mut excess = self.populations.of(label).saturating_sub(params.max_pdv);
            if excess == 0 {
                continue;
            }
            let Some(reference) = self.active.iter().find(|c| c.label == label) else {
                continue;
            };

            let nearby = neighbors(reference, &self.active, params.neighbor_radius_km);
            if nearby.is_empty() {
                let count = self.populations.of(label);
                tracing::warn!(
                    label,
                    count,
                    radius_km = params.neighbor_radius_km,
                    "Overloaded center has no neighbor within radius"
                );
                self.report.events.push(BalanceEvent::ExcessWithoutNeighbors {
                    iteration: self.iteration,
                    label,
                    count,
                });
                continue;
            }

            for idx in border_points(&self.points, label, reference.coordinate()) {
                if excess == 0 {
                    break;
                }
                let Some(best) = best_candidate(
                    &self.points[idx],
                    nearby.iter().copied(),
                    &self.populations,
                    params,
                ) else {
                    continue;
                };

                self.points[idx].cluster_label = Some(best.label);
                self.populations.transfer(Some(label), best.label);
                excess -= 1;
                moved += 1;
            }

            if excess > 0 {
                tracing::warn!(
                    label,
                    remaining = excess,
                    "Excess kept: neighbors lack capacity or are out of time reach"
                );
                self.report.events.push(BalanceEvent::ExcessRemaining {
                    iteration: self.iteration,
                    label,
                    remaining: excess,
                });
            }
        }

        moved
    }

    /// Dissolve centers below `min_pdv`, emptiest first
    ///
    /// Returns (label changes kept, centers removed).
    fn resolve_deficit(&mut self) -> BalanceResult<(usize, usize)> {
        let params = self.params;
        let mut moved = 0;
        let mut removed = 0;

        for (label, _) in self.populations.under_capacity(params.min_pdv) {
            let Some(pos) = self.active.iter().position(|c| c.label == label) else {
                continue;
            };
            let count = self.populations.of(label);
            if count >= params.min_pdv {
                // refilled by an earlier elimination in this step
                continue;
            }
            if self.active.len() == 1 {
                return Err(BalanceError::LastCenter { label });
            }

            if count == 0 {
                self.drop_center(pos);
                removed += 1;
                tracing::info!(label, "Empty center dropped");
                self.report.events.push(BalanceEvent::CenterEliminated {
                    iteration: self.iteration,
                    label,
                    reassigned: 0,
                });
                continue;
            }

            match self.try_eliminate(pos) {
                Ok(reassigned) => {
                    self.drop_center(pos);
                    moved += reassigned;
                    removed += 1;
                    tracing::info!(label, count, reassigned, "Center eliminated");
                    self.report.events.push(BalanceEvent::CenterEliminated {
                        iteration: self.iteration,
                        label,
                        reassigned,
                    });
                }
                Err(stuck_point_id) => {
                    tracing::warn!(
                        label,
                        count,
                        stuck_point_id,
                        "Elimination rolled back: a point has no viable center"
                    );
                    self.report.events.push(BalanceEvent::EliminationRolledBack {
                        iteration: self.iteration,
                        label,
                        count,
                        stuck_point_id,
                    });
                }
            }
        }

        Ok((moved, removed))
    }

    /// Rehome every point of `active[pos]`, all or nothing
    ///
    /// On success returns how many points moved. On failure every move made
    /// by this attempt is undone, labels and populations alike, and the id of
    /// the point that could not be placed is returned.
    fn try_eliminate(&mut self, pos: usize) -> Result<usize, i64> {
        let params = self.params;
        let reference = &self.active[pos];
        let label = reference.label;

        let members = border_points(&self.points, label, reference.coordinate());
        let nearby = neighbors(reference, &self.active, params.neighbor_radius_km);
        let others: Vec<&Center> = self.active.iter().filter(|c| c.label != label).collect();

        let mut journal: Vec<(usize, Label)> = Vec::with_capacity(members.len());
        let mut stuck = None;

        for idx in members {
            let point = &self.points[idx];
            let best = best_candidate(point, nearby.iter().copied(), &self.populations, params)
                .or_else(|| best_candidate(point, others.iter().copied(), &self.populations, params));

            match best {
                Some(target) => {
                    journal.push((idx, label));
                    self.points[idx].cluster_label = Some(target.label);
                    self.populations.transfer(Some(label), target.label);
                }
                None => {
                    stuck = Some(point.id);
                    break;
                }
            }
        }

        match stuck {
            None => Ok(journal.len()),
            Some(point_id) => {
                for (idx, original) in journal.into_iter().rev() {
                    let moved_to = self.points[idx].cluster_label;
                    self.points[idx].cluster_label = Some(original);
                    if let Some(to) = moved_to {
                        self.populations.transfer(Some(to), original);
                    }
                }
                Err(point_id)
            }
        }
    }

    fn drop_center(&mut self, pos: usize) {
        let center = self.active.remove(pos);
        self.populations.forget(center.label);
        self.report.eliminated.push(center.label);
    }

    /// Drop centers emptied along the way and fill in the final report
    fn finish(mut self) -> BalanceOutcome {
        self.populations = Populations::rebuild(&self.points, &self.active);

        let populations = &self.populations;
        let (kept, emptied): (Vec<Center>, Vec<Center>) = self
            .active
            .into_iter()
            .partition(|c| populations.of(c.label) > 0);

        for center in &emptied {
            tracing::info!(label = center.label, "Empty center removed at cleanup");
            self.report.eliminated.push(center.label);
            self.populations.forget(center.label);
        }

        self.report.final_centers = kept.len();
        self.report.over_capacity = self.populations.over_capacity(self.params.max_pdv);
        self.report.under_capacity = self.populations.under_capacity(self.params.min_pdv);

        tracing::info!(
            centers = kept.len(),
            points = self.points.len(),
            iterations = self.report.iterations,
            converged = self.report.converged,
            over = self.report.over_capacity.len(),
            under = self.report.under_capacity.len(),
            "Balancing done"
        );

        BalanceOutcome {
            points: self.points,
            centers: kept,
            report: self.report,
        }
    }
}

/// Indices of the points labeled `label`, farthest from `origin` first
///
/// Equal distances keep input order.
fn border_points(points: &[Point], label: Label, origin: Coordinate) -> Vec<usize> {
    let mut members: Vec<(usize, f64)> = points
        .iter()
        .enumerate()
        .filter(|(_, p)| p.cluster_label == Some(label))
        .map(|(i, p)| (i, haversine_km(p.coordinate(), origin)))
        .collect();

    members.sort_by(|a, b| b.1.total_cmp(&a.1));
    members.into_iter().map(|(i, _)| i).collect()
}
