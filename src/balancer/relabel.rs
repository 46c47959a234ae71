//! Dense relabeling of surviving centers
//!
//! Eliminations leave holes in the label space. The surviving labels are
//! mapped, order preserved, onto `0..k`.

use std::collections::BTreeMap;

use super::engine::BalanceReport;
use super::error::{BalanceError, BalanceResult};
use crate::models::{Center, Label, Point};

/// Order-preserving map from surviving labels to `0..k`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Relabeling {
    mapping: BTreeMap<Label, Label>,
}

impl Relabeling {
    /// Build the bijection from the surviving centers
    pub fn from_centers(centers: &[Center]) -> Self {
        let mapping = centers
            .iter()
            .map(|c| c.label)
            .collect::<std::collections::BTreeSet<_>>()
            .into_iter()
            .zip(0..)
            .collect();
        Self { mapping }
    }

    /// New label for `old`, if it survived
    pub fn get(&self, old: Label) -> Option<Label> {
        self.mapping.get(&old).copied()
    }

    /// Number of surviving labels
    pub fn len(&self) -> usize {
        self.mapping.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mapping.is_empty()
    }

    /// Whether no label actually changes
    pub fn is_identity(&self) -> bool {
        self.mapping.iter().all(|(old, new)| old == new)
    }

    /// (old, new) pairs in ascending order
    pub fn pairs(&self) -> impl Iterator<Item = (Label, Label)> + '_ {
        self.mapping.iter().map(|(o, n)| (*o, *n))
    }

    /// Rewrite center and point labels through the mapping
    ///
    /// Every point must reference a surviving center. Labels are checked
    /// before anything is written, so an error leaves both slices untouched.
    pub fn apply(&self, centers: &mut [Center], points: &mut [Point]) -> BalanceResult<()> {
        if let Some(p) = points
            .iter()
            .find(|p| p.cluster_label.and_then(|l| self.get(l)).is_none())
        {
            return Err(BalanceError::UnknownLabel {
                point_id: p.id,
                label: p.cluster_label,
            });
        }

        for center in centers.iter_mut() {
            if let Some(new) = self.get(center.label) {
                center.label = new;
            }
        }
        for point in points.iter_mut() {
            point.cluster_label = point.cluster_label.and_then(|l| self.get(l));
        }
        Ok(())
    }

    /// Rewrite the residual lists of `report` into the dense label space
    ///
    /// `over_capacity` and `under_capacity` only name surviving centers, so
    /// after this call they match sector labels. `eliminated` and `events`
    /// stay in the labels the run started with, since eliminated centers
    /// have no dense label.
    pub fn apply_to_report(&self, report: &mut BalanceReport) {
        let translate = |residuals: &mut Vec<(Label, usize)>| {
            *residuals = residuals
                .iter()
                .filter_map(|&(label, count)| self.get(label).map(|new| (new, count)))
                .collect();
        };
        translate(&mut report.over_capacity);
        translate(&mut report.under_capacity);
    }
}

/// Compact labels of `centers` and `points` to `0..k`
pub fn normalize_labels(centers: &mut [Center], points: &mut [Point]) -> BalanceResult<Relabeling> {
    let relabeling = Relabeling::from_centers(centers);
    relabeling.apply(centers, points)?;
    tracing::debug!(
        centers = relabeling.len(),
        identity = relabeling.is_identity(),
        "Labels normalized"
    );
    Ok(relabeling)
}
