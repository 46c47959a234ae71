//! Fixed-center PDV balancing
//!
//! This module assigns points of sale to territorial centers and rebalances
//! the assignment so every center serves a point count inside
//! `[min_pdv, max_pdv]`, without ever moving a center and without moving a
//! point to a center beyond the travel-time ceiling.
//!
//! # Pipeline
//!
//! ```text
//!  points + centers
//!        │
//!        ▼
//!  ┌──────────────┐   nearest center, first-listed wins ties
//!  │  assignment  │
//!  └──────┬───────┘
//!         ▼
//!  ┌──────────────┐   repair → excess → deficit, until no label changes
//!  │    engine    │   or the iteration budget is spent
//!  └──────┬───────┘
//!         ▼
//!  ┌──────────────┐   surviving labels → 0..k
//!  │   relabel    │
//!  └──────┬───────┘
//!         ▼
//!     sectors (see [`crate::sector`])
//! ```
//!
//! # Modules
//!
//! - [`assignment`] - One-shot nearest-center labeling
//! - [`candidate`] - Population counters, neighbor lookup and candidate ranking
//! - [`engine`] - The iterative excess/deficit loop
//! - [`relabel`] - Dense relabeling after eliminations
//! - [`error`] - Fatal balancing errors
//!
//! # Quick Start
//!
//! ```
//! use setor::balancer::{assign_nearest, balance, BalanceParams};
//! use setor::models::{Center, Point};
//!
//! let centers = vec![Center::new(0, -23.55, -46.63), Center::new(1, -23.60, -46.70)];
//! let mut points: Vec<Point> = (0..6)
//!     .map(|i| Point::new(i, -23.55 + 0.001 * i as f64, -46.63))
//!     .collect();
//!
//! assign_nearest(&mut points, &centers)?;
//! let params = BalanceParams { max_pdv: 4, ..Default::default() };
//! let outcome = balance(points, &centers, &params)?;
//!
//! assert_eq!(outcome.points.len(), 6);
//! # Ok::<(), setor::balancer::BalanceError>(())
//! ```
//!
//! # Ordering guarantees
//!
//! | Step | Order |
//! |------|-------|
//! | Excess | centers by descending count, points farthest-first |
//! | Deficit | centers by ascending count, points farthest-first |
//! | Candidates | travel time, then distance, then offer order |

pub mod assignment;
pub mod candidate;
pub mod engine;
pub mod error;
pub mod relabel;

// Re-export main types
pub use assignment::{assign_nearest, nearest_center};
pub use candidate::{best_candidate, neighbors, Candidate, Populations};
pub use engine::{
    balance, BalanceEngine, BalanceEvent, BalanceOutcome, BalanceParams, BalanceReport,
    IterationStats,
};
pub use error::{BalanceError, BalanceResult};
pub use relabel::{normalize_labels, Relabeling};
