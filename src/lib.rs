//! setor - Fixed-center territory balancing for points of sale
//!
//! Partitions a set of geolocated points of sale (PDVs) among user-supplied,
//! immovable centers so that every territory serves between `min_pdv` and
//! `max_pdv` points and no point is farther than a travel-time ceiling from
//! its center.
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - [`geo`] - Great-circle distance and travel time
//! - [`models`] - Points, centers and labels
//! - [`balancer`] - Initial assignment, iterative balancing and relabeling
//! - [`sector`] - Final sectors with distance metrics
//! - [`centers`] - Center catalog built from geocoded address rows
//! - [`storage`] - Point sources and run repositories
//! - [`pipeline`] - End-to-end jobs and the concurrent runner
//! - [`config`] - Configuration management and settings
//! - [`metrics`] - Prometheus metrics
//! - [`utils`] - Text clean-up helpers
//!
//! # Example
//!
//! ```no_run
//! use setor::config::Config;
//! use setor::models::{Center, Point};
//! use setor::pipeline::cluster;
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env()?;
//!     let centers = vec![Center::new(0, -23.55, -46.63)];
//!     let points = vec![Point::new(1, -23.56, -46.64)];
//!
//!     let output = cluster(points, &centers, &config.balance.to_params())?;
//!     println!("{} sectors", output.sectors.len());
//!     Ok(())
//! }
//! ```

pub mod balancer;
pub mod centers;
pub mod config;
pub mod error;
pub mod geo;
pub mod metrics;
pub mod models;
pub mod pipeline;
pub mod sector;
pub mod storage;
pub mod utils;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::balancer::{balance, BalanceOutcome, BalanceParams, BalanceReport};
    pub use crate::centers::{CenterCatalog, CenterSource, Geocoder};
    pub use crate::config::Config;
    pub use crate::error::{Error, ErrorCategory, Result, SetorErrorTrait};
    pub use crate::models::{Center, Label, Point};
    pub use crate::pipeline::{cluster, BalancedClusteringJob, JobRequest, JobSummary};
    pub use crate::sector::Sector;
    pub use crate::storage::{PointSource, RunRepository};
}

// Direct re-exports for convenience
pub use models::{Center, Label, Point};
