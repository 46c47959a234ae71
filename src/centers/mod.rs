//! Center catalog
//!
//! Builds the fixed [`Center`] list of a run from tabular address rows. Each
//! row is cleaned, turned into a one-line address, geocoded, and checked for
//! duplicates. Rows that cannot produce a trustworthy coordinate are dropped
//! and counted in [`CenterLoadStats`].
//!
//! # Modules
//!
//! - [`geocode`] - Geocoder trait, static table and cache chain

pub mod geocode;

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::models::{Center, CenterMetadata, Label};
use crate::utils::{digits_only, normalize_whitespace, split_street_number};
pub use geocode::{
    is_generic_coordinate, CachedGeocoder, GeocodeEntry, GeocodeHit, GeocodeStats, Geocoder,
    StaticGeocoder,
};

/// Addresses this short cannot be geocoded reliably
pub const MIN_ADDRESS_LEN: usize = 10;

/// Decimal places used to detect centers sharing a coordinate
pub const COORDINATE_DEDUP_DECIMALS: i32 = 6;

/// Columns every row set must provide
const REQUIRED_COLUMNS: [&str; 4] = ["street", "district", "city", "state"];

// ============================================================================
// Errors
// ============================================================================

/// Center catalog errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CenterError {
    /// Required address columns are absent from every row
    #[error("Missing required center columns: {}", columns.join(", "))]
    MissingColumns { columns: Vec<String> },

    /// Nothing survived cleaning and geocoding
    #[error("No valid center after geocoding ({} rows read)", stats.read)]
    NoValidCenters { stats: CenterLoadStats },
}

impl CenterError {
    /// A different geocoder chain or cache may resolve more rows
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::NoValidCenters { .. })
    }
}

// ============================================================================
// Rows and statistics
// ============================================================================

/// One address row of the center file
///
/// Portuguese column names are accepted as aliases.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CenterRow {
    #[serde(default, alias = "logradouro")]
    pub street: Option<String>,
    #[serde(default, alias = "numero")]
    pub number: Option<String>,
    #[serde(default, alias = "bairro")]
    pub district: Option<String>,
    #[serde(default, alias = "cidade")]
    pub city: Option<String>,
    #[serde(default, alias = "uf")]
    pub state: Option<String>,
    #[serde(default, alias = "cep")]
    pub postal_code: Option<String>,
    #[serde(default, alias = "cnpj")]
    pub tax_id: Option<String>,
    #[serde(default, alias = "bandeira")]
    pub brand: Option<String>,
}

/// Audit counters of one catalog build
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CenterLoadStats {
    pub read: usize,
    pub invalid_address: usize,
    pub duplicate_address: usize,
    pub geocode_failed: usize,
    pub generic_coordinate: usize,
    pub duplicate_coordinate: usize,
    pub valid: usize,
}

impl CenterLoadStats {
    /// Rows dropped for any reason
    pub fn discarded(&self) -> usize {
        self.read - self.valid
    }
}

fn clean(field: &Option<String>) -> String {
    field.as_deref().map(normalize_whitespace).unwrap_or_default()
}

fn non_empty(text: String) -> Option<String> {
    (!text.is_empty()).then_some(text)
}

// ============================================================================
// Catalog
// ============================================================================

/// Turns address rows into geocoded centers
#[derive(Debug, Clone, Default)]
pub struct CenterCatalog {
    fallback_city: Option<String>,
    fallback_state: Option<String>,
}

impl CenterCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use these city/state when a row leaves them blank
    pub fn with_fallback(mut self, city: Option<String>, state: Option<String>) -> Self {
        self.fallback_city = city.map(|c| normalize_whitespace(&c)).and_then(non_empty);
        self.fallback_state = state
            .map(|s| normalize_whitespace(&s).to_uppercase())
            .and_then(non_empty);
        self
    }

    /// Build the one-line address of a row
    ///
    /// Returns an empty string when street, city or state is missing.
    pub fn full_address(&self, row: &CenterRow) -> String {
        let mut street = clean(&row.street);
        let mut number = clean(&row.number);
        if number.is_empty() {
            let (rest, extracted) = split_street_number(&street);
            if let Some(extracted) = extracted {
                street = rest;
                number = extracted;
            }
        }

        let city = non_empty(clean(&row.city))
            .or_else(|| self.fallback_city.clone())
            .unwrap_or_default();
        let state = non_empty(clean(&row.state).to_uppercase())
            .or_else(|| self.fallback_state.clone())
            .unwrap_or_default();

        if street.is_empty() || city.is_empty() || state.is_empty() {
            return String::new();
        }

        [
            street,
            number,
            clean(&row.district),
            city,
            state,
            clean(&row.postal_code),
        ]
        .into_iter()
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" - ")
    }

    /// Geocode `rows` into a dense `0..n` center list
    pub fn build(
        &self,
        rows: &[CenterRow],
        geocoder: &mut dyn Geocoder,
    ) -> Result<(Vec<Center>, CenterLoadStats), CenterError> {
        check_columns(rows)?;

        let mut stats = CenterLoadStats {
            read: rows.len(),
            ..Default::default()
        };
        let mut seen_addresses = HashSet::new();
        let mut seen_coordinates = HashSet::new();
        let mut centers: Vec<Center> = Vec::new();

        for row in rows {
            let address = self.full_address(row);
            if address.chars().count() <= MIN_ADDRESS_LEN {
                stats.invalid_address += 1;
                continue;
            }
            if !seen_addresses.insert(address.to_lowercase()) {
                stats.duplicate_address += 1;
                continue;
            }

            let Some(hit) = geocoder.resolve(&address) else {
                tracing::debug!(address = %address, "Geocoding failed");
                stats.geocode_failed += 1;
                continue;
            };
            if is_generic_coordinate(hit.lat, hit.lon) {
                stats.generic_coordinate += 1;
                continue;
            }

            if !seen_coordinates.insert(coordinate_key(hit.lat, hit.lon)) {
                tracing::warn!(
                    address = %address,
                    lat = hit.lat,
                    lon = hit.lon,
                    "Center shares a coordinate with an earlier center, dropped"
                );
                stats.duplicate_coordinate += 1;
                continue;
            }

            let metadata = CenterMetadata {
                origin: Some(hit.origin.clone()),
                address: Some(address),
                tax_id: row
                    .tax_id
                    .as_deref()
                    .map(digits_only)
                    .and_then(non_empty),
                brand: non_empty(clean(&row.brand)),
                center_id: None,
            };
            let label = centers.len() as Label;
            centers.push(Center::new(label, hit.lat, hit.lon).with_metadata(metadata));
        }

        stats.valid = centers.len();
        tracing::info!(
            read = stats.read,
            invalid_address = stats.invalid_address,
            duplicate_address = stats.duplicate_address,
            geocode_failed = stats.geocode_failed,
            generic_coordinate = stats.generic_coordinate,
            duplicate_coordinate = stats.duplicate_coordinate,
            valid = stats.valid,
            "Center catalog built"
        );

        if centers.is_empty() {
            return Err(CenterError::NoValidCenters { stats });
        }
        Ok((centers, stats))
    }
}

fn check_columns(rows: &[CenterRow]) -> Result<(), CenterError> {
    if rows.is_empty() {
        return Ok(());
    }
    let present = |column: &str| {
        rows.iter().any(|row| match column {
            "street" => row.street.is_some(),
            "district" => row.district.is_some(),
            "city" => row.city.is_some(),
            _ => row.state.is_some(),
        })
    };
    let missing: Vec<String> = REQUIRED_COLUMNS
        .iter()
        .filter(|c| !present(c))
        .map(|c| c.to_string())
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(CenterError::MissingColumns { columns: missing })
    }
}

fn coordinate_key(lat: f64, lon: f64) -> (i64, i64) {
    let scale = 10f64.powi(COORDINATE_DEDUP_DECIMALS);
    ((lat * scale).round() as i64, (lon * scale).round() as i64)
}

// ============================================================================
// Sources
// ============================================================================

/// Provides the fixed centers of a run
pub trait CenterSource {
    fn load_centers(&mut self) -> crate::error::Result<Vec<Center>>;
}

/// Centers that already carry coordinates, stored as a JSON array
#[derive(Debug, Clone)]
pub struct JsonCenterFile {
    path: PathBuf,
}

impl JsonCenterFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl CenterSource for JsonCenterFile {
    fn load_centers(&mut self) -> crate::error::Result<Vec<Center>> {
        let content = std::fs::read_to_string(&self.path)?;
        let centers: Vec<Center> = serde_json::from_str(&content)?;
        tracing::debug!(count = centers.len(), path = %self.path.display(), "Centers loaded");
        Ok(centers)
    }
}

/// Address rows stored as a JSON array, geocoded on load
pub struct GeocodedCenterFile<'g> {
    path: PathBuf,
    catalog: CenterCatalog,
    geocoder: &'g mut dyn Geocoder,
    last_stats: Option<CenterLoadStats>,
}

impl<'g> GeocodedCenterFile<'g> {
    pub fn new(path: &Path, catalog: CenterCatalog, geocoder: &'g mut dyn Geocoder) -> Self {
        Self {
            path: path.to_path_buf(),
            catalog,
            geocoder,
            last_stats: None,
        }
    }

    /// Counters of the most recent load
    pub fn stats(&self) -> Option<CenterLoadStats> {
        self.last_stats
    }
}

impl CenterSource for GeocodedCenterFile<'_> {
    fn load_centers(&mut self) -> crate::error::Result<Vec<Center>> {
        let content = std::fs::read_to_string(&self.path)?;
        let rows: Vec<CenterRow> = serde_json::from_str(&content)?;
        let (centers, stats) = self.catalog.build(&rows, &mut *self.geocoder)?;
        self.last_stats = Some(stats);
        Ok(centers)
    }
}
