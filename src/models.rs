// Core data structures for setor

use serde::{Deserialize, Serialize};

use crate::geo::Coordinate;

/// Territory label carried by centers and points
pub type Label = u32;

/// Point of sale (PDV) to be assigned to a territory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub id: i64,
    #[serde(default)]
    pub tax_id: Option<String>, // CNPJ, digits only
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub state: Option<String>, // UF, e.g. "SP"
    pub lat: f64,
    pub lon: f64,
    /// Territory the point currently belongs to; the only field the balancer mutates
    #[serde(default)]
    pub cluster_label: Option<Label>,
}

impl Point {
    /// Create an unlabeled point with no business identifiers
    pub fn new(id: i64, lat: f64, lon: f64) -> Self {
        Self {
            id,
            tax_id: None,
            name: None,
            city: None,
            state: None,
            lat,
            lon,
            cluster_label: None,
        }
    }

    /// Set the city and state
    pub fn with_location(mut self, city: impl Into<String>, state: impl Into<String>) -> Self {
        self.city = Some(city.into());
        self.state = Some(state.into());
        self
    }

    /// Set the initial label
    pub fn with_label(mut self, label: Label) -> Self {
        self.cluster_label = Some(label);
        self
    }

    pub fn coordinate(&self) -> Coordinate {
        Coordinate::new(self.lat, self.lon)
    }

    /// Both coordinates are finite
    pub fn has_finite_coordinates(&self) -> bool {
        self.lat.is_finite() && self.lon.is_finite()
    }
}

/// Pass-through data attached to a center
///
/// The balancer copies it around untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CenterMetadata {
    /// Where the coordinates came from (cache, geocoder name, manual)
    #[serde(default)]
    pub origin: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub tax_id: Option<String>,
    #[serde(default)]
    pub brand: Option<String>,
    /// Identifier assigned by the run repository
    #[serde(default)]
    pub center_id: Option<i64>,
}

/// Fixed geographic anchor of a territory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Center {
    pub label: Label,
    pub lat: f64,
    pub lon: f64,
    #[serde(default)]
    pub metadata: CenterMetadata,
}

impl Center {
    /// Create a center without metadata
    pub fn new(label: Label, lat: f64, lon: f64) -> Self {
        Self {
            label,
            lat,
            lon,
            metadata: CenterMetadata::default(),
        }
    }

    /// Attach metadata
    pub fn with_metadata(mut self, metadata: CenterMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn coordinate(&self) -> Coordinate {
        Coordinate::new(self.lat, self.lon)
    }
}
