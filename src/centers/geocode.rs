//! Address geocoding collaborators
//!
//! The catalog only needs `address -> coordinates`. Lookups go through a
//! [`CachedGeocoder`], which checks its cache first and then asks an ordered
//! chain of providers, remembering the first usable answer.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use crate::geo::Coordinate;
use crate::utils::normalize_whitespace;

/// Resolved coordinates plus where they came from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeocodeHit {
    pub lat: f64,
    pub lon: f64,
    /// Provider tag, `cache` for cache hits
    pub origin: String,
}

impl GeocodeHit {
    pub fn coordinate(&self) -> Coordinate {
        Coordinate::new(self.lat, self.lon)
    }
}

/// Something that turns an address string into coordinates
pub trait Geocoder {
    /// Short tag recorded as the center origin
    fn name(&self) -> &str;

    /// Resolve `address`, `None` when not found
    fn resolve(&mut self, address: &str) -> Option<GeocodeHit>;
}

/// Coordinates that geocoders return when they did not really find the place
///
/// Non-finite, out of range, or the (0, 0) null island.
pub fn is_generic_coordinate(lat: f64, lon: f64) -> bool {
    let c = Coordinate::new(lat, lon);
    !c.is_valid() || (lat.abs() < 1e-9 && lon.abs() < 1e-9)
}

fn cache_key(address: &str) -> String {
    normalize_whitespace(address).to_lowercase()
}

// ============================================================================
// Static lookup table
// ============================================================================

/// Geocoder backed by a fixed address table
#[derive(Debug, Clone, Default)]
pub struct StaticGeocoder {
    name: String,
    entries: HashMap<String, Coordinate>,
}

/// One entry of a geocode table file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeocodeEntry {
    pub address: String,
    pub lat: f64,
    pub lon: f64,
}

impl StaticGeocoder {
    /// Create an empty table tagged `name`
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: HashMap::new(),
        }
    }

    /// Load a JSON array of [`GeocodeEntry`]
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read geocode table: {}", path.display()))?;
        let entries: Vec<GeocodeEntry> = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse geocode table: {}", path.display()))?;

        let mut geocoder = Self::new("table");
        for entry in entries {
            geocoder.insert(&entry.address, entry.lat, entry.lon);
        }
        tracing::debug!(entries = geocoder.len(), path = %path.display(), "Geocode table loaded");
        Ok(geocoder)
    }

    /// Add or replace an address
    pub fn insert(&mut self, address: &str, lat: f64, lon: f64) {
        self.entries
            .insert(cache_key(address), Coordinate::new(lat, lon));
    }

    /// Builder form of [`Self::insert`]
    pub fn with_entry(mut self, address: &str, lat: f64, lon: f64) -> Self {
        self.insert(address, lat, lon);
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Geocoder for StaticGeocoder {
    fn name(&self) -> &str {
        &self.name
    }

    fn resolve(&mut self, address: &str) -> Option<GeocodeHit> {
        self.entries.get(&cache_key(address)).map(|c| GeocodeHit {
            lat: c.lat,
            lon: c.lon,
            origin: self.name.clone(),
        })
    }
}

// ============================================================================
// Cache in front of a provider chain
// ============================================================================

/// Lookup counters of a [`CachedGeocoder`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeocodeStats {
    pub cache_hits: u64,
    pub provider_hits: u64,
    pub misses: u64,
}

/// Cache-first geocoder over an ordered provider chain
///
/// Generic coordinates are treated as misses, both from the cache and from
/// providers, and are never cached.
pub struct CachedGeocoder {
    cache: HashMap<String, GeocodeHit>,
    providers: Vec<Box<dyn Geocoder + Send>>,
    stats: GeocodeStats,
}

impl CachedGeocoder {
    /// Create a geocoder with an empty cache and no providers
    pub fn new() -> Self {
        Self {
            cache: HashMap::new(),
            providers: Vec::new(),
            stats: GeocodeStats::default(),
        }
    }

    /// Append a provider to the chain
    pub fn with_provider(mut self, provider: impl Geocoder + Send + 'static) -> Self {
        self.providers.push(Box::new(provider));
        self
    }

    /// Seed the cache
    pub fn prime(&mut self, address: &str, hit: GeocodeHit) {
        self.cache.insert(cache_key(address), hit);
    }

    pub fn stats(&self) -> GeocodeStats {
        self.stats
    }

    pub fn cached(&self) -> usize {
        self.cache.len()
    }
}

impl Default for CachedGeocoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Geocoder for CachedGeocoder {
    fn name(&self) -> &str {
        "cache"
    }

    fn resolve(&mut self, address: &str) -> Option<GeocodeHit> {
        let address = address.trim();
        if address.is_empty() {
            return None;
        }
        let key = cache_key(address);

        if let Some(hit) = self.cache.get(&key) {
            if !is_generic_coordinate(hit.lat, hit.lon) {
                self.stats.cache_hits += 1;
                return Some(GeocodeHit {
                    origin: "cache".to_string(),
                    ..hit.clone()
                });
            }
        }

        for provider in self.providers.iter_mut() {
            let Some(hit) = provider.resolve(address) else {
                continue;
            };
            if is_generic_coordinate(hit.lat, hit.lon) {
                tracing::debug!(provider = provider.name(), address, "Generic coordinate ignored");
                continue;
            }
            self.stats.provider_hits += 1;
            self.cache.insert(key, hit.clone());
            return Some(hit);
        }

        self.stats.misses += 1;
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generic_coordinate() {
        assert!(is_generic_coordinate(0.0, 0.0));
        assert!(is_generic_coordinate(f64::NAN, 1.0));
        assert!(is_generic_coordinate(100.0, 1.0));
        assert!(!is_generic_coordinate(-23.5, -46.6));
    }

    #[test]
    fn test_static_geocoder_normalizes_keys() {
        let mut g = StaticGeocoder::new("table").with_entry("Rua A  10 - Centro", -23.5, -46.6);
        let hit = g.resolve("rua a 10 - centro").unwrap();
        assert_eq!(hit.origin, "table");
        assert_eq!(hit.lat, -23.5);
        assert!(g.resolve("Rua B").is_none());
    }

    #[test]
    fn test_cached_geocoder_caches_provider_hits() {
        let provider = StaticGeocoder::new("nominatim").with_entry("Rua A 10", -23.5, -46.6);
        let mut g = CachedGeocoder::new().with_provider(provider);

        assert_eq!(g.resolve("Rua A 10").unwrap().origin, "nominatim");
        assert_eq!(g.resolve("Rua A 10").unwrap().origin, "cache");
        assert_eq!(
            g.stats(),
            GeocodeStats {
                cache_hits: 1,
                provider_hits: 1,
                misses: 0
            }
        );
    }

    #[test]
    fn test_cached_geocoder_falls_through_chain() {
        let first = StaticGeocoder::new("first").with_entry("Rua A 10", 0.0, 0.0);
        let second = StaticGeocoder::new("second").with_entry("Rua A 10", -23.5, -46.6);
        let mut g = CachedGeocoder::new().with_provider(first).with_provider(second);

        let hit = g.resolve("Rua A 10").unwrap();
        assert_eq!(hit.origin, "second");
    }

    #[test]
    fn test_cached_geocoder_miss() {
        let mut g = CachedGeocoder::new();
        assert!(g.resolve("Rua Z 1").is_none());
        assert!(g.resolve("   ").is_none());
        assert_eq!(g.stats().misses, 1);
    }

    #[test]
    fn test_generic_cache_entry_ignored() {
        let provider = StaticGeocoder::new("table").with_entry("Rua A 10", -23.5, -46.6);
        let mut g = CachedGeocoder::new().with_provider(provider);
        g.prime(
            "Rua A 10",
            GeocodeHit {
                lat: 0.0,
                lon: 0.0,
                origin: "stale".to_string(),
            },
        );

        assert_eq!(g.resolve("Rua A 10").unwrap().origin, "table");
    }
}
