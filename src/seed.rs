//! Canonical reference data and coordinate classifiers.
//!
//! The ten regions and ten seismic zones are seeded once; quake loaders use
//! [`classify_region`] and [`classify_zone`] to pick the foreign keys for a
//! coordinate. Boxes are checked in id order and the first match wins, so
//! overlapping boxes resolve to the lower id.

use crate::error::Result;
use crate::model::{Region, SeismicZone};
use crate::store::{InsertMode, Store};

/// Region id for coordinates no other box covers
pub const OTHER_REGION_ID: i64 = 10;
/// Zone id for coordinates no other box covers
pub const OTHER_ZONE_ID: i64 = 10;

struct ReferenceRegion {
    id: i64,
    name: &'static str,
    country: &'static str,
    population: Option<i64>,
}

struct ReferenceZone {
    id: i64,
    name: &'static str,
    risk_level: i32,
}

/// Latitude/longitude box, bounds inclusive
struct GeoBox {
    lat: (f64, f64),
    lon: (f64, f64),
}

impl GeoBox {
    const fn new(lat_min: f64, lat_max: f64, lon_min: f64, lon_max: f64) -> Self {
        Self {
            lat: (lat_min, lat_max),
            lon: (lon_min, lon_max),
        }
    }

    fn contains(&self, lat: f64, lon: f64) -> bool {
        (self.lat.0..=self.lat.1).contains(&lat) && (self.lon.0..=self.lon.1).contains(&lon)
    }
}

// =============================================================================
// Reference Rows
// =============================================================================

static REGIONS: &[ReferenceRegion] = &[
    ReferenceRegion { id: 1, name: "California Margin", country: "USA", population: Some(39_200_000) },
    ReferenceRegion { id: 2, name: "Alaska–Aleutian Margin", country: "USA", population: Some(733_000) },
    ReferenceRegion {
        id: 3,
        name: "NW Pacific Margin (Japan/Russia)",
        country: "Japan + Russian Far East",
        population: Some(125_700_000 + 6_300_000),
    },
    ReferenceRegion { id: 4, name: "Chile Subduction Zone", country: "Chile", population: Some(19_600_000) },
    ReferenceRegion {
        id: 5,
        name: "Indonesia–Philippines–PNG Arc",
        country: "Indonesia + Philippines + PNG",
        population: Some(277_500_000 + 117_300_000 + 9_700_000),
    },
    ReferenceRegion {
        id: 6,
        name: "New Zealand & SW Pacific",
        country: "NZ + Fiji + Tonga + Samoa",
        population: Some(5_200_000 + 940_000 + 107_000 + 225_000),
    },
    ReferenceRegion {
        id: 7,
        name: "Mediterranean Region",
        country: "Turkey + Greece + Italy + Balkans",
        population: Some(85_000_000 + 10_300_000 + 58_900_000 + 18_000_000),
    },
    ReferenceRegion {
        id: 8,
        name: "Himalaya–Central Asia Belt",
        country: "India North + Nepal + Pakistan North + China West",
        population: Some(600_000_000 + 30_300_000 + 70_000_000 + 95_000_000),
    },
    ReferenceRegion { id: 9, name: "North Mid-Atlantic Ridge", country: "Oceanic", population: None },
    ReferenceRegion { id: OTHER_REGION_ID, name: "Other", country: "Various", population: None },
];

static ZONES: &[ReferenceZone] = &[
    ReferenceZone { id: 1, name: "US Pacific Subduction Margin", risk_level: 5 },
    ReferenceZone { id: 2, name: "Japan Trench Zone", risk_level: 5 },
    ReferenceZone { id: 3, name: "Andean Subduction Zone", risk_level: 5 },
    ReferenceZone { id: 4, name: "Sunda Arc (Indonesia)", risk_level: 5 },
    ReferenceZone { id: 5, name: "New Zealand Plate Boundary", risk_level: 4 },
    ReferenceZone { id: 6, name: "Mediterranean Collision/Subduction", risk_level: 4 },
    ReferenceZone { id: 7, name: "Himalayan Collision Belt", risk_level: 4 },
    ReferenceZone { id: 8, name: "Mid-Atlantic Ridge", risk_level: 3 },
    ReferenceZone { id: 9, name: "Kuril–Kamchatka Subduction Zone", risk_level: 5 },
    ReferenceZone { id: OTHER_ZONE_ID, name: "Other Oceanic Zone", risk_level: 2 },
];

// =============================================================================
// Classification Boxes
// =============================================================================

/// (region id, boxes); New Zealand straddles the antimeridian
static REGION_BOXES: &[(i64, &[GeoBox])] = &[
    (1, &[GeoBox::new(30.0, 42.0, -130.0, -110.0)]),
    (2, &[GeoBox::new(50.0, 72.0, -180.0, -130.0)]),
    (3, &[GeoBox::new(30.0, 65.0, 135.0, 170.0)]),
    (4, &[GeoBox::new(-60.0, -15.0, -80.0, -65.0)]),
    (5, &[GeoBox::new(-15.0, 15.0, 95.0, 155.0)]),
    (6, &[GeoBox::new(-60.0, -10.0, 155.0, 180.0), GeoBox::new(-60.0, -10.0, -180.0, -160.0)]),
    (7, &[GeoBox::new(30.0, 46.0, -10.0, 40.0)]),
    (8, &[GeoBox::new(20.0, 45.0, 60.0, 115.0)]),
    (9, &[GeoBox::new(-40.0, 70.0, -50.0, -10.0)]),
];

static ZONE_BOXES: &[(i64, GeoBox)] = &[
    (1, GeoBox::new(30.0, 72.5, -150.0, -110.0)),
    (2, GeoBox::new(30.0, 50.0, 130.0, 160.0)),
    (3, GeoBox::new(-60.0, 5.0, -90.0, -60.0)),
    (4, GeoBox::new(-15.0, 10.0, 90.0, 150.0)),
    (5, GeoBox::new(-50.0, -30.0, 160.0, 180.0)),
    (6, GeoBox::new(25.0, 50.0, -10.0, 40.0)),
    (7, GeoBox::new(20.0, 40.0, 70.0, 100.0)),
    (8, GeoBox::new(-60.0, 60.0, -40.0, -10.0)),
    (9, GeoBox::new(45.0, 60.0, 145.0, 175.0)),
];

/// Bring longitudes given on a 0..360 scale back into -180..180
fn normalize_longitude(lon: f64) -> f64 {
    if lon > 180.0 {
        lon - 360.0
    } else {
        lon
    }
}

/// Region id for a coordinate
pub fn classify_region(lat: f64, lon: f64) -> i64 {
    let lon = normalize_longitude(lon);
    REGION_BOXES
        .iter()
        .find(|(_, boxes)| boxes.iter().any(|b| b.contains(lat, lon)))
        .map(|(id, _)| *id)
        .unwrap_or(OTHER_REGION_ID)
}

/// Seismic zone id for a coordinate
pub fn classify_zone(lat: f64, lon: f64) -> i64 {
    let lon = normalize_longitude(lon);
    ZONE_BOXES
        .iter()
        .find(|(_, b)| b.contains(lat, lon))
        .map(|(id, _)| *id)
        .unwrap_or(OTHER_ZONE_ID)
}

pub fn reference_regions() -> Vec<Region> {
    REGIONS
        .iter()
        .map(|r| Region {
            region_id: r.id,
            region_name: r.name.to_string(),
            country: r.country.to_string(),
            population: r.population,
        })
        .collect()
}

pub fn reference_zones() -> Vec<SeismicZone> {
    ZONES
        .iter()
        .map(|z| SeismicZone {
            zone_id: z.id,
            zone_name: z.name.to_string(),
            risk_level: z.risk_level,
        })
        .collect()
}

/// Rows written by [`seed_reference_data`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeedReport {
    pub regions: usize,
    pub zones: usize,
}

/// Insert the canonical regions and zones, skipping rows already present
pub fn seed_reference_data(store: &Store) -> Result<SeedReport> {
    let report = store.with_session(|session| {
        Ok(SeedReport {
            regions: session.insert_many(&reference_regions(), InsertMode::IgnoreExisting)?,
            zones: session.insert_many(&reference_zones(), InsertMode::IgnoreExisting)?,
        })
    })?;

    tracing::info!(regions = report.regions, zones = report.zones, "seeded reference data");
    Ok(report)
}
