//! Result shaping: typed response records built from query rows.
//!
//! Every response type implements [`FromRow`] and reads its fields by column
//! name through a [`RowReader`], so field names stay stable no matter how a
//! query orders its select list. Any mismatch between a row and the shape
//! expected from it is reported as [`QuakeError::Shaping`].

use chrono::NaiveDateTime;
use rusqlite::types::FromSql;
use rusqlite::Row;
use serde::Serialize;

use crate::error::{QuakeError, Result};
use crate::model::{Earthquake, DATETIME_FORMAT};

/// A record that can be built from one result row
pub trait FromRow: Sized {
    /// Name used in shaping errors
    const SHAPE: &'static str;

    fn from_row(row: &RowReader<'_, '_>) -> Result<Self>;
}

/// Column-name based access to a row, tagged with the shape being built
pub struct RowReader<'r, 's> {
    row: &'r Row<'s>,
    shape: &'static str,
}

impl<'r, 's> RowReader<'r, 's> {
    pub fn new(row: &'r Row<'s>, shape: &'static str) -> Self {
        Self { row, shape }
    }

    /// Read a field by column name
    pub fn get<T: FromSql>(&self, field: &'static str) -> Result<T> {
        self.row.get(field).map_err(|e| self.mismatch(field, e))
    }

    /// Read a `YYYY-MM-DD HH:MM:SS` timestamp column
    pub fn datetime(&self, field: &'static str) -> Result<NaiveDateTime> {
        let text: String = self.get(field)?;
        NaiveDateTime::parse_from_str(&text, DATETIME_FORMAT).map_err(|e| QuakeError::Shaping {
            shape: self.shape,
            field,
            reason: format!("malformed timestamp '{text}': {e}"),
        })
    }

    fn mismatch(&self, field: &'static str, err: rusqlite::Error) -> QuakeError {
        let reason = match err {
            rusqlite::Error::InvalidColumnName(_) => "column missing from result".to_string(),
            rusqlite::Error::InvalidColumnType(_, _, rusqlite::types::Type::Null) => {
                "unexpected NULL".to_string()
            }
            other => other.to_string(),
        };
        QuakeError::Shaping {
            shape: self.shape,
            field,
            reason,
        }
    }
}

/// Shape a single row into `T`
pub fn shape_row<T: FromRow>(row: &Row<'_>) -> Result<T> {
    T::from_row(&RowReader::new(row, T::SHAPE))
}

// =============================================================================
// Query Responses
// =============================================================================

/// Earthquake with the name of its region (queries 1 and 5)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuakeInRegion {
    #[serde(flatten)]
    pub quake: Earthquake,
    pub region_name: String,
}

impl FromRow for QuakeInRegion {
    const SHAPE: &'static str = "QuakeInRegion";

    fn from_row(row: &RowReader<'_, '_>) -> Result<Self> {
        Ok(Self {
            quake: Earthquake::from_row(row)?,
            region_name: row.get("region_name")?,
        })
    }
}

/// Average magnitude of a region's quakes (query 2)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MagnitudeAverage {
    pub region_id: i64,
    pub region_name: String,
    pub quake_count: i64,
    pub avg_magnitude: f64,
}

impl FromRow for MagnitudeAverage {
    const SHAPE: &'static str = "MagnitudeAverage";

    fn from_row(row: &RowReader<'_, '_>) -> Result<Self> {
        Ok(Self {
            region_id: row.get("region_id")?,
            region_name: row.get("region_name")?,
            quake_count: row.get("quake_count")?,
            avg_magnitude: row.get("avg_magnitude")?,
        })
    }
}

/// Earthquake with its great-circle distance from the search point (query 3)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NearbyQuake {
    #[serde(flatten)]
    pub quake: Earthquake,
    pub distance_km: f64,
}

/// Quake count for one region (queries 4 and 6)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegionActivity {
    pub region_id: i64,
    pub region_name: String,
    pub country: String,
    pub quake_count: i64,
}

impl FromRow for RegionActivity {
    const SHAPE: &'static str = "RegionActivity";

    fn from_row(row: &RowReader<'_, '_>) -> Result<Self> {
        Ok(Self {
            region_id: row.get("region_id")?,
            region_name: row.get("region_name")?,
            country: row.get("country")?,
            quake_count: row.get("quake_count")?,
        })
    }
}

/// Region whose quake count exceeds the mean over active regions (query 7)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AboveAverageRegion {
    pub region_id: i64,
    pub region_name: String,
    pub quake_count: i64,
    pub average_count: f64,
}

impl FromRow for AboveAverageRegion {
    const SHAPE: &'static str = "AboveAverageRegion";

    fn from_row(row: &RowReader<'_, '_>) -> Result<Self> {
        Ok(Self {
            region_id: row.get("region_id")?,
            region_name: row.get("region_name")?,
            quake_count: row.get("quake_count")?,
            average_count: row.get("average_count")?,
        })
    }
}

/// Multi-criteria search result (query 8)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    #[serde(flatten)]
    pub quake: Earthquake,
    pub region_name: String,
    pub zone_name: String,
    pub risk_level: i32,
}

impl FromRow for SearchHit {
    const SHAPE: &'static str = "SearchHit";

    fn from_row(row: &RowReader<'_, '_>) -> Result<Self> {
        Ok(Self {
            quake: Earthquake::from_row(row)?,
            region_name: row.get("region_name")?,
            zone_name: row.get("zone_name")?,
            risk_level: row.get("risk_level")?,
        })
    }
}

/// Earthquake in a region with a known population (query 9)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PopulatedRegionQuake {
    #[serde(flatten)]
    pub quake: Earthquake,
    pub region_name: String,
    pub population: i64,
}

impl FromRow for PopulatedRegionQuake {
    const SHAPE: &'static str = "PopulatedRegionQuake";

    fn from_row(row: &RowReader<'_, '_>) -> Result<Self> {
        Ok(Self {
            quake: Earthquake::from_row(row)?,
            region_name: row.get("region_name")?,
            population: row.get("population")?,
        })
    }
}

/// Risk summary for one region (query 10)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskSummary {
    pub region_id: i64,
    pub region_name: String,
    pub country: String,
    pub population: Option<i64>,
    pub quake_count: i64,
    /// Absent when the region has no recorded quakes
    pub avg_magnitude: Option<f64>,
    pub max_magnitude: Option<f64>,
    /// Zones touched by the region's quakes, highest risk first
    pub zones: Vec<ZoneRisk>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ZoneRisk {
    pub zone_id: i64,
    pub zone_name: String,
    pub risk_level: i32,
    pub quake_count: i64,
}

impl FromRow for ZoneRisk {
    const SHAPE: &'static str = "ZoneRisk";

    fn from_row(row: &RowReader<'_, '_>) -> Result<Self> {
        Ok(Self {
            zone_id: row.get("zone_id")?,
            zone_name: row.get("zone_name")?,
            risk_level: row.get("risk_level")?,
            quake_count: row.get("quake_count")?,
        })
    }
}

/// Aggregate half of a risk summary, joined with the region row by the engine
#[derive(Debug, Clone, PartialEq)]
pub struct MagnitudeStats {
    pub quake_count: i64,
    pub avg_magnitude: Option<f64>,
    pub max_magnitude: Option<f64>,
}

impl FromRow for MagnitudeStats {
    const SHAPE: &'static str = "MagnitudeStats";

    fn from_row(row: &RowReader<'_, '_>) -> Result<Self> {
        Ok(Self {
            quake_count: row.get("quake_count")?,
            avg_magnitude: row.get("avg_magnitude")?,
            max_magnitude: row.get("max_magnitude")?,
        })
    }
}
