//! Entity records for the three tables.

use chrono::{NaiveDateTime, Timelike};
use serde::Serialize;

use crate::error::{QuakeError, Result};
use crate::schema::{TableSchema, EARTHQUAKE, REGION, SEISMIC_ZONE};
use crate::shape::{FromRow, RowReader};
use crate::store::{Entity, Insertable, SqlValue};

/// Storage format of `Earthquake.datetime` (UTC)
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Serializes timestamps in the storage format rather than ISO-8601
pub mod quake_time {
    use super::DATETIME_FORMAT;
    use chrono::NaiveDateTime;
    use serde::Serializer;

    pub fn serialize<S: Serializer>(value: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&value.format(DATETIME_FORMAT))
    }
}

/// Geographic area under analysis
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Region {
    pub region_id: i64,
    pub region_name: String,
    pub country: String,
    /// `None` for unclassified regions with no resident population
    pub population: Option<i64>,
}

/// Named hazard classification with an ordinal risk level
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeismicZone {
    pub zone_id: i64,
    pub zone_name: String,
    pub risk_level: i32,
}

/// A stored seismic event
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Earthquake {
    pub quake_id: i64,
    #[serde(serialize_with = "quake_time::serialize")]
    pub datetime: NaiveDateTime,
    pub magnitude: f64,
    pub depth_km: f64,
    pub latitude: f64,
    pub longitude: f64,
    pub place: String,
    pub region_id: i64,
    pub zone_id: i64,
}

/// An earthquake not yet stored; the store assigns `quake_id`
#[derive(Debug, Clone, PartialEq)]
pub struct NewEarthquake {
    pub datetime: NaiveDateTime,
    pub magnitude: f64,
    pub depth_km: f64,
    pub latitude: f64,
    pub longitude: f64,
    pub place: String,
    pub region_id: i64,
    pub zone_id: i64,
}

impl NewEarthquake {
    /// Attach the key the store assigned
    pub fn stored_as(self, quake_id: i64) -> Earthquake {
        Earthquake {
            quake_id,
            datetime: self.datetime,
            magnitude: self.magnitude,
            depth_km: self.depth_km,
            latitude: self.latitude,
            longitude: self.longitude,
            place: self.place,
            region_id: self.region_id,
            zone_id: self.zone_id,
        }
    }
}

// =============================================================================
// Row Mapping
// =============================================================================

impl FromRow for Region {
    const SHAPE: &'static str = "Region";

    fn from_row(row: &RowReader<'_, '_>) -> Result<Self> {
        Ok(Self {
            region_id: row.get("region_id")?,
            region_name: row.get("region_name")?,
            country: row.get("country")?,
            population: row.get("population")?,
        })
    }
}

impl FromRow for SeismicZone {
    const SHAPE: &'static str = "SeismicZone";

    fn from_row(row: &RowReader<'_, '_>) -> Result<Self> {
        Ok(Self {
            zone_id: row.get("zone_id")?,
            zone_name: row.get("zone_name")?,
            risk_level: row.get("risk_level")?,
        })
    }
}

impl FromRow for Earthquake {
    const SHAPE: &'static str = "Earthquake";

    fn from_row(row: &RowReader<'_, '_>) -> Result<Self> {
        Ok(Self {
            quake_id: row.get("quake_id")?,
            datetime: row.datetime("datetime")?,
            magnitude: row.get("magnitude")?,
            depth_km: row.get("depth_km")?,
            latitude: row.get("latitude")?,
            longitude: row.get("longitude")?,
            place: row.get("place")?,
            region_id: row.get("region_id")?,
            zone_id: row.get("zone_id")?,
        })
    }
}

impl Entity for Region {
    const SCHEMA: &'static TableSchema = &REGION;
}

impl Entity for SeismicZone {
    const SCHEMA: &'static TableSchema = &SEISMIC_ZONE;
}

impl Entity for Earthquake {
    const SCHEMA: &'static TableSchema = &EARTHQUAKE;
}

impl Insertable for Region {
    type Entity = Region;

    fn values(&self) -> Vec<(&'static str, SqlValue)> {
        vec![
            ("region_id", self.region_id.into()),
            ("region_name", self.region_name.as_str().into()),
            ("country", self.country.as_str().into()),
            ("population", self.population.into()),
        ]
    }
}

impl Insertable for SeismicZone {
    type Entity = SeismicZone;

    fn values(&self) -> Vec<(&'static str, SqlValue)> {
        vec![
            ("zone_id", self.zone_id.into()),
            ("zone_name", self.zone_name.as_str().into()),
            ("risk_level", i64::from(self.risk_level).into()),
        ]
    }
}

impl Insertable for NewEarthquake {
    type Entity = Earthquake;

    fn values(&self) -> Vec<(&'static str, SqlValue)> {
        vec![
            ("datetime", self.datetime.format(DATETIME_FORMAT).to_string().into()),
            ("magnitude", self.magnitude.into()),
            ("depth_km", self.depth_km.into()),
            ("latitude", self.latitude.into()),
            ("longitude", self.longitude.into()),
            ("place", self.place.as_str().into()),
            ("region_id", self.region_id.into()),
            ("zone_id", self.zone_id.into()),
        ]
    }

    /// Timestamps are stored to the second; finer precision would be lost
    fn validate(&self) -> Result<()> {
        if self.datetime.nanosecond() != 0 {
            return Err(QuakeError::invalid(
                "datetime",
                format!("{} has sub-second precision", self.datetime),
            ));
        }
        Ok(())
    }
}
