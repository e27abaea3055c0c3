//! Typed, validated parameters for the analytical queries.

use chrono::NaiveDate;

use crate::error::{QuakeError, Result};

/// Center point and radius for the nearby-quakes query
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NearbyParams {
    pub latitude: f64,
    pub longitude: f64,
    pub radius_km: f64,
}

impl NearbyParams {
    pub fn new(latitude: f64, longitude: f64, radius_km: f64) -> Result<Self> {
        let params = Self {
            latitude,
            longitude,
            radius_km,
        };
        params.validate()?;
        Ok(params)
    }

    pub fn validate(&self) -> Result<()> {
        check_range("latitude", self.latitude, -90.0, 90.0)?;
        check_range("longitude", self.longitude, -180.0, 180.0)?;
        check_finite("radius_km", self.radius_km)?;
        if self.radius_km < 0.0 {
            return Err(QuakeError::invalid("radius_km", "must not be negative"));
        }
        Ok(())
    }
}

/// Magnitude threshold with an optional date window and row limit
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MagnitudeFilter {
    pub min_magnitude: f64,
    /// First day included (from 00:00:00)
    pub start_date: Option<NaiveDate>,
    /// Last day included (through 23:59:59)
    pub end_date: Option<NaiveDate>,
    pub limit: Option<usize>,
}

impl MagnitudeFilter {
    pub fn at_least(min_magnitude: f64) -> Self {
        Self {
            min_magnitude,
            ..Self::default()
        }
    }

    pub fn between(self, start_date: NaiveDate, end_date: NaiveDate) -> Self {
        Self {
            start_date: Some(start_date),
            end_date: Some(end_date),
            ..self
        }
    }

    pub fn limit(self, limit: usize) -> Self {
        Self {
            limit: Some(limit),
            ..self
        }
    }

    pub fn validate(&self) -> Result<()> {
        check_finite("min_magnitude", self.min_magnitude)?;
        if let (Some(start), Some(end)) = (self.start_date, self.end_date) {
            if start > end {
                return Err(QuakeError::invalid(
                    "start_date",
                    format!("{start} is after end date {end}"),
                ));
            }
        }
        if self.limit == Some(0) {
            return Err(QuakeError::invalid("limit", "must be at least 1"));
        }
        Ok(())
    }
}

pub(crate) fn check_finite(name: &'static str, value: f64) -> Result<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(QuakeError::invalid(name, format!("{value} is not a finite number")))
    }
}

pub(crate) fn check_range(name: &'static str, value: f64, min: f64, max: f64) -> Result<()> {
    check_finite(name, value)?;
    if value < min || value > max {
        return Err(QuakeError::invalid(
            name,
            format!("{value} is outside {min}..={max}"),
        ));
    }
    Ok(())
}
