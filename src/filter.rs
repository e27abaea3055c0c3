use crate::error::Result;
use crate::query::params::check_finite;
use crate::store::SqlValue;

/// Optional criteria for the multi-criteria search, combined with AND
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchCriteria {
    pub min_magnitude: Option<f64>,
    pub max_depth_km: Option<f64>,
    pub region_id: Option<i64>,
    pub min_risk_level: Option<i32>,
    /// Regions with no recorded population never match
    pub min_population: Option<i64>,
}

/// A WHERE clause with positional parameters numbered from `?1`
#[derive(Debug, Clone, PartialEq)]
pub struct WhereClause {
    pub sql: String,
    pub params: Vec<SqlValue>,
}

impl SearchCriteria {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(m) = self.min_magnitude {
            check_finite("min_magnitude", m)?;
        }
        if let Some(d) = self.max_depth_km {
            check_finite("max_depth_km", d)?;
        }
        Ok(())
    }

    /// Resolve the supplied criteria into SQL over `e` (Earthquake),
    /// `r` (Region) and `z` (SeismicZone).
    pub fn to_where_clause(&self) -> WhereClause {
        let mut conditions: Vec<String> = Vec::new();
        let mut params: Vec<SqlValue> = Vec::new();

        let mut push = |condition: &str, value: SqlValue| {
            params.push(value);
            conditions.push(condition.replace('?', &format!("?{}", params.len())));
        };

        if let Some(m) = self.min_magnitude {
            push("e.magnitude >= ?", m.into());
        }
        if let Some(d) = self.max_depth_km {
            push("e.depth_km <= ?", d.into());
        }
        if let Some(id) = self.region_id {
            push("e.region_id = ?", id.into());
        }
        if let Some(level) = self.min_risk_level {
            push("z.risk_level >= ?", i64::from(level).into());
        }
        if let Some(p) = self.min_population {
            push("r.population IS NOT NULL AND r.population >= ?", p.into());
        }

        let sql = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        WhereClause { sql, params }
    }
}
