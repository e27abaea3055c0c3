//! The ten analytical queries.
//!
//! Every operation validates its parameters, checks out one session for its
//! duration, and returns an ordered (possibly empty) list of shaped records.
//! Ordering ties are always broken by primary key so results are
//! deterministic.

pub mod geo;
pub mod params;

use tracing::{debug, instrument};

use crate::config::QueryConfig;
use crate::error::{QuakeError, Result};
use crate::filter::SearchCriteria;
use crate::model::{Earthquake, Region};
use crate::shape::{
    AboveAverageRegion, MagnitudeAverage, MagnitudeStats, NearbyQuake, PopulatedRegionQuake,
    QuakeInRegion, RegionActivity, RiskSummary, SearchHit, ZoneRisk,
};
use crate::store::{SqlValue, Store};

pub use geo::{haversine_km, EARTH_RADIUS_KM};
pub use params::{MagnitudeFilter, NearbyParams};

/// Select list for a full Earthquake row joined with its region as `r`
const QUAKE_WITH_REGION: &str = "e.quake_id, e.datetime, e.magnitude, e.depth_km, \
     e.latitude, e.longitude, e.place, e.region_id, e.zone_id, r.region_name";

/// Read-only query engine over a shared [`Store`]
#[derive(Clone)]
pub struct QueryEngine {
    store: Store,
    config: QueryConfig,
}

impl QueryEngine {
    pub fn new(store: Store) -> Self {
        Self::with_config(store, QueryConfig::default())
    }

    pub fn with_config(store: Store, config: QueryConfig) -> Self {
        Self { store, config }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// 1. Earthquakes recorded in a region, oldest first
    #[instrument(skip(self))]
    pub fn quakes_in_region(&self, region_id: i64) -> Result<Vec<QuakeInRegion>> {
        let sql = format!(
            "SELECT {QUAKE_WITH_REGION}
             FROM Earthquake AS e
             JOIN Region AS r ON e.region_id = r.region_id
             WHERE e.region_id = ?1
             ORDER BY e.datetime ASC, e.quake_id ASC"
        );

        let rows: Vec<QuakeInRegion> = self.store.query(&sql, &[region_id.into()])?;
        debug!(rows = rows.len(), "quakes in region");
        Ok(rows)
    }

    /// 2. Average magnitude of a region's quakes.
    ///
    /// Fails with `NotFound` when the region has no recorded quakes.
    #[instrument(skip(self))]
    pub fn average_magnitude(&self, region_id: i64) -> Result<MagnitudeAverage> {
        let sql = "SELECT r.region_id, r.region_name,
                          COUNT(e.quake_id) AS quake_count,
                          AVG(e.magnitude) AS avg_magnitude
                   FROM Earthquake AS e
                   JOIN Region AS r ON e.region_id = r.region_id
                   WHERE r.region_id = ?1
                   GROUP BY r.region_id, r.region_name";

        self.store
            .query::<MagnitudeAverage>(sql, &[region_id.into()])?
            .into_iter()
            .next()
            .ok_or(QuakeError::NotFound {
                entity: "quakes for region",
                id: region_id,
            })
    }

    /// 3. Earthquakes within `radius_km` great-circle distance, nearest first
    #[instrument(skip(self))]
    pub fn quakes_near(&self, params: NearbyParams) -> Result<Vec<NearbyQuake>> {
        params.validate()?;

        // The band never excludes a point inside the radius; haversine decides membership
        let (lat_min, lat_max) = geo::latitude_band(params.latitude, params.radius_km);
        let sql = "SELECT * FROM Earthquake AS e
                   WHERE e.latitude BETWEEN ?1 AND ?2";

        let candidates: Vec<Earthquake> = self.store.query(sql, &[lat_min.into(), lat_max.into()])?;
        let scanned = candidates.len();

        let mut nearby: Vec<NearbyQuake> = candidates
            .into_iter()
            .filter_map(|quake| {
                let distance_km = haversine_km(
                    params.latitude,
                    params.longitude,
                    quake.latitude,
                    quake.longitude,
                );
                (distance_km <= params.radius_km).then_some(NearbyQuake { quake, distance_km })
            })
            .collect();

        nearby.sort_by(|a, b| {
            a.distance_km
                .total_cmp(&b.distance_km)
                .then(a.quake.quake_id.cmp(&b.quake.quake_id))
        });

        debug!(scanned, rows = nearby.len(), "quakes near location");
        Ok(nearby)
    }

    /// 4. Regions with the most quakes.
    ///
    /// `top_n` falls back to [`QueryConfig::default_top_n`].
    #[instrument(skip(self))]
    pub fn most_active_regions(&self, top_n: Option<usize>) -> Result<Vec<RegionActivity>> {
        let top_n = top_n.unwrap_or(self.config.default_top_n);
        if top_n == 0 {
            return Err(QuakeError::invalid("top_n", "must be at least 1"));
        }
        let limit = i64::try_from(top_n).unwrap_or(i64::MAX);

        let sql = "SELECT r.region_id, r.region_name, r.country,
                          COUNT(e.quake_id) AS quake_count
                   FROM Earthquake AS e
                   JOIN Region AS r ON e.region_id = r.region_id
                   GROUP BY r.region_id, r.region_name, r.country
                   ORDER BY quake_count DESC, r.region_id ASC
                   LIMIT ?1";

        let rows: Vec<RegionActivity> = self.store.query(sql, &[limit.into()])?;
        debug!(rows = rows.len(), "most active regions");
        Ok(rows)
    }

    /// 5. Earthquakes at or above a magnitude, strongest first
    #[instrument(skip(self))]
    pub fn quakes_at_or_above(&self, filter: MagnitudeFilter) -> Result<Vec<QuakeInRegion>> {
        filter.validate()?;

        let mut conditions = vec!["e.magnitude >= ?1".to_string()];
        let mut args: Vec<SqlValue> = vec![filter.min_magnitude.into()];

        if let Some(start) = filter.start_date {
            args.push(start.format("%Y-%m-%d 00:00:00").to_string().into());
            conditions.push(format!("e.datetime >= ?{}", args.len()));
        }
        if let Some(end) = filter.end_date {
            args.push(end.format("%Y-%m-%d 23:59:59").to_string().into());
            conditions.push(format!("e.datetime <= ?{}", args.len()));
        }

        let limit = match filter.limit {
            Some(limit) => {
                args.push(i64::try_from(limit).unwrap_or(i64::MAX).into());
                format!("LIMIT ?{}", args.len())
            }
            None => String::new(),
        };

        let sql = format!(
            "SELECT {QUAKE_WITH_REGION}
             FROM Earthquake AS e
             JOIN Region AS r ON e.region_id = r.region_id
             WHERE {}
             ORDER BY e.magnitude DESC, e.datetime DESC, e.quake_id ASC
             {limit}",
            conditions.join(" AND ")
        );

        let rows: Vec<QuakeInRegion> = self.store.query(&sql, &args)?;
        debug!(rows = rows.len(), "quakes at or above magnitude");
        Ok(rows)
    }

    /// 6. Regions with at least `min_count` quakes
    #[instrument(skip(self))]
    pub fn regions_with_min_quakes(&self, min_count: u32) -> Result<Vec<RegionActivity>> {
        let sql = "SELECT r.region_id, r.region_name, r.country,
                          COUNT(e.quake_id) AS quake_count
                   FROM Earthquake AS e
                   JOIN Region AS r ON e.region_id = r.region_id
                   GROUP BY r.region_id, r.region_name, r.country
                   HAVING COUNT(e.quake_id) >= ?1
                   ORDER BY quake_count DESC, r.region_id ASC";

        let rows: Vec<RegionActivity> = self.store.query(sql, &[i64::from(min_count).into()])?;
        debug!(rows = rows.len(), "regions with minimum quake count");
        Ok(rows)
    }

    /// 7. Regions whose quake count is strictly above the mean.
    ///
    /// The mean is taken over regions with at least one quake; a region
    /// exactly at the mean is excluded.
    #[instrument(skip(self))]
    pub fn regions_above_average(&self) -> Result<Vec<AboveAverageRegion>> {
        let sql = "WITH region_counts AS (
                       SELECT region_id, COUNT(*) AS quake_count
                       FROM Earthquake
                       GROUP BY region_id
                   ),
                   average AS (
                       SELECT AVG(quake_count) AS average_count FROM region_counts
                   )
                   SELECT r.region_id, r.region_name, rc.quake_count, a.average_count
                   FROM region_counts AS rc
                   JOIN average AS a
                   JOIN Region AS r ON rc.region_id = r.region_id
                   WHERE rc.quake_count > a.average_count
                   ORDER BY rc.quake_count DESC, r.region_id ASC";

        let rows: Vec<AboveAverageRegion> = self.store.query(sql, &[])?;
        debug!(rows = rows.len(), "regions above average activity");
        Ok(rows)
    }

    /// 8. Earthquakes matching every supplied criterion, newest first.
    ///
    /// With no criteria every quake is returned.
    #[instrument(skip(self))]
    pub fn search(&self, criteria: &SearchCriteria) -> Result<Vec<SearchHit>> {
        criteria.validate()?;
        let clause = criteria.to_where_clause();

        let sql = format!(
            "SELECT {QUAKE_WITH_REGION}, z.zone_name, z.risk_level
             FROM Earthquake AS e
             JOIN Region AS r ON e.region_id = r.region_id
             JOIN SeismicZone AS z ON e.zone_id = z.zone_id
             {}
             ORDER BY e.datetime DESC, e.quake_id ASC",
            clause.sql
        );

        let rows: Vec<SearchHit> = self.store.query(&sql, &clause.params)?;
        debug!(rows = rows.len(), "multi-criteria search");
        Ok(rows)
    }

    /// 9. Earthquakes in regions with at least `min_population` residents.
    ///
    /// Regions without a recorded population never match, whatever the
    /// minimum; a negative minimum matches every populated region.
    #[instrument(skip(self))]
    pub fn quakes_in_populous_regions(&self, min_population: i64) -> Result<Vec<PopulatedRegionQuake>> {
        let sql = format!(
            "SELECT {QUAKE_WITH_REGION}, r.population
             FROM Earthquake AS e
             JOIN Region AS r ON e.region_id = r.region_id
             WHERE r.population IS NOT NULL AND r.population >= ?1
             ORDER BY e.datetime DESC, e.quake_id ASC"
        );

        let rows: Vec<PopulatedRegionQuake> = self.store.query(&sql, &[min_population.into()])?;
        debug!(rows = rows.len(), "quakes in populous regions");
        Ok(rows)
    }

    /// 10. Quake statistics and zone risk levels for one region.
    ///
    /// Fails with `NotFound` when the region does not exist. A region with no
    /// quakes yields a zero count, no magnitude statistics and no zones.
    #[instrument(skip(self))]
    pub fn risk_summary(&self, region_id: i64) -> Result<RiskSummary> {
        self.store.with_session(|session| {
            let region: Region = session.get_by_id(region_id)?;

            let stats = session
                .query::<MagnitudeStats>(
                    "SELECT COUNT(*) AS quake_count,
                            AVG(magnitude) AS avg_magnitude,
                            MAX(magnitude) AS max_magnitude
                     FROM Earthquake
                     WHERE region_id = ?1",
                    &[region_id.into()],
                )?
                .into_iter()
                .next()
                .ok_or(QuakeError::Shaping {
                    shape: "MagnitudeStats",
                    field: "quake_count",
                    reason: "aggregate returned no row".to_string(),
                })?;

            let zones: Vec<ZoneRisk> = session.query(
                "SELECT z.zone_id, z.zone_name, z.risk_level,
                        COUNT(e.quake_id) AS quake_count
                 FROM Earthquake AS e
                 JOIN SeismicZone AS z ON e.zone_id = z.zone_id
                 WHERE e.region_id = ?1
                 GROUP BY z.zone_id, z.zone_name, z.risk_level
                 ORDER BY z.risk_level DESC, z.zone_id ASC",
                &[region_id.into()],
            )?;

            debug!(quakes = stats.quake_count, zones = zones.len(), "risk summary");

            Ok(RiskSummary {
                region_id: region.region_id,
                region_name: region.region_name,
                country: region.country,
                population: region.population,
                quake_count: stats.quake_count,
                avg_magnitude: stats.avg_magnitude,
                max_magnitude: stats.max_magnitude,
                zones,
            })
        })
    }
}
