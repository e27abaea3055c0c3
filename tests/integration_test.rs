//! Integration tests for the query engine against a real SQLite file.
//!
//! Two kinds of tests live here:
//! 1. Scenario tests that build a small store by hand and check exact results
//! 2. Property tests over a shared store filled with randomly generated quakes,
//!    comparing every query against a brute-force answer computed in Rust

use chrono::{Duration, NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use rand::{Rng, SeedableRng};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tempfile::TempDir;

use quake_analytics::filter::SearchCriteria;
use quake_analytics::model::{Earthquake, NewEarthquake, Region, SeismicZone};
use quake_analytics::query::{haversine_km, MagnitudeFilter, NearbyParams};
use quake_analytics::seed::{classify_region, classify_zone, seed_reference_data};
use quake_analytics::store::InsertMode;
use quake_analytics::{QuakeError, QueryEngine, Store, StoreConfig};

// =============================================================================
// Test Configuration
// =============================================================================

/// Number of generated quakes in the shared store
const QUAKE_COUNT: usize = 400;

/// Random seed for reproducible data
const RANDOM_SEED: u64 = 42;

// =============================================================================
// Test Stores
// =============================================================================

struct TestStore {
    _dir: TempDir,
    engine: QueryEngine,
}

impl TestStore {
    fn empty() -> Self {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let store = Store::open(StoreConfig::new(dir.path().join("quakes.db")))
            .expect("Failed to open store");

        Self {
            _dir: dir,
            engine: QueryEngine::new(store),
        }
    }

    fn store(&self) -> &Store {
        self.engine.store()
    }

    fn region(&self, id: i64, name: &str, population: Option<i64>) {
        self.store()
            .insert(&Region {
                region_id: id,
                region_name: name.to_string(),
                country: "Testland".to_string(),
                population,
            })
            .expect("Failed to insert region");
    }

    fn zone(&self, id: i64, risk_level: i32) {
        self.store()
            .insert(&SeismicZone {
                zone_id: id,
                zone_name: format!("Zone {id}"),
                risk_level,
            })
            .expect("Failed to insert zone");
    }

    fn quake(&self, quake: &NewEarthquake) -> i64 {
        self.store().insert(quake).expect("Failed to insert quake")
    }
}

fn at(datetime: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(datetime, "%Y-%m-%d %H:%M:%S").expect("valid timestamp")
}

fn ring_of_fire_quake() -> NewEarthquake {
    NewEarthquake {
        datetime: at("2024-03-01 12:00:00"),
        magnitude: 6.5,
        depth_km: 10.0,
        latitude: 35.0,
        longitude: 139.0,
        place: "near the coast of Honshu".to_string(),
        region_id: 1,
        zone_id: 1,
    }
}

/// Region 1 "Ring of Fire" (pop 5M), zone 1 (risk 8), one 6.5 quake
fn ring_of_fire_store() -> (TestStore, i64) {
    let ts = TestStore::empty();
    ts.region(1, "Ring of Fire", Some(5_000_000));
    ts.zone(1, 8);
    let id = ts.quake(&ring_of_fire_quake());
    (ts, id)
}

fn simple_quake(region_id: i64, day: u32) -> NewEarthquake {
    NewEarthquake {
        datetime: NaiveDate::from_ymd_opt(2024, 1, day)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .expect("valid date"),
        magnitude: 5.0,
        depth_km: 5.0,
        latitude: 0.0,
        longitude: 0.0,
        place: format!("region {region_id} day {day}"),
        region_id,
        zone_id: 1,
    }
}

// =============================================================================
// Shared Random Store
// =============================================================================

/// Shared store - seeded and filled once, only read by the tests using it
static SHARED: Lazy<SharedStore> = Lazy::new(SharedStore::new);

struct SharedStore {
    ts: TestStore,
    quakes: Vec<Earthquake>,
    regions: Vec<Region>,
}

impl SharedStore {
    fn new() -> Self {
        let ts = TestStore::empty();
        seed_reference_data(ts.store()).expect("Failed to seed reference data");

        let mut rng = rand::rngs::StdRng::seed_from_u64(RANDOM_SEED);
        let base = at("2025-01-01 00:00:00");

        let quakes: Vec<NewEarthquake> = (0..QUAKE_COUNT)
            .map(|i| {
                // Cluster half the quakes around Japan so radius queries have something to find
                let (lat, lon) = if i % 2 == 0 {
                    (rng.gen_range(30.0..45.0), rng.gen_range(130.0..150.0))
                } else {
                    (rng.gen_range(-89.0..89.0), rng.gen_range(-179.0..179.0))
                };
                let magnitude: f64 = rng.gen_range(2.5..8.5);

                NewEarthquake {
                    datetime: base + Duration::seconds(rng.gen_range(0..31_536_000)),
                    magnitude: (magnitude * 10.0).round() / 10.0,
                    depth_km: rng.gen_range(0.0..700.0),
                    latitude: lat,
                    longitude: lon,
                    place: format!("generated quake {i}"),
                    region_id: classify_region(lat, lon),
                    zone_id: classify_zone(lat, lon),
                }
            })
            .collect();

        ts.store()
            .insert_many(&quakes, InsertMode::Strict)
            .expect("Failed to insert generated quakes");

        let quakes = ts.store().list_all::<Earthquake>().expect("list quakes");
        let regions = ts.store().list_all::<Region>().expect("list regions");
        assert_eq!(quakes.len(), QUAKE_COUNT);

        Self { ts, quakes, regions }
    }

    fn engine(&self) -> &QueryEngine {
        &self.ts.engine
    }

    fn counts_by_region(&self) -> BTreeMap<i64, i64> {
        let mut counts = BTreeMap::new();
        for q in &self.quakes {
            *counts.entry(q.region_id).or_insert(0) += 1;
        }
        counts
    }

    fn region(&self, id: i64) -> &Region {
        self.regions
            .iter()
            .find(|r| r.region_id == id)
            .expect("region exists")
    }
}

// =============================================================================
// Scenario Tests
// =============================================================================

#[test]
fn test_round_trip_through_region_query() {
    let (ts, id) = ring_of_fire_store();

    let rows = ts.engine.quakes_in_region(1).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].quake, ring_of_fire_quake().stored_as(id));
    assert_eq!(rows[0].region_name, "Ring of Fire");
}

#[test]
fn test_risk_summary_scenario() {
    let (ts, _) = ring_of_fire_store();

    let summary = ts.engine.risk_summary(1).unwrap();
    assert_eq!(summary.quake_count, 1);
    assert_eq!(summary.avg_magnitude, Some(6.5));
    assert_eq!(summary.max_magnitude, Some(6.5));
    assert_eq!(summary.zones.len(), 1);
    assert_eq!(summary.zones[0].zone_id, 1);
    assert_eq!(summary.zones[0].risk_level, 8);

    let json = serde_json::to_value(&summary).unwrap();
    assert_eq!(json["quake_count"], 1);
    assert_eq!(json["avg_magnitude"], 6.5);
    assert_eq!(json["zones"][0]["risk_level"], 8);
}

#[test]
fn test_magnitude_threshold_above_every_quake_is_empty() {
    let (ts, _) = ring_of_fire_store();

    let rows = ts.engine.quakes_at_or_above(MagnitudeFilter::at_least(7.0)).unwrap();
    assert!(rows.is_empty());

    // The threshold is inclusive
    let rows = ts.engine.quakes_at_or_above(MagnitudeFilter::at_least(6.5)).unwrap();
    assert_eq!(rows.len(), 1);
}

#[test]
fn test_regions_with_min_quakes_scenario() {
    let ts = TestStore::empty();
    ts.region(1, "One", None);
    ts.region(2, "Two", None);
    ts.zone(1, 3);
    ts.quake(&simple_quake(1, 1));
    for day in 1..=3 {
        ts.quake(&simple_quake(2, day));
    }

    let rows = ts.engine.regions_with_min_quakes(2).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].region_id, 2);
    assert_eq!(rows[0].quake_count, 3);

    // Inclusive bound
    assert_eq!(ts.engine.regions_with_min_quakes(1).unwrap().len(), 2);
    assert!(ts.engine.regions_with_min_quakes(4).unwrap().is_empty());
}

#[test]
fn test_region_without_quakes() {
    let (ts, _) = ring_of_fire_store();
    ts.region(2, "Quiet", Some(10));

    assert!(ts.engine.quakes_in_region(2).unwrap().is_empty());

    let err = ts.engine.average_magnitude(2).unwrap_err();
    assert!(matches!(err, QuakeError::NotFound { id: 2, .. }));
    assert_eq!(err.http_status(), 404);

    // Unknown regions behave the same way for these two queries
    assert!(ts.engine.quakes_in_region(99).unwrap().is_empty());
    assert!(ts.engine.average_magnitude(99).is_err());
}

#[test]
fn test_region_exactly_at_mean_is_not_above_average() {
    let ts = TestStore::empty();
    for id in 1..=3 {
        ts.region(id, &format!("R{id}"), None);
    }
    ts.zone(1, 3);
    // Counts 1, 2, 3: mean is exactly 2
    for (region_id, count) in [(1, 1), (2, 2), (3, 3)] {
        for day in 1..=count {
            ts.quake(&simple_quake(region_id, day));
        }
    }

    let rows = ts.engine.regions_above_average().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].region_id, 3);
    assert_eq!(rows[0].average_count, 2.0);
}

#[test]
fn test_empty_store_returns_empty_results() {
    let ts = TestStore::empty();

    assert!(ts.engine.most_active_regions(None).unwrap().is_empty());
    assert!(ts.engine.regions_above_average().unwrap().is_empty());
    assert!(ts.engine.regions_with_min_quakes(0).unwrap().is_empty());
    assert!(ts.engine.search(&SearchCriteria::default()).unwrap().is_empty());
    assert!(ts.engine.quakes_in_populous_regions(0).unwrap().is_empty());
    assert!(ts
        .engine
        .quakes_near(NearbyParams::new(0.0, 0.0, 20_000.0).unwrap())
        .unwrap()
        .is_empty());
}

#[test]
fn test_insert_with_unknown_zone_is_rejected() {
    let (ts, _) = ring_of_fire_store();

    let mut orphan = ring_of_fire_quake();
    orphan.zone_id = 77;
    let err = ts.store().insert(&orphan).unwrap_err();
    assert!(matches!(err, QuakeError::Constraint { .. }));
    assert_eq!(ts.engine.quakes_in_region(1).unwrap().len(), 1);
}

#[test]
fn test_ensure_schema_on_reopen_keeps_data() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("reopen.db");

    {
        let store = Store::open(StoreConfig::new(&path)).unwrap();
        seed_reference_data(&store).unwrap();
    }

    let store = Store::open(StoreConfig::new(&path)).unwrap();
    assert_eq!(store.list_all::<Region>().unwrap().len(), 10);
    assert_eq!(store.list_all::<SeismicZone>().unwrap().len(), 10);
}

#[test]
fn test_open_rejects_existing_tables_without_foreign_keys() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("legacy.db");

    {
        let conn = rusqlite::Connection::open(&path).unwrap();
        conn.execute_batch(
            "CREATE TABLE Region (region_id INTEGER PRIMARY KEY, region_name TEXT NOT NULL,
                 country TEXT NOT NULL, population INTEGER CHECK (population >= 0));
             CREATE TABLE SeismicZone (zone_id INTEGER PRIMARY KEY, zone_name TEXT NOT NULL,
                 risk_level INTEGER NOT NULL);
             CREATE TABLE Earthquake (
                 quake_id INTEGER PRIMARY KEY,
                 datetime TEXT NOT NULL,
                 magnitude REAL NOT NULL,
                 depth_km REAL NOT NULL CHECK (depth_km >= 0),
                 latitude REAL NOT NULL CHECK (latitude BETWEEN -90 AND 90),
                 longitude REAL NOT NULL CHECK (longitude BETWEEN -180 AND 180),
                 place TEXT NOT NULL,
                 region_id INTEGER NOT NULL,
                 zone_id INTEGER NOT NULL
             );",
        )
        .unwrap();
    }

    let err = Store::open(StoreConfig::new(&path)).unwrap_err();
    assert!(matches!(err, QuakeError::Schema { .. }), "got {err:?}");
    assert_eq!(err.http_status(), 500);
}

#[test]
fn test_sub_second_timestamp_is_rejected_not_truncated() {
    let (ts, _) = ring_of_fire_store();

    let mut precise = ring_of_fire_quake();
    precise.datetime = at("2024-03-01 12:00:00") + Duration::milliseconds(750);

    let err = ts.store().insert(&precise).unwrap_err();
    assert!(matches!(err, QuakeError::InvalidParameter { name: "datetime", .. }));
    assert_eq!(err.http_status(), 422);

    // Only the whole-second quake from the fixture is stored
    let rows = ts.engine.quakes_in_region(1).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].quake.datetime, at("2024-03-01 12:00:00"));
}

#[test]
fn test_negative_min_population_matches_populated_regions_only() {
    let (ts, _) = ring_of_fire_store();
    ts.region(2, "Open Ocean", None);
    let mut offshore = ring_of_fire_quake();
    offshore.region_id = 2;
    ts.quake(&offshore);

    let rows = ts.engine.quakes_in_populous_regions(-1).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].quake.region_id, 1);
    assert_eq!(rows[0].population, 5_000_000);
}

#[test]
fn test_concurrent_readers_share_the_pool() {
    let (ts, _) = ring_of_fire_store();
    let ts = Arc::new(ts);

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let ts = Arc::clone(&ts);
            std::thread::spawn(move || {
                for _ in 0..10 {
                    let summary = ts.engine.risk_summary(1).unwrap();
                    assert_eq!(summary.quake_count, 1);
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    let status = ts.store().status();
    assert_eq!(status.in_use, 0);
    assert!(status.idle <= status.max_size);
}

// =============================================================================
// Property Tests (shared random store)
// =============================================================================

#[test]
fn test_nearby_matches_brute_force() {
    let shared = &*SHARED;
    let params = NearbyParams::new(38.0, 142.0, 750.0).unwrap();

    let found: Vec<i64> = shared
        .engine()
        .quakes_near(params)
        .unwrap()
        .iter()
        .map(|n| n.quake.quake_id)
        .collect();

    let mut expected: Vec<(f64, i64)> = shared
        .quakes
        .iter()
        .map(|q| (haversine_km(38.0, 142.0, q.latitude, q.longitude), q.quake_id))
        .filter(|(d, _)| *d <= 750.0)
        .collect();
    expected.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
    let expected: Vec<i64> = expected.into_iter().map(|(_, id)| id).collect();

    assert!(!expected.is_empty(), "fixture should place quakes near Japan");
    assert_eq!(found, expected);
}

#[test]
fn test_nearby_results_grow_with_radius() {
    let shared = &*SHARED;
    let mut previous: HashSet<i64> = HashSet::new();

    for radius in [0.0, 50.0, 250.0, 1_000.0, 5_000.0, 21_000.0] {
        let rows = shared
            .engine()
            .quakes_near(NearbyParams::new(36.0, 140.0, radius).unwrap())
            .unwrap();

        assert!(rows.windows(2).all(|w| w[0].distance_km <= w[1].distance_km));
        assert!(rows.iter().all(|r| r.distance_km <= radius));

        let ids: HashSet<i64> = rows.iter().map(|r| r.quake.quake_id).collect();
        assert!(previous.is_subset(&ids), "radius {radius} lost results");
        previous = ids;
    }

    // Half the circumference covers the whole globe
    assert_eq!(previous.len(), QUAKE_COUNT);
}

#[test]
fn test_most_active_ordering() {
    let shared = &*SHARED;
    let rows = shared.engine().most_active_regions(Some(100)).unwrap();
    let counts = shared.counts_by_region();

    assert_eq!(rows.len(), counts.len());
    for pair in rows.windows(2) {
        let (a, b) = (&pair[0], &pair[1]);
        assert!(
            a.quake_count > b.quake_count
                || (a.quake_count == b.quake_count && a.region_id < b.region_id),
            "bad order: {a:?} before {b:?}"
        );
    }
    for row in &rows {
        assert_eq!(counts[&row.region_id], row.quake_count);
    }

    let top3 = shared.engine().most_active_regions(Some(3)).unwrap();
    assert_eq!(top3, rows[..3.min(rows.len())].to_vec());
}

#[test]
fn test_above_average_is_exactly_the_regions_over_the_mean() {
    let shared = &*SHARED;
    let counts = shared.counts_by_region();
    let mean = counts.values().sum::<i64>() as f64 / counts.len() as f64;

    let mut expected: Vec<(i64, i64)> = counts
        .iter()
        .filter(|(_, &c)| c as f64 > mean)
        .map(|(&id, &c)| (id, c))
        .collect();
    expected.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));

    let rows = shared.engine().regions_above_average().unwrap();
    let found: Vec<(i64, i64)> = rows.iter().map(|r| (r.region_id, r.quake_count)).collect();

    assert_eq!(found, expected);
    assert!(rows.iter().all(|r| (r.average_count - mean).abs() < 1e-9));
}

#[test]
fn test_populous_regions_never_include_null_population() {
    let shared = &*SHARED;

    for min_population in [-1, 0, 1_000_000, 50_000_000, 1_000_000_000] {
        let rows = shared.engine().quakes_in_populous_regions(min_population).unwrap();

        let expected = shared
            .quakes
            .iter()
            .filter(|q| {
                shared
                    .region(q.region_id)
                    .population
                    .is_some_and(|p| p >= min_population)
            })
            .count();
        assert_eq!(rows.len(), expected);

        for row in &rows {
            let region = shared.region(row.quake.region_id);
            assert_eq!(region.population, Some(row.population));
            assert!(row.population >= min_population);
        }
        assert!(rows
            .windows(2)
            .all(|w| w[0].quake.datetime >= w[1].quake.datetime));
    }
}

#[test]
fn test_search_matches_brute_force() {
    let shared = &*SHARED;
    let mut rng = rand::rngs::StdRng::seed_from_u64(RANDOM_SEED + 1);

    for _ in 0..20 {
        let criteria = SearchCriteria {
            min_magnitude: rng.gen_bool(0.5).then(|| rng.gen_range(3.0..8.0)),
            max_depth_km: rng.gen_bool(0.5).then(|| rng.gen_range(0.0..700.0)),
            region_id: rng.gen_bool(0.3).then(|| rng.gen_range(1..=10)),
            ..SearchCriteria::default()
        };

        let found: Vec<i64> = shared
            .engine()
            .search(&criteria)
            .unwrap()
            .iter()
            .map(|h| h.quake.quake_id)
            .collect();

        let mut expected: Vec<&Earthquake> = shared
            .quakes
            .iter()
            .filter(|q| criteria.min_magnitude.map_or(true, |m| q.magnitude >= m))
            .filter(|q| criteria.max_depth_km.map_or(true, |d| q.depth_km <= d))
            .filter(|q| criteria.region_id.map_or(true, |r| q.region_id == r))
            .collect();
        expected.sort_by(|a, b| b.datetime.cmp(&a.datetime).then(a.quake_id.cmp(&b.quake_id)));
        let expected: Vec<i64> = expected.iter().map(|q| q.quake_id).collect();

        assert_eq!(found, expected, "criteria {criteria:?}");
    }

    let all = shared.engine().search(&SearchCriteria::default()).unwrap();
    assert_eq!(all.len(), QUAKE_COUNT);
}

#[test]
fn test_magnitude_query_ordering() {
    let shared = &*SHARED;
    let rows = shared
        .engine()
        .quakes_at_or_above(MagnitudeFilter::at_least(6.0))
        .unwrap();

    let expected = shared.quakes.iter().filter(|q| q.magnitude >= 6.0).count();
    assert_eq!(rows.len(), expected);
    for pair in rows.windows(2) {
        let (a, b) = (&pair[0].quake, &pair[1].quake);
        assert!(a.magnitude > b.magnitude || (a.magnitude == b.magnitude && a.datetime >= b.datetime));
    }
}

#[test]
fn test_risk_summary_matches_region_quakes() {
    let shared = &*SHARED;

    for region in &shared.regions {
        let summary = shared.engine().risk_summary(region.region_id).unwrap();
        let quakes: Vec<&Earthquake> = shared
            .quakes
            .iter()
            .filter(|q| q.region_id == region.region_id)
            .collect();

        assert_eq!(summary.quake_count as usize, quakes.len());
        assert_eq!(summary.population, region.population);
        assert_eq!(
            summary.zones.iter().map(|z| z.quake_count).sum::<i64>() as usize,
            quakes.len()
        );
        assert!(summary
            .zones
            .windows(2)
            .all(|w| w[0].risk_level > w[1].risk_level
                || (w[0].risk_level == w[1].risk_level && w[0].zone_id < w[1].zone_id)));

        let max = quakes.iter().map(|q| q.magnitude).fold(None, |acc: Option<f64>, m| {
            Some(acc.map_or(m, |a| a.max(m)))
        });
        assert_eq!(summary.max_magnitude, max);
    }
}
