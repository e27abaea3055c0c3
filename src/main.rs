use anyhow::{Context, Result};
use quake_analytics::{
    cli::{AddQuakeArgs, Cli, Commands, QueryCommand},
    config::{QueryConfig, StoreConfig},
    filter::SearchCriteria,
    logging::init_tracing,
    model::{Earthquake, NewEarthquake, Region, SeismicZone},
    query::{MagnitudeFilter, NearbyParams, QueryEngine},
    schema::DependencyResolver,
    seed::{classify_region, classify_zone, seed_reference_data},
    store::Store,
};
use serde::Serialize;
use std::time::Instant;

fn main() -> Result<()> {
    let cli = Cli::parse_args();
    init_tracing(cli.debug)?;

    if let Commands::ListTables = cli.command {
        println!("Tables (creation order):\n");
        for table in DependencyResolver::new().creation_order()? {
            println!("  {}", table.name);
        }
        return Ok(());
    }

    let config = match cli.db {
        Some(path) => StoreConfig::new(path),
        None => StoreConfig::in_data_dir()?,
    }
    .with_pool_size(cli.pool_size);

    let store = Store::open(config.clone())
        .with_context(|| format!("Failed to open store at {:?}", config.db_path))?;

    match cli.command {
        Commands::ListTables => {}

        Commands::Init => {
            let report = seed_reference_data(&store).context("Failed to seed reference data")?;
            println!(
                "Store ready at {:?} ({} regions, {} zones added)",
                config.db_path, report.regions, report.zones
            );
        }

        Commands::Regions => print_json(&store.list_all::<Region>()?)?,

        Commands::Zones => print_json(&store.list_all::<SeismicZone>()?)?,

        Commands::AddQuake(args) => {
            let quake = new_quake(args);
            let id = store.insert(&quake).context("Failed to insert earthquake")?;
            let stored: Earthquake = store.get_by_id(id)?;
            print_json(&stored)?;
        }

        Commands::Query(query) => {
            let engine = QueryEngine::with_config(store, QueryConfig::default());
            let start = Instant::now();
            run_query(&engine, query)?;
            tracing::debug!(elapsed_ms = start.elapsed().as_millis() as u64, "query finished");
        }
    }

    Ok(())
}

fn new_quake(args: AddQuakeArgs) -> NewEarthquake {
    NewEarthquake {
        datetime: args.datetime,
        magnitude: args.magnitude,
        depth_km: args.depth_km,
        latitude: args.lat,
        longitude: args.lon,
        place: args.place,
        region_id: args
            .region_id
            .unwrap_or_else(|| classify_region(args.lat, args.lon)),
        zone_id: args
            .zone_id
            .unwrap_or_else(|| classify_zone(args.lat, args.lon)),
    }
}

fn run_query(engine: &QueryEngine, query: QueryCommand) -> Result<()> {
    match query {
        QueryCommand::RegionQuakes { region_id } => print_json(&engine.quakes_in_region(region_id)?),
        QueryCommand::AvgMagnitude { region_id } => print_json(&engine.average_magnitude(region_id)?),
        QueryCommand::Nearby {
            lat,
            lon,
            radius_km,
        } => print_json(&engine.quakes_near(NearbyParams::new(lat, lon, radius_km)?)?),
        QueryCommand::MostActive { top_n } => print_json(&engine.most_active_regions(top_n)?),
        QueryCommand::HighMagnitude {
            min_magnitude,
            start_date,
            end_date,
            limit,
        } => {
            let filter = MagnitudeFilter {
                min_magnitude,
                start_date,
                end_date,
                limit,
            };
            print_json(&engine.quakes_at_or_above(filter)?)
        }
        QueryCommand::MinQuakes { min_count } => {
            print_json(&engine.regions_with_min_quakes(min_count)?)
        }
        QueryCommand::AboveAverage => print_json(&engine.regions_above_average()?),
        QueryCommand::Search {
            min_magnitude,
            max_depth_km,
            region_id,
            min_risk_level,
            min_population,
        } => {
            let criteria = SearchCriteria {
                min_magnitude,
                max_depth_km,
                region_id,
                min_risk_level,
                min_population,
            };
            print_json(&engine.search(&criteria)?)
        }
        QueryCommand::HighPopulation { min_population } => {
            print_json(&engine.quakes_in_populous_regions(min_population)?)
        }
        QueryCommand::RiskSummary { region_id } => print_json(&engine.risk_summary(region_id)?),
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize result")?;
    println!("{json}");
    Ok(())
}
