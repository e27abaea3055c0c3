//! Table definitions for the earthquake store

use super::types::*;

// =============================================================================
// Reference Tables (seeded once, read-mostly)
// =============================================================================

pub static REGION: TableSchema = TableSchema {
    name: "Region",
    columns: &[
        Column::key("region_id"),
        Column::required("region_name", ColumnType::Text),
        Column::required("country", ColumnType::Text),
        // NULL marks an unclassified region with no resident population
        Column::new("population", ColumnType::Integer).check("population >= 0"),
    ],
    foreign_keys: &[],
    indexes: &[],
};

pub static SEISMIC_ZONE: TableSchema = TableSchema {
    name: "SeismicZone",
    columns: &[
        Column::key("zone_id"),
        Column::required("zone_name", ColumnType::Text),
        Column::required("risk_level", ColumnType::Integer),
    ],
    foreign_keys: &[],
    indexes: &[],
};

// =============================================================================
// Event Table (append-only)
// =============================================================================

pub static EARTHQUAKE: TableSchema = TableSchema {
    name: "Earthquake",
    columns: &[
        Column::key("quake_id"),
        Column::required("datetime", ColumnType::Text),
        Column::required("magnitude", ColumnType::Real),
        Column::required("depth_km", ColumnType::Real).check("depth_km >= 0"),
        Column::required("latitude", ColumnType::Real).check("latitude BETWEEN -90 AND 90"),
        Column::required("longitude", ColumnType::Real).check("longitude BETWEEN -180 AND 180"),
        Column::required("place", ColumnType::Text),
        Column::required("region_id", ColumnType::Integer),
        Column::required("zone_id", ColumnType::Integer),
    ],
    foreign_keys: &[
        ForeignKey::new("region_id", "Region", "region_id"),
        ForeignKey::new("zone_id", "SeismicZone", "zone_id"),
    ],
    indexes: &[Index::on(&["datetime"]), Index::on(&["magnitude"])],
};

// =============================================================================
// Table Registry
// =============================================================================

/// All tables in the store
pub static ALL_TABLES: &[&TableSchema] = &[&REGION, &SEISMIC_ZONE, &EARTHQUAKE];

/// Get a table schema by name
pub fn get_table(name: &str) -> Option<&'static TableSchema> {
    ALL_TABLES.iter().find(|t| t.name == name).copied()
}

/// Get all table names
pub fn table_names() -> Vec<&'static str> {
    ALL_TABLES.iter().map(|t| t.name).collect()
}
