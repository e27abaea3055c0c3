use rusqlite::{Connection, OptionalExtension};

use crate::error::{QuakeError, Result};
use crate::schema::{DependencyResolver, TableSchema};

/// Outcome of [`ensure_schema`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SchemaReport {
    pub created: Vec<&'static str>,
    pub existing: Vec<&'static str>,
}

/// Generate CREATE TABLE SQL for a table schema
pub fn generate_create_table(schema: &TableSchema) -> String {
    let mut sql = format!("CREATE TABLE {} (\n", schema.name);
    let mut columns = Vec::new();

    for col in schema.columns {
        let pk = if col.primary_key { " PRIMARY KEY" } else { "" };
        let null_constraint = if !col.nullable && !col.primary_key {
            " NOT NULL"
        } else {
            ""
        };
        let check = col
            .check
            .map(|expr| format!(" CHECK ({expr})"))
            .unwrap_or_default();

        columns.push(format!(
            "    {} {}{}{}{}",
            col.name,
            col.col_type.sql_name(),
            pk,
            null_constraint,
            check
        ));
    }

    // Add foreign key constraints
    for fk in schema.foreign_keys {
        columns.push(format!(
            "    FOREIGN KEY ({}) REFERENCES {}({})",
            fk.column, fk.references_table, fk.references_column
        ));
    }

    sql.push_str(&columns.join(",\n"));
    sql.push_str("\n)");

    sql
}

/// Generate CREATE INDEX statements for foreign key columns and explicit indexes
pub fn generate_indexes(schema: &TableSchema) -> Vec<String> {
    let fk_indexes = schema.foreign_keys.iter().map(|fk| {
        format!(
            "CREATE INDEX IF NOT EXISTS idx_{}_{} ON {}({})",
            schema.name, fk.column, schema.name, fk.column
        )
    });

    let explicit = schema.indexes.iter().map(|index| {
        format!(
            "CREATE {}INDEX IF NOT EXISTS idx_{}_{} ON {}({})",
            if index.unique { "UNIQUE " } else { "" },
            schema.name,
            index.columns.join("_"),
            schema.name,
            index.columns.join(", ")
        )
    });

    fk_indexes.chain(explicit).collect()
}

/// Create any missing tables; verify the ones already present.
///
/// Safe to run on every start-up. Tables are created in foreign-key order
/// inside one transaction, so a failure leaves the store as it was.
pub fn ensure_schema(conn: &mut Connection) -> Result<SchemaReport> {
    let fk_enabled: bool = conn.query_row("PRAGMA foreign_keys", [], |row| row.get(0))?;
    if !fk_enabled {
        return Err(QuakeError::schema(
            "foreign key enforcement is disabled on this connection",
        ));
    }

    let tables = DependencyResolver::new().creation_order()?;
    let tx = conn.transaction()?;
    let mut report = SchemaReport::default();

    for schema in tables {
        if table_exists(&tx, schema.name)? {
            verify_columns(&tx, schema)?;
            verify_foreign_keys(&tx, schema)?;
            verify_checks(&tx, schema)?;
            report.existing.push(schema.name);
        } else {
            tx.execute(&generate_create_table(schema), [])
                .map_err(|e| QuakeError::schema(format!("failed to create {}: {e}", schema.name)))?;
            report.created.push(schema.name);
        }

        for index_sql in generate_indexes(schema) {
            tx.execute(&index_sql, []).map_err(|e| {
                QuakeError::schema(format!("failed to create index for {}: {e}", schema.name))
            })?;
        }
    }

    tx.commit()?;

    tracing::info!(
        created = ?report.created,
        existing = ?report.existing,
        "schema ready"
    );
    Ok(report)
}

fn table_exists(conn: &Connection, name: &str) -> Result<bool> {
    let found = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1",
            [name],
            |_| Ok(()),
        )
        .optional()?;
    Ok(found.is_some())
}

/// Check an existing table against its definition
fn verify_columns(conn: &Connection, schema: &TableSchema) -> Result<()> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", schema.name))?;
    let existing: Vec<(String, String, bool)> = stmt
        .query_map([], |row| Ok((row.get(1)?, row.get(2)?, row.get(3)?)))?
        .collect::<rusqlite::Result<_>>()?;

    for col in schema.columns {
        let Some((_, declared, not_null)) = existing.iter().find(|(name, _, _)| name == col.name)
        else {
            return Err(QuakeError::schema(format!(
                "existing table {} has no column {}",
                schema.name, col.name
            )));
        };

        if !declared.eq_ignore_ascii_case(col.col_type.sql_name()) {
            return Err(QuakeError::schema(format!(
                "{}.{} is declared {declared}, expected {}",
                schema.name,
                col.name,
                col.col_type.sql_name()
            )));
        }

        // INTEGER PRIMARY KEY aliases rowid and never reports NOT NULL
        if !col.primary_key && *not_null == col.nullable {
            return Err(QuakeError::schema(format!(
                "{}.{} nullability differs from the expected layout",
                schema.name, col.name
            )));
        }
    }

    Ok(())
}

/// Every declared foreign key must be present on the existing table
fn verify_foreign_keys(conn: &Connection, schema: &TableSchema) -> Result<()> {
    let mut stmt = conn.prepare(&format!("PRAGMA foreign_key_list({})", schema.name))?;
    // (parent table, child column, parent column); parent column is NULL for implicit primary keys
    let existing: Vec<(String, String, Option<String>)> = stmt
        .query_map([], |row| Ok((row.get(2)?, row.get(3)?, row.get(4)?)))?
        .collect::<rusqlite::Result<_>>()?;

    for fk in schema.foreign_keys {
        let present = existing.iter().any(|(table, from, to)| {
            table.eq_ignore_ascii_case(fk.references_table)
                && from == fk.column
                && to.as_deref().map_or(true, |to| to == fk.references_column)
        });

        if !present {
            return Err(QuakeError::schema(format!(
                "existing table {} lacks FOREIGN KEY ({}) REFERENCES {}({})",
                schema.name, fk.column, fk.references_table, fk.references_column
            )));
        }
    }

    Ok(())
}

/// Every declared CHECK constraint must appear in the existing table's definition
fn verify_checks(conn: &Connection, schema: &TableSchema) -> Result<()> {
    let sql: String = conn.query_row(
        "SELECT sql FROM sqlite_master WHERE type = 'table' AND name = ?1",
        [schema.name],
        |row| row.get(0),
    )?;
    let declared = normalize_sql(&sql);

    for col in schema.columns {
        let Some(expr) = col.check else { continue };
        if !declared.contains(&normalize_sql(expr)) {
            return Err(QuakeError::schema(format!(
                "existing table {} lacks CHECK ({expr}) on {}",
                schema.name, col.name
            )));
        }
    }

    Ok(())
}

/// Lowercase with all whitespace removed
fn normalize_sql(sql: &str) -> String {
    sql.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}
