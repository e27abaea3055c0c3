//! Data access: pooled sessions and generic CRUD over the entity tables.

pub mod migrate;
pub mod pool;
pub mod value;

pub use migrate::{ensure_schema, generate_create_table, generate_indexes, SchemaReport};
pub use pool::{ConnectionPool, PoolStatus, Session};
pub use value::SqlValue;

use rusqlite::params_from_iter;

use crate::config::StoreConfig;
use crate::error::{QuakeError, Result};
use crate::schema::TableSchema;
use crate::shape::{shape_row, FromRow};

/// A record stored in one of the schema tables
pub trait Entity: FromRow {
    const SCHEMA: &'static TableSchema;
}

/// A record that can be written to the table of its entity
pub trait Insertable {
    type Entity: Entity;

    /// Column/value pairs to insert, in column order
    fn values(&self) -> Vec<(&'static str, SqlValue)>;

    /// Reject values the table would store lossily
    fn validate(&self) -> Result<()> {
        Ok(())
    }
}

/// Behaviour when an inserted key already exists
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertMode {
    /// Fail with a constraint error
    Strict,
    /// Skip rows whose key is already present
    IgnoreExisting,
}

/// Handle to the SQLite store; cheap to clone, shares one connection pool
#[derive(Clone, Debug)]
pub struct Store {
    pool: ConnectionPool,
}

impl Store {
    /// Open the pool and run the schema migration
    pub fn open(config: StoreConfig) -> Result<Self> {
        let store = Self::connect(config)?;
        store.with_session(|session| ensure_schema(session))?;
        Ok(store)
    }

    /// Open the pool without touching the schema
    pub fn connect(config: StoreConfig) -> Result<Self> {
        Ok(Self {
            pool: ConnectionPool::new(config)?,
        })
    }

    /// Check out a scoped session
    pub fn session(&self) -> Result<Session> {
        self.pool.acquire()
    }

    /// Run `f` with a session that is released however `f` exits
    pub fn with_session<T>(&self, f: impl FnOnce(&mut Session) -> Result<T>) -> Result<T> {
        let mut session = self.session()?;
        f(&mut session)
    }

    pub fn status(&self) -> PoolStatus {
        self.pool.status()
    }

    pub fn config(&self) -> &StoreConfig {
        self.pool.config()
    }

    pub fn get_by_id<E: Entity>(&self, id: i64) -> Result<E> {
        self.with_session(|session| session.get_by_id(id))
    }

    pub fn list_all<E: Entity>(&self) -> Result<Vec<E>> {
        self.with_session(|session| session.list_all())
    }

    pub fn insert<I: Insertable>(&self, record: &I) -> Result<i64> {
        self.with_session(|session| session.insert(record))
    }

    pub fn insert_many<I: Insertable>(&self, records: &[I], mode: InsertMode) -> Result<usize> {
        self.with_session(|session| session.insert_many(records, mode))
    }

    pub fn query<R: FromRow>(&self, sql: &str, params: &[SqlValue]) -> Result<Vec<R>> {
        self.with_session(|session| session.query(sql, params))
    }
}

impl Session {
    /// Fetch one entity by primary key
    pub fn get_by_id<E: Entity>(&self, id: i64) -> Result<E> {
        let schema = E::SCHEMA;
        let sql = format!(
            "SELECT * FROM {} WHERE {} = ?1",
            schema.name,
            schema.primary_key()
        );

        self.query::<E>(&sql, &[SqlValue::Integer(id)])?
            .into_iter()
            .next()
            .ok_or(QuakeError::NotFound {
                entity: schema.name,
                id,
            })
    }

    /// All rows of an entity's table in key order
    pub fn list_all<E: Entity>(&self) -> Result<Vec<E>> {
        let schema = E::SCHEMA;
        let sql = format!(
            "SELECT * FROM {} ORDER BY {}",
            schema.name,
            schema.primary_key()
        );
        self.query(&sql, &[])
    }

    /// Insert one record, returning its primary key
    pub fn insert<I: Insertable>(&self, record: &I) -> Result<i64> {
        record.validate()?;
        let values = record.values();
        let sql = insert_sql(I::Entity::SCHEMA, &values, InsertMode::Strict);

        let mut stmt = self.prepare_cached(&sql)?;
        stmt.execute(params_from_iter(values.iter().map(|(_, v)| v)))?;

        let id = self.last_insert_rowid();
        tracing::debug!(table = I::Entity::SCHEMA.name, id, "inserted row");
        Ok(id)
    }

    /// Insert a batch inside one transaction, returning the number of rows written
    pub fn insert_many<I: Insertable>(&mut self, records: &[I], mode: InsertMode) -> Result<usize> {
        let schema = I::Entity::SCHEMA;
        records.iter().try_for_each(|record| record.validate())?;
        let tx = self.transaction()?;
        let mut count = 0;

        for record in records {
            let values = record.values();
            let sql = insert_sql(schema, &values, mode);
            let mut stmt = tx.prepare_cached(&sql)?;
            count += stmt.execute(params_from_iter(values.iter().map(|(_, v)| v)))?;
        }

        tx.commit()?;
        tracing::debug!(table = schema.name, rows = count, "inserted batch");
        Ok(count)
    }

    /// Run a read-only statement and shape every row into `R`.
    ///
    /// Statements that would modify the store are refused before they run.
    pub fn query<R: FromRow>(&self, sql: &str, params: &[SqlValue]) -> Result<Vec<R>> {
        let mut stmt = self.prepare_cached(sql)?;
        if !stmt.readonly() {
            return Err(QuakeError::InvalidQuery {
                reason: "statement is not read-only".to_string(),
            });
        }

        let mut rows = stmt.query(params_from_iter(params))?;
        let mut shaped = Vec::new();
        while let Some(row) = rows.next()? {
            shaped.push(shape_row(row)?);
        }

        Ok(shaped)
    }
}

fn insert_sql(schema: &TableSchema, values: &[(&'static str, SqlValue)], mode: InsertMode) -> String {
    let columns: Vec<&str> = values.iter().map(|(name, _)| *name).collect();
    let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("?{i}")).collect();
    let verb = match mode {
        InsertMode::Strict => "INSERT",
        InsertMode::IgnoreExisting => "INSERT OR IGNORE",
    };

    format!(
        "{} INTO {} ({}) VALUES ({})",
        verb,
        schema.name,
        columns.join(", "),
        placeholders.join(", ")
    )
}
