pub mod cli;
pub mod config;
pub mod error;
pub mod filter;
pub mod logging;
pub mod model;
pub mod query;
pub mod schema;
pub mod seed;
pub mod shape;
pub mod store;

pub use config::{QueryConfig, StoreConfig};
pub use error::{QuakeError, Result};
pub use query::QueryEngine;
pub use store::Store;
