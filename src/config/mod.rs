//! Configuration persistence and typed lookups.
//!
//! - `properties` - flat `key=value` property file (read/modify/rewrite)
//! - `database` - database portal resolved from properties (JDBC-style URL)

mod database;
mod properties;

pub use database::*;
pub use properties::*;
