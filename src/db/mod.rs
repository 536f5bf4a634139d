//! Database layer
//!
//! SQLite (default, single-file deployment) or MySQL, selected from
//! configuration. Repositories hold a `DynDatabasePool` and dispatch on its
//! driver with [`with_pool!`].
//!
//! ```ignore
//! use emgurus::config::DatabaseConfig;
//! use emgurus::db::{create_pool, migrations};
//!
//! let pool = create_pool(&DatabaseConfig::default()).await?;
//! migrations::run_migrations(&pool).await?;
//! ```

/// Run `$body` with `$p` bound to the concrete SQLite or MySQL pool.
///
/// The body is expanded once per driver, so it must type-check against both
/// `&SqlitePool` and `&MySqlPool`.
macro_rules! with_pool {
    ($db:expr, |$p:ident| $body:expr) => {
        match $db.driver() {
            $crate::config::DatabaseDriver::Sqlite => {
                let $p = ::anyhow::Context::context($db.as_sqlite(), "SQLite pool unavailable")?;
                $body
            }
            $crate::config::DatabaseDriver::Mysql => {
                let $p = ::anyhow::Context::context($db.as_mysql(), "MySQL pool unavailable")?;
                $body
            }
        }
    };
}

pub(crate) use with_pool;

pub mod migrations;
pub mod pool;
pub mod repositories;

pub use pool::{
    create_pool, create_test_pool, DatabasePool, DynDatabasePool, MysqlDatabase, SqliteDatabase,
};
