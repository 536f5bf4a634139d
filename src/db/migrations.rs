//! Database migrations
//!
//! Migrations are embedded in the binary as SQL strings, one variant per
//! driver, and tracked in the `_migrations` table.

use anyhow::{Context, Result};

use super::{with_pool, DynDatabasePool};
use crate::config::DatabaseDriver;

/// A database migration with SQL for both SQLite and MySQL
#[derive(Debug, Clone)]
pub struct Migration {
    /// Migration version number (unique, applied in ascending order)
    pub version: i32,
    /// Human-readable migration name
    pub name: &'static str,
    pub up_sqlite: &'static str,
    pub up_mysql: &'static str,
}

pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "create_users",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS users (
                id VARCHAR(36) PRIMARY KEY,
                email VARCHAR(255) NOT NULL UNIQUE,
                display_name VARCHAR(255) NOT NULL,
                role VARCHAR(20) NOT NULL DEFAULT 'user',
                created_at TIMESTAMP NOT NULL,
                updated_at TIMESTAMP NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_users_role ON users(role);
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS users (
                id VARCHAR(36) PRIMARY KEY,
                email VARCHAR(255) NOT NULL UNIQUE,
                display_name VARCHAR(255) NOT NULL,
                role VARCHAR(20) NOT NULL DEFAULT 'user',
                created_at DATETIME(6) NOT NULL,
                updated_at DATETIME(6) NOT NULL
            );
            CREATE INDEX idx_users_role ON users(role);
        "#,
    },
    Migration {
        version: 2,
        name: "create_sessions",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS sessions (
                token_hash VARCHAR(64) PRIMARY KEY,
                user_id VARCHAR(36) NOT NULL,
                expires_at TIMESTAMP NOT NULL,
                created_at TIMESTAMP NOT NULL,
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
            );
            CREATE INDEX IF NOT EXISTS idx_sessions_user_id ON sessions(user_id);
            CREATE INDEX IF NOT EXISTS idx_sessions_expires_at ON sessions(expires_at);
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS sessions (
                token_hash VARCHAR(64) PRIMARY KEY,
                user_id VARCHAR(36) NOT NULL,
                expires_at DATETIME(6) NOT NULL,
                created_at DATETIME(6) NOT NULL,
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
            );
            CREATE INDEX idx_sessions_user_id ON sessions(user_id);
            CREATE INDEX idx_sessions_expires_at ON sessions(expires_at);
        "#,
    },
    Migration {
        version: 3,
        name: "create_content_items",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS content_items (
                id VARCHAR(36) PRIMARY KEY,
                kind VARCHAR(20) NOT NULL,
                author_id VARCHAR(36) NOT NULL,
                title VARCHAR(500) NOT NULL,
                category VARCHAR(100),
                body TEXT NOT NULL,
                body_html TEXT NOT NULL,
                status VARCHAR(20) NOT NULL DEFAULT 'draft',
                created_at TIMESTAMP NOT NULL,
                updated_at TIMESTAMP NOT NULL,
                submitted_at TIMESTAMP,
                reviewed_by VARCHAR(36),
                reviewed_at TIMESTAMP,
                FOREIGN KEY (author_id) REFERENCES users(id) ON DELETE CASCADE
            );
            CREATE INDEX IF NOT EXISTS idx_content_items_author_id ON content_items(author_id);
            CREATE INDEX IF NOT EXISTS idx_content_items_status ON content_items(status);
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS content_items (
                id VARCHAR(36) PRIMARY KEY,
                kind VARCHAR(20) NOT NULL,
                author_id VARCHAR(36) NOT NULL,
                title VARCHAR(500) NOT NULL,
                category VARCHAR(100),
                body LONGTEXT NOT NULL,
                body_html LONGTEXT NOT NULL,
                status VARCHAR(20) NOT NULL DEFAULT 'draft',
                created_at DATETIME(6) NOT NULL,
                updated_at DATETIME(6) NOT NULL,
                submitted_at DATETIME(6),
                reviewed_by VARCHAR(36),
                reviewed_at DATETIME(6),
                FOREIGN KEY (author_id) REFERENCES users(id) ON DELETE CASCADE
            );
            CREATE INDEX idx_content_items_author_id ON content_items(author_id);
            CREATE INDEX idx_content_items_status ON content_items(status);
        "#,
    },
    Migration {
        version: 4,
        name: "create_review_assignments",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS review_assignments (
                id VARCHAR(36) PRIMARY KEY,
                content_id VARCHAR(36) NOT NULL,
                reviewer_id VARCHAR(36) NOT NULL,
                status VARCHAR(20) NOT NULL DEFAULT 'pending',
                note TEXT,
                created_at TIMESTAMP NOT NULL,
                updated_at TIMESTAMP NOT NULL,
                FOREIGN KEY (content_id) REFERENCES content_items(id) ON DELETE CASCADE,
                FOREIGN KEY (reviewer_id) REFERENCES users(id) ON DELETE CASCADE
            );
            CREATE INDEX IF NOT EXISTS idx_review_assignments_reviewer ON review_assignments(reviewer_id, status, created_at);
            CREATE INDEX IF NOT EXISTS idx_review_assignments_content ON review_assignments(content_id);
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS review_assignments (
                id VARCHAR(36) PRIMARY KEY,
                content_id VARCHAR(36) NOT NULL,
                reviewer_id VARCHAR(36) NOT NULL,
                status VARCHAR(20) NOT NULL DEFAULT 'pending',
                note TEXT,
                created_at DATETIME(6) NOT NULL,
                updated_at DATETIME(6) NOT NULL,
                FOREIGN KEY (content_id) REFERENCES content_items(id) ON DELETE CASCADE,
                FOREIGN KEY (reviewer_id) REFERENCES users(id) ON DELETE CASCADE
            );
            CREATE INDEX idx_review_assignments_reviewer ON review_assignments(reviewer_id, status, created_at);
            CREATE INDEX idx_review_assignments_content ON review_assignments(content_id);
        "#,
    },
    Migration {
        version: 5,
        name: "create_review_logs",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS review_logs (
                id VARCHAR(36) PRIMARY KEY,
                content_id VARCHAR(36) NOT NULL,
                action VARCHAR(20) NOT NULL,
                actor_id VARCHAR(36) NOT NULL,
                note TEXT,
                created_at TIMESTAMP NOT NULL,
                FOREIGN KEY (content_id) REFERENCES content_items(id) ON DELETE CASCADE
            );
            CREATE INDEX IF NOT EXISTS idx_review_logs_content ON review_logs(content_id, created_at);
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS review_logs (
                id VARCHAR(36) PRIMARY KEY,
                content_id VARCHAR(36) NOT NULL,
                action VARCHAR(20) NOT NULL,
                actor_id VARCHAR(36) NOT NULL,
                note TEXT,
                created_at DATETIME(6) NOT NULL,
                FOREIGN KEY (content_id) REFERENCES content_items(id) ON DELETE CASCADE
            );
            CREATE INDEX idx_review_logs_content ON review_logs(content_id, created_at);
        "#,
    },
];

/// Run all pending migrations.
///
/// Returns the number of migrations applied.
pub async fn run_migrations(pool: &DynDatabasePool) -> Result<usize> {
    create_migrations_table(pool).await?;

    let applied = applied_versions(pool).await?;
    let mut count = 0;

    for migration in MIGRATIONS {
        if applied.contains(&migration.version) {
            continue;
        }
        tracing::info!(
            "Applying migration {}: {}",
            migration.version,
            migration.name
        );
        apply_migration(pool, migration)
            .await
            .with_context(|| format!("Failed to apply migration: {}", migration.name))?;
        count += 1;
    }

    if count > 0 {
        tracing::info!("Applied {} migration(s)", count);
    } else {
        tracing::debug!("No pending migrations");
    }

    Ok(count)
}

async fn create_migrations_table(pool: &DynDatabasePool) -> Result<()> {
    let sql = match pool.driver() {
        DatabaseDriver::Sqlite => {
            r#"
            CREATE TABLE IF NOT EXISTS _migrations (
                version INTEGER PRIMARY KEY,
                name VARCHAR(255) NOT NULL UNIQUE,
                applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            )
            "#
        }
        DatabaseDriver::Mysql => {
            r#"
            CREATE TABLE IF NOT EXISTS _migrations (
                version INT PRIMARY KEY,
                name VARCHAR(255) NOT NULL UNIQUE,
                applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            )
            "#
        }
    };

    pool.execute(sql).await?;
    Ok(())
}

async fn applied_versions(pool: &DynDatabasePool) -> Result<Vec<i32>> {
    let versions: Vec<(i32,)> = with_pool!(pool, |p| {
        sqlx::query_as("SELECT version FROM _migrations ORDER BY version")
            .fetch_all(p)
            .await
            .context("Failed to read applied migrations")?
    });
    Ok(versions.into_iter().map(|(v,)| v).collect())
}

async fn apply_migration(pool: &DynDatabasePool, migration: &Migration) -> Result<()> {
    let sql = match pool.driver() {
        DatabaseDriver::Sqlite => migration.up_sqlite,
        DatabaseDriver::Mysql => migration.up_mysql,
    };

    for statement in split_sql_statements(sql) {
        pool.execute(statement)
            .await
            .with_context(|| format!("Failed to execute: {}", truncate_sql(statement)))?;
    }

    with_pool!(pool, |p| {
        sqlx::query("INSERT INTO _migrations (version, name) VALUES (?, ?)")
            .bind(migration.version)
            .bind(migration.name)
            .execute(p)
            .await
            .context("Failed to record migration")?;
    });

    Ok(())
}

fn truncate_sql(sql: &str) -> String {
    match sql.char_indices().nth(100) {
        Some((idx, _)) => format!("{}...", &sql[..idx]),
        None => sql.to_string(),
    }
}

/// Split SQL into individual statements, dropping comment-only fragments
fn split_sql_statements(sql: &str) -> Vec<&str> {
    sql.split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty() && !is_comment_only(s))
        .collect()
}

fn is_comment_only(s: &str) -> bool {
    s.lines()
        .map(str::trim)
        .all(|line| line.is_empty() || line.starts_with("--"))
}

/// Number of migrations not yet applied
pub async fn pending_count(pool: &DynDatabasePool) -> Result<usize> {
    create_migrations_table(pool).await?;
    let applied = applied_versions(pool).await?;
    Ok(MIGRATIONS
        .iter()
        .filter(|m| !applied.contains(&m.version))
        .count())
}

pub async fn is_up_to_date(pool: &DynDatabasePool) -> Result<bool> {
    Ok(pending_count(pool).await? == 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::create_test_pool;

    #[tokio::test]
    async fn test_run_migrations_is_idempotent() {
        let pool = create_test_pool().await.expect("Failed to create test pool");

        let count = run_migrations(&pool).await.expect("Failed to run migrations");
        assert_eq!(count, MIGRATIONS.len());

        let count = run_migrations(&pool).await.expect("Failed to run migrations");
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn test_pending_count_and_up_to_date() {
        let pool = create_test_pool().await.expect("Failed to create test pool");

        assert_eq!(pending_count(&pool).await.unwrap(), MIGRATIONS.len());
        assert!(!is_up_to_date(&pool).await.unwrap());

        run_migrations(&pool).await.expect("Failed to run migrations");

        assert_eq!(pending_count(&pool).await.unwrap(), 0);
        assert!(is_up_to_date(&pool).await.unwrap());
    }

    #[tokio::test]
    async fn test_assignment_requires_existing_content() {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        run_migrations(&pool).await.expect("Failed to run migrations");

        let result = pool
            .execute(
                "INSERT INTO review_assignments (id, content_id, reviewer_id, status, created_at, updated_at) \
                 VALUES ('a1', 'missing', 'missing', 'pending', '2024-01-01 00:00:00', '2024-01-01 00:00:00')",
            )
            .await;
        assert!(result.is_err(), "foreign keys should be enforced");
    }

    #[test]
    fn test_versions_are_strictly_ascending() {
        let versions: Vec<i32> = MIGRATIONS.iter().map(|m| m.version).collect();
        assert!(versions.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_split_sql_statements() {
        let sql = "CREATE TABLE a (id INT);\n-- comment only\n;\nCREATE INDEX i ON a(id);";
        let statements = split_sql_statements(sql);
        assert_eq!(
            statements,
            vec!["CREATE TABLE a (id INT)", "CREATE INDEX i ON a(id)"]
        );
    }

    #[test]
    fn test_is_comment_only() {
        assert!(is_comment_only("-- a\n   -- b"));
        assert!(!is_comment_only("-- a\nSELECT 1"));
    }
}
