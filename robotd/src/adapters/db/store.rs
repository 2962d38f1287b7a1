// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use sqlx::{
    Row, SqlitePool,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow},
};
use std::{path::Path, str::FromStr, time::Duration};
use thiserror::Error;

use crate::app::types::{
    ConnectionProfile, KeywordRecord, LibraryDependency, ProfileCategory, ScriptObject,
    ScriptType, TestCaseRecord,
};

/// Source category of test libraries.
pub const LIBRARY_SOURCE_CATEGORY: i64 = 5;
/// Source category of the test framework libraries depend on.
pub const FRAMEWORK_SOURCE_CATEGORY: i64 = 4;

#[derive(Debug, Error)]
pub enum CatalogStoreError {
    #[error("sqlx error: {0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("profile {id} has unknown category {category}")]
    InvalidCategory { id: i64, category: i64 },
    #[error("parameter {0} not found")]
    ParameterNotFound(i64),
    #[error("{script_type} {id} not found")]
    ScriptNotFound { script_type: ScriptType, id: i64 },
}

pub type Result<T> = std::result::Result<T, CatalogStoreError>;

/// Read side of the script catalog: server profiles, parameters, keywords,
/// test cases and library sources.
#[derive(Clone)]
pub struct CatalogStore {
    pool: SqlitePool,
}

impl CatalogStore {
    /// Open (or create) a file-backed SQLite DB.
    pub async fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();
        let url = format!("sqlite://{}", path_ref.to_string_lossy());
        let opts = SqliteConnectOptions::from_str(&url)?
            .create_if_missing(true)
            .foreign_keys(true)
            .busy_timeout(Duration::from_secs(5));
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(opts)
            .await?;
        let store = Self { pool };
        store.bootstrap().await?;
        Ok(store)
    }

    /// Open an in-memory store (handy for tests).
    #[allow(dead_code)]
    pub async fn open_memory() -> Result<Self> {
        let opts = SqliteConnectOptions::from_str("sqlite::memory:")?
            .foreign_keys(true)
            .busy_timeout(Duration::from_secs(5));
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(opts)
            .await?;
        let store = Self { pool };
        store.bootstrap().await?;
        Ok(store)
    }

    async fn bootstrap(&self) -> Result<()> {
        // Improve concurrency for file DBs.
        let _ = sqlx::query("PRAGMA journal_mode=WAL;")
            .execute(&self.pool)
            .await;

        for ddl in SCHEMA {
            sqlx::query(ddl).execute(&self.pool).await?;
        }
        Ok(())
    }

    /// Profiles among `ids`, in id order. Unknown ids are skipped.
    pub async fn get_profiles(&self, ids: &[i64]) -> Result<Vec<ConnectionProfile>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let placeholders = vec!["?"; ids.len()].join(", ");
        let sql = format!(
            "SELECT id, name, category, config FROM server_profiles \
             WHERE id IN ({placeholders}) ORDER BY id ASC"
        );
        let mut query = sqlx::query(&sql);
        for id in ids {
            query = query.bind(*id);
        }
        let rows = query.fetch_all(&self.pool).await?;
        rows.into_iter().map(row_to_profile).collect()
    }

    pub async fn get_parameter_name(&self, id: i64) -> Result<String> {
        let row = sqlx::query("SELECT name FROM parameters WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => Ok(row.try_get("name")?),
            None => Err(CatalogStoreError::ParameterNotFound(id)),
        }
    }

    pub async fn get_script(&self, script_type: ScriptType, id: i64) -> Result<ScriptObject> {
        let row = match script_type {
            ScriptType::Keyword => {
                sqlx::query("SELECT id, name, script, user_id FROM keywords WHERE id = ?")
                    .bind(id)
                    .fetch_optional(&self.pool)
                    .await?
            }
            ScriptType::TestCase => {
                sqlx::query(
                    "SELECT id, name, script, phase, user_id FROM test_cases WHERE id = ?",
                )
                .bind(id)
                .fetch_optional(&self.pool)
                .await?
            }
        };
        let Some(row) = row else {
            return Err(CatalogStoreError::ScriptNotFound { script_type, id });
        };
        match script_type {
            ScriptType::Keyword => Ok(ScriptObject::Keyword(KeywordRecord {
                id: row.try_get("id")?,
                name: row.try_get("name")?,
                body: row.try_get("script")?,
                user_id: row.try_get("user_id")?,
            })),
            ScriptType::TestCase => Ok(ScriptObject::TestCase(TestCaseRecord {
                id: row.try_get("id")?,
                name: row.try_get("name")?,
                body: row.try_get("script")?,
                phase: row.try_get("phase")?,
                user_id: row.try_get("user_id")?,
            })),
        }
    }

    /// Library sources depending on a framework source, each listed once.
    pub async fn list_libraries(&self) -> Result<Vec<LibraryDependency>> {
        let rows = sqlx::query(
            r#"
            SELECT DISTINCT lib.id, lib.name
            FROM sources lib
            JOIN source_depends dep ON dep.source_id = lib.id
            JOIN sources framework ON framework.id = dep.depends_id
            WHERE lib.category = ? AND framework.category = ?
            ORDER BY lib.id ASC
            "#,
        )
        .bind(LIBRARY_SOURCE_CATEGORY)
        .bind(FRAMEWORK_SOURCE_CATEGORY)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter()
            .map(|row| -> Result<LibraryDependency> {
                Ok(LibraryDependency {
                    name: row.try_get("name")?,
                })
            })
            .collect()
    }
}

const SCHEMA: [&str; 6] = [
    r#"
    CREATE TABLE IF NOT EXISTS server_profiles (
      id INTEGER PRIMARY KEY AUTOINCREMENT,
      name TEXT NOT NULL,
      category INTEGER NOT NULL,     -- 1 global variables, 2 local connection, 3 external runner
      config TEXT NOT NULL           -- JSON blob
    );
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS parameters (
      id INTEGER PRIMARY KEY AUTOINCREMENT,
      name TEXT NOT NULL
    );
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS keywords (
      id INTEGER PRIMARY KEY AUTOINCREMENT,
      name TEXT NOT NULL,
      script TEXT,
      user_id INTEGER
    );
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS test_cases (
      id INTEGER PRIMARY KEY AUTOINCREMENT,
      name TEXT NOT NULL,
      script TEXT,
      phase TEXT,
      user_id INTEGER
    );
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS sources (
      id INTEGER PRIMARY KEY AUTOINCREMENT,
      name TEXT NOT NULL,
      category INTEGER NOT NULL
    );
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS source_depends (
      source_id INTEGER NOT NULL REFERENCES sources(id) ON DELETE CASCADE,
      depends_id INTEGER NOT NULL REFERENCES sources(id) ON DELETE CASCADE,
      PRIMARY KEY (source_id, depends_id)
    );
    "#,
];

fn row_to_profile(row: SqliteRow) -> Result<ConnectionProfile> {
    let id: i64 = row.try_get("id")?;
    let category: i64 = row.try_get("category")?;
    let category = ProfileCategory::try_from(category)
        .map_err(|_| CatalogStoreError::InvalidCategory { id, category })?;
    Ok(ConnectionProfile {
        id,
        name: row.try_get("name")?,
        category,
        config: row.try_get("config")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn exec(db: &CatalogStore, sql: &str) {
        sqlx::query(sql).execute(&db.pool).await.unwrap();
    }

    async fn seeded() -> CatalogStore {
        let db = CatalogStore::open_memory().await.unwrap();
        exec(
            &db,
            r#"INSERT INTO server_profiles (id, name, category, config) VALUES
               (1, 'globals', 1, '[{"id": 1, "value": "x"}]'),
               (2, 'lab', 2, '{"host": "web01"}'),
               (3, 'ci', 3, '{"host": "ci01"}')"#,
        )
        .await;
        exec(&db, "INSERT INTO parameters (id, name) VALUES (1, 'URL')").await;
        exec(
            &db,
            "INSERT INTO keywords (id, name, script, user_id) VALUES (1, 'Login Test', 'Click button', 7)",
        )
        .await;
        exec(
            &db,
            "INSERT INTO test_cases (id, name, script, phase, user_id) VALUES (1, 'Checkout', 'Open Browser', 'Smoke', NULL)",
        )
        .await;
        exec(
            &db,
            r#"INSERT INTO sources (id, name, category) VALUES
               (1, 'RobotFramework', 4),
               (2, 'SeleniumLibrary', 5),
               (3, 'RequestsLibrary', 5),
               (4, 'Unrelated', 5),
               (5, 'Python', 3),
               (6, 'RobotFramework3', 4)"#,
        )
        .await;
        exec(
            &db,
            "INSERT INTO source_depends (source_id, depends_id) VALUES (3, 1), (2, 1), (2, 6), (2, 5), (4, 5)",
        )
        .await;
        db
    }

    #[tokio::test]
    async fn profiles_come_back_in_id_order_and_skip_unknown_ids() {
        let db = seeded().await;
        let profiles = db.get_profiles(&[3, 42, 1]).await.unwrap();
        let ids: Vec<_> = profiles.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![1, 3]);
        assert_eq!(profiles[1].category, ProfileCategory::ExternalRunner);
        assert!(db.get_profiles(&[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unknown_category_is_reported() {
        let db = seeded().await;
        exec(
            &db,
            "INSERT INTO server_profiles (id, name, category, config) VALUES (9, 'odd', 7, '{}')",
        )
        .await;
        let err = db.get_profiles(&[9]).await.unwrap_err();
        assert!(matches!(
            err,
            CatalogStoreError::InvalidCategory { id: 9, category: 7 }
        ));
    }

    #[tokio::test]
    async fn parameter_lookup() {
        let db = seeded().await;
        assert_eq!(db.get_parameter_name(1).await.unwrap(), "URL");
        assert!(matches!(
            db.get_parameter_name(2).await.unwrap_err(),
            CatalogStoreError::ParameterNotFound(2)
        ));
    }

    #[tokio::test]
    async fn scripts_by_type() {
        let db = seeded().await;
        let keyword = db.get_script(ScriptType::Keyword, 1).await.unwrap();
        assert_eq!(keyword.name(), "Login Test");
        assert_eq!(keyword.body(), Some("Click button"));
        let ScriptObject::TestCase(case) = db.get_script(ScriptType::TestCase, 1).await.unwrap()
        else {
            panic!("expected a test case");
        };
        assert_eq!(case.phase.as_deref(), Some("Smoke"));
        assert_eq!(case.user_id, None);
        assert!(matches!(
            db.get_script(ScriptType::Keyword, 5).await.unwrap_err(),
            CatalogStoreError::ScriptNotFound {
                script_type: ScriptType::Keyword,
                id: 5
            }
        ));
    }

    #[tokio::test]
    async fn libraries_are_framework_dependents_listed_once() {
        let db = seeded().await;
        let names: Vec<_> = db
            .list_libraries()
            .await
            .unwrap()
            .into_iter()
            .map(|lib| lib.name)
            .collect();
        assert_eq!(names, vec!["SeleniumLibrary", "RequestsLibrary"]);
    }

    #[tokio::test]
    async fn file_store_bootstraps_schema() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("robotd.sqlite");
        let db = CatalogStore::open(&path).await.unwrap();
        assert!(db.list_libraries().await.unwrap().is_empty());
        drop(db);
        let reopened = CatalogStore::open(&path).await.unwrap();
        assert!(reopened.get_profiles(&[1]).await.unwrap().is_empty());
    }
}
