// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use std::sync::Arc;

use async_trait::async_trait;

use crate::adapters::db::{CatalogStore, CatalogStoreError};
use crate::app::errors::{AppError, AppErrorKind, AppResult, codes};
use crate::app::ports::CatalogStorePort;
use crate::app::types::{ConnectionProfile, LibraryDependency, ScriptObject, ScriptType};

#[derive(Clone)]
pub struct SqliteStoreAdapter {
    store: Arc<CatalogStore>,
}

impl SqliteStoreAdapter {
    pub fn new(store: CatalogStore) -> Self {
        Self {
            store: Arc::new(store),
        }
    }
}

/// Persistence errors stop here; the core only sees `AppError`.
fn map_store_error(err: CatalogStoreError) -> AppError {
    match err {
        CatalogStoreError::ParameterNotFound(_) | CatalogStoreError::ScriptNotFound { .. } => {
            AppError::with_message(AppErrorKind::NotFound, codes::NOT_FOUND, err.to_string())
        }
        CatalogStoreError::InvalidCategory { .. } => AppError::with_message(
            AppErrorKind::InvalidArgument,
            codes::INVALID_ARGUMENT,
            err.to_string(),
        ),
        CatalogStoreError::Sqlx(_) => {
            AppError::with_message(AppErrorKind::Internal, codes::INTERNAL_ERROR, err.to_string())
        }
    }
}

#[async_trait]
impl CatalogStorePort for SqliteStoreAdapter {
    #[tracing::instrument(name = "db", level = "debug", skip(self), fields(op = "get_profiles"))]
    async fn get_profiles(&self, ids: &[i64]) -> AppResult<Vec<ConnectionProfile>> {
        self.store.get_profiles(ids).await.map_err(map_store_error)
    }

    #[tracing::instrument(name = "db", level = "debug", skip(self), fields(op = "get_parameter_name"))]
    async fn get_parameter_name(&self, id: i64) -> AppResult<String> {
        self.store
            .get_parameter_name(id)
            .await
            .map_err(map_store_error)
    }

    #[tracing::instrument(name = "db", level = "debug", skip(self), fields(op = "get_script"))]
    async fn get_script(&self, script_type: ScriptType, id: i64) -> AppResult<ScriptObject> {
        self.store
            .get_script(script_type, id)
            .await
            .map_err(map_store_error)
    }

    #[tracing::instrument(name = "db", level = "debug", skip(self), fields(op = "list_libraries"))]
    async fn list_libraries(&self) -> AppResult<Vec<LibraryDependency>> {
        self.store.list_libraries().await.map_err(map_store_error)
    }
}
