// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use async_trait::async_trait;

use crate::app::errors::AppResult;
use crate::app::types::{ConnectionProfile, LibraryDependency, ScriptObject, ScriptType};

#[async_trait]
/// Read-only view of the catalog that owns profiles, scripts, parameters and
/// library sources. The core never writes through this port.
pub trait CatalogStorePort: Send + Sync {
    /// Profiles for the given ids, in storage order. Unknown ids are skipped.
    async fn get_profiles(&self, ids: &[i64]) -> AppResult<Vec<ConnectionProfile>>;

    /// Canonical name of a stored parameter.
    async fn get_parameter_name(&self, id: i64) -> AppResult<String>;

    async fn get_script(&self, script_type: ScriptType, id: i64) -> AppResult<ScriptObject>;

    /// Library sources that depend on the test framework.
    async fn list_libraries(&self) -> AppResult<Vec<LibraryDependency>>;
}
