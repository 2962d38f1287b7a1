// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use std::path::Path;

use async_trait::async_trait;

use crate::app::errors::AppResult;

#[async_trait]
/// Local staging storage boundary for generated and fetched files.
pub trait LocalFilesystemPort: Send + Sync {
    async fn ensure_dir(&self, path: &Path) -> AppResult<()>;
    async fn write_text(&self, path: &Path, contents: &str) -> AppResult<()>;
    async fn remove_file(&self, path: &Path) -> AppResult<()>;
}
