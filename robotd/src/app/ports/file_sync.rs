// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use async_trait::async_trait;
use std::path::Path;

use crate::app::errors::AppResult;

#[async_trait]
/// Single-file copies between local staging storage and the remote host,
/// carried over an already opened session.
pub trait FileSyncPort: Send + Sync {
    /// Copy `local_path` to the exact remote file path `remote_path`.
    async fn upload_file(&self, local_path: &Path, remote_path: &str) -> AppResult<()>;

    /// Copy the remote file `remote_path` to `local_path`, replacing it.
    async fn retrieve_file(&self, remote_path: &str, local_path: &Path) -> AppResult<()>;
}
