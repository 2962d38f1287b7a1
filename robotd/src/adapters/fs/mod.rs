// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use std::path::Path;

use async_trait::async_trait;

use crate::app::errors::{AppError, AppResult, local_error};
use crate::app::ports::LocalFilesystemPort;

/// Staging storage on the local disk.
#[derive(Clone, Default)]
pub struct LocalFilesystem;

impl LocalFilesystem {
    pub fn new() -> Self {
        Self
    }
}

fn io_error(action: &str, path: &Path, err: std::io::Error) -> AppError {
    local_error(format!("failed to {action} {}: {err}", path.display()))
}

#[async_trait]
impl LocalFilesystemPort for LocalFilesystem {
    #[tracing::instrument(name = "fs", level = "debug", skip(self, path), fields(op = "ensure_dir", path = %path.display()))]
    async fn ensure_dir(&self, path: &Path) -> AppResult<()> {
        tokio::fs::create_dir_all(path)
            .await
            .map_err(|err| io_error("create directory", path, err))
    }

    #[tracing::instrument(name = "fs", level = "debug", skip(self, path, contents), fields(op = "write_text", path = %path.display(), bytes = contents.len()))]
    async fn write_text(&self, path: &Path, contents: &str) -> AppResult<()> {
        tokio::fs::write(path, contents)
            .await
            .map_err(|err| io_error("write", path, err))
    }

    #[tracing::instrument(name = "fs", level = "debug", skip(self, path), fields(op = "remove_file", path = %path.display()))]
    async fn remove_file(&self, path: &Path) -> AppResult<()> {
        match tokio::fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(io_error("remove", path, err)),
        }
    }
}
