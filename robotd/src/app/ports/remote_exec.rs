// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use async_trait::async_trait;

use crate::app::errors::AppResult;
use crate::app::ports::{FileSyncPort, InteractiveShellPort};
use crate::app::types::ResolvedConfig;

#[derive(Debug, Clone)]
pub struct ExecCapture {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub exit_code: i32,
}

#[async_trait]
/// Opens authenticated sessions against a resolved profile.
/// Host keys are checked against known hosts and unknown keys are refused.
pub trait RemoteConnectorPort: Send + Sync {
    async fn open(&self, config: &ResolvedConfig) -> AppResult<Box<dyn RemoteSessionPort>>;

    /// A second, independent login with a prompt-synchronised shell.
    async fn open_interactive(
        &self,
        config: &ResolvedConfig,
    ) -> AppResult<Box<dyn InteractiveShellPort>>;
}

#[async_trait]
/// One open session used for command round-trips and file copies.
/// Owned by a single job; the owner calls `close` on every exit path.
pub trait RemoteSessionPort: FileSyncPort {
    async fn exec_capture(&self, command: &str) -> AppResult<ExecCapture>;

    async fn close(&self);
}
