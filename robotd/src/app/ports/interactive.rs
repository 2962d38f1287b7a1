// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use async_trait::async_trait;

use crate::app::errors::AppResult;

#[async_trait]
/// Line-oriented shell where every command is followed by a wait for the
/// shell prompt to come back.
pub trait InteractiveShellPort: Send {
    async fn send_line(&mut self, line: &str) -> AppResult<()>;

    /// Waits for the next prompt and returns everything printed before it.
    async fn prompt(&mut self) -> AppResult<String>;

    async fn logout(&mut self) -> AppResult<()>;

    /// Releases the underlying connection. Safe to call after `logout`.
    async fn close(&mut self);
}
