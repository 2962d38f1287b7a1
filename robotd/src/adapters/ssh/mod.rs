// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;

use crate::app::errors::{AppError, AppErrorKind, AppResult, codes};
use crate::app::ports::{
    ExecCapture, FileSyncPort, InteractiveShellPort, RemoteConnectorPort, RemoteSessionPort,
};
use crate::app::types::ResolvedConfig;

mod error;
mod interactive;
mod prompt;
mod session;

pub use error::{AuthenticationFailure, HostKeyRejected, OperationTimedOut};
pub use interactive::InteractiveShell;
pub use session::{SessionManager, SshParams};

/// Connection settings shared by every session the adapter opens.
#[derive(Clone, Debug)]
pub struct SshSettings {
    /// `None` means the user's default known_hosts file.
    pub known_hosts_path: Option<PathBuf>,
    pub login_timeout: Duration,
    pub command_timeout: Duration,
    pub prompt_timeout: Duration,
}

impl Default for SshSettings {
    fn default() -> Self {
        Self {
            known_hosts_path: None,
            login_timeout: Duration::from_secs(30),
            command_timeout: Duration::from_secs(60),
            prompt_timeout: Duration::from_secs(1800),
        }
    }
}

#[derive(Clone, Debug)]
pub struct SshAdapter {
    settings: SshSettings,
}

impl SshAdapter {
    pub fn new(settings: SshSettings) -> Self {
        Self { settings }
    }

    fn params_for(&self, config: &ResolvedConfig) -> SshParams {
        SshParams {
            host: config.host.clone(),
            port: config.port,
            username: config.user.clone(),
            password: config.password.clone(),
            known_hosts_path: self.settings.known_hosts_path.clone(),
            login_timeout: self.settings.login_timeout,
            command_timeout: self.settings.command_timeout,
        }
    }
}

fn timed_out(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| cause.is::<OperationTimedOut>())
}

fn ssh_error_code(err: &anyhow::Error) -> &'static str {
    if err.chain().any(|cause| cause.is::<AuthenticationFailure>()) {
        codes::AUTHENTICATION_FAILURE
    } else if err.chain().any(|cause| cause.is::<HostKeyRejected>()) {
        codes::HOST_KEY_REJECTED
    } else if timed_out(err) {
        codes::TIMEOUT
    } else {
        codes::CONNECTION_FAILURE
    }
}

fn map_connect_error(err: anyhow::Error) -> AppError {
    AppError::with_message(
        AppErrorKind::Connection,
        ssh_error_code(&err),
        format!("ssh connect failed: {err:#}"),
    )
}

fn map_exec_error(err: anyhow::Error) -> AppError {
    let code = if timed_out(&err) {
        codes::TIMEOUT
    } else {
        codes::REMOTE_ERROR
    };
    AppError::with_message(
        AppErrorKind::Internal,
        code,
        format!("ssh exec failed: {err:#}"),
    )
}

fn map_upload_error(err: anyhow::Error, remote_path: &str) -> AppError {
    AppError::with_message(
        AppErrorKind::Transfer,
        codes::TRANSFER_FAILURE,
        format!("upload failed: {err:#}"),
    )
    .with_context(remote_path)
}

fn map_download_error(err: anyhow::Error, remote_path: &str) -> AppError {
    let code = if session::is_sftp_missing_path(&err) {
        codes::NOT_FOUND
    } else {
        codes::FETCH_FAILURE
    };
    AppError::with_message(AppErrorKind::Fetch, code, format!("download failed: {err:#}"))
        .with_context(remote_path)
}

fn map_shell_error(err: anyhow::Error) -> AppError {
    let code = if timed_out(&err) {
        codes::TIMEOUT
    } else {
        codes::RUNNER_FAILURE
    };
    AppError::with_message(
        AppErrorKind::Runner,
        code,
        format!("interactive shell failed: {err:#}"),
    )
}

#[async_trait]
impl RemoteConnectorPort for SshAdapter {
    #[tracing::instrument(
        name = "ssh",
        level = "debug",
        skip(self, config),
        fields(op = "open", host = %config.host, user = %config.user, port = config.port)
    )]
    async fn open(&self, config: &ResolvedConfig) -> AppResult<Box<dyn RemoteSessionPort>> {
        let manager = SessionManager::new(self.params_for(config));
        manager.connect().await.map_err(map_connect_error)?;
        Ok(Box::new(SshSession { manager }))
    }

    #[tracing::instrument(
        name = "ssh",
        level = "debug",
        skip(self, config),
        fields(op = "open_interactive", host = %config.host, user = %config.user, port = config.port)
    )]
    async fn open_interactive(
        &self,
        config: &ResolvedConfig,
    ) -> AppResult<Box<dyn InteractiveShellPort>> {
        let manager = SessionManager::new(self.params_for(config));
        let shell = InteractiveShell::open(manager, self.settings.prompt_timeout)
            .await
            .map_err(map_connect_error)?;
        Ok(Box::new(shell))
    }
}

/// An authenticated session handed to the job that opened it.
pub struct SshSession {
    manager: SessionManager,
}

#[async_trait]
impl FileSyncPort for SshSession {
    #[tracing::instrument(
        name = "ssh",
        level = "debug",
        skip(self, local_path),
        fields(op = "upload_file", host = %self.manager.params().host)
    )]
    async fn upload_file(&self, local_path: &Path, remote_path: &str) -> AppResult<()> {
        self.manager
            .upload_file(local_path, remote_path)
            .await
            .map_err(|err| map_upload_error(err, remote_path))
    }

    #[tracing::instrument(
        name = "ssh",
        level = "debug",
        skip(self, local_path),
        fields(op = "retrieve_file", host = %self.manager.params().host)
    )]
    async fn retrieve_file(&self, remote_path: &str, local_path: &Path) -> AppResult<()> {
        self.manager
            .retrieve_file(remote_path, local_path)
            .await
            .map_err(|err| map_download_error(err, remote_path))
    }
}

#[async_trait]
impl RemoteSessionPort for SshSession {
    #[tracing::instrument(
        name = "ssh",
        level = "debug",
        skip(self, command),
        fields(op = "exec_capture", host = %self.manager.params().host)
    )]
    async fn exec_capture(&self, command: &str) -> AppResult<ExecCapture> {
        let (stdout, stderr, exit_code) = self
            .manager
            .exec_capture(command)
            .await
            .map_err(map_exec_error)?;
        Ok(ExecCapture {
            stdout,
            stderr,
            exit_code,
        })
    }

    async fn close(&self) {
        self.manager.close().await;
    }
}

#[async_trait]
impl InteractiveShellPort for InteractiveShell {
    async fn send_line(&mut self, line: &str) -> AppResult<()> {
        InteractiveShell::send_line(self, line)
            .await
            .map_err(map_shell_error)
    }

    async fn prompt(&mut self) -> AppResult<String> {
        InteractiveShell::prompt(self).await.map_err(map_shell_error)
    }

    async fn logout(&mut self) -> AppResult<()> {
        InteractiveShell::logout(self).await.map_err(map_shell_error)
    }

    async fn close(&mut self) {
        InteractiveShell::close(self).await;
    }
}
