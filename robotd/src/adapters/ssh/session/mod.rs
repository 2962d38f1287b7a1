// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use anyhow::{Result, anyhow};
use russh::client::{Config, Handle, Msg};
use russh::{Channel, Disconnect};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use crate::adapters::ssh::error::{HostKeyRejected, OperationTimedOut};

mod auth;
mod exec;
mod sftp;

pub(crate) use sftp::is_sftp_missing_path;

/// russh client handler that only accepts keys already in known_hosts.
#[derive(Clone, Debug)]
pub(crate) struct ClientHandler {
    host: String,
    port: u16,
    known_hosts_path: Option<PathBuf>,
}

impl ClientHandler {
    fn new(host: String, port: u16, known_hosts_path: Option<PathBuf>) -> Self {
        Self {
            host,
            port,
            known_hosts_path,
        }
    }
}

impl russh::client::Handler for ClientHandler {
    type Error = anyhow::Error;
    async fn check_server_key(
        &mut self,
        server_public_key: &russh::keys::ssh_key::PublicKey,
    ) -> std::result::Result<bool, Self::Error> {
        verify_server_key(
            &self.host,
            self.port,
            server_public_key,
            self.known_hosts_path.as_deref(),
        )
    }
}

/// Parameters for establishing the SSH connection.
#[derive(Clone, PartialEq, Eq)]
pub struct SshParams {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    /// `None` means the user's default known_hosts file.
    pub known_hosts_path: Option<PathBuf>,
    pub login_timeout: Duration,
    pub command_timeout: Duration,
}

impl std::fmt::Debug for SshParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SshParams")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("known_hosts_path", &self.known_hosts_path)
            .field("login_timeout", &self.login_timeout)
            .field("command_timeout", &self.command_timeout)
            .finish()
    }
}

fn check_known_hosts_for(
    host: &str,
    port: u16,
    key: &russh::keys::ssh_key::PublicKey,
    known_hosts_path: Option<&Path>,
) -> std::result::Result<bool, russh::keys::Error> {
    match known_hosts_path {
        Some(path) => russh::keys::check_known_hosts_path(host, port, key, path),
        None => russh::keys::check_known_hosts(host, port, key),
    }
}

/// Accepts the key only when known_hosts lists it for `host:port`.
/// Unknown and changed keys are both rejected.
pub(crate) fn verify_server_key(
    host: &str,
    port: u16,
    key: &russh::keys::ssh_key::PublicKey,
    known_hosts_path: Option<&Path>,
) -> std::result::Result<bool, anyhow::Error> {
    let reason = match check_known_hosts_for(host, port, key, known_hosts_path) {
        Ok(true) => return Ok(true),
        Ok(false) => "key is not present in known_hosts".to_string(),
        Err(err) => err.to_string(),
    };
    log::warn!("server key validation failed for {host}:{port}: {reason}");
    Err(HostKeyRejected {
        host: host.to_string(),
        port,
        reason,
    }
    .into())
}

/// Runs `fut` under `limit`, turning an elapsed timer into `OperationTimedOut`.
pub(crate) async fn with_timeout<T>(
    operation: &'static str,
    limit: Duration,
    fut: impl std::future::Future<Output = Result<T>>,
) -> Result<T> {
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(OperationTimedOut {
            operation,
            secs: limit.as_secs(),
        }
        .into()),
    }
}

/// One authenticated SSH connection, owned by a single job.
pub struct SessionManager {
    params: SshParams,
    config: Arc<Config>,
    handle: Mutex<Option<Handle<ClientHandler>>>,
}

impl SessionManager {
    pub fn new(params: SshParams) -> Self {
        let cfg = Config {
            inactivity_timeout: Some(Duration::from_secs(300)),
            keepalive_interval: Some(Duration::from_secs(30)),
            channel_buffer_size: 64,
            window_size: 1024 * 1024,
            ..Default::default()
        };
        Self {
            params,
            config: Arc::new(cfg),
            handle: Mutex::new(None),
        }
    }

    pub fn params(&self) -> &SshParams {
        &self.params
    }

    pub(crate) async fn open_channel(&self) -> Result<Channel<Msg>> {
        let guard = self.handle.lock().await;
        let handle = guard.as_ref().ok_or_else(|| anyhow!("SSH handle lost"))?;
        Ok(handle.channel_open_session().await?)
    }

    #[cfg(test)]
    pub(crate) async fn is_connected(&self) -> bool {
        matches!(self.handle.lock().await.as_ref(), Some(h) if !h.is_closed())
    }

    /// Disconnects if connected. Safe to call more than once.
    pub async fn close(&self) {
        let Some(handle) = self.handle.lock().await.take() else {
            return;
        };
        if let Err(err) = handle
            .disconnect(Disconnect::ByApplication, "", "English")
            .await
        {
            log::debug!(
                "disconnect from {}:{} failed: {err}",
                self.params.host,
                self.params.port
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use russh::keys::ssh_key::PublicKey;
    use std::io::Write;

    const KEY_A: &str = "ssh-ed25519 AAAAC3NzaC1lZDI1NTE5AAAAIFS5LlMeiAb7Z87/Z8J8N021oIl+jHi6K9cY56akAVp1 robotd-test-a";
    const KEY_B: &str = "ssh-ed25519 AAAAC3NzaC1lZDI1NTE5AAAAIANKMJHSiEsZO5ex+l8XhnL1V9wwT2yPopXnWdTI3hvV robotd-test-b";

    fn key(line: &str) -> PublicKey {
        PublicKey::from_openssh(line).unwrap()
    }

    fn known_hosts(lines: &[String]) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        for line in lines {
            writeln!(file, "{line}").unwrap();
        }
        file
    }

    fn is_rejection(err: &anyhow::Error) -> bool {
        err.chain().any(|cause| cause.is::<HostKeyRejected>())
    }

    #[test]
    fn accepts_listed_key() {
        let file = known_hosts(&[format!("web01 {KEY_A}")]);
        assert!(verify_server_key("web01", 22, &key(KEY_A), Some(file.path())).unwrap());
    }

    #[test]
    fn accepts_listed_key_on_custom_port() {
        let file = known_hosts(&[format!("[web01]:2222 {KEY_A}")]);
        assert!(verify_server_key("web01", 2222, &key(KEY_A), Some(file.path())).unwrap());
    }

    #[test]
    fn rejects_unknown_host_without_learning_it() {
        let file = known_hosts(&[format!("other {KEY_A}")]);
        let err = verify_server_key("web01", 22, &key(KEY_A), Some(file.path())).unwrap_err();
        assert!(is_rejection(&err));
        let contents = std::fs::read_to_string(file.path()).unwrap();
        assert!(!contents.contains("web01"));
    }

    #[test]
    fn rejects_changed_key() {
        let file = known_hosts(&[format!("web01 {KEY_A}")]);
        let err = verify_server_key("web01", 22, &key(KEY_B), Some(file.path())).unwrap_err();
        assert!(is_rejection(&err));
    }

    #[tokio::test]
    async fn timeout_is_reported_as_marker_error() {
        let err = with_timeout("login", Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await
        .unwrap_err();
        assert!(err.is::<OperationTimedOut>());
    }

    #[test]
    fn params_debug_hides_password() {
        let params = SshParams {
            host: "web01".into(),
            port: 22,
            username: "robot".into(),
            password: "hunter2".into(),
            known_hosts_path: None,
            login_timeout: Duration::from_secs(30),
            command_timeout: Duration::from_secs(60),
        };
        assert!(!format!("{params:?}").contains("hunter2"));
    }
}
