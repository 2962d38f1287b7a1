// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use anyhow::{Context, Result, anyhow};
use russh::client::Msg;
use russh::{Channel, ChannelMsg};
use std::time::Duration;
use tokio::time::Instant;

use super::error::OperationTimedOut;
use super::prompt::{PROMPT_SETUP, PromptBuffer};
use super::session::{SessionManager, with_timeout};

const PTY_TERM: &str = "dumb";
const PTY_COLS: u32 = 200;
const PTY_ROWS: u32 = 50;
const LOGOUT_DRAIN: Duration = Duration::from_secs(5);

async fn start_shell(session: &SessionManager) -> Result<Channel<Msg>> {
    let channel = session.open_channel().await.context("open shell channel")?;
    channel
        .request_pty(true, PTY_TERM, PTY_COLS, PTY_ROWS, 0, 0, &[])
        .await
        .context("pty request")?;
    channel.request_shell(true).await.context("shell request")?;
    Ok(channel)
}

/// Login shell on a PTY whose prompt is switched to a fixed marker, so that
/// each command can be awaited by watching for the marker to come back.
pub struct InteractiveShell {
    session: SessionManager,
    channel: Option<Channel<Msg>>,
    buffer: PromptBuffer,
    prompt_timeout: Duration,
}

impl InteractiveShell {
    /// Logs in, starts a shell and waits for the marker prompt. The login
    /// banner and the original prompt are discarded.
    pub async fn open(session: SessionManager, prompt_timeout: Duration) -> Result<Self> {
        session.connect().await?;
        let channel = match start_shell(&session).await {
            Ok(channel) => channel,
            Err(err) => {
                session.close().await;
                return Err(err);
            }
        };

        let mut shell = Self {
            session,
            channel: Some(channel),
            buffer: PromptBuffer::new(),
            prompt_timeout,
        };
        let login_timeout = shell.session.params().login_timeout;
        let ready = with_timeout("login", login_timeout, async {
            shell.send_line(PROMPT_SETUP).await?;
            shell.read_until_prompt(None).await
        })
        .await;
        match ready {
            Ok(banner) => {
                log::debug!("interactive shell ready ({} bytes of banner)", banner.len());
                Ok(shell)
            }
            Err(err) => {
                shell.close().await;
                Err(err)
            }
        }
    }

    pub async fn send_line(&mut self, line: &str) -> Result<()> {
        let channel = self
            .channel
            .as_ref()
            .ok_or_else(|| anyhow!("interactive shell is closed"))?;
        let payload = format!("{line}\n");
        channel
            .data(payload.as_bytes())
            .await
            .context("write to shell")?;
        Ok(())
    }

    /// Output printed before the next prompt, bounded by the prompt timeout.
    pub async fn prompt(&mut self) -> Result<String> {
        let deadline = Instant::now() + self.prompt_timeout;
        self.read_until_prompt(Some(deadline)).await
    }

    async fn read_until_prompt(&mut self, deadline: Option<Instant>) -> Result<String> {
        loop {
            if let Some(text) = self.buffer.take_until_prompt() {
                return Ok(text);
            }
            let channel = self
                .channel
                .as_mut()
                .ok_or_else(|| anyhow!("interactive shell is closed"))?;
            let msg = match deadline {
                Some(deadline) => tokio::time::timeout_at(deadline, channel.wait())
                    .await
                    .map_err(|_| OperationTimedOut {
                        operation: "prompt",
                        secs: self.prompt_timeout.as_secs(),
                    })?,
                None => channel.wait().await,
            };
            match msg {
                Some(ChannelMsg::Data { data }) => self.buffer.push(&data),
                Some(ChannelMsg::ExtendedData { data, .. }) => self.buffer.push(&data),
                Some(ChannelMsg::Eof) | Some(ChannelMsg::Close) | None => {
                    let tail = self.buffer.drain();
                    return Err(anyhow!("shell closed before prompt; last output: {tail}"));
                }
                Some(_) => {}
            }
        }
    }

    /// Ends the shell with `exit` and waits briefly for the channel to close.
    pub async fn logout(&mut self) -> Result<()> {
        self.send_line("exit").await?;
        let Some(channel) = self.channel.as_mut() else {
            return Ok(());
        };
        let drained = tokio::time::timeout(LOGOUT_DRAIN, async {
            while let Some(msg) = channel.wait().await {
                if matches!(msg, ChannelMsg::Close) {
                    break;
                }
            }
        })
        .await;
        if drained.is_err() {
            log::debug!("shell did not close within {}s of exit", LOGOUT_DRAIN.as_secs());
        }
        self.buffer.drain();
        Ok(())
    }

    pub async fn close(&mut self) {
        if let Some(channel) = self.channel.take() {
            let _ = channel.eof().await;
            let _ = channel.close().await;
        }
        self.session.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::ssh::SshParams;

    fn manager() -> SessionManager {
        SessionManager::new(SshParams {
            host: "web01".into(),
            port: 22,
            username: "robot".into(),
            password: "secret".into(),
            known_hosts_path: None,
            login_timeout: Duration::from_secs(1),
            command_timeout: Duration::from_secs(1),
        })
    }

    #[tokio::test]
    async fn shell_setup_without_connection_fails_and_leaves_nothing_open() {
        let session = manager();
        let err = start_shell(&session).await.unwrap_err();
        assert!(format!("{err:#}").contains("open shell channel"));
        session.close().await;
        assert!(!session.is_connected().await);
    }

    #[tokio::test]
    async fn closing_a_shell_twice_is_harmless() {
        let mut shell = InteractiveShell {
            session: manager(),
            channel: None,
            buffer: PromptBuffer::new(),
            prompt_timeout: Duration::from_secs(1),
        };
        shell.close().await;
        shell.close().await;
        assert!(!shell.session.is_connected().await);
        let err = shell.send_line("exit").await.unwrap_err();
        assert!(err.to_string().contains("closed"));
    }
}
