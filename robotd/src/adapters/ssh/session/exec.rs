// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use anyhow::{Context, Result};
use russh::ChannelMsg;

use super::{SessionManager, with_timeout};

fn handle_capture_message(
    msg: &ChannelMsg,
    out: &mut Vec<u8>,
    err: &mut Vec<u8>,
    code: &mut i32,
) -> bool {
    match msg {
        ChannelMsg::Data { data } => {
            out.extend_from_slice(data);
            false
        }
        ChannelMsg::ExtendedData { data, ext: 1 } => {
            err.extend_from_slice(data);
            false
        }
        ChannelMsg::ExitStatus { exit_status } => {
            *code = *exit_status as i32;
            false
        }
        ChannelMsg::Close => true,
        _ => false,
    }
}

impl SessionManager {
    /// Execute command over SSH, retrieving stdout, stderr and exit code as
    /// output. Bounded by the command timeout.
    pub async fn exec_capture(&self, cmd: &str) -> Result<(Vec<u8>, Vec<u8>, i32)> {
        let mut chan = self.open_channel().await.context("open session")?;
        log::debug!("executing '{}'", cmd);
        let result = with_timeout("command", self.params.command_timeout, async {
            chan.exec(true, cmd).await.context("exec request")?;
            let mut out = Vec::new();
            let mut err = Vec::new();
            let mut code: i32 = 0;
            while let Some(msg) = chan.wait().await {
                if handle_capture_message(&msg, &mut out, &mut err, &mut code) {
                    break;
                }
            }
            Ok::<_, anyhow::Error>((out, err, code))
        })
        .await;

        let _ = chan.close().await;
        result
    }
}
