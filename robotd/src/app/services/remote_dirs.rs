// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use crate::app::ports::RemoteSessionPort;
use crate::app::services::shell::sh_escape;

/// Creation attempts made for a missing directory before giving up.
const MAX_CREATE_ATTEMPTS: usize = 1;

fn probe_command(path: &str) -> String {
    let quoted = sh_escape(path);
    format!("if test -d {quoted}; then echo '1'; else echo '0'; fi")
}

/// `Some(true)` when the probe printed `1`, `Some(false)` for `0`, `None` when
/// the probe failed or printed anything else.
async fn probe(session: &dyn RemoteSessionPort, path: &str) -> Option<bool> {
    let out = match session.exec_capture(&probe_command(path)).await {
        Ok(out) => out,
        Err(err) => {
            tracing::debug!("directory probe for {path} failed: {err}");
            return None;
        }
    };
    match String::from_utf8_lossy(&out.stdout).trim() {
        "1" => Some(true),
        "0" => Some(false),
        other => {
            tracing::debug!("unexpected directory probe answer for {path}: {other:?}");
            None
        }
    }
}

/// Makes sure `path` is a directory on the remote host, creating it at most
/// once. Never fails: an unusable directory is reported as `false`.
pub async fn ensure_remote_dir(session: &dyn RemoteSessionPort, path: &str) -> bool {
    let mut attempts = 0;
    loop {
        match probe(session, path).await {
            Some(true) => return true,
            Some(false) if attempts < MAX_CREATE_ATTEMPTS => {
                attempts += 1;
                let cmd = format!("mkdir {}", sh_escape(path));
                match session.exec_capture(&cmd).await {
                    Ok(out) if out.exit_code != 0 => {
                        tracing::debug!(
                            "mkdir {path} exited with {}: {}",
                            out.exit_code,
                            String::from_utf8_lossy(&out.stderr).trim()
                        );
                    }
                    Ok(_) => {}
                    Err(err) => tracing::debug!("mkdir {path} failed: {err}"),
                }
            }
            Some(false) | None => {
                tracing::warn!("remote directory {path} is missing and could not be created");
                return false;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::test_support::FakeSession;

    #[tokio::test]
    async fn existing_directory_is_never_created() {
        let session = FakeSession::new().with_dirs(["/srv/robot/Keywords"]);
        assert!(ensure_remote_dir(&session, "/srv/robot/Keywords").await);
        assert!(ensure_remote_dir(&session, "/srv/robot/Keywords").await);
        assert_eq!(session.mkdir_count(), 0);
        assert_eq!(session.commands().len(), 2);
    }

    #[tokio::test]
    async fn missing_directory_is_created_once_and_reverified() {
        let session = FakeSession::new();
        assert!(ensure_remote_dir(&session, "/srv/robot/Results").await);
        assert_eq!(
            session.commands(),
            vec![
                probe_command("/srv/robot/Results"),
                "mkdir '/srv/robot/Results'".to_string(),
                probe_command("/srv/robot/Results"),
            ]
        );
        assert!(ensure_remote_dir(&session, "/srv/robot/Results").await);
        assert_eq!(session.mkdir_count(), 1);
    }

    #[tokio::test]
    async fn denied_creation_gives_up_after_one_attempt() {
        let session = FakeSession::new().deny_mkdir();
        assert!(!ensure_remote_dir(&session, "/root/Keywords").await);
        assert_eq!(session.mkdir_count(), 1);
        assert_eq!(session.commands().len(), 3);
    }

    #[tokio::test]
    async fn probe_error_reports_false_without_creating() {
        let session = FakeSession::new().fail_probes();
        assert!(!ensure_remote_dir(&session, "/srv/robot/Keywords").await);
        assert_eq!(session.mkdir_count(), 0);
    }

    #[test]
    fn probe_quotes_the_path() {
        assert_eq!(
            probe_command("/srv/my robot"),
            "if test -d '/srv/my robot'; then echo '1'; else echo '0'; fi"
        );
    }
}
