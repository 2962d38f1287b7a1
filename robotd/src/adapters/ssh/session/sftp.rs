// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use anyhow::{Context, Result};
use russh_sftp::client::SftpSession;
use russh_sftp::protocol::{OpenFlags, StatusCode};
use std::path::Path;
use tokio::fs as tokiofs;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};

use super::SessionManager;

const UPLOAD_BLOCK_SIZE: usize = 64 * 1024;

impl SessionManager {
    async fn sftp(&self) -> Result<SftpSession> {
        let channel = self
            .open_channel()
            .await
            .context("open channel for SFTP")?;
        channel.request_subsystem(true, "sftp").await?;
        let sftp = SftpSession::new(channel.into_stream()).await?;
        Ok(sftp)
    }

    /// Copies `local_path` to the remote file `remote_path`, truncating it.
    pub async fn upload_file(&self, local_path: &Path, remote_path: &str) -> Result<()> {
        let sftp = self.sftp().await?;
        let result = upload_single_file(&sftp, local_path, remote_path).await;
        let _ = sftp.close().await;
        result
    }

    /// Copies the remote file `remote_path` to `local_path`.
    pub async fn retrieve_file(&self, remote_path: &str, local_path: &Path) -> Result<()> {
        let sftp = self.sftp().await?;
        let result = download_file(&sftp, remote_path, local_path).await;
        let _ = sftp.close().await;
        result
    }
}

async fn upload_single_file(
    sftp: &SftpSession,
    local_path: &Path,
    remote_path: &str,
) -> anyhow::Result<()> {
    log::debug!(
        "Uploading file over sftp: {} -> {}",
        local_path.to_string_lossy(),
        remote_path
    );
    let mut lf = tokiofs::File::open(local_path)
        .await
        .with_context(|| format!("open {}", local_path.display()))?;
    let flags = OpenFlags::WRITE
        .union(OpenFlags::CREATE)
        .union(OpenFlags::TRUNCATE);
    let mut rfile = sftp
        .open_with_flags(remote_path, flags)
        .await
        .with_context(|| format!("open remote {remote_path}"))?;
    let mut buf = vec![0u8; UPLOAD_BLOCK_SIZE];
    loop {
        let n = lf.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        rfile.write_all(&buf[..n]).await?;
    }
    rfile.flush().await?;
    rfile.shutdown().await?;
    Ok(())
}

async fn download_file(sftp: &SftpSession, remote_path: &str, local_path: &Path) -> Result<()> {
    let mut rfile = sftp
        .open(remote_path)
        .await
        .with_context(|| format!("open remote {remote_path}"))?;
    write_local_copy(&mut rfile, local_path)
        .await
        .with_context(|| format!("copy {remote_path} to {}", local_path.display()))
}

/// Streams `reader` into `local_path`. A failed copy leaves no file behind.
async fn write_local_copy<R>(reader: &mut R, local_path: &Path) -> Result<()>
where
    R: AsyncRead + Unpin + ?Sized,
{
    if let Some(parent) = local_path.parent() {
        tokiofs::create_dir_all(parent).await?;
    }
    let mut lfile = tokiofs::File::create(local_path).await?;
    let copied = async {
        tokio::io::copy(reader, &mut lfile).await?;
        lfile.flush().await?;
        Ok::<_, std::io::Error>(())
    }
    .await;
    if let Err(err) = copied {
        drop(lfile);
        if let Err(rm_err) = tokiofs::remove_file(local_path).await {
            log::debug!(
                "could not remove partial copy {}: {rm_err}",
                local_path.display()
            );
        }
        return Err(err.into());
    }
    Ok(())
}

pub(crate) fn is_sftp_missing_path(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        let Some(sftp_error) = cause.downcast_ref::<russh_sftp::client::error::Error>() else {
            return false;
        };
        matches!(
            sftp_error,
            russh_sftp::client::error::Error::Status(status)
                if status.status_code == StatusCode::NoSuchFile
        )
    })
}

#[cfg(test)]
mod tests {
    use super::{is_sftp_missing_path, write_local_copy};
    use anyhow::anyhow;
    use std::pin::Pin;
    use std::task::{Context, Poll};
    use tokio::io::{AsyncRead, AsyncReadExt, ReadBuf};

    /// Yields nothing but a connection reset.
    struct BrokenStream;

    impl AsyncRead for BrokenStream {
        fn poll_read(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            _buf: &mut ReadBuf<'_>,
        ) -> Poll<std::io::Result<()>> {
            Poll::Ready(Err(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "channel closed",
            )))
        }
    }

    #[tokio::test]
    async fn interrupted_copy_leaves_no_local_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let target = dir.path().join("test_result").join("s_report.html");
        let mut reader = (&b"<html>partial"[..]).chain(BrokenStream);
        let err = write_local_copy(&mut reader, &target).await.unwrap_err();
        assert!(err.to_string().contains("channel closed"));
        assert!(!target.exists());
    }

    #[tokio::test]
    async fn complete_copy_writes_every_byte() {
        let dir = tempfile::TempDir::new().unwrap();
        let target = dir.path().join("test_result").join("s_log.html");
        let mut reader: &[u8] = b"<html>log</html>";
        write_local_copy(&mut reader, &target).await.unwrap();
        assert_eq!(std::fs::read(&target).unwrap(), b"<html>log</html>");
    }

    #[test]
    fn plain_errors_are_not_missing_paths() {
        assert!(!is_sftp_missing_path(&anyhow!("connection reset")));
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "local");
        assert!(!is_sftp_missing_path(&anyhow::Error::new(io)));
    }
}
