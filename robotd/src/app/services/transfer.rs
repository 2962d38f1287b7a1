// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use std::path::{Path, PathBuf};

use crate::app::errors::{AppError, AppErrorKind, AppResult, codes};
use crate::app::ports::{LocalFilesystemPort, RemoteSessionPort};
use crate::app::services::remote_dirs::ensure_remote_dir;
use crate::app::services::remote_path::remote_join;
use crate::app::types::{ResolvedConfig, StagedFile};

/// Directory layout every target must carry under its base path.
pub const REMOTE_SUBDIRS: [&str; 9] = [
    "Keywords",
    "Libraries",
    "Profiles",
    "Resources",
    "Templates",
    "TestScripts",
    "Tools",
    "TestSuites",
    "Results",
];

pub const REMOTE_RESULTS_DIR: &str = "Results";

/// Local directory (under the media root) receiving fetched results.
pub const RESULT_STAGING_DIR: &str = "test_result";

pub const MISSING_DIRS_MESSAGE: &str =
    "Destination directory does not exist, you don't have write permission.";

/// Result files the runner writes for a seed, in fetch order.
pub fn result_file_names(seed: &str) -> [String; 3] {
    [
        format!("{seed}_log.html"),
        format!("{seed}_output.xml"),
        format!("{seed}_report.html"),
    ]
}

pub fn report_file_name(seed: &str) -> String {
    format!("{seed}_report.html")
}

/// Verifies the remote layout and copies one staged file into the
/// subdirectory its kind selects.
#[tracing::instrument(
    name = "transfer",
    level = "debug",
    skip_all,
    fields(op = "send", host = %config.host, file = %file.local_path.display())
)]
pub async fn send_file(
    session: &dyn RemoteSessionPort,
    config: &ResolvedConfig,
    file: &StagedFile,
) -> AppResult<String> {
    for subdir in REMOTE_SUBDIRS {
        let path = remote_join(&config.remote_path, &[subdir]);
        if !ensure_remote_dir(session, &path).await {
            return Err(AppError::with_message(
                AppErrorKind::Permission,
                codes::PERMISSION_DENIED,
                MISSING_DIRS_MESSAGE,
            )
            .with_context(path));
        }
    }

    let file_name = file.file_name()?;
    let remote = remote_join(
        &config.remote_path,
        &[file.kind.remote_subdir(), &file_name],
    );
    session
        .upload_file(&file.local_path, &remote)
        .await
        .map_err(|err| {
            AppError::with_message(AppErrorKind::Transfer, codes::TRANSFER_FAILURE, err.message())
                .with_context(remote.clone())
        })?;
    tracing::info!("uploaded {} to {}", file.local_path.display(), remote);
    Ok(remote)
}

/// Copies the three result files of `seed` into `<media_root>/test_result`.
/// Every file is attempted; if any is missing the ones already copied are
/// removed and a single fetch error names what was missing.
#[tracing::instrument(
    name = "transfer",
    level = "debug",
    skip_all,
    fields(op = "fetch", host = %config.host, seed = %seed)
)]
pub async fn fetch_results(
    session: &dyn RemoteSessionPort,
    fs: &dyn LocalFilesystemPort,
    config: &ResolvedConfig,
    seed: &str,
    media_root: &Path,
) -> AppResult<Vec<PathBuf>> {
    let local_dir = media_root.join(RESULT_STAGING_DIR);
    fs.ensure_dir(&local_dir).await.map_err(|err| {
        AppError::with_message(AppErrorKind::Fetch, codes::LOCAL_ERROR, err.message())
            .with_context(local_dir.display().to_string())
    })?;

    let mut fetched = Vec::new();
    let mut missing = Vec::new();
    for name in result_file_names(seed) {
        let remote = remote_join(&config.remote_path, &[REMOTE_RESULTS_DIR, &name]);
        let local = local_dir.join(&name);
        match session.retrieve_file(&remote, &local).await {
            Ok(()) => fetched.push(local),
            Err(err) => {
                tracing::warn!("failed to fetch {remote}: {err}");
                missing.push(name);
            }
        }
    }

    if missing.is_empty() {
        return Ok(fetched);
    }
    for path in &fetched {
        if let Err(err) = fs.remove_file(path).await {
            tracing::warn!("failed to remove partial result {}: {err}", path.display());
        }
    }
    Err(AppError::with_message(
        AppErrorKind::Fetch,
        codes::FETCH_FAILURE,
        format!("result files missing on {}: {}", config.host, missing.join(", ")),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::fs::LocalFilesystem;
    use crate::app::test_support::{FakeSession, test_config};
    use crate::app::types::StagedFileKind;
    use tempfile::TempDir;

    fn all_dirs() -> Vec<String> {
        REMOTE_SUBDIRS
            .iter()
            .map(|d| format!("/srv/robot/{d}"))
            .collect()
    }

    fn staged(tmp: &TempDir, kind: StagedFileKind, name: &str) -> StagedFile {
        let local_path = tmp.path().join(name);
        std::fs::write(&local_path, "x").unwrap();
        StagedFile { kind, local_path }
    }

    #[tokio::test]
    async fn sends_into_kind_subdirectory() {
        let tmp = TempDir::new().unwrap();
        let dirs = all_dirs();
        let session = FakeSession::new().with_dirs(dirs.iter().map(String::as_str));
        let file = staged(&tmp, StagedFileKind::TestCase, "s_test_case.robot");
        let remote = send_file(&session, &test_config(), &file).await.unwrap();
        assert_eq!(remote, "/srv/robot/TestSuites/s_test_case.robot");
        assert_eq!(session.uploads(), vec![(file.local_path.clone(), remote)]);
        assert_eq!(session.mkdir_count(), 0);
    }

    #[tokio::test]
    async fn creates_missing_layout_before_upload() {
        let tmp = TempDir::new().unwrap();
        let session = FakeSession::new();
        let file = staged(&tmp, StagedFileKind::Keyword, "s_keyword.robot");
        send_file(&session, &test_config(), &file).await.unwrap();
        assert_eq!(session.mkdir_count(), REMOTE_SUBDIRS.len());
        assert_eq!(session.uploads().len(), 1);
    }

    #[tokio::test]
    async fn unusable_directory_aborts_before_copying() {
        let tmp = TempDir::new().unwrap();
        let session = FakeSession::new().deny_mkdir();
        let file = staged(&tmp, StagedFileKind::Keyword, "s_keyword.robot");
        let err = send_file(&session, &test_config(), &file)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), AppErrorKind::Permission);
        assert_eq!(err.message(), MISSING_DIRS_MESSAGE);
        assert!(session.uploads().is_empty());
        assert_eq!(session.mkdir_count(), 1);
    }

    #[tokio::test]
    async fn upload_failure_is_a_transfer_error() {
        let tmp = TempDir::new().unwrap();
        let dirs = all_dirs();
        let session = FakeSession::new()
            .with_dirs(dirs.iter().map(String::as_str))
            .fail_uploads();
        let file = staged(&tmp, StagedFileKind::GlobalVariablesProfile, "s_profile.py");
        let err = send_file(&session, &test_config(), &file)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), AppErrorKind::Transfer);
        assert_eq!(err.context(), Some("/srv/robot/Profiles/s_profile.py"));
    }

    #[tokio::test]
    async fn fetches_all_three_results() {
        let tmp = TempDir::new().unwrap();
        let session = FakeSession::new()
            .with_remote_file("/srv/robot/Results/s_log.html", "log")
            .with_remote_file("/srv/robot/Results/s_output.xml", "xml")
            .with_remote_file("/srv/robot/Results/s_report.html", "report");
        let fetched = fetch_results(&session, &LocalFilesystem, &test_config(), "s", tmp.path())
            .await
            .unwrap();
        assert_eq!(fetched.len(), 3);
        let report = std::fs::read_to_string(tmp.path().join("test_result/s_report.html")).unwrap();
        assert_eq!(report, "report");
    }

    #[tokio::test]
    async fn one_missing_result_fails_and_removes_partial_files() {
        let tmp = TempDir::new().unwrap();
        let session = FakeSession::new()
            .with_remote_file("/srv/robot/Results/s_log.html", "log")
            .with_remote_file("/srv/robot/Results/s_report.html", "report");
        let err = fetch_results(&session, &LocalFilesystem, &test_config(), "s", tmp.path())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), AppErrorKind::Fetch);
        assert!(err.message().contains("s_output.xml"));
        assert!(!err.message().contains("s_log.html"));
        assert!(!tmp.path().join("test_result/s_log.html").exists());
        assert!(!tmp.path().join("test_result/s_report.html").exists());
    }
}
