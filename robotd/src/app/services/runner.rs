// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use crate::app::errors::{AppError, AppErrorKind, AppResult, codes};
use crate::app::ports::InteractiveShellPort;
use crate::app::services::artifacts::{profile_file_name, test_case_file_name};
use crate::app::services::remote_path::remote_join;
use crate::app::services::shell::sh_escape;
use crate::app::services::transfer::{REMOTE_RESULTS_DIR, result_file_names};
use crate::app::types::{ResolvedConfig, StagedFileKind};

/// Runner line executed from `<remote_path>/Results`; every path is relative
/// to it. Seed-derived arguments are quoted.
pub fn runner_invocation(runner: &str, seed: &str) -> String {
    let [log, output, report] = result_file_names(seed).map(|name| sh_escape(&name));
    let profile = format!(
        "../{}/{}",
        StagedFileKind::GlobalVariablesProfile.remote_subdir(),
        profile_file_name(seed)
    );
    let case = format!(
        "../{}/{}",
        StagedFileKind::TestCase.remote_subdir(),
        test_case_file_name(seed)
    );
    format!(
        "{runner} -V {} -o {output} -l {log} -r {report} {}",
        sh_escape(&profile),
        sh_escape(&case),
    )
}

/// Folds any failure reached while driving the runner into the runner kind.
pub fn runner_error(err: AppError) -> AppError {
    if err.kind() == AppErrorKind::Runner {
        return err;
    }
    let code = if err.code() == codes::TIMEOUT {
        codes::TIMEOUT
    } else {
        codes::RUNNER_FAILURE
    };
    let mut mapped = AppError::with_message(AppErrorKind::Runner, code, err.message());
    if let Some(ctx) = err.context() {
        mapped = mapped.with_context(ctx.to_string());
    }
    mapped
}

/// Runs the staged suite through the interactive shell and returns what the
/// runner printed before the prompt came back. The caller closes the shell.
#[tracing::instrument(
    name = "runner",
    level = "debug",
    skip_all,
    fields(host = %config.host, seed = %seed)
)]
pub async fn run_remote(
    shell: &mut dyn InteractiveShellPort,
    config: &ResolvedConfig,
    runner: &str,
    seed: &str,
) -> AppResult<String> {
    let results_dir = remote_join(&config.remote_path, &[REMOTE_RESULTS_DIR]);
    shell
        .send_line(&format!("cd {}", sh_escape(&results_dir)))
        .await
        .map_err(runner_error)?;
    shell.prompt().await.map_err(runner_error)?;

    let invocation = runner_invocation(runner, seed);
    tracing::info!("running `{invocation}` on {}", config.host);
    shell.send_line(&invocation).await.map_err(runner_error)?;
    let transcript = shell.prompt().await.map_err(runner_error)?;

    if let Err(err) = shell.logout().await {
        tracing::warn!("logout from {} failed: {err}", config.host);
    }
    Ok(transcript)
}
