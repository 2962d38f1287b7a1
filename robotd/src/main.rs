// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use std::process::ExitCode;
use std::sync::Arc;

use crate::adapters::cli::Cmd;
use crate::app::types::JobResult;

mod adapters;
mod app;
mod config;
mod logging;

fn log_config_report(report: &config::ConfigReport) {
    match (&report.config_path, report.config_path_source) {
        (Some(path), Some(source)) => {
            log::info!(
                "config path: {} (source={}, present={})",
                path.display(),
                source.as_str(),
                report.config_file_present
            );
        }
        (Some(path), None) => {
            log::info!(
                "config path: {} (present={})",
                path.display(),
                report.config_file_present
            );
        }
        (None, _) => {
            log::info!("config path: (none)");
        }
    }
    log::info!(
        "config database_path: {} (source={})",
        report.database_path.value.display(),
        report.database_path.source.as_str()
    );
    log::info!(
        "config media_root: {} (source={})",
        report.media_root.value.display(),
        report.media_root.source.as_str()
    );
    log::info!(
        "config site_root: {}{} (source={})",
        report.site_root.value,
        report.media_url.value,
        report.site_root.source.as_str()
    );
    match &report.known_hosts_path.value {
        Some(path) => log::info!(
            "config known_hosts_path: {} (source={})",
            path.display(),
            report.known_hosts_path.source.as_str()
        ),
        None => log::info!("config known_hosts_path: user default"),
    }
    log::info!(
        "config runner_command: {} (source={})",
        report.runner_command.value,
        report.runner_command.source.as_str()
    );
    log::info!(
        "config timeouts: login={}s command={}s prompt={}s",
        report.login_timeout_secs.value,
        report.command_timeout_secs.value,
        report.prompt_timeout_secs.value
    );
    log::info!(
        "config verbose: {} (source={})",
        report.verbose.value,
        report.verbose.source.as_str()
    );
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let parsed = adapters::cli::parse_opts();
    let opts = parsed.opts;
    let config::LoadResult { config, report } = config::load_with_report(
        opts.config,
        config::Overrides {
            database_path: opts.database_path,
            media_root: opts.media_root,
            verbose: parsed.verbose_override,
        },
    )?;
    logging::init(config.verbose);
    log_config_report(&report);
    config::ensure_database_dir(&config.database_path)?;
    let db = adapters::db::CatalogStore::open(&config.database_path).await?;

    let catalog = Arc::new(adapters::db::SqliteStoreAdapter::new(db));
    let connector = Arc::new(adapters::ssh::SshAdapter::new(adapters::ssh::SshSettings {
        known_hosts_path: config.known_hosts_path.clone(),
        login_timeout: config.login_timeout,
        command_timeout: config.command_timeout,
        prompt_timeout: config.prompt_timeout,
    }));
    let local_fs = Arc::new(adapters::fs::LocalFilesystem::new());
    let clock = Arc::new(adapters::time::SystemClock::new());
    let usecases = app::usecases::UseCases::new(
        catalog,
        connector,
        local_fs,
        clock,
        app::usecases::JobSettings {
            media_root: config.media_root.clone(),
            site_root: config.site_root.clone(),
            media_url: config.media_url.clone(),
            runner_command: config.runner_command.clone(),
        },
    );

    let Cmd::Run(args) = opts.cmd;
    let result = match usecases
        .prepare_request(
            args.script_type.into(),
            args.script_id,
            args.profiles,
            args.filename_seed,
        )
        .await
    {
        Ok(request) => {
            let handle = usecases.submit(request);
            log::info!("job {} submitted", handle.filename_seed());
            match handle.wait().await {
                Ok(job) => {
                    for issue in &job.issues {
                        log::warn!("parameter {}: {}", issue.parameter_id, issue.message);
                    }
                    log::info!(
                        "job {} finished in state {} after {:?}",
                        job.filename_seed,
                        job.final_state(),
                        job.states
                    );
                    job.result()
                }
                Err(err) => JobResult::Error(err.to_string()),
            }
        }
        Err(err) => {
            log::error!("job was not submitted: {err}");
            JobResult::Error(err.to_string())
        }
    };

    println!("{}", serde_json::to_string(&result)?);
    match result {
        JobResult::Error(_) => Ok(ExitCode::FAILURE),
        _ => Ok(ExitCode::SUCCESS),
    }
}
