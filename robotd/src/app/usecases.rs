// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use std::path::PathBuf;
use std::sync::Arc;

use indexmap::IndexMap;
use tokio::task::JoinHandle;

use crate::app::errors::{AppError, AppErrorKind, AppResult, codes, invalid_argument};
use crate::app::ports::{
    CatalogStorePort, ClockPort, LocalFilesystemPort, RemoteConnectorPort, RemoteSessionPort,
};
use crate::app::services::artifacts::{self, ArtifactRequest};
use crate::app::services::{params, random, runner, transfer};
use crate::app::types::{
    ConnectionProfile, JobCompletion, JobFailure, JobReport, JobRequest, JobState,
    ParamResolutionIssue, ProfileCategory, ResolvedConfig, ScriptType,
};

/// Deployment settings every job reads.
#[derive(Debug, Clone)]
pub struct JobSettings {
    /// Local staging and result storage.
    pub media_root: PathBuf,
    /// Public base URL the result link is built on.
    pub site_root: String,
    /// URL prefix under which `media_root` is served.
    pub media_url: String,
    pub runner_command: String,
}

#[derive(Clone)]
pub struct UseCases {
    pub(crate) catalog: Arc<dyn CatalogStorePort>,
    pub(crate) connector: Arc<dyn RemoteConnectorPort>,
    pub(crate) local_fs: Arc<dyn LocalFilesystemPort>,
    pub(crate) clock: Arc<dyn ClockPort>,
    pub(crate) settings: JobSettings,
}

/// Handle of a submitted job.
pub struct JobHandle {
    filename_seed: String,
    inner: JoinHandle<JobReport>,
}

impl JobHandle {
    pub fn filename_seed(&self) -> &str {
        &self.filename_seed
    }

    pub async fn wait(self) -> AppResult<JobReport> {
        self.inner.await.map_err(|err| {
            AppError::with_message(
                AppErrorKind::Internal,
                codes::INTERNAL_ERROR,
                format!("job {} did not finish: {err}", self.filename_seed),
            )
        })
    }
}

/// Target selected from the job's profiles.
struct JobTarget {
    category: ProfileCategory,
    config: ResolvedConfig,
    global_variables: IndexMap<String, String>,
}

/// Mutable bookkeeping of one run.
#[derive(Default)]
struct JobRun {
    states: Vec<JobState>,
    issues: Vec<ParamResolutionIssue>,
    transcript: Option<String>,
}

impl JobRun {
    fn enter(&mut self, state: JobState) {
        tracing::debug!("job entering {state}");
        self.states.push(state);
    }

    fn current(&self) -> JobState {
        self.states.last().copied().unwrap_or(JobState::ResolveParams)
    }
}

impl UseCases {
    pub fn new(
        catalog: Arc<dyn CatalogStorePort>,
        connector: Arc<dyn RemoteConnectorPort>,
        local_fs: Arc<dyn LocalFilesystemPort>,
        clock: Arc<dyn ClockPort>,
        settings: JobSettings,
    ) -> Self {
        Self {
            catalog,
            connector,
            local_fs,
            clock,
            settings,
        }
    }

    /// Builds a request, generating the filename seed from the script name
    /// when the caller did not supply one.
    pub async fn prepare_request(
        &self,
        script_type: ScriptType,
        script_id: i64,
        profile_ids: Vec<i64>,
        filename_seed: Option<String>,
    ) -> AppResult<JobRequest> {
        if profile_ids.is_empty() {
            return Err(invalid_argument("at least one profile is required"));
        }
        let filename_seed = match filename_seed {
            Some(seed) => {
                random::validate_filename_seed(&seed)?;
                seed
            }
            None => {
                let script = self.catalog.get_script(script_type, script_id).await?;
                random::generate_filename_seed(script.name())
            }
        };
        Ok(JobRequest {
            script_type,
            script_id,
            profile_ids,
            filename_seed,
        })
    }

    /// Runs the job as a background task and returns immediately.
    pub fn submit(&self, request: JobRequest) -> JobHandle {
        let this = self.clone();
        let filename_seed = request.filename_seed.clone();
        tracing::info!("submitting {} job {}", request.script_type, filename_seed);
        JobHandle {
            filename_seed,
            inner: tokio::spawn(async move { this.run_job(request).await }),
        }
    }

    #[tracing::instrument(
        name = "job",
        skip_all,
        fields(seed = %request.filename_seed, script_type = %request.script_type)
    )]
    pub async fn run_job(&self, request: JobRequest) -> JobReport {
        let started_at = self.clock.now_utc();
        let mut run = JobRun::default();
        let outcome = match self.drive(&request, &mut run).await {
            Ok(completion) => {
                run.enter(JobState::Done);
                tracing::info!("job {} done", request.filename_seed);
                Ok(completion)
            }
            Err(error) => {
                let state = run.current();
                tracing::error!(
                    "job {} failed in {state}: {error} (code={})",
                    request.filename_seed,
                    error.code()
                );
                run.enter(JobState::Failed);
                Err(JobFailure { state, error })
            }
        };
        JobReport {
            filename_seed: request.filename_seed,
            states: run.states,
            outcome,
            issues: run.issues,
            transcript: run.transcript,
            started_at,
            finished_at: self.clock.now_utc(),
        }
    }

    async fn drive(&self, request: &JobRequest, run: &mut JobRun) -> AppResult<JobCompletion> {
        run.enter(JobState::ResolveParams);
        random::validate_filename_seed(&request.filename_seed)?;
        let target = self.resolve_target(&request.profile_ids, run).await?;

        run.enter(JobState::Connect);
        let session = self.connector.open(&target.config).await?;
        let result = self
            .stage_and_run(request, &target, session.as_ref(), run)
            .await;
        session.close().await;
        result
    }

    async fn resolve_target(&self, profile_ids: &[i64], run: &mut JobRun) -> AppResult<JobTarget> {
        let profiles = self.catalog.get_profiles(profile_ids).await?;
        let mut global_variables = IndexMap::new();
        let mut connection: Option<&ConnectionProfile> = None;
        for profile in &profiles {
            if profile.category.is_connection() {
                if let Some(previous) = connection {
                    tracing::warn!(
                        "profile '{}' replaces connection profile '{}'",
                        profile.name,
                        previous.name
                    );
                }
                connection = Some(profile);
            } else {
                let resolved = params::resolve_profile_values(self.catalog.as_ref(), profile).await?;
                global_variables.extend(resolved.values);
                run.issues.extend(resolved.issues);
            }
        }
        let Some(profile) = connection else {
            return Err(invalid_argument(format!(
                "no connection profile among profiles {profile_ids:?}"
            )));
        };
        let (config, issues) = params::resolve_connection(self.catalog.as_ref(), profile).await?;
        run.issues.extend(issues);
        tracing::debug!("resolved target {:?} from profile '{}'", config, profile.name);
        Ok(JobTarget {
            category: profile.category,
            config,
            global_variables,
        })
    }

    async fn stage_and_run(
        &self,
        request: &JobRequest,
        target: &JobTarget,
        session: &dyn RemoteSessionPort,
        run: &mut JobRun,
    ) -> AppResult<JobCompletion> {
        let seed = request.filename_seed.as_str();

        run.enter(JobState::Generate);
        let script = self
            .catalog
            .get_script(request.script_type, request.script_id)
            .await?;
        let libraries = self.catalog.list_libraries().await?;
        let staged = artifacts::generate_artifacts(
            self.local_fs.as_ref(),
            &self.settings.media_root,
            ArtifactRequest {
                script: &script,
                global_variables: &target.global_variables,
                libraries: &libraries,
                filename_seed: seed,
                remote_path: &target.config.remote_path,
            },
        )
        .await?;

        run.enter(JobState::Transfer);
        for file in &staged {
            transfer::send_file(session, &target.config, file).await?;
        }

        if target.category != ProfileCategory::LocalConnection {
            tracing::info!("staged {} files for external runner", staged.len());
            return Ok(JobCompletion::Delivered);
        }

        run.enter(JobState::Execute);
        let mut shell = self
            .connector
            .open_interactive(&target.config)
            .await
            .map_err(runner::runner_error)?;
        let transcript = runner::run_remote(
            shell.as_mut(),
            &target.config,
            &self.settings.runner_command,
            seed,
        )
        .await;
        shell.close().await;
        run.transcript = Some(transcript?);

        run.enter(JobState::FetchResults);
        transfer::fetch_results(
            session,
            self.local_fs.as_ref(),
            &target.config,
            seed,
            &self.settings.media_root,
        )
        .await?;
        Ok(JobCompletion::ResultLink(self.result_link(seed)))
    }

    /// `<site_root>/<media_url>/test_result/<seed>_report.html`
    pub fn result_link(&self, seed: &str) -> String {
        let mut link = self.settings.site_root.trim_end_matches('/').to_string();
        let media = self.settings.media_url.trim_matches('/');
        if !media.is_empty() {
            link.push('/');
            link.push_str(media);
        }
        link.push('/');
        link.push_str(transfer::RESULT_STAGING_DIR);
        link.push('/');
        link.push_str(&transfer::report_file_name(seed));
        link
    }
}
