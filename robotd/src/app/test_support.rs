// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

//! In-process fakes for the port traits, shared by the service and use-case tests.

use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use time::OffsetDateTime;

use crate::app::errors::{AppError, AppErrorKind, AppResult, codes};
use crate::app::ports::{
    CatalogStorePort, ClockPort, ExecCapture, FileSyncPort, InteractiveShellPort,
    RemoteConnectorPort, RemoteSessionPort,
};
use crate::app::types::{
    ConnectionProfile, LibraryDependency, ResolvedConfig, ScriptObject, ScriptType,
};

pub fn test_config() -> ResolvedConfig {
    ResolvedConfig {
        host: "web01".into(),
        user: "robot".into(),
        password: "secret".into(),
        port: 22,
        remote_path: "/srv/robot".into(),
    }
}

/// Scripted remote host: a set of existing directories, a flag deciding whether
/// `mkdir` works, and a map of remote files that can be retrieved.
#[derive(Default)]
pub struct FakeSession {
    pub commands: Mutex<Vec<String>>,
    pub uploads: Mutex<Vec<(PathBuf, String)>>,
    pub retrieved: Mutex<Vec<String>>,
    existing_dirs: Mutex<HashSet<String>>,
    remote_files: Mutex<HashMap<String, String>>,
    mkdir_denied: bool,
    probe_fails: bool,
    upload_fails: bool,
    closed: Mutex<usize>,
}

impl FakeSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dirs<'a>(self, dirs: impl IntoIterator<Item = &'a str>) -> Self {
        {
            let mut existing = self.existing_dirs.lock().expect("dirs lock");
            existing.extend(dirs.into_iter().map(str::to_string));
        }
        self
    }

    pub fn with_remote_file(self, path: &str, contents: &str) -> Self {
        self.remote_files
            .lock()
            .expect("files lock")
            .insert(path.to_string(), contents.to_string());
        self
    }

    pub fn deny_mkdir(mut self) -> Self {
        self.mkdir_denied = true;
        self
    }

    pub fn fail_probes(mut self) -> Self {
        self.probe_fails = true;
        self
    }

    pub fn fail_uploads(mut self) -> Self {
        self.upload_fails = true;
        self
    }

    pub fn commands(&self) -> Vec<String> {
        self.commands.lock().expect("commands lock").clone()
    }

    pub fn mkdir_count(&self) -> usize {
        self.commands()
            .iter()
            .filter(|cmd| cmd.starts_with("mkdir "))
            .count()
    }

    pub fn uploads(&self) -> Vec<(PathBuf, String)> {
        self.uploads.lock().expect("uploads lock").clone()
    }

    pub fn close_count(&self) -> usize {
        *self.closed.lock().expect("closed lock")
    }
}

fn quoted_path(command: &str) -> String {
    command
        .split('\'')
        .nth(1)
        .unwrap_or_default()
        .to_string()
}

fn capture(stdout: &str, exit_code: i32) -> ExecCapture {
    ExecCapture {
        stdout: stdout.as_bytes().to_vec(),
        stderr: Vec::new(),
        exit_code,
    }
}

#[async_trait]
impl FileSyncPort for FakeSession {
    async fn upload_file(&self, local_path: &Path, remote_path: &str) -> AppResult<()> {
        if self.upload_fails {
            return Err(AppError::with_message(
                AppErrorKind::Transfer,
                codes::REMOTE_ERROR,
                "sftp write failed",
            ));
        }
        self.uploads
            .lock()
            .expect("uploads lock")
            .push((local_path.to_path_buf(), remote_path.to_string()));
        Ok(())
    }

    async fn retrieve_file(&self, remote_path: &str, local_path: &Path) -> AppResult<()> {
        let contents = self
            .remote_files
            .lock()
            .expect("files lock")
            .get(remote_path)
            .cloned();
        let Some(contents) = contents else {
            return Err(AppError::with_message(
                AppErrorKind::Fetch,
                codes::NOT_FOUND,
                format!("remote path missing: {remote_path}"),
            ));
        };
        std::fs::write(local_path, contents).expect("write fetched file");
        self.retrieved
            .lock()
            .expect("retrieved lock")
            .push(remote_path.to_string());
        Ok(())
    }
}

#[async_trait]
impl RemoteSessionPort for FakeSession {
    async fn exec_capture(&self, command: &str) -> AppResult<ExecCapture> {
        self.commands
            .lock()
            .expect("commands lock")
            .push(command.to_string());
        if command.starts_with("if test -d ") {
            if self.probe_fails {
                return Err(AppError::with_message(
                    AppErrorKind::Internal,
                    codes::REMOTE_ERROR,
                    "channel closed",
                ));
            }
            let exists = self
                .existing_dirs
                .lock()
                .expect("dirs lock")
                .contains(&quoted_path(command));
            return Ok(capture(if exists { "1\n" } else { "0\n" }, 0));
        }
        if command.starts_with("mkdir ") {
            if self.mkdir_denied {
                return Ok(ExecCapture {
                    stdout: Vec::new(),
                    stderr: b"mkdir: Permission denied\n".to_vec(),
                    exit_code: 1,
                });
            }
            self.existing_dirs
                .lock()
                .expect("dirs lock")
                .insert(quoted_path(command));
            return Ok(capture("", 0));
        }
        Ok(capture("", 0))
    }

    async fn close(&self) {
        *self.closed.lock().expect("closed lock") += 1;
    }
}

/// Lets a test keep a handle on a session the connector hands out as a box.
pub struct SharedSession(pub Arc<FakeSession>);

#[async_trait]
impl FileSyncPort for SharedSession {
    async fn upload_file(&self, local_path: &Path, remote_path: &str) -> AppResult<()> {
        self.0.upload_file(local_path, remote_path).await
    }

    async fn retrieve_file(&self, remote_path: &str, local_path: &Path) -> AppResult<()> {
        self.0.retrieve_file(remote_path, local_path).await
    }
}

#[async_trait]
impl RemoteSessionPort for SharedSession {
    async fn exec_capture(&self, command: &str) -> AppResult<ExecCapture> {
        self.0.exec_capture(command).await
    }

    async fn close(&self) {
        self.0.close().await
    }
}

#[derive(Default)]
pub struct ShellLog {
    pub lines: Vec<String>,
    pub logged_out: bool,
    pub closed: bool,
}

/// Shell that answers each prompt wait with the next scripted output.
pub struct FakeShell {
    pub log: Arc<Mutex<ShellLog>>,
    outputs: VecDeque<AppResult<String>>,
}

impl FakeShell {
    pub fn new(outputs: Vec<AppResult<String>>) -> Self {
        Self {
            log: Arc::new(Mutex::new(ShellLog::default())),
            outputs: outputs.into(),
        }
    }
}

#[async_trait]
impl InteractiveShellPort for FakeShell {
    async fn send_line(&mut self, line: &str) -> AppResult<()> {
        self.log.lock().expect("shell lock").lines.push(line.to_string());
        Ok(())
    }

    async fn prompt(&mut self) -> AppResult<String> {
        self.outputs.pop_front().unwrap_or_else(|| {
            Err(AppError::with_message(
                AppErrorKind::Runner,
                codes::TIMEOUT,
                "timed out waiting for prompt",
            ))
        })
    }

    async fn logout(&mut self) -> AppResult<()> {
        self.log.lock().expect("shell lock").logged_out = true;
        Ok(())
    }

    async fn close(&mut self) {
        self.log.lock().expect("shell lock").closed = true;
    }
}

pub struct FakeConnector {
    pub session: Arc<FakeSession>,
    pub shell_log: Arc<Mutex<ShellLog>>,
    shell_outputs: Mutex<Option<Vec<AppResult<String>>>>,
    open_error: Option<AppError>,
    pub opened: Mutex<Vec<ResolvedConfig>>,
    pub interactive_opened: Mutex<usize>,
}

impl FakeConnector {
    pub fn new(session: FakeSession) -> Self {
        Self {
            session: Arc::new(session),
            shell_log: Arc::new(Mutex::new(ShellLog::default())),
            shell_outputs: Mutex::new(None),
            open_error: None,
            opened: Mutex::new(Vec::new()),
            interactive_opened: Mutex::new(0),
        }
    }

    pub fn with_shell_outputs(self, outputs: Vec<AppResult<String>>) -> Self {
        *self.shell_outputs.lock().expect("outputs lock") = Some(outputs);
        self
    }

    pub fn failing(mut self, err: AppError) -> Self {
        self.open_error = Some(err);
        self
    }

    pub fn interactive_opened(&self) -> usize {
        *self.interactive_opened.lock().expect("interactive lock")
    }
}

#[async_trait]
impl RemoteConnectorPort for FakeConnector {
    async fn open(&self, config: &ResolvedConfig) -> AppResult<Box<dyn RemoteSessionPort>> {
        self.opened.lock().expect("opened lock").push(config.clone());
        if let Some(err) = self.open_error.clone() {
            return Err(err);
        }
        Ok(Box::new(SharedSession(self.session.clone())))
    }

    async fn open_interactive(
        &self,
        _config: &ResolvedConfig,
    ) -> AppResult<Box<dyn InteractiveShellPort>> {
        *self.interactive_opened.lock().expect("interactive lock") += 1;
        let outputs = self
            .shell_outputs
            .lock()
            .expect("outputs lock")
            .take()
            .unwrap_or_default();
        let mut shell = FakeShell::new(outputs);
        shell.log = self.shell_log.clone();
        Ok(Box::new(shell))
    }
}

#[derive(Default)]
pub struct FakeCatalog {
    pub profiles: Vec<ConnectionProfile>,
    pub parameters: HashMap<i64, String>,
    pub scripts: Vec<ScriptObject>,
    pub libraries: Vec<String>,
}

#[async_trait]
impl CatalogStorePort for FakeCatalog {
    async fn get_profiles(&self, ids: &[i64]) -> AppResult<Vec<ConnectionProfile>> {
        Ok(self
            .profiles
            .iter()
            .filter(|profile| ids.contains(&profile.id))
            .cloned()
            .collect())
    }

    async fn get_parameter_name(&self, id: i64) -> AppResult<String> {
        self.parameters.get(&id).cloned().ok_or_else(|| {
            AppError::with_message(
                AppErrorKind::NotFound,
                codes::NOT_FOUND,
                format!("parameter {id} does not exist"),
            )
        })
    }

    async fn get_script(&self, script_type: ScriptType, id: i64) -> AppResult<ScriptObject> {
        self.scripts
            .iter()
            .find(|script| {
                script.script_type() == script_type
                    && match script {
                        ScriptObject::Keyword(record) => record.id == id,
                        ScriptObject::TestCase(record) => record.id == id,
                    }
            })
            .cloned()
            .ok_or_else(|| {
                AppError::with_message(
                    AppErrorKind::NotFound,
                    codes::NOT_FOUND,
                    format!("{script_type} {id} does not exist"),
                )
            })
    }

    async fn list_libraries(&self) -> AppResult<Vec<LibraryDependency>> {
        Ok(self
            .libraries
            .iter()
            .map(|name| LibraryDependency { name: name.clone() })
            .collect())
    }
}

pub struct FixedClock;

impl ClockPort for FixedClock {
    fn now_utc(&self) -> OffsetDateTime {
        OffsetDateTime::UNIX_EPOCH
    }
}
