// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use std::fmt::Write as _;
use std::path::Path;

use indexmap::IndexMap;

use crate::app::errors::{AppError, AppErrorKind, AppResult, codes};
use crate::app::ports::LocalFilesystemPort;
use crate::app::services::remote_path::remote_join;
use crate::app::types::{LibraryDependency, ScriptObject, StagedFile, StagedFileKind};

/// Staging subdirectory (under the media root) for keyword jobs.
pub const KEYWORDS_STAGING_DIR: &str = "test_keywords";
pub const TEST_CASES_STAGING_DIR: &str = "test_cases";
pub const PROFILES_STAGING_DIR: &str = "profiles";

/// Tag put on the companion test case that exercises a single keyword.
pub const KEYWORD_TEST_TAG: &str = "TestKeyword";

pub fn keyword_file_name(seed: &str) -> String {
    format!("{seed}_keyword.robot")
}

pub fn test_case_file_name(seed: &str) -> String {
    format!("{seed}_test_case.robot")
}

pub fn profile_file_name(seed: &str) -> String {
    format!("{seed}_profile.py")
}

/// Everything one job needs rendered.
#[derive(Debug, Clone, Copy)]
pub struct ArtifactRequest<'a> {
    pub script: &'a ScriptObject,
    pub global_variables: &'a IndexMap<String, String>,
    pub libraries: &'a [LibraryDependency],
    pub filename_seed: &'a str,
    /// Base path on the target, referenced by the keyword companion file.
    pub remote_path: &'a str,
}

/// Renders the script files plus the variables file into `media_root` staging
/// directories. Returned in transfer order.
pub async fn generate_artifacts(
    fs: &dyn LocalFilesystemPort,
    media_root: &Path,
    req: ArtifactRequest<'_>,
) -> AppResult<Vec<StagedFile>> {
    let name = req.script.name().trim();
    if name.is_empty() {
        return Err(generation_error("script has no name"));
    }
    let body = req
        .script
        .body()
        .filter(|body| !body.trim().is_empty())
        .ok_or_else(|| generation_error(format!("script '{name}' has no body")))?;

    let seed = req.filename_seed;
    tracing::debug!("rendering {} '{name}' as {seed}", req.script.script_type());
    let mut rendered = Vec::new();
    match req.script {
        ScriptObject::Keyword(_) => {
            let dir = media_root.join(KEYWORDS_STAGING_DIR);
            rendered.push((
                StagedFileKind::Keyword,
                dir.join(keyword_file_name(seed)),
                render_keyword(name, body),
            ));
            let keyword_remote = remote_join(
                req.remote_path,
                &[
                    StagedFileKind::Keyword.remote_subdir(),
                    &keyword_file_name(seed),
                ],
            );
            rendered.push((
                StagedFileKind::TestCase,
                dir.join(test_case_file_name(seed)),
                render_keyword_companion(name, &keyword_remote, req.libraries),
            ));
        }
        ScriptObject::TestCase(record) => {
            rendered.push((
                StagedFileKind::TestCase,
                media_root
                    .join(TEST_CASES_STAGING_DIR)
                    .join(test_case_file_name(seed)),
                render_test_case(name, record.phase.as_deref(), body, req.libraries),
            ));
        }
    }
    rendered.push((
        StagedFileKind::GlobalVariablesProfile,
        media_root
            .join(PROFILES_STAGING_DIR)
            .join(profile_file_name(seed)),
        render_profile(req.global_variables),
    ));

    let mut staged = Vec::with_capacity(rendered.len());
    for (kind, local_path, contents) in rendered {
        if let Some(parent) = local_path.parent() {
            fs.ensure_dir(parent)
                .await
                .map_err(|err| wrap_fs_error(err, parent))?;
        }
        fs.write_text(&local_path, &contents)
            .await
            .map_err(|err| wrap_fs_error(err, &local_path))?;
        tracing::debug!("staged {:?} file {}", kind, local_path.display());
        staged.push(StagedFile { kind, local_path });
    }
    Ok(staged)
}

fn generation_error(message: impl Into<String>) -> AppError {
    AppError::with_message(AppErrorKind::Generation, codes::GENERATION_FAILURE, message)
}

fn wrap_fs_error(err: AppError, path: &Path) -> AppError {
    generation_error(err.message()).with_context(path.display().to_string())
}

fn push_indented_body(out: &mut String, body: &str) {
    for line in body.lines() {
        let _ = writeln!(out, "\t{line}");
    }
}

fn push_library_settings(out: &mut String, libraries: &[LibraryDependency]) {
    for lib in libraries {
        let _ = writeln!(out, "Library\t{}", lib.name);
    }
    out.push('\n');
}

pub fn render_keyword(name: &str, body: &str) -> String {
    let mut out = String::from("*** Keywords ***\n");
    let _ = writeln!(out, "{name}");
    push_indented_body(&mut out, body);
    out
}

/// Minimal suite that imports the keyword file and calls the keyword once.
pub fn render_keyword_companion(
    name: &str,
    keyword_remote_path: &str,
    libraries: &[LibraryDependency],
) -> String {
    let mut out = String::from("*** Settings ***\n");
    let _ = writeln!(out, "Resource\t{keyword_remote_path}");
    push_library_settings(&mut out, libraries);
    out.push_str("*** Test Cases ***\n");
    let compact: String = name.chars().filter(|c| !c.is_whitespace()).collect();
    let _ = writeln!(out, "Test {compact}");
    let _ = writeln!(out, "\t[Tags]  {KEYWORD_TEST_TAG}");
    let _ = writeln!(out, "\t{name}");
    out
}

pub fn render_test_case(
    name: &str,
    phase: Option<&str>,
    body: &str,
    libraries: &[LibraryDependency],
) -> String {
    let mut out = String::from("*** Settings ***\n");
    push_library_settings(&mut out, libraries);
    out.push_str("*** Test Cases ***\n");
    let _ = writeln!(out, "{name}");
    if let Some(phase) = phase.map(str::trim).filter(|p| !p.is_empty()) {
        let _ = writeln!(out, "\t[Tags]\t\t{phase}");
    }
    push_indented_body(&mut out, body);
    out
}

/// Python variables file: one `name = value` line per global parameter.
pub fn render_profile(values: &IndexMap<String, String>) -> String {
    values.iter().fold(String::new(), |mut out, (name, value)| {
        let _ = writeln!(out, "{name} = {value}");
        out
    })
}
