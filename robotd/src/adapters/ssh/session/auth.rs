// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use anyhow::{Context, Result};
use russh::client::AuthResult;

use crate::adapters::ssh::AuthenticationFailure;

use super::{ClientHandler, SessionManager, with_timeout};

enum AuthDecision {
    Success,
    Failure,
}

fn auth_decision(result: AuthResult) -> AuthDecision {
    match result {
        AuthResult::Success => AuthDecision::Success,
        AuthResult::Failure {
            remaining_methods,
            partial_success,
        } => {
            log::debug!(
                "password authentication failed (partial_success={}, remaining={:?})",
                partial_success,
                remaining_methods
            );
            AuthDecision::Failure
        }
    }
}

impl SessionManager {
    /// Connects and authenticates with the profile password, bounded by the
    /// login timeout. Does nothing when already connected.
    pub async fn connect(&self) -> Result<()> {
        let mut handle_field = self.handle.lock().await;
        if matches!(handle_field.as_ref(), Some(h) if !h.is_closed()) {
            return Ok(());
        }

        let params = &self.params;
        log::info!(
            "establishing connection with {}@{}:{}",
            params.username,
            params.host,
            params.port
        );
        let handler = ClientHandler::new(
            params.host.clone(),
            params.port,
            params.known_hosts_path.clone(),
        );
        let handle = with_timeout("login", params.login_timeout, async {
            let mut handle = russh::client::connect(
                self.config.clone(),
                (params.host.as_str(), params.port),
                handler,
            )
            .await
            .context("SSH connect failed")?;
            log::info!(
                "established initial connection with {}@{}:{}, proceeding with auth",
                params.username,
                params.host,
                params.port
            );
            let result = handle
                .authenticate_password(params.username.clone(), params.password.clone())
                .await
                .context("password authentication")?;
            match auth_decision(result) {
                AuthDecision::Success => Ok::<_, anyhow::Error>(handle),
                AuthDecision::Failure => Err(AuthenticationFailure.into()),
            }
        })
        .await?;

        *handle_field = Some(handle);
        Ok(())
    }
}
