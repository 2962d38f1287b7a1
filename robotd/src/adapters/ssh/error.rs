// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
#[error("authentication_failure")]
pub struct AuthenticationFailure;

/// The server key is unknown or differs from the known_hosts entry.
#[derive(Debug, ThisError)]
#[error("host key for {host}:{port} rejected: {reason}")]
pub struct HostKeyRejected {
    pub host: String,
    pub port: u16,
    pub reason: String,
}

#[derive(Debug, ThisError)]
#[error("{operation} timed out after {secs}s")]
pub struct OperationTimedOut {
    pub operation: &'static str,
    pub secs: u64,
}
