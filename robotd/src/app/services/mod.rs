// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

pub mod artifacts;
pub mod params;
pub mod random;
pub mod remote_dirs;
pub mod remote_path;
pub mod runner;
pub mod shell;
pub mod transfer;
