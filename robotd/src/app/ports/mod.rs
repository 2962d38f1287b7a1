// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

pub mod catalog_store;
pub mod clock;
pub mod file_sync;
pub mod interactive;
pub mod local_fs;
pub mod remote_exec;

pub use catalog_store::CatalogStorePort;
pub use clock::ClockPort;
pub use file_sync::FileSyncPort;
pub use interactive::InteractiveShellPort;
pub use local_fs::LocalFilesystemPort;
pub use remote_exec::{ExecCapture, RemoteConnectorPort, RemoteSessionPort};
