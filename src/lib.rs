pub mod commands;
pub mod config;
pub mod core;
pub mod error;
pub mod logging;
pub mod remote;

pub use config::{MirrorConfig, RemoteConfig, RemoteType};
pub use core::{AuditLogger, RunReport, SkipDecision, SkipFilter, SyncEngine, WorkQueue, WorkerPool};
pub use error::{MirrorError, Result};
pub use remote::{RemoteEntry, RemotePath, RemoteSource};
