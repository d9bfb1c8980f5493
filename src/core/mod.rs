pub mod audit;
pub mod engine;
pub mod filter;
pub mod local;
pub mod pool;

pub use audit::AuditLogger;
pub use engine::{DownloadOutcome, RunReport, SyncEngine};
pub use filter::{SkipCategory, SkipDecision, SkipFilter};
pub use local::LocalStore;
pub use pool::{WorkQueue, WorkerPool, DEFAULT_MAX_WORKERS};
