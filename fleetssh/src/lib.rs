//! # fleetssh
//!
//! Async SSH command batches across fleets of network elements.
//!
//! fleetssh logs into many nodes in parallel, runs a batch of allow-listed
//! commands on each over an interactive shell, classifies every response as
//! success, failure or ambiguous, and appends one structured record per node
//! to a result file.
//!
//! ## Features
//!
//! - Async SSH connections via russh
//! - Tri-state command outcomes (success / failure / ambiguous)
//! - Per-role command allow-lists with prompt-based terminators
//! - Per-call I/O timeouts backed by absolute deadlines
//! - Fixed-size worker pool with exactly-once job processing
//! - Incremental JSON Lines results
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use fleetssh::{
//!     Credentials, Dispatcher, Job, JsonLinesSink, NodeDescriptor, SessionProcessor, SessionSpec,
//!     SshConnector, SshOptions,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), fleetssh::Error> {
//!     let session = SessionSpec::new("status", Credentials::password("admin", "secret"))
//!         .with_commands(["uptime", "getAlarmList"]);
//!     let jobs = Job::for_nodes(
//!         vec![
//!             NodeDescriptor::new("SIU1", "10.1.6.1"),
//!             NodeDescriptor::new("SIU2", "10.1.6.2"),
//!         ],
//!         &[session],
//!     );
//!
//!     let processor = SessionProcessor::new(SshConnector::new(SshOptions::default()));
//!     let mut sink = JsonLinesSink::append("results.jsonl")?;
//!
//!     let summary = Dispatcher::new(8).run(jobs, processor, &mut sink).await?;
//!     println!("{} results written", summary.written);
//!     Ok(())
//! }
//! ```

pub mod catalog;
pub mod channel;
pub mod dispatch;
pub mod error;
pub mod inventory;
pub mod job;
pub mod result;
pub mod session;
pub mod sink;
pub mod transport;

// Re-export main types for convenience
pub use catalog::{CommandCatalog, CommandKind, Role};
pub use dispatch::{Dispatcher, JobProcessor, RunSummary, WorkerContext};
pub use error::{Error, Result};
pub use inventory::{NodeInventory, StaticInventory};
pub use job::{CommandSpec, Job, NodeDescriptor, SessionSpec};
pub use result::{CommandError, CommandResult, ErrorKind, JobResult, Outcome, SessionResult};
pub use session::{Session, SessionConfig, SessionProcessor};
pub use sink::{JsonLinesSink, ResultSink};
pub use transport::{AuthMethod, Connector, Credentials, HostKeyVerification, ShellChannel, SshConnector, SshOptions};
