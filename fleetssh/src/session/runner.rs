//! Drives sessions for one job: login, prompt wait, batch, logout.

use std::sync::Arc;

use log::{info, warn};

use super::config::SessionConfig;
use super::engine::Session;
use crate::catalog::CommandCatalog;
use crate::dispatch::{JobProcessor, WorkerContext};
use crate::error::Result;
use crate::job::{Job, NodeDescriptor, SessionSpec};
use crate::result::{JobResult, SessionResult};
use crate::transport::Connector;

/// Job processor that runs every session of a job over `K`.
///
/// Sessions run in order. A failed login ends only that session; the next
/// session still runs.
#[derive(Debug, Clone)]
pub struct SessionProcessor<K> {
    connector: K,
    catalog: Arc<CommandCatalog>,
    config: SessionConfig,
}

impl<K: Connector> SessionProcessor<K> {
    /// Use the built-in catalog and default timings.
    pub fn new(connector: K) -> Self {
        Self {
            connector,
            catalog: Arc::new(CommandCatalog::builtin()),
            config: SessionConfig::default(),
        }
    }

    pub fn with_catalog(mut self, catalog: CommandCatalog) -> Self {
        self.catalog = Arc::new(catalog);
        self
    }

    pub fn with_config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    pub fn connector(&self) -> &K {
        &self.connector
    }

    pub fn catalog(&self) -> &CommandCatalog {
        &self.catalog
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Run every session of `job`.
    pub async fn run_job(&self, job: &Job, ctx: &WorkerContext) -> JobResult {
        let mut result = JobResult::new(job.node());
        for spec in job.sessions() {
            let session = self.run_session(job.node(), spec, ctx).await;
            result.sessions.push(session);
        }
        result
    }

    /// Run one login → batch → logout cycle.
    pub async fn run_session(&self, node: &NodeDescriptor, spec: &SessionSpec, ctx: &WorkerContext) -> SessionResult {
        let user = spec.credentials.username();
        let mut record = SessionResult::new(node, &spec.label, user);
        info!("{}: session {} on {} as {} ({} role)", ctx, spec.label, node, user, spec.role);

        let opened = Session::open(
            &self.connector,
            node.address(),
            &spec.credentials,
            self.config.clone(),
        )
        .await;
        let mut session = match opened {
            Ok((session, login)) => {
                record.commands.push(login);
                session
            }
            Err(login) => {
                warn!("{}: session {} on {} ends at login", ctx, spec.label, node);
                record.commands.push(login);
                return record;
            }
        };

        let prompt = session.wait_for_prompt().await;
        let ready = prompt.is_success();
        record.commands.push(prompt);

        if ready {
            let mut completed = 0;
            for command in &spec.commands {
                if command.trim().is_empty() {
                    continue;
                }
                let result = match self
                    .catalog
                    .prepare(spec.role, command, self.config.command_timeout)
                {
                    Ok(prepared) => session.send_and_classify(&prepared).await,
                    Err(rejected) => rejected,
                };

                let abort = result.is_communication_failure();
                record.commands.push(result);
                if abort {
                    warn!(
                        "{}: aborting session {} on {} after {} command(s)",
                        ctx, spec.label, node, completed
                    );
                    record.aborted_after = Some(completed);
                    break;
                }
                completed += 1;
            }
        } else {
            record.aborted_after = Some(0);
        }

        session.close().await;
        info!("{}: session {} on {} done", ctx, spec.label, node);
        record
    }
}

impl<K: Connector + 'static> JobProcessor for SessionProcessor<K> {
    async fn process(&self, job: Job, ctx: WorkerContext) -> Result<JobResult> {
        Ok(self.run_job(&job, &ctx).await)
    }
}
