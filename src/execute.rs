//! Execution of accepted okify decisions.
//!
//! Every accepted unit is attempted even when an earlier one fails; each
//! failure is recorded on that unit's result and the batch moves on.
use crate::config::OkifyConfig;
use crate::interrupt;
use crate::model::{file_name, OkifyOp};
use crate::plan::DecisionUnit;
use crate::prompt::{Decision, Outcome, Selection};
use crate::remote::{ArtifactStore, RemoteCopier};
use crate::staging::Staging;
use anyhow::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionStatus {
    Ok,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionResult {
    pub unit: DecisionUnit,
    /// Remote path the replacement was taken from.
    pub source: String,
    pub status: ExecutionStatus,
    pub detail: String,
}

impl ExecutionResult {
    pub fn is_failed(&self) -> bool {
        self.status == ExecutionStatus::Failed
    }
}

pub struct Executor<'a> {
    store: &'a dyn ArtifactStore,
    copier: &'a dyn RemoteCopier,
    sdp_pool_root: String,
    interrupted: fn() -> bool,
}

impl<'a> Executor<'a> {
    pub fn new(
        store: &'a dyn ArtifactStore,
        copier: &'a dyn RemoteCopier,
        config: &OkifyConfig,
    ) -> Self {
        Self {
            store,
            copier,
            sdp_pool_root: config.sdp_pool_root.clone(),
            interrupted: interrupt::interrupted,
        }
    }

    #[cfg(test)]
    fn with_interrupt_check(mut self, interrupted: fn() -> bool) -> Self {
        self.interrupted = interrupted;
        self
    }

    /// Run every accepted decision; skipped and cancelled ones produce nothing.
    ///
    /// An interrupt stops the batch before the next unit starts.
    pub fn execute(
        &self,
        decisions: &[Decision],
        staging: &Staging,
        dry_run: bool,
    ) -> Vec<ExecutionResult> {
        let mut results = Vec::new();
        for (index, decision) in decisions.iter().enumerate() {
            let Outcome::Accepted(selection) = &decision.outcome else {
                continue;
            };
            if (self.interrupted)() {
                tracing::warn!(truth = %decision.unit.truth_path, "interrupted, stopping batch");
                break;
            }
            let source = self.resolve_source(selection);
            let unit_dry_run = dry_run || decision.preview;
            let outcome = self.run_unit(index, &decision.unit, &source, staging, unit_dry_run);
            let (status, detail) = match outcome {
                Ok(detail) => (ExecutionStatus::Ok, detail),
                Err(err) => {
                    tracing::warn!(
                        truth = %decision.unit.truth_path,
                        error = %format!("{err:#}"),
                        "okify failed"
                    );
                    (ExecutionStatus::Failed, format!("{err:#}"))
                }
            };
            results.push(ExecutionResult {
                unit: decision.unit.clone(),
                source,
                status,
                detail,
            });
        }
        results
    }

    /// Remote path the new truth content comes from.
    pub fn resolve_source(&self, selection: &Selection) -> String {
        match selection.op {
            OkifyOp::Default => selection.candidate.artifact.clone(),
            OkifyOp::SdpPoolCopy => format!(
                "{}/{}",
                self.sdp_pool_root.trim_end_matches('/'),
                file_name(&selection.candidate.artifact)
            ),
        }
    }

    fn run_unit(
        &self,
        index: usize,
        unit: &DecisionUnit,
        source: &str,
        staging: &Staging,
        dry_run: bool,
    ) -> Result<String> {
        let unit_dir = staging.unit_dir(index)?;
        let staged = self.store.download(source, &unit_dir)?;
        let detail = self.copier.copy(&staged, &unit.truth_path, dry_run)?;
        tracing::debug!(truth = %unit.truth_path, source, dry_run, "okify complete");
        Ok(detail)
    }
}
