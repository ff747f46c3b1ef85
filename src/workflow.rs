//! End-to-end okify run: configure, fetch, plan, prompt, execute, report.
use crate::cli::RootArgs;
use crate::config::load_config;
use crate::display::Style;
use crate::execute::{ExecutionResult, ExecutionStatus, Executor};
use crate::fetch::{HttpManifestSource, ManifestSource};
use crate::interrupt;
use crate::plan::{build_plan, DecisionUnit};
use crate::prompt::{Decision, KeySource, Outcome, PromptMode, Prompter, StreamKeys, TerminalKeys};
use crate::remote::{CliCopier, HttpArtifactStore};
use crate::staging::Staging;
use anyhow::{anyhow, Context, Result};
use crossterm::style::Color;
use std::fmt;
use std::io::{self, IsTerminal, Write};
use std::time::Instant;

/// Final tally of one invocation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub okified: usize,
    pub failed: usize,
    pub skipped: usize,
    /// Units left untouched because of a quit or an interrupt.
    pub not_reached: usize,
    pub dry_run: bool,
}

impl RunSummary {
    pub fn tally(
        total_units: usize,
        decisions: &[Decision],
        results: &[ExecutionResult],
        dry_run: bool,
    ) -> Self {
        let skipped = decisions
            .iter()
            .filter(|d| d.outcome == Outcome::Skipped)
            .count();
        let failed = results.iter().filter(|r| r.is_failed()).count();
        Self {
            okified: results.len() - failed,
            failed,
            skipped,
            not_reached: total_units.saturating_sub(skipped + results.len()),
            dry_run,
        }
    }

    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.dry_run {
            f.write_str("dry run: ")?;
        }
        write!(
            f,
            "okified {}, failed {}, skipped {}, not reached {}",
            self.okified, self.failed, self.skipped, self.not_reached
        )
    }
}

pub fn run(args: RootArgs) -> Result<RunSummary> {
    let start = Instant::now();
    let run = args.run_reference();
    let config = load_config()?;
    let copier = CliCopier::from_config(&config)?;
    tracing::debug!(program = %copier.program().display(), "remote tool resolved");
    let staging = Staging::for_dlpath(args.dlpath.as_deref())?;

    let mut stdout = io::stdout();
    let style = Style::detect(stdout.is_terminal());
    writeln!(stdout, "Staging artifacts in {}", staging.root().display())?;

    let source = HttpManifestSource::from_config(&config);
    let entries = source
        .fetch_manifest(&run)
        .with_context(|| format!("fetch failures for {run}"))?;
    writeln!(stdout, "{} failed tests to okify", entries.len())?;
    let units = build_plan(&entries);
    tracing::debug!(
        units = units.len(),
        needing_choice = units.iter().filter(|u| u.needs_choice()).count(),
        "plan ready"
    );

    let mode = if args.dry_run {
        PromptMode::DryRun
    } else {
        PromptMode::Interactive
    };
    let decisions = if io::stdin().is_terminal() {
        decide(TerminalKeys, &units, mode, style)?
    } else {
        decide(StreamKeys::new(io::stdin().lock()), &units, mode, style)?
    };

    let store = HttpArtifactStore::from_config(&config);
    let executor = Executor::new(&store, &copier, &config);
    let results = executor.execute(&decisions, &staging, args.dry_run);
    for result in &results {
        writeln!(stdout, "{}", result_line(result, &style))?;
    }

    let summary = RunSummary::tally(units.len(), &decisions, &results, args.dry_run);
    writeln!(stdout, "{summary}")?;
    if interrupt::interrupted() {
        return Err(anyhow!("interrupted"));
    }
    tracing::info!(
        elapsed_ms = start.elapsed().as_millis() as u64,
        run_number = run.run_number,
        observatory = %run.observatory,
        units = units.len(),
        okified = summary.okified,
        failed = summary.failed,
        "okify run complete"
    );
    Ok(summary)
}

fn decide<K: KeySource>(
    keys: K,
    units: &[DecisionUnit],
    mode: PromptMode,
    style: Style,
) -> Result<Vec<Decision>> {
    Prompter::new(keys, io::stdout(), style).resolve(units, mode)
}

fn result_line(result: &ExecutionResult, style: &Style) -> String {
    match result.status {
        ExecutionStatus::Ok => style.paint(
            &format!("okified {} from {}", result.unit.truth_path, result.source),
            Color::Green,
        ),
        ExecutionStatus::Failed => style.paint(
            &format!("failed {}: {}", result.unit.truth_path, result.detail),
            Color::Red,
        ),
    }
}
