//! Okify plan: one decision unit per destination truth file.
//!
//! Raw manifest entries are grouped by truth path in first-seen order, identical
//! (truth, artifact) pairs collapse into one candidate, and the group's op is
//! either agreed by every contributing entry or left ambiguous for the operator.
use crate::model::{ManifestEntry, OkifyOp};
use std::collections::BTreeMap;

/// One replacement file that could become the new truth.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub artifact: String,
    /// Tests that reported this artifact, in manifest order.
    pub tests: Vec<String>,
    pub tracebacks: Vec<String>,
}

/// Op resolution for a unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpChoice {
    Agreed(OkifyOp),
    /// Contributing entries disagree; the ops are listed in first-seen order.
    Ambiguous(Vec<OkifyOp>),
}

/// Deduplicated unit of work keyed by its destination truth path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecisionUnit {
    pub truth_path: String,
    pub candidates: Vec<Candidate>,
    pub op: OpChoice,
}

impl DecisionUnit {
    pub fn is_ambiguous(&self) -> bool {
        matches!(self.op, OpChoice::Ambiguous(_))
    }

    /// Whether the operator has to pick something before the unit can run.
    pub fn needs_choice(&self) -> bool {
        self.is_ambiguous() || self.candidates.len() > 1
    }

    pub fn test_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for name in self.candidates.iter().flat_map(|c| c.tests.iter()) {
            if !names.contains(&name.as_str()) {
                names.push(name);
            }
        }
        names
    }
}

struct UnitBuilder {
    truth_path: String,
    candidates: Vec<Candidate>,
    ops: Vec<OkifyOp>,
}

impl UnitBuilder {
    fn absorb(&mut self, entry: &ManifestEntry) {
        if !self.ops.contains(&entry.okify_op) {
            self.ops.push(entry.okify_op);
        }
        let existing = self
            .candidates
            .iter()
            .position(|c| c.artifact == entry.local_artifact_path);
        let index = match existing {
            Some(index) => index,
            None => {
                self.candidates.push(Candidate {
                    artifact: entry.local_artifact_path.clone(),
                    tests: Vec::new(),
                    tracebacks: Vec::new(),
                });
                self.candidates.len() - 1
            }
        };
        let candidate = &mut self.candidates[index];
        if !candidate.tests.contains(&entry.test_identifier) {
            candidate.tests.push(entry.test_identifier.clone());
        }
        if let Some(traceback) = &entry.traceback {
            if !candidate.tracebacks.contains(traceback) {
                candidate.tracebacks.push(traceback.clone());
            }
        }
    }

    fn finish(self) -> DecisionUnit {
        let op = match self.ops.as_slice() {
            [single] => OpChoice::Agreed(*single),
            _ => OpChoice::Ambiguous(self.ops),
        };
        DecisionUnit {
            truth_path: self.truth_path,
            candidates: self.candidates,
            op,
        }
    }
}

/// Group manifest entries into decision units.
///
/// Output order follows the first appearance of each truth path, so the same
/// input always yields the same prompts in the same order.
pub fn build_plan(entries: &[ManifestEntry]) -> Vec<DecisionUnit> {
    let mut builders: Vec<UnitBuilder> = Vec::new();
    let mut index_by_truth: BTreeMap<&str, usize> = BTreeMap::new();

    for entry in entries {
        let index = *index_by_truth
            .entry(entry.remote_truth_path.as_str())
            .or_insert_with(|| {
                builders.push(UnitBuilder {
                    truth_path: entry.remote_truth_path.clone(),
                    candidates: Vec::new(),
                    ops: Vec::new(),
                });
                builders.len() - 1
            });
        builders[index].absorb(entry);
    }

    let units: Vec<DecisionUnit> = builders.into_iter().map(UnitBuilder::finish).collect();
    tracing::debug!(
        entries = entries.len(),
        units = units.len(),
        ambiguous = units.iter().filter(|u| u.is_ambiguous()).count(),
        "okify plan built"
    );
    units
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(test: &str, local: &str, remote: &str, op: OkifyOp) -> ManifestEntry {
        ManifestEntry {
            test_identifier: test.to_string(),
            local_artifact_path: local.to_string(),
            remote_truth_path: remote.to_string(),
            okify_op: op,
            traceback: None,
        }
    }

    #[test]
    fn duplicate_pairs_collapse_to_one_candidate() {
        let entries = vec![
            entry("t1", "out1.fits", "truth/a.fits", OkifyOp::Default),
            entry("t1", "out1.fits", "truth/a.fits", OkifyOp::Default),
            entry("t2", "out2.fits", "truth/b.fits", OkifyOp::SdpPoolCopy),
        ];
        let plan = build_plan(&entries);

        assert_eq!(plan.len(), 2);
        assert_eq!(plan[0].truth_path, "truth/a.fits");
        assert_eq!(plan[0].candidates.len(), 1);
        assert_eq!(plan[0].op, OpChoice::Agreed(OkifyOp::Default));
        assert_eq!(plan[1].truth_path, "truth/b.fits");
        assert_eq!(plan[1].op, OpChoice::Agreed(OkifyOp::SdpPoolCopy));
    }

    #[test]
    fn duplicate_pairs_from_different_tests_merge_test_names() {
        let mut first = entry("test_a", "out.fits", "truth/a.fits", OkifyOp::Default);
        first.traceback = Some("boom".to_string());
        let mut second = entry("test_b", "out.fits", "truth/a.fits", OkifyOp::Default);
        second.traceback = Some("boom".to_string());
        let plan = build_plan(&[first, second]);

        assert_eq!(plan.len(), 1);
        let candidate = &plan[0].candidates[0];
        assert_eq!(candidate.tests, vec!["test_a", "test_b"]);
        assert_eq!(candidate.tracebacks, vec!["boom"]);
        assert!(!plan[0].needs_choice());
    }

    #[test]
    fn disagreeing_ops_are_ambiguous() {
        let entries = vec![
            entry("t1", "out1.fits", "truth/a.fits", OkifyOp::SdpPoolCopy),
            entry("t2", "out1.fits", "truth/a.fits", OkifyOp::Default),
        ];
        let plan = build_plan(&entries);

        assert_eq!(plan.len(), 1);
        assert_eq!(
            plan[0].op,
            OpChoice::Ambiguous(vec![OkifyOp::SdpPoolCopy, OkifyOp::Default])
        );
        assert!(plan[0].is_ambiguous());
        assert!(plan[0].needs_choice());
    }

    #[test]
    fn distinct_artifacts_for_one_truth_become_candidates() {
        let entries = vec![
            entry("t1", "run1/out.fits", "truth/a.fits", OkifyOp::Default),
            entry("t2", "run2/out.fits", "truth/a.fits", OkifyOp::Default),
        ];
        let plan = build_plan(&entries);

        assert_eq!(plan.len(), 1);
        let artifacts: Vec<&str> = plan[0]
            .candidates
            .iter()
            .map(|c| c.artifact.as_str())
            .collect();
        assert_eq!(artifacts, vec!["run1/out.fits", "run2/out.fits"]);
        assert!(plan[0].needs_choice());
        assert_eq!(plan[0].test_names(), vec!["t1", "t2"]);
    }

    #[test]
    fn order_follows_first_seen_truth_path_and_is_stable() {
        let entries = vec![
            entry("t1", "z.fits", "truth/z.fits", OkifyOp::Default),
            entry("t2", "a.fits", "truth/a.fits", OkifyOp::Default),
            entry("t3", "z2.fits", "truth/z.fits", OkifyOp::Default),
            entry("t4", "m.fits", "truth/m.fits", OkifyOp::Default),
        ];
        let first = build_plan(&entries);
        let second = build_plan(&entries);

        let order: Vec<&str> = first.iter().map(|u| u.truth_path.as_str()).collect();
        assert_eq!(order, vec!["truth/z.fits", "truth/a.fits", "truth/m.fits"]);
        assert_eq!(first, second);
    }

    #[test]
    fn empty_manifest_yields_empty_plan() {
        assert!(build_plan(&[]).is_empty());
    }
}
