//! State threaded through the tier pipeline.

use std::collections::BTreeSet;

use fieldmap_model::CandidateMatch;

/// A candidate proposed for the source at `index`.
#[derive(Debug, Clone, PartialEq)]
pub struct Proposal {
    pub index: usize,
    pub candidate: CandidateMatch,
}

impl Proposal {
    pub fn new(index: usize, candidate: CandidateMatch) -> Self {
        Self { index, candidate }
    }
}

/// Accepted matches so far, one slot per source, plus the claimed targets.
///
/// Each tier consumes the state and returns the next one. A claimed target
/// stays claimed for the rest of the pipeline.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TierState {
    slots: Vec<Option<CandidateMatch>>,
    used_targets: BTreeSet<String>,
}

impl TierState {
    pub fn new(sources: usize) -> Self {
        Self {
            slots: vec![None; sources],
            used_targets: BTreeSet::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn is_mapped(&self, index: usize) -> bool {
        self.slots.get(index).is_some_and(Option::is_some)
    }

    pub fn is_used(&self, target: &str) -> bool {
        self.used_targets.contains(target)
    }

    pub fn mapped_count(&self) -> usize {
        self.slots.iter().flatten().count()
    }

    /// Indices of sources without an accepted match, in source order.
    pub fn unmapped(&self) -> Vec<usize> {
        (0..self.slots.len()).filter(|&i| !self.is_mapped(i)).collect()
    }

    pub fn get(&self, index: usize) -> Option<&CandidateMatch> {
        self.slots.get(index).and_then(Option::as_ref)
    }

    /// Greedy assignment: proposals are taken best first (ties in proposal
    /// order) and skipped when their source is already mapped or their
    /// target already claimed.
    pub fn assign(mut self, mut proposals: Vec<Proposal>) -> Self {
        proposals.sort_by(|a, b| b.candidate.confidence.total_cmp(&a.candidate.confidence));
        for Proposal { index, candidate } in proposals {
            if index >= self.slots.len() || self.is_mapped(index) || self.is_used(&candidate.target_field) {
                continue;
            }
            self.used_targets.insert(candidate.target_field.clone());
            self.slots[index] = Some(candidate);
        }
        self
    }

    pub fn into_slots(self) -> Vec<Option<CandidateMatch>> {
        self.slots
    }
}
