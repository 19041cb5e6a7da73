use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use engine::Evaluation;

/// Process-lifetime evaluations keyed by position fingerprint.
///
/// One instance is handed to both the live controller and the game pipeline.
/// Each write replaces the whole entry; the last writer wins even if it
/// searched shallower. Entries are never evicted.
#[derive(Debug, Clone, Default)]
pub struct EvaluationCache {
    entries: Arc<RwLock<HashMap<String, Evaluation>>>,
}

impl EvaluationCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, fingerprint: &str) -> Option<Evaluation> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(fingerprint)
            .cloned()
    }

    pub fn insert(&self, fingerprint: impl Into<String>, evaluation: Evaluation) {
        let fingerprint = fingerprint.into();
        tracing::trace!(fen = %fingerprint, depth = evaluation.depth, "Caching evaluation");
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(fingerprint, evaluation);
    }

    pub fn clear(&self) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
