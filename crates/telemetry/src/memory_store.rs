use std::{
    collections::{BTreeSet, HashMap},
    sync::{Arc, Mutex},
};

use async_trait::async_trait;

use crate::database::SampleStore;
use crate::errors::StoreError;
use crate::models::{PlayerId, RunId, TelemetrySample};

/// Process-local store. Cloning shares the underlying runs.
#[derive(Clone, Default)]
pub struct MemoryStore {
    runs: Arc<Mutex<HashMap<RunId, Vec<TelemetrySample>>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total samples held for a run.
    pub fn len(&self, run_id: &RunId) -> usize {
        self.runs
            .lock()
            .map(|runs| runs.get(run_id).map_or(0, Vec::len))
            .unwrap_or(0)
    }

    fn poisoned() -> StoreError {
        StoreError::Unavailable("memory store lock poisoned".to_string())
    }
}

#[async_trait]
impl SampleStore for MemoryStore {
    async fn append(&self, run_id: &RunId, sample: &TelemetrySample) -> Result<(), StoreError> {
        let mut runs = self.runs.lock().map_err(|_| Self::poisoned())?;
        runs.entry(run_id.clone()).or_default().push(sample.clone());
        Ok(())
    }

    async fn query(
        &self,
        run_id: &RunId,
        player_id: PlayerId,
    ) -> Result<Vec<TelemetrySample>, StoreError> {
        let runs = self.runs.lock().map_err(|_| Self::poisoned())?;
        let mut samples: Vec<TelemetrySample> = runs
            .get(run_id)
            .map(|samples| {
                samples
                    .iter()
                    .filter(|s| s.player_id == player_id)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        samples.sort_by_key(|s| s.elapsed_time);
        Ok(samples)
    }

    async fn list_runs(&self) -> Result<BTreeSet<RunId>, StoreError> {
        let runs = self.runs.lock().map_err(|_| Self::poisoned())?;
        Ok(runs.keys().cloned().collect())
    }
}
