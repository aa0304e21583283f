use crate::core::records::RecordStore;
use crate::models::{MatchResult, Platform, ScoredCandidate};
use crate::services::SimulatedLatency;
use std::sync::Arc;

/// Simulated platform registration lookup.
///
/// Static-flag policy: the answer is the `hasRegistration` flag stored on the
/// record identified by (national id, platform). Pairs the store does not know
/// are reported as unregistered.
#[derive(Debug, Clone)]
pub struct RegistrationOracle {
    store: Arc<RecordStore>,
    latency: SimulatedLatency,
}

impl RegistrationOracle {
    pub fn new(store: Arc<RecordStore>, latency: SimulatedLatency) -> Self {
        Self { store, latency }
    }

    /// Check whether a national id is already registered on a platform
    pub async fn check_registration(&self, national_id: &str, platform: Platform) -> bool {
        self.latency.wait().await;

        let registered = self
            .store
            .find_by_national_id(national_id, platform)
            .map(|record| record.has_registration)
            .unwrap_or(false);

        tracing::trace!("Registration check on {}: {}", platform, registered);
        registered
    }

    /// Resolve registration status for every scored candidate, keeping order
    pub async fn annotate(&self, scored: Vec<ScoredCandidate>) -> Vec<MatchResult> {
        let mut results = Vec::with_capacity(scored.len());
        for candidate in scored {
            let has_registration = self
                .check_registration(&candidate.record.national_id, candidate.record.platform)
                .await;
            results.push(MatchResult {
                record: candidate.record,
                similarity: candidate.similarity,
                has_registration,
            });
        }
        results
    }
}
