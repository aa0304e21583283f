use crate::core::records::RecordStore;
use crate::models::{ScoredCandidate, SelectionCriteria, UploadedImage};
use crate::services::SimulatedLatency;
use rand::Rng;
use std::sync::Arc;

/// Exclusive upper bound of a simulated similarity score
pub const MAX_SIMILARITY: f64 = 95.0;

/// Default minimum similarity percentage
pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 75.0;

/// Simulated facial matcher
///
/// # Pipeline Stages
/// 1. Exact platform/category/gender filter over the record store
/// 2. Similarity draw in `[threshold, 95)`
/// 3. Ranking by similarity, highest first
///
/// The uploaded image is never inspected; a real embedding comparison would
/// replace stage 2.
#[derive(Debug, Clone)]
pub struct Matcher {
    store: Arc<RecordStore>,
    threshold: f64,
    latency: SimulatedLatency,
}

impl Matcher {
    /// `threshold` must lie in `[0, 95)`; settings validation enforces it.
    pub fn new(store: Arc<RecordStore>, threshold: f64, latency: SimulatedLatency) -> Self {
        Self {
            store,
            threshold,
            latency,
        }
    }

    pub fn with_default_threshold(store: Arc<RecordStore>) -> Self {
        Self::new(store, DEFAULT_SIMILARITY_THRESHOLD, SimulatedLatency::none())
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn store(&self) -> &Arc<RecordStore> {
        &self.store
    }

    /// Find candidates resembling the uploaded photo
    ///
    /// Suspends for the configured latency before scoring. Repeated calls with
    /// the same inputs return the same records, only the scores differ.
    pub async fn find_matches<R: Rng + ?Sized>(
        &self,
        criteria: &SelectionCriteria,
        image: &UploadedImage,
        rng: &mut R,
    ) -> Vec<ScoredCandidate> {
        tracing::debug!(
            "Running match for {} ({} bytes) with criteria {}/{}/{}",
            image.file_name,
            image.size,
            criteria.platform,
            criteria.category,
            criteria.gender
        );

        self.latency.wait().await;

        self.score_candidates(criteria, rng)
    }

    /// Filter and score without the simulated delay
    pub fn score_candidates<R: Rng + ?Sized>(
        &self,
        criteria: &SelectionCriteria,
        rng: &mut R,
    ) -> Vec<ScoredCandidate> {
        let mut scored: Vec<ScoredCandidate> = self
            .store
            .all()
            .iter()
            .filter(|record| record.matches_criteria(criteria))
            .map(|record| ScoredCandidate {
                record: record.clone(),
                similarity: draw_similarity(self.threshold, rng),
            })
            .collect();

        // Stable sort keeps store order on ties
        scored.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        scored
    }
}

/// Uniform draw in `[threshold, 95)`, truncated to one decimal place
pub fn draw_similarity<R: Rng + ?Sized>(threshold: f64, rng: &mut R) -> f64 {
    if threshold >= MAX_SIMILARITY {
        return threshold;
    }
    let raw = rng.gen_range(threshold..MAX_SIMILARITY);
    let truncated = (raw * 10.0).floor() / 10.0;
    truncated.max(threshold)
}
