use crate::core::controller::{Effect, FlowError, FlowEvent, FlowSession};
use crate::core::{Matcher, RegistrationOracle, SessionBuilder};
use crate::models::{FlowView, MatchResult, SelectionCriteria, UploadedImage};
use crate::services::artifacts::{build_artifacts, emit_all, Artifact, ArtifactError, ArtifactSink};
use crate::services::SimulatedLatency;
use moka::notification::RemovalCause;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Flow {0} not found")]
    FlowNotFound(Uuid),

    #[error(transparent)]
    Flow(#[from] FlowError),

    #[error("Artifact error: {0}")]
    Artifact(#[from] ArtifactError),
}

/// Tunables for the flow service
#[derive(Debug, Clone)]
pub struct FlowServiceOptions {
    pub max_flows: u64,
    pub idle_ttl: Duration,
    pub match_run_timeout: Duration,
    pub payment_latency: SimulatedLatency,
    pub seed: Option<u64>,
    /// Also receives every download
    pub sink: Option<Arc<dyn ArtifactSink>>,
}

impl Default for FlowServiceOptions {
    fn default() -> Self {
        Self {
            max_flows: 10_000,
            idle_ttl: Duration::from_secs(1800),
            match_run_timeout: Duration::from_secs(30),
            payment_latency: SimulatedLatency::none(),
            seed: None,
            sink: None,
        }
    }
}

struct RunHandle {
    run_id: u64,
    token: CancellationToken,
}

struct FlowState {
    session: FlowSession,
    run: Option<RunHandle>,
}

/// One user's flow. `shutdown` parents every match run token so dropping the
/// flow stops its work without taking the state lock.
struct FlowHandle {
    state: Mutex<FlowState>,
    shutdown: CancellationToken,
}

struct Inner {
    flows: moka::future::Cache<Uuid, Arc<FlowHandle>>,
    matcher: Matcher,
    oracle: RegistrationOracle,
    sessions: SessionBuilder,
    rng: Mutex<StdRng>,
    options: FlowServiceOptions,
}

/// Owns in-memory flows and performs the effects the step controller asks for
#[derive(Clone)]
pub struct FlowService {
    inner: Arc<Inner>,
}

impl FlowService {
    pub fn new(
        matcher: Matcher,
        oracle: RegistrationOracle,
        sessions: SessionBuilder,
        options: FlowServiceOptions,
    ) -> Self {
        let flows = moka::future::Cache::builder()
            .max_capacity(options.max_flows)
            .time_to_idle(options.idle_ttl)
            .eviction_listener(|id: Arc<Uuid>, flow: Arc<FlowHandle>, cause: RemovalCause| {
                tracing::debug!("Flow {} removed ({:?})", id, cause);
                flow.shutdown.cancel();
            })
            .build();

        let rng = match options.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Self {
            inner: Arc::new(Inner {
                flows,
                matcher,
                oracle,
                sessions,
                rng: Mutex::new(rng),
                options,
            }),
        }
    }

    pub fn matcher(&self) -> &Matcher {
        &self.inner.matcher
    }

    pub fn sessions(&self) -> &SessionBuilder {
        &self.inner.sessions
    }

    pub fn active_flows(&self) -> u64 {
        self.inner.flows.entry_count()
    }

    /// Start a new flow in the Selection step
    pub async fn create(&self) -> FlowView {
        let id = Uuid::new_v4();
        let session = FlowSession::new();
        let view = FlowView::from_session(id, &session);

        let handle = Arc::new(FlowHandle {
            state: Mutex::new(FlowState { session, run: None }),
            shutdown: CancellationToken::new(),
        });
        self.inner.flows.insert(id, handle).await;

        tracing::info!("Created flow {}", id);
        view
    }

    pub async fn view(&self, id: Uuid) -> Result<FlowView, ServiceError> {
        let handle = self.handle(id).await?;
        let state = handle.state.lock().await;
        Ok(FlowView::from_session(id, &state.session))
    }

    /// Raw session state, mostly for diagnostics and tests
    pub async fn session(&self, id: Uuid) -> Result<FlowSession, ServiceError> {
        let handle = self.handle(id).await?;
        let state = handle.state.lock().await;
        Ok(state.session.clone())
    }

    /// Drop a flow and cancel anything it has in flight
    pub async fn remove(&self, id: Uuid) -> Result<(), ServiceError> {
        let handle = self
            .inner
            .flows
            .remove(&id)
            .await
            .ok_or(ServiceError::FlowNotFound(id))?;
        handle.shutdown.cancel();
        tracing::info!("Removed flow {}", id);
        Ok(())
    }

    /// Apply an event and run the resulting effects
    pub async fn dispatch(&self, id: Uuid, event: FlowEvent) -> Result<FlowView, ServiceError> {
        let handle = self.handle(id).await?;
        let mut state = handle.state.lock().await;
        self.apply_locked(id, &handle, &mut state, event).await?;
        Ok(FlowView::from_session(id, &state.session))
    }

    /// Confirm the simulated PIX payment after the configured delay
    pub async fn confirm_payment(&self, id: Uuid) -> Result<FlowView, ServiceError> {
        // Reject confirmations the flow cannot accept before waiting
        {
            let handle = self.handle(id).await?;
            let state = handle.state.lock().await;
            let check = FlowEvent::PaymentConfirmed {
                at: chrono::Utc::now(),
            };
            if let Err(e) = state.session.apply(check) {
                tracing::warn!("Flow {} rejected payment confirmation: {}", id, e);
                return Err(e.into());
            }
        }
        self.inner.options.payment_latency.wait().await;

        let event = FlowEvent::PaymentConfirmed {
            at: chrono::Utc::now(),
        };
        self.dispatch(id, event).await
    }

    /// Build the purchase artifacts and hand them to the configured sink
    pub async fn download(&self, id: Uuid) -> Result<Vec<Artifact>, ServiceError> {
        let handle = self.handle(id).await?;
        let state = handle.state.lock().await;
        let artifacts = build_artifacts(&state.session, chrono::Utc::now())?;
        drop(state);

        if let Some(sink) = &self.inner.options.sink {
            emit_all(sink.as_ref(), &artifacts)?;
        }

        tracing::info!("Prepared {} artifacts for flow {}", artifacts.len(), id);
        Ok(artifacts)
    }

    async fn handle(&self, id: Uuid) -> Result<Arc<FlowHandle>, ServiceError> {
        self.inner
            .flows
            .get(&id)
            .await
            .ok_or(ServiceError::FlowNotFound(id))
    }

    async fn apply_locked(
        &self,
        id: Uuid,
        handle: &FlowHandle,
        state: &mut FlowState,
        event: FlowEvent,
    ) -> Result<(), FlowError> {
        let event_name = event.name();
        let (next, effects) = match state.session.apply(event) {
            Ok(transition) => transition,
            Err(e) => {
                tracing::warn!("Flow {} rejected {}: {}", id, event_name, e);
                return Err(e);
            }
        };

        if next.step != state.session.step {
            tracing::debug!(
                "Flow {}: {} -> {} on {}",
                id,
                state.session.step,
                next.step,
                event_name
            );
        }
        state.session = next;

        for effect in effects {
            match effect {
                Effect::StartMatchRun {
                    run_id,
                    criteria,
                    image,
                } => {
                    if let Some(previous) = state.run.take() {
                        previous.token.cancel();
                    }
                    let token = handle.shutdown.child_token();
                    state.run = Some(RunHandle {
                        run_id,
                        token: token.clone(),
                    });
                    let seed: u64 = self.inner.rng.lock().await.gen();
                    self.spawn_match_run(id, run_id, criteria, image, token, seed);
                }
                Effect::CancelMatchRun { run_id } => {
                    if let Some(run) = state.run.take() {
                        if run.run_id == run_id {
                            run.token.cancel();
                            tracing::info!("Cancelled match run {} of flow {}", run_id, id);
                        }
                    }
                }
                Effect::IssuePayment { selected } => {
                    let payment = {
                        let mut rng = self.inner.rng.lock().await;
                        self.inner
                            .sessions
                            .build_session(&selected, chrono::Utc::now(), &mut *rng)
                    };
                    tracing::info!(
                        "Issued order {} for match {} in flow {}",
                        payment.order_id,
                        selected.id(),
                        id
                    );
                    let (next, _) = state.session.apply(FlowEvent::PaymentIssued(payment))?;
                    state.session = next;
                }
            }
        }

        Ok(())
    }

    fn spawn_match_run(
        &self,
        id: Uuid,
        run_id: u64,
        criteria: SelectionCriteria,
        image: UploadedImage,
        token: CancellationToken,
        seed: u64,
    ) {
        let service = self.clone();
        let timeout = self.inner.options.match_run_timeout;

        tokio::spawn(async move {
            let mut rng = StdRng::seed_from_u64(seed);
            let run = service.run_match(&criteria, &image, &mut rng);

            let event = tokio::select! {
                _ = token.cancelled() => {
                    tracing::debug!("Match run {} of flow {} stopped", run_id, id);
                    return;
                }
                outcome = tokio::time::timeout(timeout, run) => match outcome {
                    Ok(matches) => {
                        tracing::info!(
                            "Match run {} of flow {} found {} candidates",
                            run_id,
                            id,
                            matches.len()
                        );
                        FlowEvent::MatchesResolved { run_id, matches }
                    }
                    Err(_) => {
                        tracing::error!("Match run {} of flow {} timed out after {:?}", run_id, id, timeout);
                        FlowEvent::MatchRunFailed {
                            run_id,
                            reason: "Facial comparison timed out, please try again".to_string(),
                        }
                    }
                },
            };

            service.complete_run(id, run_id, event).await;
        });
    }

    /// Matcher followed by the registration oracle
    async fn run_match(
        &self,
        criteria: &SelectionCriteria,
        image: &UploadedImage,
        rng: &mut StdRng,
    ) -> Vec<MatchResult> {
        let scored = self.inner.matcher.find_matches(criteria, image, rng).await;
        self.inner.oracle.annotate(scored).await
    }

    async fn complete_run(&self, id: Uuid, run_id: u64, event: FlowEvent) {
        let Ok(handle) = self.handle(id).await else {
            tracing::debug!("Flow {} gone before match run {} finished", id, run_id);
            return;
        };
        let mut state = handle.state.lock().await;
        if state.run.as_ref().map(|r| r.run_id) == Some(run_id) {
            state.run = None;
        }
        if let Err(e) = self.apply_locked(id, &handle, &mut state, event).await {
            tracing::error!("Failed to record match run {} of flow {}: {}", run_id, id, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::controller::Step;
    use crate::core::records::RecordStore;
    use crate::models::{Category, Gender, Platform, Pricing};
    use crate::services::artifacts::MemorySink;

    fn service_with(match_latency: SimulatedLatency, options: FlowServiceOptions) -> FlowService {
        let store = Arc::new(RecordStore::builtin());
        FlowService::new(
            Matcher::new(store.clone(), 75.0, match_latency),
            RegistrationOracle::new(store, SimulatedLatency::none()),
            SessionBuilder::new(Pricing::default(), "FACIAL MATCH SYSTEM", "SAO PAULO"),
            options,
        )
    }

    fn service() -> FlowService {
        service_with(
            SimulatedLatency::none(),
            FlowServiceOptions {
                seed: Some(5),
                ..FlowServiceOptions::default()
            },
        )
    }

    async fn wait_until_settled(service: &FlowService, id: Uuid) -> FlowView {
        for _ in 0..200 {
            let view = service.view(id).await.unwrap();
            if view.step != Step::Processing {
                return view;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("flow {} never left processing", id);
    }

    async fn submit(service: &FlowService, platform: Platform, category: Category, gender: Gender) -> Uuid {
        let id = service.create().await.flow_id;
        service.dispatch(id, FlowEvent::SetPlatform(platform)).await.unwrap();
        service.dispatch(id, FlowEvent::SetCategory(category)).await.unwrap();
        service.dispatch(id, FlowEvent::SetGender(gender)).await.unwrap();
        service.dispatch(id, FlowEvent::Advance).await.unwrap();
        let image = UploadedImage::new("face.jpg", "image/jpeg", vec![0xFF, 0xD8]);
        service.dispatch(id, FlowEvent::AttachFile(image)).await.unwrap();
        let view = service.dispatch(id, FlowEvent::Submit).await.unwrap();
        assert_eq!(view.step, Step::Processing);
        id
    }

    #[tokio::test]
    async fn test_full_purchase_flow() {
        let sink = Arc::new(MemorySink::new());
        let service = service_with(
            SimulatedLatency::none(),
            FlowServiceOptions {
                seed: Some(5),
                sink: Some(sink.clone() as Arc<dyn ArtifactSink>),
                ..FlowServiceOptions::default()
            },
        );
        let shared = service.clone();
        let id = submit(&service, Platform::NinetyNinePop, Category::Carro, Gender::Masculino).await;

        let results = wait_until_settled(&service, id).await;
        assert_eq!(results.step, Step::Results);
        assert_eq!(results.matches.len(), 1);
        assert_eq!(results.matches[0].masked_name, "João S**** S*****");

        let payment = service
            .dispatch(id, FlowEvent::PickMatch { match_id: "1".to_string() })
            .await
            .unwrap();
        assert_eq!(payment.step, Step::Payment);
        let issued = payment.payment.unwrap();
        assert_eq!(issued.amount, "40.00");
        assert_eq!(issued.expires_at - issued.created_at, chrono::Duration::minutes(15));

        let done = service.confirm_payment(id).await.unwrap();
        assert_eq!(done.step, Step::Download);

        let artifacts = shared.download(id).await.unwrap();
        assert_eq!(artifacts.len(), 2);
        assert_eq!(sink.files().len(), 2);

        let reset = service.dispatch(id, FlowEvent::Reset).await.unwrap();
        assert_eq!(reset.step, Step::Selection);
        assert!(reset.payment.is_none());
    }

    #[tokio::test]
    async fn test_registered_match_flagged_in_results() {
        let service = service();
        let id = submit(&service, Platform::Abas, Category::Moto, Gender::Masculino).await;

        let results = wait_until_settled(&service, id).await;
        assert_eq!(results.matches.len(), 1);
        assert!(results.matches[0].has_registration);
        assert!(!results.matches[0].selectable);

        let err = service
            .dispatch(id, FlowEvent::PickMatch { match_id: "3".to_string() })
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Flow(FlowError::MatchAlreadyRegistered(_))));
    }

    #[tokio::test]
    async fn test_empty_results_and_retry() {
        let service = service();
        let id = submit(&service, Platform::Abas, Category::Carro, Gender::Feminino).await;

        let results = wait_until_settled(&service, id).await;
        assert_eq!(results.step, Step::Results);
        assert!(results.matches.is_empty());

        let retried = service.dispatch(id, FlowEvent::Retry).await.unwrap();
        assert_eq!(retried.step, Step::Selection);
    }

    #[tokio::test]
    async fn test_cancel_stops_match_run() {
        let service = service_with(
            SimulatedLatency::from_millis(200),
            FlowServiceOptions {
                seed: Some(1),
                ..FlowServiceOptions::default()
            },
        );
        let id = submit(&service, Platform::Uber, Category::Carro, Gender::Masculino).await;

        let cancelled = service.dispatch(id, FlowEvent::Cancel).await.unwrap();
        assert_eq!(cancelled.step, Step::Upload);

        tokio::time::sleep(Duration::from_millis(300)).await;
        let after = service.view(id).await.unwrap();
        assert_eq!(after.step, Step::Upload);
        assert!(after.matches.is_empty());
    }

    #[tokio::test]
    async fn test_timeout_returns_to_upload() {
        let service = service_with(
            SimulatedLatency::from_millis(200),
            FlowServiceOptions {
                match_run_timeout: Duration::from_millis(10),
                seed: Some(1),
                ..FlowServiceOptions::default()
            },
        );
        let id = submit(&service, Platform::Uber, Category::Carro, Gender::Masculino).await;

        let settled = wait_until_settled(&service, id).await;
        assert_eq!(settled.step, Step::Upload);
        assert!(settled.last_error.is_some());
        assert!(settled.upload.is_some());
    }

    #[tokio::test]
    async fn test_confirm_in_wrong_step_fails_without_waiting() {
        let service = service_with(
            SimulatedLatency::none(),
            FlowServiceOptions {
                payment_latency: SimulatedLatency::from_millis(5_000),
                seed: Some(2),
                ..FlowServiceOptions::default()
            },
        );
        let id = service.create().await.flow_id;

        let outcome = tokio::time::timeout(Duration::from_millis(500), service.confirm_payment(id))
            .await
            .expect("confirmation should fail before the payment delay");
        assert!(matches!(
            outcome,
            Err(ServiceError::Flow(FlowError::InvalidTransition { step: Step::Selection, .. }))
        ));
        assert_eq!(service.view(id).await.unwrap().step, Step::Selection);
    }

    #[tokio::test]
    async fn test_unknown_flow() {
        let service = service();
        let missing = Uuid::new_v4();
        assert!(matches!(
            service.view(missing).await,
            Err(ServiceError::FlowNotFound(id)) if id == missing
        ));
        assert!(service.confirm_payment(missing).await.is_err());
    }

    #[tokio::test]
    async fn test_remove_flow() {
        let service = service();
        let id = service.create().await.flow_id;

        service.remove(id).await.unwrap();

        assert!(service.view(id).await.is_err());
        assert!(service.remove(id).await.is_err());
    }
}
