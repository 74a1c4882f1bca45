//! Placement orchestrator — the request entry point.
//!
//! Each request walks `Received → CandidatesResolved → Scoring → Ranked →
//! Validated → Dispatched`, or leaves early with a [`PlacementError`] that
//! becomes the result message.
//!
//! Scoring fans out one task per candidate. Tasks push into a bounded
//! channel with `try_send`; a single collector takes results until it has
//! as many as it expects or the deadline fires, whichever comes first.
//! Tasks still running after that finish on their own and their sends fail
//! silently.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use edgemesh_registry::{DeviceRegistry, PeerClient};
use edgemesh_scoring::{INVALID_SCORE, ResourceSample, ScoringEngine};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::candidate::{ExecutionCandidate, resolve};
use crate::error::{PlacementError, PlacementErrorResult};
use crate::executor::{ExecutionRequest, Executor};
use crate::request::{PlacementResult, ResultMessage, ScoringMode, ServiceRequest};
use crate::validator::ServiceValidator;

/// How long the collector waits for candidate scores.
pub const DEFAULT_DEADLINE: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrchestratorConfig {
    pub deadline: Duration,
    /// Used when a request does not say whether this device may be chosen.
    pub self_selection: bool,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            deadline: DEFAULT_DEADLINE,
            self_selection: true,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Stage {
    Received,
    CandidatesResolved,
    Scoring,
    Ranked,
    Validated,
    Dispatched,
}

impl Stage {
    fn as_str(self) -> &'static str {
        match self {
            Self::Received => "received",
            Self::CandidatesResolved => "candidates_resolved",
            Self::Scoring => "scoring",
            Self::Ranked => "ranked",
            Self::Validated => "validated",
            Self::Dispatched => "dispatched",
        }
    }
}

fn enter(stage: Stage, service: &str) {
    debug!(service = %service, stage = stage.as_str(), "placement stage");
}

/// Score of the candidate at `index` in the resolved list.
#[derive(Debug, Clone, Copy)]
struct Scored {
    index: usize,
    score: f64,
}

/// How one candidate gets its score.
enum ScoreSource {
    /// Nothing to talk to.
    NoEndpoint,
    /// This device, scored by the local engine.
    Local,
    Remote(String),
}

impl ScoreSource {
    async fn score(
        self,
        self_id: &str,
        mode: ScoringMode,
        engine: &ScoringEngine,
        peers: &dyn PeerClient,
    ) -> f64 {
        let endpoint = match self {
            Self::NoEndpoint => return 0.0,
            Self::Local => return engine.score_of(self_id),
            Self::Remote(endpoint) => endpoint,
        };

        let result = match mode {
            ScoringMode::Score => peers.get_score(self_id, &endpoint).await,
            ScoringMode::Resource => peers
                .get_resource(self_id, &endpoint)
                .await
                .map(|sample| engine.score_from_resources(&sample)),
        };
        match result {
            Ok(score) if score.is_nan() => INVALID_SCORE,
            Ok(score) => score,
            Err(e) => {
                let e = PlacementError::from(e);
                warn!(%endpoint, error = %e, "candidate scoring failed, counting as zero");
                0.0
            }
        }
    }
}

/// Places service requests on the best device of the fleet.
pub struct Orchestrator {
    registry: Arc<DeviceRegistry>,
    engine: Arc<ScoringEngine>,
    peers: Arc<dyn PeerClient>,
    executor: Arc<dyn Executor>,
    validator: ServiceValidator,
    config: OrchestratorConfig,
    started: AtomicBool,
}

impl Orchestrator {
    pub fn new(
        registry: Arc<DeviceRegistry>,
        engine: Arc<ScoringEngine>,
        peers: Arc<dyn PeerClient>,
        executor: Arc<dyn Executor>,
        validator: ServiceValidator,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            registry,
            engine,
            peers,
            executor,
            validator,
            config,
            started: AtomicBool::new(false),
        }
    }

    pub fn validator(&self) -> &ServiceValidator {
        &self.validator
    }

    /// Accept requests from now on. Requires a started registry.
    pub fn start(&self) -> PlacementErrorResult<()> {
        let self_id = self.registry.self_id()?;
        self.started.store(true, Ordering::Release);
        info!(
            device_id = %self_id,
            deadline_ms = self.config.deadline.as_millis() as u64,
            self_selection = self.config.self_selection,
            "placement engine started"
        );
        Ok(())
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::Acquire)
    }

    /// Place a request. Never fails: errors are reported in the result.
    pub async fn request_service(&self, request: ServiceRequest) -> PlacementResult {
        match self.place(&request).await {
            Ok(result) => {
                info!(
                    service = %result.service_name,
                    target = %result.target,
                    execution_type = ?result.execution_type,
                    "service placed"
                );
                result
            }
            Err(e) => {
                warn!(service = %request.service_name, error = %e, "placement failed");
                PlacementResult::failed(e.message(), request.service_name)
            }
        }
    }

    /// Score of this device for a request coming from `requester_id`.
    pub fn score_for_peer(&self, requester_id: &str) -> PlacementErrorResult<f64> {
        self.ensure_started()?;
        Ok(self.engine.score_of(requester_id))
    }

    /// Raw resources of this device for a requester that scores them itself.
    pub fn resources_for_peer(&self, requester_id: &str) -> PlacementErrorResult<ResourceSample> {
        self.ensure_started()?;
        self.engine
            .sample(requester_id)
            .map_err(|e| PlacementError::Internal(e.to_string()))
    }

    fn ensure_started(&self) -> PlacementErrorResult<()> {
        if self.is_started() { Ok(()) } else { Err(PlacementError::NotStarted) }
    }

    async fn place(&self, request: &ServiceRequest) -> PlacementErrorResult<PlacementResult> {
        self.ensure_started()?;
        let service = request.service_name.as_str();
        enter(Stage::Received, service);
        request.validate()?;

        let candidates = resolve(&self.registry, service, &request.accepted_types())?;
        enter(Stage::CandidatesResolved, service);

        let self_id = self.registry.self_id()?;
        let self_endpoints = self.registry.self_record()?.endpoints;
        let self_selection = request.self_selection.unwrap_or(self.config.self_selection);

        enter(Stage::Scoring, service);
        let ranked = self
            .rank(
                &candidates,
                &self_id,
                &self_endpoints,
                self_selection,
                request.scoring_mode(),
            )
            .await;
        debug!(
            service = %service,
            ranking = ?ranked
                .iter()
                .map(|s| (candidates[s.index].id.as_str(), s.score))
                .collect::<Vec<_>>(),
            "candidates ranked"
        );
        enter(Stage::Ranked, service);

        let winner = match ranked.first() {
            Some(top) if top.score != INVALID_SCORE => &candidates[top.index],
            _ => return Err(PlacementError::NotFound(service.to_string())),
        };
        let local_endpoint = winner.local_endpoint(&self_endpoints).cloned();
        let Some(target) = local_endpoint.clone().or_else(|| winner.endpoints.first().cloned())
        else {
            warn!(service = %service, device_id = %winner.id, "winner has no endpoint");
            return Err(PlacementError::NotFound(service.to_string()));
        };
        let info = request.info_for(winner.execution_type).ok_or_else(|| {
            PlacementError::Internal(format!("no command for {}", winner.execution_type))
        })?;
        let args = info.argv();

        if local_endpoint.is_some() && !winner.execution_type.is_fungible() {
            self.validator
                .validate(service, &args, &request.service_requester)?;
        }
        enter(Stage::Validated, service);

        self.dispatch(&target, service, &request.service_requester, args)
            .await?;
        enter(Stage::Dispatched, service);

        Ok(PlacementResult {
            message: ResultMessage::ErrorNone,
            service_name: service.to_string(),
            execution_type: Some(winner.execution_type),
            target,
        })
    }

    /// Score candidates concurrently; returns them best first.
    ///
    /// Ties keep registry order. A local candidate is skipped outright when
    /// self-selection is off, so it is never waited for.
    ///
    /// The collector waits for one result per spawned scoring task. That count drops
    /// by one only when a local candidate was actually skipped; if this device
    /// is not among the candidates, every candidate is still awaited even with
    /// self-selection off.
    async fn rank(
        &self,
        candidates: &[ExecutionCandidate],
        self_id: &str,
        self_endpoints: &[String],
        self_selection: bool,
        mode: ScoringMode,
    ) -> Vec<Scored> {
        let (tx, rx) = mpsc::channel(candidates.len().max(1));
        let mut expected = 0;

        for (index, candidate) in candidates.iter().enumerate() {
            let source = if candidate.endpoints.is_empty() {
                ScoreSource::NoEndpoint
            } else if candidate.is_local(self_endpoints) {
                if !self_selection {
                    debug!(device_id = %candidate.id, "self-selection disabled, skipping local candidate");
                    continue;
                }
                ScoreSource::Local
            } else {
                ScoreSource::Remote(candidate.endpoints[0].clone())
            };
            expected += 1;

            let tx = tx.clone();
            let engine = Arc::clone(&self.engine);
            let peers = Arc::clone(&self.peers);
            let self_id = self_id.to_string();
            let device_id = candidate.id.clone();
            tokio::spawn(async move {
                let score = source.score(&self_id, mode, &engine, peers.as_ref()).await;
                debug!(%device_id, score, "candidate scored");
                if tx.try_send(Scored { index, score }).is_err() {
                    debug!(%device_id, "score arrived after collection ended");
                }
            });
        }
        drop(tx);

        let mut results = collect(rx, expected, self.config.deadline).await;
        results.sort_by_key(|s| s.index);
        results.sort_by(|a, b| b.score.total_cmp(&a.score));
        results
    }

    async fn dispatch(
        &self,
        endpoint: &str,
        service: &str,
        requester: &str,
        args: Vec<String>,
    ) -> PlacementErrorResult<()> {
        let (notify, mut status) = mpsc::channel(1);

        let listener_service = service.to_string();
        let listener_endpoint = endpoint.to_string();
        tokio::spawn(async move {
            match status.recv().await {
                Some(status) => info!(
                    service = %listener_service,
                    endpoint = %listener_endpoint,
                    ?status,
                    "execution status"
                ),
                None => debug!(
                    service = %listener_service,
                    "executor closed status channel without reporting"
                ),
            }
        });

        self.executor
            .execute(ExecutionRequest {
                endpoint: endpoint.to_string(),
                service_name: service.to_string(),
                requester: requester.to_string(),
                args,
                notify,
            })
            .await?;
        Ok(())
    }
}

/// Drain `rx` until `expected` results arrive, the senders are gone, or the
/// deadline passes.
async fn collect(mut rx: mpsc::Receiver<Scored>, expected: usize, deadline: Duration) -> Vec<Scored> {
    let mut results = Vec::with_capacity(expected);
    let timer = tokio::time::sleep(deadline);
    tokio::pin!(timer);

    while results.len() < expected {
        tokio::select! {
            received = rx.recv() => match received {
                Some(scored) => results.push(scored),
                None => break,
            },
            () = &mut timer => {
                warn!(received = results.len(), expected, "scoring deadline elapsed");
                break;
            }
        }
    }
    results
}
