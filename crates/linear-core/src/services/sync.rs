//! Label synchronization: derive a label mutation per issue, dispatch them concurrently under a
//! bounded number of permits, and gather per-issue outcomes in input order.
//!
//! A sync is fetch-all-or-nothing and mutate-best-effort: enumeration failures abort the run,
//! while a failed mutation is recorded against its issue and never stops its siblings.

use std::collections::HashSet;
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use super::issues::{FetchError, IssueService, IssueTracker};
use crate::config::{SyncSettings, DEFAULT_MAX_IN_FLIGHT};
use crate::graphql::{GraphqlError, Issue};

/// Decides which labels a given issue should carry.
pub trait LabelPolicy: Send + Sync {
    fn labels_for(&self, issue: &Issue) -> Vec<String>;
}

/// Labels every issue with its own identifier.
#[derive(Debug, Clone, Copy, Default)]
pub struct SelfLabel;

impl LabelPolicy for SelfLabel {
    fn labels_for(&self, issue: &Issue) -> Vec<String> {
        vec![issue.id.clone()]
    }
}

/// Applies the same fixed set of labels to every issue.
#[derive(Debug, Clone, Default)]
pub struct StaticLabels(pub Vec<String>);

impl LabelPolicy for StaticLabels {
    fn labels_for(&self, _issue: &Issue) -> Vec<String> {
        self.0.clone()
    }
}

impl<F> LabelPolicy for F
where
    F: Fn(&Issue) -> Vec<String> + Send + Sync,
{
    fn labels_for(&self, issue: &Issue) -> Vec<String> {
        self(issue)
    }
}

/// Labels to add to a single issue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelMutationRequest {
    pub issue_id: String,
    pub label_ids: Vec<String>,
}

/// A single issue's label update failed.
#[derive(Debug, Error)]
#[error("failed to add labels to issue {issue_id}: {source}")]
pub struct MutationError {
    pub issue_id: String,
    #[source]
    pub source: GraphqlError,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    Success,
    Failure,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncOutcome {
    pub issue_id: String,
    pub status: SyncStatus,
    pub label_ids: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<String>,
}

impl SyncOutcome {
    fn success(request: LabelMutationRequest) -> Self {
        Self {
            issue_id: request.issue_id,
            status: SyncStatus::Success,
            label_ids: request.label_ids,
            error_detail: None,
        }
    }

    fn failure(request: LabelMutationRequest, detail: String) -> Self {
        Self {
            issue_id: request.issue_id,
            status: SyncStatus::Failure,
            label_ids: request.label_ids,
            error_detail: Some(detail),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == SyncStatus::Success
    }
}

/// Per-issue outcomes, one per input issue, in input order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct SyncResult {
    pub outcomes: Vec<SyncOutcome>,
}

impl SyncResult {
    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.len() - self.succeeded()
    }
}

/// Applies a label policy to a batch of issues.
#[derive(Clone)]
pub struct LabelSynchronizer {
    tracker: Arc<dyn IssueTracker>,
    policy: Arc<dyn LabelPolicy>,
    max_in_flight: usize,
}

impl LabelSynchronizer {
    pub fn new(tracker: Arc<dyn IssueTracker>) -> Self {
        Self {
            tracker,
            policy: Arc::new(SelfLabel),
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
        }
    }

    pub fn with_policy(mut self, policy: impl LabelPolicy + 'static) -> Self {
        self.policy = Arc::new(policy);
        self
    }

    pub fn with_max_in_flight(mut self, max_in_flight: usize) -> Self {
        self.max_in_flight = max_in_flight.max(1);
        self
    }

    pub fn mutation_for(&self, issue: &Issue) -> LabelMutationRequest {
        LabelMutationRequest {
            issue_id: issue.id.clone(),
            label_ids: dedupe(self.policy.labels_for(issue)),
        }
    }

    /// Dispatch one mutation per issue and wait for all of them to settle.
    ///
    /// Mutations run on spawned tasks so that dropping the returned future does not cancel
    /// updates already sent to the tracker.
    pub async fn synchronize(&self, issues: &[Issue]) -> SyncResult {
        if issues.is_empty() {
            return SyncResult::default();
        }

        let semaphore = Arc::new(Semaphore::new(self.max_in_flight));
        let handles: Vec<_> = issues
            .iter()
            .map(|issue| {
                let request = self.mutation_for(issue);
                let handle = tokio::spawn(apply_mutation(
                    Arc::clone(&self.tracker),
                    Arc::clone(&semaphore),
                    request.clone(),
                ));
                (request, handle)
            })
            .collect();

        let mut outcomes = Vec::with_capacity(handles.len());
        for (request, handle) in handles {
            let outcome = match handle.await {
                Ok(outcome) => outcome,
                Err(err) => {
                    warn!(issue_id = %request.issue_id, error = %err, "label mutation task panicked");
                    SyncOutcome::failure(request, format!("mutation task failed: {err}"))
                }
            };
            outcomes.push(outcome);
        }

        let result = SyncResult { outcomes };
        info!(
            total = result.len(),
            succeeded = result.succeeded(),
            failed = result.failed(),
            "label synchronization finished"
        );
        result
    }
}

async fn apply_mutation(
    tracker: Arc<dyn IssueTracker>,
    semaphore: Arc<Semaphore>,
    request: LabelMutationRequest,
) -> SyncOutcome {
    if request.label_ids.is_empty() {
        debug!(issue_id = %request.issue_id, "policy produced no labels; skipping");
        return SyncOutcome::success(request);
    }

    let _permit = match semaphore.acquire_owned().await {
        Ok(permit) => permit,
        Err(_) => {
            return SyncOutcome::failure(request, "semaphore closed unexpectedly".to_string())
        }
    };

    match tracker
        .add_issue_labels(&request.issue_id, &request.label_ids)
        .await
    {
        Ok(_) => {
            debug!(issue_id = %request.issue_id, labels = ?request.label_ids, "labels added");
            SyncOutcome::success(request)
        }
        Err(source) => {
            let err = MutationError {
                issue_id: request.issue_id.clone(),
                source,
            };
            warn!(error = %err, "label mutation failed");
            SyncOutcome::failure(request, err.to_string())
        }
    }
}

fn dedupe(label_ids: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    label_ids
        .into_iter()
        .filter(|id| seen.insert(id.clone()))
        .collect()
}

/// Errors that abort a sync before any mutation is dispatched.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
}

/// Everything a sync produced: the issues as fetched and the per-issue outcomes.
#[derive(Debug, Clone)]
pub struct SyncReport {
    pub issues: Vec<Issue>,
    pub result: SyncResult,
}

/// Fetch-then-mutate-all over a shared tracker.
#[derive(Clone)]
pub struct IssueSyncService {
    issues: IssueService,
    synchronizer: LabelSynchronizer,
}

impl IssueSyncService {
    pub fn new(issues: IssueService, synchronizer: LabelSynchronizer) -> Self {
        Self {
            issues,
            synchronizer,
        }
    }

    /// Wire the fetcher and synchronizer from settings. An empty label list selects [`SelfLabel`].
    pub fn from_settings(tracker: Arc<dyn IssueTracker>, settings: &SyncSettings) -> Self {
        let issues = IssueService::new(Arc::clone(&tracker)).with_page_size(settings.page_size);
        let synchronizer =
            LabelSynchronizer::new(tracker).with_max_in_flight(settings.max_in_flight);
        let synchronizer = if settings.label_ids.is_empty() {
            synchronizer.with_policy(SelfLabel)
        } else {
            synchronizer.with_policy(StaticLabels(settings.label_ids.clone()))
        };
        Self::new(issues, synchronizer)
    }

    pub async fn run(&self) -> Result<SyncReport, SyncError> {
        let issues = self.issues.fetch_all().await?;
        info!(count = issues.len(), "fetched issues for synchronization");
        let result = self.synchronizer.synchronize(&issues).await;
        Ok(SyncReport { issues, result })
    }
}
