//! In-memory tracker used by the service tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use reqwest::StatusCode;

use super::issues::IssueTracker;
use crate::graphql::{GraphqlError, GraphqlResult, Issue, IssueLabelUpdate, IssuePage};

pub(crate) fn issue(id: &str) -> Issue {
    let timestamp = Utc.with_ymd_and_hms(2024, 7, 1, 12, 0, 0).unwrap();
    Issue {
        id: id.to_string(),
        identifier: format!("ENG-{id}"),
        title: format!("Issue {id}"),
        url: None,
        label_ids: Vec::new(),
        created_at: timestamp,
        updated_at: timestamp,
    }
}

fn injected(body: &str) -> GraphqlError {
    GraphqlError::HttpStatus {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        body: body.to_string(),
    }
}

pub(crate) struct FakeTracker {
    pages: Vec<IssuePage>,
    failing_page: Option<usize>,
    failing_issues: HashSet<String>,
    panicking_issues: HashSet<String>,
    delays: HashMap<String, Duration>,
    labels: Mutex<HashMap<String, Vec<String>>>,
    completions: Mutex<Vec<String>>,
    page_calls: AtomicUsize,
    mutation_calls: AtomicUsize,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl FakeTracker {
    /// Serve `issues` in pages of `page_size`, linked by `cursor-N` cursors.
    pub(crate) fn paged(issues: Vec<Issue>, page_size: usize) -> Self {
        let chunks: Vec<Vec<Issue>> = if issues.is_empty() {
            vec![Vec::new()]
        } else {
            issues.chunks(page_size).map(<[Issue]>::to_vec).collect()
        };
        let last = chunks.len() - 1;
        let pages = chunks
            .into_iter()
            .enumerate()
            .map(|(index, issues)| IssuePage {
                issues,
                end_cursor: Some(format!("cursor-{}", index + 1)),
                has_next_page: index < last,
            })
            .collect();
        Self::scripted(pages)
    }

    /// Serve the given pages one after another regardless of the cursor sent.
    pub(crate) fn scripted(pages: Vec<IssuePage>) -> Self {
        let labels = pages
            .iter()
            .flat_map(|page| page.issues.iter())
            .map(|issue| (issue.id.clone(), issue.label_ids.clone()))
            .collect();
        Self {
            pages,
            failing_page: None,
            failing_issues: HashSet::new(),
            panicking_issues: HashSet::new(),
            delays: HashMap::new(),
            labels: Mutex::new(labels),
            completions: Mutex::new(Vec::new()),
            page_calls: AtomicUsize::new(0),
            mutation_calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
        }
    }

    /// Fail the request for the given 1-based page.
    pub(crate) fn fail_page(mut self, page: usize) -> Self {
        self.failing_page = Some(page);
        self
    }

    pub(crate) fn fail_mutation(mut self, issue_id: &str) -> Self {
        self.failing_issues.insert(issue_id.to_string());
        self
    }

    pub(crate) fn panic_mutation(mut self, issue_id: &str) -> Self {
        self.panicking_issues.insert(issue_id.to_string());
        self
    }

    pub(crate) fn delay_mutation(mut self, issue_id: &str, millis: u64) -> Self {
        self.delays
            .insert(issue_id.to_string(), Duration::from_millis(millis));
        self
    }

    pub(crate) fn page_calls(&self) -> usize {
        self.page_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn mutation_calls(&self) -> usize {
        self.mutation_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    pub(crate) fn completions(&self) -> Vec<String> {
        self.completions.lock().unwrap().clone()
    }

    pub(crate) fn labels_of(&self, issue_id: &str) -> Vec<String> {
        self.labels
            .lock()
            .unwrap()
            .get(issue_id)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl IssueTracker for FakeTracker {
    async fn issues_page(&self, _first: usize, _after: Option<&str>) -> GraphqlResult<IssuePage> {
        let page = self.page_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.failing_page == Some(page) {
            return Err(injected("page unavailable"));
        }
        self.pages
            .get(page - 1)
            .cloned()
            .ok_or(GraphqlError::MissingData)
    }

    async fn add_issue_labels(
        &self,
        issue_id: &str,
        label_ids: &[String],
    ) -> GraphqlResult<IssueLabelUpdate> {
        self.mutation_calls.fetch_add(1, Ordering::SeqCst);
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(current, Ordering::SeqCst);

        if let Some(delay) = self.delays.get(issue_id) {
            tokio::time::sleep(*delay).await;
        }

        if self.panicking_issues.contains(issue_id) {
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            panic!("tracker blew up on {issue_id}");
        }

        let result = if self.failing_issues.contains(issue_id) {
            Err(injected("label update failed"))
        } else {
            let mut labels = self.labels.lock().unwrap();
            let entry = labels.entry(issue_id.to_string()).or_default();
            for label in label_ids {
                if !entry.contains(label) {
                    entry.push(label.clone());
                }
            }
            Ok(IssueLabelUpdate {
                id: issue_id.to_string(),
                label_ids: entry.clone(),
            })
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.completions.lock().unwrap().push(issue_id.to_string());
        result
    }
}
