use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

use crate::config::DEFAULT_PAGE_SIZE;
use crate::graphql::{
    GraphqlError, GraphqlResult, Issue, IssueLabelUpdate, IssuePage, LinearGraphqlClient,
};

/// Operations the synchronizer needs from the issue tracker.
#[async_trait]
pub trait IssueTracker: Send + Sync {
    async fn issues_page(&self, first: usize, after: Option<&str>) -> GraphqlResult<IssuePage>;

    async fn add_issue_labels(
        &self,
        issue_id: &str,
        label_ids: &[String],
    ) -> GraphqlResult<IssueLabelUpdate>;
}

#[async_trait]
impl IssueTracker for LinearGraphqlClient {
    async fn issues_page(&self, first: usize, after: Option<&str>) -> GraphqlResult<IssuePage> {
        LinearGraphqlClient::issues_page(self, first, after).await
    }

    async fn add_issue_labels(
        &self,
        issue_id: &str,
        label_ids: &[String],
    ) -> GraphqlResult<IssueLabelUpdate> {
        LinearGraphqlClient::add_issue_labels(self, issue_id, label_ids).await
    }
}

/// Issue enumeration could not be completed; nothing gathered so far is returned.
#[derive(Debug, Error)]
#[error("failed to fetch issues on page {page}: {source}")]
pub struct FetchError {
    pub page: usize,
    #[source]
    pub source: GraphqlError,
}

/// Enumerates every issue visible to the configured credential.
#[derive(Clone)]
pub struct IssueService {
    tracker: Arc<dyn IssueTracker>,
    page_size: usize,
}

impl IssueService {
    pub fn new(tracker: Arc<dyn IssueTracker>) -> Self {
        Self {
            tracker,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Follow the pagination cursor until the tracker reports no further pages.
    pub async fn fetch_all(&self) -> Result<Vec<Issue>, FetchError> {
        let mut issues = Vec::new();
        let mut seen_cursors = HashSet::new();
        let mut after: Option<String> = None;
        let mut page = 1;

        loop {
            let result = self
                .tracker
                .issues_page(self.page_size, after.as_deref())
                .await
                .map_err(|source| FetchError { page, source })?;
            debug!(page, count = result.issues.len(), "fetched issue page");
            issues.extend(result.issues);

            if !result.has_next_page {
                break;
            }

            let cursor = result.end_cursor.ok_or(FetchError {
                page,
                source: GraphqlError::MissingCursor,
            })?;
            if !seen_cursors.insert(cursor.clone()) {
                return Err(FetchError {
                    page,
                    source: GraphqlError::RepeatedCursor(cursor),
                });
            }
            after = Some(cursor);
            page += 1;
        }

        Ok(issues)
    }
}
