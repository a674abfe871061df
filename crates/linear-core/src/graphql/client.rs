use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::auth::AuthSession;

pub const DEFAULT_ENDPOINT: &str = "https://api.linear.app/graphql";
const USER_AGENT: &str = concat!("issue-sync/", env!("CARGO_PKG_VERSION"));

/// Errors returned by the GraphQL client.
#[derive(Debug, Error)]
pub enum GraphqlError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("HTTP status {status} body: {body}")]
    HttpStatus { status: StatusCode, body: String },
    #[error("invalid GraphQL endpoint: {0}")]
    InvalidEndpoint(#[from] url::ParseError),
    #[error("GraphQL returned errors: {}", join_messages(.0))]
    ResponseErrors(Vec<GraphqlResponseError>),
    #[error("failed to deserialize response: {0}")]
    Deserialize(#[from] serde_json::Error),
    #[error("missing data payload in response")]
    MissingData,
    #[error("tracker reported more issues but returned no cursor")]
    MissingCursor,
    #[error("tracker returned cursor {0} twice")]
    RepeatedCursor(String),
    #[error("tracker rejected label update for issue {0}")]
    MutationRejected(String),
}

fn join_messages(errors: &[GraphqlResponseError]) -> String {
    errors
        .iter()
        .map(|err| err.message.as_str())
        .collect::<Vec<_>>()
        .join("; ")
}

pub type GraphqlResult<T> = Result<T, GraphqlError>;

/// Minimal GraphQL client for interacting with Linear.
#[derive(Debug, Clone)]
pub struct LinearGraphqlClient {
    http: Client,
    endpoint: Url,
    auth_header: String,
}

impl LinearGraphqlClient {
    /// Build a client targeting the default Linear GraphQL endpoint for the given session.
    pub fn from_session(session: &AuthSession) -> GraphqlResult<Self> {
        Self::with_endpoint(session, DEFAULT_ENDPOINT)
    }

    /// Build a client with a custom GraphQL endpoint (useful for testing).
    pub fn with_endpoint(session: &AuthSession, endpoint: &str) -> GraphqlResult<Self> {
        let endpoint = Url::parse(endpoint)?;
        let http = Client::builder().user_agent(USER_AGENT).build()?;
        Ok(Self {
            http,
            endpoint,
            auth_header: session.authorization_header(),
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Fetch one page of issues in the tracker's native order.
    pub async fn issues_page(&self, first: usize, after: Option<&str>) -> GraphqlResult<IssuePage> {
        #[derive(Serialize)]
        struct Variables<'a> {
            first: i64,
            after: Option<&'a str>,
        }

        #[derive(Serialize)]
        struct Request<'a> {
            query: &'a str,
            variables: Variables<'a>,
        }

        #[derive(Deserialize)]
        struct IssuesEnvelope {
            issues: IssueConnection,
        }

        const QUERY: &str = r#"
            query SyncIssues($first: Int!, $after: String) {
                issues(first: $first, after: $after) {
                    nodes {
                        id
                        identifier
                        title
                        url
                        labelIds
                        createdAt
                        updatedAt
                    }
                    pageInfo { hasNextPage endCursor }
                }
            }
        "#;

        let response: GraphqlEnvelope<IssuesEnvelope> = self
            .post(Request {
                query: QUERY,
                variables: Variables {
                    first: first as i64,
                    after,
                },
            })
            .await?;

        let connection = response.into_data()?.issues;
        Ok(IssuePage {
            issues: connection.nodes,
            end_cursor: connection.page_info.end_cursor,
            has_next_page: connection.page_info.has_next_page,
        })
    }

    /// Add labels to an issue. Labels already present are left untouched by Linear.
    pub async fn add_issue_labels(
        &self,
        issue_id: &str,
        label_ids: &[String],
    ) -> GraphqlResult<IssueLabelUpdate> {
        #[derive(Serialize)]
        #[serde(rename_all = "camelCase")]
        struct Input<'a> {
            added_label_ids: &'a [String],
        }

        #[derive(Serialize)]
        struct Variables<'a> {
            id: &'a str,
            input: Input<'a>,
        }

        #[derive(Serialize)]
        struct Request<'a> {
            query: &'a str,
            variables: Variables<'a>,
        }

        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct UpdateEnvelope {
            issue_update: UpdatePayload,
        }

        #[derive(Deserialize)]
        struct UpdatePayload {
            success: bool,
            issue: Option<IssueLabelUpdate>,
        }

        const MUTATION: &str = r#"
            mutation AddIssueLabels($id: String!, $input: IssueUpdateInput!) {
                issueUpdate(id: $id, input: $input) {
                    success
                    issue { id labelIds }
                }
            }
        "#;

        let response: GraphqlEnvelope<UpdateEnvelope> = self
            .post(Request {
                query: MUTATION,
                variables: Variables {
                    id: issue_id,
                    input: Input {
                        added_label_ids: label_ids,
                    },
                },
            })
            .await?;

        let payload = response.into_data()?.issue_update;
        if !payload.success {
            return Err(GraphqlError::MutationRejected(issue_id.to_string()));
        }

        Ok(payload.issue.unwrap_or_else(|| IssueLabelUpdate {
            id: issue_id.to_string(),
            label_ids: Vec::new(),
        }))
    }

    async fn post<T, R>(&self, body: T) -> GraphqlResult<R>
    where
        T: Serialize,
        R: DeserializeOwned,
    {
        let response = self
            .http
            .post(self.endpoint.clone())
            .header("Authorization", &self.auth_header)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(GraphqlError::HttpStatus { status, body: text });
        }

        let bytes = response.bytes().await?;
        let payload = serde_json::from_slice::<R>(&bytes)?;
        Ok(payload)
    }
}

#[derive(Debug, Deserialize)]
struct GraphqlEnvelope<T> {
    data: Option<T>,
    errors: Option<Vec<GraphqlResponseError>>,
}

impl<T> GraphqlEnvelope<T> {
    fn into_data(self) -> GraphqlResult<T> {
        if let Some(errors) = self.errors {
            if !errors.is_empty() {
                return Err(GraphqlError::ResponseErrors(errors));
            }
        }
        self.data.ok_or(GraphqlError::MissingData)
    }
}

/// Issue fields the synchronizer reads. Serialized in Linear's camelCase wire form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Issue {
    pub id: String,
    pub identifier: String,
    pub title: String,
    pub url: Option<String>,
    #[serde(default)]
    pub label_ids: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A single page of the issues connection.
#[derive(Debug, Clone)]
pub struct IssuePage {
    pub issues: Vec<Issue>,
    pub end_cursor: Option<String>,
    pub has_next_page: bool,
}

/// Label state of an issue as reported after an update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueLabelUpdate {
    pub id: String,
    #[serde(default)]
    pub label_ids: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphqlResponseError {
    pub message: String,
    #[serde(default)]
    pub path: Option<Vec<serde_json::Value>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IssueConnection {
    nodes: Vec<Issue>,
    page_info: PageInfo,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PageInfo {
    has_next_page: bool,
    end_cursor: Option<String>,
}
