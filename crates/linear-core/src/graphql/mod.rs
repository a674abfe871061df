mod client;

pub use client::{
    GraphqlError, GraphqlResponseError, GraphqlResult, Issue, IssueLabelUpdate, IssuePage,
    LinearGraphqlClient, DEFAULT_ENDPOINT,
};
