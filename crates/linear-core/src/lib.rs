//! Core library for the Linear issue label synchronizer: credentials, the GraphQL client,
//! and the fetch/synchronize services driven by the HTTP front-end.

pub mod auth;
pub mod config;
pub mod graphql;
pub mod services;
