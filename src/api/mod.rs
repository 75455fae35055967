pub mod auth;
pub mod cache;
pub mod competition;
pub mod db;
pub mod error;
pub mod ladder;
pub mod paging;
pub mod positions;
pub mod pricefeed;
pub mod ranking;
pub mod routes;
pub mod server;
pub mod service;
pub mod sources;
pub mod subgraph;
pub mod types;
