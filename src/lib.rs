pub mod app_state;
pub mod auth;
pub mod backend;
pub mod booking;
pub mod cache;
pub mod config;
pub mod errors;
pub mod geo;
pub mod maps;
pub mod pipeline;
pub mod quote;
pub mod ride;
pub mod routes;
pub mod session;
pub mod tracing;
