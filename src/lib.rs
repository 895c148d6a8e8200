//! Parking Fines Client Library
//!
//! This library checks a national ID number and vehicle plate for unpaid
//! parking fines across municipalities, by talking to the fines-check
//! backend and consuming its incremental result stream. It also wraps the
//! read-only third-party lookups (vehicle registry, municipality images).
//!
//! # Modules
//!
//! - `core`: Data model, stream parsing and aggregation.
//! - `integrations`: Backend and third-party clients.
//! - `aggregator`: Keyed collection of per-municipality results.
//! - `api_client`: Fines-check backend client.
//! - `circuit_breaker`: Circuit breaker for third-party lookups.
//! - `config`: Configuration management.
//! - `errors`: Error handling types.
//! - `location`: Session-scoped location cache.
//! - `lookups`: Vehicle registry and municipality image lookups.
//! - `models`: Core data models.
//! - `orchestrator`: Drives a check to its terminal response.
//! - `report`: Terminal rendering of results.
//! - `stream_parser`: Incremental `data:` record parser.
//! - `validation`: Check form input sanitising.

pub mod core;
pub mod integrations;

pub mod aggregator;
pub mod api_client;
pub mod circuit_breaker;
pub mod config;
pub mod errors;
pub mod location;
pub mod lookups;
pub mod models;
pub mod orchestrator;
pub mod report;
pub mod stream_parser;
pub mod validation;
