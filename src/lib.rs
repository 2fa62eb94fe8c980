#![forbid(unsafe_code)]

//! `agent-dispatch`: message-driven agent-execution orchestrator.
//!
//! Consumes natural-language work requests from a durable AMQP topic
//! exchange, drives one execution turn against a live agent backend
//! session, detects suspend points (clarifying question, plan awaiting
//! approval), and keeps a durable per-turn token/cost ledger.

pub mod agent;
pub mod bus;
pub mod config;
pub mod errors;
pub mod messages;
pub mod models;
pub mod orchestrator;
pub mod persistence;

pub use config::GlobalConfig;
pub use errors::{AppError, Result};
