//! `SQLite` persistence: ledger repositories, advisory locks,
//! paused-turn correlation, and request dedupe.

pub mod db;
pub mod dedupe_repo;
pub mod job_repo;
pub mod lock_repo;
pub mod paused_turn_repo;
pub mod retention;
pub mod schema;
pub mod turn_repo;
