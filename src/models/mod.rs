//! Domain entities: live execution sessions, jobs, and ledger turns.

pub mod job;
pub mod session;
pub mod turn;
