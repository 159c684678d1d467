//! BDD step definitions for the solar monitor

pub mod log_store_steps;
pub mod query_steps;
