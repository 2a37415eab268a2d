//! Core domain logic for caliper: measurement storage, body-composition
//! estimation and goal-progress projection, all scoped to an account.

pub mod composition;
pub mod db;
pub mod measurement_import;
pub mod models;
pub mod progress;
pub mod service;
