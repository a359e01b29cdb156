//! Shared infrastructure: errors, repository, transactions, HTTP plumbing.

pub mod api_common;
pub mod authorization;
pub mod error;
pub mod extract;
pub mod health_api;
pub mod middleware;
pub mod operation;
pub mod repository;
pub mod request_logging;
pub mod unit_of_work;
pub mod validation;
