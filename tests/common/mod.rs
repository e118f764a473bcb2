//! Shared helpers for the integration tests: bare-remote git fixtures,
//! dashboard and configuration builders, and output predicates.

pub mod assertions;
pub mod fixtures;
pub mod repository;
