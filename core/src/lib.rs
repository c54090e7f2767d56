//! Canonical shapes for Elasticsearch administrative views and the pure
//! normalizers that produce them from raw response documents.

pub mod cat;
pub mod document;
pub mod error;
pub mod health;
pub mod json;
pub mod statistics;

pub use json::ABSENT;
