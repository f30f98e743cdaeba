//! Ingestion Module
//!
//! Reads raw newline-delimited JSON sources into Polars tables with
//! schema-on-read typing.

pub mod connector;
pub mod schema_inference;

pub use connector::{NdjsonSource, TableSource};
pub use schema_inference::{InferredColumn, InferredSchema, InferredType, SchemaInference};
