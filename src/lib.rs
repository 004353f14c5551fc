//! Tapestry: conversational knowledge-graph weaver.
//!
//! Each user turn is sent to an LLM for extraction; the proposed nodes and
//! edges are merged into the caller's graph with label-based resolution,
//! attribute merging and relationship retraction.

pub mod config;
pub mod error;
pub mod extraction;
pub mod graph;
pub mod llm;
pub mod logger;
pub mod turn;

#[cfg(feature = "isqlite")]
pub mod store;

#[cfg(feature = "channel-axum")]
pub mod server;
