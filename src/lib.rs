//! docplan - metadata construction and plan assembly for a cost-based
//! document query optimizer
//!
//! Data flow for one query:
//!
//! catalog → index model → metadata → (estimator + phases, external search)
//! → winning plan → lowering → executable parameters
//!
//! The search engine, the query translator, the sampling executor and the
//! statistics source are external; this crate defines their traits.

pub mod catalog;
pub mod cli;
pub mod config;
pub mod errors;
pub mod estimator;
pub mod explain;
pub mod index;
pub mod lowering;
pub mod metadata;
pub mod observability;
pub mod optimizer;
pub mod path;
pub mod phase;
pub mod plan;
pub mod requirement;
