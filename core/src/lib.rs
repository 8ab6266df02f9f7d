//! settlement-core: normalizes partner royalty-settlement spreadsheets into
//! one canonical schema and appends new rows to a shared ledger.
//!
//! Pipeline, leaf-first:
//!   filename → profile → decode → normalizer → batch → ledger

pub mod alias;
pub mod batch;
pub mod config;
pub mod decode;
pub mod error;
pub mod filename;
pub mod ledger;
pub mod normalizer;
pub mod profile;
pub mod record;
pub mod sheets_api;
pub mod store;
pub mod types;
