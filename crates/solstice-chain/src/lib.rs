//! The deterministic core: an undo-tracked object database (C1, in
//! `solstice-db`), the protocol types it stores (C4, in `solstice-core`),
//! and everything that mutates it — evaluator dispatch (C5), the
//! transaction processor (C6), the market engine (C7), the BitAsset feed
//! engine (C8), witness scheduling and maintenance (C9), the proposal
//! engine (C10) — orchestrated by the block pipeline (C11) in [`pipeline`].

pub mod authority;
pub mod database;
pub mod evaluator;
pub mod feed;
pub mod maintenance;
pub mod market;
pub mod notify;
pub mod pipeline;
pub mod process;
pub mod proposal_engine;

pub use database::Database;
pub use pipeline::{AppliedBlockResult, Chain};
pub use process::AppliedTransaction;
