//! Generic, undo-tracked typed object storage (§4.1). This crate knows
//! nothing about chain-specific entity types — `solstice-chain`'s `Database`
//! composes `ObjectTable<T>` fields for each concrete protocol and
//! implementation entity and implements `UndoableDatabase` over them.

pub mod error;
pub mod index;
pub mod session;
pub mod table;

pub use error::{DbError, DbResult};
pub use index::OrderedIndex;
pub use session::{UndoSession, UndoableDatabase};
pub use table::ObjectTable;
