//! A single typed table: `instance -> T`, with per-session undo logging.
//!
//! §4.1's contract (`create`/`modify`/`remove`/undo sessions) is implemented
//! here as a generic engine with no knowledge of the concrete entity types
//! that live in `solstice-chain` — those compose many `ObjectTable<T>`s into
//! a `Database` that implements `UndoableDatabase` (see `session.rs`).

use std::collections::BTreeMap;

use crate::error::{DbError, DbResult};

/// A reversible mutation recorded against one row of a table. Played back
/// in reverse (LIFO) order to undo a session.
enum Record<T> {
    Create(u64),
    Update(u64, T),
    Remove(u64, T),
}

/// A generic, undo-tracked table keyed by a 48-bit-logical instance number
/// (stored as `u64`). One `ObjectTable<T>` exists per protocol/implementation
/// entity type in `solstice-chain`'s `Database`.
pub struct ObjectTable<T> {
    rows: BTreeMap<u64, T>,
    next_instance: u64,
    /// One `Vec<Record<T>>` per currently open undo session, outermost first.
    /// Empty when no session is open — mutations made with no open session
    /// are immediate and permanent (used by genesis construction).
    segments: Vec<Vec<Record<T>>>,
}

impl<T: Clone> Default for ObjectTable<T> {
    fn default() -> Self {
        ObjectTable {
            rows: BTreeMap::new(),
            next_instance: 0,
            segments: Vec::new(),
        }
    }
}

impl<T: Clone> ObjectTable<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, instance: u64) -> DbResult<&T> {
        self.rows.get(&instance).ok_or(DbError::NotFound(instance))
    }

    pub fn find(&self, instance: u64) -> Option<&T> {
        self.rows.get(&instance)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&u64, &T)> {
        self.rows.iter()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Assigns the next instance, runs `init` to build the row, inserts it,
    /// and logs a `Create` record in the current session (if any).
    pub fn create(&mut self, init: impl FnOnce(u64) -> T) -> u64 {
        let instance = self.next_instance;
        self.next_instance += 1;
        let row = init(instance);
        self.rows.insert(instance, row);
        if let Some(seg) = self.segments.last_mut() {
            seg.push(Record::Create(instance));
        }
        instance
    }

    /// Captures a pre-image into the current session, then mutates in place.
    pub fn modify(&mut self, instance: u64, mutator: impl FnOnce(&mut T)) -> DbResult<()> {
        let preimage = self
            .rows
            .get(&instance)
            .cloned()
            .ok_or(DbError::NotFound(instance))?;
        let row = self.rows.get_mut(&instance).ok_or(DbError::NotFound(instance))?;
        mutator(row);
        if let Some(seg) = self.segments.last_mut() {
            seg.push(Record::Update(instance, preimage));
        }
        Ok(())
    }

    /// Captures a pre-image and unlinks the row.
    pub fn remove(&mut self, instance: u64) -> DbResult<T> {
        let row = self.rows.remove(&instance).ok_or(DbError::NotFound(instance))?;
        if let Some(seg) = self.segments.last_mut() {
            seg.push(Record::Remove(instance, row.clone()));
        }
        Ok(row)
    }

    pub fn next_instance_peek(&self) -> u64 {
        self.next_instance
    }
}

/// The session-stack primitives a `Database` composing many `ObjectTable<T>`
/// fields implements against to get a uniform `start_undo_session` (see
/// `session.rs`). Kept as inherent methods (not a trait) so generic code
/// can call them without boxing each table as `dyn`.
impl<T: Clone> ObjectTable<T> {
    pub fn push_segment(&mut self) {
        self.segments.push(Vec::new());
    }

    /// Pops the top segment. If a parent segment remains, its records are
    /// appended (commit/merge); otherwise the mutations are already
    /// permanent in `rows` and the segment is simply discarded.
    pub fn commit_top(&mut self) {
        let Some(child) = self.segments.pop() else {
            return;
        };
        if let Some(parent) = self.segments.last_mut() {
            parent.extend(child);
        }
    }

    /// Pops the top segment and reverses every record in LIFO order.
    pub fn rollback_top(&mut self) {
        let Some(child) = self.segments.pop() else {
            return;
        };
        for record in child.into_iter().rev() {
            match record {
                Record::Create(id) => {
                    self.rows.remove(&id);
                }
                Record::Update(id, preimage) => {
                    self.rows.insert(id, preimage);
                }
                Record::Remove(id, preimage) => {
                    self.rows.insert(id, preimage);
                }
            }
        }
    }

    pub fn session_depth(&self) -> usize {
        self.segments.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Debug, PartialEq, Eq)]
    struct Row {
        value: i64,
    }

    #[test]
    fn create_then_rollback_removes_row() {
        let mut t: ObjectTable<Row> = ObjectTable::new();
        t.push_segment();
        let id = t.create(|_| Row { value: 1 });
        assert!(t.find(id).is_some());
        t.rollback_top();
        assert!(t.find(id).is_none());
    }

    #[test]
    fn modify_then_rollback_restores_preimage() {
        let mut t: ObjectTable<Row> = ObjectTable::new();
        let id = t.create(|_| Row { value: 1 });
        t.push_segment();
        t.modify(id, |r| r.value = 99).unwrap();
        assert_eq!(t.get(id).unwrap().value, 99);
        t.rollback_top();
        assert_eq!(t.get(id).unwrap().value, 1);
    }

    #[test]
    fn nested_session_commit_merges_into_parent() {
        let mut t: ObjectTable<Row> = ObjectTable::new();
        t.push_segment(); // outer
        let id = t.create(|_| Row { value: 1 });
        t.push_segment(); // inner
        t.modify(id, |r| r.value = 2).unwrap();
        t.commit_top(); // inner merges into outer
        assert_eq!(t.session_depth(), 1);
        t.rollback_top(); // outer reverts both create and modify
        assert!(t.find(id).is_none());
    }

    #[test]
    fn remove_then_rollback_restores_row() {
        let mut t: ObjectTable<Row> = ObjectTable::new();
        let id = t.create(|_| Row { value: 5 });
        t.push_segment();
        t.remove(id).unwrap();
        assert!(t.find(id).is_none());
        t.rollback_top();
        assert_eq!(t.get(id).unwrap().value, 5);
    }
}
