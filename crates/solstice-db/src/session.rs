//! RAII undo sessions over a `Database` composed of `ObjectTable<T>` fields.
//!
//! A `Database` implements `UndoableDatabase` by delegating `push_session`/
//! `commit_session`/`rollback_session` to every table field's
//! `push_segment`/`commit_top`/`rollback_top`. `start_undo_session` then
//! gives callers the `Session` → `commit`/`merge`/drop contract from §4.1.

/// Implemented by the concrete `Database` type (in `solstice-chain`) that
/// owns every `ObjectTable<T>`.
pub trait UndoableDatabase {
    fn push_session(&mut self);
    fn commit_session(&mut self);
    fn rollback_session(&mut self);

    fn start_undo_session(&mut self) -> UndoSession<'_, Self>
    where
        Self: Sized,
    {
        self.push_session();
        UndoSession {
            db: self,
            disposed: false,
        }
    }
}

/// RAII guard: `commit`/`merge` absorb the session's log into its parent;
/// dropping without committing reverts every mutation made since the
/// session was opened, in LIFO order.
pub struct UndoSession<'a, D: UndoableDatabase> {
    db: &'a mut D,
    disposed: bool,
}

impl<'a, D: UndoableDatabase> UndoSession<'a, D> {
    pub fn commit(mut self) {
        self.db.commit_session();
        self.disposed = true;
    }

    /// Same as `commit` — graphene's `session::merge()` is an alias kept
    /// for readability at call sites that think of it as "fold into parent".
    pub fn merge(self) {
        self.commit()
    }

    pub fn db(&self) -> &D {
        self.db
    }

    pub fn db_mut(&mut self) -> &mut D {
        self.db
    }
}

impl<'a, D: UndoableDatabase> Drop for UndoSession<'a, D> {
    fn drop(&mut self) {
        if !self.disposed {
            self.db.rollback_session();
            self.disposed = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::ObjectTable;

    #[derive(Clone, Debug, PartialEq, Eq)]
    struct Row {
        value: i64,
    }

    struct TestDb {
        rows: ObjectTable<Row>,
    }

    impl UndoableDatabase for TestDb {
        fn push_session(&mut self) {
            self.rows.push_segment();
        }
        fn commit_session(&mut self) {
            self.rows.commit_top();
        }
        fn rollback_session(&mut self) {
            self.rows.rollback_top();
        }
    }

    #[test]
    fn drop_without_commit_rolls_back() {
        let mut db = TestDb {
            rows: ObjectTable::new(),
        };
        let id = {
            let mut session = db.start_undo_session();
            let id = session.db_mut().rows.create(|_| Row { value: 42 });
            id
            // session dropped here without commit
        };
        assert!(db.rows.find(id).is_none());
    }

    #[test]
    fn commit_keeps_changes() {
        let mut db = TestDb {
            rows: ObjectTable::new(),
        };
        let session = db.start_undo_session();
        let id = session.db().rows.session_depth();
        let _ = id;
        let mut session = session;
        let row_id = session.db_mut().rows.create(|_| Row { value: 7 });
        session.commit();
        assert_eq!(db.rows.get(row_id).unwrap().value, 7);
    }

    #[test]
    fn nested_sessions_only_revert_to_checkpoint() {
        let mut db = TestDb {
            rows: ObjectTable::new(),
        };
        let mut outer = db.start_undo_session();
        let id = outer.db_mut().rows.create(|_| Row { value: 1 });
        {
            let mut inner = outer.db_mut().start_undo_session();
            inner.db_mut().rows.modify(id, |r| r.value = 2).unwrap();
            inner.commit();
        }
        assert_eq!(outer.db().rows.get(id).unwrap().value, 2);
        outer.commit();
        assert_eq!(db.rows.get(id).unwrap().value, 2);
    }
}
