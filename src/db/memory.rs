//! In-memory client store.
//!
//! Handles opened from the same `MemoryStore` share one set of rows, the way
//! connections to one database file do.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use super::{ClientStore, DbClient, DbError, OpenStore, RowId};

#[derive(Debug, Clone, Default)]
struct Rows {
    next_id: RowId,
    rows: BTreeMap<RowId, DbClient>,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    shared: Rc<RefCell<Rows>>,
    snapshot: Option<Rows>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.shared.borrow().rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Clone for MemoryStore {
    fn clone(&self) -> Self {
        Self {
            shared: Rc::clone(&self.shared),
            snapshot: None,
        }
    }
}

impl ClientStore for MemoryStore {
    fn insert_client(&mut self, client: &DbClient) -> Result<RowId, DbError> {
        let mut inner = self.shared.borrow_mut();
        inner.next_id += 1;
        let id = inner.next_id;
        inner.rows.insert(id, client.clone());
        Ok(id)
    }

    fn all_clients(&self) -> Result<Vec<(RowId, DbClient)>, DbError> {
        Ok(self
            .shared
            .borrow()
            .rows
            .iter()
            .map(|(id, c)| (*id, c.clone()))
            .collect())
    }

    fn update_client(&mut self, id: RowId, client: &DbClient) -> Result<(), DbError> {
        if let Some(row) = self.shared.borrow_mut().rows.get_mut(&id) {
            *row = client.clone();
        }
        Ok(())
    }

    fn remove_client(&mut self, id: RowId) -> Result<(), DbError> {
        self.shared.borrow_mut().rows.remove(&id);
        Ok(())
    }

    fn begin(&mut self) -> Result<(), DbError> {
        self.snapshot = Some(self.shared.borrow().clone());
        Ok(())
    }

    fn commit(&mut self) -> Result<(), DbError> {
        self.snapshot = None;
        Ok(())
    }

    fn rollback(&mut self) {
        if let Some(snapshot) = self.snapshot.take() {
            *self.shared.borrow_mut() = snapshot;
        }
    }
}

impl OpenStore for MemoryStore {
    type Store = MemoryStore;

    fn open(&self) -> Result<MemoryStore, DbError> {
        Ok(self.clone())
    }

    fn describe(&self) -> String {
        "in-memory store".to_string()
    }
}
