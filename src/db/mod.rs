//! Client record stores.
//!
//! The lifecycle code never talks to SQLite directly. It opens a store through
//! an [`OpenStore`] location, works on the handle, and lets the handle drop.
//! Each acquisition is one unit of work: [`with_store`] begins it, commits on
//! `Ok`, rolls back on `Err` or on a refused commit, and the handle is
//! released on every path.
//! [`ClientDb`] is the on-disk backend; [`MemoryStore`] backs tests.

pub mod types;
pub use types::*;

pub mod clients;
pub mod memory;

pub use clients::{backup_database, ClientDb, SqliteLocation};
pub use memory::MemoryStore;

use crate::types::ClientKey;

/// An open client store.
pub trait ClientStore {
    fn insert_client(&mut self, client: &DbClient) -> Result<RowId, DbError>;

    /// Every row, in insertion order.
    fn all_clients(&self) -> Result<Vec<(RowId, DbClient)>, DbError>;

    fn update_client(&mut self, id: RowId, client: &DbClient) -> Result<(), DbError>;

    fn remove_client(&mut self, id: RowId) -> Result<(), DbError>;

    /// Start a unit of work. Everything up to the matching [`commit`] or
    /// [`rollback`] lands together or not at all.
    ///
    /// [`commit`]: ClientStore::commit
    /// [`rollback`]: ClientStore::rollback
    fn begin(&mut self) -> Result<(), DbError>;

    fn commit(&mut self) -> Result<(), DbError>;

    /// Undo everything since [`begin`](ClientStore::begin). Failures are
    /// logged, not returned: this already runs on an error path.
    fn rollback(&mut self);

    /// Rows whose full name matches the key, ignoring case.
    fn find_clients(&self, key: &ClientKey) -> Result<Vec<(RowId, DbClient)>, DbError> {
        Ok(self
            .all_clients()?
            .into_iter()
            .filter(|(_, c)| key.matches(&c.first_name, &c.last_name))
            .collect())
    }

    /// Remove every row matching the key. Returns how many went.
    fn delete_clients(&mut self, key: &ClientKey) -> Result<usize, DbError> {
        let matching = self.find_clients(key)?;
        for (id, _) in &matching {
            self.remove_client(*id)?;
        }
        Ok(matching.len())
    }

    /// Add `n` contacts to every row matching the key. Returns how many rows
    /// changed.
    fn add_contacts(&mut self, key: &ClientKey, n: u32) -> Result<usize, DbError> {
        let matching = self.find_clients(key)?;
        for (id, mut row) in matching.iter().cloned() {
            row.times_contacted = row.times_contacted.saturating_add(n);
            self.update_client(id, &row)?;
        }
        Ok(matching.len())
    }

    /// Remove every row. Returns how many went.
    fn clear(&mut self) -> Result<usize, DbError> {
        let all = self.all_clients()?;
        for (id, _) in &all {
            self.remove_client(*id)?;
        }
        Ok(all.len())
    }

    /// Contact count of the first matching row, if any.
    fn times_contacted(&self, key: &ClientKey) -> Result<Option<u32>, DbError> {
        Ok(self
            .find_clients(key)?
            .first()
            .map(|(_, c)| c.times_contacted))
    }
}

/// Somewhere a [`ClientStore`] can be opened.
pub trait OpenStore {
    type Store: ClientStore;

    fn open(&self) -> Result<Self::Store, DbError>;

    /// Human-readable location, for logs.
    fn describe(&self) -> String;
}

/// Open a store, run `f` as one unit of work, and release the handle.
pub fn with_store<O, T, E, F>(location: &O, f: F) -> Result<T, E>
where
    O: OpenStore,
    E: From<DbError>,
    F: FnOnce(&mut O::Store) -> Result<T, E>,
{
    let mut store = location.open()?;
    store.begin()?;
    match f(&mut store) {
        Ok(val) => match store.commit() {
            Ok(()) => Ok(val),
            Err(e) => {
                log::warn!("Commit to {} failed: {}", location.describe(), e);
                store.rollback();
                Err(e.into())
            }
        },
        Err(e) => {
            store.rollback();
            Err(e)
        }
    }
}

// =============================================================================
// Shared test utilities
// =============================================================================


#[cfg(test)]
mod tests {
    use super::test_utils::{client, CommitRefused};
    use super::*;

    #[derive(Debug)]
    struct Refused;

    impl From<DbError> for Refused {
        fn from(_: DbError) -> Self {
            Refused
        }
    }

    #[test]
    fn test_with_store_commits_on_ok() {
        let store = MemoryStore::new();
        let id = with_store(&store, |s| s.insert_client(&client("Jim", "Smith", "1/1/2026", 0)))
            .unwrap_or_else(|e: DbError| panic!("{e}"));
        assert_eq!(store.open().unwrap().all_clients().unwrap()[0].0, id);
    }

    #[test]
    fn test_with_store_rolls_back_on_err() {
        let store = MemoryStore::new();
        let result: Result<(), Refused> = with_store(&store, |s| {
            s.insert_client(&client("Jim", "Smith", "1/1/2026", 0))?;
            Err(Refused)
        });
        assert!(result.is_err());
        assert!(store.open().unwrap().all_clients().unwrap().is_empty());
    }

    #[test]
    fn test_with_store_rolls_back_refused_commit() {
        let store = CommitRefused::default();
        let result = with_store(&store, |s| s.insert_client(&client("Jim", "Smith", "1/1/2026", 0)));
        assert!(matches!(result, Err(DbError::Sqlite(_))));
        assert!(store.rows().is_empty());
    }

    #[test]
    fn test_find_delete_and_count_by_key() {
        let mut store = MemoryStore::new();
        store.insert_client(&client("Jim", "Smith", "1/1/2026", 2)).unwrap();
        store.insert_client(&client("Mary", "Lou", "1/1/2026", 0)).unwrap();

        let key = ClientKey::new("JIM", "smith");
        assert_eq!(store.find_clients(&key).unwrap().len(), 1);
        assert_eq!(store.times_contacted(&key).unwrap(), Some(2));
        assert_eq!(store.delete_clients(&key).unwrap(), 1);
        assert_eq!(store.times_contacted(&key).unwrap(), None);
        assert_eq!(store.all_clients().unwrap().len(), 1);
    }

    #[test]
    fn test_add_contacts_touches_every_match() {
        let mut store = MemoryStore::new();
        store.insert_client(&client("Jim", "Smith", "1/1/2026", 1)).unwrap();
        store.insert_client(&client("jim", "SMITH", "2/1/2026", 0)).unwrap();
        store.insert_client(&client("Mary", "Lou", "1/1/2026", 0)).unwrap();

        assert_eq!(store.add_contacts(&ClientKey::new("Jim", "Smith"), 3).unwrap(), 2);
        let counts: Vec<u32> = store
            .all_clients()
            .unwrap()
            .iter()
            .map(|(_, c)| c.times_contacted)
            .collect();
        assert_eq!(counts, vec![4, 3, 0]);

        let nobody = ClientKey::new("No", "Body");
        assert_eq!(store.add_contacts(&nobody, 1).unwrap(), 0);
    }

    #[test]
    fn test_add_contacts_saturates() {
        let mut store = MemoryStore::new();
        store.insert_client(&client("Jim", "Smith", "1/1/2026", u32::MAX - 1)).unwrap();
        store.add_contacts(&ClientKey::new("Jim", "Smith"), 5).unwrap();
        assert_eq!(store.all_clients().unwrap()[0].1.times_contacted, u32::MAX);
    }

    #[test]
    fn test_clear_empties_the_store() {
        let mut store = MemoryStore::new();
        store.insert_client(&client("Jim", "Smith", "1/1/2026", 0)).unwrap();
        store.insert_client(&client("Mary", "Lou", "1/1/2026", 0)).unwrap();
        assert_eq!(store.clear().unwrap(), 2);
        assert!(store.is_empty());
        assert_eq!(store.clear().unwrap(), 0);
    }
}
