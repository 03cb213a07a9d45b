//! Contact history: counting reminders, rescheduling, and retiring clients
//! who have been contacted enough.
//!
//! Archiving is the only path that removes a client from the active store.

use std::collections::HashSet;

use thiserror::Error;

use crate::dates::{DateError, DateNormalizer, TemporalConstraint};
use crate::db::{with_store, ClientStore, DbError, OpenStore};
use crate::types::ClientKey;

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("{0}")]
    Date(#[from] DateError),

    #[error("Database error: {0}")]
    Store(#[from] DbError),
}

/// Count one completed outreach for each client reached and push their next
/// reminder out by the default offset. Returns how many rows changed.
///
/// Only pass clients a message was actually sent to.
pub fn record_outreach<S: ClientStore>(
    store: &mut S,
    dates: &DateNormalizer,
    contacted: &[ClientKey],
) -> Result<usize, DbError> {
    let contacted: HashSet<&ClientKey> = contacted.iter().collect();
    let next_reminder = dates.default_reminder_string();
    let mut updated = 0;
    for (id, mut row) in store.all_clients()? {
        if !contacted.contains(&row.key()) {
            continue;
        }
        row.times_contacted = row.times_contacted.saturating_add(1);
        row.rem_date = next_reminder.clone();
        store.update_client(id, &row)?;
        updated += 1;
    }
    log::info!("Recorded outreach for {} clients", updated);
    Ok(updated)
}

/// Age out stale clients: every client whose reminder date is strictly in
/// the past gets one more contact counted, whether or not a message went out.
pub fn sweep_rem_date_in_past<S: ClientStore>(
    store: &mut S,
    dates: &DateNormalizer,
) -> Result<usize, DbError> {
    let mut swept = 0;
    for (id, mut row) in store.all_clients()? {
        let reminder = match dates.parse_stored(&row.rem_date) {
            Ok(date) => date,
            Err(e) => {
                log::warn!("Skipping {} in sweep: {}", row.full_name(), e);
                continue;
            }
        };
        if !dates.is_in_past(reminder) {
            continue;
        }
        row.times_contacted = row.times_contacted.saturating_add(1);
        store.update_client(id, &row)?;
        swept += 1;
    }
    log::info!("Sweep counted a contact for {} overdue clients", swept);
    Ok(swept)
}

/// Move every client contacted more than `threshold` times into the archive,
/// unchanged. Returns the full names moved.
///
/// Rows are written to the archive before they leave the active store.
pub fn archive_overdue<A, B>(
    active: &mut A,
    archive: &mut B,
    threshold: u32,
) -> Result<Vec<String>, DbError>
where
    A: ClientStore,
    B: ClientStore,
{
    let overdue: Vec<_> = active
        .all_clients()?
        .into_iter()
        .filter(|(_, row)| row.times_contacted > threshold)
        .collect();

    let mut moved = Vec::with_capacity(overdue.len());
    for (_, row) in &overdue {
        archive.insert_client(row)?;
    }
    for (id, row) in overdue {
        active.remove_client(id)?;
        moved.push(row.full_name());
    }
    if !moved.is_empty() {
        log::info!("Archived {} fully contacted clients", moved.len());
    }
    Ok(moved)
}

/// [`archive_overdue`] across two store locations. The archive commits
/// first, so a failure can leave a client in both stores but never in
/// neither.
pub fn archive_overdue_between<O, P>(
    active: &O,
    archive: &P,
    threshold: u32,
) -> Result<Vec<String>, DbError>
where
    O: OpenStore,
    P: OpenStore,
{
    with_store(active, |active_store| {
        with_store(archive, |archive_store| {
            archive_overdue(active_store, archive_store, threshold)
        })
    })
}

/// Set the reminder date of every client matching `key`. Returns how many
/// rows changed.
pub fn reschedule<S: ClientStore>(
    store: &mut S,
    dates: &DateNormalizer,
    key: &ClientKey,
    raw_date: &str,
) -> Result<usize, LifecycleError> {
    let rem_date = dates.prepare(raw_date, TemporalConstraint::None)?;
    let matching = store.find_clients(key)?;
    for (id, mut row) in matching.iter().cloned() {
        row.rem_date = rem_date.clone();
        store.update_client(id, &row)?;
    }
    if matching.is_empty() {
        log::warn!("No client named {} to reschedule", key);
    }
    Ok(matching.len())
}

/// Set every active client's reminder date.
pub fn set_reminder_for_all<S: ClientStore>(
    store: &mut S,
    dates: &DateNormalizer,
    raw_date: &str,
) -> Result<usize, LifecycleError> {
    let rem_date = dates.prepare(raw_date, TemporalConstraint::None)?;
    let rows = store.all_clients()?;
    for (id, mut row) in rows.iter().cloned() {
        row.rem_date = rem_date.clone();
        store.update_client(id, &row)?;
    }
    Ok(rows.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dates::test_clock::normalizer;
    use crate::db::test_utils::client;
    use crate::db::MemoryStore;

    fn rows(store: &MemoryStore) -> Vec<crate::db::DbClient> {
        store
            .all_clients()
            .unwrap()
            .into_iter()
            .map(|(_, c)| c)
            .collect()
    }

    #[test]
    fn test_record_outreach_only_touches_contacted() {
        let mut store = MemoryStore::new();
        store.insert_client(&client("Jim", "Smith", "3/21/2019", 0)).unwrap();
        store.insert_client(&client("Mary", "Lou", "3/21/2019", 0)).unwrap();

        let updated =
            record_outreach(&mut store, &normalizer(), &[ClientKey::new("jim", "SMITH")]).unwrap();
        assert_eq!(updated, 1);

        let after = rows(&store);
        assert_eq!(after[0].times_contacted, 1);
        assert_eq!(after[0].rem_date, "11/16/2026");
        assert_eq!(after[1].times_contacted, 0);
        assert_eq!(after[1].rem_date, "3/21/2019");
    }

    #[test]
    fn test_record_outreach_counts_once_per_call() {
        let mut store = MemoryStore::new();
        store.insert_client(&client("Jim", "Smith", "3/21/2019", 0)).unwrap();
        let key = ClientKey::new("Jim", "Smith");
        record_outreach(&mut store, &normalizer(), &[key.clone(), key]).unwrap();
        assert_eq!(rows(&store)[0].times_contacted, 1);
    }

    #[test]
    fn test_sweep_only_strictly_past() {
        let mut store = MemoryStore::new();
        store.insert_client(&client("Past", "Due", "10/16/2026", 0)).unwrap();
        store.insert_client(&client("Due", "Today", "10/17/2026", 0)).unwrap();
        store.insert_client(&client("Not", "Yet", "12/1/2026", 0)).unwrap();

        assert_eq!(sweep_rem_date_in_past(&mut store, &normalizer()).unwrap(), 1);
        let counts: Vec<u32> = rows(&store).iter().map(|c| c.times_contacted).collect();
        assert_eq!(counts, vec![1, 0, 0]);
        assert_eq!(rows(&store)[0].rem_date, "10/16/2026");
    }

    #[test]
    fn test_sweep_skips_unreadable_reminder_dates() {
        let mut store = MemoryStore::new();
        store.insert_client(&client("Past", "Due", "10/16/2026", 0)).unwrap();
        store.insert_client(&client("Some", "Day", "someday", 0)).unwrap();
        store.insert_client(&client("Long", "Ago", "3/21/2019", 2)).unwrap();

        assert_eq!(sweep_rem_date_in_past(&mut store, &normalizer()).unwrap(), 2);
        let after = rows(&store);
        let counts: Vec<u32> = after.iter().map(|c| c.times_contacted).collect();
        assert_eq!(counts, vec![1, 0, 3]);
        assert_eq!(after[1].rem_date, "someday");
    }

    #[test]
    fn test_archive_moves_only_above_threshold() {
        let mut active = MemoryStore::new();
        let mut archive = MemoryStore::new();
        let twice = client("Jim", "Smith", "3/21/2019", 2);
        active.insert_client(&twice).unwrap();
        active.insert_client(&client("Mary", "Lou", "3/21/2019", 1)).unwrap();

        let moved = archive_overdue(&mut active, &mut archive, 1).unwrap();
        assert_eq!(moved, vec!["Jim Smith"]);
        assert_eq!(rows(&active).len(), 1);
        assert_eq!(rows(&active)[0].first_name, "Mary");
        assert_eq!(rows(&archive), vec![twice]);
    }

    #[test]
    fn test_archive_respects_custom_threshold() {
        let mut active = MemoryStore::new();
        let mut archive = MemoryStore::new();
        active.insert_client(&client("Jim", "Smith", "3/21/2019", 2)).unwrap();
        assert!(archive_overdue(&mut active, &mut archive, 2).unwrap().is_empty());
        assert!(archive.is_empty());
    }

    #[test]
    fn test_archive_between_locations() {
        let active = MemoryStore::new();
        let archive = MemoryStore::new();
        active
            .open()
            .unwrap()
            .insert_client(&client("Jim", "Smith", "3/21/2019", 3))
            .unwrap();
        let moved = archive_overdue_between(&active, &archive, 1).unwrap();
        assert_eq!(moved.len(), 1);
        assert!(active.is_empty());
        assert_eq!(archive.len(), 1);
    }

    #[test]
    fn test_reschedule_validates_date() {
        let mut store = MemoryStore::new();
        store.insert_client(&client("Jim", "Smith", "3/21/2019", 0)).unwrap();
        let key = ClientKey::new("jim", "smith");

        assert_eq!(reschedule(&mut store, &normalizer(), &key, "12-01-26").unwrap(), 1);
        assert_eq!(rows(&store)[0].rem_date, "12/1/2026");

        let err = reschedule(&mut store, &normalizer(), &key, "tomorrow").unwrap_err();
        assert!(matches!(err, LifecycleError::Date(DateError::Format(_))));
        assert_eq!(rows(&store)[0].rem_date, "12/1/2026");

        let nobody = ClientKey::new("No", "Body");
        assert_eq!(reschedule(&mut store, &normalizer(), &nobody, "1/1/2027").unwrap(), 0);
    }

    #[test]
    fn test_set_reminder_for_all() {
        let mut store = MemoryStore::new();
        store.insert_client(&client("Jim", "Smith", "3/21/2019", 0)).unwrap();
        store.insert_client(&client("Mary", "Lou", "4/1/2020", 0)).unwrap();
        assert_eq!(set_reminder_for_all(&mut store, &normalizer(), "10/17/2026").unwrap(), 2);
        assert!(rows(&store).iter().all(|c| c.rem_date == "10/17/2026"));
    }
}
