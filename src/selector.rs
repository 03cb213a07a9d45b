//! Which clients are due for a reminder.

use crate::dates::DateNormalizer;
use crate::db::{ClientStore, DbError, RowId};
use crate::types::ClientRecord;

/// Every stored client read back as a record, in store order. Rows whose
/// dates no longer parse are logged and left out.
fn readable_clients<S: ClientStore>(
    store: &S,
    dates: &DateNormalizer,
) -> Result<Vec<(RowId, ClientRecord)>, DbError> {
    let mut out = Vec::new();
    for (id, row) in store.all_clients()? {
        match row.to_record(dates) {
            Ok(record) => out.push((id, record)),
            Err(e) => log::warn!("Skipping client row {}: {}", id, e),
        }
    }
    Ok(out)
}

/// Clients whose reminder date is today or earlier, in store order.
///
/// Contactability is not considered here; clients without an email are still
/// returned.
pub fn select_due<S: ClientStore>(
    store: &S,
    dates: &DateNormalizer,
) -> Result<Vec<ClientRecord>, DbError> {
    let due: Vec<ClientRecord> = readable_clients(store, dates)?
        .into_iter()
        .map(|(_, record)| record)
        .filter(|record| dates.contact_now(record.reminder_date))
        .collect();
    log::debug!("{} clients due as of {}", due.len(), dates.today());
    Ok(due)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dates::test_clock::normalizer;
    use crate::db::test_utils::client;
    use crate::db::MemoryStore;

    #[test]
    fn test_today_is_due_and_tomorrow_is_not() {
        let mut store = MemoryStore::new();
        store.insert_client(&client("Past", "Due", "3/21/2019", 0)).unwrap();
        store.insert_client(&client("Due", "Today", "10/17/2026", 0)).unwrap();
        store.insert_client(&client("Not", "Yet", "10/18/2026", 0)).unwrap();

        let due = select_due(&store, &normalizer()).unwrap();
        let names: Vec<String> = due.iter().map(ClientRecord::full_name).collect();
        assert_eq!(names, vec!["Past Due", "Due Today"]);
    }

    #[test]
    fn test_clients_without_email_are_still_due() {
        let mut store = MemoryStore::new();
        let mut row = client("No", "Email", "10/1/2026", 0);
        row.email = None;
        store.insert_client(&row).unwrap();

        let due = select_due(&store, &normalizer()).unwrap();
        assert_eq!(due.len(), 1);
        assert!(!due[0].is_contactable());
    }

    #[test]
    fn test_unreadable_rows_are_skipped() {
        let mut store = MemoryStore::new();
        store.insert_client(&client("Bad", "Row", "someday", 0)).unwrap();
        store.insert_client(&client("Good", "Row", "10/1/2026", 0)).unwrap();

        let due = select_due(&store, &normalizer()).unwrap();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].first_name, "Good");
    }

    #[test]
    fn test_old_stored_dates_still_read() {
        let mut store = MemoryStore::new();
        store.insert_client(&client("Old", "Timer", "1/1/2001", 0)).unwrap();
        assert_eq!(select_due(&store, &normalizer()).unwrap().len(), 1);
    }
}
