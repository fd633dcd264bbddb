//! The admin screen's user filter.

use fittrack_model::UserRecord;

/// Returns the records whose email or name contains `query`,
/// case-insensitively, in their original order.
///
/// A blank query matches everything.
pub fn search_users<'a>(records: &'a [UserRecord], query: &str) -> Vec<&'a UserRecord> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return records.iter().collect();
    }

    records
        .iter()
        .filter(|r| {
            r.email.to_lowercase().contains(&needle)
                || r.name
                    .as_deref()
                    .is_some_and(|n| n.to_lowercase().contains(&needle))
        })
        .collect()
}
