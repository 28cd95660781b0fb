//! Single-table key layout.
//!
//! Every item lives under the partition of the user who owns it
//! (`USER#<email>`), and its sort key starts with a prefix naming the
//! kind of item (`RECIPE#<ulid>` for recipes), so several kinds can
//! share a partition and be listed with a `begins_with` query.

use std::sync::{Mutex, PoisonError};

use lazy_static::lazy_static;
use ulid::Generator;

/// Name of the partition key attribute.
pub const PARTITION_KEY: &str = "PK";

/// Name of the sort key attribute.
pub const SORT_KEY: &str = "SK";

/// Prefix of every user partition.
pub const USER_PREFIX: &str = "USER#";

/// Prefix of every recipe sort key.
pub const RECIPE_PREFIX: &str = "RECIPE#";

/// Returns the partition key owning all of a user's items.
///
/// ```
/// assert_eq!(recipes::keys::user_partition("rick@example.com"), "USER#rick@example.com");
/// ```
pub fn user_partition(email: &str) -> String {
    format!("{}{}", USER_PREFIX, email)
}

/// Returns the sort key of the recipe with the given identifier.
pub fn recipe_sort_key(id: &str) -> String {
    format!("{}{}", RECIPE_PREFIX, id)
}

/// Returns the identifier embedded in a recipe sort key, if it is one.
pub fn recipe_id(sort_key: &str) -> Option<&str> {
    sort_key.strip_prefix(RECIPE_PREFIX)
}

lazy_static! {
    static ref GENERATOR: Mutex<Generator> = Mutex::new(Generator::new());
}

/// Mints a new recipe identifier. Identifiers sort in the order they
/// were minted in this process, even within one millisecond, so a
/// partition query returns recipes oldest first.
pub fn mint_id() -> String {
    // the generator holds no invariant a panicking holder could break
    let mut generator = GENERATOR.lock().unwrap_or_else(PoisonError::into_inner);

    loop {
        match generator.generate() {
            Ok(id) => return id.to_string(),
            // the random part overflowed within this millisecond; the
            // next one starts afresh
            Err(_) => std::thread::yield_now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sort_keys_round_trip_identifiers() {
        let id = mint_id();
        let sort_key = recipe_sort_key(&id);

        assert!(sort_key.starts_with(RECIPE_PREFIX));
        assert_eq!(recipe_id(&sort_key), Some(id.as_str()));
        assert_eq!(recipe_id("NOTE#123"), None);
    }

    #[test]
    fn minted_ids_are_unique_and_sortable() {
        let ids = (0..1000).map(|_| mint_id()).collect::<Vec<_>>();

        assert!(ids.iter().all(|id| id.len() == 26));

        for pair in ids.windows(2) {
            assert!(pair[0] < pair[1], "{} sorts before {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn ids_minted_on_several_threads_stay_unique() {
        let handles = (0..4)
            .map(|_| std::thread::spawn(|| (0..250).map(|_| mint_id()).collect::<Vec<_>>()))
            .collect::<Vec<_>>();

        let mut ids = handles
            .into_iter()
            .flat_map(|handle| handle.join().unwrap())
            .collect::<Vec<_>>();
        ids.sort();
        ids.dedup();

        assert_eq!(ids.len(), 1000);
    }
}
