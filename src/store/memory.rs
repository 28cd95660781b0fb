use std::collections::BTreeMap;
use std::sync::RwLock;

use futures::future::{BoxFuture, FutureExt};

use crate::errors::BackendError;
use crate::keys::{PARTITION_KEY, SORT_KEY};
use crate::store::{Changes, Item, Store};

type Key = (String, String);

/// A store that keeps its items in memory, ordered by key the way a
/// partition query returns them.
#[derive(Default)]
pub struct MemoryStore {
    items: RwLock<BTreeMap<Key, Item>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of items across all partitions.
    pub fn len(&self) -> usize {
        self.items.read().expect("read memory store").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn key_of(item: &Item) -> Result<Key, BackendError> {
    let attribute = |name: &str| {
        item.get_string(name)
            .map(str::to_owned)
            .ok_or_else(|| BackendError::MalformedItem {
                attribute: name.to_owned(),
            })
    };

    Ok((attribute(PARTITION_KEY)?, attribute(SORT_KEY)?))
}

fn key(partition_key: &str, sort_key: &str) -> Key {
    (partition_key.to_owned(), sort_key.to_owned())
}

impl Store for MemoryStore {
    fn query_prefix(
        &self,
        partition_key: &str,
        sort_key_prefix: &str,
    ) -> BoxFuture<Result<Vec<Item>, BackendError>> {
        let items = self.items.read().expect("read memory store");

        let matching: Vec<Item> = items
            .range(key(partition_key, sort_key_prefix)..)
            .take_while(|((pk, sk), _)| pk == partition_key && sk.starts_with(sort_key_prefix))
            .map(|(_, item)| item.clone())
            .collect();

        futures::future::ready(Ok(matching)).boxed()
    }

    fn get(&self, partition_key: &str, sort_key: &str) -> BoxFuture<Result<Option<Item>, BackendError>> {
        let items = self.items.read().expect("read memory store");
        let item = items.get(&key(partition_key, sort_key)).cloned();

        futures::future::ready(Ok(item)).boxed()
    }

    fn put(&self, item: Item) -> BoxFuture<Result<(), BackendError>> {
        let result = key_of(&item).map(|key| {
            self.items
                .write()
                .expect("write memory store")
                .insert(key, item);
        });

        futures::future::ready(result).boxed()
    }

    fn update(
        &self,
        partition_key: &str,
        sort_key: &str,
        changes: Changes,
    ) -> BoxFuture<Result<bool, BackendError>> {
        let mut items = self.items.write().expect("write memory store");

        let updated = match items.get_mut(&key(partition_key, sort_key)) {
            Some(existing) => {
                let mut attributes = existing.clone().into_attributes();
                attributes.extend(changes.set.into_attributes());

                for name in &changes.remove {
                    attributes.remove(name);
                }

                *existing = Item::from(attributes);
                true
            }
            None => false,
        };

        futures::future::ready(Ok(updated)).boxed()
    }

    fn delete(&self, partition_key: &str, sort_key: &str) -> BoxFuture<Result<(), BackendError>> {
        self.items
            .write()
            .expect("write memory store")
            .remove(&key(partition_key, sort_key));

        futures::future::ready(Ok(())).boxed()
    }
}
