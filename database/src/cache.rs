use indexmap::IndexMap;
use parking_lot::RwLock;
use rand::Rng;
use std::{collections::hash_map::RandomState, hash::BuildHasher, sync::Arc};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CachePolicy {
    /// No caching at all
    Empty,
    /// Keeps at most the given number of entries, evicting a random one when full
    Count(usize),
}

impl CachePolicy {
    fn max_size(self) -> usize {
        match self {
            CachePolicy::Empty => 0,
            CachePolicy::Count(size) => size,
        }
    }
}

#[derive(Clone)]
pub struct Cache<TKey, TData, S = RandomState>
where
    TKey: Clone + std::hash::Hash + Eq + Send + Sync,
    TData: Clone + Send + Sync,
{
    // Indexed so a random victim can be evicted in O(1)
    map: Arc<RwLock<IndexMap<TKey, TData, S>>>,
    size: usize,
}

impl<TKey, TData, S> Cache<TKey, TData, S>
where
    TKey: Clone + std::hash::Hash + Eq + Send + Sync,
    TData: Clone + Send + Sync,
    S: BuildHasher + Default,
{
    pub fn new(policy: CachePolicy) -> Self {
        let size = policy.max_size();
        // Use `size + 1` for not triggering a realloc if new element exactly overflows capacity
        Self { map: Arc::new(RwLock::new(IndexMap::with_capacity_and_hasher(size.min(1 << 16) + 1, S::default()))), size }
    }

    pub fn get(&self, key: &TKey) -> Option<TData> {
        self.map.read().get(key).cloned()
    }

    pub fn contains_key(&self, key: &TKey) -> bool {
        self.map.read().contains_key(key)
    }

    pub fn insert(&self, key: TKey, data: TData) {
        if self.size == 0 {
            return;
        }
        let mut write_guard = self.map.write();
        if write_guard.len() == self.size && !write_guard.contains_key(&key) {
            write_guard.swap_remove_index(rand::thread_rng().gen_range(0..self.size));
        }
        write_guard.insert(key, data);
    }

    /// Applies `op` to the cached entry of `key`, if such an entry exists
    pub fn update_if_entry_exists<F>(&self, key: TKey, op: F)
    where
        F: Fn(&mut TData),
    {
        if self.size == 0 {
            return;
        }
        if let Some(data) = self.map.write().get_mut(&key) {
            op(data);
        }
    }

    pub fn remove(&self, key: &TKey) -> Option<TData> {
        if self.size == 0 {
            return None;
        }
        self.map.write().swap_remove(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_count_policy_evicts() {
        let cache = Cache::<u32, u32>::new(CachePolicy::Count(4));
        for i in 0..10 {
            cache.insert(i, i * 2);
        }
        assert_eq!(cache.map.read().len(), 4);
        assert!(cache.contains_key(&9));
        assert_eq!(cache.get(&9), Some(18));
    }

    #[test]
    fn test_empty_policy_caches_nothing() {
        let cache = Cache::<u32, u32>::new(CachePolicy::Empty);
        cache.insert(1, 1);
        assert!(!cache.contains_key(&1));
        assert_eq!(cache.remove(&1), None);
    }
}
