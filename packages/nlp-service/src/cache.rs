use std::{
	collections::{BTreeMap, HashMap},
	hash::Hash,
	sync::Mutex,
};

/// Fixed-capacity least-recently-used map shared behind `&self`.
///
/// Values are cloned out on read. The cache only avoids repeated work, so a lost race between two
/// writers of the same key is harmless.
pub struct LruCache<K, V> {
	capacity: usize,
	inner: Mutex<Inner<K, V>>,
}
impl<K, V> LruCache<K, V>
where
	K: Clone + Eq + Hash,
	V: Clone,
{
	pub fn new(capacity: usize) -> Self {
		Self {
			capacity: capacity.max(1),
			inner: Mutex::new(Inner {
				entries: HashMap::new(),
				order: BTreeMap::new(),
				clock: 0,
			}),
		}
	}

	pub fn capacity(&self) -> usize {
		self.capacity
	}

	pub fn len(&self) -> usize {
		self.inner.lock().unwrap_or_else(|err| err.into_inner()).entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	pub fn get(&self, key: &K) -> Option<V> {
		let mut guard = self.inner.lock().unwrap_or_else(|err| err.into_inner());
		let Inner { entries, order, clock } = &mut *guard;
		let (stamp, value) = entries.get_mut(key)?;

		order.remove(stamp);

		*clock += 1;
		*stamp = *clock;

		order.insert(*clock, key.clone());

		Some(value.clone())
	}

	pub fn insert(&self, key: K, value: V) {
		let mut guard = self.inner.lock().unwrap_or_else(|err| err.into_inner());
		let Inner { entries, order, clock } = &mut *guard;

		*clock += 1;

		if let Some((stamp, old)) = entries.get_mut(&key) {
			order.remove(stamp);

			*stamp = *clock;
			*old = value;

			order.insert(*clock, key);

			return;
		}

		while entries.len() >= self.capacity {
			let Some((_, oldest)) = order.pop_first() else {
				break;
			};

			entries.remove(&oldest);
		}

		order.insert(*clock, key.clone());
		entries.insert(key, (*clock, value));
	}
}

struct Inner<K, V> {
	entries: HashMap<K, (u64, V)>,
	// Access stamp to key; the first entry is the least recently used.
	order: BTreeMap<u64, K>,
	clock: u64,
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn evicts_least_recently_used() {
		let cache = LruCache::new(2);

		cache.insert("a", 1);
		cache.insert("b", 2);

		assert_eq!(cache.get(&"a"), Some(1));

		cache.insert("c", 3);

		assert_eq!(cache.get(&"b"), None);
		assert_eq!(cache.get(&"a"), Some(1));
		assert_eq!(cache.get(&"c"), Some(3));
		assert_eq!(cache.len(), 2);
	}

	#[test]
	fn overwrite_refreshes_without_growing() {
		let cache = LruCache::new(2);

		cache.insert("a", 1);
		cache.insert("b", 2);
		cache.insert("a", 10);
		cache.insert("c", 3);

		assert_eq!(cache.get(&"a"), Some(10));
		assert_eq!(cache.get(&"b"), None);
		assert_eq!(cache.len(), 2);
	}

	#[test]
	fn zero_capacity_still_holds_one_entry() {
		let cache = LruCache::new(0);

		cache.insert(1, "x");
		cache.insert(2, "y");

		assert_eq!(cache.capacity(), 1);
		assert_eq!(cache.get(&1), None);
		assert_eq!(cache.get(&2), Some("y"));
	}
}
