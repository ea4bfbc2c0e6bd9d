use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{PoisonError, RwLock};

use coursewise_core::InstitutionId;

/// Records partitioned by institution.
///
/// Every lookup names its institution first, and a partition is only created
/// by its first write. Progress records use `(UserId, AchievementId)` keys,
/// so one learner's records are a predicate scan over a single partition.
#[derive(Debug)]
pub struct PartitionedStore<K, V> {
    partitions: RwLock<HashMap<InstitutionId, HashMap<K, V>>>,
}

impl<K, V> Default for PartitionedStore<K, V> {
    fn default() -> Self {
        Self {
            partitions: RwLock::new(HashMap::new()),
        }
    }
}

impl<K, V> PartitionedStore<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    pub fn get(&self, institution_id: InstitutionId, key: &K) -> Option<V> {
        let partitions = self.partitions.read().unwrap_or_else(PoisonError::into_inner);
        partitions.get(&institution_id)?.get(key).cloned()
    }

    pub fn upsert(&self, institution_id: InstitutionId, key: K, value: V) {
        let mut partitions = self.partitions.write().unwrap_or_else(PoisonError::into_inner);
        partitions
            .entry(institution_id)
            .or_default()
            .insert(key, value);
    }

    /// Clones of the institution's values whose entry satisfies `keep`.
    pub fn list_where(
        &self,
        institution_id: InstitutionId,
        keep: impl Fn(&K, &V) -> bool,
    ) -> Vec<V> {
        let partitions = self.partitions.read().unwrap_or_else(PoisonError::into_inner);
        partitions
            .get(&institution_id)
            .map(|partition| {
                partition
                    .iter()
                    .filter(|(k, v)| keep(k, v))
                    .map(|(_, v)| v.clone())
                    .collect()
            })
            .unwrap_or_default()
    }
}
