//! Process-wide keyed queue instances.
//!
//! Some transports want a queue with process lifetime that several
//! independently compiled call sites can reach by name. Instances are keyed
//! by element type and an integer key, created on first request, and live
//! until process exit; there is no teardown.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use parking_lot::RwLock;

use super::MpmcQueue;

type InstanceMap = RwLock<HashMap<(TypeId, u64), Arc<dyn Any + Send + Sync>>>;

static INSTANCES: OnceLock<InstanceMap> = OnceLock::new();

fn instances() -> &'static InstanceMap {
    INSTANCES.get_or_init(|| RwLock::new(HashMap::new()))
}

/// Return the process-wide queue for `(T, key)`, creating it with `capacity`
/// on first use.
///
/// The capacity argument only matters on the creating call; later callers
/// receive the existing instance whatever its capacity.
pub fn instance<T: Send + 'static>(key: u64, capacity: usize) -> Arc<MpmcQueue<T>> {
    let map_key = (TypeId::of::<T>(), key);

    if let Some(existing) = instances().read().get(&map_key) {
        return Arc::clone(existing)
            .downcast::<MpmcQueue<T>>()
            .unwrap_or_else(|_| unreachable!("instance map keyed by TypeId"));
    }

    let mut map = instances().write();
    let entry = map
        .entry(map_key)
        .or_insert_with(|| Arc::new(MpmcQueue::<T>::new(capacity)) as Arc<dyn Any + Send + Sync>);
    Arc::clone(entry)
        .downcast::<MpmcQueue<T>>()
        .unwrap_or_else(|_| unreachable!("instance map keyed by TypeId"))
}
