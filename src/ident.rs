//! Identifier registry: identity-based `IndexVar` handles and the
//! process-wide auto-name source shared with `TensorVar` (tensor.rs).
//!
//! Mirrors the teacher's `LOCAL_SERIAL: AtomicU64` monotonic counter
//! (nanoda's `expr.rs`), generalized to one counter per name prefix so that
//! `IndexVar::fresh()` and `TensorVar::fresh()` can each mint names like
//! `i1`, `i2`, ... and `t1`, `t2`, ... without colliding with each other.

use once_cell::sync::Lazy;
use parking_lot::{Mutex, RwLock};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;

static NAME_COUNTERS: Lazy<Mutex<hashbrown::HashMap<char, u64>>> =
    Lazy::new(|| Mutex::new(hashbrown::HashMap::new()));

static INDEX_VAR_SERIAL: AtomicU64 = AtomicU64::new(0);

/// Yields "<prefix><n>" where n is process-monotonic per prefix.
/// Collisions with explicit client names are not prevented, per spec.
pub(crate) fn fresh_name(prefix: char) -> String {
    let mut counters = NAME_COUNTERS.lock();
    let n = counters.entry(prefix).or_insert(0);
    *n += 1;
    format!("{}{}", prefix, n)
}

pub(crate) fn next_serial(counter: &AtomicU64) -> u64 {
    counter.fetch_add(1, AtomicOrdering::SeqCst)
}

struct IndexVarInner {
    id: u64,
    name: RwLock<String>,
}

/// An identity-based handle denoting a loop/summation dimension.
///
/// Two handles compare equal iff they denote the same underlying binding,
/// irrespective of display name; the display name may be changed in place
/// with `set_name` and every clone of the handle observes the change.
#[derive(Clone)]
pub struct IndexVar(Arc<IndexVarInner>);

impl IndexVar {
    /// A fresh handle with an auto-generated name ("i1", "i2", ...).
    pub fn fresh() -> Self {
        Self::new(fresh_name('i'))
    }

    /// A fresh handle with a client-supplied label.
    pub fn new(name: impl Into<String>) -> Self {
        IndexVar(Arc::new(IndexVarInner {
            id: next_serial(&INDEX_VAR_SERIAL),
            name: RwLock::new(name.into()),
        }))
    }

    pub fn name(&self) -> String {
        self.0.name.read().clone()
    }

    pub fn set_name(&self, name: impl Into<String>) {
        *self.0.name.write() = name.into();
    }

    pub fn id(&self) -> u64 {
        self.0.id
    }
}

impl fmt::Display for IndexVar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

impl fmt::Debug for IndexVar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "IndexVar(#{}, {:?})", self.0.id, self.name())
    }
}

impl PartialEq for IndexVar {
    fn eq(&self, other: &Self) -> bool {
        self.0.id == other.0.id
    }
}
impl Eq for IndexVar {}

impl Hash for IndexVar {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.id.hash(state);
    }
}

impl PartialOrd for IndexVar {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for IndexVar {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.id.cmp(&other.0.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_not_name() {
        let a = IndexVar::new("i");
        let b = IndexVar::new("i");
        assert_ne!(a, b, "same display name, distinct identity");
        assert_eq!(a, a.clone());
    }

    #[test]
    fn rename_is_observed_through_clones() {
        let a = IndexVar::new("i");
        let b = a.clone();
        a.set_name("renamed");
        assert_eq!(b.name(), "renamed");
        assert_eq!(a, b);
    }

    #[test]
    fn fresh_names_are_distinct() {
        let a = IndexVar::fresh();
        let b = IndexVar::fresh();
        assert_ne!(a.name(), b.name());
    }

    #[test]
    fn ordering_is_total_and_stable_for_map_keys() {
        use std::collections::BTreeMap;
        let a = IndexVar::new("a");
        let b = IndexVar::new("b");
        let mut map = BTreeMap::new();
        map.insert(a.clone(), 1);
        map.insert(b.clone(), 2);
        assert_eq!(map.len(), 2);
    }
}
