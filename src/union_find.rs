//! Union-Find (Disjoint Set Union) over user ids.
//!
//! Backs the connected-component clustering variant: proximity edges are
//! unioned pairwise and the resulting sets become clusters.

use std::collections::HashMap;
use std::hash::Hash;

/// Union-Find with path compression and union by rank.
///
/// # Example
/// ```
/// use area_map::union_find::UnionFind;
///
/// let mut uf = UnionFind::new();
/// uf.make_set("a");
/// uf.make_set("b");
/// uf.make_set("c");
///
/// uf.union(&"a", &"b");
/// assert_eq!(uf.find(&"a"), uf.find(&"b"));
/// assert_ne!(uf.find(&"a"), uf.find(&"c"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct UnionFind<T: Eq + Hash + Clone> {
    parent: HashMap<T, T>,
    rank: HashMap<T, usize>,
}

impl<T: Eq + Hash + Clone> UnionFind<T> {
    /// Create an empty structure.
    pub fn new() -> Self {
        Self {
            parent: HashMap::new(),
            rank: HashMap::new(),
        }
    }

    /// Create a structure with pre-allocated capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            parent: HashMap::with_capacity(capacity),
            rank: HashMap::with_capacity(capacity),
        }
    }

    /// Add a new element as its own singleton set. No-op if already present.
    pub fn make_set(&mut self, item: T) {
        if !self.parent.contains_key(&item) {
            self.parent.insert(item.clone(), item.clone());
            self.rank.insert(item, 0);
        }
    }

    /// Find the representative of the set containing `item`, creating a
    /// singleton set if the item is unknown. Compresses paths as it goes.
    pub fn find(&mut self, item: &T) -> T {
        if !self.parent.contains_key(item) {
            self.make_set(item.clone());
            return item.clone();
        }

        let current = self
            .parent
            .get(item)
            .cloned()
            .unwrap_or_else(|| item.clone());
        if &current == item {
            return item.clone();
        }

        let root = self.find(&current);
        self.parent.insert(item.clone(), root.clone());
        root
    }

    /// Union the sets containing `a` and `b`. Returns false if they were
    /// already in the same set.
    pub fn union(&mut self, a: &T, b: &T) -> bool {
        let root_a = self.find(a);
        let root_b = self.find(b);

        if root_a == root_b {
            return false;
        }

        let rank_a = *self.rank.get(&root_a).unwrap_or(&0);
        let rank_b = *self.rank.get(&root_b).unwrap_or(&0);

        if rank_a < rank_b {
            self.parent.insert(root_a, root_b);
        } else if rank_a > rank_b {
            self.parent.insert(root_b, root_a);
        } else {
            self.parent.insert(root_b, root_a.clone());
            self.rank.insert(root_a, rank_a + 1);
        }

        true
    }

    /// Collect all sets as a map from representative to members.
    pub fn groups(&mut self) -> HashMap<T, Vec<T>> {
        let items: Vec<T> = self.parent.keys().cloned().collect();
        let mut groups: HashMap<T, Vec<T>> = HashMap::new();

        for item in items {
            let root = self.find(&item);
            groups.entry(root).or_default().push(item);
        }

        groups
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_union() {
        let mut uf: UnionFind<u32> = UnionFind::new();
        uf.make_set(1);
        uf.make_set(2);
        uf.make_set(3);

        assert_ne!(uf.find(&1), uf.find(&2));
        uf.union(&1, &2);
        assert_eq!(uf.find(&1), uf.find(&2));
        assert_ne!(uf.find(&1), uf.find(&3));
    }

    #[test]
    fn test_chain_collapses_to_one_root() {
        let mut uf: UnionFind<u32> = UnionFind::new();
        for i in 1..=4 {
            uf.make_set(i);
        }
        uf.union(&1, &2);
        uf.union(&2, &3);
        uf.union(&3, &4);

        let root = uf.find(&1);
        for i in 2..=4 {
            assert_eq!(uf.find(&i), root);
        }
    }

    #[test]
    fn test_groups() {
        let mut uf: UnionFind<String> = UnionFind::with_capacity(4);
        for id in ["a", "b", "c", "d"] {
            uf.make_set(id.to_string());
        }
        uf.union(&"a".to_string(), &"b".to_string());
        uf.union(&"c".to_string(), &"d".to_string());

        let groups = uf.groups();
        assert_eq!(groups.len(), 2);
        assert!(groups.values().all(|members| members.len() == 2));
    }

    #[test]
    fn test_union_same_set_returns_false() {
        let mut uf: UnionFind<u32> = UnionFind::new();
        uf.make_set(1);
        uf.make_set(2);
        assert!(uf.union(&1, &2));
        assert!(!uf.union(&2, &1));
    }
}
