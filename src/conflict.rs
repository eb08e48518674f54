//! A set-trie over multisets of components.
//!
//! Each recorded multiset carries a marker, typically the conflict explaining
//! why programs built from those components fail. Keys are numbered in the
//! order the universe lists them and every multiset is stored as its sorted
//! sequence of key numbers, so a path from the root spells one multiset.

use crate::Error;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::hash::Hash;
use tracing::trace;

#[derive(Debug)]
struct TrieNode<M> {
    children: BTreeMap<usize, TrieNode<M>>,
    markers: Vec<M>,
}

impl<M> Default for TrieNode<M> {
    fn default() -> Self {
        TrieNode {
            children: BTreeMap::new(),
            markers: vec![],
        }
    }
}

impl<M: Clone> TrieNode<M> {
    fn collect(&self, out: &mut Vec<M>) {
        out.extend(self.markers.iter().cloned());
        for child in self.children.values() {
            child.collect(out);
        }
    }
}

#[derive(Debug)]
pub struct ConflictDatabase<K, M> {
    ids: HashMap<K, usize>,
    root: TrieNode<M>,
}

impl<K: Eq + Hash + Clone, M: Clone> ConflictDatabase<K, M> {
    /// A database over `universe`; only its keys may appear in multisets.
    pub fn new(universe: impl IntoIterator<Item = K>) -> Self {
        let mut ids = HashMap::new();
        for key in universe {
            let next = ids.len();
            ids.entry(key).or_insert(next);
        }
        ConflictDatabase {
            ids,
            root: TrieNode::default(),
        }
    }

    fn sorted_ids(&self, keys: &[K]) -> Result<Vec<usize>, Error> {
        let mut ids = keys
            .iter()
            .map(|k| self.ids.get(k).copied().ok_or(Error::UnknownComponent))
            .collect::<Result<Vec<_>, _>>()?;
        ids.sort_unstable();
        Ok(ids)
    }

    /// Counts per key number; unknown keys are dropped since no recorded
    /// multiset can contain them.
    fn counts(&self, keys: &[K]) -> BTreeMap<usize, usize> {
        let mut counts = BTreeMap::new();
        for id in keys.iter().filter_map(|k| self.ids.get(k)) {
            *counts.entry(*id).or_insert(0) += 1;
        }
        counts
    }

    /// Record `marker` for the multiset `keys`.
    pub fn insert(&mut self, keys: &[K], marker: M) -> Result<(), Error> {
        let ids = self.sorted_ids(keys)?;
        trace!("recording conflict over {:?}", ids);
        let mut node = &mut self.root;
        for id in ids {
            node = node.children.entry(id).or_default();
        }
        node.markers.push(marker);
        Ok(())
    }

    /// Markers of every recorded multiset contained in `keys`, counting
    /// multiplicity.
    pub fn query(&self, keys: &[K]) -> Vec<M> {
        let mut found = vec![];
        let mut queue = VecDeque::new();
        queue.push_back((&self.root, self.counts(keys)));
        while let Some((node, remaining)) = queue.pop_front() {
            found.extend(node.markers.iter().cloned());
            for (id, child) in &node.children {
                if let Some(&n) = remaining.get(id) {
                    if n > 0 {
                        let mut next = remaining.clone();
                        next.insert(*id, n - 1);
                        queue.push_back((child, next));
                    }
                }
            }
        }
        found
    }

    /// Markers of every recorded multiset containing `keys`, counting
    /// multiplicity.
    pub fn supersets_of(&self, keys: &[K]) -> Vec<M> {
        let mut found = vec![];
        let needed = match self.sorted_ids(keys) {
            Ok(ids) => ids,
            // Nothing recorded mentions an unknown key.
            Err(_) => return found,
        };
        if needed.is_empty() {
            self.root.collect(&mut found);
            return found;
        }
        let mut queue = VecDeque::new();
        queue.push_back((&self.root, 0));
        while let Some((node, matched)) = queue.pop_front() {
            // Paths are sorted, so ids below the next needed one are free.
            let next = needed[matched];
            for (id, child) in &node.children {
                if *id < next {
                    queue.push_back((child, matched));
                } else if *id == next {
                    if matched + 1 == needed.len() {
                        child.collect(&mut found);
                    } else {
                        queue.push_back((child, matched + 1));
                    }
                } else {
                    break;
                }
            }
        }
        found
    }

    pub fn is_empty(&self) -> bool {
        self.root.markers.is_empty() && self.root.children.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    enum C {
        Add,
        X,
        Y,
    }

    fn database() -> ConflictDatabase<C, &'static str> {
        let mut db = ConflictDatabase::new([C::Add, C::X, C::Y]);
        db.insert(&[C::Add, C::X], "c1").unwrap();
        db.insert(&[C::X, C::Add, C::X], "c2").unwrap();
        db
    }

    fn sorted(mut v: Vec<&'static str>) -> Vec<&'static str> {
        v.sort();
        v
    }

    #[test]
    fn query_finds_contained_multisets() {
        let db = database();
        assert!(db.query(&[C::X]).is_empty());
        assert_eq!(db.query(&[C::Add, C::X]), vec!["c1"]);
        assert_eq!(sorted(db.query(&[C::Add, C::X, C::X])), vec!["c1", "c2"]);
        assert_eq!(sorted(db.query(&[C::Y, C::X, C::Add, C::X])), vec!["c1", "c2"]);
    }

    #[test]
    fn supersets_of_finds_containing_multisets() {
        let db = database();
        assert_eq!(sorted(db.supersets_of(&[C::X])), vec!["c1", "c2"]);
        assert_eq!(db.supersets_of(&[C::X, C::X]), vec!["c2"]);
        assert!(db.supersets_of(&[C::Y]).is_empty());
        assert_eq!(sorted(db.supersets_of(&[])), vec!["c1", "c2"]);
    }

    #[test]
    fn empty_multiset_is_contained_everywhere() {
        let mut db = ConflictDatabase::new([C::Add]);
        assert!(db.is_empty());
        db.insert(&[], "always").unwrap();
        assert_eq!(db.query(&[C::X]), vec!["always"]);
        assert!(!db.is_empty());
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let mut db: ConflictDatabase<C, ()> = ConflictDatabase::new([C::Add, C::X]);
        assert!(matches!(
            db.insert(&[C::Y], ()),
            Err(Error::UnknownComponent)
        ));
        assert!(db.is_empty());
    }

    fn multiset() -> impl Strategy<Value = Vec<u8>> {
        prop::collection::vec(0u8..4, 0..5)
    }

    fn contains(outer: &[u8], inner: &[u8]) -> bool {
        (0u8..4).all(|k| {
            inner.iter().filter(|x| **x == k).count() <= outer.iter().filter(|x| **x == k).count()
        })
    }

    proptest! {
        #[test]
        fn agrees_with_brute_force(
            recorded in prop::collection::vec(multiset(), 0..8),
            probe in multiset(),
        ) {
            let mut db = ConflictDatabase::new(0u8..4);
            for (i, keys) in recorded.iter().enumerate() {
                db.insert(keys, i).unwrap();
            }

            let mut subsets = db.query(&probe);
            subsets.sort_unstable();
            let expected: Vec<_> = (0..recorded.len())
                .filter(|i| contains(&probe, &recorded[*i]))
                .collect();
            prop_assert_eq!(subsets, expected);

            let mut supersets = db.supersets_of(&probe);
            supersets.sort_unstable();
            let expected: Vec<_> = (0..recorded.len())
                .filter(|i| contains(&recorded[*i], &probe))
                .collect();
            prop_assert_eq!(supersets, expected);
        }
    }
}
