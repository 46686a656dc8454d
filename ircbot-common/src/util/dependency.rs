//! An ordered map whose iteration order is derived from relations between its entries.
//!
//! Every entry may name other entries it must run `before` or `after` (soft: ignored when the
//! other entry is absent, unless the dict is strict), entries it `requires` or is `required_by`
//! (hard: the other entry must exist), and a `priority` group. The order is solved with repeated
//! passes that peel off every entry with no unsatisfied predecessor, and is cached until the next
//! mutation.

use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::OnceLock;

use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DependencyError {
    #[error("{0} cannot depend on itself")]
    SelfReference(String),
    #[error("{item} requires {target}, which does not exist")]
    MissingRequirement { item: String, target: String },
    #[error("{item} is ordered relative to {target}, which does not exist")]
    MissingTarget { item: String, target: String },
    #[error("Could not solve dependencies on pass {pass} ({remaining} items remaining)")]
    Cycle { pass: usize, remaining: usize },
}

/// The relations of one entry to the others.
#[derive(Debug, Clone)]
pub struct Relations<K> {
    pub before: HashSet<K>,
    pub after: HashSet<K>,
    pub requires: HashSet<K>,
    pub required_by: HashSet<K>,
    pub priority: i64,
}

impl<K> Default for Relations<K> {
    fn default() -> Self {
        Self {
            before: HashSet::new(),
            after: HashSet::new(),
            requires: HashSet::new(),
            required_by: HashSet::new(),
            priority: 0,
        }
    }
}

impl<K: Eq + Hash> Relations<K> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn before(mut self, key: K) -> Self {
        self.before.insert(key);
        self
    }

    pub fn after(mut self, key: K) -> Self {
        self.after.insert(key);
        self
    }

    pub fn requires(mut self, key: K) -> Self {
        self.requires.insert(key);
        self
    }

    pub fn required_by(mut self, key: K) -> Self {
        self.required_by.insert(key);
        self
    }

    pub fn priority(mut self, priority: i64) -> Self {
        self.priority = priority;
        self
    }

    /// Whether any relation refers to `key`.
    pub fn mentions(&self, key: &K) -> bool {
        self.before.contains(key)
            || self.after.contains(key)
            || self.requires.contains(key)
            || self.required_by.contains(key)
    }
}

#[derive(Debug, Clone)]
pub struct DependencyItem<K, V> {
    pub key: K,
    pub data: V,
    pub relations: Relations<K>,
}

pub type TieBreak<K, V> = Box<dyn Fn(&DependencyItem<K, V>, &DependencyItem<K, V>) -> Ordering + Send + Sync>;

pub struct DependencyDict<K, V> {
    items: HashMap<K, DependencyItem<K, V>>,
    /// Insertion order, used for ties when there is no tie break.
    order: Vec<K>,
    strict: bool,
    use_priority: bool,
    tie_break: Option<TieBreak<K, V>>,
    solution: OnceLock<Result<Vec<K>, DependencyError>>,
}

impl<K, V> Default for DependencyDict<K, V> {
    fn default() -> Self {
        Self {
            items: HashMap::new(),
            order: Vec::new(),
            strict: false,
            use_priority: false,
            tie_break: None,
            solution: OnceLock::new(),
        }
    }
}

impl<K, V> DependencyDict<K, V>
where
    K: Clone + Eq + Hash + Debug,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Missing `before`/`after` targets become errors instead of being ignored.
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self.invalidate();
        self
    }

    /// Orders every entry of a lower priority before every entry of a higher one.
    pub fn with_priority(mut self, use_priority: bool) -> Self {
        self.use_priority = use_priority;
        self.invalidate();
        self
    }

    /// Orders entries that become ready in the same pass.
    pub fn with_tie_break(
        mut self,
        tie_break: impl Fn(&DependencyItem<K, V>, &DependencyItem<K, V>) -> Ordering + Send + Sync + 'static,
    ) -> Self {
        self.tie_break = Some(Box::new(tie_break));
        self.invalidate();
        self
    }

    /// Inserts or replaces an entry. A replaced entry keeps its original insertion position.
    pub fn add(&mut self, key: K, data: V, relations: Relations<K>) -> Result<(), DependencyError> {
        if relations.mentions(&key) {
            return Err(DependencyError::SelfReference(format!("{key:?}")));
        }

        if !self.items.contains_key(&key) {
            self.order.push(key.clone());
        }
        self.items.insert(key.clone(), DependencyItem { key, data, relations });
        self.invalidate();
        Ok(())
    }

    pub fn remove(&mut self, key: &K) -> Option<V> {
        let item = self.items.remove(key)?;
        self.order.retain(|k| k != key);
        self.invalidate();
        Some(item.data)
    }

    /// Removes and returns the first entry in solved order.
    pub fn pop(&mut self) -> Result<Option<(K, V)>, DependencyError> {
        let Some(key) = self.ordered_keys()?.first().cloned() else {
            return Ok(None);
        };
        Ok(self.remove(&key).map(|data| (key, data)))
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.order.clear();
        self.invalidate();
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        self.items.get(key).map(|item| &item.data)
    }

    pub fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        self.items.get_mut(key).map(|item| &mut item.data)
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.items.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Keys in solved order. Solved once and cached until the next mutation.
    pub fn ordered_keys(&self) -> Result<&[K], DependencyError> {
        match self.solution.get_or_init(|| self.solve()) {
            Ok(keys) => Ok(keys),
            Err(e) => Err(e.clone()),
        }
    }

    pub fn iter(&self) -> Result<impl Iterator<Item = (&K, &V)>, DependencyError> {
        let keys = self.ordered_keys()?;
        Ok(keys.iter().filter_map(|k| self.items.get(k).map(|item| (&item.key, &item.data))))
    }

    pub fn values(&self) -> Result<impl Iterator<Item = &V>, DependencyError> {
        Ok(self.iter()?.map(|(_, v)| v))
    }

    fn invalidate(&mut self) {
        self.solution.take();
    }

    fn solve(&self) -> Result<Vec<K>, DependencyError> {
        let count = self.order.len();
        let index: HashMap<&K, usize> = self.order.iter().enumerate().map(|(i, k)| (k, i)).collect();

        // Nodes past `count` are synthetic priority group boundaries.
        let mut successors: Vec<BTreeSet<usize>> = vec![BTreeSet::new(); count];

        for (i, key) in self.order.iter().enumerate() {
            let relations = &self.items[key].relations;

            for target in &relations.requires {
                let &j = index.get(target).ok_or_else(|| DependencyError::MissingRequirement {
                    item: format!("{key:?}"),
                    target: format!("{target:?}"),
                })?;
                successors[j].insert(i);
            }
            for target in &relations.required_by {
                let &j = index.get(target).ok_or_else(|| DependencyError::MissingRequirement {
                    item: format!("{target:?}"),
                    target: format!("{key:?}"),
                })?;
                successors[i].insert(j);
            }

            for (targets, forward) in [(&relations.before, true), (&relations.after, false)] {
                for target in targets {
                    match index.get(target) {
                        Some(&j) if forward => {
                            successors[i].insert(j);
                        },
                        Some(&j) => {
                            successors[j].insert(i);
                        },
                        None if self.strict => {
                            return Err(DependencyError::MissingTarget {
                                item: format!("{key:?}"),
                                target: format!("{target:?}"),
                            });
                        },
                        None => {},
                    }
                }
            }
        }

        if self.use_priority {
            let mut groups: Vec<(i64, Vec<usize>)> = Vec::new();
            for (i, key) in self.order.iter().enumerate() {
                let priority = self.items[key].relations.priority;
                match groups.iter_mut().find(|(p, _)| *p == priority) {
                    Some((_, members)) => members.push(i),
                    None => groups.push((priority, vec![i])),
                }
            }
            groups.sort_by_key(|(p, _)| *p);

            for pair in groups.windows(2) {
                let boundary = successors.len();
                successors.push(pair[1].1.iter().copied().collect());
                for &member in &pair[0].1 {
                    successors[member].insert(boundary);
                }
            }
        }

        let mut in_degree = vec![0usize; successors.len()];
        for targets in &successors {
            for &t in targets {
                in_degree[t] += 1;
            }
        }

        let mut done = vec![false; successors.len()];
        let mut remaining = successors.len();
        let mut solved = Vec::with_capacity(count);
        let mut pass = 0;

        while remaining > 0 {
            pass += 1;

            let ready: Vec<usize> = (0..successors.len())
                .filter(|&n| !done[n] && in_degree[n] == 0)
                .collect();

            if ready.is_empty() {
                let unresolved = (0..count).filter(|&n| !done[n]).count();
                return Err(DependencyError::Cycle { pass, remaining: unresolved });
            }

            let mut real: Vec<usize> = ready.iter().copied().filter(|&n| n < count).collect();
            if let Some(tie_break) = &self.tie_break {
                real.sort_by(|&a, &b| tie_break(&self.items[&self.order[a]], &self.items[&self.order[b]]));
            }
            solved.extend(real.into_iter().map(|n| self.order[n].clone()));

            for n in ready {
                done[n] = true;
                remaining -= 1;
                for &t in &successors[n] {
                    in_degree[t] -= 1;
                }
            }
        }

        Ok(solved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(dict: &DependencyDict<&'static str, ()>) -> Vec<&'static str> {
        dict.ordered_keys().unwrap().to_vec()
    }

    fn position(order: &[&str], key: &str) -> usize {
        order.iter().position(|k| *k == key).unwrap()
    }

    #[test]
    fn unrelated_items_keep_insertion_order() {
        let mut dict = DependencyDict::new();
        for k in ["c", "a", "b"] {
            dict.add(k, (), Relations::new()).unwrap();
        }
        assert_eq!(keys(&dict), vec!["c", "a", "b"]);
    }

    #[test]
    fn before_and_after_are_respected() {
        let mut dict = DependencyDict::new();
        dict.add("log", (), Relations::new().after("parse")).unwrap();
        dict.add("dispatch", (), Relations::new().after("parse").before("log")).unwrap();
        dict.add("parse", (), Relations::new()).unwrap();
        dict.add("greet", (), Relations::new().before("parse")).unwrap();

        let order = keys(&dict);
        assert!(position(&order, "greet") < position(&order, "parse"));
        assert!(position(&order, "parse") < position(&order, "dispatch"));
        assert!(position(&order, "dispatch") < position(&order, "log"));
    }

    #[test]
    fn missing_soft_target_is_ignored_unless_strict() {
        let mut dict = DependencyDict::new();
        dict.add("a", (), Relations::new().after("ghost")).unwrap();
        assert_eq!(keys(&dict), vec!["a"]);

        let mut strict = DependencyDict::new().strict(true);
        strict.add("a", (), Relations::new().after("ghost")).unwrap();
        assert!(matches!(strict.ordered_keys(), Err(DependencyError::MissingTarget { .. })));
    }

    #[test]
    fn missing_requirement_is_an_error() {
        let mut dict: DependencyDict<&str, ()> = DependencyDict::new();
        dict.add("a", (), Relations::new().requires("b")).unwrap();
        assert!(matches!(dict.ordered_keys(), Err(DependencyError::MissingRequirement { .. })));

        dict.add("b", (), Relations::new()).unwrap();
        assert_eq!(keys(&dict), vec!["b", "a"]);
    }

    #[test]
    fn required_by_orders_before_target() {
        let mut dict = DependencyDict::new();
        dict.add("late", (), Relations::new()).unwrap();
        dict.add("early", (), Relations::new().required_by("late")).unwrap();
        assert_eq!(keys(&dict), vec!["early", "late"]);
    }

    #[test]
    fn self_reference_is_rejected() {
        let mut dict: DependencyDict<&str, ()> = DependencyDict::new();
        let err = dict.add("a", (), Relations::new().before("a")).unwrap_err();
        assert_eq!(err, DependencyError::SelfReference("\"a\"".to_owned()));
        assert!(dict.is_empty());
    }

    #[test]
    fn cycle_is_reported() {
        let mut dict = DependencyDict::new();
        dict.add("a", (), Relations::new().after("b")).unwrap();
        dict.add("b", (), Relations::new().after("a")).unwrap();
        dict.add("c", (), Relations::new()).unwrap();

        let err = dict.ordered_keys().unwrap_err();
        assert_eq!(err, DependencyError::Cycle { pass: 2, remaining: 2 });
        assert_eq!(
            err.to_string(),
            "Could not solve dependencies on pass 2 (2 items remaining)"
        );
    }

    #[test]
    fn priority_groups_order_lowest_first() {
        let mut dict = DependencyDict::new().with_priority(true);
        dict.add("late", (), Relations::new().priority(10)).unwrap();
        dict.add("early", (), Relations::new().priority(-5)).unwrap();
        dict.add("middle", (), Relations::new()).unwrap();
        dict.add("middle2", (), Relations::new()).unwrap();
        assert_eq!(keys(&dict), vec!["early", "middle", "middle2", "late"]);
    }

    #[test]
    fn tie_break_orders_ready_items() {
        let mut dict = DependencyDict::<&'static str, ()>::new().with_tie_break(
            |a: &DependencyItem<&'static str, ()>, b: &DependencyItem<&'static str, ()>| a.key.cmp(&b.key),
        );
        for k in ["c", "a", "b"] {
            dict.add(k, (), Relations::new()).unwrap();
        }
        assert_eq!(keys(&dict), vec!["a", "b", "c"]);
    }

    #[test]
    fn mutation_invalidates_solution() {
        let mut dict = DependencyDict::new();
        dict.add("a", 1, Relations::new()).unwrap();
        assert_eq!(dict.ordered_keys().unwrap(), &["a"]);

        dict.add("b", 2, Relations::new().before("a")).unwrap();
        assert_eq!(dict.ordered_keys().unwrap(), &["b", "a"]);

        assert_eq!(dict.pop().unwrap(), Some(("b", 2)));
        assert_eq!(dict.values().unwrap().copied().collect::<Vec<_>>(), vec![1]);

        dict.clear();
        assert!(dict.ordered_keys().unwrap().is_empty());
    }
}
