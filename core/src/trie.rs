use crate::item::Item;
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::Arc;

/// One index entry: a weight paired with the shared item it ranks.
/// Suffix entries carry a discounted weight, so this is not always
/// `item.weight`.
#[derive(Debug, Clone)]
pub struct TrieItem {
    pub weight: f32,
    pub item: Arc<Item>,
}

/// A class-scoped, weight-bounded candidate list. Entries are kept in
/// ascending-weight binary-heap order during the build so the minimum is
/// always evictable; `finalize` re-sorts them descending for serving.
#[derive(Debug, Default)]
pub struct Bucket {
    pub classes: Vec<String>,
    entries: Vec<TrieItem>,
}

impl Bucket {
    fn seeded(entry: TrieItem) -> Bucket {
        Bucket {
            classes: entry.item.classes.clone(),
            entries: vec![entry],
        }
    }

    pub fn entries(&self) -> &[TrieItem] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn shares_class_with(&self, classes: &[String]) -> bool {
        self.classes.iter().any(|c| classes.contains(c))
    }

    /// Push keeping min-heap order. Classes of the pushed item that the
    /// bucket has not seen yet are merged into its class list; eviction
    /// never removes them again.
    fn push(&mut self, entry: TrieItem) {
        for class in &entry.item.classes {
            if !self.classes.contains(class) {
                self.classes.push(class.clone());
            }
        }
        self.entries.push(entry);
        self.sift_up(self.entries.len() - 1);
    }

    /// Remove and return the lowest-weight entry.
    fn evict_min(&mut self) -> Option<TrieItem> {
        if self.entries.is_empty() {
            return None;
        }
        let last = self.entries.len() - 1;
        self.entries.swap(0, last);
        let min = self.entries.pop();
        if !self.entries.is_empty() {
            self.sift_down(0);
        }
        min
    }

    fn sift_up(&mut self, mut idx: usize) {
        while idx > 0 {
            let parent = (idx - 1) / 2;
            if self.entries[idx].weight < self.entries[parent].weight {
                self.entries.swap(idx, parent);
                idx = parent;
            } else {
                break;
            }
        }
    }

    fn sift_down(&mut self, mut idx: usize) {
        loop {
            let left = 2 * idx + 1;
            let right = 2 * idx + 2;
            let mut smallest = idx;
            if left < self.entries.len()
                && self.entries[left].weight < self.entries[smallest].weight
            {
                smallest = left;
            }
            if right < self.entries.len()
                && self.entries[right].weight < self.entries[smallest].weight
            {
                smallest = right;
            }
            if smallest == idx {
                return;
            }
            self.entries.swap(idx, smallest);
            idx = smallest;
        }
    }

    fn finalize(&mut self, max_items_per_prefix: usize) {
        self.entries.sort_by(|a, b| {
            b.weight.partial_cmp(&a.weight).unwrap_or(Ordering::Equal)
        });
        self.dedupe_groups();
        self.entries.truncate(max_items_per_prefix);
    }

    // One entry per distinct `group` value; entries without the attribute
    // are exempt. Runs on the descending-sorted list, so the heaviest
    // entry of each group survives.
    fn dedupe_groups(&mut self) {
        let mut seen: HashSet<String> = HashSet::new();
        self.entries.retain(|e| {
            match e.item.data.get("group").and_then(Value::as_str) {
                Some(group) => seen.insert(group.to_string()),
                None => true,
            }
        });
    }
}

#[derive(Debug)]
struct Descendant {
    key: u8,
    node: TrieNode,
}

/// Prefix-trie node: children keyed by a single byte plus the buckets
/// answering every query that ends at this node.
#[derive(Debug, Default)]
pub struct TrieNode {
    descendants: Vec<Descendant>,
    buckets: Vec<Bucket>,
}

impl TrieNode {
    pub fn buckets(&self) -> &[Bucket] {
        &self.buckets
    }

    pub fn descendants(&self) -> impl Iterator<Item = (u8, &TrieNode)> {
        self.descendants.iter().map(|d| (d.key, &d.node))
    }

    /// Insert `entry` along the byte walk of `text`, recording it in the
    /// bucket set of every node visited, the root included. `overhead_cap`
    /// bounds each bucket during the build; it is deliberately larger than
    /// the serving cap so group dedup at finalize cannot starve a prefix.
    pub fn add(&mut self, text: &str, overhead_cap: usize, entry: &TrieItem) {
        let bytes = text.as_bytes();
        let mut node = self;
        let mut position = 0;
        loop {
            node.place(overhead_cap, entry);
            if position == bytes.len() {
                return;
            }
            let key = bytes[position];
            position += 1;
            let idx = match node.descendants.iter().position(|d| d.key == key) {
                Some(idx) => idx,
                None => {
                    node.descendants.push(Descendant {
                        key,
                        node: TrieNode::default(),
                    });
                    node.descendants.len() - 1
                }
            };
            node = &mut node.descendants[idx].node;
        }
    }

    // Greedy, order-dependent bucket assignment: the first bucket sharing
    // at least one class wins; an empty class list matches nothing. This is
    // not a canonical partition of the class space and must stay that way.
    fn place(&mut self, overhead_cap: usize, entry: &TrieItem) {
        match self
            .buckets
            .iter_mut()
            .find(|b| b.shares_class_with(&entry.item.classes))
        {
            Some(bucket) => {
                bucket.push(entry.clone());
                while bucket.len() > overhead_cap {
                    bucket.evict_min();
                }
            }
            None => self.buckets.push(Bucket::seeded(entry.clone())),
        }
    }

    /// Sort, group-dedupe and truncate every bucket, and elide bucket sets
    /// along unbranched runs. The compression check at a node compares
    /// against its only child's buckets as insertion left them, before
    /// either side is sorted or truncated; recursion happens last.
    pub fn finalize(&mut self, max_items_per_prefix: usize) {
        if self.descendants.len() == 1
            && buckets_equal(&self.descendants[0].node.buckets, &self.buckets)
        {
            self.buckets.clear();
        }
        for bucket in &mut self.buckets {
            bucket.finalize(max_items_per_prefix);
        }
        for descendant in &mut self.descendants {
            descendant.node.finalize(max_items_per_prefix);
        }
    }
}

fn buckets_equal(a: &[Bucket], b: &[Bucket]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).all(|(x, y)| {
        x.classes == y.classes
            && x.entries.len() == y.entries.len()
            && x.entries
                .iter()
                .zip(&y.entries)
                .all(|(p, q)| p.weight == q.weight && Arc::ptr_eq(&p.item, &q.item))
    })
}
