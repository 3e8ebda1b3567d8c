use crate::item::Item;
use crate::trie::{TrieItem, TrieNode};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::info;

pub type ItemId = u32;

/// Version stamp for freshly built indexes: seconds since the epoch. All
/// shards of one build share a single stamp.
pub fn version_stamp() -> Result<u64> {
    Ok(SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs())
}

/// The complete persisted index: one item table plus the trie referencing
/// it by id. Written once per build and replaced wholesale, never updated
/// in place.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct SuggestData {
    pub version: u64,
    pub items: Vec<StoredItem>,
    pub trie: StoredNode,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredItem {
    pub weight: f32,
    pub original_text: String,
    pub normalized_text: String,
    pub data: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct StoredNode {
    pub child_keys: Vec<u8>,
    pub child_nodes: Vec<StoredNode>,
    pub buckets: Vec<StoredBucket>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StoredBucket {
    pub classes: Vec<String>,
    pub entries: Vec<StoredEntry>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct StoredEntry {
    pub item: ItemId,
    pub weight: f32, // stored entry weight, discounted for suffix entries
}

/// Flattens a built trie into the persisted model. The item table is
/// deduplicated by `Arc` pointer identity and scoped to one transformer,
/// so concurrent shard builds never share state.
#[derive(Default)]
struct Transformer {
    items: Vec<StoredItem>,
    index_by_ptr: HashMap<usize, ItemId>,
}

impl Transformer {
    fn item_id(&mut self, item: &Arc<Item>) -> ItemId {
        let key = Arc::as_ptr(item) as usize;
        if let Some(&id) = self.index_by_ptr.get(&key) {
            return id;
        }
        let id = self.items.len() as ItemId;
        self.items.push(StoredItem {
            weight: item.weight,
            original_text: item.original_text.clone(),
            normalized_text: item.normalized_text.clone(),
            data: item.data.clone(),
        });
        self.index_by_ptr.insert(key, id);
        id
    }

    fn transform(&mut self, node: &TrieNode) -> StoredNode {
        let mut child_keys = Vec::new();
        let mut child_nodes = Vec::new();
        for (key, child) in node.descendants() {
            child_keys.push(key);
            child_nodes.push(self.transform(child));
        }
        let buckets = node
            .buckets()
            .iter()
            .map(|bucket| StoredBucket {
                classes: bucket.classes.clone(),
                entries: bucket
                    .entries()
                    .iter()
                    .map(|e| StoredEntry {
                        item: self.item_id(&e.item),
                        weight: e.weight,
                    })
                    .collect(),
            })
            .collect();
        StoredNode {
            child_keys,
            child_nodes,
            buckets,
        }
    }
}

/// Build the serving index for a set of items. Each item is inserted under
/// its full normalized text at its own weight and, unless
/// `without_suffixes`, under every word-boundary suffix at
/// `weight * suffix_factor`. The caller stamps `version` afterwards.
pub fn build_suggest_data(
    items: &[Arc<Item>],
    max_items_per_prefix: usize,
    suffix_factor: f32,
    without_suffixes: bool,
) -> SuggestData {
    let overhead_cap = max_items_per_prefix * 2;
    let mut root = TrieNode::default();
    for (number, item) in items.iter().enumerate() {
        let entry = TrieItem {
            weight: item.weight,
            item: item.clone(),
        };
        root.add(&item.normalized_text, overhead_cap, &entry);
        if !without_suffixes {
            let words: Vec<&str> = item.normalized_text.split(' ').collect();
            for skip in 1..words.len() {
                let entry = TrieItem {
                    weight: item.weight * suffix_factor,
                    item: item.clone(),
                };
                root.add(&words[skip..].join(" "), overhead_cap, &entry);
            }
        }
        if (number + 1) % 100_000 == 0 {
            info!(count = number + 1, "indexed items");
        }
    }
    root.finalize(max_items_per_prefix);

    let mut transformer = Transformer::default();
    let trie = transformer.transform(&root);
    info!(
        items = transformer.items.len(),
        "transformed the trie for storage"
    );
    SuggestData {
        version: 0,
        items: transformer.items,
        trie,
    }
}
