use crate::index::{StoredEntry, StoredNode, SuggestData};
use crate::normalize::alpha_normalize;
use crate::response::{Suggestion, TextBlock};
use std::cmp::Ordering;
use std::collections::HashSet;

/// Answer a prefix query against a loaded index. `normalized_part` drives
/// the trie walk, `original_part` drives highlighting. Class filters are
/// expected lowercased, as stored.
pub fn get_suggestions(
    data: &SuggestData,
    original_part: &str,
    normalized_part: &str,
    include_classes: &[String],
    exclude_classes: &[String],
) -> Vec<Suggestion> {
    let Some(mut node) = lookup(&data.trie, normalized_part) else {
        return Vec::new();
    };
    // a compressed run keeps its buckets on the last node of the run
    while node.buckets.is_empty() && node.child_nodes.len() == 1 {
        node = &node.child_nodes[0];
    }

    let mut candidates: Vec<&StoredEntry> = Vec::new();
    for bucket in &node.buckets {
        if has_any_class(&bucket.classes, exclude_classes) {
            continue;
        }
        if !include_classes.is_empty() && !has_any_class(&bucket.classes, include_classes) {
            continue;
        }
        candidates.extend(bucket.entries.iter());
    }
    candidates.sort_by(|a, b| b.weight.partial_cmp(&a.weight).unwrap_or(Ordering::Equal));

    let mut seen_texts: HashSet<&str> = HashSet::new();
    let mut suggestions = Vec::new();
    for entry in candidates {
        let Some(item) = data.items.get(entry.item as usize) else {
            continue;
        };
        if !seen_texts.insert(item.original_text.as_str()) {
            continue;
        }
        suggestions.push(Suggestion {
            weight: entry.weight,
            data: item.data.clone(),
            text: highlight(original_part, &item.original_text),
        });
    }
    suggestions
}

fn lookup<'a>(mut node: &'a StoredNode, prefix: &str) -> Option<&'a StoredNode> {
    for byte in prefix.bytes() {
        let idx = node.child_keys.iter().position(|&k| k == byte)?;
        node = &node.child_nodes[idx];
    }
    Some(node)
}

fn has_any_class(bucket_classes: &[String], filter: &[String]) -> bool {
    bucket_classes.iter().any(|class| filter.contains(class))
}

/// Split the query into alphanumeric tokens and mark each one's first
/// occurrence in the candidate, scanning left to right. A token with no
/// occurrence past the cursor matches zero bytes and moves nothing; the
/// blocks always concatenate back to the exact candidate text.
pub fn highlight(query: &str, candidate: &str) -> Vec<TextBlock> {
    let mut blocks = Vec::new();
    let bytes = candidate.as_bytes();
    let mut cursor = 0;
    for token in alpha_normalize(query).to_lowercase().split(' ') {
        if token.is_empty() {
            continue;
        }
        if let Some(start) = find_ascii_ci(bytes, cursor, token.as_bytes()) {
            if start > cursor {
                blocks.push(TextBlock {
                    text: candidate[cursor..start].to_string(),
                    hl: false,
                });
            }
            let end = start + token.len();
            blocks.push(TextBlock {
                text: candidate[start..end].to_string(),
                hl: true,
            });
            cursor = end;
        }
    }
    if cursor < bytes.len() {
        blocks.push(TextBlock {
            text: candidate[cursor..].to_string(),
            hl: false,
        });
    }
    blocks
}

// Tokens are pure ASCII by construction, so a case-insensitive byte match
// can only start and end on UTF-8 character boundaries of the candidate.
fn find_ascii_ci(haystack: &[u8], from: usize, needle: &[u8]) -> Option<usize> {
    if needle.is_empty() {
        return None;
    }
    let last = haystack.len().checked_sub(needle.len())?;
    (from..=last).find(|&start| {
        haystack[start..start + needle.len()]
            .iter()
            .zip(needle)
            .all(|(a, b)| a.eq_ignore_ascii_case(b))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::build_suggest_data;
    use crate::index::{StoredBucket, StoredEntry, StoredItem};
    use crate::item::Item;
    use crate::normalize::normalize;
    use std::sync::Arc;

    fn build(lines: &[&str], suffix_factor: f32) -> SuggestData {
        let items: Vec<Arc<Item>> = lines
            .iter()
            .map(|l| Arc::new(Item::from_line(l).unwrap()))
            .collect();
        build_suggest_data(&items, 10, suffix_factor, false)
    }

    fn query(data: &SuggestData, part: &str) -> Vec<Suggestion> {
        get_suggestions(data, part, &normalize(part), &[], &[])
    }

    fn concat(blocks: &[TextBlock]) -> String {
        blocks.iter().map(|b| b.text.as_str()).collect()
    }

    #[test]
    fn full_prefix_answers_with_the_item_weight() {
        let data = build(&["Blue Jeans\t10\t{\"classes\": [\"clothes\"]}"], 0.1);
        let found = query(&data, "blue");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].weight, 10.0);
        assert_eq!(concat(&found[0].text), "Blue Jeans");
    }

    #[test]
    fn suffix_prefix_answers_with_the_discounted_weight() {
        let data = build(&["Blue Jeans\t10\t{\"classes\": [\"clothes\"]}"], 0.1);
        let found = query(&data, "jean");
        assert_eq!(found.len(), 1);
        assert!((found[0].weight - 1.0).abs() < 1e-6);
    }

    #[test]
    fn unknown_prefixes_answer_empty() {
        let data = build(&["Blue Jeans\t10\t{}"], 0.1);
        assert!(query(&data, "zebra").is_empty());
        assert!(query(&data, "blue jeans x").is_empty());
    }

    #[test]
    fn compressed_paths_fall_through_to_their_entries() {
        let data = build(&["Blue Jeans\t10\t{}"], 0.1);
        // every strict prefix of the only indexed walk answers the same
        for part in ["b", "blu", "blue j"] {
            let found = query(&data, part);
            assert_eq!(found.len(), 1, "part {part:?}");
            assert_eq!(found[0].weight, 10.0);
        }
    }

    #[test]
    fn repeated_texts_collapse_to_the_heaviest_entry() {
        // at the root both the full-text and the suffix entry of the same
        // item are present; only the heavier survives
        let data = build(&["Blue Jeans\t10\t{}"], 0.1);
        let found = query(&data, "");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].weight, 10.0);
    }

    #[test]
    fn results_rank_by_descending_stored_weight() {
        let data = build(
            &[
                "jacket\t7\t{\"classes\": [\"clothes\"]}",
                "jeans\t10\t{\"classes\": [\"clothes\"]}",
                "jewelry\t9\t{\"classes\": [\"accessories\"]}",
            ],
            0.1,
        );
        let found = query(&data, "je");
        let texts: Vec<String> = found.iter().map(|s| concat(&s.text)).collect();
        assert_eq!(texts, vec!["jeans", "jewelry"]);
    }

    #[test]
    fn class_filters_select_buckets_at_the_queried_node() {
        let data = build(
            &[
                "food soup\t2\t{\"classes\": [\"food\"]}",
                "food bar\t1\t{\"classes\": [\"closed\"]}",
            ],
            0.1,
        );
        let norm = normalize("food");

        let found = get_suggestions(&data, "food", &norm, &["food".into()], &[]);
        assert_eq!(found.len(), 1);
        assert_eq!(concat(&found[0].text), "food soup");

        let found = get_suggestions(&data, "food", &norm, &[], &["closed".into()]);
        assert_eq!(found.len(), 1);
        assert_eq!(concat(&found[0].text), "food soup");

        let found = get_suggestions(&data, "food", &norm, &["drink".into()], &[]);
        assert!(found.is_empty());
    }

    #[test]
    fn exclusion_beats_inclusion_for_mixed_buckets() {
        // hand-built node: one bucket tagged [food, closed], one tagged
        // [food], each holding its own item
        let data = SuggestData {
            version: 1,
            items: vec![
                StoredItem {
                    weight: 5.0,
                    original_text: "food court".into(),
                    normalized_text: "food court".into(),
                    data: serde_json::Map::new(),
                },
                StoredItem {
                    weight: 3.0,
                    original_text: "food market".into(),
                    normalized_text: "food market".into(),
                    data: serde_json::Map::new(),
                },
            ],
            trie: StoredNode {
                child_keys: Vec::new(),
                child_nodes: Vec::new(),
                buckets: vec![
                    StoredBucket {
                        classes: vec!["food".into(), "closed".into()],
                        entries: vec![StoredEntry {
                            item: 0,
                            weight: 5.0,
                        }],
                    },
                    StoredBucket {
                        classes: vec!["food".into()],
                        entries: vec![StoredEntry {
                            item: 1,
                            weight: 3.0,
                        }],
                    },
                ],
            },
        };
        let found = get_suggestions(&data, "", "", &["food".into()], &["closed".into()]);
        assert_eq!(found.len(), 1);
        assert_eq!(concat(&found[0].text), "food market");
    }

    #[test]
    fn highlights_every_query_token_in_order() {
        let blocks = highlight("blue jea", "Blue Jeans");
        assert_eq!(
            blocks,
            vec![
                TextBlock {
                    text: "Blue".into(),
                    hl: true
                },
                TextBlock {
                    text: " ".into(),
                    hl: false
                },
                TextBlock {
                    text: "Jea".into(),
                    hl: true
                },
                TextBlock {
                    text: "ns".into(),
                    hl: false
                },
            ]
        );
    }

    #[test]
    fn unmatched_tokens_highlight_nothing() {
        let blocks = highlight("zzz", "Blue Jeans");
        assert_eq!(
            blocks,
            vec![TextBlock {
                text: "Blue Jeans".into(),
                hl: false
            }]
        );

        let blocks = highlight("blue zzz", "Blue Jeans");
        assert_eq!(concat(&blocks), "Blue Jeans");
        assert!(blocks[0].hl);
        assert_eq!(blocks[0].text, "Blue");
    }

    #[test]
    fn highlight_blocks_reconstruct_the_candidate() {
        let cases = [
            ("blue", "Blue Jeans"),
            ("bl-ue", "Blue"),
            ("jeans blue", "Blue Jeans"),
            ("501", "Levi's 501"),
            ("cafe", "Café au lait"),
            ("au", "Café au lait"),
            ("", "anything at all"),
            ("query", ""),
        ];
        for (query, candidate) in cases {
            let blocks = highlight(query, candidate);
            assert_eq!(concat(&blocks), candidate, "query {query:?}");
        }
    }

    #[test]
    fn highlight_matching_ignores_ascii_case_only() {
        let blocks = highlight("BLUE", "blue jeans");
        assert!(blocks[0].hl);
        assert_eq!(blocks[0].text, "blue");

        // the accented vowel is not an ascii "e", so nothing matches
        let blocks = highlight("cafe", "Café");
        assert_eq!(
            blocks,
            vec![TextBlock {
                text: "Café".into(),
                hl: false
            }]
        );
    }
}
