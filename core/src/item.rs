use crate::normalize::normalize;
use anyhow::{bail, Context, Result};
use serde_json::{Map, Value};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// A single suggestable record as parsed from one corpus line:
/// `original text <TAB> weight <TAB> json payload`.
#[derive(Debug)]
pub struct Item {
    pub weight: f32,
    pub original_text: String,
    pub normalized_text: String,
    pub data: Map<String, Value>,
    pub classes: Vec<String>,
}

impl Item {
    pub fn from_line(line: &str) -> Result<Item> {
        let parts: Vec<&str> = line.split('\t').collect();
        if parts.len() != 3 {
            bail!("{} tab-separated fields found, 3 expected", parts.len());
        }
        let weight: f32 = parts[1]
            .parse()
            .with_context(|| format!("cannot interpret {:?} as a weight", parts[1]))?;
        let data: Map<String, Value> =
            serde_json::from_str(parts[2]).context("cannot parse the data json")?;
        let classes = extract_classes(&data)?;
        Ok(Item {
            weight,
            original_text: parts[0].to_string(),
            normalized_text: normalize(parts[0]),
            data,
            classes,
        })
    }
}

// Classes come from the `classes` array; the legacy scalar `class` field
// is honored only when the array is empty or absent. Matching is
// case-insensitive, so everything is lowercased once, here.
fn extract_classes(data: &Map<String, Value>) -> Result<Vec<String>> {
    let mut classes = Vec::new();
    match data.get("classes") {
        None | Some(Value::Null) => {}
        Some(Value::Array(list)) => {
            for value in list {
                match value.as_str() {
                    Some(class) => classes.push(class.to_lowercase()),
                    None => bail!("the \"classes\" field must hold only strings"),
                }
            }
        }
        Some(_) => bail!("the \"classes\" field must be an array"),
    }
    if classes.is_empty() {
        match data.get("class") {
            None | Some(Value::Null) => {}
            Some(Value::String(class)) => {
                if !class.is_empty() {
                    classes.push(class.to_lowercase());
                }
            }
            Some(_) => bail!("the \"class\" field must be a string"),
        }
    }
    Ok(classes)
}

/// Read a whole corpus file into shared items. Blank lines are skipped;
/// anything else must parse or the load fails with the offending line
/// number.
pub fn load_items(path: &Path) -> Result<Vec<Arc<Item>>> {
    let file =
        File::open(path).with_context(|| format!("cannot open {}", path.display()))?;
    read_items(BufReader::new(file))
}

pub fn read_items<R: BufRead>(reader: R) -> Result<Vec<Arc<Item>>> {
    let mut items = Vec::new();
    for (number, line) in reader.lines().enumerate() {
        let line = line.context("cannot read the corpus")?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let item = Item::from_line(line)
            .with_context(|| format!("error processing line #{}", number + 1))?;
        items.push(Arc::new(item));
        if items.len() % 100_000 == 0 {
            info!(count = items.len(), "read corpus items");
        }
    }
    Ok(items)
}
