use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use url::Url;

/// Merger configuration, read from a json file.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Suggest endpoints of the shard servers, e.g. "http://host:8080/suggest".
    pub shard_urls: Vec<String>,
}

impl Config {
    pub fn load(path: &Path) -> Result<Config> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("cannot read the config file {}", path.display()))?;
        let config: Config =
            serde_json::from_str(&content).context("cannot parse the config json")?;
        config.parsed_urls()?;
        Ok(config)
    }

    /// Parses and validates the configured shard urls.
    pub fn parsed_urls(&self) -> Result<Vec<Url>> {
        if self.shard_urls.is_empty() {
            bail!("the config lists no shard urls");
        }
        self.shard_urls
            .iter()
            .map(|raw| {
                Url::parse(raw).with_context(|| format!("cannot parse the shard url {raw:?}"))
            })
            .collect()
    }
}
