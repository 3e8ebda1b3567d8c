use crate::index::SuggestData;
use anyhow::{Context, Result};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

pub fn save_suggest(path: &Path, data: &SuggestData) -> Result<()> {
    let mut f = File::create(path)
        .with_context(|| format!("cannot create {}", path.display()))?;
    let bytes = bincode::serialize(data)?;
    f.write_all(&bytes)?;
    Ok(())
}

pub fn load_suggest(path: &Path) -> Result<SuggestData> {
    let mut f = File::open(path)
        .with_context(|| format!("cannot open {}", path.display()))?;
    let mut buf = Vec::new();
    f.read_to_end(&mut buf)?;
    let data = bincode::deserialize(&buf)?;
    Ok(data)
}
