use crate::index::{build_suggest_data, version_stamp};
use crate::item::{read_items, Item};
use crate::persist::save_suggest;
use anyhow::{bail, Context, Result};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use tracing::{error, info};

/// One contiguous run of corpus lines opening with the same (lowercased)
/// leading byte. `start`/`end` are exact file offsets of the run, so a
/// shard worker can seek straight to its slice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CharacterStat {
    pub character: u8,
    pub count: u64,
    pub start: u64,
    pub end: u64,
}

#[derive(Debug, Clone)]
pub struct ShardedBuildParams {
    pub input: PathBuf,
    pub output: PathBuf,
    pub shard_count: usize,
    pub workers: usize,
    pub max_items_per_prefix: usize,
    pub suffix_factor: f32,
    pub without_suffixes: bool,
}

struct ShardJob {
    shard: usize,
    ranges: Vec<(u64, u64)>,
}

fn leading_byte(line: &str) -> Option<u8> {
    line.trim()
        .as_bytes()
        .first()
        .map(|b| b.to_ascii_lowercase())
}

/// The partitioner needs runs of equal leading bytes to be contiguous, so
/// the corpus must arrive sorted by its first character. Sorting here
/// would hide a caller-side pipeline mistake; refuse instead.
pub fn verify_sorted(path: &Path) -> Result<()> {
    let file =
        File::open(path).with_context(|| format!("cannot open {}", path.display()))?;
    let mut previous: Option<u8> = None;
    for (number, line) in BufReader::new(file).lines().enumerate() {
        let line = line.context("cannot read the corpus")?;
        let Some(current) = leading_byte(&line) else {
            continue;
        };
        if let Some(previous) = previous {
            if previous > current {
                bail!(
                    "{} is not sorted by leading character at line #{}; \
                     sort it first (e.g. `LC_ALL=C sort -f`) and retry",
                    path.display(),
                    number + 1
                );
            }
        }
        previous = Some(current);
    }
    Ok(())
}

/// Single pass over a sorted corpus collecting, per leading byte, the line
/// count and the exact `[start, end)` byte range of its run.
pub fn character_stats(path: &Path) -> Result<Vec<CharacterStat>> {
    let file =
        File::open(path).with_context(|| format!("cannot open {}", path.display()))?;
    let mut reader = BufReader::new(file);
    let mut stats: Vec<CharacterStat> = Vec::new();
    let mut offset: u64 = 0;
    let mut line = String::new();
    loop {
        line.clear();
        let consumed = reader.read_line(&mut line).context("cannot read the corpus")? as u64;
        if consumed == 0 {
            break;
        }
        let next_offset = offset + consumed;
        if let Some(character) = leading_byte(&line) {
            match stats.last_mut() {
                Some(stat) if stat.character == character => {
                    stat.count += 1;
                    stat.end = next_offset;
                }
                _ => stats.push(CharacterStat {
                    character,
                    count: 1,
                    start: offset,
                    end: next_offset,
                }),
            }
        }
        offset = next_offset;
    }
    Ok(stats)
}

/// Assign characters to shards, heaviest first, always into the currently
/// lightest shard. The weight ceiling starts at the fair share `total/n`
/// and is raised by the fair share of what is still unassigned whenever
/// the next character fits nowhere, so a single dominant character cannot
/// wedge the loop.
pub fn distribute(stats: &[CharacterStat], shard_count: usize) -> Vec<Vec<u8>> {
    if shard_count == 0 {
        return Vec::new();
    }
    let mut order: Vec<&CharacterStat> = stats.iter().collect();
    order.sort_by(|a, b| b.count.cmp(&a.count));

    let mut shards = vec![Vec::new(); shard_count];
    let mut weights = vec![0u64; shard_count];
    let total: u64 = stats.iter().map(|s| s.count).sum();
    let mut rest = total;
    let mut ceiling = total / shard_count as u64;
    for stat in order {
        loop {
            let lightest = (0..weights.len())
                .min_by_key(|&idx| weights[idx])
                .unwrap_or(0);
            if weights[lightest] + stat.count <= ceiling {
                shards[lightest].push(stat.character);
                weights[lightest] += stat.count;
                rest -= stat.count;
                break;
            }
            let raise = rest / shard_count as u64;
            ceiling += if raise <= 1 { rest } else { raise };
        }
    }
    shards
}

/// Parse only the corpus lines inside `[start, end)`.
pub fn read_items_in_range(path: &Path, start: u64, end: u64) -> Result<Vec<Arc<Item>>> {
    let mut file =
        File::open(path).with_context(|| format!("cannot open {}", path.display()))?;
    file.seek(SeekFrom::Start(start))?;
    let reader = BufReader::new(file).take(end.saturating_sub(start));
    read_items(reader)
}

/// `suggest.bin` + shard 2 -> `suggest_2.bin`.
pub fn shard_path(path: &Path, shard: usize) -> PathBuf {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("suggest");
    let name = match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => format!("{stem}_{shard}.{ext}"),
        None => format!("{stem}_{shard}"),
    };
    path.with_file_name(name)
}

fn build_one_shard(params: &ShardedBuildParams, job: &ShardJob, version: u64) -> Result<usize> {
    let mut items = Vec::new();
    for &(start, end) in &job.ranges {
        items.extend(read_items_in_range(&params.input, start, end)?);
    }
    let mut data = build_suggest_data(
        &items,
        params.max_items_per_prefix,
        params.suffix_factor,
        params.without_suffixes,
    );
    data.version = version;
    save_suggest(&shard_path(&params.output, job.shard), &data)?;
    Ok(items.len())
}

/// Partition the corpus and build every shard file on a fixed worker pool.
/// All shards share one version stamp. Workers report every outcome; the
/// build fails only after the last one has reported.
pub fn build_sharded(params: &ShardedBuildParams) -> Result<()> {
    if params.shard_count == 0 {
        bail!("at least one shard is required");
    }
    let workers = params.workers.max(1);

    verify_sorted(&params.input)?;
    let stats = character_stats(&params.input)?;
    let assignments = distribute(&stats, params.shard_count);
    let version = version_stamp()?;

    let by_character: HashMap<u8, &CharacterStat> =
        stats.iter().map(|s| (s.character, s)).collect();
    let mut jobs = Vec::new();
    for (shard, characters) in assignments.iter().enumerate() {
        if characters.is_empty() {
            info!(shard, "no characters assigned, shard skipped");
            continue;
        }
        let ranges = characters
            .iter()
            .filter_map(|c| by_character.get(c))
            .map(|s| (s.start, s.end))
            .collect();
        jobs.push(ShardJob { shard, ranges });
    }
    let job_count = jobs.len();

    let queue = Mutex::new(jobs.into_iter());
    let (tx, rx) = mpsc::channel();
    let mut failed = 0usize;
    thread::scope(|scope| {
        for worker in 0..workers {
            let tx = tx.clone();
            let queue = &queue;
            scope.spawn(move || loop {
                let job = queue.lock().next();
                let Some(job) = job else { break };
                let shard = job.shard;
                info!(worker, shard, "building shard");
                let result = build_one_shard(params, &job, version);
                if tx.send((shard, result)).is_err() {
                    break;
                }
            });
        }
        drop(tx);
        for (shard, result) in rx {
            match result {
                Ok(items) => info!(shard, items, "shard written"),
                Err(error) => {
                    failed += 1;
                    error!(shard, "shard build failed: {error:#}");
                }
            }
        }
    });

    if failed > 0 {
        bail!("{failed} of {job_count} shard builds failed");
    }
    info!(shards = job_count, version, "sharded build complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persist::load_suggest;
    use crate::query::get_suggestions;
    use std::io::Write;

    fn write_corpus(content: &str) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("corpus.tsv");
        let mut file = File::create(&path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        (dir, path)
    }

    fn stat(character: u8, count: u64) -> CharacterStat {
        CharacterStat {
            character,
            count,
            start: 0,
            end: 0,
        }
    }

    #[test]
    fn accepts_sorted_and_rejects_unsorted_corpora() {
        let (_dir, path) = write_corpus("Apple\t1\t{}\napricot\t1\t{}\nbanana\t1\t{}\n");
        verify_sorted(&path).unwrap();

        let (_dir, path) = write_corpus("banana\t1\t{}\napple\t1\t{}\n");
        let err = verify_sorted(&path).unwrap_err();
        let message = format!("{err:#}");
        assert!(message.contains("not sorted"), "{message}");
        assert!(message.contains("line #2"), "{message}");
    }

    #[test]
    fn stats_carry_exact_byte_ranges() {
        let (_dir, path) = write_corpus("apple\navocado\nbanana\n");
        let stats = character_stats(&path).unwrap();
        assert_eq!(
            stats,
            vec![
                CharacterStat {
                    character: b'a',
                    count: 2,
                    start: 0,
                    end: 14,
                },
                CharacterStat {
                    character: b'b',
                    count: 1,
                    start: 14,
                    end: 21,
                },
            ]
        );
    }

    #[test]
    fn stats_fold_leading_case_together() {
        let (_dir, path) = write_corpus("Apple\napricot\nBanana\n");
        let stats = character_stats(&path).unwrap();
        assert_eq!(stats.len(), 2);
        assert_eq!(stats[0].character, b'a');
        assert_eq!(stats[0].count, 2);
        assert_eq!(stats[1].character, b'b');
    }

    #[test]
    fn distribution_is_disjoint_and_covers_every_character() {
        let stats: Vec<CharacterStat> =
            (0..12).map(|i| stat(b'a' + i, (i as u64 + 1) * 3)).collect();
        let shards = distribute(&stats, 4);
        assert_eq!(shards.len(), 4);

        let mut all: Vec<u8> = shards.iter().flatten().copied().collect();
        all.sort_unstable();
        let mut expected: Vec<u8> = stats.iter().map(|s| s.character).collect();
        expected.sort_unstable();
        assert_eq!(all, expected); // disjoint and covering at once
    }

    #[test]
    fn uniform_weights_spread_evenly() {
        let stats: Vec<CharacterStat> = (0..6).map(|i| stat(b'a' + i, 10)).collect();
        let shards = distribute(&stats, 3);
        for shard in &shards {
            assert_eq!(shard.len(), 2);
        }
    }

    #[test]
    fn surplus_shards_stay_empty() {
        let stats = vec![stat(b'a', 2), stat(b'b', 1)];
        let shards = distribute(&stats, 4);
        let empty = shards.iter().filter(|s| s.is_empty()).count();
        assert_eq!(empty, 2);
    }

    #[test]
    fn range_reads_parse_only_their_slice() {
        let corpus = "apple\t3\t{}\navocado\t2\t{}\nbanana\t5\t{}\n";
        let (_dir, path) = write_corpus(corpus);
        let stats = character_stats(&path).unwrap();
        let banana = stats[1];
        let items = read_items_in_range(&path, banana.start, banana.end).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].original_text, "banana");
    }

    #[test]
    fn shard_paths_keep_the_extension() {
        assert_eq!(
            shard_path(Path::new("/data/suggest.bin"), 1),
            Path::new("/data/suggest_1.bin")
        );
        assert_eq!(
            shard_path(Path::new("model.v2.bin"), 0),
            Path::new("model.v2_0.bin")
        );
        assert_eq!(shard_path(Path::new("plain"), 2), Path::new("plain_2"));
    }

    #[test]
    fn sharded_build_writes_one_versioned_file_per_busy_shard() {
        let corpus = "\
apple\t3\t{\"classes\": [\"fruit\"]}\n\
avocado\t2\t{\"classes\": [\"fruit\"]}\n\
banana\t5\t{\"classes\": [\"fruit\"]}\n";
        let (_dir, input) = write_corpus(corpus);
        let output = input.with_file_name("suggest.bin");
        let params = ShardedBuildParams {
            input,
            output: output.clone(),
            shard_count: 3,
            workers: 2,
            max_items_per_prefix: 10,
            suffix_factor: 0.1,
            without_suffixes: false,
        };
        build_sharded(&params).unwrap();

        let first = load_suggest(&shard_path(&output, 0)).unwrap();
        let second = load_suggest(&shard_path(&output, 1)).unwrap();
        assert!(!shard_path(&output, 2).exists());

        assert!(first.version > 0);
        assert_eq!(first.version, second.version);

        // the heavier character run lands in shard 0
        assert_eq!(first.items.len(), 2);
        assert_eq!(second.items.len(), 1);
        let found = get_suggestions(&second, "ban", "ban", &[], &[]);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].weight, 5.0);
    }

    #[test]
    fn sharded_build_refuses_unsorted_input() {
        let (_dir, input) = write_corpus("banana\t5\t{}\napple\t3\t{}\n");
        let output = input.with_file_name("suggest.bin");
        let params = ShardedBuildParams {
            input,
            output,
            shard_count: 2,
            workers: 1,
            max_items_per_prefix: 10,
            suffix_factor: 0.1,
            without_suffixes: false,
        };
        let err = build_sharded(&params).unwrap_err();
        assert!(format!("{err:#}").contains("not sorted"));
    }
}
