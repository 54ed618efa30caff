use std::collections::BTreeMap;
use std::path::Path;

use ignore::WalkBuilder;
use rayon::prelude::*;

use crate::artifact::{self, ArtifactFiles, ConfigurationResult, ParseNote};
use crate::errors::DiscoveryError;

/// All configuration results from one results directory, sorted by
/// (object size, concurrency). Immutable once assembled.
pub struct PerformanceDataset {
    results: Vec<ConfigurationResult>,
    sizes: Vec<u64>,
    concurrencies: Vec<u32>,
}

impl PerformanceDataset {
    pub(crate) fn from_records(mut records: Vec<ConfigurationResult>) -> Self {
        records.sort_by_key(|r| (r.object_size_bytes, r.concurrency));
        let mut sizes: Vec<u64> = records.iter().map(|r| r.object_size_bytes).collect();
        sizes.dedup();
        let mut concurrencies: Vec<u32> = records.iter().map(|r| r.concurrency).collect();
        concurrencies.sort_unstable();
        concurrencies.dedup();
        PerformanceDataset { results: records, sizes, concurrencies }
    }

    pub fn results(&self) -> &[ConfigurationResult] {
        &self.results
    }

    /// Distinct object sizes, ascending.
    pub fn sizes(&self) -> &[u64] {
        &self.sizes
    }

    /// Distinct concurrency levels, ascending.
    pub fn concurrencies(&self) -> &[u32] {
        &self.concurrencies
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }
}

pub struct Assembly {
    pub dataset: PerformanceDataset,
    pub notes: Vec<ParseNote>,
    pub scanned_files: usize,
}

/// Walk the results directory, group files by artifact stem, parse each stem
/// and assemble the dataset. Discovery order never changes the dataset
/// content: stems are processed in ascending artifact-id order and duplicate
/// (size, concurrency) pairs resolve to the lexicographically-last id.
pub fn assemble(dir: &Path, verbose: u8) -> Result<Assembly, DiscoveryError> {
    let meta = std::fs::metadata(dir).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => DiscoveryError::Missing(dir.to_path_buf()),
        _ => DiscoveryError::Unreadable { path: dir.to_path_buf(), source: e },
    })?;
    if !meta.is_dir() {
        return Err(DiscoveryError::NotADirectory(dir.to_path_buf()));
    }

    let mut groups: BTreeMap<String, ArtifactFiles> = BTreeMap::new();
    let mut malformed: BTreeMap<String, String> = BTreeMap::new();
    let mut scanned = 0usize;

    for entry in WalkBuilder::new(dir).hidden(false).build() {
        let entry = match entry {
            Ok(e) => e,
            Err(err) => {
                eprintln!("Error: {}", err);
                continue;
            }
        };
        if !entry.file_type().map_or(false, |t| t.is_file()) {
            continue;
        }
        scanned += 1;
        let path = entry.into_path();
        let name = match path.file_name().and_then(|n| n.to_str()) {
            Some(n) => n,
            None => continue,
        };
        let stem = artifact_stem(name);
        let id = artifact_id(dir, &path, stem);
        let key = match artifact::match_stem(stem) {
            None => {
                if verbose >= 3 {
                    eprintln!("skipping non-artifact file {}", path.display());
                }
                continue;
            }
            Some(Err(e)) => {
                malformed.entry(id).or_insert_with(|| e.to_string());
                continue;
            }
            Some(Ok(k)) => k,
        };
        if verbose >= 2 {
            eprintln!("found artifact file {}", path.display());
        }
        let grp = groups
            .entry(id.clone())
            .or_insert_with(|| ArtifactFiles { id, key, log: None, data: Vec::new() });
        if name.ends_with(".log") {
            grp.log = Some(path);
        } else {
            grp.data.push(path);
        }
    }
    for grp in groups.values_mut() {
        grp.data.sort();
    }

    let mut notes: Vec<ParseNote> = malformed
        .into_iter()
        .map(|(artifact, reason)| ParseNote { artifact, reason })
        .collect();

    let files: Vec<ArtifactFiles> = groups.into_values().collect();
    if verbose >= 1 {
        eprintln!("parsing {} artifacts from {}", files.len(), dir.display());
    }
    let parsed: Vec<(ConfigurationResult, Vec<ParseNote>)> =
        files.par_iter().map(artifact::parse_artifact).collect();

    let mut by_key: BTreeMap<(u64, u32), ConfigurationResult> = BTreeMap::new();
    for (rec, mut rec_notes) in parsed {
        notes.append(&mut rec_notes);
        let key = (rec.object_size_bytes, rec.concurrency);
        if let Some(prev) = by_key.insert(key, rec) {
            notes.push(ParseNote {
                artifact: prev.source_artifact.clone(),
                reason: format!("superseded by rerun {}", by_key[&key].source_artifact),
            });
        }
    }

    if by_key.is_empty() {
        return Err(DiscoveryError::NoArtifacts { path: dir.to_path_buf(), scanned });
    }

    Ok(Assembly {
        dataset: PerformanceDataset::from_records(by_key.into_values().collect()),
        notes,
        scanned_files: scanned,
    })
}

const STRIP_EXTS: [&str; 12] =
    ["log", "csv", "zst", "zstd", "gz", "tgz", "json", "txt", "bz2", "xz", "lz4", "br"];

// Strip known extension chains from the right (`.csv.zst`, `.log`) so dots
// inside a size token (`put_0.5MiB_c8`) survive.
fn artifact_stem(name: &str) -> &str {
    let mut stem = name;
    while let Some(i) = stem.rfind('.') {
        let ext = stem[i + 1..].to_ascii_lowercase();
        if !ext.is_empty() && STRIP_EXTS.contains(&ext.as_str()) {
            stem = &stem[..i];
        } else {
            break;
        }
    }
    stem
}

fn artifact_id(root: &Path, path: &Path, stem: &str) -> String {
    let rel_parent = path
        .parent()
        .and_then(|p| p.strip_prefix(root).ok())
        .unwrap_or_else(|| Path::new(""));
    if rel_parent.as_os_str().is_empty() {
        stem.to_string()
    } else {
        format!("{}/{}", rel_parent.display(), stem)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn sample_log(op: &str, concurrency: u32, mb_s: f64, ops: f64) -> String {
        format!(
            "Report: {op}. Concurrency: {concurrency}. Ran: 60s\n \
             * Average: {mb_s:.2} MiB/s, {ops:.2} obj/s\n \
             * Reqs: Avg: 5.0ms, 50%: 4.0ms, 90%: 6.0ms, 99%: 9.0ms\n \
             * Reqs: 600, Errs:0, Objs:600\n"
        )
    }

    #[test]
    fn assembles_sorted_and_indexed() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("put_4MiB_c8.log"), sample_log("PUT", 8, 200.0, 50.0)).unwrap();
        fs::write(dir.path().join("put_1KiB_c16.log"), sample_log("PUT", 16, 10.0, 10240.0)).unwrap();
        fs::write(dir.path().join("put_1KiB_c8.log"), sample_log("PUT", 8, 8.0, 8192.0)).unwrap();
        fs::write(dir.path().join("notes.txt"), "not an artifact").unwrap();

        let asm = assemble(dir.path(), 0).unwrap();
        let ds = &asm.dataset;
        assert_eq!(ds.len(), 3);
        assert_eq!(ds.sizes(), &[1024, 4 * 1024 * 1024]);
        assert_eq!(ds.concurrencies(), &[8, 16]);
        let order: Vec<(u64, u32)> =
            ds.results().iter().map(|r| (r.object_size_bytes, r.concurrency)).collect();
        assert_eq!(order, vec![(1024, 8), (1024, 16), (4 * 1024 * 1024, 8)]);
    }

    #[test]
    fn later_artifact_id_wins_duplicates() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("put_1KiB_c8.log"), sample_log("PUT", 8, 8.0, 8192.0)).unwrap();
        let sub = dir.path().join("rerun");
        fs::create_dir(&sub).unwrap();
        fs::write(sub.join("put_1KiB_c8.log"), sample_log("PUT", 8, 9.0, 9216.0)).unwrap();

        let asm = assemble(dir.path(), 0).unwrap();
        assert_eq!(asm.dataset.len(), 1);
        let rec = &asm.dataset.results()[0];
        assert_eq!(rec.source_artifact, "rerun/put_1KiB_c8");
        assert_eq!(rec.throughput_mb_s, Some(9.0));
        assert!(asm
            .notes
            .iter()
            .any(|n| n.artifact == "put_1KiB_c8" && n.reason.contains("superseded")));
    }

    #[test]
    fn malformed_names_are_reported_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("put_1KiB_c8.log"), sample_log("PUT", 8, 8.0, 8192.0)).unwrap();
        fs::write(dir.path().join("put_4XB_c12.log"), "junk").unwrap();

        let asm = assemble(dir.path(), 0).unwrap();
        assert_eq!(asm.dataset.len(), 1);
        assert!(asm
            .notes
            .iter()
            .any(|n| n.artifact == "put_4XB_c12" && n.reason.contains("4XB")));
    }

    #[test]
    fn stem_stripping_keeps_fractional_size_tokens() {
        assert_eq!(artifact_stem("put_4MiB_c256.csv.zst"), "put_4MiB_c256");
        assert_eq!(artifact_stem("put_4MiB_c256.log"), "put_4MiB_c256");
        assert_eq!(artifact_stem("put_0.5MiB_c8.log"), "put_0.5MiB_c8");
        assert_eq!(artifact_stem("put_4MiB_c256"), "put_4MiB_c256");
    }

    #[test]
    fn empty_directory_is_a_discovery_error() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("unrelated.txt"), "nope").unwrap();
        match assemble(dir.path(), 0) {
            Err(DiscoveryError::NoArtifacts { scanned, .. }) => assert_eq!(scanned, 1),
            other => panic!("expected NoArtifacts, got {:?}", other.err()),
        }
    }

    #[test]
    fn missing_directory_is_a_discovery_error() {
        let dir = tempfile::tempdir().unwrap();
        let gone = dir.path().join("never-there");
        assert!(matches!(assemble(&gone, 0), Err(DiscoveryError::Missing(_))));
    }
}
