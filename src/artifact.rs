use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use grep_cli::DecompressionReader;
use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;

use crate::errors::ParseError;
use crate::units;

lazy_static! {
    // put_4MiB_c256 -> (op, size token, concurrency)
    static ref STEM_RE: Regex =
        Regex::new(r"^([a-z][a-z0-9-]*)_([0-9][0-9A-Za-z.]*)_c([0-9]+)$").unwrap();
    // warp summary block:
    //   Report: PUT. Concurrency: 256. Ran: 57s
    //    * Average: 512.33 MiB/s, 128.08 obj/s
    static ref AVERAGE_RE: Regex = Regex::new(
        r"(?i)Report:[^\n]*\n\s*\*\s*Average:\s+([0-9.]+)\s+((?:Ki|Mi|Gi|K|M|G)B/s),\s+([0-9.]+)\s+obj/s"
    )
    .unwrap();
    //  * Reqs: Avg: 83.1ms, 50%: 75.2ms, 90%: 120.0ms, 99%: 150.3ms
    static ref LATENCY_RE: Regex =
        Regex::new(r"(?i)Reqs:\s+Avg:\s+([0-9.]+)ms,[^\n]*?99%:\s+([0-9.]+)ms").unwrap();
    //  * Reqs: 1796, Errs:0, Objs:1796
    static ref ERRS_RE: Regex = Regex::new(r"Errs:\s*([0-9]+)").unwrap();
    static ref TOTAL_RE: Regex = Regex::new(r"Reqs:\s*([0-9]+),\s*Errs:").unwrap();
}

/// The (size, concurrency) coordinates a result artifact encodes in its name.
#[derive(Debug, Clone)]
pub struct ArtifactKey {
    pub operation: String,
    pub size_token: String,
    pub object_size_bytes: u64,
    pub concurrency: u32,
}

/// One fully parsed configuration. Metric fields stay `None` when the
/// artifact's summary did not yield them; the miss is recorded separately.
#[derive(Debug, Clone, Serialize)]
pub struct ConfigurationResult {
    pub operation: String,
    pub size: String,
    pub object_size_bytes: u64,
    pub concurrency: u32,
    pub throughput_mb_s: Option<f64>,
    pub ops_per_sec: Option<f64>,
    pub avg_latency_ms: Option<f64>,
    pub p99_latency_ms: Option<f64>,
    pub errors: u64,
    pub total_ops: u64,
    pub source_artifact: String,
}

impl ConfigurationResult {
    pub fn success(&self) -> bool {
        self.errors == 0
    }
}

/// Parse-report entry: something went wrong with one artifact, the run keeps
/// going.
#[derive(Debug, Clone)]
pub struct ParseNote {
    pub artifact: String,
    pub reason: String,
}

/// The files that belong to one artifact stem: the runner writes a data file
/// (commonly `.csv.zst`) plus a `.log` of the same stem.
#[derive(Debug)]
pub struct ArtifactFiles {
    pub id: String,
    pub key: ArtifactKey,
    pub log: Option<PathBuf>,
    pub data: Vec<PathBuf>,
}

/// Match a filename stem against the `<op>_<size>_c<concurrency>` convention.
/// `None` means the name is not artifact-shaped at all (skipped silently);
/// `Some(Err(..))` means it follows the convention but encodes a malformed
/// size or concurrency.
pub fn match_stem(stem: &str) -> Option<Result<ArtifactKey, ParseError>> {
    let caps = STEM_RE.captures(stem)?;
    let size_token = caps[2].to_string();
    let concurrency: u32 = match caps[3].parse() {
        Ok(c) if c > 0 => c,
        _ => return Some(Err(ParseError::Concurrency(caps[3].to_string()))),
    };
    let object_size_bytes = match units::parse_size(&size_token) {
        Ok(b) => b,
        Err(e) => return Some(Err(e)),
    };
    Some(Ok(ArtifactKey {
        operation: caps[1].to_string(),
        size_token,
        object_size_bytes,
        concurrency,
    }))
}

/// Open a file for reading, transparently decompressing by extension.
/// gzip and zstd are decoded in-process; rarer formats go through grep-cli's
/// external-decoder fallback.
pub fn open_decompress(path: &Path) -> Result<Box<dyn Read>, ParseError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();
    match ext.as_str() {
        "gz" | "tgz" => {
            let file = File::open(path)?;
            Ok(Box::new(GzDecoder::new(BufReader::new(file))))
        }
        "zst" | "zstd" => {
            let file = File::open(path)?;
            let dec = zstd::stream::read::Decoder::new(BufReader::new(file))?;
            Ok(Box::new(dec))
        }
        "bz2" | "tbz2" | "xz" | "txz" | "lz4" | "lzma" | "br" | "z" => {
            let rdr = DecompressionReader::new(path).map_err(|e| {
                ParseError::Io(std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))
            })?;
            Ok(Box::new(rdr))
        }
        _ => {
            let file = File::open(path)?;
            Ok(Box::new(BufReader::new(file)))
        }
    }
}

fn read_text(path: &Path) -> Result<String, ParseError> {
    let mut rdr = open_decompress(path)?;
    let mut out = String::new();
    rdr.read_to_string(&mut out)?;
    Ok(out)
}

/// Metrics pulled from one warp log's own summary output.
#[derive(Debug, Default, Clone)]
pub struct LogSummary {
    pub throughput_mb_s: Option<f64>,
    pub ops_per_sec: Option<f64>,
    pub avg_latency_ms: Option<f64>,
    pub p99_latency_ms: Option<f64>,
    pub errors: u64,
    pub total_ops: u64,
}

/// Extract the summary metrics warp reports at the end of a run. Absent or
/// unparseable lines leave the corresponding field at its default.
pub fn parse_warp_log(content: &str) -> LogSummary {
    let mut out = LogSummary::default();
    if let Some(caps) = AVERAGE_RE.captures(content) {
        if let Ok(v) = caps[1].parse::<f64>() {
            // normalize to MB/s the way the charting side expects
            out.throughput_mb_s = Some(match caps[2].chars().next() {
                Some('K') | Some('k') => v / 1024.0,
                Some('G') | Some('g') => v * 1024.0,
                _ => v,
            });
        }
        out.ops_per_sec = caps[3].parse().ok();
    }
    if let Some(caps) = LATENCY_RE.captures(content) {
        out.avg_latency_ms = caps[1].parse().ok();
        out.p99_latency_ms = caps[2].parse().ok();
    }
    if let Some(caps) = ERRS_RE.captures(content) {
        out.errors = caps[1].parse().unwrap_or(0);
    }
    if let Some(caps) = TOTAL_RE.captures(content) {
        out.total_ops = caps[1].parse().unwrap_or(0);
    }
    out
}

/// Fallback for stems without a usable log: scan the decompressed data rows
/// (operation,objects,bytes,duration,throughput,ops/s,errors) and keep the
/// peak throughput and ops rate over PUT/GET rows, summing error counts.
fn scan_data_rows<R: Read>(rdr: R) -> Result<Option<(f64, f64, u64)>, ParseError> {
    let mut csv_rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .comment(Some(b'#'))
        .from_reader(rdr);
    let mut max_thr: Option<f64> = None;
    let mut max_ops: f64 = 0.0;
    let mut errors = 0u64;
    for record in csv_rdr.records() {
        let record = match record {
            Ok(r) => r,
            Err(_) => continue,
        };
        if record.len() < 6 {
            continue;
        }
        let op = record.get(0).unwrap_or("").to_ascii_uppercase();
        if !(op.contains("PUT") || op.contains("GET")) {
            continue;
        }
        let thr: f64 = match record.get(4).and_then(|s| s.trim().parse().ok()) {
            Some(v) => v,
            None => continue,
        };
        if max_thr.map_or(true, |m| thr > m) {
            max_thr = Some(thr);
        }
        if let Some(ops) = record.get(5).and_then(|s| s.trim().parse::<f64>().ok()) {
            if ops > max_ops {
                max_ops = ops;
            }
        }
        if let Some(e) = record.get(6).and_then(|s| s.trim().parse::<u64>().ok()) {
            errors += e;
        }
    }
    Ok(max_thr.map(|t| (t, max_ops, errors)))
}

/// Turn one artifact's files into a [`ConfigurationResult`]. Never fails:
/// anything that goes wrong becomes a [`ParseNote`] and the record keeps its
/// fields absent.
pub fn parse_artifact(files: &ArtifactFiles) -> (ConfigurationResult, Vec<ParseNote>) {
    let mut notes = Vec::new();
    let mut summary = LogSummary::default();

    if let Some(log) = &files.log {
        match read_text(log) {
            Ok(text) => summary = parse_warp_log(&text),
            Err(e) => notes.push(ParseNote {
                artifact: files.id.clone(),
                reason: format!("log unreadable: {}", e),
            }),
        }
    }

    if summary.throughput_mb_s.is_none() {
        for path in &files.data {
            let scanned = open_decompress(path).and_then(scan_data_rows);
            match scanned {
                Ok(Some((thr, ops, errs))) => {
                    summary.throughput_mb_s = Some(thr);
                    if summary.ops_per_sec.is_none() && ops > 0.0 {
                        summary.ops_per_sec = Some(ops);
                    }
                    if summary.errors == 0 {
                        summary.errors = errs;
                    }
                    break;
                }
                Ok(None) => {}
                Err(e) => notes.push(ParseNote {
                    artifact: files.id.clone(),
                    reason: format!("data artifact {}: {}", path.display(), e),
                }),
            }
        }
    }

    let mut missing = Vec::new();
    if summary.throughput_mb_s.is_none() {
        missing.push("throughput");
    }
    if summary.ops_per_sec.is_none() {
        missing.push("ops/sec");
    }
    if summary.p99_latency_ms.is_none() {
        missing.push("p99 latency");
    }
    if !missing.is_empty() {
        notes.push(ParseNote {
            artifact: files.id.clone(),
            reason: format!("missing summary fields: {}", missing.join(", ")),
        });
    }

    let result = ConfigurationResult {
        operation: files.key.operation.clone(),
        size: files.key.size_token.clone(),
        object_size_bytes: files.key.object_size_bytes,
        concurrency: files.key.concurrency,
        throughput_mb_s: summary.throughput_mb_s,
        ops_per_sec: summary.ops_per_sec,
        avg_latency_ms: summary.avg_latency_ms,
        p99_latency_ms: summary.p99_latency_ms,
        errors: summary.errors,
        total_ops: summary.total_ops,
        source_artifact: files.id.clone(),
    };
    (result, notes)
}
