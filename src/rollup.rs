use std::cmp::Ordering;
use std::collections::BTreeMap;

use itertools::Itertools;

use crate::artifact::ConfigurationResult;
use crate::dataset::PerformanceDataset;

/// Throughput fell past the tolerance between two adjacent tested
/// concurrency levels for one object size.
#[derive(Debug, Clone)]
pub struct DegradationPoint {
    pub object_size_bytes: u64,
    pub from_concurrency: u32,
    pub to_concurrency: u32,
    pub from_mb_s: f64,
    pub to_mb_s: f64,
}

impl DegradationPoint {
    pub fn drop_pct(&self) -> f64 {
        (self.from_mb_s - self.to_mb_s) / self.from_mb_s * 100.0
    }
}

/// Mean throughput across all object sizes tested at one concurrency level.
#[derive(Debug, Clone)]
pub struct ConcurrencyMean {
    pub concurrency: u32,
    pub mean_mb_s: f64,
    pub samples: usize,
}

/// Derived view over a complete dataset. Recomputed from scratch, never
/// mutated in place.
pub struct Rollup<'a> {
    pub global_best: Option<&'a ConfigurationResult>,
    pub best_per_size: BTreeMap<u64, &'a ConfigurationResult>,
    /// First degrading adjacent pair per size; sizes without one are absent.
    pub degradation_points: BTreeMap<u64, DegradationPoint>,
    /// Sizes with fewer than two usable concurrency levels.
    pub insufficient: Vec<u64>,
    pub concurrency_means: Vec<ConcurrencyMean>,
    pub peak_concurrency: Option<u32>,
}

// Equal throughput prefers the cheaper configuration: lower concurrency,
// then smaller object size.
fn beats(a: &ConfigurationResult, b: &ConfigurationResult) -> bool {
    let ta = a.throughput_mb_s.unwrap_or(0.0);
    let tb = b.throughput_mb_s.unwrap_or(0.0);
    match ta.total_cmp(&tb) {
        Ordering::Greater => true,
        Ordering::Less => false,
        Ordering::Equal => (a.concurrency, a.object_size_bytes) < (b.concurrency, b.object_size_bytes),
    }
}

pub fn compute(ds: &PerformanceDataset, tolerance_pct: f64) -> Rollup<'_> {
    let mut global_best: Option<&ConfigurationResult> = None;
    let mut best_per_size: BTreeMap<u64, &ConfigurationResult> = BTreeMap::new();
    for rec in ds.results() {
        if rec.throughput_mb_s.is_none() {
            continue;
        }
        if global_best.map_or(true, |b| beats(rec, b)) {
            global_best = Some(rec);
        }
        best_per_size
            .entry(rec.object_size_bytes)
            .and_modify(|b| {
                if beats(rec, b) {
                    *b = rec;
                }
            })
            .or_insert(rec);
    }

    // Adjacent tested levels only: no interpolation, no monotonicity
    // assumption between non-adjacent levels.
    let mut degradation_points = BTreeMap::new();
    let mut insufficient = Vec::new();
    for (size, group) in &ds.results().iter().chunk_by(|r| r.object_size_bytes) {
        let levels: Vec<(u32, f64)> = group
            .filter_map(|r| r.throughput_mb_s.map(|t| (r.concurrency, t)))
            .collect();
        if levels.len() < 2 {
            insufficient.push(size);
            continue;
        }
        for pair in levels.windows(2) {
            let (c0, t0) = pair[0];
            let (c1, t1) = pair[1];
            if t0 > 0.0 && (t0 - t1) / t0 * 100.0 > tolerance_pct {
                degradation_points.insert(
                    size,
                    DegradationPoint {
                        object_size_bytes: size,
                        from_concurrency: c0,
                        to_concurrency: c1,
                        from_mb_s: t0,
                        to_mb_s: t1,
                    },
                );
                break;
            }
        }
    }

    let mut concurrency_means = Vec::new();
    for &c in ds.concurrencies() {
        let samples: Vec<f64> = ds
            .results()
            .iter()
            .filter(|r| r.concurrency == c)
            .filter_map(|r| r.throughput_mb_s)
            .collect();
        if samples.is_empty() {
            continue;
        }
        concurrency_means.push(ConcurrencyMean {
            concurrency: c,
            mean_mb_s: samples.iter().sum::<f64>() / samples.len() as f64,
            samples: samples.len(),
        });
    }
    let peak_concurrency = concurrency_means
        .iter()
        .max_by(|a, b| {
            a.mean_mb_s
                .total_cmp(&b.mean_mb_s)
                .then(b.concurrency.cmp(&a.concurrency))
        })
        .map(|m| m.concurrency);

    Rollup {
        global_best,
        best_per_size,
        degradation_points,
        insufficient,
        concurrency_means,
        peak_concurrency,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(size: u64, concurrency: u32, thr: Option<f64>) -> ConfigurationResult {
        ConfigurationResult {
            operation: "put".to_string(),
            size: crate::units::format_size(size),
            object_size_bytes: size,
            concurrency,
            throughput_mb_s: thr,
            ops_per_sec: thr.map(|t| t * 4.0),
            avg_latency_ms: Some(10.0),
            p99_latency_ms: Some(25.0),
            errors: 0,
            total_ops: 100,
            source_artifact: format!("put_{}_c{}", size, concurrency),
        }
    }

    fn dataset(records: Vec<ConfigurationResult>) -> PerformanceDataset {
        PerformanceDataset::from_records(records)
    }

    #[test]
    fn best_per_size_prefers_higher_throughput() {
        let ds = dataset(vec![
            rec(4 << 20, 64, Some(500.0)),
            rec(4 << 20, 128, Some(480.0)),
        ]);
        let roll = compute(&ds, 5.0);
        assert_eq!(roll.best_per_size[&(4 << 20)].concurrency, 64);
        // 4% drop is inside a 5% tolerance
        assert!(roll.degradation_points.is_empty());
        let roll = compute(&ds, 3.0);
        let dp = &roll.degradation_points[&(4 << 20)];
        assert_eq!((dp.from_concurrency, dp.to_concurrency), (64, 128));
        assert!((dp.drop_pct() - 4.0).abs() < 1e-9);
    }

    #[test]
    fn global_best_tie_breaks_to_lower_concurrency() {
        let ds = dataset(vec![
            rec(1 << 20, 64, Some(1000.0)),
            rec(4 << 20, 16, Some(1000.0)),
        ]);
        let roll = compute(&ds, 5.0);
        let best = roll.global_best.unwrap();
        assert_eq!(best.concurrency, 16);
        assert_eq!(best.object_size_bytes, 4 << 20);
    }

    #[test]
    fn degradation_uses_first_adjacent_pair_only() {
        let ds = dataset(vec![
            rec(1 << 20, 8, Some(100.0)),
            rec(1 << 20, 16, Some(99.0)),
            rec(1 << 20, 32, Some(90.0)),
            rec(1 << 20, 64, Some(95.0)),
        ]);
        let roll = compute(&ds, 5.0);
        let dp = &roll.degradation_points[&(1 << 20)];
        // 8->16 drops 1%, 16->32 drops 9.09% and is the first flagged pair
        assert_eq!((dp.from_concurrency, dp.to_concurrency), (16, 32));
    }

    #[test]
    fn single_level_sizes_are_insufficient_not_errors() {
        let ds = dataset(vec![rec(1 << 10, 8, Some(10.0)), rec(1 << 20, 8, Some(50.0)), rec(1 << 20, 16, Some(60.0))]);
        let roll = compute(&ds, 5.0);
        assert_eq!(roll.insufficient, vec![1 << 10]);
        assert!(!roll.degradation_points.contains_key(&(1 << 10)));
    }

    #[test]
    fn records_without_throughput_are_skipped() {
        let ds = dataset(vec![rec(1 << 20, 8, None), rec(1 << 20, 16, Some(50.0))]);
        let roll = compute(&ds, 5.0);
        assert_eq!(roll.global_best.unwrap().concurrency, 16);
        // only one usable level for the size
        assert_eq!(roll.insufficient, vec![1 << 20]);
    }

    #[test]
    fn peak_concurrency_prefers_lower_level_on_ties() {
        let ds = dataset(vec![
            rec(1 << 20, 16, Some(100.0)),
            rec(1 << 20, 64, Some(100.0)),
        ]);
        let roll = compute(&ds, 5.0);
        assert_eq!(roll.peak_concurrency, Some(16));
        assert_eq!(roll.concurrency_means.len(), 2);
    }
}
