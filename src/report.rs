use std::error::Error;
use std::io::Write;

use prettytable::{format, Cell, Row, Table};

use crate::artifact::ParseNote;
use crate::dataset::PerformanceDataset;
use crate::rollup::Rollup;
use crate::units::{format_size, format_throughput};

const RULE_WIDTH: usize = 80;

fn opt_metric(v: Option<f64>) -> String {
    match v {
        Some(x) => format!("{:.2}", x),
        None => "-".to_string(),
    }
}

/// Render the plain-text summary. Output is deterministic for a given
/// dataset: sections iterate ascending size, then ascending concurrency.
pub fn render_summary(
    ds: &PerformanceDataset,
    roll: &Rollup<'_>,
    notes: &[ParseNote],
    tolerance_pct: f64,
) -> String {
    let heavy = "=".repeat(RULE_WIDTH);
    let light = "-".repeat(RULE_WIDTH);
    let mut out = String::with_capacity(2048);

    out.push_str(&format!("{}\n", heavy));
    out.push_str("S3 WARP PERFORMANCE TEST SUMMARY\n");
    out.push_str(&format!("{}\n\n", heavy));

    let successful = ds.results().iter().filter(|r| r.success()).count();
    out.push_str(&format!("Configurations: {}\n", ds.len()));
    out.push_str(&format!(
        "Object sizes: {}  Concurrency levels: {}\n",
        ds.sizes().len(),
        ds.concurrencies().len()
    ));
    out.push_str(&format!("Successful: {}\n", successful));
    out.push_str(&format!("Failed (errors reported): {}\n", ds.len() - successful));
    out.push_str(&format!("Parse notes: {}\n\n", notes.len()));

    out.push_str("BEST OVERALL CONFIGURATION:\n");
    out.push_str(&format!("{}\n", light));
    match roll.global_best {
        Some(best) => {
            out.push_str(&format!("Object Size: {}\n", format_size(best.object_size_bytes)));
            out.push_str(&format!("Concurrency: {}\n", best.concurrency));
            out.push_str(&format!(
                "Throughput: {}\n",
                format_throughput(best.throughput_mb_s.unwrap_or(0.0))
            ));
            out.push_str(&format!("Operations/sec: {}\n", opt_metric(best.ops_per_sec)));
            out.push_str(&format!("Avg Latency: {} ms\n", opt_metric(best.avg_latency_ms)));
            out.push_str(&format!("P99 Latency: {} ms\n", opt_metric(best.p99_latency_ms)));
            out.push_str(&format!("Source: {}\n", best.source_artifact));
        }
        None => out.push_str("no configuration reported a throughput\n"),
    }
    out.push('\n');

    out.push_str("BEST CONFIGURATION BY OBJECT SIZE:\n");
    out.push_str(&format!("{}\n", light));
    for (&size, best) in &roll.best_per_size {
        let ops = match best.ops_per_sec {
            Some(o) => format!("{:.0} ops/s", o),
            None => "ops/s unknown".to_string(),
        };
        out.push_str(&format!(
            "{:>10}: c={:<6} -> {:>12} ({})\n",
            format_size(size),
            best.concurrency,
            format_throughput(best.throughput_mb_s.unwrap_or(0.0)),
            ops
        ));
    }
    if roll.best_per_size.is_empty() {
        out.push_str("none\n");
    }
    out.push('\n');

    out.push_str("THROUGHPUT BY CONCURRENCY (mean across sizes):\n");
    out.push_str(&format!("{}\n", light));
    for m in &roll.concurrency_means {
        out.push_str(&format!(
            "{:>10}: {:>12} over {} size(s)\n",
            format!("c={}", m.concurrency),
            format_throughput(m.mean_mb_s),
            m.samples
        ));
    }
    if let Some(peak) = roll.peak_concurrency {
        out.push_str(&format!("Peak mean throughput at concurrency: {}\n", peak));
    }
    out.push('\n');

    out.push_str(&format!("DEGRADATION POINTS (adjacent drop > {:.1}%):\n", tolerance_pct));
    out.push_str(&format!("{}\n", light));
    if roll.degradation_points.is_empty() {
        out.push_str("none detected\n");
    }
    for dp in roll.degradation_points.values() {
        out.push_str(&format!(
            "{:>10}: c={} -> c={}  {:.2} -> {:.2} MB/s  (-{:.1}%)\n",
            format_size(dp.object_size_bytes),
            dp.from_concurrency,
            dp.to_concurrency,
            dp.from_mb_s,
            dp.to_mb_s,
            dp.drop_pct()
        ));
    }
    for &size in &roll.insufficient {
        out.push_str(&format!(
            "{:>10}: insufficient data (fewer than two concurrency levels)\n",
            format_size(size)
        ));
    }
    out.push('\n');

    if !notes.is_empty() {
        out.push_str("PARSE FAILURES:\n");
        out.push_str(&format!("{}\n", light));
        for note in notes {
            out.push_str(&format!("{}: {}\n", note.artifact, note.reason));
        }
        out.push('\n');
    }

    out.push_str(&format!("{}\n", heavy));
    out
}

/// One row per configuration, one column per attribute; absent metrics are
/// empty cells. This is the table handed to the charting side.
pub fn write_dataset_csv<W: Write>(ds: &PerformanceDataset, w: W) -> Result<(), Box<dyn Error>> {
    let mut wtr = csv::Writer::from_writer(w);
    for rec in ds.results() {
        wtr.serialize(rec)?;
    }
    wtr.flush()?;
    Ok(())
}

/// Console rendering of the dataset, teacher-table style.
pub fn dataset_table(ds: &PerformanceDataset) -> Table {
    let mut table = Table::new();
    table.set_format(*format::consts::FORMAT_NO_BORDER_LINE_SEPARATOR);
    table.set_titles(Row::new(vec![
        Cell::new("size"),
        Cell::new("bytes"),
        Cell::new("conc"),
        Cell::new("MB/s"),
        Cell::new("ops/s"),
        Cell::new("avg ms"),
        Cell::new("p99 ms"),
        Cell::new("errs"),
        Cell::new("source"),
    ]));
    for rec in ds.results() {
        let mut vcell = vec![];
        vcell.push(Cell::new(&rec.size));
        vcell.push(Cell::new(&rec.object_size_bytes.to_string()));
        vcell.push(Cell::new(&rec.concurrency.to_string()));
        vcell.push(Cell::new(&opt_metric(rec.throughput_mb_s)));
        vcell.push(Cell::new(&opt_metric(rec.ops_per_sec)));
        vcell.push(Cell::new(&opt_metric(rec.avg_latency_ms)));
        vcell.push(Cell::new(&opt_metric(rec.p99_latency_ms)));
        vcell.push(Cell::new(&rec.errors.to_string()));
        vcell.push(Cell::new(&rec.source_artifact));
        table.add_row(Row::new(vcell));
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::ConfigurationResult;
    use crate::rollup;

    fn rec(size: u64, concurrency: u32, thr: f64) -> ConfigurationResult {
        ConfigurationResult {
            operation: "put".to_string(),
            size: crate::units::format_size(size),
            object_size_bytes: size,
            concurrency,
            throughput_mb_s: Some(thr),
            ops_per_sec: Some(thr * 2.0),
            avg_latency_ms: Some(12.5),
            p99_latency_ms: Some(30.25),
            errors: 0,
            total_ops: 500,
            source_artifact: format!("put_{}_c{}", crate::units::format_size(size), concurrency),
        }
    }

    #[test]
    fn summary_is_deterministic() {
        let ds = PerformanceDataset::from_records(vec![
            rec(1 << 20, 8, 100.0),
            rec(1 << 20, 16, 80.0),
            rec(1 << 10, 8, 10.0),
        ]);
        let roll = rollup::compute(&ds, 5.0);
        let a = render_summary(&ds, &roll, &[], 5.0);
        let b = render_summary(&ds, &roll, &[], 5.0);
        assert_eq!(a, b);
        assert!(a.contains("S3 WARP PERFORMANCE TEST SUMMARY"));
        assert!(a.contains("Object Size: 1MiB"));
        assert!(a.contains("Concurrency: 8"));
        // 20% drop from c8 to c16 at 1MiB
        assert!(a.contains("c=8 -> c=16"));
        assert!(a.contains("(-20.0%)"));
        // 1KiB has a single level
        assert!(a.contains("1KiB: insufficient data"));
    }

    #[test]
    fn csv_dataset_has_one_row_per_record() {
        let ds = PerformanceDataset::from_records(vec![rec(1 << 20, 8, 100.0)]);
        let mut buf = Vec::new();
        write_dataset_csv(&ds, &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next().unwrap(),
            "operation,size,object_size_bytes,concurrency,throughput_mb_s,ops_per_sec,avg_latency_ms,p99_latency_ms,errors,total_ops,source_artifact"
        );
        assert_eq!(
            lines.next().unwrap(),
            "put,1MiB,1048576,8,100.0,200.0,12.5,30.25,0,500,put_1MiB_c8"
        );
        assert!(lines.next().is_none());
    }

    #[test]
    fn table_renders_absent_metrics_as_dashes() {
        let mut r = rec(1 << 20, 8, 100.0);
        r.throughput_mb_s = None;
        r.ops_per_sec = None;
        let ds = PerformanceDataset::from_records(vec![r]);
        let rendered = dataset_table(&ds).to_string();
        assert!(rendered.contains('-'));
        assert!(rendered.contains("1MiB"));
    }
}
