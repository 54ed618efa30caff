use std::fs;
use std::fs::File;
use std::time::Instant;

use cpu_time::ProcessTime;

mod artifact;
mod cli;
mod dataset;
mod errors;
mod report;
mod rollup;
mod units;

use cli::get_cli;

fn main() {
    if let Err(err) = run() {
        eprintln!("error: {}", &err);
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let start_f = Instant::now();
    let startcpu = ProcessTime::now();

    let cfg = get_cli()?;

    if cfg.verbose >= 1 {
        eprintln!("scanning results under {}", cfg.results_dir.display());
    }
    let assembly = dataset::assemble(&cfg.results_dir, cfg.verbose)?;
    let roll = rollup::compute(&assembly.dataset, cfg.tolerance);
    let summary = report::render_summary(&assembly.dataset, &roll, &assembly.notes, cfg.tolerance);

    if let Some(out_dir) = &cfg.output_dir {
        fs::create_dir_all(out_dir)?;
        let summary_path = out_dir.join("performance_summary.txt");
        fs::write(&summary_path, &summary)?;
        let dataset_path = out_dir.join("dataset.csv");
        report::write_dataset_csv(&assembly.dataset, File::create(&dataset_path)?)?;
        if cfg.verbose >= 1 {
            eprintln!("wrote {} and {}", summary_path.display(), dataset_path.display());
        }
        print!("{}", summary);
    } else {
        let stdout = std::io::stdout();
        let mut writer = stdout.lock();
        if cfg.csv_output {
            report::write_dataset_csv(&assembly.dataset, &mut writer)?;
        } else {
            report::dataset_table(&assembly.dataset).print(&mut writer)?;
        }
        drop(writer);
        print!("{}", summary);
    }

    if cfg.verbose >= 1 || cfg.stats {
        let elapsed = start_f.elapsed();
        let sec: f64 = (elapsed.as_secs() as f64) + (elapsed.subsec_nanos() as f64 / 1_000_000_000.0);
        let elapsedcpu = startcpu.elapsed();
        let seccpu: f64 =
            (elapsedcpu.as_secs() as f64) + (elapsedcpu.subsec_nanos() as f64 / 1_000_000_000.0);
        eprintln!(
            "files: {}  records: {}  notes: {}  time: {:.3}  cpu: {:.3}",
            assembly.scanned_files,
            assembly.dataset.len(),
            assembly.notes.len(),
            sec,
            seccpu
        );
    }

    Ok(())
}
