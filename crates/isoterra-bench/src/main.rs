use std::path::PathBuf;
use std::process;

use isoterra_bench::report;
use isoterra_bench::runner::TerrainRunner;
use isoterra_core::config::{load_config_file, PipelineConfig};
use isoterra_tables::{write_tables, McTables};

fn fail(message: impl std::fmt::Display) -> ! {
    log::error!("{message}");
    process::exit(1);
}

fn next_arg(args: &[String], i: usize, flag: &str) -> String {
    match args.get(i) {
        Some(value) => value.clone(),
        None => fail(format!("missing value for {flag}")),
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = std::env::args().collect();

    let mut config_path: Option<PathBuf> = None;
    let mut output_path: Option<PathBuf> = None;
    let mut baseline_path: Option<PathBuf> = None;
    let mut luts_dir: Option<PathBuf> = None;
    let mut regression_threshold = 10.0f64;
    let mut cycles = 1u32;
    let mut upload = false;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--config" => {
                i += 1;
                config_path = Some(PathBuf::from(next_arg(&args, i, "--config")));
            }
            "--output" => {
                i += 1;
                output_path = Some(PathBuf::from(next_arg(&args, i, "--output")));
            }
            "--baseline" => {
                i += 1;
                baseline_path = Some(PathBuf::from(next_arg(&args, i, "--baseline")));
            }
            "--write-luts" => {
                i += 1;
                luts_dir = Some(PathBuf::from(next_arg(&args, i, "--write-luts")));
            }
            "--regression-threshold" => {
                i += 1;
                regression_threshold = next_arg(&args, i, "--regression-threshold")
                    .parse()
                    .unwrap_or_else(|_| fail("invalid --regression-threshold value"));
            }
            "--cycles" => {
                i += 1;
                cycles = next_arg(&args, i, "--cycles")
                    .parse()
                    .unwrap_or_else(|_| fail("invalid --cycles value"));
            }
            "--upload" => upload = true,
            "--help" | "-h" => {
                eprintln!("Usage: terrain-runner [OPTIONS]");
                eprintln!("  --config <path>                RON pipeline config (defaults otherwise)");
                eprintln!("  --cycles <n>                   Full cycles to run (default: 1)");
                eprintln!("  --upload                       Upload the final geometry to a GPU");
                eprintln!("  --output <path>                Save the run as a JSON report");
                eprintln!("  --baseline <path>              Compare against a saved report");
                eprintln!(
                    "  --regression-threshold <pct>   Regression threshold percentage (default: 10)"
                );
                eprintln!("  --write-luts <dir>             Write the built-in lookup tables and exit");
                process::exit(0);
            }
            other => fail(format!("unknown argument: {other}")),
        }
        i += 1;
    }

    if let Some(dir) = luts_dir {
        match write_tables(&dir, &McTables::builtin()) {
            Ok((configuration, vertex_count)) => {
                log::info!(
                    "Wrote {} and {}",
                    configuration.display(),
                    vertex_count.display()
                );
                return;
            }
            Err(e) => fail(e),
        }
    }

    let config = match config_path {
        Some(path) => load_config_file(&path).unwrap_or_else(|e| fail(e)),
        None => PipelineConfig::default(),
    };

    let mut runner = TerrainRunner::new(config, cycles, upload).unwrap_or_else(|e| fail(e));
    let result = runner.run().unwrap_or_else(|e| fail(e));

    println!("\n## Terrain Run\n");
    println!("{}", report::format_markdown(&result));

    if let Some(ref path) = output_path {
        let saved = report::Report {
            timestamp: format!("run-{}", process::id()),
            result: result.clone(),
        };
        if let Err(e) = report::save_report(path, &saved) {
            fail(format!("failed to save report to {}: {e}", path.display()));
        }
        log::info!("Saved report to {}", path.display());
    }

    if let Some(ref path) = baseline_path {
        if let Some(baseline) = report::load_report(path) {
            let regressions = report::compare(&result, &baseline, regression_threshold);
            println!(
                "{}",
                report::format_comparison(&regressions, regression_threshold)
            );
            if !regressions.is_empty() {
                fail(format!("{} regressions detected", regressions.len()));
            }
        } else {
            log::warn!("Baseline file not found: {}", path.display());
        }
    }

    log::info!("Terrain run complete.");
}
