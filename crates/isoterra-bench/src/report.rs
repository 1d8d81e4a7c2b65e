use std::path::Path;

use crate::runner::RunResult;

/// A saved run, used as the baseline for later comparisons.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Report {
    pub timestamp: String,
    pub result: RunResult,
}

/// Load a report from a JSON file. Returns None if it is missing or unreadable.
pub fn load_report(path: &Path) -> Option<Report> {
    let contents = std::fs::read_to_string(path).ok()?;
    serde_json::from_str(&contents).ok()
}

/// Save a report as pretty JSON, creating parent directories.
pub fn save_report(path: &Path, report: &Report) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(report).map_err(std::io::Error::other)?;
    std::fs::write(path, json)
}

/// Stages whose mean time grew past `threshold_pct` relative to the baseline.
pub fn compare(current: &RunResult, baseline: &Report, threshold_pct: f64) -> Vec<(String, f64)> {
    let base = &baseline.result;
    [
        ("cycle", current.cycle.mean_ms, base.cycle.mean_ms),
        ("generation", current.generation.mean_ms, base.generation.mean_ms),
        ("meshing", current.meshing.mean_ms, base.meshing.mean_ms),
        ("collection", current.collection.mean_ms, base.collection.mean_ms),
    ]
    .into_iter()
    .filter(|&(_, _, before)| before > 0.0)
    .map(|(stage, now, before)| (stage.to_string(), (now - before) / before * 100.0))
    .filter(|&(_, pct)| pct > threshold_pct)
    .collect()
}

/// Format a run as a markdown summary.
pub fn format_markdown(result: &RunResult) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "Grid {:?} chunks of {:?} voxels, {} cycles on {} threads\n\n",
        result.chunks_per_axis, result.voxels_per_axis, result.cycles, result.device_threads
    ));
    out.push_str(&format!(
        "{} draws, {} vertices, {} pages in use, {} events per cycle\n\n",
        result.draw_count, result.vertices, result.pages_in_use, result.events
    ));
    out.push_str(&format!(
        "{} geometry pages materialized, {} page-lock retries\n\n",
        result.pages_materialized, result.lock_contention
    ));
    out.push_str("| Stage | Mean (ms) | Median (ms) | P95 (ms) | Min (ms) | Max (ms) |\n");
    out.push_str("|-------|-----------|-------------|----------|----------|----------|\n");
    for (stage, t) in [
        ("cycle", &result.cycle),
        ("generation", &result.generation),
        ("meshing", &result.meshing),
        ("collection", &result.collection),
    ] {
        out.push_str(&format!(
            "| {} | {:.2} | {:.2} | {:.2} | {:.2} | {:.2} |\n",
            stage, t.mean_ms, t.median_ms, t.p95_ms, t.min_ms, t.max_ms
        ));
    }
    out
}

/// Format a comparison report showing regressions.
pub fn format_comparison(regressions: &[(String, f64)], threshold_pct: f64) -> String {
    if regressions.is_empty() {
        return format!(
            "All stages within {:.0}% threshold. No regressions detected.\n",
            threshold_pct
        );
    }

    let mut out = format!("REGRESSIONS DETECTED (>{:.0}% threshold):\n", threshold_pct);
    for (stage, pct) in regressions {
        out.push_str(&format!("  - {}: +{:.1}%\n", stage, pct));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::TimingSeries;

    fn series(mean_ms: f64) -> TimingSeries {
        TimingSeries {
            mean_ms,
            median_ms: mean_ms,
            p95_ms: mean_ms,
            min_ms: mean_ms,
            max_ms: mean_ms,
        }
    }

    fn result(meshing_ms: f64) -> RunResult {
        RunResult {
            chunks_per_axis: [8, 8, 8],
            voxels_per_axis: [8, 8, 8],
            cycles: 1,
            device_threads: 4,
            events: 576,
            draw_count: 12,
            vertices: 360,
            pages_in_use: 12,
            pages_materialized: 14,
            lock_contention: 3,
            uploaded_draws: None,
            cycle: series(10.0),
            generation: series(4.0),
            meshing: series(meshing_ms),
            collection: series(0.0),
        }
    }

    #[test]
    fn test_compare_flags_slower_stage() {
        let baseline = Report {
            timestamp: "t0".into(),
            result: result(5.0),
        };
        let regressions = compare(&result(6.0), &baseline, 10.0);
        assert_eq!(regressions.len(), 1);
        assert_eq!(regressions[0].0, "meshing");
        assert!((regressions[0].1 - 20.0).abs() < 1e-9);
        assert!(compare(&result(5.2), &baseline, 10.0).is_empty());
    }

    #[test]
    fn test_report_json_roundtrip_on_disk() {
        let path = std::env::temp_dir()
            .join(format!("isoterra-report-{}", std::process::id()))
            .join("report.json");
        let report = Report {
            timestamp: "run-1".into(),
            result: result(5.0),
        };
        save_report(&path, &report).expect("save");
        assert_eq!(load_report(&path), Some(report));
        if let Some(dir) = path.parent() {
            let _ = std::fs::remove_dir_all(dir);
        }
    }

    #[test]
    fn test_markdown_lists_every_stage() {
        let md = format_markdown(&result(5.0));
        for stage in ["cycle", "generation", "meshing", "collection"] {
            assert!(md.contains(&format!("| {stage} |")), "missing {stage}");
        }
        assert!(md.contains("14 geometry pages materialized, 3 page-lock retries"));
    }
}
