//! Plan a site: grade its pads and lay out roads to its assets.
//!
//! Usage:
//!   cargo run -p sitegrade-cli --bin plan_site -- --scenario site.json --output report.json
//!   cargo run -p sitegrade-cli --bin plan_site -- --synthetic --seed 7 --size 120

use anyhow::{bail, Context};
use clap::Parser;
use sitegrade_cli::{init_tracing, run_scenario, synthetic_site, SiteReport, SiteScenario};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about = "Grade a site and plan its road network")]
struct Args {
    /// Scenario JSON file
    #[arg(long, conflicts_with = "synthetic")]
    scenario: Option<PathBuf>,

    /// Generate a hilly site instead of reading a scenario
    #[arg(long)]
    synthetic: bool,

    /// Seed for the synthetic site
    #[arg(long, default_value_t = 1)]
    seed: u64,

    /// Cells per side of the synthetic site
    #[arg(long, default_value_t = 80)]
    size: usize,

    /// Write the full JSON report here
    #[arg(long)]
    output: Option<PathBuf>,

    /// Route every asset independently instead of building a spanning tree
    #[arg(long)]
    no_optimize: bool,
}

fn main() -> anyhow::Result<()> {
    init_tracing("sitegrade_core=info")?;
    let args = Args::parse();

    let scenario = match (&args.scenario, args.synthetic) {
        (Some(path), _) => SiteScenario::load(path)?,
        (None, true) => synthetic_site(args.seed, args.size),
        (None, false) => bail!("pass --scenario <file> or --synthetic"),
    };

    let report = run_scenario(&scenario, !args.no_optimize)?;
    print_summary(&report);

    if let Some(path) = &args.output {
        let json = serde_json::to_string_pretty(&report)?;
        std::fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
        println!("report written to {}", path.display());
    }
    Ok(())
}

fn print_summary(report: &SiteReport) {
    println!("=== {} ===", report.scenario);
    let elevation = &report.terrain.elevation;
    println!(
        "terrain: {} cells, elevation {:.2}..{:.2} (mean {:.2}), planar area {:.0}",
        report.terrain.valid_cells, elevation.min, elevation.max, elevation.mean, report.terrain.planar_area
    );

    match &report.grading {
        Some(grading) => {
            let v = &grading.volumes;
            println!(
                "grading ({}): cut {:.1} CY, fill {:.1} CY, net {:+.1} CY, import {:.1}, export {:.1}",
                grading.soil, v.cut_volume, v.fill_volume, v.net_volume, v.import_volume, v.export_volume
            );
            println!(
                "  cost ${:.0}, balance ratio {:.2}{}",
                grading.costs.total_cost,
                grading.balancing.balance_ratio,
                if grading.balancing.is_balanced { " (balanced)" } else { "" }
            );
            for line in &grading.balancing.recommendations {
                println!("  - {line}");
            }
        }
        None => println!("grading: no zones"),
    }

    match &report.roads {
        Some(roads) => {
            let stats = &roads.stats;
            println!(
                "roads: {} ({} segments, {} intersections, {:.0} units, max grade {:.1}%)",
                if roads.success { "complete" } else { "INCOMPLETE" },
                stats.segment_count,
                stats.intersection_count,
                stats.total_length,
                stats.max_grade
            );
            for route in roads.routes.iter().filter(|r| !r.reachable) {
                println!(
                    "  {} unreachable: {}",
                    route.asset_id,
                    route.reason.as_deref().unwrap_or("unknown")
                );
            }
        }
        None => println!("roads: no entrance or assets"),
    }
}
