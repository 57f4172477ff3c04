//! Road network stress run over synthetic hilly sites.
//!
//! Builds a network per site and checks that no returned segment exceeds the
//! grade limit.
//!
//! Usage:
//!   cargo run -p sitegrade-cli --bin road_stress -- --sites 50 --seed 1

use anyhow::bail;
use clap::Parser;
use sitegrade_cli::report::{grade_violations, run_scenario};
use sitegrade_cli::synthetic_site;
use std::time::Instant;

#[derive(Parser, Debug)]
#[command(author, version, about = "Stress the road network builder on synthetic sites")]
struct Args {
    /// Number of sites
    #[arg(long, default_value_t = 20)]
    sites: u64,

    /// Seed of the first site; site i uses seed + i
    #[arg(long, default_value_t = 1)]
    seed: u64,

    /// Cells per side
    #[arg(long, default_value_t = 60)]
    size: usize,

    /// Worker threads for per-asset searches
    #[arg(long, default_value_t = 1)]
    threads: usize,
}

fn main() -> anyhow::Result<()> {
    sitegrade_cli::init_tracing("sitegrade_core=warn")?;
    let args = Args::parse();

    let mut complete = 0u64;
    let mut unreachable_assets = 0usize;
    let mut violations = 0usize;
    let started = Instant::now();

    for offset in 0..args.sites {
        let seed = args.seed + offset;
        let mut scenario = synthetic_site(seed, args.size);
        scenario.zones.clear();
        scenario.roads.search_threads = args.threads.max(1);
        let max_grade = scenario.roads.pathfinder.max_grade_percent;

        let report = run_scenario(&scenario, true)?;
        let Some(roads) = report.roads else {
            continue;
        };
        if roads.success {
            complete += 1;
        }
        unreachable_assets += roads.stats.unreachable_assets;
        for (segment, grade) in grade_violations(&roads.segments, max_grade) {
            violations += 1;
            eprintln!("seed {seed}: segment {segment} has grade {grade:.2}% > {max_grade}%");
        }
        tracing::info!(
            seed,
            success = roads.success,
            segments = roads.stats.segment_count,
            length = roads.stats.total_length,
            "site routed"
        );
    }

    println!(
        "{} sites in {:.2?}: {} complete, {} unreachable assets, {} grade violations",
        args.sites,
        started.elapsed(),
        complete,
        unreachable_assets,
        violations
    );
    if violations > 0 {
        bail!("{violations} segments exceed the grade limit");
    }
    Ok(())
}
