//! Site grading CLI - command line tools over the grading core.
//!
//! Binaries:
//! - plan_site: grade a site and lay out its roads from a scenario file or a synthetic site
//! - road_stress: batch of synthetic sites checking the road grade limit

pub mod report;
pub mod sim;

pub use report::{run_scenario, SiteReport};
pub use sim::scenarios::{synthetic_site, SiteScenario};

/// Install the fmt subscriber used by every binary.
pub fn init_tracing(default_directive: &str) -> anyhow::Result<()> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(tracing_subscriber::EnvFilter::from_default_env().add_directive(default_directive.parse()?))
        .init();
    Ok(())
}
