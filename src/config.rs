use std::time::Duration;

use clap::Parser;

use crate::{data_aquisition::http::FetchConfig, layout::SimulationConfig, topology::crawl::CrawlConfig};

pub const DEFAULT_BOOTSTRAP: &str = "127.0.0.1:9000/sarga";

#[derive(Debug, Parser)]
#[command(author, version, about = "Live topology view of a DHT overlay")]
pub struct Args {
    /// Address of the peer fetched at startup.
    #[arg(long, default_value = DEFAULT_BOOTSTRAP)]
    pub bootstrap: String,

    #[arg(long, default_value_t = 5000)]
    pub request_timeout_ms: u64,

    /// Many-body strength, negative values repel.
    #[arg(long, default_value_t = -100.0, allow_negative_numbers = true)]
    pub charge_strength: f32,

    #[arg(long, default_value_t = 200.0)]
    pub link_distance: f32,

    #[arg(long, default_value_t = 0.2)]
    pub velocity_decay: f32,

    /// Stop the simulation this long after the last topology change. 0 keeps it running
    /// until it cools down.
    #[arg(long, default_value_t = 2000)]
    pub halt_after_ms: u64,

    /// Probe newly discovered peers automatically.
    #[arg(long)]
    pub auto_crawl: bool,

    #[arg(long, default_value_t = 3)]
    pub max_crawl_depth: usize,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bootstrap: String,
    pub fetch: FetchConfig,
    pub simulation: SimulationConfig,
    pub crawl: CrawlConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bootstrap: DEFAULT_BOOTSTRAP.to_string(),
            fetch: FetchConfig::default(),
            simulation: SimulationConfig::default(),
            crawl: CrawlConfig::default(),
        }
    }
}

impl From<Args> for AppConfig {
    fn from(args: Args) -> Self {
        let halt_after = match args.halt_after_ms {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        };
        Self {
            bootstrap: args.bootstrap,
            fetch: FetchConfig {
                timeout: Duration::from_millis(args.request_timeout_ms),
            },
            simulation: SimulationConfig {
                charge_strength: args.charge_strength,
                link_distance: args.link_distance,
                velocity_decay: args.velocity_decay.clamp(0.0, 1.0),
                halt_after,
                ..SimulationConfig::default()
            },
            crawl: CrawlConfig {
                auto_crawl: args.auto_crawl,
                max_depth: args.max_crawl_depth,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_app_config() {
        let config = AppConfig::from(Args::parse_from(["dht-visualization"]));
        let default = AppConfig::default();

        assert_eq!(config.bootstrap, default.bootstrap);
        assert_eq!(config.fetch.timeout, default.fetch.timeout);
        assert_eq!(config.simulation.charge_strength, default.simulation.charge_strength);
        assert_eq!(config.simulation.link_distance, default.simulation.link_distance);
        assert_eq!(config.simulation.halt_after, default.simulation.halt_after);
        assert!(!config.crawl.auto_crawl);
    }

    #[test]
    fn test_overrides() {
        let args = Args::parse_from([
            "dht-visualization",
            "--bootstrap",
            "10.0.0.2:9100",
            "--charge-strength",
            "-250",
            "--halt-after-ms",
            "0",
            "--auto-crawl",
            "--max-crawl-depth",
            "1",
        ]);
        let config = AppConfig::from(args);

        assert_eq!(config.bootstrap, "10.0.0.2:9100");
        assert_eq!(config.simulation.charge_strength, -250.0);
        assert_eq!(config.simulation.halt_after, None);
        assert!(config.crawl.auto_crawl);
        assert_eq!(config.crawl.max_depth, 1);
    }
}
