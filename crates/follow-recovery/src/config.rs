//! Command line and environment configuration.

use crate::browser::BrowserOptions;
use crate::phase::PhaseTimings;
use clap::Parser;
use nostr_client::{DEFAULT_RELAYS, PoolConfig, RelayConfig};
use std::time::Duration;

#[derive(Parser, Debug, Clone)]
#[command(
    name = "follow-recovery",
    about = "Rebuild a Nostr follow list from every relay that still has a copy, then republish it",
    version
)]
pub struct Cli {
    /// Author whose follow list to recover (hex or npub)
    #[arg(long, env = "PUBKEY")]
    pub pubkey: Option<String>,

    /// Secret key used to sign locally (hex or nsec); without it the browser signs
    #[arg(long, env = "PRIVKEY", hide_env_values = true)]
    pub privkey: Option<String>,

    /// Relays to query (repeat or comma-separate)
    #[arg(long = "relay", env = "RELAYS", value_delimiter = ',')]
    pub relays: Vec<String>,

    /// Seconds to collect records before building the merged list
    #[arg(
        long,
        env = "COLLECT_SECS",
        default_value_t = 30,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub collect_secs: u64,

    /// Seconds to wait for relay acknowledgements after publishing
    #[arg(
        long,
        env = "DRAIN_SECS",
        default_value_t = 10,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub drain_secs: u64,

    /// Seconds between liveness pings on open relays
    #[arg(
        long,
        env = "PING_SECS",
        default_value_t = 10,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub ping_secs: u64,

    /// Seconds to wait for each relay handshake
    #[arg(
        long,
        env = "CONNECT_TIMEOUT_SECS",
        default_value_t = 10,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub connect_timeout_secs: u64,

    /// Seconds to wait for the browser to log in or sign
    #[arg(
        long,
        env = "SIGNER_TIMEOUT_SECS",
        default_value_t = 300,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub signer_timeout_secs: u64,

    /// Print the local signing URL instead of launching a browser
    #[arg(long, env = "NO_BROWSER")]
    pub no_browser: bool,

    /// Log at debug level
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    /// Read `.env` (if present) into the environment, then parse arguments.
    pub fn load() -> Self {
        let _ = dotenvy::dotenv();
        Self::parse()
    }

    pub fn recovery_config(&self) -> RecoveryConfig {
        let relays = if self.relays.is_empty() {
            default_relays()
        } else {
            self.relays
                .iter()
                .map(|r| r.trim().to_string())
                .filter(|r| !r.is_empty())
                .collect()
        };

        RecoveryConfig {
            relays,
            timings: PhaseTimings {
                collection_window: Duration::from_secs(self.collect_secs),
                drain_window: Duration::from_secs(self.drain_secs),
            },
            ping_interval: Duration::from_secs(self.ping_secs),
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
        }
    }

    pub fn browser_options(&self) -> BrowserOptions {
        BrowserOptions {
            launch: !self.no_browser,
            timeout: Duration::from_secs(self.signer_timeout_secs),
        }
    }
}

fn default_relays() -> Vec<String> {
    DEFAULT_RELAYS.iter().map(|s| s.to_string()).collect()
}

/// Everything a run needs apart from the author and the signer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoveryConfig {
    pub relays: Vec<String>,
    pub timings: PhaseTimings,
    pub ping_interval: Duration,
    pub connect_timeout: Duration,
}

impl RecoveryConfig {
    pub fn pool_config(&self) -> PoolConfig {
        PoolConfig {
            relay: RelayConfig {
                connect_timeout: self.connect_timeout,
            },
            ping_interval: self.ping_interval,
        }
    }
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            relays: default_relays(),
            timings: PhaseTimings::default(),
            ping_interval: Duration::from_secs(10),
            connect_timeout: Duration::from_secs(10),
        }
    }
}
