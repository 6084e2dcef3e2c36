//! Command-line surface and logging bootstrap, spec.md §6's CLI surface.
//!
//! Grounded on the teacher's `Cli` (`mayara-server/src/lib.rs`): a
//! `clap::Parser` struct flattening `clap_verbosity_flag::Verbosity` for
//! `-v`/`-q` repeatable flags, plus one override per spec.md knob that
//! actually varies between runs. Unlike the teacher, INTERCEPT's CLI
//! surface is deliberately small — "No command-line flags are required
//! for core operation" (spec.md §6) — so only the HTTP port and the
//! optional OUI database path are exposed; everything else (tool paths,
//! capture directories) is fixed per spec.md §6's filesystem surface.

use clap::Parser;
use clap_verbosity_flag::InfoLevel;
use std::path::PathBuf;

/// Default bind port, spec.md §6: "binds 0.0.0.0:5050 by default".
pub const DEFAULT_PORT: u16 = 5050;

#[derive(Parser, Clone, Debug)]
#[command(name = "intercept-server", version, about = "Multi-modal signal-intelligence orchestrator")]
pub struct Cli {
    #[clap(flatten)]
    pub verbose: clap_verbosity_flag::Verbosity<InfoLevel>,

    /// HTTP server port.
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Path to a `{"AA:BB:CC": "Vendor"}` OUI database; falls back to the
    /// compiled-in table when absent or unreadable (spec.md §4.2/§6).
    #[arg(long)]
    pub oui_database: Option<PathBuf>,
}

/// Initializes `env_logger` at the verbosity level selected on the CLI.
pub fn init_logging(cli: &Cli) {
    env_logger::Builder::new()
        .filter_level(cli.verbose.log_level_filter())
        .format_timestamp_millis()
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_port_is_5050() {
        let cli = Cli::parse_from(["intercept-server"]);
        assert_eq!(cli.port, DEFAULT_PORT);
    }

    #[test]
    fn port_override() {
        let cli = Cli::parse_from(["intercept-server", "--port", "9090"]);
        assert_eq!(cli.port, 9090);
    }

    #[test]
    fn oui_database_flag() {
        let cli = Cli::parse_from(["intercept-server", "--oui-database", "/tmp/oui.json"]);
        assert_eq!(cli.oui_database, Some(PathBuf::from("/tmp/oui.json")));
    }
}
