//! CLI definition
//!
//! habitlog takes no options: the config and credentials come from fixed
//! locations. Only the built-in `--help` and `--version` are accepted.

use clap::Parser;

/// habitlog - daily habit check-in backed by Google Sheets
#[derive(Debug, Parser)]
#[command(
    name = "hl",
    about = "Daily habit check-in that back-fills missing days into a Google Sheet",
    version,
    after_help = "Config: <config dir>/habitlog/config.yaml\nLogs:   <data dir>/habitlog/logs/habitlog.log"
)]
pub struct Cli {}
