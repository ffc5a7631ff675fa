pub mod config;
pub mod dashboard;
pub mod export;
pub mod report;

use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;

use crate::error::Result;
use crate::range::{local_today, range_from_args, DateRange};
use crate::state::TypeFilter;

#[derive(Parser)]
#[command(
    name = "medlytics",
    version,
    about = "Terminal analytics dashboard for medical report uploads."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// `--from` / `--to`, both `YYYY-MM-DD`. Missing ends default to one month
/// back through today.
#[derive(Args, Debug, Clone, Default)]
pub struct RangeArgs {
    /// Start date (YYYY-MM-DD)
    #[arg(long)]
    pub from: Option<String>,
    /// End date (YYYY-MM-DD)
    #[arg(long)]
    pub to: Option<String>,
}

impl RangeArgs {
    pub fn resolve(&self) -> Result<DateRange> {
        range_from_args(self.from.as_deref(), self.to.as_deref(), local_today())
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Open the interactive dashboard (the default).
    Dashboard {
        #[command(flatten)]
        range: RangeArgs,
    },
    /// Print one analytics section as a table.
    Report {
        #[arg(value_enum)]
        kind: ReportKind,
        #[command(flatten)]
        range: RangeArgs,
        /// Report type to include, or "all"
        #[arg(long = "type", default_value = "all")]
        report_type: String,
    },
    /// Export the range reports to CSV.
    Export {
        #[command(flatten)]
        range: RangeArgs,
        /// Report type to include, or "all"
        #[arg(long = "type", default_value = "all")]
        report_type: String,
        /// Output file (default: <export_dir>/reports_YYYYMMDD.csv)
        #[arg(long)]
        output: Option<String>,
    },
    /// Show or change settings.
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
    /// Print shell completions.
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportKind {
    Summary,
    Types,
    Trends,
    Daily,
    Contributors,
    Deletions,
    Activity,
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Print the effective settings.
    Show,
    /// Set a value: base_url, api_token, export_dir or timeout_secs.
    Set { key: String, value: String },
}

pub(crate) fn type_filter(arg: &str) -> TypeFilter {
    TypeFilter::parse(arg)
}

pub fn completions(shell: Shell) -> Result<()> {
    use clap::CommandFactory;
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, "medlytics", &mut std::io::stdout());
    Ok(())
}
