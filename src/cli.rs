use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::report::ReportFormat;

#[derive(Parser, Debug)]
#[command(name = "api-monitor", version)]
#[command(about = "Monitor HTTP API availability and latency", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Check every endpoint once, or periodically if the config sets an interval
    Run(RunArgs),
    /// Check endpoints periodically until interrupted
    Watch(WatchArgs),
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Path to the YAML config file
    pub config: Option<PathBuf>,

    /// Report format, overriding the config file
    #[arg(short, long, value_enum)]
    pub format: Option<ReportFormat>,

    /// Write reports to this file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct WatchArgs {
    #[command(flatten)]
    pub run: RunArgs,

    /// Seconds between checks (default: config interval, then 60)
    #[arg(short, long)]
    pub interval: Option<u64>,

    /// Serve the web dashboard
    #[arg(short, long)]
    pub web: bool,

    /// Dashboard port (default: API_MONITOR_HTTP_PORT, then 8080)
    #[arg(short, long)]
    pub port: Option<u16>,
}

impl Commands {
    pub fn run_args(&self) -> &RunArgs {
        match self {
            Commands::Run(args) => args,
            Commands::Watch(args) => &args.run,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_run() {
        let cli = Cli::try_parse_from(["api-monitor", "run", "apis.yaml", "-f", "csv"]).unwrap();
        let Commands::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.config, Some(PathBuf::from("apis.yaml")));
        assert_eq!(args.format, Some(ReportFormat::Csv));
        assert!(args.output.is_none());
    }

    #[test]
    fn test_parse_watch() {
        let cli = Cli::try_parse_from([
            "api-monitor", "watch", "--interval", "15", "--web", "--port", "9000", "-o", "out.json",
        ])
        .unwrap();
        let Commands::Watch(args) = &cli.command else {
            panic!("expected watch");
        };
        assert_eq!(args.interval, Some(15));
        assert!(args.web);
        assert_eq!(args.port, Some(9000));
        assert_eq!(cli.command.run_args().output, Some(PathBuf::from("out.json")));
        assert!(cli.command.run_args().config.is_none());
    }

    #[test]
    fn test_parse_html_format() {
        let cli = Cli::try_parse_from(["api-monitor", "run", "--format", "html", "-o", "report.html"]).unwrap();
        assert_eq!(cli.command.run_args().format, Some(ReportFormat::Html));
    }

    #[test]
    fn test_rejects_unknown_format() {
        assert!(Cli::try_parse_from(["api-monitor", "run", "-f", "xml"]).is_err());
    }
}
