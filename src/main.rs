use anyhow::{Context, Result};
use chrono::{Local, Utc};
use clap::{Parser, Subcommand};
use log::{debug, info};

mod billable;
mod config;
mod datetime;
mod day_chunk;
mod error;
mod invoice;
mod logger;
mod output_command;
mod report;
mod report_command;
mod time_entry;
mod toggl;
mod weekly;

use output_command::{OutputArgs, OutputCommand};
use report_command::{write_report, ReportArgs, ReportCommand};
use toggl::TogglClient;

/// Toggl detailed reportから週毎の請求書CSVを作成するCLIアプリケーション。
///
/// # Examples
/// ```
/// $ cargo run -- report -w 123456 -s 2016-07-01 -e 2016-07-31 > report.json
/// $ cargo run -- output < report.json
/// ```
#[derive(Debug, Parser)]
#[clap(version, about)]
struct Args {
    #[clap(
        short = 'v',
        long = "verbose",
        global = true,
        parse(from_occurrences),
        help = "Show debug logs, repeat for trace logs"
    )]
    verbose: u64,

    #[clap(short = 'q', long = "quiet", global = true, help = "Only show warnings and errors")]
    quiet: bool,

    #[clap(subcommand)]
    subcommand: SubCommands,
}

/// サブコマンドを表す列挙型。
#[derive(Debug, Subcommand)]
enum SubCommands {
    /// Export the detailed report of all pages as JSON
    Report(ReportArgs),
    /// Produce weekly billable csv invoices from a report
    Output(OutputArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let env_files = config::load_env_files()?;
    let args = Args::parse();

    logger::setup_logger(logger::level_filter(args.verbose, args.quiet))?;
    env_files
        .iter()
        .for_each(|path| debug!("Loaded environment from {}", path.display()));

    match args.subcommand {
        SubCommands::Report(report) => {
            let client = TogglClient::new(report.api_token.as_str())
                .with_api_url(report.api_url.as_str())
                .with_user_agent(report.user_agent.as_str());
            let aggregated = ReportCommand::new(&client).run(&report).await?;
            write_report(&aggregated, report.file.as_ref())?;
        }
        SubCommands::Output(output) => {
            let command = OutputCommand::new(output.billing_config()?);
            let summary = if output.utc {
                command.run(&output, &Utc).await
            } else {
                command.run(&output, &Local).await
            }
            .context("Failed to produce invoices")?;
            info!("{} invoice file(s) written", summary.saved.len());
        }
    }

    Ok(())
}
