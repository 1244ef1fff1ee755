use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{Duration, Local, NaiveDate};
use log::{debug, info};

use crate::datetime;
use crate::report::{AggregatedReport, ReportPage, ReportQuery};
use crate::toggl::{TogglRepository, DEFAULT_API_URL, DEFAULT_USER_AGENT};

/// detailed reportを全ページ取得するためのサブコマンド。
#[derive(Debug, clap::Args)]
pub struct ReportArgs {
    #[clap(short = 'w', long = "workspace-id", help = "Toggl workspace id")]
    pub workspace_id: u64,

    #[clap(
        short = 's',
        long = "since",
        alias = "start",
        help = "First day of the report in the format YYYY-MM-DD",
        parse(try_from_str = parse_date),
    )]
    pub since: Option<NaiveDate>,

    #[clap(
        short = 'e',
        long = "until",
        alias = "end",
        help = "Last day of the report in the format YYYY-MM-DD",
        parse(try_from_str = parse_date),
    )]
    pub until: Option<NaiveDate>,

    #[clap(
        short = 't',
        long = "api-token",
        env = "TOGGL_API_TOKEN",
        hide_env_values = true,
        help = "Toggl API token"
    )]
    pub api_token: String,

    #[clap(long = "api-url", env = "TOGGL_API_URL", default_value = DEFAULT_API_URL)]
    pub api_url: String,

    #[clap(long = "user-agent", env = "TOGGL_USER_AGENT", default_value = DEFAULT_USER_AGENT)]
    pub user_agent: String,

    #[clap(
        short = 'f',
        long = "file",
        help = "Write the report to a file instead of stdout"
    )]
    pub file: Option<PathBuf>,
}

pub struct ReportCommand<'a, T: TogglRepository> {
    toggl_client: &'a T,
}

impl<'a, T: TogglRepository> ReportCommand<'a, T> {
    /// 新しい`ReportCommand`を返す。
    ///
    /// # Arguments
    /// * `toggl_client` - Toggl Reports APIと通信するためのリポジトリ
    pub fn new(toggl_client: &'a T) -> Self {
        Self { toggl_client }
    }

    /// `report`サブコマンドの処理を行う。
    ///
    /// 期間が指定されていない場合は、Localタイムゾーンで今日までの7日間とする。
    pub async fn run(&self, args: &ReportArgs) -> Result<AggregatedReport> {
        let query = build_query(args);
        info!(
            "Workspace: {}, Since: {}, Until: {}",
            query.workspace_id, query.since, query.until
        );

        let report = self
            .fetch_all(&query)
            .await
            .context("Failed to retrieve detailed report")?;
        info!("retrieved data {}", report.data.len());

        Ok(report)
    }

    /// 全ページを順に取得し、1つのレポートにまとめる。
    ///
    /// 取得件数が`per_page`より少ないページ、または空のページを最終ページとみなす。
    /// いずれかのページの取得に失敗した場合は、その時点でエラーを返す。
    pub async fn fetch_all(&self, query: &ReportQuery) -> crate::error::Result<AggregatedReport> {
        let mut current_page = 1;
        let first = self
            .toggl_client
            .fetch_report_page(query, current_page)
            .await?;
        debug!("page {} fetched {} entries", current_page, first.data.len());
        let mut is_last = is_last_page(&first);
        let mut report = AggregatedReport::from_first_page(first, query);

        while !is_last {
            current_page += 1;
            let page = self
                .toggl_client
                .fetch_report_page(query, current_page)
                .await?;
            debug!("page {} fetched {} entries", current_page, page.data.len());
            is_last = is_last_page(&page);
            report.data.extend(page.data);
        }

        Ok(report)
    }
}

/// `per_page`に満たないページを最終ページとする。空のページは`per_page`によらず最終ページ。
fn is_last_page(page: &ReportPage) -> bool {
    page.data.is_empty() || page.data.len() < page.per_page
}

fn build_query(args: &ReportArgs) -> ReportQuery {
    let until = args
        .until
        .unwrap_or_else(|| datetime::now().with_timezone(&Local).date_naive());
    let since = args.since.unwrap_or(until - Duration::days(6));

    ReportQuery {
        workspace_id: args.workspace_id,
        since,
        until,
    }
}

/// レポートをJSONで出力する。
///
/// `file`が指定されていない場合は標準出力に書き込む。
pub fn write_report(report: &AggregatedReport, file: Option<&PathBuf>) -> Result<()> {
    let json = serde_json::to_string(report).context("Failed to serialize report")?;

    match file {
        Some(path) => {
            std::fs::write(path, json)
                .with_context(|| format!("Failed to write report to {}", path.display()))?;
            info!("{} saved", path.display());
        }
        None => {
            let stdout = std::io::stdout();
            let mut handle = stdout.lock();
            handle
                .write_all(json.as_bytes())
                .and_then(|_| handle.flush())
                .context("Failed to write report to stdout")?;
        }
    }

    Ok(())
}

/// 日付をパースする。
fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").with_context(|| format!("Failed to parse date: {}", s))
}
