use std::fmt::Display;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::TimeZone;
use log::{debug, error, info, trace};
use tokio::io::AsyncReadExt;
use tokio::task::JoinSet;

use crate::billable::bill_entries;
use crate::config::{BillingConfig, DEFAULT_DATE_FORMAT, DEFAULT_MIN_BILLABLE_MS, DEFAULT_RATE};
use crate::error::BillingError;
use crate::invoice::to_csv;
use crate::report::AggregatedReport;
use crate::weekly::{grand_total, group_by_week, InvoiceGroup};

/// レポートから週毎の請求書CSVを出力するためのサブコマンド。
#[derive(Debug, clap::Args)]
pub struct OutputArgs {
    #[clap(
        short = 'r',
        long = "rate",
        env = "BILLING_RATE",
        default_value_t = DEFAULT_RATE,
        help = "Billing rate per hour"
    )]
    pub rate: f64,

    #[clap(
        long = "dateformat",
        env = "DATE_FORMAT",
        default_value = DEFAULT_DATE_FORMAT,
        help = "strftime format of billing timestamps, must include date, time and offset"
    )]
    pub date_format: String,

    #[clap(
        short = 'm',
        long = "minduration",
        env = "MIN_BILLING_DURATION",
        default_value_t = DEFAULT_MIN_BILLABLE_MS,
        help = "Minimum billable duration of a day chunk in milliseconds"
    )]
    pub min_duration: i64,

    #[clap(
        short = 'p',
        long = "filepostfix",
        env = "FILE_POSTFIX",
        help = "Appended to every output file name"
    )]
    pub file_postfix: Option<String>,

    #[clap(
        short = 'i',
        long = "input",
        help = "Read the report from a file instead of stdin"
    )]
    pub input: Option<PathBuf>,

    #[clap(short = 'o', long = "out-dir", default_value = ".")]
    pub out_dir: PathBuf,

    #[clap(long = "utc", help = "Split days and weeks in UTC instead of the local time zone")]
    pub utc: bool,
}

impl OutputArgs {
    /// 引数から`BillingConfig`を作成する。
    pub fn billing_config(&self) -> Result<BillingConfig> {
        BillingConfig::new(
            self.rate,
            self.min_duration,
            &self.date_format,
            self.file_postfix.as_deref().unwrap_or_default(),
        )
        .context("Invalid billing configuration")
    }
}

/// 出力する請求書1ファイル分。
#[derive(Debug, PartialEq)]
pub struct InvoiceFile {
    pub name: String,
    pub contents: String,
}

/// 書き込み結果。
#[derive(Debug, Default)]
pub struct WriteSummary {
    pub saved: Vec<PathBuf>,
    pub failed: usize,
}

pub struct OutputCommand {
    config: BillingConfig,
}

impl OutputCommand {
    /// 新しい`OutputCommand`を返す。
    pub fn new(config: BillingConfig) -> Self {
        Self { config }
    }

    /// `output`サブコマンドの処理を行う。
    ///
    /// レポートを読み込み、週毎の請求書と全期間の請求書を`out_dir`に書き込む。
    /// 日付と週の境界は`tz`で判定する。
    pub async fn run<Tz: TimeZone>(&self, args: &OutputArgs, tz: &Tz) -> Result<WriteSummary>
    where
        Tz::Offset: Display,
    {
        let json = read_input(args.input.as_deref()).await?;
        let report = AggregatedReport::from_json(&json).context("Failed to parse report")?;
        info!("Time entries loaded: {}", report.data.len());

        let invoices = self.build_invoices(&report, tz)?;
        let summary = write_invoices(&args.out_dir, invoices).await;
        if summary.failed > 0 {
            anyhow::bail!("{} invoice file(s) could not be written", summary.failed);
        }

        Ok(summary)
    }

    /// レポートから請求書を作成する。
    ///
    /// CSVへの変換に失敗した請求書はログを出力して読み飛ばす。
    pub fn build_invoices<Tz: TimeZone>(
        &self,
        report: &AggregatedReport,
        tz: &Tz,
    ) -> Result<Vec<InvoiceFile>>
    where
        Tz::Offset: Display,
    {
        let entries = bill_entries(&report.data, tz, &self.config)
            .context("Failed to calculate billable entries")?;
        debug!("Billable entries: {}", entries.len());
        entries.iter().for_each(|entry| {
            trace!(
                "{:?} {} - {} raw={}ms billable={}ms",
                entry.entry.description,
                entry.start_billable,
                entry.end_billable,
                entry.raw_duration.num_milliseconds(),
                entry.billable_duration.num_milliseconds()
            )
        });

        let mut groups = group_by_week(&entries);
        info!("Weeks found: {}", groups.len());
        match grand_total(entries) {
            // 1週間分しかない場合は週の請求書と同じファイルになる
            Some(total) if self.is_single_week(&groups, &total) => {
                debug!("Grand total covers a single week")
            }
            Some(total) => groups.push(total),
            None => info!("No time entries to invoice"),
        }

        Ok(groups
            .iter()
            .filter_map(|group| self.render(group))
            .collect())
    }

    fn file_name(&self, group: &InvoiceGroup) -> String {
        group.file_name(&self.config.file_postfix)
    }

    fn is_single_week(&self, weeks: &[InvoiceGroup], total: &InvoiceGroup) -> bool {
        let total_name = self.file_name(total);
        weeks.iter().any(|week| self.file_name(week) == total_name)
    }

    fn render(&self, group: &InvoiceGroup) -> Option<InvoiceFile> {
        let name = self.file_name(group);
        match to_csv(&group.rows(), self.config.rate) {
            Ok(contents) => Some(InvoiceFile { name, contents }),
            Err(err) => {
                error!("Failed to convert {} to csv: {}", name, err);
                None
            }
        }
    }
}

/// レポートのJSONを読み込む。`input`が指定されていない場合は標準入力から読む。
async fn read_input(input: Option<&Path>) -> Result<String> {
    match input {
        Some(path) => tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read report from {}", path.display())),
        None => {
            let mut json = String::new();
            tokio::io::stdin()
                .read_to_string(&mut json)
                .await
                .context("Failed to read report from stdin")?;
            Ok(json)
        }
    }
}

/// 請求書を並行して書き込む。
///
/// 1つのファイルの書き込みに失敗しても他のファイルの書き込みは継続する。
pub async fn write_invoices(out_dir: &Path, invoices: Vec<InvoiceFile>) -> WriteSummary {
    let mut writes = JoinSet::new();
    for invoice in invoices {
        let path = out_dir.join(&invoice.name);
        writes.spawn(async move {
            let result = tokio::fs::write(&path, invoice.contents)
                .await
                .map_err(|source| BillingError::Write {
                    path: path.clone(),
                    source,
                });
            (path, result)
        });
    }

    let mut summary = WriteSummary::default();
    while let Some(joined) = writes.join_next().await {
        match joined {
            Ok((path, Ok(()))) => {
                info!("{} saved", path.display());
                summary.saved.push(path);
            }
            Ok((_, Err(err))) => {
                error!("{:#}", anyhow::Error::from(err));
                summary.failed += 1;
            }
            Err(err) => {
                error!("Invoice write task failed: {}", err);
                summary.failed += 1;
            }
        }
    }
    summary.saved.sort();

    summary
}
