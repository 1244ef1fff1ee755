use std::fmt::Display;

use chrono::{DateTime, Duration, FixedOffset, TimeZone};
use log::debug;

use crate::config::BillingConfig;
use crate::datetime::{format_timestamp, parse_timestamp, truncate_to_minute};
use crate::day_chunk::{split_by_day, DayChunk};
use crate::error::Result;
use crate::time_entry::TimeEntry;

/// 請求対象となる1日分のエントリー。
#[derive(Clone, Debug, PartialEq)]
pub struct BillableEntry {
    /// 分割元のタイムエントリー。
    pub entry: TimeEntry,
    /// 設定された書式で文字列化した請求開始時刻。
    pub start_billable: String,
    pub end_billable: String,
    /// `start_billable`を読み戻した日時。
    pub start: DateTime<FixedOffset>,
    pub end: DateTime<FixedOffset>,
    /// 切り捨て前のチャンクの長さ。
    pub raw_duration: Duration,
    pub billable_duration: Duration,
}

/// チャンクを請求用のエントリーに変換する。
///
/// 開始、終了を分単位に切り捨てた長さが最小請求時間に満たない場合は最小請求時間とする。
/// 最小請求時間はチャンク毎に適用するため、日をまたぐエントリーは断片毎に最小請求時間が課される。
pub fn to_billable<Tz: TimeZone>(
    entry: &TimeEntry,
    chunk: &DayChunk<Tz>,
    config: &BillingConfig,
) -> Result<BillableEntry>
where
    Tz::Offset: Display,
{
    let start = truncate_to_minute(&chunk.start);
    let end = truncate_to_minute(&chunk.end);
    let rounded = end.clone() - start.clone();
    let billable_duration = rounded.max(config.min_billable);

    debug!(
        "adding billable rounded={} calc={} min={}",
        rounded.num_milliseconds(),
        chunk.duration.num_milliseconds(),
        config.min_billable.num_milliseconds()
    );

    let start_billable = format_timestamp(&start, &config.date_format)?;
    let end_billable = format_timestamp(&end, &config.date_format)?;

    Ok(BillableEntry {
        entry: entry.clone(),
        start: parse_timestamp(&start_billable, &config.date_format)?,
        end: parse_timestamp(&end_billable, &config.date_format)?,
        start_billable,
        end_billable,
        raw_duration: chunk.duration,
        billable_duration,
    })
}

/// タイムエントリーを日毎に分割し、請求用のエントリーに変換する。
///
/// 日付の境界は`tz`で判定する。出力はエントリーの順序、チャンクの順序を保つ。
pub fn bill_entries<Tz: TimeZone>(
    entries: &[TimeEntry],
    tz: &Tz,
    config: &BillingConfig,
) -> Result<Vec<BillableEntry>>
where
    Tz::Offset: Display,
{
    entries
        .iter()
        .flat_map(|entry| {
            split_by_day(entry.start.with_timezone(tz), entry.end.with_timezone(tz))
                .map(move |chunk| to_billable(entry, &chunk, config))
        })
        .collect()
}
