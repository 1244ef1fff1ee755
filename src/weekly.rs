use std::collections::BTreeMap;

use chrono::{Datelike, Duration, NaiveDate};

use crate::billable::BillableEntry;

/// 1つの請求書にまとめるエントリーの集まり。
#[derive(Clone, Debug, PartialEq)]
pub struct InvoiceGroup {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub entries: Vec<BillableEntry>,
}

/// 請求書の1行。
///
/// `Total`はグループの合計行で、説明、タイムスタンプを持たない。
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum InvoiceRow<'a> {
    Entry(&'a BillableEntry),
    Total(Duration),
}

impl InvoiceRow<'_> {
    pub fn is_total(&self) -> bool {
        matches!(self, Self::Total(_))
    }

    pub fn billable_duration(&self) -> Duration {
        match self {
            Self::Entry(entry) => entry.billable_duration,
            Self::Total(total) => *total,
        }
    }
}

impl InvoiceGroup {
    /// 請求時間の合計を返す。
    pub fn total(&self) -> Duration {
        self.entries
            .iter()
            .fold(Duration::zero(), |acc, entry| acc + entry.billable_duration)
    }

    /// エントリーの後ろに合計行を付けた行を返す。
    pub fn rows(&self) -> Vec<InvoiceRow<'_>> {
        self.entries
            .iter()
            .map(InvoiceRow::Entry)
            .chain(std::iter::once(InvoiceRow::Total(self.total())))
            .collect()
    }

    /// `YYYYMMDD-YYYYMMDD<postfix>.csv`形式のファイル名を返す。
    pub fn file_name(&self, postfix: &str) -> String {
        format!(
            "{}-{}{}.csv",
            self.start.format("%Y%m%d"),
            self.end.format("%Y%m%d"),
            postfix
        )
    }
}

/// 日付が属する週の基準となる土曜日を返す。
///
/// 日曜日始まりの週の開始日の前日の土曜日を基準とする。
/// 日曜日から土曜日までが同じ基準日になる。
pub fn week_anchor(date: NaiveDate) -> NaiveDate {
    let days_since_sunday = i64::from(date.weekday().num_days_from_sunday());
    date - Duration::days(days_since_sunday + 1)
}

/// 請求開始日時の日付から週の基準日を返す。
fn entry_anchor(entry: &BillableEntry) -> NaiveDate {
    week_anchor(entry.start.date_naive())
}

/// エントリーを週毎にまとめる。
///
/// 週は基準日の昇順に並ぶ。各週の中ではエントリーの順序を保つ。
/// 各週の期間は基準日から6日後まで。
pub fn group_by_week(entries: &[BillableEntry]) -> Vec<InvoiceGroup> {
    let weeks = entries.iter().fold(
        BTreeMap::<NaiveDate, Vec<BillableEntry>>::new(),
        |mut acc, entry| {
            acc.entry(entry_anchor(entry))
                .or_default()
                .push(entry.clone());
            acc
        },
    );

    weeks
        .into_iter()
        .map(|(anchor, entries)| InvoiceGroup {
            start: anchor,
            end: anchor + Duration::days(6),
            entries,
        })
        .collect()
}

/// 全エントリーをまとめたグループを返す。エントリーがなければ`None`。
///
/// 期間は最も早い週の基準日から、最も遅い週の最終日まで。
pub fn grand_total(entries: Vec<BillableEntry>) -> Option<InvoiceGroup> {
    let start = entries.iter().map(entry_anchor).min()?;
    let end = entries.iter().map(entry_anchor).max()? + Duration::days(6);

    Some(InvoiceGroup {
        start,
        end,
        entries,
    })
}
