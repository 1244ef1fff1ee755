use std::io::Write;

use chrono::Duration;
use csv::{QuoteStyle, WriterBuilder};

use crate::error::{BillingError, Result};
use crate::weekly::InvoiceRow;

/// 請求書の1列。`value`は行と単価からセルの文字列を返す。
pub struct Column {
    pub label: &'static str,
    /// 数値の列はクォートしない。
    pub numeric: bool,
    pub value: fn(&InvoiceRow<'_>, f64) -> String,
}

impl Column {
    /// 行のセルをCSVに書き出す形で返す。文字列の列は内容によらずクォートする。
    fn cell(&self, row: &InvoiceRow<'_>, rate: f64) -> String {
        let value = (self.value)(row, rate);
        if self.numeric {
            value
        } else {
            quote(&value)
        }
    }
}

fn quote(value: &str) -> String {
    format!("\"{}\"", value.replace('"', "\"\""))
}

/// 請求書の列。順序がそのままCSVの列順になる。
pub const COLUMNS: [Column; 6] = [
    Column {
        label: "Date",
        numeric: false,
        value: date_cell,
    },
    Column {
        label: "Description",
        numeric: false,
        value: description_cell,
    },
    Column {
        label: "Start time",
        numeric: false,
        value: start_time_cell,
    },
    Column {
        label: "End time",
        numeric: false,
        value: end_time_cell,
    },
    Column {
        label: "Total time",
        numeric: false,
        value: total_time_cell,
    },
    Column {
        label: "Total",
        numeric: true,
        value: total_cell,
    },
];

fn date_cell(row: &InvoiceRow<'_>, _rate: f64) -> String {
    match row {
        InvoiceRow::Entry(entry) => entry.start.format("%Y-%m-%d").to_string(),
        InvoiceRow::Total(_) => String::new(),
    }
}

fn description_cell(row: &InvoiceRow<'_>, _rate: f64) -> String {
    match row {
        InvoiceRow::Entry(entry) => entry.entry.description.clone(),
        InvoiceRow::Total(_) => String::new(),
    }
}

fn start_time_cell(row: &InvoiceRow<'_>, _rate: f64) -> String {
    match row {
        InvoiceRow::Entry(entry) => entry.start.format("%H:%M:%S").to_string(),
        InvoiceRow::Total(_) => String::new(),
    }
}

fn end_time_cell(row: &InvoiceRow<'_>, _rate: f64) -> String {
    match row {
        InvoiceRow::Entry(entry) => entry.end.format("%H:%M:%S").to_string(),
        InvoiceRow::Total(_) => String::new(),
    }
}

fn total_time_cell(row: &InvoiceRow<'_>, _rate: f64) -> String {
    format_duration(row.billable_duration())
}

/// 合計行は整数に切り捨て、それ以外はそのまま出力する。
fn total_cell(row: &InvoiceRow<'_>, rate: f64) -> String {
    let total = hours(row.billable_duration()) * rate;
    if row.is_total() {
        format!("{}", total.floor() as i64)
    } else {
        format!("{}", total)
    }
}

fn hours(duration: Duration) -> f64 {
    duration.num_milliseconds() as f64 / 3_600_000.0
}

/// `HH:MM:SS`形式で出力する。時間は24を超えても繰り上げない。
pub fn format_duration(duration: Duration) -> String {
    let sign = if duration < Duration::zero() { "-" } else { "" };
    let seconds = duration.num_seconds().abs();
    format!(
        "{}{:02}:{:02}:{:02}",
        sign,
        seconds / 3600,
        seconds % 3600 / 60,
        seconds % 60
    )
}

/// 請求書の行を出力するためのtrait。
pub trait InvoicePresenter {
    /// ヘッダーと行を出力する。
    fn write_rows(&mut self, rows: &[InvoiceRow<'_>]) -> Result<()>;
}

/// 請求書をCSV形式で出力する。
///
/// ヘッダーと文字列の列はダブルクォートで囲み、数値の列はそのまま出力する。
pub struct CsvInvoice<'a, W: Write> {
    writer: &'a mut W,
    rate: f64,
}

impl<'a, W: Write> CsvInvoice<'a, W> {
    /// 新しい`CsvInvoice`を返す。
    ///
    /// # Arguments
    ///
    /// * `writer` - 出力先
    /// * `rate` - 1時間あたりの単価
    pub fn new(writer: &'a mut W, rate: f64) -> Self {
        Self { writer, rate }
    }
}

impl<'a, W: Write> InvoicePresenter for CsvInvoice<'a, W> {
    fn write_rows(&mut self, rows: &[InvoiceRow<'_>]) -> Result<()> {
        // クォートは列の型で決めるため、書き出し前に済ませておく
        let mut csv = WriterBuilder::new()
            .quote_style(QuoteStyle::Never)
            .from_writer(&mut *self.writer);

        csv.write_record(COLUMNS.iter().map(|column| quote(column.label)))?;
        for row in rows {
            csv.write_record(COLUMNS.iter().map(|column| column.cell(row, self.rate)))?;
        }
        csv.flush()
            .map_err(|err| BillingError::Serialization(err.to_string()))?;

        Ok(())
    }
}

/// 行をCSV文字列に変換する。
pub fn to_csv(rows: &[InvoiceRow<'_>], rate: f64) -> Result<String> {
    let mut buffer = Vec::new();
    CsvInvoice::new(&mut buffer, rate).write_rows(rows)?;
    String::from_utf8(buffer)
        .map_err(|err| BillingError::Serialization(err.to_string()))
}
