use std::fmt::Write;

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveTime, TimeZone, Timelike, Utc};

use crate::error::{BillingError, Result};

#[cfg(not(test))]
/// 現在のUTC時間を取得する。
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// テスト時に利用するモック時間を取得する。
#[cfg(test)]
pub mod mock_datetime {
    use std::cell::RefCell;

    use super::DateTime;
    use super::Utc;

    thread_local! {
        static MOCK_TIME: RefCell<Option<DateTime<Utc>>> = RefCell::new(None);
    }

    /// モック時間を取得する。
    pub fn now() -> DateTime<Utc> {
        MOCK_TIME.with(|cell| cell.borrow().as_ref().cloned().unwrap_or_else(Utc::now))
    }

    /// モック時間を設定する。
    pub fn set_mock_time(time: DateTime<Utc>) {
        MOCK_TIME.with(|cell| *cell.borrow_mut() = Some(time));
    }

    // 設定したモック時間をクリアする。
    pub fn clear_mock_time() {
        MOCK_TIME.with(|cell| *cell.borrow_mut() = None);
    }
}

#[cfg(test)]
pub use mock_datetime::now;

/// 指定したタイムゾーンでの日付の0:00を返す。
///
/// 0:00が夏時間の切り替えで存在しない場合は、その日の最初の有効な時刻を返す。
pub fn local_midnight<Tz: TimeZone>(tz: &Tz, date: NaiveDate) -> Option<DateTime<Tz>> {
    let midnight = date.and_time(NaiveTime::MIN);
    (0..=24 * 4)
        .map(|quarter| midnight + Duration::minutes(15 * quarter))
        .find_map(|naive| tz.from_local_datetime(&naive).earliest())
}

/// 翌日の0:00を返す。日付の上限を超える場合は`None`。
pub fn start_of_next_day<Tz: TimeZone>(datetime: &DateTime<Tz>) -> Option<DateTime<Tz>> {
    let next_date = datetime.date_naive().succ_opt()?;
    local_midnight(&datetime.timezone(), next_date)
}

/// 秒以下を切り捨てる。
///
/// 現地時刻を引き直さずに瞬間から差し引くため、夏時間の終了で重複する時刻でもオフセットを保つ。
pub fn truncate_to_minute<Tz: TimeZone>(datetime: &DateTime<Tz>) -> DateTime<Tz> {
    datetime.clone()
        - Duration::seconds(i64::from(datetime.second()))
        - Duration::nanoseconds(i64::from(datetime.nanosecond()))
}

/// 日時を`format`で文字列化する。
///
/// 不正な書式指定子はパニックせずにエラーとして返す。
pub fn format_timestamp<Tz: TimeZone>(datetime: &DateTime<Tz>, format: &str) -> Result<String>
where
    Tz::Offset: std::fmt::Display,
{
    let mut formatted = String::new();
    write!(formatted, "{}", datetime.format(format))
        .map_err(|_| BillingError::Timestamp(format!("unsupported format {:?}", format)))?;
    Ok(formatted)
}

/// `format_timestamp`で生成した文字列を日時に戻す。
pub fn parse_timestamp(value: &str, format: &str) -> Result<DateTime<FixedOffset>> {
    DateTime::parse_from_str(value, format).map_err(|_| BillingError::Timestamp(value.to_string()))
}
