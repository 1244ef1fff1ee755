use std::path::PathBuf;

use anyhow::Context;
use chrono::{Duration, FixedOffset, TimeZone};

use crate::datetime::{format_timestamp, parse_timestamp};
use crate::error::{BillingError, Result};

/// 請求単価の既定値(1時間あたり)。
pub const DEFAULT_RATE: f64 = 125.0;
/// 最小請求時間の既定値(15分、ミリ秒)。
pub const DEFAULT_MIN_BILLABLE_MS: i64 = 15 * 60 * 1000;
/// 請求用タイムスタンプの既定の書式。
pub const DEFAULT_DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%:z";

/// 請求処理の設定。
///
/// 生成時に検証し、処理中は変更しない。
#[derive(Clone, Debug, PartialEq)]
pub struct BillingConfig {
    pub rate: f64,
    pub min_billable: Duration,
    pub date_format: String,
    pub file_postfix: String,
}

impl BillingConfig {
    /// 新しい`BillingConfig`を返す。
    ///
    /// # Arguments
    ///
    /// * `rate` - 1時間あたりの単価
    /// * `min_billable_ms` - 最小請求時間(ミリ秒)
    /// * `date_format` - 請求用タイムスタンプの書式。日付、時刻、オフセットを往復できること
    /// * `file_postfix` - 出力ファイル名の末尾に付ける文字列
    pub fn new(
        rate: f64,
        min_billable_ms: i64,
        date_format: &str,
        file_postfix: &str,
    ) -> Result<Self> {
        if !rate.is_finite() || rate < 0.0 {
            return Err(BillingError::InvalidConfig(format!(
                "rate must be a non-negative number, got {}",
                rate
            )));
        }
        if min_billable_ms < 0 {
            return Err(BillingError::InvalidConfig(format!(
                "minimum billable duration must not be negative, got {}ms",
                min_billable_ms
            )));
        }
        validate_date_format(date_format)?;

        Ok(Self {
            rate,
            min_billable: Duration::milliseconds(min_billable_ms),
            date_format: date_format.to_string(),
            file_postfix: file_postfix.to_string(),
        })
    }
}

impl Default for BillingConfig {
    fn default() -> Self {
        Self {
            rate: DEFAULT_RATE,
            min_billable: Duration::milliseconds(DEFAULT_MIN_BILLABLE_MS),
            date_format: DEFAULT_DATE_FORMAT.to_string(),
            file_postfix: String::new(),
        }
    }
}

/// 書式で文字列化した日時を同じ書式で読み戻せることを確認する。
///
/// 分単位に切り捨てた日時が、オフセットも含めて一致すれば往復可能とみなす。
fn validate_date_format(format: &str) -> Result<()> {
    let invalid = |reason: &str| BillingError::InvalidDateFormat {
        format: format.to_string(),
        reason: reason.to_string(),
    };
    let offset = FixedOffset::east_opt(-(3 * 3600 + 30 * 60)).ok_or_else(|| invalid("offset"))?;
    let sample = offset
        .with_ymd_and_hms(2016, 12, 31, 23, 59, 0)
        .single()
        .ok_or_else(|| invalid("sample"))?;

    let formatted = format_timestamp(&sample, format).map_err(|_| invalid("unsupported"))?;
    let parsed =
        parse_timestamp(&formatted, format).map_err(|_| invalid("formatted value does not parse"))?;
    if parsed != sample || parsed.offset() != sample.offset() {
        return Err(invalid("formatted value loses information"));
    }

    Ok(())
}

/// `.env`ファイルを読み込み、環境変数に設定する。
///
/// カレントディレクトリ、設定ディレクトリ(`~/.config/toggl-billing/.env`など)の順に読み込む。
/// 既に設定されている変数は上書きしない。読み込んだファイルのパスを返す。
pub fn load_env_files() -> anyhow::Result<Vec<PathBuf>> {
    let mut candidates = vec![PathBuf::from(".env")];
    if let Some(config_dir) = dirs::config_dir() {
        candidates.push(config_dir.join("toggl-billing").join(".env"));
    }

    candidates
        .into_iter()
        .filter(|path| path.is_file())
        .map(|path| -> anyhow::Result<PathBuf> {
            dotenvy::from_path(&path)
                .with_context(|| format!("Failed to load environment from {}", path.display()))?;
            Ok(path)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use rstest::rstest;

    use super::{BillingConfig, DEFAULT_DATE_FORMAT};
    use crate::error::BillingError;

    #[test]
    fn test_default_matches_new_with_defaults() {
        let config = BillingConfig::new(125.0, 900_000, DEFAULT_DATE_FORMAT, "").unwrap();

        assert_eq!(config, BillingConfig::default());
        assert_eq!(config.min_billable, Duration::minutes(15));
    }

    #[rstest]
    #[case::rfc3339("%Y-%m-%dT%H:%M:%S%:z")]
    #[case::day_first("%d/%m/%Y %H:%M:%S %z")]
    #[case::without_seconds("%Y-%m-%d %H:%M %:z")]
    fn test_round_trip_formats(#[case] format: &str) {
        assert!(BillingConfig::new(125.0, 0, format, "").is_ok());
    }

    #[rstest]
    #[case::no_offset("%Y-%m-%dT%H:%M:%S")]
    #[case::date_only("%Y-%m-%d")]
    #[case::no_year("%m-%d %H:%M:%S%:z")]
    #[case::bad_specifier("%Y-%Q")]
    fn test_lossy_formats_are_rejected(#[case] format: &str) {
        let result = BillingConfig::new(125.0, 0, format, "");

        assert!(matches!(
            result,
            Err(BillingError::InvalidDateFormat { .. })
        ));
    }

    #[rstest]
    #[case::negative_rate(-1.0, 0)]
    #[case::nan_rate(f64::NAN, 0)]
    #[case::negative_minimum(125.0, -1)]
    fn test_invalid_values(#[case] rate: f64, #[case] min_billable_ms: i64) {
        let result = BillingConfig::new(rate, min_billable_ms, DEFAULT_DATE_FORMAT, "");

        assert!(matches!(result, Err(BillingError::InvalidConfig(_))));
    }
}
