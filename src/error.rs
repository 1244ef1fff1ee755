use std::path::PathBuf;

use thiserror::Error;

/// 請求書生成の各段階で発生するエラー。
///
/// コマンド層では`anyhow`でコンテキストを付与して扱う。
#[derive(Error, Debug)]
pub enum BillingError {
    /// Toggl Reports APIからページを取得できなかった。
    #[error("Failed to fetch report page {page}")]
    Fetch {
        page: u32,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// 入力JSONを解釈できなかった。
    #[error("Malformed report input: {0}")]
    MalformedInput(#[from] serde_json::Error),

    /// CSVへの変換に失敗した。
    #[error("Failed to serialize invoice rows: {0}")]
    Serialization(String),

    /// ファイルの書き込みに失敗した。
    #[error("Failed to write {}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// 日時フォーマットが日付、時刻、オフセットを往復できない。
    #[error("Date format {format:?} cannot round-trip a timestamp: {reason}")]
    InvalidDateFormat { format: String, reason: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// 請求用のタイムスタンプを生成、再解釈できなかった。
    #[error("Invalid billing timestamp {0:?}")]
    Timestamp(String),
}

impl From<csv::Error> for BillingError {
    fn from(err: csv::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, BillingError>;
