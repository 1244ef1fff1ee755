use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Toggl detailed reportの1件のタイムエントリー。
///
/// 請求処理で解釈するのは`description`、`start`、`end`のみ。
/// それ以外のフィールドは`extra`にそのまま保持し、再シリアライズ時に書き戻す。
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct TimeEntry {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub description: String,
    pub start: DateTime<FixedOffset>,
    pub end: DateTime<FixedOffset>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// `null`の文字列を空文字列として読む。
fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}
