use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::Result;
use crate::time_entry::TimeEntry;

/// detailed reportを取得する際の検索条件。
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct ReportQuery {
    pub workspace_id: u64,
    pub since: NaiveDate,
    pub until: NaiveDate,
}

/// レポートに記録した検索条件。
///
/// 別のツールが出力した条件も読み込めるように、`ReportQuery`として解釈できない値はそのまま保持する。
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum ReportParams {
    Query(ReportQuery),
    Other(Value),
}

/// Reports APIが返す1ページ分のレスポンス。
#[derive(Debug, Deserialize)]
pub struct ReportPage {
    pub data: Vec<TimeEntry>,
    pub per_page: usize,
    /// `data`、`per_page`以外のフィールド(`total_grand`など)。
    #[serde(flatten)]
    pub meta: Map<String, Value>,
}

/// 全ページを連結したレポート。
///
/// メタデータは最初のページのものを保持し、`data`は取得順に追記する。
#[derive(Debug, PartialEq, Deserialize, Serialize)]
pub struct AggregatedReport {
    #[serde(flatten)]
    pub meta: Map<String, Value>,
    pub data: Vec<TimeEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<ReportParams>,
}

impl AggregatedReport {
    /// 最初のページから新しい`AggregatedReport`を返す。
    pub fn from_first_page(page: ReportPage, query: &ReportQuery) -> Self {
        let mut meta = page.meta;
        meta.insert("per_page".to_string(), Value::from(page.per_page));

        Self {
            meta,
            data: page.data,
            params: Some(ReportParams::Query(query.clone())),
        }
    }

    /// JSON文字列からレポートを読み込む。
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use serde_json::json;

    use super::{AggregatedReport, ReportPage, ReportParams, ReportQuery};
    use crate::error::BillingError;

    fn query() -> ReportQuery {
        ReportQuery {
            workspace_id: 42,
            since: NaiveDate::from_ymd_opt(2016, 7, 1).unwrap(),
            until: NaiveDate::from_ymd_opt(2016, 7, 31).unwrap(),
        }
    }

    #[test]
    fn test_from_first_page_keeps_metadata() {
        let page: ReportPage = serde_json::from_value(json!({
            "total_grand": 3600000,
            "total_count": 1,
            "per_page": 50,
            "data": [{
                "description": "x",
                "start": "2016-07-04T10:00:00Z",
                "end": "2016-07-04T11:00:00Z",
            }],
        }))
        .unwrap();

        let report = AggregatedReport::from_first_page(page, &query());
        let value = serde_json::to_value(&report).unwrap();

        assert_eq!(value["total_grand"], 3600000);
        assert_eq!(value["per_page"], 50);
        assert_eq!(value["params"]["workspace_id"], 42);
        assert_eq!(value["params"]["since"], "2016-07-01");
        assert_eq!(value["data"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_from_json_without_params() {
        let report = AggregatedReport::from_json(r#"{"data": []}"#).unwrap();

        assert!(report.data.is_empty());
        assert!(report.params.is_none());
    }

    #[test]
    fn test_from_json_with_query_params() {
        let report = AggregatedReport::from_json(
            r#"{"data": [], "params": {"workspace_id": 42, "since": "2016-07-01", "until": "2016-07-31"}}"#,
        )
        .unwrap();

        assert_eq!(report.params, Some(ReportParams::Query(query())));
    }

    /// 検索条件の形式が異なっていても`data`が読めれば受け付ける。
    #[test]
    fn test_from_json_keeps_loose_params() {
        let json = r#"{
            "per_page": 50,
            "data": [{"description": "x", "start": "2016-07-04T10:00:00Z", "end": "2016-07-04T11:00:00Z"}],
            "params": {"workspace_id": "123", "since": "2016-07-01", "page": 1}
        }"#;

        let report = AggregatedReport::from_json(json).unwrap();

        assert_eq!(report.data.len(), 1);
        assert_eq!(
            report.params,
            Some(ReportParams::Other(json!({
                "workspace_id": "123",
                "since": "2016-07-01",
                "page": 1,
            })))
        );
    }

    #[test]
    fn test_from_json_malformed() {
        let result = AggregatedReport::from_json("{\"data\": [");

        assert!(matches!(result, Err(BillingError::MalformedInput(_))));
    }
}
