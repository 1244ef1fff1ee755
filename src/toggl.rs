use async_trait::async_trait;
use log::debug;
#[cfg(test)]
use mockall::automock;
use reqwest::{header::CONTENT_TYPE, Client};

use crate::error::{BillingError, Result};
use crate::report::{ReportPage, ReportQuery};

/// Toggl Reports APIの既定のURL。
pub const DEFAULT_API_URL: &str = "https://api.track.toggl.com/reports/api/v2";
/// Reports APIが要求する`user_agent`の既定値。
pub const DEFAULT_USER_AGENT: &str = "toggl-billing";

/// Toggl Reports APIからレポートを取得するためのリポジトリ。
#[cfg_attr(test, automock)]
#[async_trait]
pub trait TogglRepository: Send + Sync {
    /// detailed reportの指定したページを取得する。
    ///
    /// # Arguments
    ///
    /// * `query` - ワークスペースと期間
    /// * `page` - 1から始まるページ番号
    async fn fetch_report_page(&self, query: &ReportQuery, page: u32) -> Result<ReportPage>;
}

/// Toggl Reports APIと通信するためのクライアント。
///
/// # Examples
///
/// ```
/// let client = TogglClient::new(api_token);
/// let page = client.fetch_report_page(&query, 1).await.unwrap();
/// ```
pub struct TogglClient {
    client: Client,
    api_url: String,
    api_token: String,
    user_agent: String,
}

impl TogglClient {
    /// 新しい`TogglClient`を返す。
    pub fn new(api_token: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_url: DEFAULT_API_URL.to_string(),
            api_token: api_token.into(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }

    /// 接続先のURLを変更する。
    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }
}

#[async_trait]
impl TogglRepository for TogglClient {
    async fn fetch_report_page(&self, query: &ReportQuery, page: u32) -> Result<ReportPage> {
        let fetch_error = |source: reqwest::Error| BillingError::Fetch {
            page,
            source: Box::new(source),
        };

        debug!("START REQ {:?} page={}", query, page);
        let report_page = self
            .client
            .get(format!("{}/details", self.api_url))
            .basic_auth(&self.api_token, Some("api_token"))
            .header(CONTENT_TYPE, "application/json")
            .query(&[
                ("workspace_id", query.workspace_id.to_string()),
                ("since", query.since.format("%Y-%m-%d").to_string()),
                ("until", query.until.format("%Y-%m-%d").to_string()),
                ("page", page.to_string()),
                ("user_agent", self.user_agent.clone()),
            ])
            .send()
            .await
            .map_err(fetch_error)?
            .error_for_status()
            .map_err(fetch_error)?
            .json::<ReportPage>()
            .await
            .map_err(fetch_error)?;
        debug!(
            "END REQ page={} entries={} per_page={}",
            page,
            report_page.data.len(),
            report_page.per_page
        );

        Ok(report_page)
    }
}
