use crate::auth::TokenProvider;
use crate::config::SourceConfig;
use crate::error::Error;
use crate::report::Report;
use chrono::NaiveDate;
use log::{error, info};
use reqwest::{Client, StatusCode, Url};
use serde_json::Value;

const STATS_PATH: [&str; 6] = [
    "partners",
    "publisher",
    "mediation",
    "applications",
    "v6",
    "stats",
];

#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait MediationApi: Send + Sync + 'static {
    /// Fetches raw breakdown groups for one app within the given date range.
    /// # Arguments
    /// * `app_key` - The mediation app key of one platform build.
    /// * `start` - First day of the range, inclusive.
    /// * `end` - Last day of the range, inclusive.
    /// * `report` - Supplies the requested metrics and breakdowns.
    /// # Returns
    /// A Result containing either the breakdown groups, each with a nested `data` list,
    /// or an Error.
    async fn fetch(
        &self,
        app_key: &str,
        start: &NaiveDate,
        end: &NaiveDate,
        report: &Report,
    ) -> Result<Vec<Value>, Error>;
}

pub struct ApiClient<T> {
    client: Client,
    base_url: String,
    tokens: T,
}

impl<T: TokenProvider> ApiClient<T> {
    pub fn new(client: Client, config: &SourceConfig, tokens: T) -> Self {
        ApiClient {
            client,
            base_url: config.api_url.clone(),
            tokens,
        }
    }

    fn stats_url(
        &self,
        app_key: &str,
        start: &NaiveDate,
        end: &NaiveDate,
        report: &Report,
    ) -> Result<Url, Error> {
        let mut url = Url::parse(&self.base_url)?;
        url.path_segments_mut()
            .map_err(|_| Error::UrlParsingFailed(url::ParseError::SetHostOnCannotBeABaseUrl))?
            .pop_if_empty()
            .extend(&STATS_PATH);
        url.query_pairs_mut()
            .append_pair("startDate", &start.format("%Y-%m-%d").to_string())
            .append_pair("endDate", &end.format("%Y-%m-%d").to_string())
            .append_pair("appKey", app_key)
            .append_pair("metrics", &report.metric_param())
            .append_pair("breakdowns", report.breakdowns);
        Ok(url)
    }
}

#[async_trait::async_trait]
impl<T: TokenProvider> MediationApi for ApiClient<T> {
    async fn fetch(
        &self,
        app_key: &str,
        start: &NaiveDate,
        end: &NaiveDate,
        report: &Report,
    ) -> Result<Vec<Value>, Error> {
        let url = self.stats_url(app_key, start, end, report)?;
        let token = self.tokens.bearer_token().await?;

        info!(
            "Fetching {} data for app key {} from {} to {}",
            report.name, app_key, start, end
        );

        let resp = self
            .client
            .get(url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|source| Error::Fetch {
                app_key: app_key.to_string(),
                source,
            })?;

        match resp.status() {
            StatusCode::OK => {
                let payload: Value = resp.json().await.map_err(|source| Error::Fetch {
                    app_key: app_key.to_string(),
                    source,
                })?;

                match payload {
                    Value::Array(groups) => {
                        info!("Fetched {} groups for app key {}", groups.len(), app_key);
                        Ok(groups)
                    }
                    Value::Null => Ok(vec![]),
                    other => Err(Error::FetchStatus {
                        app_key: app_key.to_string(),
                        status: StatusCode::OK,
                        body: format!("expected a list of groups, got {}", other),
                    }),
                }
            }
            status => {
                let body = resp.text().await.unwrap_or_default();
                error!("Error fetching {} for app key {}: {}", report.name, app_key, status);
                Err(Error::FetchStatus {
                    app_key: app_key.to_string(),
                    status,
                    body,
                })
            }
        }
    }
}
