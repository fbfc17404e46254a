//! Paginated order search.

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use reports::{OrderRecord, ReportPeriod};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, error, info};

use crate::error::body_snippet;
use crate::{ApiConfig, AuthToken, OrderQuery, OrderSource, QueryError};

/// One page of `GET /orders/search`.
#[derive(Deserialize)]
struct SearchPage {
    #[serde(alias = "data")]
    records: Vec<Value>,
    #[serde(default)]
    has_more: bool,
}

/// Client for `GET <base_url>/orders/search`.
pub struct QueryClient {
    http: Client,
    endpoint: String,
    page_size: u32,
    max_pages: u32,
}

impl QueryClient {
    pub fn new(http: Client, config: &ApiConfig) -> Self {
        Self {
            http,
            endpoint: config.endpoint("orders/search"),
            page_size: config.page_size.max(1),
            max_pages: config.max_pages.max(1),
        }
    }

    fn params(query: &OrderQuery, page: u32, size: u32) -> Vec<(String, String)> {
        let mut params = vec![
            ("from".to_owned(), query.period.from.format("%Y-%m-%d").to_string()),
            ("to".to_owned(), query.period.to.format("%Y-%m-%d").to_string()),
        ];
        params.extend(query.filters.iter().cloned());
        if !query.fields.is_empty() {
            params.push(("fields".to_owned(), query.fields.join(",")));
        }
        params.push(("size".to_owned(), size.to_string()));
        params.push(("page".to_owned(), page.to_string()));
        params
    }

    async fn fetch_page(
        &self,
        token: &AuthToken,
        query: &OrderQuery,
        page: u32,
        size: u32,
    ) -> Result<SearchPage, QueryError> {
        debug!("searching page {page}");
        let response = self
            .http
            .get(&self.endpoint)
            .bearer_auth(token.secret())
            .query(&Self::params(query, page, size))
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            error!("search page {page} failed: HTTP {}", status.as_u16());
            return Err(QueryError::Status {
                status: status.as_u16(),
                body: body_snippet(&body),
            });
        }

        serde_json::from_str(&body)
            .map_err(|e| QueryError::Malformed(format!("page {page}: {e}")))
    }
}

#[async_trait]
impl OrderSource for QueryClient {
    async fn search(
        &self,
        token: &AuthToken,
        query: &OrderQuery,
    ) -> Result<Vec<OrderRecord>, QueryError> {
        let mut records = Vec::new();

        for page in 0..self.max_pages {
            let result = self.fetch_page(token, query, page, self.page_size).await?;
            let count = result.records.len();

            for (index, raw) in result.records.into_iter().enumerate() {
                let record = OrderRecord::from_json(raw).ok_or_else(|| {
                    QueryError::Malformed(format!("page {page}, record {index} is not an object"))
                })?;
                records.push(record);
            }
            info!("retrieved {count} records from page {page}");

            if !result.has_more {
                info!("total records retrieved: {}", records.len());
                return Ok(records);
            }
        }

        Err(QueryError::PageLimit {
            max_pages: self.max_pages,
        })
    }

    async fn probe(&self, token: &AuthToken) -> Result<(), QueryError> {
        let today = Utc::now().date_naive();
        let query = OrderQuery {
            period: ReportPeriod {
                from: today,
                to: today,
            },
            filters: Vec::new(),
            fields: Vec::new(),
        };
        let page = self.fetch_page(token, &query, 0, 1).await?;
        debug!("probe returned {} records", page.records.len());
        Ok(())
    }
}
