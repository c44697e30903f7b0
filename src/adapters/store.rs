use crate::core::QuotationStore;
use crate::domain::model::{Quotation, QuotationStatus, QuotationUpdate};
use crate::utils::error::{ApprovalError, Result};
use reqwest::Client;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Supabase (PostgREST) 上的報價單資料表
#[derive(Debug, Clone)]
pub struct PostgrestQuotationStore {
    client: Client,
    base_url: String,
    api_key: String,
    table: String,
}

impl PostgrestQuotationStore {
    pub fn new(base_url: &str, api_key: &str, table: &str) -> Self {
        Self::with_client(Client::new(), base_url, api_key, table)
    }

    pub fn with_client(client: Client, base_url: &str, api_key: &str, table: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            table: table.to_string(),
        }
    }

    fn table_url(&self) -> String {
        format!("{}/rest/v1/{}", self.base_url, self.table)
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
    }

    async fn rows(response: reqwest::Response, operation: &str) -> Result<Vec<Quotation>> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApprovalError::persistence(format!(
                "{} failed with HTTP {}: {}",
                operation,
                status.as_u16(),
                body
            )));
        }

        response
            .json::<Vec<Quotation>>()
            .await
            .map_err(|e| ApprovalError::persistence(format!("{} returned an unexpected body: {}", operation, e)))
    }
}

impl QuotationStore for PostgrestQuotationStore {
    async fn fetch(&self, quotation_id: &str) -> Result<Option<Quotation>> {
        tracing::debug!(table = %self.table, "fetching quotation");

        let response = self
            .authorized(self.client.get(self.table_url()))
            .query(&[("id", format!("eq.{}", quotation_id)), ("select", "*".to_string())])
            .send()
            .await
            .map_err(|e| ApprovalError::persistence(format!("quotation lookup failed: {}", e)))?;

        let rows = Self::rows(response, "quotation lookup").await?;
        Ok(rows.into_iter().next())
    }

    async fn update(
        &self,
        quotation_id: &str,
        update: &QuotationUpdate,
        expected_status: Option<QuotationStatus>,
    ) -> Result<bool> {
        let mut filters = vec![("id", format!("eq.{}", quotation_id))];
        // status 過濾讓讀取-檢查-寫入變成單一條件更新
        if let Some(status) = &expected_status {
            filters.push(("status", format!("eq.{}", status)));
        }

        tracing::debug!(table = %self.table, conditional = expected_status.is_some(), "updating quotation");

        let response = self
            .authorized(self.client.patch(self.table_url()))
            .query(&filters)
            .header("Prefer", "return=representation")
            .json(&update.to_patch())
            .send()
            .await
            .map_err(|e| ApprovalError::persistence(format!("quotation update failed: {}", e)))?;

        let rows = Self::rows(response, "quotation update").await?;
        Ok(!rows.is_empty())
    }
}

/// 記憶體內的報價單儲存，供本地執行與測試使用
#[derive(Debug, Clone, Default)]
pub struct InMemoryQuotationStore {
    rows: Arc<Mutex<HashMap<String, Quotation>>>,
    writes: Arc<AtomicUsize>,
    fail_updates: Arc<AtomicBool>,
}

impl InMemoryQuotationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 直接放入一列，不計入寫入次數
    pub async fn insert(&self, quotation: Quotation) {
        let mut rows = self.rows.lock().await;
        rows.insert(quotation.id.clone(), quotation);
    }

    pub async fn get(&self, quotation_id: &str) -> Option<Quotation> {
        let rows = self.rows.lock().await;
        rows.get(quotation_id).cloned()
    }

    /// 透過 `update` 嘗試過的寫入次數
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// 讓之後的 `update` 全部失敗
    pub fn fail_updates(&self, enabled: bool) {
        self.fail_updates.store(enabled, Ordering::SeqCst);
    }
}

impl QuotationStore for InMemoryQuotationStore {
    async fn fetch(&self, quotation_id: &str) -> Result<Option<Quotation>> {
        Ok(self.get(quotation_id).await)
    }

    async fn update(
        &self,
        quotation_id: &str,
        update: &QuotationUpdate,
        expected_status: Option<QuotationStatus>,
    ) -> Result<bool> {
        self.writes.fetch_add(1, Ordering::SeqCst);

        if self.fail_updates.load(Ordering::SeqCst) {
            return Err(ApprovalError::persistence("simulated store failure"));
        }

        let mut rows = self.rows.lock().await;
        match rows.get_mut(quotation_id) {
            Some(row) if expected_status.as_ref().map_or(true, |s| *s == row.status) => {
                update.apply(row);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
