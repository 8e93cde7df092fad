//! FRED (Federal Reserve Economic Data) 시계열 클라이언트.
//!
//! 정책금리(`FEDFUNDS`)와 통화량(`M2SL`)의 최신 관측값을 조회합니다.
//! API 키가 없으면 호출하지 않고 `FetchError::NotConfigured`를 반환하며,
//! 이 사실은 프로세스당 한 번만 경고로 기록합니다.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, warn};

use super::with_timeout;
use crate::error::FetchError;

/// 조회 대상 시계열.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FredSeries {
    /// 연방기금금리 (%)
    FedFunds,
    /// M2 통화량 (십억 달러)
    M2,
}

impl FredSeries {
    pub fn id(&self) -> &'static str {
        match self {
            FredSeries::FedFunds => "FEDFUNDS",
            FredSeries::M2 => "M2SL",
        }
    }
}

#[derive(Debug, Deserialize)]
struct ObservationsResponse {
    observations: Vec<Observation>,
}

#[derive(Debug, Deserialize)]
struct Observation {
    date: String,
    value: String,
}

/// FRED API 클라이언트.
pub struct FredClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    timeout: Duration,
    missing_key_logged: AtomicBool,
}

impl FredClient {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();

        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.filter(|key| !key.trim().is_empty()),
            timeout,
            missing_key_logged: AtomicBool::new(false),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    /// 시계열의 가장 최근 관측값을 반환합니다. 결측값(`"."`)은 건너뜁니다.
    pub async fn latest(&self, series: FredSeries) -> Result<f64, FetchError> {
        let Some(api_key) = self.api_key.as_deref() else {
            if !self.missing_key_logged.swap(true, Ordering::Relaxed) {
                warn!("FRED_API_KEY 미설정, FRED 지표는 기본값을 사용합니다");
            }
            return Err(FetchError::NotConfigured("FRED_API_KEY".to_string()));
        };

        let url = format!("{}/fred/series/observations", self.base_url);
        let request = self.client.get(&url).query(&[
            ("series_id", series.id()),
            ("api_key", api_key),
            ("file_type", "json"),
            ("sort_order", "desc"),
            ("limit", "5"),
        ]);

        let body: ObservationsResponse = with_timeout(self.timeout, async {
            let response = request.send().await?.error_for_status()?;
            Ok::<_, FetchError>(response.json::<ObservationsResponse>().await?)
        })
        .await?;

        let (date, value) = body
            .observations
            .iter()
            .find_map(|obs| obs.value.parse::<f64>().ok().map(|v| (obs.date.as_str(), v)))
            .ok_or_else(|| FetchError::NoData(series.id().to_string()))?;

        debug!(series = series.id(), date, value, "FRED 관측값 수신");
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    #[tokio::test]
    async fn test_latest_skips_missing_values() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/fred/series/observations")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("series_id".into(), "FEDFUNDS".into()),
                Matcher::UrlEncoded("api_key".into(), "test-key".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"observations":[
                    {"date":"2024-06-01","value":"."},
                    {"date":"2024-05-01","value":"5.33"}
                ]}"#,
            )
            .create_async()
            .await;

        let client = FredClient::new(
            server.url(),
            Some("test-key".to_string()),
            Duration::from_secs(5),
        );
        let value = client.latest(FredSeries::FedFunds).await.unwrap();

        assert_eq!(value, 5.33);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_missing_key_is_not_configured() {
        let client = FredClient::new("http://127.0.0.1:9", None, Duration::from_secs(5));
        assert!(!client.is_configured());

        let err = client.latest(FredSeries::M2).await.unwrap_err();
        assert_eq!(err, FetchError::NotConfigured("FRED_API_KEY".to_string()));
        // 두 번째 호출도 동일하게 실패 (경고는 한 번만)
        assert!(client.latest(FredSeries::M2).await.is_err());
    }

    #[tokio::test]
    async fn test_rate_limit_status_is_classified() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/fred/series/observations")
            .match_query(Matcher::Any)
            .with_status(429)
            .create_async()
            .await;

        let client = FredClient::new(server.url(), Some("k".to_string()), Duration::from_secs(5));
        let err = client.latest(FredSeries::M2).await.unwrap_err();
        assert!(err.is_rate_limited());
    }
}
