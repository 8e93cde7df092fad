//! 공포탐욕지수 (Fear & Greed Index) 클라이언트.
//!
//! 공개 JSON API(`api.alternative.me/fng/`)에서 최신 값을 조회합니다.
//! API를 사용할 수 없으면 VIX 값으로부터 추정합니다 ([`FearGreedReading::from_vix`]).

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::with_timeout;
use crate::error::FetchError;

/// 공포탐욕지수 값과 분류.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FearGreedReading {
    /// 0 (극단적 공포) ~ 100 (극단적 탐욕)
    pub value: f64,
    pub classification: String,
}

impl FearGreedReading {
    /// VIX 기반 추정값.
    ///
    /// `50 - (vix - 20) * 2.5`를 0~100으로 제한합니다. VIX 20을 중립(50)으로 보고
    /// VIX가 1 오를 때마다 2.5씩 공포 쪽으로 이동합니다.
    pub fn from_vix(vix: f64) -> Self {
        let value = (50.0 - (vix - 20.0) * 2.5).clamp(0.0, 100.0).round();
        Self {
            value,
            classification: classify(value).to_string(),
        }
    }
}

/// 지수 값을 분류합니다.
pub fn classify(value: f64) -> &'static str {
    match value {
        v if v <= 25.0 => "Extreme Fear",
        v if v <= 45.0 => "Fear",
        v if v <= 55.0 => "Neutral",
        v if v <= 75.0 => "Greed",
        _ => "Extreme Greed",
    }
}

#[derive(Debug, Deserialize)]
struct FngResponse {
    data: Vec<FngEntry>,
}

#[derive(Debug, Deserialize)]
struct FngEntry {
    value: String,
    value_classification: Option<String>,
}

/// 공포탐욕지수 API 클라이언트.
pub struct FearGreedClient {
    client: Client,
    url: String,
    timeout: Duration,
}

impl FearGreedClient {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();

        Self {
            client,
            url: url.into(),
            timeout,
        }
    }

    /// 최신 지수를 조회합니다.
    pub async fn latest(&self) -> Result<FearGreedReading, FetchError> {
        let request = self.client.get(&self.url);
        let body: FngResponse = with_timeout(self.timeout, async {
            let response = request.send().await?.error_for_status()?;
            Ok::<_, FetchError>(response.json::<FngResponse>().await?)
        })
        .await?;

        let entry = body
            .data
            .first()
            .ok_or_else(|| FetchError::NoData("fear & greed".to_string()))?;
        let value: f64 = entry
            .value
            .trim()
            .parse()
            .map_err(|_| FetchError::Parse(format!("fear & greed value '{}'", entry.value)))?;

        let classification = entry
            .value_classification
            .clone()
            .unwrap_or_else(|| classify(value).to_string());

        debug!(value, classification = %classification, "공포탐욕지수 수신");
        Ok(FearGreedReading {
            value,
            classification,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vix_fallback_formula() {
        assert_eq!(FearGreedReading::from_vix(20.0).value, 50.0);
        assert_eq!(FearGreedReading::from_vix(16.0).value, 60.0);
        assert_eq!(FearGreedReading::from_vix(16.0).classification, "Greed");
        assert_eq!(FearGreedReading::from_vix(45.0).value, 0.0);
        assert_eq!(FearGreedReading::from_vix(45.0).classification, "Extreme Fear");
        assert_eq!(FearGreedReading::from_vix(0.0).value, 100.0);
    }

    #[test]
    fn test_classify_bands() {
        assert_eq!(classify(10.0), "Extreme Fear");
        assert_eq!(classify(40.0), "Fear");
        assert_eq!(classify(50.0), "Neutral");
        assert_eq!(classify(70.0), "Greed");
        assert_eq!(classify(90.0), "Extreme Greed");
    }

    #[tokio::test]
    async fn test_latest_parses_api_payload() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/fng/")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"name":"Fear and Greed Index","data":[
                    {"value":"72","value_classification":"Greed","timestamp":"1717459200"}
                ]}"#,
            )
            .create_async()
            .await;

        let client = FearGreedClient::new(format!("{}/fng/", server.url()), Duration::from_secs(5));
        let reading = client.latest().await.unwrap();

        assert_eq!(reading.value, 72.0);
        assert_eq!(reading.classification, "Greed");
    }

    #[tokio::test]
    async fn test_empty_payload_is_no_data() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/fng/")
            .with_status(200)
            .with_body(r#"{"data":[]}"#)
            .create_async()
            .await;

        let client = FearGreedClient::new(format!("{}/fng/", server.url()), Duration::from_secs(5));
        assert!(matches!(client.latest().await, Err(FetchError::NoData(_))));
    }

    #[tokio::test]
    async fn test_server_error_status() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/fng/")
            .with_status(503)
            .create_async()
            .await;

        let client = FearGreedClient::new(format!("{}/fng/", server.url()), Duration::from_secs(5));
        assert_eq!(client.latest().await.unwrap_err(), FetchError::Status(503));
    }
}
