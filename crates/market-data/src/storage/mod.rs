//! 읽기 전용 저장소.
//!
//! - [`ReportStore`]: 증권사 리포트/분석 DB (SQLite), 종목별 집계는 [`stocks`]
//! - [`NewsStore`]: 뉴스 DB (SQLite)
//!
//! 두 DB는 외부 수집기가 관리하며 이 서비스는 조회만 합니다.

pub mod news;
pub mod reports;
pub mod stocks;

use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use tracing::info;

use crate::error::StoreError;

pub use news::{NewsArticle, NewsSource, NewsStore, NewsSummary};
pub use reports::{Analyst, House, Report, ReportAnalysis, ReportStore, ReportSummary};
pub use stocks::{RecommendationCount, StockDetail, StockInfo, StockReport, TargetPricePoint};

/// 읽기 전용 SQLite 연결 풀을 엽니다. 파일이 없으면 실패합니다.
pub async fn open_read_only(url: &str, max_connections: u32) -> Result<SqlitePool, StoreError> {
    let options = SqliteConnectOptions::from_str(url)
        .map_err(|e| StoreError::Connection(format!("{}: {}", url, e)))?
        .read_only(true)
        .create_if_missing(false);

    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections.max(1))
        .acquire_timeout(Duration::from_secs(5))
        .connect_with(options)
        .await
        .map_err(|e| StoreError::Connection(format!("{}: {}", url, e)))?;

    info!(url = %url, "읽기 전용 DB 연결");
    Ok(pool)
}

/// 페이지 번호(1부터)와 크기로 OFFSET을 계산합니다.
pub fn page_offset(page: u32, page_size: u32) -> i64 {
    i64::from(page.max(1) - 1) * i64::from(page_size)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_offset() {
        assert_eq!(page_offset(1, 20), 0);
        assert_eq!(page_offset(3, 20), 40);
        assert_eq!(page_offset(0, 20), 0);
    }

    #[tokio::test]
    async fn test_missing_file_is_connection_error() {
        let result = open_read_only("sqlite:///nonexistent/dir/reports.db", 1).await;
        assert!(matches!(result, Err(StoreError::Connection(_))));
    }
}
