//! 종목별 리포트 집계.
//!
//! 리포트 DB의 `report_analysis`를 종목 코드 단위로 묶어 목록, 상세 히스토리,
//! 목표가 추이, 투자의견 분포를 제공합니다.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use tracing::{debug, instrument};

use super::reports::{upside_percent, ReportStore};
use crate::error::StoreError;
use crate::provider::round_to;

/// 종목 요약.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct StockInfo {
    pub stock_code: String,
    pub stock_name: String,
    /// 종목을 다룬 리포트 수
    pub total_reports: i64,
    pub latest_report_date: Option<String>,
    pub latest_target_price: Option<f64>,
    pub latest_recommendation: Option<String>,
    pub avg_target_price: Option<f64>,
    /// 평균 상승 여력 (%), 소수 둘째 자리
    pub avg_upside: Option<f64>,
}

impl StockInfo {
    fn rounded(mut self) -> Self {
        self.avg_upside = self.avg_upside.map(|upside| round_to(upside, 2));
        self
    }
}

/// 종목의 리포트 한 건.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct StockReport {
    pub id: i64,
    pub report_id: i64,
    pub report_date: String,
    pub report_title: String,
    pub report_category: Option<String>,
    pub house_name: Option<String>,
    pub analyst_name: Option<String>,
    pub current_price: Option<f64>,
    pub target_price: Option<f64>,
    pub recommendation: Option<String>,
    pub adjustment_type: Option<String>,
    pub profit_impact: Option<String>,
    #[sqlx(default)]
    pub upside_percent: Option<f64>,
    pub pdf_url: Option<String>,
}

/// 종목 상세.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockDetail {
    pub stock: StockInfo,
    /// 날짜 내림차순 한 페이지
    pub reports: Vec<StockReport>,
    pub total_reports: i64,
}

/// 목표가 추이 한 점.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct TargetPricePoint {
    pub date: String,
    pub target_price: f64,
    pub current_price: Option<f64>,
    pub house_name: Option<String>,
    pub recommendation: Option<String>,
}

/// 투자의견별 집계.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct RecommendationCount {
    pub recommendation: String,
    pub count: i64,
    pub avg_target_price: Option<f64>,
    pub latest_date: Option<String>,
}

/// 종목 집계 SELECT. `{filter}` 자리에 WHERE 절이 들어갑니다.
fn stock_info_sql(filter: &str, tail: &str) -> String {
    format!(
        r#"
        SELECT ra.stock_code,
               COALESCE(ra.stock_name, '') AS stock_name,
               COUNT(DISTINCT ra.report_id) AS total_reports,
               MAX(sr.date) AS latest_report_date,
               (SELECT CAST(ra2.target_price AS REAL)
                  FROM report_analysis ra2 JOIN sent_reports sr2 ON ra2.report_id = sr2.id
                 WHERE ra2.stock_code = ra.stock_code
                 ORDER BY sr2.date DESC, ra2.id DESC LIMIT 1) AS latest_target_price,
               (SELECT ra2.recommendation
                  FROM report_analysis ra2 JOIN sent_reports sr2 ON ra2.report_id = sr2.id
                 WHERE ra2.stock_code = ra.stock_code
                 ORDER BY sr2.date DESC, ra2.id DESC LIMIT 1) AS latest_recommendation,
               AVG(CAST(ra.target_price AS REAL)) AS avg_target_price,
               AVG(CASE
                     WHEN ra.current_price > 0 AND ra.target_price > 0
                     THEN (CAST(ra.target_price AS REAL) - ra.current_price) / ra.current_price * 100
                   END) AS avg_upside
        FROM report_analysis ra
        JOIN sent_reports sr ON ra.report_id = sr.id
        {filter}
        GROUP BY ra.stock_code, ra.stock_name
        {tail}
        "#
    )
}

const SEARCH_FILTER: &str =
    "WHERE (?1 IS NULL OR ra.stock_code LIKE ?1 OR ra.stock_name LIKE ?1)";

impl ReportStore {
    /// 리포트가 있는 종목 목록 (리포트 수 내림차순).
    ///
    /// `search`는 종목 코드/이름 부분 일치입니다.
    #[instrument(skip(self))]
    pub async fn stocks(
        &self,
        search: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<StockInfo>, StoreError> {
        let pattern = search.map(|s| format!("%{}%", s));
        let sql = stock_info_sql(
            SEARCH_FILTER,
            "ORDER BY total_reports DESC, latest_report_date DESC, ra.stock_code LIMIT ?2 OFFSET ?3",
        );

        let stocks = sqlx::query_as::<_, StockInfo>(&sql)
            .bind(pattern)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;

        debug!(count = stocks.len(), "종목 목록 조회");
        Ok(stocks.into_iter().map(StockInfo::rounded).collect())
    }

    /// 검색 조건에 맞는 종목 수.
    pub async fn count_stocks(&self, search: Option<&str>) -> Result<i64, StoreError> {
        let pattern = search.map(|s| format!("%{}%", s));
        let sql = format!(
            "SELECT COUNT(DISTINCT ra.stock_code) FROM report_analysis ra \
             JOIN sent_reports sr ON ra.report_id = sr.id {SEARCH_FILTER}"
        );

        let (count,): (i64,) = sqlx::query_as(&sql)
            .bind(pattern)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// 종목 상세와 리포트 히스토리. 리포트가 없는 종목이면 `None`.
    #[instrument(skip(self))]
    pub async fn stock_detail(
        &self,
        stock_code: &str,
        limit: i64,
        offset: i64,
    ) -> Result<Option<StockDetail>, StoreError> {
        let sql = stock_info_sql("WHERE ra.stock_code = ?1", "");
        let Some(stock) = sqlx::query_as::<_, StockInfo>(&sql)
            .bind(stock_code)
            .fetch_optional(&self.pool)
            .await?
        else {
            return Ok(None);
        };

        let reports = sqlx::query_as::<_, StockReport>(
            r#"
            SELECT ra.id, ra.report_id,
                   sr.date AS report_date, sr.title AS report_title,
                   sr.category AS report_category,
                   h.name AS house_name, a.name AS analyst_name,
                   CAST(ra.current_price AS REAL) AS current_price,
                   CAST(ra.target_price AS REAL) AS target_price,
                   ra.recommendation, ra.adjustment_type, ra.profit_impact, sr.pdf_url
            FROM report_analysis ra
            JOIN sent_reports sr ON ra.report_id = sr.id
            LEFT JOIN houses h ON ra.house_id = h.id
            LEFT JOIN analysts a ON ra.analyst_id = a.id
            WHERE ra.stock_code = ?1
            ORDER BY sr.date DESC, ra.id DESC
            LIMIT ?2 OFFSET ?3
            "#,
        )
        .bind(stock_code)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(|mut report| {
            report.upside_percent = upside_percent(report.current_price, report.target_price);
            report
        })
        .collect();

        let stock = stock.rounded();
        Ok(Some(StockDetail {
            total_reports: stock.total_reports,
            stock,
            reports,
        }))
    }

    /// 목표가가 있는 리포트의 날짜 오름차순 추이 (차트용).
    pub async fn target_price_history(
        &self,
        stock_code: &str,
    ) -> Result<Vec<TargetPricePoint>, StoreError> {
        let points = sqlx::query_as::<_, TargetPricePoint>(
            r#"
            SELECT sr.date,
                   CAST(ra.target_price AS REAL) AS target_price,
                   CAST(ra.current_price AS REAL) AS current_price,
                   h.name AS house_name, ra.recommendation
            FROM report_analysis ra
            JOIN sent_reports sr ON ra.report_id = sr.id
            LEFT JOIN houses h ON ra.house_id = h.id
            WHERE ra.stock_code = ?1 AND ra.target_price IS NOT NULL
            ORDER BY sr.date ASC, ra.id ASC
            "#,
        )
        .bind(stock_code)
        .fetch_all(&self.pool)
        .await?;
        Ok(points)
    }

    /// 투자의견별 건수 (많은 순).
    pub async fn recommendation_summary(
        &self,
        stock_code: &str,
    ) -> Result<Vec<RecommendationCount>, StoreError> {
        let summary = sqlx::query_as::<_, RecommendationCount>(
            r#"
            SELECT ra.recommendation, COUNT(*) AS count,
                   AVG(CAST(ra.target_price AS REAL)) AS avg_target_price,
                   MAX(sr.date) AS latest_date
            FROM report_analysis ra
            JOIN sent_reports sr ON ra.report_id = sr.id
            WHERE ra.stock_code = ?1 AND ra.recommendation IS NOT NULL
            GROUP BY ra.recommendation
            ORDER BY count DESC, ra.recommendation
            "#,
        )
        .bind(stock_code)
        .fetch_all(&self.pool)
        .await?;
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::reports::tests::seeded_pool;

    /// 삼성전자 리포트 두 건을 더한 저장소.
    async fn stock_store() -> ReportStore {
        let pool = seeded_pool().await;
        for statement in [
            "INSERT INTO sent_reports VALUES (4, '2024-06-05', '기업', '삼성전자 목표가 상향', NULL, 1)",
            "INSERT INTO sent_reports VALUES (5, '2024-06-04', '기업', '삼성전자 의견 하향', NULL, 1)",
            "INSERT INTO report_analysis VALUES (4, 4, '005930', '삼성전자', 75000, 100000, 9000, '매수', '상향', NULL, '2024-06-05', 2, 2)",
            "INSERT INTO report_analysis VALUES (5, 5, '005930', '삼성전자', 74000, NULL, NULL, '중립', '하향', NULL, '2024-06-04', 1, NULL)",
        ] {
            sqlx::query(statement).execute(&pool).await.unwrap();
        }
        ReportStore::new(pool)
    }

    #[tokio::test]
    async fn test_stocks_ordered_by_report_count() {
        let store = stock_store().await;

        let stocks = store.stocks(None, 25, 0).await.unwrap();
        assert_eq!(
            stocks.iter().map(|s| s.stock_code.as_str()).collect::<Vec<_>>(),
            vec!["005930", "035420", "035720"]
        );

        let samsung = &stocks[0];
        assert_eq!(samsung.total_reports, 3);
        assert_eq!(samsung.latest_report_date.as_deref(), Some("2024-06-05"));
        assert_eq!(samsung.latest_target_price, Some(100000.0));
        assert_eq!(samsung.latest_recommendation.as_deref(), Some("매수"));
        assert_eq!(samsung.avg_target_price, Some(95500.0));
        assert_eq!(samsung.avg_upside, Some(31.67));

        assert_eq!(stocks[2].avg_upside, None);
        assert_eq!(store.count_stocks(None).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_stock_search_matches_code_or_name() {
        let store = stock_store().await;

        let by_name = store.stocks(Some("카카"), 25, 0).await.unwrap();
        assert_eq!(by_name.len(), 1);
        assert_eq!(by_name[0].stock_code, "035720");

        assert_eq!(store.count_stocks(Some("0354")).await.unwrap(), 1);
        assert!(store.stocks(Some("없는종목"), 25, 0).await.unwrap().is_empty());

        let second_page = store.stocks(None, 2, 2).await.unwrap();
        assert_eq!(second_page.len(), 1);
    }

    #[tokio::test]
    async fn test_stock_detail_history() {
        let store = stock_store().await;

        let detail = store.stock_detail("005930", 50, 0).await.unwrap().unwrap();
        assert_eq!(detail.total_reports, 3);
        assert_eq!(
            detail.reports.iter().map(|r| r.id).collect::<Vec<_>>(),
            vec![4, 5, 1]
        );
        assert_eq!(detail.reports[0].house_name.as_deref(), Some("KB"));
        assert_eq!(detail.reports[0].analyst_name.as_deref(), Some("이영희"));
        assert_eq!(detail.reports[0].upside_percent, Some(33.33));
        assert_eq!(detail.reports[1].analyst_name, None);
        assert_eq!(detail.reports[1].upside_percent, None);
        assert_eq!(detail.reports[2].pdf_url.as_deref(), Some("https://example.com/1.pdf"));

        let paged = store.stock_detail("005930", 1, 1).await.unwrap().unwrap();
        assert_eq!(paged.reports.len(), 1);
        assert_eq!(paged.reports[0].id, 5);
        assert_eq!(paged.total_reports, 3);

        assert!(store.stock_detail("999999", 50, 0).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_target_price_history_skips_missing_targets() {
        let store = stock_store().await;

        let history = store.target_price_history("005930").await.unwrap();
        assert_eq!(
            history
                .iter()
                .map(|p| (p.date.as_str(), p.target_price))
                .collect::<Vec<_>>(),
            vec![("2024-06-01", 91000.0), ("2024-06-05", 100000.0)]
        );
        assert_eq!(history[0].house_name.as_deref(), Some("미래"));
        assert!(store.target_price_history("035720").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_recommendation_summary_counts() {
        let store = stock_store().await;

        let summary = store.recommendation_summary("005930").await.unwrap();
        assert_eq!(summary.len(), 2);
        assert_eq!(summary[0].recommendation, "매수");
        assert_eq!(summary[0].count, 2);
        assert_eq!(summary[0].avg_target_price, Some(95500.0));
        assert_eq!(summary[0].latest_date.as_deref(), Some("2024-06-05"));
        assert_eq!(summary[1].recommendation, "중립");
        assert_eq!(summary[1].avg_target_price, None);
    }
}
