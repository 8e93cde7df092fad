//! 증권사 리포트 저장소.
//!
//! 스키마 (외부 수집기 소유):
//! - `sent_reports(id, date, category, title, pdf_url, sent)`
//! - `report_analysis(id, report_id, stock_code, stock_name, current_price, target_price,
//!   price_change, recommendation, adjustment_type, profit_impact, analysis_date,
//!   house_id, analyst_id)`
//! - `houses(id, name, full_name, created_at)`
//! - `analysts(id, name, department, position, house_id)`

use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqlitePool;
use sqlx::FromRow;
use tracing::{debug, instrument};

use crate::error::StoreError;
use crate::provider::round_to;

/// 발송된 리포트.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Report {
    pub id: i64,
    pub date: String,
    pub category: String,
    pub title: String,
    pub pdf_url: Option<String>,
    pub sent: bool,
}

/// 리포트의 종목별 분석.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct ReportAnalysis {
    pub id: i64,
    pub report_id: i64,
    pub stock_code: String,
    pub stock_name: String,
    pub current_price: Option<f64>,
    pub target_price: Option<f64>,
    pub price_change: Option<f64>,
    /// 목표가 상승 여력 (%)
    #[sqlx(default)]
    pub upside_percent: Option<f64>,
    pub recommendation: Option<String>,
    pub adjustment_type: Option<String>,
    pub profit_impact: Option<String>,
    pub analysis_date: String,
    pub report_title: Option<String>,
    pub report_category: Option<String>,
    pub pdf_url: Option<String>,
}

impl ReportAnalysis {
    fn with_upside(mut self) -> Self {
        self.upside_percent = upside_percent(self.current_price, self.target_price);
        self
    }
}

/// `(목표가 - 현재가) / 현재가 × 100`, 소수 둘째 자리.
pub fn upside_percent(current: Option<f64>, target: Option<f64>) -> Option<f64> {
    match (current, target) {
        (Some(current), Some(target)) if current > 0.0 && target > 0.0 => {
            Some(round_to((target - current) / current * 100.0, 2))
        }
        _ => None,
    }
}

/// 증권사.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct House {
    pub id: i64,
    pub name: String,
    pub full_name: Option<String>,
}

/// 애널리스트.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Analyst {
    pub id: i64,
    pub name: String,
    pub department: Option<String>,
    pub position: Option<String>,
    pub house_id: Option<i64>,
    pub house_name: Option<String>,
    pub house_full_name: Option<String>,
}

/// 리포트 DB 요약.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReportSummary {
    pub total_reports: i64,
    pub total_analyses: i64,
    pub latest_report_date: Option<String>,
}

const ANALYSIS_COLUMNS: &str = r#"
    ra.id, ra.report_id, ra.stock_code, ra.stock_name,
    CAST(ra.current_price AS REAL) AS current_price,
    CAST(ra.target_price AS REAL) AS target_price,
    CAST(ra.price_change AS REAL) AS price_change,
    ra.recommendation, ra.adjustment_type, ra.profit_impact, ra.analysis_date,
    sr.title AS report_title, sr.category AS report_category, sr.pdf_url
"#;

/// 리포트 저장소 (읽기 전용).
#[derive(Debug, Clone)]
pub struct ReportStore {
    pub(super) pool: SqlitePool,
}

impl ReportStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// 연결 상태를 확인합니다.
    pub async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    /// 최근 리포트 (날짜 내림차순).
    #[instrument(skip(self))]
    pub async fn recent_reports(
        &self,
        category: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Report>, StoreError> {
        let reports = sqlx::query_as::<_, Report>(
            r#"
            SELECT id, date, COALESCE(category, '') AS category, title, pdf_url,
                   COALESCE(sent, 0) AS sent
            FROM sent_reports
            WHERE (?1 IS NULL OR category = ?1)
            ORDER BY date DESC, id DESC
            LIMIT ?2 OFFSET ?3
            "#,
        )
        .bind(category)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        debug!(count = reports.len(), "리포트 조회");
        Ok(reports)
    }

    /// 카테고리 조건에 맞는 리포트 수.
    pub async fn count_reports(&self, category: Option<&str>) -> Result<i64, StoreError> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM sent_reports WHERE (?1 IS NULL OR category = ?1)",
        )
        .bind(category)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    /// 리포트 분석 (분석일 내림차순). 상승 여력을 함께 계산합니다.
    #[instrument(skip(self))]
    pub async fn report_analysis(
        &self,
        report_id: Option<i64>,
        stock_code: Option<&str>,
        limit: i64,
    ) -> Result<Vec<ReportAnalysis>, StoreError> {
        let sql = format!(
            r#"
            SELECT {ANALYSIS_COLUMNS}
            FROM report_analysis ra
            LEFT JOIN sent_reports sr ON ra.report_id = sr.id
            WHERE (?1 IS NULL OR ra.report_id = ?1)
              AND (?2 IS NULL OR ra.stock_code = ?2)
            ORDER BY ra.analysis_date DESC, ra.id DESC
            LIMIT ?3
            "#
        );

        let rows = sqlx::query_as::<_, ReportAnalysis>(&sql)
            .bind(report_id)
            .bind(stock_code)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(ReportAnalysis::with_upside).collect())
    }

    /// 상승 여력 상위 종목.
    pub async fn top_recommendations(&self, limit: i64) -> Result<Vec<ReportAnalysis>, StoreError> {
        let sql = format!(
            r#"
            SELECT {ANALYSIS_COLUMNS}
            FROM report_analysis ra
            LEFT JOIN sent_reports sr ON ra.report_id = sr.id
            WHERE ra.target_price > 0 AND ra.current_price > 0
            ORDER BY (CAST(ra.target_price AS REAL) - ra.current_price) / ra.current_price DESC
            LIMIT ?1
            "#
        );

        let rows = sqlx::query_as::<_, ReportAnalysis>(&sql)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(ReportAnalysis::with_upside).collect())
    }

    /// 증권사 목록 (이름순).
    pub async fn houses(&self) -> Result<Vec<House>, StoreError> {
        let houses = sqlx::query_as::<_, House>(
            "SELECT id, name, full_name FROM houses ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(houses)
    }

    /// 애널리스트 목록 (이름순).
    pub async fn analysts(&self, house_id: Option<i64>) -> Result<Vec<Analyst>, StoreError> {
        let analysts = sqlx::query_as::<_, Analyst>(
            r#"
            SELECT a.id, a.name, a.department, a.position, a.house_id,
                   h.name AS house_name, h.full_name AS house_full_name
            FROM analysts a
            LEFT JOIN houses h ON a.house_id = h.id
            WHERE (?1 IS NULL OR a.house_id = ?1)
            ORDER BY a.name
            "#,
        )
        .bind(house_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(analysts)
    }

    pub async fn summary(&self) -> Result<ReportSummary, StoreError> {
        let (total_reports, latest_report_date): (i64, Option<String>) =
            sqlx::query_as("SELECT COUNT(*), MAX(date) FROM sent_reports")
                .fetch_one(&self.pool)
                .await?;
        let (total_analyses,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM report_analysis")
            .fetch_one(&self.pool)
            .await?;

        Ok(ReportSummary {
            total_reports,
            total_analyses,
            latest_report_date,
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    /// 스키마와 샘플 데이터를 담은 메모리 DB.
    pub(crate) async fn seeded_pool() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();

        for statement in [
            "CREATE TABLE sent_reports (id INTEGER PRIMARY KEY, date TEXT, category TEXT, title TEXT, pdf_url TEXT, sent INTEGER)",
            "CREATE TABLE report_analysis (id INTEGER PRIMARY KEY, report_id INTEGER, stock_code TEXT, stock_name TEXT, current_price REAL, target_price REAL, price_change REAL, recommendation TEXT, adjustment_type TEXT, profit_impact TEXT, analysis_date TEXT, house_id INTEGER, analyst_id INTEGER)",
            "CREATE TABLE houses (id INTEGER PRIMARY KEY, name TEXT, full_name TEXT, created_at TEXT)",
            "CREATE TABLE analysts (id INTEGER PRIMARY KEY, name TEXT, department TEXT, position TEXT, house_id INTEGER)",
            "INSERT INTO sent_reports VALUES (1, '2024-06-01', '기업', '삼성전자 HBM 점검', 'https://example.com/1.pdf', 1)",
            "INSERT INTO sent_reports VALUES (2, '2024-06-03', '산업', '반도체 업황', NULL, 1)",
            "INSERT INTO sent_reports VALUES (3, '2024-06-02', '기업', 'NAVER 실적 리뷰', NULL, 0)",
            "INSERT INTO report_analysis VALUES (1, 1, '005930', '삼성전자', 70000, 91000, 0, '매수', '상향', '긍정', '2024-06-01', 1, 1)",
            "INSERT INTO report_analysis VALUES (2, 3, '035420', 'NAVER', 180000, 198000, -5000, '매수', '유지', NULL, '2024-06-02', 2, 2)",
            "INSERT INTO report_analysis VALUES (3, 3, '035720', '카카오', 40000, NULL, NULL, '중립', NULL, NULL, '2024-06-02', 2, NULL)",
            "INSERT INTO houses VALUES (1, '미래', '미래에셋증권', '2024-01-01')",
            "INSERT INTO houses VALUES (2, 'KB', 'KB증권', '2024-01-01')",
            "INSERT INTO analysts VALUES (1, '김철수', '리서치센터', '연구원', 1)",
            "INSERT INTO analysts VALUES (2, '이영희', NULL, NULL, 2)",
        ] {
            sqlx::query(statement).execute(&pool).await.unwrap();
        }
        pool
    }

    #[tokio::test]
    async fn test_recent_reports_with_category_filter() {
        let store = ReportStore::new(seeded_pool().await);

        let all = store.recent_reports(None, 20, 0).await.unwrap();
        assert_eq!(
            all.iter().map(|r| r.id).collect::<Vec<_>>(),
            vec![2, 3, 1]
        );
        assert!(!all[1].sent);

        let company = store.recent_reports(Some("기업"), 1, 1).await.unwrap();
        assert_eq!(company.len(), 1);
        assert_eq!(company[0].id, 1);
        assert_eq!(store.count_reports(Some("기업")).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_analysis_computes_upside() {
        let store = ReportStore::new(seeded_pool().await);

        let rows = store.report_analysis(None, Some("005930"), 50).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].upside_percent, Some(30.0));
        assert_eq!(rows[0].report_title.as_deref(), Some("삼성전자 HBM 점검"));

        let by_report = store.report_analysis(Some(3), None, 50).await.unwrap();
        assert_eq!(by_report.len(), 2);
        assert!(by_report.iter().any(|r| r.upside_percent.is_none()));
    }

    #[tokio::test]
    async fn test_top_recommendations_order_by_upside() {
        let store = ReportStore::new(seeded_pool().await);

        let top = store.top_recommendations(10).await.unwrap();
        assert_eq!(
            top.iter().map(|r| r.stock_code.as_str()).collect::<Vec<_>>(),
            vec!["005930", "035420"]
        );
        assert_eq!(top[1].upside_percent, Some(10.0));
    }

    #[tokio::test]
    async fn test_houses_analysts_summary() {
        let store = ReportStore::new(seeded_pool().await);

        let houses = store.houses().await.unwrap();
        assert_eq!(houses[0].name, "KB");

        let analysts = store.analysts(Some(1)).await.unwrap();
        assert_eq!(analysts.len(), 1);
        assert_eq!(analysts[0].house_full_name.as_deref(), Some("미래에셋증권"));

        let summary = store.summary().await.unwrap();
        assert_eq!(summary.total_reports, 3);
        assert_eq!(summary.total_analyses, 3);
        assert_eq!(summary.latest_report_date.as_deref(), Some("2024-06-03"));
    }

    #[test]
    fn test_upside_percent_guards() {
        assert_eq!(upside_percent(Some(100.0), Some(125.0)), Some(25.0));
        assert_eq!(upside_percent(Some(0.0), Some(125.0)), None);
        assert_eq!(upside_percent(None, Some(125.0)), None);
    }
}
