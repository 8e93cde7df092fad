//! 뉴스 저장소.
//!
//! 스키마 (외부 수집기 소유):
//! `news(id, title, link, normalized_link, article_id, office_id, source, sent_at)`
//!
//! `sent_at`은 한국 시간 ISO 8601 문자열로 저장되어 있어 문자열 비교로 기간을 거릅니다.

use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqlitePool;
use sqlx::FromRow;
use tracing::debug;

use crate::error::StoreError;

/// `sent_at` 기준 시간대.
pub const NEWS_TIMEZONE: Tz = chrono_tz::Asia::Seoul;

/// 뉴스 기사.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct NewsArticle {
    pub id: i64,
    pub title: String,
    pub link: String,
    pub normalized_link: Option<String>,
    pub article_id: Option<String>,
    pub office_id: Option<String>,
    pub source: String,
    pub sent_at: String,
}

/// 언론사별 기사 수.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct NewsSource {
    pub source: String,
    pub count: i64,
}

/// 뉴스 DB 요약.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewsSummary {
    pub total_news: i64,
    pub recent_24h: i64,
}

const NEWS_COLUMNS: &str = "id, COALESCE(title, '') AS title, COALESCE(link, '') AS link, \
     normalized_link, CAST(article_id AS TEXT) AS article_id, CAST(office_id AS TEXT) AS office_id, \
     COALESCE(source, '') AS source, COALESCE(sent_at, '') AS sent_at";

/// 뉴스 저장소 (읽기 전용).
#[derive(Debug, Clone)]
pub struct NewsStore {
    pool: SqlitePool,
}

impl NewsStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// 연결 상태를 확인합니다.
    pub async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    /// 최근 뉴스 (발송 시각 내림차순).
    pub async fn recent_news(
        &self,
        source: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<NewsArticle>, StoreError> {
        let sql = format!(
            "SELECT {NEWS_COLUMNS} FROM news \
             WHERE (?1 IS NULL OR source = ?1) \
             ORDER BY sent_at DESC, id DESC LIMIT ?2 OFFSET ?3"
        );
        let articles = sqlx::query_as::<_, NewsArticle>(&sql)
            .bind(source)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;

        debug!(count = articles.len(), "뉴스 조회");
        Ok(articles)
    }

    pub async fn count_news(&self, source: Option<&str>) -> Result<i64, StoreError> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM news WHERE (?1 IS NULL OR source = ?1)")
                .bind(source)
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }

    /// 언론사별 기사 수 (많은 순).
    pub async fn sources(&self) -> Result<Vec<NewsSource>, StoreError> {
        let sources = sqlx::query_as::<_, NewsSource>(
            "SELECT COALESCE(source, '') AS source, COUNT(*) AS count \
             FROM news GROUP BY source ORDER BY count DESC, source",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(sources)
    }

    /// 제목 키워드 검색.
    pub async fn search(&self, keyword: &str, limit: i64) -> Result<Vec<NewsArticle>, StoreError> {
        let sql = format!(
            "SELECT {NEWS_COLUMNS} FROM news WHERE title LIKE ?1 \
             ORDER BY sent_at DESC, id DESC LIMIT ?2"
        );
        let articles = sqlx::query_as::<_, NewsArticle>(&sql)
            .bind(format!("%{}%", keyword))
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        Ok(articles)
    }

    /// 전체 기사 수와 `now` 기준 최근 24시간 기사 수.
    pub async fn summary(&self, now: DateTime<Utc>) -> Result<NewsSummary, StoreError> {
        let since = (now.with_timezone(&NEWS_TIMEZONE) - Duration::days(1))
            .naive_local()
            .format("%Y-%m-%dT%H:%M:%S")
            .to_string();

        let (total_news,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM news")
            .fetch_one(&self.pool)
            .await?;
        let (recent_24h,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM news WHERE sent_at > ?1")
            .bind(since)
            .fetch_one(&self.pool)
            .await?;

        Ok(NewsSummary {
            total_news,
            recent_24h,
        })
    }
}
