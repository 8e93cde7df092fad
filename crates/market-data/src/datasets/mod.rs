//! 대시보드 데이터셋.
//!
//! 데이터셋마다 스냅샷 타입, 정적 기본값, [`Fetcher`](crate::provider::Fetcher) 구현을 둡니다.
//!
//! | 키 | 내용 | 기본 정책 |
//! |---|---|---|
//! | `market` | 주요 지수/환율 | TTL 60초 |
//! | `sectors` | 섹터 ETF 수익률 | TTL 180초 |
//! | `week52` | 52주 신고가/신저가 유니버스 | 매일 06:30 (뉴욕) |
//! | `macro_data` | 거시지표 | 매일 06:30 (뉴욕), 최대 6시간 |

pub mod macro_indicators;
pub mod market;
pub mod sectors;
pub mod week52;

pub use macro_indicators::{Indicator, MacroFetcher, MacroOverview, MacroSnapshot};
pub use market::{IndexQuote, MarketFetcher, MarketOverview};
pub use sectors::{
    fetch_sector_history, HistoryPeriod, SectorFetcher, SectorHistory, SectorPerformance,
    SectorReturn,
};
pub use week52::{Week52Fetcher, Week52Stats, Week52Stock, Week52Universe};

/// 데이터셋 키.
pub const MARKET: &str = "market";
pub const SECTORS: &str = "sectors";
pub const WEEK52: &str = "week52";
pub const MACRO_DATA: &str = "macro_data";

use crate::provider::DailyBar;

/// 마지막 봉 기준 전일 대비 변동 `(변동, 변동률 %)`.
///
/// 봉이 하나뿐이면 당일 시가 대비로 계산합니다.
pub(crate) fn last_change(bars: &[DailyBar]) -> Option<(f64, f64)> {
    let last = bars.last()?;
    let reference = match bars.len() {
        1 => last.open,
        n => bars[n - 2].close,
    };
    if reference <= 0.0 {
        return Some((0.0, 0.0));
    }
    let change = last.close - reference;
    Some((change, change / reference * 100.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{QuoteSource, StaticQuoteSource};

    #[tokio::test]
    async fn test_last_change_uses_previous_close() {
        let source = StaticQuoteSource::new().with_closes("^GSPC", &[100.0, 110.0, 99.0]);
        let bars = source.daily_bars("^GSPC", "5d").await.unwrap();

        let (change, pct) = last_change(&bars).unwrap();
        assert!((change - -11.0).abs() < 1e-9);
        assert!((pct - -10.0).abs() < 1e-9);
        assert_eq!(last_change(&[]), None);
    }
}
