//! 데이터셋 신선도 정책.
//!
//! 두 가지 정책을 하나의 [`RefreshPolicy`]로 표현합니다.
//!
//! - **TTL**: 마지막 갱신 후 고정 시간이 지나면 stale
//! - **장 시간 기준**: 기준 시간대의 일일 갱신 시각(기본 06:30 ET)을 지난 첫 접근에서
//!   하루 한 번 갱신하고, 선택적으로 최대 경과 시간을 넘으면 즉시 갱신
//!
//! 날짜/시각 비교는 모두 기준 시간대에서 수행합니다. 서머타임 전환은
//! `chrono-tz` 시간대 데이터베이스가 처리합니다.

use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, LocalResult, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use market_core::{CoreError, CoreResult, DatasetConfig, RefreshModeKind, RefreshPolicyKind};

/// 장 시간 기반 갱신 일정.
#[derive(Debug, Clone, PartialEq)]
pub struct MarketSchedule {
    timezone: Tz,
    daily_refresh_at: NaiveTime,
    max_staleness: Option<Duration>,
}

impl MarketSchedule {
    pub fn new(timezone: Tz, daily_refresh_at: NaiveTime) -> Self {
        Self {
            timezone,
            daily_refresh_at,
            max_staleness: None,
        }
    }

    /// 미국 장 기준 (America/New_York 06:30, 경과 시간 제한 없음).
    pub fn us_market_open() -> Self {
        Self::new(
            chrono_tz::America::New_York,
            NaiveTime::from_hms_opt(6, 30, 0).unwrap_or(NaiveTime::MIN),
        )
    }

    /// 최대 경과 시간을 설정합니다.
    pub fn with_max_staleness(mut self, max_staleness: Option<Duration>) -> Self {
        self.max_staleness = max_staleness;
        self
    }

    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    pub fn daily_refresh_at(&self) -> NaiveTime {
        self.daily_refresh_at
    }

    pub fn max_staleness(&self) -> Option<Duration> {
        self.max_staleness
    }

    /// 갱신이 필요한지 판단합니다.
    ///
    /// - 한 번도 갱신되지 않았으면 `true`
    /// - 최대 경과 시간을 넘었으면 `true`
    /// - 마지막 갱신 날짜가 오늘(기준 시간대)과 다르고 현재 시각이 일일 갱신 시각 이후면 `true`
    pub fn should_refresh(&self, last_update: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
        let Some(last_update) = last_update else {
            return true;
        };

        if let Some(max) = self.max_staleness {
            if now - last_update > max {
                return true;
            }
        }

        let now_local = now.with_timezone(&self.timezone);
        let last_local = last_update.with_timezone(&self.timezone);

        last_local.date_naive() != now_local.date_naive()
            && now_local.time() >= self.daily_refresh_at
    }

    /// `should_refresh`가 처음으로 `true`가 되는 시각 (이미 `true`면 `now`).
    pub fn next_refresh(
        &self,
        last_update: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> DateTime<Utc> {
        let Some(last_update) = last_update else {
            return now;
        };
        if self.should_refresh(Some(last_update), now) {
            return now;
        }

        let now_local = now.with_timezone(&self.timezone);
        let last_date = last_update.with_timezone(&self.timezone).date_naive();
        let today = now_local.date_naive();

        // 같은 날 갱신되었으면 내일, 아니면 오늘 갱신 시각
        let refresh_date = if last_date == today {
            today.succ_opt().unwrap_or(today)
        } else {
            today
        };
        let daily = self.instant_on(refresh_date);

        match self.max_staleness {
            Some(max) => daily.min(last_update + max),
            None => daily,
        }
    }

    /// 기준 시간대의 특정 날짜 갱신 시각을 UTC로 변환합니다.
    fn instant_on(&self, date: NaiveDate) -> DateTime<Utc> {
        let naive = date.and_time(self.daily_refresh_at);
        match self.timezone.from_local_datetime(&naive) {
            LocalResult::Single(at) => at.with_timezone(&Utc),
            LocalResult::Ambiguous(earliest, _) => earliest.with_timezone(&Utc),
            // 서머타임 시작으로 존재하지 않는 시각이면 한 시간 뒤로
            LocalResult::None => self
                .timezone
                .from_local_datetime(&(naive + Duration::hours(1)))
                .earliest()
                .map(|at| at.with_timezone(&Utc))
                .unwrap_or_else(|| Utc.from_utc_datetime(&naive)),
        }
    }
}

/// 데이터셋 신선도 정책.
#[derive(Debug, Clone, PartialEq)]
pub enum RefreshPolicy {
    /// 마지막 갱신 후 고정 시간
    Ttl(Duration),
    /// 장 시간 기준
    MarketHours(MarketSchedule),
}

impl RefreshPolicy {
    /// 현재 스냅샷이 갱신 대상인지 판단합니다.
    pub fn is_stale(&self, last_update: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
        match self {
            RefreshPolicy::Ttl(ttl) => match last_update {
                None => true,
                Some(last_update) => now - last_update >= *ttl,
            },
            RefreshPolicy::MarketHours(schedule) => schedule.should_refresh(last_update, now),
        }
    }

    /// 다음 갱신 예정 시각.
    pub fn next_refresh(
        &self,
        last_update: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> DateTime<Utc> {
        match self {
            RefreshPolicy::Ttl(ttl) => match last_update {
                Some(last_update) if now - last_update < *ttl => last_update + *ttl,
                _ => now,
            },
            RefreshPolicy::MarketHours(schedule) => schedule.next_refresh(last_update, now),
        }
    }

    /// 사람이 읽을 수 있는 다음 갱신 안내 문구.
    pub fn describe_next_refresh(
        &self,
        last_update: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
        timezone: Tz,
    ) -> String {
        let next = self.next_refresh(last_update, now);
        if next <= now {
            return "다음 요청 시 갱신".to_string();
        }

        let at = next.with_timezone(&timezone).format("%Y-%m-%d %H:%M %Z");
        match self {
            RefreshPolicy::Ttl(_) => format!("{} 이후 요청 시 갱신", at),
            RefreshPolicy::MarketHours(schedule) => format!(
                "{} 이후 첫 요청 시 갱신 (매일 {} {})",
                at,
                schedule.daily_refresh_at.format("%H:%M"),
                schedule.timezone.name()
            ),
        }
    }

    /// 로그/상태 표시용 요약.
    pub fn label(&self) -> String {
        match self {
            RefreshPolicy::Ttl(ttl) => format!("ttl({}s)", ttl.num_seconds()),
            RefreshPolicy::MarketHours(schedule) => match schedule.max_staleness {
                Some(max) => format!(
                    "market_hours({} {}, max {}h)",
                    schedule.daily_refresh_at.format("%H:%M"),
                    schedule.timezone.name(),
                    max.num_hours()
                ),
                None => format!(
                    "market_hours({} {})",
                    schedule.daily_refresh_at.format("%H:%M"),
                    schedule.timezone.name()
                ),
            },
        }
    }
}

/// STALE 상태에서의 갱신 방식.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshMode {
    /// 요청자가 갱신 완료까지 대기
    Blocking,
    /// 백그라운드 갱신, 요청자는 기존 스냅샷을 즉시 받음
    Detached,
}

impl From<RefreshModeKind> for RefreshMode {
    fn from(kind: RefreshModeKind) -> Self {
        match kind {
            RefreshModeKind::Blocking => RefreshMode::Blocking,
            RefreshModeKind::Detached => RefreshMode::Detached,
        }
    }
}

/// 데이터셋 코디네이터 옵션.
#[derive(Debug, Clone)]
pub struct DatasetOptions {
    pub policy: RefreshPolicy,
    pub mode: RefreshMode,
    /// `last_update` 표시 및 일정 계산 기준 시간대
    pub timezone: Tz,
    /// 한 번의 갱신(재시도 포함)에 허용되는 최대 시간
    pub refresh_timeout: StdDuration,
}

impl DatasetOptions {
    /// TTL 정책, 동기 갱신.
    pub fn ttl(ttl: StdDuration) -> Self {
        Self {
            policy: RefreshPolicy::Ttl(
                Duration::from_std(ttl).unwrap_or_else(|_| Duration::days(365)),
            ),
            mode: RefreshMode::Blocking,
            timezone: chrono_tz::America::New_York,
            refresh_timeout: StdDuration::from_secs(20),
        }
    }

    /// 장 시간 정책, 백그라운드 갱신.
    pub fn market_hours(schedule: MarketSchedule) -> Self {
        Self {
            timezone: schedule.timezone(),
            policy: RefreshPolicy::MarketHours(schedule),
            mode: RefreshMode::Detached,
            refresh_timeout: StdDuration::from_secs(25),
        }
    }

    pub fn with_mode(mut self, mode: RefreshMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_refresh_timeout(mut self, timeout: StdDuration) -> Self {
        self.refresh_timeout = timeout;
        self
    }

    /// 설정 파일의 데이터셋 섹션으로부터 생성합니다.
    pub fn from_config(config: &DatasetConfig) -> CoreResult<Self> {
        config.validate()?;
        let timezone = config.timezone()?;

        let policy = match config.policy {
            RefreshPolicyKind::Ttl => RefreshPolicy::Ttl(Duration::seconds(
                i64::try_from(config.ttl_secs)
                    .map_err(|_| CoreError::Config("ttl_secs out of range".to_string()))?,
            )),
            RefreshPolicyKind::MarketHours => {
                let max_staleness = config
                    .max_staleness_secs
                    .map(|secs| {
                        i64::try_from(secs).map(Duration::seconds).map_err(|_| {
                            CoreError::Config("max_staleness_secs out of range".to_string())
                        })
                    })
                    .transpose()?;
                RefreshPolicy::MarketHours(
                    MarketSchedule::new(timezone, config.daily_refresh_time()?)
                        .with_max_staleness(max_staleness),
                )
            }
        };

        Ok(Self {
            policy,
            mode: config.mode.into(),
            timezone,
            refresh_timeout: StdDuration::from_secs(config.refresh_timeout_secs),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use proptest::prelude::*;

    fn ny(date: (i32, u32, u32), time: (u32, u32)) -> DateTime<Utc> {
        chrono_tz::America::New_York
            .with_ymd_and_hms(date.0, date.1, date.2, time.0, time.1, 0)
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn test_never_updated_needs_refresh() {
        let schedule = MarketSchedule::us_market_open();
        assert!(schedule.should_refresh(None, ny((2024, 6, 3), (3, 0))));
    }

    #[test]
    fn test_daily_boundary_ignores_elapsed_hours() {
        let schedule = MarketSchedule::us_market_open();
        let last = ny((2024, 6, 3), (6, 0));

        // 24시간이 지났어도 06:30 전이면 갱신하지 않음
        assert!(!schedule.should_refresh(Some(last), ny((2024, 6, 4), (6, 0))));
        assert!(schedule.should_refresh(Some(last), ny((2024, 6, 4), (6, 31))));
    }

    #[test]
    fn test_yesterday_after_open_waits_for_todays_open() {
        let schedule = MarketSchedule::us_market_open();
        let last = ny((2024, 6, 3), (8, 0));

        assert!(!schedule.should_refresh(Some(last), ny((2024, 6, 4), (6, 29))));
        assert!(schedule.should_refresh(Some(last), ny((2024, 6, 4), (6, 31))));
    }

    #[test]
    fn test_exactly_at_daily_instant() {
        let schedule = MarketSchedule::us_market_open();
        let last = ny((2024, 6, 3), (15, 0));
        assert!(schedule.should_refresh(Some(last), ny((2024, 6, 4), (6, 30))));
    }

    #[test]
    fn test_same_day_is_fresh_without_bound() {
        let schedule = MarketSchedule::us_market_open();
        let last = ny((2024, 6, 4), (6, 45));
        assert!(!schedule.should_refresh(Some(last), ny((2024, 6, 4), (23, 59))));
    }

    #[test]
    fn test_max_staleness_bound() {
        let schedule =
            MarketSchedule::us_market_open().with_max_staleness(Some(Duration::hours(6)));
        let last = ny((2024, 6, 4), (7, 0));

        assert!(!schedule.should_refresh(Some(last), ny((2024, 6, 4), (12, 59))));
        assert!(schedule.should_refresh(Some(last), ny((2024, 6, 4), (13, 1))));
    }

    #[test]
    fn test_compares_in_reference_timezone_not_utc() {
        let schedule = MarketSchedule::us_market_open();
        // 뉴욕 6/3 21:00 = UTC 6/4 01:00 (UTC 기준으로는 날짜가 이미 바뀜)
        let last = ny((2024, 6, 3), (21, 0));
        assert!(!schedule.should_refresh(Some(last), ny((2024, 6, 3), (23, 30))));
    }

    #[test]
    fn test_dst_transition_uses_local_wall_clock() {
        let schedule = MarketSchedule::us_market_open();
        // 2024-03-10 서머타임 시작 (EST → EDT)
        let last = ny((2024, 3, 9), (12, 0));
        assert!(!schedule.should_refresh(Some(last), ny((2024, 3, 10), (6, 29))));
        assert!(schedule.should_refresh(Some(last), ny((2024, 3, 10), (6, 30))));
        assert_eq!(
            schedule.next_refresh(Some(last), ny((2024, 3, 10), (5, 0))),
            Utc.with_ymd_and_hms(2024, 3, 10, 10, 30, 0).unwrap()
        );
    }

    #[test]
    fn test_next_refresh_same_day_is_tomorrow() {
        let schedule = MarketSchedule::us_market_open();
        let last = ny((2024, 6, 4), (9, 0));
        let next = schedule.next_refresh(Some(last), ny((2024, 6, 4), (10, 0)));
        assert_eq!(next, ny((2024, 6, 5), (6, 30)));
    }

    #[test]
    fn test_next_refresh_prefers_staleness_bound() {
        let schedule =
            MarketSchedule::us_market_open().with_max_staleness(Some(Duration::hours(6)));
        let last = ny((2024, 6, 4), (9, 0));
        let next = schedule.next_refresh(Some(last), ny((2024, 6, 4), (10, 0)));
        assert_eq!(next, ny((2024, 6, 4), (15, 0)));
    }

    #[test]
    fn test_ttl_policy() {
        let policy = RefreshPolicy::Ttl(Duration::seconds(60));
        let last = ny((2024, 6, 4), (10, 0));

        assert!(policy.is_stale(None, last));
        assert!(!policy.is_stale(Some(last), last + Duration::seconds(59)));
        assert!(policy.is_stale(Some(last), last + Duration::seconds(60)));
        assert_eq!(
            policy.next_refresh(Some(last), last + Duration::seconds(10)),
            last + Duration::seconds(60)
        );
    }

    #[test]
    fn test_describe_next_refresh() {
        let policy = RefreshPolicy::MarketHours(MarketSchedule::us_market_open());
        let tz = chrono_tz::America::New_York;
        let last = ny((2024, 6, 4), (9, 0));

        let text = policy.describe_next_refresh(Some(last), ny((2024, 6, 4), (10, 0)), tz);
        assert!(text.starts_with("2024-06-05 06:30 EDT"));
        assert!(text.contains("America/New_York"));

        assert_eq!(
            policy.describe_next_refresh(None, last, tz),
            "다음 요청 시 갱신"
        );
    }

    #[test]
    fn test_options_from_config() {
        let mut config = DatasetConfig::market_hours(Some(3600));
        config.daily_refresh_at = "09:30".to_string();
        let options = DatasetOptions::from_config(&config).unwrap();

        assert_eq!(options.mode, RefreshMode::Detached);
        match options.policy {
            RefreshPolicy::MarketHours(schedule) => {
                assert_eq!(
                    schedule.daily_refresh_at(),
                    NaiveTime::from_hms_opt(9, 30, 0).unwrap()
                );
                assert_eq!(schedule.max_staleness(), Some(Duration::hours(1)));
            }
            other => panic!("unexpected policy: {:?}", other),
        }

        let ttl = DatasetOptions::from_config(&DatasetConfig::ttl(180)).unwrap();
        assert_eq!(ttl.policy, RefreshPolicy::Ttl(Duration::seconds(180)));
        assert_eq!(ttl.mode, RefreshMode::Blocking);
    }

    proptest! {
        #[test]
        fn prop_before_daily_instant_never_refreshes(
            minutes_before in 1i64..390,
            last_hour in 0u32..24,
        ) {
            let schedule = MarketSchedule::us_market_open();
            let last = ny((2024, 6, 3), (last_hour, 0));
            let now = ny((2024, 6, 4), (6, 30)) - Duration::minutes(minutes_before);
            prop_assert!(!schedule.should_refresh(Some(last), now));
        }

        #[test]
        fn prop_after_daily_instant_on_new_day_refreshes(
            minutes_after in 0i64..(17 * 60 + 29),
            last_hour in 0u32..24,
        ) {
            let schedule = MarketSchedule::us_market_open();
            let last = ny((2024, 6, 3), (last_hour, 0));
            let now = ny((2024, 6, 4), (6, 30)) + Duration::minutes(minutes_after);
            prop_assert!(schedule.should_refresh(Some(last), now));
        }
    }

    #[test]
    fn test_instant_on_regular_day() {
        let schedule = MarketSchedule::us_market_open();
        let date = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
        assert_eq!(
            schedule.instant_on(date),
            Utc.with_ymd_and_hms(2024, 1, 15, 11, 30, 0).unwrap()
        );
    }
}
