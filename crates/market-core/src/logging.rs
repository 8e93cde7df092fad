//! 로깅 초기화.
//!
//! `tracing-subscriber` registry에 `EnvFilter`와 fmt 레이어 하나를 붙입니다.
//! 개발 환경은 pretty, 운영 환경은 로그 수집기를 위해 json을 사용합니다.

use std::fmt;
use std::str::FromStr;

use tracing_subscriber::{
    fmt::format::FmtSpan, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer,
};

use crate::config::LoggingConfig;
use crate::error::{CoreError, CoreResult};

/// 레벨만 지정된 경우 덧붙이는 소음 억제 지시자.
///
/// sqlx는 쿼리마다 info 로그를 남기고, hyper/reqwest는 연결 단위 debug 로그가 많습니다.
const QUIET_DIRECTIVES: &[&str] = &["sqlx=warn", "hyper=info", "reqwest=info"];

/// 로그 출력 형식.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// 색상이 포함된 여러 줄 형식 (개발용)
    #[default]
    Pretty,
    /// 한 줄 JSON (운영용)
    Json,
    /// 간결한 한 줄 형식
    Compact,
}

impl FromStr for LogFormat {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            "compact" => Ok(Self::Compact),
            other => Err(CoreError::Config(format!(
                "logging.format '{}' (pretty, json, compact)",
                other
            ))),
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Pretty => "pretty",
            Self::Json => "json",
            Self::Compact => "compact",
        })
    }
}

/// 로깅 설정.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// 필터 지시자 (예: "info", "market_data=debug,info")
    pub level: String,
    pub format: LogFormat,
    /// span 진입/종료 이벤트 기록 여부
    pub with_span_events: bool,
    /// 파일명과 줄 번호 포함 여부
    pub with_source_location: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self::new("info")
    }
}

impl LogConfig {
    pub fn new(level: impl Into<String>) -> Self {
        Self {
            level: level.into(),
            format: LogFormat::Pretty,
            with_span_events: false,
            with_source_location: false,
        }
    }

    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_span_events(mut self, enabled: bool) -> Self {
        self.with_span_events = enabled;
        self
    }

    pub fn with_source_location(mut self, enabled: bool) -> Self {
        self.with_source_location = enabled;
        self
    }

    /// 설정 파일의 `[logging]` 섹션에서 생성합니다.
    ///
    /// 알 수 없는 형식이면 pretty를 사용합니다. 로깅 초기화 전이므로 stderr로 알립니다.
    pub fn from_settings(settings: &LoggingConfig) -> Self {
        let format = settings.format.parse().unwrap_or_else(|e| {
            eprintln!("{e}, pretty 형식을 사용합니다");
            LogFormat::Pretty
        });

        Self::new(settings.level.clone())
            .with_format(format)
            .with_source_location(format == LogFormat::Json)
    }

    /// `RUST_LOG`와 `LOG_FORMAT`에서 생성합니다.
    pub fn from_env() -> Self {
        let level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
        let format = std::env::var("LOG_FORMAT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or_default();

        Self::new(level).with_format(format)
    }

    /// 실제로 적용할 필터 문자열.
    ///
    /// 모듈 지시자가 없는 단순 레벨이면 [`QUIET_DIRECTIVES`]를 덧붙입니다.
    pub fn filter_directives(&self) -> String {
        let level = self.level.trim();
        if level.contains('=') || level.contains(',') {
            return level.to_string();
        }

        let mut directives = vec![level];
        directives.extend_from_slice(QUIET_DIRECTIVES);
        directives.join(",")
    }
}

/// 전역 tracing subscriber를 설치합니다.
///
/// `RUST_LOG`가 설정되어 있으면 `config.level`보다 우선합니다.
/// 두 번째 호출은 [`CoreError::Internal`]을 반환합니다.
///
/// ```no_run
/// use market_core::logging::{init_logging, LogConfig, LogFormat};
///
/// init_logging(LogConfig::new("debug").with_format(LogFormat::Json))?;
/// # Ok::<(), market_core::CoreError>(())
/// ```
pub fn init_logging(config: LogConfig) -> CoreResult<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(config.filter_directives())
            .map_err(|e| CoreError::Config(format!("logging.level '{}': {}", config.level, e)))?,
    };

    let span_events = if config.with_span_events {
        FmtSpan::NEW | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };
    let location = config.with_source_location;

    let layer = match config.format {
        LogFormat::Pretty => tracing_subscriber::fmt::layer()
            .pretty()
            .with_file(location)
            .with_line_number(location)
            .with_span_events(span_events)
            .boxed(),
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .json()
            .with_current_span(true)
            .with_file(location)
            .with_line_number(location)
            .with_span_events(span_events)
            .boxed(),
        LogFormat::Compact => tracing_subscriber::fmt::layer()
            .compact()
            .with_file(location)
            .with_line_number(location)
            .with_span_events(span_events)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(layer)
        .try_init()
        .map_err(|e| CoreError::Internal(format!("tracing subscriber: {e}")))?;

    tracing::info!(format = %config.format, level = %config.level, "로깅 초기화 완료");
    Ok(())
}

/// `RUST_LOG`/`LOG_FORMAT` 기반으로 초기화합니다.
pub fn init_logging_from_env() -> CoreResult<()> {
    init_logging(LogConfig::from_env())
}
