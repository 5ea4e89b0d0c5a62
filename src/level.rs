//! Severity, origin and importance classifications attached to every record.
//!
//! The wire protocol transmits these as lowercase strings, so each enum
//! derives a serde representation with `rename_all = "lowercase"` and offers
//! a `const` accessor for the canonical name.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::error::ValidationError;

/// Severity of a log record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Default, Serialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    Warning,
    Error,
    Critical,
}

impl LogLevel {
    /// Return the canonical wire name of the level.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Critical => "critical",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warn" | "warning" => Ok(Self::Warning),
            "error" => Ok(Self::Error),
            "critical" | "fatal" => Ok(Self::Critical),
            _ => Err(ValidationError::UnknownEnum {
                field: "level",
                value: s.to_string(),
            }),
        }
    }
}

/// Origin of a log record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogType {
    Console,
    #[default]
    Logger,
    Exception,
    Custom,
    Http,
}

impl LogType {
    /// Return the canonical wire name of the type.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Console => "console",
            Self::Logger => "logger",
            Self::Exception => "exception",
            Self::Custom => "custom",
            Self::Http => "http",
        }
    }
}

impl fmt::Display for LogType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "console" => Ok(Self::Console),
            "logger" => Ok(Self::Logger),
            "exception" => Ok(Self::Exception),
            "custom" => Ok(Self::Custom),
            "http" => Ok(Self::Http),
            _ => Err(ValidationError::UnknownEnum {
                field: "log_type",
                value: s.to_string(),
            }),
        }
    }
}

/// Delivery importance of a record.
///
/// Importance is opaque to the pipeline itself; it travels on the wire so the
/// ingestion service can prioritise retention.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Importance {
    Low,
    #[default]
    Standard,
    High,
}

impl Importance {
    /// Return the canonical wire name of the importance.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Standard => "standard",
            Self::High => "high",
        }
    }
}

impl fmt::Display for Importance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Importance {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "standard" => Ok(Self::Standard),
            "high" => Ok(Self::High),
            _ => Err(ValidationError::UnknownEnum {
                field: "importance",
                value: s.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("debug", LogLevel::Debug)]
    #[case("INFO", LogLevel::Info)]
    #[case("warn", LogLevel::Warning)]
    #[case("Warning", LogLevel::Warning)]
    #[case("error", LogLevel::Error)]
    #[case("critical", LogLevel::Critical)]
    fn parses_levels(#[case] input: &str, #[case] expected: LogLevel) {
        assert_eq!(input.parse::<LogLevel>().unwrap(), expected);
    }

    #[rstest]
    fn rejects_unknown_level() {
        let err = "verbose".parse::<LogLevel>().unwrap_err();
        assert_eq!(
            err,
            ValidationError::UnknownEnum {
                field: "level",
                value: "verbose".into(),
            }
        );
    }

    #[rstest]
    #[case(LogLevel::Warning, "\"warning\"")]
    #[case(LogLevel::Critical, "\"critical\"")]
    fn serializes_level_lowercase(#[case] level: LogLevel, #[case] expected: &str) {
        assert_eq!(serde_json::to_string(&level).unwrap(), expected);
    }

    #[rstest]
    #[case("console", LogType::Console)]
    #[case("exception", LogType::Exception)]
    #[case("HTTP", LogType::Http)]
    fn parses_log_types(#[case] input: &str, #[case] expected: LogType) {
        assert_eq!(input.parse::<LogType>().unwrap(), expected);
    }

    #[rstest]
    fn importance_orders_low_to_high() {
        assert!(Importance::Low < Importance::Standard);
        assert!(Importance::Standard < Importance::High);
    }
}
