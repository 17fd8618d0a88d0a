use std::fmt;
use std::str::FromStr;

/// Severity of a shipped log entry, ordered from most to least severe.
///
/// The discriminant doubles as the numeric priority accepted by
/// [`Options::priority`](crate::config::Options::priority): `0` is
/// `Panic`, `6` is `Trace`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Panic = 0,
    Fatal = 1,
    Error = 2,
    Warn = 3,
    Info = 4,
    Debug = 5,
    Trace = 6,
}

impl Severity {
    /// Every severity, most severe first.
    pub const ALL: [Severity; 7] = [
        Severity::Panic,
        Severity::Fatal,
        Severity::Error,
        Severity::Warn,
        Severity::Info,
        Severity::Debug,
        Severity::Trace,
    ];

    /// Map a numeric priority onto a severity. Out-of-range values yield `None`.
    pub fn from_priority(priority: u32) -> Option<Self> {
        Self::ALL.get(priority as usize).copied()
    }

    pub fn priority(self) -> u32 {
        self as u32
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Panic => "panic",
            Severity::Fatal => "fatal",
            Severity::Error => "error",
            Severity::Warn => "warn",
            Severity::Info => "info",
            Severity::Debug => "debug",
            Severity::Trace => "trace",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<tracing::Level> for Severity {
    fn from(level: tracing::Level) -> Self {
        match level {
            tracing::Level::ERROR => Severity::Error,
            tracing::Level::WARN => Severity::Warn,
            tracing::Level::INFO => Severity::Info,
            tracing::Level::DEBUG => Severity::Debug,
            _ => Severity::Trace,
        }
    }
}

/// Error returned when a severity name is not recognized.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown severity: {0:?}")]
pub struct ParseSeverityError(pub String);

impl FromStr for Severity {
    type Err = ParseSeverityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "panic" => Ok(Severity::Panic),
            "fatal" => Ok(Severity::Fatal),
            "error" => Ok(Severity::Error),
            "warn" | "warning" => Ok(Severity::Warn),
            "info" => Ok(Severity::Info),
            "debug" => Ok(Severity::Debug),
            "trace" => Ok(Severity::Trace),
            _ => Err(ParseSeverityError(s.to_string())),
        }
    }
}

/// Parse a priority given either as a number (`"3"`) or a name (`"warn"`).
///
/// Returns the numeric priority without range checking so that
/// [`LevelFilter::from_priority`] can apply its out-of-range fallback.
pub fn parse_priority(raw: &str) -> Option<u32> {
    let raw = raw.trim();
    if let Ok(n) = raw.parse::<u32>() {
        return Some(n);
    }
    raw.parse::<Severity>().ok().map(Severity::priority)
}

static SEVERITIES: [Severity; 7] = Severity::ALL;

/// The set of severities a sink declares interest in: every severity from
/// `Panic` through the threshold, inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelFilter {
    threshold: Severity,
}

impl LevelFilter {
    /// Threshold used when no priority, or an invalid one, is configured.
    pub const DEFAULT_THRESHOLD: Severity = Severity::Info;

    pub fn new(threshold: Severity) -> Self {
        Self { threshold }
    }

    /// Resolve a filter from an optional raw priority. Absent or
    /// out-of-range priorities fall back to "info or more severe".
    pub fn from_priority(priority: Option<u32>) -> Self {
        let threshold = priority
            .and_then(Severity::from_priority)
            .unwrap_or(Self::DEFAULT_THRESHOLD);
        Self { threshold }
    }

    pub fn threshold(&self) -> Severity {
        self.threshold
    }

    /// Included severities, most severe first.
    pub fn levels(&self) -> &'static [Severity] {
        &SEVERITIES[..=self.threshold as usize]
    }

    pub fn allows(&self, severity: Severity) -> bool {
        severity <= self.threshold
    }
}

impl Default for LevelFilter {
    fn default() -> Self {
        Self::new(Self::DEFAULT_THRESHOLD)
    }
}
