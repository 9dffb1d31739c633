//! Access to the hosting document.
//!
//! The propensity server never reads ambient globals. Everything it needs
//! from the page is supplied through a [`DocumentContext`] at construction.

/// Read-only view of the page the client runs in.
pub trait DocumentContext: Send + Sync {
    /// The raw cookie string (`name=value; name2=value2`).
    fn cookie(&self) -> String;

    /// Hostname of the document location.
    fn hostname(&self) -> String;

    /// Referrer of the document, empty if there is none.
    fn referrer(&self) -> String;

    /// Offset of the reader's timezone, in minutes east of UTC.
    fn timezone_offset_minutes(&self) -> i32 {
        local_offset_minutes()
    }
}

/// Offset of the local timezone in minutes east of UTC, or 0 if it cannot be
/// determined.
pub fn local_offset_minutes() -> i32 {
    time::UtcOffset::current_local_offset()
        .map(|offset| i32::from(offset.whole_minutes()))
        .unwrap_or(0)
}

/// A [`DocumentContext`] with fixed values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StaticDocument {
    pub cookie: String,
    pub hostname: String,
    pub referrer: String,
    /// Overrides the local timezone when set.
    pub timezone_offset_minutes: Option<i32>,
}

impl StaticDocument {
    pub fn new(hostname: impl Into<String>) -> Self {
        Self {
            hostname: hostname.into(),
            ..Self::default()
        }
    }

    pub fn with_cookie(mut self, cookie: impl Into<String>) -> Self {
        self.cookie = cookie.into();
        self
    }

    pub fn with_referrer(mut self, referrer: impl Into<String>) -> Self {
        self.referrer = referrer.into();
        self
    }

    pub fn with_timezone_offset(mut self, minutes: i32) -> Self {
        self.timezone_offset_minutes = Some(minutes);
        self
    }
}

impl DocumentContext for StaticDocument {
    fn cookie(&self) -> String {
        self.cookie.clone()
    }

    fn hostname(&self) -> String {
        self.hostname.clone()
    }

    fn referrer(&self) -> String {
        self.referrer.clone()
    }

    fn timezone_offset_minutes(&self) -> i32 {
        self.timezone_offset_minutes
            .unwrap_or_else(local_offset_minutes)
    }
}
