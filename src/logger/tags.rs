/// Subsystem tags for log routing and per-tag debug gating.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogTag {
    System,
    Cache,
    Jobs,
    Worker,
    Aggregator,
    Upstream,
    Webserver,
}

impl LogTag {
    /// Plain uppercase name used in log prefixes
    pub fn as_str(&self) -> &'static str {
        match self {
            LogTag::System => "SYSTEM",
            LogTag::Cache => "CACHE",
            LogTag::Jobs => "JOBS",
            LogTag::Worker => "WORKER",
            LogTag::Aggregator => "AGGREGATOR",
            LogTag::Upstream => "UPSTREAM",
            LogTag::Webserver => "WEBSERVER",
        }
    }

    /// Lowercase key used when enabling debug output for a tag
    pub fn to_debug_key(&self) -> String {
        self.as_str().to_lowercase()
    }
}

impl std::fmt::Display for LogTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
