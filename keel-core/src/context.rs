use chrono::{DateTime, Utc};

/// Read-only metadata about an inbound request, captured for logging.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub struct RequestContext {
    /// Original path and query as sent by the client.
    pub url: String,
    pub method: String,
    /// Client address, or `"unknown"` when it cannot be determined.
    pub ip: String,
    pub user_agent: Option<String>,
    /// When the request entered the pipeline.
    pub received_at: DateTime<Utc>,
}

impl RequestContext {
    /// Create a context stamped with the current time and no user agent.
    pub fn new(method: impl Into<String>, url: impl Into<String>, ip: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: method.into(),
            ip: ip.into(),
            user_agent: None,
            received_at: Utc::now(),
        }
    }

    #[must_use]
    pub fn with_user_agent(mut self, user_agent: Option<String>) -> Self {
        self.user_agent = user_agent;
        self
    }

    #[must_use]
    pub fn with_received_at(mut self, at: DateTime<Utc>) -> Self {
        self.received_at = at;
        self
    }
}
