//! Transport configuration.

use std::time::Duration;
use tgql_core::{Error, ErrorCode, Result};

/// When and how often a failed request is sent again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts after the first.
    pub max_retries: u32,
    /// Delay before the first retry; doubles on each further one.
    pub base_delay: Duration,
    /// Upper bound for a single delay.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
            ..Default::default()
        }
    }

    /// Sends every request once.
    pub fn none() -> Self {
        Self::new(0, Duration::ZERO)
    }

    /// Delay before retry number `attempt` (1-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = 2_u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

/// Settings for [`HttpTransport`](crate::HttpTransport).
#[derive(Debug, Clone, PartialEq)]
pub struct TransportConfig {
    /// `http://host[:port]/path` of the GraphQL endpoint.
    pub url: String,
    /// Limit for opening the TCP connection.
    pub connect_timeout: Duration,
    /// Limit for writing the request and reading the whole response.
    pub request_timeout: Duration,
    pub retry: RetryPolicy,
    /// Extra headers, sent in insertion order.
    pub headers: Vec<(String, String)>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            retry: RetryPolicy::default(),
            headers: Vec::new(),
        }
    }
}

impl TransportConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    #[must_use]
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    #[must_use]
    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Sets a header, replacing an earlier one with the same name.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        let value = value.into();
        match self
            .headers
            .iter_mut()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(&name))
        {
            Some(entry) => entry.1 = value,
            None => self.headers.push((name, value)),
        }
        self
    }

    /// Rejects header names that are not HTTP tokens and values carrying
    /// control characters, so nothing can be spliced into the request head.
    pub fn validate_headers(&self) -> Result<()> {
        for (name, value) in &self.headers {
            let valid_name = !name.is_empty()
                && name
                    .bytes()
                    .all(|b| b.is_ascii_graphic() && !b"()<>@,;:\\\"/[]?={}".contains(&b));
            if !valid_name {
                return Err(Error::new(
                    ErrorCode::InvalidHeader,
                    format!("Invalid header name: {name:?}"),
                ));
            }
            if value.chars().any(|c| c.is_control() && c != '\t') {
                return Err(Error::new(
                    ErrorCode::InvalidHeader,
                    format!("Invalid value for header `{name}`"),
                ));
            }
        }
        Ok(())
    }
}
