//! Bounded retry with exponential backoff for transient creation failures

use std::future::Future;
use std::time::Duration;

use regex::{Regex, RegexBuilder};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::PipelineConfig;
use crate::error::{Result, ViewerError};

/// Recognizes errors the widget recovers from on a second try
///
/// The widget does not classify its errors, so this matches known
/// substrings of the message. It is tied to the widget's error wording.
#[derive(Debug, Clone)]
pub struct TransientErrorMatcher {
    pattern: Option<Regex>,
}

impl TransientErrorMatcher {
    /// Build a case-insensitive matcher from literal substrings
    pub fn new(patterns: &[String]) -> Result<Self> {
        if patterns.is_empty() {
            return Ok(Self { pattern: None });
        }
        let alternation = patterns
            .iter()
            .map(|p| regex::escape(p))
            .collect::<Vec<_>>()
            .join("|");
        let pattern = RegexBuilder::new(&alternation)
            .case_insensitive(true)
            .build()
            .map_err(|e| ViewerError::Config(format!("Invalid transient error pattern: {}", e)))?;
        Ok(Self {
            pattern: Some(pattern),
        })
    }

    pub fn matches(&self, message: &str) -> bool {
        self.pattern
            .as_ref()
            .is_some_and(|pattern| pattern.is_match(message))
    }
}

/// One failed attempt that was retried
#[derive(Debug, Clone, PartialEq)]
pub struct RetryAttempt {
    /// 0-based index of the failed attempt
    pub attempt: u32,
    /// Wait before the next attempt
    pub delay: Duration,
    pub error: String,
}

/// How often and how patiently creation is retried
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    matcher: TransientErrorMatcher,
}

impl RetryPolicy {
    pub fn new(
        max_attempts: u32,
        base_delay: Duration,
        max_delay: Duration,
        matcher: TransientErrorMatcher,
    ) -> Self {
        Self {
            max_attempts,
            base_delay,
            max_delay,
            matcher,
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Result<Self> {
        Ok(Self::new(
            config.max_attempts,
            Duration::from_millis(config.retry_base_delay_ms),
            Duration::from_millis(config.retry_max_delay_ms),
            TransientErrorMatcher::new(&config.transient_error_patterns)?,
        ))
    }

    /// Wait after failed attempt `attempt`: `min(max, base * 2^(attempt + 1))`
    pub fn delay_for(&self, attempt: u32) -> Duration {
        attempt
            .checked_add(1)
            .and_then(|exp| 2u32.checked_pow(exp))
            .and_then(|factor| self.base_delay.checked_mul(factor))
            .map_or(self.max_delay, |delay| delay.min(self.max_delay))
    }

    pub fn is_transient(&self, error: &ViewerError) -> bool {
        match error {
            ViewerError::Creation(message) => self.matcher.matches(message),
            ViewerError::Cancelled => false,
            other => self.matcher.matches(&other.to_string()),
        }
    }
}

/// Run `operation` until it succeeds, fails permanently or runs out of attempts
///
/// `operation` receives the 0-based attempt index. Each retried failure is
/// appended to `history`. Cancellation during a backoff delay ends the loop
/// with [`ViewerError::Cancelled`].
pub async fn retry_transient<T, F, Fut>(
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    history: &mut Vec<RetryAttempt>,
    mut operation: F,
) -> Result<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0u32;
    loop {
        let error = match operation(attempt).await {
            Ok(value) => return Ok(value),
            Err(e) => e,
        };

        if !policy.is_transient(&error) {
            debug!("Attempt {} failed permanently: {}", attempt, error);
            return Err(error);
        }

        if attempt + 1 >= policy.max_attempts {
            return Err(ViewerError::RetriesExhausted {
                attempts: attempt + 1,
                last: error.to_string(),
            });
        }

        let delay = policy.delay_for(attempt);
        warn!(
            "Attempt {}/{} failed with transient error, retrying in {:?}: {}",
            attempt + 1,
            policy.max_attempts,
            delay,
            error
        );
        history.push(RetryAttempt {
            attempt,
            delay,
            error: error.to_string(),
        });

        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = cancel.cancelled() => {
                debug!("Retry loop cancelled during backoff");
                return Err(ViewerError::Cancelled);
            }
        }
        attempt += 1;
    }
}
