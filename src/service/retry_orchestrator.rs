use crate::domain::mpesa::QueryOutcome;
use crate::gateways::GatewayError;
use std::future::Future;
use std::time::Duration;

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_secs(2),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PollPolicy {
    pub max_retries: u32,
    pub delay: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            max_retries: 10,
            delay: Duration::from_secs(5),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDirective {
    Success,
    Continue,
    FailNow,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollDirective {
    Finish,
    RetryAfter(Duration),
    GiveUp,
}

pub fn attempt_limit(policy: &RetryPolicy) -> u32 {
    policy.max_attempts.max(1)
}

pub fn classify_attempt_result<T>(result: &Result<T, GatewayError>) -> RetryDirective {
    match result {
        Ok(_) => RetryDirective::Success,
        Err(e) if e.is_transient() => RetryDirective::Continue,
        Err(_) => RetryDirective::FailNow,
    }
}

pub async fn retry_fixed<T, F, Fut>(policy: &RetryPolicy, mut op: F) -> Result<T, GatewayError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, GatewayError>>,
{
    let limit = attempt_limit(policy);
    let mut attempt = 1;
    loop {
        let result = op(attempt).await;
        match classify_attempt_result(&result) {
            RetryDirective::Success | RetryDirective::FailNow => return result,
            RetryDirective::Continue if attempt >= limit => return result,
            RetryDirective::Continue => {
                if let Err(e) = &result {
                    tracing::warn!(attempt, limit, "STK push attempt failed, retrying: {}", e);
                }
                tokio::time::sleep(policy.delay).await;
                attempt += 1;
            }
        }
    }
}

pub fn next_poll_step(outcome: Option<&QueryOutcome>, retries: u32, policy: &PollPolicy) -> PollDirective {
    match outcome {
        Some(o) if o.is_terminal() => PollDirective::Finish,
        _ if retries < policy.max_retries => PollDirective::RetryAfter(policy.delay),
        _ => PollDirective::GiveUp,
    }
}
