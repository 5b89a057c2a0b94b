use crate::config::PollConfig;
use crate::utils::Result;
use std::fmt;
use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, warn};

/// Budget of one wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollOptions {
    pub timeout: Duration,
    pub interval: Duration,
    /// `None` means no attempt limit.
    pub max_attempts: Option<u64>,
}

impl Default for PollOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(60),
            interval: Duration::from_secs(1),
            max_attempts: None,
        }
    }
}

impl PollOptions {
    pub fn from_config(cfg: &PollConfig) -> Self {
        Self { timeout: cfg.timeout(), interval: cfg.interval(), max_attempts: None }
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn max_attempts(mut self, attempts: u64) -> Self {
        self.max_attempts = Some(attempts);
        self
    }
}

/// Result of one probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Observation {
    Satisfied,
    /// Not there yet; the detail ends up in the timeout error if this was the last one.
    Pending(String),
}

impl From<bool> for Observation {
    fn from(ok: bool) -> Self {
        if ok {
            Observation::Satisfied
        } else {
            Observation::Pending("predicate returned false".to_string())
        }
    }
}

/// Which budget ran out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollLimit {
    Timeout(Duration),
    Attempts(u64),
}

#[derive(Debug, Clone)]
pub struct PollTimeoutError {
    pub check: String,
    pub attempts: u64,
    pub elapsed: Duration,
    pub limit: PollLimit,
    pub last_observed: Option<String>,
}

impl fmt::Display for PollTimeoutError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} failed! ", self.check)?;
        match self.limit {
            PollLimit::Timeout(t) => write!(f, "not satisfied within {:?}", t)?,
            PollLimit::Attempts(n) => write!(f, "not satisfied after {} attempts", n)?,
        }
        write!(f, " ({} attempts, {:?} elapsed)", self.attempts, self.elapsed)?;
        if let Some(last) = &self.last_observed {
            write!(f, "; last observed: {}", last)?;
        }
        Ok(())
    }
}

impl std::error::Error for PollTimeoutError {}

/// Probe until it reports [`Observation::Satisfied`] or the budget in `opts` runs out.
///
/// The first probe runs immediately; later ones follow after `interval` (cut short so
/// that one last probe happens at the deadline). A probe error is returned as is.
pub async fn poll<F, Fut>(check: &str, opts: &PollOptions, mut probe: F) -> Result<()>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Observation>>,
{
    let started = Instant::now();
    let deadline = started + opts.timeout;
    let mut attempts: u64 = 0;
    let mut last_observed = None;

    let limit = loop {
        attempts += 1;
        match probe().await? {
            Observation::Satisfied => {
                debug!("{} satisfied after {} attempts", check, attempts);
                return Ok(());
            }
            Observation::Pending(detail) => last_observed = Some(detail),
        }

        if let Some(max) = opts.max_attempts {
            if attempts >= max {
                break PollLimit::Attempts(max);
            }
        }
        let now = Instant::now();
        if now >= deadline {
            break PollLimit::Timeout(opts.timeout);
        }
        sleep(opts.interval.min(deadline - now)).await;
    };

    let err = PollTimeoutError {
        check: check.to_string(),
        attempts,
        elapsed: started.elapsed(),
        limit,
        last_observed,
    };
    warn!("{}", err);
    Err(err.into())
}

/// Sleep until `predicate` resolves to true.
pub async fn wait_until<F, Fut>(opts: PollOptions, mut predicate: F) -> Result<()>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    poll("waitUntil", &opts, || {
        let fut = predicate();
        async move { Ok(Observation::from(fut.await)) }
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::HarnessError;
    use std::sync::atomic::{AtomicU64, Ordering};

    #[tokio::test(start_paused = true)]
    async fn times_out_with_attempt_count() {
        let opts = PollOptions::default()
            .timeout(Duration::from_millis(200))
            .interval(Duration::from_millis(50));
        let started = Instant::now();
        let err = wait_until(opts, || async { false }).await.unwrap_err();
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(200) && elapsed < Duration::from_millis(250));
        match err {
            HarnessError::PollTimeout(e) => {
                assert!(e.attempts >= 4, "attempts = {}", e.attempts);
                assert_eq!(e.limit, PollLimit::Timeout(Duration::from_millis(200)));
                assert!(e.to_string().contains("predicate returned false"));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn first_probe_is_not_delayed() {
        let started = Instant::now();
        wait_until(PollOptions::default(), || async { true }).await.unwrap();
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn stops_at_max_attempts() {
        let calls = AtomicU64::new(0);
        let opts = PollOptions::default().max_attempts(3);
        let err = wait_until(opts, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { false }
        })
        .await
        .unwrap_err();
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(err.to_string().contains("after 3 attempts"));
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_once_predicate_flips() {
        let calls = AtomicU64::new(0);
        wait_until(PollOptions::default(), || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move { n >= 2 }
        })
        .await
        .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn probe_errors_propagate_immediately() {
        let calls = AtomicU64::new(0);
        let err = poll("probe", &PollOptions::default(), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err::<Observation, _>(HarnessError::Node("gone".into())) }
        })
        .await
        .unwrap_err();
        assert!(matches!(err, HarnessError::Node(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
