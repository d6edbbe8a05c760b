//! Fallback runner
//!
//! Runs a fallback backend on a spawned task and races it against:
//! - a hard timeout (reports `TimedOut`, never hangs)
//! - the request's cancellation token, which fires when the caller is
//!   dropped (client disconnect) or the service shuts down
//!
//! Usage is capped per UTC day and spaced by a cooldown.

use super::{FallbackError, FallbackIdentifier};
use crate::config::FallbackSettings;
use crate::types::{PartImage, RawIdentification};
use chrono::{NaiveDate, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Runner limits
#[derive(Debug, Clone, PartialEq)]
pub struct FallbackLimits {
    pub timeout: Duration,
    /// Runs per UTC day (0 = unlimited)
    pub max_daily: u32,
    pub cooldown: Duration,
}

impl From<&FallbackSettings> for FallbackLimits {
    fn from(settings: &FallbackSettings) -> Self {
        Self {
            timeout: settings.timeout,
            max_daily: settings.max_daily,
            cooldown: settings.cooldown,
        }
    }
}

/// Limits and today's usage, as reported by `GET /feature-flags`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FallbackUsage {
    pub backend: Option<String>,
    pub runs_today: u32,
    /// 0 = unlimited
    pub max_daily: u32,
    pub cooldown_secs: u64,
    pub timeout_secs: u64,
}

/// Daily usage bookkeeping
#[derive(Debug)]
struct UsageState {
    day: NaiveDate,
    runs_today: u32,
    last_run: Option<Instant>,
}

/// Time-boxed, cancellable fallback execution
pub struct FallbackRunner {
    backend: Option<Arc<dyn FallbackIdentifier>>,
    limits: FallbackLimits,
    usage: Mutex<UsageState>,
    shutdown: CancellationToken,
}

impl FallbackRunner {
    /// Create runner; `shutdown` cancels every in-flight run when fired
    pub fn new(
        backend: Option<Arc<dyn FallbackIdentifier>>,
        limits: FallbackLimits,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            backend,
            limits,
            usage: Mutex::new(UsageState {
                day: Utc::now().date_naive(),
                runs_today: 0,
                last_run: None,
            }),
            shutdown,
        }
    }

    /// Runner with no backend; every run reports `NotConfigured`
    pub fn disabled() -> Self {
        Self::new(
            None,
            FallbackLimits::from(&FallbackSettings::default()),
            CancellationToken::new(),
        )
    }

    /// Name of the configured backend
    pub fn backend_name(&self) -> Option<&str> {
        self.backend.as_ref().map(|b| b.name())
    }

    pub async fn usage(&self) -> FallbackUsage {
        FallbackUsage {
            backend: self.backend_name().map(str::to_string),
            runs_today: self.runs_today().await,
            max_daily: self.limits.max_daily,
            cooldown_secs: self.limits.cooldown.as_secs(),
            timeout_secs: self.limits.timeout.as_secs(),
        }
    }

    /// Runs recorded for the current UTC day
    async fn runs_today(&self) -> u32 {
        let usage = self.usage.lock().await;
        if usage.day == Utc::now().date_naive() {
            usage.runs_today
        } else {
            0
        }
    }

    /// Run the fallback backend
    ///
    /// Dropping the returned future cancels the spawned work.
    ///
    /// # Errors
    /// `NotConfigured`, `QuotaExhausted`, `CoolingDown`, `TimedOut`,
    /// `Cancelled`, or the backend's own `Failed`.
    pub async fn run(&self, images: Arc<[PartImage]>) -> Result<RawIdentification, FallbackError> {
        let backend = self.backend.clone().ok_or(FallbackError::NotConfigured)?;
        self.reserve_slot().await?;

        let token = self.shutdown.child_token();
        let _cancel_on_drop = token.clone().drop_guard();

        let started = Instant::now();
        let task_token = token.clone();
        let handle = tokio::spawn(async move { backend.identify(images, task_token).await });
        let abort = handle.abort_handle();

        info!(
            backend = self.backend_name().unwrap_or("none"),
            timeout_secs = self.limits.timeout.as_secs(),
            "Fallback identification started"
        );

        let outcome = tokio::select! {
            joined = handle => match joined {
                Ok(result) => result,
                Err(e) => Err(FallbackError::Failed(format!("Fallback task failed: {}", e))),
            },
            _ = tokio::time::sleep(self.limits.timeout) => {
                token.cancel();
                abort.abort();
                Err(FallbackError::TimedOut(self.limits.timeout))
            }
            _ = token.cancelled() => {
                abort.abort();
                Err(FallbackError::Cancelled)
            }
        };

        match &outcome {
            Ok(raw) => info!(
                elapsed_ms = started.elapsed().as_millis() as u64,
                part_name = %raw.part_name,
                "Fallback identification completed"
            ),
            Err(e) => warn!(
                elapsed_ms = started.elapsed().as_millis() as u64,
                error = %e,
                "Fallback identification did not complete"
            ),
        }

        outcome
    }

    /// Enforce daily cap and cooldown, then record the run
    async fn reserve_slot(&self) -> Result<(), FallbackError> {
        let mut usage = self.usage.lock().await;

        let today = Utc::now().date_naive();
        if usage.day != today {
            usage.day = today;
            usage.runs_today = 0;
        }

        if self.limits.max_daily > 0 && usage.runs_today >= self.limits.max_daily {
            return Err(FallbackError::QuotaExhausted(self.limits.max_daily));
        }

        if let Some(last) = usage.last_run {
            let elapsed = last.elapsed();
            if elapsed < self.limits.cooldown {
                let remaining = self.limits.cooldown - elapsed;
                return Err(FallbackError::CoolingDown(remaining.as_secs().max(1)));
            }
        }

        usage.runs_today += 1;
        usage.last_run = Some(Instant::now());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// Backend that sleeps before answering and records cancellation
    struct SlowBackend {
        delay: Duration,
        saw_cancel: Arc<AtomicBool>,
    }

    #[async_trait]
    impl FallbackIdentifier for SlowBackend {
        fn name(&self) -> &str {
            "slow"
        }

        async fn identify(
            &self,
            _images: Arc<[PartImage]>,
            cancel: CancellationToken,
        ) -> Result<RawIdentification, FallbackError> {
            tokio::select! {
                _ = tokio::time::sleep(self.delay) => Ok(RawIdentification {
                    part_name: "Water Pump".to_string(),
                    ..Default::default()
                }),
                _ = cancel.cancelled() => {
                    self.saw_cancel.store(true, Ordering::SeqCst);
                    Err(FallbackError::Cancelled)
                }
            }
        }
    }

    fn runner(delay: Duration, limits: FallbackLimits) -> (FallbackRunner, Arc<AtomicBool>, CancellationToken) {
        let saw_cancel = Arc::new(AtomicBool::new(false));
        let shutdown = CancellationToken::new();
        let backend = SlowBackend {
            delay,
            saw_cancel: saw_cancel.clone(),
        };
        (
            FallbackRunner::new(Some(Arc::new(backend)), limits, shutdown.clone()),
            saw_cancel,
            shutdown,
        )
    }

    fn limits(timeout_ms: u64, max_daily: u32, cooldown_ms: u64) -> FallbackLimits {
        FallbackLimits {
            timeout: Duration::from_millis(timeout_ms),
            max_daily,
            cooldown: Duration::from_millis(cooldown_ms),
        }
    }

    fn images() -> Arc<[PartImage]> {
        Arc::from(vec![PartImage::new("a.jpg", "image/jpeg", vec![1])])
    }

    #[tokio::test]
    async fn test_completes_within_timeout() {
        let (runner, _, _) = runner(Duration::from_millis(10), limits(1_000, 0, 0));
        let raw = runner.run(images()).await.unwrap();
        assert_eq!(raw.part_name, "Water Pump");
        assert_eq!(runner.runs_today().await, 1);
    }

    #[tokio::test]
    async fn test_times_out() {
        let (runner, _, _) = runner(Duration::from_secs(30), limits(50, 0, 0));

        let started = Instant::now();
        let err = runner.run(images()).await.unwrap_err();
        assert!(matches!(err, FallbackError::TimedOut(_)));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_dropped_caller_cancels_backend() {
        let (runner, saw_cancel, _) = runner(Duration::from_secs(30), limits(10_000, 0, 0));
        let runner = Arc::new(runner);

        let caller = {
            let runner = runner.clone();
            tokio::spawn(async move { runner.run(images()).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        caller.abort();

        let mut observed = false;
        for _ in 0..50 {
            if saw_cancel.load(Ordering::SeqCst) {
                observed = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(observed, "backend never saw cancellation");
    }

    #[tokio::test]
    async fn test_shutdown_cancels_run() {
        let (runner, _, shutdown) = runner(Duration::from_secs(30), limits(10_000, 0, 0));
        let runner = Arc::new(runner);

        let task = {
            let runner = runner.clone();
            tokio::spawn(async move { runner.run(images()).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        shutdown.cancel();

        let err = task.await.unwrap().unwrap_err();
        assert!(matches!(err, FallbackError::Cancelled));
    }

    #[tokio::test]
    async fn test_daily_cap() {
        let (runner, _, _) = runner(Duration::from_millis(1), limits(1_000, 2, 0));

        runner.run(images()).await.unwrap();
        runner.run(images()).await.unwrap();
        let err = runner.run(images()).await.unwrap_err();
        assert!(matches!(err, FallbackError::QuotaExhausted(2)));
        assert_eq!(runner.runs_today().await, 2);

        let usage = runner.usage().await;
        assert_eq!(usage.backend.as_deref(), Some("slow"));
        assert_eq!(usage.runs_today, 2);
        assert_eq!(usage.max_daily, 2);
    }

    #[tokio::test]
    async fn test_cooldown() {
        let (runner, _, _) = runner(Duration::from_millis(1), limits(1_000, 0, 60_000));

        runner.run(images()).await.unwrap();
        let err = runner.run(images()).await.unwrap_err();
        assert!(matches!(err, FallbackError::CoolingDown(secs) if secs > 0));
    }

    #[tokio::test]
    async fn test_disabled_runner() {
        let runner = FallbackRunner::disabled();
        assert!(runner.backend_name().is_none());
        assert!(matches!(
            runner.run(images()).await.unwrap_err(),
            FallbackError::NotConfigured
        ));
    }
}
