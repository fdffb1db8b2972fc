use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::TimeZone;
use futures::future::{BoxFuture, FutureExt};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::{
    api::client::ConsoleClient,
    error::Result,
    metrics::record_search_superseded,
    query::MetricsFilter,
};

type Action<T> = Arc<dyn Fn(T) -> BoxFuture<'static, ()> + Send + Sync>;

/// A scheduled input. `claimed` is set by whichever side gets there first:
/// the timer (the input fires) or a newer push/cancel (it is dropped).
struct Pending {
    handle: JoinHandle<()>,
    claimed: Arc<AtomicBool>,
}

impl Pending {
    /// Aborts the timer if it has not fired yet. Returns whether it was stopped.
    fn stop(self) -> bool {
        if self.claimed.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.handle.abort();
        true
    }
}

/// Delays an action until input has been idle for a fixed period.
///
/// Each `push` restarts the timer with the newest input; only the last
/// input before an idle period fires. Once fired, the action runs to
/// completion even if new input arrives.
pub struct Debouncer<T> {
    idle: Duration,
    action: Action<T>,
    pending: Mutex<Option<Pending>>,
}

impl<T: Send + 'static> Debouncer<T> {
    pub fn new<F, Fut>(idle: Duration, action: F) -> Self
    where
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        Self {
            idle,
            action: Arc::new(move |input| action(input).boxed()),
            pending: Mutex::new(None),
        }
    }

    pub fn idle(&self) -> Duration {
        self.idle
    }

    /// Must be called inside a tokio runtime.
    pub fn push(&self, input: T) {
        let mut pending = self.lock();
        if let Some(previous) = pending.take() {
            if previous.stop() {
                record_search_superseded();
            }
        }

        let idle = self.idle;
        let action = Arc::clone(&self.action);
        let claimed = Arc::new(AtomicBool::new(false));
        let timer_claim = Arc::clone(&claimed);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(idle).await;
            if timer_claim.swap(true, Ordering::AcqRel) {
                return;
            }
            // Detached so a later push cannot abort work already started.
            tokio::spawn(action(input));
        });
        *pending = Some(Pending { handle, claimed });
    }

    /// Drops the pending input, if any. Returns whether something was pending.
    pub fn cancel(&self) -> bool {
        self.lock().take().map(Pending::stop).unwrap_or(false)
    }

    fn lock(&self) -> MutexGuard<'_, Option<Pending>> {
        self.pending
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl<T> Drop for Debouncer<T> {
    fn drop(&mut self) {
        let pending = match self.pending.get_mut() {
            Ok(pending) => pending,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(pending) = pending.take() {
            pending.stop();
        }
    }
}

/// Search-as-you-type over the metric listing of one app.
pub struct MetricSearch {
    debouncer: Debouncer<String>,
}

impl MetricSearch {
    /// `on_result` receives each listing fragment (or the failure) as the
    /// debounced requests complete.
    pub fn new<Z, F>(
        client: Arc<ConsoleClient<Z>>,
        app: impl Into<String>,
        filter: MetricsFilter,
        idle: Duration,
        on_result: F,
    ) -> Self
    where
        Z: TimeZone + Send + Sync + 'static,
        Z::Offset: std::fmt::Display,
        F: Fn(Result<String>) + Send + Sync + 'static,
    {
        let app = app.into();
        let on_result = Arc::new(on_result);
        let debouncer = Debouncer::new(idle, move |prefix: String| {
            let client = Arc::clone(&client);
            let app = app.clone();
            let filter = filter.clone();
            let on_result = Arc::clone(&on_result);
            async move {
                debug!("Searching metrics in {} with prefix '{}'", app, prefix);
                let result = client.load_metrics(&app, &filter, Some(&prefix)).await;
                on_result(result);
            }
        });
        Self { debouncer }
    }

    /// New text in the search box.
    pub fn key_up(&self, text: &str) {
        self.debouncer.push(text.to_string());
    }

    /// Escape clears the box: any pending prefix is replaced by an empty
    /// one, so the unfiltered listing is reloaded after the idle period.
    pub fn escape(&self) {
        self.debouncer.push(String::new());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;
    use tokio::time::sleep;

    fn recording_debouncer(idle_ms: u64) -> (Debouncer<String>, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let debouncer = Debouncer::new(Duration::from_millis(idle_ms), move |input: String| {
            let tx = tx.clone();
            async move {
                let _ = tx.send(input);
            }
        });
        (debouncer, rx)
    }

    #[tokio::test(start_paused = true)]
    async fn test_only_last_input_fires() {
        let (debouncer, mut rx) = recording_debouncer(400);

        debouncer.push("j".to_string());
        sleep(Duration::from_millis(100)).await;
        debouncer.push("jv".to_string());
        sleep(Duration::from_millis(399)).await;
        debouncer.push("jvm".to_string());
        sleep(Duration::from_millis(500)).await;

        assert_eq!(rx.recv().await.as_deref(), Some("jvm"));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_separate_bursts_each_fire() {
        let (debouncer, mut rx) = recording_debouncer(400);

        debouncer.push("a".to_string());
        sleep(Duration::from_millis(450)).await;
        assert_eq!(rx.recv().await.as_deref(), Some("a"));

        debouncer.push("b".to_string());
        sleep(Duration::from_millis(450)).await;
        assert_eq!(rx.recv().await.as_deref(), Some("b"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_drops_pending() {
        let (debouncer, mut rx) = recording_debouncer(400);

        debouncer.push("gc".to_string());
        sleep(Duration::from_millis(100)).await;
        assert!(debouncer.cancel());
        sleep(Duration::from_millis(1000)).await;

        assert!(rx.try_recv().is_err());
        assert!(!debouncer.cancel());
    }

    #[tokio::test(start_paused = true)]
    async fn test_push_after_fire_is_not_superseded() {
        let (debouncer, mut rx) = recording_debouncer(400);

        debouncer.push("a".to_string());
        sleep(Duration::from_millis(450)).await;
        assert_eq!(rx.recv().await.as_deref(), Some("a"));

        let pending = debouncer.lock().take().unwrap();
        assert!(!pending.stop());

        debouncer.push("b".to_string());
        let pending = debouncer.lock().take().unwrap();
        assert!(pending.stop());
        sleep(Duration::from_millis(1000)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_nothing_fires_before_idle() {
        let (debouncer, mut rx) = recording_debouncer(400);

        debouncer.push("x".to_string());
        sleep(Duration::from_millis(399)).await;
        assert!(rx.try_recv().is_err());
        sleep(Duration::from_millis(2)).await;
        assert_eq!(rx.recv().await.as_deref(), Some("x"));
    }
}
