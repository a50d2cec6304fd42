//! Cancelable periodic refresh.
//!
//! A [`RefreshHandle`] owns a background task that recomputes a value on a
//! fixed interval and publishes it through a `watch` channel. The task
//! stops when the handle is cancelled, shut down or dropped, so a refresh
//! never outlives the context that started it.

use std::future::Future;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// Handle to a running periodic refresh of a `T`.
pub struct RefreshHandle<T> {
    name: &'static str,
    rx: watch::Receiver<T>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl<T> RefreshHandle<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Start refreshing immediately and then every `period`.
    ///
    /// `refresh` receives the previous value and returns the next one; it
    /// decides itself how to degrade when its source fails.
    pub fn spawn<F, Fut>(name: &'static str, period: Duration, initial: T, refresh: F) -> Self
    where
        F: FnMut(T) -> Fut + Send + 'static,
        Fut: Future<Output = T> + Send,
    {
        Self::spawn_with_token(name, period, initial, CancellationToken::new(), refresh)
    }

    /// Like [`spawn`](Self::spawn), stopping also when `cancel` fires.
    pub fn spawn_with_token<F, Fut>(
        name: &'static str,
        period: Duration,
        initial: T,
        cancel: CancellationToken,
        mut refresh: F,
    ) -> Self
    where
        F: FnMut(T) -> Fut + Send + 'static,
        Fut: Future<Output = T> + Send,
    {
        let (tx, rx) = watch::channel(initial);
        let token = cancel.clone();

        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = interval.tick() => {}
                }
                let previous = tx.borrow().clone();
                tokio::select! {
                    _ = token.cancelled() => break,
                    next = refresh(previous) => {
                        tx.send_replace(next);
                    }
                }
            }
            tracing::debug!(refresh = name, "Refresh stopped");
        });

        tracing::debug!(refresh = name, period_secs = period.as_secs(), "Refresh started");

        Self {
            name,
            rx,
            cancel,
            task: Some(task),
        }
    }

    /// The most recently published value.
    pub fn latest(&self) -> T {
        self.rx.borrow().clone()
    }

    /// A receiver notified on every refresh.
    pub fn subscribe(&self) -> watch::Receiver<T> {
        self.rx.clone()
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Stop refreshing. The last value stays readable.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Cancel and wait for the background task to exit.
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                tracing::warn!(refresh = self.name, error = %e, "Refresh task ended abnormally");
            }
        }
    }
}

impl<T> Drop for RefreshHandle<T> {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;

    const PERIOD: Duration = Duration::from_secs(30);

    fn counting(calls: Arc<AtomicUsize>) -> impl FnMut(u32) -> std::future::Ready<u32> {
        move |previous| {
            calls.fetch_add(1, Ordering::SeqCst);
            std::future::ready(previous + 1)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn refreshes_immediately_then_every_period() {
        let calls = Arc::new(AtomicUsize::new(0));
        let handle = RefreshHandle::spawn("test", PERIOD, 0u32, counting(calls.clone()));

        tokio::time::sleep(Duration::from_secs(65)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(handle.latest(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn subscribers_see_each_refresh() {
        let handle = RefreshHandle::spawn("test", PERIOD, 0u32, |n| async move { n + 10 });
        let mut rx = handle.subscribe();

        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow_and_update(), 10);
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow_and_update(), 20);
    }

    #[tokio::test(start_paused = true)]
    async fn drop_stops_the_task() {
        let calls = Arc::new(AtomicUsize::new(0));
        let handle = RefreshHandle::spawn("test", PERIOD, 0u32, counting(calls.clone()));
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        drop(handle);
        tokio::time::sleep(Duration::from_secs(300)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_keeps_last_value() {
        let handle = RefreshHandle::spawn("test", PERIOD, 0u32, |n| async move { n + 1 });
        tokio::time::sleep(Duration::from_secs(1)).await;
        handle.cancel();
        tokio::time::sleep(Duration::from_secs(300)).await;
        assert!(handle.is_cancelled());
        assert_eq!(handle.latest(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn parent_token_cancels_refresh() {
        let parent = CancellationToken::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let handle = RefreshHandle::spawn_with_token(
            "test",
            PERIOD,
            0u32,
            parent.child_token(),
            counting(calls.clone()),
        );
        tokio::time::sleep(Duration::from_secs(1)).await;

        parent.cancel();
        handle.shutdown().await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_refresh_is_interrupted_by_cancel() {
        let handle = RefreshHandle::spawn("test", PERIOD, 0u32, |n| async move {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            n + 1
        });
        tokio::time::sleep(Duration::from_secs(1)).await;
        handle.cancel();
        tokio::time::timeout(Duration::from_secs(5), handle.shutdown())
            .await
            .expect("shutdown should not wait for the slow refresh");
    }
}
