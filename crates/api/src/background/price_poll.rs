//! Periodic price forecast refresh.
//!
//! Publishes a [`PriceSnapshot`]. When the price source is down the last
//! good forecast is kept and flagged as degraded; with no forecast at all
//! the resolver falls back to the fixed price.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use wattsched_core::pricing::PriceSnapshot;
use wattsched_events::RefreshHandle;
use wattsched_inference::fallback::refresh_snapshot;
use wattsched_inference::PriceSource;

pub fn start(
    source: Arc<dyn PriceSource>,
    period: Duration,
    cancel: CancellationToken,
) -> RefreshHandle<PriceSnapshot> {
    RefreshHandle::spawn_with_token(
        "price_forecast",
        period,
        PriceSnapshot::default(),
        cancel,
        move |previous| {
            let source = Arc::clone(&source);
            async move { refresh_snapshot(source.as_ref(), previous).await }
        },
    )
}
