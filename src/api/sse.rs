//! Server-Sent Events for live point updates

use super::AppState;
use crate::awards::{AwardEvent, TickOutcome};
use axum::{
    extract::State,
    response::sse::{Event, Sse},
};
use futures::stream::Stream;
use std::convert::Infallible;
use std::time::Duration;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;

fn event_type(event: &AwardEvent) -> &'static str {
    match event.outcome {
        TickOutcome::Awarded { .. } => "points:awarded",
        TickOutcome::SkippedMissingUser => "points:skipped",
        TickOutcome::Failed { .. } => "points:failed",
    }
}

/// SSE events handler
pub async fn events_handler(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let event_rx = state.event_tx.subscribe();
    let mut drain_rx = state.drain.subscribe();

    let award_stream = BroadcastStream::new(event_rx).filter_map(|result| match result {
        Ok(award) => {
            let data = serde_json::to_string(&award).unwrap_or_default();
            Some(Ok::<_, Infallible>(
                Event::default().event(event_type(&award)).data(data),
            ))
        }
        Err(_) => None, // Lagged, skip
    });

    let heartbeat_stream =
        tokio_stream::wrappers::IntervalStream::new(tokio::time::interval(Duration::from_secs(30)))
            .map(|_| {
                let data = serde_json::json!({ "timestamp": chrono::Utc::now().to_rfc3339() });
                Ok::<_, Infallible>(Event::default().event("heartbeat").data(data.to_string()))
            });

    let merged_stream = futures::stream::select(award_stream, heartbeat_stream);

    // End the stream on shutdown so the connection can drain
    let drained = async move {
        let _ = drain_rx.wait_for(|draining| *draining).await;
    };
    let merged_stream = futures::StreamExt::take_until(merged_stream, drained);

    Sse::new(merged_stream).keep_alive(
        axum::response::sse::KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}
