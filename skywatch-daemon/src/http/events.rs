//! Live event stream over server-sent events.
//!
//! Each hub event becomes one SSE frame: `event:` is the event type, `id:`
//! the hub sequence number and `data:` the JSON-encoded event. The stream
//! ends when the hub evicts the subscriber or shuts down.

use std::convert::Infallible;

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use tokio_stream::{Stream, StreamExt};
use tracing::{debug, warn};

use skywatch_core::BroadcastEvent;

use super::{ApiError, AppState, Tenant};

/// `GET /api/events`
pub async fn subscribe(
    State(state): State<AppState>,
    Tenant(tenant): Tenant,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let subscription = state.hub.subscribe(tenant).await?;
    debug!(subscriber_id = %subscription.id(), tenant = tenant.0, "SSE client attached");

    let stream = subscription.filter_map(|event| to_sse(&event).map(Ok));
    let keep_alive = KeepAlive::new()
        .interval(state.sse_keep_alive)
        .text("keep-alive");
    Ok(Sse::new(stream).keep_alive(keep_alive))
}

fn to_sse(event: &BroadcastEvent) -> Option<Event> {
    Event::default()
        .event(event.kind.as_str())
        .id(event.sequence.to_string())
        .json_data(event)
        .map_err(|err| {
            warn!(event = %event.kind, error = %err, "failed to encode event");
            err
        })
        .ok()
}
