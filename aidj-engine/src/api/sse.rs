//! Server-Sent Events (SSE) endpoint
//!
//! `GET /events` streams every DJ event. `GET /events?types=A,B` streams only
//! the named event types.

use crate::api::server::AppContext;
use aidj_common::sse::{dj_event_stream, to_sse_event, KEEP_ALIVE_INTERVAL};
use axum::{
    extract::{Query, State},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
};
use futures::stream::{Stream, StreamExt};
use serde::Deserialize;
use std::collections::HashSet;
use std::convert::Infallible;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, warn};

#[derive(Debug, Default, Deserialize)]
pub struct EventFilter {
    /// Comma-separated event type names
    types: Option<String>,
}

impl EventFilter {
    fn type_set(&self) -> Option<HashSet<String>> {
        let types: HashSet<String> = self
            .types
            .as_deref()?
            .split(',')
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();
        (!types.is_empty()).then_some(types)
    }
}

/// GET /events - SSE event stream
pub async fn event_stream(
    State(ctx): State<AppContext>,
    Query(filter): Query<EventFilter>,
) -> Response {
    match filter.type_set() {
        None => dj_event_stream(ctx.session.bus()).into_response(),
        Some(types) => filtered_stream(&ctx, types).into_response(),
    }
}

fn filtered_stream(
    ctx: &AppContext,
    types: HashSet<String>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    debug!("New filtered SSE client: {:?}", types);
    let rx = ctx.session.bus().subscribe();

    let stream = BroadcastStream::new(rx).filter_map(move |result| {
        let wanted = match &result {
            Ok(event) => types.contains(event.event_type()),
            Err(e) => {
                warn!("SSE stream error: {:?}", e);
                false
            }
        };
        async move {
            match result {
                Ok(event) if wanted => to_sse_event(&event).map(Ok),
                _ => None,
            }
        }
    });

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(KEEP_ALIVE_INTERVAL)
            .text("keep-alive"),
    )
}
