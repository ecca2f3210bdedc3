//! Chat endpoint: Server-Sent Events of text fragments and sources

use axum::{
    extract::{rejection::JsonRejection, State},
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use futures_util::{Stream, StreamExt};
use std::convert::Infallible;

use crate::error::{Error, Result};
use crate::server::state::AppState;
use crate::types::{ChatRequest, StreamEvent};

/// POST /chat - Answer a message as an event stream
///
/// Each frame is `data: <StreamEvent JSON>`; the stream ends when the
/// connection closes. Malformed bodies fail before the stream opens.
pub async fn chat(
    State(state): State<AppState>,
    payload: std::result::Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Sse<impl Stream<Item = std::result::Result<Event, Infallible>>>> {
    let Json(request) = payload.map_err(rejection_to_error)?;
    request.validate()?;

    tracing::info!("Chat: \"{}\"", request.message);

    let events = state
        .pipeline()
        .respond(&request.message)
        .map(|event| Ok(to_sse(&event)));

    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}

fn to_sse(event: &StreamEvent) -> Event {
    match Event::default().json_data(event) {
        Ok(frame) => frame,
        Err(e) => {
            tracing::error!("Failed to encode stream event: {}", e);
            Event::default().comment("encoding error")
        }
    }
}

/// Unparseable bodies are 400; well-formed JSON of the wrong shape is 422
fn rejection_to_error(rejection: JsonRejection) -> Error {
    match rejection {
        JsonRejection::JsonDataError(e) => Error::Validation(e.body_text()),
        other => Error::InvalidRequest(other.body_text()),
    }
}
