//! Server-sent event stream of preview frames.

use std::{convert::Infallible, time::Duration};

use async_stream::stream;
use axum::response::{
    IntoResponse, Response,
    sse::{Event, KeepAlive, Sse},
};
use tokio::sync::watch;

use super::preview::PreviewFrame;

pub const CLEAR_EVENT: &str = "clear";
pub const RENDER_EVENT: &str = "render";

const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(15);

/// Encode one frame: `clear` carries the pass number, `render` the full document.
pub fn frame_event(frame: &PreviewFrame) -> Event {
    match &frame.html {
        None => Event::default()
            .event(CLEAR_EVENT)
            .id(frame.pass.to_string())
            .data(frame.pass.to_string()),
        Some(html) => Event::default()
            .event(RENDER_EVENT)
            .id(frame.pass.to_string())
            .data(&**html),
    }
}

/// Stream the current frame, then every later one, until the sender goes away.
pub fn frame_stream(mut frames: watch::Receiver<PreviewFrame>) -> Response {
    let stream = stream! {
        let first = frames.borrow_and_update().clone();
        yield Ok::<Event, Infallible>(frame_event(&first));

        while frames.changed().await.is_ok() {
            let frame = frames.borrow_and_update().clone();
            yield Ok::<Event, Infallible>(frame_event(&frame));
        }
    };
    Sse::new(stream)
        .keep_alive(KeepAlive::new().interval(KEEP_ALIVE_INTERVAL))
        .into_response()
}
