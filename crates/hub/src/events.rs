//! Events — the live SSE viewer endpoint.

use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::{Stream, StreamExt};
use tracing::{info, warn};

use crate::error::ApiError;
use crate::fanout::Broadcaster;
use crate::identity::Identity;
use crate::state::AppState;

/// Deregisters the viewer when its stream is dropped, whether the
/// client disconnected, the connection errored, or the server shut
/// the stream down.
struct ViewerGuard {
    id: u64,
    fanout: Arc<Broadcaster>,
}

impl Drop for ViewerGuard {
    fn drop(&mut self) {
        self.fanout.deregister(self.id);
        info!(viewer = self.id, "Viewer stream closed");
    }
}

/// GET /api/events/stream — one SSE frame per normalized event.
///
/// Each viewer gets its own bounded queue; the frame is `data: <json>`
/// and the transport flushes per frame. Events are filtered to the
/// viewer's tenant here, in the per-viewer stream — the broadcaster
/// stays tenant-agnostic.
pub async fn stream_events(
    State(state): State<AppState>,
    identity: Identity,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let (id, rx) = state
        .fanout
        .register()
        .map_err(|_| ApiError::Unavailable("Server is shutting down".to_string()))?;

    info!(viewer = id, tenant = identity.tenant.0, "Viewer connected");

    let guard = ViewerGuard { id, fanout: Arc::clone(&state.fanout) };
    let tenant = identity.tenant;

    let stream = ReceiverStream::new(rx).filter_map(move |event| {
        // The guard lives inside the closure; dropping the stream
        // deregisters the viewer.
        let _keepalive = &guard;

        if event.tenant_id != tenant.0 {
            return None;
        }
        match Event::default().json_data(event.as_ref()) {
            Ok(frame) => Some(Ok::<_, Infallible>(frame)),
            Err(e) => {
                warn!(error = %e, "Failed to encode SSE frame");
                None
            }
        }
    });

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}
