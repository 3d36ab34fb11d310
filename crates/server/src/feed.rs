//! Realtime fan-out of occurrence changes to admin dashboards, served as
//! Server-Sent Events. The feed is advisory: a subscriber that lags past
//! the channel capacity misses events and is expected to re-fetch the
//! authoritative list.

use crate::routes::require_admin;
use crate::{bearer_token, ApiError, AppState};
use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::sse::{Event, KeepAlive, Sse};
use monitore_core::auth;
use std::convert::Infallible;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::{Stream, StreamExt};
use tracing::{info, warn};

pub(crate) async fn change_feed(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let conn = state.db.lock().await;
    let principal = auth::principal_for_token(&conn, bearer_token(&headers))?;
    drop(conn);
    require_admin(&principal)?;

    info!("change feed subscriber connected");
    let stream = BroadcastStream::new(state.subscribe()).filter_map(|received| match received {
        Ok(event) => match serde_json::to_string(&event) {
            Ok(payload) => Some(Ok(Event::default().event("change").data(payload))),
            Err(err) => {
                warn!(error = %err, "dropping unserializable change event");
                None
            }
        },
        Err(BroadcastStreamRecvError::Lagged(missed)) => {
            warn!(missed, "change feed subscriber lagged");
            // Tell the consumer it has a gap so it can re-fetch.
            Some(Ok(Event::default()
                .event("lagged")
                .data(missed.to_string())))
        }
    });

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

#[cfg(test)]
mod tests {
    use monitore_core::notify::ChangeEvent;
    use monitore_core::{db, schema};

    fn sample_occurrence() -> schema::Occurrence {
        schema::Occurrence {
            id: "occ-1".to_string(),
            reporter_user_id: None,
            category: schema::Category::Other,
            address: "Rua Direita, 77 - Centro".to_string(),
            reference_point: None,
            description: "Bueiro aberto representando risco aos pedestres.".to_string(),
            photos: vec![],
            accessibility_affected: false,
            is_public: true,
            status: schema::Status::Received,
            priority: schema::Priority::Medium,
            history: vec![],
            created_at: "2026-03-01T00:00:00Z".to_string(),
        }
    }

    #[tokio::test]
    async fn publish_reaches_subscribers_in_order() {
        let state = crate::AppState::new(db::open_in_memory().unwrap(), "svc-key");
        let mut rx = state.subscribe();

        state.publish(ChangeEvent::Insert {
            occurrence: sample_occurrence(),
        });
        state.publish(ChangeEvent::Delete {
            id: "occ-1".to_string(),
        });

        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        assert!(matches!(first, ChangeEvent::Insert { .. }));
        assert!(matches!(second, ChangeEvent::Delete { ref id } if id == "occ-1"));
    }

    #[tokio::test]
    async fn publish_without_subscribers_is_a_no_op() {
        let state = crate::AppState::new(db::open_in_memory().unwrap(), "svc-key");
        state.publish(ChangeEvent::Delete {
            id: "gone".to_string(),
        });
        // A subscriber joining afterwards only sees later events.
        let mut rx = state.subscribe();
        state.publish(ChangeEvent::Delete {
            id: "later".to_string(),
        });
        let event = rx.recv().await.unwrap();
        assert_eq!(event.occurrence_id(), "later");
    }
}
