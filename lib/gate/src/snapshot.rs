//! Saving the request that triggered a login and replaying it afterwards.
//!
//! At most one snapshot exists per session. Saving replaces the previous
//! one. A snapshot is consumed by the replay that uses it, so a second
//! restore with the same handle is a logged no-op.

use crate::error::SessionStoreError;
use crate::request::GateRequest;
use crate::session::SessionStore;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use http::{HeaderMap, Method, Uri};
use openid_gate_core::{SessionId, SnapshotId};
use rootcause::prelude::Report;
use std::sync::Arc;
use tracing::{debug, warn};

/// A captured request.
#[derive(Debug, Clone)]
pub struct RequestSnapshot {
    id: SnapshotId,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    /// `None` when the body exceeded the capture limit.
    body: Option<Bytes>,
    captured_at: DateTime<Utc>,
}

impl RequestSnapshot {
    /// Captures a request. Bodies larger than `max_body_bytes` are dropped.
    #[must_use]
    pub fn capture(request: &GateRequest, max_body_bytes: usize) -> Self {
        let body = (request.body().len() <= max_body_bytes).then(|| request.body().clone());
        if body.is_none() {
            debug!(
                size = request.body().len(),
                limit = max_body_bytes,
                "request body too large to save"
            );
        }
        Self {
            id: SnapshotId::new(),
            method: request.method().clone(),
            uri: request.uri().clone(),
            headers: request.headers().clone(),
            body,
            captured_at: Utc::now(),
        }
    }

    #[must_use]
    pub fn id(&self) -> SnapshotId {
        self.id
    }

    #[must_use]
    pub fn method(&self) -> &Method {
        &self.method
    }

    #[must_use]
    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    /// Returns false if the body was dropped at capture time.
    #[must_use]
    pub fn has_body(&self) -> bool {
        self.body.is_some()
    }

    #[must_use]
    pub fn captured_at(&self) -> DateTime<Utc> {
        self.captured_at
    }

    /// Rewrites `request` to the captured one.
    ///
    /// A snapshot whose body was dropped replays as a bodiless GET of the
    /// captured target.
    pub fn apply_to(self, request: &mut GateRequest) {
        match self.body {
            Some(body) => request.replace(self.method, self.uri, self.headers, body),
            None => request.forward_to(self.uri),
        }
    }
}

/// Saves and restores snapshots through the session store.
#[derive(Clone)]
pub struct RequestSnapshots {
    store: Arc<dyn SessionStore>,
    max_body_bytes: usize,
}

impl RequestSnapshots {
    /// Creates a snapshot manager.
    #[must_use]
    pub fn new(store: Arc<dyn SessionStore>, max_body_bytes: usize) -> Self {
        Self {
            store,
            max_body_bytes,
        }
    }

    /// Captures `request` into its session, replacing any earlier snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error if the session store fails.
    pub async fn save(&self, request: &GateRequest) -> Result<SnapshotId, Report<SessionStoreError>> {
        let snapshot = RequestSnapshot::capture(request, self.max_body_bytes);
        let id = snapshot.id();
        self.store.put_snapshot(request.session(), snapshot).await?;
        debug!(session = %request.session(), snapshot = %id, "request saved");
        Ok(id)
    }

    /// Returns the handle of the session's current snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error if the session store fails.
    pub async fn current(
        &self,
        session: SessionId,
    ) -> Result<Option<SnapshotId>, Report<SessionStoreError>> {
        self.store.snapshot_id(session).await
    }

    /// Replays the snapshot `id` into `request` and consumes it.
    ///
    /// Returns false, leaving `request` untouched, if the snapshot was
    /// already consumed or replaced.
    ///
    /// # Errors
    ///
    /// Returns an error if the session store fails.
    pub async fn restore(
        &self,
        session: SessionId,
        id: SnapshotId,
        request: &mut GateRequest,
    ) -> Result<bool, Report<SessionStoreError>> {
        match self.store.take_snapshot(session, id).await? {
            Some(snapshot) => {
                debug!(%session, snapshot = %id, target = %snapshot.uri(), "request restored");
                snapshot.apply_to(request);
                Ok(true)
            }
            None => {
                warn!(%session, snapshot = %id, "snapshot already consumed");
                Ok(false)
            }
        }
    }

    /// Drops the session's snapshot, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the session store fails.
    pub async fn discard(&self, session: SessionId) -> Result<(), Report<SessionStoreError>> {
        self.store.discard_snapshot(session).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::InMemorySessionStore;
    use http::header::{self, HeaderValue};

    fn post(session: SessionId, body: &'static [u8]) -> GateRequest {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/x-www-form-urlencoded"),
        );
        GateRequest::new(
            session,
            Method::POST,
            Uri::from_static("/orders?draft=1"),
            headers,
            Bytes::from_static(body),
        )
    }

    fn manager(limit: usize) -> RequestSnapshots {
        RequestSnapshots::new(Arc::new(InMemorySessionStore::default()), limit)
    }

    #[test]
    fn capture_keeps_small_bodies() {
        let snapshot = RequestSnapshot::capture(&post(SessionId::new(), b"item=1"), 64);
        assert!(snapshot.has_body());
        assert_eq!(*snapshot.method(), Method::POST);
        assert_eq!(snapshot.uri(), "/orders?draft=1");
    }

    #[test]
    fn oversized_body_replays_as_get() {
        let session = SessionId::new();
        let snapshot = RequestSnapshot::capture(&post(session, b"0123456789"), 4);
        assert!(!snapshot.has_body());

        let mut request = GateRequest::get(session, Uri::from_static("/callback?code=x"));
        snapshot.apply_to(&mut request);
        assert_eq!(*request.method(), Method::GET);
        assert_eq!(request.uri(), "/orders?draft=1");
        assert!(request.body().is_empty());
    }

    #[tokio::test]
    async fn restore_replays_method_target_and_body() {
        let snapshots = manager(64);
        let session = SessionId::new();
        let id = snapshots
            .save(&post(session, b"item=1"))
            .await
            .expect("save");

        let mut request = GateRequest::get(session, Uri::from_static("/callback?code=x"));
        let restored = snapshots
            .restore(session, id, &mut request)
            .await
            .expect("restore");

        assert!(restored);
        assert_eq!(*request.method(), Method::POST);
        assert_eq!(request.uri(), "/orders?draft=1");
        assert_eq!(request.body().as_ref(), b"item=1");
        assert_eq!(
            request.headers().get(header::CONTENT_TYPE),
            Some(&HeaderValue::from_static("application/x-www-form-urlencoded"))
        );
    }

    #[tokio::test]
    async fn second_restore_is_a_no_op() {
        let snapshots = manager(64);
        let session = SessionId::new();
        let id = snapshots
            .save(&post(session, b"item=1"))
            .await
            .expect("save");

        let mut first = GateRequest::get(session, Uri::from_static("/callback"));
        assert!(snapshots.restore(session, id, &mut first).await.expect("restore"));

        let mut second = GateRequest::get(session, Uri::from_static("/callback"));
        assert!(!snapshots.restore(session, id, &mut second).await.expect("restore"));
        assert_eq!(second.uri(), "/callback");
        assert_eq!(snapshots.current(session).await.expect("current"), None);
    }

    #[tokio::test]
    async fn save_replaces_previous_snapshot() {
        let snapshots = manager(64);
        let session = SessionId::new();
        let first = snapshots.save(&post(session, b"a")).await.expect("save");
        let second = snapshots.save(&post(session, b"b")).await.expect("save");

        assert_ne!(first, second);
        assert_eq!(
            snapshots.current(session).await.expect("current"),
            Some(second)
        );

        let mut request = GateRequest::get(session, Uri::from_static("/callback"));
        assert!(!snapshots.restore(session, first, &mut request).await.expect("restore"));
        assert_eq!(
            snapshots.current(session).await.expect("current"),
            Some(second)
        );
    }

    #[tokio::test]
    async fn discard_removes_snapshot() {
        let snapshots = manager(64);
        let session = SessionId::new();
        snapshots.save(&post(session, b"a")).await.expect("save");
        snapshots.discard(session).await.expect("discard");
        assert_eq!(snapshots.current(session).await.expect("current"), None);
    }
}
