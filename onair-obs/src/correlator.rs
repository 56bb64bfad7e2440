use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::error::{ObsError, Result};
use crate::protocol::ResponsePayload;

type Waiter = oneshot::Sender<Result<ResponsePayload>>;

/// Maps request ids to the callers waiting on them.
///
/// Ids come from a counter that is never reset, so an id is unique for the
/// whole life of the client and therefore for every connection it makes.
pub struct Correlator {
    next_id: AtomicU64,
    pending: Mutex<HashMap<String, Waiter>>,
}

impl Default for Correlator {
    fn default() -> Self {
        Self::new()
    }
}

impl Correlator {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            pending: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Waiter>> {
        // A panic while holding this lock cannot leave the map half-written.
        self.pending.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Allocates a fresh id and parks a waiter under it.
    pub fn register(&self) -> (String, oneshot::Receiver<Result<ResponsePayload>>) {
        let id = format!("req-{}", self.next_id.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = oneshot::channel();
        self.lock().insert(id.clone(), tx);
        (id, rx)
    }

    /// Hands a response to its waiter. Returns false when nobody was waiting.
    pub fn resolve(&self, response: ResponsePayload) -> bool {
        let waiter = self.lock().remove(&response.request_id);
        match waiter {
            Some(tx) => {
                let id = response.request_id.clone();
                if tx.send(Ok(response)).is_err() {
                    debug!("Caller for {} stopped waiting before the response arrived", id);
                }
                true
            }
            None => false,
        }
    }

    /// Drops a waiter without resolving it (send failure, timeout).
    pub fn cancel(&self, request_id: &str) -> bool {
        self.lock().remove(request_id).is_some()
    }

    /// Fails every pending waiter. Used when the connection they were sent on
    /// is gone.
    pub fn fail_all(&self) -> usize {
        let drained: Vec<Waiter> = self.lock().drain().map(|(_, tx)| tx).collect();
        let count = drained.len();
        for tx in drained {
            let _ = tx.send(Err(ObsError::ConnectionClosed));
        }
        if count > 0 {
            warn!("Failed {} pending OBS request(s) after losing the connection", count);
        }
        count
    }

    pub fn pending_count(&self) -> usize {
        self.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::RequestStatus;
    use std::collections::HashSet;
    use std::sync::Arc;

    fn ok_response(id: &str) -> ResponsePayload {
        ResponsePayload {
            request_type: "Test".into(),
            request_id: id.into(),
            request_status: RequestStatus {
                result: true,
                code: 100,
                comment: None,
            },
            response_data: Some(serde_json::json!({ "id": id })),
        }
    }

    #[tokio::test]
    async fn thousand_concurrent_registrations_get_unique_ids() {
        let correlator = Arc::new(Correlator::new());
        let mut handles = Vec::new();
        for _ in 0..1000 {
            let c = correlator.clone();
            handles.push(tokio::spawn(async move { c.register() }));
        }
        let mut ids = HashSet::new();
        let mut receivers = Vec::new();
        for handle in handles {
            let (id, rx) = handle.await.unwrap();
            assert!(ids.insert(id.clone()), "duplicate id {}", id);
            receivers.push((id, rx));
        }
        assert_eq!(correlator.pending_count(), 1000);

        for (id, _) in receivers.iter().rev() {
            assert!(correlator.resolve(ok_response(id)));
        }
        for (id, rx) in receivers {
            let response = rx.await.unwrap().unwrap();
            assert_eq!(response.request_id, id);
        }
        assert_eq!(correlator.pending_count(), 0);
    }

    #[tokio::test]
    async fn resolve_unknown_id_is_ignored() {
        let correlator = Correlator::new();
        assert!(!correlator.resolve(ok_response("req-999")));
    }

    #[tokio::test]
    async fn fail_all_errors_every_waiter() {
        let correlator = Correlator::new();
        let receivers: Vec<_> = (0..5).map(|_| correlator.register().1).collect();
        assert_eq!(correlator.fail_all(), 5);
        for rx in receivers {
            assert!(matches!(rx.await.unwrap(), Err(ObsError::ConnectionClosed)));
        }
        assert_eq!(correlator.fail_all(), 0);
    }

    #[tokio::test]
    async fn cancelled_request_is_not_resolved() {
        let correlator = Correlator::new();
        let (id, mut rx) = correlator.register();
        assert!(correlator.cancel(&id));
        assert!(!correlator.resolve(ok_response(&id)));
        assert!(rx.try_recv().is_err());
    }
}
