//! Frame route table (spec §4.4, §9): a transient `frame_id → route` map with a
//! 5s TTL, evicted on every mutation. Generalizes the teacher's dashboard
//! broadcast fan-out (one `AppState` serving many subscribers) down to the
//! narrower single-UI-client case this system requires — since at most one UI
//! socket exists at a time (`SINGLE_CLIENT_ONLY` enforced at connect), the
//! route only needs to remember that a `frame_id` is outstanding, not which
//! client it belongs to.

use std::collections::HashMap;
use std::sync::Mutex;

struct Route {
    created_at_ms: i64,
}

/// Scoped to one server instance, torn down on close (spec §9).
pub struct FrameRouter {
    routes: Mutex<HashMap<String, Route>>,
    ttl_ms: i64,
}

impl FrameRouter {
    pub fn new(ttl_ms: i64) -> Self {
        Self { routes: Mutex::new(HashMap::new()), ttl_ms }
    }

    fn evict_expired_locked(routes: &mut HashMap<String, Route>, now_ms: i64, ttl_ms: i64) {
        routes.retain(|_, route| now_ms - route.created_at_ms < ttl_ms);
    }

    /// Register `frame_id` as awaiting a Detector reply. Evicts expired routes
    /// first, per spec: "evict expired entries on every mutation."
    pub fn insert(&self, frame_id: String, now_ms: i64) {
        let mut routes = self.routes.lock().expect("frame router mutex poisoned");
        Self::evict_expired_locked(&mut routes, now_ms, self.ttl_ms);
        routes.insert(frame_id, Route { created_at_ms: now_ms });
    }

    /// Resolve and evict the route for `frame_id`. Returns `true` if a
    /// non-expired route existed — the caller's signal to forward the
    /// Detector's reply to the UI. An orphaned reply after the TTL is dropped
    /// (spec §5: "an orphaned frame_id reply after 5s is dropped").
    pub fn take(&self, frame_id: &str, now_ms: i64) -> bool {
        let mut routes = self.routes.lock().expect("frame router mutex poisoned");
        Self::evict_expired_locked(&mut routes, now_ms, self.ttl_ms);
        routes.remove(frame_id).is_some()
    }

    /// Drop all routes — called when the UI disconnects (spec §4.4).
    pub fn clear(&self) {
        self.routes.lock().expect("frame router mutex poisoned").clear();
    }
}
