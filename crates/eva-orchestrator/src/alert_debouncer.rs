//! Alert debouncer (spec §4.5, §9): suppresses repeated high-severity alerts.
//! Two independent rules apply together: a per-dedupe-key 60s window (at most
//! one fire per key per window) and a global ≥10s cooldown between any two
//! fires regardless of key. Separate from insight-relay suppression elsewhere
//! in the pipeline.

use std::collections::HashMap;
use std::sync::Mutex;

struct State {
    last_fired_by_key: HashMap<String, i64>,
    last_fired_any_ms: Option<i64>,
}

pub struct AlertDebouncer {
    state: Mutex<State>,
    dedupe_window_ms: i64,
    cooldown_ms: i64,
}

impl AlertDebouncer {
    pub fn new(dedupe_window_ms: i64, cooldown_ms: i64) -> Self {
        Self {
            state: Mutex::new(State { last_fired_by_key: HashMap::new(), last_fired_any_ms: None }),
            dedupe_window_ms,
            cooldown_ms,
        }
    }

    /// Dedupe key for a scene insight: `insight:<clip_id>`.
    pub fn insight_key(clip_id: &str) -> String {
        format!("insight:{clip_id}")
    }

    /// Dedupe key for a detection event: `event:<name>:<track_id|na>`.
    pub fn event_key(name: &str, track_id: Option<i64>) -> String {
        match track_id {
            Some(id) => format!("event:{name}:{id}"),
            None => format!("event:{name}:na"),
        }
    }

    /// Returns `true` iff this alert should fire now, recording the fire as a
    /// side effect. Both the per-key window and the global cooldown must
    /// admit the fire.
    pub fn should_fire(&self, key: &str, now_ms: i64) -> bool {
        let mut state = self.state.lock().expect("alert debouncer mutex poisoned");

        if let Some(last_any) = state.last_fired_any_ms {
            if now_ms - last_any < self.cooldown_ms {
                return false;
            }
        }
        if let Some(last_key) = state.last_fired_by_key.get(key) {
            if now_ms - *last_key < self.dedupe_window_ms {
                return false;
            }
        }

        state.last_fired_by_key.insert(key.to_string(), now_ms);
        state.last_fired_any_ms = Some(now_ms);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_key_within_window_is_suppressed() {
        let d = AlertDebouncer::new(60_000, 10_000);
        assert!(d.should_fire("insight:c1", 0));
        assert!(!d.should_fire("insight:c1", 20_000));
    }

    #[test]
    fn different_key_still_respects_global_cooldown() {
        let d = AlertDebouncer::new(60_000, 10_000);
        assert!(d.should_fire("insight:c1", 0));
        assert!(!d.should_fire("event:roi_dwell:3", 5_000));
        assert!(d.should_fire("event:roi_dwell:3", 11_000));
    }

    #[test]
    fn key_fires_again_after_window_and_cooldown_elapse() {
        let d = AlertDebouncer::new(60_000, 10_000);
        assert!(d.should_fire("insight:c1", 0));
        assert!(d.should_fire("insight:c1", 61_000));
    }
}
