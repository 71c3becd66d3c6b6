//! Speech synthesis boundary (spec §1: "edge-TTS synthesis" is an external
//! collaborator) and the `/speech` MP3 cache (spec §4.3) keyed by
//! `(text, voice, rate)`. Mirrors `eva_model::ModelClient`'s shape: a narrow
//! async capability trait via RPITIT, a real HTTP-backed implementation, and a
//! mock for tests — the same pattern the model boundary uses, applied to a
//! second external collaborator.

use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum SynthesisError {
    #[error("tts request failed: {0}")]
    RequestFailed(String),
    #[error("tts endpoint returned an invalid response: {0}")]
    InvalidResponse(String),
}

/// `{complete(ctx)→msg}`'s speech analogue: any implementation satisfying this
/// contract (mocked in tests) works (spec §9).
pub trait Synthesizer: Send + Sync {
    fn synthesize(&self, text: &str, voice: &str, rate: &str) -> impl Future<Output = Result<Vec<u8>, SynthesisError>> + Send;
}

const DEFAULT_TIMEOUT_SECS: u64 = 20;

/// Talks to an external edge-TTS-shaped HTTP endpoint: POST `{text,voice,rate}`,
/// response body is the raw MP3 bytes.
pub struct HttpSynthesizer {
    endpoint: String,
    client: reqwest::Client,
}

impl HttpSynthesizer {
    pub fn new(endpoint: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .unwrap_or_default();
        Self { endpoint, client }
    }

    /// `None` when `EVA_TTS_ENDPOINT` is unset — the caller (the Orchestrator's
    /// `main`) decides whether `/speech` is served at all in that case.
    pub fn from_env() -> Option<Self> {
        let endpoint = std::env::var("EVA_TTS_ENDPOINT").ok()?;
        Some(Self::new(endpoint))
    }
}

impl Synthesizer for HttpSynthesizer {
    async fn synthesize(&self, text: &str, voice: &str, rate: &str) -> Result<Vec<u8>, SynthesisError> {
        let resp = self
            .client
            .post(&self.endpoint)
            .json(&serde_json::json!({ "text": text, "voice": voice, "rate": rate }))
            .send()
            .await
            .map_err(|e| SynthesisError::RequestFailed(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(SynthesisError::RequestFailed(format!("http {status}: {body}")));
        }

        resp.bytes()
            .await
            .map(|b| b.to_vec())
            .map_err(|e| SynthesisError::InvalidResponse(e.to_string()))
    }
}

/// Scripted synthesizer for tests.
pub struct MockSynthesizer {
    pub bytes: Vec<u8>,
}

impl Synthesizer for MockSynthesizer {
    async fn synthesize(&self, _text: &str, _voice: &str, _rate: &str) -> Result<Vec<u8>, SynthesisError> {
        Ok(self.bytes.clone())
    }
}

/// Bounded cache of synthesized MP3 bytes keyed by `(text, voice, rate)`.
/// Eviction is insertion-order (oldest-first) once `capacity` is exceeded —
/// the spec only requires a cache, not a specific replacement policy.
pub struct TtsCache {
    capacity: usize,
    entries: Mutex<(HashMap<(String, String, String), Vec<u8>>, VecDeque<(String, String, String)>)>,
}

impl TtsCache {
    pub fn new(capacity: usize) -> Self {
        Self { capacity, entries: Mutex::new((HashMap::new(), VecDeque::new())) }
    }

    pub fn get(&self, text: &str, voice: &str, rate: &str) -> Option<Vec<u8>> {
        let (map, _) = &*self.entries.lock().expect("tts cache mutex poisoned");
        map.get(&(text.to_string(), voice.to_string(), rate.to_string())).cloned()
    }

    pub fn put(&self, text: String, voice: String, rate: String, bytes: Vec<u8>) {
        let mut guard = self.entries.lock().expect("tts cache mutex poisoned");
        let (map, order) = &mut *guard;
        let key = (text, voice, rate);
        if !map.contains_key(&key) {
            order.push_back(key.clone());
        }
        map.insert(key, bytes);
        while order.len() > self.capacity {
            if let Some(oldest) = order.pop_front() {
                map.remove(&oldest);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_hits_on_identical_key() {
        let cache = TtsCache::new(2);
        cache.put("hi".into(), "v1".into(), "+0%".into(), vec![1, 2, 3]);
        assert_eq!(cache.get("hi", "v1", "+0%"), Some(vec![1, 2, 3]));
        assert_eq!(cache.get("hi", "v2", "+0%"), None);
    }

    #[test]
    fn cache_evicts_oldest_beyond_capacity() {
        let cache = TtsCache::new(1);
        cache.put("a".into(), "v".into(), "r".into(), vec![1]);
        cache.put("b".into(), "v".into(), "r".into(), vec![2]);
        assert_eq!(cache.get("a", "v", "r"), None);
        assert_eq!(cache.get("b", "v", "r"), Some(vec![2]));
    }
}
