//! Deterministic hash-based embedding (spec §4.7): a signed-hash sketch over the
//! tokens of `text + tags`, fixed at 64 dimensions. No model call, no external
//! crate — just an FNV-like rolling hash, the same "stable id/vector from content"
//! idiom the teacher uses for its own content hashes.

use std::sync::OnceLock;

/// Fixed embedding dimensionality (spec §3, §4.7).
pub const EMBEDDING_DIM: usize = 64;

const FNV_OFFSET_BASIS: u32 = 2166136261;
const FNV_PRIME: u32 = 16777619;

fn token_regex() -> &'static regex::Regex {
    static RE: OnceLock<regex::Regex> = OnceLock::new();
    RE.get_or_init(|| regex::Regex::new(r"[a-z0-9_]+").expect("static token pattern is valid"))
}

fn fnv_hash(token: &str) -> u32 {
    let mut h = FNV_OFFSET_BASIS;
    for byte in token.as_bytes() {
        h ^= *byte as u32;
        h = h.wrapping_mul(FNV_PRIME);
    }
    h
}

/// Embed `text` combined with `tags` into a 64-dim L2-normalized vector, values
/// retained to 6 decimal places. Deterministic: `embed(x) == embed(x)` bitwise.
pub fn embed(text: &str, tags: &[String]) -> Vec<f32> {
    let joined = format!("{text}\n{}", tags.join(" "));
    let lower = joined.to_lowercase();

    let mut buckets = [0f32; EMBEDDING_DIM];
    for m in token_regex().find_iter(&lower) {
        let hash = fnv_hash(m.as_str());
        let idx = (hash as usize) % EMBEDDING_DIM;
        // Use the next hash bit to decide the sign so that tokens landing in the
        // same bucket do not always cancel each other out.
        if hash & 1 == 0 {
            buckets[idx] += 1.0;
        } else {
            buckets[idx] -= 1.0;
        }
    }

    let norm = buckets.iter().map(|v| v * v).sum::<f32>().sqrt();
    let mut out = vec![0f32; EMBEDDING_DIM];
    if norm > 0.0 {
        for (i, v) in buckets.iter().enumerate() {
            out[i] = round6(v / norm);
        }
    }
    out
}

fn round6(v: f32) -> f32 {
    (v * 1_000_000.0).round() / 1_000_000.0
}

/// Cosine similarity between two same-length vectors. Returns 0.0 for a zero
/// vector on either side (rather than dividing by zero).
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|v| v * v).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedding_is_deterministic() {
        let a = embed("near collision at the front door", &["safety".to_string()]);
        let b = embed("near collision at the front door", &["safety".to_string()]);
        assert_eq!(a, b);
    }

    #[test]
    fn embedding_is_unit_norm_or_zero() {
        let v = embed("hello world", &[]);
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5 || norm == 0.0);
    }

    #[test]
    fn empty_text_and_tags_yields_zero_vector() {
        let v = embed("", &[]);
        assert!(v.iter().all(|x| *x == 0.0));
    }

    #[test]
    fn dimension_is_fixed_at_64() {
        assert_eq!(embed("anything at all", &[]).len(), EMBEDDING_DIM);
    }

    #[test]
    fn cosine_of_identical_vectors_is_one() {
        let v = embed("the cat sat on the mat", &["chat".to_string()]);
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-4);
    }
}
