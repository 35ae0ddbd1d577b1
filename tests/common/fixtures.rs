// Test fixtures and data generators for integration tests

use chrono::{DateTime, Duration, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Deterministic audit record generator for reproducible tests
pub struct AuditPayloadGenerator {
    rng: StdRng,
}

impl AuditPayloadGenerator {
    /// Creates a new generator with a fixed seed for reproducibility
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Generates `count` JSON lines with timestamps spread over `[start, end]`
    pub fn jsonl(&mut self, count: usize, start: DateTime<Utc>, end: DateTime<Utc>) -> Vec<u8> {
        let span = (end - start).num_seconds().max(1);
        let mut out = Vec::new();
        for i in 0..count {
            let at = start + Duration::seconds(self.rng.gen_range(0..=span));
            let line = serde_json::json!({
                "seq": i,
                "timestamp": at.to_rfc3339(),
                "user_id": format!("user-{}", self.rng.gen_range(1..500)),
                "action": ACTIONS[self.rng.gen_range(0..ACTIONS.len())],
                "source_ip": format!("10.0.{}.{}", self.rng.gen_range(0..255), self.rng.gen_range(1..255)),
            });
            out.extend_from_slice(line.to_string().as_bytes());
            out.push(b'\n');
        }
        out
    }

    /// Generates incompressible bytes of specified length
    pub fn random_bytes(&mut self, len: usize) -> Vec<u8> {
        let mut bytes = vec![0u8; len];
        self.rng.fill(&mut bytes[..]);
        bytes
    }
}

impl Default for AuditPayloadGenerator {
    fn default() -> Self {
        Self::new(42)
    }
}

const ACTIONS: [&str; 5] = [
    "login_success",
    "login_failure",
    "key_rotated",
    "role_granted",
    "export_requested",
];
