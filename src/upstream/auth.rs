//! Process-wide authentication lease for the upstream backend.

use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct Lease {
    pub token: String,
    pub token_type: String,
    pub expires_at: Instant,
}

impl Lease {
    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

pub const LEASE_TTL: Duration = Duration::from_secs(30 * 60);
