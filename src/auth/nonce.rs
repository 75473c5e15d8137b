//! Used-nonce registry for sign-in replay protection.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

/// Remembers each nonce until its TTL elapses.
pub struct NonceRegistry {
    ttl: Duration,
    /// nonce -> expiry
    seen: DashMap<[u8; 32], Instant>,
}

impl NonceRegistry {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            seen: DashMap::new(),
        }
    }

    /// Store `nonce`. Returns `false` if it was already used and has not
    /// expired.
    pub fn check_and_store(&self, nonce: [u8; 32]) -> bool {
        self.check_and_store_at(nonce, Instant::now())
    }

    pub fn check_and_store_at(&self, nonce: [u8; 32], now: Instant) -> bool {
        match self.seen.entry(nonce) {
            Entry::Occupied(mut entry) => {
                if *entry.get() > now {
                    return false;
                }
                entry.insert(now + self.ttl);
                true
            }
            Entry::Vacant(entry) => {
                entry.insert(now + self.ttl);
                true
            }
        }
    }

    pub fn purge_expired(&self) -> usize {
        self.purge_expired_at(Instant::now())
    }

    pub fn purge_expired_at(&self, now: Instant) -> usize {
        let before = self.seen.len();
        self.seen.retain(|_, expiry| *expiry > now);
        before.saturating_sub(self.seen.len())
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    pub fn spawn_sweeper(
        self: &Arc<Self>,
        every: Duration,
        mut shutdown: broadcast::Receiver<()>,
    ) -> JoinHandle<()> {
        let registry = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let removed = registry.purge_expired();
                        if removed > 0 {
                            tracing::debug!(removed, "Purged expired nonces");
                        }
                    }
                    _ = shutdown.recv() => break,
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reuse_rejected_until_expiry() {
        let registry = NonceRegistry::new(Duration::from_secs(60));
        let t0 = Instant::now();

        assert!(registry.check_and_store_at([1; 32], t0));
        assert!(registry.check_and_store_at([2; 32], t0));
        assert!(!registry.check_and_store_at([1; 32], t0 + Duration::from_secs(59)));
        assert!(registry.check_and_store_at([1; 32], t0 + Duration::from_secs(61)));
    }

    #[test]
    fn test_purge() {
        let registry = NonceRegistry::new(Duration::from_secs(10));
        let t0 = Instant::now();
        registry.check_and_store_at([1; 32], t0);
        registry.check_and_store_at([2; 32], t0 + Duration::from_secs(5));

        assert_eq!(registry.purge_expired_at(t0 + Duration::from_secs(11)), 1);
        assert_eq!(registry.len(), 1);
    }
}
