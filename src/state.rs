use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tokio::sync::RwLock;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IpSnapshot {
    pub ip: String,
    pub changed_at: OffsetDateTime,
}

impl IpSnapshot {
    pub fn changed_at_rfc3339(&self) -> String {
        self.changed_at
            .format(&Rfc3339)
            .unwrap_or_else(|_| self.changed_at.unix_timestamp().to_string())
    }
}

/// Last IP address successfully pushed to the provider.
///
/// Comparisons take the read lock, commits take the write lock. Callers only
/// commit once every dependent provider update has succeeded.
#[derive(Debug, Default)]
pub struct IpCache {
    inner: RwLock<Option<IpSnapshot>>,
}

impl IpCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn current(&self) -> Option<String> {
        self.inner.read().await.as_ref().map(|s| s.ip.clone())
    }

    pub async fn is_current(&self, ip: &str) -> bool {
        self.inner
            .read()
            .await
            .as_ref()
            .is_some_and(|s| s.ip == ip)
    }

    /// Stores `ip` if it differs from the cached value. Returns the new
    /// snapshot when something changed.
    pub async fn commit(&self, ip: &str) -> Option<IpSnapshot> {
        let mut guard = self.inner.write().await;
        if guard.as_ref().is_some_and(|s| s.ip == ip) {
            return None;
        }

        let snapshot = IpSnapshot {
            ip: ip.to_string(),
            changed_at: OffsetDateTime::now_utc(),
        };
        *guard = Some(snapshot.clone());
        Some(snapshot)
    }
}
