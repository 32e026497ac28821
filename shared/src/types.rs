use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// A registered service as stored by the registry.
/// This is the canonical data model used by the daemon, API, and any client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceRecord {
    /// Stable identifier assigned at first registration, never reused
    pub id: i64,

    /// Unique service name, e.g. "billing-api"
    pub name: String,

    /// Last-reported network address, e.g. "10.0.0.12:8080"
    pub address: String,

    /// Time of the most recent registration call
    pub last_heartbeat: DateTime<Utc>,
}

/// Liveness status derived from the heartbeat age at read time.
/// Never persisted; the stored heartbeat is the single source of truth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServiceStatus {
    #[serde(rename = "UP")]
    Up,
    #[serde(rename = "DOWN")]
    Down,
}

impl std::fmt::Display for ServiceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServiceStatus::Up => write!(f, "UP"),
            ServiceStatus::Down => write!(f, "DOWN"),
        }
    }
}

/// A record together with its status as derived at one read instant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceSnapshot {
    pub id: i64,
    pub name: String,
    pub address: String,
    pub status: ServiceStatus,
    pub last_heartbeat: DateTime<Utc>,
}

impl ServiceRecord {
    /// Status at `now`: `Up` while the heartbeat is younger than the
    /// liveness timeout, `Down` from the moment it reaches it.
    pub fn status_at(&self, now: DateTime<Utc>, liveness_timeout_secs: u64) -> ServiceStatus {
        let age = now.signed_duration_since(self.last_heartbeat);
        if age < Duration::seconds(liveness_timeout_secs as i64) {
            ServiceStatus::Up
        } else {
            ServiceStatus::Down
        }
    }

    /// Whether the record is eligible for permanent removal at `now`.
    pub fn expired_at(&self, now: DateTime<Utc>, expiry_timeout_secs: u64) -> bool {
        let age = now.signed_duration_since(self.last_heartbeat);
        age >= Duration::seconds(expiry_timeout_secs as i64)
    }

    pub fn snapshot_at(self, now: DateTime<Utc>, liveness_timeout_secs: u64) -> ServiceSnapshot {
        let status = self.status_at(now, liveness_timeout_secs);
        ServiceSnapshot {
            id: self.id,
            name: self.name,
            address: self.address,
            status,
            last_heartbeat: self.last_heartbeat,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record_aged(secs: i64) -> ServiceRecord {
        ServiceRecord {
            id: 1,
            name: "svcA".to_string(),
            address: "10.0.0.1:80".to_string(),
            last_heartbeat: Utc::now() - Duration::seconds(secs),
        }
    }

    #[test]
    fn test_fresh_heartbeat_is_up() {
        let record = record_aged(10);
        assert_eq!(record.status_at(Utc::now(), 60), ServiceStatus::Up);
    }

    #[test]
    fn test_old_heartbeat_is_down() {
        let record = record_aged(61);
        assert_eq!(record.status_at(Utc::now(), 60), ServiceStatus::Down);
    }

    #[test]
    fn test_heartbeat_at_exact_timeout_is_down() {
        let now = Utc::now();
        let record = ServiceRecord {
            last_heartbeat: now - Duration::seconds(60),
            ..record_aged(0)
        };
        assert_eq!(record.status_at(now, 60), ServiceStatus::Down);
    }

    #[test]
    fn test_expiry_at_exact_timeout() {
        let now = Utc::now();
        let record = ServiceRecord {
            last_heartbeat: now - Duration::seconds(60),
            ..record_aged(0)
        };
        assert!(record.expired_at(now, 60));
        assert!(!record.expired_at(now, 61));
    }

    #[test]
    fn test_status_serializes_uppercase() {
        let up = serde_json::to_string(&ServiceStatus::Up).unwrap();
        assert_eq!(up, "\"UP\"");
        let down = serde_json::to_string(&ServiceStatus::Down).unwrap();
        assert_eq!(down, "\"DOWN\"");
    }
}
