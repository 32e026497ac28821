use std::thread;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use anyhow::Result;
use chrono::Utc;
use shared::types::ServiceSnapshot;
use crate::config::RegistryConfig;
use crate::store::db::RegistryDb;

/// Commands sent to the registry thread
pub enum RegistryCommand {
    Register {
        name: String,
        address: String,
        reply: oneshot::Sender<Result<i64>>,
    },
    List(oneshot::Sender<Result<Vec<ServiceSnapshot>>>),
    Get {
        name: String,
        reply: oneshot::Sender<Result<Option<ServiceSnapshot>>>,
    },
    PurgeExpired(oneshot::Sender<Result<u64>>),
    Shutdown,
}

/// Handle to the registry. The registry thread owns the store exclusively,
/// so every mutation is serialized: concurrent registrations of one name
/// resolve last-writer-wins to a single record.
#[derive(Clone)]
pub struct RegistryHandle {
    tx: mpsc::Sender<RegistryCommand>,
}

impl RegistryHandle {
    /// Spawn a new registry thread owning the given database
    pub fn spawn(db: RegistryDb, config: RegistryConfig) -> Self {
        let (tx, mut rx) = mpsc::channel::<RegistryCommand>(256);
        let liveness_timeout_secs = config.liveness_timeout_secs;
        let expiry_timeout_secs = config.expiry_timeout_secs;

        // Expired rows are removed before every read so that stale entries
        // never appear in results, whether or not the sweeper has run.
        let purge_before_read = move |db: &RegistryDb| {
            match db.purge_expired(expiry_timeout_secs) {
                Ok(0) => {}
                Ok(removed) => tracing::debug!("Purged {} expired service(s)", removed),
                Err(e) => tracing::error!("Failed to purge expired services: {}", e),
            }
        };

        thread::spawn(move || {
            while let Some(cmd) = rx.blocking_recv() {
                match cmd {
                    RegistryCommand::Register { name, address, reply } => {
                        let result = db.upsert_service(&name, &address, Utc::now());
                        let _ = reply.send(result);
                    }
                    RegistryCommand::List(reply) => {
                        purge_before_read(&db);
                        let now = Utc::now();
                        let result = db.get_all_services().map(|records| {
                            records
                                .into_iter()
                                .map(|r| r.snapshot_at(now, liveness_timeout_secs))
                                .collect()
                        });
                        let _ = reply.send(result);
                    }
                    RegistryCommand::Get { name, reply } => {
                        purge_before_read(&db);
                        let now = Utc::now();
                        let result = db.get_service(&name).map(|record| {
                            record.map(|r| r.snapshot_at(now, liveness_timeout_secs))
                        });
                        let _ = reply.send(result);
                    }
                    RegistryCommand::PurgeExpired(reply) => {
                        let result = db.purge_expired(expiry_timeout_secs);
                        let _ = reply.send(result);
                    }
                    RegistryCommand::Shutdown => {
                        tracing::info!("Registry thread shutting down");
                        break;
                    }
                }
            }
        });

        Self { tx }
    }

    /// Register a service or refresh its heartbeat. Returns the record id.
    pub async fn register(&self, name: String, address: String) -> Result<i64> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(RegistryCommand::Register { name, address, reply })
            .await?;
        rx.await?
    }

    /// List every non-expired service with its derived status
    pub async fn list(&self) -> Result<Vec<ServiceSnapshot>> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(RegistryCommand::List(reply)).await?;
        rx.await?
    }

    /// Look up a single non-expired service by exact name
    pub async fn get(&self, name: String) -> Result<Option<ServiceSnapshot>> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(RegistryCommand::Get { name, reply }).await?;
        rx.await?
    }

    /// Remove every expired service, returning the count removed
    pub async fn purge_expired(&self) -> Result<u64> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(RegistryCommand::PurgeExpired(reply)).await?;
        rx.await?
    }

    /// Shutdown the registry thread
    pub async fn shutdown(&self) -> Result<()> {
        self.tx.send(RegistryCommand::Shutdown).await?;
        Ok(())
    }
}

/// Periodic purge loop. Read traffic already purges before every listing;
/// this only keeps the store from accumulating rows while reads are idle.
pub async fn run_sweeper(
    registry: RegistryHandle,
    config: RegistryConfig,
    cancel: CancellationToken,
) -> Result<()> {
    let mut interval = tokio::time::interval(
        std::time::Duration::from_secs(config.sweep_interval_secs)
    );

    loop {
        tokio::select! {
            _ = interval.tick() => {
                match registry.purge_expired().await {
                    Ok(0) => {}
                    Ok(removed) => tracing::info!("Sweeper purged {} expired service(s)", removed),
                    Err(e) => tracing::error!("Sweeper failed to purge: {}", e),
                }
            }
            _ = cancel.cancelled() => {
                tracing::info!("Sweeper shutting down");
                break;
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use shared::types::ServiceStatus;

    fn test_config(liveness_timeout_secs: u64, expiry_timeout_secs: u64) -> RegistryConfig {
        RegistryConfig {
            liveness_timeout_secs,
            expiry_timeout_secs,
            sweep_interval_secs: 60,
        }
    }

    fn spawn_registry(liveness: u64, expiry: u64) -> RegistryHandle {
        let db = RegistryDb::open(":memory:").unwrap();
        RegistryHandle::spawn(db, test_config(liveness, expiry))
    }

    #[tokio::test]
    async fn test_register_then_get_roundtrip() {
        let registry = spawn_registry(60, 60);

        registry
            .register("svcA".to_string(), "10.0.0.1:80".to_string())
            .await
            .unwrap();

        let snapshot = registry.get("svcA".to_string()).await.unwrap().unwrap();
        assert_eq!(snapshot.name, "svcA");
        assert_eq!(snapshot.address, "10.0.0.1:80");
        assert_eq!(snapshot.status, ServiceStatus::Up);
    }

    #[tokio::test]
    async fn test_reregistration_updates_in_place() {
        let registry = spawn_registry(60, 60);

        let first = registry
            .register("svcA".to_string(), "10.0.0.1:80".to_string())
            .await
            .unwrap();
        let second = registry
            .register("svcA".to_string(), "10.0.0.2:80".to_string())
            .await
            .unwrap();
        assert_eq!(first, second);

        let services = registry.list().await.unwrap();
        assert_eq!(services.len(), 1);
        assert_eq!(services[0].address, "10.0.0.2:80");
    }

    #[tokio::test]
    async fn test_get_unknown_returns_none() {
        let registry = spawn_registry(60, 60);
        assert!(registry.get("unknown".to_string()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_silent_service_reports_down_but_stays_listed() {
        let db = RegistryDb::open(":memory:").unwrap();
        db.upsert_service("svcA", "10.0.0.1:80", Utc::now() - Duration::seconds(61))
            .unwrap();
        // Expiry far beyond liveness: the record is DOWN yet retained
        let registry = RegistryHandle::spawn(db, test_config(60, 3600));

        let snapshot = registry.get("svcA".to_string()).await.unwrap().unwrap();
        assert_eq!(snapshot.status, ServiceStatus::Down);

        let services = registry.list().await.unwrap();
        assert_eq!(services.len(), 1);
    }

    #[tokio::test]
    async fn test_expired_service_purged_from_reads() {
        let db = RegistryDb::open(":memory:").unwrap();
        db.upsert_service("svcA", "10.0.0.1:80", Utc::now() - Duration::seconds(120))
            .unwrap();
        let registry = RegistryHandle::spawn(db, test_config(60, 60));

        assert!(registry.list().await.unwrap().is_empty());
        assert!(registry.get("svcA".to_string()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_explicit_purge_counts_and_is_idempotent() {
        let db = RegistryDb::open(":memory:").unwrap();
        db.upsert_service("svcA", "10.0.0.1:80", Utc::now() - Duration::seconds(120))
            .unwrap();
        db.upsert_service("svcB", "10.0.0.2:80", Utc::now())
            .unwrap();
        let registry = RegistryHandle::spawn(db, test_config(60, 60));

        assert_eq!(registry.purge_expired().await.unwrap(), 1);
        assert_eq!(registry.purge_expired().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_concurrent_same_name_registrations() {
        let registry = spawn_registry(60, 60);

        let r1 = registry.clone();
        let r2 = registry.clone();
        let t1 = tokio::spawn(async move {
            r1.register("svcA".to_string(), "10.0.0.1:80".to_string()).await
        });
        let t2 = tokio::spawn(async move {
            r2.register("svcA".to_string(), "10.0.0.2:80".to_string()).await
        });
        t1.await.unwrap().unwrap();
        t2.await.unwrap().unwrap();

        let services = registry.list().await.unwrap();
        assert_eq!(services.len(), 1, "Exactly one record per name");
        assert!(
            services[0].address == "10.0.0.1:80" || services[0].address == "10.0.0.2:80",
            "Surviving record must match one of the two registrations"
        );
    }
}
