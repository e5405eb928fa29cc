//! Sync transports.
//!
//! The kind (`Bridge`, `Mesh` or `None`) is chosen once, when the session is built.
//! Attaching is best effort: failures are logged and kept in [`TransportStatus`],
//! the session starts either way.

mod bridge;
pub mod mesh;
pub mod tasks;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{info, warn};

use super::config::TransportConfig;
use super::retry::RetryPolicy;
use crate::domain::TransportError;
use crate::ports::{HostChannel, MeshNetwork, SettingsStore, SharingSettings};
use crate::replica::Replica;

pub use self::mesh::MeshMessage;
pub use self::tasks::SyncTasks;

/// Capabilities of the environment the process runs in.
#[derive(Clone)]
pub struct Environment {
    pub host: Option<Arc<dyn HostChannel>>,
    pub mesh: Option<Arc<dyn MeshNetwork>>,
    pub settings: Arc<dyn SettingsStore>,
}

impl Environment {
    /// No host channel and no mesh network.
    pub fn local(settings: Arc<dyn SettingsStore>) -> Self {
        Self {
            host: None,
            mesh: None,
            settings,
        }
    }

    pub fn with_host(mut self, host: Arc<dyn HostChannel>) -> Self {
        self.host = Some(host);
        self
    }

    pub fn with_mesh(mut self, mesh: Arc<dyn MeshNetwork>) -> Self {
        self.mesh = Some(mesh);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    Bridge,
    Mesh,
    None,
}

impl TransportKind {
    /// Bridge when hosted; otherwise Mesh when a network exists and sharing is fully
    /// configured; otherwise None.
    pub fn select(env: &Environment, sharing: &SharingSettings) -> Self {
        if env.host.is_some() {
            TransportKind::Bridge
        } else if env.mesh.is_some() && sharing.active_room().is_some() {
            TransportKind::Mesh
        } else {
            TransportKind::None
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportStatus {
    /// Nothing attached (kind `None`, or after detach).
    Detached,
    Attached(TransportKind),
    Failed { kind: TransportKind, reason: String },
}

/// Timeout and retries around one transport call.
#[derive(Debug, Clone)]
pub(crate) struct AttachPolicy {
    retry: RetryPolicy,
    timeout: Duration,
    resend_interval: Duration,
}

impl AttachPolicy {
    pub(crate) fn from_config(config: &TransportConfig) -> Self {
        Self {
            retry: RetryPolicy::from_config(&config.retry),
            timeout: config.attach_timeout(),
            resend_interval: config.resend_interval(),
        }
    }

    async fn run<T, F, Fut>(&self, op: &'static str, f: F) -> Result<T, TransportError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, TransportError>>,
    {
        self.retry.run(op, self.timeout, f).await
    }
}

/// The attached transport and its loops.
pub struct Transport {
    kind: TransportKind,
    status: Arc<watch::Sender<TransportStatus>>,
    tasks: SyncTasks,
}

impl Transport {
    /// Select and attach. Never fails; see [`Transport::status`].
    pub async fn attach(env: &Environment, replica: Arc<Replica>, config: &TransportConfig) -> Self {
        let sharing = match SharingSettings::load(env.settings.as_ref()).await {
            Ok(sharing) => sharing,
            Err(e) => {
                warn!(error = %e, "cannot read sharing settings, mesh stays off");
                SharingSettings::default()
            }
        };
        let kind = TransportKind::select(env, &sharing);
        let (status, _) = watch::channel(TransportStatus::Detached);
        let mut transport = Transport {
            kind,
            status: Arc::new(status),
            tasks: SyncTasks::new(),
        };

        let policy = AttachPolicy::from_config(config);
        let attached = match (kind, &env.host, &env.mesh, sharing.active_room()) {
            (TransportKind::Bridge, Some(host), _, _) => {
                bridge::attach(
                    host.clone(),
                    replica,
                    policy,
                    transport.status.clone(),
                    &mut transport.tasks,
                )
                .await
            }
            (TransportKind::Mesh, _, Some(network), Some((room, password))) => {
                let room = format!("{}{room}", config.room_prefix);
                mesh::attach(
                    network.clone(),
                    room,
                    password.to_string(),
                    replica,
                    policy,
                    transport.status.clone(),
                    &mut transport.tasks,
                )
                .await
            }
            _ => {
                info!("no sync transport, the session stays local");
                return transport;
            }
        };

        if let Err(e) = attached {
            warn!(?kind, error = %e, "sync transport unavailable, continuing without it");
            transport.status.send_replace(TransportStatus::Failed {
                kind,
                reason: e.to_string(),
            });
        }
        transport
    }

    pub fn kind(&self) -> TransportKind {
        self.kind
    }

    pub fn status(&self) -> TransportStatus {
        self.status.borrow().clone()
    }

    /// Receiver that follows status changes.
    pub fn watch_status(&self) -> watch::Receiver<TransportStatus> {
        self.status.subscribe()
    }

    /// Stop the loops and wait for them.
    pub async fn detach(self) {
        self.tasks.shutdown_and_join().await;
        self.status.send_replace(TransportStatus::Detached);
        info!(kind = ?self.kind, "sync transport detached");
    }
}
