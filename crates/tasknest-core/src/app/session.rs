//! DocumentSession - 共有ドキュメントのセッション
//!
//! # 学習ポイント
//! - Builder パターンで依存（StateStore / Environment / IdGenerator）を注入する
//! - `OnceCell::get_or_try_init` による single-flight 初期化
//!   （「未設定ならセット」というフラグを await をまたいで使わない）
//! - 初期化失敗はセルを空のまま残すので、次の呼び出しが再試行になる
//!
//! # 初期化の順序
//! 1. 永続化から全状態をロード（失敗は致命的）
//! 2. 環境に応じてトランスポートを選択して接続（失敗はログのみ）

use std::sync::Arc;

use tokio::sync::{Mutex, OnceCell, watch};
use tracing::{info, warn};

use super::config::StoreConfig;
use super::persistence::PersistenceBinding;
use super::transport::{Environment, Transport, TransportKind, TransportStatus};
use crate::domain::StoreError;
use crate::impls::MemorySettings;
use crate::ports::{IdGenerator, RandomIdGenerator, StateStore};
use crate::replica::{ActorId, Document, Replica};

/// BuildError はセッション構築時のエラー
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("no state store configured; a session needs durable storage")]
    MissingStateStore,
}

/// # 使用例
/// ```ignore
/// let sessions = DocumentSession::builder()
///     .state_store(Arc::new(FileStateStore::new(".tasknest")))
///     .environment(Environment::local(settings))
///     .build()?;
/// let session = sessions.ensure_session().await?;
/// ```
pub struct SessionBuilder {
    config: StoreConfig,
    store: Option<Arc<dyn StateStore>>,
    environment: Option<Environment>,
    ids: Arc<dyn IdGenerator>,
}

impl SessionBuilder {
    pub fn new() -> Self {
        Self {
            config: StoreConfig::default(),
            store: None,
            environment: None,
            ids: Arc::new(RandomIdGenerator),
        }
    }

    pub fn config(mut self, config: StoreConfig) -> Self {
        self.config = config;
        self
    }

    pub fn state_store(mut self, store: Arc<dyn StateStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Defaults to no host, no mesh and in-memory settings.
    pub fn environment(mut self, environment: Environment) -> Self {
        self.environment = Some(environment);
        self
    }

    pub fn id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = ids;
        self
    }

    pub fn build(self) -> Result<DocumentSession, BuildError> {
        let store = self.store.ok_or(BuildError::MissingStateStore)?;
        let environment = self
            .environment
            .unwrap_or_else(|| Environment::local(Arc::new(MemorySettings::new())));
        Ok(DocumentSession {
            config: self.config,
            store,
            environment,
            ids: self.ids,
            session: OnceCell::new(),
        })
    }
}

impl Default for SessionBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Owns the process's single document. Build one at the application root and share it.
pub struct DocumentSession {
    config: StoreConfig,
    store: Arc<dyn StateStore>,
    environment: Environment,
    ids: Arc<dyn IdGenerator>,
    session: OnceCell<Arc<Session>>,
}

impl DocumentSession {
    pub fn builder() -> SessionBuilder {
        SessionBuilder::new()
    }

    /// The ready session. Concurrent callers share one initialization; after a failed
    /// one the next call starts over.
    pub async fn ensure_session(&self) -> Result<Arc<Session>, StoreError> {
        self.session
            .get_or_try_init(|| self.initialize())
            .await
            .cloned()
    }

    pub fn is_ready(&self) -> bool {
        self.session.initialized()
    }

    /// Detach the transport of the session, if one was started.
    pub async fn shutdown(&self) {
        if let Some(session) = self.session.get() {
            session.shutdown().await;
        }
    }

    async fn initialize(&self) -> Result<Arc<Session>, StoreError> {
        let actor = ActorId::random();
        let persistence = Arc::new(PersistenceBinding::new(self.store.clone(), &self.config));
        let replica = Arc::new(Replica::with_persistence(
            Document::new(actor),
            persistence.clone(),
        ));

        let records = persistence.load(&replica).await.inspect_err(|e| {
            warn!(namespace = persistence.namespace(), error = %e, "session initialization failed");
        })?;

        let transport =
            Transport::attach(&self.environment, replica.clone(), &self.config.transport).await;
        info!(
            ?actor,
            records,
            transport = ?transport.kind(),
            "document session ready"
        );

        Ok(Arc::new(Session {
            replica,
            ids: self.ids.clone(),
            kind: transport.kind(),
            status: transport.watch_status(),
            transport: Mutex::new(Some(transport)),
        }))
    }
}

/// An initialized session: the loaded replica and its attached transport.
pub struct Session {
    replica: Arc<Replica>,
    ids: Arc<dyn IdGenerator>,
    kind: TransportKind,
    status: watch::Receiver<TransportStatus>,
    transport: Mutex<Option<Transport>>,
}

impl Session {
    pub fn replica(&self) -> &Arc<Replica> {
        &self.replica
    }

    pub fn ids(&self) -> &dyn IdGenerator {
        self.ids.as_ref()
    }

    pub fn transport_kind(&self) -> TransportKind {
        self.kind
    }

    pub fn transport_status(&self) -> TransportStatus {
        self.status.borrow().clone()
    }

    /// Detach the transport and wait for its loops. Idempotent.
    pub async fn shutdown(&self) {
        if let Some(transport) = self.transport.lock().await.take() {
            transport.detach().await;
        }
    }
}
