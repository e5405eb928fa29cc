//! FileStateStore - ファイルベースの永続化
//!
//! # フォーマット
//! namespace ごとに `<dir>/<namespace>.log` を 1 つ持ちます。
//! 各レコードは `u32`（リトルエンディアン）の長さ + 本体です。
//!
//! # 学習ポイント
//! - 同期 I/O は spawn_blocking で実行する
//! - 書き込み途中でクラッシュした末尾レコードは load 時に切り捨てる
//! - replace は一時ファイル → fsync → rename で原子的に置き換える

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::warn;

use crate::domain::PersistenceError;
use crate::ports::StateStore;

const HEADER_LEN: usize = 4;

#[derive(Debug, Clone)]
pub struct FileStateStore {
    dir: PathBuf,
}

impl FileStateStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn log_path(&self, namespace: &str) -> Result<PathBuf, PersistenceError> {
        let valid = !namespace.is_empty()
            && !namespace.starts_with('.')
            && namespace
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
        if !valid {
            return Err(PersistenceError::Unavailable(format!(
                "invalid namespace {namespace:?}"
            )));
        }
        Ok(self.dir.join(format!("{namespace}.log")))
    }
}

async fn blocking<T, F>(f: F) -> Result<T, PersistenceError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, PersistenceError> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| PersistenceError::Unavailable(format!("storage task failed: {e}")))?
}

fn frame(record: &[u8]) -> Result<Vec<u8>, PersistenceError> {
    let len = u32::try_from(record.len())
        .map_err(|_| PersistenceError::Corrupt(format!("record of {} bytes", record.len())))?;
    let mut buf = Vec::with_capacity(HEADER_LEN + record.len());
    buf.extend_from_slice(&len.to_le_bytes());
    buf.extend_from_slice(record);
    Ok(buf)
}

fn read_records(path: &Path) -> Result<Vec<Vec<u8>>, PersistenceError> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut records = Vec::new();
    let mut offset = 0;
    while let Some(header) = bytes.get(offset..offset + HEADER_LEN) {
        let header: [u8; HEADER_LEN] = header
            .try_into()
            .map_err(|_| PersistenceError::Corrupt("short record header".into()))?;
        let start = offset + HEADER_LEN;
        let end = start + u32::from_le_bytes(header) as usize;
        let Some(body) = bytes.get(start..end) else {
            break;
        };
        records.push(body.to_vec());
        offset = end;
    }

    if offset < bytes.len() {
        warn!(
            path = %path.display(),
            dropped_bytes = bytes.len() - offset,
            "dropping torn record at end of log"
        );
        let file = OpenOptions::new().write(true).open(path)?;
        file.set_len(offset as u64)?;
        file.sync_all()?;
    }
    Ok(records)
}

#[async_trait]
impl StateStore for FileStateStore {
    async fn load(&self, namespace: &str) -> Result<Vec<Vec<u8>>, PersistenceError> {
        let path = self.log_path(namespace)?;
        blocking(move || read_records(&path)).await
    }

    async fn append(&self, namespace: &str, record: &[u8]) -> Result<(), PersistenceError> {
        let path = self.log_path(namespace)?;
        let dir = self.dir.clone();
        let buf = frame(record)?;
        blocking(move || {
            fs::create_dir_all(&dir)?;
            let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
            file.write_all(&buf)?;
            file.sync_data()?;
            Ok(())
        })
        .await
    }

    async fn replace(&self, namespace: &str, snapshot: &[u8]) -> Result<(), PersistenceError> {
        let path = self.log_path(namespace)?;
        let tmp = path.with_extension("log.tmp");
        let dir = self.dir.clone();
        let buf = frame(snapshot)?;
        blocking(move || {
            fs::create_dir_all(&dir)?;
            let mut file = File::create(&tmp)?;
            file.write_all(&buf)?;
            file.sync_all()?;
            fs::rename(&tmp, &path)?;
            Ok(())
        })
        .await
    }
}
