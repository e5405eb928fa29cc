//! SettingsStore port - ローカル設定（共有設定）の読み書き
//!
//! Mesh トランスポートは 3 つの設定がすべて揃っているときだけ有効になります：
//! - `sharingEnabled`: "true" / "false"
//! - `sharingRoomName`
//! - `sharingRoomPassword`

use async_trait::async_trait;

use crate::domain::PersistenceError;

pub const SHARING_ENABLED: &str = "sharingEnabled";
pub const SHARING_ROOM_NAME: &str = "sharingRoomName";
pub const SHARING_ROOM_PASSWORD: &str = "sharingRoomPassword";

#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, PersistenceError>;

    async fn set(&self, key: &str, value: &str) -> Result<(), PersistenceError>;

    async fn remove(&self, key: &str) -> Result<(), PersistenceError>;
}

/// Sharing configuration as read from a [`SettingsStore`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SharingSettings {
    pub enabled: bool,
    pub room_name: Option<String>,
    pub room_password: Option<String>,
}

impl SharingSettings {
    pub async fn load(store: &dyn SettingsStore) -> Result<Self, PersistenceError> {
        let enabled = store
            .get(SHARING_ENABLED)
            .await?
            .is_some_and(|v| v.trim().eq_ignore_ascii_case("true"));
        let non_empty = |v: Option<String>| v.filter(|s| !s.is_empty());
        Ok(Self {
            enabled,
            room_name: non_empty(store.get(SHARING_ROOM_NAME).await?),
            room_password: non_empty(store.get(SHARING_ROOM_PASSWORD).await?),
        })
    }

    pub async fn save(&self, store: &dyn SettingsStore) -> Result<(), PersistenceError> {
        store
            .set(SHARING_ENABLED, if self.enabled { "true" } else { "false" })
            .await?;
        match &self.room_name {
            Some(name) => store.set(SHARING_ROOM_NAME, name).await?,
            None => store.remove(SHARING_ROOM_NAME).await?,
        }
        match &self.room_password {
            Some(password) => store.set(SHARING_ROOM_PASSWORD, password).await?,
            None => store.remove(SHARING_ROOM_PASSWORD).await?,
        }
        Ok(())
    }

    /// `(room, password)` when sharing is enabled and both values are present.
    pub fn active_room(&self) -> Option<(&str, &str)> {
        if !self.enabled {
            return None;
        }
        Some((self.room_name.as_deref()?, self.room_password.as_deref()?))
    }
}
