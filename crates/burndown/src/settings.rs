//! Visibility-tiered settings.
//!
//! Settings are persisted records with a [`Visibility`]. Who may see a record
//! is decided by an audience type, so a projection for the public surface can
//! never hand out a secret by accident:
//!
//! - [`Everyone`] sees `public` settings
//! - [`Administrators`] also see `private` settings
//! - [`Internal`] sees everything, including `secret` ones

use std::collections::BTreeMap;
use std::marker::PhantomData;

use serde_json::Value;

use burndown_core::{Setting, Visibility};
use burndown_store::Store;

use crate::error::{BacklogError, Result};

pub const DEMO: &str = "demo";
pub const LIMIT_CIRCLES: &str = "limit-circles";
pub const LIMIT_STORIES_PER_CIRCLE: &str = "limit-stories-per-circle";
pub const SESSION_SECRET: &str = "session-secret";
pub const SMTP_LOGIN: &str = "smtp-login";
pub const SMTP_PASSWORD: &str = "smtp-password";
pub const SMTP_SERVICE: &str = "smtp-service";
pub const SSL_CA_PATH: &str = "ssl-ca-path";
pub const SSL_CERT_PATH: &str = "ssl-cert-path";
pub const SSL_KEY_PATH: &str = "ssl-key-path";
pub const STRIPE_PUBLIC_KEY: &str = "stripe-public-key";
pub const STRIPE_SECRET_KEY: &str = "stripe-secret-key";

/// Someone who reads settings.
pub trait Audience: 'static {
    /// The most restricted visibility this audience may read.
    const CEILING: Visibility;
}

/// Any visitor.
#[derive(Debug, Clone, Copy)]
pub struct Everyone;

/// Site administrators.
#[derive(Debug, Clone, Copy)]
pub struct Administrators;

/// The process itself.
#[derive(Debug, Clone, Copy)]
pub struct Internal;

impl Audience for Everyone {
    const CEILING: Visibility = Visibility::Public;
}

impl Audience for Administrators {
    const CEILING: Visibility = Visibility::Private;
}

impl Audience for Internal {
    const CEILING: Visibility = Visibility::Secret;
}

/// The settings every deployment starts with.
///
/// `session-secret` is freshly generated on each call; it only sticks once
/// [`SettingsTable::load`] persists it.
pub fn defaults() -> Vec<Setting> {
    let session_secret = hex::encode(rand::random::<[u8; 16]>());

    vec![
        Setting::new(DEMO, false, Visibility::Public),
        Setting::new(LIMIT_CIRCLES, 300, Visibility::Private),
        Setting::new(LIMIT_STORIES_PER_CIRCLE, 1000, Visibility::Private),
        Setting::new(SESSION_SECRET, session_secret, Visibility::Secret),
        Setting::new(SMTP_LOGIN, Value::Null, Visibility::Private),
        Setting::new(SMTP_PASSWORD, Value::Null, Visibility::Secret),
        Setting::new(SMTP_SERVICE, "Zoho", Visibility::Private),
        Setting::new(SSL_CA_PATH, Value::Null, Visibility::Private),
        Setting::new(SSL_CERT_PATH, Value::Null, Visibility::Private),
        Setting::new(SSL_KEY_PATH, Value::Null, Visibility::Private),
        Setting::new(STRIPE_PUBLIC_KEY, Value::Null, Visibility::Public),
        Setting::new(STRIPE_SECRET_KEY, Value::Null, Visibility::Secret),
    ]
}

/// All known settings, keyed by name.
#[derive(Debug, Clone, Default)]
pub struct SettingsTable {
    settings: BTreeMap<String, Setting>,
}

impl SettingsTable {
    /// Build a table from records already in hand.
    pub fn from_settings(settings: impl IntoIterator<Item = Setting>) -> Self {
        Self {
            settings: settings
                .into_iter()
                .map(|s| (s.name.clone(), s))
                .collect(),
        }
    }

    /// Load saved settings, persisting a default for every one that is missing.
    ///
    /// Saved values always win over defaults.
    pub async fn load<S: Store + ?Sized>(store: &S) -> Result<Self> {
        let mut table = Self::from_settings(store.get_settings().await?);

        for default in defaults() {
            if table.settings.contains_key(&default.name) {
                continue;
            }

            store.put_setting(&default).await.map_err(|e| {
                BacklogError::Settings(format!("could not set setting {}: {}", default.name, e))
            })?;
            tracing::debug!(name = %default.name, "persisted default setting");
            table.settings.insert(default.name.clone(), default);
        }

        Ok(table)
    }

    /// Change the value of an existing setting, keeping its visibility.
    pub async fn set<S: Store + ?Sized>(
        &mut self,
        store: &S,
        name: &str,
        value: impl Into<Value>,
    ) -> Result<()> {
        let mut setting = self
            .settings
            .get(name)
            .cloned()
            .ok_or_else(|| BacklogError::Settings(format!("unknown setting: {}", name)))?;

        setting.value = value.into();
        store.put_setting(&setting).await?;
        self.settings.insert(setting.name.clone(), setting);
        Ok(())
    }

    /// The full record for `name`, whatever its visibility.
    pub fn get(&self, name: &str) -> Option<&Setting> {
        self.settings.get(name)
    }

    /// Read a numeric setting. Missing and `null` both read as `None`.
    pub fn get_u64(&self, name: &str) -> Result<Option<u64>> {
        match self.settings.get(name).map(|s| &s.value) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => value.as_u64().map(Some).ok_or_else(|| {
                BacklogError::Settings(format!("{} is not a non-negative integer: {}", name, value))
            }),
        }
    }

    /// Read a string setting. Missing, `null` and non-strings read as `None`.
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.settings.get(name).and_then(|s| s.value.as_str())
    }

    pub fn len(&self) -> usize {
        self.settings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.settings.is_empty()
    }

    /// Project the table down to what audience `A` may read.
    pub fn view<A: Audience>(&self) -> SettingsView<'_, A> {
        SettingsView {
            table: self,
            _audience: PhantomData,
        }
    }
}

/// A read-only projection of a [`SettingsTable`] for one audience.
#[derive(Debug)]
pub struct SettingsView<'a, A: Audience> {
    table: &'a SettingsTable,
    _audience: PhantomData<A>,
}

impl<'a, A: Audience> SettingsView<'a, A> {
    fn visible(setting: &Setting) -> bool {
        setting.visibility <= A::CEILING
    }

    /// The value of `name`, if it exists and this audience may see it.
    pub fn get(&self, name: &str) -> Option<&'a Value> {
        self.table
            .settings
            .get(name)
            .filter(|s| Self::visible(s))
            .map(|s| &s.value)
    }

    /// Visible settings in name order.
    pub fn iter(&self) -> impl Iterator<Item = &'a Setting> + 'a {
        self.table.settings.values().filter(|s| Self::visible(s))
    }

    /// Visible settings as a name-to-value map.
    pub fn to_map(&self) -> BTreeMap<String, Value> {
        self.iter()
            .map(|s| (s.name.clone(), s.value.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burndown_store::MemoryStore;

    #[tokio::test]
    async fn test_load_persists_missing_defaults() {
        let store = MemoryStore::new();
        let table = SettingsTable::load(&store).await.unwrap();

        assert_eq!(table.len(), defaults().len());
        assert_eq!(store.get_settings().await.unwrap().len(), defaults().len());
        assert_eq!(table.get_u64(LIMIT_STORIES_PER_CIRCLE).unwrap(), Some(1000));
    }

    #[tokio::test]
    async fn test_saved_values_win() {
        let store = MemoryStore::new();
        store
            .put_setting(&Setting::new(LIMIT_CIRCLES, 5, Visibility::Private))
            .await
            .unwrap();

        let first = SettingsTable::load(&store).await.unwrap();
        assert_eq!(first.get_u64(LIMIT_CIRCLES).unwrap(), Some(5));

        let secret = first.get_str(SESSION_SECRET).unwrap().to_string();
        let second = SettingsTable::load(&store).await.unwrap();
        assert_eq!(second.get_str(SESSION_SECRET), Some(secret.as_str()));
    }

    #[tokio::test]
    async fn test_views_respect_visibility() {
        let store = MemoryStore::new();
        let table = SettingsTable::load(&store).await.unwrap();

        let public = table.view::<Everyone>();
        assert!(public.get(DEMO).is_some());
        assert!(public.get(LIMIT_CIRCLES).is_none());
        assert!(public.get(SESSION_SECRET).is_none());
        assert!(public.iter().all(|s| s.visibility == Visibility::Public));

        let admin = table.view::<Administrators>();
        assert!(admin.get(LIMIT_CIRCLES).is_some());
        assert!(admin.get(STRIPE_SECRET_KEY).is_none());

        let internal = table.view::<Internal>();
        assert!(internal.get(SESSION_SECRET).is_some());
        assert_eq!(internal.to_map().len(), table.len());
    }

    #[tokio::test]
    async fn test_set_keeps_visibility() {
        let store = MemoryStore::new();
        let mut table = SettingsTable::load(&store).await.unwrap();

        table.set(&store, SMTP_LOGIN, "ops@example.com").await.unwrap();
        let setting = table.get(SMTP_LOGIN).unwrap();
        assert_eq!(setting.visibility, Visibility::Private);
        assert_eq!(table.get_str(SMTP_LOGIN), Some("ops@example.com"));

        let result = table.set(&store, "no-such-setting", 1).await;
        assert!(matches!(result, Err(BacklogError::Settings(_))));
    }

    #[test]
    fn test_get_u64_rejects_non_numbers() {
        let table = SettingsTable::from_settings([
            Setting::new(LIMIT_CIRCLES, "lots", Visibility::Private),
            Setting::new(SMTP_LOGIN, Value::Null, Visibility::Private),
        ]);
        assert!(table.get_u64(LIMIT_CIRCLES).is_err());
        assert_eq!(table.get_u64(SMTP_LOGIN).unwrap(), None);
        assert_eq!(table.get_u64("absent").unwrap(), None);
    }
}
