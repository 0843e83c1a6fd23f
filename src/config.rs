use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use log::warn;
use serde::{Deserialize, Serialize};

use crate::api::Instance;
use crate::storage::{KeyValueStore, StoreError};

pub const DEFAULT_API_URL: &str = "https://api.green-api.com";
pub const DEFAULT_CONTACT_DOMAIN: &str = "c.us";
pub const API_URL_ENV: &str = "GREENCHAT_API_URL";

/// Key of the persisted credentials record.
pub const CREDENTIALS_KEY: &str = "green-api";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub api_url: String,
    pub poll_interval_secs: u64,
    pub request_timeout_secs: u64,
    /// Consecutive failed polls after which the chat gives up.
    pub max_poll_failures: u32,
    pub contact_domain: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            poll_interval_secs: 3,
            request_timeout_secs: 10,
            max_poll_failures: 4,
            contact_domain: DEFAULT_CONTACT_DOMAIN.to_string(),
        }
    }
}

impl Settings {
    pub fn path() -> Option<PathBuf> {
        crate::storage::config_dir().map(|dir| dir.join("settings.toml"))
    }

    pub fn from_toml(text: &str) -> Result<Self, StoreError> {
        toml::from_str(text).map_err(|e| StoreError::Parse {
            key: "settings".into(),
            reason: e.to_string(),
        })
    }

    pub fn load_from(path: &Path) -> Result<Self, StoreError> {
        match fs::read_to_string(path) {
            Ok(text) => Self::from_toml(&text),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(source) => Err(StoreError::Io {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    /// Settings file if readable, defaults otherwise, then environment overrides.
    pub fn load() -> Self {
        let settings = match Self::path() {
            Some(path) => Self::load_from(&path).unwrap_or_else(|e| {
                warn!("ignoring settings file: {e}");
                Self::default()
            }),
            None => Self::default(),
        };
        settings.with_overrides(|key| std::env::var(key).ok())
    }

    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(url) = lookup(API_URL_ENV).filter(|u| !u.trim().is_empty()) {
            self.api_url = url;
        }
        self
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }
}

/// Contact metadata recorded after a successful lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contact {
    pub phone: String,
    pub chat_id: String,
    pub name: String,
    pub avatar_url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Credentials {
    pub instance_id: String,
    pub access_token: String,
    pub contact_phone: String,
    pub display_name: String,
    pub avatar_url: String,
    pub chat_id: String,
}

impl Credentials {
    pub fn instance(&self) -> Instance {
        Instance::new(&self.instance_id, &self.access_token)
    }

    pub fn contact(&self) -> Option<Contact> {
        if self.chat_id.is_empty() {
            return None;
        }
        Some(Contact {
            phone: self.contact_phone.clone(),
            chat_id: self.chat_id.clone(),
            name: self.display_name.clone(),
            avatar_url: self.avatar_url.clone(),
        })
    }
}

/// Credentials backed by a persistence port. Every setter writes through.
pub struct CredentialStore<S> {
    store: S,
    current: Credentials,
}

impl<S: KeyValueStore> CredentialStore<S> {
    /// A corrupt record is logged and replaced by empty credentials.
    pub fn open(store: S) -> Result<Self, StoreError> {
        let current = match store.read(CREDENTIALS_KEY)? {
            Some(text) => toml::from_str::<Credentials>(&text).unwrap_or_else(|e| {
                warn!("stored credentials unreadable, starting empty: {e}");
                Credentials::default()
            }),
            None => Credentials::default(),
        };
        Ok(Self { store, current })
    }

    pub fn credentials(&self) -> &Credentials {
        &self.current
    }

    pub fn set_instance(&mut self, instance: &Instance) -> Result<(), StoreError> {
        self.current.instance_id = instance.id.clone();
        self.current.access_token = instance.token.clone();
        self.save()
    }

    /// The only way a chat id gets recorded.
    pub fn set_contact(&mut self, contact: &Contact) -> Result<(), StoreError> {
        self.current.contact_phone = contact.phone.clone();
        self.current.avatar_url = contact.avatar_url.clone();
        self.current.display_name = contact.name.clone();
        self.current.chat_id = contact.chat_id.clone();
        self.save()
    }

    fn save(&self) -> Result<(), StoreError> {
        let text = toml::to_string_pretty(&self.current).map_err(|e| StoreError::Serialize {
            key: CREDENTIALS_KEY.into(),
            reason: e.to_string(),
        })?;
        self.store.write(CREDENTIALS_KEY, &text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{FileStore, MemoryStore};

    #[test]
    fn partial_settings_fall_back_to_defaults() {
        let s = Settings::from_toml("poll_interval_secs = 5\n").unwrap();
        assert_eq!(s.poll_interval(), Duration::from_secs(5));
        assert_eq!(s.api_url, DEFAULT_API_URL);
        assert_eq!(s.max_poll_failures, 4);
    }

    #[test]
    fn zero_interval_is_clamped() {
        let s = Settings {
            poll_interval_secs: 0,
            ..Settings::default()
        };
        assert_eq!(s.poll_interval(), Duration::from_secs(1));
    }

    #[test]
    fn env_override_replaces_api_url() {
        let s = Settings::default().with_overrides(|key| {
            (key == API_URL_ENV).then(|| "http://127.0.0.1:9000".to_string())
        });
        assert_eq!(s.api_url, "http://127.0.0.1:9000");

        let s = Settings::default().with_overrides(|_| Some("  ".into()));
        assert_eq!(s.api_url, DEFAULT_API_URL);
    }

    #[test]
    fn missing_settings_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let s = Settings::load_from(&dir.path().join("settings.toml")).unwrap();
        assert_eq!(s, Settings::default());
    }

    #[test]
    fn credentials_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut creds = CredentialStore::open(FileStore::new(dir.path())).unwrap();
            creds.set_instance(&Instance::new("1101", "secret")).unwrap();
            creds
                .set_contact(&Contact {
                    phone: "79123456789".into(),
                    chat_id: "79123456789@c.us".into(),
                    name: "Ann".into(),
                    avatar_url: "https://pps.example/a.jpg".into(),
                })
                .unwrap();
        }
        let creds = CredentialStore::open(FileStore::new(dir.path())).unwrap();
        let c = creds.credentials();
        assert_eq!(c.instance(), Instance::new("1101", "secret"));
        assert_eq!(c.contact_phone, "79123456789");
        assert_eq!(c.chat_id, "79123456789@c.us");
        assert_eq!(c.display_name, "Ann");
    }

    #[test]
    fn fresh_store_has_no_contact() {
        let creds = CredentialStore::open(MemoryStore::new()).unwrap();
        assert_eq!(creds.credentials(), &Credentials::default());
        assert!(creds.credentials().contact().is_none());
    }

    #[test]
    fn corrupt_record_starts_empty() {
        let store = MemoryStore::new();
        store.write(CREDENTIALS_KEY, "not = [valid").unwrap();
        let creds = CredentialStore::open(store).unwrap();
        assert_eq!(creds.credentials(), &Credentials::default());
    }
}
