use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use keyring::Entry;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::{Config, CredentialBackend};

const SERVICE_NAME: &str = "savebox";

/// Keychain user name under which the token is kept
const TOKEN_KEY: &str = "token";

/// Credential file name in the data directory
const CREDENTIALS_FILE: &str = "credentials.json";

/// Blocking storage for the single session token.
///
/// Implementations report a missing token as `Ok(None)` and reserve `Err`
/// for storage that could not be reached.
pub trait TokenStorage: Send + Sync {
    fn read(&self) -> Result<Option<String>>;
    fn write(&self, token: &str) -> Result<()>;
    fn remove(&self) -> Result<()>;
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredCredentials {
    token: String,
}

/// Token kept as `{"token": "..."}` in a JSON file.
pub struct FileTokenStorage {
    dir: PathBuf,
}

impl FileTokenStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(CREDENTIALS_FILE)
    }
}

impl TokenStorage for FileTokenStorage {
    fn read(&self) -> Result<Option<String>> {
        let path = self.path();
        if !path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read credentials file {}", path.display()))?;
        let stored: StoredCredentials =
            serde_json::from_str(&contents).context("Failed to parse credentials file")?;
        Ok(Some(stored.token))
    }

    fn write(&self, token: &str) -> Result<()> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create {}", self.dir.display()))?;
        let contents = serde_json::to_string(&StoredCredentials {
            token: token.to_string(),
        })?;

        // Write then rename so a crash never leaves a half-written file
        let path = self.path();
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, contents).context("Failed to write credentials file")?;
        restrict_permissions(&tmp)?;
        std::fs::rename(&tmp, &path).context("Failed to replace credentials file")?;
        Ok(())
    }

    fn remove(&self) -> Result<()> {
        let path = self.path();
        if path.exists() {
            std::fs::remove_file(&path).context("Failed to delete credentials file")?;
        }
        Ok(())
    }
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
        .context("Failed to restrict credentials file permissions")
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> Result<()> {
    Ok(())
}

/// Token kept in the OS keychain.
pub struct KeyringTokenStorage {
    user: String,
}

impl Default for KeyringTokenStorage {
    fn default() -> Self {
        Self {
            user: TOKEN_KEY.to_string(),
        }
    }
}

impl KeyringTokenStorage {
    #[cfg(test)]
    fn for_user(user: &str) -> Self {
        Self {
            user: user.to_string(),
        }
    }

    fn entry(&self) -> Result<Entry> {
        Entry::new(SERVICE_NAME, &self.user).context("Failed to create keyring entry")
    }
}

impl TokenStorage for KeyringTokenStorage {
    fn read(&self) -> Result<Option<String>> {
        match self.entry()?.get_password() {
            Ok(token) => Ok(Some(token)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e).context("Failed to retrieve token from keychain"),
        }
    }

    fn write(&self, token: &str) -> Result<()> {
        self.entry()?
            .set_password(token)
            .context("Failed to store token in keychain")
    }

    fn remove(&self) -> Result<()> {
        match self.entry()?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e).context("Failed to delete token from keychain"),
        }
    }
}

/// Durable home of the session token.
///
/// Storage calls run on the blocking pool so callers can await them from
/// the UI loop. `load` never fails: unreachable storage reads as "no token".
#[derive(Clone)]
pub struct CredentialStore {
    backend: Arc<dyn TokenStorage>,
}

impl CredentialStore {
    pub fn new(backend: impl TokenStorage + 'static) -> Self {
        Self {
            backend: Arc::new(backend),
        }
    }

    pub fn file(dir: impl Into<PathBuf>) -> Self {
        Self::new(FileTokenStorage::new(dir))
    }

    pub fn keyring() -> Self {
        Self::new(KeyringTokenStorage::default())
    }

    /// Pick the backend named in the configuration
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(match config.credential_backend {
            CredentialBackend::File => Self::file(config.data_dir()?),
            CredentialBackend::Keyring => Self::keyring(),
        })
    }

    pub async fn save(&self, token: &str) -> Result<()> {
        let backend = Arc::clone(&self.backend);
        let token = token.to_string();
        tokio::task::spawn_blocking(move || backend.write(&token))
            .await
            .context("Credential write task failed")??;
        debug!("Session token saved");
        Ok(())
    }

    pub async fn load(&self) -> Option<String> {
        let backend = Arc::clone(&self.backend);
        let result = tokio::task::spawn_blocking(move || backend.read())
            .await
            .context("Credential read task failed")
            .and_then(|r| r);

        match result {
            Ok(token) => token.filter(|t| !t.is_empty()),
            Err(e) => {
                warn!(error = %format!("{:#}", e), "Credential storage unavailable, treating as signed out");
                None
            }
        }
    }

    pub async fn clear(&self) -> Result<()> {
        let backend = Arc::clone(&self.backend);
        tokio::task::spawn_blocking(move || backend.remove())
            .await
            .context("Credential delete task failed")??;
        debug!("Session token cleared");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    struct UnavailableStorage;

    impl TokenStorage for UnavailableStorage {
        fn read(&self) -> Result<Option<String>> {
            Err(anyhow::anyhow!("storage offline"))
        }
        fn write(&self, _token: &str) -> Result<()> {
            Err(anyhow::anyhow!("storage offline"))
        }
        fn remove(&self) -> Result<()> {
            Err(anyhow::anyhow!("storage offline"))
        }
    }

    #[tokio::test]
    async fn test_file_store_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = CredentialStore::file(dir.path());

        assert_eq!(store.load().await, None);
        store.save("T1").await.unwrap();
        assert_eq!(store.load().await.as_deref(), Some("T1"));

        store.save("T2").await.unwrap();
        assert_eq!(store.load().await.as_deref(), Some("T2"));

        store.clear().await.unwrap();
        assert_eq!(store.load().await, None);
    }

    #[tokio::test]
    async fn test_file_store_survives_new_instance() {
        let dir = TempDir::new().unwrap();
        CredentialStore::file(dir.path()).save("T1").await.unwrap();

        let reopened = CredentialStore::file(dir.path());
        assert_eq!(reopened.load().await.as_deref(), Some("T1"));
    }

    #[tokio::test]
    async fn test_file_format_is_single_key() {
        let dir = TempDir::new().unwrap();
        let storage = FileTokenStorage::new(dir.path());
        storage.write("T1").unwrap();

        let raw = std::fs::read_to_string(storage.path()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value, serde_json::json!({"token": "T1"}));
    }

    #[tokio::test]
    async fn test_clear_when_absent_succeeds() {
        let dir = TempDir::new().unwrap();
        let store = CredentialStore::file(dir.path().join("not-created"));
        store.clear().await.unwrap();
        assert_eq!(store.load().await, None);
    }

    #[tokio::test]
    async fn test_corrupt_file_reads_as_absent() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(CREDENTIALS_FILE), "{not json").unwrap();
        let store = CredentialStore::file(dir.path());
        assert_eq!(store.load().await, None);
    }

    #[tokio::test]
    async fn test_empty_token_reads_as_absent() {
        let dir = TempDir::new().unwrap();
        FileTokenStorage::new(dir.path()).write("").unwrap();
        assert_eq!(CredentialStore::file(dir.path()).load().await, None);
    }

    #[tokio::test]
    async fn test_unavailable_storage() {
        let store = CredentialStore::new(UnavailableStorage);
        assert_eq!(store.load().await, None);
        assert!(store.save("T1").await.is_err());
        assert!(store.clear().await.is_err());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_file_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let storage = FileTokenStorage::new(dir.path());
        storage.write("T1").unwrap();
        let mode = std::fs::metadata(storage.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    // Needs a real OS keychain (Keychain, Credential Manager or Secret Service)
    #[tokio::test]
    #[ignore]
    async fn test_keyring_store_round_trip() {
        let user = format!("test-{}", std::process::id());
        let store = CredentialStore::new(KeyringTokenStorage::for_user(&user));

        store.save("T1").await.unwrap();
        assert_eq!(store.load().await.as_deref(), Some("T1"));

        // A fresh backend instance must see the same entry
        let reopened = CredentialStore::new(KeyringTokenStorage::for_user(&user));
        assert_eq!(reopened.load().await.as_deref(), Some("T1"));

        reopened.clear().await.unwrap();
        assert_eq!(store.load().await, None);
    }
}
