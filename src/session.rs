//! The signed in identity and where it is persisted between runs
use std::{
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::{
    auth::{decode_profile, CredentialResponse, IdentityProvider, Profile},
    error::{CactusError, Result},
};

/// The key the credential is persisted under
pub const SESSION_KEY: &str = "google_credential";

/// Persistent storage for the serialized credential.
///
/// Only one entry ever exists.  Clearing a missing entry is not an error.
pub trait SessionStore: std::fmt::Debug + Send + Sync {
    fn init(&self) -> Result<()>;
    fn read(&self) -> Result<Option<String>>;
    fn write(&self, blob: &str) -> Result<()>;
    fn clear(&self) -> Result<()>;
}

/// Stores the credential as `<dir>/google_credential.json`
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    dir: PathBuf,
}

impl FileSessionStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(format!("{}.json", SESSION_KEY))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl SessionStore for FileSessionStore {
    fn init(&self) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        Ok(())
    }

    fn read(&self) -> Result<Option<String>> {
        match fs::read_to_string(self.path()) {
            Ok(blob) => Ok(Some(blob)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn write(&self, blob: &str) -> Result<()> {
        self.init()?;
        write_private(&self.path(), blob)?;
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        match fs::remove_file(self.path()) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

/// The credential is a bearer token; only the owner may read it.
#[cfg(unix)]
fn write_private(path: &Path, blob: &str) -> std::io::Result<()> {
    use std::io::Write;
    use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};

    let mut file = fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?;
    // mode only applies on creation
    file.set_permissions(fs::Permissions::from_mode(0o600))?;
    file.write_all(blob.as_bytes())
}

#[cfg(not(unix))]
fn write_private(path: &Path, blob: &str) -> std::io::Result<()> {
    fs::write(path, blob)
}

/// Keeps the credential in memory only
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    blob: Mutex<Option<String>>,
}

impl MemorySessionStore {
    pub fn with_blob(blob: impl Into<String>) -> Self {
        Self {
            blob: Mutex::new(Some(blob.into())),
        }
    }

    fn slot(&self) -> std::sync::MutexGuard<'_, Option<String>> {
        // A poisoned slot still holds a usable value
        self.blob.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl SessionStore for MemorySessionStore {
    fn init(&self) -> Result<()> {
        Ok(())
    }

    fn read(&self) -> Result<Option<String>> {
        Ok(self.slot().clone())
    }

    fn write(&self, blob: &str) -> Result<()> {
        *self.slot() = Some(blob.to_string());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        *self.slot() = None;
        Ok(())
    }
}

/// The blob written to the session store
#[derive(Debug, Deserialize, Serialize)]
pub struct StoredCredential {
    pub credential: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionState {
    Anonymous,
    Authenticated { credential: String, profile: Profile },
}

/// Tracks whether a verified, unexpired identity is present
#[derive(Debug)]
pub struct Session {
    store: Arc<dyn SessionStore>,
    state: SessionState,
}

impl Session {
    /// Creates a signed out session backed by `store`
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self {
            store,
            state: SessionState::Anonymous,
        }
    }

    /// Creates a session and restores any persisted credential
    pub fn restore(store: Arc<dyn SessionStore>) -> Self {
        Self::restore_at(store, Utc::now())
    }

    pub fn restore_at(store: Arc<dyn SessionStore>, now: DateTime<Utc>) -> Self {
        let mut session = Self::new(store);
        session.state = session.load(now);
        session
    }

    fn load(&self, now: DateTime<Utc>) -> SessionState {
        let blob = match self.store.init().and_then(|_| self.store.read()) {
            Ok(Some(blob)) => blob,
            Ok(None) => return SessionState::Anonymous,
            Err(err) => {
                warn!(%err, "unable to read the stored session");
                return SessionState::Anonymous;
            }
        };

        let restored = serde_json::from_str::<StoredCredential>(&blob)
            .map_err(CactusError::from)
            .and_then(|stored| {
                let profile = decode_profile(&stored.credential)?;
                Ok((stored.credential, profile))
            });

        match restored {
            Ok((credential, profile)) if !profile.is_expired_at(now) => {
                debug!(expires_at = %profile.expires_at, "restored session");
                SessionState::Authenticated {
                    credential,
                    profile,
                }
            }
            Ok(_) => {
                debug!("stored session has expired");
                self.discard();
                SessionState::Anonymous
            }
            Err(err) => {
                debug!(%err, "discarding undecodable stored session");
                self.discard();
                SessionState::Anonymous
            }
        }
    }

    fn discard(&self) {
        if let Err(err) = self.store.clear() {
            warn!(%err, "unable to remove the stored session");
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self.state, SessionState::Authenticated { .. })
    }

    pub fn profile(&self) -> Option<&Profile> {
        match &self.state {
            SessionState::Authenticated { profile, .. } => Some(profile),
            SessionState::Anonymous => None,
        }
    }

    pub fn credential(&self) -> Option<&str> {
        match &self.state {
            SessionState::Authenticated { credential, .. } => Some(credential),
            SessionState::Anonymous => None,
        }
    }

    /// Handles a successful response from the identity provider.
    ///
    /// On error the session is left exactly as it was.
    pub fn login(&mut self, response: CredentialResponse) -> Result<&Profile> {
        self.login_at(response, Utc::now())
    }

    pub fn login_at(&mut self, response: CredentialResponse, now: DateTime<Utc>) -> Result<&Profile> {
        let credential = response
            .credential
            .filter(|credential| !credential.is_empty())
            .ok_or_else(|| CactusError::LoginFailed("no credential received".to_string()))?;
        let profile = decode_profile(&credential)
            .map_err(|err| CactusError::LoginFailed(err.to_string()))?;
        if profile.is_expired_at(now) {
            return Err(CactusError::LoginFailed("credential has expired".to_string()));
        }

        let blob = serde_json::to_string(&StoredCredential {
            credential: credential.clone(),
        })?;
        self.store.write(&blob)?;

        info!(email = %profile.email, "signed in");
        self.state = SessionState::Authenticated {
            credential,
            profile,
        };
        self.profile()
            .ok_or_else(|| CactusError::LoginFailed("session was not stored".to_string()))
    }

    /// Runs the identity provider and logs in with whatever it returns
    pub async fn sign_in(
        &mut self,
        provider: &dyn IdentityProvider,
        client_id: &str,
    ) -> Result<&Profile> {
        if client_id.is_empty() {
            return Err(CactusError::LoginFailed(
                "no identity provider client id is configured".to_string(),
            ));
        }
        let response = provider.sign_in(client_id).await.map_err(|err| match err {
            CactusError::LoginFailed(reason) => CactusError::LoginFailed(reason),
            other => CactusError::LoginFailed(other.to_string()),
        })?;
        self.login(response)
    }

    /// Forgets the in-memory and the persisted credential
    pub fn logout(&mut self) -> Result<()> {
        self.state = SessionState::Anonymous;
        self.store.clear()?;
        info!("signed out");
        Ok(())
    }

    /// Signs out if the credential expired while the session was in use.
    ///
    /// Returns true when the session is still valid.
    pub fn check_expiry(&mut self) -> bool {
        self.check_expiry_at(Utc::now())
    }

    pub fn check_expiry_at(&mut self, now: DateTime<Utc>) -> bool {
        let expired = match self.profile() {
            Some(profile) => profile.is_expired_at(now),
            None => return false,
        };
        if expired {
            debug!("session expired");
            self.state = SessionState::Anonymous;
            self.discard();
        }
        !expired
    }
}
