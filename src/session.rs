//! Authentication session context.
//!
//! A [`Session`] is an explicit value handed to whatever needs the current
//! user or token. It is persisted between invocations by a [`SessionStore`].

use crate::models::User;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Token plus the profile of the user it belongs to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub token: String,
    /// Unknown when the token came from `--token` without a profile lookup.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<User>,
}

impl Session {
    pub fn new(token: impl Into<String>, user: Option<User>) -> Self {
        Self {
            token: token.into(),
            user,
        }
    }
}

/// File-backed session persistence.
#[derive(Debug, Clone)]
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns `Ok(None)` when no session has been saved.
    pub fn load(&self) -> Result<Option<Session>> {
        if !self.path.exists() {
            debug!("No session file at {}", self.path.display());
            return Ok(None);
        }

        let contents = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read session from {}", self.path.display()))?;

        let session = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse session from {}", self.path.display()))?;

        Ok(Some(session))
    }

    /// Like [`load`](Self::load), but an unreadable or corrupt file is
    /// logged and treated as no session, so `login` and `logout` can
    /// replace or remove it.
    pub fn load_or_discard(&self) -> Option<Session> {
        match self.load() {
            Ok(session) => session,
            Err(e) => {
                warn!("Ignoring unusable session file: {:#}", e);
                None
            }
        }
    }

    /// Write the session, readable by the owner only on unix.
    pub fn save(&self, session: &Session) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let contents = serde_json::to_string_pretty(session)?;

        #[cfg(unix)]
        {
            use std::io::Write;
            use std::os::unix::fs::OpenOptionsExt;

            use std::os::unix::fs::PermissionsExt;

            let mut file = fs::OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .mode(0o600)
                .open(&self.path)
                .with_context(|| format!("Failed to write session to {}", self.path.display()))?;
            file.write_all(contents.as_bytes())?;

            // `mode` only applies on creation; tighten files that already existed.
            file.set_permissions(fs::Permissions::from_mode(0o600))
                .with_context(|| format!("Failed to restrict permissions on {}", self.path.display()))?;
        }

        #[cfg(not(unix))]
        {
            fs::write(&self.path, contents)
                .with_context(|| format!("Failed to write session to {}", self.path.display()))?;
        }

        Ok(())
    }

    /// Remove the saved session. Returns whether one existed.
    pub fn clear(&self) -> Result<bool> {
        if !self.path.exists() {
            return Ok(false);
        }
        fs::remove_file(&self.path)
            .with_context(|| format!("Failed to remove session {}", self.path.display()))?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;

    fn manager() -> User {
        User {
            id: "u1".to_string(),
            name: "Grace".to_string(),
            email: "grace@example.com".to_string(),
            role: Role::Manager,
            skills: Vec::new(),
            seniority: None,
            department: None,
            max_capacity: None,
        }
    }

    #[test]
    fn test_save_load_clear() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path().join("nested").join("session.json"));

        assert!(store.load().unwrap().is_none());

        let session = Session::new("tok", Some(manager()));
        store.save(&session).unwrap();
        assert_eq!(store.load().unwrap(), Some(session));

        assert!(store.clear().unwrap());
        assert!(!store.clear().unwrap());
        assert!(store.load().unwrap().is_none());
    }

    #[cfg(unix)]
    #[test]
    fn test_session_file_is_private() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path().join("session.json"));
        store.save(&Session::new("tok", None)).unwrap();

        let mode = fs::metadata(store.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_corrupt_session_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        fs::write(&path, "not json").unwrap();

        assert!(SessionStore::new(path).load().is_err());
    }

    #[test]
    fn test_bare_token_session_omits_user() {
        let json = serde_json::to_string(&Session::new("tok", None)).unwrap();
        assert_eq!(json, r#"{"token":"tok"}"#);
    }

    #[test]
    fn test_corrupt_session_can_be_replaced_or_cleared() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path().join("session.json"));

        fs::write(store.path(), "garbage").unwrap();
        assert!(store.load_or_discard().is_none());
        assert!(store.clear().unwrap());
        assert!(!store.path().exists());

        fs::write(store.path(), "garbage").unwrap();
        store.save(&Session::new("fresh", None)).unwrap();
        assert_eq!(store.load().unwrap(), Some(Session::new("fresh", None)));
    }

    #[cfg(unix)]
    #[test]
    fn test_save_tightens_existing_file_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path().join("session.json"));
        fs::write(store.path(), "{}").unwrap();
        fs::set_permissions(store.path(), fs::Permissions::from_mode(0o644)).unwrap();

        store.save(&Session::new("tok", None)).unwrap();

        let mode = fs::metadata(store.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
