use std::io;
use std::path::{Path, PathBuf};

use console::Term;
use log::debug;

use super::UploadError;
use crate::table::write_atomically;

/// Persistent cache of the EcoTaxa bearer token
pub trait TokenStore {
    fn load(&self) -> Option<String>;
    fn store(&self, token: &str) -> Result<(), UploadError>;
    fn clear(&self);
}

/// Token kept in a user-private file, by default
/// `$HOME/.config/cytoprocess/ecotaxa_token`
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    pub fn default_location() -> Result<Self, UploadError> {
        let home = std::env::var_os("HOME").ok_or(UploadError::NoHomeDirectory)?;
        Ok(Self::new(
            Path::new(&home)
                .join(".config")
                .join("cytoprocess")
                .join("ecotaxa_token"),
        ))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TokenStore for FileTokenStore {
    fn load(&self) -> Option<String> {
        match std::fs::read_to_string(&self.path) {
            Ok(token) => Some(token.trim().to_string()).filter(|t| !t.is_empty()),
            Err(e) => {
                debug!("No cached token at {}: {}", self.path.display(), e);
                None
            }
        }
    }

    fn store(&self, token: &str) -> Result<(), UploadError> {
        write_atomically(&self.path, |file| -> Result<(), UploadError> {
            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                file.set_permissions(std::fs::Permissions::from_mode(0o600))?;
            }
            io::Write::write_all(file, token.as_bytes())?;
            Ok(())
        })
    }

    fn clear(&self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            debug!("Could not remove cached token {}: {}", self.path.display(), e);
        }
    }
}

/// Source of credentials when none are given on the command line
pub trait CredentialPrompt {
    fn username(&self) -> io::Result<String>;
    fn password(&self) -> io::Result<String>;
}

/// Interactive prompt on the terminal; the password is not echoed
#[derive(Debug, Default)]
pub struct ConsolePrompt;

impl CredentialPrompt for ConsolePrompt {
    fn username(&self) -> io::Result<String> {
        let term = Term::stderr();
        term.write_line("EcoTaxa authentication required")?;
        term.write_str("username (email): ")?;
        Ok(term.read_line()?.trim().to_string())
    }

    fn password(&self) -> io::Result<String> {
        let term = Term::stderr();
        term.write_str("password: ")?;
        term.read_secure_line()
    }
}
