use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use unigate_common::security::SecureCredential;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use super::{CredentialSource, CredentialSourceError};

/// On-disk credential document: `{"username", "password", "endpoint"?}`
///
/// Every field is zeroized when the value is dropped.
#[derive(Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct CredentialFile {
    pub username: String,
    pub password: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
}

impl fmt::Debug for CredentialFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialFile")
            .field("username", &self.username)
            .field("password", &"***")
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

impl CredentialFile {
    /// Read and parse a credential file
    ///
    /// On unix the file is refused when any group or other permission bit is
    /// set.
    pub fn read(path: &Path) -> Result<Self, CredentialSourceError> {
        let metadata = fs::metadata(path).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                CredentialSourceError::unavailable(
                    describe_path(path),
                    "credential file does not exist",
                )
            } else {
                CredentialSourceError::Io { source_name: describe_path(path), source }
            }
        })?;
        check_permissions(path, &metadata)?;

        let contents = Zeroizing::new(fs::read_to_string(path).map_err(|source| {
            CredentialSourceError::Io { source_name: describe_path(path), source }
        })?);

        serde_json::from_str(&contents).map_err(|e| CredentialSourceError::InvalidFile {
            path: path.display().to_string(),
            reason: format!("invalid JSON: {e}"),
        })
    }

    pub fn to_credential(&self) -> Result<SecureCredential, CredentialSourceError> {
        Ok(SecureCredential::new(self.username.clone(), &self.password)?)
    }
}

/// Write a credential file readable only by its owner (mode 0600)
///
/// An existing file is truncated and its permissions tightened.
pub fn write_credentials_file(
    path: &Path,
    credential: &SecureCredential,
    endpoint: Option<&str>,
) -> Result<(), CredentialSourceError> {
    let document = CredentialFile {
        username: credential.username().to_string(),
        password: credential.reveal().as_str().to_owned(),
        endpoint: endpoint.map(str::to_string),
    };
    let json = Zeroizing::new(serde_json::to_vec_pretty(&document).map_err(|e| {
        CredentialSourceError::InvalidFile {
            path: path.display().to_string(),
            reason: format!("cannot serialize: {e}"),
        }
    })?);

    let io_error =
        |source| CredentialSourceError::Io { source_name: describe_path(path), source };

    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options.open(path).map_err(io_error)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(fs::Permissions::from_mode(0o600)).map_err(io_error)?;
    }
    file.write_all(&json).map_err(io_error)?;
    file.sync_all().map_err(io_error)?;

    info!(path = %path.display(), "Credential file written");
    Ok(())
}

#[cfg(unix)]
fn check_permissions(path: &Path, metadata: &fs::Metadata) -> Result<(), CredentialSourceError> {
    use std::os::unix::fs::PermissionsExt;

    let mode = metadata.permissions().mode() & 0o777;
    if mode & 0o077 != 0 {
        return Err(CredentialSourceError::InvalidFile {
            path: path.display().to_string(),
            reason: format!("permissions {mode:o} are too open, expected 600"),
        });
    }
    Ok(())
}

#[cfg(not(unix))]
fn check_permissions(_path: &Path, _metadata: &fs::Metadata) -> Result<(), CredentialSourceError> {
    Ok(())
}

fn describe_path(path: &Path) -> String {
    format!("file {}", path.display())
}

/// Reads the login from a JSON credential file
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CredentialSource for FileSource {
    fn get_credentials(&self) -> Result<SecureCredential, CredentialSourceError> {
        debug!(path = %self.path.display(), "Reading credential file");
        CredentialFile::read(&self.path)?.to_credential()
    }

    fn describe(&self) -> String {
        describe_path(&self.path)
    }
}
