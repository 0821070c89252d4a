use std::fmt;

use tracing::{debug, info, warn};
use unigate_common::security::SecureCredential;
use unigate_domain::{CredentialSourceKind, CredentialsConfig};

use super::{
    CredentialSource, CredentialSourceError, EnvironmentSource, FileSource, KeychainSource,
    StdinSource,
};

/// Ordered chain of credential sources; the first success wins
pub struct CredentialManager {
    sources: Vec<Box<dyn CredentialSource>>,
}

impl CredentialManager {
    pub fn new(sources: Vec<Box<dyn CredentialSource>>) -> Self {
        Self { sources }
    }

    /// Build the chain described by configuration, in configured order
    ///
    /// A `file` entry without a configured path is skipped.
    pub fn from_config(config: &CredentialsConfig) -> Self {
        let mut sources: Vec<Box<dyn CredentialSource>> = Vec::with_capacity(config.sources.len());

        for kind in &config.sources {
            match kind {
                CredentialSourceKind::Stdin => sources.push(Box::new(StdinSource::stdin())),
                CredentialSourceKind::Environment => sources.push(Box::new(EnvironmentSource::new(
                    config.username_env.clone(),
                    config.password_env.clone(),
                ))),
                CredentialSourceKind::File => match &config.file {
                    Some(path) => sources.push(Box::new(FileSource::new(path.clone()))),
                    None => debug!("Skipping file credential source: no path configured"),
                },
                CredentialSourceKind::Keychain => sources.push(Box::new(KeychainSource::new(
                    config.keychain_service.clone(),
                    config.keychain_account.clone(),
                ))),
            }
        }

        Self::new(sources)
    }

    /// Append a source to the end of the chain
    pub fn with_source(mut self, source: impl CredentialSource + 'static) -> Self {
        self.sources.push(Box::new(source));
        self
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Descriptions of every source, in order
    pub fn describe(&self) -> Vec<String> {
        self.sources.iter().map(|source| source.describe()).collect()
    }

    /// Try each source in order and return the first credential produced
    ///
    /// # Errors
    /// `NoSources` for an empty chain; otherwise `Exhausted` wrapping the
    /// last source's failure.
    pub fn get_credentials(&self) -> Result<SecureCredential, CredentialSourceError> {
        let mut last_error = None;

        for source in &self.sources {
            match source.get_credentials() {
                Ok(credential) => {
                    info!(source = %source.describe(), "Credentials loaded");
                    return Ok(credential);
                }
                Err(err) => {
                    debug!(source = %source.describe(), error = %err, "Credential source failed");
                    last_error = Some(err);
                }
            }
        }

        match last_error {
            Some(last) => {
                warn!(attempted = self.sources.len(), "No credential source produced a login");
                Err(CredentialSourceError::Exhausted {
                    attempted: self.sources.len(),
                    last: Box::new(last),
                })
            }
            None => Err(CredentialSourceError::NoSources),
        }
    }
}

impl fmt::Debug for CredentialManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialManager").field("sources", &self.describe()).finish()
    }
}
