//! Loading of the two client libraries a session depends on
//!
//! The API client library is the Google discovery directory (which REST
//! services exist and where their descriptions live); the identity library is
//! the provider's OpenID configuration (authorization, token, userinfo and
//! revocation endpoints). Both are fetched concurrently, exactly once.

use log::{debug, error, info};
use std::sync::{mpsc, Arc, Mutex, PoisonError};

use super::api::{DiscoveryDirectory, OpenIdConfiguration};
use crate::error::{Error, Library};
use crate::http::HttpTransport;

/// Loaded client libraries
#[derive(Debug, Clone)]
pub struct Libraries {
    pub directory: DiscoveryDirectory,
    pub identity: OpenIdConfiguration,
}

impl Libraries {
    pub fn new(directory: DiscoveryDirectory, identity: OpenIdConfiguration) -> Self {
        Self {
            directory,
            identity,
        }
    }
}

enum Loaded {
    Directory(Result<DiscoveryDirectory, Error>),
    Identity(Result<OpenIdConfiguration, Error>),
}

/// Idempotent loader for the API client and identity libraries
pub struct LibraryLoader {
    transport: Arc<dyn HttpTransport>,
    directory_url: String,
    identity_url: String,
    loaded: Mutex<Option<Arc<Libraries>>>,
}

impl LibraryLoader {
    /// Discovery directory of preferred API versions
    pub const DIRECTORY_URL: &'static str =
        "https://www.googleapis.com/discovery/v1/apis?preferred=true";

    /// OpenID configuration of Google's identity platform
    pub const IDENTITY_URL: &'static str =
        "https://accounts.google.com/.well-known/openid-configuration";

    pub fn new(transport: Arc<dyn HttpTransport>) -> Self {
        Self::with_urls(transport, Self::DIRECTORY_URL, Self::IDENTITY_URL)
    }

    /// Create a loader reading the libraries from custom locations
    pub fn with_urls(
        transport: Arc<dyn HttpTransport>,
        directory_url: impl Into<String>,
        identity_url: impl Into<String>,
    ) -> Self {
        Self {
            transport,
            directory_url: directory_url.into(),
            identity_url: identity_url.into(),
            loaded: Mutex::new(None),
        }
    }

    /// Whether both libraries have been loaded
    pub fn is_loaded(&self) -> bool {
        self.loaded
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Load both libraries, or return the already-loaded pair
    ///
    /// Succeeds only when both loads succeed. The first failure to arrive is
    /// reported, naming the library. Nothing is retried; after a failure the
    /// loader stays unloaded and may be called again.
    pub fn ensure_loaded(&self) -> Result<Arc<Libraries>, Error> {
        if let Some(libraries) = self
            .loaded
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
        {
            debug!("Libraries already loaded");
            return Ok(Arc::clone(libraries));
        }

        info!("Loading API client and identity libraries");
        let (tx, rx) = mpsc::channel();

        let outcome = std::thread::scope(|scope| {
            let directory_tx = tx.clone();
            scope.spawn(move || {
                let result = self.fetch(Library::ApiClient, &self.directory_url);
                let _ = directory_tx.send(Loaded::Directory(result));
            });

            let identity_tx = tx;
            scope.spawn(move || {
                let result = self.fetch(Library::Identity, &self.identity_url);
                let _ = identity_tx.send(Loaded::Identity(result));
            });

            let mut directory = None;
            let mut identity = None;
            for loaded in rx.iter().take(2) {
                match loaded {
                    Loaded::Directory(result) => directory = Some(result?),
                    Loaded::Identity(result) => identity = Some(result?),
                }
            }

            let directory = directory.ok_or_else(|| Self::interrupted(Library::ApiClient))?;
            let identity = identity.ok_or_else(|| Self::interrupted(Library::Identity))?;
            Ok(Libraries::new(directory, identity))
        });

        let libraries = Arc::new(outcome.inspect_err(|e| error!("{}", e))?);
        info!("Both libraries loaded");

        let mut loaded = self.loaded.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(Arc::clone(loaded.get_or_insert(libraries)))
    }

    fn fetch<T: serde::de::DeserializeOwned>(&self, library: Library, url: &str) -> Result<T, Error> {
        debug!("Fetching {} library from {}", library, url);
        let response = self.transport.get(url, None).map_err(|e| Error::LibraryLoad {
            library,
            message: e.to_string(),
        })?;

        if !response.is_success() {
            return Err(Error::LibraryLoad {
                library,
                message: format!("HTTP {}", response.status),
            });
        }

        let parsed = response.json().map_err(|e| Error::LibraryLoad {
            library,
            message: format!("invalid document: {}", e),
        })?;
        debug!("{} library loaded", library);
        Ok(parsed)
    }

    fn interrupted(library: Library) -> Error {
        Error::LibraryLoad {
            library,
            message: "loader stopped before the library arrived".to_string(),
        }
    }
}
