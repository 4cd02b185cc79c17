//! Document sources and the authoritative buffer
//!
//! The editor holds exactly one authoritative byte buffer. It is fetched once
//! per source identity; structural mutations replace it wholesale with a new
//! buffer whose identity is `Edited(n)`, so nothing is ever re-fetched from a
//! stale locator after an edit.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

use crate::error::LoadError;

/// Where the document bytes come from.
#[derive(Clone)]
pub enum DocumentSource {
    Url(String),
    Path(PathBuf),
    Bytes { name: String, bytes: Arc<[u8]> },
}

impl DocumentSource {
    pub fn bytes(name: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
        DocumentSource::Bytes {
            name: name.into(),
            bytes: bytes.into(),
        }
    }

    /// Human-readable name used for downloads and log lines.
    pub fn display_name(&self) -> String {
        match self {
            DocumentSource::Url(url) => url
                .rsplit('/')
                .find(|segment| !segment.is_empty())
                .unwrap_or(url)
                .to_string(),
            DocumentSource::Path(path) => path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string()),
            DocumentSource::Bytes { name, .. } => name.clone(),
        }
    }

    fn id(&self) -> SourceId {
        match self {
            DocumentSource::Url(url) => SourceId::Url(url.clone()),
            DocumentSource::Path(path) => SourceId::Path(path.clone()),
            DocumentSource::Bytes { bytes, .. } => SourceId::Memory(Arc::as_ptr(bytes) as *const u8 as usize),
        }
    }
}

impl fmt::Debug for DocumentSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocumentSource::Url(url) => f.debug_tuple("Url").field(url).finish(),
            DocumentSource::Path(path) => f.debug_tuple("Path").field(path).finish(),
            DocumentSource::Bytes { name, bytes } => f
                .debug_struct("Bytes")
                .field("name", name)
                .field("len", &bytes.len())
                .finish(),
        }
    }
}

/// Identity of the bytes currently held.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SourceId {
    Url(String),
    Path(PathBuf),
    Memory(usize),
    /// Produced by the n-th successful structural mutation
    Edited(u64),
}

/// Retrieves the bytes behind a URL.
#[allow(async_fn_in_trait)]
pub trait Fetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, LoadError>;
}

/// Fetcher for hosts that only ever hand the editor in-memory bytes.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoFetcher;

impl Fetcher for NoFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, LoadError> {
        Err(LoadError::Fetch {
            url: url.to_string(),
            reason: "remote sources are not supported by this host".to_string(),
        })
    }
}

#[cfg(feature = "http")]
#[derive(Debug, Clone, Default)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

#[cfg(feature = "http")]
impl HttpFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[cfg(feature = "http")]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, LoadError> {
        let fail = |reason: String| LoadError::Fetch {
            url: url.to_string(),
            reason,
        };
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| fail(e.to_string()))?
            .error_for_status()
            .map_err(|e| fail(e.to_string()))?;
        let bytes = response.bytes().await.map_err(|e| fail(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}

/// Read the bytes behind `source` without caching them.
pub async fn read_source<F: Fetcher>(
    source: &DocumentSource,
    fetcher: &F,
) -> Result<Arc<[u8]>, LoadError> {
    match source {
        DocumentSource::Url(url) => {
            info!(url = %url, "fetching document");
            Ok(fetcher.fetch(url).await?.into())
        }
        local => read_local(local),
    }
}

/// Read a source that needs no network. URLs are refused.
pub fn read_local(source: &DocumentSource) -> Result<Arc<[u8]>, LoadError> {
    match source {
        DocumentSource::Bytes { bytes, .. } => Ok(Arc::clone(bytes)),
        DocumentSource::Path(path) => std::fs::read(path)
            .map(Arc::from)
            .map_err(|e| LoadError::Io {
                path: path.display().to_string(),
                reason: e.to_string(),
            }),
        DocumentSource::Url(url) => Err(LoadError::Fetch {
            url: url.clone(),
            reason: "remote sources must be loaded asynchronously".to_string(),
        }),
    }
}

/// The single current byte representation of the document.
#[derive(Debug, Default)]
pub struct AuthoritativeBuffer {
    held: Option<(SourceId, Arc<[u8]>)>,
    edits: u64,
}

impl AuthoritativeBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_loaded(&self) -> bool {
        self.held.is_some()
    }

    pub fn source_id(&self) -> Option<&SourceId> {
        self.held.as_ref().map(|(id, _)| id)
    }

    /// Bytes currently held, if any.
    pub fn current(&self) -> Result<Arc<[u8]>, LoadError> {
        self.held
            .as_ref()
            .map(|(_, bytes)| Arc::clone(bytes))
            .ok_or(LoadError::NotLoaded)
    }

    /// Bytes for `source`, fetching only when its identity differs from what
    /// is held. A failed fetch leaves the held buffer untouched.
    pub async fn resolve<F: Fetcher>(
        &mut self,
        source: &DocumentSource,
        fetcher: &F,
    ) -> Result<Arc<[u8]>, LoadError> {
        self.resolve_with(source, fetcher, |_| Ok(())).await
    }

    /// Like [`resolve`](Self::resolve), but newly read bytes must pass
    /// `check` before they replace the held buffer.
    pub async fn resolve_with<F, C>(
        &mut self,
        source: &DocumentSource,
        fetcher: &F,
        check: C,
    ) -> Result<Arc<[u8]>, LoadError>
    where
        F: Fetcher,
        C: FnOnce(&[u8]) -> Result<(), LoadError>,
    {
        let id = source.id();
        if let Some(bytes) = self.held_for(&id) {
            return Ok(bytes);
        }
        let bytes = read_source(source, fetcher).await?;
        self.install(id, bytes, check)
    }

    /// Synchronous [`resolve_with`](Self::resolve_with) for in-memory and
    /// local file sources.
    pub fn resolve_local_with<C>(
        &mut self,
        source: &DocumentSource,
        check: C,
    ) -> Result<Arc<[u8]>, LoadError>
    where
        C: FnOnce(&[u8]) -> Result<(), LoadError>,
    {
        let id = source.id();
        if let Some(bytes) = self.held_for(&id) {
            return Ok(bytes);
        }
        let bytes = read_local(source)?;
        self.install(id, bytes, check)
    }

    fn held_for(&self, id: &SourceId) -> Option<Arc<[u8]>> {
        match &self.held {
            Some((held_id, bytes)) if held_id == id => {
                debug!(?id, "reusing held document bytes");
                Some(Arc::clone(bytes))
            }
            _ => None,
        }
    }

    fn install<C>(&mut self, id: SourceId, bytes: Arc<[u8]>, check: C) -> Result<Arc<[u8]>, LoadError>
    where
        C: FnOnce(&[u8]) -> Result<(), LoadError>,
    {
        check(&bytes)?;
        self.held = Some((id, Arc::clone(&bytes)));
        Ok(bytes)
    }

    /// Install the output of a successful structural mutation.
    pub fn replace(&mut self, bytes: Vec<u8>) -> Arc<[u8]> {
        self.edits += 1;
        let bytes: Arc<[u8]> = bytes.into();
        self.held = Some((SourceId::Edited(self.edits), Arc::clone(&bytes)));
        bytes
    }

    pub fn clear(&mut self) {
        self.held = None;
    }
}
