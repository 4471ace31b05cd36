//! Image pipeline: executes loader commands against an [`ImageFetcher`].
//!
//! DESIGN
//! ======
//! The canvas loader decides *what* to fetch; this module does the fetching.
//! Every fetch runs as its own spawned task and reports back over an mpsc
//! channel, so the session drains results between input events without ever
//! blocking on the network. Full-resolution fetches keep their `AbortHandle`
//! so the loader can cancel them when an entity scrolls out of view.
//!
//! Bytes are cached per project, keyed by URL. A project switch calls
//! [`ImagePipeline::reset`], which aborts every task, drops the cache and
//! bumps a generation counter; results tagged with an older generation are
//! discarded on receipt.
//!
//! Within a generation each spawned task also carries a sequence number. A
//! result is only delivered while its task is still the one tracked for that
//! `(id, full)` key, so a fetch that finished just before being cancelled
//! cannot retire or impersonate a newer fetch for the same entity.

use std::collections::HashMap;
use std::sync::Arc;

use canvas::entity::EntityId;
use canvas::loader::LoadCommand;
use tokio::sync::mpsc;
use tokio::task::AbortHandle;

use crate::config::HttpTimeouts;

// =============================================================================
// ERROR
// =============================================================================

/// Errors produced while fetching image bytes.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ImageError {
    /// The request could not be sent or the body could not be read.
    #[error("image request failed: {0}")]
    Request(String),

    /// The image host returned a non-success HTTP status.
    #[error("image fetch failed: status {status} for {url}")]
    Status { status: u16, url: String },

    /// The underlying HTTP client could not be constructed.
    #[error("HTTP client build failed: {0}")]
    HttpClientBuild(String),
}

// =============================================================================
// FETCHER
// =============================================================================

/// Source of image bytes. Enables mocking in tests.
#[async_trait::async_trait]
pub trait ImageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, ImageError>;
}

/// Fetches images over HTTP(S).
pub struct HttpImageFetcher {
    http: reqwest::Client,
}

impl HttpImageFetcher {
    /// # Errors
    ///
    /// Returns [`ImageError::HttpClientBuild`] if reqwest cannot build a client.
    pub fn new(timeouts: HttpTimeouts) -> Result<Self, ImageError> {
        let http = reqwest::Client::builder()
            .timeout(timeouts.request())
            .connect_timeout(timeouts.connect())
            .build()
            .map_err(|e| ImageError::HttpClientBuild(e.to_string()))?;
        Ok(Self { http })
    }
}

#[async_trait::async_trait]
impl ImageFetcher for HttpImageFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, ImageError> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| ImageError::Request(e.to_string()))?;

        let status = response.status().as_u16();
        if !(200..300).contains(&status) {
            return Err(ImageError::Status { status, url: url.to_owned() });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| ImageError::Request(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}

// =============================================================================
// EVENTS
// =============================================================================

/// A finished fetch, ready to be fed back into the engine.
#[derive(Debug, Clone)]
pub enum ImageEvent {
    Loaded { id: EntityId, full: bool, bytes: Arc<Vec<u8>> },
    Failed { id: EntityId, full: bool, error: ImageError },
}

impl ImageEvent {
    #[must_use]
    pub fn id(&self) -> EntityId {
        match self {
            Self::Loaded { id, .. } | Self::Failed { id, .. } => *id,
        }
    }

    #[must_use]
    pub fn is_full(&self) -> bool {
        match self {
            Self::Loaded { full, .. } | Self::Failed { full, .. } => *full,
        }
    }
}

/// Channel message: the event plus what the receiver needs to file it.
struct Completion {
    generation: u64,
    /// Task sequence number; `None` for cache hits, which have no task.
    seq: Option<u64>,
    url: String,
    event: ImageEvent,
}

// =============================================================================
// PIPELINE
// =============================================================================

type FetchKey = (EntityId, bool);

struct InFlight {
    seq: u64,
    handle: AbortHandle,
}

pub struct ImagePipeline {
    fetcher: Arc<dyn ImageFetcher>,
    tx: mpsc::UnboundedSender<Completion>,
    rx: mpsc::UnboundedReceiver<Completion>,
    in_flight: HashMap<FetchKey, InFlight>,
    cache: HashMap<String, Arc<Vec<u8>>>,
    generation: u64,
    next_seq: u64,
}

impl ImagePipeline {
    #[must_use]
    pub fn new(fetcher: Arc<dyn ImageFetcher>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self { fetcher, tx, rx, in_flight: HashMap::new(), cache: HashMap::new(), generation: 0, next_seq: 0 }
    }

    /// Carry out one loader command. Must be called inside a tokio runtime.
    ///
    /// Cache hits complete immediately: the event is queued on the channel
    /// and shows up on the next [`drain`](Self::drain).
    pub fn execute(&mut self, command: LoadCommand) {
        match command {
            LoadCommand::FetchThumbnail { id, url } => self.start(id, false, url),
            LoadCommand::FetchFull { id, url } => self.start(id, true, url),
            LoadCommand::CancelFull { id } => {
                if let Some(task) = self.in_flight.remove(&(id, true)) {
                    task.handle.abort();
                    tracing::debug!(%id, "full fetch cancelled");
                }
            }
        }
    }

    fn start(&mut self, id: EntityId, full: bool, url: String) {
        if let Some(bytes) = self.cache.get(&url) {
            let event = ImageEvent::Loaded { id, full, bytes: Arc::clone(bytes) };
            self.send_local(Completion { generation: self.generation, seq: None, url, event });
            return;
        }
        if self.in_flight.contains_key(&(id, full)) {
            return;
        }

        let fetcher = Arc::clone(&self.fetcher);
        let tx = self.tx.clone();
        let generation = self.generation;
        let seq = self.next_seq;
        self.next_seq += 1;
        let task = tokio::spawn(async move {
            let event = match fetcher.fetch(&url).await {
                Ok(bytes) => ImageEvent::Loaded { id, full, bytes: Arc::new(bytes) },
                Err(error) => ImageEvent::Failed { id, full, error },
            };
            if tx.send(Completion { generation, seq: Some(seq), url, event }).is_err() {
                tracing::debug!(%id, "image pipeline dropped before fetch finished");
            }
        });
        self.in_flight.insert((id, full), InFlight { seq, handle: task.abort_handle() });
    }

    fn send_local(&self, completion: Completion) {
        if self.tx.send(completion).is_err() {
            tracing::debug!("image pipeline channel closed");
        }
    }

    /// Every result received so far, without waiting.
    pub fn drain(&mut self) -> Vec<ImageEvent> {
        let mut events = Vec::new();
        while let Ok(completion) = self.rx.try_recv() {
            if let Some(event) = self.accept(completion) {
                events.push(event);
            }
        }
        events
    }

    /// Wait for the next current-generation result.
    pub async fn next(&mut self) -> Option<ImageEvent> {
        loop {
            let completion = self.rx.recv().await?;
            if let Some(event) = self.accept(completion) {
                return Some(event);
            }
        }
    }

    fn accept(&mut self, completion: Completion) -> Option<ImageEvent> {
        if completion.generation != self.generation {
            return None;
        }
        let Completion { seq, url, event, .. } = completion;
        if let Some(seq) = seq {
            let key = (event.id(), event.is_full());
            if self.in_flight.get(&key).is_none_or(|task| task.seq != seq) {
                if let ImageEvent::Loaded { bytes, .. } = &event {
                    self.cache.entry(url).or_insert_with(|| Arc::clone(bytes));
                }
                tracing::debug!(id = %key.0, full = key.1, "superseded image result dropped");
                return None;
            }
            self.in_flight.remove(&key);
        }
        match &event {
            ImageEvent::Loaded { bytes, .. } => {
                self.cache.entry(url).or_insert_with(|| Arc::clone(bytes));
            }
            ImageEvent::Failed { id, full, error } => {
                tracing::warn!(%id, full, error = %error, "image fetch failed");
            }
        }
        Some(event)
    }

    /// Cached bytes for `url`, if fetched during this project.
    #[must_use]
    pub fn cached(&self, url: &str) -> Option<Arc<Vec<u8>>> {
        self.cache.get(url).cloned()
    }

    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    #[must_use]
    pub fn is_fetching(&self, id: &EntityId, full: bool) -> bool {
        self.in_flight.contains_key(&(*id, full))
    }

    /// Abort everything and forget the project's cache.
    pub fn reset(&mut self) {
        for task in self.in_flight.values() {
            task.handle.abort();
        }
        self.in_flight.clear();
        self.cache.clear();
        self.generation += 1;
    }
}

impl Drop for ImagePipeline {
    fn drop(&mut self) {
        for task in self.in_flight.values() {
            task.handle.abort();
        }
    }
}

#[cfg(test)]
#[path = "images_test.rs"]
mod tests;
