use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use uuid::Uuid;

use super::*;

// =============================================================================
// Fake fetcher
// =============================================================================

/// Serves canned bytes; URLs starting with `slow:` never complete.
#[derive(Default)]
struct FakeFetcher {
    bodies: HashMap<String, Vec<u8>>,
    calls: Mutex<Vec<String>>,
}

impl FakeFetcher {
    fn with(urls: &[(&str, &[u8])]) -> Self {
        Self {
            bodies: urls.iter().map(|(u, b)| ((*u).to_owned(), b.to_vec())).collect(),
            calls: Mutex::new(Vec::new()),
        }
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl ImageFetcher for FakeFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, ImageError> {
        self.calls.lock().unwrap().push(url.to_owned());
        if url.starts_with("slow:") {
            std::future::pending::<()>().await;
        }
        self.bodies
            .get(url)
            .cloned()
            .ok_or_else(|| ImageError::Status { status: 404, url: url.to_owned() })
    }
}

fn pipeline(fetcher: &Arc<FakeFetcher>) -> ImagePipeline {
    let dyn_fetcher: Arc<dyn ImageFetcher> = fetcher.clone();
    ImagePipeline::new(dyn_fetcher)
}

async fn next_within(pipeline: &mut ImagePipeline, ms: u64) -> Option<ImageEvent> {
    tokio::time::timeout(Duration::from_millis(ms), pipeline.next()).await.ok().flatten()
}

// =============================================================================
// Fetching
// =============================================================================

#[tokio::test]
async fn thumbnail_fetch_reports_loaded_and_caches() {
    let fetcher = Arc::new(FakeFetcher::with(&[("https://img/a_t.png", b"thumb")]));
    let mut images = pipeline(&fetcher);
    let id = Uuid::new_v4();

    images.execute(LoadCommand::FetchThumbnail { id, url: "https://img/a_t.png".into() });
    assert!(images.is_fetching(&id, false));

    let event = next_within(&mut images, 1000).await.unwrap();
    assert!(matches!(&event, ImageEvent::Loaded { id: got, full: false, bytes } if *got == id && bytes.as_slice() == b"thumb"));
    assert_eq!(images.in_flight(), 0);
    assert_eq!(images.cached("https://img/a_t.png").unwrap().as_slice(), b"thumb");
}

#[tokio::test]
async fn cache_hit_skips_fetcher() {
    let fetcher = Arc::new(FakeFetcher::with(&[("https://img/a.png", b"full")]));
    let mut images = pipeline(&fetcher);
    let id = Uuid::new_v4();

    images.execute(LoadCommand::FetchFull { id, url: "https://img/a.png".into() });
    next_within(&mut images, 1000).await.unwrap();

    images.execute(LoadCommand::FetchFull { id, url: "https://img/a.png".into() });
    let events = images.drain();
    assert_eq!(events.len(), 1);
    assert!(events[0].is_full());
    assert_eq!(fetcher.calls().len(), 1);
}

#[tokio::test]
async fn failed_fetch_reports_error() {
    let fetcher = Arc::new(FakeFetcher::default());
    let mut images = pipeline(&fetcher);
    let id = Uuid::new_v4();

    images.execute(LoadCommand::FetchFull { id, url: "https://img/missing.png".into() });
    let event = next_within(&mut images, 1000).await.unwrap();
    assert!(matches!(event, ImageEvent::Failed { full: true, error: ImageError::Status { status: 404, .. }, .. }));
    assert!(images.cached("https://img/missing.png").is_none());
}

#[tokio::test]
async fn duplicate_request_while_in_flight_is_ignored() {
    let fetcher = Arc::new(FakeFetcher::default());
    let mut images = pipeline(&fetcher);
    let id = Uuid::new_v4();

    images.execute(LoadCommand::FetchFull { id, url: "slow:a".into() });
    images.execute(LoadCommand::FetchFull { id, url: "slow:a".into() });
    assert_eq!(images.in_flight(), 1);
}

// =============================================================================
// Cancellation
// =============================================================================

#[tokio::test]
async fn cancel_full_aborts_the_task() {
    let fetcher = Arc::new(FakeFetcher::default());
    let mut images = pipeline(&fetcher);
    let id = Uuid::new_v4();

    images.execute(LoadCommand::FetchFull { id, url: "slow:big.png".into() });
    assert!(images.is_fetching(&id, true));

    images.execute(LoadCommand::CancelFull { id });
    assert!(!images.is_fetching(&id, true));
    assert!(next_within(&mut images, 50).await.is_none());
}

#[tokio::test]
async fn cancel_full_leaves_thumbnail_fetch_alone() {
    let fetcher = Arc::new(FakeFetcher::default());
    let mut images = pipeline(&fetcher);
    let id = Uuid::new_v4();

    images.execute(LoadCommand::FetchThumbnail { id, url: "slow:t.png".into() });
    images.execute(LoadCommand::CancelFull { id });
    assert!(images.is_fetching(&id, false));
}

#[tokio::test]
async fn result_of_cancelled_fetch_does_not_retire_its_replacement() {
    let fetcher = Arc::new(FakeFetcher::with(&[("https://img/a.png", b"old")]));
    let mut images = pipeline(&fetcher);
    let id = Uuid::new_v4();

    images.execute(LoadCommand::FetchFull { id, url: "https://img/a.png".into() });
    // Let the first fetch finish so its result sits unread on the channel.
    tokio::time::sleep(Duration::from_millis(30)).await;
    images.execute(LoadCommand::CancelFull { id });
    images.execute(LoadCommand::FetchFull { id, url: "slow:a2.png".into() });

    assert!(images.drain().is_empty());
    assert!(images.is_fetching(&id, true));
    assert_eq!(images.cached("https://img/a.png").unwrap().as_slice(), b"old");

    images.execute(LoadCommand::CancelFull { id });
    assert!(!images.is_fetching(&id, true));
}

#[tokio::test]
async fn reset_discards_queued_results_and_cache() {
    let fetcher = Arc::new(FakeFetcher::with(&[("https://img/a.png", b"a")]));
    let mut images = pipeline(&fetcher);
    let id = Uuid::new_v4();

    images.execute(LoadCommand::FetchFull { id, url: "https://img/a.png".into() });
    next_within(&mut images, 1000).await.unwrap();

    // Cache hit is queued synchronously, then the project goes away.
    images.execute(LoadCommand::FetchFull { id, url: "https://img/a.png".into() });
    images.execute(LoadCommand::FetchThumbnail { id, url: "slow:t".into() });
    images.reset();

    assert!(images.drain().is_empty());
    assert_eq!(images.in_flight(), 0);
    assert!(images.cached("https://img/a.png").is_none());
}
