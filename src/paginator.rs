use log::{debug, warn};

use crate::clients::{
    MusicApi,
    entities::SavedTrackEntry,
    errors::{FailureKind, PaginationError},
    spotify::MAX_LIMIT,
};
use crate::progress::{Phase, ProgressEvent, ProgressSink};
use crate::retry::RetryPolicy;

/// Where a `Paginator` is in its walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaginatorState {
    /// Nothing requested yet.
    Init,
    /// Requesting, or retrying, the page at `offset`.
    Fetching {
        /// Offset of the page in flight.
        offset: u32,
    },
    /// Every item up to the reported total was collected.
    Done,
    /// The walk gave up.
    Failed,
}

/// Walks the saved-tracks library page by page until the reported total
/// has been collected.
pub struct Paginator<'a, A> {
    api: &'a A,
    page_size: u32,
    retry: RetryPolicy,
    state: PaginatorState,
}

impl<'a, A: MusicApi> Paginator<'a, A> {
    /// Paginator with `MAX_LIMIT` pages and the default retry policy.
    pub fn new(api: &'a A) -> Self {
        Paginator {
            api,
            page_size: MAX_LIMIT,
            retry: RetryPolicy::default(),
            state: PaginatorState::Init,
        }
    }

    #[must_use]
    /// Items requested per page, at most `MAX_LIMIT`.
    pub fn page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    #[must_use]
    /// Retry policy for transient and rate-limit failures.
    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Current state.
    pub fn state(&self) -> PaginatorState {
        self.state
    }

    /// Walks the whole library from offset 0, reporting progress per page.
    ///
    /// Fatal errors end the walk at once; retryable ones are retried on the
    /// same offset until `max_retries` consecutive failures.
    pub async fn fetch_all(
        &mut self,
        progress: &mut dyn ProgressSink,
    ) -> Result<Vec<SavedTrackEntry>, PaginationError> {
        let mut items: Vec<SavedTrackEntry> = vec![];
        let mut total: Option<usize> = None;
        let mut offset = 0u32;
        let mut failures = 0u32;

        loop {
            self.state = PaginatorState::Fetching { offset };
            let page = match self.api.saved_tracks_page(self.page_size, offset).await {
                Ok(page) => page,
                Err(e) if e.failure_kind() == FailureKind::Fatal => {
                    self.state = PaginatorState::Failed;
                    return Err(PaginationError::Fatal {
                        offset,
                        source: Box::new(e),
                    });
                }
                Err(e) => {
                    failures += 1;
                    if failures > self.retry.max_retries {
                        self.state = PaginatorState::Failed;
                        return Err(PaginationError::RetriesExhausted {
                            offset,
                            attempts: failures,
                            source: Box::new(e),
                        });
                    }
                    warn!("Page at offset {offset} failed ({e})");
                    if !self.retry.wait(failures, e.retry_after()).await {
                        self.state = PaginatorState::Failed;
                        return Err(PaginationError::RetriesExhausted {
                            offset,
                            attempts: failures,
                            source: Box::new(e),
                        });
                    }
                    continue;
                }
            };
            failures = 0;

            let total = *total.get_or_insert(page.total as usize);
            if page.items.is_empty() {
                if items.len() < total {
                    warn!(
                        "Library ended at {} of {total} tracks, it probably shrank",
                        items.len()
                    );
                }
                break;
            }

            let received = page.items.len();
            items.extend(page.items);
            debug!("Fetched {received} saved tracks at offset {offset}");
            offset = offset.saturating_add(u32::try_from(received).unwrap_or(u32::MAX));

            progress.report(ProgressEvent {
                phase: Phase::Library,
                current: items.len().min(total),
                total,
            });
            if items.len() >= total {
                items.truncate(total);
                break;
            }
        }

        self.state = PaginatorState::Done;
        Ok(items)
    }
}
