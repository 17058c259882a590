use std::future::Future;
use std::time::Duration;

use log::{debug, info, warn};

use crate::clients::{
    MusicApi,
    entities::{ArtistRecord, ArtistSelection, TimeWindow, TrackRecord},
    errors::{FailureKind, Result},
};
use crate::progress::{Phase, ProgressEvent, ProgressSink};
use crate::retry::RetryPolicy;

/// Default pause between two detail requests.
pub const DEFAULT_THROTTLE: Duration = Duration::from_millis(100);

/// The user's top tracks and artists, in rank order.
#[derive(Debug, Clone, PartialEq)]
pub struct TopTaste {
    /// Top tracks with audio features.
    pub tracks: Vec<TrackRecord>,
    /// Top artist profiles.
    pub artists: Vec<ArtistRecord>,
}

/// Resolves top-item ids into detailed records, one request at a time.
///
/// Only rate-limit failures are retried; any other failure aborts the walk.
pub struct TopTasteFetcher<'a, A> {
    api: &'a A,
    throttle: Duration,
    retry: RetryPolicy,
    selection: ArtistSelection,
}

impl<'a, A: MusicApi> TopTasteFetcher<'a, A> {
    /// Fetcher with the default throttle, retry policy and artist selection.
    pub fn new(api: &'a A) -> Self {
        TopTasteFetcher {
            api,
            throttle: DEFAULT_THROTTLE,
            retry: RetryPolicy::default(),
            selection: ArtistSelection::default(),
        }
    }

    #[must_use]
    /// Pause between two detail requests.
    pub fn throttle(mut self, throttle: Duration) -> Self {
        self.throttle = throttle;
        self
    }

    #[must_use]
    /// Backoff for rate-limited requests.
    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    #[must_use]
    /// Which credited artists each track keeps.
    pub fn artist_selection(mut self, selection: ArtistSelection) -> Self {
        self.selection = selection;
        self
    }

    /// Top `limit` tracks then artists over `window`, resolved in rank order.
    pub async fn fetch(
        &self,
        limit: u32,
        window: TimeWindow,
        progress: &mut dyn ProgressSink,
    ) -> Result<TopTaste> {
        let track_ids = self.api.top_track_ids(limit, window).await?;
        let artist_ids = self.api.top_artist_ids(limit, window).await?;
        info!(
            "Resolving {} top tracks and {} top artists ({window:?} window)",
            track_ids.len(),
            artist_ids.len()
        );

        let tracks = self.fetch_tracks(&track_ids, progress).await?;
        let artists = self.fetch_artists(&artist_ids, progress).await?;
        Ok(TopTaste { tracks, artists })
    }

    /// Resolves track ids into records, reporting `Phase::TopTracks`.
    pub async fn fetch_tracks(
        &self,
        ids: &[String],
        progress: &mut dyn ProgressSink,
    ) -> Result<Vec<TrackRecord>> {
        let mut records = Vec::with_capacity(ids.len());
        for (i, id) in ids.iter().enumerate() {
            self.pause(i).await;
            let record = self
                .retrying(id, || self.api.track_record(id, self.selection))
                .await?;
            records.push(record);
            progress.report(ProgressEvent {
                phase: Phase::TopTracks,
                current: i + 1,
                total: ids.len(),
            });
        }
        Ok(records)
    }

    /// Resolves artist ids into records, reporting `Phase::TopArtists`.
    pub async fn fetch_artists(
        &self,
        ids: &[String],
        progress: &mut dyn ProgressSink,
    ) -> Result<Vec<ArtistRecord>> {
        let mut records = Vec::with_capacity(ids.len());
        for (i, id) in ids.iter().enumerate() {
            self.pause(i).await;
            let record = self.retrying(id, || self.api.artist_record(id)).await?;
            records.push(record);
            progress.report(ProgressEvent {
                phase: Phase::TopArtists,
                current: i + 1,
                total: ids.len(),
            });
        }
        Ok(records)
    }

    async fn pause(&self, index: usize) {
        if index > 0 && !self.throttle.is_zero() {
            tokio::time::sleep(self.throttle).await;
        }
    }

    async fn retrying<T, F, Fut>(&self, id: &str, mut call: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 0;
        loop {
            match call().await {
                Ok(value) => return Ok(value),
                Err(e)
                    if e.failure_kind() == FailureKind::RateLimited
                        && attempt < self.retry.max_retries =>
                {
                    attempt += 1;
                    warn!("Rate limited while fetching {id}");
                    if !self.retry.wait(attempt, e.retry_after()).await {
                        return Err(e);
                    }
                }
                Err(e) => {
                    debug!("Fetching {id} failed: {e}");
                    return Err(e);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::errors::Error;
    use crate::testing::{FakeApi, artist, track};

    fn api() -> FakeApi {
        FakeApi {
            top_tracks: vec!["t1".into(), "t2".into(), "t3".into()],
            top_artists: vec!["a1".into(), "a2".into()],
            tracks: [
                ("t1".to_string(), track("First", 120.0, 0.5, 90)),
                ("t2".to_string(), track("Second", 100.0, 0.75, 60)),
                ("t3".to_string(), track("Third", 90.0, 0.25, 30)),
            ]
            .into(),
            artists: [
                ("a1".to_string(), artist("Alpha", &["pop"])),
                ("a2".to_string(), artist("Beta", &["rock", "pop"])),
            ]
            .into(),
            ..Default::default()
        }
    }

    fn fetcher(api: &FakeApi) -> TopTasteFetcher<'_, FakeApi> {
        TopTasteFetcher::new(api)
            .throttle(Duration::ZERO)
            .retry(RetryPolicy::immediate(2))
    }

    #[tokio::test]
    async fn resolves_in_rank_order_and_reports_progress() {
        let api = api();
        let mut events = vec![];
        let taste = fetcher(&api)
            .fetch(50, TimeWindow::Medium, &mut |e: ProgressEvent| events.push(e))
            .await
            .unwrap();

        let names: Vec<_> = taste.tracks.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["First", "Second", "Third"]);
        let names: Vec<_> = taste.artists.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["Alpha", "Beta"]);

        let trail: Vec<_> = events.iter().map(|e| (e.phase, e.current, e.total)).collect();
        assert_eq!(
            trail,
            vec![
                (Phase::TopTracks, 1, 3),
                (Phase::TopTracks, 2, 3),
                (Phase::TopTracks, 3, 3),
                (Phase::TopArtists, 1, 2),
                (Phase::TopArtists, 2, 2),
            ]
        );
    }

    #[tokio::test]
    async fn limit_caps_the_id_lists() {
        let api = api();
        let taste = fetcher(&api)
            .fetch(1, TimeWindow::Short, &mut |_: ProgressEvent| {})
            .await
            .unwrap();
        assert_eq!(taste.tracks.len(), 1);
        assert_eq!(taste.artists.len(), 1);
    }

    #[tokio::test]
    async fn rate_limits_are_retried() {
        let api = api();
        api.fail_next([Some(FailureKind::RateLimited), Some(FailureKind::RateLimited)]);

        let tracks = fetcher(&api)
            .fetch_tracks(&["t2".to_string()], &mut |_: ProgressEvent| {})
            .await
            .unwrap();

        assert_eq!(tracks[0].name, "Second");
        assert_eq!(api.requests(), vec!["t2", "t2", "t2"]);
    }

    #[tokio::test]
    async fn rate_limit_budget_is_bounded() {
        let api = api();
        api.fail_next([Some(FailureKind::RateLimited); 3]);

        let err = fetcher(&api)
            .fetch_tracks(&["t1".to_string()], &mut |_: ProgressEvent| {})
            .await
            .unwrap_err();

        assert!(matches!(err, Error::RateLimited { .. }));
        assert_eq!(api.requests().len(), 3);
    }

    #[tokio::test]
    async fn other_failures_abort_the_run() {
        let api = api();
        api.fail_next([None, Some(FailureKind::Transient)]);

        let err = fetcher(&api)
            .fetch_artists(&["a1".to_string(), "a2".to_string()], &mut |_: ProgressEvent| {})
            .await
            .unwrap_err();

        assert_eq!(err.failure_kind(), FailureKind::Transient);
        assert_eq!(api.requests(), vec!["a1", "a2"]);
    }

    #[tokio::test]
    async fn oversized_retry_after_is_not_waited_out() {
        let api = FakeApi {
            rate_limit_hint: Some(Duration::from_secs(6 * 3600)),
            ..api()
        };
        api.fail_next([Some(FailureKind::RateLimited)]);

        let err = fetcher(&api)
            .fetch_tracks(&["t1".to_string()], &mut |_: ProgressEvent| {})
            .await
            .unwrap_err();

        assert_eq!(err.retry_after(), Some(Duration::from_secs(6 * 3600)));
        assert_eq!(api.requests(), vec!["t1"]);
    }
}
