//! In-memory `MusicApi` double shared by the unit tests.

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use chrono::{TimeZone, Utc};
use rspotify::ClientError;

use crate::clients::{
    MusicApi,
    entities::{
        ArtistRecord, ArtistSelection, LibraryPage, LibraryTrack, SavedTrackEntry, TimeWindow,
        TrackRecord,
    },
    errors::{Error, FailureKind, Result},
};

#[derive(Default)]
pub struct FakeApi {
    pub top_tracks: Vec<String>,
    pub top_artists: Vec<String>,
    pub tracks: HashMap<String, TrackRecord>,
    pub artists: HashMap<String, ArtistRecord>,
    pub library: Vec<SavedTrackEntry>,
    /// Outcome of the next detail/page calls; `None` lets the call through.
    pub script: RefCell<VecDeque<Option<FailureKind>>>,
    /// `Retry-After` carried by scripted rate-limit failures.
    pub rate_limit_hint: Option<Duration>,
    /// Every detail id or page offset requested, including failed ones.
    pub requests: RefCell<Vec<String>>,
}

impl FakeApi {
    pub fn fail_next(&self, outcomes: impl IntoIterator<Item = Option<FailureKind>>) {
        self.script.borrow_mut().extend(outcomes);
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.borrow().clone()
    }

    fn call(&self, key: String) -> Result<()> {
        self.requests.borrow_mut().push(key);
        match self.script.borrow_mut().pop_front().flatten() {
            None => Ok(()),
            Some(FailureKind::RateLimited) => Err(Error::RateLimited {
                retry_after: self.rate_limit_hint,
            }),
            Some(FailureKind::Transient) => Err(Error::SpotifyError(ClientError::Io(
                std::io::Error::new(std::io::ErrorKind::TimedOut, "timed out"),
            ))),
            Some(FailureKind::Fatal) => Err(Error::SpotifyError(ClientError::InvalidToken)),
        }
    }
}

impl MusicApi for FakeApi {
    async fn top_track_ids(&self, limit: u32, _window: TimeWindow) -> Result<Vec<String>> {
        Ok(self.top_tracks.iter().take(limit as usize).cloned().collect())
    }

    async fn top_artist_ids(&self, limit: u32, _window: TimeWindow) -> Result<Vec<String>> {
        Ok(self.top_artists.iter().take(limit as usize).cloned().collect())
    }

    async fn track_record(&self, id: &str, _selection: ArtistSelection) -> Result<TrackRecord> {
        self.call(id.to_string())?;
        let record = self
            .tracks
            .get(id)
            .cloned()
            .unwrap_or_else(|| panic!("FakeApi has no track {id}"));
        Ok(record)
    }

    async fn artist_record(&self, id: &str) -> Result<ArtistRecord> {
        self.call(id.to_string())?;
        let record = self
            .artists
            .get(id)
            .cloned()
            .unwrap_or_else(|| panic!("FakeApi has no artist {id}"));
        Ok(record)
    }

    async fn saved_tracks_page(&self, limit: u32, offset: u32) -> Result<LibraryPage> {
        self.call(offset.to_string())?;
        let items = self
            .library
            .iter()
            .skip(offset as usize)
            .take(limit as usize)
            .cloned()
            .collect();
        Ok(LibraryPage {
            items,
            total: u32::try_from(self.library.len()).unwrap(),
        })
    }
}

pub fn track(name: &str, tempo: f32, danceability: f32, popularity: u32) -> TrackRecord {
    TrackRecord {
        name: name.to_string(),
        album: format!("{name} (album)"),
        artist: "Someone".to_string(),
        release_date: Some("2020-01-01".to_string()),
        duration_ms: 200_000,
        popularity,
        acousticness: 0.25,
        danceability,
        energy: 0.5,
        instrumentalness: 0.0,
        liveness: 0.125,
        loudness: -7.0,
        speechiness: 0.0625,
        tempo,
        time_signature: 4,
        valence: 0.75,
    }
}

pub fn artist(name: &str, genres: &[&str]) -> ArtistRecord {
    ArtistRecord {
        name: name.to_string(),
        followers: 1000,
        genres: genres.iter().map(ToString::to_string).collect(),
        popularity: 50,
        kind: "artist".to_string(),
    }
}

pub fn saved(n: u32) -> SavedTrackEntry {
    SavedTrackEntry {
        added_at: Utc.timestamp_opt(1_600_000_000 + i64::from(n), 0).unwrap(),
        track: LibraryTrack {
            id: Some(format!("saved{n}")),
            name: format!("Song {n}"),
            album: "Album".to_string(),
            artists: vec![format!("Artist {n}")],
            duration_ms: 180_000,
            popularity: 40,
        },
    }
}
