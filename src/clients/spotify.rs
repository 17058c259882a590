use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

use log::debug;
use rspotify::{
    AuthCodeSpotify, ClientError, Config, Credentials, OAuth,
    http::HttpError,
    model::{ArtistId, AudioFeatures, FullArtist, FullTrack, SavedTrack, TrackId},
    prelude::*,
};

use crate::clients::{
    entities::{
        ArtistRecord, ArtistSelection, LibraryPage, LibraryTrack, SavedTrackEntry, TimeWindow,
        TrackRecord,
    },
    errors::{Error, Result},
};

/// Largest page the top-items and saved-tracks endpoints accept.
pub const MAX_LIMIT: u32 = 50;

const DEFAULT_REDIRECT_URI: &str = "http://127.0.0.1:8888/callback";

/// Remote operations the pipelines depend on.
///
/// `SpotifyClient` is the production implementation; tests plug in an
/// in-memory double.
#[allow(async_fn_in_trait)]
pub trait MusicApi {
    /// Ids of the user's top tracks in rank order.
    async fn top_track_ids(&self, limit: u32, window: TimeWindow) -> Result<Vec<String>>;

    /// Ids of the user's top artists in rank order.
    async fn top_artist_ids(&self, limit: u32, window: TimeWindow) -> Result<Vec<String>>;

    /// Track details merged with the track's audio features.
    async fn track_record(&self, id: &str, selection: ArtistSelection) -> Result<TrackRecord>;

    /// Artist profile.
    async fn artist_record(&self, id: &str) -> Result<ArtistRecord>;

    /// One page of the saved-tracks library.
    async fn saved_tracks_page(&self, limit: u32, offset: u32) -> Result<LibraryPage>;
}

/// OAuth scope a pipeline needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// `user-top-read`, for the top-taste pipeline.
    TopRead,
    /// `user-library-read`, for the library snapshot.
    LibraryRead,
}

impl Scope {
    /// Scope name as sent to the authorization endpoint.
    pub fn as_str(self) -> &'static str {
        match self {
            Scope::TopRead => "user-top-read",
            Scope::LibraryRead => "user-library-read",
        }
    }
}

/// Accepts a page or list size the API will take.
pub fn check_limit(limit: u32) -> Result<u32> {
    if (1..=MAX_LIMIT).contains(&limit) {
        Ok(limit)
    } else {
        Err(Error::ConfigurationError(format!(
            "limit must be between 1 and {MAX_LIMIT}, got {limit}"
        )))
    }
}

// Turn a 429 into a typed error carrying the Retry-After hint
fn api_error(err: ClientError) -> Error {
    if let ClientError::Http(http) = &err {
        if let HttpError::StatusCode(response) = http.as_ref() {
            if response.status().as_u16() == 429 {
                let retry_after = response
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.trim().parse::<u64>().ok())
                    .map(Duration::from_secs);
                return Error::RateLimited { retry_after };
            }
        }
    }
    Error::SpotifyError(err)
}

/// Flattens a track and its audio features into a `TrackRecord`.
pub fn track_record(
    track: FullTrack,
    features: &AudioFeatures,
    selection: ArtistSelection,
) -> TrackRecord {
    TrackRecord {
        artist: selection.pick(track.artists.iter().map(|a| a.name.as_str())),
        name: track.name,
        album: track.album.name,
        release_date: track.album.release_date,
        duration_ms: track.duration.num_milliseconds(),
        popularity: track.popularity,
        acousticness: features.acousticness,
        danceability: features.danceability,
        energy: features.energy,
        instrumentalness: features.instrumentalness,
        liveness: features.liveness,
        loudness: features.loudness,
        speechiness: features.speechiness,
        tempo: features.tempo,
        time_signature: features.time_signature,
        valence: features.valence,
    }
}

impl From<FullArtist> for ArtistRecord {
    fn from(f: FullArtist) -> ArtistRecord {
        ArtistRecord {
            name: f.name,
            followers: f.followers.total,
            genres: f.genres,
            popularity: f.popularity,
            kind: "artist".to_string(),
        }
    }
}

impl From<SavedTrack> for SavedTrackEntry {
    fn from(f: SavedTrack) -> SavedTrackEntry {
        SavedTrackEntry {
            added_at: f.added_at,
            track: LibraryTrack {
                id: f.track.id.map(|id| id.id().to_owned()),
                name: f.track.name,
                album: f.track.album.name,
                artists: f.track.artists.into_iter().map(|a| a.name).collect(),
                duration_ms: f.track.duration.num_milliseconds(),
                popularity: f.track.popularity,
            },
        }
    }
}

/// Authorization-code Spotify client scoped to one pipeline.
pub struct SpotifyClient {
    /// Underlying rspotify client.
    pub spotify: AuthCodeSpotify,
}

impl SpotifyClient {
    /// Wraps an already configured client.
    pub fn new(spotify: AuthCodeSpotify) -> Self {
        SpotifyClient { spotify }
    }

    /// Authorize the Spotify client via CLI prompt and OAuth flow.
    /// A cached token is reused when its scopes still match.
    pub async fn authorize_client(&self) -> Result<()> {
        debug!("Starting Spotify authorization ...");
        let url = self.spotify.get_authorize_url(false)?;
        self.spotify.prompt_for_token(&url).await?;
        let user = self.spotify.me().await?;
        debug!("Authenticated as user: {:?}", user.display_name);
        Ok(())
    }

    /// Create a `SpotifyClient` from environment variables or raise a configuration error.
    ///
    /// Reads `RSPOTIFY_CLIENT_ID`, `RSPOTIFY_CLIENT_SECRET` and optionally
    /// `RSPOTIFY_REDIRECT_URI`.
    pub fn try_default(scope: Scope) -> Result<Self> {
        let creds = Credentials::from_env().ok_or_else(|| {
            Error::ConfigurationError(
                "Missing RSPOTIFY_CLIENT_ID or RSPOTIFY_CLIENT_SECRET in environment variables."
                    .into(),
            )
        })?;
        let redirect_uri = std::env::var("RSPOTIFY_REDIRECT_URI")
            .unwrap_or_else(|_| DEFAULT_REDIRECT_URI.to_string());
        let oauth = OAuth {
            redirect_uri,
            scopes: HashSet::from([scope.as_str().to_owned()]),
            ..Default::default()
        };

        // One token cache per scope so the two pipelines never trade tokens
        let cache_path = dirs::cache_dir()
            .unwrap_or_else(|| PathBuf::from("/tmp")) // Fallback to /tmp if cache directory can't be determined
            .join(format!(".tastemap_token_{}", scope.as_str()));

        let spotify = AuthCodeSpotify::with_config(
            creds,
            oauth,
            Config {
                token_cached: true,
                token_refreshing: true,
                cache_path,
                ..Default::default()
            },
        );

        Ok(Self { spotify })
    }
}

impl MusicApi for SpotifyClient {
    async fn top_track_ids(&self, limit: u32, window: TimeWindow) -> Result<Vec<String>> {
        let page = self
            .spotify
            .current_user_top_tracks_manual(Some(window.into()), Some(check_limit(limit)?), Some(0))
            .await
            .map_err(api_error)?;
        debug!("Fetched {} of {} top tracks", page.items.len(), page.total);
        Ok(page
            .items
            .into_iter()
            .filter_map(|t| t.id)
            .map(|id| id.id().to_owned())
            .collect())
    }

    async fn top_artist_ids(&self, limit: u32, window: TimeWindow) -> Result<Vec<String>> {
        let page = self
            .spotify
            .current_user_top_artists_manual(Some(window.into()), Some(check_limit(limit)?), Some(0))
            .await
            .map_err(api_error)?;
        debug!("Fetched {} of {} top artists", page.items.len(), page.total);
        Ok(page
            .items
            .into_iter()
            .map(|a| a.id.id().to_owned())
            .collect())
    }

    async fn track_record(&self, id: &str, selection: ArtistSelection) -> Result<TrackRecord> {
        let track_id = TrackId::from_id(id)?;
        let track = self
            .spotify
            .track(track_id.clone(), None)
            .await
            .map_err(api_error)?;
        let features = self
            .spotify
            .track_features(track_id)
            .await
            .map_err(api_error)?;
        Ok(track_record(track, &features, selection))
    }

    async fn artist_record(&self, id: &str) -> Result<ArtistRecord> {
        let artist = self
            .spotify
            .artist(ArtistId::from_id(id)?)
            .await
            .map_err(api_error)?;
        Ok(ArtistRecord::from(artist))
    }

    async fn saved_tracks_page(&self, limit: u32, offset: u32) -> Result<LibraryPage> {
        let page = self
            .spotify
            .current_user_saved_tracks_manual(None, Some(check_limit(limit)?), Some(offset))
            .await
            .map_err(api_error)?;
        Ok(LibraryPage {
            total: page.total,
            items: page.items.into_iter().map(SavedTrackEntry::from).collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::errors::FailureKind;

    #[test]
    fn limit_is_bounded_by_the_api() {
        assert!(check_limit(0).is_err());
        assert_eq!(check_limit(1).unwrap(), 1);
        assert_eq!(check_limit(50).unwrap(), 50);
        assert!(matches!(
            check_limit(51),
            Err(Error::ConfigurationError(_))
        ));
    }

    #[test]
    fn scopes_match_pipelines() {
        assert_eq!(Scope::TopRead.as_str(), "user-top-read");
        assert_eq!(Scope::LibraryRead.as_str(), "user-library-read");
    }

    #[test]
    fn artist_profile_maps_to_record() {
        let artist: FullArtist = serde_json::from_value(serde_json::json!({
            "external_urls": { "spotify": "https://open.spotify.com/artist/4tZwfgrHOc3mvqYlEYSvVi" },
            "followers": { "href": null, "total": 9_000_000 },
            "genres": ["electro", "filter house"],
            "href": "https://api.spotify.com/v1/artists/4tZwfgrHOc3mvqYlEYSvVi",
            "id": "4tZwfgrHOc3mvqYlEYSvVi",
            "images": [],
            "name": "Daft Punk",
            "popularity": 80,
            "type": "artist",
            "uri": "spotify:artist:4tZwfgrHOc3mvqYlEYSvVi"
        }))
        .unwrap();

        let record = ArtistRecord::from(artist);
        assert_eq!(record.name, "Daft Punk");
        assert_eq!(record.followers, 9_000_000);
        assert_eq!(record.genres, vec!["electro", "filter house"]);
        assert_eq!(record.popularity, 80);
        assert_eq!(record.kind, "artist");
    }

    fn status_error(status: u16) -> Error {
        let response = ::http::Response::builder()
            .status(status)
            .header("retry-after", "7")
            .body("")
            .unwrap();
        api_error(ClientError::Http(Box::new(HttpError::StatusCode(
            ::reqwest::Response::from(response),
        ))))
    }

    #[test]
    fn too_many_requests_becomes_rate_limited() {
        let err = status_error(429);
        assert!(matches!(err, Error::RateLimited { .. }));
        assert_eq!(err.failure_kind(), FailureKind::RateLimited);
        assert_eq!(err.retry_after(), Some(Duration::from_secs(7)));
    }

    #[test]
    fn server_errors_are_transient_and_client_errors_fatal() {
        let unavailable = status_error(503);
        assert!(matches!(unavailable, Error::SpotifyError(_)));
        assert_eq!(unavailable.failure_kind(), FailureKind::Transient);
        assert_eq!(unavailable.retry_after(), None);

        assert_eq!(status_error(404).failure_kind(), FailureKind::Fatal);
    }

    fn full_track(id: serde_json::Value) -> serde_json::Value {
        serde_json::json!({
            "album": {
                "album_type": "album",
                "artists": [],
                "external_urls": {},
                "href": null,
                "id": null,
                "images": [],
                "name": "Random Access Memories",
                "release_date": "2013-05-17",
                "release_date_precision": "day"
            },
            "artists": [
                { "external_urls": {}, "href": null, "id": "4tZwfgrHOc3mvqYlEYSvVi", "name": "Daft Punk" },
                { "external_urls": {}, "href": null, "id": null, "name": "Pharrell Williams" }
            ],
            "disc_number": 1,
            "duration_ms": 369_626,
            "explicit": false,
            "external_ids": {},
            "external_urls": {},
            "href": null,
            "id": id,
            "is_local": false,
            "name": "Get Lucky",
            "popularity": 83,
            "preview_url": null,
            "track_number": 8,
            "type": "track"
        })
    }

    #[test]
    fn track_and_features_merge_into_one_record() {
        let track: FullTrack =
            serde_json::from_value(full_track(serde_json::json!("69kOkLUCkxIZYexIgSG8rq"))).unwrap();
        let features: AudioFeatures = serde_json::from_value(serde_json::json!({
            "acousticness": 0.0625,
            "analysis_url": "https://api.spotify.com/v1/audio-analysis/69kOkLUCkxIZYexIgSG8rq",
            "danceability": 0.75,
            "duration_ms": 369_626,
            "energy": 0.8125,
            "id": "69kOkLUCkxIZYexIgSG8rq",
            "instrumentalness": 0.5,
            "key": 6,
            "liveness": 0.125,
            "loudness": -8.5,
            "mode": 0,
            "speechiness": 0.03125,
            "tempo": 116.0,
            "time_signature": 4,
            "track_href": "https://api.spotify.com/v1/tracks/69kOkLUCkxIZYexIgSG8rq",
            "valence": 0.875
        }))
        .unwrap();

        let record = track_record(track, &features, ArtistSelection::KeepAll);

        assert_eq!(
            record,
            TrackRecord {
                name: "Get Lucky".into(),
                album: "Random Access Memories".into(),
                artist: "Daft Punk, Pharrell Williams".into(),
                release_date: Some("2013-05-17".into()),
                duration_ms: 369_626,
                popularity: 83,
                acousticness: 0.0625,
                danceability: 0.75,
                energy: 0.8125,
                instrumentalness: 0.5,
                liveness: 0.125,
                loudness: -8.5,
                speechiness: 0.03125,
                tempo: 116.0,
                time_signature: 4,
                valence: 0.875,
            }
        );
    }

    #[test]
    fn saved_local_file_keeps_no_id() {
        let mut local = full_track(serde_json::Value::Null);
        local["is_local"] = serde_json::json!(true);
        let saved: SavedTrack = serde_json::from_value(serde_json::json!({
            "added_at": "2024-03-01T12:00:00Z",
            "track": local
        }))
        .unwrap();

        let entry = SavedTrackEntry::from(saved);

        assert_eq!(entry.track.id, None);
        assert_eq!(entry.track.name, "Get Lucky");
        assert_eq!(entry.track.album, "Random Access Memories");
        assert_eq!(entry.track.artists, vec!["Daft Punk", "Pharrell Williams"]);
        assert_eq!(entry.track.duration_ms, 369_626);
        assert_eq!(entry.primary_artist(), Some("Daft Punk"));
        assert_eq!(entry.added_at.to_rfc3339(), "2024-03-01T12:00:00+00:00");
    }

    #[test]
    fn saved_track_id_is_the_bare_id() {
        let saved: SavedTrack = serde_json::from_value(serde_json::json!({
            "added_at": "2024-03-01T12:00:00Z",
            "track": full_track(serde_json::json!("69kOkLUCkxIZYexIgSG8rq"))
        }))
        .unwrap();

        let entry = SavedTrackEntry::from(saved);
        assert_eq!(entry.track.id.as_deref(), Some("69kOkLUCkxIZYexIgSG8rq"));
        assert_eq!(entry.track.popularity, 83);
    }
}
