use chrono::{DateTime, Utc};
use clap::ValueEnum;
use rspotify::model::TimeRange;
use serde::{Deserialize, Serialize};

/// One of the user's top tracks, enriched with its audio features.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackRecord {
    /// Track title.
    pub name: String,
    /// Album the track was released on.
    pub album: String,
    /// Credited artist, or artists, per `ArtistSelection`.
    pub artist: String,
    /// Album release date as reported, at year, month or day precision.
    pub release_date: Option<String>,
    /// Length in milliseconds.
    pub duration_ms: i64,
    /// 0 to 100, higher is more popular.
    pub popularity: u32,
    /// Confidence that the track is acoustic, 0.0 to 1.0.
    pub acousticness: f32,
    /// How suitable the track is for dancing, 0.0 to 1.0.
    pub danceability: f32,
    /// Perceived intensity, 0.0 to 1.0.
    pub energy: f32,
    /// Likelihood of no vocals, 0.0 to 1.0.
    pub instrumentalness: f32,
    /// Likelihood of a live recording, 0.0 to 1.0.
    pub liveness: f32,
    /// Average loudness in dB, typically between -60 and 0.
    pub loudness: f32,
    /// Presence of spoken words, 0.0 to 1.0.
    pub speechiness: f32,
    /// Estimated tempo in BPM.
    pub tempo: f32,
    /// Beats per bar.
    pub time_signature: i32,
    /// Musical positiveness, 0.0 to 1.0.
    pub valence: f32,
}

/// One of the user's top artists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtistRecord {
    /// Artist name.
    pub name: String,
    /// Follower count.
    pub followers: u32,
    /// Genres in the order the service lists them.
    pub genres: Vec<String>,
    /// 0 to 100.
    pub popularity: u32,
    /// Object type, always `"artist"`.
    pub kind: String,
}

/// Track payload of a saved library item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LibraryTrack {
    /// Local files carry no Spotify id.
    pub id: Option<String>,
    /// Track title.
    pub name: String,
    /// Album name.
    pub album: String,
    /// Every credited artist, in credit order.
    pub artists: Vec<String>,
    /// Length in milliseconds.
    pub duration_ms: i64,
    /// 0 to 100, zero for local files.
    pub popularity: u32,
}

/// A liked song as stored in the user's library.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedTrackEntry {
    /// When the user liked the track.
    pub added_at: DateTime<Utc>,
    /// The liked track.
    pub track: LibraryTrack,
}

impl SavedTrackEntry {
    /// First credited artist, if any.
    pub fn primary_artist(&self) -> Option<&str> {
        self.track.artists.first().map(String::as_str)
    }
}

/// One page of the saved-tracks library.
#[derive(Debug, Clone, PartialEq)]
pub struct LibraryPage {
    /// Entries of this page in library order.
    pub items: Vec<SavedTrackEntry>,
    /// Size of the whole library as reported by the service.
    pub total: u32,
}

/// Period over which the service computes "top" items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum TimeWindow {
    /// Roughly the last four weeks.
    Short,
    /// Roughly the last six months.
    #[default]
    Medium,
    /// Several years of history.
    Long,
}

impl From<TimeWindow> for TimeRange {
    fn from(window: TimeWindow) -> Self {
        match window {
            TimeWindow::Short => TimeRange::ShortTerm,
            TimeWindow::Medium => TimeRange::MediumTerm,
            TimeWindow::Long => TimeRange::LongTerm,
        }
    }
}

/// Which credited artists end up in `TrackRecord::artist`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ArtistSelection {
    /// Only the first credited artist.
    #[default]
    #[value(name = "first")]
    KeepFirst,
    /// Every credited artist, comma separated.
    #[value(name = "all")]
    KeepAll,
}

impl ArtistSelection {
    /// Joins the selected artist names.
    pub fn pick<'a, I>(self, names: I) -> String
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut names = names.into_iter();
        match self {
            ArtistSelection::KeepFirst => names.next().unwrap_or_default().to_string(),
            ArtistSelection::KeepAll => names.collect::<Vec<_>>().join(", "),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keep_first_drops_co_artists() {
        let names = ["Daft Punk", "Pharrell Williams"];
        assert_eq!(ArtistSelection::KeepFirst.pick(names), "Daft Punk");
        assert_eq!(
            ArtistSelection::KeepAll.pick(names),
            "Daft Punk, Pharrell Williams"
        );
    }

    #[test]
    fn no_artists_yields_empty_name() {
        assert_eq!(ArtistSelection::KeepFirst.pick(Vec::<&str>::new()), "");
        assert_eq!(ArtistSelection::KeepAll.pick(Vec::<&str>::new()), "");
    }
}
