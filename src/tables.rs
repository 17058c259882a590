use std::path::Path;

use log::debug;
use serde::Serialize;
use serde_json::{Value, json};

use crate::clients::{
    entities::{ArtistRecord, TrackRecord},
    errors::Result,
};
use crate::genres::GenreCounts;

/// Columns of the top-tracks table.
pub const TRACK_COLUMNS: [&str; 16] = [
    "Name",
    "Album",
    "Artist",
    "Release Date",
    "Length (ms)",
    "Popularity",
    "Acousticness",
    "Danceability",
    "Energy",
    "Instrumentalness",
    "Liveness",
    "Loudness",
    "Speechiness",
    "Tempo",
    "Time Signature",
    "Valence",
];

/// Columns of the top-artists table.
pub const ARTIST_COLUMNS: [&str; 5] = ["Name", "Followers", "Genres", "Popularity", "Type"];

/// Columns of the genre table.
pub const GENRE_COLUMNS: [&str; 2] = ["Genre", "Count"];

/// Row-oriented table with named columns, rows in input order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Table {
    columns: Vec<&'static str>,
    rows: Vec<Vec<Value>>,
}

impl Table {
    /// One row per track, `TRACK_COLUMNS` order.
    pub fn tracks(tracks: &[TrackRecord]) -> Self {
        let rows = tracks
            .iter()
            .map(|t| {
                vec![
                    json!(t.name),
                    json!(t.album),
                    json!(t.artist),
                    json!(t.release_date),
                    json!(t.duration_ms),
                    json!(t.popularity),
                    json!(t.acousticness),
                    json!(t.danceability),
                    json!(t.energy),
                    json!(t.instrumentalness),
                    json!(t.liveness),
                    json!(t.loudness),
                    json!(t.speechiness),
                    json!(t.tempo),
                    json!(t.time_signature),
                    json!(t.valence),
                ]
            })
            .collect();
        Table {
            columns: TRACK_COLUMNS.to_vec(),
            rows,
        }
    }

    /// One row per artist; genres are a JSON array cell.
    pub fn artists(artists: &[ArtistRecord]) -> Self {
        let rows = artists
            .iter()
            .map(|a| {
                vec![
                    json!(a.name),
                    json!(a.followers),
                    json!(a.genres),
                    json!(a.popularity),
                    json!(a.kind),
                ]
            })
            .collect();
        Table {
            columns: ARTIST_COLUMNS.to_vec(),
            rows,
        }
    }

    /// One row per genre, in tally order.
    pub fn genres(counts: &GenreCounts) -> Self {
        let rows = counts
            .iter()
            .map(|(genre, n)| vec![json!(genre), json!(n)])
            .collect();
        Table {
            columns: GENRE_COLUMNS.to_vec(),
            rows,
        }
    }

    /// Column names.
    pub fn columns(&self) -> &[&'static str] {
        &self.columns
    }

    /// Rows in input order.
    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the table has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Cells of the named column, top to bottom.
    pub fn column(&self, name: &str) -> Option<Vec<&Value>> {
        let pos = self.columns.iter().position(|c| *c == name)?;
        Some(self.rows.iter().map(|row| &row[pos]).collect())
    }

    /// Writes `{ "columns": [...], "rows": [[...], ...] }` to `path`.
    pub async fn write_json(&self, path: &Path) -> Result<()> {
        tokio::fs::write(path, serde_json::to_vec_pretty(self)?).await?;
        debug!("Wrote {} rows to {path:?}", self.rows.len());
        Ok(())
    }
}
