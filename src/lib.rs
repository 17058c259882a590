//! Tastemap - chart your Spotify listening taste
//!
//! Two pipelines share this library: one turns the user's top tracks and
//! artists into a tempo/danceability scatter plot and a genre pie chart,
//! the other snapshots the liked-songs library to local disk.

/// Charts rendered as standalone Plotly pages
pub mod charts;
/// Client modules for the Spotify API and local storage
pub mod clients;
/// Genre tally over top artists
pub mod genres;
/// Numbered listing of the library snapshot
pub mod listing;
/// Library pagination with bounded retries
pub mod paginator;
/// Pipeline configuration and the two end-to-end runs
pub mod pipeline;
/// Progress events and their consumers
pub mod progress;
/// Backoff policy for retried requests
pub mod retry;
/// Row-oriented projections of the fetched records
pub mod tables;
/// Top tracks and artists resolution
pub mod taste;

#[cfg(test)]
mod testing;
