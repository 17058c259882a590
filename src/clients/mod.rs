/// Data entities for tracks, artists and library items
pub mod entities;
/// Error types and result aliases
pub mod errors;
/// Saved-tracks snapshot on local disk
pub mod local_storage;
/// Spotify API client
pub mod spotify;

pub use local_storage::LibraryCache;
pub use spotify::{MusicApi, SpotifyClient};
