use std::path::{Path, PathBuf};
use std::time::Duration;

use log::{debug, info, warn};

use crate::charts::{self, PieChart, ScatterChart};
use crate::clients::{
    LibraryCache, MusicApi, SpotifyClient,
    entities::{ArtistSelection, TimeWindow},
    errors::Result,
    spotify::{Scope, check_limit},
};
use crate::genres::GenreCounts;
use crate::listing::format_listing;
use crate::paginator::Paginator;
use crate::progress::ProgressSink;
use crate::retry::RetryPolicy;
use crate::tables::Table;
use crate::taste::{DEFAULT_THROTTLE, TopTasteFetcher};

/// Run parameters shared by both pipelines.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    /// Number of top tracks and top artists, 1 to 50.
    pub limit: u32,
    /// Period the top items are computed over.
    pub window: TimeWindow,
    /// Artists kept per track.
    pub artist_selection: ArtistSelection,
    /// Genres need strictly more artists than this to reach the pie chart.
    pub min_genre_count: usize,
    /// Pause between detail requests.
    pub throttle: Duration,
    /// Saved tracks per page, 1 to 50.
    pub page_size: u32,
    /// Backoff for retried requests.
    pub retry: RetryPolicy,
    /// Directory for charts and exported tables.
    pub output_dir: PathBuf,
    /// Also write the tables as JSON.
    pub export_tables: bool,
    /// Open the charts in the default browser.
    pub open_charts: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            limit: 50,
            window: TimeWindow::Medium,
            artist_selection: ArtistSelection::KeepFirst,
            min_genre_count: 2,
            throttle: DEFAULT_THROTTLE,
            page_size: 50,
            retry: RetryPolicy::default(),
            output_dir: PathBuf::from("tastemap-output"),
            export_tables: false,
            open_charts: false,
        }
    }
}

impl Settings {
    /// Rejects limits the API would refuse.
    pub fn validate(&self) -> Result<()> {
        check_limit(self.limit)?;
        check_limit(self.page_size)?;
        Ok(())
    }
}

/// Configuration for a pipeline run
pub struct Config {
    /// Client authorized for the pipeline's scope.
    pub spotify: SpotifyClient,
    /// Library snapshot location.
    pub cache: LibraryCache,
    /// Validated run parameters.
    pub settings: Settings,
}

/// Builds a `Config`, falling back to the environment for anything not set.
pub struct ConfigBuilder {
    scope: Scope,
    spotify: Option<SpotifyClient>,
    cache: Option<LibraryCache>,
    settings: Option<Settings>,
}

impl ConfigBuilder {
    /// Builder for a client limited to `scope`.
    pub fn new(scope: Scope) -> Self {
        Self {
            scope,
            spotify: None,
            cache: None,
            settings: None,
        }
    }

    #[must_use]
    /// Use this client instead of one built from the environment.
    pub fn spotify(mut self, spotify: SpotifyClient) -> Self {
        self.spotify = Some(spotify);
        self
    }

    #[must_use]
    /// Use this cache instead of the default location.
    pub fn cache(mut self, cache: LibraryCache) -> Self {
        self.cache = Some(cache);
        self
    }

    #[must_use]
    /// Run parameters; defaults otherwise.
    pub fn settings(mut self, settings: Settings) -> Self {
        self.settings = Some(settings);
        self
    }

    /// Validates the settings and fills in the missing parts.
    pub fn build(self) -> Result<Config> {
        let settings = self.settings.unwrap_or_default();
        settings.validate()?;
        let spotify = match self.spotify {
            Some(s) => s,
            None => SpotifyClient::try_default(self.scope)?,
        };
        let cache = match self.cache {
            Some(c) => c,
            None => LibraryCache::try_default()?,
        };
        Ok(Config {
            spotify,
            cache,
            settings,
        })
    }
}

/// What a top-taste run produced.
#[derive(Debug)]
pub struct TopTasteReport {
    /// Top tracks in rank order.
    pub tracks: Table,
    /// Top artists in rank order.
    pub artists: Table,
    /// Genres that passed the `min_genre_count` filter.
    pub genres: Table,
    /// Written chart files, scatter first.
    pub charts: Vec<PathBuf>,
}

/// Top tracks and artists -> tables -> scatter and pie charts.
pub struct TopTastePipeline<'a, A> {
    api: &'a A,
    settings: &'a Settings,
}

impl<'a, A: MusicApi> TopTastePipeline<'a, A> {
    /// Pipeline over `api` with the given settings.
    pub fn new(api: &'a A, settings: &'a Settings) -> Self {
        TopTastePipeline { api, settings }
    }

    /// Fetch, tabulate and chart. Nothing is written if a fetch fails.
    pub async fn run(&self, progress: &mut dyn ProgressSink) -> Result<TopTasteReport> {
        let settings = self.settings;
        info!("Fetching top {} tracks and artists ...", settings.limit);
        let taste = TopTasteFetcher::new(self.api)
            .throttle(settings.throttle)
            .retry(settings.retry)
            .artist_selection(settings.artist_selection)
            .fetch(settings.limit, settings.window, progress)
            .await?;

        let counts = GenreCounts::aggregate(&taste.artists);
        let kept = counts.above(settings.min_genre_count);
        debug!("{} genres, {} above threshold", counts.len(), kept.len());
        if kept.is_empty() {
            warn!(
                "No genre is shared by more than {} top artists, the pie chart will be empty",
                settings.min_genre_count
            );
        }

        let tracks = Table::tracks(&taste.tracks);
        let artists = Table::artists(&taste.artists);
        let genres = Table::genres(&kept);

        let dir = settings.output_dir.as_path();
        if settings.export_tables {
            write_tables(dir, &tracks, &artists, &Table::genres(&counts)).await?;
        }

        let scatter = ScatterChart::from_tracks(&tracks)?;
        let pie = PieChart::from_genres(&genres)?;
        let chart_paths = vec![
            charts::write_chart(&scatter, dir, "tracks_scatter.html").await?,
            charts::write_chart(&pie, dir, "genres_pie.html").await?,
        ];
        if settings.open_charts {
            for path in &chart_paths {
                charts::open_in_browser(path)?;
            }
        }

        Ok(TopTasteReport {
            tracks,
            artists,
            genres,
            charts: chart_paths,
        })
    }
}

async fn write_tables(dir: &Path, tracks: &Table, artists: &Table, genres: &Table) -> Result<()> {
    tokio::fs::create_dir_all(dir).await?;
    tracks.write_json(&dir.join("top_tracks.json")).await?;
    artists.write_json(&dir.join("top_artists.json")).await?;
    genres.write_json(&dir.join("genres.json")).await?;
    Ok(())
}

/// Saved-tracks library -> local snapshot -> numbered listing.
pub struct LibrarySnapshotPipeline<'a, A> {
    api: &'a A,
    cache: &'a LibraryCache,
    settings: &'a Settings,
}

impl<'a, A: MusicApi> LibrarySnapshotPipeline<'a, A> {
    /// Pipeline over `api` that snapshots into `cache`.
    pub fn new(api: &'a A, cache: &'a LibraryCache, settings: &'a Settings) -> Self {
        LibrarySnapshotPipeline {
            api,
            cache,
            settings,
        }
    }

    /// Fetch the whole library, snapshot it, and list the snapshot.
    pub async fn run(&self, progress: &mut dyn ProgressSink) -> Result<Vec<String>> {
        info!("Fetching saved tracks ...");
        let entries = Paginator::new(self.api)
            .page_size(self.settings.page_size)
            .retry(self.settings.retry)
            .fetch_all(progress)
            .await?;
        info!("Fetched {} saved tracks", entries.len());
        self.cache.store(&entries).await?;

        cached_listing(self.cache).await
    }
}

/// Listing of the last stored snapshot, without touching the network.
pub async fn cached_listing(cache: &LibraryCache) -> Result<Vec<String>> {
    let entries = cache.load().await?;
    Ok(format_listing(&entries))
}
