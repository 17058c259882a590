use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use log::info;
use tastemap::clients::{
    LibraryCache,
    entities::{ArtistSelection, TimeWindow},
    errors::Result,
    spotify::Scope,
};
use tastemap::pipeline::{
    ConfigBuilder, LibrarySnapshotPipeline, Settings, TopTastePipeline, cached_listing,
};
use tastemap::progress::{ConsoleProgress, LogProgress, ProgressSink};
use tastemap::retry::RetryPolicy;

#[derive(Parser)]
#[command(name = "tastemap")]
#[command(version, about = "Chart your Spotify listening taste", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Chart top tracks (tempo vs danceability) and top-artist genres
    Top(TopArgs),
    /// Snapshot the liked-songs library and print it
    Library(LibraryArgs),
}

#[derive(Args)]
struct TopArgs {
    /// Number of top tracks and top artists to fetch
    #[arg(long, default_value_t = 50, env = "TASTEMAP_LIMIT",
          value_parser = clap::value_parser!(u32).range(1..=50))]
    limit: u32,

    #[arg(long, value_enum, default_value_t = TimeWindow::Medium, env = "TASTEMAP_WINDOW")]
    window: TimeWindow,

    /// Credited artists to keep per track
    #[arg(long, value_enum, default_value_t = ArtistSelection::KeepFirst)]
    artists: ArtistSelection,

    /// Genres must be shared by more than this many top artists to be charted
    #[arg(long, default_value_t = 2, env = "TASTEMAP_MIN_GENRE_COUNT")]
    min_genre_count: usize,

    /// Pause between detail requests
    #[arg(long, default_value_t = 100)]
    throttle_ms: u64,

    #[command(flatten)]
    retry: RetryArgs,

    /// Where charts (and exported tables) are written
    #[arg(long, default_value = "tastemap-output", env = "TASTEMAP_OUTPUT_DIR")]
    output_dir: PathBuf,

    /// Also write the track, artist and genre tables as JSON
    #[arg(long)]
    export_tables: bool,

    /// Open the charts in the default browser
    #[arg(long)]
    open: bool,

    /// Log progress instead of drawing a progress bar
    #[arg(long, short)]
    quiet: bool,
}

#[derive(Args)]
struct LibraryArgs {
    #[arg(long, default_value_t = 50, value_parser = clap::value_parser!(u32).range(1..=50))]
    page_size: u32,

    #[command(flatten)]
    retry: RetryArgs,

    /// Snapshot file (defaults to the user cache directory)
    #[arg(long, env = "TASTEMAP_CACHE")]
    cache: Option<PathBuf>,

    /// Print the last snapshot without contacting Spotify
    #[arg(long)]
    from_cache: bool,

    /// Log progress instead of drawing a progress bar
    #[arg(long, short)]
    quiet: bool,
}

#[derive(Args)]
struct RetryArgs {
    /// Consecutive failures tolerated per request
    #[arg(long, default_value_t = 5)]
    max_retries: u32,

    /// First retry delay; doubles on every further failure
    #[arg(long, default_value_t = 500)]
    backoff_ms: u64,
}

impl From<&RetryArgs> for RetryPolicy {
    fn from(args: &RetryArgs) -> Self {
        RetryPolicy {
            max_retries: args.max_retries,
            base_delay: Duration::from_millis(args.backoff_ms),
            ..RetryPolicy::default()
        }
    }
}

fn progress_sink(quiet: bool) -> Box<dyn ProgressSink> {
    if quiet {
        Box::new(LogProgress)
    } else {
        Box::new(ConsoleProgress::default())
    }
}

pub async fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Top(args) => chart_top_taste(args).await,
        Commands::Library(args) => snapshot_library(args).await,
    }
}

async fn chart_top_taste(args: TopArgs) -> Result<()> {
    let settings = Settings {
        limit: args.limit,
        window: args.window,
        artist_selection: args.artists,
        min_genre_count: args.min_genre_count,
        throttle: Duration::from_millis(args.throttle_ms),
        retry: RetryPolicy::from(&args.retry),
        output_dir: args.output_dir,
        export_tables: args.export_tables,
        open_charts: args.open,
        ..Settings::default()
    };
    info!("Building config ...");
    let config = ConfigBuilder::new(Scope::TopRead)
        .settings(settings)
        .build()?;
    info!("Authorizing client ...");
    // CLI prompt may be shown here
    config.spotify.authorize_client().await?;

    let mut progress = progress_sink(args.quiet);
    let report = TopTastePipeline::new(&config.spotify, &config.settings)
        .run(progress.as_mut())
        .await?;
    for path in &report.charts {
        println!("{}", path.display());
    }
    Ok(())
}

async fn snapshot_library(args: LibraryArgs) -> Result<()> {
    let cache = match args.cache {
        Some(path) => LibraryCache::new(path),
        None => LibraryCache::try_default()?,
    };

    let lines = if args.from_cache {
        cached_listing(&cache).await?
    } else {
        let settings = Settings {
            page_size: args.page_size,
            retry: RetryPolicy::from(&args.retry),
            ..Settings::default()
        };
        info!("Building config ...");
        let config = ConfigBuilder::new(Scope::LibraryRead)
            .settings(settings)
            .cache(cache)
            .build()?;
        info!("Authorizing client ...");
        config.spotify.authorize_client().await?;

        let mut progress = progress_sink(args.quiet);
        LibrarySnapshotPipeline::new(&config.spotify, &config.cache, &config.settings)
            .run(progress.as_mut())
            .await?
    };

    for line in lines {
        println!("{line}");
    }
    Ok(())
}
