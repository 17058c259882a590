use std::fmt;
use std::io::Write;

use log::debug;

/// Stage of a pipeline that is reporting progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Resolving top-track details.
    TopTracks,
    /// Resolving top-artist profiles.
    TopArtists,
    /// Walking the saved-tracks library.
    Library,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Phase::TopTracks => "top tracks",
            Phase::TopArtists => "top artists",
            Phase::Library => "library",
        };
        f.write_str(label)
    }
}

/// `current` of `total` items done in `phase`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressEvent {
    /// Reporting stage.
    pub phase: Phase,
    /// Items finished so far, never above `total`.
    pub current: usize,
    /// Items expected in this stage.
    pub total: usize,
}

/// Receiver of progress events; callers decide where they end up.
pub trait ProgressSink {
    /// Called once per finished item.
    fn report(&mut self, event: ProgressEvent);
}

impl<F: FnMut(ProgressEvent)> ProgressSink for F {
    fn report(&mut self, event: ProgressEvent) {
        self(event);
    }
}

/// Sends events to the log.
pub struct LogProgress;

impl ProgressSink for LogProgress {
    fn report(&mut self, event: ProgressEvent) {
        debug!("{}: {}/{}", event.phase, event.current, event.total);
    }
}

/// Draws a redrawing progress bar on stderr.
pub struct ConsoleProgress {
    width: usize,
}

impl ConsoleProgress {
    /// Bar that is `width` characters wide.
    pub fn new(width: usize) -> Self {
        ConsoleProgress { width }
    }
}

impl Default for ConsoleProgress {
    fn default() -> Self {
        Self::new(50)
    }
}

impl ProgressSink for ConsoleProgress {
    fn report(&mut self, event: ProgressEvent) {
        let mut stderr = std::io::stderr().lock();
        // Progress output is best-effort
        let _ = write!(stderr, "\r{}", render_bar(event.current, event.total, self.width));
        if event.current >= event.total {
            let _ = writeln!(stderr);
        }
        let _ = stderr.flush();
    }
}

/// One line of the form `Progress: |███---| 50.0% Complete`.
#[allow(clippy::cast_precision_loss)]
pub fn render_bar(current: usize, total: usize, width: usize) -> String {
    let (percent, filled) = if total == 0 {
        (100.0, width)
    } else {
        let current = current.min(total);
        (
            100.0 * current as f64 / total as f64,
            width * current / total,
        )
    };
    format!(
        "Progress: |{}{}| {percent:.1}% Complete",
        "█".repeat(filled),
        "-".repeat(width - filled)
    )
}
