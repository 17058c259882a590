use std::collections::HashMap;

use crate::clients::entities::ArtistRecord;

/// Genre tally across a set of artists, kept in first-seen order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenreCounts {
    entries: Vec<(String, usize)>,
    index: HashMap<String, usize>,
}

impl GenreCounts {
    /// Counts every genre of every artist.
    pub fn aggregate(artists: &[ArtistRecord]) -> Self {
        let mut counts = GenreCounts::default();
        for genre in artists.iter().flat_map(|a| a.genres.iter()) {
            counts.add(genre, 1);
        }
        counts
    }

    fn add(&mut self, genre: &str, n: usize) {
        match self.index.get(genre) {
            Some(&pos) => self.entries[pos].1 += n,
            None => {
                self.index.insert(genre.to_string(), self.entries.len());
                self.entries.push((genre.to_string(), n));
            }
        }
    }

    /// Adds `other` into `self`; genres new to `self` are appended in `other`'s order.
    pub fn merge(&mut self, other: &GenreCounts) {
        for (genre, n) in &other.entries {
            self.add(genre, *n);
        }
    }

    /// Genres counted strictly more than `threshold` times.
    pub fn above(&self, threshold: usize) -> GenreCounts {
        let mut kept = GenreCounts::default();
        for (genre, n) in self.entries.iter().filter(|(_, n)| *n > threshold) {
            kept.add(genre, *n);
        }
        kept
    }

    /// Count for `genre`, if it was seen.
    pub fn get(&self, genre: &str) -> Option<usize> {
        self.index.get(genre).map(|&pos| self.entries[pos].1)
    }

    /// Genres with their counts, in first-seen order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, usize)> {
        self.entries.iter().map(|(g, n)| (g.as_str(), *n))
    }

    /// Number of distinct genres.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no genre was seen.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
