use crate::clients::entities::SavedTrackEntry;

/// Numbered `"n) track — artist"` lines, starting at 1.
pub fn format_listing(entries: &[SavedTrackEntry]) -> Vec<String> {
    entries
        .iter()
        .enumerate()
        .map(|(i, entry)| {
            format!(
                "{}) {} — {}",
                i + 1,
                entry.track.name,
                entry.primary_artist().unwrap_or("Unknown artist")
            )
        })
        .collect()
}
