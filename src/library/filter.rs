//! Predicates selecting which artists and albums of a library are shown.

use std::collections::{HashMap, HashSet};

use crate::library::{
    album::AlbumEntry, artist::ArtistEntry, entry::fold_name, root::MusicLibrary,
};

/// Artist to album names recorded by an earlier synchronization.
pub type DatabaseMap = HashMap<String, HashSet<String>>;

/// Filter criteria. Every setter replaces its criterion as a whole.
#[derive(Debug, Clone, Default)]
pub struct LibraryFilter {
    album_match: Vec<String>,
    album_not_match: Vec<String>,
    artist_search: String,
    album_search: String,
    track_search: String,
    database: Option<DatabaseMatch>,
}

#[derive(Debug, Clone)]
struct DatabaseMatch {
    map: DatabaseMap,
    invert: bool,
}

/// An artist and those of its albums passing a filter.
#[derive(Debug)]
pub struct FilteredArtist<'a> {
    pub artist: &'a ArtistEntry,
    pub albums: Vec<&'a AlbumEntry>,
}

fn contains_folded(haystack: &str, needle: &str) -> bool {
    needle.is_empty() || fold_name(haystack).contains(&fold_name(needle))
}

impl LibraryFilter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Albums must contain every `matches` substring and none of the
    /// `not_matches` substrings.
    pub fn set_album_match(&mut self, matches: Vec<String>, not_matches: Vec<String>) {
        self.album_match = matches;
        self.album_not_match = not_matches;
    }

    pub fn clear_album_match(&mut self) {
        self.album_match.clear();
        self.album_not_match.clear();
    }

    pub fn set_search_match(
        &mut self,
        artist: impl Into<String>,
        album: impl Into<String>,
        track: impl Into<String>,
    ) {
        self.artist_search = artist.into();
        self.album_search = album.into();
        self.track_search = track.into();
    }

    pub fn clear_search_match(&mut self) {
        self.set_search_match("", "", "");
    }

    /// Restricts albums to those present (or, with `invert`, absent) in `map`.
    pub fn set_database_match(&mut self, map: DatabaseMap, invert: bool) {
        self.database = Some(DatabaseMatch { map, invert });
    }

    pub fn clear_database_match(&mut self) {
        self.database = None;
    }

    pub fn album_match(&self) -> &[String] {
        &self.album_match
    }

    pub fn album_not_match(&self) -> &[String] {
        &self.album_not_match
    }

    pub fn artist_search(&self) -> &str {
        &self.artist_search
    }

    pub fn album_search(&self) -> &str {
        &self.album_search
    }

    pub fn track_search(&self) -> &str {
        &self.track_search
    }

    pub fn database_match(&self) -> Option<(&DatabaseMap, bool)> {
        self.database.as_ref().map(|db| (&db.map, db.invert))
    }

    /// An active database match narrows artists as well as albums.
    pub fn has_artist_filter(&self) -> bool {
        !self.artist_search.is_empty() || self.database.is_some()
    }

    pub fn has_album_filter(&self) -> bool {
        !self.album_match.is_empty()
            || !self.album_not_match.is_empty()
            || !self.album_search.is_empty()
            || self.database.is_some()
    }

    pub fn has_track_name_filter(&self) -> bool {
        !self.track_search.is_empty()
    }

    pub fn is_matching_artist(&self, name: &str) -> bool {
        contains_folded(name, &self.artist_search)
    }

    pub fn is_matching_album(&self, name: &str) -> bool {
        let folded = fold_name(name);
        contains_folded(name, &self.album_search)
            && !self
                .album_not_match
                .iter()
                .any(|s| !s.is_empty() && folded.contains(&fold_name(s)))
            && self.album_match.iter().all(|s| folded.contains(&fold_name(s)))
    }

    pub fn is_matching_track_name(&self, name: &str) -> bool {
        contains_folded(name, &self.track_search)
    }

    pub fn is_matching_database_artist_and_album(&self, artist: &str, album: &str) -> bool {
        let Some(db) = &self.database else {
            return true;
        };
        let recorded = db
            .map
            .get(artist)
            .is_some_and(|albums| albums.contains(album));
        recorded != db.invert
    }

    /// Whether `album` of `artist` passes the album, database and track
    /// criteria. With a track filter the album needs a matching track.
    pub fn is_matching_album_entry(&self, artist: &str, album: &AlbumEntry) -> bool {
        self.is_matching_album(album.album_name())
            && self.is_matching_database_artist_and_album(artist, album.album_name())
            && (!self.has_track_name_filter()
                || album
                    .tracks()
                    .any(|track| self.is_matching_track_name(track.track_name())))
    }
}

/// Applies `filter` to the scanned part of `library`.
///
/// Artists left without albums are dropped while an album or track filter is
/// active, so the view never lists empty artists that only exist because of
/// the filter.
pub fn filter_library<'a>(
    library: &'a MusicLibrary,
    filter: &LibraryFilter,
) -> Vec<FilteredArtist<'a>> {
    let prune_empty = filter.has_album_filter() || filter.has_track_name_filter();
    library
        .artists()
        .filter(|artist| filter.is_matching_artist(artist.artist_name()))
        .filter_map(|artist| {
            let albums: Vec<_> = artist
                .albums()
                .filter(|album| filter.is_matching_album_entry(artist.artist_name(), album))
                .collect();
            (!prune_empty || !albums.is_empty()).then_some(FilteredArtist { artist, albums })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::{HashMap, HashSet};

    use tempfile::TempDir;

    use crate::library::{
        filter::{DatabaseMap, LibraryFilter},
        root::tests::scanned_library,
        scanner::context::tests::write_fixture,
    };

    fn database(entries: &[(&str, &[&str])]) -> DatabaseMap {
        entries
            .iter()
            .map(|(artist, albums)| {
                let albums: HashSet<_> = albums.iter().map(|a| a.to_string()).collect();
                (artist.to_string(), albums)
            })
            .collect::<HashMap<_, _>>()
    }

    #[test]
    fn test_album_match_is_conjunctive() {
        let mut filter = LibraryFilter::new();
        filter.set_album_match(vec!["live".to_string()], vec!["bootleg".to_string()]);

        assert!(filter.is_matching_album("Live at Wembley"));
        assert!(!filter.is_matching_album("Live Bootleg Show"));
        assert!(!filter.is_matching_album("Studio Album"));

        filter.set_album_match(vec!["live".to_string(), "1986".to_string()], Vec::new());
        assert!(!filter.is_matching_album("Live at Wembley"));
        assert!(filter.is_matching_album("Live at Wembley 1986"));
    }

    #[test]
    fn test_search_terms_are_case_insensitive() {
        let mut filter = LibraryFilter::new();
        assert!(filter.is_matching_artist("anything"));
        assert!(!filter.has_artist_filter());

        filter.set_search_match("AC", "black", "Bells");
        assert!(filter.is_matching_artist("ac-dc"));
        assert!(!filter.is_matching_artist("abba"));
        assert!(filter.is_matching_album("Back In Black"));
        assert!(filter.is_matching_track_name("01 - hells bells.flac"));
        assert!(filter.has_artist_filter());
        assert!(filter.has_album_filter());
        assert!(filter.has_track_name_filter());

        filter.clear_search_match();
        assert!(!filter.has_album_filter());
        assert!(!filter.has_track_name_filter());
    }

    #[test]
    fn test_database_match_and_invert() {
        let mut filter = LibraryFilter::new();
        assert!(filter.is_matching_database_artist_and_album("Artist B", "Album X"));

        filter.set_database_match(database(&[("Artist A", &["Album X"])]), false);
        assert!(filter.is_matching_database_artist_and_album("Artist A", "Album X"));
        assert!(!filter.is_matching_database_artist_and_album("Artist A", "Album Y"));
        assert!(!filter.is_matching_database_artist_and_album("Artist B", "Album X"));
        assert!(filter.has_artist_filter());
        assert!(filter.has_album_filter());

        filter.set_database_match(database(&[("Artist A", &["Album X"])]), true);
        assert!(!filter.is_matching_database_artist_and_album("Artist A", "Album X"));
        assert!(filter.is_matching_database_artist_and_album("Artist A", "Album Y"));
        assert!(filter.is_matching_database_artist_and_album("Artist B", "Album X"));

        filter.clear_database_match();
        assert!(filter.database_match().is_none());
        assert!(!filter.has_artist_filter());
    }

    #[test]
    fn test_setters_replace_criteria() {
        let mut filter = LibraryFilter::new();
        filter.set_album_match(vec!["a".to_string()], vec!["b".to_string()]);
        filter.set_album_match(vec!["c".to_string()], Vec::new());
        assert_eq!(filter.album_match(), ["c"]);
        assert!(filter.album_not_match().is_empty());
        filter.clear_album_match();
        assert!(!filter.has_album_filter());
    }

    #[test]
    fn test_filter_library_prunes_empty_artists() {
        let temp_dir = TempDir::new().unwrap();
        write_fixture(
            temp_dir.path(),
            &[
                ("ac-dc", "Live at Donington", "01 - thunderstruck.flac", 1),
                ("ac-dc", "Back in Black", "01 - hells bells.flac", 1),
                ("abba", "Gold", "01 - dancing queen.flac", 1),
            ],
        );
        let library = scanned_library(temp_dir.path());

        let mut filter = LibraryFilter::new();
        assert_eq!(library.filtered(&filter).len(), 2);

        filter.set_album_match(vec!["live".to_string()], Vec::new());
        let view = library.filtered(&filter);
        assert_eq!(view.len(), 1);
        assert_eq!(view[0].artist.artist_name(), "ac-dc");
        let albums: Vec<_> = view[0].albums.iter().map(|a| a.album_name()).collect();
        assert_eq!(albums, ["Live at Donington"]);

        filter.clear_album_match();
        filter.set_search_match("", "", "bells");
        let view = library.filtered(&filter);
        assert_eq!(view.len(), 1);
        assert_eq!(view[0].albums[0].album_name(), "Back in Black");

        filter.clear_search_match();
        filter.set_database_match(database(&[("abba", &["Gold"])]), true);
        let view = library.filtered(&filter);
        let artists: Vec<_> = view.iter().map(|f| f.artist.artist_name()).collect();
        assert_eq!(artists, ["ac-dc"]);
        assert_eq!(view[0].albums.len(), 2);
    }
}
