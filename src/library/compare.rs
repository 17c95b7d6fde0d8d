//! Structural difference between two libraries.
//!
//! Both trees are kept sorted by case-insensitive name, so every level is
//! compared with a single merge pass over the two child sequences.

use std::{
    cmp::Ordering,
    collections::{BTreeMap, VecDeque},
    iter::Peekable,
};

use crate::library::{
    album::AlbumEntry,
    artist::ArtistEntry,
    entry::{LibraryEntry, cmp_names},
    root::MusicLibrary,
    track::TrackEntry,
};

/// Difference of a primary library against a secondary one.
///
/// "Missing" entries exist only in the primary library, "additional" ones only
/// in the secondary. Every list keeps the order of the library it was taken
/// from. Albums and tracks are only reported below artists (albums) present
/// on both sides.
#[derive(Debug, Default)]
pub struct LibraryComparison<'a> {
    pub missing_artists: Vec<&'a ArtistEntry>,
    pub additional_artists: Vec<&'a ArtistEntry>,
    pub missing_albums: Vec<&'a AlbumEntry>,
    pub additional_albums: Vec<&'a AlbumEntry>,
    pub missing_tracks: Vec<&'a TrackEntry>,
    pub additional_tracks: Vec<&'a TrackEntry>,
    /// Same-named tracks whose file sizes differ, primary side first.
    pub different_tracks: Vec<(&'a TrackEntry, &'a TrackEntry)>,
}

impl<'a> LibraryComparison<'a> {
    /// Missing albums keyed by the name of their artist.
    pub fn missing_albums_by_artist(&self) -> BTreeMap<&'a str, Vec<&'a AlbumEntry>> {
        group_by_artist(&self.missing_albums)
    }

    /// Additional albums keyed by the name of their artist.
    pub fn additional_albums_by_artist(&self) -> BTreeMap<&'a str, Vec<&'a AlbumEntry>> {
        group_by_artist(&self.additional_albums)
    }

    pub fn is_identical(&self) -> bool {
        self.missing_artists.is_empty()
            && self.additional_artists.is_empty()
            && self.missing_albums.is_empty()
            && self.additional_albums.is_empty()
            && self.missing_tracks.is_empty()
            && self.additional_tracks.is_empty()
            && self.different_tracks.is_empty()
    }

    /// Total number of reported differences.
    pub fn len(&self) -> usize {
        self.missing_artists.len()
            + self.additional_artists.len()
            + self.missing_albums.len()
            + self.additional_albums.len()
            + self.missing_tracks.len()
            + self.additional_tracks.len()
            + self.different_tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.is_identical()
    }
}

fn group_by_artist<'a>(albums: &[&'a AlbumEntry]) -> BTreeMap<&'a str, Vec<&'a AlbumEntry>> {
    let mut grouped: BTreeMap<_, Vec<_>> = BTreeMap::new();
    for &album in albums {
        grouped.entry(album.artist_name()).or_default().push(album);
    }
    grouped
}

/// Artist -> album -> tracks that have an equal counterpart in another
/// library.
pub type EqualTracks<'a> = BTreeMap<String, BTreeMap<String, Vec<&'a TrackEntry>>>;

enum Joined<'l, 'r, T> {
    Left(&'l T),
    Right(&'r T),
    Both(&'l T, &'r T),
}

/// Merge pass over two name-sorted sequences.
///
/// Names equal up to case form a run on each side. Within a run, exact
/// names are paired first, the remaining entries in order.
struct MergeJoin<'l, 'r, T, L: Iterator, R: Iterator> {
    left: Peekable<L>,
    right: Peekable<R>,
    pending: VecDeque<Joined<'l, 'r, T>>,
}

fn merge_join<'l, 'r, T, L, R>(left: L, right: R) -> MergeJoin<'l, 'r, T, L, R>
where
    T: LibraryEntry + 'l + 'r,
    L: Iterator<Item = &'l T>,
    R: Iterator<Item = &'r T>,
{
    MergeJoin {
        left: left.peekable(),
        right: right.peekable(),
        pending: VecDeque::new(),
    }
}

impl<'l, 'r, T, L, R> MergeJoin<'l, 'r, T, L, R>
where
    T: LibraryEntry + 'l + 'r,
    L: Iterator<Item = &'l T>,
    R: Iterator<Item = &'r T>,
{
    fn pair_run(&mut self) {
        let (Some(first_left), Some(first_right)) = (self.left.next(), self.right.next()) else {
            return;
        };
        let run = first_left.name();
        let mut lefts = vec![first_left];
        while let Some(left) = self
            .left
            .next_if(|left| cmp_names(left.name(), run) == Ordering::Equal)
        {
            lefts.push(left);
        }
        let mut rights = vec![Some(first_right)];
        while let Some(right) = self
            .right
            .next_if(|right| cmp_names(right.name(), run) == Ordering::Equal)
        {
            rights.push(Some(right));
        }

        let mut unmatched = Vec::new();
        for left in lefts {
            let exact = rights
                .iter_mut()
                .find(|right| matches!(right, Some(right) if right.name() == left.name()))
                .and_then(Option::take);
            match exact {
                Some(right) => self.pending.push_back(Joined::Both(left, right)),
                None => unmatched.push(left),
            }
        }
        let mut rest = rights.into_iter().flatten();
        for left in unmatched {
            self.pending.push_back(match rest.next() {
                Some(right) => Joined::Both(left, right),
                None => Joined::Left(left),
            });
        }
        self.pending.extend(rest.map(Joined::Right));
    }
}

impl<'l, 'r, T, L, R> Iterator for MergeJoin<'l, 'r, T, L, R>
where
    T: LibraryEntry + 'l + 'r,
    L: Iterator<Item = &'l T>,
    R: Iterator<Item = &'r T>,
{
    type Item = Joined<'l, 'r, T>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(joined) = self.pending.pop_front() {
            return Some(joined);
        }
        let order = match (self.left.peek(), self.right.peek()) {
            (None, None) => return None,
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (Some(l), Some(r)) => cmp_names(l.name(), r.name()),
        };
        match order {
            Ordering::Less => Some(Joined::Left(self.left.next()?)),
            Ordering::Greater => Some(Joined::Right(self.right.next()?)),
            Ordering::Equal => {
                self.pair_run();
                self.pending.pop_front()
            }
        }
    }
}

/// Compares `primary` against `secondary`. Unscanned parts of either tree
/// simply contribute nothing.
pub fn compare<'a>(
    primary: &'a MusicLibrary,
    secondary: &'a MusicLibrary,
) -> LibraryComparison<'a> {
    let mut result = LibraryComparison::default();
    for artists in merge_join(primary.artists(), secondary.artists()) {
        match artists {
            Joined::Left(artist) => result.missing_artists.push(artist),
            Joined::Right(artist) => result.additional_artists.push(artist),
            Joined::Both(left, right) => compare_albums(left, right, &mut result),
        }
    }
    result
}

fn compare_albums<'a>(
    primary: &'a ArtistEntry,
    secondary: &'a ArtistEntry,
    result: &mut LibraryComparison<'a>,
) {
    for albums in merge_join(primary.albums(), secondary.albums()) {
        match albums {
            Joined::Left(album) => result.missing_albums.push(album),
            Joined::Right(album) => result.additional_albums.push(album),
            Joined::Both(left, right) => compare_tracks(left, right, result),
        }
    }
}

fn compare_tracks<'a>(
    primary: &'a AlbumEntry,
    secondary: &'a AlbumEntry,
    result: &mut LibraryComparison<'a>,
) {
    for tracks in merge_join(primary.tracks(), secondary.tracks()) {
        match tracks {
            Joined::Left(track) => result.missing_tracks.push(track),
            Joined::Right(track) => result.additional_tracks.push(track),
            Joined::Both(left, right) => {
                if !left.equal(right, true) {
                    result.different_tracks.push((left, right));
                }
            }
        }
    }
}

/// Collects every track of `this` with an equal (including file size)
/// counterpart in `other`, grouped by artist and album name of `this`.
pub fn compare_existing<'a>(this: &'a MusicLibrary, other: &MusicLibrary) -> EqualTracks<'a> {
    let mut equal = EqualTracks::new();
    for artists in merge_join(this.artists(), other.artists()) {
        let Joined::Both(artist, other_artist) = artists else {
            continue;
        };
        for albums in merge_join(artist.albums(), other_artist.albums()) {
            let Joined::Both(album, other_album) = albums else {
                continue;
            };
            let tracks: Vec<_> = merge_join(album.tracks(), other_album.tracks())
                .filter_map(|tracks| match tracks {
                    Joined::Both(track, other_track) if track.equal(other_track, true) => {
                        Some(track)
                    }
                    _ => None,
                })
                .collect();
            if !tracks.is_empty() {
                equal
                    .entry(artist.artist_name().to_string())
                    .or_default()
                    .insert(album.album_name().to_string(), tracks);
            }
        }
    }
    equal
}
