//! Resource value objects returned by providers
//!
//! These are read-mostly values: the daemon moves them between providers,
//! channel queues and listeners but never mutates them.

use crate::address::ResourceId;
use serde::{Deserialize, Serialize};

/// A playable song
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Song {
    /// Of kind [`ResourceKind::Song`](crate::ResourceKind::Song) for every
    /// song a provider returns
    pub resource_id: ResourceId,
    /// Location a listener can open, e.g. `file:///music/a.flac`
    pub uri: String,
    /// Song length in seconds
    pub duration: u64,
    pub title: Option<String>,
    pub album_name: Option<String>,
    pub artist_name: Option<String>,
}

impl Song {
    pub fn new(resource_id: ResourceId, uri: impl Into<String>, duration: u64) -> Self {
        Self {
            resource_id,
            uri: uri.into(),
            duration,
            title: None,
            album_name: None,
            artist_name: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_album_name(mut self, album_name: impl Into<String>) -> Self {
        self.album_name = Some(album_name.into());
        self
    }

    pub fn with_artist_name(mut self, artist_name: impl Into<String>) -> Self {
        self.artist_name = Some(artist_name.into());
        self
    }

    /// Human readable label for logs (title, falling back to the uri)
    pub fn display_name(&self) -> &str {
        self.title.as_deref().unwrap_or(&self.uri)
    }
}

/// An album; `songs` is `None` when the provider does not list them
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Album {
    pub resource_id: ResourceId,
    pub title: Option<String>,
    pub songs: Option<Vec<Song>>,
}

/// An artist; `albums` is `None` when the provider does not list them
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artist {
    pub resource_id: ResourceId,
    pub name: Option<String>,
    pub albums: Option<Vec<Album>>,
}

impl Album {
    /// Songs of this album, empty when none are listed
    pub fn song_list(&self) -> &[Song] {
        self.songs.as_deref().unwrap_or(&[])
    }
}

impl Artist {
    /// Concatenation of every listed album's songs, in album order
    ///
    /// Albums without a song list contribute nothing.
    pub fn all_songs(&self) -> Vec<Song> {
        self.albums
            .iter()
            .flatten()
            .flat_map(|album| album.song_list().iter().cloned())
            .collect()
    }
}
