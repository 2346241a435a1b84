//! Filesystem provider
//!
//! Scans the configured directories once at construction and serves the
//! songs it finds. Songs are keyed by absolute path, albums by album title and
//! artists by artist name.
//!
//! Config:
//!
//! ```toml
//! [default]
//! paths = ["$MUSIC"]
//! exclude_paths = ["$MUSIC/podcasts"]
//! ```
//!
//! `$HOME`, `$MUSIC`, `$DOCUMENTS`, `$DOWNLOADS`, `$DESKTOP`, `$PICTURES` and
//! `$VIDEOS` expand to the platform user directories. `&` escapes the next
//! character, so `&$` is a literal dollar sign and `&&` a literal ampersand.

use async_trait::async_trait;
use dorothy_common::{Album, Artist, NodeInstancePath, ResourceId, Song};
use lofty::prelude::*;
use lofty::probe::Probe;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::node::{
    NodeConfig, NodeFailure, NodeManifest, NodeResult, NodeType, Provider, ProviderType,
};

pub const NODE_NAME: &str = "filesystem";

const UNKNOWN_ALBUM: &str = "Unknown album";
const UNKNOWN_ARTIST: &str = "Unknown artist";

#[derive(Debug, Deserialize)]
struct FilesystemSettings {
    #[serde(default = "default_paths")]
    paths: Vec<String>,
    #[serde(default)]
    exclude_paths: Vec<String>,
}

fn default_paths() -> Vec<String> {
    vec!["$MUSIC".to_string()]
}

// ============================================================================
// Path expansion
// ============================================================================

fn special_dir(word: &str) -> Option<PathBuf> {
    match word {
        "HOME" => dirs::home_dir(),
        "MUSIC" => dirs::audio_dir(),
        "DOCUMENTS" => dirs::document_dir(),
        "DOWNLOADS" => dirs::download_dir(),
        "DESKTOP" => dirs::desktop_dir(),
        "PICTURES" => dirs::picture_dir(),
        "VIDEOS" => dirs::video_dir(),
        _ => None,
    }
}

const SPECIAL_WORDS: [&str; 7] = [
    "HOME",
    "MUSIC",
    "DOCUMENTS",
    "DOWNLOADS",
    "DESKTOP",
    "PICTURES",
    "VIDEOS",
];

/// Expand `$WORD` placeholders in a configured path
///
/// Returns `None` when a placeholder names a directory the platform does not
/// define. An unknown `$WORD` is kept literally.
pub fn expand_path(raw: &str) -> Option<PathBuf> {
    let mut expanded = String::new();
    let mut rest = raw;

    while let Some(c) = rest.chars().next() {
        rest = &rest[c.len_utf8()..];
        match c {
            '&' => {
                if let Some(escaped) = rest.chars().next() {
                    expanded.push(escaped);
                    rest = &rest[escaped.len_utf8()..];
                }
            }
            '$' => match SPECIAL_WORDS.iter().find(|word| rest.starts_with(*word)) {
                Some(word) => {
                    let dir = special_dir(word)?;
                    expanded.push_str(&dir.to_string_lossy());
                    rest = &rest[word.len()..];
                }
                None => expanded.push('$'),
            },
            other => expanded.push(other),
        }
    }

    Some(PathBuf::from(expanded))
}

/// Drop roots nested inside another root, and duplicates
fn remove_redundant_roots(roots: Vec<PathBuf>) -> Vec<PathBuf> {
    let mut kept: Vec<PathBuf> = Vec::new();
    for root in roots {
        if kept.iter().any(|existing| root.starts_with(existing)) {
            debug!("Source path {} is already covered", root.display());
            continue;
        }
        kept.retain(|existing| !existing.starts_with(&root));
        kept.push(root);
    }
    kept
}

// ============================================================================
// Index
// ============================================================================

#[derive(Debug, Default)]
struct Library {
    /// absolute path -> song
    songs: BTreeMap<String, Song>,
    /// album title -> song paths
    albums: BTreeMap<String, Vec<String>>,
    /// artist name -> album title -> song paths by that artist
    artists: BTreeMap<String, BTreeMap<String, Vec<String>>>,
}

impl Library {
    fn add(&mut self, song: Song) {
        let key = song.resource_id.unique_id.clone();
        let album = song.album_name.clone().unwrap_or_else(|| UNKNOWN_ALBUM.to_string());
        let artist = song.artist_name.clone().unwrap_or_else(|| UNKNOWN_ARTIST.to_string());

        self.albums.entry(album.clone()).or_default().push(key.clone());
        self.artists
            .entry(artist)
            .or_default()
            .entry(album)
            .or_default()
            .push(key.clone());
        self.songs.insert(key, song);
    }
}

fn read_song(path: &Path, node_instance_path: &NodeInstancePath) -> Option<Song> {
    let tagged_file = match Probe::open(path).and_then(|probe| probe.read()) {
        Ok(tagged_file) => tagged_file,
        Err(e) => {
            debug!("Skipping {}: {}", path.display(), e);
            return None;
        }
    };

    let duration = tagged_file.properties().duration().as_secs_f64().ceil() as u64;
    let absolute = path.to_string_lossy().to_string();
    let mut song = Song::new(
        ResourceId::song(node_instance_path.clone(), absolute.as_str()),
        format!("file://{}", absolute),
        duration,
    );

    if let Some(tag) = tagged_file.primary_tag().or_else(|| tagged_file.first_tag()) {
        song.title = tag.title().map(|s| s.to_string());
        song.album_name = tag.album().map(|s| s.to_string());
        song.artist_name = tag.artist().map(|s| s.to_string());
    }

    Some(song)
}

fn scan(roots: &[PathBuf], excluded: &[PathBuf], node_instance_path: &NodeInstancePath) -> Library {
    let mut library = Library::default();

    for root in roots {
        let walker = WalkDir::new(root)
            .follow_links(true)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| !excluded.iter().any(|ex| entry.path().starts_with(ex)));

        for entry in walker {
            match entry {
                Ok(entry) if entry.file_type().is_file() => {
                    if let Some(song) = read_song(entry.path(), node_instance_path) {
                        library.add(song);
                    }
                }
                Ok(_) => {}
                Err(e) => warn!("Error accessing entry: {}", e),
            }
        }
    }

    library
}

// ============================================================================
// Node
// ============================================================================

pub struct FilesystemProviderType;

impl NodeType for FilesystemProviderType {
    fn node_manifest(&self) -> NodeManifest {
        NodeManifest::new(NODE_NAME)
            .with_default("paths", vec!["$MUSIC".to_string()])
            .with_default("exclude_paths", Vec::<String>::new())
    }
}

impl ProviderType for FilesystemProviderType {
    fn build(&self, config: NodeConfig, path: NodeInstancePath) -> NodeResult<Arc<dyn Provider>> {
        Ok(Arc::new(FilesystemProvider::new(config, path)?))
    }
}

pub struct FilesystemProvider {
    node_instance_path: NodeInstancePath,
    library: Library,
}

impl FilesystemProvider {
    pub fn new(config: NodeConfig, node_instance_path: NodeInstancePath) -> NodeResult<Self> {
        let settings: FilesystemSettings = toml::Value::Table(config)
            .try_into()
            .map_err(|e| NodeFailure::new(format!("invalid filesystem config: {}", e)))?;

        let expand_all = |raw: &[String]| -> Vec<PathBuf> {
            raw.iter()
                .filter_map(|entry| {
                    let expanded = expand_path(entry);
                    match &expanded {
                        Some(path) => info!("Parsed path \"{}\" to \"{}\"", entry, path.display()),
                        None => warn!("Path \"{}\" names an unknown user directory", entry),
                    }
                    expanded
                })
                .collect()
        };

        let roots: Vec<PathBuf> = remove_redundant_roots(expand_all(&settings.paths))
            .into_iter()
            .filter(|root| {
                let exists = root.is_dir();
                if !exists {
                    warn!("Source path {} does not exist", root.display());
                }
                exists
            })
            .filter_map(|root| root.canonicalize().ok())
            .collect();

        if roots.is_empty() {
            return Err(NodeFailure::new("none of the configured source paths exist"));
        }

        let excluded: Vec<PathBuf> = expand_all(&settings.exclude_paths)
            .into_iter()
            .map(|path| path.canonicalize().unwrap_or(path))
            .collect();

        let library = scan(&roots, &excluded, &node_instance_path);
        info!(
            "Provider \"{}\" indexed {} songs in {} albums",
            node_instance_path,
            library.songs.len(),
            library.albums.len()
        );

        Ok(Self {
            node_instance_path,
            library,
        })
    }

    fn album(&self, title: &str) -> Option<Album> {
        let paths = self.library.albums.get(title)?;
        Some(self.album_with(title, paths))
    }

    fn album_with(&self, title: &str, paths: &[String]) -> Album {
        let songs = paths
            .iter()
            .filter_map(|path| self.library.songs.get(path).cloned())
            .collect();
        Album {
            resource_id: ResourceId::album(self.node_instance_path.clone(), title),
            title: Some(title.to_string()),
            songs: Some(songs),
        }
    }

    /// Albums of an artist list only that artist's songs, even when another
    /// artist shares the album title
    fn artist(&self, name: &str) -> Option<Artist> {
        let albums = self
            .library
            .artists
            .get(name)?
            .iter()
            .map(|(title, paths)| self.album_with(title, paths))
            .collect();
        Some(Artist {
            resource_id: ResourceId::artist(self.node_instance_path.clone(), name),
            name: Some(name.to_string()),
            albums: Some(albums),
        })
    }
}

#[async_trait]
impl Provider for FilesystemProvider {
    async fn get_song(&self, unique_id: &str) -> NodeResult<Option<Song>> {
        Ok(self.library.songs.get(unique_id).cloned())
    }

    async fn get_all_songs(&self) -> NodeResult<Vec<Song>> {
        Ok(self.library.songs.values().cloned().collect())
    }

    async fn get_album(&self, unique_id: &str) -> NodeResult<Option<Album>> {
        Ok(self.album(unique_id))
    }

    async fn get_all_albums(&self) -> NodeResult<Vec<Album>> {
        Ok(self
            .library
            .albums
            .keys()
            .filter_map(|title| self.album(title))
            .collect())
    }

    async fn get_artist(&self, unique_id: &str) -> NodeResult<Option<Artist>> {
        Ok(self.artist(unique_id))
    }

    async fn get_all_artists(&self) -> NodeResult<Vec<Artist>> {
        Ok(self
            .library
            .artists
            .keys()
            .filter_map(|name| self.artist(name))
            .collect())
    }
}
