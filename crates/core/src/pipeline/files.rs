//! Picking the file to play inside a torrent.

use crate::debrid::DebridFile;
use crate::media::MediaKind;
use crate::torrent_info::TorrentFileEntry;

/// A file with a name and a size.
pub trait NamedFile {
    fn file_name(&self) -> &str;
    fn file_size(&self) -> u64;
}

impl NamedFile for DebridFile {
    fn file_name(&self) -> &str {
        &self.name
    }

    fn file_size(&self) -> u64 {
        self.size
    }
}

impl<F: NamedFile> NamedFile for &F {
    fn file_name(&self) -> &str {
        (**self).file_name()
    }

    fn file_size(&self) -> u64 {
        (**self).file_size()
    }
}

impl NamedFile for TorrentFileEntry {
    fn file_name(&self) -> &str {
        &self.name
    }

    fn file_size(&self) -> u64 {
        self.size
    }
}

/// First file whose name carries the episode number.
///
/// Tokens are tried from strictest to loosest (`s01e002`, `s01e02`, `102`,
/// `02`); each token is searched across all files before the next one.
pub fn search_episode_file<F: NamedFile>(files: &[F], season: u32, episode: u32) -> Option<&F> {
    let names: Vec<String> = files.iter().map(|f| f.file_name().to_lowercase()).collect();
    let tokens = [
        format!("s{:02}e{:03}", season, episode),
        format!("s{:02}e{:02}", season, episode),
        format!("{}{:02}", season, episode),
        format!("{:02}", episode),
    ];
    tokens.iter().find_map(|token| {
        names
            .iter()
            .position(|name| name.contains(token.as_str()))
            .map(|i| &files[i])
    })
}

/// Pick the file to play: the largest one for a movie, the matching
/// episode for a series (largest first, falling back to the largest file).
pub fn select_file<F: NamedFile>(
    files: &[F],
    kind: MediaKind,
    season: u32,
    episode: u32,
) -> Option<&F> {
    let mut by_size: Vec<&F> = files.iter().collect();
    by_size.sort_by(|a, b| b.file_size().cmp(&a.file_size()));

    match kind {
        MediaKind::Movie => by_size.first().copied(),
        MediaKind::Series => search_episode_file(&by_size, season, episode)
            .copied()
            .or_else(|| by_size.first().copied()),
    }
}
