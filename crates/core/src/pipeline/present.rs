//! Rendering candidates as stream entries.

use super::files::select_file;
use super::StreamEntry;
use crate::debrid::StorageBackend;
use crate::media::{MediaKind, MediaQuery};
use crate::searcher::Candidate;

const SIZE_UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];

/// Request-level inputs of the rendering.
pub struct Presentation<'a> {
    pub addon_name: &'a str,
    pub public_url: &'a str,
    /// Encoded profile, as embedded in action URLs.
    pub profile_segment: &'a str,
    pub mediaflow: bool,
}

/// Human readable size with up to two decimals ("1.5 GB").
pub fn format_size(bytes: u64) -> String {
    if bytes == 0 {
        return "0 B".to_string();
    }
    let mut unit = 0;
    let mut value = bytes as f64;
    while value >= 1024.0 && unit < SIZE_UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{} {}", (value * 100.0).round() / 100.0, SIZE_UNITS[unit])
}

/// Build the listing entry of one candidate.
pub fn render_stream(
    candidate: &Candidate,
    query: &MediaQuery,
    backend: &dyn StorageBackend,
    presentation: &Presentation<'_>,
) -> StreamEntry {
    let files = candidate
        .infos
        .as_ref()
        .map(|i| i.files.as_slice())
        .unwrap_or_default();
    let file = select_file(
        files,
        query.kind,
        query.season_number(),
        query.episode_number(),
    );

    let mut rows = vec![candidate.name.clone()];
    if let (MediaKind::Series, Some(file)) = (query.kind, file) {
        rows.push(file.name.clone());
    }
    if let Some(text) = &candidate.info_text {
        rows.push(format!("ℹ️ {}", text));
    }

    let size = file
        .map(|f| f.size)
        .filter(|s| *s > 0)
        .unwrap_or(candidate.size_bytes);
    let mut stats = vec![
        format!("💾{}", format_size(size)),
        format!("👥{}", candidate.seeders),
        format!("⚙️{}", candidate.indexer_id),
    ];
    stats.extend(candidate.languages.iter().map(|l| l.emoji().to_string()));
    rows.push(stats.join(" "));

    if let (Some(progress), false) = (&candidate.progress, candidate.is_cached) {
        rows.push(format!(
            "⬇️ {}% {}/s",
            progress.percent,
            format_size(progress.speed)
        ));
    }

    let quality = if candidate.quality.value() > 0 {
        candidate.quality.label()
    } else {
        ""
    };
    let name = format!(
        "[{}{}] {}{} {}",
        backend.short_name(),
        backend.availability_icon(candidate.is_cached),
        if presentation.mediaflow { "🕵🏼‍♂️ " } else { "" },
        presentation.addon_name,
        quality
    );

    let url = if candidate.disabled {
        "#".to_string()
    } else {
        let filename = file.map(|f| f.name.as_str()).unwrap_or(&candidate.name);
        format!(
            "{}/{}/download/{}/{}/{}/{}",
            presentation.public_url,
            presentation.profile_segment,
            query.kind,
            query.media_id,
            candidate.torrent_id().unwrap_or_default(),
            urlencoding::encode(filename)
        )
    };

    StreamEntry {
        name,
        title: rows.join("\n"),
        url,
        disabled: candidate.disabled,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::debrid::Progress;
    use crate::searcher::Language;
    use crate::testing::{fixtures, MockStorageBackend};
    use crate::torrent_info::TorrentFileEntry;

    fn presentation() -> Presentation<'static> {
        Presentation {
            addon_name: "Debridge",
            public_url: "https://addon.example",
            profile_segment: "cfg",
            mediaflow: false,
        }
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(0), "0 B");
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(1536), "1.5 KB");
        assert_eq!(format_size(3 * 1024 * 1024 * 1024), "3 GB");
    }

    #[test]
    fn test_movie_entry() {
        let backend = MockStorageBackend::new();
        let mut candidate = fixtures::enriched_candidate("Test Movie 2020 1080p", "hash-a", 12);
        candidate.is_cached = true;
        candidate.languages = vec![Language::French];
        if let Some(infos) = candidate.infos.as_mut() {
            infos.files = vec![
                TorrentFileEntry {
                    name: "movie file.mkv".to_string(),
                    size: 2048,
                },
                TorrentFileEntry {
                    name: "sample.mkv".to_string(),
                    size: 10,
                },
            ];
        }
        let query = fixtures::movie_query("tt1");

        let entry = render_stream(&candidate, &query, &backend, &presentation());
        assert_eq!(entry.name, "[MK+] Debridge 1080p");
        assert_eq!(
            entry.title,
            "Test Movie 2020 1080p\n💾2 KB 👥12 ⚙️test-indexer 🇫🇷"
        );
        let torrent_id = candidate.torrent_id().unwrap();
        assert_eq!(
            entry.url,
            format!(
                "https://addon.example/cfg/download/movie/tt1/{}/movie%20file.mkv",
                torrent_id
            )
        );
        assert!(!entry.disabled);
    }

    #[test]
    fn test_series_entry_with_progress() {
        let backend = MockStorageBackend::new();
        let mut candidate = fixtures::enriched_candidate("Test Show S01 720p", "hash-b", 3);
        candidate.progress = Some(Progress {
            percent: 42.0,
            speed: 2048,
        });
        candidate.info_text = Some("note".to_string());
        if let Some(infos) = candidate.infos.as_mut() {
            infos.files = vec![
                TorrentFileEntry {
                    name: "Test.Show.S01E01.mkv".to_string(),
                    size: 1024,
                },
                TorrentFileEntry {
                    name: "Test.Show.S01E02.mkv".to_string(),
                    size: 1024,
                },
            ];
        }
        let query = fixtures::episode_query("tt2", 1, 2);
        let p = Presentation {
            mediaflow: true,
            ..presentation()
        };

        let entry = render_stream(&candidate, &query, &backend, &p);
        assert_eq!(entry.name, "[MK] 🕵🏼‍♂️ Debridge 720p");
        let rows: Vec<&str> = entry.title.lines().collect();
        assert_eq!(rows[1], "Test.Show.S01E02.mkv");
        assert_eq!(rows[2], "ℹ️ note");
        assert_eq!(rows[4], "⬇️ 42% 2 KB/s");
        assert!(entry.url.contains("/download/series/tt2:1:2/"));
    }

    #[test]
    fn test_disabled_entry_has_no_action() {
        let backend = MockStorageBackend::new();
        let mut candidate = fixtures::enriched_candidate("Test Movie", "hash-c", 1);
        candidate.disable("nope");
        let entry = render_stream(
            &candidate,
            &fixtures::movie_query("tt1"),
            &backend,
            &presentation(),
        );
        assert_eq!(entry.url, "#");
        assert!(entry.disabled);
        assert!(entry.name.ends_with("Debridge "));
    }
}
