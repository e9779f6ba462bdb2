//! Filesystem Media Index
//!
//! Desktop stand-in for the platform media store: walks a library folder,
//! reads tags with `lofty` and reports every audio file it finds.

use bridge_traits::{
    catalog::{LocalAudioFile, MediaIndex},
    error::{BridgeError, Result},
};
use lofty::config::ParseOptions;
use lofty::file::{AudioFile, TaggedFileExt};
use lofty::probe::Probe;
use lofty::tag::Accessor;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

const AUDIO_EXTENSIONS: &[&str] = &["mp3", "flac", "ogg", "opus", "m4a", "aac", "wav"];

/// Media index backed by a directory tree
///
/// Media ids are derived from the file path, so they stay stable across
/// scans as long as files are not moved.
pub struct FsMediaIndex {
    root: PathBuf,
    parse_options: ParseOptions,
}

impl FsMediaIndex {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            parse_options: ParseOptions::new(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn collect(&self, dir: &Path, files: &mut Vec<LocalAudioFile>) -> Result<()> {
        let mut entries = std::fs::read_dir(dir)
            .map_err(BridgeError::Io)?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .collect::<Vec<_>>();
        entries.sort();

        for path in entries {
            if path.is_dir() {
                if let Err(e) = self.collect(&path, files) {
                    warn!(dir = ?path, error = %e, "Skipping unreadable directory");
                }
            } else if is_audio(&path) {
                files.push(self.describe(path));
            }
        }
        Ok(())
    }

    /// Tags are best effort: unreadable files are still listed.
    fn describe(&self, path: PathBuf) -> LocalAudioFile {
        let mut file = LocalAudioFile {
            media_id: media_id(&path),
            path,
            title: None,
            artist: None,
            duration: None,
        };

        let tagged = Probe::open(&file.path)
            .map(|probe| probe.options(self.parse_options))
            .and_then(|probe| probe.read());
        match tagged {
            Ok(tagged) => {
                let duration = tagged.properties().duration();
                file.duration = (duration > Duration::ZERO).then_some(duration);

                if let Some(tag) = tagged.primary_tag().or_else(|| tagged.first_tag()) {
                    file.title = tag.title().map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
                    file.artist = tag.artist().map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
                }
            }
            Err(e) => debug!(file = ?file.path.file_name(), error = %e, "No readable tags"),
        }
        file
    }
}

impl MediaIndex for FsMediaIndex {
    fn query_all_audio_files(&self) -> Result<Vec<LocalAudioFile>> {
        if !self.root.is_dir() {
            debug!(root = ?self.root, "Library folder missing");
            return Ok(Vec::new());
        }

        let mut files = Vec::new();
        self.collect(&self.root, &mut files)?;
        debug!(count = files.len(), "Media index scanned");
        Ok(files)
    }
}

fn is_audio(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| AUDIO_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
}

fn media_id(path: &Path) -> String {
    let mut hasher = Sha256::new();
    hasher.update(path.to_string_lossy().as_bytes());
    let digest = format!("{:x}", hasher.finalize());
    digest[..16].to_string()
}
