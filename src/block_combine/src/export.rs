//! Exporter boundary: stored results to vendor-facing artifacts.
//!
//! [`BlkExporter`] writes one custom-block file per rank, named
//! `{file_stem}{rank}.{extension}` (`ZH1.blk`, `ZH2.blk`, ...). Each file lists
//! the three block codes, each prefixed with the vendor's block market marker,
//! followed by the common stock codes, one token per line, in the configured
//! encoding.

use std::fs;
use std::path::{Path, PathBuf};

use encoding_rs::Encoding;

use crate::combine::Combination;
use crate::config::ExportSettings;
use crate::error::{Error, Result};
use crate::text::{encode, resolve_encoding};

/// Turns ranked results into artifacts under a destination directory.
pub trait Exporter {
    /// Write one artifact per result, in rank order. Returns the written paths.
    fn export(&self, results: &[Combination], destination: &Path) -> Result<Vec<PathBuf>>;
}

/// Vendor `.blk` exporter.
#[derive(Debug, Clone)]
pub struct BlkExporter {
    file_stem: String,
    extension: String,
    block_prefix: String,
    encoding: &'static Encoding,
}

impl BlkExporter {
    /// Build from export settings; fails on an unknown encoding label.
    pub fn new(settings: &ExportSettings) -> Result<Self> {
        Ok(Self {
            file_stem: settings.file_stem.clone(),
            extension: settings.extension.trim_start_matches('.').to_string(),
            block_prefix: settings.block_prefix.clone(),
            encoding: resolve_encoding(&settings.encoding)?,
        })
    }

    /// File name for a 1-based rank.
    pub fn file_name(&self, rank: usize) -> String {
        format!("{}{rank}.{}", self.file_stem, self.extension)
    }

    /// Rank encoded in an artifact file name, if `name` is one of ours.
    pub fn rank_of(&self, name: &str) -> Option<usize> {
        let digits = name
            .strip_prefix(self.file_stem.as_str())?
            .strip_suffix(self.extension.as_str())?
            .strip_suffix('.')?;
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        digits.parse().ok()
    }

    // Artifacts from an earlier, longer export would otherwise outlive their results.
    fn remove_stale(&self, destination: &Path, kept: usize) -> Result<usize> {
        let mut removed = 0;
        for entry in fs::read_dir(destination)? {
            let entry = entry?;
            let name = entry.file_name();
            let Some(rank) = name.to_str().and_then(|n| self.rank_of(n)) else {
                continue;
            };
            if rank > kept && entry.file_type()?.is_file() {
                fs::remove_file(entry.path())?;
                tracing::debug!(path = %entry.path().display(), "stale artifact removed");
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Artifact body for one result.
    pub fn render(&self, result: &Combination) -> String {
        let mut body = String::new();
        for block in &result.blocks {
            body.push_str(&self.block_prefix);
            body.push_str(block);
            body.push('\n');
        }
        for stock in &result.stocks {
            body.push_str(stock);
            body.push('\n');
        }
        body
    }
}

impl Exporter for BlkExporter {
    fn export(&self, results: &[Combination], destination: &Path) -> Result<Vec<PathBuf>> {
        if results.is_empty() {
            return Err(Error::Validation("no stored results to export".into()));
        }
        fs::create_dir_all(destination)?;

        let mut written = Vec::with_capacity(results.len());
        for (i, result) in results.iter().enumerate() {
            let path = destination.join(self.file_name(i + 1));
            let bytes = encode(&self.render(result), self.encoding)?;
            fs::write(&path, bytes)?;
            tracing::debug!(path = %path.display(), stocks = result.stocks.len(), "artifact written");
            written.push(path);
        }
        let removed = self.remove_stale(destination, written.len())?;

        tracing::info!(
            files = written.len(),
            removed,
            dir = %destination.display(),
            encoding = self.encoding.name(),
            "results exported"
        );
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exporter() -> BlkExporter {
        BlkExporter::new(&ExportSettings::default()).unwrap()
    }

    #[test]
    fn file_names_are_distinct_per_rank() {
        let e = exporter();
        assert_eq!(e.file_name(1), "ZH1.blk");
        assert_eq!(e.file_name(3), "ZH3.blk");
    }

    #[test]
    fn render_lists_prefixed_blocks_then_stocks() {
        let r = Combination {
            blocks: ["880761".into(), "880900".into(), "880901".into()],
            count: 2,
            stocks: vec!["0000858".into(), "1600519".into()],
        };
        assert_eq!(
            exporter().render(&r),
            "1880761\n1880900\n1880901\n0000858\n1600519\n"
        );
    }

    #[test]
    fn rank_is_read_back_from_file_names() {
        let e = exporter();
        assert_eq!(e.rank_of("ZH12.blk"), Some(12));
        assert_eq!(e.rank_of("ZH.blk"), None);
        assert_eq!(e.rank_of("ZHx.blk"), None);
        assert_eq!(e.rank_of("ZH1.txt"), None);
        assert_eq!(e.rank_of("AB1.blk"), None);
    }

    #[test]
    fn shorter_export_drops_higher_ranks() {
        let dir = tempfile::TempDir::new().unwrap();
        let one = Combination {
            blocks: ["880761".into(), "880900".into(), "880901".into()],
            count: 1,
            stocks: vec!["1600519".into()],
        };
        std::fs::write(dir.path().join("notes.txt"), "keep").unwrap();

        exporter().export(&vec![one.clone(); 5], dir.path()).unwrap();
        let written = exporter().export(&vec![one; 3], dir.path()).unwrap();
        assert_eq!(written.len(), 3);

        let mut names: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        assert_eq!(names, vec!["ZH1.blk", "ZH2.blk", "ZH3.blk", "notes.txt"]);
    }

    #[test]
    fn nothing_to_export_is_a_validation_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let err = exporter().export(&[], dir.path()).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }
}
