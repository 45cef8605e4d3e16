//! Source-directory scanning.
//!
//! Each configured directory is listed non-recursively and file names are
//! matched against `ingest.include_globs`. Missing directories and
//! unreadable entries (such as dangling symlinks) are logged and skipped.

use anyhow::Result;
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::config::IngestConfig;

/// Scan outcome for one configured directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryScan {
    pub directory: PathBuf,
    pub exists: bool,
    pub files: Vec<PathBuf>,
}

/// Scan every directory, in configuration order.
pub fn scan_directories(directories: &[PathBuf], include_globs: &[String]) -> Result<Vec<DirectoryScan>> {
    let include_set = build_globset(include_globs)?;
    directories
        .iter()
        .map(|dir| scan_directory(dir, &include_set))
        .collect()
}

/// All matching files across the configured directories.
pub fn collect_files(config: &IngestConfig) -> Result<Vec<PathBuf>> {
    let scans = scan_directories(&config.directories, &config.include_globs)?;
    Ok(scans.into_iter().flat_map(|s| s.files).collect())
}

fn scan_directory(dir: &Path, include_set: &GlobSet) -> Result<DirectoryScan> {
    if !dir.is_dir() {
        tracing::warn!(directory = %dir.display(), "source directory does not exist, skipping");
        return Ok(DirectoryScan {
            directory: dir.to_path_buf(),
            exists: false,
            files: Vec::new(),
        });
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1).follow_links(true) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!(directory = %dir.display(), error = %e, "unreadable entry, skipping");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy();
        if include_set.is_match(name.as_ref()) {
            files.push(entry.into_path());
        }
    }

    // Sort for deterministic batches
    files.sort();

    tracing::debug!(directory = %dir.display(), files = files.len(), "scanned source directory");
    Ok(DirectoryScan {
        directory: dir.to_path_buf(),
        exists: true,
        files,
    })
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}
