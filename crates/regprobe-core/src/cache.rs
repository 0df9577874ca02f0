//! Read-only inspection of the proxy's on-disk cache, and the advisory
//! cold/warm timing comparison.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::routing::validate_crate_name;

/// Number of sample paths kept in a [`CacheCheck`].
pub const SAMPLE_LIMIT: usize = 5;

/// What was found under `{cache_root}/{crate}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheCheck {
    pub crate_name: String,
    /// False iff the crate directory is absent.
    pub exists: bool,
    /// Regular files found recursively under the crate directory.
    pub file_count: usize,
    /// First [`SAMPLE_LIMIT`] files in sorted order, relative to the cache root.
    pub sample_files: Vec<PathBuf>,
}

impl CacheCheck {
    fn absent(crate_name: &str) -> Self {
        Self {
            crate_name: crate_name.to_string(),
            exists: false,
            file_count: 0,
            sample_files: Vec::new(),
        }
    }

    /// Files beyond the sample.
    pub fn remaining(&self) -> usize {
        self.file_count.saturating_sub(self.sample_files.len())
    }
}

/// Inspects `{cache_root}/{crate_name}`. A missing root or crate directory is
/// a normal negative result; unreadable subdirectories are skipped.
pub fn check_local_cache(cache_root: &Path, crate_name: &str) -> CacheCheck {
    let name = match validate_crate_name(crate_name) {
        Ok(name) => name,
        Err(err) => {
            tracing::warn!("cache check skipped: {}", err);
            return CacheCheck::absent(crate_name);
        }
    };
    let crate_dir = cache_root.join(name);
    if !crate_dir.is_dir() {
        tracing::debug!(path = %crate_dir.display(), "crate cache directory absent");
        return CacheCheck::absent(crate_name);
    }

    let mut files = Vec::new();
    collect_files(&crate_dir, &mut files);
    files.sort();

    let sample_files = files
        .iter()
        .take(SAMPLE_LIMIT)
        .map(|p| p.strip_prefix(cache_root).unwrap_or(p).to_path_buf())
        .collect();

    CacheCheck {
        crate_name: crate_name.to_string(),
        exists: true,
        file_count: files.len(),
        sample_files,
    }
}

/// Depth-first walk; symlinked directories are not followed.
fn collect_files(dir: &Path, out: &mut Vec<PathBuf>) {
    let entries = match fs::read_dir(dir) {
        Ok(e) => e,
        Err(e) => {
            tracing::warn!(path = %dir.display(), "cannot read cache directory: {}", e);
            return;
        }
    };
    for entry in entries.flatten() {
        let path = entry.path();
        match entry.file_type() {
            Ok(ft) if ft.is_dir() => collect_files(&path, out),
            Ok(_) if path.is_file() => out.push(path),
            Ok(_) => {}
            Err(e) => tracing::warn!(path = %path.display(), "cannot stat cache entry: {}", e),
        }
    }
}

/// Advisory comparison of a cold and a warm fetch through the proxy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheVerdict {
    /// The warm fetch was strictly faster: evidence the proxy served from cache.
    Faster { cold: Duration, warm: Duration },
    /// Comparable or slower; proves nothing either way.
    Inconclusive { cold: Duration, warm: Duration },
}

pub fn compare_cache_timing(cold: Duration, warm: Duration) -> CacheVerdict {
    if warm < cold {
        CacheVerdict::Faster { cold, warm }
    } else {
        CacheVerdict::Inconclusive { cold, warm }
    }
}
