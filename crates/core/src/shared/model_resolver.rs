use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ModelResolveError {
    #[error("model file not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("failed to create cache directory: {0}")]
    CacheDir(#[source] std::io::Error),
    #[error("download failed for {url}: {source}")]
    Download {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("download failed for {url}: HTTP {status}")]
    HttpStatus { url: String, status: u16 },
    #[error("failed to write model to {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("could not determine cache directory")]
    NoCacheDir,
}

/// Progress callback: `(bytes_downloaded, total_bytes)`.
/// `total_bytes` is 0 if the server didn't provide Content-Length.
pub type ProgressFn = Box<dyn Fn(u64, u64) + Send>;

/// Resolve a model file by name, checking local locations before downloading.
///
/// Resolution order:
/// 1. `explicit` path, if given (no fallback when it is missing)
/// 2. User cache directory (platform-specific)
/// 3. Each of `search_dirs` (system installs, bundled copies)
/// 4. Download from URL to cache
pub fn resolve(
    name: &str,
    url: &str,
    explicit: Option<&Path>,
    search_dirs: &[PathBuf],
    progress: Option<ProgressFn>,
) -> Result<PathBuf, ModelResolveError> {
    if let Some(path) = explicit {
        return if path.is_file() {
            Ok(path.to_path_buf())
        } else {
            Err(ModelResolveError::NotFound(path.to_path_buf()))
        };
    }
    resolve_in(&model_cache_dir()?, name, url, search_dirs, progress)
}

fn resolve_in(
    cache_dir: &Path,
    name: &str,
    url: &str,
    search_dirs: &[PathBuf],
    progress: Option<ProgressFn>,
) -> Result<PathBuf, ModelResolveError> {
    let cached_path = cache_dir.join(name);
    if cached_path.is_file() {
        return Ok(cached_path);
    }

    if let Some(found) = find_local(name, search_dirs) {
        return Ok(found);
    }

    log::info!("Downloading {name} from {url}");
    fs::create_dir_all(cache_dir).map_err(ModelResolveError::CacheDir)?;
    download(url, &cached_path, progress)?;
    Ok(cached_path)
}

/// First directory in `dirs` that contains `name`.
pub fn find_local(name: &str, dirs: &[PathBuf]) -> Option<PathBuf> {
    dirs.iter()
        .map(|dir| dir.join(name))
        .find(|candidate| candidate.is_file())
}

/// Platform-specific model cache directory.
///
/// - macOS: `~/Library/Application Support/FaceCatcher/models/`
/// - Linux: `$XDG_CACHE_HOME/FaceCatcher/models/` or `~/.cache/FaceCatcher/models/`
/// - Windows: `%LOCALAPPDATA%/FaceCatcher/models/`
pub fn model_cache_dir() -> Result<PathBuf, ModelResolveError> {
    #[cfg(target_os = "macos")]
    {
        dirs::data_dir()
            .map(|d| d.join("FaceCatcher").join("models"))
            .ok_or(ModelResolveError::NoCacheDir)
    }
    #[cfg(not(target_os = "macos"))]
    {
        dirs::cache_dir()
            .map(|d| d.join("FaceCatcher").join("models"))
            .ok_or(ModelResolveError::NoCacheDir)
    }
}

fn download(url: &str, dest: &Path, progress: Option<ProgressFn>) -> Result<(), ModelResolveError> {
    let response = reqwest::blocking::get(url).map_err(|e| ModelResolveError::Download {
        url: url.to_string(),
        source: e,
    })?;

    let status = response.status();
    if !status.is_success() {
        return Err(ModelResolveError::HttpStatus {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }

    let total = response.content_length().unwrap_or(0);
    let bytes = response.bytes().map_err(|e| ModelResolveError::Download {
        url: url.to_string(),
        source: e,
    })?;

    // Write to a temp file first, then rename for atomicity
    let temp_path = dest.with_extension("part");
    let write_err = |e| ModelResolveError::Write {
        path: temp_path.clone(),
        source: e,
    };
    let mut file = fs::File::create(&temp_path).map_err(write_err)?;

    let mut downloaded: u64 = 0;
    for chunk in bytes.chunks(64 * 1024) {
        file.write_all(chunk).map_err(write_err)?;
        downloaded += chunk.len() as u64;
        if let Some(ref cb) = progress {
            cb(downloaded, total);
        }
    }
    file.flush().map_err(write_err)?;
    drop(file);

    fs::rename(&temp_path, dest).map_err(|e| ModelResolveError::Write {
        path: dest.to_path_buf(),
        source: e,
    })?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const UNREACHABLE_URL: &str = "http://invalid.nonexistent.example.com/cascade.xml";

    #[test]
    fn test_explicit_path_is_returned() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("custom.xml");
        fs::write(&path, b"<opencv_storage/>").unwrap();

        let resolved = resolve("ignored.xml", UNREACHABLE_URL, Some(&path), &[], None).unwrap();
        assert_eq!(resolved, path);
    }

    #[test]
    fn test_missing_explicit_path_does_not_fall_back() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("missing.xml");
        let err = resolve("ignored.xml", UNREACHABLE_URL, Some(&path), &[], None).unwrap_err();
        assert!(matches!(err, ModelResolveError::NotFound(p) if p == path));
    }

    #[test]
    fn test_cached_file_wins_over_search_dirs() {
        let tmp = TempDir::new().unwrap();
        let cache = tmp.path().join("cache");
        let system = tmp.path().join("system");
        fs::create_dir_all(&cache).unwrap();
        fs::create_dir_all(&system).unwrap();
        fs::write(cache.join("face.xml"), b"cached").unwrap();
        fs::write(system.join("face.xml"), b"system").unwrap();

        let resolved =
            resolve_in(&cache, "face.xml", UNREACHABLE_URL, &[system], None).unwrap();
        assert_eq!(resolved, cache.join("face.xml"));
    }

    #[test]
    fn test_search_dirs_checked_in_order() {
        let tmp = TempDir::new().unwrap();
        let cache = tmp.path().join("cache");
        let first = tmp.path().join("first");
        let second = tmp.path().join("second");
        fs::create_dir_all(&first).unwrap();
        fs::create_dir_all(&second).unwrap();
        fs::write(second.join("face.xml"), b"second").unwrap();

        let resolved = resolve_in(
            &cache,
            "face.xml",
            UNREACHABLE_URL,
            &[first, second.clone()],
            None,
        )
        .unwrap();
        assert_eq!(resolved, second.join("face.xml"));
    }

    #[test]
    fn test_find_local_none_when_absent() {
        let tmp = TempDir::new().unwrap();
        assert!(find_local("face.xml", &[tmp.path().to_path_buf()]).is_none());
    }

    #[test]
    fn test_model_cache_dir_returns_path() {
        let path = model_cache_dir().unwrap();
        assert!(path.to_string_lossy().contains("FaceCatcher"));
        assert!(path.ends_with("models"));
    }

    #[test]
    fn test_download_invalid_url_returns_error() {
        let tmp = TempDir::new().unwrap();
        let dest = tmp.path().join("cascade.xml");
        assert!(download(UNREACHABLE_URL, &dest, None).is_err());
    }

    #[test]
    fn test_download_atomic_no_partial_on_failure() {
        let tmp = TempDir::new().unwrap();
        let dest = tmp.path().join("cascade.xml");
        let _ = download(UNREACHABLE_URL, &dest, None);
        assert!(!dest.exists());
        assert!(!dest.with_extension("part").exists());
    }
}
