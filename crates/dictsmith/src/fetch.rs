use std::io::Read;
use std::path::PathBuf;

use flate2::read::GzDecoder;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{debug, info};

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("corpus request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("corpus cache I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Downloads corpora and memoizes the decompressed bytes on disk.
///
/// The cache is keyed by a SHA-256 digest of the URL, so re-running a batch
/// against the same mirrors never re-downloads. The build pipeline above
/// only ever sees final bytes; it cannot tell a hit from a miss.
pub struct CorpusFetcher {
    client: reqwest::Client,
    cache_dir: Option<PathBuf>,
}

impl CorpusFetcher {
    /// `cache_dir: None` disables caching entirely.
    pub fn new(cache_dir: Option<PathBuf>) -> Self {
        Self {
            client: reqwest::Client::new(),
            cache_dir,
        }
    }

    /// Fetch one corpus: cached bytes if present, otherwise HTTP GET,
    /// gunzipped when the body carries the gzip magic, and written back to
    /// the cache. An empty body is returned as-is; callers treat it as
    /// "no corpus available" rather than an error.
    pub async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        if let Some(cached) = self.read_cache(url)? {
            debug!("corpus cache hit for {url}");
            return Ok(cached);
        }

        info!("fetching corpus from {url}");
        let response = self.client.get(url).send().await?.error_for_status()?;
        let body = response.bytes().await?;
        let bytes = decompress(&body)?;
        self.write_cache(url, &bytes)?;
        Ok(bytes)
    }

    fn cache_path(&self, url: &str) -> Option<PathBuf> {
        let dir = self.cache_dir.as_ref()?;
        let digest = Sha256::digest(url.as_bytes());
        Some(dir.join(format!("{}.corpus", hex::encode(digest))))
    }

    fn read_cache(&self, url: &str) -> Result<Option<Vec<u8>>, FetchError> {
        let Some(path) = self.cache_path(url) else {
            return Ok(None);
        };
        match std::fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn write_cache(&self, url: &str, bytes: &[u8]) -> Result<(), FetchError> {
        let Some(path) = self.cache_path(url) else {
            return Ok(());
        };
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        std::fs::write(path, bytes)?;
        Ok(())
    }
}

/// Mirrors serve corpora gzipped; plain bodies pass through untouched.
fn decompress(body: &[u8]) -> std::io::Result<Vec<u8>> {
    if body.len() < GZIP_MAGIC.len() || body[..GZIP_MAGIC.len()] != GZIP_MAGIC {
        return Ok(body.to_vec());
    }
    let mut out = Vec::new();
    GzDecoder::new(body).read_to_end(&mut out)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use std::io::Write;

    fn gzip(bytes: &[u8]) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(bytes).unwrap();
        encoder.finish().unwrap()
    }

    #[test]
    fn gunzips_bodies_with_magic() {
        let body = gzip(b"casa\thouse\n");
        assert_eq!(decompress(&body).unwrap(), b"casa\thouse\n");
    }

    #[test]
    fn passes_plain_bodies_through() {
        assert_eq!(decompress(b"casa\thouse\n").unwrap(), b"casa\thouse\n");
        assert_eq!(decompress(b"").unwrap(), b"");
    }

    #[test]
    fn cache_round_trips_by_url() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = CorpusFetcher::new(Some(dir.path().to_path_buf()));
        let url = "https://mirror/en-pt.dic.gz";

        assert_eq!(fetcher.read_cache(url).unwrap(), None);
        fetcher.write_cache(url, b"casa\thouse\n").unwrap();
        assert_eq!(
            fetcher.read_cache(url).unwrap().as_deref(),
            Some(b"casa\thouse\n".as_slice())
        );
        // A different URL maps to a different cache entry.
        assert_eq!(fetcher.read_cache("https://mirror/other.gz").unwrap(), None);
    }

    #[test]
    fn disabled_cache_never_hits() {
        let fetcher = CorpusFetcher::new(None);
        fetcher.write_cache("https://mirror/a.gz", b"bytes").unwrap();
        assert_eq!(fetcher.read_cache("https://mirror/a.gz").unwrap(), None);
    }

    #[tokio::test]
    async fn fetch_serves_cached_bytes_without_a_request() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = CorpusFetcher::new(Some(dir.path().to_path_buf()));
        let url = "https://unreachable.invalid/en-pt.dic.gz";
        fetcher.write_cache(url, b"casa\thouse\n").unwrap();
        assert_eq!(fetcher.fetch(url).await.unwrap(), b"casa\thouse\n");
    }
}
