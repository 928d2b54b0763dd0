use crate::error::{download_error, malformed_input, AppResult};
use crate::utils::text::strip_extension;
use async_trait::async_trait;
use std::collections::HashSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tracing::{debug, info, warn};

/// Browser user agent sent by the downloader; the wiki rejects wget's default
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; rv:68.0) Gecko/20100101 Firefox/68.0";

/// Roster keys whose image is already present in the local image directory
#[derive(Debug, Clone, Default)]
pub struct DownloadedSet {
    keys: HashSet<String>,
}

impl DownloadedSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// List the image directory once and record every `<key>.<ext>` found.
    ///
    /// A missing directory is treated as empty.
    pub async fn scan(dir: &Path) -> AppResult<Self> {
        let mut set = Self::new();
        let mut entries = match tokio::fs::read_dir(dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                warn!("Image directory {} does not exist yet", dir.display());
                return Ok(set);
            }
            Err(e) => return Err(e.into()),
        };

        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            let name = entry.file_name();
            if let Some(key) = name.to_str().and_then(strip_extension) {
                set.insert(key);
            }
        }

        info!("Found {} downloaded images in {}", set.len(), dir.display());
        Ok(set)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.keys.contains(key)
    }

    pub fn insert(&mut self, key: &str) {
        self.keys.insert(key.to_string());
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for DownloadedSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            keys: iter.into_iter().map(Into::into).collect(),
        }
    }
}

/// External downloader boundary
#[async_trait]
pub trait ImageFetcher: Send + Sync {
    /// Fetch the wiki image `file_name` linked from `link`, leaving it at
    /// `dir/file_name`
    async fn fetch(&self, file_name: &str, link: &str, dir: &Path) -> AppResult<()>;
}

/// Fetches images by crawling the wiki file page one level deep with wget
#[derive(Debug, Clone)]
pub struct WgetFetcher {
    program: String,
}

impl WgetFetcher {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn args(file_name: &str, link: &str) -> Vec<String> {
        vec![
            "--verbose".to_string(),
            "--no-directories".to_string(),
            "--page-requisites".to_string(),
            format!("--accept={}*", file_name),
            "-e".to_string(),
            "robots=off".to_string(),
            "--adjust-extension".to_string(),
            "--recursive".to_string(),
            "--level=1".to_string(),
            format!("--user-agent={}", USER_AGENT),
            link.to_string(),
        ]
    }
}

#[async_trait]
impl ImageFetcher for WgetFetcher {
    async fn fetch(&self, file_name: &str, link: &str, dir: &Path) -> AppResult<()> {
        let args = Self::args(file_name, link);
        debug!("Running {} {}", self.program, args.join(" "));

        let output = tokio::process::Command::new(&self.program)
            .args(&args)
            .current_dir(dir)
            .stdin(Stdio::inherit())
            .stderr(Stdio::inherit())
            .output()
            .await
            .map_err(|e| download_error(&format!("Failed to run {}: {}", self.program, e)))?;

        debug!("{}", String::from_utf8_lossy(&output.stdout));

        if !output.status.success() {
            return Err(download_error(&format!(
                "{} exited with {} while fetching {}",
                self.program, output.status, link
            )));
        }
        Ok(())
    }
}

/// Materializes villager images as `<dir>/<key>.png`
pub struct ImageRetriever {
    dir: PathBuf,
    link_base: String,
    fetcher: Box<dyn ImageFetcher>,
}

impl ImageRetriever {
    pub fn new(dir: PathBuf, link_base: String, fetcher: Box<dyn ImageFetcher>) -> Self {
        Self {
            dir,
            link_base,
            fetcher,
        }
    }

    /// Canonical location of a villager image
    pub fn image_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.png", key))
    }

    /// Return the local image for `key`, downloading it first when `downloaded`
    /// does not have it yet. A successful download is recorded in `downloaded`.
    pub async fn retrieve(
        &self,
        downloaded: &mut DownloadedSet,
        key: &str,
        image_file: &str,
    ) -> AppResult<PathBuf> {
        let target = self.image_path(key);
        if downloaded.contains(key) {
            debug!("Image for {} already downloaded", key);
            return Ok(target);
        }

        let file_name = urlencoding::decode(&image_file.replace('+', " "))
            .map_err(|e| malformed_input(&format!("invalid image name {:?}: {}", image_file, e)))?
            .into_owned();
        let link = format!("{}{}", self.link_base, image_file);

        info!("Downloading {} from {}", file_name, link);
        self.fetcher.fetch(&file_name, &link, &self.dir).await?;

        let fetched = self.dir.join(&file_name);
        tokio::fs::rename(&fetched, &target).await.map_err(|e| {
            download_error(&format!(
                "Failed to move {} to {}: {}",
                fetched.display(),
                target.display(),
                e
            ))
        })?;

        downloaded.insert(key);
        Ok(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Writes the requested file instead of touching the network
    struct FakeFetcher {
        calls: Arc<AtomicUsize>,
        fail: bool,
    }

    #[async_trait]
    impl ImageFetcher for FakeFetcher {
        async fn fetch(&self, file_name: &str, _link: &str, dir: &Path) -> AppResult<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(download_error("offline"));
            }
            tokio::fs::write(dir.join(file_name), b"png").await?;
            Ok(())
        }
    }

    fn retriever(dir: &Path, fail: bool) -> (ImageRetriever, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let fetcher = FakeFetcher {
            calls: Arc::clone(&calls),
            fail,
        };
        let retriever = ImageRetriever::new(
            dir.to_path_buf(),
            "https://nookipedia.com/wiki/File:".to_string(),
            Box::new(fetcher),
        );
        (retriever, calls)
    }

    #[tokio::test]
    async fn test_scan_strips_extensions() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("bob.png"), b"").unwrap();
        std::fs::write(dir.path().join("ana.jpg"), b"").unwrap();
        std::fs::create_dir(dir.path().join("nested.dir")).unwrap();

        let set = DownloadedSet::scan(dir.path()).await.unwrap();
        assert_eq!(set.len(), 2);
        assert!(set.contains("bob"));
        assert!(set.contains("ana"));
        assert!(!set.contains("nested"));
    }

    #[tokio::test]
    async fn test_scan_missing_dir_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let set = DownloadedSet::scan(&dir.path().join("imgs")).await.unwrap();
        assert!(set.is_empty());
    }

    #[tokio::test]
    async fn test_retrieve_twice_downloads_once() {
        let dir = tempfile::tempdir().unwrap();
        let (retriever, calls) = retriever(dir.path(), false);
        let mut downloaded = DownloadedSet::new();

        let first = retriever
            .retrieve(&mut downloaded, "bob", "Bob%20NH.png")
            .await
            .unwrap();
        let second = retriever
            .retrieve(&mut downloaded, "bob", "Bob%20NH.png")
            .await
            .unwrap();

        assert_eq!(first, dir.path().join("bob.png"));
        assert_eq!(first, second);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(first.exists());
        assert!(!dir.path().join("Bob NH.png").exists());
        assert!(downloaded.contains("bob"));
    }

    #[tokio::test]
    async fn test_retrieve_skips_known_key() {
        let dir = tempfile::tempdir().unwrap();
        let (retriever, calls) = retriever(dir.path(), true);
        let mut downloaded: DownloadedSet = ["bob"].into_iter().collect();

        let path = retriever
            .retrieve(&mut downloaded, "bob", "bob.png")
            .await
            .unwrap();
        assert_eq!(path, dir.path().join("bob.png"));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_failed_download_is_fatal_and_not_recorded() {
        let dir = tempfile::tempdir().unwrap();
        let (retriever, _) = retriever(dir.path(), true);
        let mut downloaded = DownloadedSet::new();

        let result = retriever.retrieve(&mut downloaded, "bob", "bob.png").await;
        assert!(matches!(result, Err(Error::Download(_))));
        assert!(!downloaded.contains("bob"));
    }

    #[test]
    fn test_wget_args() {
        let args = WgetFetcher::args("Bob NH.png", "https://nookipedia.com/wiki/File:Bob%20NH.png");
        assert!(args.contains(&"--accept=Bob NH.png*".to_string()));
        assert!(args.contains(&"robots=off".to_string()));
        assert_eq!(
            args.last().map(String::as_str),
            Some("https://nookipedia.com/wiki/File:Bob%20NH.png")
        );
    }
}
