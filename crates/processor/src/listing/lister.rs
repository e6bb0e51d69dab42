//! Paginated object listings.

use std::path::{Path, PathBuf};

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// One item of an external listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListedObject {
    pub key: String,
    /// Epoch milliseconds
    pub last_modified: i64,
    pub size: u64,
}

impl ListedObject {
    pub fn new(key: impl Into<String>, last_modified: i64, size: u64) -> Self {
        Self {
            key: key.into(),
            last_modified,
            size,
        }
    }
}

/// One page of results and the marker of the next page, if any.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListingPage {
    pub objects: Vec<ListedObject>,
    pub next_marker: Option<String>,
}

/// A collection enumerated one page at a time, in any stable order.
#[async_trait]
pub trait ObjectLister: Send + Sync {
    /// Fetch the page starting at `marker`; `None` asks for the first page.
    async fn list_page(&self, marker: Option<&str>) -> anyhow::Result<ListingPage>;
}

/// Lister over a mutable in-memory collection.
pub struct MemoryObjectLister {
    objects: RwLock<Vec<ListedObject>>,
    page_size: usize,
}

impl MemoryObjectLister {
    pub fn new(page_size: usize) -> Self {
        Self {
            objects: RwLock::new(Vec::new()),
            page_size: page_size.max(1),
        }
    }

    pub async fn set_objects(&self, objects: Vec<ListedObject>) {
        *self.objects.write().await = objects;
    }

    pub async fn push(&self, object: ListedObject) {
        self.objects.write().await.push(object);
    }
}

#[async_trait]
impl ObjectLister for MemoryObjectLister {
    async fn list_page(&self, marker: Option<&str>) -> anyhow::Result<ListingPage> {
        let start: usize = match marker {
            Some(m) => m
                .parse()
                .with_context(|| format!("Invalid page marker: {m}"))?,
            None => 0,
        };
        let objects = self.objects.read().await;
        let end = (start + self.page_size).min(objects.len());
        let page = objects.get(start..end).unwrap_or_default().to_vec();
        let next_marker = (end < objects.len()).then(|| end.to_string());
        Ok(ListingPage {
            objects: page,
            next_marker,
        })
    }
}

/// Lister over files below a local directory.
///
/// Keys are paths relative to the root using `/` separators, returned in
/// key order; the marker is the last key of the previous page.
#[derive(Debug, Clone)]
pub struct DirectoryLister {
    root: PathBuf,
    prefix: Option<String>,
    recursive: bool,
    max_depth: Option<usize>,
    page_size: usize,
}

impl DirectoryLister {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            prefix: None,
            recursive: false,
            max_depth: None,
            page_size: 1000,
        }
    }

    pub fn prefix(mut self, prefix: Option<String>) -> Self {
        self.prefix = prefix.filter(|p| !p.is_empty());
        self
    }

    /// Descend into sub-directories, at most `max_depth` levels deep.
    pub fn recursive(mut self, recursive: bool, max_depth: Option<usize>) -> Self {
        self.recursive = recursive;
        self.max_depth = max_depth;
        self
    }

    pub fn page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    async fn walk(&self) -> anyhow::Result<Vec<ListedObject>> {
        let mut results = Vec::new();
        if !tokio::fs::try_exists(&self.root).await.unwrap_or(false) {
            warn!("Listing root does not exist: {}", self.root.display());
            return Ok(results);
        }

        let mut pending = vec![(self.root.clone(), 0usize)];
        while let Some((dir, depth)) = pending.pop() {
            let mut entries = tokio::fs::read_dir(&dir)
                .await
                .with_context(|| format!("Failed to read directory: {}", dir.display()))?;

            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                let metadata = entry
                    .metadata()
                    .await
                    .with_context(|| format!("Failed to get metadata for: {}", path.display()))?;

                if metadata.is_dir() {
                    let descend = self.recursive && self.max_depth.is_none_or(|max| depth < max);
                    if descend {
                        pending.push((path, depth + 1));
                    }
                    continue;
                }
                if !metadata.is_file() {
                    continue;
                }

                let key = relative_key(&self.root, &path);
                if let Some(prefix) = &self.prefix {
                    if !key.starts_with(prefix.as_str()) {
                        continue;
                    }
                }
                let last_modified = metadata
                    .modified()
                    .map(|t| DateTime::<Utc>::from(t).timestamp_millis())
                    .with_context(|| format!("No modification time for: {}", path.display()))?;
                results.push(ListedObject::new(key, last_modified, metadata.len()));
            }
        }

        results.sort_by(|a, b| a.key.cmp(&b.key));
        debug!(
            "Listed {} file(s) under {}",
            results.len(),
            self.root.display()
        );
        Ok(results)
    }
}

fn relative_key(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

#[async_trait]
impl ObjectLister for DirectoryLister {
    async fn list_page(&self, marker: Option<&str>) -> anyhow::Result<ListingPage> {
        let all = self.walk().await?;
        let remaining: Vec<ListedObject> = all
            .into_iter()
            .filter(|o| marker.is_none_or(|m| o.key.as_str() > m))
            .collect();

        let has_more = remaining.len() > self.page_size;
        let objects: Vec<ListedObject> = remaining.into_iter().take(self.page_size).collect();
        let next_marker = if has_more {
            objects.last().map(|o| o.key.clone())
        } else {
            None
        };
        Ok(ListingPage {
            objects,
            next_marker,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn collect_all(lister: &dyn ObjectLister) -> Vec<String> {
        let mut keys = Vec::new();
        let mut marker: Option<String> = None;
        loop {
            let page = lister.list_page(marker.as_deref()).await.unwrap();
            keys.extend(page.objects.into_iter().map(|o| o.key));
            match page.next_marker {
                Some(next) => marker = Some(next),
                None => break,
            }
        }
        keys
    }

    #[tokio::test]
    async fn test_memory_lister_pages() {
        let lister = MemoryObjectLister::new(2);
        lister
            .set_objects(vec![
                ListedObject::new("a", 1, 1),
                ListedObject::new("b", 1, 1),
                ListedObject::new("c", 2, 1),
            ])
            .await;

        let first = lister.list_page(None).await.unwrap();
        assert_eq!(first.objects.len(), 2);
        assert_eq!(first.next_marker.as_deref(), Some("2"));
        let second = lister.list_page(Some("2")).await.unwrap();
        assert_eq!(second.objects.len(), 1);
        assert!(second.next_marker.is_none());

        assert!(lister.list_page(Some("x")).await.is_err());
    }

    #[tokio::test]
    async fn test_directory_lister_depth_and_prefix() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("app-1.log"), "one").unwrap();
        std::fs::write(dir.path().join("other.txt"), "x").unwrap();
        std::fs::create_dir_all(dir.path().join("sub/deeper")).unwrap();
        std::fs::write(dir.path().join("sub/app-2.log"), "two").unwrap();
        std::fs::write(dir.path().join("sub/deeper/app-3.log"), "three").unwrap();

        let flat = DirectoryLister::new(dir.path()).page_size(1);
        assert_eq!(collect_all(&flat).await, vec!["app-1.log", "other.txt"]);

        let one_level = DirectoryLister::new(dir.path()).recursive(true, Some(1));
        assert_eq!(
            collect_all(&one_level).await,
            vec!["app-1.log", "other.txt", "sub/app-2.log"]
        );

        let everything = DirectoryLister::new(dir.path())
            .recursive(true, None)
            .prefix(Some("sub/".to_string()));
        assert_eq!(
            collect_all(&everything).await,
            vec!["sub/app-2.log", "sub/deeper/app-3.log"]
        );
    }

    #[tokio::test]
    async fn test_directory_lister_reports_size() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("f.log"), "12345").unwrap();
        let page = DirectoryLister::new(dir.path()).list_page(None).await.unwrap();
        assert_eq!(page.objects[0].size, 5);
        assert!(page.objects[0].last_modified > 0);
    }

    #[tokio::test]
    async fn test_missing_root_is_empty() {
        let lister = DirectoryLister::new("/no/such/logpipe/dir");
        assert!(lister.list_page(None).await.unwrap().objects.is_empty());
    }
}
