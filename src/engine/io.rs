// src/engine/io.rs
//
// Source side: fetched bytes, fetchers, and URL helpers.

use crate::engine::directive::TRANSFORMATION_PARAMETER;
use crate::error::{Result, TransformError};
use memmap2::Mmap;
use std::collections::HashMap;
use std::fs::File;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tracing::debug;
use url::Url;

/// Fetched source bytes.
#[derive(Clone, Debug)]
pub enum Source {
    /// In-memory image data
    Memory(Arc<Vec<u8>>),
    /// Memory-mapped file (zero-copy access)
    Mapped(Arc<Mmap>),
}

impl Source {
    pub fn from_vec(bytes: Vec<u8>) -> Self {
        Source::Memory(Arc::new(bytes))
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Source::Memory(data) => data.as_slice(),
            Source::Mapped(mmap) => mmap.as_ref(),
        }
    }

    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn to_vec(&self) -> Vec<u8> {
        self.as_bytes().to_vec()
    }
}

/// Resolves a source URL (directive already stripped) to bytes.
pub trait ImageFetcher: Send + Sync {
    fn fetch(&self, url: &str) -> Result<Source>;
}

impl<F: ImageFetcher + ?Sized> ImageFetcher for Arc<F> {
    fn fetch(&self, url: &str) -> Result<Source> {
        (**self).fetch(url)
    }
}

/// Serves sources from the local file system.
///
/// Without a root, `file://` URLs and bare paths are opened as is and
/// `http(s)://` URLs are not served. With a root, only the URL path of an
/// `http(s)://` URL or a relative bare path is served, joined under `root`;
/// `file://` URLs, absolute paths and `..` segments are refused.
#[derive(Clone, Debug, Default)]
pub struct FileFetcher {
    root: Option<PathBuf>,
}

impl FileFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
        }
    }

    fn resolve(&self, raw: &str) -> Option<PathBuf> {
        let raw = url_path(raw);
        match Url::parse(raw) {
            Ok(url) => match (url.scheme(), &self.root) {
                ("file", None) => url.to_file_path().ok(),
                ("http" | "https", Some(root)) => {
                    let mut path = root.clone();
                    for segment in url.path_segments()? {
                        let segment = urlencoding::decode(segment).ok()?;
                        if segment.is_empty() {
                            continue;
                        }
                        if !is_plain_relative(Path::new(segment.as_ref())) {
                            return None;
                        }
                        path.push(segment.as_ref());
                    }
                    Some(path)
                }
                _ => None,
            },
            Err(_) => match &self.root {
                Some(root) if is_plain_relative(Path::new(raw)) => Some(root.join(raw)),
                Some(_) => None,
                None => Some(PathBuf::from(raw)),
            },
        }
    }
}

/// Only normal components: no root, prefix or `..`.
fn is_plain_relative(path: &Path) -> bool {
    path.components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

impl ImageFetcher for FileFetcher {
    fn fetch(&self, url: &str) -> Result<Source> {
        let path = self.resolve(url).ok_or_else(|| {
            debug!(url, "source outside the file fetcher's reach");
            TransformError::source_missing(url.to_string())
        })?;
        let file = File::open(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                TransformError::source_missing(url.to_string())
            } else {
                TransformError::source_read_failed(path.to_string_lossy().into_owned(), e)
            }
        })?;
        let len = file
            .metadata()
            .map_err(|e| TransformError::source_read_failed(path.to_string_lossy().into_owned(), e))?
            .len();
        if len == 0 {
            return Err(TransformError::source_missing(url.to_string()));
        }
        // SAFETY: the mapping is read-only; a file truncated underneath us is
        // the same hazard every mmap-based reader accepts.
        let mmap = unsafe { Mmap::map(&file) }
            .map_err(|e| TransformError::source_read_failed(path.to_string_lossy().into_owned(), e))?;
        debug!(path = %path.display(), bytes = len, "mapped source file");
        Ok(Source::Mapped(Arc::new(mmap)))
    }
}

/// URL -> bytes map; handy for tests and for callers that fetched already.
#[derive(Clone, Debug, Default)]
pub struct MemoryFetcher {
    images: HashMap<String, Arc<Vec<u8>>>,
}

impl MemoryFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, url: impl Into<String>, bytes: Vec<u8>) -> &mut Self {
        self.images.insert(url.into(), Arc::new(bytes));
        self
    }

    pub fn with(mut self, url: impl Into<String>, bytes: Vec<u8>) -> Self {
        self.insert(url, bytes);
        self
    }
}

impl ImageFetcher for MemoryFetcher {
    fn fetch(&self, url: &str) -> Result<Source> {
        self.images
            .get(url)
            .map(|bytes| Source::Memory(Arc::clone(bytes)))
            .ok_or_else(|| TransformError::source_missing(url.to_string()))
    }
}

fn is_directive_param(param: &str) -> bool {
    param == TRANSFORMATION_PARAMETER
        || param
            .strip_prefix(TRANSFORMATION_PARAMETER)
            .is_some_and(|rest| rest.starts_with('='))
}

/// Remove the `tr` parameter from `url`, leaving the source URL.
pub fn strip_directive(url: &str) -> String {
    let (base, query) = match url.split_once('?') {
        Some((base, query)) => (base, Some(query)),
        None => (url, None),
    };
    // `image.jpg&tr=w-10` without a query string
    let base = match base.find('&') {
        Some(pos) if is_directive_param(&base[pos + 1..]) => &base[..pos],
        _ => base,
    };

    let kept: Vec<&str> = query
        .map(|q| {
            q.split('&')
                .filter(|p| !p.is_empty() && !is_directive_param(p))
                .collect()
        })
        .unwrap_or_default();

    if kept.is_empty() {
        base.to_string()
    } else {
        format!("{base}?{}", kept.join("&"))
    }
}

/// `url` without query string or fragment.
pub fn url_path(url: &str) -> &str {
    let end = url.find(['?', '#', '&']).unwrap_or(url.len());
    &url[..end]
}

/// Lower-cased path extension of `url`, if any.
pub fn url_extension(url: &str) -> Option<String> {
    let path = url_path(url);
    let file = path.rsplit('/').next().unwrap_or(path);
    let (stem, ext) = file.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}
