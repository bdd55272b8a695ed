use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::thread;

use crossbeam_channel::{unbounded, Receiver, Sender};
use image::ImageReader;
use thiserror::Error;
use tracing::{debug, warn};

/// Decoded RGBA8 image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bitmap {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

impl Bitmap {
    pub fn solid(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let mut pixels = Vec::with_capacity(width as usize * height as usize * 4);
        for _ in 0..(width as usize * height as usize) {
            pixels.extend_from_slice(&rgba);
        }
        Self {
            width,
            height,
            rgba: pixels,
        }
    }
}

/// Image-name to bitmap lookup used by draw-image commands.
pub trait ImageResolver {
    fn resolve(&self, name: &str) -> Option<&Bitmap>;
}

impl ImageResolver for HashMap<String, Bitmap> {
    fn resolve(&self, name: &str) -> Option<&Bitmap> {
        self.get(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ImageNameError {
    #[error("image name must not be empty")]
    Empty,
    #[error("image name must not start with '/'")]
    LeadingSlash,
    #[error("image name must not contain '\\\\'")]
    Backslash,
    #[error("image name must not contain '..'")]
    ParentTraversal,
    #[error("image name contains invalid character '{character}'")]
    InvalidCharacter { character: char },
}

#[derive(Debug, Error)]
pub enum ImageLoadError {
    #[error("invalid image name: {0}")]
    InvalidName(#[from] ImageNameError),
    #[error("no asset root configured")]
    NoAssetRoot,
    #[error("failed to open image {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to decode image {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
}

pub fn validate_image_name(name: &str) -> Result<(), ImageNameError> {
    if name.is_empty() {
        return Err(ImageNameError::Empty);
    }
    if name.starts_with('/') {
        return Err(ImageNameError::LeadingSlash);
    }
    if name.contains('\\') {
        return Err(ImageNameError::Backslash);
    }
    if name.contains("..") {
        return Err(ImageNameError::ParentTraversal);
    }
    for ch in name.chars() {
        if ch.is_ascii_lowercase() || ch.is_ascii_digit() || matches!(ch, '_' | '/' | '-') {
            continue;
        }
        return Err(ImageNameError::InvalidCharacter { character: ch });
    }
    Ok(())
}

pub fn image_path(asset_root: &Path, name: &str) -> Result<PathBuf, ImageNameError> {
    validate_image_name(name)?;
    Ok(asset_root.join(format!("{name}.png")))
}

pub fn load_bitmap(path: &Path) -> Result<Bitmap, ImageLoadError> {
    let reader = ImageReader::open(path).map_err(|source| ImageLoadError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    let decoded = reader.decode().map_err(|source| ImageLoadError::Decode {
        path: path.to_path_buf(),
        source,
    })?;
    let image = decoded.to_rgba8();
    Ok(Bitmap {
        width: image.width(),
        height: image.height(),
        rgba: image.into_raw(),
    })
}

struct LoadCompletion {
    name: String,
    result: Result<Bitmap, ImageLoadError>,
}

/// Asynchronous, process-lifetime image cache.
///
/// Requests decode on a worker thread; completions are drained by
/// [`ImageStore::poll`] once per tick. Failed names are remembered so a
/// missing asset is reported once and never retried.
pub struct ImageStore {
    asset_root: Option<PathBuf>,
    cache: HashMap<String, Bitmap>,
    pending: HashSet<String>,
    failed: HashSet<String>,
    sender: Sender<LoadCompletion>,
    receiver: Receiver<LoadCompletion>,
}

impl Default for ImageStore {
    fn default() -> Self {
        Self::new(None)
    }
}

impl ImageStore {
    pub fn new(asset_root: Option<PathBuf>) -> Self {
        let (sender, receiver) = unbounded();
        Self {
            asset_root,
            cache: HashMap::new(),
            pending: HashSet::new(),
            failed: HashSet::new(),
            sender,
            receiver,
        }
    }

    pub fn asset_root(&self) -> Option<&Path> {
        self.asset_root.as_deref()
    }

    /// Starts loading `name` unless it is already cached, pending or failed.
    pub fn request(&mut self, name: &str) {
        if self.cache.contains_key(name) || self.pending.contains(name) || self.failed.contains(name) {
            return;
        }
        let path = match &self.asset_root {
            Some(root) => image_path(root, name).map_err(ImageLoadError::from),
            None => Err(ImageLoadError::NoAssetRoot),
        };
        let path = match path {
            Ok(path) => path,
            Err(error) => {
                self.record_failure(name, &error);
                return;
            }
        };

        self.pending.insert(name.to_string());
        debug!(image = name, path = %path.display(), "image_load_requested");
        let sender = self.sender.clone();
        let owned_name = name.to_string();
        let spawned = thread::Builder::new()
            .name(format!("image-{name}"))
            .spawn(move || {
                let result = load_bitmap(&path);
                // The store may already be gone; nothing to report to.
                let _ = sender.send(LoadCompletion {
                    name: owned_name,
                    result,
                });
            });
        if let Err(error) = spawned {
            self.pending.remove(name);
            warn!(image = name, error = %error, "image_load_thread_spawn_failed");
            self.failed.insert(name.to_string());
        }
    }

    /// Drains finished loads; returns true when at least one completed.
    pub fn poll(&mut self) -> bool {
        let mut completed = false;
        while let Ok(completion) = self.receiver.try_recv() {
            completed = true;
            self.pending.remove(&completion.name);
            match completion.result {
                Ok(bitmap) => {
                    debug!(
                        image = %completion.name,
                        width = bitmap.width,
                        height = bitmap.height,
                        "image_loaded"
                    );
                    self.cache.insert(completion.name, bitmap);
                }
                Err(error) => self.record_failure(&completion.name, &error),
            }
        }
        completed
    }

    fn record_failure(&mut self, name: &str, error: &ImageLoadError) {
        warn!(image = name, error = %error, "image_load_failed");
        self.failed.insert(name.to_string());
    }

    /// Registers an already-decoded bitmap.
    pub fn insert(&mut self, name: impl Into<String>, bitmap: Bitmap) {
        let name = name.into();
        self.pending.remove(&name);
        self.failed.remove(&name);
        self.cache.insert(name, bitmap);
    }

    pub fn is_idle(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn is_failed(&self, name: &str) -> bool {
        self.failed.contains(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.cache.contains_key(name)
    }
}

impl ImageResolver for ImageStore {
    fn resolve(&self, name: &str) -> Option<&Bitmap> {
        self.cache.get(name)
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use super::*;
    use tempfile::TempDir;

    fn wait_until_idle(store: &mut ImageStore) {
        let deadline = Instant::now() + Duration::from_secs(10);
        while !store.is_idle() && Instant::now() < deadline {
            store.poll();
            thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn accepts_valid_names() {
        for name in ["wall", "tiles/door_open", "mushroom-blue"] {
            assert!(validate_image_name(name).is_ok(), "name={name}");
        }
    }

    #[test]
    fn rejects_invalid_names() {
        for name in ["", "/a", "..", "a/../b", r"a\b", "A", "a.png"] {
            assert!(validate_image_name(name).is_err(), "name={name}");
        }
    }

    #[test]
    fn loads_png_from_asset_root_off_thread() {
        let temp = TempDir::new().expect("temp");
        let image = image::RgbaImage::from_pixel(3, 2, image::Rgba([10, 20, 30, 255]));
        image
            .save(temp.path().join("wall.png"))
            .expect("write png");

        let mut store = ImageStore::new(Some(temp.path().to_path_buf()));
        store.request("wall");
        store.request("wall");
        assert_eq!(store.pending_count(), 1);
        wait_until_idle(&mut store);

        let bitmap = store.resolve("wall").expect("loaded");
        assert_eq!((bitmap.width, bitmap.height), (3, 2));
        assert_eq!(&bitmap.rgba[..4], &[10, 20, 30, 255]);
    }

    #[test]
    fn missing_file_is_marked_failed_and_not_retried() {
        let temp = TempDir::new().expect("temp");
        let mut store = ImageStore::new(Some(temp.path().to_path_buf()));
        store.request("nope");
        wait_until_idle(&mut store);
        assert!(store.is_failed("nope"));
        store.request("nope");
        assert!(store.is_idle());
        assert!(store.resolve("nope").is_none());
    }

    #[test]
    fn request_without_asset_root_fails_immediately() {
        let mut store = ImageStore::default();
        store.request("wall");
        assert!(store.is_idle());
        assert!(store.is_failed("wall"));
    }
}
