//! Where frames come from.

use image::DynamicImage;
use reqwest::blocking::Client;
use tracing::debug;

use std::collections::VecDeque;
use std::fs;
use std::path::{ Path, PathBuf };
use std::time::Duration;

use crate::config::SourceConfig;
use crate::error::LprError;

const IMAGE_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "bmp"];

pub trait FrameSource {
    /// `Ok(None)` once the source has nothing more to give. Errors are
    /// transient: the caller may simply try again.
    fn capture(&mut self) -> Result<Option<DynamicImage>, LprError>;

    fn describe(&self) -> String;
}

/// Still snapshots served over http, e.g. an IP webcam app's `/shot.jpg`.
pub struct SnapshotSource {
    client: Client,
    url: String,
}

impl SnapshotSource {

    pub fn new(config: &SourceConfig) -> Result<Self, LprError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self { client, url: config.url.clone() })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl FrameSource for SnapshotSource {

    fn capture(&mut self) -> Result<Option<DynamicImage>, LprError> {
        let bytes = self.client.get(&self.url).send()?.error_for_status()?.bytes()?;
        debug!(bytes = bytes.len(), url = %self.url, "fetched snapshot");
        let img = image::load_from_memory(&bytes)?;
        Ok(Some(img))
    }

    fn describe(&self) -> String {
        self.url.clone()
    }
}

/// Image files, one frame each, in path order.
pub struct FileSource {
    pending: VecDeque<PathBuf>,
}

impl FileSource {

    /// Directories are expanded to the images directly inside them.
    pub fn new<P: AsRef<Path>>(paths: &[P]) -> Result<Self, LprError> {
        let mut pending = Vec::new();
        for path in paths {
            let path = path.as_ref();
            if path.is_dir() {
                let mut entries: Vec<PathBuf> = fs::read_dir(path)?
                    .filter_map(|entry| entry.ok().map(|e| e.path()))
                    .filter(|p| is_image_file(p))
                    .collect();
                entries.sort();
                pending.extend(entries);
            } else {
                pending.push(path.to_path_buf());
            }
        }
        Ok(Self { pending: pending.into() })
    }

    pub fn remaining(&self) -> usize {
        self.pending.len()
    }

    pub fn peek_path(&self) -> Option<&Path> {
        self.pending.front().map(|p| p.as_path())
    }
}

impl FrameSource for FileSource {

    fn capture(&mut self) -> Result<Option<DynamicImage>, LprError> {
        match self.pending.pop_front() {
            Some(path) => Ok(Some(image::open(&path)?)),
            None => Ok(None),
        }
    }

    fn describe(&self) -> String {
        format!("{} image file(s)", self.pending.len())
    }
}

fn is_image_file(path: &Path) -> bool {
    path.is_file() && path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}
