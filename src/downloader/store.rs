use crate::downloader::{DownloadStatus, Format, Quality, VideoItem};

/// Keyed collection of download items.
///
/// Iteration follows insertion order. Every update is keyed by id and silently
/// does nothing when the id is unknown; cross-item rules (such as the single
/// active download) are the queue's business, not the store's.
#[derive(Debug, Clone, Default)]
pub struct ItemStore {
    items: Vec<VideoItem>,
}

impl ItemStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn replace(&mut self, items: Vec<VideoItem>) {
        self.items = items;
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &VideoItem> {
        self.items.iter()
    }

    pub fn items(&self) -> &[VideoItem] {
        &self.items
    }

    pub fn get(&self, id: &str) -> Option<&VideoItem> {
        self.items.iter().find(|item| item.id == id)
    }

    pub fn status(&self, id: &str) -> Option<DownloadStatus> {
        self.get(id).map(|item| item.status)
    }

    fn get_mut(&mut self, id: &str) -> Option<&mut VideoItem> {
        self.items.iter_mut().find(|item| item.id == id)
    }

    pub fn set_format(&mut self, id: &str, format: Format) {
        if let Some(item) = self.get_mut(id) {
            item.format = format;
        }
    }

    pub fn set_quality(&mut self, id: &str, quality: Quality) {
        if let Some(item) = self.get_mut(id) {
            item.quality = quality;
        }
    }

    pub fn set_status(&mut self, id: &str, status: DownloadStatus) {
        if let Some(item) = self.get_mut(id) {
            item.status = status;
        }
    }

    pub fn set_speed(&mut self, id: &str, speed: &str) {
        if let Some(item) = self.get_mut(id) {
            item.speed = speed.to_string();
        }
    }

    pub fn set_error(&mut self, id: &str, reason: Option<String>) {
        if let Some(item) = self.get_mut(id) {
            item.error = reason;
        }
    }

    /// Adds `delta` to the item's progress and returns the new value.
    ///
    /// The result is capped at 100. Returns `None` for unknown ids.
    pub fn advance_progress(&mut self, id: &str, delta: f64) -> Option<f64> {
        let item = self.get_mut(id)?;
        item.progress = (item.progress + delta.max(0.0)).min(100.0);
        Some(item.progress)
    }

    pub fn reset_progress(&mut self, id: &str) {
        if let Some(item) = self.get_mut(id) {
            item.progress = 0.0;
        }
    }

    pub fn mark_started(&mut self, id: &str) {
        if let Some(item) = self.get_mut(id) {
            item.started_at = Some(chrono::Utc::now());
            item.finished_at = None;
        }
    }

    pub fn mark_finished(&mut self, id: &str) {
        if let Some(item) = self.get_mut(id) {
            item.finished_at = Some(chrono::Utc::now());
        }
    }
}
