//! Single-slot download queue.
//!
//! `DownloadQueue` owns the item store, the active slot and the FIFO of waiting
//! ids. All lifecycle transitions go through it:
//!
//! ```text
//! idle ──start──▶ downloading ──pause──▶ paused
//!   ▲                 │  ▲                 │
//!   │ retry           │  └─────resume──────┘
//! error ◀──failure────┤
//!                     └──tick reaches 100──▶ finished
//! ```
//!
//! A tick that finishes the active item advances the queue before returning,
//! so callers never observe a finished item still holding the slot.

use std::collections::VecDeque;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use crate::downloader::command::render_command;
use crate::downloader::simulator::{ProgressSimulator, TickOutcome};
use crate::downloader::store::ItemStore;
use crate::downloader::{DownloadSettings, DownloadStatus, Format, Quality, QueueEvent, VideoItem, IDLE_SPEED};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RequestOutcome {
    Started { id: String, command: String },
    Queued { id: String, position: usize },
    Rejected { id: String, reason: String },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DownloadAllOutcome {
    pub started: Option<String>,
    pub queued: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TickReport {
    /// No active item.
    Idle,
    Paused { id: String },
    Advanced { id: String, progress: f64 },
    /// The active item finished; `next` is the item promoted in its place.
    Finished { id: String, next: Option<String> },
    /// The active item was no longer transferable and gave up the slot.
    Released { id: String, next: Option<String> },
}

/// Point-in-time copy of the queue, for display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueSnapshot {
    pub items: Vec<VideoItem>,
    pub active: Option<String>,
    pub queued: Vec<String>,
}

pub struct DownloadQueue {
    store: ItemStore,
    active: Option<String>,
    waiting: VecDeque<String>,
    simulator: ProgressSimulator,
    settings: DownloadSettings,
    events: broadcast::Sender<QueueEvent>,
}

impl DownloadQueue {
    pub fn new(simulator: ProgressSimulator, settings: DownloadSettings) -> Self {
        let (events, _) = broadcast::channel(256);
        Self {
            store: ItemStore::new(),
            active: None,
            waiting: VecDeque::new(),
            simulator,
            settings,
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<QueueEvent> {
        self.events.subscribe()
    }

    pub fn event_sender(&self) -> broadcast::Sender<QueueEvent> {
        self.events.clone()
    }

    fn emit(&self, event: QueueEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    pub fn store(&self) -> &ItemStore {
        &self.store
    }

    pub fn item(&self, id: &str) -> Option<&VideoItem> {
        self.store.get(id)
    }

    pub fn active_id(&self) -> Option<&str> {
        self.active.as_deref()
    }

    pub fn queued_ids(&self) -> Vec<String> {
        self.waiting.iter().cloned().collect()
    }

    pub fn is_queued(&self, id: &str) -> bool {
        self.waiting.iter().any(|queued| queued == id)
    }

    /// True while ids are waiting for the slot.
    pub fn is_queue_running(&self) -> bool {
        !self.waiting.is_empty()
    }

    pub fn is_idle(&self) -> bool {
        self.active.is_none() && self.waiting.is_empty()
    }

    pub fn settings(&self) -> &DownloadSettings {
        &self.settings
    }

    pub fn settings_mut(&mut self) -> &mut DownloadSettings {
        &mut self.settings
    }

    pub fn snapshot(&self) -> QueueSnapshot {
        QueueSnapshot {
            items: self.store.items().to_vec(),
            active: self.active.clone(),
            queued: self.queued_ids(),
        }
    }

    /// Swaps in a freshly fetched collection. The slot and the queue are reset
    /// since they refer to items that no longer exist.
    pub fn replace_items(&mut self, items: Vec<VideoItem>) {
        log::info!("📥 [QUEUE] Loaded {} items", items.len());
        let was_busy = self.active.is_some() || !self.waiting.is_empty();
        self.active = None;
        self.waiting.clear();
        self.store.replace(items);
        if was_busy {
            self.emit(QueueEvent::Idle);
        }
    }

    pub fn clear_items(&mut self) {
        self.replace_items(Vec::new());
    }

    pub fn command_for(&self, id: &str) -> Option<String> {
        self.store.get(id).map(|item| render_command(item, &self.settings))
    }

    fn rejection(&self, id: &str) -> Option<String> {
        let status = match self.store.status(id) {
            Some(status) => status,
            None => return Some("unknown item".to_string()),
        };
        if self.active.as_deref() == Some(id) {
            return Some("already active".to_string());
        }
        if self.is_queued(id) {
            return Some("already queued".to_string());
        }
        if !status.is_startable() {
            return Some(format!("status is {}", status));
        }
        None
    }

    /// Starts `id` now if the slot is free, otherwise appends it to the queue.
    pub fn request_download(&mut self, id: &str) -> RequestOutcome {
        if let Some(reason) = self.rejection(id) {
            log::debug!("[QUEUE] Ignoring download request for {}: {}", id, reason);
            return RequestOutcome::Rejected { id: id.to_string(), reason };
        }

        if self.active.is_some() {
            self.waiting.push_back(id.to_string());
            let position = self.waiting.len();
            log::info!("⏳ [QUEUE] Queued {} at position {}", id, position);
            self.emit(QueueEvent::Queued { id: id.to_string(), position });
            return RequestOutcome::Queued { id: id.to_string(), position };
        }

        let command = self.promote(id);
        RequestOutcome::Started { id: id.to_string(), command }
    }

    /// Queues every idle or failed item in store order.
    pub fn download_all(&mut self) -> DownloadAllOutcome {
        let eligible: Vec<String> = self
            .store
            .iter()
            .filter(|item| item.status.is_startable())
            .filter(|item| self.active.as_deref() != Some(item.id.as_str()))
            .filter(|item| !self.is_queued(&item.id))
            .map(|item| item.id.clone())
            .collect();

        let mut outcome = DownloadAllOutcome::default();
        if eligible.is_empty() {
            log::debug!("[QUEUE] Download all: nothing eligible");
            return outcome;
        }

        for id in eligible {
            match self.request_download(&id) {
                RequestOutcome::Started { id, .. } => outcome.started = Some(id),
                RequestOutcome::Queued { id, .. } => outcome.queued.push(id),
                RequestOutcome::Rejected { .. } => {}
            }
        }

        log::info!(
            "🚀 [QUEUE] Download all: started {:?}, queued {}",
            outcome.started,
            outcome.queued.len()
        );
        outcome
    }

    /// Drops every waiting id. The active download keeps running.
    pub fn stop_queue(&mut self) -> usize {
        let cleared = self.waiting.len();
        self.waiting.clear();
        log::info!("⏹️ [QUEUE] Queue stopped, {} waiting items dropped", cleared);
        self.emit(QueueEvent::QueueStopped { cleared });
        cleared
    }

    /// Flips downloading and paused. Returns the new status when something changed.
    pub fn toggle_pause(&mut self, id: &str) -> Option<DownloadStatus> {
        let next = match self.store.status(id)? {
            DownloadStatus::Downloading => DownloadStatus::Paused,
            DownloadStatus::Paused => DownloadStatus::Downloading,
            _ => return None,
        };
        self.store.set_status(id, next);

        if next == DownloadStatus::Paused {
            log::info!("⏸️ [QUEUE] Paused {}", id);
            self.emit(QueueEvent::Paused { id: id.to_string() });
        } else {
            log::info!("▶️ [QUEUE] Resumed {}", id);
            self.emit(QueueEvent::Resumed { id: id.to_string() });
        }
        Some(next)
    }

    fn is_editable(&self, id: &str) -> bool {
        self.store.status(id).map_or(false, |status| status.is_startable())
    }

    /// Changes the output format and resets quality to the format's default.
    pub fn update_format(&mut self, id: &str, format: Format) -> bool {
        if !self.is_editable(id) {
            log::debug!("[QUEUE] Format change for {} ignored", id);
            return false;
        }
        self.store.set_format(id, format);
        self.store.set_quality(id, format.default_quality());
        true
    }

    pub fn update_quality(&mut self, id: &str, quality: Quality) -> bool {
        let accepted = self.is_editable(id)
            && self.store.get(id).map_or(false, |item| item.format.accepts(quality));
        if !accepted {
            log::debug!("[QUEUE] Quality change for {} to {} ignored", id, quality);
            return false;
        }
        self.store.set_quality(id, quality);
        true
    }

    /// Records an external failure for `id`.
    ///
    /// An active item gives up the slot exactly as if it had finished; a queued
    /// item loses its place in line.
    pub fn mark_failed(&mut self, id: &str, reason: &str) -> bool {
        match self.store.status(id) {
            None | Some(DownloadStatus::Finished) | Some(DownloadStatus::Error) => return false,
            Some(_) => {}
        }

        self.store.set_status(id, DownloadStatus::Error);
        self.store.set_error(id, Some(reason.to_string()));
        self.store.set_speed(id, IDLE_SPEED);
        self.waiting.retain(|queued| queued != id);
        log::warn!("❌ [QUEUE] {} failed: {}", id, reason);
        self.emit(QueueEvent::Failed { id: id.to_string(), reason: reason.to_string() });

        if self.active.as_deref() == Some(id) {
            self.advance_queue();
        }
        true
    }

    /// Runs one simulator tick against the active item.
    pub fn tick(&mut self) -> TickReport {
        let id = match self.active.clone() {
            Some(id) => id,
            None => return TickReport::Idle,
        };

        match self.simulator.step(&mut self.store, &id) {
            TickOutcome::Skipped => TickReport::Paused { id },
            TickOutcome::Advanced { progress, speed } => {
                log::debug!("[TICK] {} at {:.1}% ({})", id, progress, speed);
                self.emit(QueueEvent::Progress { id: id.clone(), progress, speed });
                TickReport::Advanced { id, progress }
            }
            TickOutcome::Finished => {
                log::info!("✅ [TICK] {} finished", id);
                self.emit(QueueEvent::Finished { id: id.clone() });
                let next = self.advance_queue();
                TickReport::Finished { id, next }
            }
            TickOutcome::Untouched => {
                // The active item vanished or left the transfer states behind.
                log::warn!("[TICK] Active item {} is not transferable, releasing slot", id);
                let next = self.advance_queue();
                TickReport::Released { id, next }
            }
        }
    }

    /// Releases the slot and promotes the next startable queued id, if any.
    fn advance_queue(&mut self) -> Option<String> {
        self.active = None;

        while let Some(next) = self.waiting.pop_front() {
            if self.store.status(&next).map_or(false, |status| status.is_startable()) {
                self.promote(&next);
                return Some(next);
            }
            log::debug!("[QUEUE] Skipping stale queued id {}", next);
        }

        log::info!("💤 [QUEUE] Nothing left to download");
        self.emit(QueueEvent::Idle);
        None
    }

    fn promote(&mut self, id: &str) -> String {
        self.store.set_status(id, DownloadStatus::Downloading);
        self.store.reset_progress(id);
        self.store.set_speed(id, IDLE_SPEED);
        self.store.set_error(id, None);
        self.store.mark_started(id);
        self.active = Some(id.to_string());

        let command = self.command_for(id).unwrap_or_default();
        log::info!("⬇️ [QUEUE] Starting {}: {}", id, command);
        self.emit(QueueEvent::Started { id: id.to_string(), command: command.clone() });
        command
    }
}
