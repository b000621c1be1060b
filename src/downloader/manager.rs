use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use crate::config::AppConfig;
use crate::downloader::queue::{DownloadAllOutcome, DownloadQueue, QueueSnapshot, RequestOutcome, TickReport};
use crate::downloader::simulator::ProgressSimulator;
use crate::downloader::{DownloadSettings, DownloadStatus, Format, Quality, QueueEvent, VideoItem};
use crate::errors::Result;
use crate::metadata::{fetch_items, FetchInput, MetadataSource};

/// Queue state plus the ticker serving it. Both live behind one lock so that
/// starting or stopping the ticker is atomic with the slot changes that cause it.
struct Shared {
    queue: DownloadQueue,
    ticker: Option<JoinHandle<()>>,
}

/// Async front of the download queue.
///
/// Every operation takes the single state lock for its whole transition, and
/// the progress ticker runs as a spawned task for exactly as long as an item
/// holds the active slot.
pub struct DownloadManager {
    shared: Arc<Mutex<Shared>>,
    events: broadcast::Sender<QueueEvent>,
    tick_interval: Duration,
    fetch_timeout: Duration,
    fetch_generation: AtomicU64,
}

impl DownloadManager {
    pub fn new(simulator: ProgressSimulator, settings: DownloadSettings, tick_interval: Duration) -> Self {
        let queue = DownloadQueue::new(simulator, settings);
        let events = queue.event_sender();

        Self {
            shared: Arc::new(Mutex::new(Shared { queue, ticker: None })),
            events,
            tick_interval,
            fetch_timeout: Duration::from_secs(30),
            fetch_generation: AtomicU64::new(0),
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        let queue_config = &config.queue;
        let simulator = match queue_config.seed {
            Some(seed) => ProgressSimulator::seeded(seed, queue_config.min_increment, queue_config.max_increment),
            None => ProgressSimulator::new(queue_config.min_increment, queue_config.max_increment),
        };

        Self::new(
            simulator,
            DownloadSettings::from(config),
            Duration::from_millis(queue_config.tick_interval_ms),
        )
        .with_fetch_timeout(Duration::from_secs(config.metadata.timeout_secs))
    }

    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    pub fn subscribe(&self) -> broadcast::Receiver<QueueEvent> {
        self.events.subscribe()
    }

    /// Fetches metadata for `input` and replaces the item collection with it.
    ///
    /// The collection is cleared up front. When the fetch fails it stays empty;
    /// when a newer fetch has started in the meantime the result is dropped.
    pub async fn load(&self, source: &dyn MetadataSource, input: &FetchInput) -> Result<usize> {
        let generation = self.fetch_generation.fetch_add(1, Ordering::SeqCst) + 1;
        {
            let mut shared = self.shared.lock().await;
            shared.queue.clear_items();
            self.sync_ticker(&mut shared);
        }

        let fetched = fetch_items(source, input, self.fetch_timeout).await;

        let mut shared = self.shared.lock().await;
        if self.fetch_generation.load(Ordering::SeqCst) != generation {
            log::info!("🗑️ [FETCH] A newer fetch started, discarding this result");
            return Ok(0);
        }
        let items = fetched?;
        let count = items.len();
        shared.queue.replace_items(items);
        self.sync_ticker(&mut shared);
        Ok(count)
    }

    pub async fn request_download(&self, id: &str) -> RequestOutcome {
        let mut shared = self.shared.lock().await;
        let outcome = shared.queue.request_download(id);
        self.sync_ticker(&mut shared);
        outcome
    }

    pub async fn download_all(&self) -> DownloadAllOutcome {
        let mut shared = self.shared.lock().await;
        let outcome = shared.queue.download_all();
        self.sync_ticker(&mut shared);
        outcome
    }

    pub async fn stop_queue(&self) -> usize {
        let mut shared = self.shared.lock().await;
        shared.queue.stop_queue()
    }

    pub async fn toggle_pause(&self, id: &str) -> Option<DownloadStatus> {
        let mut shared = self.shared.lock().await;
        shared.queue.toggle_pause(id)
    }

    pub async fn update_format(&self, id: &str, format: Format) -> bool {
        let mut shared = self.shared.lock().await;
        shared.queue.update_format(id, format)
    }

    pub async fn update_quality(&self, id: &str, quality: Quality) -> bool {
        let mut shared = self.shared.lock().await;
        shared.queue.update_quality(id, quality)
    }

    pub async fn mark_failed(&self, id: &str, reason: &str) -> bool {
        let mut shared = self.shared.lock().await;
        let failed = shared.queue.mark_failed(id, reason);
        self.sync_ticker(&mut shared);
        failed
    }

    pub async fn command_for(&self, id: &str) -> Option<String> {
        let shared = self.shared.lock().await;
        shared.queue.command_for(id)
    }

    pub async fn get_item(&self, id: &str) -> Option<VideoItem> {
        let shared = self.shared.lock().await;
        shared.queue.item(id).cloned()
    }

    pub async fn get_all_items(&self) -> Vec<VideoItem> {
        let shared = self.shared.lock().await;
        shared.queue.store().items().to_vec()
    }

    pub async fn snapshot(&self) -> QueueSnapshot {
        let shared = self.shared.lock().await;
        shared.queue.snapshot()
    }

    pub async fn active_id(&self) -> Option<String> {
        let shared = self.shared.lock().await;
        shared.queue.active_id().map(str::to_string)
    }

    pub async fn is_queue_running(&self) -> bool {
        let shared = self.shared.lock().await;
        shared.queue.is_queue_running()
    }

    pub async fn is_idle(&self) -> bool {
        let shared = self.shared.lock().await;
        shared.queue.is_idle()
    }

    pub async fn is_ticking(&self) -> bool {
        let shared = self.shared.lock().await;
        shared.ticker.is_some()
    }

    pub async fn settings(&self) -> DownloadSettings {
        let shared = self.shared.lock().await;
        shared.queue.settings().clone()
    }

    pub async fn set_download_dir(&self, dir: impl Into<String>) {
        let mut shared = self.shared.lock().await;
        shared.queue.settings_mut().download_dir = dir.into();
    }

    pub async fn set_browser(&self, browser: impl Into<String>) {
        let mut shared = self.shared.lock().await;
        shared.queue.settings_mut().browser = browser.into();
    }

    pub async fn set_subtitle_langs(&self, langs: Vec<String>) {
        let mut shared = self.shared.lock().await;
        shared.queue.settings_mut().subtitle_langs = langs;
    }

    /// Marks cookies as available after the user picked a cookie file.
    pub async fn load_cookies_from_file(&self, file_name: &str) {
        log::info!("🍪 [QUEUE] Loaded cookies from: {}", file_name);
        self.set_cookies_loaded().await;
    }

    /// Marks cookies as available from the current browser session.
    pub async fn load_cookies_from_browser(&self) {
        log::info!("🍪 [QUEUE] Cookies retrieved from current browser session");
        self.set_cookies_loaded().await;
    }

    async fn set_cookies_loaded(&self) {
        let mut shared = self.shared.lock().await;
        shared.queue.settings_mut().cookies_loaded = true;
    }

    /// Waits until nothing is active or queued.
    pub async fn wait_idle(&self) {
        let mut events = self.subscribe();
        loop {
            if self.is_idle().await {
                return;
            }
            match events.recv().await {
                Ok(QueueEvent::Idle) => return,
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => {}
                Err(broadcast::error::RecvError::Closed) => return,
            }
        }
    }

    /// Starts the ticker when the slot is occupied and stops it when it is not.
    fn sync_ticker(&self, shared: &mut Shared) {
        let slot_occupied = shared.queue.active_id().is_some();

        if slot_occupied && shared.ticker.is_none() {
            log::debug!("[TICK] Starting ticker every {:?}", self.tick_interval);
            shared.ticker = Some(spawn_ticker(self.shared.clone(), self.tick_interval));
        } else if !slot_occupied {
            if let Some(handle) = shared.ticker.take() {
                log::debug!("[TICK] Stopping ticker");
                handle.abort();
            }
        }
    }
}

fn spawn_ticker(shared: Arc<Mutex<Shared>>, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick of a tokio interval fires immediately.
        interval.tick().await;

        loop {
            interval.tick().await;

            let mut guard = shared.lock().await;
            let report = guard.queue.tick();
            if guard.queue.active_id().is_none() {
                log::debug!("[TICK] Slot empty after {:?}, ticker exiting", report);
                guard.ticker = None;
                break;
            }
            if let TickReport::Finished { next: Some(next), .. } = report {
                log::debug!("[TICK] Continuing with {}", next);
            }
        }
    })
}
