use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use crate::downloader::store::ItemStore;
use crate::downloader::{DownloadStatus, IDLE_SPEED};

/// Representative speed readings shown while an item transfers.
pub const SPEED_READINGS: [&str; 4] = ["2.5 MB/s", "5.1 MB/s", "8.4 MB/s", "12.0 MB/s"];

#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// The item is paused, nothing changed.
    Skipped,
    Advanced { progress: f64, speed: String },
    Finished,
    /// The item is gone or not in a transferable state.
    Untouched,
}

/// Fake transfer engine: every tick moves the active item forward by a random amount.
pub struct ProgressSimulator {
    rng: StdRng,
    min_increment: f64,
    max_increment: f64,
}

impl ProgressSimulator {
    pub fn new(min_increment: f64, max_increment: f64) -> Self {
        Self::with_rng(StdRng::from_entropy(), min_increment, max_increment)
    }

    pub fn seeded(seed: u64, min_increment: f64, max_increment: f64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed), min_increment, max_increment)
    }

    fn with_rng(rng: StdRng, min_increment: f64, max_increment: f64) -> Self {
        let min_increment = min_increment.max(f64::EPSILON);
        Self {
            rng,
            min_increment,
            max_increment: max_increment.max(min_increment),
        }
    }

    fn next_increment(&mut self) -> f64 {
        if self.max_increment > self.min_increment {
            self.rng.gen_range(self.min_increment..self.max_increment)
        } else {
            self.min_increment
        }
    }

    fn next_speed(&mut self) -> &'static str {
        SPEED_READINGS.choose(&mut self.rng).copied().unwrap_or(SPEED_READINGS[0])
    }

    /// Runs one tick against `id`.
    pub fn step(&mut self, store: &mut ItemStore, id: &str) -> TickOutcome {
        match store.status(id) {
            Some(DownloadStatus::Paused) => return TickOutcome::Skipped,
            Some(DownloadStatus::Downloading) => {}
            _ => return TickOutcome::Untouched,
        }

        let increment = self.next_increment();
        let progress = match store.advance_progress(id, increment) {
            Some(progress) => progress,
            None => return TickOutcome::Untouched,
        };

        if progress >= 100.0 {
            store.set_status(id, DownloadStatus::Finished);
            store.set_speed(id, IDLE_SPEED);
            store.mark_finished(id);
            TickOutcome::Finished
        } else {
            let speed = self.next_speed();
            store.set_speed(id, speed);
            TickOutcome::Advanced { progress, speed: speed.to_string() }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::downloader::VideoItem;

    fn downloading_store() -> ItemStore {
        let mut store = ItemStore::new();
        store.replace(vec![VideoItem::new("a", "Track", "Channel")]);
        store.set_status("a", DownloadStatus::Downloading);
        store
    }

    #[test]
    fn test_progress_is_non_decreasing_and_clamps() {
        let mut store = downloading_store();
        let mut simulator = ProgressSimulator::seeded(7, 1.0, 6.0);
        let mut last = 0.0;

        for _ in 0..200 {
            match simulator.step(&mut store, "a") {
                TickOutcome::Advanced { progress, speed } => {
                    assert!(progress >= last);
                    assert!(progress < 100.0);
                    assert!(SPEED_READINGS.contains(&speed.as_str()));
                    last = progress;
                }
                TickOutcome::Finished => break,
                other => panic!("unexpected tick outcome {:?}", other),
            }
        }

        let item = store.get("a").unwrap();
        assert_eq!(item.status, DownloadStatus::Finished);
        assert_eq!(item.progress, 100.0);
        assert_eq!(item.speed, IDLE_SPEED);
        assert!(item.finished_at.is_some());
    }

    #[test]
    fn test_paused_item_is_frozen() {
        let mut store = downloading_store();
        let mut simulator = ProgressSimulator::seeded(1, 10.0, 10.0);
        simulator.step(&mut store, "a");
        store.set_status("a", DownloadStatus::Paused);

        assert_eq!(simulator.step(&mut store, "a"), TickOutcome::Skipped);
        assert_eq!(store.get("a").unwrap().progress, 10.0);
    }

    #[test]
    fn test_fixed_increment_finishes_on_exact_tick() {
        let mut store = downloading_store();
        let mut simulator = ProgressSimulator::seeded(3, 25.0, 25.0);

        for _ in 0..3 {
            assert!(matches!(simulator.step(&mut store, "a"), TickOutcome::Advanced { .. }));
        }
        assert_eq!(simulator.step(&mut store, "a"), TickOutcome::Finished);
        assert_eq!(simulator.step(&mut store, "a"), TickOutcome::Untouched);
    }

    #[test]
    fn test_same_seed_same_run() {
        let run = |seed| {
            let mut store = downloading_store();
            let mut simulator = ProgressSimulator::seeded(seed, 1.0, 6.0);
            (0..5)
                .map(|_| simulator.step(&mut store, "a"))
                .collect::<Vec<_>>()
        };
        assert_eq!(run(42), run(42));
    }
}
