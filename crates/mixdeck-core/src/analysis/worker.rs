//! Per-channel analysis workers
//!
//! Each live channel gets a dedicated worker thread that drains the
//! channel's lock-free tap ring, maintains a sliding sample window, runs
//! the FFT and feature extraction on a fixed cadence, and publishes the
//! latest snapshot into the shared [`AnalysisStore`]. Workers stop when
//! their liveness flag clears or the audio side drops the tap producer.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::thread;
use std::time::Duration;

use crate::analysis::features::{self, AnalysisResult};
use crate::analysis::spectrum::SpectrumAnalyzer;
use crate::types::{ANALYSIS_WINDOW, FFT_SIZE};

/// Latest analysis output for one channel
#[derive(Debug, Clone)]
pub struct AnalysisSnapshot {
    pub result: AnalysisResult,
    /// dB-scaled magnitude bytes, `ANALYSIS_WINDOW` long
    pub spectrum: Vec<u8>,
    /// Midpoint-128 time-domain bytes, `ANALYSIS_WINDOW` long
    pub waveform: Vec<u8>,
}

/// Shared map of channel id to its latest snapshot
///
/// Workers write, readers poll. Snapshots are whole-value swaps; a reader
/// never observes a half-written frame.
#[derive(Default)]
pub struct AnalysisStore {
    snapshots: RwLock<HashMap<String, AnalysisSnapshot>>,
}

impl AnalysisStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&self, channel_id: &str, snapshot: AnalysisSnapshot) {
        if let Ok(mut map) = self.snapshots.write() {
            map.insert(channel_id.to_string(), snapshot);
        }
    }

    pub fn get(&self, channel_id: &str) -> Option<AnalysisSnapshot> {
        self.snapshots
            .read()
            .ok()
            .and_then(|map| map.get(channel_id).cloned())
    }

    pub fn remove(&self, channel_id: &str) {
        if let Ok(mut map) = self.snapshots.write() {
            map.remove(channel_id);
        }
    }

    pub fn clear(&self) {
        if let Ok(mut map) = self.snapshots.write() {
            map.clear();
        }
    }
}

/// Sliding-window analyzer over one channel's tap ring
///
/// Pulls mono samples from the ring into a fixed window, then produces a
/// snapshot on demand. Kept separate from the thread loop so tests can
/// drive it synchronously.
pub struct ChannelAnalyzer {
    tap: rtrb::Consumer<f32>,
    window: Vec<f32>,
    filled: usize,
    spectrum: SpectrumAnalyzer,
    sample_rate: u32,
}

impl ChannelAnalyzer {
    pub fn new(tap: rtrb::Consumer<f32>, sample_rate: u32) -> Self {
        ChannelAnalyzer {
            tap,
            window: vec![0.0; FFT_SIZE],
            filled: 0,
            spectrum: SpectrumAnalyzer::new(),
            sample_rate,
        }
    }

    /// True once the audio side has dropped its producer
    pub fn is_abandoned(&self) -> bool {
        self.tap.is_abandoned()
    }

    /// Drain the tap and, if the window is full, compute a fresh snapshot
    ///
    /// Returns None until enough samples have arrived for one FFT window.
    pub fn poll(&mut self) -> Option<AnalysisSnapshot> {
        while let Ok(sample) = self.tap.pop() {
            if self.filled < FFT_SIZE {
                self.window[self.filled] = sample;
                self.filled += 1;
            } else {
                // Slide: drop the oldest sample
                self.window.copy_within(1.., 0);
                self.window[FFT_SIZE - 1] = sample;
            }
        }

        if self.filled < FFT_SIZE {
            return None;
        }

        let mut spectrum = vec![0u8; ANALYSIS_WINDOW];
        let mut waveform = vec![0u8; ANALYSIS_WINDOW];
        self.spectrum.magnitude_bytes(&self.window, &mut spectrum);
        SpectrumAnalyzer::time_bytes(&self.window, &mut waveform);

        let result = features::analyze(&waveform, &spectrum, self.sample_rate);
        Some(AnalysisSnapshot {
            result,
            spectrum,
            waveform,
        })
    }
}

/// Spawn the worker thread for one channel
///
/// The worker runs until `alive` clears, the tap producer is dropped, or
/// the store is the last reference holder. `interval` sets the analysis
/// cadence.
pub fn spawn_worker(
    channel_id: String,
    tap: rtrb::Consumer<f32>,
    sample_rate: u32,
    interval: Duration,
    alive: Arc<AtomicBool>,
    store: Arc<AnalysisStore>,
) -> thread::JoinHandle<()> {
    thread::Builder::new()
        .name(format!("analysis-{channel_id}"))
        .spawn(move || {
            let mut analyzer = ChannelAnalyzer::new(tap, sample_rate);
            while alive.load(Ordering::Relaxed) {
                if analyzer.is_abandoned() {
                    break;
                }
                if let Some(snapshot) = analyzer.poll() {
                    store.publish(&channel_id, snapshot);
                }
                thread::sleep(interval);
            }
            log::debug!("analysis worker for '{channel_id}' stopped");
        })
        .expect("failed to spawn analysis thread")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(producer: &mut rtrb::Producer<f32>, samples: impl Iterator<Item = f32>) {
        for s in samples {
            producer.push(s).unwrap();
        }
    }

    #[test]
    fn test_poll_returns_none_until_window_full() {
        let (mut tx, rx) = rtrb::RingBuffer::new(FFT_SIZE * 2);
        let mut analyzer = ChannelAnalyzer::new(rx, 44_100);

        feed(&mut tx, std::iter::repeat(0.0).take(FFT_SIZE - 1));
        assert!(analyzer.poll().is_none());

        tx.push(0.0).unwrap();
        let snapshot = analyzer.poll().expect("window full");
        assert_eq!(snapshot.spectrum.len(), ANALYSIS_WINDOW);
        assert_eq!(snapshot.waveform.len(), ANALYSIS_WINDOW);
        assert_eq!(snapshot.result.loudness, 0.0);
    }

    #[test]
    fn test_abandoned_after_producer_drop() {
        let (tx, rx) = rtrb::RingBuffer::<f32>::new(16);
        let analyzer = ChannelAnalyzer::new(rx, 44_100);
        assert!(!analyzer.is_abandoned());
        drop(tx);
        assert!(analyzer.is_abandoned());
    }

    #[test]
    fn test_store_publish_and_remove() {
        let store = AnalysisStore::new();
        let (mut tx, rx) = rtrb::RingBuffer::new(FFT_SIZE);
        let mut analyzer = ChannelAnalyzer::new(rx, 44_100);
        feed(&mut tx, std::iter::repeat(0.0).take(FFT_SIZE));
        let snapshot = analyzer.poll().unwrap();

        store.publish("a", snapshot);
        assert!(store.get("a").is_some());
        assert!(store.get("b").is_none());

        store.remove("a");
        assert!(store.get("a").is_none());
    }

    #[test]
    fn test_worker_publishes_and_stops() {
        let (mut tx, rx) = rtrb::RingBuffer::new(FFT_SIZE * 2);
        let store = Arc::new(AnalysisStore::new());
        let alive = Arc::new(AtomicBool::new(true));

        feed(&mut tx, std::iter::repeat(0.25).take(FFT_SIZE));
        let handle = spawn_worker(
            "deck".into(),
            rx,
            44_100,
            Duration::from_millis(1),
            alive.clone(),
            store.clone(),
        );

        // Wait for the first published snapshot
        for _ in 0..500 {
            if store.get("deck").is_some() {
                break;
            }
            thread::sleep(Duration::from_millis(1));
        }
        assert!(store.get("deck").is_some());

        alive.store(false, Ordering::Relaxed);
        handle.join().unwrap();
    }
}
