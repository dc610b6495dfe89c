//! Transport-driven capture.
//!
//! The audio thread owns the [`SegmentRecorder`] and its accumulator outright
//! and never touches the [`SegmentStore`] lock. A finished take travels through
//! a bounded ring of preallocated slots; the store drains that ring whenever
//! it is read and sends the emptied buffers back through a second ring so the
//! next take can swap one in without allocating.

use std::mem;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use ringbuf::traits::{Consumer, Producer, Split};
use ringbuf::{HeapCons, HeapProd, HeapRb};
use tracing::warn;

use super::segment::{Segment, SegmentInfo, CHANNELS};

/// Minimum capture length, in seconds at the capture rate.
pub const MIN_SEGMENT_SECONDS: f64 = 1.0;

/// Finished takes that may wait for the store before newer ones are dropped.
pub const MAX_PENDING_TAKES: usize = 16;

/// Reserve this much accumulator up front so typical takes append without reallocating.
const ACCUMULATOR_RESERVE_SECONDS: f64 = 120.0;

struct FinishedTake {
    samples: Vec<f32>,
    sample_rate: f64,
}

/// State both halves of one recorder can see.
#[derive(Default)]
struct LinkState {
    dropped: AtomicUsize,
    closed: AtomicBool,
}

/// Store side of one recorder: finished takes in, emptied buffers out.
struct RecorderLink {
    finished: HeapCons<FinishedTake>,
    spares: HeapProd<Vec<f32>>,
    state: Arc<LinkState>,
}

#[derive(Default)]
struct StoreInner {
    segments: Vec<Segment>,
    selected: Option<usize>,
    takes: u64,
    dropped_takes: usize,
    links: Vec<RecorderLink>,
}

impl StoreInner {
    fn push_take(&mut self, samples: &[f32], sample_rate: f64) {
        self.takes += 1;
        let name = format!("Take {}", self.takes);
        self.segments.push(Segment::new(name, samples, sample_rate));
        self.selected = Some(self.segments.len() - 1);
    }

    /// Moves every finished take into the list, oldest first, and recycles the buffers.
    fn drain(&mut self) {
        let mut links = mem::take(&mut self.links);
        links.retain_mut(|link| {
            // Read before draining so a take pushed just before the recorder dropped is still collected.
            let closed = link.state.closed.load(Ordering::Acquire);
            while let Some(FinishedTake { mut samples, sample_rate }) = link.finished.try_pop() {
                self.push_take(&samples, sample_rate);
                samples.clear();
                // Full spare ring: let this buffer go here rather than on the audio thread.
                let _ = link.spares.try_push(samples);
            }
            let dropped = link.state.dropped.swap(0, Ordering::Relaxed);
            if dropped > 0 {
                warn!("Dropped {} finished take(s): segment list was not read in time", dropped);
                self.dropped_takes += dropped;
            }
            !closed
        });
        self.links = links;
    }
}

/// Session-only list of finalized segments plus the current selection.
#[derive(Default)]
pub struct SegmentStore {
    inner: Mutex<StoreInner>,
}

impl SegmentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Locks the store and folds in any takes the audio thread has finished.
    fn lock(&self) -> MutexGuard<'_, StoreInner> {
        // A panic while holding this lock leaves plain data behind; keep going.
        let mut inner = self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        inner.drain();
        inner
    }

    fn attach(&self, link: RecorderLink) {
        self.lock().links.push(link);
    }

    /// Takes lost because [`MAX_PENDING_TAKES`] were already waiting.
    pub fn dropped_takes(&self) -> usize {
        self.lock().dropped_takes
    }

    pub fn len(&self) -> usize {
        self.lock().segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn list(&self) -> Vec<SegmentInfo> {
        self.lock().segments.iter().map(SegmentInfo::from).collect()
    }

    pub fn get(&self, index: usize) -> Option<Segment> {
        self.lock().segments.get(index).cloned()
    }

    pub fn duration_seconds(&self, index: usize) -> f64 {
        self.lock()
            .segments
            .get(index)
            .map(Segment::duration_seconds)
            .unwrap_or(0.0)
    }

    pub fn selected_index(&self) -> Option<usize> {
        self.lock().selected
    }

    /// Selects `index`, or clears the selection with `None`. Out-of-range indices are ignored.
    pub fn select(&self, index: Option<usize>) -> bool {
        let mut inner = self.lock();
        match index {
            Some(i) if i >= inner.segments.len() => false,
            other => {
                inner.selected = other;
                true
            }
        }
    }

    pub fn set_trim(&self, index: usize, start: i64, end: Option<i64>) -> bool {
        let mut inner = self.lock();
        match inner.segments.get_mut(index) {
            Some(seg) => {
                seg.set_trim(start, end);
                true
            }
            None => false,
        }
    }

    pub fn rename(&self, index: usize, name: &str) -> bool {
        let mut inner = self.lock();
        match inner.segments.get_mut(index) {
            Some(seg) => {
                seg.name = name.trim().to_string();
                true
            }
            None => false,
        }
    }

    /// Removes a segment and keeps the selection pointing at the same take.
    pub fn remove(&self, index: usize) -> bool {
        let mut inner = self.lock();
        if index >= inner.segments.len() {
            return false;
        }
        inner.segments.remove(index);
        inner.selected = match inner.selected {
            Some(sel) if sel == index => None,
            Some(sel) if sel > index => Some(sel - 1),
            other => other,
        };
        true
    }

    pub fn clear(&self) {
        let mut inner = self.lock();
        inner.segments.clear();
        inner.selected = None;
    }

    /// Copy of the selected segment, taken when a job starts.
    pub fn selected(&self) -> Option<Segment> {
        let inner = self.lock();
        inner.selected.and_then(|i| inner.segments.get(i).cloned())
    }

    /// True when a segment is selected and its trimmed window is at least one second long.
    pub fn has_usable_selection(&self) -> bool {
        self.selected().map(|seg| is_usable(&seg)).unwrap_or(false)
    }
}

pub fn is_usable(seg: &Segment) -> bool {
    seg.sample_rate > 0.0 && seg.trimmed_frames() as f64 >= MIN_SEGMENT_SECONDS * seg.sample_rate
}

/// Audio-thread half of the recorder. Watches play/stop edges every block.
pub struct SegmentRecorder {
    was_playing: bool,
    accumulator: Vec<f32>,
    // Swapped in for the accumulator when no recycled buffer has come back yet.
    spare: Vec<f32>,
    finished: HeapProd<FinishedTake>,
    spares: HeapCons<Vec<f32>>,
    state: Arc<LinkState>,
}

impl SegmentRecorder {
    /// Registers a new capture source with `store`. Not for the audio thread.
    pub fn new(store: Arc<SegmentStore>) -> Self {
        let (finished_tx, finished_rx) = HeapRb::<FinishedTake>::new(MAX_PENDING_TAKES).split();
        let (spares_tx, spares_rx) = HeapRb::<Vec<f32>>::new(MAX_PENDING_TAKES).split();
        let state = Arc::new(LinkState::default());
        store.attach(RecorderLink {
            finished: finished_rx,
            spares: spares_tx,
            state: state.clone(),
        });

        Self {
            was_playing: false,
            accumulator: Vec::new(),
            spare: Vec::new(),
            finished: finished_tx,
            spares: spares_rx,
            state,
        }
    }

    /// Sizes the accumulator and its spare for `sample_rate`. Call from `prepare`, never from the callback.
    pub fn prepare(&mut self, sample_rate: f64) {
        let wanted = (sample_rate.max(0.0) * ACCUMULATOR_RESERVE_SECONDS) as usize * CHANNELS;
        for buf in [&mut self.accumulator, &mut self.spare] {
            if buf.capacity() < wanted {
                buf.reserve(wanted - buf.len());
            }
        }
    }

    pub fn is_capturing(&self) -> bool {
        self.was_playing
    }

    pub fn accumulated_frames(&self) -> usize {
        self.accumulator.len() / CHANNELS
    }

    /// Feeds one block of interleaved stereo input with the block's transport flag.
    pub fn process(&mut self, input: &[f32], is_playing: bool, sample_rate: f64) {
        if is_playing && !self.was_playing {
            self.accumulator.clear();
        } else if !is_playing && self.was_playing {
            self.finish_take(sample_rate);
        }
        self.was_playing = is_playing;

        if is_playing {
            let whole = input.len() - input.len() % CHANNELS;
            self.accumulator.extend_from_slice(&input[..whole]);
        }
    }

    fn finish_take(&mut self, sample_rate: f64) {
        let frames = self.accumulated_frames();
        if sample_rate <= 0.0 || (frames as f64) < MIN_SEGMENT_SECONDS * sample_rate {
            self.accumulator.clear();
            return;
        }

        let samples = mem::take(&mut self.accumulator);
        match self.finished.try_push(FinishedTake { samples, sample_rate }) {
            Ok(()) => {
                self.accumulator = match self.spares.try_pop() {
                    Some(buf) => buf,
                    None => mem::take(&mut self.spare),
                };
            }
            Err(take) => {
                // Queue full: keep the buffer here and lose this take.
                self.accumulator = take.samples;
                self.accumulator.clear();
                self.state.dropped.fetch_add(1, Ordering::Relaxed);
            }
        }
    }
}

impl Drop for SegmentRecorder {
    fn drop(&mut self) {
        self.state.closed.store(true, Ordering::Release);
    }
}
