//! Simulated live feed.
//!
//! A [`FeedQueue`] holds the running flag, a FIFO of queued posts and a
//! wake signal. A stream drains the queue at a fixed cadence and parks on
//! the wake signal (with a timeout) when it runs dry, so `stop()` is seen
//! within one idle interval even when nothing new arrives.
//!
//! Every start bumps a generation counter. Streams remember the generation
//! they were started under and end as soon as it changes, which is how a
//! restart for a new subscriber retires the previous stream.

use std::collections::VecDeque;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard};
use std::task::{Context, Poll};
use std::time::Duration;

use crisis_common::FeedItem;
use futures::stream::{BoxStream, Stream, StreamExt};
use tokio::sync::Notify;

use super::WaveLoader;
use crate::errors::FeedError;

/// Timing and seeding for the feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedSettings {
    /// Pause between two yielded items
    pub cadence: Duration,
    /// Longest idle wait before `running` is re-checked
    pub idle_timeout: Duration,
    /// Pause between stopping an active stream and resetting for a new one
    pub settle_delay: Duration,
    /// Wave seeded on start
    pub initial_wave: u32,
}

impl Default for FeedSettings {
    fn default() -> Self {
        Self {
            cadence: Duration::from_secs(3),
            idle_timeout: Duration::from_secs(1),
            settle_delay: Duration::from_millis(200),
            initial_wave: 1,
        }
    }
}

#[derive(Debug)]
enum Slot {
    Item(FeedItem),
    Stop,
}

#[derive(Debug, Default)]
struct QueueState {
    running: bool,
    generation: u64,
    items: VecDeque<Slot>,
    wake: Arc<Notify>,
}

struct Shared {
    loader: Arc<dyn WaveLoader>,
    settings: FeedSettings,
    state: Mutex<QueueState>,
}

/// Cloneable handle to the feed engine.
#[derive(Clone)]
pub struct FeedQueue {
    shared: Arc<Shared>,
}

impl FeedQueue {
    pub fn new(loader: Arc<dyn WaveLoader>, settings: FeedSettings) -> Self {
        Self {
            shared: Arc::new(Shared {
                loader,
                settings,
                state: Mutex::new(QueueState::default()),
            }),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, QueueState>, FeedError> {
        self.shared.state.lock().map_err(|_| FeedError::LockPoisoned)
    }

    pub fn is_running(&self) -> bool {
        self.lock().map(|s| s.running).unwrap_or(false)
    }

    /// Number of queued items not yet yielded.
    pub fn pending(&self) -> usize {
        self.lock()
            .map(|s| {
                s.items
                    .iter()
                    .filter(|slot| matches!(slot, Slot::Item(_)))
                    .count()
            })
            .unwrap_or(0)
    }

    /// Start the feed if it is not running. Returns the live generation.
    async fn start(&self) -> Result<u64, FeedError> {
        {
            let state = self.lock()?;
            if state.running {
                return Ok(state.generation);
            }
        }

        let wave = self.shared.settings.initial_wave;
        let seed = self.shared.loader.load(wave).await?.unwrap_or_else(|| {
            tracing::warn!(wave, "initial wave not found, starting with an empty feed");
            Vec::new()
        });

        let mut state = self.lock()?;
        if state.running {
            return Ok(state.generation);
        }
        // A stop issued while idle leaves its sentinel behind.
        state.items.retain(|slot| matches!(slot, Slot::Item(_)));
        let seeded = seed.len();
        state.items.extend(seed.into_iter().map(Slot::Item));
        state.running = true;
        state.generation += 1;
        tracing::info!(
            generation = state.generation,
            wave,
            seeded,
            "live feed started"
        );
        Ok(state.generation)
    }

    /// Start (if needed) and return a stream of items.
    ///
    /// The stream ends when the feed is stopped or restarted.
    pub async fn stream(&self) -> Result<FeedStream, FeedError> {
        let generation = self.start().await?;
        let cursor = Cursor {
            queue: self.clone(),
            generation,
            yielded: false,
        };
        let inner = futures::stream::unfold(cursor, |mut cursor| async move {
            let item = cursor
                .queue
                .next_item(cursor.generation, cursor.yielded)
                .await?;
            cursor.yielded = true;
            Some((item, cursor))
        })
        .boxed();
        Ok(FeedStream { generation, inner })
    }

    async fn next_item(&self, generation: u64, pace: bool) -> Option<FeedItem> {
        if pace {
            tokio::time::sleep(self.shared.settings.cadence).await;
        }
        loop {
            let wake = {
                let mut state = self.lock().ok()?;
                if state.generation != generation || !state.running {
                    return None;
                }
                match state.items.pop_front() {
                    Some(Slot::Item(item)) => return Some(item),
                    Some(Slot::Stop) => {
                        state.running = false;
                        tracing::info!(generation, "live feed stopped");
                        return None;
                    }
                    None => state.wake.clone(),
                }
            };
            // Timeout just means "re-check the flag".
            let _ = tokio::time::timeout(self.shared.settings.idle_timeout, wake.notified()).await;
        }
    }

    /// Queue one item behind everything already queued.
    pub fn inject(&self, item: FeedItem) -> Result<(), FeedError> {
        let mut state = self.lock()?;
        state.items.push_back(Slot::Item(item));
        state.wake.notify_one();
        Ok(())
    }

    /// Queue a whole wave. `None` when the wave does not exist.
    pub async fn try_inject_wave(&self, wave: u32) -> Result<Option<usize>, FeedError> {
        let Some(items) = self.shared.loader.load(wave).await? else {
            tracing::debug!(wave, "wave not found, nothing injected");
            return Ok(None);
        };
        let count = items.len();
        let mut state = self.lock()?;
        state.items.extend(items.into_iter().map(Slot::Item));
        state.wake.notify_one();
        tracing::info!(wave, count, "wave injected");
        Ok(Some(count))
    }

    /// Queue a whole wave; 0 when the wave does not exist.
    pub async fn inject_wave(&self, wave: u32) -> Result<usize, FeedError> {
        Ok(self.try_inject_wave(wave).await?.unwrap_or(0))
    }

    /// Clear `running` and wake the stream so it ends promptly.
    ///
    /// Items the live stream had not yet yielded are dropped with it, so
    /// the next start begins from a fresh seed. Items injected while the
    /// feed is stopped are kept for the next start.
    pub fn stop(&self) -> Result<(), FeedError> {
        let mut state = self.lock()?;
        Self::end_generation(&mut state);
        Ok(())
    }

    /// Stop only if `generation` is still the live one.
    pub fn stop_generation(&self, generation: u64) -> Result<bool, FeedError> {
        let mut state = self.lock()?;
        if state.generation != generation || !state.running {
            return Ok(false);
        }
        Self::end_generation(&mut state);
        Ok(true)
    }

    fn end_generation(state: &mut QueueState) {
        if state.running {
            let dropped = state.items.len();
            state.items.clear();
            tracing::debug!(generation = state.generation, dropped, "discarding undrained feed items");
        }
        state.running = false;
        state.items.push_back(Slot::Stop);
        state.wake.notify_one();
    }

    /// Drop every queued item and retire the current generation.
    pub fn reset(&self) -> Result<(), FeedError> {
        let mut state = self.lock()?;
        state.items.clear();
        state.running = false;
        state.generation += 1;
        state.wake.notify_waiters();
        state.wake = Arc::new(Notify::new());
        Ok(())
    }

    /// Attach a new subscriber. An active stream is stopped, given
    /// `settle_delay` to wind down, and the queue is reset so the new
    /// subscriber starts from a clean seed.
    pub async fn subscribe(&self) -> Result<FeedStream, FeedError> {
        if self.is_running() {
            tracing::info!("restarting live feed for new subscriber");
            self.stop()?;
            tokio::time::sleep(self.shared.settings.settle_delay).await;
            self.reset()?;
        }
        self.stream().await
    }
}

struct Cursor {
    queue: FeedQueue,
    generation: u64,
    yielded: bool,
}

/// Items from one feed generation.
pub struct FeedStream {
    generation: u64,
    inner: BoxStream<'static, FeedItem>,
}

impl FeedStream {
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

impl Stream for FeedStream {
    type Item = FeedItem;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<FeedItem>> {
        self.inner.poll_next_unpin(cx)
    }
}
