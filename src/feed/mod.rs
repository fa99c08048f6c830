//! Simulated live social feed: wave loading and the paced feed queue.

mod queue;
mod wave;

pub use queue::{FeedQueue, FeedSettings, FeedStream};
pub use wave::{
    FileWaveLoader, MemoryWaveLoader, WaveLoader, WaveSummary, discover_waves, wave_file_name,
    wave_number,
};
