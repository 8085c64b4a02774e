//! Audio device handling
//!
//! Fixed-size PCM chunk capture from the microphone, WAV encode/decode,
//! and playback to the speaker. The input and output streams are opened
//! per capture/playback and released afterwards so the devices are
//! never held across turns.

pub mod input;
pub mod output;
pub mod wav;

pub use input::{ChunkSource, MicChunkSource, list_devices};
pub use output::play_wav;
pub use wav::{samples_to_wav, wav_to_samples};
