//! Vendor speech collaborators and the offline harmonic-decomposition DSP.
//!
//! `tts`/`stt` hold thin vendor-client contracts (trait + HTTP
//! implementation); `decompose` is the pure, CPU-bound waveform
//! transformation the worker pool drives through `spawn_blocking`.

pub mod decompose;
pub mod stt;
pub mod tts;
pub mod wav;

pub use decompose::{decompose, DecomposeError};
pub use stt::{HttpSttClient, SttClient, SttError, SttTranscription, WordTiming};
pub use tts::{HttpTtsClient, TtsClient, TtsError};
