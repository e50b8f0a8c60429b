//! LPCNet-style neural vocoder: reconstructs a 16 kHz speech waveform from
//! a low-rate stream of cepstral/pitch features.
//!
//! A frame-rate conditioning network summarizes each feature frame; a
//! sample-rate recurrent network generates companded excitation two
//! samples at a time; classical LPC prediction plus de-emphasis turns the
//! excitation into PCM. See [`LPCNetState::synthesize`] for the stream
//! interface and [`LPCNetDecoder`] for the packet shell.

mod error;

pub mod decoder;
pub mod freq;
pub mod mulaw;
pub mod nnet;
pub mod synthesis;
pub mod vec;

pub use decoder::{LPCNetDecoder, PacketExpander, FRAMES_PER_PACKET, PACKET_BYTES};
pub use error::{Error, Result};
pub use freq::{lpc_from_cepstrum, FRAME_SIZE, LPC_ORDER, NB_BANDS};
pub use mulaw::{lin2ulaw, ulaw2lin};
pub use synthesis::{
    lpcnet_get_size, pitch_from_feature, LPCNetState, EXC_ALPHABET, FEATURES_DELAY, NB_FEATURES,
};
