//! Decoder shell: expands received packets into feature frames and drives
//! the synthesizer once per frame.
//!
//! The packet-to-features expansion itself (vector-quantization codebooks
//! and their predictive memory) is supplied by the host through
//! [`PacketExpander`]; this shell owns only the synthesis state and the
//! frame/offset bookkeeping.

use crate::error::Result;
use crate::freq::FRAME_SIZE;
use crate::synthesis::{LPCNetState, NB_FEATURES};

/// Encoded packet size in bytes.
pub const PACKET_BYTES: usize = 8;

/// Feature frames carried by one packet.
pub const FRAMES_PER_PACKET: usize = 4;

/// Expands one fixed-size packet into feature frames.
///
/// Implementations keep whatever quantizer memory they need across calls;
/// that memory is opaque to the decoder shell.
pub trait PacketExpander {
    fn expand(
        &mut self,
        packet: &[u8; PACKET_BYTES],
        frames: &mut [[f32; NB_FEATURES]; FRAMES_PER_PACKET],
    );
}

/// Packet decoder: a synthesis state plus the host's packet expander.
pub struct LPCNetDecoder<E> {
    lpcnet: LPCNetState,
    expander: E,
}

impl<E: PacketExpander> LPCNetDecoder<E> {
    /// Create a decoder around a packet expander.
    pub fn new(expander: E) -> Self {
        LPCNetDecoder {
            lpcnet: LPCNetState::new(),
            expander,
        }
    }

    /// Create a decoder with an explicit sampling seed.
    pub fn with_seed(expander: E, seed: u64) -> Self {
        LPCNetDecoder {
            lpcnet: LPCNetState::with_seed(seed),
            expander,
        }
    }

    /// Load the synthesis model from a serialized weight blob.
    pub fn load_model(&mut self, data: &[u8]) -> Result<()> {
        self.lpcnet.load_model(data)
    }

    /// Reset the synthesis state; the expander's memory is the host's
    /// to manage.
    pub fn reset(&mut self) {
        self.lpcnet.reset();
    }

    /// Decode one packet into `FRAMES_PER_PACKET * FRAME_SIZE` samples.
    pub fn decode(&mut self, packet: &[u8; PACKET_BYTES], pcm: &mut [i16]) {
        assert_eq!(pcm.len(), FRAMES_PER_PACKET * FRAME_SIZE);
        let mut frames = [[0.0f32; NB_FEATURES]; FRAMES_PER_PACKET];
        self.expander.expand(packet, &mut frames);
        for (k, frame) in frames.iter().enumerate() {
            self.lpcnet
                .synthesize(frame, &mut pcm[k * FRAME_SIZE..(k + 1) * FRAME_SIZE]);
        }
    }

    /// Query the fixed size of the decoder state.
    pub fn get_size(&self) -> usize {
        std::mem::size_of::<Self>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Scripted expander: repeats one feature frame and counts calls.
    struct FixedExpander {
        frame: [f32; NB_FEATURES],
        calls: usize,
    }

    impl PacketExpander for FixedExpander {
        fn expand(
            &mut self,
            _packet: &[u8; PACKET_BYTES],
            frames: &mut [[f32; NB_FEATURES]; FRAMES_PER_PACKET],
        ) {
            self.calls += 1;
            for f in frames.iter_mut() {
                *f = self.frame;
            }
        }
    }

    #[test]
    fn decode_expands_once_per_packet() {
        let mut frame = [0.0f32; NB_FEATURES];
        frame[37] = 0.6;
        let mut dec = LPCNetDecoder::new(FixedExpander { frame, calls: 0 });
        let mut pcm = [0i16; FRAMES_PER_PACKET * FRAME_SIZE];
        dec.decode(&[0u8; PACKET_BYTES], &mut pcm);
        dec.decode(&[0u8; PACKET_BYTES], &mut pcm);
        assert_eq!(dec.expander.calls, 2);
    }

    #[test]
    fn first_packet_starts_with_warmup_silence() {
        let frame = [0.5f32; NB_FEATURES];
        let mut dec = LPCNetDecoder::new(FixedExpander { frame, calls: 0 });
        let mut pcm = [1i16; FRAMES_PER_PACKET * FRAME_SIZE];
        dec.decode(&[0u8; PACKET_BYTES], &mut pcm);
        // The first FEATURES_DELAY frames of the packet are warm-up.
        assert!(pcm[..2 * FRAME_SIZE].iter().all(|&s| s == 0));
    }
}
