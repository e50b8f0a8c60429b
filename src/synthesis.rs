//! Two-tier recurrent synthesis: a frame-rate conditioning network feeding
//! a sample-rate autoregressive excitation model, combined with LPC
//! prediction and de-emphasis into 16-bit PCM.
//!
//! All long-lived state for one audio stream lives in [`LPCNetState`]:
//! the conditioning convolution memories, both recurrent-unit states, the
//! delay lines that re-align the feature pipeline's look-ahead, the
//! autoregressive signal window, and the sampling RNG. One state per
//! stream; nothing is shared.

use rand::SeedableRng;
use rand_pcg::Pcg32;

use crate::error::{Error, Result};
use crate::freq::{lpc_from_cepstrum, LPC_ORDER};
use crate::mulaw::{lin2ulaw, ulaw2lin};
use crate::nnet::{
    accum_embedding, compute_conv1d, compute_dense, compute_embedding, compute_gru,
    compute_mdense, compute_mdense_dual, compute_sparse_gru, linear_init, mdense_init,
    parse_weights, sample_from_pdf, LinearLayer, MDenseLayer, WeightArray, ACTIVATION_LINEAR,
    ACTIVATION_TANH,
};

// --- Feature layout ---

/// Number of feature slots consumed per frame.
pub const NB_FEATURES: usize = 38;
/// Feature slot carrying the pitch-period value.
const PITCH_PERIOD_FEATURE: usize = 36;
/// Feature slot carrying the pitch gain.
const PITCH_GAIN_FEATURE: usize = 37;

// --- Network dimensions ---

/// Size of the companded excitation alphabet.
pub const EXC_ALPHABET: usize = 256;

const EMBED_PITCH_OUT_SIZE: usize = 64;
const FRAME_INPUT_SIZE: usize = NB_FEATURES + EMBED_PITCH_OUT_SIZE;
const FEATURE_CONV1_OUT_SIZE: usize = FRAME_INPUT_SIZE;
const FEATURE_CONV2_OUT_SIZE: usize = FRAME_INPUT_SIZE;
const FEATURE_CONV_KERNEL_SIZE: usize = 3;
const FEATURE_CONV1_STATE_SIZE: usize = (FEATURE_CONV_KERNEL_SIZE - 1) * FRAME_INPUT_SIZE;
const FEATURE_CONV2_STATE_SIZE: usize = (FEATURE_CONV_KERNEL_SIZE - 1) * FEATURE_CONV1_OUT_SIZE;
const FEATURE_DENSE1_OUT_SIZE: usize = 128;
const FEATURE_DENSE2_OUT_SIZE: usize = 128;
const GRU_A_STATE_SIZE: usize = 384;
const GRU_B_STATE_SIZE: usize = 16;
const MD_EMBED_SIG_OUT_SIZE: usize = 128;

/// Frames of latency introduced by each feature convolution.
const FEATURE_CONV1_DELAY: u32 = 1;
/// Total look-ahead depth of the conditioning pipeline, in frames.
pub const FEATURES_DELAY: usize = 2;

/// Ceiling for the warm-up frame counter; it only needs to witness that
/// enough frames have been seen, so it saturates well below overflow.
const FRAME_COUNT_CAP: u32 = 1000;

const PREEMPH: f32 = 0.85;
const PDF_FLOOR: f32 = 0.002;

const PITCH_MIN_LAG: i32 = 33;
const PITCH_MAX_LAG: i32 = 255;

const DEFAULT_SEED: u64 = 0x5eed_1e75;

/// Derive the pitch lag from its feature-slot value.
///
/// The 0.1 bias compensates rounding at the lag boundaries and must stay
/// as is for reproducible output.
pub fn pitch_from_feature(f: f32) -> i32 {
    let lag = (0.1 + 50.0 * f as f64 + 100.0).floor() as i32;
    lag.clamp(PITCH_MIN_LAG, PITCH_MAX_LAG)
}

// --- Model ---

/// All layers of the synthesis model.
///
/// The `gru_a_embed_*` tables are embeddings of companded codes into the
/// primary recurrent unit's 3N input space, one table per code kind and
/// pair slot, premultiplied by the input weights so that accumulation
/// replaces a matrix product at sample rate.
#[derive(Clone, Debug, Default)]
pub struct LPCNetModel {
    pub embed_pitch: LinearLayer,
    pub feature_conv1: LinearLayer,
    pub feature_conv2: LinearLayer,
    pub feature_dense1: LinearLayer,
    pub feature_dense2: LinearLayer,
    pub gru_a_dense_feature: LinearLayer,
    pub gru_a_embed_sig_0: LinearLayer,
    pub gru_a_embed_sig_1: LinearLayer,
    pub gru_a_embed_pred_0: LinearLayer,
    pub gru_a_embed_pred_1: LinearLayer,
    pub gru_a_embed_exc_0: LinearLayer,
    pub gru_a_embed_exc_1: LinearLayer,
    pub gru_a_recurrent: LinearLayer,
    pub gru_b_input: LinearLayer,
    pub gru_b_recurrent: LinearLayer,
    pub dual_fc_1: MDenseLayer,
    pub md_embed_sig: LinearLayer,
    pub dual_fc_2: MDenseLayer,
}

fn embed_init(arrays: &[WeightArray], name: &str, nb_outputs: usize) -> Option<LinearLayer> {
    linear_init(arrays, "", "", name, "", "", "", EXC_ALPHABET, nb_outputs)
}

/// Initialize the synthesis model from named weight arrays.
pub fn init_lpcnet_model(arrays: &[WeightArray]) -> Option<LPCNetModel> {
    Some(LPCNetModel {
        embed_pitch: embed_init(arrays, "embed_pitch_weights_float", EMBED_PITCH_OUT_SIZE)?,
        feature_conv1: linear_init(
            arrays,
            "feature_conv1_bias",
            "",
            "feature_conv1_weights_float",
            "",
            "",
            "",
            FEATURE_CONV_KERNEL_SIZE * FRAME_INPUT_SIZE,
            FEATURE_CONV1_OUT_SIZE,
        )?,
        feature_conv2: linear_init(
            arrays,
            "feature_conv2_bias",
            "",
            "feature_conv2_weights_float",
            "",
            "",
            "",
            FEATURE_CONV_KERNEL_SIZE * FEATURE_CONV1_OUT_SIZE,
            FEATURE_CONV2_OUT_SIZE,
        )?,
        feature_dense1: linear_init(
            arrays,
            "feature_dense1_bias",
            "",
            "feature_dense1_weights_float",
            "",
            "",
            "",
            FEATURE_CONV2_OUT_SIZE,
            FEATURE_DENSE1_OUT_SIZE,
        )?,
        feature_dense2: linear_init(
            arrays,
            "feature_dense2_bias",
            "",
            "feature_dense2_weights_float",
            "",
            "",
            "",
            FEATURE_DENSE1_OUT_SIZE,
            FEATURE_DENSE2_OUT_SIZE,
        )?,
        gru_a_dense_feature: linear_init(
            arrays,
            "gru_a_dense_feature_bias",
            "",
            "gru_a_dense_feature_weights_float",
            "",
            "",
            "",
            FEATURE_DENSE2_OUT_SIZE,
            3 * GRU_A_STATE_SIZE,
        )?,
        gru_a_embed_sig_0: embed_init(
            arrays,
            "gru_a_embed_sig_0_weights_float",
            3 * GRU_A_STATE_SIZE,
        )?,
        gru_a_embed_sig_1: embed_init(
            arrays,
            "gru_a_embed_sig_1_weights_float",
            3 * GRU_A_STATE_SIZE,
        )?,
        gru_a_embed_pred_0: embed_init(
            arrays,
            "gru_a_embed_pred_0_weights_float",
            3 * GRU_A_STATE_SIZE,
        )?,
        gru_a_embed_pred_1: embed_init(
            arrays,
            "gru_a_embed_pred_1_weights_float",
            3 * GRU_A_STATE_SIZE,
        )?,
        gru_a_embed_exc_0: embed_init(
            arrays,
            "gru_a_embed_exc_0_weights_float",
            3 * GRU_A_STATE_SIZE,
        )?,
        gru_a_embed_exc_1: embed_init(
            arrays,
            "gru_a_embed_exc_1_weights_float",
            3 * GRU_A_STATE_SIZE,
        )?,
        gru_a_recurrent: linear_init(
            arrays,
            "gru_a_recurrent_bias",
            "gru_a_recurrent_weights_int8",
            "gru_a_recurrent_weights_float",
            "gru_a_recurrent_weights_idx",
            "gru_a_recurrent_diag",
            "gru_a_recurrent_scale",
            GRU_A_STATE_SIZE,
            3 * GRU_A_STATE_SIZE,
        )?,
        gru_b_input: linear_init(
            arrays,
            "gru_b_input_bias",
            "",
            "gru_b_input_weights_float",
            "",
            "",
            "",
            GRU_A_STATE_SIZE + FEATURE_DENSE2_OUT_SIZE,
            3 * GRU_B_STATE_SIZE,
        )?,
        gru_b_recurrent: linear_init(
            arrays,
            "gru_b_recurrent_bias",
            "",
            "gru_b_recurrent_weights_float",
            "",
            "",
            "",
            GRU_B_STATE_SIZE,
            3 * GRU_B_STATE_SIZE,
        )?,
        dual_fc_1: mdense_init(
            arrays,
            "dual_fc_1_bias",
            "dual_fc_1_weights_float",
            "dual_fc_1_factor",
            GRU_B_STATE_SIZE,
            EXC_ALPHABET,
            2,
        )?,
        md_embed_sig: embed_init(arrays, "md_embed_sig_weights_float", MD_EMBED_SIG_OUT_SIZE)?,
        dual_fc_2: mdense_init(
            arrays,
            "dual_fc_2_bias",
            "dual_fc_2_weights_float",
            "dual_fc_2_factor",
            GRU_B_STATE_SIZE + MD_EMBED_SIG_OUT_SIZE,
            EXC_ALPHABET,
            2,
        )?,
    })
}

// --- Recurrent network state ---

/// Carried state of the conditioning convolutions and both recurrent
/// units. Mutated in place exactly once per stage invocation.
#[derive(Clone)]
struct NNetState {
    feature_conv1_state: Vec<f32>,
    feature_conv2_state: Vec<f32>,
    gru_a_state: Vec<f32>,
    gru_b_state: Vec<f32>,
}

impl NNetState {
    fn new() -> Self {
        NNetState {
            feature_conv1_state: vec![0.0; FEATURE_CONV1_STATE_SIZE],
            feature_conv2_state: vec![0.0; FEATURE_CONV2_STATE_SIZE],
            gru_a_state: vec![0.0; GRU_A_STATE_SIZE],
            gru_b_state: vec![0.0; GRU_B_STATE_SIZE],
        }
    }

    fn reset(&mut self) {
        self.feature_conv1_state.fill(0.0);
        self.feature_conv2_state.fill(0.0);
        self.gru_a_state.fill(0.0);
        self.gru_b_state.fill(0.0);
    }
}

// --- Synthesis state ---

/// Synthesizer state for one audio stream.
#[derive(Clone)]
pub struct LPCNetState {
    model: LPCNetModel,
    nnet: NNetState,
    /// Last two sampled excitation codes, newest at index 0.
    last_exc: [u8; 2],
    /// Autoregressive window, newest sample at index 0. One slot beyond
    /// the LPC order because the pair's second prediction reads a window
    /// shifted one sample into the past.
    last_sig: [f32; LPC_ORDER + 1],
    /// Raw conditioning inputs for the last `FEATURES_DELAY` frames.
    old_input: [[f32; FRAME_INPUT_SIZE]; FEATURES_DELAY],
    /// LPC sets for the last `FEATURES_DELAY` frames.
    old_lpc: [[f32; LPC_ORDER]; FEATURES_DELAY],
    /// Pitch gains for the last `FEATURES_DELAY` frames.
    old_gain: [f32; FEATURES_DELAY],
    frame_count: u32,
    deemph_mem: f32,
    rng: Pcg32,
}

impl Default for LPCNetState {
    fn default() -> Self {
        Self::new()
    }
}

impl LPCNetState {
    /// Create a fresh state with the default sampling seed and no model
    /// loaded. An unloaded model synthesizes from uniform excitation.
    pub fn new() -> Self {
        Self::with_seed(DEFAULT_SEED)
    }

    /// Create a fresh state with an explicit sampling seed.
    pub fn with_seed(seed: u64) -> Self {
        LPCNetState {
            model: LPCNetModel::default(),
            nnet: NNetState::new(),
            last_exc: [lin2ulaw(0.0); 2],
            last_sig: [0.0; LPC_ORDER + 1],
            old_input: [[0.0; FRAME_INPUT_SIZE]; FEATURES_DELAY],
            old_lpc: [[0.0; LPC_ORDER]; FEATURES_DELAY],
            old_gain: [0.0; FEATURES_DELAY],
            frame_count: 0,
            deemph_mem: 0.0,
            rng: Pcg32::seed_from_u64(seed),
        }
    }

    /// Install a model from parsed weight arrays and reset all carried
    /// state.
    pub fn init(&mut self, arrays: &[WeightArray]) -> Result<()> {
        self.model = init_lpcnet_model(arrays).ok_or(Error::IncompleteModel)?;
        self.reset();
        Ok(())
    }

    /// Load a model from a serialized weight blob.
    pub fn load_model(&mut self, data: &[u8]) -> Result<()> {
        let arrays = parse_weights(data).ok_or_else(|| {
            log::warn!("weight blob failed to parse");
            Error::InvalidBlob
        })?;
        log::debug!("parsed {} weight arrays", arrays.len());
        self.init(&arrays)
    }

    /// Reset carried state without touching the model or the RNG.
    pub fn reset(&mut self) {
        self.nnet.reset();
        self.last_exc = [lin2ulaw(0.0); 2];
        self.last_sig = [0.0; LPC_ORDER + 1];
        self.old_input = [[0.0; FRAME_INPUT_SIZE]; FEATURES_DELAY];
        self.old_lpc = [[0.0; LPC_ORDER]; FEATURES_DELAY];
        self.old_gain = [0.0; FEATURES_DELAY];
        self.frame_count = 0;
        self.deemph_mem = 0.0;
    }

    /// Run the frame-rate conditioning network.
    ///
    /// Produces the per-frame conditioning vector for the secondary
    /// recurrent unit and its projection into the primary unit's input
    /// space. Convolution outputs are forced to zero until the pipeline
    /// has accumulated enough frames to be valid.
    fn run_frame_network(
        &mut self,
        condition: &mut [f32],
        gru_a_condition: &mut [f32],
        features: &[f32],
        pitch: i32,
    ) {
        let model = &self.model;
        let nnet = &mut self.nnet;

        let mut input = [0.0f32; FRAME_INPUT_SIZE];
        input[..NB_FEATURES].copy_from_slice(&features[..NB_FEATURES]);
        compute_embedding(&model.embed_pitch, &mut input[NB_FEATURES..], pitch as usize);

        let mut conv1_out = [0.0f32; FEATURE_CONV1_OUT_SIZE];
        compute_conv1d(
            &model.feature_conv1,
            &mut conv1_out,
            &mut nnet.feature_conv1_state,
            &input,
            FRAME_INPUT_SIZE,
            ACTIVATION_TANH,
        );
        if self.frame_count < FEATURE_CONV1_DELAY {
            conv1_out.fill(0.0);
        }
        let mut conv2_out = [0.0f32; FEATURE_CONV2_OUT_SIZE];
        compute_conv1d(
            &model.feature_conv2,
            &mut conv2_out,
            &mut nnet.feature_conv2_state,
            &conv1_out,
            FEATURE_CONV1_OUT_SIZE,
            ACTIVATION_TANH,
        );
        if self.frame_count < FEATURES_DELAY as u32 {
            conv2_out.fill(0.0);
        }

        for k in (1..FEATURES_DELAY).rev() {
            self.old_input[k] = self.old_input[k - 1];
        }
        self.old_input[0] = input;

        let mut dense1_out = [0.0f32; FEATURE_DENSE1_OUT_SIZE];
        compute_dense(
            &model.feature_dense1,
            &mut dense1_out,
            &conv2_out,
            ACTIVATION_TANH,
        );
        compute_dense(&model.feature_dense2, condition, &dense1_out, ACTIVATION_TANH);
        compute_dense(
            &model.gru_a_dense_feature,
            gru_a_condition,
            condition,
            ACTIVATION_LINEAR,
        );
        self.frame_count = (self.frame_count + 1).min(FRAME_COUNT_CAP);
    }

    /// Synthesize PCM for one frame's worth of features.
    ///
    /// `output.len()` is the requested sample count and must be even:
    /// excitation is always generated in pairs. During warm-up (until the
    /// conditioning pipeline has seen `FEATURES_DELAY` frames) the output
    /// is all zeros.
    pub fn synthesize(&mut self, features: &[f32], output: &mut [i16]) {
        assert!(features.len() >= NB_FEATURES);
        assert!(output.len() % 2 == 0, "sample count must be even");

        let pitch = pitch_from_feature(features[PITCH_PERIOD_FEATURE]);
        // The gain aligned with this frame's LPC/output is FEATURES_DELAY
        // frames old; read it before pushing the current one.
        let pitch_gain = self.old_gain[FEATURES_DELAY - 1];
        for k in (1..FEATURES_DELAY).rev() {
            self.old_gain[k] = self.old_gain[k - 1];
        }
        self.old_gain[0] = features[PITCH_GAIN_FEATURE];

        let mut condition = vec![0.0f32; FEATURE_DENSE2_OUT_SIZE];
        let mut gru_a_condition = vec![0.0f32; 3 * GRU_A_STATE_SIZE];
        self.run_frame_network(&mut condition, &mut gru_a_condition, features, pitch);

        let lpc = self.old_lpc[FEATURES_DELAY - 1];
        for k in (1..FEATURES_DELAY).rev() {
            self.old_lpc[k] = self.old_lpc[k - 1];
        }
        lpc_from_cepstrum(&mut self.old_lpc[0], features);

        if self.frame_count <= FEATURES_DELAY as u32 {
            output.fill(0);
            return;
        }

        for pair in output.chunks_exact_mut(2) {
            let mut exc = [0u8; 2];
            let mut pred = [0.0f32; 2];
            for j in 0..LPC_ORDER {
                pred[0] -= self.last_sig[j] * lpc[j];
                pred[1] -= self.last_sig[j + 1] * lpc[j];
            }
            let last_sig_u = [lin2ulaw(self.last_sig[0]), lin2ulaw(self.last_sig[1])];
            let pred_u = [lin2ulaw(pred[0]), lin2ulaw(pred[1])];
            run_sample_network(
                &self.model,
                &mut self.nnet,
                &mut self.rng,
                &mut exc,
                &condition,
                &gru_a_condition,
                self.last_exc,
                last_sig_u,
                pred_u,
                pitch_gain,
            );

            let mut pcm = pred[0] + ulaw2lin(exc[1]);
            self.last_sig.copy_within(0..LPC_ORDER, 1);
            self.last_exc[1] = exc[1];
            self.last_sig[0] = pcm;
            pcm += PREEMPH * self.deemph_mem;
            self.deemph_mem = pcm;
            pair[0] = round_pcm(pcm);

            // The pair's second prediction must come from the window that
            // now includes the sample just produced.
            let mut pred_new = 0.0f32;
            for j in 0..LPC_ORDER {
                pred_new -= self.last_sig[j] * lpc[j];
            }
            let mut pcm = pred_new + ulaw2lin(exc[0]);
            self.last_sig.copy_within(0..LPC_ORDER, 1);
            self.last_exc[0] = exc[0];
            self.last_sig[0] = pcm;
            pcm += PREEMPH * self.deemph_mem;
            self.deemph_mem = pcm;
            pair[1] = round_pcm(pcm);
        }
    }
}

/// Query the fixed size of a synthesizer state.
pub fn lpcnet_get_size() -> usize {
    std::mem::size_of::<LPCNetState>()
}

fn round_pcm(pcm: f32) -> i16 {
    let pcm = pcm.clamp(-32767.0, 32767.0);
    (0.5 + pcm).floor() as i16
}

/// Run the sample-rate network once, producing one excitation pair.
///
/// Slot 1 of the pair is sampled first and belongs to the first emitted
/// sample; slot 0 follows from a second projection that sees slot 1's
/// embedding. Callers must respect this index convention.
#[allow(clippy::too_many_arguments)]
fn run_sample_network(
    model: &LPCNetModel,
    nnet: &mut NNetState,
    rng: &mut Pcg32,
    exc: &mut [u8; 2],
    condition: &[f32],
    gru_a_condition: &[f32],
    last_exc: [u8; 2],
    last_sig: [u8; 2],
    pred: [u8; 2],
    pitch_gain: f32,
) {
    let mut gru_a_input = vec![0.0f32; 3 * GRU_A_STATE_SIZE];
    gru_a_input.copy_from_slice(&gru_a_condition[..3 * GRU_A_STATE_SIZE]);
    accum_embedding(&model.gru_a_embed_sig_1, &mut gru_a_input, last_sig[1] as usize);
    accum_embedding(&model.gru_a_embed_pred_1, &mut gru_a_input, pred[1] as usize);
    accum_embedding(&model.gru_a_embed_exc_1, &mut gru_a_input, last_exc[1] as usize);
    accum_embedding(&model.gru_a_embed_sig_0, &mut gru_a_input, last_sig[0] as usize);
    accum_embedding(&model.gru_a_embed_pred_0, &mut gru_a_input, pred[0] as usize);
    accum_embedding(&model.gru_a_embed_exc_0, &mut gru_a_input, last_exc[0] as usize);
    compute_sparse_gru(&model.gru_a_recurrent, &mut nnet.gru_a_state, &gru_a_input);

    let mut in_b = vec![0.0f32; GRU_A_STATE_SIZE + FEATURE_DENSE2_OUT_SIZE];
    in_b[..GRU_A_STATE_SIZE].copy_from_slice(&nnet.gru_a_state);
    in_b[GRU_A_STATE_SIZE..].copy_from_slice(&condition[..FEATURE_DENSE2_OUT_SIZE]);
    compute_gru(
        &model.gru_b_input,
        &model.gru_b_recurrent,
        &mut nnet.gru_b_state,
        &in_b,
    );

    let bias = (1.5 * pitch_gain - 0.5).max(0.0);
    let mut pdf = vec![0.0f32; EXC_ALPHABET];
    compute_mdense(&model.dual_fc_1, &mut pdf, &nnet.gru_b_state);
    exc[1] = sample_from_pdf(&pdf, bias, PDF_FLOOR, rng) as u8;

    let mut exc_embed = vec![0.0f32; MD_EMBED_SIG_OUT_SIZE];
    compute_embedding(&model.md_embed_sig, &mut exc_embed, exc[1] as usize);
    compute_mdense_dual(&model.dual_fc_2, &mut pdf, &nnet.gru_b_state, &exc_embed);
    exc[0] = sample_from_pdf(&pdf, bias, PDF_FLOOR, rng) as u8;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::freq::FRAME_SIZE;

    fn frame_with(pitch_feature: f32, gain: f32) -> [f32; NB_FEATURES] {
        let mut f = [0.0f32; NB_FEATURES];
        f[PITCH_PERIOD_FEATURE] = pitch_feature;
        f[PITCH_GAIN_FEATURE] = gain;
        f
    }

    #[test]
    fn pitch_clamps_to_valid_lag_range() {
        // feature -> floor(0.1 + 50*f + 100)
        assert_eq!(pitch_from_feature(0.0), 100);
        assert_eq!(pitch_from_feature(-10.0), PITCH_MIN_LAG);
        assert_eq!(pitch_from_feature(10.0), PITCH_MAX_LAG);
        // Boundary values land exactly on the limits before clamping.
        assert_eq!(pitch_from_feature(-1.34), 33);
        assert_eq!(pitch_from_feature(3.1), 255);
        // The +0.1 bias absorbs the feature's float quantization: 1.16f32
        // maps to 157.99999833... + 0.1, which must still floor to 158.
        assert_eq!(pitch_from_feature(1.16), 158);
    }

    #[test]
    fn gain_delay_line_shifts_one_slot_per_frame() {
        let mut st = LPCNetState::new();
        let mut out = [0i16; FRAME_SIZE];
        for k in 0..4 {
            st.synthesize(&frame_with(0.0, k as f32 + 1.0), &mut out);
            assert_eq!(st.old_gain[0], k as f32 + 1.0);
        }
        // After four pushes the oldest slot holds the gain from
        // FEATURES_DELAY frames ago.
        assert_eq!(st.old_gain[FEATURES_DELAY - 1], 3.0);
    }

    #[test]
    fn lpc_delay_line_shifts_one_slot_per_frame() {
        let mut st = LPCNetState::new();
        let mut out = [0i16; FRAME_SIZE];
        let mut f = frame_with(0.0, 0.0);
        f[0] = 1.0;
        st.synthesize(&f, &mut out);
        let first = st.old_lpc[0];
        st.synthesize(&frame_with(0.0, 0.0), &mut out);
        assert_eq!(st.old_lpc[1], first);
    }

    #[test]
    fn feature_history_tracks_raw_conditioning_input() {
        let mut st = LPCNetState::new();
        let mut out = [0i16; FRAME_SIZE];
        let mut f = frame_with(0.0, 0.0);
        f[5] = 0.25;
        st.synthesize(&f, &mut out);
        assert_eq!(st.old_input[0][5], 0.25);
        let first = st.old_input[0];
        st.synthesize(&frame_with(0.0, 0.0), &mut out);
        assert_eq!(st.old_input[1], first);
    }

    #[test]
    fn frame_count_saturates_at_cap() {
        let mut st = LPCNetState::new();
        st.frame_count = FRAME_COUNT_CAP;
        let mut out = [0i16; FRAME_SIZE];
        st.synthesize(&frame_with(0.0, 0.5), &mut out);
        assert_eq!(st.frame_count, FRAME_COUNT_CAP);
    }

    #[test]
    fn excitation_history_is_primed_with_companded_silence() {
        let st = LPCNetState::new();
        assert_eq!(st.last_exc, [128, 128]);
    }

    #[test]
    fn reset_restores_creation_state() {
        let mut st = LPCNetState::new();
        let mut out = [0i16; FRAME_SIZE];
        for _ in 0..5 {
            st.synthesize(&frame_with(0.2, 0.7), &mut out);
        }
        st.reset();
        assert_eq!(st.frame_count, 0);
        assert_eq!(st.last_exc, [128, 128]);
        assert_eq!(st.deemph_mem, 0.0);
        assert!(st.last_sig.iter().all(|&x| x == 0.0));
        assert!(st.nnet.gru_a_state.iter().all(|&x| x == 0.0));
    }

    #[test]
    fn state_size_is_queryable() {
        assert!(lpcnet_get_size() > 0);
        assert_eq!(lpcnet_get_size(), std::mem::size_of::<LPCNetState>());
    }
}
