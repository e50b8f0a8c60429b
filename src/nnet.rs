//! Neural network layer types and operations.
//!
//! Core inference engine for the vocoder model. Provides `LinearLayer` and
//! `MDenseLayer` types plus compute functions for dense, GRU (dense and
//! block-sparse), causal Conv1D, embedding lookup, multi-channel dense
//! projection, and floored categorical sampling.

use rand::Rng;

use crate::vec::*;

// --- Activation types ---

pub const ACTIVATION_LINEAR: i32 = 0;
pub const ACTIVATION_SIGMOID: i32 = 1;
pub const ACTIVATION_TANH: i32 = 2;
pub const ACTIVATION_RELU: i32 = 3;
pub const ACTIVATION_EXP: i32 = 4;

// --- Weight array types ---

pub const WEIGHT_TYPE_FLOAT: i32 = 0;
pub const WEIGHT_TYPE_INT: i32 = 1;
pub const WEIGHT_TYPE_QWEIGHT: i32 = 2;
pub const WEIGHT_TYPE_INT8: i32 = 3;

pub const WEIGHT_BLOB_VERSION: i32 = 0;
pub const WEIGHT_BLOCK_SIZE: usize = 64;

// --- Weight data ---

/// A named array of weight data from a model file.
#[derive(Clone, Debug)]
pub struct WeightArray {
    pub name: String,
    pub type_id: i32,
    pub size: usize,
    pub data: Vec<u8>,
}

// --- Layer types ---

/// Generic sparse/dense affine layer.
///
/// Used for dense layers, GRU gates, Conv1D, and embedding tables (an
/// embedding is a bias-free layer whose float weight rows are indexed
/// instead of multiplied). Weights can be int8-quantized (with per-output
/// scale) or float32.
#[derive(Clone, Debug, Default)]
pub struct LinearLayer {
    pub bias: Vec<f32>,
    pub weights: Vec<i8>,
    pub float_weights: Vec<f32>,
    pub weights_idx: Vec<i32>,
    pub diag: Vec<f32>,
    pub scale: Vec<f32>,
    pub nb_inputs: usize,
    pub nb_outputs: usize,
}

/// Multi-channel dense projection.
///
/// Runs `nb_channels` parallel affine banks through tanh and mixes them
/// with per-element factors. Weights are always float32.
#[derive(Clone, Debug, Default)]
pub struct MDenseLayer {
    pub bias: Vec<f32>,
    pub float_weights: Vec<f32>,
    pub factors: Vec<f32>,
    pub nb_inputs: usize,
    pub nb_outputs: usize,
    pub nb_channels: usize,
}

// --- Activation ---

/// Apply activation function from input to output.
pub fn compute_activation(output: &mut [f32], input: &[f32], n: usize, activation: i32) {
    match activation {
        ACTIVATION_SIGMOID => vec_sigmoid(&mut output[..n], &input[..n]),
        ACTIVATION_TANH => vec_tanh(&mut output[..n], &input[..n]),
        ACTIVATION_RELU => {
            for i in 0..n {
                output[i] = if input[i] < 0.0 { 0.0 } else { input[i] };
            }
        }
        ACTIVATION_EXP => softmax(&mut output[..n], &input[..n]),
        _ => {
            if !std::ptr::eq(output.as_ptr(), input.as_ptr()) {
                output[..n].copy_from_slice(&input[..n]);
            }
        }
    }
}

// --- Linear computation ---

/// Compute affine transform: out = W*in + bias + diag*in
///
/// Dispatches to int8 cgemv or float sgemv depending on which weights are
/// present. Int8 is preferred when available. A layer with no weights at
/// all produces zeros (plus bias), which keeps an unloaded model runnable.
pub fn compute_linear(linear: &LinearLayer, out: &mut [f32], input: &[f32]) {
    let m = linear.nb_inputs;
    let n = linear.nb_outputs;

    if !linear.weights.is_empty() {
        if !linear.weights_idx.is_empty() {
            sparse_cgemv8x4(
                out,
                &linear.weights,
                &linear.weights_idx,
                &linear.scale,
                n,
                m,
                input,
            );
        } else {
            cgemv8x4(out, &linear.weights, &linear.scale, n, m, input);
        }
    } else if !linear.float_weights.is_empty() {
        if !linear.weights_idx.is_empty() {
            sparse_sgemv8x4(out, &linear.float_weights, &linear.weights_idx, n, input);
        } else {
            sgemv(out, &linear.float_weights, n, m, n, input);
        }
    } else {
        for i in 0..n {
            out[i] = 0.0;
        }
    }

    if !linear.bias.is_empty() {
        for i in 0..n {
            out[i] += linear.bias[i];
        }
    }

    if !linear.diag.is_empty() {
        // Diag is only used for GRU recurrent weights: 3*M == N
        debug_assert!(3 * m == n);
        for i in 0..m {
            out[i] += linear.diag[i] * input[i];
            out[i + m] += linear.diag[i + m] * input[i];
            out[i + 2 * m] += linear.diag[i + 2 * m] * input[i];
        }
    }
}

// --- High-level layer operations ---

/// Dense layer: linear transform + activation.
pub fn compute_dense(layer: &LinearLayer, output: &mut [f32], input: &[f32], activation: i32) {
    compute_linear(layer, output, input);
    let n = layer.nb_outputs;
    let tmp = output[..n].to_vec();
    compute_activation(&mut output[..n], &tmp, n, activation);
}

/// GRU layer: standard z/r/h gated recurrent unit.
///
/// `state` is both input (previous state) and output (new state). Each
/// side's bias rides on its own weight layer.
pub fn compute_gru(
    input_weights: &LinearLayer,
    recurrent_weights: &LinearLayer,
    state: &mut [f32],
    input: &[f32],
) {
    debug_assert!(3 * recurrent_weights.nb_inputs == recurrent_weights.nb_outputs);
    debug_assert!(input_weights.nb_outputs == recurrent_weights.nb_outputs);

    let n = recurrent_weights.nb_inputs;
    let mut zrh = vec![0.0f32; 3 * n];
    let mut recur = vec![0.0f32; 3 * n];

    compute_linear(input_weights, &mut zrh, input);
    compute_linear(recurrent_weights, &mut recur, state);

    // z and r: add recurrent, then sigmoid
    for i in 0..2 * n {
        zrh[i] += recur[i];
    }
    let tmp_zr = zrh[..2 * n].to_vec();
    compute_activation(&mut zrh[..2 * n], &tmp_zr, 2 * n, ACTIVATION_SIGMOID);

    // h: add r-gated recurrent, then tanh
    for i in 0..n {
        zrh[2 * n + i] += recur[2 * n + i] * zrh[n + i];
    }
    let mut h = vec![0.0f32; n];
    compute_activation(&mut h, &zrh[2 * n..], n, ACTIVATION_TANH);

    // state = z*state + (1-z)*h
    for i in 0..n {
        state[i] = zrh[i] * state[i] + (1.0 - zrh[i]) * h[i];
    }
}

/// Sparse GRU step where the full 3N input-side activation is precomputed.
///
/// `input` already contains the conditioning projection plus embedding
/// accumulations for all three gates; only the recurrent side is computed
/// here, through a block-sparse layer with diagonal terms.
pub fn compute_sparse_gru(recurrent_weights: &LinearLayer, state: &mut [f32], input: &[f32]) {
    debug_assert!(3 * recurrent_weights.nb_inputs == recurrent_weights.nb_outputs);

    let n = recurrent_weights.nb_inputs;
    let mut recur = vec![0.0f32; 3 * n];
    compute_linear(recurrent_weights, &mut recur, state);

    let mut zr = vec![0.0f32; 2 * n];
    for i in 0..2 * n {
        zr[i] = input[i] + recur[i];
    }
    let tmp_zr = zr.clone();
    compute_activation(&mut zr, &tmp_zr, 2 * n, ACTIVATION_SIGMOID);

    let mut h = vec![0.0f32; n];
    for i in 0..n {
        h[i] = input[2 * n + i] + zr[n + i] * recur[2 * n + i];
    }
    let tmp_h = h.clone();
    compute_activation(&mut h, &tmp_h, n, ACTIVATION_TANH);

    for i in 0..n {
        state[i] = zr[i] * state[i] + (1.0 - zr[i]) * h[i];
    }
}

/// Causal 1D convolution: linear(concat(mem, input)) + activation.
///
/// `mem` carries the kernel-width-minus-one frames of history between
/// calls and is shifted here.
pub fn compute_conv1d(
    layer: &LinearLayer,
    output: &mut [f32],
    mem: &mut [f32],
    input: &[f32],
    input_size: usize,
    activation: i32,
) {
    let mut tmp = vec![0.0f32; layer.nb_inputs];
    let hist_size = layer.nb_inputs - input_size;
    if hist_size > 0 {
        tmp[..hist_size].copy_from_slice(&mem[..hist_size]);
    }
    tmp[hist_size..hist_size + input_size].copy_from_slice(&input[..input_size]);
    compute_linear(layer, output, &tmp);
    let n = layer.nb_outputs;
    let out_tmp = output[..n].to_vec();
    compute_activation(&mut output[..n], &out_tmp, n, activation);
    if hist_size > 0 {
        mem[..hist_size].copy_from_slice(&tmp[input_size..input_size + hist_size]);
    }
}

// --- Embeddings ---

/// Copy the embedding row for `index` into `out`.
///
/// An unloaded (empty) table produces zeros, matching `compute_linear`.
pub fn compute_embedding(layer: &LinearLayer, out: &mut [f32], index: usize) {
    let dim = layer.nb_outputs;
    if layer.float_weights.is_empty() {
        out[..dim].fill(0.0);
        return;
    }
    out[..dim].copy_from_slice(&layer.float_weights[index * dim..(index + 1) * dim]);
}

/// Add the embedding row for `index` onto `out`.
pub fn accum_embedding(layer: &LinearLayer, out: &mut [f32], index: usize) {
    if layer.float_weights.is_empty() {
        return;
    }
    let dim = layer.nb_outputs;
    let row = &layer.float_weights[index * dim..(index + 1) * dim];
    for i in 0..dim {
        out[i] += row[i];
    }
}

// --- Multi-channel dense ---

/// Multi-channel dense projection: per-channel affine + tanh, factor-mixed,
/// then elementwise exp (unnormalized probability masses).
pub fn compute_mdense(layer: &MDenseLayer, output: &mut [f32], input: &[f32]) {
    let n = layer.nb_outputs;
    let rows = layer.nb_channels * n;
    let mut tmp = vec![0.0f32; rows];
    if !layer.float_weights.is_empty() {
        sgemv(&mut tmp, &layer.float_weights, rows, layer.nb_inputs, rows, input);
    }
    if !layer.bias.is_empty() {
        for i in 0..rows {
            tmp[i] += layer.bias[i];
        }
    }
    let act_in = tmp.clone();
    compute_activation(&mut tmp, &act_in, rows, ACTIVATION_TANH);
    for x in output[..n].iter_mut() {
        *x = 0.0;
    }
    if !layer.factors.is_empty() {
        for c in 0..layer.nb_channels {
            for i in 0..n {
                output[i] += tmp[c * n + i] * layer.factors[c * n + i];
            }
        }
    }
    let act_in = output[..n].to_vec();
    compute_activation(&mut output[..n], &act_in, n, ACTIVATION_EXP);
}

/// Multi-channel dense projection over two concatenated inputs.
pub fn compute_mdense_dual(layer: &MDenseLayer, output: &mut [f32], a: &[f32], b: &[f32]) {
    debug_assert!(layer.nb_inputs == a.len() + b.len());
    let mut input = vec![0.0f32; layer.nb_inputs];
    input[..a.len()].copy_from_slice(a);
    input[a.len()..].copy_from_slice(b);
    compute_mdense(layer, output, &input);
}

// --- Categorical sampling ---

/// Draw a symbol from unnormalized probability masses.
///
/// `bias` sharpens the distribution (each mass is raised to `1 + bias`),
/// and `pdf_floor` is subtracted from every normalized mass so no symbol
/// ends up with vanishing probability. The CDF is built from the top so
/// index 0 holds the total mass.
pub fn sample_from_pdf<R: Rng>(pdf: &[f32], bias: f32, pdf_floor: f32, rng: &mut R) -> usize {
    let n = pdf.len();
    let mut tmp = vec![0.0f32; n];
    let mut sum = 0.0f32;
    for i in 0..n {
        tmp[i] = pdf[i].powf(1.0 + bias);
        sum += tmp[i];
    }
    let norm = 1.0 / sum;
    tmp[n - 1] = (norm * tmp[n - 1] - pdf_floor).max(0.0);
    for i in (0..n - 1).rev() {
        tmp[i] = tmp[i + 1] + (norm * tmp[i] - pdf_floor).max(0.0);
    }
    let r = tmp[0] * rng.gen::<f32>();
    for i in 0..n - 1 {
        if r > tmp[i + 1] {
            return i;
        }
    }
    n - 1
}

// --- Weight initialization ---

/// Find a named array in the weight list.
fn find_array<'a>(arrays: &'a [WeightArray], name: &str) -> Option<&'a WeightArray> {
    arrays.iter().find(|a| a.name == name)
}

/// Find a named array and verify its size matches.
fn find_array_check<'a>(arrays: &'a [WeightArray], name: &str, size: usize) -> Option<&'a [u8]> {
    let a = find_array(arrays, name)?;
    if a.size == size {
        Some(&a.data)
    } else {
        None
    }
}

/// Find an optional named array and validate size when present.
fn opt_array_check<'a>(
    arrays: &'a [WeightArray],
    name: &str,
    size: usize,
) -> Option<Option<&'a [u8]>> {
    match find_array(arrays, name) {
        None => Some(None),
        Some(a) if a.size == size => Some(Some(&a.data)),
        Some(_) => None,
    }
}

/// Helper to interpret raw bytes as a slice of f32.
fn bytes_as_f32(data: &[u8]) -> Vec<f32> {
    data.chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

/// Helper to interpret raw bytes as a slice of i32.
fn bytes_as_i32(data: &[u8]) -> Vec<i32> {
    data.chunks_exact(4)
        .map(|c| i32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

/// Helper to interpret raw bytes as a slice of i8.
fn bytes_as_i8(data: &[u8]) -> Vec<i8> {
    data.iter().map(|&b| b as i8).collect()
}

/// Validate sparse index stream shape and bounds.
fn find_idx_check(
    arrays: &[WeightArray],
    name: &str,
    nb_inputs: usize,
    nb_outputs: usize,
) -> Option<(Vec<i32>, usize)> {
    let idx_array = find_array(arrays, name)?;
    let idx_data = bytes_as_i32(&idx_array.data);

    let mut remain = idx_data.len() as i32;
    let mut out_remain = nb_outputs as i32;
    let mut idx_pos = 0usize;
    let mut total_blocks = 0usize;

    while remain > 0 {
        let nb_blocks = *idx_data.get(idx_pos)?;
        if nb_blocks < 0 || remain < nb_blocks + 1 {
            return None;
        }
        idx_pos += 1;
        for _ in 0..nb_blocks as usize {
            let pos = *idx_data.get(idx_pos)?;
            idx_pos += 1;
            if pos + 3 >= nb_inputs as i32 || (pos & 0x3) != 0 {
                return None;
            }
        }
        out_remain -= 8;
        remain -= nb_blocks + 1;
        total_blocks += nb_blocks as usize;
    }

    if out_remain != 0 {
        return None;
    }

    Some((idx_data, total_blocks))
}

/// Initialize a LinearLayer from named weight arrays.
///
/// Names can be empty strings to skip optional fields.
#[allow(clippy::too_many_arguments)]
pub fn linear_init(
    arrays: &[WeightArray],
    bias_name: &str,
    weights_name: &str,
    float_weights_name: &str,
    weights_idx_name: &str,
    diag_name: &str,
    scale_name: &str,
    nb_inputs: usize,
    nb_outputs: usize,
) -> Option<LinearLayer> {
    let mut layer = LinearLayer {
        nb_inputs,
        nb_outputs,
        ..Default::default()
    };

    if !bias_name.is_empty() {
        let data = find_array_check(arrays, bias_name, nb_outputs * 4)?;
        layer.bias = bytes_as_f32(data);
    }
    if !weights_idx_name.is_empty() {
        let (idx_data, total_blocks) =
            find_idx_check(arrays, weights_idx_name, nb_inputs, nb_outputs)?;
        layer.weights_idx = idx_data;

        if !weights_name.is_empty() {
            let data = find_array_check(arrays, weights_name, 32 * total_blocks)?;
            layer.weights = bytes_as_i8(data);
        }
        if !float_weights_name.is_empty() {
            if let Some(data) = opt_array_check(arrays, float_weights_name, 32 * total_blocks * 4)?
            {
                layer.float_weights = bytes_as_f32(data);
            }
        }
    } else {
        if !weights_name.is_empty() {
            let data = find_array_check(arrays, weights_name, nb_inputs * nb_outputs)?;
            layer.weights = bytes_as_i8(data);
        }
        if !float_weights_name.is_empty() {
            if let Some(data) =
                opt_array_check(arrays, float_weights_name, nb_inputs * nb_outputs * 4)?
            {
                layer.float_weights = bytes_as_f32(data);
            }
        }
    }
    if !diag_name.is_empty() {
        let data = find_array_check(arrays, diag_name, nb_outputs * 4)?;
        layer.diag = bytes_as_f32(data);
    }
    if !weights_name.is_empty() && !scale_name.is_empty() {
        let data = find_array_check(arrays, scale_name, nb_outputs * 4)?;
        layer.scale = bytes_as_f32(data);
    }

    Some(layer)
}

/// Initialize an MDenseLayer from named weight arrays.
pub fn mdense_init(
    arrays: &[WeightArray],
    bias_name: &str,
    float_weights_name: &str,
    factor_name: &str,
    nb_inputs: usize,
    nb_outputs: usize,
    nb_channels: usize,
) -> Option<MDenseLayer> {
    let rows = nb_channels * nb_outputs;
    let mut layer = MDenseLayer {
        nb_inputs,
        nb_outputs,
        nb_channels,
        ..Default::default()
    };
    if !bias_name.is_empty() {
        layer.bias = bytes_as_f32(find_array_check(arrays, bias_name, rows * 4)?);
    }
    if !float_weights_name.is_empty() {
        layer.float_weights =
            bytes_as_f32(find_array_check(arrays, float_weights_name, nb_inputs * rows * 4)?);
    }
    if !factor_name.is_empty() {
        layer.factors = bytes_as_f32(find_array_check(arrays, factor_name, rows * 4)?);
    }
    Some(layer)
}

/// Parse a binary weight blob into named arrays.
///
/// The blob is a sequence of 64-byte "DNNw" headers, each followed by its
/// array data padded to a 64-byte boundary.
pub fn parse_weights(data: &[u8]) -> Option<Vec<WeightArray>> {
    let mut arrays = Vec::new();
    let mut pos = 0;
    while pos < data.len() {
        if data.len() - pos < WEIGHT_BLOCK_SIZE {
            return None;
        }
        let head = &data[pos..pos + 4];
        if head != b"DNNw" {
            return None;
        }
        let type_id =
            i32::from_le_bytes([data[pos + 8], data[pos + 9], data[pos + 10], data[pos + 11]]);
        let size_i32 = i32::from_le_bytes([
            data[pos + 12],
            data[pos + 13],
            data[pos + 14],
            data[pos + 15],
        ]);
        let block_size_i32 = i32::from_le_bytes([
            data[pos + 16],
            data[pos + 17],
            data[pos + 18],
            data[pos + 19],
        ]);

        if size_i32 <= 0 || block_size_i32 < 0 {
            return None;
        }
        let size = size_i32 as usize;
        let block_size = block_size_i32 as usize;

        // Name at offset 20, 44 bytes, null-terminated
        let name_bytes = &data[pos + 20..pos + 64];
        if name_bytes[43] != 0 {
            return None;
        }
        let name_end = name_bytes.iter().position(|&b| b == 0).unwrap_or(43);
        let name = String::from_utf8_lossy(&name_bytes[..name_end]).to_string();

        if block_size < size || block_size > data.len() - pos - WEIGHT_BLOCK_SIZE {
            return None;
        }

        let array_data = data[pos + WEIGHT_BLOCK_SIZE..pos + WEIGHT_BLOCK_SIZE + size].to_vec();
        arrays.push(WeightArray {
            name,
            type_id,
            size,
            data: array_data,
        });

        pos += WEIGHT_BLOCK_SIZE + block_size;
    }
    Some(arrays)
}

/// Serialize weight arrays to the binary "DNNw" blob format.
///
/// This is the inverse of [`parse_weights`].
pub fn write_weights(arrays: &[WeightArray]) -> Vec<u8> {
    let mut out = Vec::new();
    for array in arrays {
        let mut header = [0u8; WEIGHT_BLOCK_SIZE];
        header[0..4].copy_from_slice(b"DNNw");
        header[4..8].copy_from_slice(&WEIGHT_BLOB_VERSION.to_le_bytes());
        header[8..12].copy_from_slice(&array.type_id.to_le_bytes());
        header[12..16].copy_from_slice(&(array.size as i32).to_le_bytes());
        let block_size = array.size.div_ceil(WEIGHT_BLOCK_SIZE) * WEIGHT_BLOCK_SIZE;
        header[16..20].copy_from_slice(&(block_size as i32).to_le_bytes());
        let name_bytes = array.name.as_bytes();
        let copy_len = name_bytes.len().min(43);
        header[20..20 + copy_len].copy_from_slice(&name_bytes[..copy_len]);
        out.extend_from_slice(&header);
        out.extend_from_slice(&array.data[..array.size]);
        out.resize(out.len() + block_size - array.size, 0);
    }
    out
}
