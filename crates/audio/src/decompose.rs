//! Harmonic waveform decomposition.
//!
//! Takes one TTS-rendered utterance and synthesizes `n_waves` simple cosine
//! waveforms that mimic its pitch-and-envelope shape, remapped into one of
//! six fixed frequency bands so each slot's physical actuator receives a
//! signal in its own range. Reimplemented from scratch as a pure function
//! over samples — the contract requires *a* pitch/envelope estimate, not a
//! specific algorithm (Non-goals: exact reproduction of the original DSP).

use std::f64::consts::PI;
use std::path::PathBuf;
use std::time::Instant;

use resonance_core::{DecomposeJob, DecomposeResult, QualityMetrics};
use rustfft::{num_complex::Complex, FftPlanner};
use thiserror::Error;

use crate::wav::{read_mono_wav, write_mono_wav};

#[derive(Debug, Error)]
pub enum DecomposeError {
    #[error("failed to read input wav: {0}")]
    ReadWav(#[from] hound::Error),

    #[error("failed to create output directory: {0}")]
    Io(#[from] std::io::Error),

    #[error("input audio is empty")]
    EmptyInput,
}

const FRAME_SIZE: usize = 2048;
const HOP_SIZE: usize = 512;
const GENERIC_BAND: (f32, f32) = (15.0, 80.0);

fn band_for_slot(slot_id: u8) -> (f32, f32) {
    match slot_id {
        1 | 6 => (80.0, 100.0),
        2 | 5 => (50.0, 70.0),
        3 | 4 => (20.0, 40.0),
        _ => GENERIC_BAND,
    }
}

/// Runs the full decomposition for one job. CPU-bound; callers are expected
/// to isolate this on a blocking thread (the worker pool uses
/// `tokio::task::spawn_blocking`).
pub fn decompose(job: &DecomposeJob) -> Result<DecomposeResult, DecomposeError> {
    let start = Instant::now();
    match run(job) {
        Ok((wave_paths, metrics)) => Ok(DecomposeResult {
            job: job.clone(),
            success: true,
            wave_paths,
            quality_metrics: Some(metrics),
            duration_ms: start.elapsed().as_secs_f64() * 1000.0,
            error: None,
        }),
        Err(err) => {
            Ok(DecomposeResult::failure(job.clone(), err.to_string(), start.elapsed().as_secs_f64() * 1000.0))
        }
    }
}

fn run(job: &DecomposeJob) -> Result<(Vec<PathBuf>, QualityMetrics), DecomposeError> {
    let (samples, sample_rate) = read_mono_wav(&job.input_path)?;
    if samples.is_empty() {
        return Err(DecomposeError::EmptyInput);
    }

    let band = job.target_slot_id.map(|s| band_for_slot(s.get())).unwrap_or(GENERIC_BAND);

    let contour = pitch_contour(&samples, sample_rate, FRAME_SIZE, HOP_SIZE);
    let remapped = remap_contour_to_band(&contour, band);
    let envelopes = harmonic_envelopes(&samples, sample_rate, &contour, FRAME_SIZE, HOP_SIZE, job.n_waves);

    std::fs::create_dir_all(&job.output_dir)?;

    let mut wave_paths = Vec::with_capacity(job.n_waves);
    let mut mix = vec![0.0f32; samples.len()];

    for (k, envelope) in envelopes.iter().enumerate() {
        let harmonic_number = (k + 1) as f32;
        let wave = synthesize_cosine(&remapped, envelope, harmonic_number, sample_rate, HOP_SIZE, samples.len());
        for (m, s) in mix.iter_mut().zip(wave.iter()) {
            *m += *s;
        }

        let path = job.output_dir.join(format!("{}_v3_wave{}.wav", job.tts_basename, k + 1));
        write_mono_wav(&path, &wave, sample_rate)?;
        wave_paths.push(path);
    }

    let gain = gain_curve(&samples, &mix, FRAME_SIZE, HOP_SIZE);
    apply_gain_curve(&mut mix, &gain, HOP_SIZE);

    let metrics = quality_metrics(&samples, &mix, FRAME_SIZE, HOP_SIZE);

    Ok((wave_paths, metrics))
}

/// Per-frame fundamental frequency estimate via normalized autocorrelation.
/// `0.0` marks an unvoiced/silent frame.
fn pitch_contour(samples: &[f32], sample_rate: u32, frame_size: usize, hop_size: usize) -> Vec<f32> {
    let min_hz = 60.0f32;
    let max_hz = 400.0f32;
    let max_lag = (sample_rate as f32 / min_hz) as usize;
    let min_lag = (sample_rate as f32 / max_hz) as usize;

    let mut contour = Vec::new();
    let mut pos = 0usize;
    while pos + frame_size <= samples.len().max(frame_size) {
        let end = (pos + frame_size).min(samples.len());
        let frame = &samples[pos.min(samples.len())..end];
        contour.push(autocorrelation_pitch(frame, min_lag, max_lag, sample_rate as f32));
        pos += hop_size;
        if pos >= samples.len() {
            break;
        }
    }
    if contour.is_empty() {
        contour.push(0.0);
    }
    contour
}

fn autocorrelation_pitch(frame: &[f32], min_lag: usize, max_lag: usize, sample_rate: f32) -> f32 {
    if frame.len() < 4 {
        return 0.0;
    }
    let energy: f32 = frame.iter().map(|s| s * s).sum();
    if energy < 1e-6 {
        return 0.0;
    }

    let max_lag = max_lag.min(frame.len() - 1);
    if min_lag >= max_lag {
        return 0.0;
    }

    let mut best_lag = 0usize;
    let mut best_value = 0.0f32;
    for lag in min_lag..=max_lag {
        let mut sum = 0.0f32;
        for i in 0..(frame.len() - lag) {
            sum += frame[i] * frame[i + lag];
        }
        if sum > best_value {
            best_value = sum;
            best_lag = lag;
        }
    }

    if best_lag == 0 || best_value / energy < 0.1 {
        return 0.0;
    }
    sample_rate / best_lag as f32
}

/// Remaps a pitch contour (non-zero values only) linearly into `band`,
/// preserving relative shape. Unvoiced frames map to the band midpoint so
/// the synthesized tone never drops out.
fn remap_contour_to_band(contour: &[f32], band: (f32, f32)) -> Vec<f32> {
    let voiced: Vec<f32> = contour.iter().copied().filter(|&f| f > 0.0).collect();
    let (lo, hi) = band;
    if voiced.is_empty() {
        return vec![(lo + hi) / 2.0; contour.len()];
    }

    let src_lo = voiced.iter().cloned().fold(f32::INFINITY, f32::min);
    let src_hi = voiced.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
    let span = (src_hi - src_lo).max(1e-3);

    contour
        .iter()
        .map(|&f| {
            if f <= 0.0 {
                (lo + hi) / 2.0
            } else {
                let t = ((f - src_lo) / span).clamp(0.0, 1.0);
                lo + t * (hi - lo)
            }
        })
        .collect()
}

/// Per-frame magnitude of the `k`-th harmonic of the estimated fundamental,
/// one envelope trajectory per harmonic `1..=n_waves`.
fn harmonic_envelopes(
    samples: &[f32],
    sample_rate: u32,
    contour: &[f32],
    frame_size: usize,
    hop_size: usize,
    n_waves: usize,
) -> Vec<Vec<f32>> {
    let mut planner = FftPlanner::<f32>::new();
    let fft = planner.plan_fft_forward(frame_size);

    let mut envelopes = vec![Vec::with_capacity(contour.len()); n_waves];

    for (frame_idx, &f0) in contour.iter().enumerate() {
        let pos = frame_idx * hop_size;
        let mut buffer: Vec<Complex<f32>> = (0..frame_size)
            .map(|i| {
                let sample = samples.get(pos + i).copied().unwrap_or(0.0);
                let window = 0.5 - 0.5 * ((2.0 * PI as f32 * i as f32) / (frame_size as f32 - 1.0)).cos();
                Complex::new(sample * window, 0.0)
            })
            .collect();
        fft.process(&mut buffer);

        for (k, env) in envelopes.iter_mut().enumerate() {
            let harmonic_hz = f0 * (k + 1) as f32;
            let magnitude = if harmonic_hz <= 0.0 {
                0.0
            } else {
                let bin = ((harmonic_hz / sample_rate as f32) * frame_size as f32).round() as usize;
                buffer.get(bin.min(frame_size / 2)).map(|c| c.norm() / frame_size as f32).unwrap_or(0.0)
            };
            env.push(magnitude);
        }
    }

    envelopes
}

/// Synthesizes one harmonic's cosine wave at sample rate, linearly
/// interpolating both instantaneous frequency and amplitude envelope
/// between frame centers, integrating phase so frequency changes don't
/// introduce discontinuities.
fn synthesize_cosine(
    contour_hz: &[f32],
    envelope: &[f32],
    harmonic_number: f32,
    sample_rate: u32,
    hop_size: usize,
    total_samples: usize,
) -> Vec<f32> {
    let mut out = Vec::with_capacity(total_samples);
    let mut phase = 0.0f64;
    let sr = sample_rate as f64;

    for n in 0..total_samples {
        let frame_pos = n as f32 / hop_size as f32;
        let idx = frame_pos.floor() as usize;
        let frac = frame_pos - idx as f32;

        let freq = interpolate(contour_hz, idx, frac) * harmonic_number;
        let amp = interpolate(envelope, idx, frac);

        phase += 2.0 * PI * freq as f64 / sr;
        out.push((amp as f64 * phase.cos()) as f32);
    }

    out
}

fn interpolate(series: &[f32], idx: usize, frac: f32) -> f32 {
    if series.is_empty() {
        return 0.0;
    }
    let a = series[idx.min(series.len() - 1)];
    let b = series[(idx + 1).min(series.len() - 1)];
    a + (b - a) * frac
}

/// Frame-wise RMS ratio of original to synthetic mix, clipped to `[0, 10]`
/// so a near-silent synthetic mix doesn't blow up the gain.
fn gain_curve(original: &[f32], synthetic: &[f32], frame_size: usize, hop_size: usize) -> Vec<f32> {
    let mut gains = Vec::new();
    let mut pos = 0usize;
    while pos < original.len() {
        let end = (pos + frame_size).min(original.len());
        let orig_rms = rms(&original[pos..end]);
        let synth_rms = rms(&synthetic[pos.min(synthetic.len())..end.min(synthetic.len())]);
        let gain = if synth_rms > 1e-6 { (orig_rms / synth_rms).clamp(0.0, 10.0) } else { 0.0 };
        gains.push(gain);
        pos += hop_size;
    }
    if gains.is_empty() {
        gains.push(1.0);
    }
    gains
}

fn apply_gain_curve(mix: &mut [f32], gains: &[f32], hop_size: usize) {
    for (n, sample) in mix.iter_mut().enumerate() {
        let idx = n / hop_size;
        let frac = (n % hop_size) as f32 / hop_size as f32;
        let gain = interpolate(gains, idx, frac);
        *sample *= gain;
    }
}

fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    (samples.iter().map(|s| s * s).sum::<f32>() / samples.len() as f32).sqrt()
}

fn quality_metrics(original: &[f32], synthetic: &[f32], frame_size: usize, hop_size: usize) -> QualityMetrics {
    let n = original.len().min(synthetic.len());
    if n == 0 {
        return QualityMetrics::default();
    }

    let mse: f64 = (0..n).map(|i| (original[i] as f64 - synthetic[i] as f64).powi(2)).sum::<f64>() / n as f64;
    let rmse = mse.sqrt();

    let orig_range = {
        let max = original[..n].iter().cloned().fold(f32::NEG_INFINITY, f32::max) as f64;
        let min = original[..n].iter().cloned().fold(f32::INFINITY, f32::min) as f64;
        (max - min).max(1e-9)
    };
    let nrmse = rmse / orig_range;

    let signal_power: f64 = original[..n].iter().map(|s| (*s as f64).powi(2)).sum::<f64>() / n as f64;
    let noise_power: f64 = (0..n)
        .map(|i| (original[i] as f64 - synthetic[i] as f64).powi(2))
        .sum::<f64>()
        / n as f64;
    let snr_db = if noise_power > 1e-12 { 10.0 * (signal_power / noise_power).log10() } else { 100.0 };

    let orig_env = frame_rms_series(&original[..n], frame_size, hop_size);
    let synth_env = frame_rms_series(&synthetic[..n], frame_size, hop_size);
    let env_corr = pearson_correlation(&orig_env, &synth_env);

    QualityMetrics { rmse, nrmse, snr_db, env_corr }
}

fn frame_rms_series(samples: &[f32], frame_size: usize, hop_size: usize) -> Vec<f64> {
    let mut out = Vec::new();
    let mut pos = 0usize;
    while pos < samples.len() {
        let end = (pos + frame_size).min(samples.len());
        out.push(rms(&samples[pos..end]) as f64);
        pos += hop_size;
    }
    out
}

fn pearson_correlation(a: &[f64], b: &[f64]) -> f64 {
    let n = a.len().min(b.len());
    if n < 2 {
        return 0.0;
    }
    let mean_a = a[..n].iter().sum::<f64>() / n as f64;
    let mean_b = b[..n].iter().sum::<f64>() / n as f64;

    let mut cov = 0.0;
    let mut var_a = 0.0;
    let mut var_b = 0.0;
    for i in 0..n {
        let da = a[i] - mean_a;
        let db = b[i] - mean_b;
        cov += da * db;
        var_a += da * da;
        var_b += db * db;
    }
    if var_a < 1e-12 || var_b < 1e-12 {
        return 0.0;
    }
    cov / (var_a.sqrt() * var_b.sqrt())
}
