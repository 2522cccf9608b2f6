//! Iterative Fourier Transform Algorithm: designs a phase screen whose
//! far-field reconstruction reproduces a target intensity image.
//!
//! Two sequential phases: continuous-phase projections, then projections with
//! scheduled amplitude and phase quantization. Iteration counts are the sole
//! termination condition.

use crate::error::{parameter, Result};
use crate::fft2::{fft2c, ifft2c};
use crate::DiffractionError;
use ndarray::{s, Array2, Array3, Zip};
use num_complex::Complex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::f64::consts::PI;

/// Initial image-plane phase: either drawn uniformly at random from a seeded
/// generator, or a previously computed screen used as a warm start.
#[derive(Clone, Debug)]
pub enum Seed {
    Random(u64),
    Warm(Array2<f64>),
}

#[derive(Clone, Debug)]
pub struct IftaConfig {
    /// Image-plane window; the target is embedded centered, amplitude outside
    /// it stays free. Defaults to the target shape.
    pub image_size: Option<(usize, usize)>,
    /// Continuous-phase iterations.
    pub n_iter_ph1: usize,
    /// Quantized iterations, run only when `n_levels != 0`.
    pub n_iter_ph2: usize,
    /// Reinforcement factor (>= 1) applied to the target amplitude inside the
    /// ROI, compensating for energy leaking outside it.
    pub rfact: f64,
    /// Number of evenly spaced phase levels; 0 disables quantization.
    pub n_levels: usize,
    pub seed: Seed,
    pub compute_efficiency: bool,
    pub compute_uniformity: bool,
}

impl Default for IftaConfig {
    fn default() -> IftaConfig {
        IftaConfig {
            image_size: None,
            n_iter_ph1: 25,
            n_iter_ph2: 25,
            rfact: 1.2,
            n_levels: 0,
            seed: Seed::Random(0),
            compute_efficiency: false,
            compute_uniformity: false,
        }
    }
}

/// Everything an IFTA run produces; the metric series are present exactly
/// when their flags were set.
#[derive(Clone, Debug)]
pub struct IftaResult {
    /// Hologram phase screens, one per iteration plus the seed at row 0.
    /// Shape `(n_iter_ph1 + n_iter_ph2 + 1, H, W)` when quantizing, else
    /// `(n_iter_ph1 + 1, H, W)`. Angles are kept in `(-π, π]`.
    pub phase_history: Array3<f64>,
    pub efficiency: Option<Vec<f64>>,
    pub uniformity: Option<Vec<f64>>,
}

/// Runs the algorithm on a target intensity image.
///
/// The optional callback receives integer percent-complete after each
/// iteration, monotonically non-decreasing.
pub fn ifta(
    target: &Array2<f64>,
    config: &IftaConfig,
    mut progress: Option<&mut dyn FnMut(u32)>,
) -> Result<IftaResult> {
    let target_size = (target.shape()[0], target.shape()[1]);
    if target_size.0 == 0 || target_size.1 == 0 {
        return Err(parameter("target image must be non-empty"));
    }
    if target.iter().any(|&v| v < 0.0 || !v.is_finite()) {
        return Err(parameter("target intensity must be non-negative and finite"));
    }
    if !(config.rfact >= 1.0) {
        return Err(parameter(format!(
            "reinforcement factor must be >= 1, got {}",
            config.rfact
        )));
    }

    let image_size = config.image_size.unwrap_or(target_size);
    if image_size.0 < target_size.0 || image_size.1 < target_size.1 {
        return Err(parameter(format!(
            "image window {:?} is smaller than the target {:?}",
            image_size, target_size
        )));
    }
    // ROI: target embedded centered in the image window
    let r0 = image_size.0 / 2 - target_size.0 / 2;
    let c0 = image_size.1 / 2 - target_size.1 / 2;
    let (th, tw) = target_size;

    let target_amp = target.mapv(f64::sqrt);
    let reinforced = &target_amp * config.rfact;

    let mut image_amp = Array2::<f64>::zeros(image_size);
    image_amp
        .slice_mut(s![r0..r0 + th, c0..c0 + tw])
        .assign(&target_amp);

    let image_phase = match &config.seed {
        Seed::Random(seed) => {
            let mut rng = StdRng::seed_from_u64(*seed);
            Array2::from_shape_fn(image_size, |_| PI * (1.0 - 2.0 * rng.gen::<f64>()))
        }
        Seed::Warm(phase) => {
            if phase.shape() != [image_size.0, image_size.1] {
                return Err(DiffractionError::ShapeMismatch {
                    left: (phase.shape()[0], phase.shape()[1]),
                    right: image_size,
                });
            }
            phase.clone()
        }
    };

    let quantizing = config.n_levels != 0;
    let total_iters = config.n_iter_ph1 + if quantizing { config.n_iter_ph2 } else { 0 };
    let screens = total_iters + 1;

    let mut history = Array3::zeros((screens, image_size.0, image_size.1));
    history.slice_mut(s![0, .., ..]).assign(&image_phase);

    let mut efficiency = if config.compute_efficiency {
        Some(Vec::with_capacity(total_iters))
    } else {
        None
    };
    let mut uniformity = if config.compute_uniformity {
        Some(Vec::with_capacity(total_iters))
    } else {
        None
    };

    let mut image_field = from_amp_phase(&image_amp, &image_phase);
    // from here on image_amp only feeds the metric collaborators, which read
    // it as the ROI support; like each projection it carries the reinforced
    // target inside the window and zero outside
    image_amp
        .slice_mut(s![r0..r0 + th, c0..c0 + tw])
        .assign(&reinforced);
    let mut cont = 0;

    // First loop: continuous phase screens under the no-loss constraint
    for _ in 0..config.n_iter_ph1 {
        cont += 1;
        let holo_field = ifft2c(image_field);
        let holo_phase = holo_field.mapv(|e| e.arg());
        history.slice_mut(s![cont, .., ..]).assign(&holo_phase);

        let holo_unit = holo_phase.mapv(|p| Complex::new(0.0, p).exp());
        image_field = apply_image_constraint(&fft2c(holo_unit), &reinforced, r0, c0);

        record_metrics(&holo_phase, &image_amp, &mut efficiency, &mut uniformity);
        if let Some(cb) = progress.as_mut() {
            cb((cont * 100 / total_iters) as u32);
        }
    }

    // Second loop: scheduled amplitude and phase quantization
    if quantizing {
        log::debug!(
            "quantizing to {} levels over {} iterations",
            config.n_levels,
            config.n_iter_ph2
        );
        let deltas = linspace(0.0, PI / config.n_levels as f64, config.n_iter_ph2);
        for k in 1..=config.n_iter_ph2 {
            cont += 1;
            let holo_field = ifft2c(image_field);
            let holo_amp = amp_discretization(&holo_field, k);
            let holo_phase = pha_discretization(&holo_field, config.n_levels, deltas[k - 1]);
            history.slice_mut(s![cont, .., ..]).assign(&holo_phase);

            image_field = fft2c(from_amp_phase(&holo_amp, &holo_phase));
            image_field = apply_image_constraint(&image_field, &reinforced, r0, c0);

            record_metrics(&holo_phase, &image_amp, &mut efficiency, &mut uniformity);
            if let Some(cb) = progress.as_mut() {
                cb((cont * 100 / total_iters) as u32);
            }
        }
    }

    Ok(IftaResult {
        phase_history: history,
        efficiency,
        uniformity,
    })
}

/// Amplitude schedule: saturates everything above `max / (1.2 + 12/k)` to one
/// and scales the rest linearly, tightening toward a uniform hologram as the
/// iteration count grows.
pub fn amp_discretization(holo_field: &Array2<Complex<f64>>, iteration: usize) -> Array2<f64> {
    let max = holo_field.iter().fold(0.0, |m: f64, e| m.max(e.norm()));
    if max == 0.0 {
        return Array2::zeros(holo_field.raw_dim());
    }
    let top = max / (1.2 + 12.0 / iteration as f64);
    holo_field.mapv(|e| {
        let a = e.norm();
        if a <= top {
            a / top
        } else {
            1.0
        }
    })
}

/// Progressive phase quantization: snaps to the nearest of `n_levels` evenly
/// spaced levels, but only where the distance to it is below `delta_phase`.
pub fn pha_discretization(
    holo_field: &Array2<Complex<f64>>,
    n_levels: usize,
    delta_phase: f64,
) -> Array2<f64> {
    let phanorm = 2.0 * PI / n_levels as f64;
    let tolerance = delta_phase / phanorm;
    holo_field.mapv(|e| {
        let pha = e.arg();
        let q = pha.rem_euclid(2.0 * PI) / phanorm;
        let qi = q.round();
        if (q - qi).abs() < tolerance {
            wrap_angle(phanorm * qi)
        } else {
            pha
        }
    })
}

/// One-shot nearest-level rounding, no tolerance.
pub fn discretize_phase(phase: &Array2<f64>, n_levels: usize) -> Array2<f64> {
    let phanorm = 2.0 * PI / n_levels as f64;
    phase.mapv(|p| wrap_angle(phanorm * (p.rem_euclid(2.0 * PI) / phanorm).round()))
}

/// Fraction of the reconstructed-image energy landing inside the ROI support,
/// for a unit-amplitude hologram carrying the given phase.
pub fn compute_efficiency(holo_phase: &Array2<f64>, image_amp: &Array2<f64>) -> f64 {
    let intensity = reconstruction_intensity(holo_phase);
    let mut inside = 0.0;
    let mut total = 0.0;
    Zip::from(&intensity).and(image_amp).for_each(|&i, &a| {
        total += i;
        if a > 0.0 {
            inside += i;
        }
    });
    if total > 0.0 {
        inside / total
    } else {
        0.0
    }
}

/// Peak-to-peak contrast `(max - min) / (max + min)` of the reconstructed
/// intensity over the lit target cells; 0 for a perfectly uniform pattern.
pub fn compute_uniformity(holo_phase: &Array2<f64>, image_amp: &Array2<f64>) -> f64 {
    let intensity = reconstruction_intensity(holo_phase);
    let mut min = f64::INFINITY;
    let mut max = 0.0;
    Zip::from(&intensity).and(image_amp).for_each(|&i, &a| {
        if a > 0.0 {
            min = min.min(i);
            max = f64::max(max, i);
        }
    });
    if max + min > 0.0 {
        (max - min) / (max + min)
    } else {
        0.0
    }
}

/// Image-domain projection: forces the reinforced target amplitude inside the
/// ROI and keeps the transform's own amplitude everywhere else (amplitude
/// freedom — energy leaking outside the window is tolerated, not zeroed, and
/// the reinforcement factor compensates for it inside).
fn apply_image_constraint(
    image_field: &Array2<Complex<f64>>,
    reinforced: &Array2<f64>,
    r0: usize,
    c0: usize,
) -> Array2<Complex<f64>> {
    let image_phase = image_field.mapv(|e| e.arg());
    let mut image_amp = image_field.mapv(|e| e.norm());
    image_amp
        .slice_mut(s![
            r0..r0 + reinforced.shape()[0],
            c0..c0 + reinforced.shape()[1]
        ])
        .assign(reinforced);
    from_amp_phase(&image_amp, &image_phase)
}

fn reconstruction_intensity(holo_phase: &Array2<f64>) -> Array2<f64> {
    fft2c(holo_phase.mapv(|p| Complex::new(0.0, p).exp())).mapv(|e| e.norm_sqr())
}

fn record_metrics(
    holo_phase: &Array2<f64>,
    image_amp: &Array2<f64>,
    efficiency: &mut Option<Vec<f64>>,
    uniformity: &mut Option<Vec<f64>>,
) {
    if let Some(series) = efficiency.as_mut() {
        series.push(compute_efficiency(holo_phase, image_amp));
    }
    if let Some(series) = uniformity.as_mut() {
        series.push(compute_uniformity(holo_phase, image_amp));
    }
}

fn from_amp_phase(amp: &Array2<f64>, phase: &Array2<f64>) -> Array2<Complex<f64>> {
    let mut out = Array2::zeros(amp.raw_dim());
    Zip::from(&mut out)
        .and(amp)
        .and(phase)
        .par_for_each(|o, &a, &p| *o = a * Complex::new(0.0, p).exp());
    out
}

/// Wraps an angle into `(-π, π]`.
fn wrap_angle(x: f64) -> f64 {
    let y = x.rem_euclid(2.0 * PI);
    if y > PI {
        y - 2.0 * PI
    } else {
        y
    }
}

fn linspace(start: f64, end: f64, n: usize) -> Vec<f64> {
    if n == 1 {
        return vec![start];
    }
    (0..n)
        .map(|i| start + (end - start) * i as f64 / (n - 1) as f64)
        .collect()
}
