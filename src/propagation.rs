//! Free-space propagation of a complex field through three FFT-based regimes.
//!
//! Regime selection is an explicit branch on two precomputed distance
//! thresholds; every function returns the complex output field together with
//! its output sampling pitch. Intensity is derived by callers via
//! [`Field::intensity`].

use crate::error::{parameter, Result};
use crate::fft2::{fft2, fft2c, ifft2};
use crate::{centered_par_iter, DiffractionError, Field};
use ndarray::Zip;
use num_complex::Complex;
use std::f64::consts::PI;

/// The three validity regimes of scalar propagation over a sampled grid.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Regime {
    /// Exact transfer-function propagation, `|z| < z_limit`.
    AngularSpectrum,
    /// Single-FFT Fresnel method, `z_limit <= |z| < z_fraunhofer`.
    FresnelFarField,
    /// Single Fourier transform, `|z| >= z_fraunhofer`.
    Fraunhofer,
}

/// Distance thresholds separating the regimes for an N-sample grid.
#[derive(Clone, Copy, Debug)]
pub struct Thresholds {
    /// Fresnel-number boundary `N * dx² / λ` between near and far field.
    pub z_limit: f64,
    /// `(N * dx)² / λ`, beyond which the quadratic input phase is negligible.
    pub z_fraunhofer: f64,
}

pub fn thresholds(n: usize, pitch: f64, wavelength: f64) -> Thresholds {
    let window = n as f64 * pitch;
    Thresholds {
        z_limit: window * pitch / wavelength,
        z_fraunhofer: window * window / wavelength,
    }
}

impl Regime {
    pub fn select(n: usize, pitch: f64, wavelength: f64, z: f64) -> Regime {
        let t = thresholds(n, pitch, wavelength);
        if z.abs() < t.z_limit {
            Regime::AngularSpectrum
        } else if z.abs() < t.z_fraunhofer {
            Regime::FresnelFarField
        } else {
            Regime::Fraunhofer
        }
    }
}

/// Output-plane sampling pitch of the far-field methods, `λ|z| / (N dx)`.
pub fn pixout(n: usize, pitch: f64, wavelength: f64, z: f64) -> f64 {
    wavelength * z.abs() / (n as f64 * pitch)
}

fn validate(U0: &Field, wavelength: f64) -> Result<usize> {
    let h = U0.values.shape()[0];
    let w = U0.values.shape()[1];
    if h != w || h == 0 {
        return Err(parameter(format!(
            "propagation input must be square and non-empty, got {:?}",
            (h, w)
        )));
    }
    if !(U0.pitch > 0.0) || !U0.pitch.is_finite() {
        return Err(parameter(format!("sampling pitch must be positive, got {}", U0.pitch)));
    }
    if !(wavelength > 0.0) || !wavelength.is_finite() {
        return Err(parameter(format!("wavelength must be positive, got {}", wavelength)));
    }
    Ok(h)
}

/// Propagates by the regime the distance falls in.
pub fn propagate(U0: &Field, wavelength: f64, z: f64) -> Result<Field> {
    let n = validate(U0, wavelength)?;
    let regime = Regime::select(n, U0.pitch, wavelength, z);
    let t = thresholds(n, U0.pitch, wavelength);
    log::debug!(
        "propagate N={} dx={} lambda={} z={}: {:?} (z_limit={:.3e}, z_fraunhofer={:.3e})",
        n, U0.pitch, wavelength, z, regime, t.z_limit, t.z_fraunhofer
    );
    match regime {
        Regime::AngularSpectrum => angular_spectrum(U0, wavelength, z),
        Regime::FresnelFarField => fresnel_far_field(U0, wavelength, z),
        Regime::Fraunhofer => fraunhofer(U0, wavelength, z),
    }
}

/// Unshifted FFT frequency coordinate for index `i` of an N-sample axis.
fn fft_freq(i: usize, n: usize, step: f64) -> f64 {
    if i < (n + 1) / 2 {
        i as f64 * step
    } else {
        (i as f64 - n as f64) * step
    }
}

/// Exact transfer-function propagation, valid at any distance and its own
/// inverse under `z -> -z`.
///
/// The spectrum is multiplied by `exp(i 2π z sqrt(1/λ² - fx² - fy²))` on the
/// un-shifted frequency grid. Evanescent components (negative sqrt argument)
/// have the argument clamped to zero rather than growing a real exponential.
/// The output pitch is unchanged.
pub fn angular_spectrum(U0: &Field, wavelength: f64, z: f64) -> Result<Field> {
    let n = validate(U0, wavelength)?;
    let f_step = 1.0 / (n as f64 * U0.pitch);
    let inv_lambda_sqr = 1.0 / (wavelength * wavelength);

    let mut spectrum = fft2(U0.values.clone());
    Zip::indexed(&mut spectrum).par_for_each(|(r, c), e| {
        let fy = fft_freq(r, n, f_step);
        let fx = fft_freq(c, n, f_step);
        let kz = (inv_lambda_sqr - fy * fy - fx * fx).max(0.0).sqrt();
        *e = *e * Complex::new(0.0, 2.0 * PI * z * kz).exp();
    });

    Ok(Field {
        values: ifft2(spectrum),
        pitch: U0.pitch,
    })
}

/// Single-FFT Fresnel far-field method (chirp, transform, chirp).
///
/// Signals [`DiffractionError::RegimeViolation`] below `z_limit`, where the
/// input chirp aliases and the method is invalid.
pub fn fresnel_far_field(U0: &Field, wavelength: f64, z: f64) -> Result<Field> {
    let n = validate(U0, wavelength)?;
    let t = thresholds(n, U0.pitch, wavelength);
    if z.abs() < t.z_limit {
        return Err(DiffractionError::RegimeViolation {
            z: z.abs(),
            z_limit: t.z_limit,
        });
    }
    let pix = pixout(n, U0.pitch, wavelength, z);

    let alpha_in = PI * U0.pitch * U0.pitch / (wavelength * z);
    let mut U1 = U0.values.clone();
    centered_par_iter(&mut U1, (1.0, 1.0), |(m, l), e| {
        *e = *e * Complex::new(0.0, alpha_in * (m * m + l * l)).exp();
    });

    let mut U2 = fft2c(U1);

    let alpha_out = PI * pix * pix / (wavelength * z);
    centered_par_iter(&mut U2, (1.0, 1.0), |(m, l), e| {
        *e = *e * Complex::new(0.0, alpha_out * (m * m + l * l)).exp();
    });

    Ok(Field {
        values: U2,
        pitch: pix,
    })
}

/// Fraunhofer approximation: the infinite-distance limit, a single centered
/// Fourier transform. The distance only enters the output-pitch bookkeeping.
pub fn fraunhofer(U0: &Field, wavelength: f64, z: f64) -> Result<Field> {
    let n = validate(U0, wavelength)?;
    let t = thresholds(n, U0.pitch, wavelength);
    if z.abs() < t.z_limit {
        return Err(DiffractionError::RegimeViolation {
            z: z.abs(),
            z_limit: t.z_limit,
        });
    }
    Ok(Field {
        values: fft2c(U0.values.clone()),
        pitch: pixout(n, U0.pitch, wavelength, z),
    })
}

#[cfg(test)]
mod tests {
    use super::{
        angular_spectrum, fraunhofer, fresnel_far_field, pixout, propagate, thresholds, Regime,
    };
    use crate::{source, DiffractionError, Field};
    use approx::assert_relative_eq;

    const LAMBDA: f64 = 0.633;

    fn gaussian(n: usize, waist: f64) -> Field {
        source::gaussian_beam((n, n), waist, 1.0).unwrap()
    }

    fn squared_norm_sum(field: &Field) -> f64 {
        field.values.iter().map(|e| e.norm_sqr()).sum()
    }

    #[test]
    fn thresholds_and_pixout_for_a_512_grid() {
        // circular aperture scenario: N = 512, dx = 1 µm, λ = 0.633 µm
        let t = thresholds(512, 1.0, LAMBDA);
        assert_relative_eq!(t.z_limit, 808.85, max_relative = 1e-3);
        assert_relative_eq!(t.z_fraunhofer, 414_092.0, max_relative = 1e-3);

        assert_eq!(Regime::select(512, 1.0, LAMBDA, 500.0), Regime::AngularSpectrum);
        assert_eq!(Regime::select(512, 1.0, LAMBDA, 1.0e5), Regime::FresnelFarField);
        assert_eq!(Regime::select(512, 1.0, LAMBDA, 1.0e6), Regime::Fraunhofer);

        assert_relative_eq!(pixout(512, 1.0, LAMBDA, 1.0e6), 1236.3, max_relative = 1e-3);
    }

    #[test]
    fn dispatch_uses_the_output_pitch_of_the_regime() {
        let beam = gaussian(64, 10.0);
        // near field leaves the pitch alone
        let near = propagate(&beam, LAMBDA, 50.0).unwrap();
        assert_relative_eq!(near.pitch, 1.0);
        // far field reports the pixout pitch
        let far = propagate(&beam, LAMBDA, 1.0e4).unwrap();
        assert_relative_eq!(far.pitch, LAMBDA * 1.0e4 / 64.0, max_relative = 1e-12);
    }

    #[test]
    fn angular_spectrum_round_trips() {
        let beam = gaussian(64, 10.0);
        let forward = angular_spectrum(&beam, LAMBDA, 30.0).unwrap();
        let back = angular_spectrum(&forward, LAMBDA, -30.0).unwrap();

        let max_diff = beam
            .values
            .iter()
            .zip(back.values.iter())
            .map(|(a, b)| (a - b).norm())
            .fold(0.0, f64::max);
        assert!(max_diff < 1e-10, "max_diff = {}", max_diff);
    }

    #[test]
    fn angular_spectrum_is_unitary() {
        let beam = gaussian(64, 10.0);
        let before = squared_norm_sum(&beam);
        let after = squared_norm_sum(&angular_spectrum(&beam, LAMBDA, 80.0).unwrap());
        assert_relative_eq!(before, after, max_relative = 1e-9);
    }

    #[test]
    fn far_field_power_scales_with_the_pitch_ratio() {
        let beam = gaussian(128, 20.0);
        let z = 1.0e5;
        let far = fresnel_far_field(&beam, LAMBDA, z).unwrap();
        let ratio = far.pitch / beam.pitch;
        assert_relative_eq!(
            far.intensity_integral(),
            beam.intensity_integral() * ratio * ratio,
            max_relative = 1e-9
        );
    }

    #[test]
    fn fresnel_rejects_near_field_distances() {
        let beam = gaussian(64, 10.0);
        let t = thresholds(64, 1.0, LAMBDA);
        match fresnel_far_field(&beam, LAMBDA, t.z_limit * 0.5) {
            Err(DiffractionError::RegimeViolation { z, z_limit }) => {
                assert!(z < z_limit);
            }
            other => panic!("expected regime violation, got {:?}", other.map(|f| f.pitch)),
        }
        assert!(fraunhofer(&beam, LAMBDA, t.z_limit * 0.5).is_err());
    }

    #[test]
    fn regimes_agree_at_the_near_far_boundary() {
        // a smooth beam straddling z_limit; at the boundary the output pitches
        // of the two methods coincide, so the intensities compare directly
        let beam = gaussian(256, 40.0);
        let t = thresholds(256, 1.0, LAMBDA);

        let near = angular_spectrum(&beam, LAMBDA, t.z_limit * 0.999).unwrap();
        let far = fresnel_far_field(&beam, LAMBDA, t.z_limit * 1.001).unwrap();
        assert_relative_eq!(far.pitch, near.pitch, max_relative = 2e-3);

        let i_near = near.intensity();
        let i_far = far.intensity();
        let diff_sqr: f64 = i_near
            .iter()
            .zip(i_far.iter())
            .map(|(a, b)| (a - b) * (a - b))
            .sum();
        let norm_sqr: f64 = i_near.iter().map(|a| a * a).sum();
        let relative_l2 = (diff_sqr / norm_sqr).sqrt();
        assert!(relative_l2 < 0.1, "relative L2 difference {}", relative_l2);
    }

    #[test]
    fn non_square_input_is_rejected() {
        let field = Field {
            values: ndarray::Array2::from_elem((32, 16), num_complex::Complex::new(1.0, 0.0)),
            pitch: 1.0,
        };
        assert!(propagate(&field, LAMBDA, 100.0).is_err());
    }
}
