//! Illumination source generators.

use crate::error::{parameter, Result};
use crate::{aperture, centered_par_iter, Field};
use ndarray::Array2;
use num_complex::Complex;
use std::f64::consts::PI;

/// Uniform plane wave over a centered rectangular support.
pub fn plane_wave(shape: (usize, usize), size: (f64, f64), pitch: f64) -> Result<Field> {
    aperture::rectangular(shape, size, pitch)
}

/// Gaussian beam profile `exp(-2 r² / w0²)` with waist radius `waist`.
pub fn gaussian_beam(shape: (usize, usize), waist: f64, pitch: f64) -> Result<Field> {
    if shape.0 == 0 || shape.1 == 0 {
        return Err(parameter("source window must be non-empty"));
    }
    if !(waist > 0.0) || !(pitch > 0.0) {
        return Err(parameter(format!(
            "beam waist and pitch must be positive, got {} and {}",
            waist, pitch
        )));
    }
    let inv_w_sqr = 1.0 / (waist * waist);
    let mut values = Array2::zeros(shape);
    centered_par_iter(&mut values, (pitch, pitch), |(y, x), e| {
        *e = Complex::new((-2.0 * (x * x + y * y) * inv_w_sqr).exp(), 0.0);
    });
    Ok(Field { values, pitch })
}

/// Unit-amplitude spherical wave converging toward a focus at the given
/// distance, `exp(-i π (x² + y²) / (f λ))`.
pub fn converging_spherical(
    shape: (usize, usize),
    wavelength: f64,
    focal_length: f64,
    pitch: f64,
) -> Result<Field> {
    if shape.0 == 0 || shape.1 == 0 {
        return Err(parameter("source window must be non-empty"));
    }
    if !(wavelength > 0.0) || !(focal_length > 0.0) || !(pitch > 0.0) {
        return Err(parameter(format!(
            "wavelength, focal length and pitch must be positive, got {}, {}, {}",
            wavelength, focal_length, pitch
        )));
    }
    let alpha = PI / (focal_length * wavelength);
    let mut values = Array2::zeros(shape);
    centered_par_iter(&mut values, (pitch, pitch), |(y, x), e| {
        *e = Complex::new(0.0, -alpha * (x * x + y * y)).exp();
    });
    Ok(Field { values, pitch })
}
