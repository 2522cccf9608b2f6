#![allow(non_snake_case)]

//! Scalar optical diffraction: free-space propagation of complex wavefronts
//! through three FFT-based regimes, sampling-grid sizing, stacked
//! distance/wavelength sweeps, and IFTA phase retrieval for designing
//! diffractive optical elements.
//!
//! All lengths (wavelength, sampling pitch, propagation distance) share one
//! caller-defined unit system; the tests and demos use micrometers.

use ndarray::{s, Array2, Zip};
use num_complex::Complex;

mod error;
mod fft2;

pub mod aperture;
pub mod grid;
pub mod ifta;
pub mod propagation;
pub mod source;
pub mod sweep;

pub use error::{DiffractionError, Result};

/// A complex scalar field sampled at a given pitch.
///
/// The squared norm of the values is the irradiance; the physical window is
/// `shape * pitch`.
#[derive(Clone, Debug)]
pub struct Field {
    pub values: Array2<Complex<f64>>,
    pub pitch: f64,
}

impl Field {
    /// Per-sample irradiance |U|².
    pub fn intensity(&self) -> Array2<f64> {
        self.values.map(|e| e.norm_sqr())
    }

    /// Area weighted sum of the squared norm of the field.
    ///
    /// This is the conserved radiant flux; propagation regimes that change
    /// the output pitch trade sample density against sample area here.
    pub fn intensity_integral(&self) -> f64 {
        self.values.iter().fold(0.0, |sum, v| sum + v.norm_sqr()) * (self.pitch * self.pitch)
    }

    /// Physical extent of the sampled window, (height, width).
    pub fn extent(&self) -> (f64, f64) {
        (
            self.values.shape()[0] as f64 * self.pitch,
            self.values.shape()[1] as f64 * self.pitch,
        )
    }

    /// Embeds the field centered in a larger zero window at the same pitch.
    pub fn zero_padded(&self, shape: (usize, usize)) -> Result<Field> {
        let h = self.values.shape()[0];
        let w = self.values.shape()[1];
        if shape.0 < h || shape.1 < w {
            return Err(error::parameter(format!(
                "zero pad target {:?} is smaller than the field {:?}",
                shape,
                (h, w)
            )));
        }
        let r0 = (shape.0 - h) / 2;
        let c0 = (shape.1 - w) / 2;
        let mut values = Array2::zeros(shape);
        values.slice_mut(s![r0..r0 + h, c0..c0 + w]).assign(&self.values);
        Ok(Field {
            values,
            pitch: self.pitch,
        })
    }
}

/// Applies an aperture mask to an illumination source, element-wise.
pub fn illuminate(source: &Field, aperture: &Field) -> Result<Field> {
    if source.values.shape() != aperture.values.shape() {
        return Err(DiffractionError::ShapeMismatch {
            left: (source.values.shape()[0], source.values.shape()[1]),
            right: (aperture.values.shape()[0], aperture.values.shape()[1]),
        });
    }
    if source.pitch != aperture.pitch {
        return Err(error::parameter(format!(
            "source pitch {} differs from aperture pitch {}",
            source.pitch, aperture.pitch
        )));
    }
    Ok(Field {
        values: &source.values * &aperture.values,
        pitch: source.pitch,
    })
}

/// Applies `f` to every element with its coordinates relative to the array
/// center (H/2, W/2), scaled by the given per-axis step.
pub(crate) fn centered_par_iter<F: Fn((f64, f64), &mut Complex<f64>) + Sync>(
    array: &mut Array2<Complex<f64>>,
    (dh, dw): (f64, f64),
    f: F,
) {
    let h = array.shape()[0];
    let w = array.shape()[1];
    Zip::indexed(array).par_for_each(|(y, x), e| {
        let y = (y as f64 - (h / 2) as f64) * dh;
        let x = (x as f64 - (w / 2) as f64) * dw;
        f((y, x), e)
    });
}
