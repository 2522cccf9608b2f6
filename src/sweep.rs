//! Distance and wavelength sweeps: repeated propagation over a sampled range,
//! with every frame resampled onto one fixed output grid at a single
//! reference pitch so the stacked result is viewable at a consistent scale.

use crate::error::{parameter, Result};
use crate::propagation::propagate;
use crate::Field;
use ndarray::{s, Array2, Array3, Zip};
use num_complex::Complex;

/// Cap on the number of frames a sweep may enumerate; larger requests fail
/// before any propagation happens.
pub const MAX_SWEEP_FRAMES: usize = 100;

/// An end-exclusive range of the swept variable.
#[derive(Clone, Copy, Debug)]
pub struct SweepPlan {
    pub start: f64,
    pub end: f64,
    pub step: f64,
}

impl SweepPlan {
    /// Enumerates `start + i * step` for `i` in `0..ceil((end - start) / step)`.
    pub fn samples(&self) -> Result<Vec<f64>> {
        if !(self.step > 0.0) || !self.step.is_finite() {
            return Err(parameter(format!("sweep step must be positive, got {}", self.step)));
        }
        if !(self.end > self.start) {
            return Err(parameter(format!(
                "sweep end {} must be greater than start {}",
                self.end, self.start
            )));
        }
        let count = ((self.end - self.start) / self.step).ceil() as usize;
        if count > MAX_SWEEP_FRAMES {
            return Err(parameter(format!(
                "sweep of {} frames exceeds the cap of {}",
                count, MAX_SWEEP_FRAMES
            )));
        }
        Ok((0..count).map(|i| self.start + i as f64 * self.step).collect())
    }
}

/// A stack of propagated frames on a common grid.
///
/// `frames`, `samplings` and `values` always have the same leading length;
/// every entry of `samplings` is the reference pitch the frames were brought
/// to.
#[derive(Clone, Debug)]
pub struct SweepResult {
    pub frames: Array3<Complex<f64>>,
    pub samplings: Vec<f64>,
    pub values: Vec<f64>,
}

/// Propagates `base` to each distance in the plan at a fixed wavelength.
pub fn sweep_distance(
    base: &Field,
    wavelength: f64,
    plan: SweepPlan,
    output_shape: (usize, usize),
    progress: Option<&mut dyn FnMut(u32)>,
) -> Result<SweepResult> {
    run_sweep(plan, output_shape, progress, |z| propagate(base, wavelength, z))
}

/// Propagates `base` at each wavelength in the plan to a fixed distance.
pub fn sweep_wavelength(
    base: &Field,
    z: f64,
    plan: SweepPlan,
    output_shape: (usize, usize),
    progress: Option<&mut dyn FnMut(u32)>,
) -> Result<SweepResult> {
    run_sweep(plan, output_shape, progress, |lambda| propagate(base, lambda, z))
}

fn run_sweep<F>(
    plan: SweepPlan,
    output_shape: (usize, usize),
    mut progress: Option<&mut dyn FnMut(u32)>,
    mut step_fn: F,
) -> Result<SweepResult>
where
    F: FnMut(f64) -> Result<Field>,
{
    if output_shape.0 == 0 || output_shape.1 == 0 {
        return Err(parameter("sweep output shape must be non-empty"));
    }
    let values = plan.samples()?;
    let count = values.len();

    let mut frames = Array3::zeros((count, output_shape.0, output_shape.1));
    let mut samplings = Vec::with_capacity(count);
    let mut ref_pitch = None;
    for (i, &value) in values.iter().enumerate() {
        // a failing sample aborts the whole sweep; a partial volume at
        // inconsistent scales is worse than no result
        let frame = step_fn(value)?;
        let reference = *ref_pitch.get_or_insert(frame.pitch);
        let resampled = resample_to(&frame, reference, output_shape);
        frames.slice_mut(s![i, .., ..]).assign(&resampled.values);
        samplings.push(reference);
        log::debug!("sweep frame {}/{} at {} (pitch {})", i + 1, count, value, frame.pitch);
        if let Some(cb) = progress.as_mut() {
            cb(((i + 1) * 100 / count) as u32);
        }
    }

    Ok(SweepResult {
        frames,
        samplings,
        values,
    })
}

/// Brings a frame onto `output_shape` at the reference pitch.
///
/// A window of `output_shape * ref_pitch / frame.pitch` source samples is
/// cropped around the intensity center of mass (diffraction side lobes can
/// pull energy far off the geometric center), then interpolated bilinearly to
/// the output shape. Cropping before zooming keeps the full interpolation
/// budget on the populated part of large defocused frames. The window is
/// clamped to the frame bounds.
pub fn resample_to(frame: &Field, ref_pitch: f64, output_shape: (usize, usize)) -> Field {
    let h = frame.values.shape()[0];
    let w = frame.values.shape()[1];

    let win_h = ((output_shape.0 as f64 * ref_pitch / frame.pitch).round() as usize).clamp(1, h);
    let win_w = ((output_shape.1 as f64 * ref_pitch / frame.pitch).round() as usize).clamp(1, w);

    let (cy, cx) = intensity_center_of_mass(frame);
    let top = ((cy.round() as isize - (win_h / 2) as isize).max(0) as usize).min(h - win_h);
    let left = ((cx.round() as isize - (win_w / 2) as isize).max(0) as usize).min(w - win_w);

    let sy = win_h as f64 / output_shape.0 as f64;
    let sx = win_w as f64 / output_shape.1 as f64;

    let mut out = Array2::zeros(output_shape);
    Zip::indexed(&mut out).par_for_each(|(r, c), e| {
        let y = top as f64 + (r as f64 + 0.5) * sy - 0.5;
        let x = left as f64 + (c as f64 + 0.5) * sx - 0.5;
        *e = bilinear(&frame.values, y, x);
    });

    Field {
        values: out,
        pitch: ref_pitch,
    }
}

fn intensity_center_of_mass(frame: &Field) -> (f64, f64) {
    let mut total = 0.0;
    let mut my = 0.0;
    let mut mx = 0.0;
    for ((r, c), e) in frame.values.indexed_iter() {
        let i = e.norm_sqr();
        total += i;
        my += r as f64 * i;
        mx += c as f64 * i;
    }
    if total > 0.0 {
        (my / total, mx / total)
    } else {
        (
            (frame.values.shape()[0] as f64 - 1.0) * 0.5,
            (frame.values.shape()[1] as f64 - 1.0) * 0.5,
        )
    }
}

fn bilinear(values: &Array2<Complex<f64>>, y: f64, x: f64) -> Complex<f64> {
    let h = values.shape()[0];
    let w = values.shape()[1];
    let y = y.max(0.0).min((h - 1) as f64);
    let x = x.max(0.0).min((w - 1) as f64);

    let y0 = y.floor() as usize;
    let x0 = x.floor() as usize;
    let y1 = (y0 + 1).min(h - 1);
    let x1 = (x0 + 1).min(w - 1);
    let ty = y - y0 as f64;
    let tx = x - x0 as f64;

    values[[y0, x0]] * ((1.0 - ty) * (1.0 - tx))
        + values[[y1, x0]] * (ty * (1.0 - tx))
        + values[[y0, x1]] * ((1.0 - ty) * tx)
        + values[[y1, x1]] * (ty * tx)
}

#[cfg(test)]
mod tests {
    use super::{resample_to, sweep_distance, sweep_wavelength, SweepPlan, MAX_SWEEP_FRAMES};
    use crate::{aperture, source, DiffractionError, Field};
    use approx::assert_relative_eq;
    use ndarray::Array2;
    use num_complex::Complex;

    const LAMBDA: f64 = 0.633;

    #[test]
    fn plan_enumeration_is_end_exclusive() {
        let plan = SweepPlan {
            start: 1.0e2,
            end: 1.0e4,
            step: 1.0e3,
        };
        let samples = plan.samples().unwrap();
        assert_eq!(samples.len(), 10);
        assert_relative_eq!(samples[0], 100.0);
        assert_relative_eq!(samples[1], 1100.0);
        assert_relative_eq!(samples[9], 9100.0);
    }

    #[test]
    fn plan_rejects_bad_ranges_and_the_frame_cap() {
        assert!(SweepPlan { start: 0.0, end: 10.0, step: 0.0 }.samples().is_err());
        assert!(SweepPlan { start: 10.0, end: 10.0, step: 1.0 }.samples().is_err());

        let plan = SweepPlan {
            start: 0.0,
            end: 500.0,
            step: 1.0,
        };
        match plan.samples() {
            Err(DiffractionError::Parameter(msg)) => {
                assert!(msg.contains(&MAX_SWEEP_FRAMES.to_string()));
            }
            other => panic!("expected parameter error, got {:?}", other),
        }
    }

    #[test]
    fn oversized_sweep_fails_before_any_propagation() {
        let beam = source::gaussian_beam((32, 32), 8.0, 1.0).unwrap();
        let plan = SweepPlan {
            start: 0.0,
            end: 500.0,
            step: 1.0,
        };
        assert!(sweep_distance(&beam, LAMBDA, plan, (16, 16), None).is_err());
    }

    #[test]
    fn resampling_recenters_on_the_intensity_peak() {
        let mut values = Array2::zeros((64, 64));
        values[[40, 44]] = Complex::new(8.0, 0.0);
        let frame = Field { values, pitch: 2.0 };

        let out = resample_to(&frame, 2.0, (32, 32));
        assert_relative_eq!(out.pitch, 2.0);
        assert_relative_eq!(out.values[[16, 16]].re, 8.0, max_relative = 1e-12);
    }

    #[test]
    fn resampling_zooms_to_the_reference_pitch() {
        let frame = Field {
            values: Array2::from_elem((64, 64), Complex::new(1.0, 0.0)),
            pitch: 1.0,
        };
        // 16 output samples at pitch 2 cover 32 source samples
        let out = resample_to(&frame, 2.0, (16, 16));
        for e in out.values.iter() {
            assert_relative_eq!(e.re, 1.0, max_relative = 1e-12);
        }
    }

    #[test]
    fn distance_sweep_stacks_near_field_frames() {
        let beam = source::gaussian_beam((64, 64), 10.0, 1.0).unwrap();
        let plan = SweepPlan {
            start: 10.0,
            end: 90.0,
            step: 10.0,
        };
        let mut percents = Vec::new();
        let result =
            sweep_distance(&beam, LAMBDA, plan, (32, 32), Some(&mut |p| percents.push(p))).unwrap();

        assert_eq!(result.frames.shape(), [8, 32, 32]);
        assert_eq!(result.samplings, vec![1.0; 8]);
        assert_eq!(result.values.len(), 8);
        assert_relative_eq!(result.values[0], 10.0);
        assert_relative_eq!(result.values[7], 80.0);

        assert_eq!(percents.len(), 8);
        assert!(percents.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(*percents.last().unwrap(), 100);
    }

    #[test]
    fn wavelength_sweep_shares_one_reference_pitch() {
        let mask = aperture::elliptical((64, 64), (30.0, 30.0), 1.0).unwrap();
        let plan = SweepPlan {
            start: 0.5,
            end: 0.7,
            step: 0.05,
        };
        let result = sweep_wavelength(&mask, 1.0e6, plan, (16, 16), None).unwrap();

        assert_eq!(result.frames.shape(), [4, 16, 16]);
        let reference = 0.5 * 1.0e6 / 64.0;
        for &pitch in &result.samplings {
            assert_relative_eq!(pitch, reference, max_relative = 1e-12);
        }
    }
}
