//! Sampling-grid sizing: derives a numerically stable sampling pitch and a
//! power-of-two grid size from the physical source/aperture extents.

use crate::error::{parameter, Result};
use crate::DiffractionError;

/// Hard ceiling on the grid side length; finer sampling than this supports is
/// rejected rather than silently truncated.
pub const GRID_CEILING: usize = 2048;

/// Fraction of the window the larger physical extent is sized to occupy.
pub const FILLING_RATE: f64 = 0.59;

/// Occupancy below this fraction triggers a re-size; paired with overflow it
/// forms the hysteresis band that keeps small edits from thrashing the grid.
pub const REFILL_FRACTION: f64 = 0.58;

fn max_extent(source_size: (f64, f64), aperture_size: (f64, f64)) -> Result<f64> {
    let extent = source_size
        .0
        .max(source_size.1)
        .max(aperture_size.0)
        .max(aperture_size.1);
    if !(extent > 0.0) || !extent.is_finite() {
        return Err(parameter(format!(
            "physical extents must be positive and finite, got source {:?}, aperture {:?}",
            source_size, aperture_size
        )));
    }
    Ok(extent)
}

/// Sampling pitch that makes the larger of the source/aperture extents occupy
/// `filling_rate` of the window spanned by `shape`.
pub fn auto_sampling_pitch(
    source_size: (f64, f64),
    aperture_size: (f64, f64),
    shape: (usize, usize),
    filling_rate: f64,
) -> Result<f64> {
    let extent = max_extent(source_size, aperture_size)?;
    if !(filling_rate > 0.0 && filling_rate <= 1.0) {
        return Err(parameter(format!(
            "filling rate must be in (0, 1], got {}",
            filling_rate
        )));
    }
    let window = shape.0.max(shape.1);
    if window == 0 {
        return Err(parameter("grid shape must be non-empty"));
    }
    Ok(extent / (window as f64 * filling_rate))
}

/// Smallest power-of-two grid side `N` with `N * dx` covering the larger of
/// the source/aperture extents.
///
/// Fails with [`DiffractionError::SamplingTooLow`] when the requested pitch
/// would need a grid beyond [`GRID_CEILING`].
pub fn auto_grid_size(source_size: (f64, f64), aperture_size: (f64, f64), dx: f64) -> Result<usize> {
    let extent = max_extent(source_size, aperture_size)?;
    if !(dx > 0.0) || !dx.is_finite() {
        return Err(parameter(format!("sampling pitch must be positive, got {}", dx)));
    }
    let cells = (extent / dx).ceil() as usize;
    let n = cells.max(1).next_power_of_two();
    if n > GRID_CEILING {
        return Err(DiffractionError::SamplingTooLow {
            required: n,
            ceiling: GRID_CEILING,
        });
    }
    Ok(n)
}

/// Re-size trigger for the orchestrating layer: true when the physical extent
/// overflows the current window, or fills less than [`REFILL_FRACTION`] of it.
pub fn window_needs_resize(physical_extent: f64, window_extent: f64) -> bool {
    physical_extent > window_extent || physical_extent < REFILL_FRACTION * window_extent
}

#[cfg(test)]
mod tests {
    use super::{auto_grid_size, auto_sampling_pitch, window_needs_resize, GRID_CEILING};
    use crate::DiffractionError;
    use approx::assert_relative_eq;

    #[test]
    fn pitch_fills_the_window() {
        let dx = auto_sampling_pitch((300.0, 300.0), (400.0, 400.0), (512, 512), 0.59).unwrap();
        assert_relative_eq!(dx, 400.0 / (512.0 * 0.59), max_relative = 1e-12);
        // the 400 extent then occupies 59% of the 512-sample window
        assert_relative_eq!(400.0 / dx, 512.0 * 0.59, max_relative = 1e-12);
    }

    #[test]
    fn pitch_rejects_degenerate_inputs() {
        assert!(auto_sampling_pitch((0.0, 0.0), (0.0, 0.0), (512, 512), 0.59).is_err());
        assert!(auto_sampling_pitch((1.0, 1.0), (1.0, 1.0), (512, 512), 0.0).is_err());
    }

    #[test]
    fn grid_size_is_smallest_covering_power_of_two() {
        assert_eq!(auto_grid_size((300.0, 300.0), (400.0, 400.0), 1.0).unwrap(), 512);
        assert_eq!(auto_grid_size((300.0, 300.0), (400.0, 400.0), 0.5).unwrap(), 1024);
        // exactly at a power of two stays there
        assert_eq!(auto_grid_size((256.0, 256.0), (128.0, 128.0), 1.0).unwrap(), 256);
    }

    #[test]
    fn grid_size_grows_monotonically_as_pitch_shrinks() {
        let mut dx = 2.0;
        let mut last = 0;
        while dx > 0.05 {
            let n = auto_grid_size((300.0, 300.0), (400.0, 400.0), dx).unwrap();
            assert!(n >= last);
            assert!(n as f64 * dx >= 400.0);
            last = n;
            dx *= 0.5;
        }
    }

    #[test]
    fn grid_size_fails_past_the_ceiling() {
        match auto_grid_size((300.0, 300.0), (400.0, 400.0), 0.1) {
            Err(DiffractionError::SamplingTooLow { required, ceiling }) => {
                assert_eq!(required, 4096);
                assert_eq!(ceiling, GRID_CEILING);
            }
            other => panic!("expected SamplingTooLow, got {:?}", other),
        }
    }

    #[test]
    fn resize_trigger_has_hysteresis() {
        // 300 µm extent in a 512 µm window: 58.6% occupancy, leave it alone
        assert!(!window_needs_resize(300.0, 512.0));
        // overflow
        assert!(window_needs_resize(600.0, 512.0));
        // under-filled
        assert!(window_needs_resize(290.0, 512.0));
    }
}
