//! Aperture mask generators.
//!
//! All masks are centered in the window, defined in physical units at the
//! given sampling pitch, and validated against the window before any array
//! work starts.

use crate::error::{parameter, Result};
use crate::Field;
use ndarray::{s, Array2, Zip};
use num_complex::Complex;

fn validate_window(shape: (usize, usize), extent: (f64, f64), pitch: f64) -> Result<()> {
    if shape.0 == 0 || shape.1 == 0 {
        return Err(parameter("aperture window must be non-empty"));
    }
    if !(pitch > 0.0) || !pitch.is_finite() {
        return Err(parameter(format!("sampling pitch must be positive, got {}", pitch)));
    }
    if !(extent.0 > 0.0) || !(extent.1 > 0.0) {
        return Err(parameter(format!("aperture extent must be positive, got {:?}", extent)));
    }
    if extent.0 / pitch > shape.0 as f64 || extent.1 / pitch > shape.1 as f64 {
        return Err(parameter(format!(
            "aperture extent {:?} does not fit a {:?} window at pitch {}",
            extent, shape, pitch
        )));
    }
    Ok(())
}

/// Centered elliptical aperture with the given (height, width) diameters.
pub fn elliptical(shape: (usize, usize), diameters: (f64, f64), pitch: f64) -> Result<Field> {
    validate_window(shape, diameters, pitch)?;
    let (h, w) = shape;
    let b = diameters.0 / 2.0;
    let a = diameters.1 / 2.0;

    let mut mask = Array2::zeros(shape);
    Zip::indexed(&mut mask).par_for_each(|(y, x), e| {
        let y0 = (y as f64 - (h / 2) as f64) * pitch;
        let x0 = (x as f64 - (w / 2) as f64) * pitch;
        let inside = (x0 / a) * (x0 / a) + (y0 / b) * (y0 / b) <= 1.0;
        *e = Complex::new(if inside { 1.0 } else { 0.0 }, 0.0);
    });

    Ok(Field {
        values: mask,
        pitch,
    })
}

/// Centered rectangular aperture with the given (height, width) side lengths.
pub fn rectangular(shape: (usize, usize), size: (f64, f64), pitch: f64) -> Result<Field> {
    validate_window(shape, size, pitch)?;
    let (h, w) = shape;

    let mut mask = Array2::zeros(shape);
    Zip::indexed(&mut mask).par_for_each(|(y, x), e| {
        let y0 = (y as f64 - (h / 2) as f64) * pitch;
        let x0 = (x as f64 - (w / 2) as f64) * pitch;
        let inside = x0.abs() <= size.1 / 2.0 && y0.abs() <= size.0 / 2.0;
        *e = Complex::new(if inside { 1.0 } else { 0.0 }, 0.0);
    });

    Ok(Field {
        values: mask,
        pitch,
    })
}

/// Vertical slits of width `slit_width`, spaced `slit_spacing` center to
/// center, filling an `extent` (height, width) area.
pub fn slit_array(
    shape: (usize, usize),
    extent: (f64, f64),
    slit_width: f64,
    slit_spacing: f64,
    pitch: f64,
) -> Result<Field> {
    validate_window(shape, extent, pitch)?;
    if !(slit_width > 0.0) || !(slit_spacing > 0.0) {
        return Err(parameter("slit width and spacing must be positive"));
    }
    if slit_width >= slit_spacing {
        return Err(parameter(format!(
            "slit width {} must be less than the spacing {}",
            slit_width, slit_spacing
        )));
    }
    if slit_width / pitch < 1.0 || slit_spacing / pitch < 1.0 {
        return Err(parameter(format!(
            "slit geometry ({}, {}) is not resolvable at pitch {}",
            slit_width, slit_spacing, pitch
        )));
    }

    let (h, w) = shape;
    let height_px = ((extent.0 / pitch) as usize).min(h);
    let width_px = (slit_width / pitch).round().max(1.0) as usize;
    let spacing_px = (slit_spacing / pitch).round() as usize;
    let count = ((extent.1 / slit_spacing) as usize).max(1);

    let y0 = h / 2 - height_px / 2;
    let mut mask = Array2::zeros(shape);
    for i in 0..count {
        let center = (w / 2 + i * spacing_px).saturating_sub((count / 2) * spacing_px);
        let x0 = center.saturating_sub(width_px / 2);
        let x1 = (x0 + width_px).min(w);
        mask.slice_mut(s![y0..y0 + height_px, x0..x1])
            .fill(Complex::new(1.0, 0.0));
    }

    Ok(Field {
        values: mask,
        pitch,
    })
}

/// Grid of square apertures, `grid` = (rows, columns), centered as a whole.
pub fn square_array(
    shape: (usize, usize),
    square_size: f64,
    spacing: f64,
    grid: (usize, usize),
    pitch: f64,
) -> Result<Field> {
    if grid.0 == 0 || grid.1 == 0 {
        return Err(parameter("aperture grid must have at least one element"));
    }
    if !(square_size > 0.0) || !(spacing > 0.0) {
        return Err(parameter("square size and spacing must be positive"));
    }
    if square_size >= spacing {
        return Err(parameter(format!(
            "square size {} must be smaller than the spacing {} to avoid overlap",
            square_size, spacing
        )));
    }
    let grid_extent = (
        spacing * (grid.0 - 1) as f64 + square_size,
        spacing * (grid.1 - 1) as f64 + square_size,
    );
    validate_window(shape, grid_extent, pitch)?;

    let (h, w) = shape;
    let square_px = ((square_size / pitch).round() as usize).max(1);
    let spacing_px = (spacing / pitch).round() as usize;
    let grid_h = spacing_px * (grid.0 - 1) + square_px;
    let grid_w = spacing_px * (grid.1 - 1) + square_px;
    let start_y = (h - grid_h.min(h)) / 2;
    let start_x = (w - grid_w.min(w)) / 2;

    let mut mask = Array2::zeros(shape);
    for row in 0..grid.0 {
        for col in 0..grid.1 {
            let y = start_y + row * spacing_px;
            let x = start_x + col * spacing_px;
            let y1 = (y + square_px).min(h);
            let x1 = (x + square_px).min(w);
            mask.slice_mut(s![y..y1, x..x1]).fill(Complex::new(1.0, 0.0));
        }
    }

    Ok(Field {
        values: mask,
        pitch,
    })
}

#[cfg(test)]
mod tests {
    use super::{elliptical, rectangular, slit_array, square_array};
    use num_complex::Complex;

    fn count_open(field: &crate::Field) -> usize {
        field.values.iter().filter(|e| e.re > 0.5).count()
    }

    #[test]
    fn circular_aperture_area_matches_the_disc() {
        let field = elliptical((512, 512), (150.0, 150.0), 1.0).unwrap();
        let expected = std::f64::consts::PI * 75.0 * 75.0;
        let count = count_open(&field) as f64;
        // discretisation error is bounded by the perimeter
        assert!((count - expected).abs() < 600.0, "count {}", count);
    }

    #[test]
    fn rectangular_aperture_is_centered() {
        let field = rectangular((64, 64), (10.0, 20.0), 1.0).unwrap();
        assert_eq!(field.values[[32, 32]], Complex::new(1.0, 0.0));
        assert_eq!(field.values[[32, 21]], Complex::new(0.0, 0.0));
        assert_eq!(field.values[[26, 32]], Complex::new(0.0, 0.0));
    }

    #[test]
    fn apertures_must_fit_their_window() {
        assert!(rectangular((64, 64), (100.0, 10.0), 1.0).is_err());
        assert!(elliptical((64, 64), (10.0, 200.0), 1.0).is_err());
        // the same geometry fits at a coarser pitch
        assert!(rectangular((64, 64), (100.0, 10.0), 2.0).is_ok());
    }

    #[test]
    fn slit_geometry_is_validated() {
        // width must stay below the spacing
        assert!(slit_array((64, 64), (40.0, 40.0), 10.0, 5.0, 1.0).is_err());
        // both must be resolvable at the pitch
        assert!(slit_array((64, 64), (40.0, 40.0), 0.5, 4.0, 1.0).is_err());

        let field = slit_array((64, 64), (40.0, 40.0), 2.0, 8.0, 1.0).unwrap();
        let open = count_open(&field);
        assert!(open > 0);
        // 5 slits, 2 px wide, 40 px tall
        assert_eq!(open, 5 * 2 * 40);
    }

    #[test]
    fn square_array_respects_the_grid() {
        assert!(square_array((64, 64), 10.0, 5.0, (3, 3), 1.0).is_err());
        assert!(square_array((64, 64), 5.0, 30.0, (3, 3), 1.0).is_err());

        let field = square_array((64, 64), 4.0, 12.0, (3, 3), 1.0).unwrap();
        assert_eq!(count_open(&field), 9 * 16);
    }
}
