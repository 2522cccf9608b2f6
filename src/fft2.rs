use ndarray::parallel::prelude::{IntoParallelIterator, ParallelIterator};
use ndarray::{Array2, ArrayViewMut2, Zip};
use num_complex::Complex;
use rustfft::num_traits::Zero;
use rustfft::{FftDirection, FftPlanner};
use unchecked_index::get_unchecked_mut;

/// 2D fft with the origin at index (0, 0).
pub fn fft2(mut input: Array2<Complex<f64>>) -> Array2<Complex<f64>> {
    transform(input.view_mut(), FftDirection::Forward, false);
    input
}

/// 2D inverse fft with the origin at index (0, 0).
pub fn ifft2(mut input: Array2<Complex<f64>>) -> Array2<Complex<f64>> {
    transform(input.view_mut(), FftDirection::Inverse, false);
    input
}

/// 2D fft where the origin sits at the array center (H/2, W/2) on both sides,
/// removing the need for an ifft_shift before and an fft_shift after.
pub fn fft2c(mut input: Array2<Complex<f64>>) -> Array2<Complex<f64>> {
    transform(input.view_mut(), FftDirection::Forward, true);
    input
}

/// 2D inverse fft where the origin sits at the array center (H/2, W/2) on both sides.
pub fn ifft2c(mut input: Array2<Complex<f64>>) -> Array2<Complex<f64>> {
    transform(input.view_mut(), FftDirection::Inverse, true);
    input
}

/// Row pass in place, column pass through a contiguous buffer.
///
/// Normalisation is 1/sqrt(len) per direction, so forward followed by inverse
/// is an exact round trip and both transforms preserve the squared-norm sum.
/// In centered mode the shifts are folded into the buffer offsets of each pass.
fn transform(mut input: ArrayViewMut2<Complex<f64>>, direction: FftDirection, centered: bool) {
    let rows = input.shape()[0];
    let cols = input.shape()[1];
    let normalisation = 1.0 / ((rows * cols) as f64).sqrt();

    let mut planner = FftPlanner::new();
    let fft_row = planner.plan_fft(cols, direction);
    let fft_col = planner.plan_fft(rows, direction);

    Zip::from(input.rows_mut()).into_par_iter().for_each_init(
        || vec![Zero::zero(); fft_row.get_inplace_scratch_len()],
        |scratch, row| {
            let mut row = row.0;
            let row = row.as_slice_mut().unwrap();
            if centered {
                ifft_shift_inplace(row);
            }
            fft_row.process_with_scratch(row, scratch);
            if centered {
                fft_shift_inplace(row);
            }
        },
    );

    // the column view is strided, so the fft runs on a buffer; the centered
    // shifts become read/write offsets into it
    let read_offset = if centered { rows / 2 } else { 0 };
    let write_offset = if centered { rows - rows / 2 } else { 0 };
    Zip::from(input.columns_mut())
        .into_par_iter()
        .for_each_init(
            || {
                (
                    vec![Zero::zero(); fft_col.len()],
                    vec![Zero::zero(); fft_col.get_inplace_scratch_len()],
                )
            },
            |(buffer, scratch), col| {
                let mut col = col.0;
                unsafe {
                    let buffer_slice = buffer.as_mut_slice();
                    for k in 0..rows {
                        *get_unchecked_mut(buffer_slice, k) = col[(k + read_offset) % rows];
                    }
                }
                fft_col.process_with_scratch(buffer, scratch);
                for (i, e) in col.iter_mut().enumerate() {
                    *e = buffer[(i + write_offset) % rows] * normalisation;
                }
            },
        );
}

/// Moves the origin (0) to the "center" of the slice (N/2)
///
/// For even lengths, which have no center value, the origin lands at N/2.
pub fn fft_shift_inplace(input: &mut [Complex<f64>]) {
    let n = input.len();
    input.rotate_left((n + 1) / 2);
}

/// Moves the "center" of the slice (N/2) to the origin (0)
///
/// Inverts fft_shift exactly, accounting for the asymmetry of odd lengths.
pub fn ifft_shift_inplace(input: &mut [Complex<f64>]) {
    let n = input.len();
    input.rotate_left(n / 2);
}
