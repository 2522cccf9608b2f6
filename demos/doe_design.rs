use image::{Rgb, RgbImage};
use ndarray::{s, Array2, ArrayView2};
use num_complex::Complex;
use palette::{Lch, Srgb};
use scalar_diffraction::ifta::{ifta, IftaConfig, Seed};
use scalar_diffraction::propagation::fraunhofer;
use scalar_diffraction::Field;

/// Designs an eight-level DOE for a binary cross and replays it at infinity.
pub fn main() {
    let target = cross_target(64);
    let config = IftaConfig {
        image_size: Some((128, 128)),
        n_iter_ph1: 25,
        n_iter_ph2: 25,
        rfact: 1.2,
        n_levels: 8,
        seed: Seed::Random(0),
        compute_efficiency: true,
        compute_uniformity: false,
    };

    let result = ifta(&target, &config, Some(&mut |p| {
        if p % 20 == 0 {
            println!("ifta {}%", p);
        }
    }))
    .unwrap();

    let screens = result.phase_history.shape()[0];
    let doe_phase = result.phase_history.slice(s![screens - 1, .., ..]).to_owned();
    if let Some(efficiency) = &result.efficiency {
        println!(
            "efficiency {:.3} -> {:.3} over {} iterations",
            efficiency[0],
            efficiency[efficiency.len() - 1],
            efficiency.len()
        );
    }

    let doe = Field {
        values: doe_phase.mapv(|p| Complex::new(0.0, p).exp()),
        pitch: 1.0,
    };
    save_complex_image("doe_phase.png", doe.values.view()).unwrap();

    // far-field replay of the unit-amplitude DOE under plane-wave illumination
    let replay = fraunhofer(&doe, 0.633, 1.0e8).unwrap();
    save_real_image("doe_replay.png", replay.intensity().view(), 20.0, true).unwrap();
}

fn cross_target(n: usize) -> Array2<f64> {
    let arm = n / 8;
    let len = n / 2;
    let c = n / 2;
    let mut target = Array2::zeros((n, n));
    target
        .slice_mut(s![c - arm..c + arm, c - len / 2..c + len / 2])
        .fill(1.0);
    target
        .slice_mut(s![c - len / 2..c + len / 2, c - arm..c + arm])
        .fill(1.0);
    target
}

pub fn save_real_image<T: AsRef<std::path::Path> + std::fmt::Debug>(
    file_name: T,
    arr: ArrayView2<f64>,
    amp: f64,
    normalise: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    if let &[h, w, ..] = arr.shape() {
        let mut max: f64 = arr.iter().fold(0.0, |max, val| val.max(max));
        let sum = arr.iter().fold(0.0, |sum, val| val + sum);
        println!("h:{} w:{} max:{} sum:{} - {:?}", h, w, max, sum, file_name);

        let mut img = RgbImage::new(w as u32, h as u32);
        if !normalise {
            max = 1.0;
        }

        for (x, y, p) in img.enumerate_pixels_mut() {
            let value = arr[[y as usize, x as usize]] / max;
            let value = (value * amp).min(1.0);

            let colour = Srgb::from(Lch::new(value * 70.0, value * 128.0, 280.0 - 245.0 * value));
            *p = Rgb([
                (colour.red * 255.0) as u8,
                (colour.green * 255.0) as u8,
                (colour.blue * 255.0) as u8,
            ]);
        }

        img.save(file_name).unwrap();
    }
    Ok(())
}

pub fn save_complex_image<T: AsRef<std::path::Path> + std::fmt::Debug>(
    file_name: T,
    arr: ArrayView2<Complex<f64>>,
) -> Result<(), Box<dyn std::error::Error>> {
    if let &[h, w, ..] = arr.shape() {
        let max_sqr: f64 = arr.iter().fold(0.0, |max, val| val.norm_sqr().max(max));
        println!("h:{} w:{} max_sqr:{} - {:?}", h, w, max_sqr, file_name);

        let max = max_sqr.sqrt();

        let mut img = RgbImage::new(w as u32, h as u32);

        for (x, y, p) in img.enumerate_pixels_mut() {
            let (r, theta) = arr[[y as usize, x as usize]].to_polar();
            let r = r / max;

            let colour = Srgb::from(Lch::new(
                r * 100.0,
                r * 128.0,
                360.0 * (theta / ::std::f64::consts::PI + 1.0) * 0.5,
            ));
            *p = Rgb([
                (colour.red * 255.0) as u8,
                (colour.green * 255.0) as u8,
                (colour.blue * 255.0) as u8,
            ]);
        }

        img.save(file_name).unwrap();
    }
    Ok(())
}
