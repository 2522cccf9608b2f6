use image::{Rgb, RgbImage};
use ndarray::{Array2, ArrayView2};
use palette::{Lch, Srgb};
use scalar_diffraction::propagation::{propagate, thresholds, Regime};
use scalar_diffraction::{aperture, illuminate, source};

/// Circular aperture under a plane wave, pushed into the far field.
pub fn main() {
    let shape = (512, 512);
    let dx = 1.0; // µm
    let wavelength = 0.633; // µm
    let z = 1.0e6; // µm

    let mask = aperture::elliptical(shape, (150.0, 150.0), dx).unwrap();
    let wave = source::plane_wave(shape, (300.0, 300.0), dx).unwrap();
    let input = illuminate(&wave, &mask).unwrap();

    let t = thresholds(512, dx, wavelength);
    println!(
        "z = {:.1e} µm, z_limit = {:.1} µm, z_fraunhofer = {:.1e} µm, regime {:?}",
        z,
        t.z_limit,
        t.z_fraunhofer,
        Regime::select(512, dx, wavelength, z)
    );

    let output = propagate(&input, wavelength, z).unwrap();
    println!("output pitch {:.1} µm/px", output.pitch);

    save_real_image("far_field_input.png", input.intensity().view(), 1.0, true).unwrap();
    save_real_image(
        "far_field_output.png",
        log_intensity(output.intensity().view(), 1e-6).view(),
        1.0,
        true,
    )
    .unwrap();
}

pub fn log_intensity(arr: ArrayView2<f64>, min: f64) -> Array2<f64> {
    let log_min = -min.ln();
    let max = arr.iter().fold(0.0, |max: f64, &e| e.max(max));
    arr.map(|e| ((e / max).ln() / log_min + 1.0).max(0.0).min(1.0))
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
