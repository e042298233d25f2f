/*
 * Copyright © 2025, United States Government, as represented by the Administrator of
 * the National Aeronautics and Space Administration. All rights reserved.
 *
 * The “COREG” software is licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License. You may obtain a copy
 * of the License at http://www.apache.org/licenses/LICENSE-2.0.
 *
 * Unless required by applicable law or agreed to in writing, software distributed under
 * the License is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND,
 * either express or implied. See the License for the specific language governing permissions
 * and limitations under the License.
 */
use image::{ImageBuffer, Luma};
use image::imageops::{blur_advanced, GaussianBlurParameters};
use ndarray::Array2;

use coreg_common::Affine;
use crate::errors::{Result, op_failed};

pub type GrayImage32f = ImageBuffer<Luma<f32>, Vec<f32>>;

/// suppresses high frequency detail and long wavelength relief with a
/// difference-of-Gaussians bandpass, then clips to the [1%,99%] percentiles and
/// quantizes to 8 bit. Filter sizes are given in object space (meters) and are
/// scaled into pixels by the transform's pixel size.
pub fn normalize (infilled: &Array2<f32>, transform: &Affine, weak_size: f64, strong_size: f64) -> Result<Array2<u8>> {
    let (rows, cols) = infilled.dim();
    let scale = (transform.a * transform.a + transform.b * transform.b).sqrt();

    let img = to_image( infilled)
        .ok_or_else( || op_failed( "raster does not fit an image buffer"))?;

    let weak_filtered = blur_advanced( &img, GaussianBlurParameters::new_from_sigma( (weak_size / scale) as f32));
    let strong_filtered = blur_advanced( &img, GaussianBlurParameters::new_from_sigma( (strong_size / scale) as f32));

    let mut bandpassed: Vec<f32> = Vec::with_capacity( rows * cols);
    for (w, s) in weak_filtered.as_raw().iter().zip( strong_filtered.as_raw().iter()) {
        bandpassed.push( w - s);
    }

    let low = percentile( &bandpassed, 1.0);
    let high = percentile( &bandpassed, 99.0);
    let range = high - low;

    let quantized: Vec<u8> = bandpassed.iter().map( |v| {
        if range <= 0.0 { return 0u8 }
        let clipped = v.clamp( low, high);
        let normalized = (clipped - low) / range;
        (255.0f32 * normalized) as u8
    }).collect();

    Array2::from_shape_vec( (rows, cols), quantized)
        .map_err( |e| op_failed( e.to_string()))
}

fn to_image (arr: &Array2<f32>) -> Option<GrayImage32f> {
    let (rows, cols) = arr.dim();
    let data: Vec<f32> = arr.iter().copied().collect(); // ndarray default layout is row-major
    GrayImage32f::from_raw( cols as u32, rows as u32, data)
}

/// linearly interpolated percentile, matching the numpy default
pub fn percentile (values: &[f32], p: f64) -> f32 {
    if values.is_empty() { return 0.0 }

    let mut sorted: Vec<f32> = values.to_vec();
    sorted.sort_by( |a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let rank = p / 100.0 * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    if lo == hi { return sorted[lo] }

    let frac = (rank - lo as f64) as f32;
    sorted[lo] * (1.0 - frac) + sorted[hi] * frac
}
