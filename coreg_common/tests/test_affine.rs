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
#![allow(unused)]

use coreg_common::{Affine, BoundingBox};

// run with "cargo test --test test_affine -- --nocapture"

#[test]
fn test_resample_then_unit_scale_chain() {
    // a US-foot raster: 2 ft pixels, origin at (1000 ft, 2000 ft)
    let native = Affine::new( 2.0, 0.0, 1000.0, 0.0, -2.0, 2000.0);

    // resampling from 500x400 to 250x200 post-multiplies the pixel scale
    let resampled = native.mul( &Affine::scaling( 500.0 / 250.0, 400.0 / 200.0));
    // the unit change to meters pre-multiplies origin and pixel scale
    let uf = 0.3048;
    let meters = Affine::scaling( uf, uf).mul( &resampled);

    // origin preserved through resampling, then converted to meters
    assert_eq!( resampled.apply( 0.0, 0.0), (1000.0, 2000.0));
    let (ox, oy) = meters.apply( 0.0, 0.0);
    assert!( (ox - 304.8).abs() < 1e-9);
    assert!( (oy - 609.6).abs() < 1e-9);

    // pixel scale in meters: |a_native| * resample * units
    let (sx, sy) = meters.scaling_factors();
    println!("meters pixel scale: {sx} x {sy}");
    assert!( (sx - 2.0 * 2.0 * uf).abs() < 1e-12);
    assert!( (sy - 2.0 * 2.0 * uf).abs() < 1e-12);
    assert!( meters.is_axis_aligned());
}

#[test]
fn test_rowcol_round_trip_over_bounds() {
    let t = Affine::new( 0.5, 0.0, -120.0, 0.0, -0.5, 48.0);
    let bbox = BoundingBox::new( -120.0, 43.0, -115.0, 48.0);

    let (row, col) = t.rowcol( bbox.left, bbox.top).unwrap();
    assert_eq!( (row, col), (0.0, 0.0));

    let (row, col) = t.rowcol( bbox.right, bbox.bottom).unwrap();
    assert_eq!( (row, col), (10.0, 10.0));
}
