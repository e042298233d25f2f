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

use ndarray::Array2;

use coreg::hexbin::{average_point_spacing, DEFAULT_EDGE_SIZE, DEFAULT_THRESHOLD};
use coreg::infill::infill;
use coreg::normalize::normalize;
use coreg::points::{estimate_normals, raster_to_points, NORMAL_KNN};
use coreg_common::Affine;
use coreg_gdal::AreaOrPoint;

// run with "cargo test --test test_preprocess -- --nocapture"

fn init_tracing () {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

#[test]
fn test_corner_void_infill() {
    init_tracing();
    let nv = -9999.0f32;
    let mut dsm = Array2::<f32>::from_elem( (4, 4), 1.0);
    dsm[[0, 0]] = nv;
    dsm[[0, 3]] = nv;
    dsm[[3, 0]] = nv;
    dsm[[3, 3]] = nv;

    let (infilled, mask) = infill( &dsm, Some(-9999.0)).unwrap();
    println!("infilled corners: {} {} {} {}",
             infilled[[0,0]], infilled[[0,3]], infilled[[3,0]], infilled[[3,3]]);

    // every position is finite after infilling
    assert!( infilled.iter().all( |v| v.is_finite()));
    assert!( (infilled[[0, 0]] - 1.0).abs() < 1e-5);
    assert!( (infilled[[3, 3]] - 1.0).abs() < 1e-5);

    // the frozen mask still records the four original holes
    assert_eq!( mask.iter().filter( |m| !**m).count(), 4);
}

#[test]
fn test_point_count_matches_mask() {
    let (rows, cols) = (8, 6);
    let mut dsm = Array2::<f32>::zeros( (rows, cols));
    let mut mask = Array2::<bool>::from_elem( (rows, cols), true);
    mask[[2, 3]] = false;
    mask[[7, 5]] = false;

    for r in 0..rows {
        for c in 0..cols {
            dsm[[r, c]] = (r * cols + c) as f32;
        }
    }

    let transform = Affine::new( 1.0, 0.0, 0.0, 0.0, -1.0, rows as f64);
    let pc = raster_to_points( &dsm, &mask, &transform, AreaOrPoint::Area);

    assert_eq!( pc.nrows(), mask.iter().filter( |m| **m).count());

    // row-major traversal: y is non-increasing down the list for a north-up grid
    let mut last_y = f64::INFINITY;
    for i in 0..pc.nrows() {
        assert!( pc[[i, 1]] <= last_y);
        last_y = pc[[i, 1]];
    }
}

#[test]
fn test_normals_on_tilted_plane() {
    // z = 0.5x plane; fitted normals must be perpendicular to it
    let mut data = Vec::new();
    for j in 0..10 {
        for i in 0..10 {
            data.push( i as f64);
            data.push( j as f64);
            data.push( 0.5 * i as f64);
        }
    }
    let points = Array2::from_shape_vec( (100, 3), data).unwrap();
    let normals = estimate_normals( &points, NORMAL_KNN).unwrap();

    assert_eq!( normals.dim(), points.dim());
    let expected = {
        let len = (0.25f64 + 1.0).sqrt();
        [-0.5 / len, 0.0, 1.0 / len]
    };
    for i in 0..normals.nrows() {
        let dot = normals[[i, 0]] * expected[0] + normals[[i, 1]] * expected[1] + normals[[i, 2]] * expected[2];
        assert!( dot.abs() > 0.99, "normal {} deviates, dot = {}", i, dot);
    }
}

#[test]
fn test_normalized_image_determinism_and_range() {
    let (rows, cols) = (48, 48);
    let mut arr = Array2::<f32>::zeros( (rows, cols));
    for r in 0..rows {
        for c in 0..cols {
            // short and long wavelength mix so the bandpass keeps structure
            arr[[r, c]] = (c as f32 * 0.9).sin() * 3.0 + (r as f32 * 0.05).cos() * 40.0;
        }
    }

    let transform = Affine::new( 1.0, 0.0, 500.0, 0.0, -1.0, 800.0);
    let a = normalize( &arr, &transform, 2.0, 12.0).unwrap();
    let b = normalize( &arr, &transform, 2.0, 12.0).unwrap();

    assert_eq!( a, b);
    assert_eq!( *a.iter().min().unwrap(), 0u8);
    assert_eq!( *a.iter().max().unwrap(), 255u8);
}

#[test]
fn test_foot_unit_spacing_scale() {
    // a 3 foot spaced grid: native spacing ~3, meters spacing ~3 * 0.3048
    let mut points = Vec::new();
    for j in 0..60 {
        for i in 0..60 {
            points.push( [3.0 * i as f64, 3.0 * j as f64, 0.0]);
        }
    }
    let native = average_point_spacing( &points, DEFAULT_EDGE_SIZE, DEFAULT_THRESHOLD).unwrap();
    let meters = native * 0.3048;

    println!("native spacing {native}, meters {meters}");
    assert!( (native - 3.0).abs() < 1.0);
    assert!( (meters / native - 0.3048).abs() < 1e-12);
}
