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

use ndarray::array;

use coreg::residuals::{ResidualField, N_FIELDS, OUT_OF_HULL};

// run with "cargo test --test test_residual_field -- --nocapture"

#[test]
fn test_unit_square_endpoints() {
    let origins = array![
        [0.0, 0.0, 0.0],
        [1.0, 0.0, 0.0],
        [0.0, 1.0, 0.0],
        [1.0, 1.0, 0.0],
    ];
    let vectors = array![
        [1.0, 0.0, 0.0],
        [0.0, 0.0, 0.0],
        [0.0, 0.0, 0.0],
        [0.0, 0.0, 0.0],
    ];
    let field = ResidualField::new( &origins, &vectors, 1.0).unwrap();

    // close to the carrying corner the interpolation approaches the sample
    let near_corner = field.interpolate( 0.01, 0.01);
    assert!( near_corner[0] > 0.9, "near-corner x residual = {}", near_corner[0]);

    // inside the hull the x component blends linearly between the corners
    let center = field.interpolate( 0.5, 0.5);
    println!("center residual: {:?}", center);
    assert_ne!( center[0], OUT_OF_HULL);
    assert!( center[0] >= 0.0 && center[0] <= 0.5);

    // strictly outside the hull every component is the sentinel
    assert_eq!( field.interpolate( 2.0, 2.0), [OUT_OF_HULL; N_FIELDS]);
    assert_eq!( field.interpolate( -1.0, 0.5), [OUT_OF_HULL; N_FIELDS]);
}

#[test]
fn test_triangulation_is_reused_across_fields() {
    // all five scalar fields must be consistent with the same geometry:
    // horiz = |(vx,vy)| and 3d = |(vx,vy,vz)| interpolated as separate fields
    let origins = array![
        [0.0, 0.0, 0.0],
        [4.0, 0.0, 0.0],
        [0.0, 4.0, 0.0],
    ];
    let vectors = array![
        [3.0, 4.0, 0.0],
        [3.0, 4.0, 0.0],
        [3.0, 4.0, 0.0],
    ];
    let field = ResidualField::new( &origins, &vectors, 1.0).unwrap();

    let r = field.interpolate( 1.0, 1.0);
    assert!( (r[0] - 3.0).abs() < 1e-9);
    assert!( (r[1] - 4.0).abs() < 1e-9);
    assert!( r[2].abs() < 1e-9);
    assert!( (r[3] - 5.0).abs() < 1e-9); // horizontal norm
    assert!( (r[4] - 5.0).abs() < 1e-9); // 3D norm
}
