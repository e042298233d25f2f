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
use std::collections::HashMap;

use crate::errors::{Result, empty_input};

/// hexagon edge length (circumradius) used for density estimation, in native units
pub const DEFAULT_EDGE_SIZE: f64 = 25.0;

/// minimum number of samples for a hexagon to count as occupied
pub const DEFAULT_THRESHOLD: usize = 1;

/// mean point spacing of an unordered point set, estimated by binning the
/// samples into a pointy-top hexagonal grid and inverting the mean density of
/// the occupied cells:
///
///   density = n_points / (n_hexes * hex_area)
///   avg_pt_spacing = sqrt( 1 / density )
pub fn average_point_spacing (points: &[[f64; 3]], edge_size: f64, threshold: usize) -> Result<f64> {
    if points.is_empty() {
        return Err( empty_input( "no points for density estimation"))
    }

    let mut bins: HashMap<(i64, i64), usize> = HashMap::new();
    for p in points {
        *bins.entry( hex_of( p[0], p[1], edge_size)).or_insert(0) += 1;
    }

    let mut n_hexes = 0usize;
    let mut n_binned = 0usize;
    for count in bins.values() {
        if *count >= threshold {
            n_hexes += 1;
            n_binned += count;
        }
    }
    if n_hexes == 0 {
        return Err( empty_input( "no occupied hexagon bins"))
    }

    let hex_area = 1.5 * 3f64.sqrt() * edge_size * edge_size;
    let density = n_binned as f64 / (n_hexes as f64 * hex_area);

    Ok( (1.0 / density).sqrt() )
}

/// axial coordinates of the pointy-top hexagon containing (x,y)
fn hex_of (x: f64, y: f64, edge_size: f64) -> (i64, i64) {
    let q = (3f64.sqrt() / 3.0 * x - y / 3.0) / edge_size;
    let r = (2.0 / 3.0 * y) / edge_size;
    hex_round( q, r)
}

// cube-coordinate rounding, constraining q + r + s = 0
fn hex_round (q: f64, r: f64) -> (i64, i64) {
    let s = -q - r;

    let mut rq = q.round();
    let mut rr = r.round();
    let rs = s.round();

    let dq = (rq - q).abs();
    let dr = (rr - r).abs();
    let ds = (rs - s).abs();

    if dq > dr && dq > ds {
        rq = -rr - rs;
    } else if dr > ds {
        rr = -rq - rs;
    }

    (rq as i64, rr as i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn regular_grid_spacing() {
        // unit-spaced grid over 100x100 - spacing should come out near 1
        let mut points = Vec::new();
        for j in 0..100 {
            for i in 0..100 {
                points.push( [i as f64, j as f64, 0.0]);
            }
        }
        let spacing = average_point_spacing( &points, DEFAULT_EDGE_SIZE, DEFAULT_THRESHOLD).unwrap();
        assert!( spacing > 0.8 && spacing < 1.3, "spacing = {}", spacing);
    }

    #[test]
    fn denser_grids_yield_smaller_spacing() {
        let mut coarse = Vec::new();
        let mut dense = Vec::new();
        for j in 0..50 {
            for i in 0..50 {
                coarse.push( [2.0 * i as f64, 2.0 * j as f64, 0.0]);
                dense.push( [i as f64 * 0.5, j as f64 * 0.5, 0.0]);
            }
        }
        let s_coarse = average_point_spacing( &coarse, DEFAULT_EDGE_SIZE, DEFAULT_THRESHOLD).unwrap();
        let s_dense = average_point_spacing( &dense, DEFAULT_EDGE_SIZE, DEFAULT_THRESHOLD).unwrap();
        assert!( s_dense < s_coarse);
    }

    #[test]
    fn empty_input_is_rejected() {
        assert!( average_point_spacing( &[], DEFAULT_EDGE_SIZE, DEFAULT_THRESHOLD).is_err());
    }

    #[test]
    fn hex_rounding_is_consistent() {
        // a point deep inside a hexagon must round to the same cell as its center
        let (q, r) = hex_of( 30.0, 10.0, 25.0);
        let (q1, r1) = hex_of( 30.5, 10.5, 25.0);
        assert_eq!( (q, r), (q1, r1));
    }
}
