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
use ndarray::Array2;

use crate::errors::{Result, empty_input};

// search reach of a single fill pass, in pixels
const MAX_SEARCH_DISTANCE: isize = 100;

/// valid-data mask of an elevation raster: true marks cells that are finite
/// and not equal to the nodata value
pub fn nodata_mask (dsm: &Array2<f32>, nodata: Option<f64>) -> Array2<bool> {
    match nodata {
        Some(nv) => dsm.mapv( |v| v.is_finite() && (v as f64) != nv),
        None => dsm.mapv( |v| v.is_finite()),
    }
}

/// fills void cells by inverse distance weighting against the valid neighbors,
/// iterating until no invalid cell remains. The returned mask records the
/// validity state *before* infilling so voids can be re-imposed downstream.
pub fn infill (dsm: &Array2<f32>, nodata: Option<f64>) -> Result<(Array2<f32>, Array2<bool>)> {
    let mask = nodata_mask( dsm, nodata);
    if !mask.iter().any( |m| *m) {
        return Err( empty_input( "DSM array is empty"))
    }

    let mut infilled = dsm.clone();
    let mut infill_mask = mask.clone();

    while infill_mask.iter().any( |m| !*m) {
        let filled = fill_pass( &infilled, &infill_mask);
        infilled = filled;
        infill_mask = nodata_mask( &infilled, nodata);
    }

    Ok( (infilled, mask) )
}

/// one inverse-distance-weighted pass over the invalid cells. Cells whose
/// search neighborhood holds no valid sample stay invalid for the next pass.
fn fill_pass (arr: &Array2<f32>, mask: &Array2<bool>) -> Array2<f32> {
    let (rows, cols) = arr.dim();
    let mut out = arr.clone();

    for r in 0..rows {
        for c in 0..cols {
            if mask[[r, c]] { continue }

            if let Some(value) = idw_from_ring( arr, mask, r as isize, c as isize) {
                out[[r, c]] = value;
            }
        }
    }

    out
}

/// IDW over the valid samples on the nearest non-empty square ring around (r,c)
fn idw_from_ring (arr: &Array2<f32>, mask: &Array2<bool>, r: isize, c: isize) -> Option<f32> {
    let (rows, cols) = arr.dim();
    let rows = rows as isize;
    let cols = cols as isize;

    for radius in 1..=MAX_SEARCH_DISTANCE {
        let mut weight_sum = 0.0f64;
        let mut value_sum = 0.0f64;

        let mut visit = |rr: isize, cc: isize| {
            if rr < 0 || rr >= rows || cc < 0 || cc >= cols { return }
            if !mask[[rr as usize, cc as usize]] { return }
            let dr = (rr - r) as f64;
            let dc = (cc - c) as f64;
            let w = 1.0 / (dr * dr + dc * dc);
            weight_sum += w;
            value_sum += w * arr[[rr as usize, cc as usize]] as f64;
        };

        for cc in (c - radius)..=(c + radius) {
            visit( r - radius, cc);
            visit( r + radius, cc);
        }
        for rr in (r - radius + 1)..(r + radius) {
            visit( rr, c - radius);
            visit( rr, c + radius);
        }

        if weight_sum > 0.0 {
            return Some( (value_sum / weight_sum) as f32)
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn corner_voids_fill_from_neighbors() {
        let nv = -9999.0f32;
        let mut dsm = Array2::<f32>::from_elem( (4, 4), 1.0);
        dsm[[0, 0]] = nv;
        dsm[[0, 3]] = nv;
        dsm[[3, 0]] = nv;
        dsm[[3, 3]] = nv;

        let (infilled, mask) = infill( &dsm, Some(-9999.0)).unwrap();

        for v in infilled.iter() {
            assert!( (*v - 1.0).abs() < 1e-6);
        }
        // the mask still records the original holes
        assert!( !mask[[0, 0]] && !mask[[0, 3]] && !mask[[3, 0]] && !mask[[3, 3]]);
        assert_eq!( mask.iter().filter( |m| !**m).count(), 4);
    }

    #[test]
    fn nan_counts_as_void() {
        let dsm = array![[1.0f32, f32::NAN], [1.0, 1.0]];
        let (infilled, mask) = infill( &dsm, None).unwrap();
        assert!( infilled[[0, 1]].is_finite());
        assert!( !mask[[0, 1]]);
    }

    #[test]
    fn all_nodata_is_empty_input() {
        let dsm = Array2::<f32>::from_elem( (3, 3), -9999.0);
        assert!( infill( &dsm, Some(-9999.0)).is_err());
    }

    #[test]
    fn weighted_fill_prefers_close_values() {
        let nv = -9999.0f32;
        let mut dsm = Array2::<f32>::from_elem( (1, 5), nv);
        dsm[[0, 0]] = 10.0;
        dsm[[0, 4]] = 20.0;

        let (infilled, _) = infill( &dsm, Some(-9999.0)).unwrap();
        // the cell next to the 10.0 sample must land closer to 10 than to 20
        assert!( infilled[[0, 1]] < 15.0);
        assert!( infilled[[0, 3]] > 15.0);
    }
}
