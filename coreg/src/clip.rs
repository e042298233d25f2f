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
use tracing::info;

use coreg_common::{Affine, BoundingBox};
use coreg_gdal::srs_same;

use crate::config::CoregConfig;
use crate::dataset::{DataKind, GeoDataset, Window};
use crate::errors::{Result, CoregError};

/// how much outside of the bounds to search for registration features
pub const OVERSIZE_SCALE: f64 = 1.5;

/// restricts both datasets to their mutual overlap (inflated by
/// `OVERSIZE_SCALE`) and re-grids them through the resulting windows. Requires
/// both CRSes to be defined and equal.
pub fn clip_datasets (fnd: &mut GeoDataset, aoi: &mut GeoDataset, config: &CoregConfig) -> Result<()> {
    if !config.tight_search {
        return Ok(())
    }

    let fnd_crs = fnd.crs.as_ref().ok_or_else( || CoregError::CrsMissingOrMismatch(
        "to perform this operation, the CRS of both datasets must be defined and equal".to_string()))?;
    let aoi_crs = aoi.crs.as_ref().ok_or_else( || CoregError::CrsMissingOrMismatch(
        "to perform this operation, the CRS of both datasets must be defined and equal".to_string()))?;
    if !srs_same( fnd_crs, aoi_crs) {
        return Err( CoregError::CrsMissingOrMismatch(
            "to perform this operation, the CRS of both datasets must be equal".to_string()))
    }

    let fnd_t = fnd.transform.ok_or_else( || CoregError::MissingTransform( "foundation transform not set".to_string()))?;
    let aoi_t = aoi.transform.ok_or_else( || CoregError::MissingTransform( "AOI transform not set".to_string()))?;

    let (fnd_window, aoi_window) = compute_clip_windows(
        &fnd_t, fnd.dsm.dim(), &aoi_t, aoi.dsm.dim(), OVERSIZE_SCALE)?;

    info!( "clip windows: foundation {:?}, compliment {:?}", fnd_window, aoi_window);

    fnd.window = Some( to_source_window( fnd, &fnd_window));
    aoi.window = Some( to_source_window( aoi, &aoi_window));

    // re-grid through the windows; the CRSes are equal so no fallback applies
    fnd.create_dsm( true, None)?;
    aoi.create_dsm( true, None)
}

/// window indices are derived on the prepared (pipeline resolution) grid; a
/// raster source is subsequently re-read on its native grid, so its indices
/// are rescaled by the resample factor. Gridded sources re-rasterize to the
/// same prepared grid and keep the indices as computed.
fn to_source_window (ds: &GeoDataset, w: &Window) -> Window {
    match ds.kind {
        DataKind::Dsm => {
            let f = ds.resolution() / ds.native_resolution;
            Window {
                row_off: (w.row_off as f64 * f) as usize,
                col_off: (w.col_off as f64 * f) as usize,
                rows: ((w.rows as f64 * f) as usize).max(1),
                cols: ((w.cols as f64 * f) as usize).max(1),
            }
        }
        _ => *w,
    }
}

/// the pure clipping math: world boxes from transform and shape, two-step
/// symmetric inflation, disjointness gate, per-side clamping against the
/// other dataset's inflated box, and translation back to row/column windows
pub fn compute_clip_windows (
    fnd_transform: &Affine, fnd_shape: (usize, usize),
    aoi_transform: &Affine, aoi_shape: (usize, usize),
    oversize_scale: f64,
) -> Result<(Window, Window)> {
    let fnd_original = grid_bounds( fnd_transform, fnd_shape);
    let aoi_original = grid_bounds( aoi_transform, aoi_shape);

    let fnd_inflated = inflate_bounds( fnd_transform, fnd_shape, oversize_scale);
    let aoi_inflated = inflate_bounds( aoi_transform, aoi_shape, oversize_scale);

    if fnd_inflated.disjoint( &aoi_inflated) {
        return Err( CoregError::DisjointBounds(
            "bounding boxes for foundation and compliment are disjoint".to_string()))
    }

    // each dataset keeps its own edge unless the other's inflated edge is closer in
    let fnd_clipped = fnd_original.clamped_by( &aoi_inflated);
    let aoi_clipped = aoi_original.clamped_by( &fnd_inflated);

    let fnd_window = world_box_to_window( fnd_transform, fnd_shape, &fnd_clipped)?;
    let aoi_window = world_box_to_window( aoi_transform, aoi_shape, &aoi_clipped)?;

    Ok( (fnd_window, aoi_window) )
}

fn grid_bounds (transform: &Affine, shape: (usize, usize)) -> BoundingBox {
    let (rows, cols) = shape;
    let (left, top) = transform.apply( 0.0, 0.0);
    let (right, bottom) = transform.apply( cols as f64, rows as f64);
    BoundingBox::new( left, bottom, right, top)
}

/// scales the pixel size by `oversize_scale` about the grid origin (left/top)
/// and then shifts left/top out by the measured right/bottom expansion, which
/// makes the inflation symmetric about the box
fn inflate_bounds (transform: &Affine, shape: (usize, usize), oversize_scale: f64) -> BoundingBox {
    let original = grid_bounds( transform, shape);

    let scaled_transform = transform.mul( &Affine::scaling( oversize_scale, oversize_scale));
    let scaled = grid_bounds( &scaled_transform, shape);

    let x_expanded = (scaled.right - original.right).abs();
    let y_expanded = (scaled.bottom - original.bottom).abs();

    BoundingBox::new(
        scaled.left - x_expanded,
        scaled.bottom,
        scaled.right,
        scaled.top + y_expanded,
    )
}

fn world_box_to_window (transform: &Affine, shape: (usize, usize), bbox: &BoundingBox) -> Result<Window> {
    let (rows, cols) = shape;

    let (row0, col0) = transform.rowcol( bbox.left, bbox.top)
        .ok_or_else( || CoregError::MissingTransform( "singular transform in clip".to_string()))?;
    let (row1, col1) = transform.rowcol( bbox.right, bbox.bottom)
        .ok_or_else( || CoregError::MissingTransform( "singular transform in clip".to_string()))?;

    let row0 = (row0.floor() as isize).clamp( 0, rows as isize) as usize;
    let col0 = (col0.floor() as isize).clamp( 0, cols as isize) as usize;
    let row1 = (row1.floor() as isize).clamp( 0, rows as isize) as usize;
    let col1 = (col1.floor() as isize).clamp( 0, cols as isize) as usize;

    if row1 <= row0 || col1 <= col0 {
        return Err( CoregError::DisjointBounds( "clipped window is empty".to_string()))
    }

    Ok( Window { row_off: row0, col_off: col0, rows: row1 - row0, cols: col1 - col0 } )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn north_up (origin_x: f64, origin_y: f64, res: f64) -> Affine {
        Affine::new( res, 0.0, origin_x, 0.0, -res, origin_y)
    }

    #[test]
    fn inflation_is_symmetric_on_non_square_rasters() {
        let t = north_up( 0.0, 10.0, 1.0);
        let shape = (10, 20); // rows, cols -> 20 wide, 10 tall

        let inflated = inflate_bounds( &t, shape, 1.5);

        // half a width extra on each side, half a height top and bottom
        assert_eq!( inflated, BoundingBox::new( -10.0, -5.0, 30.0, 15.0));
    }

    #[test]
    fn oversized_compliment_is_clipped_to_the_foundation_margin() {
        let fnd_t = north_up( 0.0, 10.0, 1.0);
        let aoi_t = north_up( -20.0, 30.0, 1.0);

        let (fnd_w, aoi_w) = compute_clip_windows( &fnd_t, (10, 10), &aoi_t, (60, 60), 1.5).unwrap();

        // the foundation fits entirely inside the compliment's inflation
        assert_eq!( fnd_w, Window { row_off: 0, col_off: 0, rows: 10, cols: 10 });
        // the compliment is cut down to the foundation's inflated box (-5..15)
        assert_eq!( aoi_w, Window { row_off: 15, col_off: 15, rows: 20, cols: 20 });
    }

    #[test]
    fn disjoint_inflated_bounds_are_rejected() {
        let fnd_t = north_up( 0.0, 10.0, 1.0);
        let aoi_t = north_up( 1000.0, 10.0, 1.0);

        let res = compute_clip_windows( &fnd_t, (10, 10), &aoi_t, (10, 10), 1.5);
        assert!( matches!( res, Err(CoregError::DisjointBounds(_))));
    }

    #[test]
    fn clipping_is_idempotent_for_fixed_inputs() {
        let fnd_t = north_up( 0.0, 10.0, 1.0);
        let aoi_t = north_up( -20.0, 30.0, 1.0);

        let first = compute_clip_windows( &fnd_t, (10, 10), &aoi_t, (60, 60), 1.5).unwrap();
        let second = compute_clip_windows( &fnd_t, (10, 10), &aoi_t, (60, 60), 1.5).unwrap();
        assert_eq!( first, second);
    }
}
