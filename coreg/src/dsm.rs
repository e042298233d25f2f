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
use tracing::{info, warn};

use coreg_common::Affine;
use coreg_common::fs::filename;
use coreg_gdal::{
    AreaOrPoint, Dataset, RasterMeta, ResampleAlg, SpatialRef,
    bounds_center, linear_units_of, open_raster, srs_utm_from_lon_lat, world_bounds,
};
use coreg_gdal::gdal::raster::GdalDataType;
use coreg_gdal::warp::{WarpResampleAlg, reproject_to_srs, suggested_warp_output};

use crate::dataset::{GeoDataset, Role};
use crate::errors::{Result, CoregError};

/// native pixel resolution of a DSM file, in meters. For geographic rasters the
/// resolution is taken from the transform GDAL suggests when projecting into
/// the best-guess UTM zone at the raster centroid.
pub fn calculate_resolution (ds: &mut GeoDataset) -> Result<()> {
    let src = open_raster( &ds.path)?;
    let meta = RasterMeta::read( &src)?;
    let name = filename( &ds.path).unwrap_or_default();

    let t = meta.transform
        .ok_or_else( || CoregError::MissingTransform( format!("{} has no transform data associated with it", name)))?;
    if t.is_identity() {
        return Err( CoregError::MissingTransform( format!("{} has no transform data associated with it", name)))
    }
    if !t.is_axis_aligned() {
        return Err( CoregError::NonConformalTransform( format!("{} cannot contain a rotation angle", name)))
    }
    let (sx, sy) = t.scaling_factors();
    if sx != sy {
        return Err( CoregError::NonConformalTransform(
            format!("{} has different X and Y scales, they must be identical", name)))
    }

    let tag = ds.role.tag();
    let kind = ds.kind.tag();

    match &meta.crs {
        None => {
            warn!( "Linear unit for {}-{} not detected -> meters assumed", tag, kind);
            ds.native_resolution = t.a.abs();
            ds.units_factor = 1.0;
            ds.units_name = Some( "m".to_string());
        }
        Some(crs) if !crs.is_projected() => {
            info!( "CRS is not projected, converting to meters");

            let (cx, cy) = bounds_center( &world_bounds( &t, meta.width, meta.height));
            let (utm_srs, zone) = srs_utm_from_lon_lat( cx, cy)?;
            info!( "best-guess projected CRS for {}-{}: UTM zone {}", tag, kind, zone);

            let (projected, _, _) = suggested_warp_output( &src, &utm_srs)?;
            ds.native_resolution = projected.a.abs();
            ds.crs = Some( utm_srs);
            ds.units_factor = 1.0;
            ds.units_name = Some( "m".to_string());
        }
        Some(crs) => {
            let (factor, units) = linear_units_of( crs);
            info!( "Linear unit for {}-{} detected as {}", tag, kind, units);
            ds.units_factor = factor;
            ds.units_name = Some( units);
            ds.native_resolution = t.a.abs() * factor;
        }
    }

    info!( "Calculated native resolution of {}-{} as: {:.1} meters", tag, kind, ds.native_resolution);
    Ok(())
}

/// resamples the DSM to the pipeline resolution and scales raster values and
/// transform into meters. A geographic AOI is first warped into the
/// foundation's CRS so both datasets share a projected frame.
pub fn create_dsm (ds: &mut GeoDataset, resample: bool, fallback_crs: Option<&SpatialRef>) -> Result<()> {
    let tag = ds.role.tag();
    let kind = ds.kind.tag();

    let src = open_raster( &ds.path)?;
    let src_meta = RasterMeta::read( &src)?;

    // the compliment may arrive in a non-projected CRS
    let needs_warp = ds.role == Role::Aoi
        && src_meta.crs.as_ref().map( |c| !c.is_projected()).unwrap_or( false)
        && fallback_crs.is_some();

    let mut _warp_tmp = None;
    let src: Dataset = if needs_warp {
        let fallback = fallback_crs.unwrap();
        info!( "warping {}-{} to the foundation CRS", tag, kind);
        let tmp = tempfile::Builder::new().prefix( "coreg_warp_").suffix( ".tif").tempfile()?;
        let warped = reproject_to_srs( &src, tmp.path(), fallback, WarpResampleAlg::Cubic, src_meta.nodata)?;
        _warp_tmp = Some(tmp); // deleted on drop, after the read below
        warped
    } else {
        src
    };

    let meta = RasterMeta::read( &src)?;
    let band = src.rasterband(1)?;
    let base_transform = meta.transform.unwrap_or( Affine::identity());

    // the fallback warp always covers the full source extent, so a clip
    // window only applies when the source grid is read directly
    let (win_off, win_size, win_transform) = match ds.window {
        Some(w) if !needs_warp => ( (w.col_off as isize, w.row_off as isize), (w.cols, w.rows), w.transform( &base_transform) ),
        _ => ( (0, 0), (meta.width, meta.height), base_transform ),
    };

    let resample_factor = if resample { ds.native_resolution / ds.resolution() } else { 1.0 };

    let (buffer, transform) = if resample_factor != 1.0 {
        info!( "Resampling {}-{} to a pixel resolution of: {} meters", tag, kind, ds.resolution());
        let out_w = ((win_size.0 as f64 * resample_factor) as usize).max(1);
        let out_h = ((win_size.1 as f64 * resample_factor) as usize).max(1);

        // data is read as float32 since integer dtypes yield poor keypoints
        let buf = band.read_as::<f32>( win_off, win_size, (out_w, out_h), Some(ResampleAlg::Cubic))?;

        // post-multiplying by the resampling scale keeps the origin and only
        // changes the pixel scale
        let t = win_transform.mul( &Affine::scaling(
            win_size.0 as f64 / out_w as f64,
            win_size.1 as f64 / out_h as f64));
        (buf, t)
    } else {
        info!( "No resampling required for {}-{}", tag, kind);
        let buf = band.read_as::<f32>( win_off, win_size, win_size, None)?;
        (buf, win_transform)
    };

    let (cols, rows) = buffer.shape();
    let mut dsm = Array2::from_shape_vec( (rows, cols), buffer.data().to_vec())
        .expect( "gdal buffer is row-major");

    // scale the elevation values into meters, leaving voids untouched
    scale_elevations( &mut dsm, meta.nodata, ds.units_factor, band.band_type());

    // pre-multiplying by the unit scale converts origin and pixel scale alike
    let transform = Affine::scaling( ds.units_factor, ds.units_factor).mul( &transform);

    ds.dsm = dsm;
    ds.transform = Some( transform);
    ds.nodata = meta.nodata;
    ds.crs = meta.crs;

    ds.area_or_point = match meta.area_or_point {
        Some(aop) => aop,
        None => {
            info!( "'AREA_OR_POINT' not supplied in {}-{} - defaulting to 'Area'", tag, kind);
            AreaOrPoint::Area
        }
    };

    if ds.nodata.is_none() {
        info!( "{}-{} does not have a nodata value.", tag, kind);
    }
    if transform.is_identity() {
        warn!( "{}-{} has an identity transform.", tag, kind);
    }

    Ok(())
}

/// multiplies valid cells by the linear unit factor. Integer-sourced rasters
/// can only be scaled exactly by whole factors; other factors are applied
/// anyway after a warning, as a last resort.
fn scale_elevations (dsm: &mut Array2<f32>, nodata: Option<f64>, units_factor: f64, src_type: GdalDataType) {
    if units_factor == 1.0 {
        return
    }

    let is_integer_source = !matches!( src_type, GdalDataType::Float32 | GdalDataType::Float64);
    if is_integer_source && units_factor.fract() != 0.0 {
        warn!( "Cannot safely scale DSM by units factor, attempting to anyway!");
    }

    match nodata {
        Some(nv) => {
            let nv = nv as f32;
            dsm.mapv_inplace( |v| if v.is_finite() && v != nv { v * units_factor as f32 } else { v });
        }
        None => {
            dsm.mapv_inplace( |v| if v.is_finite() { v * units_factor as f32 } else { v });
        }
    }
}
