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

pub mod errors;
pub mod warp;
pub mod grid;

use lazy_static::lazy_static;
use std::collections::HashMap;
use std::ffi::{CString, CStr};
use std::path::Path;
use std::ptr::{null, null_mut};
use libc::{c_char, c_int};

// we re-export these so that other crates don't have to use a direct gdal dependency to import.
pub use gdal::{self, Dataset, Driver, DriverManager, Metadata, MetadataEntry, GeoTransform, errors::GdalError};
pub use gdal::raster::{GdalType, RasterBand, Buffer, ResampleAlg};
pub use gdal::spatial_ref::{CoordTransform, CoordTransformOptions, SpatialRef};

use coreg_common::{Affine, BoundingBox, fs::extension};
use crate::errors::{Result, CoregGdalError, misc_error, last_gdal_error};

lazy_static! {
    // raster driver lookup - some drivers share extensions so this stays a curated map
    static ref EXT_MAP: HashMap<&'static str, &'static str> = HashMap::from( [ // file extension -> driver short name
        ("tif",  "GTiff"),
        ("tiff", "GTiff"),
        ("png",  "PNG"),
    ]);
}

pub fn get_driver_name_for_extension (ext: &str) -> Option<&'static str> {
    EXT_MAP.get( ext.to_lowercase().as_str()).map( |v| *v)
}

pub fn get_driver_for_path (path: impl AsRef<Path>) -> Option<gdal::Driver> {
    extension( &path)
        .and_then( |ext| get_driver_name_for_extension( ext.as_str()))
        .and_then( |n| DriverManager::get_driver_by_name(n).ok())
}

pub fn open_raster (path: impl AsRef<Path>) -> Result<Dataset> {
    Ok( Dataset::open( path.as_ref())? )
}

/// open an existing raster writable, e.g. to amend metadata after creation
pub fn open_raster_for_update (path: impl AsRef<Path>) -> Result<Dataset> {
    let options = gdal::DatasetOptions {
        open_flags: gdal::GdalOpenFlags::GDAL_OF_UPDATE | gdal::GdalOpenFlags::GDAL_OF_RASTER,
        ..Default::default()
    };
    Ok( Dataset::open_ex( path.as_ref(), options)? )
}

/* #region raster metadata access *********************************************************************************/

/// pixel-center convention of a raster sample, from the AREA_OR_POINT tag
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum AreaOrPoint {
    #[default]
    Area,
    Point,
}

impl AreaOrPoint {
    pub fn from_tag (tag: Option<&str>) -> Option<AreaOrPoint> {
        match tag {
            Some("Area") => Some(AreaOrPoint::Area),
            Some("Point") => Some(AreaOrPoint::Point),
            _ => None,
        }
    }

    pub fn tag_value (&self) -> &'static str {
        match *self {
            AreaOrPoint::Area => "Area",
            AreaOrPoint::Point => "Point",
        }
    }
}

/// the georeferencing subset of a raster dataset we carry through the pipeline
pub struct RasterMeta {
    pub width: usize,
    pub height: usize,
    pub transform: Option<Affine>,
    pub crs: Option<SpatialRef>,
    pub nodata: Option<f64>,
    pub area_or_point: Option<AreaOrPoint>,
}

impl RasterMeta {
    pub fn read (ds: &Dataset) -> Result<RasterMeta> {
        let (width, height) = ds.raster_size();
        let transform = ds.geo_transform().ok().map( |gt| Affine::from_geotransform(&gt));
        let crs = ds.spatial_ref().ok();
        let nodata = ds.rasterband(1)?.no_data_value();
        let tag = ds.metadata_item( "AREA_OR_POINT", "");
        let area_or_point = AreaOrPoint::from_tag( tag.as_deref());

        Ok( RasterMeta { width, height, transform, crs, nodata, area_or_point } )
    }
}

/// world bounding box of a raster grid under the given transform
pub fn world_bounds (transform: &Affine, width: usize, height: usize) -> BoundingBox {
    let (x0, y0) = transform.apply( 0.0, 0.0);
    let (x1, y1) = transform.apply( width as f64, height as f64);
    BoundingBox::new( x0.min(x1), y0.min(y1), x0.max(x1), y0.max(y1))
}

pub fn bounds_center (bbox: &BoundingBox) -> (f64, f64) {
    ( (bbox.left + bbox.right) / 2.0, (bbox.bottom + bbox.top) / 2.0 )
}

/* #endregion raster metadata access */

/* #region spatial reference helpers *********************************************************************************/

/// meters-per-unit factor and unit name of a projected SRS, taken from the
/// trailing linear unit entry of its WKT
pub fn linear_units_of (srs: &SpatialRef) -> (f64, String) {
    if let Ok(wkt) = srs.to_wkt() {
        if let Some((name, factor)) = last_unit_entry( &wkt) {
            return (factor, name)
        }
    }
    (1.0, "metre".to_string())
}

/// last `UNIT["name",factor]` (or WKT2 `LENGTHUNIT`) entry of a WKT string.
/// For a projected CRS the trailing unit entry is the linear unit.
fn last_unit_entry (wkt: &str) -> Option<(String, f64)> {
    let mut result = None;
    let mut i = 0;
    while let Some(pos) = wkt[i..].find( "UNIT[") {
        let start = i + pos + "UNIT[".len();
        if let Some(entry) = parse_unit_body( &wkt[start..]) {
            result = Some(entry);
        }
        i = start;
    }
    result
}

fn parse_unit_body (s: &str) -> Option<(String, f64)> {
    let s = s.trim_start().strip_prefix('"')?;
    let end = s.find('"')?;
    let name = s[..end].to_string();

    let rest = s[end + 1..].trim_start().strip_prefix(',')?;
    let num_end = rest.find( |c: char| c == ',' || c == ']')?;
    let factor: f64 = rest[..num_end].trim().parse().ok()?;

    Some( (name, factor) )
}

/// strict CRS equality via WKT comparison
pub fn srs_same (a: &SpatialRef, b: &SpatialRef) -> bool {
    match (a.to_wkt(), b.to_wkt()) {
        (Ok(wa), Ok(wb)) => wa == wb,
        _ => false,
    }
}

/// UTM zone of a lon/lat position, with the Norway/Svalbard exceptions
pub fn utm_zone (lon_deg: f64, lat_deg: f64) -> u32 {
    if lat_deg > 55.0 && lat_deg < 64.0 && lon_deg > 2.0 && lon_deg < 6.0 {
        return 32
    }

    if lat_deg > 71.0 {
        if lon_deg >= 6.0 && lon_deg < 9.0 {
            return 31
        }
        if (lon_deg >= 9.0 && lon_deg < 12.0) || (lon_deg >= 18.0 && lon_deg < 21.0) {
            return 33
        }
        if (lon_deg >= 21.0 && lon_deg < 24.0) || (lon_deg >= 30.0 && lon_deg < 33.0) {
            return 35
        }
    }

    (((lon_deg + 180.0) / 6.0).trunc() as u32 % 60) + 1
}

/// best-guess projected (WGS84 UTM) SpatialRef for a lon/lat position
pub fn srs_utm_from_lon_lat (lon_deg: f64, lat_deg: f64) -> Result<(SpatialRef, u32)> {
    let zone = utm_zone( lon_deg, lat_deg);
    let epsg_base = if lat_deg < 0.0 { 32700 } else { 32600 };
    Ok( SpatialRef::from_epsg( epsg_base + zone).map( |srs| (srs, zone))? )
}

pub fn srs_epsg_4326 () -> SpatialRef { SpatialRef::from_epsg(4326).unwrap() }

/* #endregion spatial reference helpers */

/* #region raster creation *********************************************************************************/

/// create a single/multi band GTiff with the given georeferencing
pub fn create_gtiff<T: GdalType> (
    path: impl AsRef<Path>,
    width: usize, height: usize, n_bands: usize,
    transform: &Affine,
    crs: Option<&SpatialRef>,
    nodata: Option<f64>,
) -> Result<Dataset> {
    let driver = DriverManager::get_driver_by_name( "GTiff")?;
    let mut ds = driver.create_with_band_type::<T, _>( path.as_ref(), width, height, n_bands)?;

    ds.set_geo_transform( &transform.to_geotransform())?;
    if let Some(srs) = crs {
        ds.set_spatial_ref( srs)?;
    }
    if let Some(nv) = nodata {
        for b in 1..=n_bands {
            ds.rasterband(b)?.set_no_data_value( Some(nv))?;
        }
    }

    Ok(ds)
}

/// the safe gdal wrapper has no surface for band descriptions so we set them directly
pub fn set_band_description (ds: &Dataset, band_index: usize, description: &str) -> Result<()> {
    let c_desc = CString::new( description)?;
    unsafe {
        let c_band = gdal_sys::GDALGetRasterBand( ds.c_dataset(), band_index as c_int);
        if c_band == null_mut() {
            return Err( misc_error( format!("no raster band {}", band_index)))
        }
        gdal_sys::GDALSetDescription( c_band, c_desc.as_ptr());
    }
    Ok(())
}

/* #endregion raster creation */

#[cfg(test)]
mod tests {
    use super::*;

    const UTM_FT_WKT: &str = r#"PROJCS["NAD83 / UTM zone 15N (ftUS)",GEOGCS["NAD83",DATUM["North_American_Datum_1983",SPHEROID["GRS 1980",6378137,298.257222101]],PRIMEM["Greenwich",0],UNIT["degree",0.0174532925199433]],PROJECTION["Transverse_Mercator"],UNIT["US survey foot",0.304800609601219,AUTHORITY["EPSG","9003"]]]"#;

    #[test]
    fn wkt_linear_unit_entry() {
        let (name, factor) = last_unit_entry( UTM_FT_WKT).unwrap();
        assert_eq!( name, "US survey foot");
        assert!( (factor - 0.304800609601219).abs() < 1e-15);
    }

    #[test]
    fn utm_zones() {
        assert_eq!( utm_zone( -95.4, 29.7), 15); // Houston
        assert_eq!( utm_zone( 0.0, 51.0), 31);
        assert_eq!( utm_zone( 4.0, 60.0), 32);   // Norway exception
    }
}
