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
use tracing::{info, warn};

use coreg_gdal::{SpatialRef, linear_units_of};
use coreg_gdal::grid::{GridOutputType, GRID_NODATA};

use crate::dataset::GeoDataset;
use crate::errors::Result;
use crate::hexbin::{self, DEFAULT_EDGE_SIZE, DEFAULT_THRESHOLD};
use crate::las_io;
use crate::stages::{self, PointStream, Stage};

/// native resolution of a point cloud: mean point spacing from hexagonal
/// binning, scaled into meters by the CRS linear unit
pub fn calculate_resolution (ds: &mut GeoDataset) -> Result<()> {
    let tag = ds.role.tag();
    let kind = ds.kind.tag();

    let stream = stages::read_source( &ds.path)?;

    let crs = match &stream {
        PointStream::Las { header, .. } => {
            las_io::header_wkt( header).and_then( |wkt| SpatialRef::from_wkt( &wkt).ok())
        }
        PointStream::Xyz(_) => None,
    };

    match &crs {
        None => {
            warn!( "Linear unit for {}-{} not detected --> meters assumed", tag, kind);
            ds.units_factor = 1.0;
            ds.units_name = Some( "m".to_string());
        }
        Some(c) if !c.is_projected() => {
            warn!( "Coordinate system for {}-{} not projected --> meters assumed", tag, kind);
            ds.units_factor = 1.0;
            ds.units_name = Some( "m".to_string());
        }
        Some(c) => {
            let (factor, units) = linear_units_of( c);
            info!( "Linear unit for {}-{} detected as {}.", tag, kind, units);
            ds.units_factor = factor;
            ds.units_name = Some( units);
        }
    }
    ds.crs = crs;

    let spacing = hexbin::average_point_spacing( &stream.xyz(), DEFAULT_EDGE_SIZE, DEFAULT_THRESHOLD)?;
    ds.native_resolution = ds.units_factor * spacing;

    info!( "Calculated native resolution for {}-{} as: {:.1} meters", tag, kind, ds.native_resolution);
    Ok(())
}

/// converts the point cloud to meters and grids it to a DSM through a
/// temporary raster that is removed on every exit path
pub fn create_dsm (ds: &mut GeoDataset) -> Result<()> {
    info!( "Extracting DSM from {}-{} with resolution of: {:.2} meters",
           ds.role.tag(), ds.kind.tag(), ds.resolution());

    let tmp = tempfile::Builder::new().prefix( "coreg_dsm_").suffix( ".tif").tempfile()?;

    let pipeline = [
        Stage::Read { path: ds.path.clone() },
        Stage::Transformation { matrix: stages::units_scale_matrix( ds.units_factor) },
        Stage::WriteRaster {
            path: tmp.path().to_path_buf(),
            resolution: ds.resolution(),
            output_type: GridOutputType::Max,
            nodata: GRID_NODATA,
            crs_wkt: None,
        },
    ];
    stages::execute( &pipeline)?;

    ds.read_dsm( tmp.path(), true)
}
