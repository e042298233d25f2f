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

use coreg_gdal::grid::{GridOutputType, GRID_NODATA};

use crate::dataset::GeoDataset;
use crate::errors::Result;
use crate::hexbin::{self, DEFAULT_EDGE_SIZE, DEFAULT_THRESHOLD};
use crate::mesh_io::{self, unit_conversion};
use crate::stages::{self, PointStream, Stage};

/// native resolution of a mesh: mean vertex spacing from hexagonal binning,
/// scaled into meters when the mesh carries a unit tag
pub fn calculate_resolution (ds: &mut GeoDataset) -> Result<()> {
    let tag = ds.role.tag();
    let kind = ds.kind.tag();

    let mesh = mesh_io::load_mesh( &ds.path)?;
    let mut spacing = hexbin::average_point_spacing( &mesh.vertices, DEFAULT_EDGE_SIZE, DEFAULT_THRESHOLD)?;

    match &mesh.units {
        None => {
            warn!( "Linear unit for {}-{} not detected --> meters assumed", tag, kind);
            ds.units_factor = 1.0;
            ds.units_name = Some( "meters".to_string());
        }
        Some(units) => {
            match unit_conversion( units) {
                Some(factor) => {
                    info!( "Linear unit for {}-{} detected as {}", tag, kind, units);
                    ds.units_factor = factor;
                    ds.units_name = Some( units.clone());
                    spacing *= factor;
                }
                None => {
                    warn!( "Unknown linear unit {} for {}-{} --> meters assumed", units, tag, kind);
                    ds.units_factor = 1.0;
                    ds.units_name = Some( "meters".to_string());
                }
            }
        }
    }

    ds.native_resolution = spacing;
    info!( "Calculated native resolution for {}-{} as: {:.1} meters", tag, kind, ds.native_resolution);
    Ok(())
}

/// converts mesh vertices to meters and grids them to a DSM, via the same
/// stage backend as the point cloud path but fed from the in-memory vertices
pub fn create_dsm (ds: &mut GeoDataset) -> Result<()> {
    info!( "Extracting DSM from {}-{} with resolution of: {} meters",
           ds.role.tag(), ds.kind.tag(), ds.resolution());

    let mesh = mesh_io::load_mesh( &ds.path)?;
    let tmp = tempfile::Builder::new().prefix( "coreg_dsm_").suffix( ".tif").tempfile()?;

    let pipeline = [
        Stage::Transformation { matrix: stages::units_scale_matrix( ds.units_factor) },
        Stage::WriteRaster {
            path: tmp.path().to_path_buf(),
            resolution: ds.resolution(),
            output_type: GridOutputType::Max,
            nodata: GRID_NODATA,
            crs_wkt: None,
        },
    ];
    stages::execute_from( PointStream::Xyz( mesh.vertices), &pipeline)?;

    ds.read_dsm( tmp.path(), true)
}
