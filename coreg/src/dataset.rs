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
use std::path::{Path, PathBuf};

use lazy_static::lazy_static;
use ndarray::Array2;
use tracing::{info, warn};

use coreg_common::Affine;
use coreg_common::fs::extension;
use coreg_gdal::{AreaOrPoint, RasterMeta, SpatialRef, open_raster};

use crate::config::CoregConfig;
use crate::errors::{Result, CoregError, unsupported_format};
use crate::{clip, dsm, infill, mesh, normalize, pointcloud, points};

lazy_static! {
    pub static ref DSM_FILETYPES: Vec<&'static str> = vec!["tif", "tiff"];
    pub static ref PCLOUD_FILETYPES: Vec<&'static str> = vec!["las", "laz", "bpf", "ply", "json"];
    pub static ref MESH_FILETYPES: Vec<&'static str> = vec!["obj", "ply", "stl", "gltf", "glb"];
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum DataKind {
    Dsm,
    PointCloud,
    Mesh,
}

impl DataKind {
    /// the kind a file extension maps to. A `.ply` holding triangles still
    /// enters as a point cloud unless the caller opens it as a mesh; the
    /// point-cloud set takes precedence, as in the extension tables.
    pub fn for_path (path: impl AsRef<Path>) -> Option<DataKind> {
        let ext = extension( &path)?;
        if DSM_FILETYPES.contains( &ext.as_str()) {
            Some(DataKind::Dsm)
        } else if PCLOUD_FILETYPES.contains( &ext.as_str()) {
            Some(DataKind::PointCloud)
        } else if MESH_FILETYPES.contains( &ext.as_str()) {
            Some(DataKind::Mesh)
        } else {
            None
        }
    }

    pub fn tag (&self) -> &'static str {
        match self {
            DataKind::Dsm => "DSM",
            DataKind::PointCloud => "PCLOUD",
            DataKind::Mesh => "MESH",
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Role {
    Foundation,
    Aoi,
}

impl Role {
    pub fn tag (&self) -> &'static str {
        match self {
            Role::Foundation => "Foundation",
            Role::Aoi => "AOI",
        }
    }
}

/// row/column sub range of a raster after clipping
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Window {
    pub row_off: usize,
    pub col_off: usize,
    pub rows: usize,
    pub cols: usize,
}

impl Window {
    /// transform of the windowed sub grid under the full grid's transform
    pub fn transform (&self, base: &Affine) -> Affine {
        base.mul( &Affine::new( 1.0, 0.0, self.col_off as f64, 0.0, 1.0, self.row_off as f64))
    }
}

/// one input file of the co-registration pipeline, across its preprocessing
/// lifecycle: opened and probed for native resolution, converted to a gridded
/// meters DSM, void-filled, bandpass-normalized and finally expanded into 3D
/// points (plus normals for the foundation).
pub struct GeoDataset {
    pub kind: DataKind,
    pub role: Role,
    pub path: PathBuf,

    pub native_resolution: f64,
    pub units_factor: f64,
    pub units_name: Option<String>,

    pub crs: Option<SpatialRef>,
    pub transform: Option<Affine>,
    pub area_or_point: AreaOrPoint,
    pub nodata: Option<f64>,

    pub dsm: Array2<f32>,
    pub infilled: Array2<f32>,
    pub nodata_mask: Array2<bool>,
    pub normed: Array2<u8>,
    pub point_cloud: Array2<f64>,
    pub normal_vectors: Option<Array2<f64>>,

    pub window: Option<Window>,
    pub processed: bool,

    pub(crate) weak_filter: f64,
    pub(crate) strong_filter: f64,
    resolution: f64,
}

impl GeoDataset {
    /// factory keyed by file extension; probes the native resolution eagerly so
    /// the driver can pick a common pipeline resolution before any gridding
    pub fn open (config: &CoregConfig, role: Role) -> Result<GeoDataset> {
        let path = match role {
            Role::Foundation => config.fnd_file.clone(),
            Role::Aoi => config.aoi_file.clone(),
        };

        let kind = DataKind::for_path( &path)
            .ok_or_else( || unsupported_format( path.display().to_string()))?;

        let mut ds = GeoDataset {
            kind,
            role,
            path,
            native_resolution: 0.0,
            units_factor: 1.0,
            units_name: None,
            crs: None,
            transform: None,
            area_or_point: AreaOrPoint::default(),
            nodata: None,
            dsm: Array2::zeros( (0, 0)),
            infilled: Array2::zeros( (0, 0)),
            nodata_mask: Array2::from_elem( (0, 0), false),
            normed: Array2::zeros( (0, 0)),
            point_cloud: Array2::zeros( (0, 3)),
            normal_vectors: None,
            window: None,
            processed: false,
            weak_filter: config.dsm_weak_filter,
            strong_filter: config.dsm_strong_filter,
            resolution: 0.0,
        };

        ds.calculate_resolution()?;
        Ok(ds)
    }

    pub fn resolution (&self) -> f64 {
        self.resolution
    }

    pub fn set_resolution (&mut self, value: f64) -> Result<()> {
        if value <= 0.0 {
            return Err( CoregError::InvalidResolution( value))
        }
        self.resolution = value;
        Ok(())
    }

    fn calculate_resolution (&mut self) -> Result<()> {
        match self.kind {
            DataKind::Dsm => dsm::calculate_resolution( self),
            DataKind::PointCloud => pointcloud::calculate_resolution( self),
            DataKind::Mesh => mesh::calculate_resolution( self),
        }
    }

    /// normalizes the source into the pipeline DSM representation (meters,
    /// pipeline resolution). For non-raster kinds this grids the samples first.
    pub fn create_dsm (&mut self, resample: bool, fallback_crs: Option<&SpatialRef>) -> Result<()> {
        if self.resolution <= 0.0 {
            return Err( CoregError::InvalidResolution( self.resolution))
        }
        match self.kind {
            DataKind::Dsm => dsm::create_dsm( self, resample, fallback_crs),
            DataKind::PointCloud => pointcloud::create_dsm( self),
            DataKind::Mesh => mesh::create_dsm( self),
        }
    }

    /// reads a prepared raster (the original DSM or a gridding product) into
    /// the dataset, honoring a clip window when one is set
    pub(crate) fn read_dsm (&mut self, path: &Path, force: bool) -> Result<()> {
        if self.dsm.len() > 0 && !force {
            return Ok(())
        }

        let src = open_raster( path)?;
        let meta = RasterMeta::read( &src)?;
        let band = src.rasterband(1)?;

        let base_transform = meta.transform.unwrap_or( Affine::identity());
        let (buffer, transform) = match self.window {
            None => {
                let buf = band.read_as::<f32>( (0, 0), (meta.width, meta.height), (meta.width, meta.height), None)?;
                (buf, base_transform)
            }
            Some(w) => {
                let buf = band.read_as::<f32>(
                    (w.col_off as isize, w.row_off as isize), (w.cols, w.rows), (w.cols, w.rows), None)?;
                (buf, w.transform( &base_transform))
            }
        };

        let (cols, rows) = buffer.shape();
        self.dsm = Array2::from_shape_vec( (rows, cols), buffer.data().to_vec())
            .expect( "gdal buffer is row-major");
        self.transform = Some( transform);
        self.nodata = meta.nodata;
        self.crs = meta.crs;

        self.area_or_point = match meta.area_or_point {
            Some(aop) => aop,
            None => {
                info!( "'AREA_OR_POINT' not supplied in {}-{} - defaulting to 'Area'", self.role.tag(), self.kind.tag());
                AreaOrPoint::Area
            }
        };

        if self.nodata.is_none() {
            info!( "{}-{} does not have a nodata value.", self.role.tag(), self.kind.tag());
        }
        if transform.is_identity() {
            warn!( "{}-{} has an identity transform.", self.role.tag(), self.kind.tag());
        }

        Ok(())
    }

    /// prepares the dataset for registration:
    /// infill -> normalize -> points (-> normals for the foundation)
    pub fn prepare (&mut self) -> Result<()> {
        info!( "Preparing {}-{} for registration.", self.role.tag(), self.kind.tag());

        let (infilled, mask) = infill::infill( &self.dsm, self.nodata)?;
        self.infilled = infilled;
        self.nodata_mask = mask;

        let transform = self.transform.ok_or_else( ||
            CoregError::MissingTransform( format!("{} has no transform after DSM creation", self.path.display())))?;

        self.normed = normalize::normalize( &self.infilled, &transform, self.weak_filter, self.strong_filter)?;

        self.point_cloud = points::raster_to_points( &self.dsm, &self.nodata_mask, &transform, self.area_or_point);

        if self.role == Role::Foundation {
            self.normal_vectors = Some( points::estimate_normals( &self.point_cloud, points::NORMAL_KNN)?);
        }

        self.processed = true;
        Ok(())
    }
}

/// opens both inputs, picks the pipeline resolution, grids, optionally clips
/// to the mutual overlap and runs the preparation chain on both datasets
pub fn prepare_pair (config: &CoregConfig) -> Result<(GeoDataset, GeoDataset)> {
    config.validate()?;

    let mut fnd = GeoDataset::open( config, Role::Foundation)?;
    let mut aoi = GeoDataset::open( config, Role::Aoi)?;

    let resolution = fnd.native_resolution
        .max( aoi.native_resolution)
        .max( config.min_resolution);
    info!( "Registration pipeline resolution: {:.2} meters", resolution);

    fnd.set_resolution( resolution)?;
    aoi.set_resolution( resolution)?;

    fnd.create_dsm( true, None)?;
    let fallback = fnd.crs.clone();
    aoi.create_dsm( true, fallback.as_ref())?;

    clip::clip_datasets( &mut fnd, &mut aoi, config)?;

    fnd.prepare()?;
    aoi.prepare()?;

    Ok( (fnd, aoi) )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_by_extension() {
        assert_eq!( DataKind::for_path( "a/b/dsm.TIF"), Some(DataKind::Dsm));
        assert_eq!( DataKind::for_path( "scan.laz"), Some(DataKind::PointCloud));
        assert_eq!( DataKind::for_path( "pipe.json"), Some(DataKind::PointCloud));
        assert_eq!( DataKind::for_path( "model.obj"), Some(DataKind::Mesh));
        assert_eq!( DataKind::for_path( "cloud.ply"), Some(DataKind::PointCloud));
        assert_eq!( DataKind::for_path( "notes.txt"), None);
    }

    #[test]
    fn window_transform_shifts_origin() {
        let base = Affine::new( 2.0, 0.0, 100.0, 0.0, -2.0, 200.0);
        let w = Window { row_off: 3, col_off: 5, rows: 10, cols: 10 };
        let t = w.transform( &base);
        assert_eq!( t.apply( 0.0, 0.0), (110.0, 194.0));
        // pixel scale is unchanged
        assert_eq!( t.a, 2.0);
        assert_eq!( t.e, -2.0);
    }
}
