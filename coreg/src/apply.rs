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
use std::path::PathBuf;

use nalgebra::Matrix4;
use ndarray::Array2;
use tracing::info;

use coreg_common::Affine;
use coreg_common::fs::{basename, extension, filename, with_suffix};
use coreg_gdal::{
    AreaOrPoint, Buffer, Metadata, RasterMeta, SpatialRef,
    create_gtiff, open_raster, open_raster_for_update, set_band_description,
};
use coreg_gdal::grid::{GridOutputType, GRID_NODATA};

use crate::config::CoregConfig;
use crate::dataset::{DataKind, GeoDataset};
use crate::errors::{Result, CoregError, op_failed};
use crate::infill::nodata_mask;
use crate::las_io::{self, AutoOr, LasWriteParams, RESIDUAL_DIM_NAMES};
use crate::mesh_io;
use crate::points::raster_to_points;
use crate::residuals::ResidualField;
use crate::stages::{self, PointStream, Stage};

/// registration solved by the external modules, in meters pipeline space
pub struct RegistrationResult {
    pub matrix: Matrix4<f64>,

    pub omega: f64,
    pub phi: f64,
    pub kappa: f64,
    pub trans_x: f64,
    pub trans_y: f64,
    pub trans_z: f64,
    pub scale: f64,
    pub n_pairs: u64,

    pub rmse_x: f64,
    pub rmse_y: f64,
    pub rmse_z: f64,
    pub rmse_3d: f64,

    /// moving point origins at the terminal ICP iteration (N x 3, meters)
    pub residual_origins: Array2<f64>,
    /// point-to-plane directions at the terminal ICP iteration (N x 3, meters)
    pub residual_vectors: Array2<f64>,
}

/// the unit-aware transform handed to the output writers: a raw matrix for
/// meshes, a pipeline stage for rasters and point clouds
pub enum RegistrationTransformation {
    Matrix(Matrix4<f64>),
    Stage(Stage),
}

/// applies the solved registration to the original AOI file, re-rasterizing,
/// re-meshing or re-writing as the data kind demands
pub struct ApplyRegistration {
    fnd_file: PathBuf,
    fnd_crs: Option<SpatialRef>,
    fnd_units_factor: f64,
    fnd_units: Option<String>,

    aoi_file: PathBuf,
    aoi_kind: DataKind,
    aoi_nodata: Option<f64>,
    aoi_resolution: f64,
    aoi_crs: Option<SpatialRef>,
    aoi_units_factor: f64,
    aoi_area_or_point: AreaOrPoint,

    registration: RegistrationResult,
    save_residuals: bool,
    offset: [AutoOr; 3],
    scale: [AutoOr; 3],

    out_path: PathBuf,
}

impl ApplyRegistration {
    pub fn new (
        fnd: &GeoDataset,
        aoi: &GeoDataset,
        registration: RegistrationResult,
        config: &CoregConfig,
        output_format: Option<&str>,
    ) -> Result<ApplyRegistration> {
        let ext = match output_format {
            Some(f) => f.trim_start_matches('.').to_string(),
            None => extension( &aoi.path)
                .ok_or_else( || op_failed( format!("{} has no extension", aoi.path.display())))?,
        };

        let out_path = with_suffix( &config.output_dir, &aoi.path, "_registered", &ext)
            .ok_or_else( || op_failed( format!("cannot derive output name from {}", aoi.path.display())))?;

        Ok( ApplyRegistration {
            fnd_file: fnd.path.clone(),
            fnd_crs: fnd.crs.clone(),
            fnd_units_factor: fnd.units_factor,
            fnd_units: fnd.units_name.clone(),

            aoi_file: aoi.path.clone(),
            aoi_kind: aoi.kind,
            aoi_nodata: aoi.nodata,
            aoi_resolution: aoi.native_resolution,
            aoi_crs: aoi.crs.clone(),
            aoi_units_factor: aoi.units_factor,
            aoi_area_or_point: aoi.area_or_point,

            registration,
            save_residuals: config.icp_save_residuals,
            offset: [
                AutoOr::parse( &config.offset_x)?,
                AutoOr::parse( &config.offset_y)?,
                AutoOr::parse( &config.offset_z)?,
            ],
            scale: [
                AutoOr::parse( &config.scale_x)?,
                AutoOr::parse( &config.scale_y)?,
                AutoOr::parse( &config.scale_z)?,
            ],

            out_path,
        })
    }

    pub fn out_path (&self) -> &PathBuf {
        &self.out_path
    }

    /// the AOI-to-foundation transformation. The solver matrix only holds in
    /// meters, so it is bracketed by the unit conversions of both datasets:
    /// `T = to_fnd_units * R * aoi_to_meters`
    pub fn registration_transformation (&self) -> RegistrationTransformation {
        let mut aoi_to_meters = Matrix4::identity() * self.aoi_units_factor;
        aoi_to_meters[(3, 3)] = 1.0;

        let mut meters_to_fnd = Matrix4::identity() * (1.0 / self.fnd_units_factor);
        meters_to_fnd[(3, 3)] = 1.0;

        let aoi_to_fnd = meters_to_fnd * self.registration.matrix * aoi_to_meters;

        if self.aoi_kind == DataKind::Mesh {
            RegistrationTransformation::Matrix( aoi_to_fnd)
        } else {
            RegistrationTransformation::Stage( Stage::Transformation { matrix: aoi_to_fnd })
        }
    }

    fn registration_stage (&self) -> Result<Stage> {
        match self.registration_transformation() {
            RegistrationTransformation::Stage(s) => Ok(s),
            RegistrationTransformation::Matrix(_) => Err( CoregError::UnexpectedTransformKind(
                "writer pipelines need a transformation stage, not a raw matrix".to_string())),
        }
    }

    fn registration_matrix (&self) -> Result<Matrix4<f64>> {
        match self.registration_transformation() {
            RegistrationTransformation::Matrix(m) => Ok(m),
            RegistrationTransformation::Stage(_) => Err( CoregError::UnexpectedTransformKind(
                "mesh application needs a raw matrix, not a pipeline stage".to_string())),
        }
    }

    /// dispatch to the writer matching the AOI data kind
    pub fn apply (&self) -> Result<()> {
        match self.aoi_kind {
            DataKind::Dsm => self.apply_dsm(),
            DataKind::Mesh => self.apply_mesh(),
            DataKind::PointCloud => self.apply_pointcloud(),
        }
    }

    /* #region DSM *********************************************************************************/

    /// the 3D transform cannot be expressed by editing the 2D raster transform,
    /// so the DSM is read as points, transformed, and re-rastered
    fn apply_dsm (&self) -> Result<()> {
        let src = open_raster( &self.aoi_file)?;
        let meta = RasterMeta::read( &src)?;
        let band = src.rasterband(1)?;

        let buffer = band.read_as::<f32>( (0, 0), (meta.width, meta.height), (meta.width, meta.height), None)?;
        let (cols, rows) = buffer.shape();
        let dsm = Array2::from_shape_vec( (rows, cols), buffer.data().to_vec())
            .expect( "gdal buffer is row-major");

        let transform = meta.transform.unwrap_or( Affine::identity());
        let area_or_point = meta.area_or_point.unwrap_or_default();

        // exclude nodata samples from the transformed stream
        let mask = nodata_mask( &dsm, meta.nodata);
        let points = raster_to_points( &dsm, &mask, &transform, area_or_point);
        let mut xyz: Vec<[f64; 3]> = Vec::with_capacity( points.nrows());
        for i in 0..points.nrows() {
            xyz.push( [points[[i, 0]], points[[i, 1]], points[[i, 2]]]);
        }

        let mut pipeline: Vec<Stage> = Vec::new();

        // the AOI may have undergone a CRS change during preprocessing
        if let (Some(file_crs), Some(aoi_crs)) = (&meta.crs, &self.aoi_crs) {
            let in_wkt = file_crs.to_wkt()?;
            let out_wkt = aoi_crs.to_wkt()?;
            if in_wkt != out_wkt {
                pipeline.push( Stage::Reprojection { in_wkt, out_wkt });
            }
        }

        pipeline.push( self.registration_stage()?);
        pipeline.push( Stage::WriteRaster {
            path: self.out_path.clone(),
            resolution: self.aoi_resolution,
            output_type: GridOutputType::Idw,
            nodata: self.aoi_nodata.unwrap_or( GRID_NODATA),
            crs_wkt: match &self.aoi_crs {
                Some(crs) => Some( crs.to_wkt()?),
                None => None,
            },
        });

        stages::execute_from( PointStream::Xyz( xyz), &pipeline)?;
        self.tag_registered_raster()?;

        info!( "Registration has been applied to AOI-DSM and saved to: {}", self.out_path.display());

        if self.save_residuals {
            self.write_dsm_residuals()?;
        }
        Ok(())
    }

    fn tag_registered_raster (&self) -> Result<()> {
        let mut ds = open_raster_for_update( &self.out_path)?;

        ds.set_metadata_item( "COREG_VERSION", env!("CARGO_PKG_VERSION"), "")?;
        ds.set_metadata_item( "COREG_INFO", &format!(
            "Data registered and adjusted to {} by COREG. Total registration mean square error {:.3}",
            filename( &self.fnd_file).unwrap_or_default(), self.registration.rmse_3d), "")?;
        ds.set_metadata_item( "TIFFTAG_IMAGEDESCRIPTION", "RegisteredCompliment", "")?;
        ds.set_metadata_item( "AREA_OR_POINT", self.aoi_area_or_point.tag_value(), "")?;

        Ok(())
    }

    fn write_dsm_residuals (&self) -> Result<()> {
        let field = ResidualField::new(
            &self.registration.residual_origins, &self.registration.residual_vectors, self.fnd_units_factor)?;

        let src = open_raster( &self.out_path)?;
        let meta = RasterMeta::read( &src)?;
        let band = src.rasterband(1)?;
        let buffer = band.read_as::<f32>( (0, 0), (meta.width, meta.height), (meta.width, meta.height), None)?;
        let (cols, rows) = buffer.shape();
        let dsm: Vec<f32> = buffer.data().to_vec();

        let transform = meta.transform.unwrap_or( Affine::identity());
        let area_or_point = meta.area_or_point.unwrap_or_default();
        let offset = if area_or_point == AreaOrPoint::Area { 0.5 } else { 0.0 };
        let nodata = meta.nodata.unwrap_or( GRID_NODATA);

        // interpolate the residual field at every output cell center
        let mut bands: [Vec<f32>; 5] = [
            Vec::with_capacity( rows * cols), Vec::with_capacity( rows * cols), Vec::with_capacity( rows * cols),
            Vec::with_capacity( rows * cols), Vec::with_capacity( rows * cols),
        ];
        for r in 0..rows {
            for c in 0..cols {
                let idx = r * cols + c;
                let is_void = !dsm[idx].is_finite() || dsm[idx] as f64 == nodata;
                if is_void {
                    for b in bands.iter_mut() { b.push( nodata as f32) }
                    continue
                }
                let (x, y) = transform.apply( c as f64 + offset, r as f64 + offset);
                let res = field.interpolate( x, y);
                for (b, v) in bands.iter_mut().zip( res.iter()) {
                    b.push( *v as f32);
                }
            }
        }

        let res_path = self.out_path.with_file_name( format!(
            "{}_residuals.tif", basename( &self.out_path).unwrap_or_default()));

        let ds = create_gtiff::<f32>(
            &res_path, cols, rows, 6, &transform, meta.crs.as_ref(), Some(nodata))?;

        let mut write_band = |index: usize, data: Vec<f32>| -> Result<()> {
            let mut buffer = Buffer::new( (cols, rows), data);
            ds.rasterband( index)?.write( (0, 0), (cols, rows), &mut buffer)?;
            Ok(())
        };

        write_band( 1, dsm)?;
        let [rx, ry, rz, rh, r3] = bands;
        write_band( 2, rx)?;
        write_band( 3, ry)?;
        write_band( 4, rz)?;
        write_band( 5, rh)?;
        write_band( 6, r3)?;

        set_band_description( &ds, 1, "DSM")?;
        for (i, name) in RESIDUAL_DIM_NAMES.iter().enumerate() {
            set_band_description( &ds, i + 2, name)?;
        }

        info!( "ICP residuals have been computed for each registered AOI-DSM cell and saved to: {}", res_path.display());
        Ok(())
    }

    /* #endregion DSM */

    /* #region mesh *********************************************************************************/

    /// meshes rarely carry CRS information, so only geometry and units change
    fn apply_mesh (&self) -> Result<()> {
        let mut mesh = mesh_io::load_mesh( &self.aoi_file)?;
        let matrix = self.registration_matrix()?;

        for v in mesh.vertices.iter_mut() {
            let p = matrix * nalgebra::Vector4::new( v[0], v[1], v[2], 1.0);
            *v = [p[0], p[1], p[2]];
        }
        mesh.units = self.fnd_units.clone();

        let material = if extension( &self.aoi_file).as_deref() == Some( "obj") {
            basename( &self.aoi_file)
        } else {
            None
        };
        mesh_io::write_mesh( &mesh, &self.out_path, material.as_deref())?;

        info!( "Registration has been applied to AOI-MESH and saved to: {}", self.out_path.display());

        if self.save_residuals {
            let field = ResidualField::new(
                &self.registration.residual_origins, &self.registration.residual_vectors, self.fnd_units_factor)?;

            // attach the interpolated residuals as vertex attributes; PLY is
            // the output format known to carry custom vertex attributes
            let mut registered = mesh_io::load_mesh( &self.out_path)?;
            let values: Vec<[f64; 5]> = registered.vertices.iter()
                .map( |v| field.interpolate( v[0], v[1]))
                .collect();

            for (i, name) in RESIDUAL_DIM_NAMES.iter().enumerate() {
                registered.vertex_attributes.push(
                    (name.to_string(), values.iter().map( |r| r[i]).collect()));
            }

            let res_path = self.out_path.with_file_name( format!(
                "{}_residuals.ply", basename( &self.out_path).unwrap_or_default()));
            mesh_io::write_mesh( &registered, &res_path, None)?;

            info!( "ICP residuals have been computed for each registered AOI-MESH vertex and saved to: {}", res_path.display());
        }
        Ok(())
    }

    /* #endregion mesh */

    /* #region point cloud *********************************************************************************/

    fn apply_pointcloud (&self) -> Result<()> {
        let params = LasWriteParams {
            a_srs: match &self.fnd_crs {
                Some(crs) => Some( crs.to_wkt()?),
                None => None,
            },
            offset: self.offset,
            scale: self.scale,
        };

        let pipeline = [
            Stage::Read { path: self.aoi_file.clone() },
            self.registration_stage()?,
            Stage::WriteLas { path: self.out_path.clone(), params },
        ];
        stages::execute( &pipeline)?;

        info!( "Registration has been applied to AOI-PCLOUD and saved to: {}", self.out_path.display());

        if self.save_residuals {
            let field = ResidualField::new(
                &self.registration.residual_origins, &self.registration.residual_vectors, self.fnd_units_factor)?;

            let (points, header) = las_io::read_las( &self.out_path)?;
            let residuals: Vec<[f64; 5]> = points.iter()
                .map( |p| field.interpolate( p.x, p.y))
                .collect();

            let res_path = self.out_path.with_file_name( format!(
                "{}_residuals.laz", basename( &self.out_path).unwrap_or_default()));
            las_io::write_las_with_residuals( &points, &residuals, &header, &res_path)?;

            info!( "ICP residuals have been computed for each registered AOI-PCLOUD point and saved to: {}", res_path.display());
        }
        Ok(())
    }

    /* #endregion point cloud */
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    fn registration_with_matrix (matrix: Matrix4<f64>) -> RegistrationResult {
        RegistrationResult {
            matrix,
            omega: 0.0, phi: 0.0, kappa: 0.0,
            trans_x: 0.0, trans_y: 0.0, trans_z: 0.0,
            scale: 1.0,
            n_pairs: 0,
            rmse_x: 0.0, rmse_y: 0.0, rmse_z: 0.0, rmse_3d: 0.0,
            residual_origins: Array2::zeros( (0, 3)),
            residual_vectors: Array2::zeros( (0, 3)),
        }
    }

    fn applier (aoi_kind: DataKind, aoi_uf: f64, fnd_uf: f64, matrix: Matrix4<f64>) -> ApplyRegistration {
        ApplyRegistration {
            fnd_file: PathBuf::from( "fnd.tif"),
            fnd_crs: None,
            fnd_units_factor: fnd_uf,
            fnd_units: Some( "m".to_string()),
            aoi_file: PathBuf::from( "aoi.laz"),
            aoi_kind,
            aoi_nodata: None,
            aoi_resolution: 1.0,
            aoi_crs: None,
            aoi_units_factor: aoi_uf,
            aoi_area_or_point: AreaOrPoint::Area,
            registration: registration_with_matrix( matrix),
            save_residuals: false,
            offset: [AutoOr::Auto; 3],
            scale: [AutoOr::Auto; 3],
            out_path: PathBuf::from( "aoi_registered.laz"),
        }
    }

    #[test]
    fn units_bracket_the_solver_matrix() {
        // AOI in feet, foundation in meters, identity solution
        let a = applier( DataKind::PointCloud, 0.3048, 1.0, Matrix4::identity());

        let stage = a.registration_stage().unwrap();
        let m = match stage {
            Stage::Transformation { matrix } => matrix,
            _ => panic!( "expected a transformation stage"),
        };

        let p = m * nalgebra::Vector4::new( 1000.0, 2000.0, 50.0, 1.0);
        assert!( (p[0] - 304.8).abs() < 1e-9);
        assert!( (p[1] - 609.6).abs() < 1e-9);
        assert!( (p[2] - 15.24).abs() < 1e-9);
        assert_eq!( p[3], 1.0);
    }

    #[test]
    fn foundation_units_divide_back_out() {
        // both sides in feet: transforming into meters and back cancels
        let a = applier( DataKind::PointCloud, 0.3048, 0.3048, Matrix4::identity());
        let m = match a.registration_stage().unwrap() {
            Stage::Transformation { matrix } => matrix,
            _ => unreachable!(),
        };
        let p = m * nalgebra::Vector4::new( 100.0, 200.0, 300.0, 1.0);
        assert!( (p[0] - 100.0).abs() < 1e-9);
        assert!( (p[2] - 300.0).abs() < 1e-9);
    }

    #[test]
    fn mesh_gets_a_raw_matrix() {
        let a = applier( DataKind::Mesh, 1.0, 1.0, Matrix4::identity());
        assert!( matches!( a.registration_transformation(), RegistrationTransformation::Matrix(_)));
        assert!( a.registration_stage().is_err()); // the writer-pipeline view rejects it
    }

    #[test]
    fn rasters_and_pointclouds_get_a_stage() {
        let a = applier( DataKind::Dsm, 1.0, 1.0, Matrix4::identity());
        assert!( matches!( a.registration_transformation(), RegistrationTransformation::Stage(_)));
        assert!( a.registration_matrix().is_err());
    }
}
