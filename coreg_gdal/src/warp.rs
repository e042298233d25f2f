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
use std::ffi::CString;
use std::fs;
use std::path::Path;
use std::ptr::{null, null_mut};

use gdal::{Dataset, GeoTransform};
use gdal::spatial_ref::SpatialRef;
use gdal_sys::{GDALWarpOptions, CPLErr::CE_None, GDALResampleAlg};
use libc::{c_void, c_char, c_int, c_uint, c_double};

use coreg_common::Affine;
use crate::errors::{Result, CoregGdalError, misc_error, last_gdal_error, reset_last_gdal_error};

#[derive(Clone)]
pub enum WarpResampleAlg {
    NearestNeighbour = GDALResampleAlg::GRA_NearestNeighbour as isize,
    Bilinear         = GDALResampleAlg::GRA_Bilinear as isize,
    Cubic            = GDALResampleAlg::GRA_Cubic as isize,
    CubicSpline      = GDALResampleAlg::GRA_CubicSpline as isize,
    Average          = GDALResampleAlg::GRA_Average as isize,
    Max              = GDALResampleAlg::GRA_Max as isize,
    Min              = GDALResampleAlg::GRA_Min as isize,
}

/// the output grid GDAL suggests when projecting a dataset into `tgt_srs`
/// (transform in target units plus pixel/line counts)
pub fn suggested_warp_output (src_ds: &Dataset, tgt_srs: &SpatialRef) -> Result<(Affine, usize, usize)> {
    unsafe {
        reset_last_gdal_error();

        let c_src_ds = src_ds.c_dataset();
        let src_srs = src_ds.spatial_ref().map_err( |_| CoregGdalError::NoSpatialReferenceSystem)?;
        let src_wkt = CString::new( src_srs.to_wkt()?)?;
        let tgt_wkt = CString::new( tgt_srs.to_wkt()?)?;

        let c_transform_arg = gdal_sys::GDALCreateGenImgProjTransformer(
            c_src_ds, src_wkt.as_ptr(), null_mut(), tgt_wkt.as_ptr(), 1, 0.0, 0);
        if c_transform_arg == null_mut() {
            return Err( CoregGdalError::GdalFunctionFailed("GDALCreateGenImgProjTransformer"))
        }

        let mut geo_transform: [c_double; 6] = [0.0; 6];
        let mut n_pixels: c_int = 0;
        let mut n_lines: c_int = 0;

        let res = gdal_sys::GDALSuggestedWarpOutput(
            c_src_ds, Some(gdal_sys::GDALGenImgProjTransform), c_transform_arg,
            geo_transform.as_mut_ptr(), &mut n_pixels as *mut c_int, &mut n_lines as *mut c_int);

        gdal_sys::GDALDestroyGenImgProjTransformer( c_transform_arg);

        if res != CE_None {
            return Err( last_gdal_error())
        }

        Ok( (Affine::from_geotransform(&geo_transform), n_pixels as usize, n_lines as usize) )
    }
}

/// reprojects a full raster dataset into a target SRS, letting GDAL suggest
/// the output grid. This is a deliberately narrow warp surface - band subsets,
/// approximation transformers and forced extents are not needed here.
pub struct ReprojectBuilder<'a> {
    src_ds: &'a Dataset,
    tgt_filename: CString,

    tgt_srs: Option<&'a SpatialRef>,
    tgt_format: Option<CString>,

    src_nodata: Option<c_double>,
    tgt_nodata: Option<c_double>,

    resample_alg: WarpResampleAlg,
}

impl<'a> ReprojectBuilder<'a> {
    pub fn new<P: AsRef<Path>> (src_ds: &'a Dataset, tgt: P) -> Result<ReprojectBuilder<'a>> {
        let path = tgt.as_ref();
        let tgt_str = path.to_str().ok_or( CoregGdalError::InvalidFileName( path.display().to_string()))?;
        let tgt_filename = CString::new(tgt_str)?;

        Ok( ReprojectBuilder {
            src_ds,
            tgt_filename,
            tgt_srs: None,
            tgt_format: None,
            src_nodata: None,
            tgt_nodata: None,
            resample_alg: WarpResampleAlg::NearestNeighbour,
        })
    }

    pub fn set_tgt_srs (&mut self, srs: &'a SpatialRef) -> &mut ReprojectBuilder<'a> {
        self.tgt_srs = Some(srs);
        self
    }

    pub fn set_tgt_format (&mut self, tgt_format: &str) -> Result<&mut ReprojectBuilder<'a>> {
        self.tgt_format = Some( CString::new(tgt_format)?);
        Ok(self)
    }

    pub fn set_nodata (&mut self, src_nodata: f64, tgt_nodata: f64) -> &mut ReprojectBuilder<'a> {
        self.src_nodata = Some(src_nodata);
        self.tgt_nodata = Some(tgt_nodata);
        self
    }

    pub fn set_resample_alg (&mut self, alg: WarpResampleAlg) -> &mut ReprojectBuilder<'a> {
        self.resample_alg = alg;
        self
    }

    pub fn exec (&self) -> Result<Dataset> {
        let mut tgt_ds = self.create_tgt_ds()?;
        self.chunk_and_warp( &mut tgt_ds).map( |_| tgt_ds)
    }

    fn create_tgt_ds (&self) -> Result<Dataset> {
        unsafe {
            reset_last_gdal_error();

            let c_src_ds = self.src_ds.c_dataset();
            let src_srs = self.src_ds.spatial_ref().map_err( |_| CoregGdalError::NoSpatialReferenceSystem)?;
            let src_wkt = CString::new( src_srs.to_wkt()?)?;
            let tgt_srs = if let Some(srs) = self.tgt_srs { srs } else { &src_srs };
            let tgt_wkt = CString::new( tgt_srs.to_wkt()?)?;

            let tgt_format = if let Some(format) = &self.tgt_format { format.as_ptr() } else { null() };

            // replace any previous output file
            let path = Path::new( self.tgt_filename.to_str().unwrap()); // checked during new()
            if path.is_file() { fs::remove_file(path)? }

            let c_driver = gdal_sys::GDALGetDriverByName( tgt_format);
            if c_driver == null_mut() {
                return Err( misc_error( format!("unknown output format {:?}", self.tgt_format)))
            }

            let mut geo_transform: [c_double; 6] = [0.0; 6];
            let mut n_pixels: c_int = 0;
            let mut n_lines: c_int = 0;

            let c_transform_arg = gdal_sys::GDALCreateGenImgProjTransformer(
                c_src_ds, src_wkt.as_ptr(), null_mut(), tgt_wkt.as_ptr(), 1, 0.0, 0);
            if c_transform_arg == null_mut() {
                return Err( CoregGdalError::GdalFunctionFailed("GDALCreateGenImgProjTransformer"))
            }

            if CE_None != gdal_sys::GDALSuggestedWarpOutput( c_src_ds, Some(gdal_sys::GDALGenImgProjTransform), c_transform_arg,
                                                            geo_transform.as_mut_ptr(), &mut n_pixels as *mut c_int, &mut n_lines as *mut c_int) {
                gdal_sys::GDALDestroyGenImgProjTransformer( c_transform_arg);
                return Err( last_gdal_error())
            }
            gdal_sys::GDALDestroyGenImgProjTransformer( c_transform_arg);

            let n_bands = self.src_ds.raster_count() as c_int;
            let data_type = gdal_sys::GDALGetRasterDataType( gdal_sys::GDALGetRasterBand( c_src_ds, 1));

            let c_tgt_ds = gdal_sys::GDALCreate( c_driver, self.tgt_filename.as_ptr(), n_pixels, n_lines, n_bands, data_type, null_mut());
            if c_tgt_ds == null_mut() {
                return Err( last_gdal_error())
            }

            gdal_sys::GDALSetProjection( c_tgt_ds, tgt_wkt.as_ptr());
            gdal_sys::GDALSetGeoTransform( c_tgt_ds, &mut geo_transform as *mut c_double);

            Ok( Dataset::from_c_dataset( c_tgt_ds))
        }
    }

    fn chunk_and_warp (&self, tgt_ds: &mut Dataset) -> Result<()> {
        unsafe {
            reset_last_gdal_error();

            let c_src_ds = self.src_ds.c_dataset();
            let c_tgt_ds = tgt_ds.c_dataset();

            let n_bands = self.src_ds.raster_count();
            if n_bands == 0 {
                return Err( misc_error( "no raster bands in input"))
            }

            let c_warp_options = gdal_sys::GDALCreateWarpOptions();
            let warp_options: &mut GDALWarpOptions = c_warp_options.as_mut().ok_or( last_gdal_error())?;
            warp_options.hSrcDS = c_src_ds;
            warp_options.hDstDS = c_tgt_ds;
            warp_options.dfWarpMemoryLimit = 1073741824 as c_double; // 1G
            warp_options.nBandCount = 0; // all bands
            warp_options.panSrcBands = null_mut();
            warp_options.panDstBands = null_mut();
            warp_options.eResampleAlg = self.resample_alg.clone() as c_uint;
            warp_options.pfnProgress = Some(gdal_sys::GDALDummyProgress);

            if let Some(nodata) = self.src_nodata {
                let c_nodatas = gdal_sys::CPLMalloc( std::mem::size_of::<c_double>() * n_bands) as *mut c_double;
                for i in 0..n_bands { *(c_nodatas.offset(i as isize)) = nodata }
                warp_options.padfSrcNoDataReal = c_nodatas; // freed by GDAL
            }
            if let Some(nodata) = self.tgt_nodata {
                for b in 1..=n_bands {
                    tgt_ds.rasterband(b)?.set_no_data_value( Some(nodata))?;
                }
            }

            let c_transformer_arg = gdal_sys::GDALCreateGenImgProjTransformer(
                c_src_ds, gdal_sys::GDALGetProjectionRef(c_src_ds),
                c_tgt_ds, gdal_sys::GDALGetProjectionRef(c_tgt_ds),
                0, 0.0, 0);
            if c_transformer_arg == null_mut() {
                gdal_sys::GDALDestroyWarpOptions( c_warp_options);
                return Err( last_gdal_error())
            }

            warp_options.pTransformerArg = c_transformer_arg;
            warp_options.pfnTransformer = Some(gdal_sys::GDALGenImgProjTransform);

            let c_warp_op = gdal_sys::GDALCreateWarpOperation( c_warp_options);
            if c_warp_op == null_mut() {
                gdal_sys::GDALDestroyGenImgProjTransformer( c_transformer_arg);
                gdal_sys::GDALDestroyWarpOptions( c_warp_options);
                return Err( last_gdal_error());
            }

            let x_size = gdal_sys::GDALGetRasterXSize( c_tgt_ds);
            let y_size = gdal_sys::GDALGetRasterYSize( c_tgt_ds);

            let res = gdal_sys::GDALChunkAndWarpImage( c_warp_op, 0, 0, x_size, y_size);

            gdal_sys::GDALDestroyWarpOperation( c_warp_op);
            gdal_sys::GDALDestroyGenImgProjTransformer( c_transformer_arg);

            if res == CE_None {
                gdal_sys::GDALFlushCache( c_tgt_ds);
                Ok(())
            } else {
                Err( last_gdal_error())
            }
        }
    }
}

/// reproject `src_ds` into `tgt_srs` with the given resampler, carrying the
/// nodata value through, and return the (re-opened) warped dataset
pub fn reproject_to_srs<P: AsRef<Path>> (
    src_ds: &Dataset, tgt_path: P, tgt_srs: &SpatialRef,
    alg: WarpResampleAlg, nodata: Option<f64>,
) -> Result<Dataset> {
    let mut warper = ReprojectBuilder::new( src_ds, tgt_path)?;
    warper.set_tgt_srs( tgt_srs);
    warper.set_tgt_format( "GTiff")?;
    warper.set_resample_alg( alg);
    if let Some(nv) = nodata {
        warper.set_nodata( nv, nv);
    }
    warper.exec()
}
