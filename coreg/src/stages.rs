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
use std::fs;
use std::path::{Path, PathBuf};

use nalgebra::{Matrix4, Vector4};
use serde_json::Value;
use tracing::{debug, warn};

use coreg_gdal::{SpatialRef, CoordTransform};
use coreg_gdal::grid::{GridWriter, GridOutputType};
use coreg_common::fs::extension;
use crate::errors::{Result, CoregError, unsupported_format, empty_input, op_failed};
use crate::las_io::{self, LasWriteParams};
use crate::mesh_io;

/// a point-stream processing step. The preprocessing gridders and the
/// registration applier assemble the same small vocabulary of stages and hand
/// them to [`execute`]/[`execute_from`], so file-backed and in-memory point
/// sources run through one backend.
#[derive(Debug)]
pub enum Stage {
    /// load a point cloud file (or `.json` pipeline descriptor)
    Read { path: PathBuf },
    /// apply a homogeneous 4x4 transform to every sample
    Transformation { matrix: Matrix4<f64> },
    /// transform coordinates between two spatial reference systems (WKT)
    Reprojection { in_wkt: String, out_wkt: String },
    /// grid the stream into a raster
    WriteRaster {
        path: PathBuf,
        resolution: f64,
        output_type: GridOutputType,
        nodata: f64,
        crs_wkt: Option<String>,
    },
    /// write the stream as LAS/LAZ
    WriteLas { path: PathBuf, params: LasWriteParams },
}

/// the data flowing between stages. Full LAS records are kept when the source
/// is a LAS/LAZ file so that writers can forward every point attribute.
pub enum PointStream {
    Xyz(Vec<[f64; 3]>),
    Las { points: Vec<las::Point>, header: las::Header },
}

impl PointStream {
    pub fn len (&self) -> usize {
        match self {
            PointStream::Xyz(v) => v.len(),
            PointStream::Las { points, .. } => points.len(),
        }
    }

    /// coordinate triples of the stream, in stream order
    pub fn xyz (&self) -> Vec<[f64; 3]> {
        match self {
            PointStream::Xyz(v) => v.clone(),
            PointStream::Las { points, .. } => points.iter().map( |p| [p.x, p.y, p.z]).collect(),
        }
    }

    fn apply_matrix (&mut self, m: &Matrix4<f64>) {
        let apply = |x: f64, y: f64, z: f64| {
            let v = m * Vector4::new( x, y, z, 1.0);
            (v[0], v[1], v[2])
        };
        match self {
            PointStream::Xyz(v) => {
                for p in v.iter_mut() {
                    let (x, y, z) = apply( p[0], p[1], p[2]);
                    *p = [x, y, z];
                }
            }
            PointStream::Las { points, .. } => {
                for p in points.iter_mut() {
                    let (x, y, z) = apply( p.x, p.y, p.z);
                    p.x = x;
                    p.y = y;
                    p.z = z;
                }
            }
        }
    }

    fn reproject (&mut self, in_wkt: &str, out_wkt: &str) -> Result<()> {
        let src = SpatialRef::from_wkt( in_wkt)?;
        let dst = SpatialRef::from_wkt( out_wkt)?;
        let transform = CoordTransform::new( &src, &dst)?;

        let mut xs: Vec<f64> = Vec::with_capacity( self.len());
        let mut ys: Vec<f64> = Vec::with_capacity( self.len());
        let mut zs: Vec<f64> = Vec::with_capacity( self.len());
        for p in self.xyz() {
            xs.push( p[0]);
            ys.push( p[1]);
            zs.push( p[2]);
        }
        transform.transform_coords( &mut xs, &mut ys, &mut zs)?;

        match self {
            PointStream::Xyz(v) => {
                for (i, p) in v.iter_mut().enumerate() {
                    *p = [xs[i], ys[i], zs[i]];
                }
            }
            PointStream::Las { points, .. } => {
                for (i, p) in points.iter_mut().enumerate() {
                    p.x = xs[i];
                    p.y = ys[i];
                    p.z = zs[i];
                }
            }
        }
        Ok(())
    }
}

/// runs a stage list that starts with a `Read`
pub fn execute (stages: &[Stage]) -> Result<PointStream> {
    let (first, rest) = stages.split_first()
        .ok_or_else( || op_failed( "empty stage list"))?;

    let stream = match first {
        Stage::Read { path } => read_source( path)?,
        _ => return Err( op_failed( "stage list must start with a read stage")),
    };

    execute_from( stream, rest)
}

/// runs a stage list over an already materialized stream (in-memory arrays)
pub fn execute_from (mut stream: PointStream, stages: &[Stage]) -> Result<PointStream> {
    for stage in stages {
        match stage {
            Stage::Read { path } => {
                stream = read_source( path)?;
            }
            Stage::Transformation { matrix } => {
                stream.apply_matrix( matrix);
            }
            Stage::Reprojection { in_wkt, out_wkt } => {
                stream.reproject( in_wkt, out_wkt)?;
            }
            Stage::WriteRaster { path, resolution, output_type, nodata, crs_wkt } => {
                let points = stream.xyz();
                if points.is_empty() {
                    return Err( empty_input( "no points reached the raster writer"))
                }
                let mut writer = GridWriter::new( *resolution, *output_type);
                writer.set_nodata( *nodata);
                if let Some(wkt) = crs_wkt {
                    writer.set_crs( SpatialRef::from_wkt( wkt)?);
                }
                let (w, h) = writer.write( &points, path)?;
                debug!( "rasterized {} points to {} ({}x{})", points.len(), path.display(), w, h);
            }
            Stage::WriteLas { path, params } => {
                match &stream {
                    PointStream::Las { points, header } => {
                        las_io::write_las( points, header, path, params)?;
                    }
                    PointStream::Xyz(v) => {
                        let points: Vec<las::Point> = v.iter().map( |p| {
                            let mut lp = las::Point::default();
                            lp.x = p[0];
                            lp.y = p[1];
                            lp.z = p[2];
                            lp
                        }).collect();
                        las_io::write_las( &points, &las::Header::default(), path, params)?;
                    }
                }
            }
        }
    }
    Ok(stream)
}

/// loads a point source by extension; `.json` descriptors run their own
/// reader/filter stages with any writer stages stripped
pub fn read_source (path: &Path) -> Result<PointStream> {
    let ext = extension( &path).ok_or_else( || unsupported_format( path.display().to_string()))?;

    match ext.as_str() {
        "las" | "laz" => {
            let (points, header) = las_io::read_las( path)?;
            Ok( PointStream::Las { points, header } )
        }
        "ply" => {
            let mesh = mesh_io::load_mesh( path)?;
            Ok( PointStream::Xyz( mesh.vertices))
        }
        "json" => {
            let stages = stages_from_descriptor( path)?;
            execute( &stages)
        }
        other => Err( unsupported_format( format!("point cloud format .{}", other))),
    }
}

/// parses a JSON pipeline descriptor into a stage list. Reader and
/// transformation stages are kept; writer stages are stripped because the
/// pipeline appends its own writers.
pub fn stages_from_descriptor (path: &Path) -> Result<Vec<Stage>> {
    let text = fs::read_to_string( path)?;
    let value: Value = serde_json::from_str( &text)?;

    let items = value.as_array()
        .or_else( || value.get( "pipeline").and_then( |p| p.as_array()))
        .ok_or_else( || op_failed( format!("{} is not a pipeline descriptor", path.display())))?;

    let mut stages: Vec<Stage> = Vec::new();

    for item in items {
        match item {
            Value::String(filename) => {
                stages.push( Stage::Read { path: resolve_descriptor_path( path, filename) });
            }
            Value::Object(obj) => {
                let stage_type = obj.get( "type").and_then( |t| t.as_str()).unwrap_or( "");

                if stage_type.starts_with( "readers.") || (stage_type.is_empty() && obj.contains_key( "filename")) {
                    let filename = obj.get( "filename").and_then( |f| f.as_str())
                        .ok_or_else( || op_failed( "reader stage without filename"))?;
                    stages.push( Stage::Read { path: resolve_descriptor_path( path, filename) });
                } else if stage_type == "filters.transformation" {
                    let matrix = obj.get( "matrix").and_then( |m| m.as_str())
                        .ok_or_else( || op_failed( "transformation stage without matrix"))?;
                    stages.push( Stage::Transformation { matrix: parse_matrix( matrix)? });
                } else if stage_type.starts_with( "writers.") {
                    debug!( "stripping writer stage {} from descriptor", stage_type);
                } else {
                    warn!( "ignoring unsupported pipeline stage {:?}", stage_type);
                }
            }
            other => {
                warn!( "ignoring malformed pipeline entry {:?}", other);
            }
        }
    }

    if !stages.iter().any( |s| matches!( s, Stage::Read { .. })) {
        return Err( op_failed( format!("{} holds no readable stage", path.display())))
    }

    Ok(stages)
}

// relative reader paths resolve against the descriptor location
fn resolve_descriptor_path (descriptor: &Path, filename: &str) -> PathBuf {
    let p = PathBuf::from( filename);
    if p.is_absolute() {
        p
    } else {
        descriptor.parent().map( |d| d.join( &p)).unwrap_or( p)
    }
}

/// the scale-by-units transform applied ahead of gridding
pub fn units_scale_matrix (factor: f64) -> Matrix4<f64> {
    let mut m = Matrix4::identity() * factor;
    m[(3, 3)] = 1.0;
    m
}

/// 16 whitespace separated values, row major
pub fn parse_matrix (s: &str) -> Result<Matrix4<f64>> {
    let values: std::result::Result<Vec<f64>, _> = s.split_whitespace().map( |t| t.parse::<f64>()).collect();
    let values = values.map_err( |e| op_failed( format!("bad matrix element: {}", e)))?;
    if values.len() != 16 {
        return Err( op_failed( format!("matrix needs 16 elements, got {}", values.len())))
    }
    Ok( Matrix4::from_row_slice( &values))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn units_matrix_scales_points_not_w() {
        let m = units_scale_matrix( 0.3048);
        let mut stream = PointStream::Xyz( vec![[1000.0, 2000.0, 50.0]]);
        stream.apply_matrix( &m);
        let p = stream.xyz()[0];
        assert!( (p[0] - 304.8).abs() < 1e-9);
        assert!( (p[1] - 609.6).abs() < 1e-9);
        assert!( (p[2] - 15.24).abs() < 1e-9);
    }

    #[test]
    fn matrix_parsing_round_trip() {
        let m = parse_matrix( "1 0 0 10  0 1 0 20  0 0 1 30  0 0 0 1").unwrap();
        assert_eq!( m[(0, 3)], 10.0);
        assert_eq!( m[(2, 3)], 30.0);
        assert!( parse_matrix( "1 2 3").is_err());
    }

    #[test]
    fn descriptor_strips_writers_and_keeps_readers() {
        let dir = tempfile::tempdir().unwrap();
        let descriptor = dir.path().join( "pipe.json");
        fs::write( &descriptor, r#"{
            "pipeline": [
                "scan.laz",
                {"type": "filters.transformation", "matrix": "1 0 0 0 0 1 0 0 0 0 1 0 0 0 0 1"},
                {"type": "writers.gdal", "filename": "out.tif", "resolution": 1.0}
            ]
        }"#).unwrap();

        let stages = stages_from_descriptor( &descriptor).unwrap();
        assert_eq!( stages.len(), 2);
        assert!( matches!( &stages[0], Stage::Read { path } if path.ends_with( "scan.laz")));
        assert!( matches!( &stages[1], Stage::Transformation { .. }));
    }

    #[test]
    fn descriptor_without_reader_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let descriptor = dir.path().join( "pipe.json");
        fs::write( &descriptor, r#"[ {"type": "writers.las", "filename": "out.las"} ]"#).unwrap();
        assert!( stages_from_descriptor( &descriptor).is_err());
    }
}
