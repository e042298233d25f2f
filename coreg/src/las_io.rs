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
use std::path::Path;

use las::{Builder, Header, Point, Reader, Transform, Vector, Vlr, Writer};
use tracing::info;

use crate::errors::{Result, CoregError, op_failed};
use crate::residuals::N_FIELDS;

const WKT_USER_ID: &str = "LASF_Projection";
const WKT_RECORD_ID: u16 = 2112;

const EXTRA_BYTES_USER_ID: &str = "LASF_Spec";
const EXTRA_BYTES_RECORD_ID: u16 = 4;
const EXTRA_BYTES_DOUBLE: u8 = 10;

pub const RESIDUAL_DIM_NAMES: [&str; N_FIELDS] =
    ["ResidualX", "ResidualY", "ResidualZ", "ResidualHoriz", "Residual3D"];

/// reads all points and the header of a LAS/LAZ file
pub fn read_las (path: impl AsRef<Path>) -> Result<(Vec<Point>, Header)> {
    let mut reader = Reader::from_path( path.as_ref())?;
    let header = reader.header().clone();
    let mut points = Vec::with_capacity( header.number_of_points() as usize);
    for p in reader.points() {
        points.push( p?);
    }
    Ok( (points, header) )
}

/// WKT of the horizontal CRS stored in the header VLRs, if any
pub fn header_wkt (header: &Header) -> Option<String> {
    for vlr in header.vlrs().iter().chain( header.evlrs().iter()) {
        if vlr.user_id == WKT_USER_ID && vlr.record_id == WKT_RECORD_ID {
            let wkt = String::from_utf8_lossy( &vlr.data);
            let wkt = wkt.trim_end_matches( '\0').trim();
            if !wkt.is_empty() {
                return Some( wkt.to_string())
            }
        }
    }
    None
}

/// scale/offset specification as configured: either a literal value or "auto"
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum AutoOr {
    Auto,
    Value(f64),
}

impl AutoOr {
    pub fn parse (s: &str) -> Result<AutoOr> {
        if s.trim().eq_ignore_ascii_case( "auto") {
            return Ok( AutoOr::Auto)
        }
        s.trim().parse::<f64>()
            .map( AutoOr::Value)
            .map_err( |_| CoregError::InvalidConfig( format!("not a number or \"auto\": {}", s)))
    }
}

fn axis_bounds (points: &[Point], axis: usize) -> (f64, f64) {
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    for p in points {
        let v = match axis { 0 => p.x, 1 => p.y, _ => p.z };
        if v < min { min = v }
        if v > max { max = v }
    }
    (min, max)
}

fn resolve_transform (points: &[Point], axis: usize, scale: AutoOr, offset: AutoOr) -> Transform {
    let (min, max) = axis_bounds( points, axis);

    let offset = match offset {
        AutoOr::Value(v) => v,
        AutoOr::Auto => min,
    };
    let scale = match scale {
        AutoOr::Value(v) => v,
        AutoOr::Auto => {
            // spread the coordinate range over the i32 record domain
            let range = (max - offset).abs().max( (min - offset).abs());
            if range > 0.0 { range / (i32::MAX as f64 - 1.0) } else { 0.001 }
        }
    };

    Transform { scale, offset }
}

/// parameters of a registered LAS/LAZ write
#[derive(Debug)]
pub struct LasWriteParams {
    pub a_srs: Option<String>,
    pub offset: [AutoOr; 3],
    pub scale: [AutoOr; 3],
}

impl Default for LasWriteParams {
    fn default() -> Self {
        LasWriteParams { a_srs: None, offset: [AutoOr::Auto; 3], scale: [AutoOr::Auto; 3] }
    }
}

/// writes `points` to a LAS/LAZ file, forwarding the source header's version,
/// point format and VLRs, applying the configured scale/offset and overriding
/// the CRS with `a_srs` when given
pub fn write_las (points: &[Point], template: &Header, path: impl AsRef<Path>, params: &LasWriteParams) -> Result<()> {
    let v = template.version();
    let mut builder = Builder::from( (v.major, v.minor));
    builder.point_format = template.point_format().clone();
    builder.generating_software = format!("COREG {}", env!("CARGO_PKG_VERSION"));

    // forward source VLRs; the CRS record is replaced when we override it
    for vlr in template.vlrs() {
        if params.a_srs.is_some() && vlr.user_id == WKT_USER_ID && vlr.record_id == WKT_RECORD_ID {
            continue
        }
        builder.vlrs.push( vlr.clone());
    }
    if let Some(wkt) = &params.a_srs {
        builder.vlrs.push( wkt_vlr( wkt));
    }

    builder.transforms = Vector {
        x: resolve_transform( points, 0, params.scale[0], params.offset[0]),
        y: resolve_transform( points, 1, params.scale[1], params.offset[1]),
        z: resolve_transform( points, 2, params.scale[2], params.offset[2]),
    };

    let header = builder.into_header().map_err( |e| op_failed( e.to_string()))?;
    let mut writer = Writer::from_path( path.as_ref(), header)?;
    for p in points {
        writer.write_point( p.clone())?;
    }

    Ok(())
}

/// writes a LAS 1.4 companion file with the five residual components attached
/// to every point as extra-byte dimensions (LAS 1.4 is the version known to
/// carry additional point dimensions)
pub fn write_las_with_residuals (
    points: &[Point],
    residuals: &[[f64; N_FIELDS]],
    template: &Header,
    path: impl AsRef<Path>,
) -> Result<()> {
    if points.len() != residuals.len() {
        return Err( op_failed( "point and residual counts differ"))
    }

    let mut builder = Builder::from( (1, 4));
    let mut format = template.point_format().clone();
    format.extra_bytes += (N_FIELDS * 8) as u16;
    builder.point_format = format;
    builder.generating_software = format!("COREG {}", env!("CARGO_PKG_VERSION"));

    for vlr in template.vlrs() {
        builder.vlrs.push( vlr.clone());
    }
    builder.vlrs.push( extra_bytes_vlr());
    builder.transforms = template.transforms().clone();

    let header = builder.into_header().map_err( |e| op_failed( e.to_string()))?;
    let mut writer = Writer::from_path( path.as_ref(), header)?;

    for (p, res) in points.iter().zip( residuals.iter()) {
        let mut p = p.clone();
        for v in res {
            p.extra_bytes.extend_from_slice( &v.to_le_bytes());
        }
        writer.write_point( p)?;
    }

    info!( "wrote {} points with residual dimensions", points.len());
    Ok(())
}

fn wkt_vlr (wkt: &str) -> Vlr {
    let mut data = wkt.as_bytes().to_vec();
    data.push( 0); // LAS stores the WKT as a nul terminated string
    Vlr {
        user_id: WKT_USER_ID.to_string(),
        record_id: WKT_RECORD_ID,
        description: "OGC Coordinate System WKT".to_string(),
        data,
    }
}

/// LAS 1.4 extra bytes descriptor block: one 192 byte record per dimension
fn extra_bytes_vlr () -> Vlr {
    let mut data = Vec::with_capacity( RESIDUAL_DIM_NAMES.len() * 192);
    for name in RESIDUAL_DIM_NAMES {
        data.extend_from_slice( &extra_bytes_descriptor( name));
    }
    Vlr {
        user_id: EXTRA_BYTES_USER_ID.to_string(),
        record_id: EXTRA_BYTES_RECORD_ID,
        description: "ICP residual dimensions".to_string(),
        data,
    }
}

fn extra_bytes_descriptor (name: &str) -> [u8; 192] {
    let mut d = [0u8; 192];
    // [0..2] reserved, [2] data type, [3] options
    d[2] = EXTRA_BYTES_DOUBLE;
    // [4..36] name
    let name_bytes = name.as_bytes();
    d[4..4 + name_bytes.len().min(31)].copy_from_slice( &name_bytes[..name_bytes.len().min(31)]);
    // [36..40] unused, [40..64] no_data, [64..88] min, [88..112] max,
    // [112..136] scale, [136..160] offset - all zero (unused options bits)
    // [160..192] description
    let desc = b"point to plane ICP residual";
    d[160..160 + desc.len()].copy_from_slice( desc);
    d
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auto_or_parsing() {
        assert_eq!( AutoOr::parse( "auto").unwrap(), AutoOr::Auto);
        assert_eq!( AutoOr::parse( "AUTO").unwrap(), AutoOr::Auto);
        assert_eq!( AutoOr::parse( "0.01").unwrap(), AutoOr::Value(0.01));
        assert!( AutoOr::parse( "bogus").is_err());
    }

    #[test]
    fn auto_offset_uses_axis_minimum() {
        let mut p0 = Point::default();
        p0.x = 100.0; p0.y = 5.0; p0.z = -2.0;
        let mut p1 = Point::default();
        p1.x = 200.0; p1.y = 50.0; p1.z = 8.0;
        let points = vec![p0, p1];

        let t = resolve_transform( &points, 0, AutoOr::Auto, AutoOr::Auto);
        assert_eq!( t.offset, 100.0);
        assert!( t.scale > 0.0);

        let t = resolve_transform( &points, 2, AutoOr::Value(0.001), AutoOr::Value(0.0));
        assert_eq!( t.offset, 0.0);
        assert_eq!( t.scale, 0.001);
    }

    #[test]
    fn extra_bytes_block_layout() {
        let vlr = extra_bytes_vlr();
        assert_eq!( vlr.data.len(), 5 * 192);
        // each record: data_type double, name at offset 4
        let rec = &vlr.data[0..192];
        assert_eq!( rec[2], EXTRA_BYTES_DOUBLE);
        assert!( rec[4..13].starts_with( b"ResidualX"));
        let rec = &vlr.data[4 * 192..];
        assert!( rec[4..14].starts_with( b"Residual3D"));
    }

    #[test]
    fn wkt_vlr_is_nul_terminated() {
        let vlr = wkt_vlr( "PROJCS[\"x\"]");
        assert_eq!( vlr.record_id, WKT_RECORD_ID);
        assert_eq!( *vlr.data.last().unwrap(), 0u8);
    }
}
