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
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use ply_rs_bw::parser::Parser;
use ply_rs_bw::ply::{Addable, DefaultElement, ElementDef, Encoding, Ply, Property, PropertyDef, PropertyType, ScalarType};
use ply_rs_bw::writer::Writer as PlyWriter;
use tracing::warn;

use coreg_common::fs::{basename, extension};
use crate::errors::{Result, CoregError, mesh_error, unsupported_format};

/// triangle mesh payload: vertex positions, triangle indices, an optional
/// linear unit tag and optional per-vertex scalar attributes
pub struct MeshData {
    pub vertices: Vec<[f64; 3]>,
    pub faces: Vec<[u32; 3]>,
    pub units: Option<String>,
    pub vertex_attributes: Vec<(String, Vec<f64>)>,
}

impl MeshData {
    pub fn new (vertices: Vec<[f64; 3]>, faces: Vec<[u32; 3]>) -> MeshData {
        MeshData { vertices, faces, units: None, vertex_attributes: Vec::new() }
    }
}

/// meters-per-unit for a mesh unit tag
pub fn unit_conversion (units: &str) -> Option<f64> {
    match units.to_lowercase().as_str() {
        "m" | "meter" | "meters" | "metre" | "metres" => Some(1.0),
        "mm" | "millimeter" | "millimeters" => Some(0.001),
        "cm" | "centimeter" | "centimeters" => Some(0.01),
        "km" | "kilometer" | "kilometers" => Some(1000.0),
        "ft" | "foot" | "feet" => Some(0.3048),
        "in" | "inch" | "inches" => Some(0.0254),
        "yd" | "yard" | "yards" => Some(0.9144),
        _ => None,
    }
}

pub fn load_mesh (path: impl AsRef<Path>) -> Result<MeshData> {
    let path = path.as_ref();
    let ext = extension( &path).ok_or_else( || unsupported_format( path.display().to_string()))?;

    match ext.as_str() {
        "obj" => load_obj( path),
        "ply" => load_ply( path),
        "stl" => load_stl( path),
        "gltf" | "glb" => load_gltf( path),
        other => Err( unsupported_format( format!("mesh format .{}", other))),
    }
}

/// writes a mesh in the format given by the output extension. For OBJ output a
/// material named `material_name` is attached the way mesh editors expect it
/// (a sibling .mtl file).
pub fn write_mesh (mesh: &MeshData, path: impl AsRef<Path>, material_name: Option<&str>) -> Result<()> {
    let path = path.as_ref();
    let ext = extension( &path).ok_or_else( || unsupported_format( path.display().to_string()))?;

    match ext.as_str() {
        "obj" => write_obj( mesh, path, material_name),
        "ply" => write_ply( mesh, path),
        "stl" => write_stl( mesh, path),
        other => Err( unsupported_format( format!("mesh output format .{}", other))),
    }
}

/* #region OBJ *********************************************************************************/

fn load_obj (path: &Path) -> Result<MeshData> {
    let options = tobj::LoadOptions { triangulate: true, single_index: true, ..Default::default() };
    let (models, _materials) = tobj::load_obj( path, &options)
        .map_err( |e| mesh_error( format!("{}: {}", path.display(), e)))?;

    let mut vertices: Vec<[f64; 3]> = Vec::new();
    let mut faces: Vec<[u32; 3]> = Vec::new();

    for model in &models {
        let base = vertices.len() as u32;
        let positions = &model.mesh.positions;
        for chunk in positions.chunks_exact(3) {
            vertices.push( [chunk[0] as f64, chunk[1] as f64, chunk[2] as f64]);
        }
        for idx in model.mesh.indices.chunks_exact(3) {
            faces.push( [base + idx[0], base + idx[1], base + idx[2]]);
        }
    }

    if vertices.is_empty() {
        return Err( mesh_error( format!("no vertices in {}", path.display())))
    }

    Ok( MeshData::new( vertices, faces) )
}

fn write_obj (mesh: &MeshData, path: &Path, material_name: Option<&str>) -> Result<()> {
    let mut out = BufWriter::new( File::create( path)?);

    if let Some(name) = material_name {
        // keep the material definition next to the obj
        let mtl_path = path.with_extension( "mtl");
        let mut mtl = BufWriter::new( File::create( &mtl_path)?);
        writeln!( mtl, "newmtl {}", name)?;
        writeln!( mtl, "Ka 1.0 1.0 1.0")?;
        writeln!( mtl, "Kd 1.0 1.0 1.0")?;

        if let Some(mtl_name) = mtl_path.file_name().and_then( |n| n.to_str()) {
            writeln!( out, "mtllib {}", mtl_name)?;
        }
        writeln!( out, "usemtl {}", name)?;
    }

    for v in &mesh.vertices {
        writeln!( out, "v {} {} {}", v[0], v[1], v[2])?;
    }
    for f in &mesh.faces {
        // obj indices are 1-based
        writeln!( out, "f {} {} {}", f[0] + 1, f[1] + 1, f[2] + 1)?;
    }

    Ok(())
}

/* #endregion OBJ */

/* #region PLY *********************************************************************************/

fn property_as_f64 (p: &Property) -> Option<f64> {
    match p {
        Property::Float(v) => Some(*v as f64),
        Property::Double(v) => Some(*v),
        Property::Int(v) => Some(*v as f64),
        Property::UInt(v) => Some(*v as f64),
        Property::Short(v) => Some(*v as f64),
        Property::UShort(v) => Some(*v as f64),
        Property::Char(v) => Some(*v as f64),
        Property::UChar(v) => Some(*v as f64),
        _ => None,
    }
}

fn load_ply (path: &Path) -> Result<MeshData> {
    let mut file = File::open( path)?;
    let ply = Parser::<DefaultElement>::new().read_ply( &mut file)
        .map_err( |e| mesh_error( format!("{}: {}", path.display(), e)))?;

    let mut vertices: Vec<[f64; 3]> = Vec::new();
    if let Some(elems) = ply.payload.get( "vertex") {
        for elem in elems {
            let x = elem.get( "x").and_then( property_as_f64);
            let y = elem.get( "y").and_then( property_as_f64);
            let z = elem.get( "z").and_then( property_as_f64);
            match (x, y, z) {
                (Some(x), Some(y), Some(z)) => vertices.push( [x, y, z]),
                _ => return Err( mesh_error( format!("vertex without x/y/z in {}", path.display()))),
            }
        }
    }
    if vertices.is_empty() {
        return Err( mesh_error( format!("no vertices in {}", path.display())))
    }

    let mut faces: Vec<[u32; 3]> = Vec::new();
    if let Some(elems) = ply.payload.get( "face") {
        for elem in elems {
            let indices: Option<Vec<u32>> = match elem.get( "vertex_indices").or_else( || elem.get( "vertex_index")) {
                Some(Property::ListUInt(list)) => Some( list.clone()),
                Some(Property::ListInt(list)) => Some( list.iter().map( |i| *i as u32).collect()),
                Some(Property::ListUShort(list)) => Some( list.iter().map( |i| *i as u32).collect()),
                _ => None,
            };
            if let Some(idx) = indices {
                // fan-triangulate anything beyond a triangle
                for i in 2..idx.len() {
                    faces.push( [idx[0], idx[i - 1], idx[i]]);
                }
            }
        }
    }

    Ok( MeshData::new( vertices, faces) )
}

fn write_ply (mesh: &MeshData, path: &Path) -> Result<()> {
    let mut ply = Ply::<DefaultElement>::new();
    ply.header.encoding = Encoding::Ascii;

    let mut vertex_def = ElementDef::new( "vertex".to_string());
    for name in ["x", "y", "z"] {
        vertex_def.properties.add( PropertyDef::new( name.to_string(), PropertyType::Scalar(ScalarType::Double)));
    }
    for (name, _) in &mesh.vertex_attributes {
        vertex_def.properties.add( PropertyDef::new( name.clone(), PropertyType::Scalar(ScalarType::Double)));
    }
    ply.header.elements.add( vertex_def);

    let mut face_def = ElementDef::new( "face".to_string());
    face_def.properties.add( PropertyDef::new(
        "vertex_indices".to_string(), PropertyType::List(ScalarType::UChar, ScalarType::UInt)));
    ply.header.elements.add( face_def);

    let mut vertex_elems: Vec<DefaultElement> = Vec::with_capacity( mesh.vertices.len());
    for (i, v) in mesh.vertices.iter().enumerate() {
        let mut elem = DefaultElement::new();
        elem.insert( "x".to_string(), Property::Double(v[0]));
        elem.insert( "y".to_string(), Property::Double(v[1]));
        elem.insert( "z".to_string(), Property::Double(v[2]));
        for (name, values) in &mesh.vertex_attributes {
            elem.insert( name.clone(), Property::Double( values[i]));
        }
        vertex_elems.push( elem);
    }
    ply.payload.insert( "vertex".to_string(), vertex_elems);

    let mut face_elems: Vec<DefaultElement> = Vec::with_capacity( mesh.faces.len());
    for f in &mesh.faces {
        let mut elem = DefaultElement::new();
        elem.insert( "vertex_indices".to_string(), Property::ListUInt( f.to_vec()));
        face_elems.push( elem);
    }
    ply.payload.insert( "face".to_string(), face_elems);

    ply.make_consistent().map_err( |e| mesh_error( e.to_string()))?;

    let mut file = BufWriter::new( File::create( path)?);
    PlyWriter::new().write_ply( &mut file, &mut ply)
        .map_err( |e| mesh_error( e.to_string()))?;

    Ok(())
}

/* #endregion PLY */

/* #region STL *********************************************************************************/

fn load_stl (path: &Path) -> Result<MeshData> {
    let mut file = File::open( path)?;
    let stl = stl_io::read_stl( &mut file)
        .map_err( |e| mesh_error( format!("{}: {}", path.display(), e)))?;

    let vertices: Vec<[f64; 3]> = stl.vertices.iter()
        .map( |v| [v[0] as f64, v[1] as f64, v[2] as f64])
        .collect();
    let faces: Vec<[u32; 3]> = stl.faces.iter()
        .map( |f| [f.vertices[0] as u32, f.vertices[1] as u32, f.vertices[2] as u32])
        .collect();

    if vertices.is_empty() {
        return Err( mesh_error( format!("no vertices in {}", path.display())))
    }

    Ok( MeshData::new( vertices, faces) )
}

fn write_stl (mesh: &MeshData, path: &Path) -> Result<()> {
    let mut triangles: Vec<stl_io::Triangle> = Vec::with_capacity( mesh.faces.len());

    for f in &mesh.faces {
        let a = mesh.vertices[f[0] as usize];
        let b = mesh.vertices[f[1] as usize];
        let c = mesh.vertices[f[2] as usize];

        let u = [b[0] - a[0], b[1] - a[1], b[2] - a[2]];
        let v = [c[0] - a[0], c[1] - a[1], c[2] - a[2]];
        let mut n = [
            u[1] * v[2] - u[2] * v[1],
            u[2] * v[0] - u[0] * v[2],
            u[0] * v[1] - u[1] * v[0],
        ];
        let len = (n[0] * n[0] + n[1] * n[1] + n[2] * n[2]).sqrt();
        if len > 0.0 {
            n = [n[0] / len, n[1] / len, n[2] / len];
        }

        triangles.push( stl_io::Triangle {
            normal: stl_io::Normal::new( [n[0] as f32, n[1] as f32, n[2] as f32]),
            vertices: [
                stl_io::Vertex::new( [a[0] as f32, a[1] as f32, a[2] as f32]),
                stl_io::Vertex::new( [b[0] as f32, b[1] as f32, b[2] as f32]),
                stl_io::Vertex::new( [c[0] as f32, c[1] as f32, c[2] as f32]),
            ],
        });
    }

    let mut file = File::create( path)?;
    stl_io::write_stl( &mut file, triangles.iter())
        .map_err( |e| mesh_error( e.to_string()))?;

    Ok(())
}

/* #endregion STL */

/* #region glTF *********************************************************************************/

fn load_gltf (path: &Path) -> Result<MeshData> {
    let (document, buffers, _images) = gltf::import( path)
        .map_err( |e| mesh_error( format!("{}: {}", path.display(), e)))?;

    let mut vertices: Vec<[f64; 3]> = Vec::new();
    let mut faces: Vec<[u32; 3]> = Vec::new();

    for mesh in document.meshes() {
        for primitive in mesh.primitives() {
            let reader = primitive.reader( |buffer| buffers.get( buffer.index()).map( |b| b.0.as_slice()));
            let base = vertices.len() as u32;

            if let Some(positions) = reader.read_positions() {
                for p in positions {
                    vertices.push( [p[0] as f64, p[1] as f64, p[2] as f64]);
                }
            }
            if let Some(indices) = reader.read_indices() {
                let idx: Vec<u32> = indices.into_u32().collect();
                for tri in idx.chunks_exact(3) {
                    faces.push( [base + tri[0], base + tri[1], base + tri[2]]);
                }
            }
        }
    }

    if vertices.is_empty() {
        return Err( mesh_error( format!("no vertices in {}", path.display())))
    }

    // glTF is metric by specification
    let mut data = MeshData::new( vertices, faces);
    data.units = Some( "m".to_string());
    Ok(data)
}

/* #endregion glTF */

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    fn square_mesh () -> MeshData {
        MeshData::new(
            vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [1.0, 1.0, 0.0], [0.0, 1.0, 0.0]],
            vec![[0, 1, 2], [0, 2, 3]],
        )
    }

    #[test]
    fn unit_tags() {
        assert_eq!( unit_conversion( "m"), Some(1.0));
        assert_eq!( unit_conversion( "Feet"), Some(0.3048));
        assert_eq!( unit_conversion( "parsec"), None);
    }

    #[test]
    fn obj_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join( "square.obj");

        write_obj( &square_mesh(), &path, Some("square")).unwrap();
        let loaded = load_obj( &path).unwrap();

        assert_eq!( loaded.vertices.len(), 4);
        assert_eq!( loaded.faces.len(), 2);
        assert_eq!( loaded.vertices[2], [1.0, 1.0, 0.0]);

        // the material file exists and carries the requested name
        let mut mtl = String::new();
        File::open( dir.path().join( "square.mtl")).unwrap().read_to_string( &mut mtl).unwrap();
        assert!( mtl.contains( "newmtl square"));
    }

    #[test]
    fn ply_round_trip_with_attributes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join( "square.ply");

        let mut mesh = square_mesh();
        mesh.vertex_attributes.push( ("ResidualX".to_string(), vec![0.1, 0.2, 0.3, 0.4]));

        write_ply( &mesh, &path).unwrap();
        let loaded = load_ply( &path).unwrap();
        assert_eq!( loaded.vertices.len(), 4);
        assert_eq!( loaded.faces.len(), 2);
    }

    #[test]
    fn stl_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join( "square.stl");

        write_stl( &square_mesh(), &path).unwrap();
        let loaded = load_stl( &path).unwrap();
        // STL stores per-triangle vertices; the reader re-indexes them
        assert_eq!( loaded.faces.len(), 2);
        assert!( loaded.vertices.len() >= 4);
    }

    #[test]
    fn unknown_extension_is_unsupported() {
        assert!( matches!( load_mesh( "mesh.xyz"), Err(CoregError::UnsupportedFormat(_))));
    }
}
