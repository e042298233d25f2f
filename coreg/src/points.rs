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
use kdtree::KdTree;
use kdtree::distance::squared_euclidean;
use nalgebra::{Matrix3, Vector3};
use ndarray::Array2;

use coreg_common::Affine;
use coreg_gdal::AreaOrPoint;
use crate::errors::{Result, empty_input};

/// number of neighbors of the plane fit, including the point itself
pub const NORMAL_KNN: usize = 9;

/// converts a gridded elevation raster to 3D points in row-major cell order,
/// keeping only cells flagged valid in the mask. For `Area` rasters the sample
/// is taken to sit at the pixel center, so pixel indices get a half cell offset
/// before they go through the transform.
pub fn raster_to_points (
    dsm: &Array2<f32>,
    mask: &Array2<bool>,
    transform: &Affine,
    area_or_point: AreaOrPoint,
) -> Array2<f64> {
    let (rows, cols) = dsm.dim();
    let offset = if area_or_point == AreaOrPoint::Area { 0.5 } else { 0.0 };

    let mut xyz: Vec<f64> = Vec::with_capacity( mask.iter().filter( |m| **m).count() * 3);

    for r in 0..rows {
        for c in 0..cols {
            if !mask[[r, c]] { continue }
            let u = c as f64 + offset;
            let v = r as f64 + offset;
            let (x, y) = transform.apply( u, v);
            xyz.push( x);
            xyz.push( y);
            xyz.push( dsm[[r, c]] as f64);
        }
    }

    let n = xyz.len() / 3;
    Array2::from_shape_vec( (n, 3), xyz).expect( "row-major point buffer")
}

/// per-point surface normals from a k-nearest-neighbor plane fit. The normal is
/// the eigenvector of the neighborhood covariance with the smallest eigenvalue;
/// its sign is whatever the eigen solve produces (no reorientation).
pub fn estimate_normals (points: &Array2<f64>, k: usize) -> Result<Array2<f64>> {
    let n = points.nrows();
    if n < k {
        return Err( empty_input( format!("point cloud must have at least {} points to generate normal vectors", k)))
    }

    let mut tree: KdTree<f64, usize, [f64; 3]> = KdTree::new(3);
    for i in 0..n {
        tree.add( [points[[i, 0]], points[[i, 1]], points[[i, 2]]], i)
            .map_err( |e| empty_input( format!("kd-tree insert failed: {:?}", e)))?;
    }

    let mut normals = Array2::<f64>::zeros( (n, 3));

    for i in 0..n {
        let query = [points[[i, 0]], points[[i, 1]], points[[i, 2]]];
        let neighbors = tree.nearest( &query, k, &squared_euclidean)
            .map_err( |e| empty_input( format!("kd-tree query failed: {:?}", e)))?;

        let mut centroid = Vector3::zeros();
        for (_, idx) in &neighbors {
            centroid += Vector3::new( points[[**idx, 0]], points[[**idx, 1]], points[[**idx, 2]]);
        }
        centroid /= neighbors.len() as f64;

        let mut cov = Matrix3::zeros();
        for (_, idx) in &neighbors {
            let d = Vector3::new( points[[**idx, 0]], points[[**idx, 1]], points[[**idx, 2]]) - centroid;
            cov += d * d.transpose();
        }

        let eigen = cov.symmetric_eigen();
        let mut min_i = 0;
        for j in 1..3 {
            if eigen.eigenvalues[j] < eigen.eigenvalues[min_i] { min_i = j }
        }
        let normal = eigen.eigenvectors.column( min_i).normalize();

        normals[[i, 0]] = normal[0];
        normals[[i, 1]] = normal[1];
        normals[[i, 2]] = normal[2];
    }

    Ok(normals)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn points_are_row_major_and_masked() {
        let dsm = array![[1.0f32, 2.0], [3.0, 4.0]];
        let mask = array![[true, false], [true, true]];
        let transform = Affine::new( 2.0, 0.0, 10.0, 0.0, -2.0, 20.0);

        let pc = raster_to_points( &dsm, &mask, &transform, AreaOrPoint::Area);

        assert_eq!( pc.nrows(), 3);
        // cell (0,0): u=v=0.5 -> (11, 19)
        assert_eq!( (pc[[0, 0]], pc[[0, 1]], pc[[0, 2]]), (11.0, 19.0, 1.0));
        // next in row-major order is cell (1,0), then (1,1)
        assert_eq!( (pc[[1, 0]], pc[[1, 1]], pc[[1, 2]]), (11.0, 17.0, 3.0));
        assert_eq!( (pc[[2, 0]], pc[[2, 1]], pc[[2, 2]]), (13.0, 17.0, 4.0));
    }

    #[test]
    fn point_convention_skips_half_pixel_shift() {
        let dsm = array![[7.0f32]];
        let mask = array![[true]];
        let transform = Affine::new( 1.0, 0.0, 100.0, 0.0, -1.0, 50.0);

        let pc = raster_to_points( &dsm, &mask, &transform, AreaOrPoint::Point);
        assert_eq!( (pc[[0, 0]], pc[[0, 1]]), (100.0, 50.0));
    }

    #[test]
    fn plane_normals_point_up_or_down() {
        // samples on the z=0 plane
        let mut data = Vec::new();
        for j in 0..5 {
            for i in 0..5 {
                data.push( i as f64);
                data.push( j as f64);
                data.push( 0.0);
            }
        }
        let points = Array2::from_shape_vec( (25, 3), data).unwrap();
        let normals = estimate_normals( &points, NORMAL_KNN).unwrap();

        assert_eq!( normals.dim(), points.dim());
        for i in 0..normals.nrows() {
            assert!( normals[[i, 2]].abs() > 0.99, "normal {} not vertical", i);
            let len = (normals[[i, 0]].powi(2) + normals[[i, 1]].powi(2) + normals[[i, 2]].powi(2)).sqrt();
            assert!( (len - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn too_few_points_is_empty_input() {
        let points = Array2::<f64>::zeros( (5, 3));
        assert!( estimate_normals( &points, NORMAL_KNN).is_err());
    }
}
