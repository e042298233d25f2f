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
use ndarray::Array2;
use spade::{DelaunayTriangulation, FloatTriangulation, HasPosition, Point2, Triangulation};

use crate::errors::{Result, empty_input};

/// value reported for queries outside the convex hull of the residual origins
pub const OUT_OF_HULL: f64 = -9999.0;

/// residual components stored per origin: x, y, z, horizontal norm, 3D norm
pub const N_FIELDS: usize = 5;

struct ResidualSample {
    position: Point2<f64>,
    fields: [f64; N_FIELDS],
}

impl HasPosition for ResidualSample {
    type Scalar = f64;
    fn position (&self) -> Point2<f64> { self.position }
}

/// sparse ICP residual field over the registered output space.
///
/// Origins and vectors arrive in meters; both are scaled by `1/fnd_units_factor`
/// so queries run in the foundation's linear unit. The Delaunay triangulation is
/// built once and reused for all five scalar fields.
pub struct ResidualField {
    triangulation: DelaunayTriangulation<ResidualSample>,
}

impl ResidualField {
    pub fn new (origins: &Array2<f64>, vectors: &Array2<f64>, fnd_units_factor: f64) -> Result<ResidualField> {
        let n = origins.nrows();
        if n < 3 || vectors.nrows() != n {
            return Err( empty_input( "residual field needs at least 3 origin/vector pairs"))
        }

        let s = 1.0 / fnd_units_factor;
        let mut triangulation: DelaunayTriangulation<ResidualSample> = DelaunayTriangulation::new();

        for i in 0..n {
            let x = origins[[i, 0]] * s;
            let y = origins[[i, 1]] * s;

            let vx = vectors[[i, 0]] * s;
            let vy = vectors[[i, 1]] * s;
            let vz = vectors[[i, 2]] * s;
            let horiz = (vx * vx + vy * vy).sqrt();
            let full = (vx * vx + vy * vy + vz * vz).sqrt();

            triangulation.insert( ResidualSample {
                position: Point2::new( x, y),
                fields: [vx, vy, vz, horiz, full],
            })?;
        }

        Ok( ResidualField { triangulation } )
    }

    /// interpolated residual components at (x,y); `OUT_OF_HULL` outside the hull
    pub fn interpolate (&self, x: f64, y: f64) -> [f64; N_FIELDS] {
        let barycentric = self.triangulation.barycentric();
        let mut out = [OUT_OF_HULL; N_FIELDS];

        for j in 0..N_FIELDS {
            if let Some(v) = barycentric.interpolate( |v| v.data().fields[j], Point2::new( x, y)) {
                if v.is_finite() {
                    out[j] = v;
                }
            }
        }
        out
    }

    pub fn interpolate_many (&self, xs: &[f64], ys: &[f64]) -> Vec<[f64; N_FIELDS]> {
        xs.iter().zip( ys.iter()).map( |(x, y)| self.interpolate( *x, *y)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn unit_square_field () -> ResidualField {
        let origins = array![
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [0.0, 1.0, 0.0],
            [1.0, 1.0, 0.0],
        ];
        let vectors = array![
            [1.0, 0.0, 0.0],
            [0.0, 0.0, 0.0],
            [0.0, 0.0, 0.0],
            [0.0, 0.0, 0.0],
        ];
        ResidualField::new( &origins, &vectors, 1.0).unwrap()
    }

    #[test]
    fn barycentric_weights_inside_triangle() {
        let origins = array![
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [0.0, 1.0, 0.0],
        ];
        let vectors = array![
            [1.0, 0.0, 0.0],
            [0.0, 0.0, 0.0],
            [0.0, 0.0, 0.0],
        ];
        let field = ResidualField::new( &origins, &vectors, 1.0).unwrap();

        // barycentric weight of the (0,0) vertex at (0.25,0.25) is 0.5
        let r = field.interpolate( 0.25, 0.25);
        assert!( (r[0] - 0.5).abs() < 1e-9, "x residual = {}", r[0]);
        assert!( r[1].abs() < 1e-9 && r[2].abs() < 1e-9);
        // horizontal and 3D norms interpolate as their own fields
        assert!( (r[3] - 0.5).abs() < 1e-9 && (r[4] - 0.5).abs() < 1e-9);
    }

    #[test]
    fn outside_hull_yields_sentinel() {
        let field = unit_square_field();
        assert_eq!( field.interpolate( 2.0, 2.0), [OUT_OF_HULL; N_FIELDS]);
        assert_eq!( field.interpolate( -0.5, 0.5)[0], OUT_OF_HULL);
    }

    #[test]
    fn center_of_square_blends_corner_values() {
        let field = unit_square_field();
        let r = field.interpolate( 0.5, 0.5);
        assert!( r[0] >= 0.0 && r[0] <= 0.5, "center x residual = {}", r[0]);
        assert_ne!( r[0], OUT_OF_HULL);
    }

    #[test]
    fn units_factor_scales_origins_and_vectors() {
        let origins = array![
            [0.0, 0.0, 0.0],
            [0.3048, 0.0, 0.0],
            [0.0, 0.3048, 0.0],
        ];
        let vectors = array![
            [0.3048, 0.0, 0.0],
            [0.3048, 0.0, 0.0],
            [0.3048, 0.0, 0.0],
        ];
        // foundation unit is US feet: origins map to a unit triangle in feet
        let field = ResidualField::new( &origins, &vectors, 0.3048).unwrap();
        let r = field.interpolate( 0.25, 0.25);
        assert!( (r[0] - 1.0).abs() < 1e-9); // one foot of residual everywhere
    }

    #[test]
    fn degenerate_field_is_rejected() {
        let origins = array![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0]];
        let vectors = array![[0.0, 0.0, 0.0], [0.0, 0.0, 0.0]];
        assert!( ResidualField::new( &origins, &vectors, 1.0).is_err());
    }
}
