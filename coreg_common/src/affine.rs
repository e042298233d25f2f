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
use serde::{Deserialize, Serialize};

const EPS: f64 = 1e-12;

/// 2D affine transform between pixel space (col,row) and world space (x,y)
///
///   x = a*col + b*row + c
///   y = d*col + e*row + f
///
/// element names and composition order follow the usual raster convention,
/// i.e. `Affine::from_geotransform` maps GDAL's `[c,a,b,f,d,e]` ordering.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct Affine {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub e: f64,
    pub f: f64,
}

impl Affine {
    pub fn new (a: f64, b: f64, c: f64, d: f64, e: f64, f: f64) -> Affine {
        Affine { a, b, c, d, e, f }
    }

    pub fn identity () -> Affine {
        Affine::new( 1.0, 0.0, 0.0, 0.0, 1.0, 0.0)
    }

    /// pure scaling transform (about the origin)
    pub fn scaling (sx: f64, sy: f64) -> Affine {
        Affine::new( sx, 0.0, 0.0, 0.0, sy, 0.0)
    }

    pub fn from_geotransform (gt: &[f64; 6]) -> Affine {
        Affine::new( gt[1], gt[2], gt[0], gt[4], gt[5], gt[3])
    }

    pub fn to_geotransform (&self) -> [f64; 6] {
        [self.c, self.a, self.b, self.f, self.d, self.e]
    }

    #[inline]
    pub fn apply (&self, u: f64, v: f64) -> (f64, f64) {
        ( self.a * u + self.b * v + self.c,
          self.d * u + self.e * v + self.f )
    }

    /// compose so that `self.mul(&rhs)` applies `rhs` first, then `self`
    pub fn mul (&self, rhs: &Affine) -> Affine {
        Affine::new(
            self.a * rhs.a + self.b * rhs.d,
            self.a * rhs.b + self.b * rhs.e,
            self.a * rhs.c + self.b * rhs.f + self.c,
            self.d * rhs.a + self.e * rhs.d,
            self.d * rhs.b + self.e * rhs.e,
            self.d * rhs.c + self.e * rhs.f + self.f,
        )
    }

    pub fn determinant (&self) -> f64 {
        self.a * self.e - self.b * self.d
    }

    pub fn invert (&self) -> Option<Affine> {
        let det = self.determinant();
        if det.abs() < EPS { return None }

        let ia = self.e / det;
        let ib = -self.b / det;
        let id = -self.d / det;
        let ie = self.a / det;
        let ic = -(ia * self.c + ib * self.f);
        let if_ = -(id * self.c + ie * self.f);

        Some( Affine::new( ia, ib, ic, id, ie, if_) )
    }

    /// fractional (row,col) of a world location; None if the transform is singular
    pub fn rowcol (&self, x: f64, y: f64) -> Option<(f64, f64)> {
        self.invert().map( |inv| {
            let (col, row) = inv.apply( x, y);
            (row, col)
        })
    }

    pub fn is_identity (&self) -> bool {
        *self == Affine::identity()
    }

    /// true if pixel axes stay orthogonal under this transform
    pub fn is_conformal (&self) -> bool {
        (self.a * self.b + self.d * self.e).abs() < EPS
    }

    /// true if the transform carries no rotation or shear terms
    pub fn is_axis_aligned (&self) -> bool {
        self.b.abs() < EPS && self.d.abs() < EPS
    }

    /// absolute pixel scale along x and y, rotation-independent
    pub fn scaling_factors (&self) -> (f64, f64) {
        ( (self.a * self.a + self.d * self.d).sqrt(),
          (self.b * self.b + self.e * self.e).sqrt() )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn geotransform_round_trip() {
        let gt = [5000.0, 2.0, 0.0, 8000.0, 0.0, -2.0];
        let t = Affine::from_geotransform(&gt);
        assert_eq!( t.to_geotransform(), gt);
        assert_eq!( t.apply(0.0, 0.0), (5000.0, 8000.0));
        assert_eq!( t.apply(1.0, 1.0), (5002.0, 7998.0));
    }

    #[test]
    fn composition_order() {
        let t = Affine::new( 2.0, 0.0, 100.0, 0.0, -2.0, 200.0);
        let post = t.mul( &Affine::scaling(3.0, 4.0));
        // post-multiplied scale changes pixel size but not the origin
        assert_eq!( post.apply(0.0, 0.0), (100.0, 200.0));
        assert_eq!( post.apply(1.0, 0.0), (106.0, 200.0));

        let pre = Affine::scaling(0.5, 0.5).mul( &t);
        // pre-multiplied scale rescales origin and pixel size alike
        assert_eq!( pre.apply(0.0, 0.0), (50.0, 100.0));
        assert_eq!( pre.apply(1.0, 1.0), (51.0, 99.0));
    }

    #[test]
    fn inversion() {
        let t = Affine::new( 0.5, 0.0, -10.0, 0.0, -0.5, 42.0);
        let inv = t.invert().unwrap();
        let (x, y) = t.apply( 7.0, 3.0);
        let (u, v) = inv.apply( x, y);
        assert!( (u - 7.0).abs() < 1e-12 && (v - 3.0).abs() < 1e-12);

        let (row, col) = t.rowcol( x, y).unwrap();
        assert!( (row - 3.0).abs() < 1e-12 && (col - 7.0).abs() < 1e-12);
    }

    #[test]
    fn conformality() {
        assert!( Affine::new( 2.0, 0.0, 0.0, 0.0, -2.0, 0.0).is_axis_aligned());
        assert!( !Affine::new( 2.0, 0.3, 0.0, 0.0, -2.0, 0.0).is_axis_aligned());

        let rot = Affine::new( 0.0, -1.0, 0.0, 1.0, 0.0, 0.0); // 90 deg
        assert!( rot.is_conformal() && !rot.is_axis_aligned());

        let (sx, sy) = Affine::new( 2.0, 0.0, 0.0, 0.0, -3.0, 0.0).scaling_factors();
        assert_eq!( (sx, sy), (2.0, 3.0));
    }
}
