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

/// axis aligned world bounding box with y increasing upwards (bottom < top)
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub left: f64,
    pub bottom: f64,
    pub right: f64,
    pub top: f64,
}

impl BoundingBox {
    pub fn new (left: f64, bottom: f64, right: f64, top: f64) -> BoundingBox {
        BoundingBox { left, bottom, right, top }
    }

    pub fn width (&self) -> f64 { self.right - self.left }
    pub fn height (&self) -> f64 { self.top - self.bottom }

    /// true if the two boxes share no area
    pub fn disjoint (&self, other: &BoundingBox) -> bool {
        self.right < other.left || self.left > other.right ||
        self.top < other.bottom || self.bottom > other.top
    }

    pub fn intersection (&self, other: &BoundingBox) -> Option<BoundingBox> {
        if self.disjoint(other) { return None }
        Some( BoundingBox::new(
            self.left.max(other.left),
            self.bottom.max(other.bottom),
            self.right.min(other.right),
            self.top.min(other.top),
        ))
    }

    /// clamp each side of `self` against the corresponding side of `limit`,
    /// keeping whichever edge lies closer to the interior
    pub fn clamped_by (&self, limit: &BoundingBox) -> BoundingBox {
        BoundingBox::new(
            self.left.max(limit.left),
            self.bottom.max(limit.bottom),
            self.right.min(limit.right),
            self.top.min(limit.top),
        )
    }

    pub fn contains_point (&self, x: f64, y: f64) -> bool {
        x >= self.left && x <= self.right && y >= self.bottom && y <= self.top
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disjoint_and_intersection() {
        let a = BoundingBox::new( 0.0, 0.0, 10.0, 10.0);
        let b = BoundingBox::new( 5.0, 5.0, 15.0, 15.0);
        let c = BoundingBox::new( 11.0, 11.0, 20.0, 20.0);

        assert!( !a.disjoint(&b));
        assert!( a.disjoint(&c));
        assert_eq!( a.intersection(&b), Some(BoundingBox::new(5.0, 5.0, 10.0, 10.0)));
        assert_eq!( a.intersection(&c), None);
    }

    #[test]
    fn clamping() {
        let a = BoundingBox::new( 0.0, 0.0, 10.0, 10.0);
        let lim = BoundingBox::new( 2.0, -5.0, 8.0, 20.0);
        assert_eq!( a.clamped_by(&lim), BoundingBox::new(2.0, 0.0, 8.0, 10.0));
    }
}
