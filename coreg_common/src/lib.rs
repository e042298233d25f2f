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
#![allow(unused)]

pub mod affine;
pub mod bounds;
pub mod fs;

pub use affine::Affine;
pub use bounds::BoundingBox;

// syntactic sugar - this is just more readable
#[inline] pub fn sqrt(x:f64) -> f64 { x.sqrt() }
#[inline] pub fn pow2(x:f64) -> f64 { x*x }
#[inline] pub fn abs(x:f64) -> f64 { x.abs() }
#[inline] pub fn hypot3(x:f64, y:f64, z:f64) -> f64 { (x*x + y*y + z*z).sqrt() }

/// approximate floating point comparison against an absolute epsilon
#[inline] pub fn approx_eq (a: f64, b: f64, eps: f64) -> bool { (a - b).abs() <= eps }
