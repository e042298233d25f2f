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

//! geospatial preprocessing and registration application for co-registering a
//! compliment ("area of interest") dataset against a foundation dataset.
//!
//! The three supported data kinds (DSM raster, point cloud, triangle mesh) are
//! normalized into a common representation: a metric gridded elevation raster
//! with voids filled, a bandpass-normalized 8 bit image for keypoint matching,
//! and - for the foundation - 3D points with per-point surface normals for
//! point-to-plane ICP. Once an external solver produces a registration matrix,
//! [`apply::ApplyRegistration`] transforms the original compliment file into
//! the foundation frame, optionally baking interpolated ICP residuals into the
//! outputs.
//!
//! Feature matching, the ICP loop itself, CLI parsing and progress reporting
//! live in peer modules; this crate only consumes their configuration record
//! and registration result.

pub mod errors;
pub mod config;

pub mod dataset;
pub mod dsm;
pub mod pointcloud;
pub mod mesh;

pub mod stages;
pub mod hexbin;
pub mod infill;
pub mod normalize;
pub mod points;
pub mod clip;

pub mod apply;
pub mod residuals;

pub mod las_io;
pub mod mesh_io;

pub use config::CoregConfig;
pub use dataset::{DataKind, GeoDataset, Role, Window, prepare_pair};
pub use apply::{ApplyRegistration, RegistrationResult, RegistrationTransformation};
pub use errors::{CoregError, Result};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
