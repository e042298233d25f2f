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
use thiserror::Error;

pub type Result<T> = std::result::Result<T, CoregError>;

#[derive(Error, Debug)]
pub enum CoregError {
    #[error("unsupported format {0}")]
    UnsupportedFormat(String),

    #[error("missing or identity transform: {0}")]
    MissingTransform(String),

    #[error("non-conformal transform: {0}")]
    NonConformalTransform(String),

    #[error("empty input: {0}")]
    EmptyInput(String),

    #[error("CRS missing or mismatched: {0}")]
    CrsMissingOrMismatch(String),

    #[error("disjoint bounds: {0}")]
    DisjointBounds(String),

    #[error("resolution must be greater than 0, got {0}")]
    InvalidResolution(f64),

    #[error("unexpected transform kind: {0}")]
    UnexpectedTransformKind(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("mesh error: {0}")]
    MeshError(String),

    #[error("operation failed: {0}")]
    OpFailed(String),

    //--- pass-throughs
    #[error("gdal error {0}")]
    Gdal(#[from] coreg_gdal::errors::CoregGdalError),

    #[error("gdal error {0}")]
    GdalLib(#[from] coreg_gdal::GdalError),

    #[error("las error {0}")]
    Las(#[from] las::Error),

    #[error("triangulation error {0}")]
    Triangulation(#[from] spade::InsertionError),

    #[error("IO error {0}")]
    IOError(#[from] std::io::Error),

    #[error("JSON error {0}")]
    Json(#[from] serde_json::Error),
}

pub fn unsupported_format (s: impl ToString) -> CoregError { CoregError::UnsupportedFormat(s.to_string()) }
pub fn empty_input (s: impl ToString) -> CoregError { CoregError::EmptyInput(s.to_string()) }
pub fn mesh_error (s: impl ToString) -> CoregError { CoregError::MeshError(s.to_string()) }
pub fn op_failed (s: impl ToString) -> CoregError { CoregError::OpFailed(s.to_string()) }
