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
use std::ffi::CStr;
use std::ptr::null;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, CoregGdalError>;

pub type GdalError = gdal::errors::GdalError;

#[derive(Error, Debug)]
pub enum CoregGdalError {
    #[error("invalid file name {0}")]
    InvalidFileName(String),

    #[error("GDAL function {0} failed")]
    GdalFunctionFailed(&'static str),

    #[error("no spatial reference system")]
    NoSpatialReferenceSystem,

    #[error("no driver for extension {0}")]
    NoDriverForExtension(String),

    #[error("failed to convert to C string {0}")]
    CStringConversion(#[from] std::ffi::NulError),

    #[error("IO error {0}")]
    IOError(#[from] std::io::Error),

    // pass through for errors in gdal crate
    #[error("gdal error {0}")]
    Error(#[from] gdal::errors::GdalError),

    #[error("gdal error {0}")]
    MiscError(String),

    #[error("last gdal error {0}")]
    LastGdalError(String),
}

pub fn reset_last_gdal_error() {
    unsafe {
        gdal_sys::CPLErrorReset();
    }
}

pub fn last_gdal_err_description() -> Option<String> {
    unsafe {
        let err = gdal_sys::CPLGetLastErrorType();
        if err != gdal_sys::CPLErr::CE_None {
            let err_no = gdal_sys::CPLGetLastErrorNo();
            let p_msg = gdal_sys::CPLGetLastErrorMsg();

            gdal_sys::CPLErrorReset();

            if p_msg != null() {
                let msg_cstr = CStr::from_ptr(p_msg);
                Some(format!("{}:{}: {}", err, err_no, msg_cstr.to_string_lossy()))
            } else {
                Some(format!("{}:{}", err, err_no))
            }
        } else {
            None
        }
    }
}

pub fn last_gdal_error() -> CoregGdalError {
    CoregGdalError::LastGdalError(last_gdal_err_description().unwrap_or_else(|| "none".to_string()))
}

pub fn misc_error(s: impl ToString) -> CoregGdalError {
    CoregGdalError::MiscError(s.to_string())
}
