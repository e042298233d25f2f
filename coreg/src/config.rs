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
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::errors::{Result, CoregError};

/// the shared pipeline configuration record. The preprocessing/apply core only
/// reads its own subset; the solver-oriented fields are carried so one record
/// can drive the registration peers as well. Unknown keys are tolerated.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE", default)]
pub struct CoregConfig {
    pub fnd_file: PathBuf,
    pub aoi_file: PathBuf,
    pub min_resolution: f64,

    pub dsm_akaze_threshold: f64,
    pub dsm_lowes_ratio: f64,
    pub dsm_ransac_max_iter: u32,
    pub dsm_ransac_threshold: f64,
    pub dsm_solve_scale: bool,
    pub dsm_strong_filter: f64,
    pub dsm_weak_filter: f64,

    pub icp_angle_threshold: f64,
    pub icp_distance_threshold: f64,
    pub icp_max_iter: u32,
    pub icp_rmse_threshold: f64,
    pub icp_robust: bool,
    pub icp_solve_scale: bool,
    pub icp_save_residuals: bool,

    pub offset_x: String,
    pub offset_y: String,
    pub offset_z: String,
    pub scale_x: String,
    pub scale_y: String,
    pub scale_z: String,

    pub verbose: bool,
    pub tight_search: bool,
    pub output_dir: PathBuf,
}

impl Default for CoregConfig {
    fn default() -> Self {
        CoregConfig {
            fnd_file: PathBuf::new(),
            aoi_file: PathBuf::new(),
            min_resolution: 1.0,

            dsm_akaze_threshold: 0.0001,
            dsm_lowes_ratio: 0.9,
            dsm_ransac_max_iter: 10000,
            dsm_ransac_threshold: 10.0,
            dsm_solve_scale: true,
            dsm_strong_filter: 10.0,
            dsm_weak_filter: 1.0,

            icp_angle_threshold: 0.001,
            icp_distance_threshold: 0.001,
            icp_max_iter: 100,
            icp_rmse_threshold: 0.0001,
            icp_robust: true,
            icp_solve_scale: true,
            icp_save_residuals: false,

            offset_x: "auto".to_string(),
            offset_y: "auto".to_string(),
            offset_z: "auto".to_string(),
            scale_x: "auto".to_string(),
            scale_y: "auto".to_string(),
            scale_z: "auto".to_string(),

            verbose: false,
            tight_search: false,
            output_dir: PathBuf::from("."),
        }
    }
}

impl CoregConfig {
    pub fn from_ron_file (path: impl AsRef<Path>) -> Result<CoregConfig> {
        let contents = fs::read_to_string( path.as_ref())?;
        ron::from_str( &contents).map_err( |e| CoregError::InvalidConfig( e.to_string()))
    }

    /// sanity checks before a pipeline run
    pub fn validate (&self) -> Result<()> {
        if self.min_resolution <= 0.0 {
            return Err( CoregError::InvalidResolution( self.min_resolution))
        }
        if self.dsm_weak_filter <= 0.0 || self.dsm_strong_filter <= self.dsm_weak_filter {
            return Err( CoregError::InvalidConfig(
                format!("filter sizes must satisfy 0 < weak < strong, got {} / {}", self.dsm_weak_filter, self.dsm_strong_filter)))
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn screaming_keys_round_trip() {
        let input = r#"( FND_FILE: "fnd.tif", AOI_FILE: "aoi.laz", MIN_RESOLUTION: 2.0, TIGHT_SEARCH: true )"#;
        let cfg: CoregConfig = ron::from_str(input).unwrap();
        assert_eq!( cfg.fnd_file, PathBuf::from("fnd.tif"));
        assert_eq!( cfg.min_resolution, 2.0);
        assert!( cfg.tight_search);
        assert_eq!( cfg.scale_x, "auto"); // default applies
    }

    #[test]
    fn validation_rejects_bad_filters() {
        let mut cfg = CoregConfig::default();
        cfg.dsm_strong_filter = 0.5; // below weak
        assert!( cfg.validate().is_err());
    }
}
