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
use std::path::{Path, PathBuf};

/// lowercased filename extension (without the dot)
pub fn extension (path: impl AsRef<Path>) -> Option<String> {
    path.as_ref().extension()
        .and_then( |e| e.to_str())
        .map( |e| e.to_lowercase())
}

/// filename without directory and without extension
pub fn basename (path: impl AsRef<Path>) -> Option<String> {
    path.as_ref().file_stem()
        .and_then( |s| s.to_str())
        .map( |s| s.to_string())
}

/// filename with directory stripped
pub fn filename (path: impl AsRef<Path>) -> Option<String> {
    path.as_ref().file_name()
        .and_then( |s| s.to_str())
        .map( |s| s.to_string())
}

/// `root.ext` -> `<dir>/<root><suffix>.<ext>`, e.g. suffix "_registered"
pub fn with_suffix (dir: impl AsRef<Path>, path: impl AsRef<Path>, suffix: &str, ext: &str) -> Option<PathBuf> {
    let root = basename( &path)?;
    let ext = ext.trim_start_matches('.');
    Some( dir.as_ref().join( format!("{root}{suffix}.{ext}")))
}

pub fn path_to_lossy_string (path: impl AsRef<Path>) -> String {
    path.as_ref().to_string_lossy().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_helpers() {
        assert_eq!( extension("/data/scan.LAZ"), Some("laz".to_string()));
        assert_eq!( basename("/data/scan.laz"), Some("scan".to_string()));
        assert_eq!( filename("/data/scan.laz"), Some("scan.laz".to_string()));
        assert_eq!( extension("noext"), None);
    }

    #[test]
    fn suffixed_names() {
        let p = with_suffix( "/out", "/data/scan.laz", "_registered", "laz").unwrap();
        assert_eq!( p, PathBuf::from("/out/scan_registered.laz"));

        let p = with_suffix( "/out", "/data/scan.laz", "_registered", ".ply").unwrap();
        assert_eq!( p, PathBuf::from("/out/scan_registered.ply"));
    }
}
