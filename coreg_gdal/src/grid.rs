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
use std::path::Path;

use gdal::raster::Buffer;
use gdal::spatial_ref::SpatialRef;
use tracing::debug;

use coreg_common::Affine;
use crate::{create_gtiff};
use crate::errors::{Result, misc_error};

pub const GRID_NODATA: f64 = -9999.0;

/// cell aggregation applied when gridding a point stream
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum GridOutputType {
    /// highest sample per cell (surface extraction)
    Max,
    /// inverse distance weighting over a search radius around each cell center
    Idw,
}

/// rasterizes an unordered (x,y,z) point stream into a north-up GTiff.
/// The grid covers the point bounds at the given resolution; cells that no
/// sample contributes to are set to the nodata value.
pub struct GridWriter {
    resolution: f64,
    output_type: GridOutputType,
    nodata: f64,
    radius: f64,
    power: f64,
    crs: Option<SpatialRef>,
}

impl GridWriter {
    pub fn new (resolution: f64, output_type: GridOutputType) -> GridWriter {
        GridWriter {
            resolution,
            output_type,
            nodata: GRID_NODATA,
            radius: resolution * std::f64::consts::SQRT_2,
            power: 2.0,
            crs: None,
        }
    }

    pub fn set_nodata (&mut self, nodata: f64) -> &mut GridWriter {
        self.nodata = nodata;
        self
    }

    pub fn set_radius (&mut self, radius: f64) -> &mut GridWriter {
        self.radius = radius;
        self
    }

    pub fn set_crs (&mut self, crs: SpatialRef) -> &mut GridWriter {
        self.crs = Some(crs);
        self
    }

    /// grid `points` and write the raster to `path`; returns (width, height)
    pub fn write (&self, points: &[[f64; 3]], path: impl AsRef<Path>) -> Result<(usize, usize)> {
        if points.is_empty() {
            return Err( misc_error( "no points to rasterize"))
        }
        if self.resolution <= 0.0 {
            return Err( misc_error( format!("invalid gridding resolution {}", self.resolution)))
        }

        let mut min_x = f64::INFINITY;
        let mut min_y = f64::INFINITY;
        let mut max_x = f64::NEG_INFINITY;
        let mut max_y = f64::NEG_INFINITY;
        for p in points {
            if p[0] < min_x { min_x = p[0] }
            if p[0] > max_x { max_x = p[0] }
            if p[1] < min_y { min_y = p[1] }
            if p[1] > max_y { max_y = p[1] }
        }

        let res = self.resolution;
        let width = (((max_x - min_x) / res).ceil() as usize).max(1);
        let height = (((max_y - min_y) / res).ceil() as usize).max(1);
        let transform = Affine::new( res, 0.0, min_x, 0.0, -res, max_y);

        debug!( "gridding {} points into {}x{} cells at {} ({:?})", points.len(), width, height, res, self.output_type);

        let data = match self.output_type {
            GridOutputType::Max => self.grid_max( points, &transform, width, height),
            GridOutputType::Idw => self.grid_idw( points, &transform, width, height),
        };

        let mut ds = create_gtiff::<f64>( path, width, height, 1, &transform, self.crs.as_ref(), Some(self.nodata))?;
        let mut band = ds.rasterband(1)?;
        let mut buffer = Buffer::new( (width, height), data);
        band.write( (0, 0), (width, height), &mut buffer)?;

        Ok( (width, height) )
    }

    fn grid_max (&self, points: &[[f64; 3]], transform: &Affine, width: usize, height: usize) -> Vec<f64> {
        let mut data = vec![self.nodata; width * height];
        let inv = transform.invert().unwrap(); // conformal scale transform, always invertible

        for p in points {
            let (u, v) = inv.apply( p[0], p[1]);
            let col = (u.floor() as isize).clamp( 0, width as isize - 1) as usize;
            let row = (v.floor() as isize).clamp( 0, height as isize - 1) as usize;
            let cell = &mut data[row * width + col];
            if *cell == self.nodata || p[2] > *cell {
                *cell = p[2];
            }
        }

        data
    }

    fn grid_idw (&self, points: &[[f64; 3]], transform: &Affine, width: usize, height: usize) -> Vec<f64> {
        let mut weights = vec![0.0f64; width * height];
        let mut sums = vec![0.0f64; width * height];
        let mut exact = vec![f64::NAN; width * height];

        let res = self.resolution;
        let radius = self.radius;
        let cell_reach = (radius / res).ceil() as isize;
        let inv = transform.invert().unwrap();

        for p in points {
            let (u, v) = inv.apply( p[0], p[1]);

            let col0 = (u.floor() as isize - cell_reach).max(0);
            let col1 = (u.floor() as isize + cell_reach).min( width as isize - 1);
            let row0 = (v.floor() as isize - cell_reach).max(0);
            let row1 = (v.floor() as isize + cell_reach).min( height as isize - 1);

            for row in row0..=row1 {
                for col in col0..=col1 {
                    // distance from the sample to the cell center, in world units
                    let (cx, cy) = transform.apply( col as f64 + 0.5, row as f64 + 0.5);
                    let dx = p[0] - cx;
                    let dy = p[1] - cy;
                    let dist = (dx * dx + dy * dy).sqrt();
                    if dist > radius { continue }

                    let idx = row as usize * width + col as usize;
                    if dist < 1e-9 {
                        exact[idx] = p[2];
                    } else {
                        let w = 1.0 / dist.powf( self.power);
                        weights[idx] += w;
                        sums[idx] += w * p[2];
                    }
                }
            }
        }

        let mut data = vec![self.nodata; width * height];
        for i in 0..data.len() {
            if exact[i].is_finite() {
                data[i] = exact[i];
            } else if weights[i] > 0.0 {
                data[i] = sums[i] / weights[i];
            }
        }

        data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn max_gridding_picks_highest_sample() {
        let writer = GridWriter::new( 1.0, GridOutputType::Max);
        let transform = Affine::new( 1.0, 0.0, 0.0, 0.0, -1.0, 2.0);
        let points = [
            [0.5, 1.5, 1.0],
            [0.5, 1.5, 3.0], // same cell, higher
            [1.5, 0.5, 2.0],
        ];

        let data = writer.grid_max( &points, &transform, 2, 2);
        assert_eq!( data[0], 3.0);
        assert_eq!( data[3], 2.0);
        assert_eq!( data[1], GRID_NODATA);
    }

    #[test]
    fn idw_exact_hit_wins() {
        let writer = GridWriter::new( 1.0, GridOutputType::Idw);
        let transform = Affine::new( 1.0, 0.0, 0.0, 0.0, -1.0, 1.0);
        // sample exactly on the cell center
        let data = writer.grid_idw( &[[0.5, 0.5, 7.0]], &transform, 1, 1);
        assert_eq!( data[0], 7.0);
    }
}
