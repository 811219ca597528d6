//! Web-Mercator / slippy-tile math.
//!
//! Standard tile pyramid: zoom z splits the world into 2^z x 2^z tiles of
//! `tile_size` pixels. Latitude is clamped to the Mercator singularity
//! bound before projection.

use risk_model::BoundingBox;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// WGS84 equatorial radius used by Web Mercator (meters).
pub const EARTH_RADIUS_M: f64 = 6_378_137.0;

/// Equatorial circumference (meters).
pub const EARTH_CIRCUM_M: f64 = 2.0 * PI * EARTH_RADIUS_M;

/// Latitude bound of the Mercator projection.
pub const MAX_MERCATOR_LAT: f64 = 85.051_128_78;

/// Address of one raster tile in the slippy pyramid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TileAddress {
    pub z: u32,
    pub x: u32,
    pub y: u32,
}

impl TileAddress {
    pub const fn new(z: u32, x: u32, y: u32) -> Self {
        Self { z, x, y }
    }

    /// The tile containing a coordinate at zoom `z`.
    pub fn containing(lat: f64, lng: f64, z: u32) -> Self {
        let n = (1u64 << z) as f64;
        let lat = lat.clamp(-MAX_MERCATOR_LAT, MAX_MERCATOR_LAT);
        let x = ((lng + 180.0) / 360.0 * n).floor();
        let lat_rad = lat.to_radians();
        let y = ((1.0 - (lat_rad.tan() + 1.0 / lat_rad.cos()).ln() / PI) / 2.0 * n).floor();

        Self {
            z,
            x: (x.max(0.0) as u64).min((1u64 << z) - 1) as u32,
            y: (y.max(0.0) as u64).min((1u64 << z) - 1) as u32,
        }
    }
}

/// Geographic (west, south, east, north) bounds of a tile.
pub fn tile_bounds(tile: TileAddress) -> BoundingBox {
    let n = (1u64 << tile.z) as f64;
    let west = tile.x as f64 / n * 360.0 - 180.0;
    let east = (tile.x + 1) as f64 / n * 360.0 - 180.0;

    let lat_rad_north = (PI * (1.0 - 2.0 * tile.y as f64 / n)).sinh().atan();
    let lat_rad_south = (PI * (1.0 - 2.0 * (tile.y + 1) as f64 / n)).sinh().atan();

    BoundingBox::new(
        west,
        lat_rad_south.to_degrees(),
        east,
        lat_rad_north.to_degrees(),
    )
}

/// Global pixel coordinates of a lng/lat at zoom `z`.
pub fn lnglat_to_world_px(lng: f64, lat: f64, z: u32, tile_size: u32) -> (f64, f64) {
    let n = (1u64 << z) as f64;
    let world = n * tile_size as f64;

    let x = (lng + 180.0) / 360.0 * world;

    let lat = lat.clamp(-MAX_MERCATOR_LAT, MAX_MERCATOR_LAT);
    let lat_rad = lat.to_radians();
    let y = (1.0 - (lat_rad.tan() + 1.0 / lat_rad.cos()).ln() / PI) / 2.0 * world;

    (x, y)
}

/// Web-Mercator ground resolution at a latitude and zoom (meters/pixel).
pub fn meters_per_pixel(lat: f64, z: u32, tile_size: u32) -> f64 {
    let lat = lat.clamp(-MAX_MERCATOR_LAT, MAX_MERCATOR_LAT);
    EARTH_CIRCUM_M * lat.to_radians().cos() / ((1u64 << z) as f64 * tile_size as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zoom_zero_bounds_cover_world() {
        let b = tile_bounds(TileAddress::new(0, 0, 0));
        assert!((b.west + 180.0).abs() < 1e-9);
        assert!((b.east - 180.0).abs() < 1e-9);
        assert!((b.north - MAX_MERCATOR_LAT).abs() < 1e-6);
        assert!((b.south + MAX_MERCATOR_LAT).abs() < 1e-6);
    }

    #[test]
    fn test_tile_corner_maps_to_pixel_origin() {
        let tile = TileAddress::new(15, 16374, 10896);
        let b = tile_bounds(tile);
        let (wx, wy) = lnglat_to_world_px(b.west, b.north, tile.z, 256);
        assert!((wx - (tile.x * 256) as f64).abs() < 1e-6);
        assert!((wy - (tile.y * 256) as f64).abs() < 1e-6);
    }

    #[test]
    fn test_containing_is_consistent_with_bounds() {
        let tile = TileAddress::containing(51.5, -0.1, 15);
        let b = tile_bounds(tile);
        assert!(b.contains(51.5, -0.1));
    }

    #[test]
    fn test_meters_per_pixel_equator_zoom_zero() {
        let mpp = meters_per_pixel(0.0, 0, 256);
        assert!((mpp - 156_543.03).abs() < 0.1, "got {mpp}");
    }

    #[test]
    fn test_meters_per_pixel_shrinks_with_zoom_and_latitude() {
        let z10 = meters_per_pixel(0.0, 10, 256);
        let z11 = meters_per_pixel(0.0, 11, 256);
        assert!((z10 / z11 - 2.0).abs() < 1e-9);

        assert!(meters_per_pixel(60.0, 10, 256) < z10);
    }
}
