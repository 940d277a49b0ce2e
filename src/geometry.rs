//! View-space geometry for panorama reprojection
//!
//! This module handles the math between:
//! - Output pixels of a rectilinear view (image plane at z = 1)
//! - 3D view rays (x right, y up, z forward)
//! - Spherical angles on the equirectangular panorama

use cgmath::{InnerSpace, Matrix3, Rad, Vector3};
use std::f64::consts::PI;

/// Ray through pixel `(x, y)` of a square `size`×`size` view
///
/// The pixel grid is normalized to [-1, 1] on both axes and scaled by the
/// half-angle tangents. Screen-up is +y.
pub fn pixel_ray(x: f64, y: f64, size: f64, tan_half_h: f64, tan_half_v: f64) -> Vector3<f64> {
    let nx = (2.0 * x / size - 1.0) * tan_half_h;
    let ny = -(2.0 * y / size - 1.0) * tan_half_v;
    Vector3::new(nx, ny, 1.0)
}

/// Camera tilt: pitch about the x axis first, then yaw about the y axis
///
/// # Arguments
/// * `pitch` - Rotation about the horizontal axis in radians
/// * `yaw` - Rotation about the vertical axis in radians
pub fn view_rotation(pitch: f64, yaw: f64) -> Matrix3<f64> {
    Matrix3::from_angle_y(Rad(yaw)) * Matrix3::from_angle_x(Rad(pitch))
}

/// Spherical angles of a direction
///
/// # Returns
/// * `(elevation, azimuth)` in radians; elevation in [-π/2, π/2], azimuth
///   measured from +z towards +x in (-π, π]
pub fn to_spherical(direction: Vector3<f64>) -> (f64, f64) {
    let r = direction.magnitude();
    if r == 0.0 {
        return (0.0, 0.0);
    }
    let elevation = (direction.y / r).clamp(-1.0, 1.0).asin();
    let azimuth = direction.x.atan2(direction.z);
    (elevation, azimuth)
}

/// Equirectangular pixel position of a spherical direction
///
/// Azimuth wraps modulo 2π onto `[0, width)`; elevation maps linearly with
/// the zenith at row 0.
pub fn spherical_to_pixel(elevation: f64, azimuth: f64, width: f64, height: f64) -> (f64, f64) {
    let turns = azimuth / (2.0 * PI);
    let u = (turns + 1.0).rem_euclid(1.0) * width;
    let v = (0.5 - elevation / PI) * height;
    (u, v)
}

/// Map one output pixel of a view to panorama coordinates
pub struct ViewMapping {
    rotation: Matrix3<f64>,
    tan_half_h: f64,
    tan_half_v: f64,
    size: f64,
    azimuth: f64,
}

impl ViewMapping {
    /// # Arguments
    /// * `size` - Side length of the square output view in pixels
    /// * `hfov`, `vfov` - Field of view in radians
    /// * `azimuth` - Realized view direction in radians
    /// * `pitch`, `yaw` - Fixed camera tilt in radians
    pub fn new(size: u32, hfov: f64, vfov: f64, azimuth: f64, pitch: f64, yaw: f64) -> Self {
        Self {
            rotation: view_rotation(pitch, yaw),
            tan_half_h: (hfov / 2.0).tan(),
            tan_half_v: (vfov / 2.0).tan(),
            size: size as f64,
            azimuth,
        }
    }

    /// Panorama `(u, v)` sampled by output pixel `(x, y)`
    pub fn source_pixel(&self, x: u32, y: u32, pano_width: f64, pano_height: f64) -> (f64, f64) {
        let ray = pixel_ray(x as f64, y as f64, self.size, self.tan_half_h, self.tan_half_v);
        let (elevation, azimuth) = to_spherical(self.rotation * ray);
        spherical_to_pixel(elevation, azimuth + self.azimuth, pano_width, pano_height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_center_ray_points_forward() {
        let ray = pixel_ray(256.0, 256.0, 512.0, 1.0, 1.0);
        assert_relative_eq!(ray.x, 0.0);
        assert_relative_eq!(ray.y, 0.0);
        assert_relative_eq!(ray.z, 1.0);
    }

    #[test]
    fn test_screen_up_is_positive_y() {
        let top = pixel_ray(256.0, 0.0, 512.0, 1.0, 1.0);
        assert!(top.y > 0.0);
    }

    #[test]
    fn test_rotation_order_matches_manual_formula() {
        let (pitch, yaw) = (0.3_f64, -0.2_f64);
        let v = Vector3::new(0.4, -0.7, 1.0);
        let rotated = view_rotation(pitch, yaw) * v;

        let py = v.y * pitch.cos() - v.z * pitch.sin();
        let pz = v.y * pitch.sin() + v.z * pitch.cos();
        let yx = v.x * yaw.cos() + pz * yaw.sin();
        let yz = -v.x * yaw.sin() + pz * yaw.cos();

        assert_relative_eq!(rotated.x, yx, epsilon = 1e-12);
        assert_relative_eq!(rotated.y, py, epsilon = 1e-12);
        assert_relative_eq!(rotated.z, yz, epsilon = 1e-12);
    }

    #[test]
    fn test_spherical_to_pixel_wraps() {
        let (u, v) = spherical_to_pixel(0.0, -PI / 2.0, 400.0, 200.0);
        assert_relative_eq!(u, 300.0, epsilon = 1e-9);
        assert_relative_eq!(v, 100.0, epsilon = 1e-9);

        let (u, _) = spherical_to_pixel(0.0, 2.0 * PI + PI / 2.0, 400.0, 200.0);
        assert_relative_eq!(u, 100.0, epsilon = 1e-9);
    }

    #[test]
    fn test_zenith_maps_to_top_row() {
        let (elevation, _) = to_spherical(Vector3::new(0.0, 1.0, 0.0));
        let (_, v) = spherical_to_pixel(elevation, 0.0, 400.0, 200.0);
        assert_relative_eq!(v, 0.0, epsilon = 1e-9);
    }
}
