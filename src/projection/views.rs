//! The eight compass views rendered for every scene
//!
//! One global rotation, drawn per scene, turns all eight base directions
//! together so their 45° spacing survives. Each view also gets its own
//! vertical field-of-view jitter.

use image::codecs::jpeg::JpegEncoder;
use image::RgbImage;
use rand::Rng;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::rectilinear::render_view;
use crate::error::SceneError;
use crate::geometry::ViewMapping;
use crate::panorama::Panorama;
use crate::state::data::SceneId;

// ========== View Parameters ==========

/// Side length of every output view in pixels
pub const VIEW_SIZE: u32 = 512;
pub const HFOV_DEG: f64 = 90.0;
pub const BASE_VFOV_DEG: f64 = 90.0;
pub const VFOV_JITTER_DEG: f64 = 5.0;
pub const VFOV_MIN_DEG: f64 = 75.0;
pub const VFOV_MAX_DEG: f64 = 110.0;
/// Half-width of the per-scene global rotation range
pub const GLOBAL_ROTATION_DEG: f64 = 22.5;
/// Fixed camera tilt shared by all views
pub const PITCH_DEG: f64 = 5.0;
pub const YAW_DEG: f64 = 5.0;
pub const JPEG_QUALITY: u8 = 90;

/// Base azimuths in degrees and their compass labels
pub const COMPASS: [(f64, &str); 8] = [
    (0.0, "N"),
    (45.0, "NE"),
    (90.0, "E"),
    (135.0, "SE"),
    (180.0, "S"),
    (225.0, "SW"),
    (270.0, "W"),
    (315.0, "NW"),
];

/// Direction and vertical FOV chosen for one view
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewPlan {
    /// 1-based position in `COMPASS`
    pub index: usize,
    pub label: &'static str,
    /// Realized azimuth in [0, 360)
    pub azimuth_deg: f64,
    pub vfov_deg: f64,
}

/// Draw the global rotation and per-view jitter for one scene
pub fn plan_views<R: Rng + ?Sized>(rng: &mut R) -> Vec<ViewPlan> {
    let rotation = rng.gen_range(-GLOBAL_ROTATION_DEG..=GLOBAL_ROTATION_DEG);
    debug!("Global rotation for all directions: {:.2}°", rotation);

    COMPASS
        .iter()
        .enumerate()
        .map(|(i, &(base, label))| {
            let jitter = rng.gen_range(-VFOV_JITTER_DEG..=VFOV_JITTER_DEG);
            ViewPlan {
                index: i + 1,
                label,
                azimuth_deg: (base + rotation + 360.0).rem_euclid(360.0),
                vfov_deg: (BASE_VFOV_DEG + jitter).clamp(VFOV_MIN_DEG, VFOV_MAX_DEG),
            }
        })
        .collect()
}

/// `<scene>_View<index>_<label>_FOV<hfov>.jpg`
///
/// Path separators and control characters in the scene id become `_`, so
/// the name always stays a single component inside the output directory.
pub fn view_file_name(scene: &SceneId, index: usize, label: &str, hfov_deg: f64) -> String {
    let stem: String = scene
        .as_str()
        .chars()
        .map(|c| {
            if std::path::is_separator(c) || c == '\\' || c.is_control() {
                '_'
            } else {
                c
            }
        })
        .collect();
    format!("{}_View{}_{}_FOV{:.1}.jpg", stem, index, label, hfov_deg)
}

/// File names of all eight views of a scene
pub fn view_file_names(scene: &SceneId) -> Vec<String> {
    COMPASS
        .iter()
        .enumerate()
        .map(|(i, (_, label))| view_file_name(scene, i + 1, label, HFOV_DEG))
        .collect()
}

/// Whether all eight views of a scene are already in `dir`
pub fn views_exist(dir: &Path, scene: &SceneId) -> bool {
    view_file_names(scene)
        .iter()
        .all(|name| dir.join(name).is_file())
}

/// One rendered view, ready to be written
#[derive(Debug, Clone)]
pub struct DirectionalView {
    pub index: usize,
    pub label: &'static str,
    pub azimuth_deg: f64,
    pub vfov_deg: f64,
    pub file_name: String,
    pub image: RgbImage,
}

/// Renders the compass views of a panorama
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reprojector {
    pub size: u32,
    pub hfov_deg: f64,
    pub pitch_deg: f64,
    pub yaw_deg: f64,
}

impl Default for Reprojector {
    fn default() -> Self {
        Self {
            size: VIEW_SIZE,
            hfov_deg: HFOV_DEG,
            pitch_deg: PITCH_DEG,
            yaw_deg: YAW_DEG,
        }
    }
}

impl Reprojector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Same views without camera tilt
    pub fn level(mut self) -> Self {
        self.pitch_deg = 0.0;
        self.yaw_deg = 0.0;
        self
    }

    pub fn with_size(mut self, size: u32) -> Self {
        self.size = size;
        self
    }

    /// Pixel mapping of one planned view
    pub fn mapping(&self, plan: &ViewPlan) -> ViewMapping {
        ViewMapping::new(
            self.size,
            self.hfov_deg.to_radians(),
            plan.vfov_deg.to_radians(),
            plan.azimuth_deg.to_radians(),
            self.pitch_deg.to_radians(),
            self.yaw_deg.to_radians(),
        )
    }

    /// Render all eight views of a scene
    pub fn reproject<R: Rng + ?Sized>(
        &self,
        panorama: &Panorama,
        scene: &SceneId,
        rng: &mut R,
    ) -> Result<Vec<DirectionalView>, SceneError> {
        if panorama.width() == 0 || panorama.height() == 0 {
            return Err(SceneError::Projection("panorama has no pixels".into()));
        }
        if self.size == 0 {
            return Err(SceneError::Projection("view size must be positive".into()));
        }

        info!(scene = %scene, "Creating {} directional views", COMPASS.len());

        let views = plan_views(rng)
            .into_iter()
            .map(|plan| {
                debug!(
                    scene = %scene,
                    "View {}: {} at {:.2}° with FOV {:.1}° horizontal, {:.2}° vertical",
                    plan.index,
                    plan.label,
                    plan.azimuth_deg,
                    self.hfov_deg,
                    plan.vfov_deg
                );
                let image = render_view(panorama, &self.mapping(&plan), self.size);
                DirectionalView {
                    index: plan.index,
                    label: plan.label,
                    azimuth_deg: plan.azimuth_deg,
                    vfov_deg: plan.vfov_deg,
                    file_name: view_file_name(scene, plan.index, plan.label, self.hfov_deg),
                    image,
                }
            })
            .collect();

        Ok(views)
    }
}

/// Write views into `dir` as JPEG and return the written paths
pub fn save_views(views: &[DirectionalView], dir: &Path) -> Result<Vec<PathBuf>, SceneError> {
    views
        .iter()
        .map(|view| {
            let path = dir.join(&view.file_name);
            let file = File::create(&path).map_err(|source| SceneError::Io {
                path: path.clone(),
                source,
            })?;

            let mut writer = BufWriter::new(file);
            JpegEncoder::new_with_quality(&mut writer, JPEG_QUALITY).encode_image(&view.image)?;
            writer.flush().map_err(|source| SceneError::Io {
                path: path.clone(),
                source,
            })?;

            info!("Saved directional view: {}", path.display());
            Ok(path)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_plan_keeps_even_spacing() {
        let mut rng = StdRng::seed_from_u64(11);
        let plans = plan_views(&mut rng);
        assert_eq!(plans.len(), 8);

        for pair in plans.windows(2) {
            let step = (pair[1].azimuth_deg - pair[0].azimuth_deg).rem_euclid(360.0);
            assert_abs_diff_eq!(step, 45.0, epsilon = 1e-9);
        }
        for plan in &plans {
            assert!((0.0..360.0).contains(&plan.azimuth_deg));
            assert!((85.0..=95.0).contains(&plan.vfov_deg));
        }
        assert_eq!(plans[0].label, "N");
        assert_eq!(plans[7].label, "NW");
    }

    #[test]
    fn test_seeded_plans_repeat() {
        let a = plan_views(&mut StdRng::seed_from_u64(3));
        let b = plan_views(&mut StdRng::seed_from_u64(3));
        assert_eq!(a, b);
    }

    #[test]
    fn test_file_names() {
        let scene = SceneId::from("abcdefghijklmnopqrstuv");
        assert_eq!(
            view_file_name(&scene, 1, "N", HFOV_DEG),
            "abcdefghijklmnopqrstuv_View1_N_FOV90.0.jpg"
        );
        let names = view_file_names(&scene);
        assert_eq!(names[7], "abcdefghijklmnopqrstuv_View8_NW_FOV90.0.jpg");
    }

    #[test]
    fn test_file_names_stay_inside_output_dir() {
        let dir = tempfile::tempdir().unwrap();
        let scene = SceneId::from("../escape/..\\id");

        let name = view_file_name(&scene, 2, "NE", HFOV_DEG);
        assert_eq!(name, ".._escape_.._id_View2_NE_FOV90.0.jpg");
        assert_eq!(std::path::Path::new(&name).components().count(), 1);

        let pano = RgbImage::from_pixel(64, 32, image::Rgb([10, 20, 30]));
        let views = Reprojector::new()
            .with_size(8)
            .reproject(&pano, &scene, &mut StdRng::seed_from_u64(2))
            .unwrap();
        for path in save_views(&views, dir.path()).unwrap() {
            assert_eq!(path.parent(), Some(dir.path()));
        }
        assert!(views_exist(dir.path(), &scene));
    }

    #[test]
    fn test_center_pixel_recovers_azimuth() {
        let reprojector = Reprojector::new().level();
        let mut rng = StdRng::seed_from_u64(99);
        let (width, height) = (3600.0, 1800.0);

        for plan in plan_views(&mut rng) {
            let mapping = reprojector.mapping(&plan);
            let center = reprojector.size / 2;
            let (u, v) = mapping.source_pixel(center, center, width, height);

            let azimuth = u / width * 360.0;
            let diff = (azimuth - plan.azimuth_deg).rem_euclid(360.0);
            assert!(diff.min(360.0 - diff) < 1e-6);
            assert_abs_diff_eq!(v, height / 2.0, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_reproject_and_save() {
        let dir = tempfile::tempdir().unwrap();
        let pano = RgbImage::from_fn(256, 128, |x, _| image::Rgb([x as u8, 100, 50]));
        let scene = SceneId::from("abcdefghijklmnopqrstuv");

        let views = Reprojector::new()
            .with_size(32)
            .reproject(&pano, &scene, &mut StdRng::seed_from_u64(1))
            .unwrap();
        assert_eq!(views.len(), 8);
        assert!(views.iter().all(|v| v.image.dimensions() == (32, 32)));

        assert!(!views_exist(dir.path(), &scene));
        let paths = save_views(&views, dir.path()).unwrap();
        assert_eq!(paths.len(), 8);
        assert!(views_exist(dir.path(), &scene));
    }

    #[test]
    fn test_empty_panorama_is_rejected() {
        let result = Reprojector::new().reproject(
            &RgbImage::new(0, 0),
            &SceneId::from("x"),
            &mut StdRng::seed_from_u64(0),
        );
        assert!(matches!(result, Err(SceneError::Projection(_))));
    }
}
