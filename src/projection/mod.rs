//! Directional view generation
//!
//! This module handles:
//! - Per-pixel equirectangular resampling (`rectilinear`)
//! - View planning, rendering and writing (`views`)

pub mod rectilinear;
pub mod views;

pub use views::{
    plan_views, save_views, view_file_name, view_file_names, views_exist, DirectionalView,
    Reprojector, ViewPlan,
};
