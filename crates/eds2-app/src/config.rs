// SPDX-License-Identifier: CEPL-1.0
use eds2_math::{Camera, Vec3, Vec4};
use eds2_scene::{DemoConfig, OscillatorSettings};
use serde::Deserialize;
use std::{fs, io, path::Path};
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum VsyncMode {
    Fifo,
    #[default]
    Mailbox,
}

impl From<VsyncMode> for eds2_render_vk::VkVsyncMode {
    fn from(m: VsyncMode) -> Self {
        match m {
            VsyncMode::Fifo => Self::Fifo,
            VsyncMode::Mailbox => Self::Mailbox,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct RenderCfg {
    pub clear_color: [f32; 4],
    pub vsync: bool,
    pub vsync_mode: VsyncMode,
}

impl Default for RenderCfg {
    fn default() -> Self {
        RenderCfg {
            clear_color: [0.02, 0.02, 0.04, 1.0],
            vsync: true,
            vsync_mode: VsyncMode::Mailbox,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct SceneCfg {
    pub tessellation: bool,
    pub tessellation_factor: f32,
    pub patch_control_points: f32,
    pub selection_active: bool,
    pub selected_index: usize,
    pub light_pos: [f32; 4],
}

impl Default for SceneCfg {
    fn default() -> Self {
        let d = DemoConfig::default();
        SceneCfg {
            tessellation: d.tessellation,
            tessellation_factor: d.tessellation_factor,
            patch_control_points: d.patch_control_points,
            selection_active: d.selection_active,
            selected_index: d.selected_index,
            light_pos: d.light_pos.to_array(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct AnimationCfg {
    pub interval: f32,
    pub step: f32,
    pub bound: f32,
}

impl Default for AnimationCfg {
    fn default() -> Self {
        let d = OscillatorSettings::default();
        AnimationCfg {
            interval: d.interval,
            step: d.step,
            bound: d.bound,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct CameraCfg {
    pub eye: [f32; 3],
    pub target: [f32; 3],
    pub fov_y_deg: f32,
    pub z_near: f32,
    pub z_far: f32,
}

impl Default for CameraCfg {
    fn default() -> Self {
        let c = Camera::default();
        CameraCfg {
            eye: c.eye.to_array(),
            target: c.target.to_array(),
            fov_y_deg: c.fov_y_deg,
            z_near: c.z_near,
            z_far: c.z_far,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct AppCfg {
    pub render: RenderCfg,
    pub scene: SceneCfg,
    pub animation: AnimationCfg,
    pub camera: CameraCfg,
}

impl AppCfg {
    pub fn demo_config(&self) -> DemoConfig {
        DemoConfig {
            tessellation: self.scene.tessellation,
            tessellation_factor: self.scene.tessellation_factor,
            patch_control_points: self.scene.patch_control_points,
            selection_active: self.scene.selection_active,
            selected_index: self.scene.selected_index,
            animation: OscillatorSettings {
                interval: self.animation.interval,
                step: self.animation.step,
                bound: self.animation.bound,
            },
            camera: Camera {
                eye: Vec3::from_array(self.camera.eye),
                target: Vec3::from_array(self.camera.target),
                fov_y_deg: self.camera.fov_y_deg,
                z_near: self.camera.z_near,
                z_far: self.camera.z_far,
                ..Camera::default()
            },
            light_pos: Vec4::from_array(self.scene.light_pos),
        }
    }
}

pub fn parse_cfg(src: &str) -> Result<AppCfg, toml::de::Error> {
    toml::from_str::<AppCfg>(src)
}

/// Missing file or bad TOML both fall back to defaults.
pub fn load_cfg(path: &Path) -> AppCfg {
    match fs::read_to_string(path) {
        Ok(s) => parse_cfg(&s).unwrap_or_else(|e| {
            warn!(path = %path.display(), "config ignored: {e}");
            AppCfg::default()
        }),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            info!(path = %path.display(), "no config file; using defaults");
            AppCfg::default()
        }
        Err(e) => {
            warn!(path = %path.display(), "config unreadable: {e}");
            AppCfg::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_is_all_defaults() {
        let cfg = parse_cfg("").unwrap();
        assert!(cfg.render.vsync);
        assert_eq!(cfg.render.vsync_mode, VsyncMode::Mailbox);
        assert!(cfg.scene.tessellation);
        assert_eq!(cfg.scene.patch_control_points, 3.0);
        assert_eq!(cfg.animation.interval, 0.05);
        assert_eq!(cfg.animation.bound, 0.03);
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let cfg = parse_cfg(
            r#"
            [render]
            vsync_mode = "fifo"

            [scene]
            tessellation_factor = 4.0
            selection_active = true
            selected_index = 2
            "#,
        )
        .unwrap();
        assert_eq!(cfg.render.vsync_mode, VsyncMode::Fifo);
        assert!(cfg.render.vsync);
        assert_eq!(cfg.scene.tessellation_factor, 4.0);
        assert!(cfg.scene.tessellation);

        let demo = cfg.demo_config();
        assert!(demo.selection_active);
        assert_eq!(demo.selected_index, 2);
        assert_eq!(demo.animation.step, 0.0005);
    }

    #[test]
    fn camera_section_reaches_demo_config() {
        let cfg = parse_cfg(
            r#"
            [camera]
            eye = [0.0, 1.0, -5.0]
            fov_y_deg = 45.0
            "#,
        )
        .unwrap();
        let cam = cfg.demo_config().camera;
        assert_eq!(cam.eye, Vec3::new(0.0, 1.0, -5.0));
        assert_eq!(cam.fov_y_deg, 45.0);
        assert_eq!(cam.target, Camera::default().target);
    }

    #[test]
    fn bad_toml_is_an_error() {
        assert!(parse_cfg("[render\nvsync = ").is_err());
        assert!(parse_cfg("[render]\nvsync_mode = \"immediate\"").is_err());
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let cfg = load_cfg(Path::new("definitely/not/here/eds2.toml"));
        assert_eq!(cfg.render.clear_color, RenderCfg::default().clear_color);
    }
}
