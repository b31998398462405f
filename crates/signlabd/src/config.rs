use signlab_hw::CameraConfig;
use std::path::PathBuf;

/// Daemon configuration, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub api_host: String,
    pub api_port: u16,
    /// Path to the SQLite database file.
    pub db_path: PathBuf,
    /// Directory containing ONNX model files and class names.
    pub model_dir: PathBuf,
    pub hand_landmark_model: PathBuf,
    pub sign_model: PathBuf,
    pub class_names: PathBuf,
    /// V4L2 device tried first (default: /dev/video0).
    pub camera_device: String,
    pub camera_width: u32,
    pub camera_height: u32,
    pub camera_fps: u32,
    pub camera_buffers: u32,
    pub camera_mirror: bool,
    /// Frames discarded after each stream start (exposure settling).
    pub camera_warmup_frames: u32,
    /// Minimum confidence for a sign to count as correct.
    pub confidence_threshold: f32,
    pub enable_real_time_feedback: bool,
    pub enable_progress_analytics: bool,
    pub enable_multi_language: bool,
    pub enable_export_data: bool,
}

impl Config {
    /// Load configuration from the process environment with defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let data_dir = lookup("XDG_DATA_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|| {
                let home = lookup("HOME").unwrap_or_else(|| "/tmp".to_string());
                PathBuf::from(home).join(".local/share")
            })
            .join("signlab");

        let db_path = lookup("DATABASE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| data_dir.join("platform.db"));

        let model_dir = lookup("MODEL_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("models"));

        let model_file = |key: &str, file: &str| {
            lookup(key)
                .map(PathBuf::from)
                .unwrap_or_else(|| model_dir.join(file))
        };
        let hand_landmark_model = model_file("HAND_LANDMARK_MODEL_PATH", "hand_landmark.onnx");
        let sign_model = model_file("SIGN_MODEL_PATH", "sign_classifier.onnx");
        let class_names = model_file("CLASS_NAMES_PATH", "class_names.txt");

        Self {
            api_host: lookup("API_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            api_port: parse_or(lookup("API_PORT"), 8000),
            db_path,
            model_dir,
            hand_landmark_model,
            sign_model,
            class_names,
            camera_device: lookup("CAMERA_DEVICE").unwrap_or_else(|| "/dev/video0".to_string()),
            camera_width: parse_or(lookup("CAMERA_WIDTH"), 1280),
            camera_height: parse_or(lookup("CAMERA_HEIGHT"), 720),
            camera_fps: parse_or(lookup("CAMERA_FPS"), 30),
            camera_buffers: parse_or(lookup("CAMERA_BUFFER_SIZE"), 1u32).max(1),
            camera_mirror: flag(lookup("CAMERA_MIRROR"), true),
            camera_warmup_frames: parse_or(lookup("CAMERA_WARMUP_FRAMES"), 3),
            confidence_threshold: parse_or(lookup("CONFIDENCE_THRESHOLD"), 0.7),
            enable_real_time_feedback: flag(lookup("ENABLE_REAL_TIME_FEEDBACK"), true),
            enable_progress_analytics: flag(lookup("ENABLE_PROGRESS_ANALYTICS"), true),
            enable_multi_language: flag(lookup("ENABLE_MULTI_LANGUAGE"), true),
            enable_export_data: flag(lookup("ENABLE_EXPORT_DATA"), true),
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.api_host, self.api_port)
    }

    pub fn camera_config(&self) -> CameraConfig {
        CameraConfig {
            device: self.camera_device.clone(),
            width: self.camera_width,
            height: self.camera_height,
            fps: self.camera_fps,
            buffers: self.camera_buffers,
            mirror: self.camera_mirror,
            warmup_frames: self.camera_warmup_frames,
        }
    }

    pub fn hand_landmark_model_path(&self) -> String {
        self.hand_landmark_model.to_string_lossy().into_owned()
    }

    pub fn sign_model_path(&self) -> String {
        self.sign_model.to_string_lossy().into_owned()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

fn parse_or<T: std::str::FromStr>(value: Option<String>, default: T) -> T {
    value
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn flag(value: Option<String>, default: bool) -> bool {
    value.and_then(|v| parse_bool(&v)).unwrap_or(default)
}

/// `1/0/true/false/yes/no/on/off`, case-insensitive.
pub fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Config {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|k| env.get(k).cloned())
    }

    #[test]
    fn test_defaults() {
        let cfg = config_from(&[("HOME", "/home/learner")]);
        assert_eq!(cfg.bind_addr(), "0.0.0.0:8000");
        assert_eq!(cfg.db_path, PathBuf::from("/home/learner/.local/share/signlab/platform.db"));
        assert_eq!(cfg.hand_landmark_model, PathBuf::from("models/hand_landmark.onnx"));
        assert_eq!(cfg.class_names, PathBuf::from("models/class_names.txt"));
        assert_eq!(cfg.camera_device, "/dev/video0");
        assert_eq!((cfg.camera_width, cfg.camera_height, cfg.camera_fps), (1280, 720, 30));
        assert!((cfg.confidence_threshold - 0.7).abs() < f32::EPSILON);
        assert!(cfg.enable_export_data && cfg.enable_multi_language);
    }

    #[test]
    fn test_overrides() {
        let cfg = config_from(&[
            ("API_PORT", "9100"),
            ("XDG_DATA_HOME", "/var/lib"),
            ("MODEL_DIR", "/opt/models"),
            ("SIGN_MODEL_PATH", "/srv/custom.onnx"),
            ("CAMERA_MIRROR", "off"),
            ("ENABLE_EXPORT_DATA", "No"),
            ("CONFIDENCE_THRESHOLD", "0.85"),
        ]);
        assert_eq!(cfg.api_port, 9100);
        assert_eq!(cfg.db_path, PathBuf::from("/var/lib/signlab/platform.db"));
        assert_eq!(cfg.hand_landmark_model, PathBuf::from("/opt/models/hand_landmark.onnx"));
        assert_eq!(cfg.sign_model_path(), "/srv/custom.onnx");
        assert!(!cfg.camera_mirror);
        assert!(!cfg.enable_export_data);
        assert!((cfg.confidence_threshold - 0.85).abs() < 1e-6);
    }

    #[test]
    fn test_unparseable_values_fall_back() {
        let cfg = config_from(&[
            ("API_PORT", "eighty"),
            ("CAMERA_BUFFER_SIZE", "0"),
            ("ENABLE_MULTI_LANGUAGE", "maybe"),
        ]);
        assert_eq!(cfg.api_port, 8000);
        assert_eq!(cfg.camera_buffers, 1);
        assert!(cfg.enable_multi_language);
    }

    #[test]
    fn test_parse_bool() {
        for s in ["1", "TRUE", "yes", "On"] {
            assert_eq!(parse_bool(s), Some(true));
        }
        for s in ["0", "false", "NO", "off"] {
            assert_eq!(parse_bool(s), Some(false));
        }
        assert_eq!(parse_bool("2"), None);
    }

    #[test]
    fn test_camera_config() {
        let cfg = config_from(&[("CAMERA_DEVICE", "/dev/video3"), ("CAMERA_WARMUP_FRAMES", "5")]);
        let cam = cfg.camera_config();
        assert_eq!(cam.device, "/dev/video3");
        assert_eq!(cam.warmup_frames, 5);
        assert!(cam.mirror);
    }
}
