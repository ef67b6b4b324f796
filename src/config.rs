use anyhow::{Context, Result, anyhow};
use directories::UserDirs;
use log::info;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::counter::RepLabel;
use crate::error::ConfigError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Meta {
    pub name: Option<String>,
    #[serde(default = "default_exercise")]
    pub exercise: String,
    #[serde(default)]
    pub description: Option<String>,
}

fn default_exercise() -> String {
    "squat".to_string()
}

/// Hip motion thresholds, in normalized image units per frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MotionThresholds {
    pub move_start: f32,
    pub move_end: f32,
    pub ready_frames: u32,
    #[serde(default)]
    pub min_confidence: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepThresholds {
    pub post_rep_freeze: u32,
    pub down_entry_angle: f32,
    pub down_exit_angle: f32,
    #[serde(default)]
    pub early_start_angle: Option<f32>,
    #[serde(default)]
    pub min_rep_frames: u64,
    #[serde(default)]
    pub min_frames_before_end: u64,
}

/// Minimum knee angle range `(above, up_to]` mapped to a label.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Band {
    pub label: RepLabel,
    pub above: f32,
    pub up_to: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradeBand {
    pub name: String,
    pub min_score: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scoring {
    pub full_weight: f64,
    pub basic_weight: f64,
    pub half_weight: f64,
    pub fail_penalty: f64,
    pub grades: Vec<GradeBand>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub meta: Meta,
    pub motion: MotionThresholds,
    pub reps: RepThresholds,
    pub bands: Vec<Band>,
    pub scoring: Scoring,
}

const BUILTIN_PROFILES: [(&str, &str); 2] = [
    ("default", include_str!("../profiles/default.toml")),
    ("classic", include_str!("../profiles/classic.toml")),
];

impl Profile {
    pub fn from_toml_str(txt: &str) -> Result<Self> {
        let profile: Profile = toml::from_str(txt)?;
        profile.validate()?;
        Ok(profile)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let txt = fs::read_to_string(path)
            .map_err(|e| anyhow!("failed to read {}: {e}", path.display()))?;
        Self::from_toml_str(&txt).with_context(|| format!("invalid profile {}", path.display()))
    }

    /// One of the calibrations compiled into the binary.
    pub fn builtin(name: &str) -> Result<Self> {
        let (_, txt) = BUILTIN_PROFILES
            .iter()
            .find(|(n, _)| *n == name)
            .ok_or_else(|| anyhow!("no built-in profile named '{name}'"))?;
        Self::from_toml_str(txt)
    }

    pub fn display_name(&self) -> &str {
        self.meta.name.as_deref().unwrap_or("unnamed")
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_motion(&self.motion)?;
        validate_reps(&self.reps)?;
        validate_bands(&self.bands)?;
        validate_scoring(&self.scoring)
    }
}

fn check_angle(name: &'static str, value: f32) -> Result<(), ConfigError> {
    if !value.is_finite() || value <= 0.0 || value > 180.0 {
        return Err(ConfigError::AngleOutOfRange { name, value });
    }
    Ok(())
}

fn check_motion(name: &'static str, value: f32) -> Result<(), ConfigError> {
    if !value.is_finite() || value < 0.0 {
        return Err(ConfigError::InvalidMotion { name, value });
    }
    Ok(())
}

fn validate_motion(m: &MotionThresholds) -> Result<(), ConfigError> {
    check_motion("motion.move_start", m.move_start)?;
    check_motion("motion.move_end", m.move_end)?;
    if m.move_start > m.move_end {
        return Err(ConfigError::InvertedMotion {
            start: m.move_start,
            end: m.move_end,
        });
    }
    if m.ready_frames == 0 {
        return Err(ConfigError::ZeroReadyFrames);
    }
    if !(0.0..=1.0).contains(&m.min_confidence) {
        return Err(ConfigError::InvalidConfidence(m.min_confidence));
    }
    Ok(())
}

fn validate_reps(r: &RepThresholds) -> Result<(), ConfigError> {
    check_angle("reps.down_entry_angle", r.down_entry_angle)?;
    check_angle("reps.down_exit_angle", r.down_exit_angle)?;
    if let Some(a) = r.early_start_angle {
        check_angle("reps.early_start_angle", a)?;
    }
    if r.down_entry_angle < r.down_exit_angle {
        return Err(ConfigError::InvertedAngles {
            entry: r.down_entry_angle,
            exit: r.down_exit_angle,
        });
    }
    Ok(())
}

fn validate_bands(bands: &[Band]) -> Result<(), ConfigError> {
    for b in bands {
        let ok = b.above.is_finite()
            && b.up_to.is_finite()
            && b.above >= 0.0
            && b.above < b.up_to
            && b.up_to <= 180.0;
        if !ok {
            return Err(ConfigError::BadBand {
                label: b.label,
                above: b.above,
                up_to: b.up_to,
            });
        }
    }

    let mut sorted: Vec<&Band> = bands.iter().collect();
    sorted.sort_by(|a, b| a.above.total_cmp(&b.above));
    for pair in sorted.windows(2) {
        // touching edges are fine: (a, b] and (b, c]
        if pair[1].above < pair[0].up_to {
            return Err(ConfigError::OverlappingBands {
                first: pair[0].label,
                second: pair[1].label,
            });
        }
    }
    Ok(())
}

fn validate_scoring(s: &Scoring) -> Result<(), ConfigError> {
    for (name, value) in [
        ("full_weight", s.full_weight),
        ("basic_weight", s.basic_weight),
        ("half_weight", s.half_weight),
        ("fail_penalty", s.fail_penalty),
    ] {
        if !value.is_finite() || value < 0.0 {
            return Err(ConfigError::InvalidWeight { name, value });
        }
    }

    let last = s.grades.last().ok_or(ConfigError::NoGrades)?;
    for g in &s.grades {
        if g.min_score > 100 {
            return Err(ConfigError::GradeOutOfRange(g.name.clone()));
        }
    }
    for pair in s.grades.windows(2) {
        if pair[1].min_score >= pair[0].min_score {
            return Err(ConfigError::UnorderedGrades(pair[1].name.clone()));
        }
    }
    if last.min_score != 0 {
        return Err(ConfigError::GradesNotExhaustive);
    }
    Ok(())
}

/// Calibration profiles on disk plus the pointer to the active one.
#[derive(Debug, Clone)]
pub struct ProfileStore {
    pub config_dir: PathBuf,
    pub profiles_dir: PathBuf,
    pub active_ptr: PathBuf,
}

impl ProfileStore {
    /// `~/.config/repctl`
    pub fn user() -> Result<Self> {
        let home = UserDirs::new()
            .ok_or_else(|| anyhow!("cannot determine home directory"))?
            .home_dir()
            .to_path_buf();
        Ok(Self::at(home.join(".config").join("repctl")))
    }

    pub fn at(config_dir: PathBuf) -> Self {
        Self {
            profiles_dir: config_dir.join("profiles"),
            active_ptr: config_dir.join("active"),
            config_dir,
        }
    }

    /// Writes the built-in profiles and the active pointer if missing.
    pub fn install_defaults(&self) -> Result<()> {
        fs::create_dir_all(&self.profiles_dir)?;
        for (name, txt) in BUILTIN_PROFILES {
            let path = self.profile_path(name);
            if !path.exists() {
                fs::write(&path, txt)?;
                info!("installed {name} profile at {}", path.display());
            }
        }
        if !self.active_ptr.exists() {
            fs::write(&self.active_ptr, b"default")?;
        }
        Ok(())
    }

    pub fn profile_path(&self, name: &str) -> PathBuf {
        self.profiles_dir.join(format!("{name}.toml"))
    }

    pub fn active_name(&self) -> Result<String> {
        let name = fs::read_to_string(&self.active_ptr)
            .map_err(|e| anyhow!("failed to read {}: {e}", self.active_ptr.display()))?;
        Ok(name.trim().to_string())
    }

    pub fn set_active(&self, name: &str) -> Result<()> {
        let p = self.profile_path(name);
        if !p.exists() {
            return Err(anyhow!("profile not found: {}", p.display()));
        }
        // refuse to point at something that would not load
        Profile::from_file(&p)?;
        fs::write(&self.active_ptr, name.as_bytes())?;
        Ok(())
    }

    pub fn list_profiles(&self) -> Vec<String> {
        let mut v = Vec::new();
        if let Ok(rd) = fs::read_dir(&self.profiles_dir) {
            for e in rd.flatten() {
                let path = e.path();
                if path.extension().is_some_and(|ext| ext == "toml") {
                    if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                        v.push(stem.to_string());
                    }
                }
            }
        }
        v.sort();
        v
    }

    pub fn load(&self, name: &str) -> Result<Profile> {
        Profile::from_file(&self.profile_path(name))
    }

    pub fn load_active(&self) -> Result<Profile> {
        self.load(&self.active_name()?)
    }

    /// A `--profile` argument: an existing file path, or a profile name.
    pub fn resolve(&self, arg: &str) -> Result<Profile> {
        let path = Path::new(arg);
        if path.is_file() {
            return Profile::from_file(path);
        }
        self.load(arg)
    }
}
