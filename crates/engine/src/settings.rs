//! Tunables for the assimilation engine.

use aquatrack_config::AppConfig;
use aquatrack_domain::normalize_stage;

/// Permissive per-stage safety caps (grams). These are upper bounds well
/// above natural transition thresholds; they never force a transition.
#[derive(Debug, Clone)]
pub struct StageCaps {
    caps: Vec<(String, f64)>,
}

impl Default for StageCaps {
    fn default() -> Self {
        Self {
            caps: vec![
                ("egg".into(), 1.0),
                ("alevin".into(), 1.0),
                ("egg&alevin".into(), 1.0),
                ("egg_alevin".into(), 1.0),
                ("fry".into(), 10.0),
                ("parr".into(), 100.0),
                ("smolt".into(), 250.0),
                ("post_smolt".into(), 700.0),
                ("adult".into(), 8000.0),
                ("harvest".into(), 8000.0),
            ],
        }
    }
}

impl StageCaps {
    pub fn cap_for(&self, stage: &str) -> Option<f64> {
        let wanted = normalize_stage(stage);
        self.caps
            .iter()
            .find(|(name, _)| *name == wanted)
            .map(|(_, cap)| *cap)
    }

    /// Override or add one stage's cap (species-specific tables).
    pub fn with_cap(mut self, stage: &str, cap_g: f64) -> Self {
        let key = normalize_stage(stage);
        match self.caps.iter_mut().find(|(name, _)| *name == key) {
            Some(entry) => entry.1 = cap_g,
            None => self.caps.push((key, cap_g)),
        }
        self
    }
}

/// Engine settings, read once at startup.
#[derive(Debug, Clone)]
pub struct AssimilationSettings {
    /// Substitute temperature for freshwater stages (°C).
    pub freshwater_temp_c: f64,
    pub stage_caps: StageCaps,
    /// Anchor weight factor when a transfer selected the largest fish.
    pub bias_largest: f64,
    /// Anchor weight factor when a transfer selected the smallest fish.
    pub bias_smallest: f64,
    /// Minimum daily biomass gain before an observed FCR is recorded (kg).
    pub fcr_gain_floor_kg: f64,
    /// Ceiling applied to observed FCR values.
    pub fcr_cap: f64,
}

impl Default for AssimilationSettings {
    fn default() -> Self {
        Self {
            freshwater_temp_c: 12.0,
            stage_caps: StageCaps::default(),
            bias_largest: 0.88,
            bias_smallest: 1.12,
            fcr_gain_floor_kg: 1.0,
            fcr_cap: 10.0,
        }
    }
}

impl AssimilationSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            freshwater_temp_c: config.freshwater_temp_c,
            stage_caps: StageCaps::default(),
            bias_largest: config.bias_largest,
            bias_smallest: config.bias_smallest,
            fcr_gain_floor_kg: config.fcr_gain_floor_kg,
            fcr_cap: 10.0,
        }
    }
}
