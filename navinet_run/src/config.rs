use std::fs;
use std::path::{Path, PathBuf};

use navinet::controller::{ControllerConfig, Switches};
use navinet::pin::MAX_SPEED;
use serde::{Deserialize, Serialize};

use crate::arena::ArenaConfig;
use crate::error::RunError;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub controller: ControllerConfig,
    pub arena: ArenaConfig,
    pub trials: u32,
    /// Upper bound on ticks per trial.
    pub trial_steps: u64,
    /// Distance covered per tick.
    pub speed: f64,
    pub agents: usize,
    /// Where to write `.dat` files; nothing is written when unset.
    pub output_dir: Option<PathBuf>,
}

impl Default for RunConfig {
    fn default() -> Self {
        let switches = Switches {
            pin_on: true,
            homing_on: true,
            gvlearn_on: true,
            gvnavi_on: true,
            lvlearn_on: false,
            beta_on: false,
        };
        Self {
            controller: ControllerConfig::default()
                .with_switches(switches)
                .with_landmarks(1),
            arena: ArenaConfig::default(),
            trials: 20,
            trial_steps: 2000,
            speed: 1.0,
            agents: 1,
            output_dir: None,
        }
    }
}

impl RunConfig {
    pub fn load(path: &Path) -> Result<Self, RunError> {
        let text = fs::read_to_string(path).map_err(|e| RunError::io(path, e))?;
        let cfg: RunConfig = serde_json::from_str(&text).map_err(|source| RunError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.controller.seed = seed;
        self
    }

    pub fn with_agents(mut self, agents: usize) -> Self {
        self.agents = agents;
        self
    }

    pub fn validate(&self) -> Result<(), RunError> {
        self.controller.validate()?;
        if self.trials == 0 || self.trial_steps == 0 || self.agents == 0 {
            return Err(RunError::Config(
                "trials, trial_steps and agents must be positive".to_string(),
            ));
        }
        if !(0.0..=MAX_SPEED).contains(&self.speed) {
            return Err(RunError::Config(format!(
                "speed must be in [0, {MAX_SPEED}], got {}",
                self.speed
            )));
        }
        let landmarks = self.arena.landmarks.len();
        if self.controller.route.num_landmarks != landmarks {
            return Err(RunError::Config(format!(
                "controller expects {} landmarks, arena has {landmarks}",
                self.controller.route.num_landmarks
            )));
        }
        let colors = self.controller.goal.num_colors;
        if let Some(g) = self.arena.goals.iter().find(|g| g.color >= colors) {
            return Err(RunError::Config(format!(
                "goal colour {} out of range ({colors} colours)",
                g.color
            )));
        }
        if let Some(lm) = self.arena.landmarks.iter().find(|lm| !(lm.range > 0.0)) {
            return Err(RunError::Config(format!(
                "landmark range must be positive, got {}",
                lm.range
            )));
        }
        if !(self.arena.nest_radius > 0.0) {
            return Err(RunError::Config("nest_radius must be positive".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        RunConfig::default().validate().unwrap();
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let json = r#"{
            "trials": 3,
            "controller": { "pin": { "num_neurons": 36, "leak": 0.001 }, "seed": 7 },
            "arena": { "goals": [ { "position": { "x": 5.0, "y": 0.0 } } ] }
        }"#;
        let cfg: RunConfig = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.trials, 3);
        assert_eq!(cfg.trial_steps, RunConfig::default().trial_steps);
        assert_eq!(cfg.controller.pin.num_neurons, 36);
        assert_eq!(cfg.controller.seed, 7);
        assert_eq!(cfg.arena.goals[0].radius, 2.0);
        assert_eq!(cfg.arena.goals[0].reward, 1.0);
        // The controller section is replaced wholesale, so its landmark
        // count falls back to the library default.
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn speed_is_limited_to_what_the_integrator_can_encode() {
        for speed in [0.0, 0.5, MAX_SPEED] {
            let cfg = RunConfig {
                speed,
                ..Default::default()
            };
            assert!(cfg.validate().is_ok(), "speed {speed} rejected");
        }
        for speed in [-0.1, 1.5, 2.0, f64::NAN, f64::INFINITY] {
            let cfg = RunConfig {
                speed,
                ..Default::default()
            };
            assert!(
                matches!(cfg.validate(), Err(RunError::Config(_))),
                "speed {speed} accepted"
            );
        }
    }

    #[test]
    fn mismatched_landmarks_are_rejected() {
        let mut cfg = RunConfig::default();
        cfg.arena.landmarks.clear();
        assert!(matches!(cfg.validate(), Err(RunError::Config(_))));
    }

    #[test]
    fn goal_colour_must_exist() {
        let mut cfg = RunConfig::default();
        cfg.arena.goals[0].color = 1;
        assert!(cfg.validate().is_err());
        cfg.controller.goal.num_colors = 2;
        cfg.validate().unwrap();
    }
}
