//! Open-field arena for a point agent.
//!
//! The nest sits at the origin. Goals pay out once per trial on first
//! contact; landmarks emit a signal that falls off linearly with distance.

use navinet::geom::{wrap_angle, Vec2};
use navinet::prng::Prng;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Goal {
    pub position: Vec2,
    #[serde(default)]
    pub color: usize,
    #[serde(default = "default_goal_radius")]
    pub radius: f64,
    #[serde(default = "default_goal_reward")]
    pub reward: f64,
}

fn default_goal_radius() -> f64 {
    2.0
}

fn default_goal_reward() -> f64 {
    1.0
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Landmark {
    pub position: Vec2,
    pub range: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArenaConfig {
    pub goals: Vec<Goal>,
    pub landmarks: Vec<Landmark>,
    pub nest_radius: f64,
    /// Heading change per unit of motor command.
    pub turn_gain: f64,
    /// Fixed heading at trial start; random when unset.
    pub start_heading: Option<f64>,
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self {
            goals: vec![Goal {
                position: Vec2::new(20.0, 30.0),
                color: 0,
                radius: default_goal_radius(),
                reward: default_goal_reward(),
            }],
            landmarks: vec![Landmark {
                position: Vec2::new(10.0, 15.0),
                range: 6.0,
            }],
            nest_radius: 2.0,
            turn_gain: 0.3,
            start_heading: None,
        }
    }
}

/// First contact with a goal during the current trial.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Contact {
    pub goal: usize,
    pub color: usize,
    pub reward: f64,
}

#[derive(Debug, Clone)]
pub struct Arena {
    cfg: ArenaConfig,
    position: Vec2,
    heading: f64,
    collected: Vec<bool>,
    signals: Vec<f64>,
}

impl Arena {
    pub fn new(cfg: ArenaConfig) -> Self {
        let goals = cfg.goals.len();
        let landmarks = cfg.landmarks.len();
        Self {
            cfg,
            position: Vec2::ZERO,
            heading: 0.0,
            collected: vec![false; goals],
            signals: vec![0.0; landmarks],
        }
    }

    pub fn config(&self) -> &ArenaConfig {
        &self.cfg
    }

    pub fn position(&self) -> Vec2 {
        self.position
    }

    pub fn heading(&self) -> f64 {
        self.heading
    }

    pub fn signals(&self) -> &[f64] {
        &self.signals
    }

    pub fn at_nest(&self) -> bool {
        self.position.len() < self.cfg.nest_radius
    }

    /// Put the agent back in the nest and make every goal available again.
    pub fn reset(&mut self, rng: &mut Prng) {
        self.position = Vec2::ZERO;
        self.heading = match self.cfg.start_heading {
            Some(h) => wrap_angle(h),
            None => rng.gen_range_f64(-core::f64::consts::PI, core::f64::consts::PI),
        };
        self.collected.iter_mut().for_each(|c| *c = false);
        self.signals.iter_mut().for_each(|s| *s = 0.0);
    }

    /// Turn by `command`, then move `speed` along the new heading.
    pub fn advance(&mut self, command: f64, speed: f64) {
        self.heading = wrap_angle(self.heading + self.cfg.turn_gain * command);
        self.position += Vec2::from_polar(speed, self.heading);
    }

    /// Refresh landmark signals and report a new goal contact, if any.
    pub fn sense(&mut self) -> Option<Contact> {
        for (s, lm) in self.signals.iter_mut().zip(&self.cfg.landmarks) {
            let d = (self.position - lm.position).len();
            *s = if d < lm.range { 1.0 - d / lm.range } else { 0.0 };
        }
        for (i, goal) in self.cfg.goals.iter().enumerate() {
            if self.collected[i] {
                continue;
            }
            if (self.position - goal.position).len() <= goal.radius {
                self.collected[i] = true;
                return Some(Contact {
                    goal: i,
                    color: goal.color,
                    reward: goal.reward,
                });
            }
        }
        None
    }
}
