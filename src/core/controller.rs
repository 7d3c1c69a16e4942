//! Per-agent controller.
//!
//! Runs path integration, goal learning and route learning once per tick,
//! then blends their steering suggestions with a random walk into a single
//! turning command. All noise is drawn from one [`Prng`] owned here, so a
//! seed reproduces a run exactly.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{NaviError, Result};
use crate::geom::{angle_diff, wrap_angle, Vec2};
use crate::goal_learning::{GoalConfig, GoalLearning};
use crate::pin::{PathIntegrator, PinConfig};
use crate::prng::Prng;
use crate::route_learning::{RouteConfig, RouteLearning};

/// Foraging phase of a trial.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Mode {
    #[default]
    Outbound,
    Inbound,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct Switches {
    pub pin_on: bool,
    pub homing_on: bool,
    pub gvlearn_on: bool,
    pub gvnavi_on: bool,
    pub lvlearn_on: bool,
    pub beta_on: bool,
}

impl Default for Switches {
    fn default() -> Self {
        Self {
            pin_on: true,
            homing_on: true,
            gvlearn_on: false,
            gvnavi_on: false,
            lvlearn_on: false,
            beta_on: false,
        }
    }
}

/// One value per steering source. Used both for blend weights and for the
/// motor components they multiply.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct MotorTerms {
    pub random: f64,
    pub path_integration: f64,
    pub global_vector: f64,
    pub local_vector: f64,
}

impl MotorTerms {
    pub const fn splat(x: f64) -> Self {
        Self {
            random: x,
            path_integration: x,
            global_vector: x,
            local_vector: x,
        }
    }

    pub fn dot(&self, other: &MotorTerms) -> f64 {
        self.random * other.random
            + self.path_integration * other.path_integration
            + self.global_vector * other.global_vector
            + self.local_vector * other.local_vector
    }

    fn is_finite(&self) -> bool {
        self.random.is_finite()
            && self.path_integration.is_finite()
            && self.global_vector.is_finite()
            && self.local_vector.is_finite()
    }
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ControllerConfig {
    pub pin: PinConfig,
    pub goal: GoalConfig,
    pub route: RouteConfig,
    pub switches: Switches,
    /// Base blend weights.
    pub weights: MotorTerms,
    /// Scale base weights by exploration and route reliability.
    pub adaptive_weights: bool,
    /// Std-dev of the random-walk motor term.
    pub random_noise: f64,
    /// Fraction of the random weight kept while homing.
    pub inbound_random_fraction: f64,
    /// Trial tick at which homing starts on its own.
    pub inward: Option<u64>,
    /// Activity sampling period in ticks.
    pub sample_interval: u64,
    /// Duration of one tick.
    pub dt: f64,
    pub seed: u64,
    /// Forget learned vectors and values at every reset.
    pub reset_learning: bool,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            pin: PinConfig::default(),
            goal: GoalConfig::default(),
            route: RouteConfig::default(),
            switches: Switches::default(),
            weights: MotorTerms::splat(1.0),
            adaptive_weights: true,
            random_noise: 0.5,
            inbound_random_fraction: 0.1,
            inward: None,
            sample_interval: 1,
            dt: 0.1,
            seed: 1,
            reset_learning: false,
        }
    }
}

impl ControllerConfig {
    /// Config with `num_neurons` units per ring and everything else default.
    pub fn with_size(num_neurons: usize) -> Self {
        Self {
            pin: PinConfig {
                num_neurons,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_switches(mut self, switches: Switches) -> Self {
        self.switches = switches;
        self
    }

    pub fn with_colors(mut self, num_colors: usize) -> Self {
        self.goal.num_colors = num_colors;
        self
    }

    pub fn with_landmarks(mut self, num_landmarks: usize) -> Self {
        self.route.num_landmarks = num_landmarks;
        self
    }

    pub fn with_leak(mut self, leak: f64) -> Self {
        self.pin.leak = leak;
        self
    }

    pub fn with_inward(mut self, inward: Option<u64>) -> Self {
        self.inward = inward;
        self
    }

    pub fn with_random_noise(mut self, stdev: f64) -> Self {
        self.random_noise = stdev;
        self
    }

    pub fn validate(&self) -> Result<()> {
        self.pin.validate()?;
        self.goal.validate()?;
        self.route.validate()?;
        if self.sample_interval == 0 {
            return Err(NaviError::InvalidConfig(
                "sample_interval must be positive".to_string(),
            ));
        }
        if !(self.dt > 0.0 && self.dt.is_finite()) {
            return Err(NaviError::InvalidConfig(format!(
                "dt must be finite and > 0, got {}",
                self.dt
            )));
        }
        if !(self.random_noise >= 0.0 && self.random_noise.is_finite()) {
            return Err(NaviError::InvalidConfig(format!(
                "random_noise must be finite and >= 0, got {}",
                self.random_noise
            )));
        }
        if !(0.0..=1.0).contains(&self.inbound_random_fraction) {
            return Err(NaviError::InvalidConfig(format!(
                "inbound_random_fraction must be in [0, 1], got {}",
                self.inbound_random_fraction
            )));
        }
        if !self.weights.is_finite() {
            return Err(NaviError::InvalidConfig(
                "blend weights must be finite".to_string(),
            ));
        }
        Ok(())
    }
}

/// Sensory input of one tick.
#[derive(Debug, Clone, Copy)]
pub struct Percept<'a> {
    /// Compass heading in radians.
    pub heading: f64,
    /// Distance covered this tick. The home vector saturates above
    /// [`MAX_SPEED`](crate::pin::MAX_SPEED).
    pub speed: f64,
    pub reward: f64,
    /// One signal per landmark.
    pub landmarks: &'a [f64],
    /// Colour of the goal the reward (if any) came from.
    pub color: usize,
    /// True displacement from the nest, when known.
    pub position: Option<Vec2>,
}

impl<'a> Percept<'a> {
    pub fn new(heading: f64, speed: f64) -> Self {
        Self {
            heading,
            speed,
            reward: 0.0,
            landmarks: &[],
            color: 0,
            position: None,
        }
    }

    pub fn with_reward(mut self, reward: f64, color: usize) -> Self {
        self.reward = reward;
        self.color = color;
        self
    }

    pub fn with_landmarks(mut self, landmarks: &'a [f64]) -> Self {
        self.landmarks = landmarks;
        self
    }

    pub fn with_position(mut self, position: Vec2) -> Self {
        self.position = Some(position);
        self
    }
}

/// Turning suggestion towards `v`: `sin(bearing - heading)`, 0 if `v` has
/// no bearing.
fn steer(v: Vec2, heading: f64) -> f64 {
    v.bearing()
        .map_or(0.0, |b| angle_diff(b, heading).sin())
}

#[derive(Debug, Clone)]
pub struct Controller {
    cfg: ControllerConfig,
    pin: PathIntegrator,
    goal: GoalLearning,
    route: RouteLearning,
    rng: Prng,
    mode: Mode,
    tick: u64,
    trial_tick: u64,
    trial: u64,
    time: f64,
    weights: MotorTerms,
    motor: MotorTerms,
    output: f64,
}

impl Controller {
    pub fn new(cfg: ControllerConfig) -> Result<Self> {
        cfg.validate()?;
        let n = cfg.pin.num_neurons;
        let pin = PathIntegrator::new(cfg.pin)?;
        let mut goal = GoalLearning::new(cfg.goal, n)?;
        goal.set_beta_adaptive(cfg.switches.beta_on);
        goal.set_learning(cfg.switches.gvlearn_on);
        let route = RouteLearning::new(cfg.route, n)?;
        let mut rng = Prng::new(cfg.seed);
        goal.choose(&mut rng);
        tracing::debug!(
            neurons = n,
            colors = cfg.goal.num_colors,
            landmarks = cfg.route.num_landmarks,
            seed = cfg.seed,
            "controller created"
        );
        Ok(Self {
            cfg,
            pin,
            goal,
            route,
            rng,
            mode: Mode::Outbound,
            tick: 0,
            trial_tick: 0,
            trial: 0,
            time: 0.0,
            weights: MotorTerms::default(),
            motor: MotorTerms::default(),
            output: 0.0,
        })
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.cfg
    }

    /// Process one tick of input and return the turning command.
    pub fn update(&mut self, percept: &Percept<'_>) -> Result<f64> {
        self.validate_percept(percept)?;
        let sw = self.cfg.switches;

        if sw.homing_on
            && self.mode == Mode::Outbound
            && self.cfg.inward.is_some_and(|t| self.trial_tick >= t)
        {
            self.set_inbound();
        }

        let heading = wrap_angle(percept.heading);
        if sw.pin_on {
            self.pin.update(heading, percept.speed, &mut self.rng)?;
        }
        let home = self.pin.hv();

        if sw.gvlearn_on || sw.homing_on {
            self.goal.update(
                percept.reward,
                percept.color,
                home,
                percept.position,
                &mut self.rng,
            )?;
        }
        if sw.lvlearn_on {
            self.route.update(percept.landmarks, percept.reward, home)?;
        }

        self.blend(heading, home)?;

        self.tick += 1;
        self.trial_tick += 1;
        self.time += self.cfg.dt;
        Ok(self.output)
    }

    fn validate_percept(&self, p: &Percept<'_>) -> Result<()> {
        if !p.heading.is_finite() || !p.speed.is_finite() {
            return Err(NaviError::InvalidInput(format!(
                "heading and speed must be finite, got {} and {}",
                p.heading, p.speed
            )));
        }
        if !(p.reward >= 0.0 && p.reward.is_finite()) {
            return Err(NaviError::InvalidInput(format!(
                "reward must be finite and >= 0, got {}",
                p.reward
            )));
        }
        if p.position.is_some_and(|v| !v.is_finite()) {
            return Err(NaviError::InvalidInput(
                "position must be finite".to_string(),
            ));
        }
        if self.cfg.switches.gvlearn_on || self.cfg.switches.homing_on {
            crate::error::check_index("goal colour", p.color, self.goal.num_colors())?;
        }
        if self.cfg.switches.lvlearn_on && p.landmarks.len() != self.route.num_landmarks() {
            return Err(NaviError::DimensionMismatch {
                expected: self.route.num_landmarks(),
                actual: p.landmarks.len(),
            });
        }
        if let Some(s) = p.landmarks.iter().find(|s| !s.is_finite()) {
            return Err(NaviError::InvalidInput(format!(
                "landmark signal must be finite, got {s}"
            )));
        }
        Ok(())
    }

    fn blend(&mut self, heading: f64, home: Vec2) -> Result<()> {
        let sw = self.cfg.switches;
        let outbound = self.mode == Mode::Outbound;
        let choice = self.goal.choice();

        let mut motor = MotorTerms {
            random: self.rng.noise(self.cfg.random_noise),
            ..MotorTerms::default()
        };
        if sw.homing_on && !outbound {
            motor.path_integration = steer(-home, heading);
        }
        if sw.gvnavi_on && outbound {
            motor.global_vector = steer(self.goal.gv_corrected(choice, home)?, heading);
        }
        if sw.lvlearn_on {
            motor.local_vector = steer(self.route.lv_active(home)?, heading);
        }

        let base = self.cfg.weights;
        let mut w = MotorTerms::default();
        if self.cfg.adaptive_weights {
            let expl = self.goal.expl(choice)?;
            let rho = if sw.lvlearn_on {
                self.route.reliability()
            } else {
                0.0
            };
            if outbound {
                w.random = if sw.gvnavi_on {
                    base.random * expl
                } else {
                    base.random
                };
                if sw.gvnavi_on {
                    w.global_vector = base.global_vector * (1.0 - expl);
                }
            } else {
                w.random = base.random * self.cfg.inbound_random_fraction;
                if sw.homing_on {
                    w.path_integration = base.path_integration * (1.0 - rho);
                }
            }
            if sw.lvlearn_on {
                w.local_vector = base.local_vector * rho;
            }
        } else {
            w.random = base.random;
            if sw.homing_on && !outbound {
                w.path_integration = base.path_integration;
            }
            if sw.gvnavi_on && outbound {
                w.global_vector = base.global_vector;
            }
            if sw.lvlearn_on {
                w.local_vector = base.local_vector;
            }
        }

        let output = w.dot(&motor);
        if !output.is_finite() {
            tracing::warn!(tick = self.tick, ?motor, ?w, "non-finite motor command");
            return Err(NaviError::NonFinite("motor command"));
        }
        self.motor = motor;
        self.weights = w;
        self.output = output;
        Ok(())
    }

    /// Start a new trial. Learned state survives unless `reset_learning`.
    pub fn reset(&mut self) {
        self.pin.reset();
        self.route.reset_trial();
        if self.cfg.reset_learning {
            self.goal.reset();
            self.route.reset();
        }
        self.mode = Mode::Outbound;
        self.trial_tick = 0;
        self.time = 0.0;
        self.weights = MotorTerms::default();
        self.motor = MotorTerms::default();
        self.output = 0.0;
        self.trial += 1;
        let choice = self.goal.choose(&mut self.rng);
        tracing::debug!(trial = self.trial, choice, "controller reset");
    }

    pub fn set_outbound(&mut self) {
        self.mode = Mode::Outbound;
    }

    pub fn set_inbound(&mut self) {
        if self.mode != Mode::Inbound {
            tracing::debug!(trial = self.trial, tick = self.trial_tick, "switching to inbound");
        }
        self.mode = Mode::Inbound;
    }

    /// Trial tick at which to start homing; `None` disables the switch.
    pub fn set_inward(&mut self, inward: Option<u64>) {
        self.cfg.inward = inward;
    }

    pub fn inward(&self) -> Option<u64> {
        self.cfg.inward
    }

    pub fn set_sample_interval(&mut self, interval: u64) -> Result<()> {
        if interval == 0 {
            return Err(NaviError::InvalidConfig(
                "sample_interval must be positive".to_string(),
            ));
        }
        self.cfg.sample_interval = interval;
        Ok(())
    }

    /// True on ticks whose activity should be recorded.
    pub fn should_sample(&self) -> bool {
        self.tick % self.cfg.sample_interval == 0
    }

    pub fn set_switches(&mut self, switches: Switches) {
        self.cfg.switches = switches;
        self.goal.set_beta_adaptive(switches.beta_on);
        self.goal.set_learning(switches.gvlearn_on);
    }

    pub fn switches(&self) -> Switches {
        self.cfg.switches
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn is_inbound(&self) -> bool {
        self.mode == Mode::Inbound
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn trial_tick(&self) -> u64 {
        self.trial_tick
    }

    /// Number of resets so far.
    pub fn trial(&self) -> u64 {
        self.trial
    }

    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn output(&self) -> f64 {
        self.output
    }

    pub fn weights(&self) -> MotorTerms {
        self.weights
    }

    pub fn motor(&self) -> MotorTerms {
        self.motor
    }

    pub fn num_neurons(&self) -> usize {
        self.cfg.pin.num_neurons
    }

    pub fn num_colors(&self) -> usize {
        self.goal.num_colors()
    }

    pub fn num_landmarks(&self) -> usize {
        self.route.num_landmarks()
    }

    pub fn pin(&self) -> &PathIntegrator {
        &self.pin
    }

    pub fn goal(&self) -> &GoalLearning {
        &self.goal
    }

    pub fn route(&self) -> &RouteLearning {
        &self.route
    }

    pub fn hv(&self) -> Vec2 {
        self.pin.hv()
    }

    pub fn hv_max(&self) -> Vec2 {
        self.pin.hv_max()
    }

    pub fn choice(&self) -> usize {
        self.goal.choice()
    }

    pub fn gv(&self, color: usize) -> Result<Vec2> {
        self.goal.gv(color)
    }

    pub fn gv_max(&self, color: usize) -> Result<Vec2> {
        self.goal.gv_max(color)
    }

    /// Goal vector of `color` after correction by the current home vector.
    pub fn gv_corrected(&self, color: usize) -> Result<Vec2> {
        self.goal.gv_corrected(color, self.pin.hv())
    }

    pub fn gv_vecavg(&self) -> Result<Option<f64>> {
        self.goal.gv_vecavg()
    }

    pub fn expl(&self, color: usize) -> Result<f64> {
        self.goal.expl(color)
    }

    pub fn e_beta(&self) -> f64 {
        self.goal.e_beta()
    }

    pub fn value(&self, color: usize) -> Result<f64> {
        self.goal.value(color)
    }

    pub fn reward_trace(&self, color: usize) -> Result<f64> {
        self.goal.reward_trace(color)
    }

    pub fn lv(&self, i: usize) -> Result<Vec2> {
        self.route.lv(i)
    }

    pub fn lv_active(&self) -> Result<Vec2> {
        self.route.lv_active(self.pin.hv())
    }

    pub fn el_lm(&self, i: usize) -> Result<f64> {
        self.route.el_lm(i)
    }

    pub fn lv_value(&self, i: usize) -> Result<f64> {
        self.route.lv_value(i)
    }

    pub fn set_expl(&mut self, color: usize, value: f64, hold: bool) -> Result<()> {
        self.goal.set_expl(color, value, hold)
    }

    pub fn set_delta_expl(&mut self, color: usize, value: f64, hold: bool) -> Result<()> {
        self.goal.set_delta_expl(color, value, hold)
    }

    pub fn set_gv(&mut self, color: usize, v: Vec2) -> Result<()> {
        self.goal.set_gv(color, v)
    }

    pub fn set_lv(&mut self, i: usize, v: Vec2, fix: bool) -> Result<()> {
        self.route.set_lv(i, v, fix)
    }

    pub fn set_lv_value(&mut self, i: usize, value: f64) -> Result<()> {
        self.route.set_lv_value(i, value)
    }
}
