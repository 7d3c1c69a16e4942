//! Global-vector learning.
//!
//! One weight ring per goal colour stores a population-coded vector that is
//! pulled towards the agent's position estimate whenever that colour pays
//! out. Alongside it sit a TD value, a discounted reward trace and an
//! exploration rate per colour. The exploration rates relax towards
//! `exp(-β·V)`, with β owned by an [`ExplorationTemperature`] that sharpens
//! while rewards arrive reliably.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::circular_array::{check_directional, CircularArray};
use crate::error::{check_index, NaviError, Result};
use crate::geom::Vec2;
use crate::prng::Prng;

/// What a rewarded goal vector is pulled towards.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum GoalTarget {
    /// The path integrator's home vector (the agent's own estimate).
    #[default]
    PathIntegration,
    /// The true displacement, when the caller provides it.
    TrueDisplacement,
}

/// Post-processing that turns a stored goal vector into a steering vector.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum GoalCorrection {
    /// Report the stored vector unchanged.
    None,
    /// Subtract the current home vector: the goal as seen from the agent.
    #[default]
    SubtractHome,
}

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct TemperatureConfig {
    /// β at start, and the floor β relaxes to without reward.
    pub initial: f64,
    /// How far reliable reward can raise β above `initial`.
    pub lambda: f64,
    /// Relaxation rate of β per tick.
    pub mu: f64,
    /// Discount of the running reward mean and variance.
    pub discount: f64,
}

impl Default for TemperatureConfig {
    fn default() -> Self {
        Self {
            initial: 5.0,
            lambda: 100.0,
            mu: 0.000001,
            discount: 0.9995,
        }
    }
}

/// Adaptive inverse temperature of the exploration policy.
///
/// Tracks a discounted mean `m` and variance `s²` of the reward stream and
/// moves β towards `initial + lambda · m / (m + s)`: steady success drives β
/// up, silence or erratic payouts let it fall back. With adaptation off β
/// never changes.
#[derive(Debug, Clone)]
pub struct ExplorationTemperature {
    cfg: TemperatureConfig,
    beta: f64,
    delta: f64,
    mean: f64,
    var: f64,
    adaptive: bool,
}

impl ExplorationTemperature {
    pub fn new(cfg: TemperatureConfig) -> Self {
        Self {
            cfg,
            beta: cfg.initial,
            delta: 0.0,
            mean: 0.0,
            var: 0.0,
            adaptive: false,
        }
    }

    pub fn beta(&self) -> f64 {
        self.beta
    }

    /// Last change applied to β.
    pub fn delta(&self) -> f64 {
        self.delta
    }

    pub fn mean_reward(&self) -> f64 {
        self.mean
    }

    pub fn is_adaptive(&self) -> bool {
        self.adaptive
    }

    pub fn set_adaptive(&mut self, adaptive: bool) {
        self.adaptive = adaptive;
    }

    /// `m / (m + s)`, in [0, 1).
    pub fn reliability(&self) -> f64 {
        let sd = self.var.max(0.0).sqrt();
        let denom = self.mean + sd;
        if denom > 1e-12 {
            self.mean / (denom + 1e-12)
        } else {
            0.0
        }
    }

    pub fn update(&mut self, reward: f64) {
        let a = 1.0 - self.cfg.discount;
        let err = reward - self.mean;
        self.mean += a * err;
        self.var += a * (err * err - self.var);
        if self.adaptive {
            let target = self.cfg.initial + self.cfg.lambda * self.reliability();
            self.delta = self.cfg.mu * (target - self.beta);
            self.beta += self.delta;
        } else {
            self.delta = 0.0;
        }
    }

    pub fn reset(&mut self) {
        self.beta = self.cfg.initial;
        self.delta = 0.0;
        self.mean = 0.0;
        self.var = 0.0;
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct GoalConfig {
    pub num_colors: usize,
    /// Vector learning rate, scaled by reward.
    pub learning_rate: f64,
    /// Value (TD) learning rate.
    pub value_rate: f64,
    /// TD discount of the next value.
    pub discount: f64,
    /// Per-tick discount of the accumulated reward trace.
    pub trace_discount: f64,
    pub expl_init: f64,
    /// Step size of exploration-rate changes.
    pub expl_rate: f64,
    /// Momentum of the exploration-rate change.
    pub expl_momentum: f64,
    /// Std-dev of noise added to weight updates.
    pub synaptic_noise: f64,
    pub target: GoalTarget,
    pub correction: GoalCorrection,
    pub temperature: TemperatureConfig,
}

impl Default for GoalConfig {
    fn default() -> Self {
        Self {
            num_colors: 1,
            learning_rate: 0.5,
            value_rate: 0.01,
            discount: 0.9,
            trace_discount: 0.9995,
            expl_init: 1.0,
            expl_rate: 0.01,
            expl_momentum: 0.9,
            synaptic_noise: 0.0,
            target: GoalTarget::PathIntegration,
            correction: GoalCorrection::SubtractHome,
            temperature: TemperatureConfig::default(),
        }
    }
}

impl GoalConfig {
    pub fn validate(&self) -> Result<()> {
        if self.num_colors == 0 {
            return Err(NaviError::InvalidConfig(
                "num_colors must be positive".to_string(),
            ));
        }
        let unit = [
            ("value_rate", self.value_rate),
            ("discount", self.discount),
            ("trace_discount", self.trace_discount),
            ("expl_init", self.expl_init),
            ("expl_rate", self.expl_rate),
            ("expl_momentum", self.expl_momentum),
            ("temperature.discount", self.temperature.discount),
        ];
        for (name, v) in unit {
            if !(0.0..=1.0).contains(&v) {
                return Err(NaviError::InvalidConfig(format!(
                    "{name} must be in [0, 1], got {v}"
                )));
            }
        }
        let non_negative = [
            ("learning_rate", self.learning_rate),
            ("synaptic_noise", self.synaptic_noise),
            ("temperature.initial", self.temperature.initial),
            ("temperature.lambda", self.temperature.lambda),
            ("temperature.mu", self.temperature.mu),
        ];
        for (name, v) in non_negative {
            if !(v >= 0.0 && v.is_finite()) {
                return Err(NaviError::InvalidConfig(format!(
                    "{name} must be finite and >= 0, got {v}"
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct GoalLearning {
    cfg: GoalConfig,
    rings: Vec<CircularArray>,
    value: Vec<f64>,
    trace: Vec<f64>,
    td_error: Vec<f64>,
    expl: Vec<f64>,
    d_expl: Vec<f64>,
    expl_const: Vec<bool>,
    d_expl_const: Vec<bool>,
    temperature: ExplorationTemperature,
    choice: usize,
    prob: Vec<f64>,
    learning: bool,
    learned_last: bool,
    target_buf: Vec<f64>,
    next_buf: Vec<f64>,
}

impl GoalLearning {
    pub fn new(cfg: GoalConfig, num_neurons: usize) -> Result<Self> {
        cfg.validate()?;
        check_directional("goal vector ring", num_neurons)?;
        let c = cfg.num_colors;
        let rings = (0..c)
            .map(|_| CircularArray::new(num_neurons))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            cfg,
            rings,
            value: vec![0.0; c],
            trace: vec![0.0; c],
            td_error: vec![0.0; c],
            expl: vec![cfg.expl_init; c],
            d_expl: vec![0.0; c],
            expl_const: vec![false; c],
            d_expl_const: vec![false; c],
            temperature: ExplorationTemperature::new(cfg.temperature),
            choice: 0,
            prob: vec![1.0 / c as f64; c],
            learning: true,
            learned_last: false,
            target_buf: vec![0.0; num_neurons],
            next_buf: vec![0.0; num_neurons],
        })
    }

    pub fn config(&self) -> &GoalConfig {
        &self.cfg
    }

    pub fn num_colors(&self) -> usize {
        self.cfg.num_colors
    }

    pub fn temperature(&self) -> &ExplorationTemperature {
        &self.temperature
    }

    pub fn set_beta_adaptive(&mut self, adaptive: bool) {
        self.temperature.set_adaptive(adaptive);
    }

    /// With learning off, rewards still drive values and exploration but
    /// stored vectors stay put.
    pub fn set_learning(&mut self, learning: bool) {
        self.learning = learning;
    }

    pub fn is_learning(&self) -> bool {
        self.learning
    }

    /// One tick of learning for the goal colour currently relevant.
    ///
    /// `home` is the path-integration estimate; `position` is the true
    /// displacement, used only with [`GoalTarget::TrueDisplacement`].
    pub fn update(
        &mut self,
        reward: f64,
        color: usize,
        home: Vec2,
        position: Option<Vec2>,
        rng: &mut Prng,
    ) -> Result<()> {
        check_index("goal colour", color, self.cfg.num_colors)?;
        if !(reward >= 0.0 && reward.is_finite()) {
            return Err(NaviError::InvalidInput(format!(
                "reward must be finite and >= 0, got {reward}"
            )));
        }

        self.learned_last = false;
        if self.learning && reward > 0.0 {
            let target = match self.cfg.target {
                GoalTarget::PathIntegration => home,
                GoalTarget::TrueDisplacement => position.unwrap_or(home),
            };
            self.learn_vector(color, target, reward, rng)?;
        }

        let v = self.value[color];
        let delta = reward + self.cfg.discount * v - v;
        self.td_error[color] = delta;
        self.value[color] = v + self.cfg.value_rate * delta;

        for (c, tr) in self.trace.iter_mut().enumerate() {
            *tr *= self.cfg.trace_discount;
            if c == color {
                *tr += reward;
            }
        }

        self.temperature.update(reward);
        self.update_exploration();

        if !self.value[color].is_finite() {
            return Err(NaviError::NonFinite("goal value"));
        }
        Ok(())
    }

    fn learn_vector(&mut self, color: usize, target: Vec2, reward: f64, rng: &mut Prng) -> Result<()> {
        let ring = &mut self.rings[color];
        ring.encode(target, &mut self.target_buf)?;
        // Error-correction step, capped so large rewards cannot overshoot.
        let k = (self.cfg.learning_rate * reward).min(1.0);
        for ((next, &w), &e) in self
            .next_buf
            .iter_mut()
            .zip(ring.rate())
            .zip(&self.target_buf)
        {
            *next = w + k * (e - w) + rng.noise(self.cfg.synaptic_noise);
        }
        ring.set_rate(&self.next_buf)?;
        ring.decode()?;
        self.learned_last = true;
        Ok(())
    }

    fn update_exploration(&mut self) {
        let beta = self.temperature.beta();
        let m = self.cfg.expl_momentum;
        for c in 0..self.cfg.num_colors {
            if self.expl_const[c] {
                continue;
            }
            if !self.d_expl_const[c] {
                let target = (-beta * self.value[c]).exp().min(1.0);
                self.d_expl[c] = m * self.d_expl[c] + (1.0 - m) * (target - self.expl[c]);
            }
            self.expl[c] = (self.expl[c] + self.cfg.expl_rate * self.d_expl[c]).clamp(0.0, 1.0);
        }
    }

    /// Draw the goal colour to pursue: softmax of `β·(1 - ε)·V`.
    ///
    /// A single uniform draw walks the cumulative distribution, so colours
    /// with equal probability are separated by the draw, not their index.
    pub fn choose(&mut self, rng: &mut Prng) -> usize {
        let beta = self.temperature.beta();
        let logits: Vec<f64> = (0..self.cfg.num_colors)
            .map(|c| beta * (1.0 - self.expl[c]) * self.value[c])
            .collect();
        let top = logits.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let mut sum = 0.0;
        for (p, l) in self.prob.iter_mut().zip(&logits) {
            *p = (l - top).exp();
            sum += *p;
        }
        for p in &mut self.prob {
            *p /= sum;
        }

        let u = rng.next_f64_01();
        let mut acc = 0.0;
        self.choice = self.cfg.num_colors - 1;
        for (c, p) in self.prob.iter().enumerate() {
            acc += p;
            if u < acc {
                self.choice = c;
                break;
            }
        }
        self.choice
    }

    pub fn choice(&self) -> usize {
        self.choice
    }

    pub fn probabilities(&self) -> &[f64] {
        &self.prob
    }

    /// True when the last update changed a stored vector.
    pub fn learned_last(&self) -> bool {
        self.learned_last
    }

    pub fn ring(&self, color: usize) -> Result<&CircularArray> {
        check_index("goal colour", color, self.cfg.num_colors)?;
        Ok(&self.rings[color])
    }

    /// Learned goal vector of `color` (average decode).
    pub fn gv(&self, color: usize) -> Result<Vec2> {
        self.ring(color)?.vector()
    }

    /// Learned goal vector of `color` pointing at the ring's peak unit.
    pub fn gv_max(&self, color: usize) -> Result<Vec2> {
        let d = self.ring(color)?.decode()?;
        Ok(d.max.map_or(Vec2::ZERO, |a| Vec2::from_polar(d.len, a)))
    }

    /// Goal vector after the configured correction.
    pub fn gv_corrected(&self, color: usize, home: Vec2) -> Result<Vec2> {
        let gv = self.gv(color)?;
        Ok(match self.cfg.correction {
            GoalCorrection::None => gv,
            GoalCorrection::SubtractHome => gv - home,
        })
    }

    /// Bearing of the sum of all colours' goal vectors.
    pub fn gv_vecavg(&self) -> Result<Option<f64>> {
        let mut sum = Vec2::ZERO;
        for ring in &self.rings {
            sum += ring.vector()?;
        }
        Ok(sum.bearing())
    }

    pub fn expl(&self, color: usize) -> Result<f64> {
        check_index("goal colour", color, self.cfg.num_colors)?;
        Ok(self.expl[color])
    }

    pub fn delta_expl(&self, color: usize) -> Result<f64> {
        check_index("goal colour", color, self.cfg.num_colors)?;
        Ok(self.d_expl[color])
    }

    pub fn e_beta(&self) -> f64 {
        self.temperature.beta()
    }

    pub fn value(&self, color: usize) -> Result<f64> {
        check_index("goal colour", color, self.cfg.num_colors)?;
        Ok(self.value[color])
    }

    pub fn reward_trace(&self, color: usize) -> Result<f64> {
        check_index("goal colour", color, self.cfg.num_colors)?;
        Ok(self.trace[color])
    }

    pub fn td_error(&self, color: usize) -> Result<f64> {
        check_index("goal colour", color, self.cfg.num_colors)?;
        Ok(self.td_error[color])
    }

    /// Set the exploration rate; `hold` freezes it at that value.
    pub fn set_expl(&mut self, color: usize, value: f64, hold: bool) -> Result<()> {
        check_index("goal colour", color, self.cfg.num_colors)?;
        if !(0.0..=1.0).contains(&value) {
            return Err(NaviError::InvalidConfig(format!(
                "exploration rate must be in [0, 1], got {value}"
            )));
        }
        self.expl[color] = value;
        self.expl_const[color] = hold;
        Ok(())
    }

    /// Set the exploration momentum; `hold` keeps it from adapting.
    pub fn set_delta_expl(&mut self, color: usize, value: f64, hold: bool) -> Result<()> {
        check_index("goal colour", color, self.cfg.num_colors)?;
        if !value.is_finite() {
            return Err(NaviError::InvalidConfig(format!(
                "exploration momentum must be finite, got {value}"
            )));
        }
        self.d_expl[color] = value;
        self.d_expl_const[color] = hold;
        Ok(())
    }

    /// Seed a goal vector directly.
    pub fn set_gv(&mut self, color: usize, v: Vec2) -> Result<()> {
        check_index("goal colour", color, self.cfg.num_colors)?;
        let ring = &mut self.rings[color];
        ring.encode(v, &mut self.target_buf)?;
        ring.set_rate(&self.target_buf)
    }

    pub fn set_value(&mut self, color: usize, value: f64) -> Result<()> {
        check_index("goal colour", color, self.cfg.num_colors)?;
        if !value.is_finite() {
            return Err(NaviError::InvalidConfig(format!(
                "value must be finite, got {value}"
            )));
        }
        self.value[color] = value;
        Ok(())
    }

    /// Forget all learned vectors, values and exploration state.
    pub fn reset(&mut self) {
        let c = self.cfg.num_colors;
        self.rings.iter_mut().for_each(CircularArray::reset);
        self.value = vec![0.0; c];
        self.trace = vec![0.0; c];
        self.td_error = vec![0.0; c];
        self.expl = vec![self.cfg.expl_init; c];
        self.d_expl = vec![0.0; c];
        self.expl_const = vec![false; c];
        self.d_expl_const = vec![false; c];
        self.temperature.reset();
        self.choice = 0;
        self.prob = vec![1.0 / c as f64; c];
        self.learned_last = false;
    }
}
