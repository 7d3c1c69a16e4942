//! Landmark-anchored local vectors.
//!
//! Each landmark owns a weight ring. While a landmark is visible its
//! reference point is pinned to the current home vector; an eligibility
//! trace keeps the landmark relevant for a while after it drops out of view.
//! When reward arrives, every eligible landmark learns the displacement from
//! its reference point to the rewarded place. Steering combines the stored
//! vectors, each shifted by how far the agent has moved since the reference
//! was taken, weighted by eligibility and learned value.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::circular_array::{check_directional, CircularArray};
use crate::error::{check_index, NaviError, Result};
use crate::geom::Vec2;

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct RouteConfig {
    pub num_landmarks: usize,
    /// Vector learning rate, scaled by reward and eligibility.
    pub learning_rate: f64,
    pub value_rate: f64,
    pub discount: f64,
    /// Per-tick retention of the eligibility trace.
    pub eligibility_decay: f64,
    /// Units below this eligibility neither learn nor steer.
    pub min_eligibility: f64,
    /// |signal| above this counts as "landmark in view".
    pub visibility_threshold: f64,
    /// Smoothing factor of the reported value.
    pub value_smoothing: f64,
}

impl Default for RouteConfig {
    fn default() -> Self {
        Self {
            num_landmarks: 0,
            learning_rate: 0.5,
            value_rate: 0.05,
            discount: 0.9,
            eligibility_decay: 0.99,
            min_eligibility: 0.001,
            visibility_threshold: 0.000001,
            value_smoothing: 0.01,
        }
    }
}

impl RouteConfig {
    pub fn validate(&self) -> Result<()> {
        let unit = [
            ("value_rate", self.value_rate),
            ("discount", self.discount),
            ("eligibility_decay", self.eligibility_decay),
            ("min_eligibility", self.min_eligibility),
            ("value_smoothing", self.value_smoothing),
        ];
        for (name, v) in unit {
            if !(0.0..=1.0).contains(&v) {
                return Err(NaviError::InvalidConfig(format!(
                    "{name} must be in [0, 1], got {v}"
                )));
            }
        }
        if !(self.learning_rate >= 0.0 && self.learning_rate.is_finite()) {
            return Err(NaviError::InvalidConfig(format!(
                "learning_rate must be finite and >= 0, got {}",
                self.learning_rate
            )));
        }
        if !(self.visibility_threshold >= 0.0 && self.visibility_threshold.is_finite()) {
            return Err(NaviError::InvalidConfig(format!(
                "visibility_threshold must be finite and >= 0, got {}",
                self.visibility_threshold
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct RouteLearning {
    cfg: RouteConfig,
    rings: Vec<CircularArray>,
    value_raw: Vec<f64>,
    value: Vec<f64>,
    eligibility: Vec<f64>,
    state: Vec<f64>,
    dstate: Vec<f64>,
    visible: Vec<bool>,
    reference: Vec<Vec2>,
    fixed: Vec<bool>,
    target_buf: Vec<f64>,
    next_buf: Vec<f64>,
}

impl RouteLearning {
    pub fn new(cfg: RouteConfig, num_neurons: usize) -> Result<Self> {
        cfg.validate()?;
        check_directional("local vector ring", num_neurons)?;
        let k = cfg.num_landmarks;
        let rings = (0..k)
            .map(|_| CircularArray::new(num_neurons))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            cfg,
            rings,
            value_raw: vec![0.0; k],
            value: vec![0.0; k],
            eligibility: vec![0.0; k],
            state: vec![0.0; k],
            dstate: vec![0.0; k],
            visible: vec![false; k],
            reference: vec![Vec2::ZERO; k],
            fixed: vec![false; k],
            target_buf: vec![0.0; num_neurons],
            next_buf: vec![0.0; num_neurons],
        })
    }

    pub fn config(&self) -> &RouteConfig {
        &self.cfg
    }

    pub fn num_landmarks(&self) -> usize {
        self.cfg.num_landmarks
    }

    pub fn update(&mut self, signals: &[f64], reward: f64, home: Vec2) -> Result<()> {
        let k = self.cfg.num_landmarks;
        if signals.len() != k {
            return Err(NaviError::DimensionMismatch {
                expected: k,
                actual: signals.len(),
            });
        }
        if let Some(s) = signals.iter().find(|s| !s.is_finite()) {
            return Err(NaviError::InvalidInput(format!(
                "landmark signal must be finite, got {s}"
            )));
        }

        let decay = self.cfg.eligibility_decay;
        for (i, &s) in signals.iter().enumerate() {
            self.dstate[i] = s - self.state[i];
            self.state[i] = s;
            self.visible[i] = s.abs() > self.cfg.visibility_threshold;
            if self.visible[i] {
                self.reference[i] = home;
            }
            let v = if self.visible[i] { 1.0 } else { 0.0 };
            self.eligibility[i] = decay * self.eligibility[i] + (1.0 - decay) * v;
        }

        for i in 0..k {
            let e = self.eligibility[i];
            if e <= self.cfg.min_eligibility {
                continue;
            }
            if reward > 0.0 && !self.fixed[i] {
                self.learn_vector(i, home - self.reference[i], reward * e)?;
            }
            let v = self.value_raw[i];
            self.value_raw[i] = v + self.cfg.value_rate * e * (reward + self.cfg.discount * v - v);
        }

        let s = self.cfg.value_smoothing;
        for (smooth, &raw) in self.value.iter_mut().zip(&self.value_raw) {
            *smooth += s * (raw - *smooth);
        }
        Ok(())
    }

    fn learn_vector(&mut self, i: usize, target: Vec2, strength: f64) -> Result<()> {
        let ring = &mut self.rings[i];
        ring.encode(target, &mut self.target_buf)?;
        let k = (self.cfg.learning_rate * strength).min(1.0);
        for ((next, &w), &e) in self
            .next_buf
            .iter_mut()
            .zip(ring.rate())
            .zip(&self.target_buf)
        {
            *next = w + k * (e - w);
        }
        ring.set_rate(&self.next_buf)?;
        ring.decode()?;
        Ok(())
    }

    /// Stored vector of landmark `i`: from its reference point to the goal.
    pub fn lv(&self, i: usize) -> Result<Vec2> {
        check_index("landmark", i, self.cfg.num_landmarks)?;
        self.rings[i].vector()
    }

    pub fn ring(&self, i: usize) -> Result<&CircularArray> {
        check_index("landmark", i, self.cfg.num_landmarks)?;
        Ok(&self.rings[i])
    }

    /// Bearing of the sum of all stored local vectors.
    pub fn lv_vecavg(&self) -> Result<Option<f64>> {
        let mut sum = Vec2::ZERO;
        for ring in &self.rings {
            sum += ring.vector()?;
        }
        Ok(sum.bearing())
    }

    /// Steering vector from all eligible landmarks.
    ///
    /// Each stored vector is corrected by the displacement since its
    /// reference was taken and weighted by `eligibility · value`. Returns
    /// zero when no landmark carries positive weight.
    pub fn lv_active(&self, home: Vec2) -> Result<Vec2> {
        let mut acc = Vec2::ZERO;
        let mut norm = 0.0;
        for i in 0..self.cfg.num_landmarks {
            let e = self.eligibility[i];
            if e <= self.cfg.min_eligibility {
                continue;
            }
            let w = e * self.value[i].max(0.0);
            if w <= 0.0 {
                continue;
            }
            let moved = home - self.reference[i];
            acc += (self.rings[i].vector()? - moved) * w;
            norm += w;
        }
        if norm > 0.0 {
            Ok(acc * (1.0 / norm))
        } else {
            Ok(Vec2::ZERO)
        }
    }

    /// How much the route should be trusted right now, in [0, 1].
    pub fn reliability(&self) -> f64 {
        self.eligibility
            .iter()
            .zip(&self.value)
            .filter(|(e, _)| **e > self.cfg.min_eligibility)
            .map(|(e, v)| e * v)
            .fold(0.0, f64::max)
            .clamp(0.0, 1.0)
    }

    pub fn lv_value(&self, i: usize) -> Result<f64> {
        check_index("landmark", i, self.cfg.num_landmarks)?;
        Ok(self.value[i])
    }

    pub fn lv_value_raw(&self, i: usize) -> Result<f64> {
        check_index("landmark", i, self.cfg.num_landmarks)?;
        Ok(self.value_raw[i])
    }

    pub fn el_lm(&self, i: usize) -> Result<f64> {
        check_index("landmark", i, self.cfg.num_landmarks)?;
        Ok(self.eligibility[i])
    }

    /// Eligibility-weighted value of landmark `i`.
    pub fn el_lv_value(&self, i: usize) -> Result<f64> {
        check_index("landmark", i, self.cfg.num_landmarks)?;
        Ok(self.eligibility[i] * self.value[i])
    }

    pub fn state_lm(&self, i: usize) -> Result<f64> {
        check_index("landmark", i, self.cfg.num_landmarks)?;
        Ok(self.state[i])
    }

    pub fn dstate_lm(&self, i: usize) -> Result<f64> {
        check_index("landmark", i, self.cfg.num_landmarks)?;
        Ok(self.dstate[i])
    }

    /// Clipped (visible / not visible) state of landmark `i`.
    pub fn cl_state_lm(&self, i: usize) -> Result<bool> {
        check_index("landmark", i, self.cfg.num_landmarks)?;
        Ok(self.visible[i])
    }

    /// Home vector recorded when landmark `i` was last seen.
    pub fn reference(&self, i: usize) -> Result<Vec2> {
        check_index("landmark", i, self.cfg.num_landmarks)?;
        Ok(self.reference[i])
    }

    pub fn is_fixed(&self, i: usize) -> Result<bool> {
        check_index("landmark", i, self.cfg.num_landmarks)?;
        Ok(self.fixed[i])
    }

    /// Seed the vector of landmark `i`; `fix` exempts it from learning.
    pub fn set_lv(&mut self, i: usize, v: Vec2, fix: bool) -> Result<()> {
        check_index("landmark", i, self.cfg.num_landmarks)?;
        if !v.is_finite() {
            return Err(NaviError::InvalidConfig(format!(
                "local vector must be finite, got {v:?}"
            )));
        }
        let ring = &mut self.rings[i];
        ring.encode(v, &mut self.target_buf)?;
        ring.set_rate(&self.target_buf)?;
        self.fixed[i] = fix;
        Ok(())
    }

    /// Seed both the raw and smoothed value of landmark `i`.
    pub fn set_lv_value(&mut self, i: usize, value: f64) -> Result<()> {
        check_index("landmark", i, self.cfg.num_landmarks)?;
        if !value.is_finite() {
            return Err(NaviError::InvalidConfig(format!(
                "landmark value must be finite, got {value}"
            )));
        }
        self.value_raw[i] = value;
        self.value[i] = value;
        Ok(())
    }

    /// Clear per-trial state: traces, sensor history and reference points.
    pub fn reset_trial(&mut self) {
        let k = self.cfg.num_landmarks;
        self.eligibility = vec![0.0; k];
        self.state = vec![0.0; k];
        self.dstate = vec![0.0; k];
        self.visible = vec![false; k];
        self.reference = vec![Vec2::ZERO; k];
    }

    /// Forget learned vectors and values as well.
    pub fn reset(&mut self) {
        let k = self.cfg.num_landmarks;
        self.reset_trial();
        self.rings.iter_mut().for_each(CircularArray::reset);
        self.value_raw = vec![0.0; k];
        self.value = vec![0.0; k];
        self.fixed = vec![false; k];
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn route(k: usize) -> RouteLearning {
        RouteLearning::new(
            RouteConfig {
                num_landmarks: k,
                ..Default::default()
            },
            36,
        )
        .unwrap()
    }

    #[test]
    fn eligibility_saturates_in_view_and_decays_out_of_view() {
        let mut rl = route(1);
        let mut last = 0.0;
        for _ in 0..500 {
            rl.update(&[0.5], 0.0, Vec2::ZERO).unwrap();
            let e = rl.el_lm(0).unwrap();
            assert!(e > last && e < 1.0);
            last = e;
        }
        assert!(last > 0.99);
        for _ in 0..100 {
            rl.update(&[0.0], 0.0, Vec2::ZERO).unwrap();
            let e = rl.el_lm(0).unwrap();
            assert!(e < last);
            last = e;
        }
        assert!(!rl.cl_state_lm(0).unwrap());
    }

    #[test]
    fn invisible_units_never_learn() {
        let mut rl = route(2);
        for t in 0..200 {
            let home = Vec2::new(t as f64, 0.0);
            rl.update(&[0.8, 0.0], 1.0, home).unwrap();
        }
        assert_eq!(rl.lv(1).unwrap(), Vec2::ZERO);
        assert_eq!(rl.lv_value_raw(1).unwrap(), 0.0);
        assert_eq!(rl.el_lm(1).unwrap(), 0.0);
    }

    #[test]
    fn reward_after_leaving_landmark_stores_displacement() {
        let mut rl = route(1);
        for _ in 0..300 {
            rl.update(&[1.0], 0.0, Vec2::new(2.0, 0.0)).unwrap();
        }
        assert_eq!(rl.reference(0).unwrap(), Vec2::new(2.0, 0.0));
        // Walk out of view, then get rewarded 8 units north of the landmark.
        let goal_home = Vec2::new(2.0, 8.0);
        for _ in 0..20 {
            rl.update(&[0.0], 0.0, Vec2::new(2.0, 4.0)).unwrap();
        }
        for _ in 0..50 {
            rl.update(&[0.0], 1.0, goal_home).unwrap();
        }
        assert_eq!(rl.reference(0).unwrap(), Vec2::new(2.0, 0.0));
        let lv = rl.lv(0).unwrap();
        assert!((lv - Vec2::new(0.0, 8.0)).len() < 1e-3, "lv {lv:?}");
        assert!(rl.lv_value_raw(0).unwrap() > 0.0);
    }

    #[test]
    fn fixed_vectors_survive_reward() {
        let mut rl = route(1);
        rl.set_lv(0, Vec2::new(5.0, 0.0), true).unwrap();
        for _ in 0..100 {
            rl.update(&[1.0], 1.0, Vec2::new(0.0, 3.0)).unwrap();
        }
        let lv = rl.lv(0).unwrap();
        assert!((lv - Vec2::new(5.0, 0.0)).len() < 1e-9);
        assert!(rl.is_fixed(0).unwrap());
    }

    #[test]
    fn active_vector_points_from_agent_to_goal() {
        let mut rl = route(1);
        rl.set_lv(0, Vec2::new(10.0, 0.0), true).unwrap();
        rl.set_lv_value(0, 1.0).unwrap();
        for _ in 0..50 {
            rl.update(&[1.0], 0.0, Vec2::new(0.0, 5.0)).unwrap();
        }
        // Three units past the landmark: seven to go.
        rl.update(&[0.0], 0.0, Vec2::new(3.0, 5.0)).unwrap();
        let v = rl.lv_active(Vec2::new(3.0, 5.0)).unwrap();
        assert!((v - Vec2::new(7.0, 0.0)).len() < 1e-6, "active {v:?}");
        assert!(rl.reliability() > 0.0);
    }

    #[test]
    fn no_eligible_landmark_gives_zero_vector() {
        let mut rl = route(2);
        rl.set_lv(0, Vec2::new(1.0, 1.0), false).unwrap();
        rl.set_lv_value(0, 1.0).unwrap();
        assert_eq!(rl.lv_active(Vec2::ZERO).unwrap(), Vec2::ZERO);
        assert_eq!(rl.reliability(), 0.0);
    }

    #[test]
    fn wrong_signal_count_is_rejected() {
        let mut rl = route(3);
        assert_eq!(
            rl.update(&[0.0, 1.0], 0.0, Vec2::ZERO),
            Err(NaviError::DimensionMismatch {
                expected: 3,
                actual: 2
            })
        );
        assert!(rl.update(&[0.0, f64::NAN, 0.0], 0.0, Vec2::ZERO).is_err());
        assert!(rl.set_lv(3, Vec2::ZERO, true).is_err());
        assert!(matches!(
            RouteLearning::new(RouteConfig::default(), 2),
            Err(NaviError::InvalidConfig(_))
        ));
    }

    #[test]
    fn reset_trial_keeps_learning_reset_drops_it() {
        let mut rl = route(1);
        rl.set_lv(0, Vec2::new(0.0, 2.0), false).unwrap();
        rl.set_lv_value(0, 0.5).unwrap();
        rl.update(&[1.0], 0.0, Vec2::new(1.0, 1.0)).unwrap();
        rl.reset_trial();
        assert_eq!(rl.el_lm(0).unwrap(), 0.0);
        assert_eq!(rl.reference(0).unwrap(), Vec2::ZERO);
        assert!(rl.lv(0).unwrap().len() > 1.9);
        rl.reset();
        assert_eq!(rl.lv(0).unwrap(), Vec2::ZERO);
        assert_eq!(rl.lv_value(0).unwrap(), 0.0);
    }
}
