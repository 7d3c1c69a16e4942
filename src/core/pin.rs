//! Path integration network.
//!
//! Four rings of equal width are chained every tick:
//!
//! 1. **Heading**: inverted cosine tuning to the compass angle
//!    (`0.5 - 0.5 cos(φ - θi)`), so units facing the heading are quiet.
//! 2. **Gater**: `rect(speed - heading)`, a speed-scaled bump facing the heading.
//! 3. **Memory**: leaky integrator, `rect(gater + (1 - leak) · memory)`.
//! 4. **Decode**: `rect(W_cos · memory)`, the home-vector population code.
//!
//! The decode ring is read out twice, by population-vector average and by
//! peak unit, and scaled by a gain calibrated so that one tick at unit speed
//! along a preferred direction decodes to length 1.
//!
//! Heading activity peaks at 1, so the gater only encodes speeds up to
//! [`MAX_SPEED`]. Above that every gater unit gets the same extra drive,
//! which the cosine decode cancels: a tick never integrates more than a
//! unit step.

use core::f64::consts::TAU;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::circular_array::{lin_rect, CircularArray, Kernel};
use crate::error::{NaviError, Result};
use crate::geom::Vec2;
use crate::prng::Prng;

/// Largest per-tick speed the gater represents faithfully.
pub const MAX_SPEED: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct PinConfig {
    /// Ring width, at least 1. Below
    /// [`MIN_DIRECTIONAL_UNITS`](crate::circular_array::MIN_DIRECTIONAL_UNITS)
    /// the home vector only tracks distance along the ring's axis.
    pub num_neurons: usize,
    /// Fraction of memory activity lost per tick, in [0, 1].
    pub leak: f64,
    /// Std-dev of compass noise (in turns) and odometry noise.
    pub sensory_noise: f64,
    /// Std-dev of per-unit noise added to every layer's drive.
    pub neural_noise: f64,
}

impl Default for PinConfig {
    fn default() -> Self {
        Self {
            num_neurons: 18,
            leak: 0.0,
            sensory_noise: 0.0,
            neural_noise: 0.0,
        }
    }
}

impl PinConfig {
    pub fn validate(&self) -> Result<()> {
        if self.num_neurons == 0 {
            return Err(NaviError::InvalidConfig(
                "num_neurons must be positive".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.leak) {
            return Err(NaviError::InvalidConfig(format!(
                "leak must be in [0, 1], got {}",
                self.leak
            )));
        }
        if !(self.sensory_noise >= 0.0 && self.sensory_noise.is_finite()) {
            return Err(NaviError::InvalidConfig(format!(
                "sensory_noise must be finite and >= 0, got {}",
                self.sensory_noise
            )));
        }
        if !(self.neural_noise >= 0.0 && self.neural_noise.is_finite()) {
            return Err(NaviError::InvalidConfig(format!(
                "neural_noise must be finite and >= 0, got {}",
                self.neural_noise
            )));
        }
        Ok(())
    }
}

/// Layer selector for [`PathIntegrator::array`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layer {
    Heading,
    Gater,
    Memory,
    Decode,
}

#[derive(Debug, Clone)]
pub struct PathIntegrator {
    cfg: PinConfig,
    heading: CircularArray,
    gater: CircularArray,
    memory: CircularArray,
    decode: CircularArray,
    gain: f64,
    home: Vec2,
    home_max: Vec2,
    drive: Vec<f64>,
    noise: Vec<f64>,
}

impl PathIntegrator {
    pub fn new(cfg: PinConfig) -> Result<Self> {
        cfg.validate()?;
        let n = cfg.num_neurons;
        let heading = CircularArray::new(n)?;
        let gater = CircularArray::new(n)?;
        let memory = CircularArray::new(n)?.with_carry(1.0 - cfg.leak);
        let decode = CircularArray::new(n)?.with_kernel(Kernel::cosine(n))?;
        let gain = 1.0 / unit_step_length(&decode)?;
        Ok(Self {
            cfg,
            heading,
            gater,
            memory,
            decode,
            gain,
            home: Vec2::ZERO,
            home_max: Vec2::ZERO,
            drive: vec![0.0; n],
            noise: vec![0.0; n],
        })
    }

    pub fn config(&self) -> &PinConfig {
        &self.cfg
    }

    pub fn array(&self, layer: Layer) -> &CircularArray {
        match layer {
            Layer::Heading => &self.heading,
            Layer::Gater => &self.gater,
            Layer::Memory => &self.memory,
            Layer::Decode => &self.decode,
        }
    }

    /// Rates of the decode layer.
    pub fn output(&self) -> &[f64] {
        self.decode.rate()
    }

    /// Home vector from the population-vector average.
    pub fn hv(&self) -> Vec2 {
        self.home
    }

    /// Home vector pointing at the most active decode unit.
    pub fn hv_max(&self) -> Vec2 {
        self.home_max
    }

    /// Integrate one tick of compass heading (rad) and odometric speed.
    pub fn update(&mut self, angle: f64, speed: f64, rng: &mut Prng) -> Result<()> {
        let angle = angle + TAU * rng.noise(self.cfg.sensory_noise);
        let speed = speed + rng.noise(self.cfg.sensory_noise);
        let nn = self.cfg.neural_noise;

        for (d, &t) in self.drive.iter_mut().zip(self.heading.preferred()) {
            *d = 0.5 - 0.5 * (angle - t).cos();
        }
        fill_noise(&mut self.noise, rng, nn);
        self.heading
            .update_rate_with_noise(&self.drive, &self.noise)?;

        for (d, &h) in self.drive.iter_mut().zip(self.heading.rate()) {
            *d = speed - h;
        }
        fill_noise(&mut self.noise, rng, nn);
        self.gater.update_rate_with_noise(&self.drive, &self.noise)?;

        fill_noise(&mut self.noise, rng, nn);
        self.memory
            .update_rate_with_noise(self.gater.rate(), &self.noise)?;

        fill_noise(&mut self.noise, rng, nn);
        self.decode
            .update_rate_with_noise(self.memory.rate(), &self.noise)?;

        let d = self.decode.decode()?;
        let len = self.gain * d.len;
        self.home = d.avg.bearing().map_or(Vec2::ZERO, |a| Vec2::from_polar(len, a));
        self.home_max = d.max.map_or(Vec2::ZERO, |a| Vec2::from_polar(len, a));
        if !(self.home.is_finite() && self.home_max.is_finite()) {
            return Err(NaviError::NonFinite("home vector"));
        }
        Ok(())
    }

    /// Clear all four layers and the decoded vectors.
    pub fn reset(&mut self) {
        self.heading.reset();
        self.gater.reset();
        self.memory.reset();
        self.decode.reset();
        self.home = Vec2::ZERO;
        self.home_max = Vec2::ZERO;
    }
}

fn fill_noise(buf: &mut [f64], rng: &mut Prng, stdev: f64) {
    for x in buf.iter_mut() {
        *x = rng.noise(stdev);
    }
}

/// Decoded length after one noiseless tick at unit speed towards unit 0.
fn unit_step_length(decode: &CircularArray) -> Result<f64> {
    let n = decode.size();
    let mut step_ring = decode.clone();
    step_ring.reset();
    let gated: Vec<f64> = decode
        .preferred()
        .iter()
        .map(|t| lin_rect(1.0 - (0.5 - 0.5 * t.cos())))
        .collect();
    step_ring.update_rate(&gated)?;
    let len = step_ring.len();
    if !(len > 0.0 && len.is_finite()) {
        return Err(NaviError::InvalidConfig(format!(
            "cannot calibrate path integrator with {n} neurons"
        )));
    }
    Ok(len)
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::f64::consts::{FRAC_PI_2, FRAC_PI_4, PI};

    fn pin(n: usize, leak: f64) -> PathIntegrator {
        PathIntegrator::new(PinConfig {
            num_neurons: n,
            leak,
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn rejects_bad_config() {
        let bad = [
            PinConfig {
                num_neurons: 0,
                ..Default::default()
            },
            PinConfig {
                leak: 1.5,
                ..Default::default()
            },
            PinConfig {
                sensory_noise: -0.1,
                ..Default::default()
            },
            PinConfig {
                neural_noise: f64::NAN,
                ..Default::default()
            },
        ];
        for cfg in bad {
            assert!(PathIntegrator::new(cfg).is_err(), "{cfg:?} accepted");
        }
    }

    #[test]
    fn stationary_agent_does_not_drift() {
        let mut rng = Prng::new(1);
        for n in [1, 2, 3, 8, 36] {
            let mut p = pin(n, 0.0);
            for t in 0..500 {
                p.update(0.3 * t as f64, 0.0, &mut rng).unwrap();
                assert_eq!(p.hv().len(), 0.0, "n={n} drifted at t={t}");
            }
        }
    }

    #[test]
    fn straight_walk_on_grid_decodes_exact_distance() {
        let mut rng = Prng::new(1);
        let mut p = pin(36, 0.0);
        for _ in 0..100 {
            p.update(0.0, 1.0, &mut rng).unwrap();
        }
        assert!((p.hv().len() - 100.0).abs() < 1e-6, "len {}", p.hv().len());
        assert!(p.hv().bearing().unwrap().abs() < 1e-9);
        assert!(p.hv_max().bearing().unwrap().abs() < 1e-9);
    }

    #[test]
    fn speed_above_max_saturates_at_unit_steps() {
        let mut rng = Prng::new(1);
        let mut p = pin(36, 0.0);
        for _ in 0..10 {
            p.update(0.0, 2.0 * MAX_SPEED, &mut rng).unwrap();
        }
        assert!((p.hv().len() - 10.0).abs() < 1e-6, "len {}", p.hv().len());
    }

    #[test]
    fn single_unit_ring_still_integrates_distance() {
        let mut rng = Prng::new(1);
        let mut p = pin(1, 0.0);
        for _ in 0..10 {
            p.update(0.0, 1.0, &mut rng).unwrap();
        }
        assert!((p.hv().len() - 10.0).abs() < 1e-9);
    }

    #[test]
    fn two_legs_sum_as_vectors() {
        let mut rng = Prng::new(1);
        let mut p = pin(36, 0.0);
        for _ in 0..30 {
            p.update(0.0, 1.0, &mut rng).unwrap();
        }
        for _ in 0..40 {
            p.update(FRAC_PI_2, 1.0, &mut rng).unwrap();
        }
        let hv = p.hv();
        assert!((hv.len() - 50.0).abs() < 0.5, "len {}", hv.len());
        let expected = 40f64.atan2(30.0);
        assert!((hv.angle() - expected).abs() < 0.01, "angle {}", hv.angle());
    }

    #[test]
    fn leak_monotonically_increases_integration_error() {
        let mut rng = Prng::new(1);
        let mut last_len_err = -1.0;
        let mut last_ang_err = -1.0;
        for leak in [0.0, 0.002, 0.01, 0.05] {
            let mut p = pin(36, leak);
            for _ in 0..100 {
                p.update(0.0, 1.0, &mut rng).unwrap();
            }
            for _ in 0..100 {
                p.update(FRAC_PI_2, 1.0, &mut rng).unwrap();
            }
            let hv = p.hv();
            let len_err = (hv.len() - 100.0 * 2f64.sqrt()).abs();
            let ang_err = (hv.angle() - FRAC_PI_4).abs();
            assert!(len_err > last_len_err, "leak {leak}: {len_err} <= {last_len_err}");
            assert!(ang_err > last_ang_err, "leak {leak}: {ang_err} <= {last_ang_err}");
            last_len_err = len_err;
            last_ang_err = ang_err;
        }
    }

    #[test]
    fn alternating_headings_cancel() {
        let mut rng = Prng::new(1);
        let mut p = pin(36, 0.0);
        for t in 0..100 {
            let angle = if t % 2 == 0 { 0.0 } else { PI };
            p.update(angle, 1.0, &mut rng).unwrap();
        }
        assert!(p.hv().len() < 1e-6, "len {}", p.hv().len());
    }

    #[test]
    fn reset_matches_fresh_network() {
        let cfg = PinConfig {
            num_neurons: 24,
            leak: 0.01,
            sensory_noise: 0.01,
            neural_noise: 0.02,
        };
        let mut used = PathIntegrator::new(cfg).unwrap();
        let mut rng = Prng::new(9);
        for t in 0..50 {
            used.update(t as f64 * 0.1, 1.0, &mut rng).unwrap();
        }
        used.reset();
        assert_eq!(used.hv(), Vec2::ZERO);
        assert!(used.output().iter().all(|&r| r == 0.0));

        let mut fresh = PathIntegrator::new(cfg).unwrap();
        let mut rng_a = Prng::new(77);
        let mut rng_b = Prng::new(77);
        used.update(1.0, 0.8, &mut rng_a).unwrap();
        fresh.update(1.0, 0.8, &mut rng_b).unwrap();
        assert_eq!(used.hv(), fresh.hv());
        assert_eq!(used.hv_max(), fresh.hv_max());
        assert_eq!(used.output(), fresh.output());
    }

    #[test]
    fn noise_keeps_rates_non_negative() {
        let mut rng = Prng::new(5);
        let mut p = PathIntegrator::new(PinConfig {
            num_neurons: 16,
            leak: 0.0,
            sensory_noise: 0.05,
            neural_noise: 0.5,
        })
        .unwrap();
        for t in 0..200 {
            p.update(t as f64 * 0.05, 1.0, &mut rng).unwrap();
            for layer in [Layer::Heading, Layer::Gater, Layer::Memory, Layer::Decode] {
                assert!(p.array(layer).rate().iter().all(|&r| r >= 0.0));
            }
        }
    }

    #[test]
    fn non_finite_input_is_fatal() {
        let mut rng = Prng::new(5);
        let mut p = pin(8, 0.0);
        assert_eq!(
            p.update(0.0, f64::NAN, &mut rng),
            Err(NaviError::NonFinite("circular array rates"))
        );
    }
}
