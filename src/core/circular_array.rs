//! Ring of rate-coded units with evenly spaced preferred directions.
//!
//! Every layer of the engine is one of these: the four path-integration
//! stages and the weight rings that hold learned goal and route vectors.
//! A ring is parameterized by width, an optional synaptic kernel, a carry
//! coefficient (fraction of the previous state kept) and an activation rule;
//! the networks compose rings instead of specializing them.

use core::f64::consts::TAU;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{NaviError, Result};
use crate::geom::{wrap_angle, Vec2, EPS};

/// Type alias for a unit's firing rate (always >= 0 after an update).
pub type Rate = f64;

/// Narrowest ring whose bumps can point in every direction. With fewer units
/// `encode` only reaches directions along the ring's own axis.
pub const MIN_DIRECTIONAL_UNITS: usize = 3;

/// Linear rectification. NaN passes through so decoders can detect it.
#[inline]
pub fn lin_rect(x: f64) -> f64 {
    if x < 0.0 {
        0.0
    } else {
        x
    }
}

/// Dense N x N synaptic matrix, row-major.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Kernel {
    n: usize,
    weights: Vec<f64>,
}

impl Kernel {
    /// `w[i][j] = cos(θi - θj)` for evenly spaced preferred angles.
    pub fn cosine(n: usize) -> Self {
        let angles = preferred_angles(n);
        let mut weights = Vec::with_capacity(n * n);
        for &ti in &angles {
            for &tj in &angles {
                weights.push((ti - tj).cos());
            }
        }
        Self { n, weights }
    }

    pub fn size(&self) -> usize {
        self.n
    }

    /// Weight from unit `j` onto unit `i`, `None` outside the matrix.
    pub fn get(&self, i: usize, j: usize) -> Option<f64> {
        if i < self.n && j < self.n {
            Some(self.weights[i * self.n + j])
        } else {
            None
        }
    }

    fn apply(&self, x: &[f64], out: &mut [f64]) {
        for (i, o) in out.iter_mut().enumerate() {
            let row = &self.weights[i * self.n..(i + 1) * self.n];
            *o = row.iter().zip(x).map(|(w, v)| w * v).sum();
        }
    }
}

/// Reject widths too narrow to hold a vector in any direction.
pub fn check_directional(what: &str, n: usize) -> Result<()> {
    if n < MIN_DIRECTIONAL_UNITS {
        return Err(NaviError::InvalidConfig(format!(
            "{what} needs at least {MIN_DIRECTIONAL_UNITS} units, got {n}"
        )));
    }
    Ok(())
}

/// Preferred directions `2πi/N`, wrapped into (-π, π].
pub fn preferred_angles(n: usize) -> Vec<f64> {
    (0..n)
        .map(|i| wrap_angle(TAU * i as f64 / n as f64))
        .collect()
}

/// Everything a ring's rates say about direction and magnitude.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Decoded {
    /// Population-vector resultant, normalized by unit count.
    pub avg: Vec2,
    /// Preferred angle of the peak unit; `None` when the ring is silent.
    pub max: Option<f64>,
    /// Bump amplitude inferred from total rate mass.
    pub len: f64,
}

#[derive(Debug, Clone)]
pub struct CircularArray {
    n: usize,
    rate: Vec<Rate>,
    preferred: Vec<f64>,
    cos_pref: Vec<f64>,
    sin_pref: Vec<f64>,
    kernel: Option<Kernel>,
    carry: f64,
    activation: fn(f64) -> f64,
    // Mass of a unit-amplitude rectified cosine centred on unit 0.
    bump_mass: f64,
    scratch: Vec<f64>,
}

impl CircularArray {
    pub fn new(n: usize) -> Result<Self> {
        if n == 0 {
            return Err(NaviError::InvalidConfig(
                "circular array needs at least one unit".to_string(),
            ));
        }
        let preferred = preferred_angles(n);
        let cos_pref: Vec<f64> = preferred.iter().map(|t| t.cos()).collect();
        let sin_pref: Vec<f64> = preferred.iter().map(|t| t.sin()).collect();
        let bump_mass = cos_pref.iter().map(|&c| lin_rect(c)).sum();
        Ok(Self {
            n,
            rate: vec![0.0; n],
            preferred,
            cos_pref,
            sin_pref,
            kernel: None,
            carry: 0.0,
            activation: lin_rect,
            bump_mass,
            scratch: vec![0.0; n],
        })
    }

    /// Route the input through a synaptic kernel before activation.
    pub fn with_kernel(mut self, kernel: Kernel) -> Result<Self> {
        if kernel.size() != self.n {
            return Err(NaviError::DimensionMismatch {
                expected: self.n,
                actual: kernel.size(),
            });
        }
        self.kernel = Some(kernel);
        Ok(self)
    }

    /// Fraction of the previous rate added to the next drive (leaky memory).
    pub fn with_carry(mut self, carry: f64) -> Self {
        self.carry = carry;
        self
    }

    pub fn with_activation(mut self, activation: fn(f64) -> f64) -> Self {
        self.activation = activation;
        self
    }

    pub fn size(&self) -> usize {
        self.n
    }

    pub fn rate(&self) -> &[Rate] {
        &self.rate
    }

    pub fn preferred(&self) -> &[f64] {
        &self.preferred
    }

    /// The cosine kernel for this ring's width. Independent of state.
    pub fn cos_kernel(&self) -> Kernel {
        Kernel::cosine(self.n)
    }

    /// `rate = clip(act(kernel · input + carry · rate))`.
    pub fn update_rate(&mut self, input: &[f64]) -> Result<()> {
        self.drive(input, None)
    }

    /// As [`update_rate`](Self::update_rate), with per-unit noise added to the
    /// drive after the kernel and before activation.
    pub fn update_rate_with_noise(&mut self, input: &[f64], noise: &[f64]) -> Result<()> {
        self.check_len(noise.len())?;
        self.drive(input, Some(noise))
    }

    fn drive(&mut self, input: &[f64], noise: Option<&[f64]>) -> Result<()> {
        self.check_len(input.len())?;
        match &self.kernel {
            Some(k) => k.apply(input, &mut self.scratch),
            None => self.scratch.copy_from_slice(input),
        }
        for i in 0..self.n {
            let mut x = self.scratch[i] + self.carry * self.rate[i];
            if let Some(noise) = noise {
                x += noise[i];
            }
            self.rate[i] = lin_rect((self.activation)(x));
        }
        Ok(())
    }

    /// Overwrite the rates directly (rectified). Used for weight rings.
    pub fn set_rate(&mut self, rates: &[f64]) -> Result<()> {
        self.check_len(rates.len())?;
        for (r, &x) in self.rate.iter_mut().zip(rates) {
            *r = lin_rect(x);
        }
        Ok(())
    }

    /// Rectified-cosine bump whose `len()` equals `|v|` and whose peak faces `v`.
    pub fn encode(&self, v: Vec2, out: &mut [f64]) -> Result<()> {
        self.check_len(out.len())?;
        out.iter_mut().for_each(|x| *x = 0.0);
        let Some(phi) = v.bearing() else {
            return Ok(());
        };
        let (s, c) = phi.sin_cos();
        let mut mass = 0.0;
        for i in 0..self.n {
            // cos(θi - φ)
            let tuning = lin_rect(self.cos_pref[i] * c + self.sin_pref[i] * s);
            out[i] = tuning;
            mass += tuning;
        }
        if mass <= EPS {
            out.iter_mut().for_each(|x| *x = 0.0);
            return Ok(());
        }
        let gain = v.len() * self.bump_mass / mass;
        out.iter_mut().for_each(|x| *x *= gain);
        Ok(())
    }

    /// Population-vector average: Σ r·(cos θ, sin θ) / N.
    pub fn avg(&self) -> Vec2 {
        let mut acc = Vec2::ZERO;
        for i in 0..self.n {
            acc.x += self.rate[i] * self.cos_pref[i];
            acc.y += self.rate[i] * self.sin_pref[i];
        }
        acc * (1.0 / self.n as f64)
    }

    /// Preferred direction of the most active unit (lowest index on ties).
    pub fn max(&self) -> Option<f64> {
        let mut best: Option<(usize, f64)> = None;
        for (i, &r) in self.rate.iter().enumerate() {
            if r > 0.0 && best.map_or(true, |(_, b)| r > b) {
                best = Some((i, r));
            }
        }
        best.map(|(i, _)| self.preferred[i])
    }

    /// Amplitude of the activity bump, from total rate mass.
    pub fn len(&self) -> f64 {
        self.rate.iter().sum::<f64>() / self.bump_mass
    }

    /// All decodes at once, refusing to hand out NaN or infinity.
    pub fn decode(&self) -> Result<Decoded> {
        if self.rate.iter().any(|r| !r.is_finite()) {
            return Err(NaviError::NonFinite("circular array rates"));
        }
        Ok(Decoded {
            avg: self.avg(),
            max: self.max(),
            len: self.len(),
        })
    }

    /// Decoded vector with the ring's bump amplitude as length.
    pub fn vector(&self) -> Result<Vec2> {
        let d = self.decode()?;
        Ok(d.avg
            .bearing()
            .map_or(Vec2::ZERO, |a| Vec2::from_polar(d.len, a)))
    }

    pub fn reset(&mut self) {
        self.rate.iter_mut().for_each(|r| *r = 0.0);
    }

    fn check_len(&self, actual: usize) -> Result<()> {
        if actual == self.n {
            Ok(())
        } else {
            Err(NaviError::DimensionMismatch {
                expected: self.n,
                actual,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::f64::consts::{FRAC_PI_2, PI};

    fn bump(ring: &CircularArray, v: Vec2) -> Vec<f64> {
        let mut out = vec![0.0; ring.size()];
        ring.encode(v, &mut out).unwrap();
        out
    }

    #[test]
    fn zero_units_rejected() {
        assert!(matches!(
            CircularArray::new(0),
            Err(NaviError::InvalidConfig(_))
        ));
    }

    #[test]
    fn preferred_angles_are_evenly_spaced() {
        let ring = CircularArray::new(4).unwrap();
        let expected = [0.0, FRAC_PI_2, PI, -FRAC_PI_2];
        for (a, b) in ring.preferred().iter().zip(expected) {
            assert!((a - b).abs() < 1e-12, "{a} vs {b}");
        }
    }

    #[test]
    fn cos_kernel_is_symmetric_with_unit_diagonal() {
        let k = CircularArray::new(12).unwrap().cos_kernel();
        for i in 0..12 {
            assert!((k.get(i, i).unwrap() - 1.0).abs() < 1e-12);
            for j in 0..12 {
                assert!((k.get(i, j).unwrap() - k.get(j, i).unwrap()).abs() < 1e-12);
            }
        }
        assert_eq!(k, Kernel::cosine(12));
        assert_eq!(k.get(12, 0), None);
        assert_eq!(k.get(0, 12), None);
    }

    #[test]
    fn update_rectifies_negative_drive() {
        let mut ring = CircularArray::new(3).unwrap();
        ring.update_rate(&[1.0, -2.0, 0.5]).unwrap();
        assert_eq!(ring.rate(), &[1.0, 0.0, 0.5]);
    }

    #[test]
    fn carry_accumulates_previous_state() {
        let mut ring = CircularArray::new(2).unwrap().with_carry(0.5);
        ring.update_rate(&[1.0, 0.0]).unwrap();
        ring.update_rate(&[1.0, 0.0]).unwrap();
        assert!((ring.rate()[0] - 1.5).abs() < 1e-12);
    }

    #[test]
    fn custom_activation_is_applied_then_clipped() {
        fn saturate(x: f64) -> f64 {
            x.min(1.0)
        }
        let mut ring = CircularArray::new(2).unwrap().with_activation(saturate);
        ring.update_rate(&[5.0, -5.0]).unwrap();
        assert_eq!(ring.rate(), &[1.0, 0.0]);
    }

    #[test]
    fn wrong_input_length_is_rejected() {
        let mut ring = CircularArray::new(4).unwrap();
        assert_eq!(
            ring.update_rate(&[1.0; 3]),
            Err(NaviError::DimensionMismatch {
                expected: 4,
                actual: 3
            })
        );
    }

    #[test]
    fn silent_ring_decodes_to_zero() {
        let ring = CircularArray::new(8).unwrap();
        let d = ring.decode().unwrap();
        assert_eq!(d.len, 0.0);
        assert_eq!(d.max, None);
        assert_eq!(d.avg.bearing(), None);
        assert_eq!(ring.vector().unwrap(), Vec2::ZERO);
    }

    #[test]
    fn uniform_ring_has_mass_but_no_direction() {
        let mut ring = CircularArray::new(36).unwrap();
        ring.update_rate(&[1.0; 36]).unwrap();
        assert!(ring.len() > 0.0);
        assert_eq!(ring.avg().bearing(), None);
    }

    #[test]
    fn unimodal_bump_avg_and_max_agree() {
        let mut ring = CircularArray::new(36).unwrap();
        let target = Vec2::from_polar(3.0, 100f64.to_radians());
        let rates = bump(&ring, target);
        ring.set_rate(&rates).unwrap();

        let d = ring.decode().unwrap();
        let avg = d.avg.bearing().unwrap();
        let max = d.max.unwrap();
        assert!((avg - max).abs() < 1e-9, "avg {avg} max {max}");
        assert!((d.len - 3.0).abs() < 1e-9, "len {}", d.len);
    }

    #[test]
    fn bimodal_bump_max_picks_taller_peak_avg_blends() {
        let mut ring = CircularArray::new(36).unwrap();
        let mut rates = vec![0.0; 36];
        rates[0] = 2.0; // 0 rad
        rates[9] = 1.0; // π/2
        ring.set_rate(&rates).unwrap();

        assert!(ring.max().unwrap().abs() < 1e-12);
        let avg = ring.avg().bearing().unwrap();
        assert!((avg - 0.5f64.atan()).abs() < 1e-9, "avg bearing {avg}");
    }

    #[test]
    fn encode_round_trips_off_grid_lengths() {
        let ring = CircularArray::new(36).unwrap();
        let mut tmp = ring.clone();
        let v = Vec2::from_polar(7.5, 0.123);
        tmp.set_rate(&bump(&ring, v)).unwrap();
        assert!((tmp.len() - 7.5).abs() < 1e-9);
        let err = (tmp.avg().bearing().unwrap() - 0.123).abs();
        assert!(err < 0.01, "bearing error {err}");
    }

    #[test]
    fn nan_is_reported_at_decode() {
        let mut ring = CircularArray::new(3).unwrap();
        ring.update_rate(&[f64::NAN, 1.0, 1.0]).unwrap();
        assert_eq!(
            ring.decode(),
            Err(NaviError::NonFinite("circular array rates"))
        );
    }

    #[test]
    fn reset_is_idempotent() {
        let mut ring = CircularArray::new(5).unwrap();
        ring.update_rate(&[1.0; 5]).unwrap();
        ring.reset();
        let once = ring.rate().to_vec();
        ring.reset();
        assert_eq!(ring.rate(), once.as_slice());
        assert!(once.iter().all(|&r| r == 0.0));
    }
}
