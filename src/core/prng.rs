// Minimal PRNG (no external crates).
//
// This is NOT cryptographically secure.
// It drives every noise draw of a controller so a seed reproduces a run bit for bit.

#[derive(Debug, Clone)]
pub struct Prng {
    state: u64,
    // Second Box-Muller output, kept so draws come in pairs.
    spare: Option<f64>,
}

impl Prng {
    pub fn new(seed: u64) -> Self {
        // Avoid a zero state.
        let seed = if seed == 0 { 0x9E3779B97F4A7C15 } else { seed };
        Self {
            state: seed,
            spare: None,
        }
    }

    pub fn state(&self) -> u64 {
        self.state
    }

    #[inline]
    fn next_u64(&mut self) -> u64 {
        // xorshift64*
        let mut x = self.state;
        x ^= x >> 12;
        x ^= x << 25;
        x ^= x >> 27;
        self.state = x;
        x.wrapping_mul(0x2545F4914F6CDD1D)
    }

    /// Uniform in [0, 1).
    #[inline]
    pub fn next_f64_01(&mut self) -> f64 {
        // 53 high bits -> exact f64 mantissa.
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    #[inline]
    pub fn gen_range_f64(&mut self, low: f64, high: f64) -> f64 {
        low + (high - low) * self.next_f64_01()
    }

    /// Standard normal draw (Box-Muller).
    pub fn next_gaussian(&mut self) -> f64 {
        if let Some(z) = self.spare.take() {
            return z;
        }
        // u1 in (0, 1] so ln() stays finite.
        let u1 = 1.0 - self.next_f64_01();
        let u2 = self.next_f64_01();
        let r = (-2.0 * u1.ln()).sqrt();
        let (s, c) = (core::f64::consts::TAU * u2).sin_cos();
        self.spare = Some(r * s);
        r * c
    }

    /// Zero-mean Gaussian noise with the given standard deviation.
    ///
    /// A zero deviation returns 0.0 without consuming a draw, so noiseless
    /// configurations stay deterministic regardless of seed.
    #[inline]
    pub fn noise(&mut self, stdev: f64) -> f64 {
        if stdev == 0.0 {
            0.0
        } else {
            stdev * self.next_gaussian()
        }
    }
}
