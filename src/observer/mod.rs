#[cfg(feature = "serde")]
use serde::Serialize;

use crate::controller::{Controller, Mode, MotorTerms};
use crate::error::Result;
use crate::geom::Vec2;

/// A read-only snapshot of what a controller is doing.
///
/// Observers cannot steer the agent. Snapshots allocate and decode every
/// ring, so take them at the sampling rate, not every tick.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct ControllerSnapshot {
    pub tick: u64,
    pub trial: u64,
    pub trial_tick: u64,
    pub time: f64,
    pub mode: Mode,

    pub hv: Vec2,
    pub hv_max: Vec2,

    pub choice: usize,
    pub gv: Vec<Vec2>,
    pub gv_vecavg: Option<f64>,
    pub expl: Vec<f64>,
    pub values: Vec<f64>,
    pub reward_traces: Vec<f64>,
    pub e_beta: f64,

    pub lv: Vec<Vec2>,
    pub lv_active: Vec2,
    pub el_lm: Vec<f64>,
    pub lv_values: Vec<f64>,

    pub weights: MotorTerms,
    pub motor: MotorTerms,
    pub output: f64,
}

impl ControllerSnapshot {
    #[cfg(feature = "serde")]
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

pub struct ControllerAdapter<'a> {
    ctrl: &'a Controller,
}

impl<'a> ControllerAdapter<'a> {
    pub fn new(ctrl: &'a Controller) -> Self {
        Self { ctrl }
    }

    pub fn snapshot(&self) -> Result<ControllerSnapshot> {
        let c = self.ctrl;
        let colors = 0..c.num_colors();
        let landmarks = 0..c.num_landmarks();

        Ok(ControllerSnapshot {
            tick: c.tick(),
            trial: c.trial(),
            trial_tick: c.trial_tick(),
            time: c.time(),
            mode: c.mode(),

            hv: c.hv(),
            hv_max: c.hv_max(),

            choice: c.choice(),
            gv: colors.clone().map(|i| c.gv(i)).collect::<Result<_>>()?,
            gv_vecavg: c.gv_vecavg()?,
            expl: colors.clone().map(|i| c.expl(i)).collect::<Result<_>>()?,
            values: colors.clone().map(|i| c.value(i)).collect::<Result<_>>()?,
            reward_traces: colors.map(|i| c.reward_trace(i)).collect::<Result<_>>()?,
            e_beta: c.e_beta(),

            lv: landmarks.clone().map(|i| c.lv(i)).collect::<Result<_>>()?,
            lv_active: c.lv_active()?,
            el_lm: landmarks.clone().map(|i| c.el_lm(i)).collect::<Result<_>>()?,
            lv_values: landmarks.map(|i| c.lv_value(i)).collect::<Result<_>>()?,

            weights: c.weights(),
            motor: c.motor(),
            output: c.output(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::{ControllerConfig, Percept};

    #[test]
    fn snapshot_sizes_follow_config() {
        let cfg = ControllerConfig::with_size(12)
            .with_colors(3)
            .with_landmarks(2);
        let mut c = Controller::new(cfg).unwrap();
        c.update(&Percept::new(0.5, 1.0)).unwrap();
        let snap = ControllerAdapter::new(&c).snapshot().unwrap();
        assert_eq!(snap.gv.len(), 3);
        assert_eq!(snap.expl.len(), 3);
        assert_eq!(snap.lv.len(), 2);
        assert_eq!(snap.el_lm.len(), 2);
        assert_eq!(snap.tick, 1);
        assert_eq!(snap.hv, c.hv());
        assert_eq!(snap.output, c.output());
    }

    #[cfg(feature = "serde")]
    #[test]
    fn snapshot_serializes_to_json() {
        let c = Controller::new(ControllerConfig::with_size(8)).unwrap();
        let json = ControllerAdapter::new(&c).snapshot().unwrap().to_json().unwrap();
        assert!(json.contains("\"mode\":\"Outbound\""), "{json}");
        assert!(json.contains("\"gv_vecavg\":null"), "{json}");
    }
}
