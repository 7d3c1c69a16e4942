use navinet::controller::{Controller, Percept};
use navinet::geom::Vec2;
use navinet::observer::ControllerAdapter;
use navinet::prng::Prng;
use tracing::{debug, info};

use crate::arena::Arena;
use crate::config::RunConfig;
use crate::error::RunError;
use crate::log::RunLog;

#[derive(Debug, Clone, PartialEq)]
pub struct TrialOutcome {
    pub trial: u32,
    pub steps: u64,
    pub goal_hits: usize,
    /// Back in the nest after the outbound phase.
    pub homed: bool,
    /// Mean |home vector - true position| over the trial.
    pub pi_error: f64,
    pub end: Vec2,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Summary {
    pub agent: usize,
    pub trials: u32,
    pub goal_hits: usize,
    pub homed: u32,
    pub mean_pi_error: f64,
}

/// One agent: a controller living in its own arena.
pub struct Runner {
    agent: usize,
    ctrl: Controller,
    arena: Arena,
    rng: Prng,
    trials: u32,
    trial_steps: u64,
    speed: f64,
    log: Option<RunLog>,
}

impl Runner {
    pub fn new(cfg: &RunConfig, agent: usize) -> Result<Self, RunError> {
        cfg.validate()?;
        let seed = cfg.controller.seed.wrapping_add(agent as u64);
        let mut ctrl_cfg = cfg.controller.clone();
        ctrl_cfg.seed = seed;
        let log = match &cfg.output_dir {
            Some(dir) => Some(RunLog::create(&dir.join(format!("agent_{agent}")))?),
            None => None,
        };
        Ok(Self {
            agent,
            ctrl: Controller::new(ctrl_cfg)?,
            arena: Arena::new(cfg.arena.clone()),
            rng: Prng::new(seed ^ 0xA5A5_5A5A_DEAD_BEEF),
            trials: cfg.trials,
            trial_steps: cfg.trial_steps,
            speed: cfg.speed,
            log,
        })
    }

    pub fn controller(&self) -> &Controller {
        &self.ctrl
    }

    pub fn run(&mut self) -> Result<Summary, RunError> {
        let mut summary = Summary {
            agent: self.agent,
            ..Default::default()
        };
        let mut err_sum = 0.0;
        for trial in 0..self.trials {
            let out = self.run_trial(trial)?;
            summary.trials += 1;
            summary.goal_hits += out.goal_hits;
            summary.homed += u32::from(out.homed);
            err_sum += out.pi_error;
        }
        summary.mean_pi_error = err_sum / summary.trials.max(1) as f64;
        if let Some(log) = &mut self.log {
            log.flush()?;
        }
        info!(
            agent = self.agent,
            trials = summary.trials,
            goal_hits = summary.goal_hits,
            homed = summary.homed,
            pi_error = summary.mean_pi_error,
            "agent finished"
        );
        Ok(summary)
    }

    pub fn run_trial(&mut self, trial: u32) -> Result<TrialOutcome, RunError> {
        if trial > 0 {
            self.ctrl.reset();
        }
        self.arena.reset(&mut self.rng);
        let homing = self.ctrl.switches().homing_on;

        let mut command = 0.0;
        let mut goal_hits = 0;
        let mut homed = false;
        let mut err_sum = 0.0;
        let mut steps = 0;

        while steps < self.trial_steps {
            self.arena.advance(command, self.speed);
            let contact = self.arena.sense();
            let (reward, color) = contact.map_or((0.0, self.ctrl.choice()), |c| (c.reward, c.color));

            let percept = Percept::new(self.arena.heading(), self.speed)
                .with_reward(reward, color)
                .with_landmarks(self.arena.signals())
                .with_position(self.arena.position());
            command = self.ctrl.update(&percept)?;
            steps += 1;

            if let Some(c) = contact {
                goal_hits += 1;
                debug!(agent = self.agent, trial, step = steps, goal = c.goal, "goal reached");
                if homing {
                    self.ctrl.set_inbound();
                }
            }

            err_sum += (self.ctrl.hv() - self.arena.position()).len();

            if self.ctrl.should_sample() {
                if let Some(log) = &mut self.log {
                    let snap = ControllerAdapter::new(&self.ctrl).snapshot()?;
                    log.sample(trial, &snap, self.arena.position())?;
                }
            }

            if self.ctrl.is_inbound() && self.arena.at_nest() {
                homed = true;
                break;
            }
        }

        let outcome = TrialOutcome {
            trial,
            steps,
            goal_hits,
            homed,
            pi_error: err_sum / steps.max(1) as f64,
            end: self.arena.position(),
        };
        debug!(agent = self.agent, ?outcome, "trial finished");
        if let Some(log) = &mut self.log {
            log.endpoint(&outcome)?;
        }
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::{ArenaConfig, Goal};
    use navinet::controller::{ControllerConfig, Switches};

    fn straight_east() -> RunConfig {
        let switches = Switches {
            homing_on: true,
            gvlearn_on: true,
            ..Default::default()
        };
        let mut controller = ControllerConfig::with_size(18)
            .with_switches(switches)
            .with_random_noise(0.0);
        controller.goal.learning_rate = 1.0;
        RunConfig {
            controller,
            arena: ArenaConfig {
                goals: vec![Goal {
                    position: Vec2::new(10.0, 0.0),
                    color: 0,
                    radius: 1.5,
                    reward: 1.0,
                }],
                landmarks: Vec::new(),
                start_heading: Some(0.0),
                ..Default::default()
            },
            trials: 2,
            trial_steps: 50,
            ..Default::default()
        }
    }

    #[test]
    fn goal_contact_rewards_and_turns_homeward() {
        let mut r = Runner::new(&straight_east(), 0).unwrap();
        let out = r.run_trial(0).unwrap();
        assert_eq!(out.goal_hits, 1);
        assert_eq!(out.steps, 50);
        assert!(r.controller().is_inbound());
        assert!(out.pi_error < 1e-6, "pi error {}", out.pi_error);
        assert!(r.controller().value(0).unwrap() > 0.0);
        // Learned on the first tick inside the goal radius.
        let gv = r.controller().gv(0).unwrap();
        assert!((gv - Vec2::new(9.0, 0.0)).len() < 1e-6, "gv {gv:?}");
    }

    #[test]
    fn inward_switch_ends_trial_in_nest() {
        let mut cfg = straight_east();
        cfg.controller.inward = Some(0);
        cfg.arena.goals.clear();
        let mut r = Runner::new(&cfg, 0).unwrap();
        let out = r.run_trial(0).unwrap();
        assert!(out.homed);
        assert_eq!(out.steps, 1);
    }

    #[test]
    fn run_summarises_all_trials() {
        let mut r = Runner::new(&straight_east(), 3).unwrap();
        let s = r.run().unwrap();
        assert_eq!(s.agent, 3);
        assert_eq!(s.trials, 2);
        assert_eq!(s.goal_hits, 2);
        assert_eq!(r.controller().trial(), 1);
    }

    #[test]
    fn logs_are_written_when_requested() {
        let dir = std::env::temp_dir().join(format!("navinet_run_log_{}", std::process::id()));
        let mut cfg = straight_east();
        cfg.trials = 1;
        cfg.output_dir = Some(dir.clone());
        let mut r = Runner::new(&cfg, 0).unwrap();
        r.run().unwrap();

        let agent_dir = dir.join("agent_0");
        let home = std::fs::read_to_string(agent_dir.join("homevector.dat")).unwrap();
        // Header plus one row per tick.
        assert_eq!(home.lines().count(), 51);
        let ends = std::fs::read_to_string(agent_dir.join("endpoints.dat")).unwrap();
        assert_eq!(ends.lines().count(), 2);
        for name in ["globalvector.dat", "localvector.dat", "signals.dat"] {
            assert!(agent_dir.join(name).exists(), "{name} missing");
        }
        let _ = std::fs::remove_dir_all(&dir);
    }
}
