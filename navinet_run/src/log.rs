//! Tab-separated activity logs, one file per estimate.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use navinet::geom::Vec2;
use navinet::observer::ControllerSnapshot;

use crate::error::RunError;
use crate::trial::TrialOutcome;

struct DatFile {
    path: PathBuf,
    out: BufWriter<File>,
}

impl DatFile {
    fn create(dir: &Path, name: &str, header: &str) -> Result<Self, RunError> {
        let path = dir.join(name);
        let file = File::create(&path).map_err(|e| RunError::io(&path, e))?;
        let mut out = BufWriter::new(file);
        writeln!(out, "{header}").map_err(|e| RunError::io(&path, e))?;
        Ok(Self { path, out })
    }

    fn row(&mut self, cols: &[String]) -> Result<(), RunError> {
        writeln!(self.out, "{}", cols.join("\t")).map_err(|e| RunError::io(&self.path, e))
    }

    fn flush(&mut self) -> Result<(), RunError> {
        self.out.flush().map_err(|e| RunError::io(&self.path, e))
    }
}

pub struct RunLog {
    home: DatFile,
    global: DatFile,
    local: DatFile,
    signals: DatFile,
    endpoints: DatFile,
}

impl RunLog {
    pub fn create(dir: &Path) -> Result<Self, RunError> {
        fs::create_dir_all(dir).map_err(|e| RunError::io(dir, e))?;
        Ok(Self {
            home: DatFile::create(
                dir,
                "homevector.dat",
                "trial\ttick\thv_x\thv_y\thv_max_x\thv_max_y\tpos_x\tpos_y",
            )?,
            global: DatFile::create(
                dir,
                "globalvector.dat",
                "trial\ttick\tchoice\tbeta\t[gv_x gv_y expl value trace]...",
            )?,
            local: DatFile::create(
                dir,
                "localvector.dat",
                "trial\ttick\tactive_x\tactive_y\t[lv_x lv_y eligibility value]...",
            )?,
            signals: DatFile::create(
                dir,
                "signals.dat",
                "trial\ttick\tmode\tw_rand\tw_pi\tw_gv\tw_lv\tm_rand\tm_pi\tm_gv\tm_lv\toutput",
            )?,
            endpoints: DatFile::create(
                dir,
                "endpoints.dat",
                "trial\tsteps\tgoal_hits\thomed\tpi_error\tend_x\tend_y",
            )?,
        })
    }

    pub fn sample(
        &mut self,
        trial: u32,
        snap: &ControllerSnapshot,
        position: Vec2,
    ) -> Result<(), RunError> {
        let head = [trial.to_string(), snap.trial_tick.to_string()];

        let mut row = head.to_vec();
        row.extend(
            [snap.hv.x, snap.hv.y, snap.hv_max.x, snap.hv_max.y, position.x, position.y]
                .iter()
                .map(f64::to_string),
        );
        self.home.row(&row)?;

        let mut row = head.to_vec();
        row.push(snap.choice.to_string());
        row.push(snap.e_beta.to_string());
        for c in 0..snap.gv.len() {
            row.extend(
                [
                    snap.gv[c].x,
                    snap.gv[c].y,
                    snap.expl[c],
                    snap.values[c],
                    snap.reward_traces[c],
                ]
                .iter()
                .map(f64::to_string),
            );
        }
        self.global.row(&row)?;

        let mut row = head.to_vec();
        row.push(snap.lv_active.x.to_string());
        row.push(snap.lv_active.y.to_string());
        for i in 0..snap.lv.len() {
            row.extend(
                [snap.lv[i].x, snap.lv[i].y, snap.el_lm[i], snap.lv_values[i]]
                    .iter()
                    .map(f64::to_string),
            );
        }
        self.local.row(&row)?;

        let (w, m) = (snap.weights, snap.motor);
        let mut row = head.to_vec();
        row.push(format!("{:?}", snap.mode));
        row.extend(
            [
                w.random,
                w.path_integration,
                w.global_vector,
                w.local_vector,
                m.random,
                m.path_integration,
                m.global_vector,
                m.local_vector,
                snap.output,
            ]
            .iter()
            .map(f64::to_string),
        );
        self.signals.row(&row)
    }

    pub fn endpoint(&mut self, outcome: &TrialOutcome) -> Result<(), RunError> {
        self.endpoints.row(&[
            outcome.trial.to_string(),
            outcome.steps.to_string(),
            outcome.goal_hits.to_string(),
            u8::from(outcome.homed).to_string(),
            outcome.pi_error.to_string(),
            outcome.end.x.to_string(),
            outcome.end.y.to_string(),
        ])
    }

    pub fn flush(&mut self) -> Result<(), RunError> {
        for f in [
            &mut self.home,
            &mut self.global,
            &mut self.local,
            &mut self.signals,
            &mut self.endpoints,
        ] {
            f.flush()?;
        }
        Ok(())
    }
}
