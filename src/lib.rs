//! # navinet
//!
//! Population-vector navigation for a simulated foraging agent.
//!
//! Every estimate the agent keeps (where home is, where each kind of goal
//! lies, how to get from a landmark to the goal) is stored as activity on a
//! ring of direction-tuned units and read back as a 2-D vector. A
//! [`Controller`](controller::Controller) runs the networks once per tick and
//! blends their suggestions into one turning command.
//!
//! ## Quick Start
//!
//! ```
//! use navinet::prelude::*;
//!
//! let cfg = ControllerConfig::with_size(18).with_seed(42);
//! let mut agent = Controller::new(cfg).unwrap();
//!
//! for _ in 0..10 {
//!     let turn = agent.update(&Percept::new(0.0, 1.0)).unwrap();
//!     assert!(turn.is_finite());
//! }
//! assert!((agent.hv().len() - 10.0).abs() < 1e-6);
//! ```
//!
//! ## Feature Flags
//!
//! - `serde` (default): `Serialize`/`Deserialize` on configs, vectors and
//!   observer snapshots
//!
//! ## Modules
//!
//! - [`circular_array`]: Ring of direction-tuned units with avg/max decoding
//! - [`pin`]: Path integration network (home vector)
//! - [`goal_learning`]: Reward-driven goal vectors, values and exploration
//! - [`route_learning`]: Landmark-anchored local vectors
//! - [`controller`]: Per-agent tick loop and motor blending
//! - [`observer`]: Read-only snapshots

#[path = "core/error.rs"]
pub mod error;

#[path = "core/geom.rs"]
pub mod geom;

#[path = "core/prng.rs"]
pub mod prng;

#[path = "core/circular_array.rs"]
pub mod circular_array;

#[path = "core/pin.rs"]
pub mod pin;

#[path = "core/goal_learning.rs"]
pub mod goal_learning;

#[path = "core/route_learning.rs"]
pub mod route_learning;

#[path = "core/controller.rs"]
pub mod controller;

pub mod observer;

/// Prelude module for convenient imports.
///
/// ```
/// use navinet::prelude::*;
/// ```
pub mod prelude {
    pub use crate::circular_array::{CircularArray, Decoded, Kernel};
    pub use crate::controller::{
        Controller, ControllerConfig, Mode, MotorTerms, Percept, Switches,
    };
    pub use crate::error::NaviError;
    pub use crate::geom::{angle_diff, wrap_angle, Vec2};
    pub use crate::goal_learning::{
        ExplorationTemperature, GoalConfig, GoalCorrection, GoalLearning, GoalTarget,
        TemperatureConfig,
    };
    pub use crate::observer::{ControllerAdapter, ControllerSnapshot};
    pub use crate::pin::{Layer, PathIntegrator, PinConfig};
    pub use crate::prng::Prng;
    pub use crate::route_learning::{RouteConfig, RouteLearning};
}
