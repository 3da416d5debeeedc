//! solvers — iterative linear solves and the stopping rules shared with
//! the minimizers.
pub mod conjugate_gradient;
pub mod controller;
pub mod steihaug;

pub use self::conjugate_gradient::{solve, solve_with, CgOptions, CgOutcome};
pub use self::controller::{ControllerStatus, ConvergenceStatus, IterationController, StoppingRules};
pub use self::steihaug::{solve_steihaug, SteihaugOutcome};
