//! argmin_backend::run — drive an argmin executor and map its final state.
use argmin::core::{Executor, State, TerminationReason, TerminationStatus};
#[cfg(feature = "obs_slog")]
use argmin::core::{CostFunction, Gradient};
#[cfg(feature = "obs_slog")]
use argmin_math::ArgminL2Norm;
use log::{debug, warn};

use crate::{
    energy::Energy,
    errors::IftResult,
    minimization::{
        argmin_backend::{
            adapter::EnergyProblem,
            types::{ArgminOptions, Grad, Theta},
        },
        MinimizationOutcome,
    },
    solvers::ConvergenceStatus,
};

/// Run `solver` on `problem` from the template's position.
///
/// The returned energy sits at argmin's best parameter vector. A run that
/// argmin aborted (for instance a line search hitting a degenerate
/// direction) still counts as converged when that best point meets
/// `tol_grad`.
pub fn run_lbfgs<'a, E, S>(
    template: &'a E, opts: &ArgminOptions, problem: EnergyProblem<'a, E>, solver: S,
) -> IftResult<MinimizationOutcome<E>>
where
    E: Energy,
    S: argmin::core::Solver<EnergyProblem<'a, E>, argmin::core::IterState<Theta, Grad, (), (), (), f64>>
        + Send
        + 'static,
{
    let theta0 = template.position().val().clone();

    #[cfg(feature = "obs_slog")]
    if opts.verbose {
        log_initial_state(&theta0, &problem)?;
    }

    let mut optimizer = Executor::new(problem, solver);
    optimizer = optimizer.configure(|state| state.param(theta0));

    #[cfg(feature = "obs_slog")]
    if opts.verbose {
        let observer = argmin_observer_slog::SlogLogger::term_noblock();
        optimizer = optimizer.add_observer(observer, argmin::core::observers::ObserverMode::Always);
    }

    if let Some(max_iter) = opts.max_iter {
        optimizer = optimizer.configure(|state| state.max_iters(max_iter as u64));
    }

    let mut result = optimizer.run()?.state().clone();
    let iterations = result.get_iter() as usize;
    debug!("argmin L-BFGS finished after {iterations} iterations: {:?}", result.get_termination_status());

    let energy = match result.take_best_param() {
        Some(best) => EnergyProblem::new(template).energy_at(&best)?,
        None => template.clone(),
    };
    let status =
        settle_status(map_termination(result.get_termination_status()), energy.gradient_norm(), opts.tol_grad);
    match status {
        ConvergenceStatus::IterationLimit => warn!("argmin L-BFGS stopped at the iteration limit"),
        ConvergenceStatus::Stalled => warn!("argmin L-BFGS aborted: {:?}", result.get_termination_status()),
        ConvergenceStatus::Converged => {}
    }
    Ok(MinimizationOutcome::new(energy, status, iterations, 0))
}

/// Upgrade `Stalled` to `Converged` when the gradient already meets `tol_grad`.
fn settle_status(status: ConvergenceStatus, gradient_norm: f64, tol_grad: Option<f64>) -> ConvergenceStatus {
    match (status, tol_grad) {
        (ConvergenceStatus::Stalled, Some(tol)) if gradient_norm <= tol => ConvergenceStatus::Converged,
        _ => status,
    }
}

/// Map argmin's termination onto the crate's status.
pub fn map_termination(status: &TerminationStatus) -> ConvergenceStatus {
    match status {
        TerminationStatus::Terminated(TerminationReason::MaxItersReached) => ConvergenceStatus::IterationLimit,
        TerminationStatus::Terminated(TerminationReason::SolverConverged)
        | TerminationStatus::Terminated(TerminationReason::TargetCostReached) => ConvergenceStatus::Converged,
        _ => ConvergenceStatus::Stalled,
    }
}

#[cfg(feature = "obs_slog")]
fn log_initial_state<E: Energy>(theta0: &Theta, problem: &EnergyProblem<'_, E>) -> IftResult<()> {
    let e0 = problem.cost(theta0)?;
    let g0n = problem.gradient(theta0).ok().map(|g| g.l2_norm());
    log::info!(
        "init: E(theta0) = {:.6}{}",
        e0,
        g0n.map(|n| format!(", ||grad|| = {:.6}", n)).unwrap_or_default()
    );
    Ok(())
}
