//! Scenario batches: one compiled graph, many independent input sets.
use crate::compile::CompiledModel;
use crate::error::EvalError;
use crate::eval::{evaluate, Evaluation, InputSet};
use rayon::prelude::*;
use std::collections::BTreeMap;

/// Evaluates every scenario independently and returns its results keyed by
/// scenario name.
///
/// Each evaluation clones the template itself, so scenarios share nothing
/// mutable and run across worker threads. The first failing scenario aborts
/// the batch.
pub fn run_scenarios(
    model: &CompiledModel,
    scenarios: &BTreeMap<String, InputSet>,
) -> Result<BTreeMap<String, Evaluation>, EvalError> {
    let _span = tracing::info_span!("run_scenarios", scenarios = scenarios.len()).entered();

    let evaluated: Vec<(String, Evaluation)> = scenarios
        .par_iter()
        .map(|(name, inputs)| {
            tracing::debug!(scenario = name.as_str(), "evaluating scenario");
            evaluate(model, &[inputs]).map(|ev| (name.clone(), ev))
        })
        .collect::<Result<_, _>>()?;

    Ok(evaluated.into_iter().collect())
}
