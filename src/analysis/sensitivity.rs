//! Sensitivity analysis: targeted input sweeps and key-driver detection.
//!
//! Both operations are stacks of independent evaluations of one compiled
//! template, so inputs fan out across worker threads like scenario batches.
use crate::compile::CompiledModel;
use crate::error::EvalError;
use crate::eval::{evaluate, Evaluation, InputSet};
use crate::value::Value;
use rayon::prelude::*;
use serde::Serialize;
use std::collections::BTreeMap;

/// Fixed perturbation applied by driver detection.
const DRIVER_PERTURBATION_PCT: f64 = 20.0;

#[derive(Debug, Clone, Copy)]
pub struct SweepConfig {
    /// Number of variation points, symmetric around the baseline.
    pub steps: usize,
    /// Half-width of the sweep in percent of the baseline value.
    pub range_percent: f64,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            steps: 5,
            range_percent: 40.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SweepPoint {
    pub input_value: f64,
    pub input_pct_change: f64,
    pub output_value: f64,
    pub output_pct_change: f64,
}

/// One (input, output) series across all sweep points.
#[derive(Debug, Clone, Serialize)]
pub struct SensitivitySeries {
    pub input_key: String,
    pub output: String,
    pub points: Vec<SweepPoint>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DriverScore {
    pub input_key: String,
    /// Sum of elasticities across all tracked outputs.
    pub impact: f64,
    pub elasticities: BTreeMap<String, f64>,
}

/// Varies each requested input across `config.steps` points evenly spaced
/// between `-range_percent%` and `+range_percent%`, re-evaluating the model
/// per point, and reports each output's movement against the baseline run.
pub fn analyze_sensitivity(
    model: &CompiledModel,
    baseline: &InputSet,
    inputs_to_vary: &[String],
    output_metrics: &[String],
    config: SweepConfig,
) -> Result<Vec<SensitivitySeries>, EvalError> {
    let _span = tracing::info_span!(
        "analyze_sensitivity",
        inputs = inputs_to_vary.len(),
        steps = config.steps
    )
    .entered();

    if config.steps < 2 {
        return Err(EvalError::InvalidConfig(
            "sweep requires at least 2 steps".to_string(),
        ));
    }

    let base_eval = evaluate(model, &[baseline])?;
    let base_outputs = numeric_outputs(&base_eval, output_metrics)?;

    let step_size = 2.0 * config.range_percent / (config.steps - 1) as f64;

    let per_input: Vec<Vec<SensitivitySeries>> = inputs_to_vary
        .par_iter()
        .map(|key| {
            let base_value = numeric_input(baseline, key)?;
            let mut series: Vec<SensitivitySeries> = output_metrics
                .iter()
                .map(|output| SensitivitySeries {
                    input_key: key.clone(),
                    output: output.clone(),
                    points: Vec::with_capacity(config.steps),
                })
                .collect();

            for step in 0..config.steps {
                let pct = -config.range_percent + step as f64 * step_size;
                let varied = base_value * (1.0 + pct / 100.0);

                let mut inputs = baseline.clone();
                inputs.insert(key.clone(), Value::Number(varied));
                let run = evaluate(model, &[&inputs])?;

                for (slot, output) in series.iter_mut().zip(output_metrics) {
                    let out = numeric_result(&run, output)?;
                    let base_out = base_outputs[output];
                    slot.points.push(SweepPoint {
                        input_value: varied,
                        input_pct_change: pct,
                        output_value: out,
                        output_pct_change: (out - base_out) / base_out * 100.0,
                    });
                }
            }
            Ok(series)
        })
        .collect::<Result<_, EvalError>>()?;

    Ok(per_input.into_iter().flatten().collect())
}

/// Perturbs every numeric, non-zero baseline input by a fixed +20%, scores
/// each by summed output elasticity, and returns the top `top_n` drivers.
///
/// With no output metrics given, every numeric baseline result is tracked.
pub fn detect_key_drivers(
    model: &CompiledModel,
    baseline: &InputSet,
    output_metrics: &[String],
    top_n: usize,
) -> Result<Vec<DriverScore>, EvalError> {
    let _span = tracing::info_span!("detect_key_drivers", top_n = top_n).entered();

    let base_eval = evaluate(model, &[baseline])?;
    let outputs: Vec<String> = if output_metrics.is_empty() {
        base_eval
            .results
            .iter()
            .filter(|(_, v)| v.is_number())
            .map(|(name, _)| name.clone())
            .collect()
    } else {
        output_metrics.to_vec()
    };
    let base_outputs = numeric_outputs(&base_eval, &outputs)?;

    let candidates: Vec<(&String, f64)> = baseline
        .iter()
        .filter_map(|(key, value)| match value {
            Value::Number(n) if *n != 0.0 => Some((key, *n)),
            _ => None,
        })
        .collect();

    let mut scores: Vec<DriverScore> = candidates
        .par_iter()
        .map(|(key, base_value)| {
            let mut inputs = baseline.clone();
            inputs.insert(
                (*key).clone(),
                Value::Number(base_value * (1.0 + DRIVER_PERTURBATION_PCT / 100.0)),
            );
            let run = evaluate(model, &[&inputs])?;

            let mut elasticities = BTreeMap::new();
            let mut impact = 0.0;
            for output in &outputs {
                let out = numeric_result(&run, output)?;
                let base_out = base_outputs[output];
                let pct_out = (out - base_out) / base_out * 100.0;
                let elasticity = (pct_out / DRIVER_PERTURBATION_PCT).abs();
                impact += elasticity;
                elasticities.insert(output.clone(), elasticity);
            }
            Ok(DriverScore {
                input_key: (*key).clone(),
                impact,
                elasticities,
            })
        })
        .collect::<Result<_, EvalError>>()?;

    scores.sort_by(|a, b| b.impact.total_cmp(&a.impact));
    scores.truncate(top_n);
    Ok(scores)
}

fn numeric_input(inputs: &InputSet, key: &str) -> Result<f64, EvalError> {
    match inputs.get(key) {
        Some(Value::Number(n)) => Ok(*n),
        Some(other) => Err(EvalError::NonNumeric(format!("{} ({})", key, other))),
        None => Err(EvalError::MissingInput(key.to_string())),
    }
}

fn numeric_result(run: &Evaluation, name: &str) -> Result<f64, EvalError> {
    match run.results.get(name) {
        Some(Value::Number(n)) => Ok(*n),
        Some(other) => Err(EvalError::NonNumeric(format!("{} ({})", name, other))),
        None => Err(EvalError::MissingValue(name.to_string())),
    }
}

fn numeric_outputs(
    run: &Evaluation,
    outputs: &[String],
) -> Result<BTreeMap<String, f64>, EvalError> {
    outputs
        .iter()
        .map(|name| numeric_result(run, name).map(|v| (name.clone(), v)))
        .collect()
}
