use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Diagnostics captured after one SMC iteration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MetricSample {
    /// Zero-based iteration index.
    pub iteration: usize,
    /// Roots per forest before the merge.
    pub lineages: usize,
    /// Exponential rate used for the height increments.
    pub rate: f64,
    /// Effective sample size after normalisation.
    pub ess: f64,
    /// Largest log-weight in the population.
    pub max_log_weight: f64,
    /// `ln` of the mean incremental weight across the population.
    pub log_mean_increment: f64,
    /// Distinct ancestors picked by the resampling step.
    pub distinct_ancestors: usize,
    /// Pool buffers on loan at the end of the iteration.
    pub outstanding_buffers: usize,
}

/// Collects per-iteration metrics.
#[derive(Debug, Default)]
pub struct MetricsRecorder {
    samples: Vec<MetricSample>,
}

impl MetricsRecorder {
    /// Creates a new recorder instance.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a sample.
    pub fn push(&mut self, sample: MetricSample) {
        self.samples.push(sample);
    }

    /// Returns an immutable view over the recorded samples.
    pub fn samples(&self) -> &[MetricSample] {
        &self.samples
    }

    /// Smallest effective sample size seen so far.
    pub fn min_ess(&self) -> Option<f64> {
        self.samples.iter().map(|sample| sample.ess).reduce(f64::min)
    }

    /// Writes the recorded metrics to a CSV file.
    pub fn write_csv<P: AsRef<Path>>(&self, path: P) -> std::io::Result<()> {
        let mut file = BufWriter::new(File::create(path)?);
        writeln!(
            file,
            "iteration,lineages,rate,ess,max_log_weight,log_mean_increment,distinct_ancestors,outstanding_buffers"
        )?;
        for sample in &self.samples {
            writeln!(
                file,
                "{},{},{:.6},{:.6},{:.6},{:.6},{},{}",
                sample.iteration,
                sample.lineages,
                sample.rate,
                sample.ess,
                sample.max_log_weight,
                sample.log_mean_increment,
                sample.distinct_ancestors,
                sample.outstanding_buffers
            )?;
        }
        file.flush()
    }
}
