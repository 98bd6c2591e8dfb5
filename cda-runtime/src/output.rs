use anyhow::{anyhow, Result};
use cda_instances::Assignment;
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

/// Tab separated series written line by line, flushed after every record so
/// a running simulation can be followed from outside.
pub struct SeriesWriter {
    writer: BufWriter<File>,
}

impl SeriesWriter {
    pub fn create<P: AsRef<Path>>(path: P, columns: &[&str]) -> Result<Self> {
        let path = path.as_ref();
        let file = File::create(path)
            .map_err(|e| anyhow!("Failed to create '{}': {}", path.display(), e))?;
        let mut writer = BufWriter::new(file);
        writeln!(writer, "# {}", columns.join("\t"))?;
        writer.flush()?;
        Ok(Self { writer })
    }

    pub fn record(&mut self, values: &[String]) -> Result<()> {
        writeln!(self.writer, "{}", values.join("\t"))?;
        self.writer.flush()?;
        Ok(())
    }

    pub fn record_point(&mut self, t: f64, e: f64) -> Result<()> {
        self.record(&[t.to_string(), e.to_string()])
    }
}

/// Parses a series written by `SeriesWriter`, skipping `#` lines.
pub fn read_series<P: AsRef<Path>>(path: P) -> Result<Vec<Vec<f64>>> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("Failed to read '{}': {}", path.display(), e))?;
    content
        .lines()
        .filter(|line| !line.starts_with('#') && !line.trim().is_empty())
        .map(|line| {
            line.split('\t')
                .map(|field| {
                    field
                        .parse::<f64>()
                        .map_err(|e| anyhow!("Bad value '{}': {}", field, e))
                })
                .collect()
        })
        .collect()
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct FinalReport {
    pub assignment: Assignment,
    pub residual_energy: usize,
    pub accepted_steps: usize,
    pub energy: f64,
    pub runtime_secs: f64,
}

pub fn final_report_path(series: &Path) -> PathBuf {
    series.with_extension("final.json")
}

pub fn walksat_series_name(k: usize, n: usize, m: usize, q: f64, horizon: f64, seed: u64, tol: f64) -> PathBuf {
    PathBuf::from(format!(
        "CDA_WalkSAT_av_rates_ener_K_{}_N_{}_M_{}_q_{:.4}_tl_{:.2}_seed_{}_tol_{:.1e}.txt",
        k, n, m, q, horizon, seed, tol
    ))
}

pub fn fms_series_name(k: usize, n: usize, m: usize, eta: f64, horizon: f64, seed: u64, tol: f64) -> PathBuf {
    PathBuf::from(format!(
        "CDA_FMS_ener_K_{}_N_{}_M_{}_eta_{:.4}_tl_{:.2}_seed_{}_tol_{:.1e}.txt",
        k, n, m, eta, horizon, seed, tol
    ))
}

pub fn population_series_name(
    k: usize,
    alpha: f64,
    eta: f64,
    horizon: f64,
    seed: u64,
    tol: f64,
    pop_size: usize,
    eps_c: f64,
) -> PathBuf {
    PathBuf::from(format!(
        "CDA1av_pop_gamma_FMS_ener_K_{}_alpha_{:.4}_eta_{:.4}_tl_{:.2}_seed_{}_tol_{:.1e}_popsize_{}_epsc_{:.0e}.txt",
        k, alpha, eta, horizon, seed, tol, pop_size, eps_c
    ))
}

pub fn decimation_series_name(k: usize, n: usize, m: usize, eta: f64, steps: usize, seed: u64, tol: f64) -> PathBuf {
    PathBuf::from(format!(
        "CDA_decimation_FMS_dyn_K_{}_N_{}_M_{}_eta_{:.4}_stepsdec_{}_seed_{}_tol_{:.1e}.txt",
        k, n, m, eta, steps, seed, tol
    ))
}
