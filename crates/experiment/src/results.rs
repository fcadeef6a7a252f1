//! Experiment outputs and their CSV / JSON rendering.

use crate::runner::Session;
use chrono::{DateTime, Utc};
use clue_core::config::AppConfig;
use clue_core::ClueResult;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::info;
use uuid::Uuid;

type SeriesKey = (String, Option<String>);

/// Rewards, regrets and reliability estimates of a panel comparison.
///
/// Reward and rho series are stored as `runs x trials` matrices.
#[derive(Debug, Clone, Default)]
pub struct ComparisonResults {
    trials: usize,
    runs: usize,
    agents: Vec<String>,
    panels: Vec<String>,
    experts: BTreeMap<String, Vec<String>>,
    rewards: BTreeMap<SeriesKey, Vec<Vec<f64>>>,
    regret: BTreeMap<SeriesKey, Vec<f64>>,
    rhos: BTreeMap<(String, String, String), Vec<Vec<f64>>>,
}

impl ComparisonResults {
    pub fn new(trials: usize, runs: usize, agents: Vec<String>, panels: Vec<String>) -> Self {
        Self {
            trials,
            runs,
            agents,
            panels,
            ..Self::default()
        }
    }

    pub fn trials(&self) -> usize {
        self.trials
    }

    pub fn runs(&self) -> usize {
        self.runs
    }

    pub fn agents(&self) -> &[String] {
        &self.agents
    }

    pub fn panels(&self) -> &[String] {
        &self.panels
    }

    /// Expert names of `panel`, once an agent reporting reliabilities ran
    /// against it.
    pub fn experts(&self, panel: &str) -> Option<&[String]> {
        self.experts.get(panel).map(Vec::as_slice)
    }

    pub fn insert(&mut self, agent: &str, panel: Option<&str>, run: usize, session: Session) {
        let key = (agent.to_string(), panel.map(str::to_string));
        let runs = self.runs;
        self.rewards.entry(key.clone()).or_insert_with(|| vec![Vec::new(); runs])[run] = session.rewards;
        self.regret.entry(key).or_insert_with(|| vec![0.0; runs])[run] = session.regret;

        if let (Some(panel), Some(history)) = (panel, session.rhos) {
            self.experts
                .entry(panel.to_string())
                .or_insert_with(|| session.experts.clone());
            for (e, expert) in session.experts.iter().enumerate() {
                let series: Vec<f64> = history.iter().map(|row| row.get(e).copied().unwrap_or(0.0)).collect();
                self.rhos
                    .entry((agent.to_string(), panel.to_string(), expert.clone()))
                    .or_insert_with(|| vec![Vec::new(); runs])[run] = series;
            }
        }
    }

    pub fn rewards(&self, agent: &str, panel: Option<&str>) -> Option<&[Vec<f64>]> {
        self.rewards
            .get(&(agent.to_string(), panel.map(str::to_string)))
            .map(Vec::as_slice)
    }

    pub fn rhos(&self, agent: &str, panel: &str, expert: &str) -> Option<&[Vec<f64>]> {
        self.rhos
            .get(&(agent.to_string(), panel.to_string(), expert.to_string()))
            .map(Vec::as_slice)
    }

    /// Reward per trial averaged over runs.
    pub fn mean_rewards(&self, agent: &str, panel: Option<&str>) -> Option<Vec<f64>> {
        let runs = self.rewards(agent, panel)?;
        let n = runs.len().max(1) as f64;
        Some(
            (0..self.trials)
                .map(|t| runs.iter().filter_map(|r| r.get(t)).sum::<f64>() / n)
                .collect(),
        )
    }

    pub fn mean_regret(&self, agent: &str, panel: Option<&str>) -> Option<f64> {
        self.regret
            .get(&(agent.to_string(), panel.map(str::to_string)))
            .map(|r| mean_and_std(r).0)
    }

    /// Mean and standard deviation of the total regret of every series.
    pub fn regret_table(&self) -> RegretTable {
        let rows = self
            .agents
            .iter()
            .flat_map(|agent| {
                self.regret
                    .iter()
                    .filter(move |((a, _), _)| a == agent)
                    .map(|((a, p), values)| {
                        let (mean, std) = mean_and_std(values);
                        RegretRow {
                            agent: a.clone(),
                            panel: p.clone(),
                            mean,
                            std,
                        }
                    })
            })
            .collect();
        RegretTable {
            panels: self.panels.clone(),
            rows,
        }
    }
}

fn mean_and_std(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    (mean, var.sqrt())
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegretRow {
    pub agent: String,
    pub panel: Option<String>,
    pub mean: f64,
    pub std: f64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RegretTable {
    pub panels: Vec<String>,
    pub rows: Vec<RegretRow>,
}

impl RegretTable {
    /// Rows relevant to `panel`: the panel's own rows plus every agent that
    /// ran without advice.
    pub fn for_panel<'a>(&'a self, panel: &'a str) -> impl Iterator<Item = &'a RegretRow> + 'a {
        self.rows
            .iter()
            .filter(move |r| r.panel.as_deref().map_or(true, |p| p == panel))
    }

    pub fn get(&self, agent: &str, panel: Option<&str>) -> Option<&RegretRow> {
        self.rows
            .iter()
            .find(|r| r.agent == agent && r.panel.as_deref() == panel)
    }
}

/// Mean regret of one series over a two-parameter sweep.
#[derive(Debug, Clone)]
pub struct ParamGrid {
    pub name: String,
    pub row_param: String,
    pub col_param: String,
    pub rows: Vec<f64>,
    pub cols: Vec<f64>,
    /// `(agent, panel) -> rows x cols` matrix.
    pub cells: BTreeMap<(String, String), Vec<Vec<f64>>>,
}

impl ParamGrid {
    pub fn new(name: &str, row_param: &str, col_param: &str, rows: Vec<f64>, cols: Vec<f64>) -> Self {
        Self {
            name: name.to_string(),
            row_param: row_param.to_string(),
            col_param: col_param.to_string(),
            rows,
            cols,
            cells: BTreeMap::new(),
        }
    }

    pub fn set(&mut self, agent: &str, panel: &str, row: usize, col: usize, value: f64) {
        let (r, c) = (self.rows.len(), self.cols.len());
        let cell = self
            .cells
            .entry((agent.to_string(), panel.to_string()))
            .or_insert_with(|| vec![vec![f64::NAN; c]; r]);
        cell[row][col] = value;
    }

    pub fn get(&self, agent: &str, panel: &str) -> Option<&Vec<Vec<f64>>> {
        self.cells.get(&(agent.to_string(), panel.to_string()))
    }
}

/// How often a partially observing expert agrees with the oracle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgreementRow {
    pub hidden: usize,
    pub mean: f64,
    pub min: f64,
    pub max: f64,
}

#[derive(Debug, Serialize)]
pub struct Manifest {
    pub run_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub study: String,
    pub environment: String,
    pub trials: usize,
    pub runs: usize,
    pub config: AppConfig,
}

/// Writes results under `<output_dir>/<env>/<study>/<trials>_trials_<runs>_runs/`.
#[derive(Debug, Clone)]
pub struct ResultsWriter {
    dir: PathBuf,
    environment: String,
    study: String,
    trials: usize,
    runs: usize,
}

impl ResultsWriter {
    pub fn new(output_dir: impl AsRef<Path>, environment: &str, study: &str, trials: usize, runs: usize) -> Self {
        let dir = output_dir
            .as_ref()
            .join(file_name(environment))
            .join(file_name(study))
            .join(format!("{}_trials_{}_runs", trials, runs));
        Self {
            dir,
            environment: environment.to_string(),
            study: study.to_string(),
            trials,
            runs,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn create(&self, sub: &str, name: &str) -> ClueResult<BufWriter<File>> {
        let dir = self.dir.join(sub);
        fs::create_dir_all(&dir)?;
        Ok(BufWriter::new(File::create(dir.join(format!("{}.csv", file_name(name))))?))
    }

    pub fn write_comparison(&self, results: &ComparisonResults) -> ClueResult<()> {
        for ((agent, panel), runs) in &results.rewards {
            let name = match panel {
                Some(p) => format!("{}_{}", agent, p),
                None => agent.clone(),
            };
            let mut out = self.create("rewards", &name)?;
            write_row(&mut out, [agent.clone(), panel.clone().unwrap_or_default()])?;
            for run in runs {
                write_row(&mut out, run.iter().map(|r| r.to_string()))?;
            }
            out.flush()?;
        }

        for ((agent, panel, expert), runs) in &results.rhos {
            let mut out = self.create("rhos", &format!("{}_{}_{}", agent, panel, expert))?;
            write_row(&mut out, [agent.clone(), panel.clone(), expert.clone()])?;
            for run in runs {
                write_row(&mut out, run.iter().map(|r| r.to_string()))?;
            }
            out.flush()?;
        }

        self.write_regret(&results.regret_table())?;
        info!(dir = %self.dir.display(), series = results.rewards.len(), "comparison results written");
        Ok(())
    }

    /// One file per panel (`none` when there are no panels).
    pub fn write_regret(&self, table: &RegretTable) -> ClueResult<()> {
        let panels: Vec<&str> = if table.panels.is_empty() {
            vec!["none"]
        } else {
            table.panels.iter().map(String::as_str).collect()
        };
        for panel in panels {
            let mut out = self.create("regret", panel)?;
            write_row(&mut out, ["agent", "mean_regret", "std_regret"].map(str::to_string))?;
            for row in table.for_panel(panel) {
                write_row(&mut out, [row.agent.clone(), row.mean.to_string(), row.std.to_string()])?;
            }
            out.flush()?;
        }
        Ok(())
    }

    /// One matrix per `(agent, panel)`, rows labelled with the row parameter.
    pub fn write_grid(&self, grid: &ParamGrid) -> ClueResult<()> {
        for ((agent, panel), cells) in &grid.cells {
            let mut out = self.create(&grid.name, &format!("{}_{}", agent, panel))?;
            let header = std::iter::once(format!("{}\\{}", grid.row_param, grid.col_param))
                .chain(grid.cols.iter().map(|c| c.to_string()));
            write_row(&mut out, header)?;
            for (value, row) in grid.rows.iter().zip(cells) {
                write_row(
                    &mut out,
                    std::iter::once(value.to_string()).chain(row.iter().map(|v| v.to_string())),
                )?;
            }
            out.flush()?;
        }
        Ok(())
    }

    pub fn write_agreement(&self, rows: &[AgreementRow]) -> ClueResult<()> {
        let mut out = self.create("agreement", "agreement")?;
        write_row(&mut out, ["hidden", "mean", "min", "max"].map(str::to_string))?;
        for row in rows {
            write_row(
                &mut out,
                [row.hidden.to_string(), row.mean.to_string(), row.min.to_string(), row.max.to_string()],
            )?;
        }
        out.flush()?;
        Ok(())
    }

    pub fn write_manifest(&self, config: &AppConfig) -> ClueResult<Manifest> {
        fs::create_dir_all(&self.dir)?;
        let manifest = Manifest {
            run_id: Uuid::new_v4(),
            created_at: Utc::now(),
            study: self.study.clone(),
            environment: self.environment.clone(),
            trials: self.trials,
            runs: self.runs,
            config: config.clone(),
        };
        let mut out = BufWriter::new(File::create(self.dir.join("manifest.json"))?);
        serde_json::to_writer_pretty(&mut out, &manifest)?;
        out.flush()?;
        Ok(manifest)
    }
}

/// Path-safe version of a label.
fn file_name(label: &str) -> String {
    label.replace(['/', '\\'], "_")
}

fn csv_field(field: &str) -> String {
    if field.contains([',', '"', '\n']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

fn write_row<W: Write>(out: &mut W, fields: impl IntoIterator<Item = String>) -> ClueResult<()> {
    let line: Vec<String> = fields.into_iter().map(|f| csv_field(&f)).collect();
    writeln!(out, "{}", line.join(","))?;
    Ok(())
}
