use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};

use crate::calibration::CalibrationMethod;
use crate::gbdt::GbdtParams;
use crate::match_store::{self, MatchFilter};
use crate::rolling_form::{DEFAULT_WINDOW, FormConfig};

const DEFAULT_VAL_FRACTION: f64 = 0.15;
const DEFAULT_TEST_FRACTION: f64 = 0.15;
const DEFAULT_SEED: u64 = 42;
const DEFAULT_TRIALS: usize = 20;

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub db_path: PathBuf,
    pub form: FormConfig,
    pub filter: MatchFilter,
    pub val_fraction: f64,
    pub test_fraction: f64,
    /// `None` disables calibration.
    pub calibration: Option<CalibrationMethod>,
    pub seed: u64,
    pub trials: usize,
    pub model_out: Option<PathBuf>,
    pub export_out: Option<PathBuf>,
    pub gbdt: GbdtParams,
}

impl PipelineConfig {
    /// Loads `.env.local` / `.env`, then reads the process environment and arguments.
    pub fn load() -> Result<Self> {
        let _ = dotenvy::from_filename(".env.local");
        let _ = dotenvy::from_filename(".env");
        let args = std::env::args().skip(1).collect::<Vec<_>>();
        Self::resolve(|key| std::env::var(key).ok(), &args)
    }

    /// Defaults, overridden by `env`, overridden by `args`.
    pub fn resolve(env: impl Fn(&str) -> Option<String>, args: &[String]) -> Result<Self> {
        let lookup = |flag: &str, key: &str| -> Option<String> {
            arg_value(args, flag)
                .or_else(|| env(key))
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let db_path = match lookup("--db", "PREDICTIQ_DB") {
            Some(p) => PathBuf::from(p),
            None => match_store::default_db_path().context("unable to resolve database path")?,
        };

        let window = parse_or(lookup("--window", "PREDICTIQ_WINDOW"), DEFAULT_WINDOW as i64, "window")?;
        let form = FormConfig::new(window)?;

        let league_ids = match lookup("--league-ids", "PREDICTIQ_LEAGUE_IDS") {
            Some(raw) => parse_ids(&raw)?,
            None => Vec::new(),
        };
        let seasons = lookup("--seasons", "PREDICTIQ_SEASONS")
            .map(|raw| {
                raw.split([',', ';'])
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();

        let val_fraction = parse_or(
            lookup("--val-fraction", "PREDICTIQ_VAL_FRACTION"),
            DEFAULT_VAL_FRACTION,
            "val-fraction",
        )?;
        let test_fraction = parse_or(
            lookup("--test-fraction", "PREDICTIQ_TEST_FRACTION"),
            DEFAULT_TEST_FRACTION,
            "test-fraction",
        )?;
        let fraction_ok = |f: f64| f > 0.0 && f < 0.5;
        if !fraction_ok(val_fraction) || !fraction_ok(test_fraction) || val_fraction + test_fraction >= 0.9 {
            return Err(anyhow!(
                "split fractions must each be in (0, 0.5) and sum below 0.9 (val={val_fraction}, test={test_fraction})"
            ));
        }

        let calibration = match lookup("--calibration", "PREDICTIQ_CALIBRATION") {
            None => Some(CalibrationMethod::Isotonic),
            Some(raw) if raw.eq_ignore_ascii_case("none") => None,
            Some(raw) => Some(raw.parse::<CalibrationMethod>().map_err(|e| anyhow!(e))?),
        };

        let seed = parse_or(lookup("--seed", "PREDICTIQ_SEED"), DEFAULT_SEED, "seed")?;
        let trials = parse_or(lookup("--trials", "PREDICTIQ_TRIALS"), DEFAULT_TRIALS, "trials")?;
        if trials == 0 {
            return Err(anyhow!("trials must be at least 1"));
        }

        let mut gbdt = GbdtParams {
            seed,
            ..GbdtParams::default()
        };
        gbdt.n_estimators = parse_or(
            lookup("--n-estimators", "PREDICTIQ_N_ESTIMATORS"),
            gbdt.n_estimators,
            "n-estimators",
        )?;
        gbdt.max_depth = parse_or(
            lookup("--max-depth", "PREDICTIQ_MAX_DEPTH"),
            gbdt.max_depth,
            "max-depth",
        )?;
        gbdt.learning_rate = parse_or(
            lookup("--learning-rate", "PREDICTIQ_LEARNING_RATE"),
            gbdt.learning_rate,
            "learning-rate",
        )?;
        gbdt.validate()?;

        Ok(Self {
            db_path,
            form,
            filter: MatchFilter {
                league_ids,
                seasons,
            },
            val_fraction,
            test_fraction,
            calibration,
            seed,
            trials,
            model_out: lookup("--model-out", "PREDICTIQ_MODEL_OUT").map(PathBuf::from),
            export_out: lookup("--out", "PREDICTIQ_EXPORT_OUT").map(PathBuf::from),
            gbdt,
        })
    }
}

/// `--name=value` or `--name value`.
pub fn arg_value(args: &[String], name: &str) -> Option<String> {
    for (idx, arg) in args.iter().enumerate() {
        if let Some(raw) = arg.strip_prefix(name).and_then(|rest| rest.strip_prefix('=')) {
            return Some(raw.to_string());
        }
        if arg == name
            && let Some(next) = args.get(idx + 1)
        {
            return Some(next.clone());
        }
    }
    None
}

pub fn has_flag(args: &[String], name: &str) -> bool {
    args.iter().any(|arg| arg == name)
}

fn parse_or<T: std::str::FromStr>(raw: Option<String>, default: T, name: &str) -> Result<T> {
    match raw {
        None => Ok(default),
        Some(v) => v
            .parse::<T>()
            .map_err(|_| anyhow!("invalid value for {name}: {v:?}")),
    }
}

fn parse_ids(raw: &str) -> Result<Vec<u32>> {
    let mut out = Vec::new();
    for part in raw.split([',', ';', ' ']) {
        let trimmed = part.trim();
        if trimmed.is_empty() {
            continue;
        }
        let id = trimmed
            .parse::<u32>()
            .with_context(|| format!("invalid league id {trimmed:?}"))?;
        if !out.contains(&id) {
            out.push(id);
        }
    }
    Ok(out)
}
