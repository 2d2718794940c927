//! Writes run artifacts: the final report and the world snapshot.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::info;

use crate::core::report::FinalReport;
use crate::core::world::WorldState;

pub const REPORT_FILE: &str = "report.json";
pub const WORLD_FILE: &str = "world.json";

/// Paths of the artifacts written for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunArtifacts {
    pub report: PathBuf,
    pub world: PathBuf,
}

pub fn write_run_artifacts(
    out_dir: &Path,
    report: &FinalReport,
    state: &WorldState,
) -> Result<RunArtifacts> {
    fs::create_dir_all(out_dir)
        .with_context(|| format!("create output dir {}", out_dir.display()))?;
    let artifacts = RunArtifacts {
        report: out_dir.join(REPORT_FILE),
        world: out_dir.join(WORLD_FILE),
    };
    write_json(&artifacts.report, report)?;
    write_json(&artifacts.world, state)?;
    info!(dir = %out_dir.display(), "run artifacts written");
    Ok(artifacts)
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let mut buf = serde_json::to_string_pretty(value)
        .with_context(|| format!("serialize {}", path.display()))?;
    buf.push('\n');
    fs::write(path, buf).with_context(|| format!("write {}", path.display()))
}
