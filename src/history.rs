use crate::config::Config;
use crate::report::DiagnosisReport;
use anyhow::{Context, Result};
use directories::ProjectDirs;
use std::path::{Path, PathBuf};

const HISTORY_FILE: &str = "history.bin";

/// Configured history directory, or the platform data directory.
pub fn history_dir(cfg: &Config) -> Result<PathBuf> {
    if let Some(dir) = &cfg.history_dir {
        return Ok(dir.clone());
    }
    let dirs = ProjectDirs::from("org", "dermscan", "dermscan")
        .context("no home directory to keep report history in")?;
    Ok(dirs.data_dir().to_path_buf())
}

pub fn load_reports(dir: &Path) -> Result<Vec<DiagnosisReport>> {
    let file = dir.join(HISTORY_FILE);

    if !file.exists() {
        return Ok(vec![]);
    }

    let data = std::fs::read(&file).with_context(|| format!("reading {}", file.display()))?;
    postcard::from_bytes(&data).with_context(|| format!("decoding {}", file.display()))
}

pub fn append_report(dir: &Path, report: DiagnosisReport) -> Result<()> {
    std::fs::create_dir_all(dir)?;
    let mut reports = load_reports(dir)?;
    reports.push(report);
    let file = dir.join(HISTORY_FILE);
    let data = postcard::to_allocvec(&reports)?;
    std::fs::write(&file, data).with_context(|| format!("writing {}", file.display()))?;
    Ok(())
}

pub fn purge(dir: &Path) -> Result<()> {
    let file = dir.join(HISTORY_FILE);
    if file.exists() {
        std::fs::remove_file(&file).with_context(|| format!("removing {}", file.display()))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::Prediction;

    #[test]
    fn test_append_load_purge() {
        let dir = std::env::temp_dir().join(format!("dermscan-history-{}", uuid::Uuid::new_v4()));
        assert!(load_reports(&dir).unwrap().is_empty());

        let report = DiagnosisReport::from_predictions(
            vec![Prediction {
                name: "Acne".into(),
                confidence: 0.8,
                icd: Some("L70".into()),
                url: None,
            }],
            None,
        );
        append_report(&dir, report.clone()).unwrap();
        append_report(&dir, report.clone()).unwrap();

        let loaded = load_reports(&dir).unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0], report);

        purge(&dir).unwrap();
        assert!(load_reports(&dir).unwrap().is_empty());
        std::fs::remove_dir_all(&dir).ok();
    }
}
