//! Batch analysis of schema directories: normalize every file, classify
//! recursion, and keep CSV bookkeeping.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use log::{error, info, warn};
use serde::Serialize;
use serde_json::Value;
use url::Url;

use crate::draft::validate_to_declared_draft;
use crate::error::NormalizeError;
use crate::normalizer::{NormalizeOptions, Normalizer};
use crate::recursion::{check_recursion, RecursionType};

/// Header of the per-file analysis report.
pub const REPORT_HEADER: &str = "name,recursiv,unguarded_recursiv,invalid_reference,illegal_draft";

/// One row of the analysis report. Flags render as `TRUE` or empty.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ReportRow {
    pub name: String,
    pub recursive: bool,
    pub unguarded_recursive: bool,
    pub invalid_reference: bool,
    pub illegal_draft: bool,
}

impl ReportRow {
    fn new(name: impl Into<String>) -> Self {
        ReportRow {
            name: name.into(),
            ..ReportRow::default()
        }
    }

    /// Render the row for the analysis CSV.
    pub fn csv_line(&self) -> String {
        let flag = |b: bool| if b { "TRUE" } else { "" };
        format!(
            "{},{},{},{},{}",
            self.name,
            flag(self.recursive),
            flag(self.unguarded_recursive),
            flag(self.invalid_reference),
            flag(self.illegal_draft)
        )
    }
}

/// Counters aggregated over one batch run.
#[derive(Debug, Default)]
pub struct AnalysisSummary {
    pub total: usize,
    pub recursive: usize,
    pub unguarded_recursive: usize,
    pub illegal_draft: usize,
    pub invalid_reference: usize,
}

impl AnalysisSummary {
    /// True when any schema was flagged (recursive, invalid reference, or
    /// illegal draft). The CLI surfaces this to scripting as exit code 1,
    /// distinct from schema (2) and IO (3) errors.
    pub fn has_findings(&self) -> bool {
        self.recursive > 0 || self.invalid_reference > 0 || self.illegal_draft > 0
    }

    pub fn log(&self) {
        info!("----------------------------------");
        info!("Total: {}", self.total);
        info!("Recursive: {}", self.recursive);
        info!("Thereof unguarded recursive: {}", self.unguarded_recursive);
        info!("Illegal draft: {}", self.illegal_draft);
        info!("Invalid reference: {}", self.invalid_reference);
    }
}

/// `<base>.json` → `<base>_Normalized.json`; `None` for other names.
pub fn normalized_file_name(name: &str) -> Option<String> {
    let base = name.strip_suffix(".json")?;
    Some(format!("{}_Normalized.json", base))
}

/// Write `document` pretty-printed to `path`.
pub fn write_pretty(path: &Path, document: &Value) -> Result<(), NormalizeError> {
    let pretty = serde_json::to_string_pretty(document)
        .map_err(|source| NormalizeError::InvalidJson { source })?;
    fs::write(path, pretty).map_err(|source| NormalizeError::WriteError {
        path: path.to_path_buf(),
        source,
    })
}

/// Normalize and classify every `.json` file in `dir`.
///
/// Normalized documents land in `Normalized_<dirname>/`, per-file results in
/// `analysis_<dirname>.csv`, both relative to the working directory. The
/// summary counters are logged and returned.
pub fn analyse_dir(
    dir: &Path,
    options: &NormalizeOptions,
) -> Result<AnalysisSummary, NormalizeError> {
    let (normalized_dir, report) = prepare_output(dir)?;

    let mut files: Vec<PathBuf> = fs::read_dir(dir)
        .map_err(|source| NormalizeError::ReadError {
            path: dir.to_path_buf(),
            source,
        })?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && p.extension().map(|e| e == "json").unwrap_or(false))
        .collect();
    files.sort();

    let mut summary = AnalysisSummary::default();
    for file in &files {
        let name = file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let row = process_schema(file, None, options, &normalized_dir, &name, &mut summary);
        append_line(&report, &row.csv_line())?;
        summary.total += 1;
    }

    summary.log();
    Ok(summary)
}

/// Normalize and classify one schema, filling counters as it goes. Used by
/// both the directory and the corpus driver; errors are demoted to report
/// flags or log lines so the batch continues.
pub(crate) fn process_schema(
    path: &Path,
    base_id: Option<Url>,
    options: &NormalizeOptions,
    normalized_dir: &Path,
    name: &str,
    summary: &mut AnalysisSummary,
) -> ReportRow {
    let mut row = ReportRow::new(name);

    let document = match fs::read_to_string(path)
        .map_err(|e| e.to_string())
        .and_then(|content| serde_json::from_str::<Value>(&content).map_err(|e| e.to_string()))
    {
        Ok(document) => document,
        Err(message) => {
            error!("{}: cannot be read - {}", name, message);
            row.illegal_draft = true;
            summary.illegal_draft += 1;
            return row;
        }
    };

    if let Err(e) = validate_to_declared_draft(&document) {
        warn!("{}: {}", name, e);
        row.illegal_draft = true;
        summary.illegal_draft += 1;
        return row;
    }

    let normalizer = match base_id {
        Some(id) => Normalizer::from_path_with_id(path, id, options),
        None => Normalizer::from_path(path, options),
    };
    let normalized = normalizer.and_then(Normalizer::normalize);

    let normalized = match normalized {
        Ok(normalized) => normalized,
        Err(e @ NormalizeError::InvalidReference { .. }) => {
            warn!("{}: {}", name, e);
            row.invalid_reference = true;
            summary.invalid_reference += 1;
            return row;
        }
        Err(e @ NormalizeError::DistributedSchema { .. }) => {
            warn!("{}: {}", name, e);
            return row;
        }
        Err(e) => {
            error!("{}: {}", name, e);
            return row;
        }
    };

    if let Some(out_name) = normalized_file_name(name) {
        if let Err(e) = write_pretty(&normalized_dir.join(out_name), &normalized) {
            error!("{}: {}", name, e);
        }
    }

    match check_recursion(&normalized) {
        Ok(RecursionType::None) => {}
        Ok(kind) => {
            row.recursive = true;
            summary.recursive += 1;
            if kind == RecursionType::Recursion {
                row.unguarded_recursive = true;
                summary.unguarded_recursive += 1;
            }
        }
        Err(e) => {
            error!("{}: Error occured during recursion analysis - {}", name, e);
        }
    }

    row
}

/// Classify already-normalized schemas in `dir`, writing
/// `recursion_<dirname>.csv` and logging a summary.
pub fn analyse_recursion(dir: &Path) -> Result<AnalysisSummary, NormalizeError> {
    if !dir.is_dir() {
        return Err(NormalizeError::FileNotFound {
            path: dir.to_path_buf(),
        });
    }
    let report = PathBuf::from(format!("recursion_{}.csv", dir_name(dir)));
    write_line(&report, REPORT_HEADER)?;

    let mut summary = AnalysisSummary::default();
    for file in json_files(dir)? {
        let name = file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let mut row = ReportRow::new(&name);

        match load_json(&file).and_then(|doc| {
            check_recursion(&doc).map_err(|e| NormalizeError::InvalidReference {
                id: name.clone(),
                message: e.to_string(),
            })
        }) {
            Ok(RecursionType::None) => {}
            Ok(kind) => {
                row.recursive = true;
                summary.recursive += 1;
                if kind == RecursionType::Recursion {
                    row.unguarded_recursive = true;
                    summary.unguarded_recursive += 1;
                }
            }
            Err(e) => {
                error!("{}: Error occured during recursion analysis - {}", name, e);
            }
        }
        append_line(&report, &row.csv_line())?;
        summary.total += 1;
    }

    summary.log();
    Ok(summary)
}

/// Average line counts and blow-up ratios of normalization, split by
/// single-file vs distributed schemas.
#[derive(Debug, Default)]
pub struct StatsReport {
    pub single_file_count: usize,
    pub distributed_count: usize,
    pub recursive_single_file: usize,
    pub recursive_distributed: usize,
    pub avg_lines_single_file: f64,
    pub avg_lines_single_file_normalized: f64,
    pub avg_lines_distributed: f64,
    pub avg_lines_distributed_normalized: f64,
}

impl StatsReport {
    /// True when any examined schema is recursive; maps to exit code 1.
    pub fn has_findings(&self) -> bool {
        self.recursive_single_file > 0 || self.recursive_distributed > 0
    }

    fn blow_up(base: f64, value: f64) -> f64 {
        if base == 0.0 {
            0.0
        } else {
            value / base - 1.0
        }
    }

    pub fn log(&self) {
        info!("Total single-file-schemas: {}", self.single_file_count);
        info!("Single-file-schemas recursive: {}", self.recursive_single_file);
        info!("Avg LoC single-file-schemas: {:.1}", self.avg_lines_single_file);
        info!(
            "Avg LoC single-file-schemas normalized: {:.1}",
            self.avg_lines_single_file_normalized
        );
        info!(
            "BlowUp single-file-schemas: {:.3}",
            Self::blow_up(self.avg_lines_single_file, self.avg_lines_single_file_normalized)
        );
        info!("----------------------------------");
        info!("Total distributed-schemas: {}", self.distributed_count);
        info!("Distributed-schemas recursive: {}", self.recursive_distributed);
        info!("Avg LoC distributed-schemas: {:.1}", self.avg_lines_distributed);
        info!(
            "Avg LoC distributed-schemas normalized: {:.1}",
            self.avg_lines_distributed_normalized
        );
        info!(
            "BlowUp distributed-schemas: {:.3}",
            Self::blow_up(self.avg_lines_distributed, self.avg_lines_distributed_normalized)
        );
    }
}

/// Compare unnormalized and normalized directories: classify each schema as
/// single-file or distributed (a re-normalization without remote loading
/// fails with `DistributedSchema` for the latter), record the classification
/// in `schemaTypes.csv`, and aggregate size statistics.
pub fn detailed_stats(
    unnormalized_dir: &Path,
    normalized_dir: &Path,
) -> Result<StatsReport, NormalizeError> {
    if !unnormalized_dir.is_dir() || !normalized_dir.is_dir() {
        return Err(NormalizeError::FileNotFound {
            path: if unnormalized_dir.is_dir() {
                normalized_dir.to_path_buf()
            } else {
                unnormalized_dir.to_path_buf()
            },
        });
    }

    let types_csv = PathBuf::from("schemaTypes.csv");
    write_line(&types_csv, "name,distributed")?;

    let offline = NormalizeOptions::new(false);
    let mut report = StatsReport::default();
    let mut lines_single = 0usize;
    let mut lines_single_norm = 0usize;
    let mut lines_distributed = 0usize;
    let mut lines_distributed_norm = 0usize;

    for normalized_file in json_files(normalized_dir)? {
        let normalized_name = normalized_file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let name = normalized_name.replace("_Normalized", "");
        let unnormalized_file = unnormalized_dir.join(&name);
        if !unnormalized_file.exists() {
            warn!("{}: no unnormalized counterpart", normalized_name);
            continue;
        }

        let distributed = match Normalizer::from_path(&unnormalized_file, &offline)
            .and_then(Normalizer::normalize)
        {
            Ok(_) => false,
            Err(NormalizeError::DistributedSchema { .. }) => true,
            Err(e) => {
                warn!("{}: {}", name, e);
                continue;
            }
        };
        append_line(
            &types_csv,
            &format!("{},{}", name, if distributed { "TRUE" } else { "" }),
        )?;

        let normalized_doc = load_json(&normalized_file)?;
        let recursive = matches!(
            check_recursion(&normalized_doc),
            Ok(RecursionType::Guarded) | Ok(RecursionType::Recursion)
        );

        let lines = count_rows_json(&unnormalized_file)?;
        let lines_norm = count_rows_json(&normalized_file)?;
        if distributed {
            report.distributed_count += 1;
            lines_distributed += lines;
            lines_distributed_norm += lines_norm;
            if recursive {
                report.recursive_distributed += 1;
            }
        } else {
            report.single_file_count += 1;
            lines_single += lines;
            lines_single_norm += lines_norm;
            if recursive {
                report.recursive_single_file += 1;
            }
        }
    }

    let avg = |total: usize, count: usize| {
        if count == 0 {
            0.0
        } else {
            total as f64 / count as f64
        }
    };
    report.avg_lines_single_file = avg(lines_single, report.single_file_count);
    report.avg_lines_single_file_normalized = avg(lines_single_norm, report.single_file_count);
    report.avg_lines_distributed = avg(lines_distributed, report.distributed_count);
    report.avg_lines_distributed_normalized =
        avg(lines_distributed_norm, report.distributed_count);

    report.log();
    Ok(report)
}

/// Line count of `path` when pretty-printed, the size measure used by the
/// statistics mode.
pub fn count_rows_json(path: &Path) -> Result<usize, NormalizeError> {
    let document = load_json(path)?;
    let pretty = serde_json::to_string_pretty(&document)
        .map_err(|source| NormalizeError::InvalidJson { source })?;
    Ok(pretty.lines().count())
}

pub(crate) fn prepare_output(dir: &Path) -> Result<(PathBuf, PathBuf), NormalizeError> {
    if !dir.is_dir() {
        return Err(NormalizeError::FileNotFound {
            path: dir.to_path_buf(),
        });
    }
    let normalized_dir = PathBuf::from(format!("Normalized_{}", dir_name(dir)));
    fs::create_dir_all(&normalized_dir).map_err(|source| NormalizeError::WriteError {
        path: normalized_dir.clone(),
        source,
    })?;

    let report = PathBuf::from(format!("analysis_{}.csv", dir_name(dir)));
    write_line(&report, REPORT_HEADER)?;
    Ok((normalized_dir, report))
}

fn dir_name(dir: &Path) -> String {
    dir.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "dir".to_string())
}

fn json_files(dir: &Path) -> Result<Vec<PathBuf>, NormalizeError> {
    let mut files: Vec<PathBuf> = walkdir::WalkDir::new(dir)
        .max_depth(1)
        .into_iter()
        .filter_map(Result::ok)
        .map(|e| e.into_path())
        .filter(|p| p.is_file() && p.extension().map(|e| e == "json").unwrap_or(false))
        .collect();
    files.sort();
    Ok(files)
}

fn load_json(path: &Path) -> Result<Value, NormalizeError> {
    let content = fs::read_to_string(path).map_err(|source| NormalizeError::ReadError {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&content).map_err(|source| NormalizeError::InvalidJson { source })
}

fn write_line(path: &Path, line: &str) -> Result<(), NormalizeError> {
    fs::write(path, format!("{}\n", line)).map_err(|source| NormalizeError::WriteError {
        path: path.to_path_buf(),
        source,
    })
}

pub(crate) fn append_line(path: &Path, line: &str) -> Result<(), NormalizeError> {
    let mut file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|source| NormalizeError::WriteError {
            path: path.to_path_buf(),
            source,
        })?;
    writeln!(file, "{}", line).map_err(|source| NormalizeError::WriteError {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalized_name_replaces_suffix() {
        assert_eq!(
            normalized_file_name("schema.json").as_deref(),
            Some("schema_Normalized.json")
        );
        assert_eq!(normalized_file_name("schema.yaml"), None);
    }

    #[test]
    fn normalized_name_uses_last_occurrence() {
        assert_eq!(
            normalized_file_name("a.json.json").as_deref(),
            Some("a.json_Normalized.json")
        );
    }

    #[test]
    fn report_row_renders_flags() {
        let mut row = ReportRow::new("a.json");
        assert_eq!(row.csv_line(), "a.json,,,,");

        row.recursive = true;
        row.unguarded_recursive = true;
        assert_eq!(row.csv_line(), "a.json,TRUE,TRUE,,");

        let mut row = ReportRow::new("b.json");
        row.illegal_draft = true;
        assert_eq!(row.csv_line(), "b.json,,,,TRUE");
    }
}
