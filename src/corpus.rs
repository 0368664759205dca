//! Analysis of a schema corpus indexed by a `repos_fullpath` file.
//!
//! Each index row is `filename url`, space-separated. A `deleted` sentinel
//! in the URL column marks entries removed from the corpus. The URL becomes
//! the schema's base identifier, so relative refs resolve against the
//! hosting location rather than the local file.

use std::fs;
use std::path::Path;

use log::warn;

use crate::analysis::{append_line, prepare_output, process_schema, AnalysisSummary, ReportRow};
use crate::error::NormalizeError;
use crate::normalizer::NormalizeOptions;
use crate::uri_util::to_uri;

/// Sentinel marking a removed corpus entry.
const DELETED: &str = "deleted";

/// Normalize and classify every live corpus entry.
///
/// Output files follow [`analyse_dir`](crate::analysis::analyse_dir):
/// `Normalized_<dirname>/` and `analysis_<dirname>.csv`.
pub fn analyse_corpus(
    corpus_dir: &Path,
    fullpath: &Path,
    options: &NormalizeOptions,
) -> Result<AnalysisSummary, NormalizeError> {
    let (normalized_dir, report) = prepare_output(corpus_dir)?;

    let index = fs::read_to_string(fullpath).map_err(|source| NormalizeError::ReadError {
        path: fullpath.to_path_buf(),
        source,
    })?;

    let mut summary = AnalysisSummary::default();
    for line in index.lines() {
        let mut columns = line.split_whitespace();
        let (Some(name), Some(url)) = (columns.next(), columns.next()) else {
            continue;
        };
        if url == DELETED {
            continue;
        }

        // Columns are whitespace-delimited, so index URLs must already be
        // percent-corrected.
        let id = match to_uri(url) {
            Ok(id) => id,
            Err(e) => {
                warn!("{}: {}", name, e);
                continue;
            }
        };

        let file = corpus_dir.join(name);
        let row = if file.exists() {
            process_schema(&file, Some(id), options, &normalized_dir, name, &mut summary)
        } else {
            ReportRow {
                name: name.to_string(),
                ..ReportRow::default()
            }
        };
        append_line(&report, &row.csv_line())?;
        summary.total += 1;
    }

    summary.log();
    Ok(summary)
}

