//! Schema normalization CLI
//!
//! Batch-normalizes schema directories, classifies recursion in normalized
//! schemas, and reports size statistics.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use log::error;
use schema_norm::{
    analyse_corpus, analyse_dir, analyse_recursion, detailed_stats, NormalizeOptions,
    RepositoryKind,
};

#[derive(Parser)]
#[command(name = "schema-norm")]
#[command(about = "Normalize distributed JSON Schemas and classify recursion")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Kind {
    /// Plain directory of schemas; failed fetches are errors.
    Normal,
    /// Corpus collected from a hosting service; retries with a raw query.
    Corpus,
    /// JSON-Schema-Test-Suite layout; localhost URLs map to a local dir.
    Testsuite,
}

impl std::fmt::Display for Kind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.to_possible_value()
            .expect("no skipped variants")
            .get_name()
            .fmt(f)
    }
}

impl From<Kind> for RepositoryKind {
    fn from(kind: Kind) -> Self {
        match kind {
            Kind::Normal => RepositoryKind::Normal,
            Kind::Corpus => RepositoryKind::Corpus,
            Kind::Testsuite => RepositoryKind::TestSuite,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Normalize every schema in a directory and classify recursion
    Normalize {
        /// Directory of schemas to normalize
        dir: PathBuf,

        /// Repository kind, selects the fetch fallback
        #[arg(long, value_enum, default_value_t = Kind::Normal)]
        kind: Kind,

        /// Allow references to files and URLs outside the schema
        #[arg(long)]
        allow_remote: bool,

        /// Corpus index file (`filename url` rows); required with --kind corpus
        #[arg(long, required_if_eq("kind", "corpus"))]
        fullpath: Option<PathBuf>,

        /// Directory backing http://localhost:1234/ for --kind testsuite
        #[arg(long)]
        testsuite_remotes: Option<PathBuf>,
    },

    /// Classify recursion in a directory of already-normalized schemas
    Recursion {
        /// Directory of normalized schemas
        dir: PathBuf,
    },

    /// Size and blow-up statistics over unnormalized vs normalized schemas
    Stats {
        /// Directory of unnormalized schemas
        unnormalized: PathBuf,

        /// Directory of their normalized counterparts
        normalized: PathBuf,
    },
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Normalize {
            dir,
            kind,
            allow_remote,
            fullpath,
            testsuite_remotes,
        } => {
            let mut options =
                NormalizeOptions::new(allow_remote).repository_kind(kind.into());
            if let Some(remotes) = testsuite_remotes {
                options = options.testsuite_remotes(remotes);
            }
            match fullpath {
                Some(fullpath) => analyse_corpus(&dir, &fullpath, &options),
                None => analyse_dir(&dir, &options),
            }
        }

        Commands::Recursion { dir } => analyse_recursion(&dir),

        Commands::Stats {
            unnormalized,
            normalized,
        } => {
            return match detailed_stats(&unnormalized, &normalized) {
                Ok(report) if report.has_findings() => ExitCode::from(1),
                Ok(_) => ExitCode::SUCCESS,
                Err(e) => {
                    error!("{}", e);
                    ExitCode::from(e.exit_code() as u8)
                }
            };
        }
    };

    match result {
        // Findings are distinct from errors so scripts can branch on them.
        Ok(summary) if summary.has_findings() => ExitCode::from(1),
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::from(e.exit_code() as u8)
        }
    }
}
