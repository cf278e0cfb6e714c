//! One validation run: discover files, validate, report, pick the exit code.

use std::io::Write;

use anyhow::{Context, Result};
use kval_manifest::{FilesErrors, ManifestValidator};
use kval_schema::ValidatorFactory;
use tracing::{debug, info};

use crate::args::OutputFormat;
use crate::chain::build_source;
use crate::config::Settings;
use crate::discover::find_files;

/// Every file passed.
pub const EXIT_OK: u8 = 0;
/// At least one document failed validation.
pub const EXIT_INVALID: u8 = 1;
/// The run could not be carried out.
pub const EXIT_ERROR: u8 = 2;

/// Validate everything `settings` names, writing the report to `out` and
/// error messages to `err`. Returns the process exit code.
pub fn run(settings: &Settings, out: &mut impl Write, err: &mut impl Write) -> Result<u8> {
    let factory = ValidatorFactory::new(build_source(settings))
        .context("failed to set up schema sources")?;
    let validator = ManifestValidator::new(&factory);

    let files = find_files(&settings.manifests)?;
    debug!(count = files.len(), "discovered manifest files");

    let mut report = FilesErrors::new();
    for path in &files {
        report.insert(path.display().to_string(), validator.validate_file(path));
    }

    match settings.output {
        OutputFormat::Human => report.render_human(out, err, settings.color),
        OutputFormat::Json => report.render_json(out),
    }
    .context("failed to write report")?;

    let summary = report.summary();
    info!(
        files = summary.files,
        documents = summary.documents,
        passed = summary.passed,
        failed = summary.failed,
        skipped = summary.skipped,
        "validation finished"
    );

    Ok(if report.has_error() { EXIT_INVALID } else { EXIT_OK })
}
