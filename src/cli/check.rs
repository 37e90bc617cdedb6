use crate::cli::preview::{print_batch, print_findings, print_summary};
use crate::cli::read_input;
use crate::error::{EstateError, Result};
use crate::importer::ImportKind;
use crate::reviewer::ReviewSession;
use crate::settings::load_settings;

/// Parse and validate `file` without touching the database. Fails when any
/// row has an error finding.
pub fn run(file: &str, kind: &str, json: bool) -> Result<()> {
    let kind = ImportKind::from_key(kind)?;
    let text = read_input(file)?;

    let settings = load_settings();
    let mut session = ReviewSession::new(kind.rules(&settings));
    let batch = session.submit(&text, |t| kind.parse(t, &settings))?;

    if json {
        println!("{}", serde_json::to_string_pretty(batch)?);
    } else {
        print_batch(batch);
        print_findings(batch);
        print_summary(batch);
    }

    if batch.summary.error_count > 0 {
        return Err(EstateError::ImportBlocked(batch.summary.error_count));
    }
    Ok(())
}
