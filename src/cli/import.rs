use std::io::IsTerminal;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use colored::Colorize;
use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use crossterm::terminal;
use dialoguer::{Confirm, Input, Select};
use rusqlite::Connection;

use crate::cli::preview::{
    print_batch, print_finding, print_findings, print_outcome, print_row, print_summary,
};
use crate::cli::{open_db, read_input};
use crate::derivation::TxTypeRules;
use crate::error::{EstateError, Result};
use crate::importer::{
    compute_checksum, finish_import_log, previously_imported, start_import_log, AssetStore,
    CancelToken, ImportKind, KindRules, SaleStore,
};
use crate::models::{ImportOutcome, ParsedBatch, Severity};
use crate::reviewer::{ReviewSession, Stage};
use crate::settings::{load_settings, Settings};

type Session = ReviewSession<KindRules>;

const ACTIONS: &[&str] = &[
    "Edit a row",
    "Re-validate all rows",
    "Import",
    "Load another file",
    "Quit",
];

/// Where the current batch came from, for the import log.
struct Source {
    name: String,
    checksum: String,
}

pub fn run(file: &str, kind: &str, yes: bool) -> Result<()> {
    let kind = ImportKind::from_key(kind)?;
    let settings = load_settings();
    let conn = open_db()?;
    let mut session = ReviewSession::new(kind.rules(&settings));
    let mut source = load(&conn, &mut session, kind, &settings, file)?;

    if yes || !std::io::stdin().is_terminal() {
        let batch = loaded_batch(&session)?;
        print_batch(batch);
        print_findings(batch);
        print_summary(batch);
        session.confirm()?;
        if !yes {
            println!("Re-run with --yes to import without review.");
            return Ok(());
        }
        return execute(&conn, &mut session, kind, &settings, &source);
    }

    review(&conn, &mut session, kind, &settings, &mut source)
}

fn loaded_batch(session: &Session) -> Result<&ParsedBatch> {
    session
        .batch()
        .ok_or_else(|| EstateError::Other("No batch loaded".into()))
}

fn load(
    conn: &Connection,
    session: &mut Session,
    kind: ImportKind,
    settings: &Settings,
    file: &str,
) -> Result<Source> {
    let text = read_input(file)?;
    let checksum = compute_checksum(&text);
    if previously_imported(conn, kind.key(), &checksum)? {
        println!(
            "{}",
            "This input has been imported before; rows already stored will be skipped.".yellow()
        );
    }
    session.submit(&text, |t| kind.parse(t, settings))?;
    let name = if file == "-" { "stdin" } else { file };
    Ok(Source {
        name: name.to_string(),
        checksum,
    })
}

fn review(
    conn: &Connection,
    session: &mut Session,
    kind: ImportKind,
    settings: &Settings,
    source: &mut Source,
) -> Result<()> {
    loop {
        if session.stage() == Stage::Upload {
            let path: String = Input::new()
                .with_prompt("File to load (Enter to quit)")
                .allow_empty(true)
                .interact_text()?;
            if path.trim().is_empty() {
                return Ok(());
            }
            match load(conn, session, kind, settings, path.trim()) {
                Ok(s) => *source = s,
                Err(e) => println!("{}", e.to_string().red()),
            }
            continue;
        }

        let batch = loaded_batch(session)?;
        print_batch(batch);
        print_findings(batch);
        print_summary(batch);
        if session.has_edits() {
            println!("{}", "Rows were edited: re-validate before importing.".yellow());
        }

        let default = if batch.summary.error_count > 0 {
            0
        } else if session.has_edits() {
            1
        } else {
            2
        };
        let choice = Select::new()
            .with_prompt("What next?")
            .items(ACTIONS)
            .default(default)
            .interact()?;

        match choice {
            0 => edit_row(session)?,
            1 => {
                session.revalidate_all()?;
            }
            2 => {
                if let Err(e) = session.confirm() {
                    println!("{}", e.to_string().red());
                    continue;
                }
                let count = session.batch().map_or(0, |b| b.rows.len());
                let go = Confirm::new()
                    .with_prompt(format!("Import {count} {} row(s)?", kind.key()))
                    .default(true)
                    .interact()?;
                if !go {
                    session.back_to_preview()?;
                    continue;
                }
                return execute(conn, session, kind, settings, source);
            }
            3 => session.reset(),
            _ => {
                println!("{}", "Nothing imported.".yellow());
                return Ok(());
            }
        }
    }
}

fn edit_row(session: &mut Session) -> Result<()> {
    let batch = loaded_batch(session)?;
    let total = batch.rows.len();
    if batch.is_empty() {
        println!("No rows to edit.");
        return Ok(());
    }
    let suggested = batch
        .findings
        .iter()
        .find(|f| f.severity == Severity::Error)
        .or(batch.findings.first())
        .map_or(1, |f| f.row);

    let row_no: usize = Input::new()
        .with_prompt(format!("Row # (1-{total})"))
        .default(suggested)
        .interact_text()?;
    if row_no == 0 || row_no > total {
        println!("{}", format!("No row {row_no}.").red());
        return Ok(());
    }
    let index = row_no - 1;
    session.start_edit(index)?;

    while session.editing_row() == Some(index) {
        let batch = loaded_batch(session)?;
        let draft = session
            .draft(index)
            .ok_or_else(|| EstateError::Other(format!("Row {row_no} is not being edited")))?;
        print_row(batch, draft, row_no);

        let mut fields = batch.headers.clone();
        for f in batch.findings_for(row_no) {
            if !fields.contains(&f.field) {
                fields.push(f.field.clone());
            }
        }
        let mut items: Vec<String> = fields
            .iter()
            .map(|f| format!("{f}: {}", draft.get(f)))
            .collect();
        items.push("Save".to_string());
        items.push("Discard changes".to_string());

        let choice = Select::new()
            .with_prompt("Field to change")
            .items(&items)
            .default(0)
            .interact()?;

        if choice == fields.len() {
            let batch = session.save_edit(index)?;
            let mut clean = true;
            for f in batch.findings_for(row_no) {
                print_finding(f);
                clean = false;
            }
            if clean {
                println!("{}", format!("Row {row_no} saved.").green());
            }
        } else if choice > fields.len() {
            session.cancel_edit(index);
            println!("Changes to row {row_no} discarded.");
        } else {
            let field = &fields[choice];
            let current = draft.get(field).to_string();
            let value: String = Input::new()
                .with_prompt(field.as_str())
                .with_initial_text(current)
                .allow_empty(true)
                .interact_text()?;
            session.update_field(index, field, value.trim())?;
        }
    }
    Ok(())
}

fn execute(
    conn: &Connection,
    session: &mut Session,
    kind: ImportKind,
    settings: &Settings,
    source: &Source,
) -> Result<()> {
    let batch = loaded_batch(session)?;
    let import_id = start_import_log(conn, kind.key(), &source.name, batch, &source.checksum)?;
    let rules = TxTypeRules::for_format(batch.format);
    let cancel = CancelToken::new();

    let outcome: ImportOutcome = {
        let _watcher = CancelWatcher::spawn(&cancel);
        match kind {
            ImportKind::Sales => {
                let store = SaleStore {
                    conn,
                    rules,
                    bulk_unit_price: settings.bulk_unit_price,
                    import_id: Some(import_id),
                };
                session.import(&store, &cancel)?.clone()
            }
            ImportKind::Assets => {
                let store = AssetStore {
                    conn,
                    import_id: Some(import_id),
                };
                session.import(&store, &cancel)?.clone()
            }
        }
    };

    finish_import_log(conn, import_id, &outcome)?;
    print_outcome(&outcome);
    Ok(())
}

/// Raises the cancel token when Esc, `q` or Ctrl-C is pressed while an import
/// runs. Only active on an interactive terminal; raw mode is restored on drop.
struct CancelWatcher {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl CancelWatcher {
    fn spawn(token: &CancelToken) -> Option<Self> {
        if !std::io::stdin().is_terminal() || !std::io::stdout().is_terminal() {
            return None;
        }
        println!("Importing... press Esc or q to cancel.");
        terminal::enable_raw_mode().ok()?;

        let stop = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&stop);
        let token = token.clone();
        let handle = std::thread::spawn(move || {
            while !flag.load(Ordering::SeqCst) {
                if !matches!(event::poll(Duration::from_millis(100)), Ok(true)) {
                    continue;
                }
                let Ok(Event::Key(key)) = event::read() else {
                    continue;
                };
                if key.kind != KeyEventKind::Press {
                    continue;
                }
                let ctrl_c = key.modifiers.contains(KeyModifiers::CONTROL)
                    && key.code == KeyCode::Char('c');
                if ctrl_c || matches!(key.code, KeyCode::Esc | KeyCode::Char('q')) {
                    tracing::info!("cancel requested");
                    token.cancel();
                }
            }
        });
        Some(Self {
            stop,
            handle: Some(handle),
        })
    }
}

impl Drop for CancelWatcher {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
        let _ = terminal::disable_raw_mode();
    }
}
