//! Operator review of a parsed batch: edit flagged rows in a side overlay,
//! save them back one at a time, re-validate, then hand off to the importer.

use std::collections::HashMap;
use std::fmt;

use crate::error::{EstateError, Result};
use crate::importer::{run_import, CancelToken, ImportTarget};
use crate::models::{ImportOutcome, ParsedBatch, RowRecord};
use crate::validator::{summarize, validate_rows, RowRules};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Upload,
    Validating,
    Preview,
    Confirming,
    Complete,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Upload => "waiting for input",
            Self::Validating => "validating",
            Self::Preview => "previewing",
            Self::Confirming => "confirming",
            Self::Complete => "complete",
        };
        f.write_str(s)
    }
}

pub struct ReviewSession<R: RowRules> {
    rules: R,
    stage: Stage,
    batch: Option<ParsedBatch>,
    overlay: HashMap<usize, RowRecord>,
    editing_row: Option<usize>,
    has_edits: bool,
    outcome: Option<ImportOutcome>,
}

impl<R: RowRules> ReviewSession<R> {
    pub fn new(rules: R) -> Self {
        Self {
            rules,
            stage: Stage::Upload,
            batch: None,
            overlay: HashMap::new(),
            editing_row: None,
            has_edits: false,
            outcome: None,
        }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn batch(&self) -> Option<&ParsedBatch> {
        self.batch.as_ref()
    }

    pub fn editing_row(&self) -> Option<usize> {
        self.editing_row
    }

    pub fn has_edits(&self) -> bool {
        self.has_edits
    }

    pub fn outcome(&self) -> Option<&ImportOutcome> {
        self.outcome.as_ref()
    }

    /// The pending edit for `index`, if one is open.
    pub fn draft(&self, index: usize) -> Option<&RowRecord> {
        self.overlay.get(&index)
    }

    fn expect_stage(&self, allowed: &[Stage], action: &'static str) -> Result<()> {
        if allowed.contains(&self.stage) {
            Ok(())
        } else {
            Err(EstateError::InvalidStage {
                action,
                stage: self.stage.to_string(),
            })
        }
    }

    fn batch_mut(&mut self) -> Result<&mut ParsedBatch> {
        self.batch
            .as_mut()
            .ok_or_else(|| EstateError::Other("No batch loaded".into()))
    }

    fn check_index(&self, index: usize) -> Result<()> {
        match &self.batch {
            Some(b) if index < b.rows.len() => Ok(()),
            _ => Err(EstateError::RowOutOfRange(index + 1)),
        }
    }

    /// Parse and validate fresh input, replacing any previous batch. A parse
    /// failure leaves the session waiting for new input.
    pub fn submit<P>(&mut self, text: &str, parse: P) -> Result<&ParsedBatch>
    where
        P: FnOnce(&str) -> Result<ParsedBatch>,
    {
        self.expect_stage(&[Stage::Upload, Stage::Preview, Stage::Complete], "submit input")?;
        self.reset();
        self.stage = Stage::Validating;
        let mut batch = match parse(text) {
            Ok(b) => b,
            Err(e) => {
                self.stage = Stage::Upload;
                return Err(e);
            }
        };
        let (findings, summary) = validate_rows(&batch.rows, &self.rules);
        batch.findings = findings;
        batch.summary = summary;
        self.stage = Stage::Preview;
        Ok(&*self.batch.insert(batch))
    }

    /// Drop the batch and go back to waiting for input.
    pub fn reset(&mut self) {
        self.batch = None;
        self.overlay.clear();
        self.editing_row = None;
        self.has_edits = false;
        self.outcome = None;
        self.stage = Stage::Upload;
    }

    /// Open `index` for editing. Only one row is edited at a time: opening
    /// another row moves the edit target there.
    pub fn start_edit(&mut self, index: usize) -> Result<()> {
        self.expect_stage(&[Stage::Preview], "edit a row")?;
        self.check_index(index)?;
        if let Some(batch) = &self.batch {
            self.overlay
                .entry(index)
                .or_insert_with(|| batch.rows[index].clone());
        }
        self.editing_row = Some(index);
        Ok(())
    }

    /// Change a field of the pending edit. The canonical row is untouched
    /// until `save_edit`.
    pub fn update_field(&mut self, index: usize, field: &str, value: &str) -> Result<()> {
        let draft = self
            .overlay
            .get_mut(&index)
            .ok_or_else(|| EstateError::Other(format!("Row {} is not being edited", index + 1)))?;
        draft.set(field, value);
        Ok(())
    }

    /// Merge the edit into the batch, recompute its derived fields and
    /// re-check that row only. Findings for other rows are left as they were.
    pub fn save_edit(&mut self, index: usize) -> Result<&ParsedBatch> {
        self.expect_stage(&[Stage::Preview], "save an edit")?;
        let format = self.batch_mut()?.format;
        let mut draft = self
            .overlay
            .remove(&index)
            .ok_or_else(|| EstateError::Other(format!("Row {} is not being edited", index + 1)))?;
        self.rules.rederive(&mut draft, format);
        let fresh = self.rules.check(&draft, index);
        let row_no = index + 1;

        let batch = self.batch_mut()?;
        batch.rows[index] = draft;
        batch.findings.retain(|f| f.row != row_no);
        batch.findings.extend(fresh);
        batch.findings.sort_by_key(|f| f.row);
        batch.summary = summarize(batch.rows.len(), &batch.findings);

        if self.editing_row == Some(index) {
            self.editing_row = None;
        }
        self.has_edits = true;
        tracing::debug!(row = row_no, "saved row edit");
        self.batch.as_ref().ok_or_else(|| EstateError::Other("No batch loaded".into()))
    }

    pub fn cancel_edit(&mut self, index: usize) {
        self.overlay.remove(&index);
        if self.editing_row == Some(index) {
            self.editing_row = None;
        }
    }

    /// Full validation pass over every row.
    pub fn revalidate_all(&mut self) -> Result<&ParsedBatch> {
        self.expect_stage(&[Stage::Preview], "re-validate")?;
        let batch = self
            .batch
            .as_mut()
            .ok_or_else(|| EstateError::Other("No batch loaded".into()))?;
        let (findings, summary) = validate_rows(&batch.rows, &self.rules);
        batch.findings = findings;
        batch.summary = summary;
        self.has_edits = false;
        Ok(&*batch)
    }

    /// Move on to confirmation. Refused while any row has an error, or
    /// while saved edits have not been through a full re-validation.
    pub fn confirm(&mut self) -> Result<()> {
        self.expect_stage(&[Stage::Preview], "confirm")?;
        let errors = self.batch.as_ref().map_or(0, |b| b.summary.error_count);
        if errors > 0 {
            return Err(EstateError::ImportBlocked(errors));
        }
        if self.has_edits {
            return Err(EstateError::UnvalidatedEdits);
        }
        self.stage = Stage::Confirming;
        Ok(())
    }

    /// Back out of confirmation without importing.
    pub fn back_to_preview(&mut self) -> Result<()> {
        self.expect_stage(&[Stage::Confirming], "go back")?;
        self.stage = Stage::Preview;
        Ok(())
    }

    pub fn import<T: ImportTarget>(&mut self, target: &T, cancel: &CancelToken) -> Result<&ImportOutcome> {
        self.expect_stage(&[Stage::Confirming], "import")?;
        let batch = self
            .batch
            .as_ref()
            .ok_or_else(|| EstateError::Other("No batch loaded".into()))?;
        let outcome = run_import(batch, target, cancel)?;
        self.stage = Stage::Complete;
        Ok(&*self.outcome.insert(outcome))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector::parse_tabular;
    use crate::models::Severity;
    use crate::validator::SaleRules;

    const CSV: &str = "\
date,category,total_amount
2024-03-12,SHOP,85000
2024-03-12,BOGUS,4000
2024-03-12,SALON,-3
2024-03-13,CINEMA,15000
";

    fn loaded() -> ReviewSession<SaleRules> {
        let mut session = ReviewSession::new(SaleRules);
        session.submit(CSV, parse_tabular).unwrap();
        session
    }

    #[test]
    fn test_submit_validates_into_preview() {
        let session = loaded();
        assert_eq!(session.stage(), Stage::Preview);
        let batch = session.batch().unwrap();
        assert_eq!(batch.summary.total, 4);
        assert_eq!(batch.summary.error_count, 1);
        assert_eq!(batch.summary.warning_count, 1);
        assert_eq!(batch.summary.valid, 3);
        let err: Vec<_> = batch
            .findings
            .iter()
            .filter(|f| f.severity == Severity::Error)
            .collect();
        assert_eq!(err[0].row, 2);
        assert_eq!(err[0].field, "category");
    }

    #[test]
    fn test_parse_failure_returns_to_upload() {
        let mut session = ReviewSession::new(SaleRules);
        let result = session.submit("x", |_| {
            Err(EstateError::Parse {
                line: 1,
                message: "bad".into(),
            })
        });
        assert!(result.is_err());
        assert_eq!(session.stage(), Stage::Upload);
        assert!(session.batch().is_none());
    }

    #[test]
    fn test_confirm_blocked_by_errors() {
        let mut session = loaded();
        assert!(matches!(session.confirm(), Err(EstateError::ImportBlocked(1))));
        assert_eq!(session.stage(), Stage::Preview);
    }

    #[test]
    fn test_save_edit_only_touches_that_row() {
        let mut session = loaded();
        let other_before: Vec<_> = session.batch().unwrap().findings_for(3).cloned().collect();

        session.start_edit(1).unwrap();
        session.update_field(1, "category", "SHOP").unwrap();
        let batch = session.save_edit(1).unwrap();

        assert_eq!(batch.summary.error_count, 0);
        assert_eq!(batch.summary.valid, 4);
        assert_eq!(batch.rows[1].get("category"), "SHOP");
        let other_after: Vec<_> = batch.findings_for(3).cloned().collect();
        assert_eq!(other_before, other_after);
        assert!(session.has_edits());
        assert_eq!(session.editing_row(), None);
    }

    #[test]
    fn test_update_field_does_not_touch_canonical_row() {
        let mut session = loaded();
        session.start_edit(1).unwrap();
        session.update_field(1, "category", "SHOP").unwrap();
        assert_eq!(session.batch().unwrap().rows[1].get("category"), "BOGUS");
        assert_eq!(session.draft(1).unwrap().get("category"), "SHOP");

        session.cancel_edit(1);
        assert_eq!(session.batch().unwrap().rows[1].get("category"), "BOGUS");
        assert!(session.draft(1).is_none());
        assert_eq!(session.editing_row(), None);
        assert!(!session.has_edits());
    }

    #[test]
    fn test_start_edit_moves_target() {
        let mut session = loaded();
        session.start_edit(1).unwrap();
        session.start_edit(2).unwrap();
        assert_eq!(session.editing_row(), Some(2));
        assert!(matches!(session.start_edit(9), Err(EstateError::RowOutOfRange(10))));
    }

    #[test]
    fn test_edits_require_revalidation_before_confirm() {
        let mut session = loaded();
        session.start_edit(1).unwrap();
        session.update_field(1, "category", "SALON").unwrap();
        session.save_edit(1).unwrap();
        assert!(matches!(session.confirm(), Err(EstateError::UnvalidatedEdits)));

        session.revalidate_all().unwrap();
        assert!(!session.has_edits());
        session.confirm().unwrap();
        assert_eq!(session.stage(), Stage::Confirming);
    }

    #[test]
    fn test_revalidate_all_is_idempotent() {
        let mut session = loaded();
        let first = session.revalidate_all().unwrap().clone();
        let second = session.revalidate_all().unwrap().clone();
        assert_eq!(first.findings, second.findings);
        assert_eq!(first.summary, second.summary);
    }

    #[test]
    fn test_edit_not_allowed_outside_preview() {
        let mut session = ReviewSession::new(SaleRules);
        assert!(matches!(
            session.start_edit(0),
            Err(EstateError::InvalidStage { .. })
        ));
    }

    #[test]
    fn test_import_completes_session() {
        use crate::db::testing::test_db;
        use crate::derivation::{TxTypeRules, DEFAULT_BULK_UNIT_PRICE};
        use crate::importer::SaleStore;

        let (_dir, conn) = test_db();
        let mut session = loaded();
        session.start_edit(1).unwrap();
        session.update_field(1, "category", "SHOP").unwrap();
        session.save_edit(1).unwrap();
        session.revalidate_all().unwrap();
        session.confirm().unwrap();

        let store = SaleStore {
            conn: &conn,
            rules: TxTypeRules::Sales,
            bulk_unit_price: DEFAULT_BULK_UNIT_PRICE,
            import_id: None,
        };
        let outcome = session.import(&store, &CancelToken::new()).unwrap().clone();
        assert_eq!(outcome.imported, 4);
        assert_eq!(session.stage(), Stage::Complete);
    }

    #[test]
    fn test_save_edit_refreshes_derived_fields() {
        use crate::importer::ImportKind;
        use crate::settings::Settings;

        let settings = Settings::default();
        let mut session = ReviewSession::new(ImportKind::Sales.rules(&settings));
        session
            .submit(CSV, |t| ImportKind::Sales.parse(t, &settings))
            .unwrap();
        assert_eq!(session.batch().unwrap().rows[0].get("payment_method"), "CASH");

        session.start_edit(0).unwrap();
        session.update_field(0, "category", "MM").unwrap();
        // the draft keeps the old derived values until it is saved
        assert_eq!(session.draft(0).unwrap().get("payment_method"), "CASH");
        let row = &session.save_edit(0).unwrap().rows[0];
        assert_eq!(row.get("category"), "MOBILE_MONEY");
        assert_eq!(row.get("payment_method"), "MOBILE_MONEY");
        assert_eq!(row.get("description"), "Mobile Money Commission");
        assert_eq!(row.get("transaction_type"), "SHOP_SALE");
    }
}
