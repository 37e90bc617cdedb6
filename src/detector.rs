use crate::error::Result;
use crate::freeform::parse_date_line;
use crate::models::{InputFormat, ParsedBatch, RowRecord};

/// Classify raw text as a free-form log or delimited tabular input.
///
/// The text is free-form when its first non-empty line is a date line, or
/// when any line is a log entry as `is_entry` defines it for the domain.
pub fn detect_format(text: &str, is_entry: fn(&str) -> bool) -> InputFormat {
    let mut lines = text.lines().map(str::trim).filter(|l| !l.is_empty());
    let Some(first) = lines.next() else {
        return InputFormat::Tabular;
    };
    if !first.contains(',') && matches!(parse_date_line(first), Ok(Some(_)) | Err(_)) {
        return InputFormat::Freeform;
    }
    if std::iter::once(first).chain(lines).any(is_entry) {
        InputFormat::Freeform
    } else {
        InputFormat::Tabular
    }
}

/// Header cell to field name: `Unit Price` becomes `unit_price`.
pub fn normalize_header(raw: &str) -> String {
    raw.trim()
        .trim_start_matches('\u{feff}')
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
}

/// Split comma-delimited text positionally against its first line.
///
/// Short lines read as empty strings for the missing trailing fields and
/// `source_line` is the physical line, so the first data row is line 2.
pub fn parse_tabular(text: &str) -> Result<ParsedBatch> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let mut headers: Vec<String> = Vec::new();
    let mut rows = Vec::new();
    for result in rdr.records() {
        let record = result?;
        let line = record.position().map_or(0, |p| p.line() as usize);
        if headers.is_empty() {
            headers = record.iter().map(normalize_header).collect();
            continue;
        }
        if record.iter().all(|f| f.is_empty()) {
            continue;
        }
        let mut row = RowRecord::new(line);
        for (i, name) in headers.iter().enumerate() {
            row.set(name, record.get(i).unwrap_or(""));
        }
        rows.push(row);
    }

    tracing::debug!(columns = headers.len(), rows = rows.len(), "parsed tabular input");
    Ok(ParsedBatch::new(InputFormat::Tabular, headers, rows))
}

/// How one domain writes free-form logs.
#[derive(Debug, Clone, Copy)]
pub struct LogShape {
    /// Fields every free-form row carries.
    pub headers: &'static [&'static str],
    /// Whether a line is one of the domain's log entries.
    pub is_entry: fn(&str) -> bool,
}

/// Detect the shape of `text` and parse it with the matching tokenizer.
pub fn tokenize<F>(text: &str, shape: LogShape, freeform: F) -> Result<ParsedBatch>
where
    F: Fn(&str) -> Result<Vec<RowRecord>>,
{
    let format = detect_format(text, shape.is_entry);
    tracing::info!(%format, "detected input format");
    match format {
        InputFormat::Tabular => parse_tabular(text),
        InputFormat::Freeform => {
            let rows = freeform(text)?;
            let headers = shape.headers.iter().map(|h| h.to_string()).collect();
            Ok(ParsedBatch::new(InputFormat::Freeform, headers, rows))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::freeform::{
        is_asset_entry, is_sales_entry, parse_asset_log, DailyLogParser, ASSET_LOG_HEADERS,
        FREEFORM_HEADERS,
    };

    fn sales(text: &str) -> InputFormat {
        detect_format(text, is_sales_entry)
    }

    fn assets(text: &str) -> InputFormat {
        detect_format(text, is_asset_entry)
    }

    #[test]
    fn test_detects_tabular() {
        assert_eq!(
            sales("date,category,total_amount\n2024-03-01,SHOP,5000\n"),
            InputFormat::Tabular
        );
        assert_eq!(sales(""), InputFormat::Tabular);
        let csv = "name,category,purchase_date\nTractor,VEHICLE,2021-03-12\n";
        assert_eq!(assets(csv), InputFormat::Tabular);
    }

    #[test]
    fn test_detects_freeform_by_marker() {
        let text = "Good evening boss\nShop sales: 85000\nShop exp: 2000\n";
        assert_eq!(sales(text), InputFormat::Freeform);
    }

    #[test]
    fn test_marker_with_thousands_separator() {
        let text = "Report for today\nShop sales: 85,000\nSalon: 40,000\n";
        assert_eq!(sales(text), InputFormat::Freeform);
        // marker text inside a CSV cell does not count
        let csv = "category,note\nSHOP,Shop sales: up on last week\n";
        assert_eq!(sales(csv), InputFormat::Tabular);
    }

    #[test]
    fn test_detects_freeform_by_leading_date() {
        assert_eq!(sales("12/3/24\nSalon: 4000\n"), InputFormat::Freeform);
        assert_eq!(sales("Monday 12/3/24\nSalon: 4000\n"), InputFormat::Freeform);
    }

    #[test]
    fn test_greeting_first_log_with_plain_labels() {
        let text = "Good evening boss\n12/3/24\nSalon: 40000\nCinema: 15000\nMM: 7500\n";
        assert_eq!(sales(text), InputFormat::Freeform);
    }

    #[test]
    fn test_undated_log_without_sales_labels() {
        assert_eq!(sales("Hello sir\nSalon: 40000\nMM: 7500\n"), InputFormat::Freeform);
        assert_eq!(sales("Hello sir\nBoda rent: 5000\n"), InputFormat::Tabular);
    }

    #[test]
    fn test_detects_undated_asset_log() {
        assert_eq!(assets("Main house: 120,000,000\nTractor: 4500000\n"), InputFormat::Freeform);
        assert_eq!(assets("1/6/2019\nTractor: 45m\n"), InputFormat::Freeform);
    }

    #[test]
    fn test_tabular_maps_headers_positionally() {
        let batch = parse_tabular("name,category,purchase_price\nTractor,VEHICLE,4500000\n").unwrap();
        assert_eq!(batch.headers, vec!["name", "category", "purchase_price"]);
        assert_eq!(batch.rows.len(), 1);
        let row = &batch.rows[0];
        assert_eq!(row.get("name"), "Tractor");
        assert_eq!(row.get("category"), "VEHICLE");
        assert_eq!(row.get("purchase_price"), "4500000");
        assert_eq!(row.source_line, 2);
    }

    #[test]
    fn test_tabular_source_lines_skip_blank_lines() {
        let batch = parse_tabular("a,b\n1,2\n\n3,4\n").unwrap();
        assert_eq!(batch.rows.len(), 2);
        assert_eq!(batch.rows[0].source_line, 2);
        assert_eq!(batch.rows[1].source_line, 4);
    }

    #[test]
    fn test_tabular_short_lines_pad_with_empty() {
        let batch = parse_tabular("a,b,c\n1\n").unwrap();
        let row = &batch.rows[0];
        assert_eq!(row.get("a"), "1");
        assert_eq!(row.get("b"), "");
        assert_eq!(row.get("c"), "");
        assert!(row.fields.contains_key("c"));
    }

    #[test]
    fn test_tabular_normalizes_header_names() {
        let batch = parse_tabular("Date, Unit Price ,Total Amount\n2024-01-01,5,10\n").unwrap();
        assert_eq!(batch.headers, vec!["date", "unit_price", "total_amount"]);
    }

    #[test]
    fn test_header_only_gives_empty_batch() {
        let batch = parse_tabular("date,category\n").unwrap();
        assert!(batch.is_empty());
        assert_eq!(batch.summary.total, 0);
    }

    #[test]
    fn test_tokenize_dispatches_freeform() {
        let parser = DailyLogParser::default();
        let shape = LogShape {
            headers: FREEFORM_HEADERS,
            is_entry: is_sales_entry,
        };
        let batch = tokenize("12/3/24\nShop sales: 100\n", shape, |t| parser.parse(t)).unwrap();
        assert_eq!(batch.format, InputFormat::Freeform);
        assert_eq!(batch.rows.len(), 1);
        assert_eq!(batch.summary.total, 1);
    }

    #[test]
    fn test_tokenize_uses_domain_entry_shape() {
        let shape = LogShape {
            headers: ASSET_LOG_HEADERS,
            is_entry: is_asset_entry,
        };
        let batch = tokenize("Main house: 120,000,000\nTractor: 4500000\n", shape, parse_asset_log).unwrap();
        assert_eq!(batch.format, InputFormat::Freeform);
        assert_eq!(batch.rows.len(), 2);
        assert_eq!(batch.headers[0], "name");
    }
}
