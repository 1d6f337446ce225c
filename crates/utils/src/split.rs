use tracing::debug;

/// Split a decoded statement blob into logical records on a sentinel token.
///
/// Bank feeds are not one-record-per-line: the only reliable boundary is a
/// recurring literal prefix (typically the bank name), which can sit in the
/// middle of a physical line. Each returned segment is re-prefixed with the
/// sentinel so it stands on its own; a leading empty segment (blob starts
/// with the sentinel) is discarded.
pub fn split_records(text: &str, sentinel: &str) -> Vec<String> {
    let mut records: Vec<String> = Vec::new();
    for (idx, segment) in text.split(sentinel).enumerate() {
        if idx == 0 {
            // Leading segment is either empty (blob starts with the
            // sentinel) or preamble noise; not a record either way.
            continue;
        }
        records.push(format!("{sentinel}{segment}"));
    }
    debug!(count = records.len(), "split records on sentinel");
    records
}

/// Every quoted substring of a record, left to right, quotes stripped.
///
/// Quoting is what survives embedded delimiters, so the quoted substrings
/// *are* the ordered field list; anything between them is separator noise.
/// A record without quotes yields an empty list.
pub fn quoted_fields(record: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut in_quotes = false;
    let mut buf = String::new();
    for ch in record.chars() {
        if ch == '"' {
            if in_quotes {
                fields.push(std::mem::take(&mut buf));
            }
            in_quotes = !in_quotes;
        } else if in_quotes {
            buf.push(ch);
        }
    }
    fields
}

/// A rectangular table of optional string cells built from ragged
/// per-record field lists.
#[derive(Debug, Clone, PartialEq)]
pub struct RawTable {
    pub width: usize,
    pub rows: Vec<Vec<Option<String>>>,
}

impl RawTable {
    /// Pad every field list to the maximum observed width; missing
    /// trailing fields become `None`. A record with zero fields simply
    /// pads to a full row of `None`.
    pub fn from_records(field_lists: Vec<Vec<String>>) -> Self {
        let width = field_lists.iter().map(Vec::len).max().unwrap_or(0);
        let rows = field_lists
            .into_iter()
            .map(|fields| {
                let mut row: Vec<Option<String>> = fields.into_iter().map(Some).collect();
                row.resize(width, None);
                row
            })
            .collect();
        RawTable { width, rows }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_and_reprefixes_records() {
        let blob = "SENTINELa,\"1\",\"2\"SENTINELb,\"3\",\"4\"";
        let records = split_records(blob, "SENTINEL");
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.starts_with("SENTINEL")));
        assert_eq!(quoted_fields(&records[0]), vec!["1", "2"]);
        assert_eq!(quoted_fields(&records[1]), vec!["3", "4"]);
    }

    #[test]
    fn preamble_before_first_sentinel_is_dropped() {
        let blob = "report generated 2026-08-07\nSENTINEL\"x\"";
        let records = split_records(blob, "SENTINEL");
        assert_eq!(records, vec!["SENTINEL\"x\"".to_string()]);
    }

    #[test]
    fn quoted_fields_survive_embedded_delimiters() {
        let fields = quoted_fields(r#"BANK,"1,234.56-","HK, Central",plain,"x""#);
        assert_eq!(fields, vec!["1,234.56-", "HK, Central", "x"]);
    }

    #[test]
    fn record_without_quotes_pads_cleanly() {
        let table = RawTable::from_records(vec![
            vec!["a".into(), "b".into(), "c".into()],
            vec![],
            vec!["d".into()],
        ]);
        assert_eq!(table.width, 3);
        assert_eq!(table.rows[1], vec![None, None, None]);
        assert_eq!(table.rows[2], vec![Some("d".into()), None, None]);
    }

    #[test]
    fn empty_input_builds_an_empty_table() {
        let table = RawTable::from_records(Vec::new());
        assert_eq!(table.width, 0);
        assert!(table.rows.is_empty());
    }
}
