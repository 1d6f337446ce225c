use calamine::Data;

/// A worksheet cell reduced to the three shapes the pipeline cares about.
///
/// Conversion from the workbook reader is explicit so that header matching
/// and numeric coercion have one set of rules instead of ad-hoc
/// `to_string` calls scattered through the extractors.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Text(String),
    Number(f64),
    Blank,
}

impl CellValue {
    pub fn from_data(data: &Data) -> Self {
        match data {
            Data::String(s) => {
                if s.trim().is_empty() {
                    CellValue::Blank
                } else {
                    CellValue::Text(s.clone())
                }
            }
            Data::Float(f) => CellValue::Number(*f),
            Data::Int(i) => CellValue::Number(*i as f64),
            Data::Bool(b) => CellValue::Text(b.to_string()),
            Data::DateTime(dt) => CellValue::Number(dt.as_f64()),
            Data::DateTimeIso(s) | Data::DurationIso(s) => CellValue::Text(s.clone()),
            Data::Error(_) | Data::Empty => CellValue::Blank,
        }
    }

    pub fn is_blank(&self) -> bool {
        matches!(self, CellValue::Blank)
    }

    /// Cell content as trimmed text. Integral numbers render without a
    /// fraction part, so a numeric `20241221` cell round-trips to the
    /// compact date string it represents.
    pub fn text(&self) -> String {
        match self {
            CellValue::Text(s) => s.trim().to_string(),
            CellValue::Number(n) => n.to_string(),
            CellValue::Blank => String::new(),
        }
    }

    /// Numeric value of the cell; text cells are parsed after stripping
    /// thousands separators. Blank or unparseable cells are `None`.
    pub fn number(&self) -> Option<f64> {
        match self {
            CellValue::Number(n) => Some(*n),
            CellValue::Text(s) => {
                let cleaned = s.trim().replace(',', "");
                if cleaned.is_empty() {
                    None
                } else {
                    cleaned.parse::<f64>().ok()
                }
            }
            CellValue::Blank => None,
        }
    }

    /// Numeric coercion with the statement convention that a blank or
    /// non-numeric cell counts as zero.
    pub fn number_or_zero(&self) -> f64 {
        self.number().unwrap_or(0.0)
    }
}
