// ── Segment CSV import ──
//
// Header row names the columns (any order, case-insensitive). `name`,
// `ip_range` and `zone_type` are required; `color` and `description` are
// optional; anything else (such as the `id` column of an export) is
// ignored. Fields follow RFC 4180: quoted fields may hold commas, quotes
// (doubled) and line breaks. Row numbers count the header as row 1.

use serde::{Deserialize, Serialize};

use super::requests::CreateSegmentRequest;
use crate::error::CoreError;
use crate::model::ZoneType;

/// Outcome of an import: rows created, plus one message per skipped row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportReport {
    pub created: usize,
    pub errors: Vec<String>,
}

/// One data row, parsed or rejected.
#[derive(Debug, Clone)]
pub(crate) struct ImportRow {
    pub(crate) row: usize,
    pub(crate) request: Result<CreateSegmentRequest, String>,
}

const REQUIRED: [&str; 3] = ["name", "ip_range", "zone_type"];

/// Parse a segment CSV. A missing required column or an unterminated
/// quote rejects the whole file; anything else is reported per row.
pub(crate) fn parse_segment_csv(text: &str) -> Result<Vec<ImportRow>, CoreError> {
    let mut records = read_records(text)?.into_iter();
    let Some(header) = records.next() else {
        return Err(invalid("CSV file is empty"));
    };
    let header: Vec<String> = header
        .iter()
        .map(|h| h.trim().trim_start_matches('\u{feff}').to_ascii_lowercase())
        .collect();
    let column = |name: &str| header.iter().position(|h| h == name);

    let missing: Vec<&str> = REQUIRED
        .into_iter()
        .filter(|&name| column(name).is_none())
        .collect();
    if !missing.is_empty() {
        return Err(invalid(&format!(
            "CSV header is missing required column(s): {}",
            missing.join(", ")
        )));
    }
    let columns = Columns {
        name: column("name"),
        ip_range: column("ip_range"),
        zone_type: column("zone_type"),
        color: column("color"),
        description: column("description"),
    };

    Ok(records
        .enumerate()
        .filter(|(_, fields)| fields.iter().any(|f| !f.trim().is_empty()))
        .map(|(i, fields)| ImportRow {
            row: i + 2,
            request: columns.request(&fields),
        })
        .collect())
}

fn invalid(message: &str) -> CoreError {
    CoreError::ValidationFailed {
        message: message.to_owned(),
    }
}

struct Columns {
    name: Option<usize>,
    ip_range: Option<usize>,
    zone_type: Option<usize>,
    color: Option<usize>,
    description: Option<usize>,
}

impl Columns {
    fn request(&self, fields: &[String]) -> Result<CreateSegmentRequest, String> {
        let get = |col: Option<usize>| {
            col.and_then(|i| fields.get(i))
                .map(String::as_str)
                .map(str::trim)
                .filter(|f| !f.is_empty())
        };

        let (name, ip_range, zone_type) =
            (get(self.name), get(self.ip_range), get(self.zone_type));
        let (Some(name), Some(ip_range), Some(zone_type)) = (name, ip_range, zone_type) else {
            let absent: Vec<&str> = REQUIRED
                .into_iter()
                .zip([name, ip_range, zone_type])
                .filter_map(|(label, value)| value.is_none().then_some(label))
                .collect();
            return Err(format!("missing required field(s): {}", absent.join(", ")));
        };

        let zone_type = zone_type
            .parse::<ZoneType>()
            .map_err(|_| format!("unknown zone type '{zone_type}'"))?;

        Ok(CreateSegmentRequest {
            name: name.to_owned(),
            ip_range: ip_range.to_owned(),
            zone_type,
            color: get(self.color).map(str::to_owned),
            description: get(self.description).map(str::to_owned),
        })
    }
}

// ── Record reader ──────────────────────────────────────────────────

fn read_records(text: &str) -> Result<Vec<Vec<String>>, CoreError> {
    let mut records = Vec::new();
    let mut record = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' if chars.peek() == Some(&'"') => {
                    chars.next();
                    field.push('"');
                }
                '"' => in_quotes = false,
                _ => field.push(c),
            }
            continue;
        }
        match c {
            '"' if field.is_empty() => in_quotes = true,
            ',' => record.push(std::mem::take(&mut field)),
            '\r' if chars.peek() == Some(&'\n') => {}
            '\n' => {
                record.push(std::mem::take(&mut field));
                records.push(std::mem::take(&mut record));
            }
            _ => field.push(c),
        }
    }

    if in_quotes {
        return Err(invalid("CSV ends inside a quoted field"));
    }
    if !field.is_empty() || !record.is_empty() {
        record.push(field);
        records.push(record);
    }
    Ok(records)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn export_columns_are_accepted() {
        let text = "id,name,ip_range,zone_type,color,description\r\n\
                    9,Payments,10.0.50.0/24,internal,#FF0000,\"Cards, \"\"PCI\"\"\"\r\n";
        let rows = parse_segment_csv(text).unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].row, 2);
        let req = rows[0].request.as_ref().unwrap();
        assert_eq!(req.name, "Payments");
        assert_eq!(req.zone_type, ZoneType::Internal);
        assert_eq!(req.color.as_deref(), Some("#FF0000"));
        assert_eq!(req.description.as_deref(), Some("Cards, \"PCI\""));
    }

    #[test]
    fn bad_rows_are_reported_with_their_row_number() {
        let text = "name,ip_range,zone_type\n\
                    Web,10.0.1.0/24,DMZ\n\
                    \n\
                    Broken,,\n\
                    Odd,10.0.2.0/24,Basement\n";
        let rows = parse_segment_csv(text).unwrap();

        assert_eq!(rows.len(), 3);
        assert!(rows[0].request.is_ok());
        assert_eq!(rows[1].row, 4);
        assert_eq!(
            rows[1].request.as_ref().unwrap_err(),
            "missing required field(s): ip_range, zone_type"
        );
        assert_eq!(
            rows[2].request.as_ref().unwrap_err(),
            "unknown zone type 'Basement'"
        );
    }

    #[test]
    fn quoted_field_may_span_lines() {
        let text = "name,ip_range,zone_type,description\nA,10.0.1.0/24,DMZ,\"two\nlines\"";
        let rows = parse_segment_csv(text).unwrap();
        let req = rows[0].request.as_ref().unwrap();
        assert_eq!(req.description.as_deref(), Some("two\nlines"));
    }

    #[test]
    fn missing_column_rejects_file() {
        let err = parse_segment_csv("name,zone_type\nA,DMZ\n").unwrap_err();
        assert!(err.to_string().contains("ip_range"));
    }

    #[test]
    fn unterminated_quote_rejects_file() {
        let err = parse_segment_csv("name,ip_range,zone_type\n\"A,10.0.1.0/24,DMZ\n").unwrap_err();
        assert!(matches!(err, CoreError::ValidationFailed { .. }));
    }
}
