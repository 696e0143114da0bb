use std::collections::HashMap;
use std::io::Read;

use crate::engine::EngineError;
use crate::model::NewStudent;

/// One import row: header name → cell. Header keys are matched ignoring
/// case and surrounding whitespace.
pub type StudentRow = HashMap<String, String>;

const REQUIRED: [&str; 5] = ["usn", "name", "department", "semester", "section"];

fn cell<'a>(row: &'a StudentRow, column: &str) -> Option<&'a str> {
    row.get(column)
        .or_else(|| {
            row.iter()
                .find(|(k, _)| k.trim().eq_ignore_ascii_case(column))
                .map(|(_, v)| v)
        })
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
}

/// Build a row from loose key/value pairs, normalizing the header keys.
pub fn row<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> StudentRow
where
    K: AsRef<str>,
    V: Into<String>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.as_ref().trim().to_lowercase(), v.into()))
        .collect()
}

pub fn parse_student_row(row: &StudentRow) -> Result<NewStudent, EngineError> {
    let missing: Vec<&str> = REQUIRED
        .iter()
        .copied()
        .filter(|c| cell(row, c).is_none())
        .collect();
    if !missing.is_empty() {
        return Err(EngineError::invalid(format!(
            "missing {}",
            missing.join(", ")
        )));
    }

    let raw_semester = cell(row, "semester").unwrap_or_default();
    let semester = raw_semester
        .parse::<u32>()
        .map_err(|_| EngineError::invalid(format!("semester {raw_semester:?} is not a number")))?;

    Ok(NewStudent {
        usn: cell(row, "usn").unwrap_or_default().to_string(),
        name: cell(row, "name").unwrap_or_default().to_string(),
        email: cell(row, "email").unwrap_or_default().to_string(),
        phone: cell(row, "phone").unwrap_or_default().to_string(),
        department: cell(row, "department").unwrap_or_default().to_string(),
        semester,
        section: cell(row, "section").unwrap_or_default().to_string(),
    })
}

/// Read CSV with a header line. Each data record becomes one row; a record
/// whose field count differs from the header comes back as an error in its
/// slot so the remaining rows still import.
pub fn read_csv_rows<R: Read>(reader: R) -> Result<Vec<Result<StudentRow, EngineError>>, EngineError> {
    let mut csv = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers: Vec<String> = csv
        .headers()
        .map_err(|e| EngineError::invalid(format!("unreadable csv header: {e}")))?
        .iter()
        .map(|h| h.to_lowercase())
        .collect();
    if headers.iter().all(|h| h.is_empty()) {
        return Err(EngineError::invalid("csv header is empty"));
    }

    let mut rows = Vec::new();
    for record in csv.records() {
        let parsed = match record {
            Ok(record) if record.len() == headers.len() => Ok(headers
                .iter()
                .cloned()
                .zip(record.iter().map(str::to_string))
                .collect()),
            Ok(record) => Err(EngineError::invalid(format!(
                "expected {} fields, found {}",
                headers.len(),
                record.len()
            ))),
            Err(e) => Err(EngineError::invalid(format!("malformed csv record: {e}"))),
        };
        rows.push(parsed);
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_complete_row() {
        let r = row([
            ("USN", "1ms21cs010"),
            ("Name", "Asha Rao"),
            ("Department", "CS"),
            ("Semester", "5"),
            ("Section", "A"),
        ]);
        let student = parse_student_row(&r).unwrap();
        assert_eq!(student.usn, "1ms21cs010");
        assert_eq!(student.semester, 5);
        assert_eq!(student.email, "");
    }

    #[test]
    fn reports_every_missing_column() {
        let r = row([("usn", "X1"), ("name", "")]);
        let err = parse_student_row(&r).unwrap_err();
        assert_eq!(
            err,
            EngineError::Validation("missing name, department, semester, section".into())
        );
    }

    #[test]
    fn rejects_non_numeric_semester() {
        let r = row([
            ("usn", "X1"),
            ("name", "A"),
            ("department", "CS"),
            ("semester", "fifth"),
            ("section", "A"),
        ]);
        assert!(matches!(parse_student_row(&r), Err(EngineError::Validation(_))));
    }

    #[test]
    fn csv_headers_are_case_insensitive_and_short_rows_are_flagged() {
        let text = "USN, Name ,Department,Semester,Section\n\
                    1MS21CS001,John Doe,CS,5,A\n\
                    1MS21CS002,Jane Smith,CS\n\
                    1MS21CS003,Mike Johnson,CS,3,B\n";
        let rows = read_csv_rows(text.as_bytes()).unwrap();
        assert_eq!(rows.len(), 3);

        let first = rows[0].as_ref().unwrap();
        assert_eq!(first.get("name").map(String::as_str), Some("John Doe"));
        assert!(rows[1].is_err());
        assert!(rows[2].is_ok());
    }

    #[test]
    fn empty_input_has_no_rows() {
        let rows = read_csv_rows("usn,name\n".as_bytes()).unwrap();
        assert!(rows.is_empty());
    }
}
