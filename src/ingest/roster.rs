// HR roster ingestion
//
// The roster arrives as a CSV with a known set of column aliases. The
// email column is the join key and is mandatory; every other recognized
// column is optional. Unrecognized columns are kept as passthrough so
// nothing the HR system added gets silently lost before scrubbing.

use std::collections::BTreeMap;
use std::io::Read;

use chrono::NaiveDate;
use log::info;

use crate::error::{PipelineError, Result};
use crate::types::RosterRecord;

const EMAIL_ALIASES: [&str; 6] = [
    "email address",
    "email",
    "work email",
    "email_address",
    "work_email",
    "e-mail",
];

const ROLE_ALIASES: [&str; 3] = ["job title", "role", "title"];
const TEAM_ALIASES: [&str; 3] = ["team", "department", "dept"];
const LOCATION_ALIASES: [&str; 3] = ["work location", "location", "office"];
const STATUS_ALIASES: [&str; 2] = ["employment status", "status"];
const TYPE_ALIASES: [&str; 2] = ["employment type", "worker type"];
const HIRE_DATE_ALIASES: [&str; 3] = ["hire date", "start date", "hire_date"];

fn normalize_header(header: &str) -> String {
    header.trim().to_lowercase()
}

fn find_column(headers: &[String], aliases: &[&str]) -> Option<usize> {
    headers
        .iter()
        .position(|h| aliases.contains(&h.as_str()))
}

/// Parse the roster CSV. Fails when the email column cannot be located;
/// every other schema looseness is tolerated.
pub fn parse_roster<R: Read>(reader: R) -> Result<Vec<RosterRecord>> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);

    let raw_headers = csv_reader
        .headers()
        .map_err(|_| PipelineError::InvalidSource("roster header row"))?
        .clone();
    let headers: Vec<String> = raw_headers.iter().map(normalize_header).collect();

    let email_col = find_column(&headers, &EMAIL_ALIASES).ok_or_else(|| {
        PipelineError::RosterSchema(format!(
            "no email column found; expected one of: {}",
            EMAIL_ALIASES.join(", ")
        ))
    })?;
    let role_col = find_column(&headers, &ROLE_ALIASES);
    let team_col = find_column(&headers, &TEAM_ALIASES);
    let location_col = find_column(&headers, &LOCATION_ALIASES);
    let status_col = find_column(&headers, &STATUS_ALIASES);
    let type_col = find_column(&headers, &TYPE_ALIASES);
    let hire_col = find_column(&headers, &HIRE_DATE_ALIASES);

    let recognized: Vec<usize> = [
        Some(email_col),
        role_col,
        team_col,
        location_col,
        status_col,
        type_col,
        hire_col,
    ]
    .into_iter()
    .flatten()
    .collect();

    let mut records = Vec::new();
    let mut skipped_blank = 0usize;
    for row in csv_reader.records() {
        let row = row.map_err(|_| PipelineError::InvalidSource("roster data row"))?;

        let get = |col: Option<usize>| -> Option<String> {
            col.and_then(|i| row.get(i))
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };

        let email = match get(Some(email_col)) {
            Some(email) => email,
            None => {
                skipped_blank += 1;
                continue;
            }
        };

        let mut passthrough = BTreeMap::new();
        for (i, value) in row.iter().enumerate() {
            if recognized.contains(&i) || value.trim().is_empty() {
                continue;
            }
            if let Some(name) = raw_headers.get(i) {
                passthrough.insert(name.trim().to_string(), value.trim().to_string());
            }
        }

        records.push(RosterRecord {
            email,
            role: get(role_col),
            team: get(team_col),
            location: get(location_col),
            employment_status: get(status_col),
            employment_type: get(type_col),
            hire_date: get(hire_col),
            passthrough,
        });
    }

    info!(
        "roster parsed: {} rows ({} skipped for blank email)",
        records.len(),
        skipped_blank
    );
    Ok(records)
}

/// Hire-date formats the roster is known to emit.
const HIRE_DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%m/%d/%Y", "%d/%m/%Y"];

fn parse_hire_date(raw: &str) -> Option<NaiveDate> {
    HIRE_DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
}

/// Coarsen a hire date into a tenure bucket relative to `as_of`.
/// Unparseable or missing dates land in "Unknown" rather than failing
/// the row.
pub fn tenure_band(hire_date: Option<&str>, as_of: NaiveDate) -> String {
    let hired = match hire_date.and_then(parse_hire_date) {
        Some(date) if date <= as_of => date,
        _ => return "Unknown".to_string(),
    };
    let days = (as_of - hired).num_days();
    let band = match days {
        0..=89 => "<90d",
        90..=179 => "90-180d",
        180..=364 => "180-365d",
        365..=729 => "1-2yr",
        730..=1824 => "2-5yr",
        _ => "5+yr",
    };
    band.to_string()
}
