use chrono::NaiveDate;

/// Layout of the report's date column as exported.
pub const SOURCE_FORMAT: &str = "%d-%m-%Y";
/// Layout the staging table's `fecha` column expects.
pub const STAGING_FORMAT: &str = "%Y-%m-%d";

/// `"dd-mm-yyyy"` → `NaiveDate`, `None` if the value is not a real calendar date.
pub fn parse_source_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), SOURCE_FORMAT).ok()
}

/// `"31-12-2023"` → `"2023-12-31"`
pub fn to_staging_date(s: &str) -> Option<String> {
    parse_source_date(s).map(|d| d.format(STAGING_FORMAT).to_string())
}

/// `"2023-12-31"` → `"31-12-2023"`
pub fn to_source_date(s: &str) -> Option<String> {
    NaiveDate::parse_from_str(s.trim(), STAGING_FORMAT)
        .ok()
        .map(|d| d.format(SOURCE_FORMAT).to_string())
}
