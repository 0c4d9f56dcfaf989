//! Logical string formats
//!
//! A String column whose values all share one recognisable shape gets a
//! format annotation in the schema. The annotation is descriptive only.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

static ISO_DATETIME_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}(\.\d+)?(Z|[+-]\d{2}:\d{2})?$").unwrap()
});

static ISO_DATE_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").unwrap());

static ISO_TIME_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{2}:\d{2}:\d{2}(\.\d+)?$").unwrap());

static EMAIL_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").unwrap()
});

static UUID_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}$").unwrap()
});

static IPV4_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d{1,3}\.){3}\d{1,3}$").unwrap());

static IPV6_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(([0-9a-fA-F]{1,4}:){7}[0-9a-fA-F]{1,4}|([0-9a-fA-F]{1,4}:){1,7}:|([0-9a-fA-F]{1,4}:){1,6}:[0-9a-fA-F]{1,4})$").unwrap()
});

/// Recognised string shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StringFormat {
    DateTime,
    Date,
    Time,
    Email,
    Uuid,
    Ipv4,
    Ipv6,
    Uri,
}

impl StringFormat {
    pub fn name(self) -> &'static str {
        match self {
            StringFormat::DateTime => "date-time",
            StringFormat::Date => "date",
            StringFormat::Time => "time",
            StringFormat::Email => "email",
            StringFormat::Uuid => "uuid",
            StringFormat::Ipv4 => "ipv4",
            StringFormat::Ipv6 => "ipv6",
            StringFormat::Uri => "uri",
        }
    }

    /// Wire id in the footer schema descriptor (0 means no format).
    pub fn id(self) -> u8 {
        match self {
            StringFormat::DateTime => 1,
            StringFormat::Date => 2,
            StringFormat::Time => 3,
            StringFormat::Email => 4,
            StringFormat::Uuid => 5,
            StringFormat::Ipv4 => 6,
            StringFormat::Ipv6 => 7,
            StringFormat::Uri => 8,
        }
    }

    pub fn from_id(id: u8) -> Option<Self> {
        match id {
            1 => Some(StringFormat::DateTime),
            2 => Some(StringFormat::Date),
            3 => Some(StringFormat::Time),
            4 => Some(StringFormat::Email),
            5 => Some(StringFormat::Uuid),
            6 => Some(StringFormat::Ipv4),
            7 => Some(StringFormat::Ipv6),
            8 => Some(StringFormat::Uri),
            _ => None,
        }
    }
}

/// Detect the format of one string. Cheap byte checks gate each regex.
pub fn detect_format(value: &str) -> Option<StringFormat> {
    let len = value.len();
    let bytes = value.as_bytes();

    if len == 0 {
        return None;
    }

    if len > 6
        && (value.starts_with("http://")
            || value.starts_with("https://")
            || value.starts_with("ftp://")
            || value.starts_with("file://"))
    {
        return Some(StringFormat::Uri);
    }

    if len == 10 && bytes[4] == b'-' && bytes[7] == b'-' && ISO_DATE_REGEX.is_match(value) {
        return Some(StringFormat::Date);
    }

    if len > 5 && len < 255 && value.contains('@') && EMAIL_REGEX.is_match(value) {
        return Some(StringFormat::Email);
    }

    if len == 36 && bytes[8] == b'-' && UUID_REGEX.is_match(value) {
        return Some(StringFormat::Uuid);
    }

    if len >= 19 && bytes[10] == b'T' && ISO_DATETIME_REGEX.is_match(value) {
        return Some(StringFormat::DateTime);
    }

    if len >= 8 && value.contains(':') && ISO_TIME_REGEX.is_match(value) {
        return Some(StringFormat::Time);
    }

    if len < 16 && value.contains('.') && is_ipv4(value) {
        return Some(StringFormat::Ipv4);
    }

    if value.contains(':') && IPV6_REGEX.is_match(value) {
        return Some(StringFormat::Ipv6);
    }

    None
}

fn is_ipv4(s: &str) -> bool {
    IPV4_REGEX.is_match(s) && s.split('.').all(|part| part.parse::<u8>().is_ok())
}

/// Running tally of string formats seen for one column.
#[derive(Debug, Default)]
pub(crate) struct StringStats {
    format_counts: HashMap<StringFormat, usize>,
    total_count: usize,
    other_count: usize,
}

impl StringStats {
    pub(crate) fn add_string(&mut self, s: &str) {
        self.total_count += 1;
        if let Some(format) = detect_format(s) {
            *self.format_counts.entry(format).or_insert(0) += 1;
        }
    }

    /// A non-null value that was not a JSON string.
    pub(crate) fn add_other(&mut self) {
        self.other_count += 1;
    }

    /// The format shared by every value, if there is exactly one.
    pub(crate) fn format(&self) -> Option<StringFormat> {
        if self.other_count > 0 || self.format_counts.len() != 1 {
            return None;
        }
        self.format_counts
            .iter()
            .next()
            .filter(|(_, count)| **count == self.total_count)
            .map(|(&format, _)| format)
    }
}
