use std::sync::LazyLock;

use regex::Regex;

use crate::domain::SequenceRecord;

static WHITESPACE_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("whitespace pattern is valid"));
static UNDERSCORE_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"_{2,}").expect("underscore pattern is valid"));

/// Cleans the name, description and organism so that none of them can
/// contain the `__` header delimiter or characters unsafe in file names.
/// Applying it twice is the same as applying it once.
pub fn sanitize_record(record: SequenceRecord) -> SequenceRecord {
    SequenceRecord {
        name: sanitize_field(&record.name),
        description: sanitize_description(&record.description),
        organism: sanitize_field(&record.organism),
        ..record
    }
}

/// GenPept definitions end with the organism in brackets; drop it first.
pub fn sanitize_description(description: &str) -> String {
    let head = description
        .split_once('[')
        .map(|(head, _)| head)
        .unwrap_or(description);
    sanitize_field(head.trim_end())
}

pub fn sanitize_field(value: &str) -> String {
    let cleaned = value
        .chars()
        .filter(|ch| !matches!(ch, '\'' | '"' | ';'))
        .map(|ch| match ch {
            '(' | ')' | '^' => '-',
            '/' => '_',
            other => other,
        })
        .collect::<String>();
    let cleaned = WHITESPACE_RUN.replace_all(&cleaned, "_");
    let cleaned = UNDERSCORE_RUN.replace_all(&cleaned, "_");
    // A leading dash would read as a switch to downstream tools; an edge
    // underscore would run into the header delimiter.
    cleaned
        .trim_start_matches(['-', '_'])
        .trim_end_matches('_')
        .to_string()
}
