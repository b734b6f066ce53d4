//! `search` and `ordering` query parameters shared by the list endpoints.
//!
//! Search splits the parameter on whitespace and commas, keeping a quoted
//! phrase together as one term; every term must match
//! at least one of the searchable columns (case-insensitive substring).
//! Ordering accepts a comma separated list of public field names, `-` prefixed
//! for descending. Unknown fields are ignored.

use crate::utils::db_utils::SqlValue;

pub fn search_terms(raw: Option<&str>) -> Vec<String> {
    let raw = raw.unwrap_or_default().replace('\0', "");
    let mut terms = Vec::new();

    for word in split_words(&raw) {
        match unquote(&word) {
            Some(phrase) if phrase.is_empty() => {}
            Some(phrase) => terms.push(phrase),
            None => terms.push(word),
        }
    }
    terms
}

fn is_separator(c: char) -> bool {
    c.is_whitespace() || c == ','
}

/// Words separated by whitespace or commas; a quoted section (`"..."` or `'...'`) stays in one word.
fn split_words(raw: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for c in raw.chars() {
        match quote {
            Some(q) => {
                current.push(c);
                if escaped {
                    escaped = false;
                } else if c == '\\' {
                    escaped = true;
                } else if c == q {
                    quote = None;
                }
            }
            None if is_separator(c) => {
                if !current.is_empty() {
                    words.push(std::mem::take(&mut current));
                }
            }
            None => {
                if c == '"' || c == '\'' {
                    quote = Some(c);
                }
                current.push(c);
            }
        }
    }

    // An unterminated quote must not glue the rest of the input together.
    if quote.is_some() {
        words.extend(
            current
                .split(is_separator)
                .filter(|w| !w.is_empty())
                .map(str::to_string),
        );
    } else if !current.is_empty() {
        words.push(current);
    }
    words
}

/// Contents of a fully quoted word, with escaped quotes and backslashes resolved.
fn unquote(word: &str) -> Option<String> {
    let quote = word.chars().next()?;
    if !matches!(quote, '"' | '\'') || word.len() < 2 || !word.ends_with(quote) {
        return None;
    }

    let inner = &word[1..word.len() - 1];
    let mut phrase = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            phrase.push(c);
            continue;
        }
        match chars.next() {
            Some(next) if next == quote || next == '\\' => phrase.push(next),
            Some(next) => {
                phrase.push(c);
                phrase.push(next);
            }
            None => phrase.push(c),
        }
    }
    Some(phrase)
}

/// `%term%` with LIKE wildcards escaped, lowercased to pair with `LOWER(column)`.
pub fn like_pattern(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len() + 2);
    escaped.push('%');
    for c in term.to_lowercase().chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

/// One `(LOWER(c1) LIKE ? OR ...)` group per term, AND-ed together.
pub fn search_condition(terms: &[String], columns: &[&str]) -> Option<(String, Vec<SqlValue>)> {
    if terms.is_empty() || columns.is_empty() {
        return None;
    }

    let mut groups = Vec::with_capacity(terms.len());
    let mut values = Vec::with_capacity(terms.len() * columns.len());

    for term in terms {
        let pattern = like_pattern(term);
        let group = columns
            .iter()
            .map(|c| format!("LOWER({c}) LIKE ?"))
            .collect::<Vec<_>>()
            .join(" OR ");
        groups.push(format!("({group})"));
        values.extend(columns.iter().map(|_| SqlValue::String(pattern.clone())));
    }

    Some((groups.join(" AND "), values))
}

/// Maps public ordering field names to SQL columns.
pub struct Ordering<'a> {
    pub fields: &'a [(&'a str, &'a str)],
    pub default: &'a [&'a str],
    pub tiebreak: &'a str,
}

impl Ordering<'_> {
    /// Full `ORDER BY` clause for the requested ordering.
    pub fn order_by(&self, raw: Option<&str>) -> String {
        let mut terms: Vec<String> = Vec::new();
        let mut seen: Vec<&str> = Vec::new();

        for part in raw.unwrap_or_default().split(',') {
            let part = part.trim();
            let (name, direction) = match part.strip_prefix('-') {
                Some(name) => (name, "DESC"),
                None => (part, "ASC"),
            };
            let Some((_, column)) = self.fields.iter().find(|(field, _)| *field == name) else {
                continue;
            };
            if seen.contains(column) {
                continue;
            }
            seen.push(*column);
            terms.push(format!("{column} {direction}"));
        }

        if terms.is_empty() {
            terms.extend(self.default.iter().map(|t| t.to_string()));
        }
        terms.push(self.tiebreak.to_string());

        format!("ORDER BY {}", terms.join(", "))
    }
}

/// Appends `WHERE a AND b ...` when any condition is present.
pub fn where_clause(conditions: &[String]) -> String {
    if conditions.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", conditions.join(" AND "))
    }
}
