//! Label values passed as a single delimited string.
//!
//! Label values may be given as one string, with values separated by [`DELIMITER`] (`,`).  A
//! value that itself contains a comma escapes it as `\,`, and a literal backslash is written as
//! `\\`.  Any other backslash is kept as-is.  Values are never trimmed, so `"a, b"` yields `"a"`
//! and `" b"`.
//!
//! Splitting never pads or truncates: the number of values is always one more than the number of
//! unescaped commas, and it is up to the metric to reject a tuple with the wrong number of values.

/// Separates label values in a delimited string.
pub const DELIMITER: char = ',';

const ESCAPE: char = '\\';

/// Splits a delimited string into its label values.
///
/// An empty string is a single, empty label value.
pub fn split_label_values(delimited: &str) -> Vec<String> {
    let mut values = Vec::new();
    let mut current = String::new();
    let mut chars = delimited.chars();

    while let Some(c) = chars.next() {
        match c {
            ESCAPE => match chars.next() {
                Some(next @ (DELIMITER | ESCAPE)) => current.push(next),
                Some(next) => {
                    current.push(ESCAPE);
                    current.push(next);
                }
                None => current.push(ESCAPE),
            },
            DELIMITER => values.push(std::mem::take(&mut current)),
            c => current.push(c),
        }
    }
    values.push(current);

    values
}

/// Joins label values into a delimited string, escaping as needed.
///
/// This is the inverse of [`split_label_values`] for any non-empty set of values.
pub fn join_label_values(values: &[&str]) -> String {
    let mut joined = String::new();
    for (i, value) in values.iter().enumerate() {
        if i > 0 {
            joined.push(DELIMITER);
        }
        for c in value.chars() {
            if c == DELIMITER || c == ESCAPE {
                joined.push(ESCAPE);
            }
            joined.push(c);
        }
    }
    joined
}
