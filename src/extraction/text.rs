//! Text normalization helpers shared by the extraction strategies.

use scraper::ElementRef;

/// Collapses runs of whitespace (including newlines) into single spaces and
/// trims the ends.
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Normalizes an attribute name to lowercase snake_case: `Shoe Size` and
/// `data-shoe-size` both become `shoe_size`.
pub fn normalize_attribute_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut last_was_sep = true;
    for c in name.trim().chars() {
        if c.is_alphanumeric() {
            out.extend(c.to_lowercase());
            last_was_sep = false;
        } else if !last_was_sep {
            out.push('_');
            last_was_sep = true;
        }
    }
    while out.ends_with('_') {
        out.pop();
    }
    out
}

/// Trims an attribute value and collapses internal whitespace. Case is
/// preserved; canonicalization for identity happens later.
pub fn clean_attribute_value(value: &str) -> String {
    collapse_whitespace(value)
}

/// Joined text content of an element with whitespace collapsed.
pub fn element_text(element: &ElementRef) -> String {
    collapse_whitespace(&element.text().collect::<Vec<_>>().join(" "))
}
