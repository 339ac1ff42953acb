//! A1 notation helpers.

use crate::error::ReportError;

/// Zero-based index of a column given in letters (`"A"` -> 0, `"AA"` -> 26).
pub fn column_index(letters: &str) -> Result<u32, ReportError> {
    let trimmed = letters.trim();
    if trimmed.is_empty() || !trimmed.chars().all(|ch| ch.is_ascii_alphabetic()) {
        return Err(ReportError::InvalidRequest(format!(
            "invalid column: {letters:?}"
        )));
    }
    let mut index: u32 = 0;
    for ch in trimmed.chars() {
        let digit = ch.to_ascii_uppercase() as u32 - 'A' as u32 + 1;
        index = index
            .checked_mul(26)
            .and_then(|value| value.checked_add(digit))
            .ok_or_else(|| ReportError::InvalidRequest(format!("column out of range: {letters}")))?;
    }
    Ok(index - 1)
}

pub fn column_letters(index: u32) -> String {
    let mut n = index as u64 + 1;
    let mut letters = Vec::new();
    while n > 0 {
        let rem = ((n - 1) % 26) as u8;
        letters.push((b'A' + rem) as char);
        n = (n - 1) / 26;
    }
    letters.iter().rev().collect()
}

pub fn quote_sheet(title: &str) -> String {
    format!("'{}'", title.replace('\'', "''"))
}

pub fn cell(sheet: &str, column: &str, row: u32) -> String {
    format!("{}!{}{}", quote_sheet(sheet), column.to_ascii_uppercase(), row)
}

pub fn range(sheet: &str, from: (&str, u32), to: (&str, u32)) -> String {
    format!(
        "{}!{}{}:{}{}",
        quote_sheet(sheet),
        from.0.to_ascii_uppercase(),
        from.1,
        to.0.to_ascii_uppercase(),
        to.1
    )
}

/// Escapes a literal for use inside a formula string argument.
pub fn formula_string(value: &str) -> String {
    format!("\"{}\"", value.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn letters_and_indices() {
        assert_eq!(column_index("A").unwrap(), 0);
        assert_eq!(column_index("z").unwrap(), 25);
        assert_eq!(column_index("AA").unwrap(), 26);
        assert_eq!(column_letters(0), "A");
        assert_eq!(column_letters(27), "AB");
        assert_eq!(column_letters(column_index("XFD").unwrap()), "XFD");
        assert!(column_index("").is_err());
        assert!(column_index("A1").is_err());
    }

    #[test]
    fn quoted_ranges() {
        assert_eq!(cell("Data", "b", 11), "'Data'!B11");
        assert_eq!(range("Bob's", ("A", 1), ("C", 3)), "'Bob''s'!A1:C3");
        assert_eq!(formula_string("say \"hi\""), "\"say \"\"hi\"\"\"");
    }
}
