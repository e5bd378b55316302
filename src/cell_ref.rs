//! Utilities for spreadsheet-style cell references ("B7", "AA12").

/// Parse a cell reference from raw bytes (ASCII) into (col, row), both 0-indexed.
///
/// Works directly on quick-xml attribute values. `$` anchors are ignored.
/// Returns `None` unless the reference has both a column and a row part.
pub fn parse_cell_ref_bytes(ref_bytes: &[u8]) -> Option<(u32, u32)> {
    let mut col: u32 = 0;
    let mut row: u32 = 0;
    let mut saw_col = false;
    let mut saw_row = false;

    for &b in ref_bytes {
        if b == b'$' {
            continue;
        }
        if b.is_ascii_alphabetic() {
            if saw_row {
                return None;
            }
            let upper = b.to_ascii_uppercase();
            col = col
                .saturating_mul(26)
                .saturating_add(u32::from(upper - b'A') + 1);
            saw_col = true;
        } else if b.is_ascii_digit() {
            row = row.saturating_mul(10).saturating_add(u32::from(b - b'0'));
            saw_row = true;
        } else {
            return None;
        }
    }

    if !saw_col || !saw_row || row == 0 {
        return None;
    }

    Some((col - 1, row - 1))
}

/// String form of [`parse_cell_ref_bytes`].
pub fn parse_cell_ref(cell_ref: &str) -> Option<(u32, u32)> {
    parse_cell_ref_bytes(cell_ref.trim().as_bytes())
}

/// Convert a 0-based column index to letters (A, B, ..., Z, AA, AB, ...).
pub fn col_to_letter(col: u32) -> String {
    let mut letters = Vec::new();
    let mut n = u64::from(col) + 1;
    while n > 0 {
        n -= 1;
        let rem = u8::try_from(n % 26).unwrap_or(0);
        letters.push(char::from(b'A' + rem));
        n /= 26;
    }
    letters.iter().rev().collect()
}
