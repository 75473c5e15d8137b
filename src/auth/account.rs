//! NEAR account ID format.

pub const MIN_ACCOUNT_ID_LEN: usize = 2;
pub const MAX_ACCOUNT_ID_LEN: usize = 64;

/// Lowercase alphanumerics separated by single `-`, `_` or `.`, no leading
/// or trailing separator, 2 to 64 characters. Implicit (hex) accounts pass.
pub fn is_valid_account_id(account_id: &str) -> bool {
    if !(MIN_ACCOUNT_ID_LEN..=MAX_ACCOUNT_ID_LEN).contains(&account_id.len()) {
        return false;
    }

    let mut last_was_separator = true;
    for c in account_id.chars() {
        match c {
            'a'..='z' | '0'..='9' => last_was_separator = false,
            '-' | '_' | '.' => {
                if last_was_separator {
                    return false;
                }
                last_was_separator = true;
            }
            _ => return false,
        }
    }
    !last_was_separator
}
