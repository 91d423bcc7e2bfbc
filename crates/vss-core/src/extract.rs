//! Speed field extraction.
//!
//! Accepts lines like `12.34`, `MPH:12.34` or `mph=12.34`: leading blanks and
//! any label text are skipped up to the first digit or sign, then the longest
//! decimal float at that position is parsed. Text after the number is ignored.

/// Returns the raw (unclamped) speed carried by `line`, if any.
pub fn extract_speed(line: &str) -> Option<f64> {
    let line = line.trim_start_matches([' ', '\t']);
    let start = line.find(|c: char| c.is_ascii_digit() || c == '+' || c == '-')?;
    let token = &line[start..];
    let len = float_token_len(token.as_bytes())?;
    token[..len].parse::<f64>().ok()
}

/// Length of the longest decimal float prefix of `bytes`.
fn float_token_len(bytes: &[u8]) -> Option<usize> {
    let digits_from = |mut i: usize| {
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        i
    };

    let mut end = match bytes.first() {
        Some(b'+' | b'-') => 1,
        _ => 0,
    };

    let int_end = digits_from(end);
    let mut mantissa_digits = int_end - end;
    end = int_end;

    if bytes.get(end) == Some(&b'.') {
        let frac_end = digits_from(end + 1);
        let frac_digits = frac_end - (end + 1);
        if mantissa_digits + frac_digits > 0 {
            mantissa_digits += frac_digits;
            end = frac_end;
        }
    }

    if mantissa_digits == 0 {
        return None;
    }

    if matches!(bytes.get(end), Some(b'e' | b'E')) {
        let mut exp = end + 1;
        if matches!(bytes.get(exp), Some(b'+' | b'-')) {
            exp += 1;
        }
        let exp_end = digits_from(exp);
        if exp_end > exp {
            end = exp_end;
        }
    }

    Some(end)
}
