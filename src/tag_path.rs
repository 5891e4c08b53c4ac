//! Tag address parsing.
//!
//! Addresses follow the grammar `[i=]SEGMENT(.SEGMENT)*` where a segment is a
//! name followed by zero or more bracketed decimal indices, e.g.
//! `Line3.Motor[2].Speed` or `i=StatusWord[5]`. The `i=` prefix selects bit
//! access on an integer host tag.
//!
//! Parsing never fails hard: malformed bracket content, negative numbers and
//! out-of-range indices simply report "no match" and callers fall back to
//! treating the address as a scalar name.

/// Prefix that designates bit access on an integer host tag.
pub const BIT_ACCESS_PREFIX: &str = "i=";

/// Splits a trailing `[N]` off the address.
///
/// Returns `Some((base, n))` only when the brackets were actually present and
/// well formed; `"Motor"` and `"Motor[x]"` both return `None`.
pub fn parse_bit(address: &str) -> Option<(&str, u32)> {
    let open = address.rfind('[')?;
    if !address.ends_with(']') || open + 1 >= address.len() - 1 {
        return None;
    }
    let index = address[open + 1..address.len() - 1].parse::<u32>().ok()?;
    let base = &address[..open];
    if base.is_empty() {
        return None;
    }
    Some((base, index))
}

/// Extracts the first `[N]` as the array start index.
///
/// `"Arr[12]"` yields `("Arr", 12)`; an address without a readable index
/// yields `(address, 0)`.
pub fn parse_array_start(address: &str) -> (&str, u32) {
    if let Some(open) = address.find('[') {
        if let Some(close) = address[open..].find(']') {
            if let Ok(index) = address[open + 1..open + close].parse::<u32>() {
                return (&address[..open], index);
            }
        }
    }
    (address, 0)
}

/// Parses an explicit bit-access address of the form `i=NAME[N]` or `i=NAME.N`.
///
/// Returns `Some((host, bit))` when the `i=` prefix is present and the tail
/// names a bit; `None` otherwise.
pub fn parse_bit_access(address: &str) -> Option<(&str, u32)> {
    let rest = address.strip_prefix(BIT_ACCESS_PREFIX)?;
    if let Some(hit) = parse_bit(rest) {
        return Some(hit);
    }
    // Dotted form: the final dotted component must be a plain number.
    let dot = rest.rfind('.')?;
    let bit = rest[dot + 1..].parse::<u32>().ok()?;
    let host = &rest[..dot];
    if host.is_empty() {
        return None;
    }
    Some((host, bit))
}

/// Appends `[start]` to `base` unless the base already carries an index.
pub fn normalize_array_name(base: &str, start: u32) -> String {
    if base.contains('[') {
        base.to_string()
    } else {
        format!("{}[{}]", base, start)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_bit_requires_brackets() {
        assert_eq!(parse_bit("Word[7]"), Some(("Word", 7)));
        assert_eq!(parse_bit("A.B[15]"), Some(("A.B", 15)));
        assert_eq!(parse_bit("Word"), None);
        assert_eq!(parse_bit("Word[]"), None);
        assert_eq!(parse_bit("Word[x]"), None);
        assert_eq!(parse_bit("Word[-3]"), None);
        assert_eq!(parse_bit("[5]"), None);
    }

    #[test]
    fn parse_bit_takes_the_last_bracket_group() {
        assert_eq!(parse_bit("Arr[3].Bits[9]"), Some(("Arr[3].Bits", 9)));
    }

    #[test]
    fn array_start_defaults_to_zero() {
        assert_eq!(parse_array_start("Arr[12]"), ("Arr", 12));
        assert_eq!(parse_array_start("Arr"), ("Arr", 0));
        assert_eq!(parse_array_start("Arr[oops]"), ("Arr[oops]", 0));
    }

    #[test]
    fn bit_access_accepts_bracket_and_dot_forms() {
        assert_eq!(parse_bit_access("i=Status[4]"), Some(("Status", 4)));
        assert_eq!(parse_bit_access("i=Status.4"), Some(("Status", 4)));
        assert_eq!(parse_bit_access("Status[4]"), None);
        assert_eq!(parse_bit_access("i=Status"), None);
        assert_eq!(parse_bit_access("i=.4"), None);
    }

    #[test]
    fn normalize_leaves_indexed_names_alone() {
        assert_eq!(normalize_array_name("Arr", 5), "Arr[5]");
        assert_eq!(normalize_array_name("Arr[2]", 5), "Arr[2]");
    }

    #[test]
    fn parse_reserialize_parse_is_stable() {
        for addr in ["Tank.Level[18]", "Plain", "A[0]"] {
            let (base, start) = parse_array_start(addr);
            let rebuilt = normalize_array_name(base, start);
            assert_eq!(parse_array_start(&rebuilt), (base, start));
        }
    }
}
