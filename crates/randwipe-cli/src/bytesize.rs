//! Human byte-size parsing for CLI flags.
//!
//! Grammar: a decimal integer with an optional `K`, `M`, `G` or `T`
//! suffix, each a factor of 1024 over the previous. `100M` is
//! 104857600 bytes.

/// Parse a byte count like `4096`, `100M` or `2t`.
pub fn parse_size(input: &str) -> Result<u64, String> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err("empty size".into());
    }

    let (digits, multiplier) = match trimmed.chars().last().unwrap() {
        'k' | 'K' => (&trimmed[..trimmed.len() - 1], 1u64 << 10),
        'm' | 'M' => (&trimmed[..trimmed.len() - 1], 1u64 << 20),
        'g' | 'G' => (&trimmed[..trimmed.len() - 1], 1u64 << 30),
        't' | 'T' => (&trimmed[..trimmed.len() - 1], 1u64 << 40),
        _ => (trimmed, 1u64),
    };

    let value: u64 = digits
        .parse()
        .map_err(|_| format!("invalid size '{input}'"))?;
    value
        .checked_mul(multiplier)
        .ok_or_else(|| format!("size '{input}' overflows"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_number() {
        assert_eq!(parse_size("0").unwrap(), 0);
        assert_eq!(parse_size("4096").unwrap(), 4096);
    }

    #[test]
    fn test_suffixes_multiply_by_1024() {
        assert_eq!(parse_size("1K").unwrap(), 1024);
        assert_eq!(parse_size("100M").unwrap(), 100 * 1024 * 1024);
        assert_eq!(parse_size("2G").unwrap(), 2 * 1024 * 1024 * 1024);
        assert_eq!(parse_size("1T").unwrap(), 1 << 40);
    }

    #[test]
    fn test_lowercase_suffixes() {
        assert_eq!(parse_size("1k").unwrap(), 1024);
        assert_eq!(parse_size("3m").unwrap(), 3 * 1024 * 1024);
    }

    #[test]
    fn test_surrounding_whitespace() {
        assert_eq!(parse_size(" 8K ").unwrap(), 8192);
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(parse_size("").is_err());
        assert!(parse_size("M").is_err());
        assert!(parse_size("12Q").is_err());
        assert!(parse_size("1.5G").is_err());
        assert!(parse_size("-1").is_err());
        assert!(parse_size("12 34").is_err());
    }

    #[test]
    fn test_rejects_overflow() {
        assert!(parse_size("99999999999T").is_err());
        assert!(parse_size("18446744073709551616").is_err());
    }
}
