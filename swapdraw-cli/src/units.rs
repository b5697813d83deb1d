use anyhow::{bail, Result};
use swapdraw_core::{TokenAmount, UNIT};

const DECIMALS: usize = 18;

/// Parses a whole-token amount such as `250` or `0.5` into base units.
pub fn parse_units(input: &str) -> Result<TokenAmount> {
    let input = input.trim().replace('_', "");
    let (whole, fraction) = input.split_once('.').unwrap_or((input.as_str(), ""));

    if whole.is_empty() && fraction.is_empty() {
        bail!("empty amount");
    }
    if !whole.chars().chain(fraction.chars()).all(|c| c.is_ascii_digit()) {
        bail!("invalid amount '{}'", input);
    }
    if fraction.len() > DECIMALS {
        bail!("at most {} decimal places are supported", DECIMALS);
    }

    let whole: TokenAmount = if whole.is_empty() { 0 } else { whole.parse()? };
    let fraction: TokenAmount = if fraction.is_empty() {
        0
    } else {
        format!("{:0<width$}", fraction, width = DECIMALS).parse()?
    };

    whole
        .checked_mul(UNIT)
        .and_then(|w| w.checked_add(fraction))
        .ok_or_else(|| anyhow::anyhow!("amount '{}' is too large", input))
}

/// Renders base units as tokens with up to four decimals.
pub fn format_units(amount: TokenAmount) -> String {
    let whole = amount / UNIT;
    let fraction = (amount % UNIT) / (UNIT / 10_000);
    if fraction == 0 {
        whole.to_string()
    } else {
        format!("{}.{:04}", whole, fraction)
            .trim_end_matches('0')
            .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_units() {
        assert_eq!(parse_units("1").unwrap(), UNIT);
        assert_eq!(parse_units("10_000").unwrap(), 10_000 * UNIT);
        assert_eq!(parse_units("0.5").unwrap(), UNIT / 2);
        assert_eq!(parse_units(".25").unwrap(), UNIT / 4);
        assert!(parse_units("").is_err());
        assert!(parse_units("1.2.3").is_err());
        assert!(parse_units("-1").is_err());
        assert!(parse_units("0.0000000000000000001").is_err());
    }

    #[test]
    fn test_format_units() {
        assert_eq!(format_units(1_500 * UNIT), "1500");
        assert_eq!(format_units(UNIT / 2), "0.5");
        assert_eq!(format_units(UNIT + UNIT / 10_000), "1.0001");
        assert_eq!(format_units(1), "0");
    }
}
