use crate::X402Error;

/// Convert a human price such as `"$0.001"` into atomic token units.
///
/// Integer arithmetic only. Fraction digits beyond `decimals` are truncated.
pub fn parse_price(price: &str, decimals: u32) -> Result<String, X402Error> {
    let invalid = |why: &str| X402Error::ConfigError(format!("invalid price '{price}': {why}"));

    let cleaned = price.trim();
    let cleaned = cleaned.strip_prefix('$').unwrap_or(cleaned).trim();
    if cleaned.is_empty() || cleaned == "." {
        return Err(invalid("no numeric content"));
    }
    if !cleaned.bytes().all(|b| b.is_ascii_digit() || b == b'.') {
        return Err(invalid("unexpected characters"));
    }

    let (integer_part, fractional_part) = cleaned.split_once('.').unwrap_or((cleaned, ""));
    if fractional_part.contains('.') {
        return Err(invalid("more than one decimal point"));
    }

    let multiplier = 10u64
        .checked_pow(decimals)
        .ok_or_else(|| invalid("too many token decimals"))?;

    let integer: u64 = if integer_part.is_empty() {
        0
    } else {
        integer_part.parse().map_err(|_| invalid("overflow"))?
    };

    let width = decimals as usize;
    let frac_digits = &fractional_part[..fractional_part.len().min(width)];
    let fractional: u64 = if frac_digits.is_empty() {
        0
    } else {
        let scale = 10u64.pow((width - frac_digits.len()) as u32);
        frac_digits
            .parse::<u64>()
            .map_err(|_| invalid("overflow"))?
            .checked_mul(scale)
            .ok_or_else(|| invalid("overflow"))?
    };

    let amount = integer
        .checked_mul(multiplier)
        .and_then(|whole| whole.checked_add(fractional))
        .ok_or_else(|| invalid("overflow"))?;
    Ok(amount.to_string())
}
