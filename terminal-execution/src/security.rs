use crate::error::BrokerError;

const MONTH_CODES: &str = "FGHJKMNQUVXZ";

/// Encodes a quarterly-futures name `<Base>-<Month>.<YearTwoDigits>` (e.g.
/// `"Si-6.20"`) into the exchange symbol `<Base><MonthCode><LastDigitOfYear>`
/// (`"SiM0"`). Perpetual names (no `-`, typically suffixed `F`) pass through
/// unchanged. `CNY` is special-cased to base `CR`.
pub fn encode_security(name: &str) -> Result<String, BrokerError> {
    let Some((base, rest)) = name.split_once('-') else {
        return Ok(name.to_string());
    };

    let (month_str, year_str) = rest.split_once('.').ok_or_else(|| {
        BrokerError::InvalidSecurityName(name.to_string(), "missing '.' in month.year".into())
    })?;

    let month: usize = month_str
        .parse()
        .map_err(|_| BrokerError::InvalidSecurityName(name.to_string(), "bad month".into()))?;
    if !(1..=12).contains(&month) {
        return Err(BrokerError::InvalidSecurityName(
            name.to_string(),
            format!("month {month} out of range"),
        ));
    }

    let year: u32 = year_str
        .parse()
        .map_err(|_| BrokerError::InvalidSecurityName(name.to_string(), "bad year".into()))?;

    let month_code = MONTH_CODES.chars().nth(month - 1).expect("month in 1..=12");
    let base = if base.eq_ignore_ascii_case("CNY") {
        "CR"
    } else {
        base
    };

    Ok(format!("{base}{month_code}{}", year % 10))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_quarterly_future() {
        assert_eq!(encode_security("Si-6.20").unwrap(), "SiM0");
    }

    #[test]
    fn encodes_cny_special_case() {
        assert_eq!(encode_security("CNY-12.25").unwrap(), "CRZ5");
    }

    #[test]
    fn passes_perpetual_through_unchanged() {
        assert_eq!(encode_security("RTSF").unwrap(), "RTSF");
    }

    #[test]
    fn month_and_year_digit_round_trip() {
        for month in 1..=12u32 {
            for year in 0..100u32 {
                let encoded = encode_security(&format!("Si-{month}.{year:02}")).unwrap();
                let code = encoded.chars().nth(encoded.len() - 2).unwrap();
                let digit = encoded.chars().last().unwrap().to_digit(10).unwrap();
                assert_eq!(MONTH_CODES.chars().nth((month - 1) as usize).unwrap(), code);
                assert_eq!(year % 10, digit);
            }
        }
    }
}
