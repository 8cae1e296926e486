use alloy_primitives::U256;

/// Pad a U256 to 78 digits so lexical order is numeric order.
/// U256 max is approximately 10^77, so 78 digits is sufficient.
pub fn pad_amount(amount: &U256) -> String {
    format!("{amount:0>78}")
}

pub fn parse_amount(padded: &str) -> Result<U256, alloy_primitives::ruint::ParseError> {
    let trimmed = padded.trim_start_matches('0');
    if trimmed.is_empty() {
        Ok(U256::ZERO)
    } else {
        U256::from_str_radix(trimmed, 10)
    }
}

/// Read a padded amount column inside a rusqlite row mapper.
pub fn amount_column(row: &rusqlite::Row, column: &str) -> rusqlite::Result<U256> {
    let padded: String = row.get(column)?;
    parse_amount(&padded).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(
            row.as_ref().column_index(column).unwrap_or_default(),
            rusqlite::types::Type::Text,
            Box::new(e),
        )
    })
}
