//! Numeric cell cleaning

/// Coerce a report cell to a number.
///
/// Blank, whitespace-only, unparseable and non-finite cells are `0.0`. The
/// upstream export is unreliable enough that a zero is preferred over an
/// error that would stop the whole cascade.
pub fn parse_number_or_zero(cell: &str) -> f64 {
    let cell = cell.trim();
    if cell.is_empty() {
        return 0.0;
    }
    match cell.parse::<f64>() {
        Ok(value) if value.is_finite() => value,
        _ => 0.0,
    }
}
