use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Axis::X => "X",
            Axis::Y => "Y",
        })
    }
}

/// Why a typed global coordinate was rejected. Reported per field so the
/// entry form can highlight the offending box.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CoordInputError {
    #[error("global {axis} is empty")]
    Empty { axis: Axis },
    #[error("global {axis} `{text}` is not a number")]
    NotANumber { axis: Axis, text: String },
    #[error("global {axis} must be finite")]
    NotFinite { axis: Axis },
}

impl CoordInputError {
    pub fn axis(&self) -> Axis {
        match self {
            CoordInputError::Empty { axis }
            | CoordInputError::NotANumber { axis, .. }
            | CoordInputError::NotFinite { axis } => *axis,
        }
    }
}

fn parse_field(text: &str, axis: Axis) -> Result<f64, CoordInputError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(CoordInputError::Empty { axis });
    }
    let value: f64 = text.parse().map_err(|_| CoordInputError::NotANumber {
        axis,
        text: text.to_string(),
    })?;
    if !value.is_finite() {
        return Err(CoordInputError::NotFinite { axis });
    }
    Ok(value)
}

/// Parse the two text fields of the coordinate-entry form. X is checked
/// first.
pub fn parse_global_coords(x_text: &str, y_text: &str) -> Result<[f64; 2], CoordInputError> {
    Ok([parse_field(x_text, Axis::X)?, parse_field(y_text, Axis::Y)?])
}
