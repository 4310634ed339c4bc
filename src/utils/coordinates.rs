use crate::error::{ProcessingError, Result};
use serde::{Deserialize, Deserializer};

const EARTH_RADIUS_KM: f64 = 6371.0;

/// Convert a `DD:MM:SS` coordinate to decimal degrees.
///
/// A leading `-` or a trailing hemisphere letter (`S` or `W`) makes the
/// result negative.
///
/// # Examples
/// ```
/// use site_forcing::utils::dms_to_decimal;
///
/// let latitude = dms_to_decimal("42:32:16N").unwrap();
/// assert!((latitude - 42.537778).abs() < 0.000001);
///
/// let longitude = dms_to_decimal("72:10:17W").unwrap();
/// assert!((longitude + 72.171389).abs() < 0.000001);
/// ```
pub fn dms_to_decimal(dms: &str) -> Result<f64> {
    let trimmed = dms.trim();
    let invalid = |reason: String| ProcessingError::InvalidCoordinate(reason);

    let (body, hemisphere_negative) = match trimmed.chars().last() {
        Some(c @ ('N' | 'S' | 'E' | 'W' | 'n' | 's' | 'e' | 'w')) => (
            trimmed[..trimmed.len() - 1].trim_end(),
            matches!(c, 'S' | 'W' | 's' | 'w'),
        ),
        _ => (trimmed, false),
    };

    let parts: Vec<&str> = body.split(':').collect();
    let [degrees, minutes, seconds] = parts.as_slice() else {
        return Err(invalid(format!(
            "Invalid DMS format: '{}'. Expected 'DD:MM:SS' with optional N/S/E/W",
            dms
        )));
    };

    let field = |raw: &str, name: &str| {
        raw.trim()
            .parse::<f64>()
            .map_err(|_| invalid(format!("Invalid {} value '{}' in '{}'", name, raw, dms)))
    };
    let degrees_value = field(*degrees, "degrees")?;
    let minutes_value = field(*minutes, "minutes")?;
    let seconds_value = field(*seconds, "seconds")?;

    for (value, name) in [(minutes_value, "minutes"), (seconds_value, "seconds")] {
        if !(0.0..60.0).contains(&value) {
            return Err(invalid(format!(
                "{} must be in [0, 60), got {} in '{}'",
                name, value, dms
            )));
        }
    }

    let magnitude = degrees_value.abs() + minutes_value / 60.0 + seconds_value / 3600.0;
    if body.starts_with('-') || hemisphere_negative {
        Ok(-magnitude)
    } else {
        Ok(magnitude)
    }
}

/// Parse a coordinate given either as decimal degrees or as DMS.
pub fn parse_coordinate(coord_str: &str) -> Result<f64> {
    let trimmed = coord_str.trim();
    if trimmed.contains(':') {
        return dms_to_decimal(trimmed);
    }
    trimmed.parse::<f64>().map_err(|_| {
        ProcessingError::InvalidCoordinate(format!("Invalid coordinate value: '{}'", coord_str))
    })
}

/// Serde helper accepting a coordinate as a number or a decimal/DMS string.
pub fn deserialize_coordinate<'de, D>(deserializer: D) -> std::result::Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(f64),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Number(value) => Ok(value),
        Raw::Text(text) => parse_coordinate(&text).map_err(serde::de::Error::custom),
    }
}

/// Great-circle distance in kilometres (haversine).
pub fn haversine_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let (phi1, phi2) = (lat1.to_radians(), lat2.to_radians());
    let half_dphi = (lat2 - lat1).to_radians() / 2.0;
    let half_dlambda = (lon2 - lon1).to_radians() / 2.0;

    let h = half_dphi.sin().powi(2) + phi1.cos() * phi2.cos() * half_dlambda.sin().powi(2);
    2.0 * EARTH_RADIUS_KM * h.sqrt().min(1.0).asin()
}
