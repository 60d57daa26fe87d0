use rust_decimal::Decimal;
use serde::Deserialize;

/// Reads a decimal from its CSV text rather than through a float, so
/// `2.5` and `0.1` arrive exactly as written.
pub(crate) fn deserialize_decimal<'de, D>(deserializer: D) -> Result<Decimal, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    s.trim().parse::<Decimal>().map_err(serde::de::Error::custom)
}
