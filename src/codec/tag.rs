//! Column type tags: `"String"`, `"List<Integer>"`, ...

use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{Error, Result};
use crate::model::{ColumnType, Kind};

const LIST_PREFIX: &str = "List<";
const LIST_SUFFIX: &str = ">";

/// Render a column type as its tag
pub fn encode(column_type: ColumnType) -> String {
    match column_type {
        ColumnType::Scalar(kind) => kind.name().to_string(),
        ColumnType::List(kind) => format!("{}{}{}", LIST_PREFIX, kind.name(), LIST_SUFFIX),
    }
}

/// Resolve a tag back to a column type.
///
/// Tags are case-sensitive and lists nest at most one level.
pub fn decode(tag: &str) -> Result<ColumnType> {
    let unresolved = || Error::SchemaResolution {
        tag: tag.to_string(),
    };

    if let Some(inner) = tag
        .strip_prefix(LIST_PREFIX)
        .and_then(|rest| rest.strip_suffix(LIST_SUFFIX))
    {
        let kind = inner.parse::<Kind>().map_err(|_| unresolved())?;
        return Ok(ColumnType::List(kind));
    }

    tag.parse::<Kind>()
        .map(ColumnType::Scalar)
        .map_err(|_| unresolved())
}

impl std::fmt::Display for ColumnType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&encode(*self))
    }
}

impl FromStr for ColumnType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        decode(s)
    }
}

impl Serialize for ColumnType {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&encode(*self))
    }
}

impl<'de> Deserialize<'de> for ColumnType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let tag = String::deserialize(deserializer)?;
        decode(&tag).map_err(serde::de::Error::custom)
    }
}
