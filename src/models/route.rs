// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Route history model.

use chrono::{DateTime, Utc};
use serde::de::{self, IgnoredAny, MapAccess, SeqAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;
use std::fmt;

/// One completed route, stored at `users/{user_id}/route_history/{auto_id}`.
///
/// Mirrors the directions payload the app saves, so every nested
/// field may be absent. Malformed measurements and destinations read as
/// absent instead of failing the whole entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteHistoryEntry {
    /// When the route was recorded
    #[serde(with = "firestore::serialize_as_timestamp")]
    pub created_at: DateTime<Utc>,
    /// Route length in meters
    #[serde(default, deserialize_with = "deserialize_measurement")]
    pub distance: Option<Measurement>,
    /// Route duration in seconds
    #[serde(default, deserialize_with = "deserialize_measurement")]
    pub duration: Option<Measurement>,
    /// Destination of the route
    #[serde(default, deserialize_with = "deserialize_end_location")]
    pub end_location: Option<EndLocation>,
}

/// A `{ value }` measurement as returned by the directions API.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Measurement {
    #[serde(default)]
    pub value: Option<f64>,
}

/// Route destination.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EndLocation {
    #[serde(default)]
    pub place_id: Option<String>,
}

impl RouteHistoryEntry {
    pub fn new(
        created_at: DateTime<Utc>,
        distance_meters: f64,
        duration_seconds: f64,
        place_id: Option<&str>,
    ) -> Self {
        Self {
            created_at,
            distance: Some(Measurement {
                value: Some(distance_meters),
            }),
            duration: Some(Measurement {
                value: Some(duration_seconds),
            }),
            end_location: place_id.map(|id| EndLocation {
                place_id: Some(id.to_string()),
            }),
        }
    }

    /// Distance in meters, 0 when missing.
    pub fn distance_meters(&self) -> f64 {
        self.distance.as_ref().and_then(|d| d.value).unwrap_or(0.0)
    }

    /// Duration in seconds, 0 when missing.
    pub fn duration_seconds(&self) -> f64 {
        self.duration.as_ref().and_then(|d| d.value).unwrap_or(0.0)
    }

    /// Destination place ID, if one was recorded.
    pub fn destination(&self) -> Option<&str> {
        self.end_location
            .as_ref()
            .and_then(|loc| loc.place_id.as_deref())
            .filter(|id| !id.is_empty())
    }
}

/// Any stored value, reduced to the two shapes route entries care about.
enum LooseValue {
    Number(f64),
    Text(String),
    Other,
}

impl LooseValue {
    fn as_number(&self) -> Option<f64> {
        match self {
            LooseValue::Number(n) if n.is_finite() => Some(*n),
            _ => None,
        }
    }

    fn into_text(self) -> Option<String> {
        match self {
            LooseValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl<'de> Deserialize<'de> for LooseValue {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(LooseValueVisitor)
    }
}

struct LooseValueVisitor;

impl<'de> Visitor<'de> for LooseValueVisitor {
    type Value = LooseValue;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("any value")
    }

    fn visit_bool<E: de::Error>(self, _: bool) -> Result<LooseValue, E> {
        Ok(LooseValue::Other)
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<LooseValue, E> {
        Ok(LooseValue::Number(v as f64))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<LooseValue, E> {
        Ok(LooseValue::Number(v as f64))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<LooseValue, E> {
        Ok(LooseValue::Number(v))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<LooseValue, E> {
        Ok(LooseValue::Text(v.to_string()))
    }

    fn visit_string<E: de::Error>(self, v: String) -> Result<LooseValue, E> {
        Ok(LooseValue::Text(v))
    }

    fn visit_bytes<E: de::Error>(self, _: &[u8]) -> Result<LooseValue, E> {
        Ok(LooseValue::Other)
    }

    fn visit_unit<E: de::Error>(self) -> Result<LooseValue, E> {
        Ok(LooseValue::Other)
    }

    fn visit_none<E: de::Error>(self) -> Result<LooseValue, E> {
        Ok(LooseValue::Other)
    }

    fn visit_some<D>(self, deserializer: D) -> Result<LooseValue, D::Error>
    where
        D: Deserializer<'de>,
    {
        LooseValue::deserialize(deserializer)
    }

    fn visit_seq<A>(self, mut seq: A) -> Result<LooseValue, A::Error>
    where
        A: SeqAccess<'de>,
    {
        while seq.next_element::<IgnoredAny>()?.is_some() {}
        Ok(LooseValue::Other)
    }

    fn visit_map<A>(self, mut map: A) -> Result<LooseValue, A::Error>
    where
        A: MapAccess<'de>,
    {
        while map.next_entry::<IgnoredAny, IgnoredAny>()?.is_some() {}
        Ok(LooseValue::Other)
    }
}

/// Fields of a nested map, or `None` when the value is not a map.
struct LooseObject(Option<HashMap<String, LooseValue>>);

impl<'de> Deserialize<'de> for LooseObject {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(LooseObjectVisitor)
    }
}

struct LooseObjectVisitor;

impl<'de> Visitor<'de> for LooseObjectVisitor {
    type Value = LooseObject;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("any value")
    }

    fn visit_map<A>(self, mut map: A) -> Result<LooseObject, A::Error>
    where
        A: MapAccess<'de>,
    {
        let mut fields = HashMap::new();
        while let Some((key, value)) = map.next_entry::<String, LooseValue>()? {
            fields.insert(key, value);
        }
        Ok(LooseObject(Some(fields)))
    }

    fn visit_some<D>(self, deserializer: D) -> Result<LooseObject, D::Error>
    where
        D: Deserializer<'de>,
    {
        LooseObject::deserialize(deserializer)
    }

    fn visit_bool<E: de::Error>(self, _: bool) -> Result<LooseObject, E> {
        Ok(LooseObject(None))
    }

    fn visit_i64<E: de::Error>(self, _: i64) -> Result<LooseObject, E> {
        Ok(LooseObject(None))
    }

    fn visit_u64<E: de::Error>(self, _: u64) -> Result<LooseObject, E> {
        Ok(LooseObject(None))
    }

    fn visit_f64<E: de::Error>(self, _: f64) -> Result<LooseObject, E> {
        Ok(LooseObject(None))
    }

    fn visit_str<E: de::Error>(self, _: &str) -> Result<LooseObject, E> {
        Ok(LooseObject(None))
    }

    fn visit_bytes<E: de::Error>(self, _: &[u8]) -> Result<LooseObject, E> {
        Ok(LooseObject(None))
    }

    fn visit_unit<E: de::Error>(self) -> Result<LooseObject, E> {
        Ok(LooseObject(None))
    }

    fn visit_none<E: de::Error>(self) -> Result<LooseObject, E> {
        Ok(LooseObject(None))
    }

    fn visit_seq<A>(self, mut seq: A) -> Result<LooseObject, A::Error>
    where
        A: SeqAccess<'de>,
    {
        while seq.next_element::<IgnoredAny>()?.is_some() {}
        Ok(LooseObject(None))
    }
}

/// `{ value: number }`; anything else reads as a missing value.
fn deserialize_measurement<'de, D>(deserializer: D) -> Result<Option<Measurement>, D::Error>
where
    D: Deserializer<'de>,
{
    let LooseObject(fields) = LooseObject::deserialize(deserializer)?;
    Ok(fields.map(|fields| Measurement {
        value: fields.get("value").and_then(LooseValue::as_number),
    }))
}

/// `{ place_id: string }`; a non-string place ID reads as missing.
fn deserialize_end_location<'de, D>(deserializer: D) -> Result<Option<EndLocation>, D::Error>
where
    D: Deserializer<'de>,
{
    let LooseObject(fields) = LooseObject::deserialize(deserializer)?;
    Ok(fields.map(|mut fields| EndLocation {
        place_id: fields.remove("place_id").and_then(LooseValue::into_text),
    }))
}
