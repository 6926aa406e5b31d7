//! Component props and their wire format.
//!
//! Props handed to a hydrated island travel to the browser as JSON. Values
//! JSON cannot represent directly (dates, maps, bigints, ...) are wrapped in
//! `[tag, payload]` tuples so the client can revive them:
//!
//! | tag | kind        | payload                               |
//! |-----|-------------|---------------------------------------|
//! | 0   | value       | primitive, or object of tagged values |
//! | 1   | JSON array  | list of tagged values                 |
//! | 2   | RegExp      | pattern source                        |
//! | 3   | Date        | ISO-8601 string                       |
//! | 4   | Map         | list of tagged `[key, value]` arrays  |
//! | 5   | Set         | list of tagged values                 |
//! | 6   | BigInt      | decimal string                        |
//! | 7   | URL         | href                                  |
//! | 8   | Uint8Array  | list of numbers                       |
//! | 9   | Uint16Array | list of numbers                       |
//! | 10  | Uint32Array | list of numbers                       |
//! | 11  | Infinity    | `1` or `-1`                           |
//!
//! `undefined` is the one-element tuple `[0]`. RegExp flags are not carried.

use serde_json::{Map, Number, Value};

use crate::PropsError;

const TAG_VALUE: u64 = 0;
const TAG_JSON: u64 = 1;
const TAG_REGEXP: u64 = 2;
const TAG_DATE: u64 = 3;
const TAG_MAP: u64 = 4;
const TAG_SET: u64 = 5;
const TAG_BIGINT: u64 = 6;
const TAG_URL: u64 = 7;
const TAG_UINT8_ARRAY: u64 = 8;
const TAG_UINT16_ARRAY: u64 = 9;
const TAG_UINT32_ARRAY: u64 = 10;
const TAG_INFINITY: u64 = 11;

/// Largest integer a JS number holds exactly.
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

/// A JavaScript-level value.
#[derive(Debug, Clone, PartialEq)]
pub enum PropValue {
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    BigInt(i128),
    Array(Vec<PropValue>),
    Object(Props),
    /// Milliseconds since the Unix epoch.
    Date(i64),
    RegExp { source: String, flags: String },
    Map(Vec<(PropValue, PropValue)>),
    Set(Vec<PropValue>),
    Url(String),
    Uint8Array(Vec<u8>),
    Uint16Array(Vec<u16>),
    Uint32Array(Vec<u32>),
}

impl PropValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// JavaScript truthiness.
    pub fn is_truthy(&self) -> bool {
        match self {
            PropValue::Undefined | PropValue::Null => false,
            PropValue::Bool(b) => *b,
            PropValue::Number(n) => *n != 0.0 && !n.is_nan(),
            PropValue::String(s) => !s.is_empty(),
            PropValue::BigInt(n) => *n != 0,
            _ => true,
        }
    }
}

impl From<&str> for PropValue {
    fn from(value: &str) -> Self {
        PropValue::String(value.to_string())
    }
}

impl From<String> for PropValue {
    fn from(value: String) -> Self {
        PropValue::String(value)
    }
}

impl From<bool> for PropValue {
    fn from(value: bool) -> Self {
        PropValue::Bool(value)
    }
}

impl From<f64> for PropValue {
    fn from(value: f64) -> Self {
        PropValue::Number(value)
    }
}

impl From<i32> for PropValue {
    fn from(value: i32) -> Self {
        PropValue::Number(f64::from(value))
    }
}

impl From<Props> for PropValue {
    fn from(value: Props) -> Self {
        PropValue::Object(value)
    }
}

impl From<Vec<PropValue>> for PropValue {
    fn from(value: Vec<PropValue>) -> Self {
        PropValue::Array(value)
    }
}

/// An insertion-ordered property bag.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Props(Vec<(String, PropValue)>);

impl Props {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `key`, keeping its original position when it already exists.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<PropValue>) {
        let key = key.into();
        let value = value.into();
        match self.0.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.0.push((key, value)),
        }
    }

    /// Builder form of [`Props::insert`].
    pub fn with(mut self, key: impl Into<String>, value: impl Into<PropValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&PropValue> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn remove(&mut self, key: &str) -> Option<PropValue> {
        let index = self.0.iter().position(|(k, _)| k == key)?;
        Some(self.0.remove(index).1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PropValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>> FromIterator<(K, PropValue)> for Props {
    fn from_iter<I: IntoIterator<Item = (K, PropValue)>>(iter: I) -> Self {
        let mut props = Props::new();
        for (k, v) in iter {
            props.insert(k, v);
        }
        props
    }
}

impl IntoIterator for Props {
    type Item = (String, PropValue);
    type IntoIter = std::vec::IntoIter<(String, PropValue)>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

// ---------------------------------------------------------------------------
// Serialization
// ---------------------------------------------------------------------------

/// Serialize props into the wire string placed in an island's `props`
/// attribute.
pub fn serialize_props(props: &Props) -> String {
    Value::Object(serialize_object(props)).to_string()
}

/// Revive props from their wire string.
pub fn deserialize_props(wire: &str) -> Result<Props, PropsError> {
    match serde_json::from_str::<Value>(wire)? {
        Value::Object(map) => deserialize_object(&map),
        _ => Err(PropsError::Payload { kind: "props" }),
    }
}

/// Serialize a single value into its `[tag, payload]` tuple.
pub fn serialize_value(value: &PropValue) -> Value {
    let tagged = |tag: u64, payload: Value| Value::Array(vec![Value::from(tag), payload]);
    match value {
        PropValue::Undefined => Value::Array(vec![Value::from(TAG_VALUE)]),
        PropValue::Null => tagged(TAG_VALUE, Value::Null),
        PropValue::Bool(b) => tagged(TAG_VALUE, Value::Bool(*b)),
        PropValue::Number(n) if n.is_infinite() => {
            tagged(TAG_INFINITY, Value::from(if *n > 0.0 { 1 } else { -1 }))
        }
        PropValue::Number(n) => tagged(TAG_VALUE, number(*n)),
        PropValue::String(s) => tagged(TAG_VALUE, Value::String(s.clone())),
        PropValue::Object(props) => tagged(TAG_VALUE, Value::Object(serialize_object(props))),
        PropValue::Array(items) => tagged(TAG_JSON, serialize_array(items)),
        PropValue::RegExp { source, .. } => tagged(TAG_REGEXP, Value::String(source.clone())),
        PropValue::Date(ms) => tagged(TAG_DATE, Value::String(format_iso_date(*ms))),
        PropValue::Map(entries) => {
            let pairs = entries
                .iter()
                .map(|(k, v)| {
                    serialize_value(&PropValue::Array(vec![k.clone(), v.clone()]))
                })
                .collect();
            tagged(TAG_MAP, Value::Array(pairs))
        }
        PropValue::Set(items) => tagged(TAG_SET, serialize_array(items)),
        PropValue::BigInt(n) => tagged(TAG_BIGINT, Value::String(n.to_string())),
        PropValue::Url(href) => tagged(TAG_URL, Value::String(href.clone())),
        PropValue::Uint8Array(items) => tagged(TAG_UINT8_ARRAY, items.iter().copied().collect()),
        PropValue::Uint16Array(items) => {
            tagged(TAG_UINT16_ARRAY, items.iter().copied().collect())
        }
        PropValue::Uint32Array(items) => {
            tagged(TAG_UINT32_ARRAY, items.iter().copied().collect())
        }
    }
}

/// Revive a single value from its `[tag, payload]` tuple.
pub fn deserialize_value(value: &Value) -> Result<PropValue, PropsError> {
    let Some(tuple) = value.as_array() else {
        return Err(PropsError::Payload { kind: "tuple" });
    };
    let Some(tag) = tuple.first().and_then(Value::as_u64) else {
        return Err(PropsError::Payload { kind: "tag" });
    };
    let payload = tuple.get(1);

    match (tag, payload) {
        (TAG_VALUE, None) => Ok(PropValue::Undefined),
        (TAG_VALUE, Some(Value::Object(map))) => Ok(PropValue::Object(deserialize_object(map)?)),
        (TAG_VALUE, Some(plain)) => Ok(plain_value(plain)),
        (TAG_JSON, Some(Value::Array(items))) => Ok(PropValue::Array(deserialize_array(items)?)),
        (TAG_REGEXP, Some(Value::String(source))) => Ok(PropValue::RegExp {
            source: source.clone(),
            flags: String::new(),
        }),
        (TAG_DATE, Some(Value::String(iso))) => parse_iso_date(iso)
            .map(PropValue::Date)
            .ok_or_else(|| PropsError::InvalidDate(iso.clone())),
        (TAG_MAP, Some(Value::Array(items))) => {
            let mut entries = Vec::with_capacity(items.len());
            for item in items {
                match deserialize_value(item)? {
                    PropValue::Array(pair) if pair.len() == 2 => {
                        let mut pair = pair.into_iter();
                        if let (Some(k), Some(v)) = (pair.next(), pair.next()) {
                            entries.push((k, v));
                        }
                    }
                    _ => return Err(PropsError::Payload { kind: "Map entry" }),
                }
            }
            Ok(PropValue::Map(entries))
        }
        (TAG_SET, Some(Value::Array(items))) => Ok(PropValue::Set(deserialize_array(items)?)),
        (TAG_BIGINT, Some(Value::String(digits))) => digits
            .parse()
            .map(PropValue::BigInt)
            .map_err(|_| PropsError::InvalidBigInt(digits.clone())),
        (TAG_URL, Some(Value::String(href))) => Ok(PropValue::Url(href.clone())),
        (TAG_UINT8_ARRAY, Some(Value::Array(items))) => {
            typed_array(items, "Uint8Array").map(PropValue::Uint8Array)
        }
        (TAG_UINT16_ARRAY, Some(Value::Array(items))) => {
            typed_array(items, "Uint16Array").map(PropValue::Uint16Array)
        }
        (TAG_UINT32_ARRAY, Some(Value::Array(items))) => {
            typed_array(items, "Uint32Array").map(PropValue::Uint32Array)
        }
        (TAG_INFINITY, Some(sign)) => match sign.as_f64() {
            Some(s) if s < 0.0 => Ok(PropValue::Number(f64::NEG_INFINITY)),
            Some(_) => Ok(PropValue::Number(f64::INFINITY)),
            None => Err(PropsError::Payload { kind: "Infinity" }),
        },
        (TAG_VALUE..=TAG_INFINITY, _) => Err(PropsError::Payload {
            kind: tag_name(tag),
        }),
        (tag, _) => Err(PropsError::UnknownTag(tag)),
    }
}

fn serialize_object(props: &Props) -> Map<String, Value> {
    props
        .iter()
        .map(|(k, v)| (k.to_string(), serialize_value(v)))
        .collect()
}

fn serialize_array(items: &[PropValue]) -> Value {
    Value::Array(items.iter().map(serialize_value).collect())
}

fn deserialize_object(map: &Map<String, Value>) -> Result<Props, PropsError> {
    let mut props = Props::new();
    for (k, v) in map {
        props.insert(k.clone(), deserialize_value(v)?);
    }
    Ok(props)
}

fn deserialize_array(items: &[Value]) -> Result<Vec<PropValue>, PropsError> {
    items.iter().map(deserialize_value).collect()
}

/// A JSON value carried under the `value` tag without further tagging.
fn plain_value(value: &Value) -> PropValue {
    match value {
        Value::Null => PropValue::Null,
        Value::Bool(b) => PropValue::Bool(*b),
        Value::Number(n) => PropValue::Number(n.as_f64().unwrap_or(f64::NAN)),
        Value::String(s) => PropValue::String(s.clone()),
        Value::Array(items) => PropValue::Array(items.iter().map(plain_value).collect()),
        Value::Object(map) => PropValue::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), plain_value(v)))
                .collect(),
        ),
    }
}

fn typed_array<T: TryFrom<u64>>(items: &[Value], kind: &'static str) -> Result<Vec<T>, PropsError> {
    items
        .iter()
        .map(|item| {
            item.as_u64()
                .and_then(|n| T::try_from(n).ok())
                .ok_or(PropsError::Payload { kind })
        })
        .collect()
}

/// JSON number for a JS number. Integral values print without a fraction
/// and NaN becomes `null`, as `JSON.stringify` does.
fn number(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() <= MAX_SAFE_INTEGER {
        Value::from(n as i64)
    } else {
        Number::from_f64(n).map_or(Value::Null, Value::Number)
    }
}

fn tag_name(tag: u64) -> &'static str {
    match tag {
        TAG_VALUE => "value",
        TAG_JSON => "JSON",
        TAG_REGEXP => "RegExp",
        TAG_DATE => "Date",
        TAG_MAP => "Map",
        TAG_SET => "Set",
        TAG_BIGINT => "BigInt",
        TAG_URL => "URL",
        TAG_UINT8_ARRAY => "Uint8Array",
        TAG_UINT16_ARRAY => "Uint16Array",
        TAG_UINT32_ARRAY => "Uint32Array",
        _ => "Infinity",
    }
}

// ---------------------------------------------------------------------------
// Dates
// ---------------------------------------------------------------------------

const MS_PER_DAY: i64 = 86_400_000;

/// Days since 1970-01-01 for a proleptic Gregorian date.
fn days_from_civil(year: i64, month: i64, day: i64) -> i64 {
    let y = if month <= 2 { year - 1 } else { year };
    let era = y.div_euclid(400);
    let yoe = y - era * 400;
    let mp = (month + 9) % 12;
    let doy = (153 * mp + 2) / 5 + day - 1;
    let doe = yoe * 365 + yoe / 4 - yoe / 100 + doy;
    era * 146_097 + doe - 719_468
}

/// Inverse of [`days_from_civil`].
fn civil_from_days(days: i64) -> (i64, i64, i64) {
    let z = days + 719_468;
    let era = z.div_euclid(146_097);
    let doe = z - era * 146_097;
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = doy - (153 * mp + 2) / 5 + 1;
    let month = if mp < 10 { mp + 3 } else { mp - 9 };
    let year = yoe + era * 400 + i64::from(month <= 2);
    (year, month, day)
}

/// Format epoch milliseconds the way `Date.prototype.toISOString` does.
pub fn format_iso_date(ms: i64) -> String {
    let days = ms.div_euclid(MS_PER_DAY);
    let rem = ms.rem_euclid(MS_PER_DAY);
    let (year, month, day) = civil_from_days(days);
    let (h, m, s, millis) = (
        rem / 3_600_000,
        rem / 60_000 % 60,
        rem / 1000 % 60,
        rem % 1000,
    );
    let year = if (0..=9999).contains(&year) {
        format!("{year:04}")
    } else if year < 0 {
        format!("-{:06}", -year)
    } else {
        format!("+{year:06}")
    };
    format!("{year}-{month:02}-{day:02}T{h:02}:{m:02}:{s:02}.{millis:03}Z")
}

/// Parse `YYYY-MM-DD`, `YYYY-MM-DDTHH:MM[:SS[.sss]]Z` or the extended
/// `±YYYYYY` year form into epoch milliseconds.
pub fn parse_iso_date(iso: &str) -> Option<i64> {
    let (sign, rest) = match iso.as_bytes().first()? {
        b'+' => (1, &iso[1..]),
        b'-' => (-1, &iso[1..]),
        _ => (1, iso),
    };
    let year_len = if sign == 1 && rest.len() == iso.len() { 4 } else { 6 };
    let year = sign * digits(rest.get(..year_len)?)?;
    let rest = &rest[year_len..];

    let date = rest.get(..6)?;
    if !date.starts_with('-') || date.as_bytes().get(3) != Some(&b'-') {
        return None;
    }
    let month = digits(date.get(1..3)?)?;
    let day = digits(date.get(4..6)?)?;
    let rest = &rest[6..];
    if !(1..=12).contains(&month) || !(1..=31).contains(&day) {
        return None;
    }

    let mut ms = days_from_civil(year, month, day) * MS_PER_DAY;
    if rest.is_empty() {
        return Some(ms);
    }

    let time = rest.strip_prefix('T')?.strip_suffix('Z')?;
    let h = digits(time.get(..2)?)?;
    let m = digits(time.get(3..5)?)?;
    if time.as_bytes().get(2) != Some(&b':') || h > 24 || m > 59 {
        return None;
    }
    let mut s = 0;
    let mut millis = 0;
    if let Some(sec) = time.get(5..) {
        if !sec.is_empty() {
            let sec = sec.strip_prefix(':')?;
            s = digits(sec.get(..2)?)?;
            if let Some(frac) = sec.get(2..).filter(|f| !f.is_empty()) {
                let frac = frac.strip_prefix('.')?;
                millis = digits(frac.get(..3)?)?;
                if frac.len() != 3 {
                    return None;
                }
            }
        }
    }
    if s > 59 {
        return None;
    }
    ms += h * 3_600_000 + m * 60_000 + s * 1000 + millis;
    Some(ms)
}

fn digits(s: &str) -> Option<i64> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}
