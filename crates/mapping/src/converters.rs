//! Closed set of value converters.
//!
//! Converters are resolved from their configuration name when a mapping or
//! template is parsed; applying one never touches configuration again. Every
//! converter maps `null` to an empty string.

use std::fmt;

use chrono::{TimeDelta, Timelike};
use eogate_types::NOT_AVAILABLE;
use eogate_util::date_handling::{datetime_from_millis, format_iso_utc_millis, parse_datetime_utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};
use tracing::warn;

use crate::{error::MappingError, format::value_to_text, geometry::Geometry};

/// Coordinate reference system every geometry is expressed in.
pub const DEFAULT_SRID: u32 = 4326;

static EWKT_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(?P<proj>[A-Za-z]+)=(?P<code>[0-9]+);(?P<wkt>.*)$").expect("valid EWKT regex"));

/// A compiled regular expression compared by its source text.
#[derive(Clone)]
pub struct Pattern(Regex);

impl Pattern {
    fn new(converter: &str, source: &str) -> Result<Self, MappingError> {
        Regex::new(source).map(Pattern).map_err(|error| MappingError::InvalidArguments {
            converter: converter.to_string(),
            message: error.to_string(),
        })
    }

    pub fn regex(&self) -> &Regex {
        &self.0
    }
}

impl fmt::Debug for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Pattern({:?})", self.0.as_str())
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.0.as_str() == other.0.as_str()
    }
}

impl Eq for Pattern {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Converter {
    /// UTC date string to Unix milliseconds.
    TimestampMilliseconds,
    /// Unix milliseconds to an ISO 8601 UTC date-time.
    IsoUtcDatetimeFromMilliseconds,
    /// Any supported date string to ISO 8601 UTC with millisecond precision.
    IsoUtcDatetime,
    /// Date part of a date-time after converting it to UTC and shifting it.
    IsoDate { shift: TimeDelta },
    ToRoundedWkt,
    ToBounds,
    ToBoundsLists,
    ToNwseBounds,
    ToNwseBoundsStr { separator: String },
    ToGeojson,
    FromEwkt,
    ToEwkt,
    CsvList,
    RemoveExtension,
    GetGroupName { pattern: Pattern },
    ReplaceStr { pattern: Pattern, replacement: String },
    RecursiveSubStr { pattern: Pattern, replacement: String },
    DictUpdate { entries: Vec<(String, Value)> },
    SliceStr { start: i64, end: Option<i64>, step: i64 },
    DatetimeDict { as_lists: bool },
    EcmwfTime,
}

impl Converter {
    /// Resolves a converter from its configured name and raw argument text.
    pub fn parse(name: &str, args: Option<&str>) -> Result<Self, MappingError> {
        let converter = match name {
            "to_timestamp_milliseconds" | "datetime_to_timestamp_milliseconds" => Converter::TimestampMilliseconds,
            "to_iso_utc_datetime_from_milliseconds" => Converter::IsoUtcDatetimeFromMilliseconds,
            "to_iso_utc_datetime" => Converter::IsoUtcDatetime,
            "to_iso_date" => Converter::IsoDate {
                shift: parse_time_delta(name, args)?,
            },
            "to_rounded_wkt" => Converter::ToRoundedWkt,
            "to_bounds" => Converter::ToBounds,
            "to_bounds_lists" => Converter::ToBoundsLists,
            "to_nwse_bounds" => Converter::ToNwseBounds,
            "to_nwse_bounds_str" => Converter::ToNwseBoundsStr {
                separator: args.map(unquote).unwrap_or(",").to_string(),
            },
            "to_geojson" => Converter::ToGeojson,
            "from_ewkt" => Converter::FromEwkt,
            "to_ewkt" => Converter::ToEwkt,
            "csv_list" => Converter::CsvList,
            "remove_extension" => Converter::RemoveExtension,
            "get_group_name" => Converter::GetGroupName {
                pattern: Pattern::new(name, required(name, args)?)?,
            },
            "replace_str" => {
                let (pattern, replacement) = parse_substitution(name, required(name, args)?)?;
                Converter::ReplaceStr { pattern, replacement }
            }
            "recursive_sub_str" => {
                let (pattern, replacement) = parse_substitution(name, required(name, args)?)?;
                Converter::RecursiveSubStr { pattern, replacement }
            }
            "dict_update" => Converter::DictUpdate {
                entries: parse_dict_entries(name, required(name, args)?)?,
            },
            "slice_str" => parse_slice(name, required(name, args)?)?,
            "to_datetime_dict" => Converter::DatetimeDict {
                as_lists: args.map(unquote) == Some("list"),
            },
            "get_ecmwf_time" => Converter::EcmwfTime,
            other => {
                return Err(MappingError::UnknownConverter { name: other.to_string() });
            }
        };
        Ok(converter)
    }

    /// Configuration name of the converter.
    pub fn name(&self) -> &'static str {
        match self {
            Converter::TimestampMilliseconds => "to_timestamp_milliseconds",
            Converter::IsoUtcDatetimeFromMilliseconds => "to_iso_utc_datetime_from_milliseconds",
            Converter::IsoUtcDatetime => "to_iso_utc_datetime",
            Converter::IsoDate { .. } => "to_iso_date",
            Converter::ToRoundedWkt => "to_rounded_wkt",
            Converter::ToBounds => "to_bounds",
            Converter::ToBoundsLists => "to_bounds_lists",
            Converter::ToNwseBounds => "to_nwse_bounds",
            Converter::ToNwseBoundsStr { .. } => "to_nwse_bounds_str",
            Converter::ToGeojson => "to_geojson",
            Converter::FromEwkt => "from_ewkt",
            Converter::ToEwkt => "to_ewkt",
            Converter::CsvList => "csv_list",
            Converter::RemoveExtension => "remove_extension",
            Converter::GetGroupName { .. } => "get_group_name",
            Converter::ReplaceStr { .. } => "replace_str",
            Converter::RecursiveSubStr { .. } => "recursive_sub_str",
            Converter::DictUpdate { .. } => "dict_update",
            Converter::SliceStr { .. } => "slice_str",
            Converter::DatetimeDict { .. } => "to_datetime_dict",
            Converter::EcmwfTime => "get_ecmwf_time",
        }
    }

    /// Applies the converter to one value.
    pub fn apply(&self, value: &Value) -> Result<Value, MappingError> {
        if value.is_null() {
            return Ok(Value::String(String::new()));
        }
        match self {
            Converter::TimestampMilliseconds => {
                let date_time = self.parse_date(value)?;
                Ok(Value::from(date_time.timestamp_millis()))
            }
            Converter::IsoUtcDatetimeFromMilliseconds => {
                let millis = match value {
                    Value::Number(number) => number.as_i64().or_else(|| number.as_f64().map(|float| float as i64)),
                    Value::String(text) => text.trim().parse::<i64>().ok(),
                    _ => None,
                };
                Ok(millis
                    .and_then(datetime_from_millis)
                    .map(|date_time| Value::String(format_iso_utc_millis(&date_time)))
                    .unwrap_or_else(|| value.clone()))
            }
            Converter::IsoUtcDatetime => {
                let text = value_to_text(value);
                Ok(Value::String(
                    parse_datetime_utc(&text).map(|date_time| format_iso_utc_millis(&date_time)).unwrap_or(text),
                ))
            }
            Converter::IsoDate { shift } => {
                let date_time = self
                    .parse_date(value)?
                    .checked_add_signed(*shift)
                    .ok_or_else(|| self.failure(value, "shifted date out of range"))?;
                Ok(Value::String(date_time.format("%Y-%m-%d").to_string()))
            }
            Converter::ToRoundedWkt => Ok(Value::String(self.geometry(value)?.to_wkt())),
            Converter::ToBounds => Ok(bounds_value(self.geometry(value)?.bounds())),
            Converter::ToBoundsLists => {
                let lists = self
                    .geometry(value)?
                    .polygon_bounds_by_area()
                    .into_iter()
                    .map(bounds_value)
                    .collect();
                Ok(Value::Array(lists))
            }
            Converter::ToNwseBounds => Ok(bounds_value(nwse(self.geometry(value)?.bounds()))),
            Converter::ToNwseBoundsStr { separator } => {
                let parts: Vec<String> = nwse(self.geometry(value)?.bounds()).iter().map(|coordinate| format_float(*coordinate)).collect();
                Ok(Value::String(parts.join(separator)))
            }
            Converter::ToGeojson => {
                let geojson = match value {
                    Value::Object(_) => value.clone(),
                    _ => self.geometry(value)?.to_geojson(),
                };
                Ok(Value::String(geojson.to_string()))
            }
            Converter::FromEwkt => Ok(from_ewkt(value)),
            Converter::ToEwkt => Ok(Value::String(format!("SRID={};{}", DEFAULT_SRID, self.geometry(value)?.to_wkt()))),
            Converter::CsvList => match value {
                Value::Array(items) => Ok(Value::String(items.iter().map(value_to_text).collect::<Vec<_>>().join(","))),
                other => Ok(other.clone()),
            },
            Converter::RemoveExtension => {
                let text = value_to_text(value);
                Ok(Value::String(text.split('.').next().unwrap_or_default().to_string()))
            }
            Converter::GetGroupName { pattern } => Ok(Value::String(last_group_name(pattern.regex(), &value_to_text(value)))),
            Converter::ReplaceStr { pattern, replacement } => Ok(Value::String(
                pattern.regex().replace_all(&value_to_text(value), replacement.as_str()).into_owned(),
            )),
            Converter::RecursiveSubStr { pattern, replacement } => Ok(substitute_recursive(value, pattern.regex(), replacement)),
            Converter::DictUpdate { entries } => {
                let Value::Object(object) = value else {
                    return Err(self.failure(value, "expected an object"));
                };
                let mut updated = object.clone();
                for (key, entry) in entries {
                    updated.insert(key.clone(), entry.clone());
                }
                Ok(Value::Object(updated))
            }
            Converter::SliceStr { start, end, step } => Ok(Value::String(slice_chars(&value_to_text(value), *start, *end, *step))),
            Converter::DatetimeDict { as_lists } => {
                let date_time = self.parse_date(value)?;
                let parts = [
                    ("year", date_time.format("%Y").to_string()),
                    ("month", date_time.format("%m").to_string()),
                    ("day", date_time.format("%d").to_string()),
                    ("hour", date_time.format("%H").to_string()),
                    ("minute", date_time.format("%M").to_string()),
                    ("second", date_time.format("%S").to_string()),
                ];
                let mut object = Map::new();
                for (key, part) in parts {
                    let entry = if *as_lists { Value::Array(vec![Value::String(part)]) } else { Value::String(part) };
                    object.insert(key.to_string(), entry);
                }
                Ok(Value::Object(object))
            }
            Converter::EcmwfTime => {
                let date_time = self.parse_date(value)?;
                Ok(Value::Array(vec![Value::String(format!("{:02}:00", date_time.hour()))]))
            }
        }
    }

    fn parse_date(&self, value: &Value) -> Result<chrono::DateTime<chrono::Utc>, MappingError> {
        let text = value_to_text(value);
        parse_datetime_utc(&text).ok_or_else(|| self.failure(value, "unrecognized date format"))
    }

    fn geometry(&self, value: &Value) -> Result<Geometry, MappingError> {
        Geometry::from_value(value).map_err(|message| self.failure(value, &message))
    }

    fn failure(&self, value: &Value, message: &str) -> MappingError {
        MappingError::Conversion {
            converter: self.name(),
            value: value_to_text(value),
            message: message.to_string(),
        }
    }
}

fn required<'a>(converter: &str, args: Option<&'a str>) -> Result<&'a str, MappingError> {
    args.filter(|text| !text.trim().is_empty()).ok_or_else(|| MappingError::InvalidArguments {
        converter: converter.to_string(),
        message: "arguments are required".to_string(),
    })
}

fn invalid(converter: &str, message: impl Into<String>) -> MappingError {
    MappingError::InvalidArguments {
        converter: converter.to_string(),
        message: message.into(),
    }
}

fn unquote(text: &str) -> &str {
    let trimmed = text.trim();
    for quote in ['\'', '"'] {
        if let Some(inner) = trimmed.strip_prefix(quote).and_then(|rest| rest.strip_suffix(quote)) {
            return inner;
        }
    }
    trimmed
}

/// Splits a literal argument list (`'a', r"b", 3`) on top-level commas.
///
/// Backslashes are kept verbatim unless they escape the enclosing quote, so
/// regular expressions survive unchanged.
fn split_literal_args(args: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    let mut characters = args.chars().peekable();
    while let Some(character) = characters.next() {
        match quote {
            Some(open) if character == '\\' && characters.peek() == Some(&open) => {
                current.push(open);
                characters.next();
            }
            Some(open) if character == open => quote = None,
            Some(_) => current.push(character),
            None => match character {
                '\'' | '"' => quote = Some(character),
                'r' if current.trim().is_empty() && matches!(characters.peek(), Some('\'' | '"')) => {}
                ',' => parts.push(std::mem::take(&mut current).trim().to_string()),
                other => current.push(other),
            },
        }
    }
    parts.push(current.trim().to_string());
    parts
}

/// `\1` and `\g<name>` back-references become `${1}` and `${name}`.
fn python_replacement(replacement: &str) -> String {
    static BACKREF: Lazy<Regex> = Lazy::new(|| Regex::new(r"\\(?:g<(\w+)>|(\d+))").expect("valid backref regex"));
    let escaped = replacement.replace('$', "$$");
    BACKREF
        .replace_all(&escaped, |caps: &regex::Captures| {
            let group = caps.get(1).or_else(|| caps.get(2)).map(|m| m.as_str()).unwrap_or_default();
            format!("${{{group}}}")
        })
        .into_owned()
}

fn parse_substitution(converter: &str, args: &str) -> Result<(Pattern, String), MappingError> {
    let parts = split_literal_args(args);
    let [old, new] = parts.as_slice() else {
        return Err(invalid(converter, format!("expected ('old', 'new'), got ({args})")));
    };
    Ok((Pattern::new(converter, old)?, python_replacement(new)))
}

fn parse_time_delta(converter: &str, args: Option<&str>) -> Result<TimeDelta, MappingError> {
    let Some(args) = args.map(|text| text.trim().trim_start_matches('(').trim_end_matches(')')) else {
        return Ok(TimeDelta::zero());
    };
    if args.trim().is_empty() {
        return Ok(TimeDelta::zero());
    }
    // days, seconds, microseconds, milliseconds, minutes, hours, weeks
    let mut amounts = [0i64; 7];
    for (index, part) in args.split(',').enumerate() {
        let slot = amounts.get_mut(index).ok_or_else(|| invalid(converter, "at most 7 time delta components"))?;
        *slot = part.trim().parse().map_err(|_| invalid(converter, format!("'{}' is not an integer", part.trim())))?;
    }
    let [days, seconds, micros, millis, minutes, hours, weeks] = amounts;
    [
        TimeDelta::try_days(days),
        TimeDelta::try_seconds(seconds),
        Some(TimeDelta::microseconds(micros)),
        TimeDelta::try_milliseconds(millis),
        TimeDelta::try_minutes(minutes),
        TimeDelta::try_hours(hours),
        TimeDelta::try_weeks(weeks),
    ]
    .into_iter()
    .try_fold(TimeDelta::zero(), |total, part| total.checked_add(&part?))
    .ok_or_else(|| invalid(converter, "time delta out of range"))
}

fn parse_dict_entries(converter: &str, args: &str) -> Result<Vec<(String, Value)>, MappingError> {
    let normalized = args.replace('\'', "\"");
    let parsed: Value = serde_json::from_str(&normalized).map_err(|error| invalid(converter, error.to_string()))?;
    let Value::Array(pairs) = parsed else {
        return Err(invalid(converter, "expected a list of [key, value] pairs"));
    };
    pairs
        .into_iter()
        .map(|pair| match pair {
            Value::Array(mut items) if items.len() == 2 => {
                let value = nested_pairs_to_value(items.pop().unwrap_or(Value::Null));
                match items.pop() {
                    Some(Value::String(key)) => Ok((key, value)),
                    _ => Err(invalid(converter, "pair keys must be strings")),
                }
            }
            _ => Err(invalid(converter, "expected a list of [key, value] pairs")),
        })
        .collect()
}

/// Turns `[["k", v], ...]` into `{"k": v}` recursively.
fn nested_pairs_to_value(value: Value) -> Value {
    match value {
        Value::Array(items)
            if !items.is_empty()
                && items
                    .iter()
                    .all(|item| matches!(item, Value::Array(pair) if pair.len() == 2 && pair[0].is_string())) =>
        {
            let mut object = Map::new();
            for item in items {
                if let Value::Array(mut pair) = item {
                    let nested = nested_pairs_to_value(pair.pop().unwrap_or(Value::Null));
                    if let Some(Value::String(key)) = pair.pop() {
                        object.insert(key, nested);
                    }
                }
            }
            Value::Object(object)
        }
        other => other,
    }
}

fn parse_slice(converter: &str, args: &str) -> Result<Converter, MappingError> {
    let parts: Vec<&str> = args.split(',').map(str::trim).collect();
    let [start, end, step] = parts.as_slice() else {
        return Err(invalid(converter, format!("expected start,end,step, got ({args})")));
    };
    let parse = |text: &str| -> Result<Option<i64>, MappingError> {
        if text.is_empty() || text == "None" {
            return Ok(None);
        }
        text.parse().map(Some).map_err(|_| invalid(converter, format!("'{text}' is not an integer")))
    };
    let step = parse(step)?.unwrap_or(1);
    if step <= 0 {
        return Err(invalid(converter, "step must be a positive integer"));
    }
    Ok(Converter::SliceStr {
        start: parse(start)?.unwrap_or(0),
        end: parse(end)?,
        step,
    })
}

fn slice_chars(text: &str, start: i64, end: Option<i64>, step: i64) -> String {
    let characters: Vec<char> = text.chars().collect();
    let length = characters.len() as i64;
    let clamp = |index: i64| if index < 0 { (length + index).max(0) } else { index.min(length) };
    let from = clamp(start);
    let to = end.map(clamp).unwrap_or(length);
    if from >= to {
        return String::new();
    }
    characters[from as usize..to as usize].iter().step_by(step as usize).collect()
}

fn last_group_name(regex: &Regex, text: &str) -> String {
    let group = regex.captures(text).and_then(|captures| {
        regex
            .capture_names()
            .enumerate()
            .filter_map(|(index, name)| name.filter(|_| captures.get(index).is_some()))
            .last()
            .map(str::to_string)
    });
    group.unwrap_or_else(|| {
        warn!(value = %text, pattern = %regex.as_str(), "could not extract group name");
        NOT_AVAILABLE.to_string()
    })
}

fn substitute_recursive(value: &Value, regex: &Regex, replacement: &str) -> Value {
    match value {
        Value::String(text) => Value::String(regex.replace_all(text, replacement).into_owned()),
        Value::Array(items) => Value::Array(items.iter().map(|item| substitute_recursive(item, regex, replacement)).collect()),
        Value::Object(object) => Value::Object(
            object
                .iter()
                .map(|(key, item)| (key.clone(), substitute_recursive(item, regex, replacement)))
                .collect(),
        ),
        other => other.clone(),
    }
}

fn from_ewkt(value: &Value) -> Value {
    let text = value_to_text(value);
    let Some(captures) = EWKT_REGEX.captures(&text) else {
        warn!(value = %text, "could not read value as EWKT");
        return value.clone();
    };
    let code = captures.name("code").map(|m| m.as_str()).unwrap_or_default();
    let wkt = captures.name("wkt").map(|m| m.as_str()).unwrap_or_default();
    if code != DEFAULT_SRID.to_string() {
        warn!(srid = %code, "reprojection is not supported, keeping EWKT value");
        return value.clone();
    }
    match Geometry::from_wkt(wkt) {
        Ok(geometry) => Value::String(geometry.to_wkt()),
        Err(message) => {
            warn!(value = %text, error = %message, "could not parse EWKT geometry");
            value.clone()
        }
    }
}

fn nwse(bounds: [f64; 4]) -> [f64; 4] {
    let [min_x, min_y, max_x, max_y] = bounds;
    [max_y, min_x, min_y, max_x]
}

fn bounds_value(bounds: [f64; 4]) -> Value {
    Value::Array(bounds.iter().map(|coordinate| Value::from(*coordinate)).collect())
}

/// Floats keep a trailing `.0` when integral, e.g. `1.0` and `1.25`.
fn format_float(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e16 {
        format!("{value:.1}")
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn convert(name: &str, args: Option<&str>, value: Value) -> Value {
        Converter::parse(name, args).expect("known converter").apply(&value).expect("conversion succeeds")
    }

    #[test]
    fn timestamps_handle_offsets_and_bare_dates() {
        assert_eq!(convert("to_timestamp_milliseconds", None, json!("2021-04-21T18:27:19.123Z")), json!(1619029639123i64));
        assert_eq!(convert("datetime_to_timestamp_milliseconds", None, json!("2021-04-21")), json!(1618963200000i64));
        assert_eq!(
            convert("datetime_to_timestamp_milliseconds", None, json!("2021-04-21T00:00:00+02:00")),
            json!(1618956000000i64)
        );
    }

    #[test]
    fn iso_conversions_normalize_to_utc_milliseconds() {
        assert_eq!(
            convert("to_iso_utc_datetime_from_milliseconds", None, json!(1619029639123i64)),
            json!("2021-04-21T18:27:19.123Z")
        );
        assert_eq!(convert("to_iso_utc_datetime", None, json!("2021-04-21")), json!("2021-04-21T00:00:00.000Z"));
        assert_eq!(
            convert("to_iso_utc_datetime", None, json!("2021-04-21T00:00:00.000+02:00")),
            json!("2021-04-20T22:00:00.000Z")
        );
        assert_eq!(convert("to_iso_utc_datetime", None, json!("not a date")), json!("not a date"));
    }

    #[test]
    fn iso_date_converts_to_utc_before_truncating() {
        assert_eq!(convert("to_iso_date", None, json!("2021-04-21T18:27:19.123Z")), json!("2021-04-21"));
        assert_eq!(convert("to_iso_date", None, json!("2021-04-21T00:00:00+06:00")), json!("2021-04-20"));
        assert_eq!(convert("to_iso_date", Some("1,0"), json!("2021-04-21")), json!("2021-04-22"));
    }

    #[test]
    fn every_converter_maps_null_to_empty_string() {
        let converters = [
            ("to_timestamp_milliseconds", None),
            ("to_iso_date", None),
            ("to_rounded_wkt", None),
            ("to_nwse_bounds_str", Some(",")),
            ("get_group_name", Some("(?P<ONLINE>on)")),
            ("replace_str", Some("'a','b'")),
            ("dict_update", Some("[['a', 1]]")),
            ("slice_str", Some("0,2,1")),
            ("get_ecmwf_time", None),
        ];
        for (name, args) in converters {
            assert_eq!(convert(name, args, Value::Null), json!(""), "converter {name}");
        }
    }

    #[test]
    fn geometry_converters_share_bounds() {
        let polygon = json!("POLYGON((1 43, 2 43, 2 44, 1 44, 1 43))");
        assert_eq!(convert("to_bounds", None, polygon.clone()), json!([1.0, 43.0, 2.0, 44.0]));
        assert_eq!(convert("to_nwse_bounds", None, polygon.clone()), json!([44.0, 1.0, 43.0, 2.0]));
        assert_eq!(convert("to_nwse_bounds_str", Some("|"), polygon.clone()), json!("44.0|1.0|43.0|2.0"));
        assert_eq!(convert("to_ewkt", None, polygon.clone()), json!("SRID=4326;POLYGON ((1 43, 2 43, 2 44, 1 44, 1 43))"));
        assert_eq!(
            convert("from_ewkt", None, json!("SRID=4326;POLYGON((1 43, 2 43, 2 44, 1 44, 1 43))")),
            json!("POLYGON ((1 43, 2 43, 2 44, 1 44, 1 43))")
        );
    }

    #[test]
    fn rounded_wkt_keeps_four_decimals() {
        let polygon = json!([1.123456, 43.0, 2.5, 44.987654]);
        assert_eq!(
            convert("to_rounded_wkt", None, polygon),
            json!("POLYGON ((1.1235 43, 2.5 43, 2.5 44.9877, 1.1235 44.9877, 1.1235 43))")
        );
    }

    #[test]
    fn string_converters() {
        assert_eq!(convert("csv_list", None, json!(["VV", "VH"])), json!("VV,VH"));
        assert_eq!(convert("remove_extension", None, json!("S2A_MSIL1C.SAFE.zip")), json!("S2A_MSIL1C"));
        assert_eq!(convert("slice_str", Some("1,-1,2"), json!("abcdefg")), json!("bdf"));
        assert_eq!(convert("replace_str", Some(r"'^(\w+)-(\w+)$', '\2_\1'"), json!("L1C-S2")), json!("S2_L1C"));
        assert_eq!(
            convert("get_group_name", Some("((?P<ONLINE>0)|(?P<OFFLINE>1))"), json!("1")),
            json!("OFFLINE")
        );
        assert_eq!(convert("get_group_name", Some("(?P<ONLINE>0)"), json!("9")), json!("N/A"));
    }

    #[test]
    fn structured_converters() {
        assert_eq!(
            convert("recursive_sub_str", Some("'http://', 'https://'"), json!({"a": ["http://x"], "b": 1})),
            json!({"a": ["https://x"], "b": 1})
        );
        assert_eq!(
            convert("dict_update", Some(r#"[["href", "https://x"], ["roles", [["main", true]]]]"#), json!({"type": "zip"})),
            json!({"type": "zip", "href": "https://x", "roles": {"main": true}})
        );
        assert_eq!(convert("get_ecmwf_time", None, json!("2021-04-21T18:27:19.123Z")), json!(["18:00"]));
        assert_eq!(convert("to_datetime_dict", Some("list"), json!("2021-04-21"))["hour"], json!(["00"]));
    }

    #[test]
    fn bad_arguments_fail_at_parse_time() {
        assert!(matches!(Converter::parse("slice_str", Some("1,2")), Err(MappingError::InvalidArguments { .. })));
        assert!(matches!(Converter::parse("replace_str", None), Err(MappingError::InvalidArguments { .. })));
        assert!(matches!(Converter::parse("get_group_name", Some("(")), Err(MappingError::InvalidArguments { .. })));
        assert!(matches!(Converter::parse("nope", None), Err(MappingError::UnknownConverter { .. })));
    }

    #[test]
    fn out_of_range_date_shifts_are_errors() {
        assert!(matches!(
            Converter::parse("to_iso_date", Some("99999999999999")),
            Err(MappingError::InvalidArguments { .. })
        ));
        assert!(matches!(
            Converter::parse("to_iso_date", Some(&format!("0,0,0,0,0,0,{}", i64::MAX / 1_000_000))),
            Err(MappingError::InvalidArguments { .. })
        ));
        let converter = Converter::parse("to_iso_date", Some("100000000")).expect("representable shift");
        let error = converter.apply(&json!("2021-04-21")).expect_err("date overflow");
        assert!(matches!(error, MappingError::Conversion { converter: "to_iso_date", .. }));
        assert_eq!(convert("to_iso_date", Some("1"), json!("2021-04-21T23:00:00Z")), json!("2021-04-22"));
    }

    #[test]
    fn conversion_failures_are_reported() {
        let converter = Converter::parse("to_timestamp_milliseconds", None).expect("known converter");
        let error = converter.apply(&json!("someday")).expect_err("invalid date");
        assert!(matches!(error, MappingError::Conversion { converter: "to_timestamp_milliseconds", .. }));
    }
}
