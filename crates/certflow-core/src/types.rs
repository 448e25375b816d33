use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Untyped field-name-to-value map carried by submissions and instance data
pub type FieldMap = serde_json::Map<String, Value>;

/// Render a field value the way a form would display it.
///
/// Strings are returned as-is, `null` becomes the empty string and
/// everything else uses its JSON text.
pub fn value_to_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

/// Whether a value counts as "not filled in"
#[inline]
pub fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

/// Look up a field and return it only if it is present and not blank
#[inline]
pub fn non_blank<'a>(fields: &'a FieldMap, key: &str) -> Option<&'a Value> {
    fields.get(key).filter(|v| !is_blank(v))
}

/// Parse a field value as a finite decimal number
pub fn parse_decimal(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|n| n.is_finite())
}

/// Interpret a value as a list, accepting a string that holds a JSON array
pub fn as_list(value: &Value) -> Option<Vec<Value>> {
    match value {
        Value::Array(items) => Some(items.clone()),
        Value::String(s) => match serde_json::from_str::<Value>(s) {
            Ok(Value::Array(items)) => Some(items),
            _ => None,
        },
        _ => None,
    }
}

/// Metadata describing one uploaded file
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FileMetadata {
    /// Original file name
    pub name: String,

    /// Size in bytes. Clients may send it as a number or a numeric string.
    #[serde(default, deserialize_with = "deserialize_size")]
    pub size: u64,

    /// Extension, with or without the leading dot
    #[serde(default)]
    pub extension: Option<String>,
}

fn deserialize_size<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::Error;

    match Value::deserialize(deserializer)? {
        Value::Null => Ok(0),
        other => parse_decimal(&other)
            .filter(|size| *size >= 0.0 && *size <= u64::MAX as f64)
            .map(|size| size.ceil() as u64)
            .ok_or_else(|| D::Error::custom(format!("invalid file size: {}", other))),
    }
}

impl FileMetadata {
    /// Normalised extension: lowercase with a leading dot.
    ///
    /// Falls back to the part of the name after the last dot.
    pub fn normalized_extension(&self) -> Option<String> {
        let raw = match &self.extension {
            Some(ext) if !ext.trim().is_empty() => ext.trim().to_string(),
            _ => {
                let (_, ext) = self.name.rsplit_once('.')?;
                ext.to_string()
            }
        };
        let raw = raw.trim_start_matches('.').to_lowercase();
        if raw.is_empty() {
            None
        } else {
            Some(format!(".{}", raw))
        }
    }
}

/// Shape of a file field value
#[derive(Debug, Clone, PartialEq)]
pub enum FileValue {
    /// A single metadata object
    Single(FileMetadata),

    /// A list of metadata objects
    Multiple(Vec<FileMetadata>),
}

impl FileValue {
    /// Parse a field value into file metadata.
    ///
    /// Accepts an object, a list of objects, or a string holding either.
    /// Returns `None` when the value does not look like file metadata.
    pub fn parse(value: &Value) -> Option<Self> {
        match value {
            Value::Object(_) => serde_json::from_value(value.clone())
                .ok()
                .map(FileValue::Single),
            Value::Array(items) => items
                .iter()
                .map(|item| serde_json::from_value::<FileMetadata>(item.clone()).ok())
                .collect::<Option<Vec<_>>>()
                .map(FileValue::Multiple),
            Value::String(s) => {
                let trimmed = s.trim_start();
                if trimmed.starts_with('{') || trimmed.starts_with('[') {
                    serde_json::from_str::<Value>(s)
                        .ok()
                        .and_then(|inner| Self::parse(&inner))
                } else {
                    None
                }
            }
            _ => None,
        }
    }

    /// All files in submission order
    pub fn files(&self) -> Vec<&FileMetadata> {
        match self {
            FileValue::Single(file) => vec![file],
            FileValue::Multiple(files) => files.iter().collect(),
        }
    }
}
