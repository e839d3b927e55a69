//! Request-body extraction shared by every mutating route.
//!
//! A body is either `multipart/form-data` (text fields plus at most one file)
//! or JSON. Both are normalised into a JSON object and deserialised into the
//! route's request struct, so form strings and JSON numbers go through the
//! same lenient field parsers in [`lenient`].

use axum::async_trait;
use axum::extract::{FromRequest, Multipart, Request};
use axum::http::header::CONTENT_TYPE;
use bytes::{Bytes, BytesMut};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::api::AppState;
use crate::error::ApiError;
use crate::uploads::{check_file_type, UploadError, UploadedFile};

/// A request struct that can be read by [`Payload`].
pub trait RequestShape: DeserializeOwned {
    /// Multipart field that may carry a file. `None` rejects file parts.
    const FILE_FIELD: Option<&'static str> = None;
}

/// Parsed request body plus the uploaded file, if any.
#[derive(Debug)]
pub struct Payload<T> {
    pub body: T,
    pub file: Option<UploadedFile>,
}

#[async_trait]
impl<T> FromRequest<AppState> for Payload<T>
where
    T: RequestShape + Send,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &AppState) -> Result<Self, Self::Rejection> {
        let is_multipart = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|ct| ct.starts_with("multipart/form-data"))
            .unwrap_or(false);

        let (fields, file) = if is_multipart {
            let multipart = Multipart::from_request(req, state)
                .await
                .map_err(|e| ApiError::bad_request(e.body_text()))?;
            read_multipart::<T>(multipart, state.uploads.max_size()).await?
        } else {
            let bytes = Bytes::from_request(req, state)
                .await
                .map_err(|e| ApiError::bad_request(e.body_text()))?;
            (parse_json_object(&bytes)?, None)
        };

        let body = serde_json::from_value(Value::Object(fields))
            .map_err(|e| ApiError::bad_request(format!("Invalid request body: {e}")))?;

        Ok(Payload { body, file })
    }
}

async fn read_multipart<T: RequestShape>(
    mut multipart: Multipart,
    max_size: usize,
) -> Result<(Map<String, Value>, Option<UploadedFile>), ApiError> {
    let mut fields = Map::new();
    let mut file = None;

    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("Malformed form data: {e}")))?
    {
        let name = field.name().unwrap_or("").to_string();

        let Some(file_name) = field.file_name().map(str::to_string) else {
            let text = field
                .text()
                .await
                .map_err(|e| ApiError::bad_request(format!("Malformed form data: {e}")))?;
            fields.insert(name, Value::String(text));
            continue;
        };

        // browsers send an empty filename when no file was picked
        if file_name.is_empty() {
            continue;
        }

        if T::FILE_FIELD != Some(name.as_str()) {
            return Err(ApiError::bad_request(format!("Unexpected file field '{name}'")));
        }

        let content_type = field.content_type().map(str::to_string);
        check_file_type(&file_name, content_type.as_deref())?;

        let mut buf = BytesMut::new();
        while let Some(chunk) = field
            .chunk()
            .await
            .map_err(|e| ApiError::bad_request(format!("Malformed form data: {e}")))?
        {
            if buf.len() + chunk.len() > max_size {
                return Err(UploadError::TooLarge.into());
            }
            buf.extend_from_slice(&chunk);
        }

        file = Some(UploadedFile {
            field: name,
            file_name,
            content_type,
            bytes: buf.freeze(),
        });
    }

    Ok((fields, file))
}

/// An empty body reads as `{}`. Anything else must be a JSON object.
fn parse_json_object(bytes: &[u8]) -> Result<Map<String, Value>, ApiError> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Map::new());
    }
    match serde_json::from_slice::<Value>(bytes) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(ApiError::bad_request("Request body must be a JSON object")),
        Err(e) => Err(ApiError::bad_request(format!("Invalid JSON body: {e}"))),
    }
}

/// List-field strategy for `prerequisites` and `outcomes`: a JSON array
/// string is taken as-is, anything else is split on commas and trimmed.
pub fn parse_list_field(raw: &str) -> Vec<String> {
    if let Ok(Value::Array(items)) = serde_json::from_str::<Value>(raw) {
        return items.into_iter().filter_map(lenient::scalar_text).collect();
    }
    raw.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

/// `deserialize_with` helpers that accept both form strings and JSON values.
pub mod lenient {
    use serde::de::Error;
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    pub(super) fn scalar_text(value: Value) -> Option<String> {
        match value {
            Value::String(s) => Some(s),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    /// Integer from a number or numeric string. Empty strings read as absent.
    pub fn opt_i64<'de, D: Deserializer<'de>>(d: D) -> Result<Option<i64>, D::Error> {
        match Option::<Value>::deserialize(d)? {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Number(n)) => match n.as_i64() {
                Some(v) => Ok(Some(v)),
                None => n
                    .as_f64()
                    // i64::MAX as f64 rounds up to 2^63, which is already out of range
                    .filter(|f| f.fract() == 0.0 && (i64::MIN as f64..i64::MAX as f64).contains(f))
                    .map(|f| Some(f as i64))
                    .ok_or_else(|| D::Error::custom(format!("expected an integer, got {n}"))),
            },
            Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
            Some(Value::String(s)) => s
                .trim()
                .parse::<i64>()
                .map(Some)
                .map_err(|_| D::Error::custom(format!("expected an integer, got '{s}'"))),
            Some(other) => Err(D::Error::custom(format!("expected an integer, got {other}"))),
        }
    }

    /// Text from a string, number or bool.
    pub fn opt_text<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
        match Option::<Value>::deserialize(d)? {
            None | Some(Value::Null) => Ok(None),
            Some(value) => scalar_text(value)
                .map(Some)
                .ok_or_else(|| D::Error::custom("expected a string")),
        }
    }

    /// Like [`opt_text`] but keeps "sent as null or empty" apart from "not
    /// sent": pair with `#[serde(default)]` so an absent field stays `None`.
    pub fn nullable_text<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Option<String>>, D::Error> {
        let text = opt_text(d)?;
        Ok(Some(text.filter(|t| !t.trim().is_empty())))
    }

    /// List from a JSON array or a string handled by [`super::parse_list_field`].
    pub fn opt_list<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Vec<String>>, D::Error> {
        match Option::<Value>::deserialize(d)? {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Array(items)) => Ok(Some(items.into_iter().filter_map(scalar_text).collect())),
            Some(Value::String(s)) => Ok(Some(super::parse_list_field(&s))),
            Some(other) => Err(D::Error::custom(format!("expected a list, got {other}"))),
        }
    }
}

/// Present and non-empty after trimming.
pub fn filled(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}
