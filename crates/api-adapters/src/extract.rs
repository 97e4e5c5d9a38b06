//! Request extraction.
//!
//! Clients submit either JSON or urlencoded forms, and send ids as numbers
//! or as strings. Both are accepted here so handlers see one shape.

use axum::extract::{FromRequest, Request};
use axum::http::header;
use axum::{Form, Json};
use serde::de::{DeserializeOwned, IgnoredAny};
use serde::{Deserialize, Deserializer};

use crate::error::ApiError;

/// Deserializes the body as JSON when the request says so, as a form otherwise.
pub struct FormOrJson<T>(pub T);

impl<T, S> FromRequest<S> for FormOrJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_json = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value.starts_with("application/json"));

        if is_json {
            Json::<T>::from_request(req, state)
                .await
                .map(|Json(value)| Self(value))
                .map_err(|rejection| ApiError::BadRequest(rejection.body_text()))
        } else {
            Form::<T>::from_request(req, state)
                .await
                .map(|Form(value)| Self(value))
                .map_err(|rejection| ApiError::BadRequest(rejection.body_text()))
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum LooseId {
    Int(i64),
    Float(f64),
    Text(String),
}

/// Reads an optional id sent as a number or a string.
///
/// Absent, null, empty and non-integer values all become `None`.
pub fn lenient_id<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let id = Option::<LooseId>::deserialize(deserializer)?;
    Ok(match id {
        Some(LooseId::Int(id)) => Some(id),
        Some(LooseId::Float(f)) if f.fract() == 0.0 && f.is_finite() => Some(f as i64),
        Some(LooseId::Text(text)) => text.trim().parse().ok(),
        _ => None,
    })
}

#[derive(Deserialize)]
#[serde(untagged)]
enum LooseText {
    Text(String),
    Other(IgnoredAny),
}

/// Reads a free-text field that clients sometimes send as a number.
///
/// Only strings are kept. Any other JSON value reads as empty, which the
/// engine then treats like a missing answer.
pub fn lenient_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<LooseText>::deserialize(deserializer)? {
        Some(LooseText::Text(text)) => text,
        Some(LooseText::Other(_)) | None => String::new(),
    })
}

/// Plain decimal notation: optional sign, digits, optional fraction.
fn is_decimal(raw: &str) -> bool {
    let unsigned = raw.strip_prefix(&['+', '-'][..]).unwrap_or(raw);
    let (whole, fraction) = unsigned.split_once('.').unwrap_or(("", unsigned));
    !fraction.is_empty()
        && fraction.bytes().all(|b| b.is_ascii_digit())
        && whole.bytes().all(|b| b.is_ascii_digit())
}

/// Parses a listing page number. Fractions are rounded, negatives read as 0.
///
/// Exponents, padding and `inf`/`NaN` spellings are refused.
pub fn parse_page(raw: &str) -> Option<i64> {
    if !is_decimal(raw) {
        return None;
    }
    let num: f64 = raw.parse().ok()?;
    Some(num.round().max(0.0) as i64)
}
