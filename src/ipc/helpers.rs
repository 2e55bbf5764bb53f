use chrono::NaiveDate;
use rusqlite::Connection;
use serde_json::json;

use crate::calc;
use crate::ipc::error::err;
use crate::ipc::types::AppState;
use crate::store::StoreError;

pub struct HandlerErr {
    pub code: &'static str,
    pub message: String,
    pub details: Option<serde_json::Value>,
}

impl HandlerErr {
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn response(self, id: &str) -> serde_json::Value {
        err(id, self.code, self.message, self.details)
    }
}

impl From<StoreError> for HandlerErr {
    fn from(e: StoreError) -> Self {
        HandlerErr::new(e.code(), e.message())
    }
}

impl From<calc::CalcError> for HandlerErr {
    fn from(e: calc::CalcError) -> Self {
        // CalcError codes are engine-defined; carry them through verbatim.
        HandlerErr {
            code: match e.code.as_str() {
                "invalid_weight_configuration" => "invalid_weight_configuration",
                _ => "calc_failed",
            },
            message: e.message,
            details: e.details,
        }
    }
}

pub fn db_conn<'a>(state: &'a AppState, req_id: &str) -> Result<&'a Connection, serde_json::Value> {
    state
        .db
        .as_ref()
        .ok_or_else(|| err(req_id, "no_workspace", "select a workspace first", None))
}

pub fn get_required_str(params: &serde_json::Value, key: &str) -> Result<String, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| HandlerErr::new("bad_params", format!("missing {}", key)))
}

pub fn get_optional_str(
    params: &serde_json::Value,
    key: &str,
) -> Result<Option<String>, HandlerErr> {
    match params.get(key) {
        None => Ok(None),
        Some(v) if v.is_null() => Ok(None),
        Some(v) => v
            .as_str()
            .map(|s| Some(s.to_string()))
            .ok_or_else(|| HandlerErr::new("bad_params", format!("{} must be string or null", key))),
    }
}

pub fn get_required_f64(params: &serde_json::Value, key: &str) -> Result<f64, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_f64())
        .ok_or_else(|| HandlerErr::new("bad_params", format!("missing numeric {}", key)))
}

/// ISO calendar dates only, so string order is chronological order.
pub fn parse_iso_date(raw: &str, key: &str) -> Result<String, HandlerErr> {
    let t = raw.trim();
    match NaiveDate::parse_from_str(t, "%Y-%m-%d") {
        Ok(_) => Ok(t.to_string()),
        Err(_) => Err(HandlerErr {
            code: "bad_params",
            message: format!("{} must be an ISO date (YYYY-MM-DD)", key),
            details: Some(json!({ key: raw })),
        }),
    }
}

/// Inclusive date range for attendance queries.
pub fn get_date_range(params: &serde_json::Value) -> Result<(String, String), HandlerErr> {
    let from = parse_iso_date(&get_required_str(params, "from")?, "from")?;
    let to = parse_iso_date(&get_required_str(params, "to")?, "to")?;
    if from > to {
        return Err(HandlerErr::new("bad_params", "from must be <= to"));
    }
    Ok((from, to))
}

pub fn get_id_list(params: &serde_json::Value, key: &str) -> Result<Option<Vec<String>>, HandlerErr> {
    let Some(raw) = params.get(key) else {
        return Ok(None);
    };
    if raw.is_null() {
        return Ok(None);
    }
    let Some(arr) = raw.as_array() else {
        return Err(HandlerErr::new(
            "bad_params",
            format!("{} must be an array of ids", key),
        ));
    };
    let mut out = Vec::with_capacity(arr.len());
    for v in arr {
        let Some(id) = v.as_str() else {
            return Err(HandlerErr::new(
                "bad_params",
                format!("{} must contain only strings", key),
            ));
        };
        let trimmed = id.trim();
        if trimmed.is_empty() {
            return Err(HandlerErr::new(
                "bad_params",
                format!("{} must not contain empty ids", key),
            ));
        }
        out.push(trimmed.to_string());
    }
    Ok(Some(out))
}
