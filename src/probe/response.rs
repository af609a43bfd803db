//! HTTP/1.1 response framing and JSON decoding for probe replies.

use serde_json::{Map, Value};
use std::fmt;

use crate::probe::ProbeError;

const HEADER_SEPARATOR: &[u8] = b"\r\n\r\n";

/// Decoded JSON object returned by the reference endpoint.
///
/// Missing keys are not errors: the accessors simply return `None`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProbeResult {
    fields: Map<String, Value>,
}

impl ProbeResult {
    /// Parse a response body. Only a JSON object is accepted.
    pub fn from_body(body: &str) -> Result<Self, ProbeError> {
        match serde_json::from_str::<Value>(body.trim())? {
            Value::Object(fields) => Ok(ProbeResult { fields }),
            other => Err(ProbeError::UnexpectedJson(json_kind(&other))),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(Value::as_str)
    }

    /// Apparent public address of the connecting party.
    pub fn client_ip(&self) -> Option<&str> {
        self.get_str("clientIp")
    }

    pub fn organization(&self) -> Option<&str> {
        self.get_str("asOrganization")
    }

    pub fn country(&self) -> Option<&str> {
        self.get_str("country")
    }
}

impl fmt::Display for ProbeResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "clientIp={} asOrganization={} country={}",
            self.client_ip().unwrap_or("-"),
            self.organization().unwrap_or("-"),
            self.country().unwrap_or("-")
        )
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Split a raw response into status line, headers and body.
pub struct HttpResponse {
    pub status_line: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn parse(raw: &[u8]) -> Result<Self, ProbeError> {
        let split = raw
            .windows(HEADER_SEPARATOR.len())
            .position(|w| w == HEADER_SEPARATOR)
            .ok_or_else(|| ProbeError::MalformedResponse("missing header terminator".into()))?;

        let head = String::from_utf8_lossy(&raw[..split]);
        let mut lines = head.split("\r\n");
        let status_line = lines.next().unwrap_or_default().to_string();
        if !status_line.starts_with("HTTP/") {
            return Err(ProbeError::MalformedResponse(format!(
                "invalid status line: {:?}",
                status_line
            )));
        }

        let headers = lines
            .filter_map(|line| {
                let colon = line.find(':')?;
                Some((
                    line[..colon].trim().to_lowercase(),
                    line[colon + 1..].trim().to_string(),
                ))
            })
            .collect();

        Ok(HttpResponse {
            status_line,
            headers,
            body: raw[split + HEADER_SEPARATOR.len()..].to_vec(),
        })
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn is_chunked(&self) -> bool {
        self.header("transfer-encoding")
            .map(|v| v.to_ascii_lowercase().contains("chunked"))
            .unwrap_or(false)
    }

    /// Body text with chunked transfer-encoding removed. Invalid UTF-8 is
    /// replaced rather than rejected.
    pub fn body_text(&self) -> Result<String, ProbeError> {
        let body = if self.is_chunked() {
            decode_chunked(&self.body)?
        } else {
            self.body.clone()
        };
        Ok(String::from_utf8_lossy(&body).into_owned())
    }

    pub fn into_probe_result(self) -> Result<ProbeResult, ProbeError> {
        ProbeResult::from_body(&self.body_text()?)
    }
}

fn decode_chunked(mut data: &[u8]) -> Result<Vec<u8>, ProbeError> {
    let mut out = Vec::new();
    loop {
        let line_end = data
            .windows(2)
            .position(|w| w == b"\r\n")
            .ok_or_else(|| ProbeError::MalformedResponse("truncated chunk header".into()))?;
        let size_line = String::from_utf8_lossy(&data[..line_end]);
        // chunk extensions follow a ';'
        let size_hex = size_line.split(';').next().unwrap_or_default().trim();
        let size = usize::from_str_radix(size_hex, 16).map_err(|_| {
            ProbeError::MalformedResponse(format!("invalid chunk size: {:?}", size_hex))
        })?;
        data = &data[line_end + 2..];

        if size == 0 {
            return Ok(out);
        }
        if data.len() < size {
            return Err(ProbeError::MalformedResponse("truncated chunk".into()));
        }
        out.extend_from_slice(&data[..size]);
        data = &data[size..];
        data = data.strip_prefix(b"\r\n").unwrap_or(data);
    }
}
