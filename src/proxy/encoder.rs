//! Request body encoding.
//!
//! Turns an `OutboundSpec` into an in-memory body plus its `Content-Type`.
//! Multipart bodies are laid out by `reqwest::multipart::Form` and collected
//! so the downstream sees a `Content-Length` framed request. No network I/O.

use axum::body::Bytes;
use axum::http::HeaderValue;
use futures_util::TryStreamExt;
use reqwest::multipart::{Form, Part};

use crate::proxy::error::ProxyError;
use crate::proxy::types::{ContentKind, FilePart, OutboundSpec, FILE_PART_CONTENT_TYPE};

/// An encoded request body ready to be sent.
#[derive(Debug, Clone)]
pub struct EncodedBody {
    pub body: Bytes,
    pub content_type: HeaderValue,
}

/// Encode the outbound body. Every multipart encoding gets a fresh boundary.
pub async fn encode(spec: &OutboundSpec) -> Result<EncodedBody, ProxyError> {
    match spec.content_kind() {
        ContentKind::Json => encode_json(spec),
        ContentKind::Multipart => {
            let form = multipart_form(spec.fields(), spec.file_part())?;
            collect_form(form).await
        }
    }
}

fn encode_json(spec: &OutboundSpec) -> Result<EncodedBody, ProxyError> {
    let payload = spec
        .json_payload()
        .ok_or_else(|| ProxyError::Encoding("JSON spec without payload".into()))?;
    let body = serde_json::to_vec(payload)
        .map_err(|e| ProxyError::Encoding(format!("can not marshal JSON: {e}")))?;
    Ok(EncodedBody {
        body: Bytes::from(body),
        content_type: HeaderValue::from_static("application/json"),
    })
}

/// Build a multipart form from text fields and an optional file part.
///
/// Text fields come first in the given order, the file part last.
pub fn multipart_form(fields: &[(String, String)], file: Option<&FilePart>) -> Result<Form, ProxyError> {
    let mut form = Form::new();
    for (name, value) in fields {
        check_name(name)?;
        form = form.text(name.clone(), value.clone());
    }

    if let Some(file) = file {
        check_name(&file.field)?;
        check_name(&file.filename)?;
        let part = Part::bytes(file.data.to_vec())
            .file_name(file.filename.clone())
            .mime_str(FILE_PART_CONTENT_TYPE)
            .map_err(|e| ProxyError::Encoding(format!("invalid file part type: {e}")))?;
        form = form.part(file.field.clone(), part);
    }
    Ok(form)
}

/// `Content-Type` announcing the form's boundary.
pub fn form_content_type(form: &Form) -> Result<HeaderValue, ProxyError> {
    HeaderValue::from_str(&format!("multipart/form-data; boundary={}", form.boundary()))
        .map_err(|e| ProxyError::Encoding(format!("invalid boundary: {e}")))
}

async fn collect_form(form: Form) -> Result<EncodedBody, ProxyError> {
    let content_type = form_content_type(&form)?;
    let body = form
        .into_stream()
        .try_fold(Vec::new(), |mut out, chunk| async move {
            out.extend_from_slice(&chunk);
            Ok(out)
        })
        .await
        .map_err(|e| ProxyError::Encoding(format!("can not assemble multipart body: {e}")))?;

    Ok(EncodedBody {
        body: Bytes::from(body),
        content_type,
    })
}

/// Part names and filenames must be non-empty and single-line.
fn check_name(value: &str) -> Result<(), ProxyError> {
    if value.is_empty() {
        return Err(ProxyError::Encoding("empty part name".into()));
    }
    if value.contains(['\r', '\n']) {
        return Err(ProxyError::Encoding(format!("part name {value:?} spans lines")));
    }
    Ok(())
}
