//! HTTP Transport Adapter (C3): issues one outbound HTTP/HTTPS request,
//! decompresses the body, produces a structured [`Response`].
//!
//! Grounded on the reference gateway's `services/http.rs` (connection-pooled
//! `reqwest::Client`, header conversion, timeout-wrapped send), generalized
//! to explicit content-encoding/charset handling since this adapter needs
//! control over decompression that the reference gateway leaves to
//! `reqwest`'s automatic gzip/brotli handling.

use crate::dispatch::options::HttpRequestOptions;
use crate::error::RouterError;
use crate::models::response::{HeaderBag, HeaderValue};
use crate::models::{RequestSnapshot, Response, Route};
use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;
use std::io::Read;
use std::time::Duration;

static CHARSET_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)charset=([^;,\r\n]+)").expect("valid charset regex"));

/// Builds a one-off client carrying custom TLS material when the route
/// supplies client identity or a CA, otherwise reuses the shared pooled
/// client (ground: reference gateway's pooled `Client` in `RouteHandler`).
async fn client_for(
    opts: &HttpRequestOptions,
    base: &reqwest::Client,
) -> Result<reqwest::Client, RouterError> {
    let needs_custom_tls = opts.secured
        && (opts.ca.as_ref().is_some_and(|c| !c.is_empty())
            || opts
                .cert
                .as_ref()
                .zip(opts.key.as_ref())
                .is_some_and(|(c, k)| !c.is_empty() && !k.is_empty()));

    if !needs_custom_tls {
        return Ok(base.clone());
    }

    let mut builder = reqwest::Client::builder();

    if let (Some(cert), Some(key)) = (&opts.cert, &opts.key) {
        if !cert.is_empty() && !key.is_empty() {
            let mut pem = cert.clone();
            pem.extend_from_slice(key);
            let identity = reqwest::Identity::from_pem(&pem).map_err(|e| RouterError::Transport {
                route: opts.hostname.clone(),
                message: format!("invalid client identity: {e}"),
            })?;
            builder = builder.identity(identity);
        }
    }

    if let Some(ca) = &opts.ca {
        if !ca.is_empty() {
            let root = reqwest::Certificate::from_pem(ca).map_err(|e| RouterError::Transport {
                route: opts.hostname.clone(),
                message: format!("invalid CA certificate: {e}"),
            })?;
            builder = builder.add_root_certificate(root);
        }
    }

    builder.build().map_err(|e| RouterError::Transport {
        route: opts.hostname.clone(),
        message: e.to_string(),
    })
}

fn convert_headers(headers: &reqwest::header::HeaderMap) -> HeaderBag {
    let mut bag = HeaderBag::new();
    let mut seen = std::collections::HashSet::new();
    for name in headers.keys() {
        if !seen.insert(name.as_str().to_string()) {
            continue;
        }
        let values: Vec<String> = headers
            .get_all(name)
            .iter()
            .filter_map(|v| v.to_str().ok().map(str::to_string))
            .collect();
        match values.len() {
            0 => {}
            1 => bag
                .0
                .push((name.as_str().to_string(), HeaderValue::Single(values.into_iter().next().unwrap()))),
            _ => bag.0.push((name.as_str().to_string(), HeaderValue::Multi(values))),
        }
    }
    bag
}

/// Decompresses a response body per its `content-encoding`: `gzip` via
/// streaming gunzip, `deflate` via streaming inflate, anything else passed
/// through unchanged.
fn decompress(route_name: &str, bytes: &[u8], encoding: Option<&str>) -> Result<Vec<u8>, RouterError> {
    let to_err = |e: std::io::Error| RouterError::Transport {
        route: route_name.to_string(),
        message: format!("failed to decompress response body: {e}"),
    };
    match encoding {
        Some("gzip") => {
            let mut decoder = flate2::read::GzDecoder::new(bytes);
            let mut out = Vec::new();
            decoder.read_to_end(&mut out).map_err(to_err)?;
            Ok(out)
        }
        Some("deflate") => {
            let mut decoder = flate2::read::ZlibDecoder::new(bytes);
            let mut out = Vec::new();
            decoder.read_to_end(&mut out).map_err(to_err)?;
            Ok(out)
        }
        _ => Ok(bytes.to_vec()),
    }
}

/// Renders bytes to a string using the charset named in `content-type`
/// (`charset=([^;,\r\n]+)`, case-insensitive), defaulting to `utf-8`.
pub fn decode_with_charset(body: &[u8], content_type: Option<&str>) -> String {
    let charset = content_type
        .and_then(|ct| CHARSET_RE.captures(ct))
        .map(|c| c[1].trim().to_string())
        .unwrap_or_else(|| "utf-8".to_string());
    let encoding = encoding_rs::Encoding::for_label(charset.as_bytes()).unwrap_or(encoding_rs::UTF_8);
    let (decoded, _, _) = encoding.decode(body);
    decoded.into_owned()
}

pub async fn send_http(
    ctx: &RequestSnapshot,
    route: &Route,
    opts: &HttpRequestOptions,
    base_client: &reqwest::Client,
) -> Result<Response, RouterError> {
    let client = client_for(opts, base_client).await?;
    let scheme = if opts.secured { "https" } else { "http" };
    let url = format!("{scheme}://{}:{}{}", opts.hostname, opts.port, opts.path);

    let method = reqwest::Method::from_bytes(opts.method.as_bytes()).unwrap_or(reqwest::Method::GET);

    let mut header_map = reqwest::header::HeaderMap::new();
    for (name, value) in opts.headers.iter() {
        if let (Ok(hn), Ok(hv)) = (
            reqwest::header::HeaderName::from_bytes(name.as_bytes()),
            reqwest::header::HeaderValue::from_str(&value.as_values().join(", ")),
        ) {
            header_map.insert(hn, hv);
        }
    }
    if let Some(auth) = &opts.auth {
        if let Ok(hv) = reqwest::header::HeaderValue::from_str(auth) {
            header_map.insert(reqwest::header::AUTHORIZATION, hv);
        }
    }

    let mut builder = client.request(method.clone(), &url).headers(header_map);
    if matches!(method, reqwest::Method::POST | reqwest::Method::PUT) {
        builder = builder.body(ctx.body.clone());
    }

    let timeout = Duration::from_millis(opts.timeout_ms);
    let response = match tokio::time::timeout(timeout, builder.send()).await {
        Ok(Ok(resp)) => resp,
        Ok(Err(e)) => {
            return Err(RouterError::Transport {
                route: route.name.clone(),
                message: e.to_string(),
            })
        }
        Err(_) => return Err(RouterError::Timeout(opts.timeout_ms)),
    };

    let status = response.status().as_u16();
    let content_encoding = response
        .headers()
        .get(reqwest::header::CONTENT_ENCODING)
        .and_then(|v| v.to_str().ok())
        .map(str::to_ascii_lowercase);
    let headers = convert_headers(response.headers());

    let raw = match tokio::time::timeout(timeout, response.bytes()).await {
        Ok(Ok(bytes)) => bytes.to_vec(),
        Ok(Err(e)) => {
            return Err(RouterError::Transport {
                route: route.name.clone(),
                message: e.to_string(),
            })
        }
        Err(_) => return Err(RouterError::Timeout(opts.timeout_ms)),
    };

    let body = decompress(&route.name, &raw, content_encoding.as_deref())?;

    Ok(Response {
        status,
        headers,
        body,
        timestamp: Utc::now(),
    })
}
