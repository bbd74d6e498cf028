use std::{net::IpAddr, str::FromStr, sync::OnceLock, time::Duration};

use actix_web::HttpRequest;
use hmac::{Hmac, Mac};
use log::{debug, trace};
use regex::Regex;
use sha2::Sha256;

use crate::errors::AuthError;

type HmacSha256 = Hmac<Sha256>;

/// Get the remote IP address from the request. It uses 3 sources to determine the IP address, in decreasing order
/// of preference:
/// 1. The `X-Forwarded-For` header, iif `use_x_forwarded_for` is set to true in the configuration.
/// 2. The `Forwarded` header, iif `use_forwarded` is set to true in the configuration.
/// 3. The peer address from the connection info.
pub fn get_remote_ip(req: &HttpRequest, use_x_forwarded_for: bool, use_forwarded: bool) -> Option<IpAddr> {
    let mut result = None;
    if use_x_forwarded_for {
        trace!("Checking X-Forwarded-For header");
        // The left-most entry is the original client
        result = req
            .headers()
            .get("X-Forwarded-For")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.split(',').next())
            .and_then(|s| IpAddr::from_str(s.trim()).ok());
        if let Some(ip) = result {
            debug!("Using X-Forwarded-For header for remote address: {ip}");
        }
    }
    if use_forwarded && result.is_none() {
        trace!("Checking Forwarded header");
        result = req
            .headers()
            .get("Forwarded")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| forwarded_regex().captures(v))
            .and_then(|caps| caps.name("ip"))
            .map(|m| m.as_str().trim_matches('"'))
            .and_then(|s| IpAddr::from_str(s).ok());
        if let Some(ip) = result {
            debug!("Using Forwarded header for remote address: {ip}");
        }
    }
    result.or_else(|| {
        let peer_addr = req.peer_addr().map(|a| a.ip());
        trace!("Using Peer address for remote address: {:?}", peer_addr);
        peer_addr
    })
}

fn forwarded_regex() -> &'static Regex {
    static FORWARDED: OnceLock<Regex> = OnceLock::new();
    FORWARDED.get_or_init(|| Regex::new(r#"for=(?P<ip>[^;,]+)"#).expect("forwarded pattern is valid"))
}

//----------------------------------------------   Webhook signatures  -------------------------------------------------

/// The parsed contents of a `t=<unix-ts>,v1=<hex>[,v1=<hex>...]` signature header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureHeader {
    pub timestamp: i64,
    pub signatures: Vec<Vec<u8>>,
}

impl FromStr for SignatureHeader {
    type Err = AuthError;

    fn from_str(header: &str) -> Result<Self, Self::Err> {
        let mut timestamp = None;
        let mut signatures = Vec::new();
        for part in header.split(',') {
            let Some((key, value)) = part.trim().split_once('=') else {
                return Err(AuthError::MalformedSignature(format!("Unexpected element '{part}'")));
            };
            match key {
                "t" => {
                    let ts = value
                        .parse::<i64>()
                        .map_err(|e| AuthError::MalformedSignature(format!("Invalid timestamp. {e}")))?;
                    timestamp = Some(ts);
                },
                "v1" => match hex::decode(value) {
                    Ok(sig) => signatures.push(sig),
                    // A candidate that isn't hex can never match, but other candidates still might
                    Err(e) => debug!("🔐️ Ignoring non-hex v1 signature. {e}"),
                },
                // Other schemes (e.g. v0) are not trusted
                _ => trace!("🔐️ Ignoring signature element '{key}'"),
            }
        }
        let timestamp = timestamp.ok_or_else(|| AuthError::MalformedSignature("No timestamp".into()))?;
        if signatures.is_empty() {
            return Err(AuthError::MalformedSignature("No v1 signature".into()));
        }
        Ok(Self { timestamp, signatures })
    }
}

fn signing_mac(secret: &str, timestamp: i64, body: &[u8]) -> Option<HmacSha256> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(body);
    Some(mac)
}

/// The hex-encoded HMAC-SHA256 of `"{timestamp}.{body}"`.
pub fn calculate_signature(secret: &str, timestamp: i64, body: &[u8]) -> String {
    signing_mac(secret, timestamp, body).map(|mac| hex::encode(mac.finalize().into_bytes())).unwrap_or_default()
}

/// Builds a complete signature header value, as the provider would send it.
pub fn signature_header_value(secret: &str, timestamp: i64, body: &[u8]) -> String {
    format!("t={timestamp},v1={}", calculate_signature(secret, timestamp, body))
}

/// Verifies a webhook signature header against the raw body.
///
/// The timestamp must lie within `tolerance` of `now` (unix seconds). Any one of the `v1` signatures may match, which
/// allows the provider to sign with an old and a new secret during rotation. Comparison is constant-time.
pub fn verify_signature(
    secret: &str,
    header: &str,
    body: &[u8],
    tolerance: Duration,
    now: i64,
) -> Result<(), AuthError> {
    let header = SignatureHeader::from_str(header)?;
    let age = now.abs_diff(header.timestamp);
    if age > tolerance.as_secs() {
        debug!("🔐️ Webhook timestamp is {age}s away from the current time");
        return Err(AuthError::StaleTimestamp);
    }
    let mac = signing_mac(secret, header.timestamp, body).ok_or(AuthError::InvalidSignature)?;
    let valid = header.signatures.iter().any(|sig| mac.clone().verify_slice(sig).is_ok());
    if valid {
        Ok(())
    } else {
        Err(AuthError::InvalidSignature)
    }
}
