//! # Annotation Parsers
//!
//! Pure functions turning one legacy annotation entry into a typed value.
//!
//! Entry parsers take a single `;`-separated entry with whitespace already
//! collapsed (see [`split_entries`]) and return the [`Scope`] the entry applies
//! to together with the parsed value.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;

use super::{Scope, ScopedValues};
use crate::error::AnnotationError;

/// Split an annotation value on `;`, trimming entries, dropping empty ones and
/// collapsing inner whitespace to single spaces
#[must_use]
pub fn split_entries(value: &str) -> Vec<String> {
    value
        .split(';')
        .map(|entry| entry.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|entry| !entry.is_empty())
        .collect()
}

/// `key=value` with exactly one `=`
fn exact_pair(part: &str) -> Option<(&str, &str)> {
    let (key, value) = part.split_once('=')?;
    if value.contains('=') {
        return None;
    }
    Some((key, value))
}

/// Scope of an entry from its optional `serviceName=<svc>` block
fn parse_service_scope(entry: &str, optional: bool) -> Result<Scope, AnnotationError> {
    let Some(block) = entry.splitn(2, ' ').find(|part| part.contains("serviceName")) else {
        if optional {
            return Ok(Scope::All);
        }
        return Err(AnnotationError::MissingServiceName(entry.to_string()));
    };
    let (key, service) = exact_pair(block)
        .ok_or_else(|| AnnotationError::format(entry, "invalid service name format"))?;
    if key != "serviceName" {
        return Err(AnnotationError::format(entry, "invalid service name format"));
    }
    if service.is_empty() {
        return Err(AnnotationError::format(entry, "missing serviceName value"));
    }
    Ok(Scope::Named(service.to_string()))
}

/// `[serviceName=<svc>] [<key>=]<value>`
fn parse_service_with_single_value(
    entry: &str,
    key: &str,
) -> Result<(Scope, String), AnnotationError> {
    let scope = parse_service_scope(entry, true)?;
    let block = entry
        .splitn(2, ' ')
        .find(|part| !part.contains("serviceName"))
        .ok_or_else(|| AnnotationError::format(entry, "missing value part"))?;

    let value = match block.split('=').collect::<Vec<_>>().as_slice() {
        [value] => *value,
        [name, value] if *name == key => *value,
        _ => return Err(AnnotationError::format(entry, "invalid value format")),
    };
    if value.is_empty() {
        return Err(AnnotationError::format(entry, "missing value"));
    }
    Ok((scope, value.to_string()))
}

static TIMEOUT_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<number>\d+)(?P<unit>ms|s|m|h|w)$")
        .expect("Failed to compile the timeout pattern - this should never happen")
});

/// Convert `<number><unit>` with unit `ms`, `s`, `m`, `h` or `w` to whole seconds
///
/// Milliseconds are rounded up so a non-zero timeout never becomes zero.
/// Values that do not fit in a `u64` of seconds are rejected.
pub fn parse_timeout(value: &str) -> Result<u64, AnnotationError> {
    let invalid = || AnnotationError::InvalidTimeout(value.to_string());
    let captures = TIMEOUT_REGEX.captures(value.trim()).ok_or_else(invalid)?;

    let number: u64 = captures["number"].parse().ok().ok_or_else(invalid)?;
    let seconds = match &captures["unit"] {
        "ms" => Some(number.div_ceil(1000)),
        "s" => Some(number),
        "m" => number.checked_mul(60),
        "h" => number.checked_mul(3600),
        "w" => number.checked_mul(7 * 24 * 3600),
        _ => None,
    };
    seconds.ok_or_else(invalid)
}

/// Convert a sequence of `<number><unit>` with unit `h`, `m` or `s` to seconds (`1h10m10s` is 4210)
pub fn parse_time_with_units(value: &str) -> Result<u64, AnnotationError> {
    let invalid = || AnnotationError::InvalidDuration(value.to_string());
    let mut total = 0u64;
    let mut digits = String::new();
    for c in value.trim().chars() {
        if c.is_ascii_digit() {
            digits.push(c);
            continue;
        }
        let unit = match c {
            'h' => 3600,
            'm' => 60,
            's' => 1,
            _ => return Err(invalid()),
        };
        let number: u64 = digits.parse().ok().ok_or_else(invalid)?;
        total = number
            .checked_mul(unit)
            .and_then(|seconds| total.checked_add(seconds))
            .ok_or_else(invalid)?;
        digits.clear();
    }
    if !digits.is_empty() {
        return Err(invalid());
    }
    Ok(total)
}

/// `rewrite-path`: `serviceName=<svc> rewrite=<path>`
pub fn parse_rewrite(entry: &str) -> Result<(Scope, String), AnnotationError> {
    let parts: Vec<&str> = entry.split(' ').collect();
    if parts.len() != 2 {
        return Err(AnnotationError::format(entry, "expected serviceName and rewrite"));
    }
    let mut service = "";
    let mut rewrite = "";
    for part in parts {
        match exact_pair(part) {
            Some(("serviceName", value)) => service = value,
            Some(("rewrite", value)) => rewrite = value,
            _ => return Err(AnnotationError::format(entry, "expected serviceName and rewrite")),
        }
    }
    if service.is_empty() || rewrite.is_empty() {
        return Err(AnnotationError::format(entry, "expected serviceName and rewrite"));
    }
    Ok((Scope::Named(service.to_string()), rewrite.to_string()))
}

/// `proxy-read-timeout` / `proxy-connect-timeout`: `[serviceName=<svc>] [timeout=]<time>`, in seconds
pub fn parse_proxy_timeout(entry: &str) -> Result<(Scope, String), AnnotationError> {
    let (scope, value) = parse_service_with_single_value(entry, "timeout")?;
    Ok((scope, parse_timeout(&value)?.to_string()))
}

/// `proxy-buffering`: `[serviceName=<svc>] [enabled=]<bool>` as `on` / `off`
pub fn parse_proxy_buffering(entry: &str) -> Result<(Scope, String), AnnotationError> {
    let (scope, value) = parse_service_with_single_value(entry, "enabled")?;
    let buffering = if value == "true" { "on" } else { "off" };
    Ok((scope, buffering.to_string()))
}

/// `client-max-body-size`: `[serviceName=<svc>] [size=]<size>`
pub fn parse_client_max_body_size(entry: &str) -> Result<(Scope, String), AnnotationError> {
    parse_service_with_single_value(entry, "size")
}

/// `keepalive-requests`: `[serviceName=<svc>] [requests=]<n>`
pub fn parse_keepalive_requests(entry: &str) -> Result<(Scope, String), AnnotationError> {
    parse_service_with_single_value(entry, "requests")
}

/// `keepalive-timeout`: `[serviceName=<svc>] [timeout=]<time>`
pub fn parse_keepalive_timeout(entry: &str) -> Result<(Scope, String), AnnotationError> {
    parse_service_with_single_value(entry, "timeout")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyBuffers {
    pub number: String,
    pub size: String,
}

/// `proxy-buffers`: `[serviceName=<svc>] number=<n> size=<size>`
pub fn parse_proxy_buffers(entry: &str) -> Result<(Scope, ProxyBuffers), AnnotationError> {
    let scope = parse_service_scope(entry, true)?;
    let mut number = None;
    let mut size = None;
    for part in entry.split(' ').filter(|part| !part.starts_with("serviceName")) {
        match exact_pair(part) {
            Some(("number", value)) if !value.is_empty() => number = Some(value),
            Some(("size", value)) if !value.is_empty() => size = Some(value),
            _ => return Err(AnnotationError::format(entry, "expected number and size")),
        }
    }
    match (number, size) {
        (Some(number), Some(size)) => Ok((
            scope,
            ProxyBuffers {
                number: number.to_string(),
                size: size.to_string(),
            },
        )),
        _ => Err(AnnotationError::format(entry, "expected number and size")),
    }
}

/// One `ssl-services` entry; the secret is the bare name as written
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SslService {
    pub secret: String,
    pub verify_depth: u8,
    pub name: String,
}

/// `ssl-services`: `ssl-service=<svc> [ssl-secret=<secret>] [proxy-ssl-verify-depth=<1-10>] [proxy-ssl-name=<cn>]`
pub fn parse_ssl_service(entry: &str) -> Result<(Scope, SslService), AnnotationError> {
    let parts: Vec<&str> = entry.split(' ').collect();
    if parts.is_empty() || parts.len() > 4 {
        return Err(AnnotationError::format(entry, "expected 1 to 4 parameters"));
    }

    let service = match exact_pair(parts[0]) {
        Some(("ssl-service", service)) if !service.is_empty() => service,
        Some(("ssl-service", _)) => return Err(AnnotationError::MissingServiceName(entry.to_string())),
        _ => return Err(AnnotationError::format(entry, "first key must be ssl-service")),
    };

    let mut ssl = SslService {
        secret: String::new(),
        verify_depth: 1,
        name: String::new(),
    };
    if let Some(part) = parts.get(1) {
        match exact_pair(part) {
            Some(("ssl-secret", secret)) => ssl.secret = secret.to_string(),
            _ => return Err(AnnotationError::format(entry, "second key must be ssl-secret")),
        }
    }
    for part in parts.iter().skip(2) {
        match exact_pair(part) {
            Some(("proxy-ssl-verify-depth", depth)) => {
                ssl.verify_depth = depth
                    .parse::<u8>()
                    .ok()
                    .filter(|depth| (1..=10).contains(depth))
                    .ok_or_else(|| AnnotationError::InvalidVerifyDepth(depth.to_string()))?;
            }
            Some(("proxy-ssl-name", name)) => ssl.name = name.to_string(),
            _ => return Err(AnnotationError::format(entry, "unknown optional parameter")),
        }
    }
    Ok((Scope::Named(service.to_string()), ssl))
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NextUpstream {
    /// Space-separated conditions, or `off`
    pub conditions: String,
    pub timeout: String,
    pub tries: String,
}

const NEXT_UPSTREAM_CONDITIONS: &[&str] = &[
    "error",
    "invalid_header",
    "http_500",
    "http_502",
    "http_503",
    "http_504",
    "http_403",
    "http_404",
    "http_429",
    "non_idempotent",
];

/// `proxy-next-upstream-config`: `serviceName=<svc> [retries=<n>] [timeout=<t>] [<condition>=true]... [off=true]`
pub fn parse_next_upstream(entry: &str) -> Result<(Scope, NextUpstream), AnnotationError> {
    let mut config = NextUpstream::default();

    let conditions: Vec<&str> = NEXT_UPSTREAM_CONDITIONS
        .iter()
        .copied()
        .filter(|condition| entry.contains(&format!("{condition}=true")))
        .collect();
    config.conditions = if entry.contains("off=true") {
        "off".to_string()
    } else {
        conditions.join(" ")
    };

    let mut service = "";
    for (key, value) in entry.split(' ').filter_map(exact_pair) {
        match key {
            "serviceName" => service = value,
            "retries" => config.tries = value.to_string(),
            "timeout" => config.timeout = value.to_string(),
            _ => {}
        }
    }
    if service.is_empty() {
        return Err(AnnotationError::MissingServiceName(entry.to_string()));
    }
    Ok((Scope::Named(service.to_string()), config))
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StickyCookie {
    pub name: String,
    /// Lifetime in seconds
    pub expires: String,
    pub path: String,
    pub hash: String,
    pub secure: bool,
    pub http_only: bool,
}

/// `sticky-cookie-services`: `serviceName=<svc> name=<n> expires=<1h10m> path=<p> hash=sha1 [secure] [httponly]`
pub fn parse_sticky_cookie(entry: &str) -> Result<(Scope, StickyCookie), AnnotationError> {
    let mut cookie = StickyCookie::default();
    let mut service = "";
    for part in entry.split(' ') {
        match part {
            "secure" => cookie.secure = true,
            "httponly" => cookie.http_only = true,
            _ => match exact_pair(part) {
                Some(("serviceName", value)) => service = value,
                Some(("name", value)) => cookie.name = value.to_string(),
                Some(("expires", value)) => {
                    cookie.expires = parse_time_with_units(value)?.to_string();
                }
                Some(("path", value)) => cookie.path = value.to_string(),
                Some(("hash", value)) => cookie.hash = value.to_string(),
                Some(_) => {}
                None => return Err(AnnotationError::format(entry, "expected key=value")),
            },
        }
    }
    if service.is_empty() {
        return Err(AnnotationError::MissingServiceName(entry.to_string()));
    }
    Ok((Scope::Named(service.to_string()), cookie))
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MutualAuth {
    pub secret_name: String,
    pub port: String,
}

impl MutualAuth {
    /// Both the secret and the port are needed for the legacy controller to apply it
    #[must_use]
    pub fn is_set(&self) -> bool {
        !self.secret_name.is_empty() && !self.port.is_empty()
    }
}

/// `mutual-auth`: `secretName=<secret> port=<port> [serviceName=<svc>,...]`
pub fn parse_mutual_auth(value: &str) -> Result<MutualAuth, AnnotationError> {
    let mut auth = MutualAuth::default();
    for part in value.split_whitespace() {
        match exact_pair(part) {
            Some(("secretName", secret)) => auth.secret_name = secret.to_string(),
            Some(("port", port)) => auth.port = port.to_string(),
            Some(_) => {}
            None => return Err(AnnotationError::format(value, "expected key=value")),
        }
    }
    Ok(auth)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestType {
    Api,
    Web,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppIdAuth {
    pub bind_secret: String,
    pub namespace: String,
    pub request_type: RequestType,
    /// Applications expect `Bearer <access> <id>` instead of `Bearer <access>`
    pub id_token: bool,
}

/// `appid-auth`: `bindSecret=<secret> serviceName=<svc> [namespace=<ns>] [requestType=api|web] [idToken=<bool>]`
pub fn parse_appid_auth(entry: &str) -> Result<(Scope, AppIdAuth), AnnotationError> {
    let mut service = "";
    let mut bind_secret = "";
    let mut namespace = "";
    let mut request_type = RequestType::Api;
    let mut id_token = true;
    for part in entry.split_whitespace() {
        let (key, value) =
            exact_pair(part).ok_or_else(|| AnnotationError::format(entry, "expected key=value"))?;
        match key {
            "serviceName" => service = value,
            "bindSecret" => bind_secret = value,
            "namespace" => namespace = value,
            "requestType" => {
                request_type = match value {
                    "api" => RequestType::Api,
                    "web" => RequestType::Web,
                    other => return Err(AnnotationError::InvalidRequestType(other.to_string())),
                };
            }
            "idToken" => id_token = value == "true",
            _ => {}
        }
    }
    if service.is_empty() || bind_secret.is_empty() {
        return Err(AnnotationError::format(entry, "serviceName and bindSecret are required"));
    }
    Ok((
        Scope::Named(service.to_string()),
        AppIdAuth {
            bind_secret: bind_secret.to_string(),
            namespace: if namespace.is_empty() { "default" } else { namespace }.to_string(),
            request_type,
            id_token,
        },
    ))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocationModifier {
    /// `~*`
    CaseInsensitiveRegex,
    /// `=`
    Exact,
    /// `~`
    CaseSensitiveRegex,
    /// `^~`
    PrefixPriority,
}

impl LocationModifier {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            LocationModifier::CaseInsensitiveRegex => "~*",
            LocationModifier::Exact => "=",
            LocationModifier::CaseSensitiveRegex => "~",
            LocationModifier::PrefixPriority => "^~",
        }
    }
}

/// `location-modifier`: `serviceName=<svc> modifier='<modifier>'`
pub fn parse_location_modifier(entry: &str) -> Result<(Scope, LocationModifier), AnnotationError> {
    let parts: Vec<&str> = entry.split(' ').collect();
    if parts.len() != 2 {
        return Err(AnnotationError::format(entry, "expected serviceName and modifier"));
    }
    let mut service = "";
    let mut modifier = "";
    for part in parts {
        match part.split_once('=') {
            Some(("serviceName", value)) => service = value,
            Some(("modifier", value)) => modifier = value,
            _ => return Err(AnnotationError::format(entry, "expected serviceName and modifier")),
        }
    }
    if service.is_empty() || modifier.is_empty() {
        return Err(AnnotationError::format(entry, "expected serviceName and modifier"));
    }
    let modifier = match modifier.trim_matches(|c| c == '\'' || c == '"') {
        "~*" => LocationModifier::CaseInsensitiveRegex,
        "=" => LocationModifier::Exact,
        "~" => LocationModifier::CaseSensitiveRegex,
        "^~" => LocationModifier::PrefixPriority,
        other => return Err(AnnotationError::UnknownModifier(other.to_string())),
    };
    Ok((Scope::Named(service.to_string()), modifier))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TcpPortEntry {
    pub service_name: String,
    pub ingress_port: String,
    pub service_port: String,
}

/// `tcp-ports`: `serviceName=<svc> ingressPort=<port> [servicePort=<port>]` entries
///
/// The service port defaults to the ingress port.
pub fn parse_tcp_ports(value: &str) -> Result<Vec<TcpPortEntry>, AnnotationError> {
    let mut entries = Vec::new();
    for entry in split_entries(value) {
        let mut service_name = "";
        let mut ingress_port = "";
        let mut service_port = "";
        for part in entry.split(' ') {
            match exact_pair(part) {
                Some(("serviceName", v)) => service_name = v,
                Some(("ingressPort", v)) => ingress_port = v,
                Some(("servicePort", v)) => service_port = v,
                _ => return Err(AnnotationError::format(&entry, "unexpected tcp-ports parameter")),
            }
        }
        if service_name.is_empty() {
            return Err(AnnotationError::MissingServiceName(entry.clone()));
        }
        if ingress_port.is_empty() {
            return Err(AnnotationError::format(&entry, "ingressPort is required"));
        }
        if service_port.is_empty() {
            service_port = ingress_port;
        }
        entries.push(TcpPortEntry {
            service_name: service_name.to_string(),
            ingress_port: ingress_port.to_string(),
            service_port: service_port.to_string(),
        });
    }
    Ok(entries)
}

/// `large-client-header-buffers`: `number=<n> size=<size>` as `<n> <size>`
pub fn parse_large_client_header_buffers(value: &str) -> Result<String, AnnotationError> {
    let parts: Vec<&str> = value.split_whitespace().collect();
    if parts.len() != 2 {
        return Err(AnnotationError::format(value, "expected number and size"));
    }
    let mut number = "";
    let mut size = "";
    for part in parts {
        match exact_pair(part) {
            Some(("number", v)) => number = v,
            Some(("size", v)) => size = v,
            _ => return Err(AnnotationError::format(value, "expected number and size")),
        }
    }
    if number.is_empty() || size.is_empty() {
        return Err(AnnotationError::format(value, "empty number or size"));
    }
    Ok(format!("{number} {size}"))
}

/// Header modification blocks: `serviceName=<svc> { <lines> }` repeated
///
/// Returns the non-empty, trimmed lines of every block keyed by service.
pub fn parse_header_blocks(value: &str) -> Result<BTreeMap<String, Vec<String>>, AnnotationError> {
    let mut blocks = BTreeMap::new();
    let mut rest = value;
    while let Some(open) = rest.find('{') {
        let close = rest
            .find('}')
            .ok_or_else(|| AnnotationError::format(value, "missing closing bracket"))?;
        if open > close {
            return Err(AnnotationError::format(value, "missing opening bracket"));
        }
        let body = &rest[open + 1..close];
        if body.contains('{') {
            return Err(AnnotationError::format(value, "missing closing bracket"));
        }

        let service = match exact_pair(rest[..open].trim()) {
            Some(("serviceName", service)) if !service.is_empty() => service,
            Some(("serviceName", _)) => {
                return Err(AnnotationError::format(value, "empty serviceName value"))
            }
            _ => return Err(AnnotationError::format(value, "wrong service selector")),
        };
        if blocks.contains_key(service) {
            return Err(AnnotationError::DuplicateService(service.to_string()));
        }
        let lines = body
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect();
        blocks.insert(service.to_string(), lines);
        rest = &rest[close + 1..];
    }
    if blocks.is_empty() {
        return Err(AnnotationError::NoContent);
    }
    Ok(blocks)
}

const END_OF_SNIPPET: &str = "<EOS>";

/// `location-snippets`: lines, optionally grouped into `serviceName=<svc>` blocks ended by `<EOS>`
///
/// Without any `<EOS>` marker every line applies to all services. Lines after
/// the last marker are ignored.
pub fn parse_location_snippets(value: &str) -> Result<ScopedValues<Vec<String>>, AnnotationError> {
    let lines: Vec<&str> = value.split('\n').collect();
    let ends: Vec<usize> = lines
        .iter()
        .enumerate()
        .filter(|(_, line)| line.trim_matches(' ') == END_OF_SNIPPET)
        .map(|(index, _)| index)
        .collect();

    let mut snippets: ScopedValues<Vec<String>> = ScopedValues::new();
    if ends.is_empty() {
        snippets.insert(Scope::All, lines.iter().map(|line| line.to_string()).collect());
        return Ok(snippets);
    }

    let mut grouped: BTreeMap<Scope, Vec<String>> = BTreeMap::new();
    let mut start = 0;
    for end in ends {
        let header = lines[start];
        let (scope, body_start) = if header.contains("serviceName") {
            let service = header
                .split_once('=')
                .and_then(|(_, rest)| rest.split_whitespace().next())
                .ok_or_else(|| AnnotationError::format(header, "invalid service name format"))?;
            (Scope::Named(service.to_string()), start + 1)
        } else {
            (Scope::All, start)
        };
        let body = lines[body_start.min(end)..end].iter().map(|line| line.to_string());
        grouped.entry(scope).or_default().extend(body);
        start = end + 1;
    }
    for (scope, lines) in grouped {
        snippets.insert(scope, lines);
    }
    Ok(snippets)
}

/// `server-snippets`: one directive per non-empty line
#[must_use]
pub fn parse_server_snippets(value: &str) -> Vec<String> {
    value
        .split('\n')
        .filter(|line| !line.trim().is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_entries_collapses_whitespace() {
        assert_eq!(
            split_entries(" serviceName=tea-svc   timeout=5s ;; serviceName=coffee-svc\ttimeout=1m;"),
            vec!["serviceName=tea-svc timeout=5s", "serviceName=coffee-svc timeout=1m"]
        );
    }

    #[test]
    fn test_parse_timeout_units() {
        assert_eq!(parse_timeout("30s"), Ok(30));
        assert_eq!(parse_timeout("6m"), Ok(360));
        assert_eq!(parse_timeout("2h"), Ok(7200));
        assert_eq!(parse_timeout("1w"), Ok(604_800));
        assert_eq!(parse_timeout("1500ms"), Ok(2));
        assert!(parse_timeout("5").is_err());
        assert!(parse_timeout("5d").is_err());
        assert!(parse_timeout("m").is_err());
    }

    #[test]
    fn test_parse_timeout_rejects_overflowing_values() {
        assert_eq!(
            parse_timeout("40000000000000w"),
            Err(AnnotationError::InvalidTimeout("40000000000000w".to_string()))
        );
        assert!(parse_timeout("18446744073709551615h").is_err());
        assert!(parse_timeout("99999999999999999999s").is_err());
        assert_eq!(parse_timeout("18446744073709551615s"), Ok(u64::MAX));
        assert_eq!(parse_timeout("18446744073709551615ms"), Ok(18_446_744_073_709_552));
    }

    #[test]
    fn test_parse_time_with_units() {
        assert_eq!(parse_time_with_units("1h10m10s"), Ok(4210));
        assert_eq!(parse_time_with_units("8s"), Ok(8));
        assert!(parse_time_with_units("1d").is_err());
        assert!(parse_time_with_units("h").is_err());
        assert!(parse_time_with_units("10").is_err());
    }

    #[test]
    fn test_parse_time_with_units_rejects_overflowing_values() {
        assert_eq!(
            parse_time_with_units("18446744073709551615h"),
            Err(AnnotationError::InvalidDuration("18446744073709551615h".to_string()))
        );
        assert!(parse_time_with_units("18446744073709551615s1s").is_err());
        assert_eq!(parse_time_with_units("18446744073709551614s1s"), Ok(u64::MAX));
    }

    #[test]
    fn test_parse_proxy_timeout_scopes() {
        assert_eq!(
            parse_proxy_timeout("serviceName=tea-svc timeout=2m"),
            Ok((Scope::Named("tea-svc".to_string()), "120".to_string()))
        );
        assert_eq!(parse_proxy_timeout("timeout=5s"), Ok((Scope::All, "5".to_string())));
        assert_eq!(parse_proxy_timeout("5s"), Ok((Scope::All, "5".to_string())));
        assert!(parse_proxy_timeout("serviceName= timeout=5s").is_err());
        assert!(parse_proxy_timeout("size=5s").is_err());
    }

    #[test]
    fn test_parse_rewrite_requires_both_keys() {
        assert_eq!(
            parse_rewrite("serviceName=tea-svc rewrite=/leaves/"),
            Ok((Scope::Named("tea-svc".to_string()), "/leaves/".to_string()))
        );
        assert!(parse_rewrite("rewrite=/leaves/").is_err());
        assert!(parse_rewrite("serviceName=tea-svc path=/leaves/").is_err());
    }

    #[test]
    fn test_parse_proxy_buffering_and_buffers() {
        assert_eq!(
            parse_proxy_buffering("serviceName=tea-svc enabled=true"),
            Ok((Scope::Named("tea-svc".to_string()), "on".to_string()))
        );
        assert_eq!(parse_proxy_buffering("enabled=false"), Ok((Scope::All, "off".to_string())));

        let (scope, buffers) = parse_proxy_buffers("serviceName=tea-svc number=4 size=1k").unwrap();
        assert_eq!(scope, Scope::Named("tea-svc".to_string()));
        assert_eq!(buffers.number, "4");
        assert_eq!(buffers.size, "1k");
        let (scope, _) = parse_proxy_buffers("number=4 size=1k").unwrap();
        assert_eq!(scope, Scope::All);
        assert!(parse_proxy_buffers("number=4").is_err());
    }

    #[test]
    fn test_parse_ssl_service() {
        let (scope, ssl) = parse_ssl_service(
            "ssl-service=coffee-svc ssl-secret=coffee-ssl proxy-ssl-verify-depth=3 proxy-ssl-name=coffee.example.com",
        )
        .unwrap();
        assert_eq!(scope, Scope::Named("coffee-svc".to_string()));
        assert_eq!(ssl.secret, "coffee-ssl");
        assert_eq!(ssl.verify_depth, 3);
        assert_eq!(ssl.name, "coffee.example.com");

        let (_, ssl) = parse_ssl_service("ssl-service=tea-svc").unwrap();
        assert_eq!(ssl.verify_depth, 1);
        assert!(ssl.secret.is_empty());

        assert_eq!(
            parse_ssl_service("ssl-service=tea-svc ssl-secret=s proxy-ssl-verify-depth=11"),
            Err(AnnotationError::InvalidVerifyDepth("11".to_string()))
        );
        assert!(parse_ssl_service("ssl-secret=s ssl-service=tea-svc").is_err());
    }

    #[test]
    fn test_parse_next_upstream() {
        let (scope, config) = parse_next_upstream(
            "serviceName=tea-svc retries=3 timeout=50s error=true http_502=true non_idempotent=true",
        )
        .unwrap();
        assert_eq!(scope, Scope::Named("tea-svc".to_string()));
        assert_eq!(config.conditions, "error http_502 non_idempotent");
        assert_eq!(config.tries, "3");
        assert_eq!(config.timeout, "50s");

        let (_, config) = parse_next_upstream("serviceName=tea-svc error=true off=true").unwrap();
        assert_eq!(config.conditions, "off");
        assert!(parse_next_upstream("error=true").is_err());
    }

    #[test]
    fn test_parse_sticky_cookie() {
        let (scope, cookie) = parse_sticky_cookie(
            "serviceName=tea-svc name=sticky expires=1h10m path=/tea hash=sha1 secure",
        )
        .unwrap();
        assert_eq!(scope, Scope::Named("tea-svc".to_string()));
        assert_eq!(cookie.name, "sticky");
        assert_eq!(cookie.expires, "4200");
        assert_eq!(cookie.path, "/tea");
        assert!(cookie.secure);
        assert!(!cookie.http_only);
        assert!(parse_sticky_cookie("name=sticky").is_err());
        assert!(parse_sticky_cookie("serviceName=tea-svc expires=1d").is_err());
    }

    #[test]
    fn test_parse_appid_auth_defaults() {
        let (scope, auth) =
            parse_appid_auth("bindSecret=binding-appid-1 serviceName=tea-svc").unwrap();
        assert_eq!(scope, Scope::Named("tea-svc".to_string()));
        assert_eq!(auth.namespace, "default");
        assert_eq!(auth.request_type, RequestType::Api);
        assert!(auth.id_token);

        let (_, auth) = parse_appid_auth(
            "bindSecret=binding-appid-1 serviceName=tea-svc namespace=cafe requestType=web idToken=false",
        )
        .unwrap();
        assert_eq!(auth.request_type, RequestType::Web);
        assert!(!auth.id_token);

        assert_eq!(
            parse_appid_auth("bindSecret=b serviceName=s requestType=cli"),
            Err(AnnotationError::InvalidRequestType("cli".to_string()))
        );
        assert!(parse_appid_auth("serviceName=tea-svc").is_err());
    }

    #[test]
    fn test_parse_location_modifier() {
        assert_eq!(
            parse_location_modifier("serviceName=tea-svc modifier='~*'"),
            Ok((Scope::Named("tea-svc".to_string()), LocationModifier::CaseInsensitiveRegex))
        );
        assert_eq!(
            parse_location_modifier("serviceName=tea-svc modifier='='"),
            Ok((Scope::Named("tea-svc".to_string()), LocationModifier::Exact))
        );
        assert_eq!(
            parse_location_modifier("serviceName=tea-svc modifier='@'"),
            Err(AnnotationError::UnknownModifier("@".to_string()))
        );
        assert!(parse_location_modifier("modifier='~*'").is_err());
    }

    #[test]
    fn test_parse_tcp_ports_defaults_service_port() {
        let entries = parse_tcp_ports(
            "serviceName=coffee-svc ingressPort=9090 servicePort=8080;serviceName=tea-svc ingressPort=9091",
        )
        .unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].service_port, "8080");
        assert_eq!(entries[1].service_port, "9091");
        assert!(parse_tcp_ports("ingressPort=9090").is_err());
        assert!(parse_tcp_ports("serviceName=tea-svc").is_err());
    }

    #[test]
    fn test_parse_large_client_header_buffers() {
        assert_eq!(
            parse_large_client_header_buffers("number=4 size=8k"),
            Ok("4 8k".to_string())
        );
        assert!(parse_large_client_header_buffers("number=4").is_err());
        assert!(parse_large_client_header_buffers("number=4 length=8k").is_err());
    }

    #[test]
    fn test_parse_mutual_auth() {
        let auth = parse_mutual_auth("secretName=ca-secret port=9443 serviceName=tea-svc").unwrap();
        assert_eq!(auth.secret_name, "ca-secret");
        assert_eq!(auth.port, "9443");
        assert!(auth.is_set());
        assert!(!parse_mutual_auth("secretName=ca-secret").unwrap().is_set());
    }

    #[test]
    fn test_parse_header_blocks() {
        let blocks = parse_header_blocks(
            "serviceName=tea-svc {\n  X-Tea green;\n  X-Cup large;\n}\nserviceName=coffee-svc {\n X-Bean arabica;\n}",
        )
        .unwrap();
        assert_eq!(blocks["tea-svc"], vec!["X-Tea green;", "X-Cup large;"]);
        assert_eq!(blocks["coffee-svc"], vec!["X-Bean arabica;"]);

        assert_eq!(parse_header_blocks("X-Tea green;"), Err(AnnotationError::NoContent));
        assert_eq!(
            parse_header_blocks("serviceName=tea-svc { a; } serviceName=tea-svc { b; }"),
            Err(AnnotationError::DuplicateService("tea-svc".to_string()))
        );
        assert!(parse_header_blocks("serviceName=tea-svc { a;").is_err());
        assert!(parse_header_blocks("serviceName=tea-svc { a; { b; }").is_err());
        assert!(parse_header_blocks("service=tea-svc { a; }").is_err());
    }

    #[test]
    fn test_parse_location_snippets_blocks() {
        let snippets = parse_location_snippets(
            "serviceName=tea-svc\nrewrite_log on;\nproxy_set_header X-Tea green;\n<EOS>\nproxy_set_header X-All yes;\n<EOS>\n",
        )
        .unwrap();
        assert_eq!(
            snippets.get("tea-svc").unwrap(),
            &vec!["rewrite_log on;".to_string(), "proxy_set_header X-Tea green;".to_string()]
        );
        assert_eq!(
            snippets.get("coffee-svc").unwrap(),
            &vec!["proxy_set_header X-All yes;".to_string()]
        );
    }

    #[test]
    fn test_parse_location_snippets_without_markers() {
        let snippets = parse_location_snippets("rewrite_log on;\nadd_header X-Y z;").unwrap();
        assert_eq!(snippets.all().unwrap().len(), 2);
    }
}
