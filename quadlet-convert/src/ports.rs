//! Port specification parsing for `ExposeHostPort=` and `PublishPort=`

use std::sync::LazyLock;

use quadlet_core::ConversionError;
use regex::Regex;

static PORT_RANGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]+(-[0-9]+)?(/udp|/tcp)?$").expect("valid port regex"));

/// Whether `port` is `digits[-digits][/tcp|/udp]`
#[must_use]
pub fn is_port_range(port: &str) -> bool {
    PORT_RANGE.is_match(port)
}

/// Split on colons that are not inside `[...]`
///
/// # Example
/// ```
/// use quadlet_convert::ports::split_ports;
///
/// assert_eq!(split_ports("[::1]:8080:80/tcp"), vec!["[::1]", "8080", "80/tcp"]);
/// ```
#[must_use]
pub fn split_ports(ports: &str) -> Vec<&str> {
    let bytes = ports.as_bytes();
    let mut parts = Vec::new();
    let mut start = 0;
    let mut end = 0;

    while end < bytes.len() {
        match bytes[end] {
            b'[' => {
                end += 1;
                while end < bytes.len() && bytes[end] != b']' {
                    end += 1;
                }
                if end < bytes.len() {
                    end += 1;
                }
            }
            b':' => {
                parts.push(&ports[start..end]);
                end += 1;
                start = end;
            }
            _ => end += 1,
        }
    }
    parts.push(&ports[start..end]);

    parts
}

fn invalid_port(value: &str) -> ConversionError {
    ConversionError::InvalidPort {
        value: value.to_string(),
    }
}

/// `--expose=` argument for an `ExposeHostPort=` value
pub fn expose_flag(value: &str) -> Result<String, ConversionError> {
    let port = value.trim();
    if !is_port_range(port) {
        return Err(invalid_port(port));
    }
    Ok(format!("--expose={port}"))
}

/// A parsed `PublishPort=` value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedPort {
    /// Host address to bind, empty for all addresses
    pub ip: String,
    /// Host port or range, empty to let podman choose
    pub host_port: String,
    /// Container port or range
    pub container_port: String,
}

impl PublishedPort {
    /// Parse `[[ip:][host_port]:]container_port`
    ///
    /// An ip of `0.0.0.0` means all addresses and is dropped.
    pub fn parse(value: &str) -> Result<Self, ConversionError> {
        let spec = value.trim();
        let (ip, host_port, container_port) = match split_ports(spec).as_slice() {
            [container] => ("", "", *container),
            [host, container] => ("", *host, *container),
            [ip, host, container] => (*ip, *host, *container),
            _ => return Err(invalid_port(spec)),
        };

        let ip = if ip == "0.0.0.0" { "" } else { ip };

        if !host_port.is_empty() && !is_port_range(host_port) {
            return Err(invalid_port(spec));
        }
        if !is_port_range(container_port) {
            return Err(invalid_port(spec));
        }

        Ok(Self {
            ip: ip.to_string(),
            host_port: host_port.to_string(),
            container_port: container_port.to_string(),
        })
    }

    /// The `-p=` argument
    #[must_use]
    pub fn to_flag(&self) -> String {
        match (self.ip.is_empty(), self.host_port.is_empty()) {
            (false, false) => format!("-p={}:{}:{}", self.ip, self.host_port, self.container_port),
            (false, true) => format!("-p={}::{}", self.ip, self.container_port),
            (true, false) => format!("-p={}:{}", self.host_port, self.container_port),
            (true, true) => format!("-p={}", self.container_port),
        }
    }
}
