use core::fmt;
use core::net::{IpAddr, SocketAddrV4, SocketAddrV6};

use edge_nal::{AddrType, Dns};

/// Address family filter applied during resolution (spec.md §4.A).
///
/// Mirrors `AF_INET` / `AF_INET6` / unspecified from the original design.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Family {
    V4,
    V6,
    Any,
}

impl From<Family> for AddrType {
    fn from(family: Family) -> Self {
        match family {
            Family::V4 => AddrType::IPv4,
            Family::V6 => AddrType::IPv6,
            Family::Any => AddrType::Either,
        }
    }
}

/// A tagged IPv4/IPv6 network endpoint.
///
/// Equality ignores the port, per spec.md §3: two addresses are equal when
/// they share a family and raw address bytes.
#[derive(Clone, Copy, Debug)]
pub enum Addr {
    V4(SocketAddrV4),
    V6(SocketAddrV6),
}

impl Addr {
    pub fn port(&self) -> u16 {
        match self {
            Self::V4(a) => a.port(),
            Self::V6(a) => a.port(),
        }
    }

    pub fn with_port(&self, port: u16) -> Self {
        match self {
            Self::V4(a) => Self::V4(SocketAddrV4::new(*a.ip(), port)),
            Self::V6(a) => Self::V6(SocketAddrV6::new(*a.ip(), port, a.flowinfo(), a.scope_id())),
        }
    }

    pub fn is_v4(&self) -> bool {
        matches!(self, Self::V4(_))
    }
}

impl PartialEq for Addr {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::V4(a), Self::V4(b)) => a.ip() == b.ip(),
            (Self::V6(a), Self::V6(b)) => a.ip() == b.ip(),
            _ => false,
        }
    }
}

impl Eq for Addr {}

impl fmt::Display for Addr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::V4(a) => write!(f, "{}:{}", a.ip(), a.port()),
            Self::V6(a) => write!(f, "[{}]:{}", a.ip(), a.port()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddrParseError {
    /// Malformed `[addr]:port` / `addr:port` / bare-addr syntax.
    Syntax,
    /// The configured resolver could not resolve the host part at all.
    Resolve,
    /// The host resolved, but not to an address in the requested family.
    Family,
}

impl fmt::Display for AddrParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Syntax => write!(f, "malformed address"),
            Self::Resolve => write!(f, "could not resolve address"),
            Self::Family => write!(f, "no address in the requested family"),
        }
    }
}

impl std::error::Error for AddrParseError {}

/// Split the four syntactic forms from spec.md §4.A into `(host, port)`
/// string slices, without resolving anything yet.
fn split(full: &str, default_port: &str) -> Result<(&str, &str), AddrParseError> {
    if let Some(rest) = full.strip_prefix('[') {
        let close = rest.find(']').ok_or(AddrParseError::Syntax)?;
        let host = &rest[..close];
        let tail = &rest[close + 1..];

        if tail.is_empty() {
            Ok((host, default_port))
        } else if let Some(port) = tail.strip_prefix(':') {
            if port.is_empty() {
                Err(AddrParseError::Syntax)
            } else {
                Ok((host, port))
            }
        } else {
            Err(AddrParseError::Syntax)
        }
    } else {
        // <addr:port> is only accepted when addr itself has no colon, i.e.
        // when there is exactly one colon in the whole string (the original
        // `addr_parse_full` compares the first and the last colon).
        let first = full.find(':');
        let last = full.rfind(':');

        match (first, last) {
            (Some(f), Some(l)) if f == l => {
                let (host, rest) = full.split_at(f);
                let port = &rest[1..];
                if host.is_empty() || port.is_empty() {
                    Err(AddrParseError::Syntax)
                } else {
                    Ok((host, port))
                }
            }
            _ => Ok((full, default_port)),
        }
    }
}

/// Parse and resolve one of the four address forms from spec.md §4.A:
/// `ADDR`, `ADDR:PORT`, `[ADDR]`, `[ADDR]:PORT`.
///
/// `default_port` is used whenever no explicit port is present. Only
/// numeric ports are supported: the original's service-name lookup
/// (`getservbyname`) is a blocking libc call with no equivalent in the
/// injected [`Dns`] trait, so it is out of scope here (see DESIGN.md).
pub async fn parse_addr<D: Dns>(
    dns: &D,
    full: &str,
    default_port: &str,
    family: Family,
) -> Result<Addr, AddrParseError> {
    let (host, port_str) = split(full, default_port)?;

    let port: u16 = port_str.parse().map_err(|_| AddrParseError::Syntax)?;

    let ip = dns
        .get_host_by_name(host, family.into())
        .await
        .map_err(|_| AddrParseError::Resolve)?;

    match (ip, family) {
        (IpAddr::V4(v4), Family::V4 | Family::Any) => Ok(Addr::V4(SocketAddrV4::new(v4, port))),
        (IpAddr::V6(v6), Family::V6 | Family::Any) => {
            Ok(Addr::V6(SocketAddrV6::new(v6, port, 0, 0)))
        }
        _ => Err(AddrParseError::Family),
    }
}
