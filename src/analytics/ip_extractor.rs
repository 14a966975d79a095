//! Client IP extraction from HTTP headers with trust validation
//!
//! - `Forwarded` and `X-Forwarded-For` chains are walked right to left,
//!   skipping addresses inside the trusted proxy CIDRs or a fixed hop count
//! - `CF-Connecting-IP` is honoured in Cloudflare mode, from trusted peers
//!   only when trusted proxy CIDRs are configured
//! - The socket peer address is the fallback when headers are untrusted
//! - IPv4 and IPv6 are both supported

use axum::http::HeaderMap;
use ipnet::IpNet;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use tracing::warn;

use crate::config::{AnalyticsConfig, TrustedProxyMode};

/// Address to store for a click: extracted per the trust configuration and
/// anonymized when `ip_anonymization` is set.
pub fn client_address(
    headers: &HeaderMap,
    peer: Option<IpAddr>,
    config: &AnalyticsConfig,
) -> Option<IpAddr> {
    let ip = extract_client_ip(headers, peer, config)?;
    if config.ip_anonymization {
        Some(anonymize_ip(ip))
    } else {
        Some(ip)
    }
}

/// Extract the client IP address.
///
/// `peer` is the socket remote address, when the server recorded one.
pub fn extract_client_ip(
    headers: &HeaderMap,
    peer: Option<IpAddr>,
    config: &AnalyticsConfig,
) -> Option<IpAddr> {
    match config.trusted_proxy_mode {
        TrustedProxyMode::Cloudflare => {
            if !peer_may_forward(peer, config) {
                return peer;
            }
            extract_cloudflare_ip(headers).or_else(|| {
                warn!("CF-Connecting-IP header missing in Cloudflare mode, using socket address");
                peer
            })
        }
        TrustedProxyMode::Standard => extract_standard_ip(headers, peer, config).or(peer),
        TrustedProxyMode::None => peer,
    }
}

/// A peer outside the trusted ranges may have forged every header.
/// Without configured ranges, or without a known peer, headers are taken as is.
fn peer_may_forward(peer: Option<IpAddr>, config: &AnalyticsConfig) -> bool {
    match peer {
        Some(peer) => config.trusted_proxies.is_empty() || is_trusted(peer, &config.trusted_proxies),
        None => true,
    }
}

fn extract_cloudflare_ip(headers: &HeaderMap) -> Option<IpAddr> {
    headers
        .get("cf-connecting-ip")
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.trim().parse::<IpAddr>().ok())
}

/// Prefer RFC 7239 `Forwarded`, fall back to `X-Forwarded-For`
fn extract_standard_ip(
    headers: &HeaderMap,
    peer: Option<IpAddr>,
    config: &AnalyticsConfig,
) -> Option<IpAddr> {
    if !peer_may_forward(peer, config) {
        return None;
    }

    let chain = forwarded_chain(headers);
    let chain = if chain.is_empty() {
        x_forwarded_for_chain(headers)
    } else {
        chain
    };

    select_from_chain(&chain, config)
}

fn select_from_chain(chain: &[IpAddr], config: &AnalyticsConfig) -> Option<IpAddr> {
    if chain.is_empty() {
        return None;
    }

    // Skip that many proxies from the right
    if let Some(num_trusted) = config.num_trusted_proxies {
        if chain.len() > num_trusted {
            return Some(chain[chain.len() - num_trusted - 1]);
        }
        // Not enough hops in the chain, return the leftmost (least trusted)
        return chain.first().copied();
    }

    if !config.trusted_proxies.is_empty() {
        return chain
            .iter()
            .rev()
            .find(|ip| !is_trusted(**ip, &config.trusted_proxies))
            .or_else(|| chain.first())
            .copied();
    }

    // No trust configuration, return the rightmost IP
    chain.last().copied()
}

fn is_trusted(ip: IpAddr, trusted: &[IpNet]) -> bool {
    let ip = canonical(ip);
    trusted.iter().any(|net| net.contains(&ip))
}

/// IPv4-mapped IPv6 addresses compare as IPv4
fn canonical(ip: IpAddr) -> IpAddr {
    match ip {
        IpAddr::V6(v6) => v6
            .to_ipv4_mapped()
            .map(IpAddr::V4)
            .unwrap_or(IpAddr::V6(v6)),
        v4 => v4,
    }
}

/// `for=` nodes of every `Forwarded` header, in order
fn forwarded_chain(headers: &HeaderMap) -> Vec<IpAddr> {
    headers
        .get_all("forwarded")
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .flat_map(|element| element.split(';'))
        .filter_map(|pair| {
            let (key, value) = pair.split_once('=')?;
            if key.trim().eq_ignore_ascii_case("for") {
                parse_node(value)
            } else {
                None
            }
        })
        .collect()
}

fn x_forwarded_for_chain(headers: &HeaderMap) -> Vec<IpAddr> {
    headers
        .get_all("x-forwarded-for")
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .filter_map(parse_node)
        .collect()
}

/// Accepts `1.2.3.4`, `1.2.3.4:80`, `2001:db8::1` and `"[2001:db8::1]:80"`.
/// Obfuscated identifiers and `unknown` yield `None`.
fn parse_node(raw: &str) -> Option<IpAddr> {
    let value = raw.trim().trim_matches('"');

    if let Some(rest) = value.strip_prefix('[') {
        return rest.split(']').next()?.parse::<Ipv6Addr>().ok().map(IpAddr::V6);
    }

    if let Ok(ip) = value.parse::<IpAddr>() {
        return Some(ip);
    }

    let (host, _port) = value.rsplit_once(':')?;
    host.parse::<Ipv4Addr>().ok().map(IpAddr::V4)
}

/// Anonymize an IP address by truncating to network prefix
///
/// - IPv4: Truncate to /24 (zero last octet)
/// - IPv6: Truncate to /48 (zero last 80 bits)
pub fn anonymize_ip(ip: IpAddr) -> IpAddr {
    match ip {
        IpAddr::V4(addr) => {
            let octets = addr.octets();
            IpAddr::V4(Ipv4Addr::new(octets[0], octets[1], octets[2], 0))
        }
        IpAddr::V6(addr) => {
            let segments = addr.segments();
            IpAddr::V6(Ipv6Addr::new(
                segments[0],
                segments[1],
                segments[2],
                0,
                0,
                0,
                0,
                0,
            ))
        }
    }
}
