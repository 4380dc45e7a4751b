//! Name normalization and reverse-arpa construction (§4.1-3 and the
//! `NormalizeForType` state of §4.2).

use std::net::IpAddr;

const MAX_NAME_OCTETS: usize = 253;
const MAX_LABEL_OCTETS: usize = 63;

/// Lowercase ASCII, strip a single trailing dot, and reject names that
/// would encode to more than 253 octets or contain a label longer
/// than 63 octets.
pub fn normalize(name: &str) -> Option<String> {
    let trimmed = name.strip_suffix('.').unwrap_or(name);
    if trimmed.is_empty() || trimmed.len() > MAX_NAME_OCTETS {
        return None;
    }

    for label in trimmed.split('.') {
        if label.is_empty() || label.len() > MAX_LABEL_OCTETS {
            return None;
        }
    }

    Some(trimmed.to_ascii_lowercase())
}

/// Rewrite an IP literal to its reverse-arpa form:
/// `d.c.b.a.in-addr.arpa` for IPv4, nibble-reversed `.ip6.arpa` for
/// IPv6. Returns `None` if `name` does not parse as an IP literal.
pub fn reverse_arpa(name: &str) -> Option<String> {
    match name.parse::<IpAddr>().ok()? {
        IpAddr::V4(addr) => {
            let [a, b, c, d] = addr.octets();
            Some(format!("{d}.{c}.{b}.{a}.in-addr.arpa"))
        }
        IpAddr::V6(addr) => {
            let mut nibbles = Vec::with_capacity(32);
            for octet in addr.octets() {
                nibbles.push(octet >> 4);
                nibbles.push(octet & 0x0f);
            }
            nibbles.reverse();
            let body: String = nibbles
                .iter()
                .map(|n| std::char::from_digit((*n).into(), 16).unwrap())
                .collect::<Vec<_>>()
                .join(".");
            Some(format!("{body}.ip6.arpa"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_lowercases_and_strips_trailing_dot() {
        assert_eq!(Some("www.example.com".to_string()), normalize("WWW.Example.COM."));
    }

    #[test]
    fn normalize_rejects_overlong_label() {
        let label = "a".repeat(64);
        assert_eq!(None, normalize(&format!("{label}.com")));
    }

    #[test]
    fn normalize_rejects_overlong_name() {
        let label = "a".repeat(50);
        let name = (0..6).map(|_| label.as_str()).collect::<Vec<_>>().join(".");
        assert_eq!(None, normalize(&name));
    }

    #[test]
    fn reverse_arpa_v4() {
        assert_eq!(
            Some("1.2.0.192.in-addr.arpa".to_string()),
            reverse_arpa("192.0.2.1")
        );
    }

    #[test]
    fn reverse_arpa_v6() {
        let result = reverse_arpa("::1").unwrap();
        assert!(result.ends_with(".ip6.arpa"));
        assert!(result.starts_with("1.0.0.0"));
    }

    #[test]
    fn reverse_arpa_rejects_non_ip() {
        assert_eq!(None, reverse_arpa("example.com"));
    }
}
