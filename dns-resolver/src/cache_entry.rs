//! Encoding of the cache's value type: an ordered list of answer
//! payload strings for one `(name, type)`, newline-joined. Payload
//! strings never contain `\n` since none of the supported record
//! types' presentation text can.

pub fn cache_key(name: &str, rtype: u16) -> String {
    format!("amphp.dns.{name}#{rtype}")
}

pub fn encode(payloads: &[String]) -> Vec<u8> {
    payloads.join("\n").into_bytes()
}

pub fn decode(bytes: &[u8]) -> Vec<String> {
    if bytes.is_empty() {
        Vec::new()
    } else {
        String::from_utf8_lossy(bytes)
            .split('\n')
            .map(str::to_string)
            .collect()
    }
}
