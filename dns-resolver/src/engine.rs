//! The per-question state machine: cache lookup, nameserver rotation,
//! UDP to TCP upgrade on truncation, response validation, cache
//! population. See `ResolvePipeline::resolve` in `resolve.rs` for the
//! higher-level routine this sits underneath.

use std::collections::HashMap;
use std::net::SocketAddr;

use dns_codec::{DomainName, Message, Question, QueryType};

use crate::cache::TtlCache;
use crate::cache_entry::{cache_key, decode, encode};
use crate::config::Config;
use crate::error::{NoRecordException, ProgrammerError, ResolutionException, ResolveError};
use crate::naming;
use crate::record::{Record, RTYPE_A, RTYPE_AAAA, RTYPE_PTR};
use crate::server::{Protocol, ServerRegistry};

/// Executes one `(name, type)` query against the configured
/// nameservers, consulting and populating the cache along the way.
pub struct QueryEngine<'a> {
    config: &'a Config,
    registry: &'a ServerRegistry,
    cache: &'a dyn TtlCache,
}

impl<'a> QueryEngine<'a> {
    pub fn new(config: &'a Config, registry: &'a ServerRegistry, cache: &'a dyn TtlCache) -> Self {
        Self {
            config,
            registry,
            cache,
        }
    }

    pub async fn query(&self, name: &str, rtype: u16) -> Result<Vec<Record>, ResolveError> {
        let normalized = normalize_for_type(name, rtype).ok_or_else(|| {
            ResolveError::from(ProgrammerError::InvalidName {
                name: name.to_string(),
            })
        })?;

        let key = cache_key(&normalized, rtype);
        if let Some(bytes) = self.cache.get(&key) {
            let payloads = decode(&bytes);
            return if payloads.is_empty() {
                Err(NoRecordException::new(format!("{normalized} (cached result)")).into())
            } else {
                Ok(payloads
                    .into_iter()
                    .map(|data| Record::new(data, rtype, None))
                    .collect())
            };
        }

        let domain = DomainName::from_dotted_string(&normalized).ok_or_else(|| {
            ResolveError::from(ProgrammerError::InvalidName {
                name: normalized.clone(),
            })
        })?;
        let question = Question::new(domain, QueryType::from(rtype));

        let addrs = nameserver_addrs(self.config)?;
        let mut attempt = 0u32;
        let mut truncated = false;

        while attempt < self.config.attempts {
            let ns_addr = addrs[(attempt as usize) % addrs.len()];
            let protocol = if truncated { Protocol::Tcp } else { Protocol::Udp };

            let mut server = match self
                .registry
                .get_server(protocol, ns_addr, self.config.timeout)
                .await
            {
                Ok(server) => server,
                Err(error) => {
                    tracing::debug!(%ns_addr, %error, "could not acquire server");
                    attempt += 1;
                    continue;
                }
            };

            if !server.is_alive() {
                self.registry.evict(protocol, ns_addr).await;
                server = match self
                    .registry
                    .get_server(protocol, ns_addr, self.config.timeout)
                    .await
                {
                    Ok(server) => server,
                    Err(error) => {
                        tracing::debug!(%ns_addr, %error, "could not re-acquire server");
                        attempt += 1;
                        continue;
                    }
                };
            }

            let message = match server.ask(&question).await {
                Ok(message) => message,
                Err(error) => {
                    tracing::debug!(%ns_addr, %error, "attempt failed");
                    attempt += 1;
                    continue;
                }
            };

            if !message.header.is_response || message.header.rcode.as_u16() != 0 {
                return Err(ResolutionException::new(format!(
                    "nameserver {ns_addr} returned rcode {}",
                    message.header.rcode.as_u16()
                ))
                .into());
            }

            if message.header.is_truncated {
                if truncated {
                    return Err(
                        ResolutionException::new("Server returned truncated response").into(),
                    );
                }
                tracing::debug!(%ns_addr, "response truncated, upgrading to tcp");
                truncated = true;
                continue;
            }

            return self.populate_and_return(&message, &normalized, rtype).await;
        }

        Err(ResolutionException::new(format!(
            "No response from any nameserver after {} attempts",
            self.config.attempts
        ))
        .into())
    }

    async fn populate_and_return(
        &self,
        message: &Message,
        name: &str,
        rtype: u16,
    ) -> Result<Vec<Record>, ResolveError> {
        let mut groups: HashMap<u16, Vec<&dns_codec::ResourceRecord>> = HashMap::new();
        for rr in &message.answers {
            groups.entry(u16::from(rr.rtype())).or_default().push(rr);
        }

        for (&group_rtype, rrs) in &groups {
            let min_ttl = rrs.iter().map(|rr| rr.ttl).min().unwrap_or(0);
            let payloads: Vec<String> = rrs.iter().map(|rr| rr.data_string()).collect();
            self.cache
                .set(&cache_key(name, group_rtype), encode(&payloads), min_ttl);
        }

        match groups.get(&rtype) {
            Some(rrs) => {
                let min_ttl = rrs.iter().map(|rr| rr.ttl).min().unwrap_or(0);
                Ok(rrs
                    .iter()
                    .map(|rr| Record::new(rr.data_string(), rtype, Some(min_ttl)))
                    .collect())
            }
            None => {
                self.cache.set(&cache_key(name, rtype), Vec::new(), 300);
                Err(NoRecordException::new(format!("No records returned for {name}")).into())
            }
        }
    }
}

/// `NormalizeForType`: rewrite IP-literal PTR queries to reverse-arpa
/// form, normalize A/AAAA names, and pass everything else through.
fn normalize_for_type(name: &str, rtype: u16) -> Option<String> {
    if rtype == RTYPE_PTR {
        return Some(naming::reverse_arpa(name).unwrap_or_else(|| name.to_string()));
    }
    if rtype == RTYPE_A || rtype == RTYPE_AAAA {
        return naming::normalize(name);
    }
    Some(name.to_string())
}

fn nameserver_addrs(config: &Config) -> Result<Vec<SocketAddr>, ResolveError> {
    config
        .nameservers
        .iter()
        .map(|s| {
            s.parse::<SocketAddr>().map_err(|_| {
                ResolveError::from(ResolutionException::new(format!(
                    "invalid nameserver address: {s}"
                )))
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;
    use std::time::Duration;

    use dns_codec::test_util::a_record;
    use dns_codec::{Header, Opcode, Rcode};

    use super::*;
    use crate::cache::InMemoryTtlCache;
    use crate::config::test_util::test_config;
    use crate::server::test_util::fake_udp_nameserver;

    fn response_to(request_id: u16, question: &Question, answers: Vec<dns_codec::ResourceRecord>) -> Message {
        Message {
            header: Header {
                id: request_id,
                is_response: true,
                opcode: Opcode::Standard,
                is_authoritative: false,
                is_truncated: false,
                recursion_desired: true,
                recursion_available: true,
                rcode: Rcode::NoError,
            },
            questions: vec![question.clone()],
            answers,
            authority: Vec::new(),
            additional: Vec::new(),
        }
    }

    #[tokio::test]
    async fn successful_query_populates_cache_and_returns_answers() {
        let address = fake_udp_nameserver(std::sync::Arc::new(|id, question| {
            response_to(
                id,
                question,
                vec![a_record("example.test.", Ipv4Addr::new(1, 2, 3, 4))],
            )
        }))
        .await;

        let config = test_config(vec![address.to_string()]);
        let registry = ServerRegistry::new();
        let cache = InMemoryTtlCache::new();
        let engine = QueryEngine::new(&config, &registry, &cache);

        let records = engine.query("example.test", RTYPE_A).await.unwrap();
        assert_eq!(1, records.len());
        assert_eq!("1.2.3.4", records[0].data);
        assert_eq!(Some(300), records[0].ttl);

        let cached = cache.get(&cache_key("example.test", RTYPE_A)).unwrap();
        assert_eq!(vec!["1.2.3.4".to_string()], decode(&cached));
    }

    #[tokio::test]
    async fn cache_hit_avoids_network() {
        let cache = InMemoryTtlCache::new();
        cache.set(
            &cache_key("cached.test", RTYPE_A),
            encode(&["9.9.9.9".to_string()]),
            60,
        );
        // deliberately bogus nameserver: if the cache didn't short-circuit,
        // this would time out and fail the query.
        let config = test_config(vec!["127.0.0.1:1".to_string()]);
        let registry = ServerRegistry::new();
        let engine = QueryEngine::new(&config, &registry, &cache);

        let records = engine.query("cached.test", RTYPE_A).await.unwrap();
        assert_eq!("9.9.9.9", records[0].data);
        assert_eq!(None, records[0].ttl);
    }

    #[tokio::test]
    async fn empty_answer_negative_caches_and_fails() {
        let address = fake_udp_nameserver(std::sync::Arc::new(|id, question| {
            response_to(id, question, Vec::new())
        }))
        .await;

        let config = test_config(vec![address.to_string()]);
        let registry = ServerRegistry::new();
        let cache = InMemoryTtlCache::new();
        let engine = QueryEngine::new(&config, &registry, &cache);

        let err = engine.query("nothing.test", RTYPE_A).await.unwrap_err();
        assert!(matches!(err, ResolveError::NoRecord(_)));

        let cached = cache.get(&cache_key("nothing.test", RTYPE_A)).unwrap();
        assert!(decode(&cached).is_empty());
    }

    #[tokio::test]
    async fn all_attempts_exhausted_is_resolution_exception() {
        let config = Config {
            nameservers: vec!["127.0.0.1:1".to_string()],
            attempts: 2,
            timeout: Duration::from_millis(50),
            ..test_config(vec!["127.0.0.1:1".to_string()])
        };
        let registry = ServerRegistry::new();
        let cache = InMemoryTtlCache::new();
        let engine = QueryEngine::new(&config, &registry, &cache);

        let err = engine.query("example.test", RTYPE_A).await.unwrap_err();
        assert!(matches!(err, ResolveError::Resolution(_)));
    }

    #[tokio::test]
    async fn truncated_udp_response_upgrades_to_tcp_without_consuming_attempt() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};
        use tokio::net::{TcpListener, UdpSocket};

        let udp_socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let address = udp_socket.local_addr().unwrap();
        let tcp_listener = TcpListener::bind(address).await.unwrap();

        tokio::spawn(async move {
            let mut buf = vec![0u8; 4096];
            loop {
                let (len, peer) = match udp_socket.recv_from(&mut buf).await {
                    Ok(v) => v,
                    Err(_) => return,
                };
                let Ok(request) = Message::from_octets(&buf[..len]) else {
                    continue;
                };
                let Some(question) = request.sole_question() else {
                    continue;
                };
                let mut response = response_to(request.header.id, question, Vec::new());
                response.header.is_truncated = true;
                if let Ok(bytes) = response.into_octets() {
                    let _ = udp_socket.send_to(&bytes, peer).await;
                }
            }
        });

        tokio::spawn(async move {
            loop {
                let (mut stream, _) = match tcp_listener.accept().await {
                    Ok(v) => v,
                    Err(_) => return,
                };
                tokio::spawn(async move {
                    loop {
                        let len = match stream.read_u16().await {
                            Ok(len) => len,
                            Err(_) => return,
                        };
                        let mut buf = vec![0u8; len.into()];
                        if stream.read_exact(&mut buf).await.is_err() {
                            return;
                        }
                        let Ok(request) = Message::from_octets(&buf) else {
                            continue;
                        };
                        let Some(question) = request.sole_question() else {
                            continue;
                        };
                        let response = response_to(
                            request.header.id,
                            question,
                            vec![a_record("truncated.test.", Ipv4Addr::new(9, 9, 9, 9))],
                        );
                        if let Ok(bytes) = response.into_octets() {
                            let out_len = bytes.len() as u16;
                            if stream.write_all(&out_len.to_be_bytes()).await.is_err() {
                                return;
                            }
                            if stream.write_all(&bytes).await.is_err() {
                                return;
                            }
                        }
                    }
                });
            }
        });

        // only one attempt budgeted: if the truncated UDP try consumed
        // it, the subsequent TCP try would never happen and this would
        // fail with "no response from any nameserver".
        let config = Config {
            nameservers: vec![address.to_string()],
            attempts: 1,
            ..test_config(vec![address.to_string()])
        };
        let registry = ServerRegistry::new();
        let cache = InMemoryTtlCache::new();
        let engine = QueryEngine::new(&config, &registry, &cache);

        let records = engine.query("truncated.test", RTYPE_A).await.unwrap();
        assert_eq!("9.9.9.9", records[0].data);
    }

    #[tokio::test]
    async fn nonzero_rcode_is_fatal_and_not_retried_after_a_timeout_rotation() {
        let ns2 = fake_udp_nameserver(std::sync::Arc::new(|id, question| {
            let mut message = response_to(id, question, Vec::new());
            message.header.rcode = Rcode::NameError;
            message
        }))
        .await;

        let config = Config {
            nameservers: vec!["127.0.0.1:1".to_string(), ns2.to_string()],
            attempts: 4,
            timeout: Duration::from_millis(200),
            ..test_config(vec![ns2.to_string()])
        };
        let registry = ServerRegistry::new();
        let cache = InMemoryTtlCache::new();
        let engine = QueryEngine::new(&config, &registry, &cache);

        let err = engine.query("fatal.test", RTYPE_A).await.unwrap_err();
        match err {
            ResolveError::Resolution(e) => {
                assert!(e.message.contains("rcode 3"), "got: {}", e.message)
            }
            other => panic!("expected a ResolutionException, got {other:?}"),
        }
    }

    #[test]
    fn normalize_for_type_rewrites_ptr_literal() {
        assert_eq!(
            Some("1.2.0.192.in-addr.arpa".to_string()),
            normalize_for_type("192.0.2.1", RTYPE_PTR)
        );
    }

    #[test]
    fn normalize_for_type_passes_through_other_types() {
        assert_eq!(
            Some("Example.com".to_string()),
            normalize_for_type("Example.com", 16)
        );
    }
}
