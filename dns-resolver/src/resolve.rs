//! The higher-level routine: classify the input (literal IP,
//! hosts-file entry, or name to query), combine parallel A/AAAA
//! queries when no type restriction is given, and aggregate failure.

use std::net::IpAddr;

use crate::cache::TtlCache;
use crate::config::Config;
use crate::engine::QueryEngine;
use crate::error::{AggregateResolutionException, ResolveError};
use crate::naming;
use crate::record::{Record, RecordType, RTYPE_A, RTYPE_AAAA};
use crate::server::ServerRegistry;

pub struct ResolvePipeline<'a> {
    config: &'a Config,
    registry: &'a ServerRegistry,
    cache: &'a dyn TtlCache,
}

impl<'a> ResolvePipeline<'a> {
    pub fn new(config: &'a Config, registry: &'a ServerRegistry, cache: &'a dyn TtlCache) -> Self {
        Self {
            config,
            registry,
            cache,
        }
    }

    pub async fn resolve(
        &self,
        name: &str,
        type_restriction: Option<RecordType>,
    ) -> Result<Vec<Record>, ResolveError> {
        // literal IP short-circuit: no cache, no query.
        if let Ok(addr) = name.parse::<IpAddr>() {
            return Ok(match addr {
                IpAddr::V4(_) => vec![Record::new(name, RTYPE_A, None)],
                IpAddr::V6(_) => vec![Record::new(name, RTYPE_AAAA, None)],
            });
        }

        let normalized = naming::normalize(name).ok_or_else(|| {
            ResolveError::from(crate::error::ProgrammerError::InvalidName {
                name: name.to_string(),
            })
        })?;

        if let Some(hosts) = self.hosts_lookup(&normalized, type_restriction) {
            return Ok(hosts);
        }

        match type_restriction {
            Some(RecordType::A) => self.engine().query(&normalized, RTYPE_A).await,
            Some(RecordType::Aaaa) => self.engine().query(&normalized, RTYPE_AAAA).await,
            None => self.resolve_both(&normalized).await,
        }
    }

    fn hosts_lookup(&self, name: &str, type_restriction: Option<RecordType>) -> Option<Vec<Record>> {
        let mut records = Vec::new();

        let want_a = !matches!(type_restriction, Some(RecordType::Aaaa));
        let want_aaaa = !matches!(type_restriction, Some(RecordType::A));

        if want_a {
            if let Some(address) = self.config.known_hosts.a.get(name) {
                records.push(Record::new(address.clone(), RTYPE_A, None));
            }
        }
        if want_aaaa {
            if let Some(address) = self.config.known_hosts.aaaa.get(name) {
                records.push(Record::new(address.clone(), RTYPE_AAAA, None));
            }
        }

        if records.is_empty() {
            None
        } else {
            Some(records)
        }
    }

    async fn resolve_both(&self, name: &str) -> Result<Vec<Record>, ResolveError> {
        let (a_result, aaaa_result) = tokio::join!(
            self.engine().query(name, RTYPE_A),
            self.engine().query(name, RTYPE_AAAA),
        );

        match (a_result, aaaa_result) {
            (Ok(mut a), Ok(mut aaaa)) => {
                a.append(&mut aaaa);
                Ok(a)
            }
            (Ok(a), Err(error)) => {
                tracing::debug!(%error, "aaaa query failed, returning a-only result");
                Ok(a)
            }
            (Err(error), Ok(aaaa)) => {
                tracing::debug!(%error, "a query failed, returning aaaa-only result");
                Ok(aaaa)
            }
            (Err(a_err), Err(aaaa_err)) => Err(AggregateResolutionException::new(
                "All query attempts failed",
                vec![a_err, aaaa_err],
            )
            .into()),
        }
    }

    fn engine(&self) -> QueryEngine<'_> {
        QueryEngine::new(self.config, self.registry, self.cache)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::net::Ipv4Addr;
    use std::sync::Arc;

    use dns_codec::test_util::a_record;
    use dns_codec::{Header, Message, Opcode, Rcode};

    use super::*;
    use crate::cache::InMemoryTtlCache;
    use crate::config::test_util::test_config;
    use crate::config::KnownHosts;
    use crate::server::test_util::fake_udp_nameserver;

    #[tokio::test]
    async fn literal_ipv4_short_circuits() {
        let config = test_config(vec!["127.0.0.1:1".to_string()]);
        let registry = ServerRegistry::new();
        let cache = InMemoryTtlCache::new();
        let pipeline = ResolvePipeline::new(&config, &registry, &cache);

        let records = pipeline.resolve("127.0.0.1", None).await.unwrap();
        assert_eq!(vec![Record::new("127.0.0.1", RTYPE_A, None)], records);
    }

    #[tokio::test]
    async fn literal_ipv6_short_circuits() {
        let config = test_config(vec!["127.0.0.1:1".to_string()]);
        let registry = ServerRegistry::new();
        let cache = InMemoryTtlCache::new();
        let pipeline = ResolvePipeline::new(&config, &registry, &cache);

        let records = pipeline.resolve("::1", None).await.unwrap();
        assert_eq!(vec![Record::new("::1", RTYPE_AAAA, None)], records);
    }

    #[tokio::test]
    async fn hosts_entry_takes_precedence_over_cache() {
        let mut a = HashMap::new();
        a.insert("localhost".to_string(), "127.0.0.1".to_string());
        let mut aaaa = HashMap::new();
        aaaa.insert("localhost".to_string(), "::1".to_string());

        let mut config = test_config(vec!["127.0.0.1:1".to_string()]);
        config.known_hosts = KnownHosts { a, aaaa };
        let registry = ServerRegistry::new();
        let cache = InMemoryTtlCache::new();
        // poison the cache for this name; hosts must win anyway.
        cache.set(&crate::cache_entry::cache_key("localhost", RTYPE_A), Vec::new(), 60);
        let pipeline = ResolvePipeline::new(&config, &registry, &cache);

        let records = pipeline.resolve("localhost", None).await.unwrap();
        assert_eq!(2, records.len());
        assert_eq!("127.0.0.1", records[0].data);
        assert_eq!("::1", records[1].data);
    }

    #[tokio::test]
    async fn parallel_resolve_concatenates_a_then_aaaa() {
        let address = fake_udp_nameserver(Arc::new(|id, question| {
            let rtype = question.qtype;
            let answers = match rtype {
                dns_codec::QueryType::Record(dns_codec::RecordType::A) => {
                    vec![a_record("dual.test.", Ipv4Addr::new(1, 1, 1, 1))]
                }
                _ => vec![dns_codec::test_util::aaaa_record(
                    "dual.test.",
                    "::2".parse().unwrap(),
                )],
            };
            Message {
                header: Header {
                    id,
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
        }))
        .await;

        let config = test_config(vec![address.to_string()]);
        let registry = ServerRegistry::new();
        let cache = InMemoryTtlCache::new();
        let pipeline = ResolvePipeline::new(&config, &registry, &cache);

        let records = pipeline.resolve("dual.test", None).await.unwrap();
        assert_eq!(2, records.len());
        assert_eq!(RTYPE_A, records[0].rtype);
        assert_eq!(RTYPE_AAAA, records[1].rtype);
    }

    #[tokio::test]
    async fn both_branches_failing_is_an_aggregate_error() {
        let config = test_config(vec!["127.0.0.1:1".to_string()]);
        let registry = ServerRegistry::new();
        let cache = InMemoryTtlCache::new();
        let pipeline = ResolvePipeline::new(&config, &registry, &cache);

        let err = pipeline.resolve("nothing-listens.test", None).await.unwrap_err();
        assert!(matches!(err, ResolveError::Aggregate(_)));
    }
}
