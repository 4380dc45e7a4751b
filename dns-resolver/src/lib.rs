//! An asynchronous DNS stub resolver: translates names into resource
//! records by consulting a set of recursive nameservers over UDP with
//! TCP fallback, honoring a local hosts table and a TTL-bounded
//! response cache.
//!
//! This is a stub, not a recursive or authoritative server: it does
//! not walk the DNS hierarchy, validate DNSSEC, or serve zone data of
//! its own. See [`Resolver::resolve`] and [`Resolver::query`] for the
//! two operations it exposes.

pub mod cache;
mod cache_entry;
pub mod config;
mod engine;
pub mod error;
mod naming;
mod record;
mod resolve;
mod server;

use std::sync::Arc;

use tokio::sync::OnceCell;

pub use cache::{InMemoryTtlCache, TtlCache};
pub use config::{Config, ConfigLoader, FileConfigLoader, KnownHosts, StaticConfigLoader};
pub use error::{
    AggregateResolutionException, ConfigLoadError, NoRecordException, ProgrammerError,
    ResolutionException, ResolveError, TransportError,
};
pub use record::{Record, RecordType};
pub use server::ServerRegistry;

use engine::QueryEngine;
use resolve::ResolvePipeline;

/// The caller-facing entry point: a cache, a server registry, and a
/// lazily-loaded `Config`, all shared behind `Arc`s so a `Resolver` can
/// be cloned cheaply and used concurrently.
pub struct Resolver {
    config_loader: Arc<dyn ConfigLoader>,
    config: OnceCell<Arc<Config>>,
    registry: ServerRegistry,
    cache: Arc<dyn TtlCache>,
}

impl Resolver {
    pub fn new(config_loader: Arc<dyn ConfigLoader>) -> Self {
        Self {
            config_loader,
            config: OnceCell::new(),
            registry: ServerRegistry::new(),
            cache: Arc::new(InMemoryTtlCache::new()),
        }
    }

    /// Convenience constructor for tests and embedders who already
    /// have a `Config` value in hand.
    pub fn with_config(config: Config) -> Self {
        Self::new(Arc::new(StaticConfigLoader::new(config)))
    }

    async fn config(&self) -> Result<&Arc<Config>, ResolveError> {
        self.config
            .get_or_try_init(|| async {
                self.config_loader
                    .load()
                    .await
                    .map(Arc::new)
                    .map_err(|error| {
                        ResolutionException::new(format!("could not load configuration: {error}"))
                    })
            })
            .await
            .map_err(ResolveError::from)
    }

    /// Classify `name` (literal IP, hosts entry, or a name to query)
    /// and resolve it, optionally restricted to one address family.
    ///
    /// # Errors
    ///
    /// See [`ResolveError`].
    pub async fn resolve(
        &self,
        name: &str,
        type_restriction: Option<RecordType>,
    ) -> Result<Vec<Record>, ResolveError> {
        let config = self.config().await?;
        ResolvePipeline::new(config, &self.registry, self.cache.as_ref())
            .resolve(name, type_restriction)
            .await
    }

    /// Query a single `(name, type)` pair directly, bypassing the
    /// literal-IP and hosts-file classification `resolve` performs.
    ///
    /// # Errors
    ///
    /// See [`ResolveError`].
    pub async fn query(&self, name: &str, rtype: u16) -> Result<Vec<Record>, ResolveError> {
        let config = self.config().await?;
        QueryEngine::new(config, &self.registry, self.cache.as_ref())
            .query(name, rtype)
            .await
    }
}

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;
    use std::sync::Arc;

    use dns_codec::test_util::a_record;
    use dns_codec::{Header, Message, Opcode, Rcode};

    use super::*;
    use crate::config::test_util::test_config;
    use crate::server::test_util::fake_udp_nameserver;

    #[tokio::test]
    async fn resolver_loads_config_lazily_and_once() {
        let resolver = Resolver::with_config(test_config(vec!["127.0.0.1:1".to_string()]));

        let first = resolver.resolve("127.0.0.1", None).await.unwrap();
        let second = resolver.resolve("127.0.0.1", None).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn resolver_query_hits_the_engine_directly() {
        let address = fake_udp_nameserver(Arc::new(|id, question| Message {
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
            answers: vec![a_record("direct.test.", Ipv4Addr::new(7, 7, 7, 7))],
            authority: Vec::new(),
            additional: Vec::new(),
        }))
        .await;

        let resolver = Resolver::with_config(test_config(vec![address.to_string()]));
        let records = resolver.query("direct.test", 1).await.unwrap();
        assert_eq!("7.7.7.7", records[0].data);
    }
}
