//! # Message Router
//!
//! Maps a message's route name to the one handler that owns it. Routes are
//! registered once while the application is assembled, then the table is
//! sealed. Registration mistakes are configuration errors and stop the
//! node; dispatching to a route nobody registered is an ordinary
//! transaction rejection.

use std::collections::BTreeMap;

use tracing::debug;

use crate::codec::Interface;
use crate::context::Context;
use crate::error::{ConfigError, TxError, TxResult};
use crate::tx::Msg;

/// Executes the messages of one module.
pub trait Handler {
    fn handle(&self, ctx: &mut Context<'_>, msg: &Msg) -> TxResult<()>;
}

/// Rejection for a message that reached a handler it does not belong to.
pub(crate) fn unrecognized(route: &str, msg: &Msg) -> TxError {
    TxError::UnknownRequest {
        route: route.to_string(),
        tag: msg.type_tag().to_string(),
    }
}

/// Route table.
#[derive(Default)]
pub struct Router {
    routes: BTreeMap<String, Box<dyn Handler>>,
    sealed: bool,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` under `name`. Chainable.
    pub fn add_route<H>(&mut self, name: &str, handler: H) -> Result<&mut Self, ConfigError>
    where
        H: Handler + 'static,
    {
        if self.sealed {
            return Err(ConfigError::Sealed("router"));
        }
        if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(ConfigError::InvalidRouteName(name.to_string()));
        }
        if self.routes.contains_key(name) {
            return Err(ConfigError::DuplicateRoute(name.to_string()));
        }
        self.routes.insert(name.to_string(), Box::new(handler));
        debug!(route = name, "route registered");
        Ok(self)
    }

    pub fn seal(&mut self) {
        self.sealed = true;
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    pub fn has_route(&self, name: &str) -> bool {
        self.routes.contains_key(name)
    }

    /// Registered route names, sorted.
    pub fn routes(&self) -> impl Iterator<Item = &str> {
        self.routes.keys().map(String::as_str)
    }

    /// Runs `msg` through the handler registered under `route`.
    pub fn dispatch(&self, route: &str, ctx: &mut Context<'_>, msg: &Msg) -> TxResult<()> {
        let handler = self
            .routes
            .get(route)
            .ok_or_else(|| TxError::UnknownRoute(route.to_string()))?;
        handler.handle(ctx, msg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::cool::MsgSetTrend;
    use crate::store::{KvStore, MultiStore, StoreKey, StoreRegistry};
    use crate::types::{Address, Header};
    use crate::context::ExecMode;
    use chrono::Utc;

    /// Writes the route's name into the store so tests can see which
    /// handler ran.
    struct Marker {
        key: StoreKey,
        name: &'static str,
    }

    impl Handler for Marker {
        fn handle(&self, ctx: &mut Context<'_>, _msg: &Msg) -> TxResult<()> {
            ctx.kv_store(&self.key)?.set(b"ran", self.name.as_bytes().to_vec());
            Ok(())
        }
    }

    fn setup() -> (MultiStore, StoreKey) {
        let mut registry = StoreRegistry::new();
        let key = registry.declare("main").unwrap();
        let mut ms = MultiStore::open_temporary().unwrap();
        ms.mount(registry.keys()).unwrap();
        ms.load_latest_version(&key).unwrap();
        (ms, key)
    }

    fn msg() -> Msg {
        Msg::SetTrend(MsgSetTrend {
            sender: Address::from_pub_key(b"s"),
            cool: "icecold".into(),
        })
    }

    #[test]
    fn dispatch_reaches_exactly_the_named_handler() {
        let (ms, key) = setup();
        let mut router = Router::new();
        router
            .add_route("alpha", Marker { key: key.clone(), name: "alpha" })
            .unwrap()
            .add_route("beta", Marker { key: key.clone(), name: "beta" })
            .unwrap();
        router.seal();

        for _ in 0..3 {
            let mut ctx = Context::new(&ms, Header::new("c", 1, Utc::now()), ExecMode::Deliver);
            router.dispatch("beta", &mut ctx, &msg()).unwrap();
            let ran = ctx.kv_store(&key).unwrap().get(b"ran").unwrap();
            assert_eq!(ran, Some(b"beta".to_vec()));
        }
    }

    #[test]
    fn unknown_route_is_rejected_without_writes() {
        let (ms, key) = setup();
        let mut router = Router::new();
        router.add_route("alpha", Marker { key, name: "alpha" }).unwrap();

        let mut ctx = Context::new(&ms, Header::new("c", 1, Utc::now()), ExecMode::Deliver);
        let err = router.dispatch("gamma", &mut ctx, &msg()).unwrap_err();
        assert!(matches!(err, TxError::UnknownRoute(ref r) if r == "gamma"));
        assert!(!ctx.is_dirty());
    }

    #[test]
    fn registration_rules() {
        let (_ms, key) = setup();
        let mut router = Router::new();
        router.add_route("alpha", Marker { key: key.clone(), name: "a" }).unwrap();
        assert!(matches!(
            router.add_route("alpha", Marker { key: key.clone(), name: "b" }),
            Err(ConfigError::DuplicateRoute(_))
        ));
        assert!(matches!(
            router.add_route("bad-name", Marker { key: key.clone(), name: "c" }),
            Err(ConfigError::InvalidRouteName(_))
        ));
        router.seal();
        assert!(matches!(
            router.add_route("late", Marker { key, name: "d" }),
            Err(ConfigError::Sealed("router"))
        ));
        assert_eq!(router.routes().collect::<Vec<_>>(), vec!["alpha"]);
    }
}
