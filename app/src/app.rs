//! # Application
//!
//! Composes stores, codec, keepers, router, ante handler, and genesis
//! controller into one state machine, then seals everything before the
//! first transaction.
//!
//! ```text
//!                  +-------------------- XpxApp --------------------+
//!  init_chain ---> | GenesisController --> Keepers --> MultiStore   |
//!  deliver_tx ---> | decode --> ante --> Router --> Handler         |
//!  commit     ---> | MultiStore::commit (version + app hash)        |
//!  export     ---> | GenesisController::export --> JSON             |
//!                  +------------------------------------------------+
//! ```
//!
//! Every transaction runs against a private overlay. The overlay is
//! written to the stores only when the ante handler and every message
//! succeed, so a rejected transaction leaves no trace, fee included.
//! Persistence failures are never treated as rejections; they surface as
//! [`AppError::Store`] and stop the node.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::codec::{Codec, Interface};
use crate::config::{
    ACCOUNT_STORE, APP_NAME, FEE_STORE, IBC_STORE, MAIN_STORE, MSG_INTERFACE, PARAMS_STORE,
    POW_DENOM, POW_REWARD, POW_STORE, ROUTE_BANK, ROUTE_COOL, ROUTE_IBC, ROUTE_POW, ROUTE_STAKING,
    STAKING_STORE, TRANSIENT_PARAMS_STORE, AUTH_PARAMSPACE,
};
use crate::context::{Context, ExecMode};
use crate::error::{AppError, AppResult, ConfigError, GenesisError, TxError, TxResult};
use crate::genesis::{GenesisController, GenesisPhase};
use crate::modules::auth::{self, AccountKeeper, AnteHandler, FeeCollectionKeeper, StdAnteHandler};
use crate::modules::bank::{self, BankHandler, BankKeeper};
use crate::modules::cool::{self, CoolHandler, CoolKeeper};
use crate::modules::ibc::{self, IbcHandler, IbcMapper};
use crate::modules::params::ParamsKeeper;
use crate::modules::pow::{self, PowConfig, PowHandler, PowKeeper};
use crate::modules::staking::{self, StakingHandler, StakingKeeper};
use crate::router::Router;
use crate::store::kv::StoreCache;
use crate::store::{MultiStore, StoreKey, StoreRegistry};
use crate::tx::{self, decode_tx, StdTx};
use crate::types::{
    CommitInfo, GenesisValidator, Header, RequestInitChain, ResponseDeliverTx, ResponseInitChain,
};

// ---------------------------------------------------------------------------
// Assembly
// ---------------------------------------------------------------------------

/// Builds the sealed codec: account shapes, every message, the standard
/// transaction.
pub fn make_codec() -> Result<Codec, ConfigError> {
    let mut codec = Codec::new();
    auth::register_codec(&mut codec)?;
    codec.register_interface(MSG_INTERFACE)?;
    bank::register_codec(&mut codec)?;
    ibc::register_codec(&mut codec)?;
    staking::register_codec(&mut codec)?;
    pow::register_codec(&mut codec)?;
    cool::register_codec(&mut codec)?;
    tx::register_codec(&mut codec)?;
    codec.seal();
    Ok(codec)
}

/// Store keys, one per module, declared in mount order.
#[derive(Clone, Debug)]
pub struct AppKeys {
    pub main: StoreKey,
    pub account: StoreKey,
    pub pow: StoreKey,
    pub ibc: StoreKey,
    pub staking: StoreKey,
    pub fee: StoreKey,
    pub params: StoreKey,
    pub transient_params: StoreKey,
}

impl AppKeys {
    pub fn declare(registry: &mut StoreRegistry) -> Result<Self, ConfigError> {
        Ok(Self {
            main: registry.declare(MAIN_STORE)?,
            account: registry.declare(ACCOUNT_STORE)?,
            pow: registry.declare(POW_STORE)?,
            ibc: registry.declare(IBC_STORE)?,
            staking: registry.declare(STAKING_STORE)?,
            fee: registry.declare(FEE_STORE)?,
            params: registry.declare(PARAMS_STORE)?,
            transient_params: registry.declare_transient(TRANSIENT_PARAMS_STORE)?,
        })
    }
}

/// Every keeper, each holding the key of the store it owns.
#[derive(Clone, Debug)]
pub struct Keepers {
    pub params: ParamsKeeper,
    pub account: AccountKeeper,
    pub fee: FeeCollectionKeeper,
    pub bank: BankKeeper,
    pub pow: PowKeeper,
    pub cool: CoolKeeper,
    pub ibc: IbcMapper,
    pub staking: StakingKeeper,
}

impl Keepers {
    pub fn new(codec: Arc<Codec>, keys: &AppKeys) -> Self {
        let params = ParamsKeeper::new(keys.params.clone(), keys.transient_params.clone());
        let account = AccountKeeper::new(codec, keys.account.clone(), params.subspace(AUTH_PARAMSPACE));
        let bank = BankKeeper::new(account.clone());
        Self {
            fee: FeeCollectionKeeper::new(keys.fee.clone()),
            pow: PowKeeper::new(
                keys.pow.clone(),
                PowConfig::new(POW_DENOM, POW_REWARD),
                bank.clone(),
            ),
            cool: CoolKeeper::new(keys.main.clone(), bank.clone()),
            ibc: IbcMapper::new(keys.ibc.clone()),
            staking: StakingKeeper::new(keys.staking.clone(), bank.clone()),
            params,
            account,
            bank,
        }
    }
}

/// Registers one handler per module route and seals the table.
pub fn build_router(keepers: &Keepers) -> Result<Router, ConfigError> {
    let mut router = Router::new();
    router
        .add_route(ROUTE_BANK, BankHandler::new(keepers.bank.clone()))?
        .add_route(ROUTE_IBC, IbcHandler::new(keepers.ibc.clone(), keepers.bank.clone()))?
        .add_route(ROUTE_STAKING, StakingHandler::new(keepers.staking.clone()))?
        .add_route(ROUTE_POW, PowHandler::new(keepers.pow.clone()))?
        .add_route(ROUTE_COOL, CoolHandler::new(keepers.cool.clone()))?;
    router.seal();
    Ok(router)
}

// ---------------------------------------------------------------------------
// XpxApp
// ---------------------------------------------------------------------------

pub struct XpxApp {
    store: MultiStore,
    codec: Arc<Codec>,
    keys: AppKeys,
    keepers: Keepers,
    router: Router,
    ante: Box<dyn AnteHandler>,
    genesis: GenesisController,
    chain_id: String,
    header: Option<Header>,
}

impl XpxApp {
    /// Assembles the application over `store` with the standard ante
    /// handler.
    pub fn new(store: MultiStore) -> AppResult<Self> {
        Self::with_ante_handler(store, |keepers| {
            Box::new(StdAnteHandler::new(keepers.account.clone(), keepers.fee.clone()))
        })
    }

    /// Assembles the application with a custom ante handler.
    pub fn with_ante_handler<F>(mut store: MultiStore, make_ante: F) -> AppResult<Self>
    where
        F: FnOnce(&Keepers) -> Box<dyn AnteHandler>,
    {
        let codec = Arc::new(make_codec()?);

        let mut registry = StoreRegistry::new();
        let keys = AppKeys::declare(&mut registry)?;
        registry.seal();
        store.mount(registry.keys())?;

        let keepers = Keepers::new(Arc::clone(&codec), &keys);
        let router = build_router(&keepers)?;
        let ante = make_ante(&keepers);

        let last = store.load_latest_version(&keys.main)?;
        store.seal();

        let genesis = if last.version > 0 {
            GenesisController::ready()
        } else {
            GenesisController::new()
        };
        info!(
            app = APP_NAME,
            version = last.version,
            routes = router.routes().count(),
            "application assembled"
        );

        Ok(Self {
            store,
            codec,
            keys,
            keepers,
            router,
            ante,
            genesis,
            chain_id: String::new(),
            header: None,
        })
    }

    // -- Accessors ----------------------------------------------------------

    pub fn name(&self) -> &'static str {
        APP_NAME
    }

    pub fn codec(&self) -> &Codec {
        &self.codec
    }

    pub fn keys(&self) -> &AppKeys {
        &self.keys
    }

    pub fn keepers(&self) -> &Keepers {
        &self.keepers
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    pub fn genesis_phase(&self) -> GenesisPhase {
        self.genesis.phase()
    }

    pub fn last_commit(&self) -> CommitInfo {
        self.store.last_commit()
    }

    /// Read-only view of committed state. Writes made through it are
    /// discarded.
    pub fn query_context(&self) -> Context<'_> {
        Context::new(&self.store, self.block_header(), ExecMode::Query)
    }

    fn block_header(&self) -> Header {
        self.header.clone().unwrap_or_else(|| {
            Header::new(
                self.chain_id.clone(),
                self.store.last_commit().version + 1,
                DateTime::<Utc>::default(),
            )
        })
    }

    // -- Lifecycle ----------------------------------------------------------

    /// Loads the genesis document. Any failure is fatal and leaves the
    /// stores untouched.
    pub fn init_chain(&mut self, req: &RequestInitChain) -> AppResult<ResponseInitChain> {
        let header = Header::new(req.chain_id.clone(), 0, req.time);
        let mut ctx = Context::new(&self.store, header, ExecMode::InitChain);
        let state = self
            .genesis
            .init_chain(&mut ctx, &self.keepers, &req.app_state_bytes)?;
        let cache = ctx.into_cache();
        self.write_genesis(cache)?;
        self.chain_id = req.chain_id.clone();

        info!(chain_id = %req.chain_id, accounts = state.accounts.len(), "chain initialized");
        Ok(ResponseInitChain {
            validators: state.staking.validators(),
        })
    }

    /// Merges the genesis writes into the pending block. On failure the
    /// controller goes back to `Uninitialized`.
    fn write_genesis(&mut self, cache: StoreCache) -> AppResult<()> {
        if let Err(err) = self.store.write(cache) {
            self.genesis.abort();
            warn!(error = %err, "genesis writes could not be stored");
            return Err(err.into());
        }
        Ok(())
    }

    pub fn begin_block(&mut self, header: Header) {
        debug!(height = header.height, chain_id = %header.chain_id, "begin block");
        self.chain_id = header.chain_id.clone();
        self.header = Some(header);
    }

    /// Mempool check. Runs the full pipeline and discards the writes.
    pub fn check_tx(&self, tx_bytes: &[u8]) -> AppResult<ResponseDeliverTx> {
        let (response, _) = self.run_tx(ExecMode::Check, tx_bytes)?;
        Ok(response)
    }

    /// Executes a transaction and keeps its writes if it succeeds.
    pub fn deliver_tx(&mut self, tx_bytes: &[u8]) -> AppResult<ResponseDeliverTx> {
        let (response, cache) = self.run_tx(ExecMode::Deliver, tx_bytes)?;
        if let Some(cache) = cache {
            self.store.write(cache)?;
        }
        Ok(response)
    }

    pub fn commit(&mut self) -> AppResult<CommitInfo> {
        let info = self.store.commit()?;
        self.header = None;
        info!(
            version = info.version,
            app_hash = %hex::encode(info.app_hash),
            "committed"
        );
        Ok(info)
    }

    /// Exports the current state as an indented genesis document, plus
    /// the validator set.
    pub fn export_app_state_and_validators(&self) -> AppResult<(Vec<u8>, Vec<GenesisValidator>)> {
        let mut ctx = self.query_context();
        let state = self.genesis.export(&mut ctx, &self.keepers)?;
        let validators = self
            .keepers
            .staking
            .validators(&mut ctx)
            .map_err(GenesisError::module(staking::MODULE_NAME))?;
        Ok((state.to_json_pretty()?, validators))
    }

    // -- Transaction pipeline -----------------------------------------------

    fn run_tx(&self, mode: ExecMode, tx_bytes: &[u8]) -> AppResult<(ResponseDeliverTx, Option<StoreCache>)> {
        if self.genesis.phase() != GenesisPhase::Ready {
            return Err(GenesisError::InvalidPhase {
                expected: GenesisPhase::Ready,
                actual: self.genesis.phase(),
            }
            .into());
        }

        let tx = match decode_tx(&self.codec, tx_bytes) {
            Ok(tx) => tx,
            Err(err) => return Ok((rejected(mode, TxError::from(err)), None)),
        };

        let mut ctx = Context::new(&self.store, self.block_header(), mode);
        match self.execute(&mut ctx, &tx) {
            Ok(events) => {
                debug!(?mode, msgs = tx.msgs.len(), "transaction accepted");
                let response = ResponseDeliverTx {
                    code: 0,
                    log: String::new(),
                    events,
                };
                Ok((response, Some(ctx.into_cache())))
            }
            Err(TxError::Store(err)) => Err(AppError::Store(err)),
            Err(err) => Ok((rejected(mode, err), None)),
        }
    }

    fn execute(&self, ctx: &mut Context<'_>, tx: &StdTx) -> TxResult<Vec<(String, String)>> {
        tx.validate_basic()?;
        if let Some(msg) = tx.msgs.iter().find(|m| !self.router.has_route(m.route())) {
            return Err(TxError::UnknownRoute(msg.route().to_string()));
        }

        self.ante.ante(ctx, tx)?;

        let mut events = Vec::with_capacity(tx.msgs.len());
        for msg in &tx.msgs {
            self.router.dispatch(msg.route(), ctx, msg)?;
            events.push((msg.route().to_string(), msg.type_tag().to_string()));
        }
        Ok(events)
    }
}

fn rejected(mode: ExecMode, err: TxError) -> ResponseDeliverTx {
    warn!(?mode, code = err.code(), error = %err, "transaction rejected");
    ResponseDeliverTx::rejected(&err)
}
