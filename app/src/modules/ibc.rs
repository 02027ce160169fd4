//! # IBC Mapper
//!
//! Minimal inter-chain coin transfer. Outgoing packets are appended to a
//! per-destination egress queue for relayers to pick up; incoming packets
//! must arrive in order, tracked by a per-source ingress sequence.
//!
//! ```text
//! egress_len/<chain>            -> u64 queue length
//! egress/<chain>/<index u64 BE> -> packet
//! ingress/<chain>               -> u64 next expected sequence
//! ```
//!
//! Chain ids may not contain `/`, which keeps the key layout unambiguous.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::bank::BankKeeper;
use crate::codec::{Codec, Format};
use crate::config::{MSG_INTERFACE, ROUTE_IBC, TAG_MSG_IBC_RECEIVE, TAG_MSG_IBC_TRANSFER};
use crate::context::Context;
use crate::error::{ConfigError, GenesisError, GenesisResult, TxError, TxResult};
use crate::genesis::GenesisModule;
use crate::router::{unrecognized, Handler};
use crate::store::{KvStore, StoreKey};
use crate::tx::Msg;
use crate::types::{Address, Coins};

pub const MODULE_NAME: &str = "ibc";

const EGRESS_PREFIX: &str = "egress/";
const EGRESS_LEN_PREFIX: &str = "egress_len/";
const INGRESS_PREFIX: &str = "ingress/";

fn egress_key(chain: &str, index: u64) -> Vec<u8> {
    let mut key = format!("{EGRESS_PREFIX}{chain}/").into_bytes();
    key.extend_from_slice(&index.to_be_bytes());
    key
}

fn egress_len_key(chain: &str) -> Vec<u8> {
    format!("{EGRESS_LEN_PREFIX}{chain}").into_bytes()
}

fn ingress_key(chain: &str) -> Vec<u8> {
    format!("{INGRESS_PREFIX}{chain}").into_bytes()
}

fn validate_chain_id(chain: &str) -> TxResult<()> {
    if chain.is_empty() || chain.contains('/') {
        return Err(TxError::InvalidMsg(format!("invalid chain id '{chain}'")));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

/// Coins in flight between two chains.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IbcPacket {
    pub src_addr: Address,
    pub dest_addr: Address,
    pub coins: Coins,
    pub src_chain: String,
    pub dest_chain: String,
}

impl IbcPacket {
    pub fn validate_basic(&self) -> TxResult<()> {
        validate_chain_id(&self.src_chain)?;
        validate_chain_id(&self.dest_chain)?;
        if self.src_chain == self.dest_chain {
            return Err(TxError::InvalidMsg("source and destination chains are identical".into()));
        }
        if self.coins.is_empty() {
            return Err(TxError::InvalidCoins("packet carries no coins".into()));
        }
        Ok(())
    }
}

/// Sends a packet out of this chain.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgIbcTransfer {
    pub packet: IbcPacket,
}

impl MsgIbcTransfer {
    pub fn validate_basic(&self) -> TxResult<()> {
        self.packet.validate_basic()
    }
}

/// Delivers a packet relayed from another chain.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgIbcReceive {
    pub packet: IbcPacket,
    pub relayer: Address,
    pub sequence: u64,
}

impl MsgIbcReceive {
    pub fn validate_basic(&self) -> TxResult<()> {
        if self.relayer.is_empty() {
            return Err(TxError::InvalidAddress("empty relayer".into()));
        }
        self.packet.validate_basic()
    }
}

pub fn register_codec(codec: &mut Codec) -> Result<(), ConfigError> {
    codec.register_concrete(MSG_INTERFACE, TAG_MSG_IBC_TRANSFER)?;
    codec.register_concrete(MSG_INTERFACE, TAG_MSG_IBC_RECEIVE)
}

// ---------------------------------------------------------------------------
// Mapper
// ---------------------------------------------------------------------------

/// Outgoing queue for one destination chain.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EgressQueue {
    pub chain_id: String,
    pub packets: Vec<IbcPacket>,
}

/// Next expected incoming sequence from one source chain.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngressSequence {
    pub chain_id: String,
    pub sequence: u64,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IbcGenesis {
    #[serde(default)]
    pub egress: Vec<EgressQueue>,
    #[serde(default)]
    pub ingress: Vec<IngressSequence>,
}

/// Owner of the `ibc` store.
#[derive(Clone, Debug)]
pub struct IbcMapper {
    key: StoreKey,
}

impl IbcMapper {
    pub fn new(key: StoreKey) -> Self {
        Self { key }
    }

    fn read_u64(&self, ctx: &mut Context<'_>, key: &[u8]) -> TxResult<u64> {
        match ctx.kv_store(&self.key)?.get(key)? {
            Some(bytes) => Ok(Format::Binary.decode(&bytes)?),
            None => Ok(0),
        }
    }

    fn write_u64(&self, ctx: &mut Context<'_>, key: &[u8], value: u64) -> TxResult<()> {
        let bytes = Format::Binary.encode(&value)?;
        ctx.kv_store(&self.key)?.set(key, bytes);
        Ok(())
    }

    /// Appends `packet` to the egress queue for its destination chain.
    /// Returns the packet's index in that queue.
    pub fn post_packet(&self, ctx: &mut Context<'_>, packet: &IbcPacket) -> TxResult<u64> {
        let index = self.egress_length(ctx, &packet.dest_chain)?;
        let bytes = Format::Binary.encode(packet)?;
        ctx.kv_store(&self.key)?.set(&egress_key(&packet.dest_chain, index), bytes);
        self.write_u64(ctx, &egress_len_key(&packet.dest_chain), index + 1)?;
        debug!(dest = %packet.dest_chain, index, "ibc packet queued");
        Ok(index)
    }

    pub fn egress_length(&self, ctx: &mut Context<'_>, chain: &str) -> TxResult<u64> {
        self.read_u64(ctx, &egress_len_key(chain))
    }

    pub fn egress_packet(&self, ctx: &mut Context<'_>, chain: &str, index: u64) -> TxResult<Option<IbcPacket>> {
        match ctx.kv_store(&self.key)?.get(&egress_key(chain, index))? {
            Some(bytes) => Ok(Some(Format::Binary.decode(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn ingress_sequence(&self, ctx: &mut Context<'_>, chain: &str) -> TxResult<u64> {
        self.read_u64(ctx, &ingress_key(chain))
    }

    pub fn set_ingress_sequence(&self, ctx: &mut Context<'_>, chain: &str, sequence: u64) -> TxResult<()> {
        self.write_u64(ctx, &ingress_key(chain), sequence)
    }

    /// Chain ids found under `prefix`, in key order.
    fn chains(&self, ctx: &mut Context<'_>, prefix: &str) -> TxResult<Vec<String>> {
        let store = ctx.kv_store(&self.key)?;
        let mut chains = Vec::new();
        for entry in store.prefix_iter(prefix.as_bytes()) {
            let (key, _) = entry?;
            let chain = String::from_utf8(key[prefix.len()..].to_vec())
                .map_err(|e| TxError::Internal(format!("corrupt ibc key: {e}")))?;
            chains.push(chain);
        }
        Ok(chains)
    }
}

impl GenesisModule for IbcMapper {
    const NAME: &'static str = MODULE_NAME;
    type State = IbcGenesis;

    fn init_genesis(&self, ctx: &mut Context<'_>, genesis: &IbcGenesis) -> GenesisResult<()> {
        let rejected = |reason: String| GenesisError::ModuleRejected {
            module: MODULE_NAME,
            reason,
        };
        let mut seen = BTreeSet::new();
        for queue in &genesis.egress {
            validate_chain_id(&queue.chain_id).map_err(|e| rejected(e.to_string()))?;
            if !seen.insert(queue.chain_id.as_str()) {
                return Err(rejected(format!("duplicate egress queue for {}", queue.chain_id)));
            }
            for packet in &queue.packets {
                if packet.dest_chain != queue.chain_id {
                    return Err(rejected(format!(
                        "packet for '{}' queued under '{}'",
                        packet.dest_chain, queue.chain_id
                    )));
                }
                self.post_packet(ctx, packet)
                    .map_err(GenesisError::module(MODULE_NAME))?;
            }
        }
        let mut seen = BTreeSet::new();
        for ingress in &genesis.ingress {
            validate_chain_id(&ingress.chain_id).map_err(|e| rejected(e.to_string()))?;
            if !seen.insert(ingress.chain_id.as_str()) {
                return Err(rejected(format!(
                    "duplicate ingress sequence for {}",
                    ingress.chain_id
                )));
            }
            self.set_ingress_sequence(ctx, &ingress.chain_id, ingress.sequence)
                .map_err(GenesisError::module(MODULE_NAME))?;
        }
        Ok(())
    }

    fn export_genesis(&self, ctx: &mut Context<'_>) -> GenesisResult<IbcGenesis> {
        let export = |ctx: &mut Context<'_>| -> TxResult<IbcGenesis> {
            let mut egress = Vec::new();
            for chain_id in self.chains(ctx, EGRESS_LEN_PREFIX)? {
                let mut packets = Vec::new();
                for index in 0..self.egress_length(ctx, &chain_id)? {
                    if let Some(packet) = self.egress_packet(ctx, &chain_id, index)? {
                        packets.push(packet);
                    }
                }
                egress.push(EgressQueue { chain_id, packets });
            }
            let mut ingress = Vec::new();
            for chain_id in self.chains(ctx, INGRESS_PREFIX)? {
                let sequence = self.ingress_sequence(ctx, &chain_id)?;
                ingress.push(IngressSequence { chain_id, sequence });
            }
            Ok(IbcGenesis { egress, ingress })
        };
        export(ctx).map_err(GenesisError::module(MODULE_NAME))
    }
}

// ---------------------------------------------------------------------------
// Handler
// ---------------------------------------------------------------------------

pub struct IbcHandler {
    mapper: IbcMapper,
    bank: BankKeeper,
}

impl IbcHandler {
    pub fn new(mapper: IbcMapper, bank: BankKeeper) -> Self {
        Self { mapper, bank }
    }
}

impl Handler for IbcHandler {
    fn handle(&self, ctx: &mut Context<'_>, msg: &Msg) -> TxResult<()> {
        match msg {
            Msg::IbcTransfer(m) => {
                let packet = &m.packet;
                self.bank.subtract_coins(ctx, &packet.src_addr, &packet.coins)?;
                self.mapper.post_packet(ctx, packet)?;
                Ok(())
            }
            Msg::IbcReceive(m) => {
                let packet = &m.packet;
                let expected = self.mapper.ingress_sequence(ctx, &packet.src_chain)?;
                if m.sequence != expected {
                    return Err(TxError::InvalidSequence {
                        expected,
                        got: m.sequence,
                    });
                }
                self.bank.add_coins(ctx, &packet.dest_addr, &packet.coins)?;
                self.mapper
                    .set_ingress_sequence(ctx, &packet.src_chain, expected + 1)
            }
            other => Err(unrecognized(ROUTE_IBC, other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::TestEnv;

    fn packet(src: &str, dest: &str, amount: u64) -> IbcPacket {
        IbcPacket {
            src_addr: Address::from_pub_key(b"src"),
            dest_addr: Address::from_pub_key(b"dest"),
            coins: Coins::single("steak", amount),
            src_chain: src.into(),
            dest_chain: dest.into(),
        }
    }

    #[test]
    fn transfer_debits_and_queues() {
        let mut env = TestEnv::new();
        env.fund(b"src", Coins::single("steak", 10));
        let mut ctx = env.ctx();
        let handler = IbcHandler::new(env.keepers.ibc.clone(), env.keepers.bank.clone());

        let msg = Msg::IbcTransfer(MsgIbcTransfer {
            packet: packet("here", "there", 4),
        });
        handler.handle(&mut ctx, &msg).unwrap();
        handler.handle(&mut ctx, &msg).unwrap();

        let ibc = &env.keepers.ibc;
        assert_eq!(ibc.egress_length(&mut ctx, "there").unwrap(), 2);
        assert_eq!(
            ibc.egress_packet(&mut ctx, "there", 1).unwrap(),
            Some(packet("here", "there", 4))
        );
        let left = env
            .keepers
            .bank
            .get_coins(&mut ctx, &Address::from_pub_key(b"src"))
            .unwrap();
        assert_eq!(left.amount_of("steak"), 2);
    }

    #[test]
    fn receive_enforces_ordering() {
        let env = TestEnv::new();
        let mut ctx = env.ctx();
        let handler = IbcHandler::new(env.keepers.ibc.clone(), env.keepers.bank.clone());
        let receive = |sequence| {
            Msg::IbcReceive(MsgIbcReceive {
                packet: packet("there", "here", 3),
                relayer: Address::from_pub_key(b"relayer"),
                sequence,
            })
        };

        assert!(matches!(
            handler.handle(&mut ctx, &receive(1)),
            Err(TxError::InvalidSequence { expected: 0, got: 1 })
        ));
        handler.handle(&mut ctx, &receive(0)).unwrap();
        handler.handle(&mut ctx, &receive(1)).unwrap();
        assert_eq!(env.keepers.ibc.ingress_sequence(&mut ctx, "there").unwrap(), 2);
        let got = env
            .keepers
            .bank
            .get_coins(&mut ctx, &Address::from_pub_key(b"dest"))
            .unwrap();
        assert_eq!(got.amount_of("steak"), 6);
    }

    #[test]
    fn identical_chains_fail_validation() {
        let msg = MsgIbcTransfer {
            packet: packet("same", "same", 1),
        };
        assert!(msg.validate_basic().is_err());
    }

    #[test]
    fn genesis_round_trip() {
        let genesis = IbcGenesis {
            egress: vec![
                EgressQueue {
                    chain_id: "alpha".into(),
                    packets: vec![packet("here", "alpha", 1), packet("here", "alpha", 2)],
                },
                EgressQueue {
                    chain_id: "beta".into(),
                    packets: vec![packet("here", "beta", 3)],
                },
            ],
            ingress: vec![IngressSequence {
                chain_id: "gamma".into(),
                sequence: 7,
            }],
        };
        let mut env = TestEnv::new();
        env.apply(|ctx, keepers| keepers.ibc.init_genesis(ctx, &genesis).unwrap());
        let mut ctx = env.ctx();
        assert_eq!(env.keepers.ibc.export_genesis(&mut ctx).unwrap(), genesis);
    }

    #[test]
    fn misfiled_genesis_packet_is_rejected() {
        let env = TestEnv::new();
        let mut ctx = env.ctx();
        let genesis = IbcGenesis {
            egress: vec![EgressQueue {
                chain_id: "alpha".into(),
                packets: vec![packet("here", "beta", 1)],
            }],
            ingress: vec![],
        };
        assert!(matches!(
            env.keepers.ibc.init_genesis(&mut ctx, &genesis),
            Err(GenesisError::ModuleRejected { module: "ibc", .. })
        ));
    }
    #[test]
    fn duplicate_genesis_chains_are_rejected() {
        let ingress = |sequence| IngressSequence {
            chain_id: "gamma".into(),
            sequence,
        };
        let genesis = IbcGenesis {
            egress: vec![],
            ingress: vec![ingress(7), ingress(2)],
        };
        let env = TestEnv::new();
        let mut ctx = env.ctx();
        let err = env.keepers.ibc.init_genesis(&mut ctx, &genesis).unwrap_err();
        match err {
            GenesisError::ModuleRejected { module, reason } => {
                assert_eq!(module, "ibc");
                assert!(reason.contains("duplicate ingress"), "{reason}");
            }
            other => panic!("unexpected error: {other:?}"),
        }

        let queue = EgressQueue {
            chain_id: "alpha".into(),
            packets: vec![packet("here", "alpha", 1)],
        };
        let genesis = IbcGenesis {
            egress: vec![queue.clone(), queue],
            ingress: vec![],
        };
        assert!(matches!(
            env.keepers.ibc.init_genesis(&mut ctx, &genesis),
            Err(GenesisError::ModuleRejected { module: "ibc", .. })
        ));
    }
}
