//! # Transactions & Messages
//!
//! A transaction is an ordered list of messages plus a fee, signatures, and
//! a memo. Each message names the route that handles it; the router finds
//! the handler by that name and nothing else.
//!
//! Transactions arrive as JSON envelopes:
//!
//! ```text
//! {"type": "auth/StdTx",
//!  "value": {"msgs": [{"type": "cosmos-sdk/Send", "value": {...}}, ...],
//!            "fee": {"amount": [...], "gas": 0},
//!            "signatures": [...],
//!            "memo": ""}}
//! ```
//!
//! Both the outer tag and every message tag are checked against the sealed
//! codec before anything is decoded.

use serde::{Deserialize, Serialize};

use crate::codec::{unknown_type, Codec, Format, Interface, JsonEnvelope};
use crate::config::{
    MSG_INTERFACE, TAG_MSG_BOND, TAG_MSG_IBC_RECEIVE, TAG_MSG_IBC_TRANSFER, TAG_MSG_MINE,
    TAG_MSG_QUIZ, TAG_MSG_SEND, TAG_MSG_SET_TREND, TAG_MSG_UNBOND, TAG_STD_TX, TX_INTERFACE,
};
use crate::error::{CodecError, CodecResult, ConfigError, TxError, TxResult};
use crate::modules::bank::MsgSend;
use crate::modules::cool::{MsgQuiz, MsgSetTrend};
use crate::modules::ibc::{MsgIbcReceive, MsgIbcTransfer};
use crate::modules::pow::MsgMine;
use crate::modules::staking::{MsgBond, MsgUnbond};
use crate::types::{Address, Coins};

// ---------------------------------------------------------------------------
// Msg
// ---------------------------------------------------------------------------

/// Every message the application understands.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Msg {
    Send(MsgSend),
    IbcTransfer(MsgIbcTransfer),
    IbcReceive(MsgIbcReceive),
    Bond(MsgBond),
    Unbond(MsgUnbond),
    Mine(MsgMine),
    SetTrend(MsgSetTrend),
    Quiz(MsgQuiz),
}

impl Msg {
    /// Name of the route that handles this message.
    pub fn route(&self) -> &'static str {
        match self {
            Msg::Send(_) => crate::config::ROUTE_BANK,
            Msg::IbcTransfer(_) | Msg::IbcReceive(_) => crate::config::ROUTE_IBC,
            Msg::Bond(_) | Msg::Unbond(_) => crate::config::ROUTE_STAKING,
            Msg::Mine(_) => crate::config::ROUTE_POW,
            Msg::SetTrend(_) | Msg::Quiz(_) => crate::config::ROUTE_COOL,
        }
    }

    /// Addresses that must sign a transaction carrying this message.
    pub fn signers(&self) -> Vec<Address> {
        match self {
            Msg::Send(m) => vec![m.from_address],
            Msg::IbcTransfer(m) => vec![m.packet.src_addr],
            Msg::IbcReceive(m) => vec![m.relayer],
            Msg::Bond(m) => vec![m.address],
            Msg::Unbond(m) => vec![m.address],
            Msg::Mine(m) => vec![m.sender],
            Msg::SetTrend(m) => vec![m.sender],
            Msg::Quiz(m) => vec![m.sender],
        }
    }

    /// Stateless checks. Runs before the ante handler touches any store.
    pub fn validate_basic(&self) -> TxResult<()> {
        match self {
            Msg::Send(m) => m.validate_basic(),
            Msg::IbcTransfer(m) => m.validate_basic(),
            Msg::IbcReceive(m) => m.validate_basic(),
            Msg::Bond(m) => m.validate_basic(),
            Msg::Unbond(m) => m.validate_basic(),
            Msg::Mine(m) => m.validate_basic(),
            Msg::SetTrend(m) => m.validate_basic(),
            Msg::Quiz(m) => m.validate_basic(),
        }
    }
}

impl Interface for Msg {
    const NAME: &'static str = MSG_INTERFACE;

    fn type_tag(&self) -> &'static str {
        match self {
            Msg::Send(_) => TAG_MSG_SEND,
            Msg::IbcTransfer(_) => TAG_MSG_IBC_TRANSFER,
            Msg::IbcReceive(_) => TAG_MSG_IBC_RECEIVE,
            Msg::Bond(_) => TAG_MSG_BOND,
            Msg::Unbond(_) => TAG_MSG_UNBOND,
            Msg::Mine(_) => TAG_MSG_MINE,
            Msg::SetTrend(_) => TAG_MSG_SET_TREND,
            Msg::Quiz(_) => TAG_MSG_QUIZ,
        }
    }

    fn encode_value(&self, format: Format) -> CodecResult<Vec<u8>> {
        match self {
            Msg::Send(m) => format.encode(m),
            Msg::IbcTransfer(m) => format.encode(m),
            Msg::IbcReceive(m) => format.encode(m),
            Msg::Bond(m) => format.encode(m),
            Msg::Unbond(m) => format.encode(m),
            Msg::Mine(m) => format.encode(m),
            Msg::SetTrend(m) => format.encode(m),
            Msg::Quiz(m) => format.encode(m),
        }
    }

    fn decode_value(tag: &str, format: Format, bytes: &[u8]) -> CodecResult<Self> {
        Ok(match tag {
            TAG_MSG_SEND => Msg::Send(format.decode(bytes)?),
            TAG_MSG_IBC_TRANSFER => Msg::IbcTransfer(format.decode(bytes)?),
            TAG_MSG_IBC_RECEIVE => Msg::IbcReceive(format.decode(bytes)?),
            TAG_MSG_BOND => Msg::Bond(format.decode(bytes)?),
            TAG_MSG_UNBOND => Msg::Unbond(format.decode(bytes)?),
            TAG_MSG_MINE => Msg::Mine(format.decode(bytes)?),
            TAG_MSG_SET_TREND => Msg::SetTrend(format.decode(bytes)?),
            TAG_MSG_QUIZ => Msg::Quiz(format.decode(bytes)?),
            other => return Err(unknown_type::<Self>(other)),
        })
    }
}

// ---------------------------------------------------------------------------
// StdTx
// ---------------------------------------------------------------------------

/// Fee offered by the first signer.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StdFee {
    pub amount: Coins,
    #[serde(default)]
    pub gas: u64,
}

/// One signature, in signer order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StdSignature {
    /// Hex-encoded public key of the signer.
    pub pub_key: String,
    /// Hex-encoded signature bytes.
    pub signature: String,
    pub account_number: u64,
    pub sequence: u64,
}

/// The standard transaction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StdTx {
    pub msgs: Vec<Msg>,
    pub fee: StdFee,
    pub signatures: Vec<StdSignature>,
    pub memo: String,
}

impl StdTx {
    pub fn new(msgs: Vec<Msg>, fee: StdFee, signatures: Vec<StdSignature>, memo: &str) -> Self {
        Self {
            msgs,
            fee,
            signatures,
            memo: memo.to_string(),
        }
    }

    /// Required signers, deduplicated, in order of first appearance.
    pub fn signers(&self) -> Vec<Address> {
        let mut signers: Vec<Address> = Vec::new();
        for addr in self.msgs.iter().flat_map(Msg::signers) {
            if !signers.contains(&addr) {
                signers.push(addr);
            }
        }
        signers
    }

    /// Stateless checks over the whole transaction.
    pub fn validate_basic(&self) -> TxResult<()> {
        if self.msgs.is_empty() {
            return Err(TxError::InvalidMsg("transaction has no messages".into()));
        }
        for msg in &self.msgs {
            msg.validate_basic()?;
        }
        Ok(())
    }
}

/// JSON body of an `auth/StdTx` envelope. Messages stay enveloped until
/// the codec has checked their tags.
#[derive(Serialize, Deserialize)]
struct RawStdTx {
    msgs: Vec<JsonEnvelope>,
    #[serde(default)]
    fee: StdFee,
    #[serde(default)]
    signatures: Vec<StdSignature>,
    #[serde(default)]
    memo: String,
}

/// Decodes a wire transaction.
pub fn decode_tx(codec: &Codec, bytes: &[u8]) -> CodecResult<StdTx> {
    let envelope: JsonEnvelope = Format::Json.decode(bytes)?;
    codec.ensure_registered(TX_INTERFACE, &envelope.type_tag)?;
    if envelope.type_tag != TAG_STD_TX {
        return Err(CodecError::UnknownType {
            interface: TX_INTERFACE.to_string(),
            tag: envelope.type_tag,
        });
    }
    let raw: RawStdTx = serde_json::from_value(envelope.value)
        .map_err(|e| CodecError::Decode(e.to_string()))?;
    let msgs = raw
        .msgs
        .iter()
        .map(|m| codec.unmarshal_json::<Msg>(m))
        .collect::<CodecResult<Vec<_>>>()?;
    Ok(StdTx {
        msgs,
        fee: raw.fee,
        signatures: raw.signatures,
        memo: raw.memo,
    })
}

/// Encodes a transaction into its wire form.
pub fn encode_tx(codec: &Codec, tx: &StdTx) -> CodecResult<Vec<u8>> {
    let msgs = tx
        .msgs
        .iter()
        .map(|m| codec.marshal_json(m))
        .collect::<CodecResult<Vec<_>>>()?;
    let raw = RawStdTx {
        msgs,
        fee: tx.fee.clone(),
        signatures: tx.signatures.clone(),
        memo: tx.memo.clone(),
    };
    let value = serde_json::to_value(&raw).map_err(|e| CodecError::Encode(e.to_string()))?;
    codec.ensure_registered(TX_INTERFACE, TAG_STD_TX)?;
    Format::Json.encode(&JsonEnvelope {
        type_tag: TAG_STD_TX.to_string(),
        value,
    })
}

/// Registers the transaction interface and its one concrete shape.
pub fn register_codec(codec: &mut Codec) -> Result<(), ConfigError> {
    codec.register_interface(TX_INTERFACE)?;
    codec.register_concrete(TX_INTERFACE, TAG_STD_TX)
}
