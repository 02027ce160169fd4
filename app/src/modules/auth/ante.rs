//! # Ante Handler
//!
//! Runs once per transaction, before any message is dispatched. It can
//! read and write state through the same context the messages will use,
//! so everything it changes (sequences, fee deduction) is discarded along
//! with the rest if any later step fails.
//!
//! ```text
//! memo length -> signature count -> per signer:
//!     account exists, account number, sequence, pub key, signature present
//!     sequence += 1
//! -> fee from first signer into the fee collector
//! ```
//!
//! Signature bytes are required to be present but are not verified
//! cryptographically; the public key must hash to the signer's address.

use tracing::debug;

use super::fee::FeeCollectionKeeper;
use super::keeper::AccountKeeper;
use crate::context::Context;
use crate::error::{TxError, TxResult};
use crate::tx::StdTx;
use crate::types::Address;

/// Pre-dispatch transaction check.
pub trait AnteHandler {
    fn ante(&self, ctx: &mut Context<'_>, tx: &StdTx) -> TxResult<()>;
}

/// Signature, sequence, and fee checks over the account store.
pub struct StdAnteHandler {
    accounts: AccountKeeper,
    fees: FeeCollectionKeeper,
}

impl StdAnteHandler {
    pub fn new(accounts: AccountKeeper, fees: FeeCollectionKeeper) -> Self {
        Self { accounts, fees }
    }

    fn deduct_fee(&self, ctx: &mut Context<'_>, payer: &Address, tx: &StdTx) -> TxResult<()> {
        let fee = &tx.fee.amount;
        if fee.is_empty() {
            return Ok(());
        }
        let mut acc = self
            .accounts
            .get_account(ctx, payer)?
            .ok_or(TxError::UnknownAddress(*payer))?;
        let remaining = acc
            .coins()
            .checked_sub(fee)
            .ok_or_else(|| TxError::InsufficientFunds {
                address: *payer,
                available: acc.coins().clone(),
                required: fee.clone(),
            })?;
        acc.set_coins(remaining);
        self.accounts.set_account(ctx, &acc)?;
        self.fees.add_collected_fees(ctx, fee)?;
        Ok(())
    }
}

impl AnteHandler for StdAnteHandler {
    fn ante(&self, ctx: &mut Context<'_>, tx: &StdTx) -> TxResult<()> {
        let params = self.accounts.params(ctx)?;

        let memo_len = tx.memo.chars().count() as u64;
        if memo_len > params.max_memo_characters {
            return Err(TxError::MemoTooLarge {
                limit: params.max_memo_characters,
                actual: memo_len,
            });
        }

        let signers = tx.signers();
        if tx.signatures.len() != signers.len() {
            return Err(TxError::Unauthorized(format!(
                "expected {} signatures, got {}",
                signers.len(),
                tx.signatures.len()
            )));
        }
        let sig_count = tx.signatures.len() as u64;
        if sig_count > params.tx_sig_limit {
            return Err(TxError::TooManySignatures {
                limit: params.tx_sig_limit,
                actual: sig_count,
            });
        }

        for (signer, sig) in signers.iter().zip(&tx.signatures) {
            let mut acc = self
                .accounts
                .get_account(ctx, signer)?
                .ok_or(TxError::UnknownAddress(*signer))?;

            if sig.account_number != acc.account_number() {
                return Err(TxError::Unauthorized(format!(
                    "account number mismatch for {signer}: expected {}, got {}",
                    acc.account_number(),
                    sig.account_number
                )));
            }
            if sig.sequence != acc.sequence() {
                return Err(TxError::InvalidSequence {
                    expected: acc.sequence(),
                    got: sig.sequence,
                });
            }

            let pub_key = hex::decode(&sig.pub_key)
                .map_err(|e| TxError::InvalidPubKey(e.to_string()))?;
            if Address::from_pub_key(&pub_key) != *signer {
                return Err(TxError::InvalidPubKey(format!(
                    "public key does not match signer {signer}"
                )));
            }
            match acc.pub_key() {
                Some(known) if !known.eq_ignore_ascii_case(&sig.pub_key) => {
                    return Err(TxError::InvalidPubKey(format!(
                        "public key differs from the one recorded for {signer}"
                    )));
                }
                Some(_) => {}
                None => acc.set_pub_key(hex::encode(&pub_key)),
            }

            let signature = hex::decode(&sig.signature)
                .map_err(|e| TxError::Unauthorized(format!("malformed signature: {e}")))?;
            if signature.is_empty() {
                return Err(TxError::Unauthorized(format!("empty signature for {signer}")));
            }

            acc.set_sequence(acc.sequence() + 1);
            self.accounts.set_account(ctx, &acc)?;
        }

        if let Some(payer) = signers.first() {
            self.deduct_fee(ctx, payer, tx)?;
        }
        debug!(signers = signers.len(), fee = %tx.fee.amount, "ante passed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::cool::MsgSetTrend;
    use crate::testutil::{sign, TestEnv};
    use crate::tx::{Msg, StdFee};
    use crate::types::Coins;

    fn trend_tx(sender: &[u8], sequence: u64, fee: Coins, memo: &str) -> StdTx {
        let msg = Msg::SetTrend(MsgSetTrend {
            sender: Address::from_pub_key(sender),
            cool: "icecold".into(),
        });
        StdTx::new(
            vec![msg],
            StdFee { amount: fee, gas: 0 },
            vec![sign(sender, 0, sequence)],
            memo,
        )
    }

    fn setup(balance: u64) -> TestEnv {
        let mut env = TestEnv::new();
        env.fund(b"alice", Coins::single("steak", balance));
        env
    }

    #[test]
    fn increments_sequence_and_collects_fee() {
        let env = setup(10);
        let mut ctx = env.ctx();
        env.ante().ante(&mut ctx, &trend_tx(b"alice", 0, Coins::single("steak", 3), "")).unwrap();

        let alice = Address::from_pub_key(b"alice");
        let acc = env.keepers.account.get_account(&mut ctx, &alice).unwrap().unwrap();
        assert_eq!(acc.sequence(), 1);
        assert_eq!(acc.coins(), &Coins::single("steak", 7));
        assert_eq!(acc.pub_key(), Some(hex::encode(b"alice").as_str()));
        assert_eq!(
            env.keepers.fee.get_collected_fees(&mut ctx).unwrap(),
            Coins::single("steak", 3)
        );
    }

    #[test]
    fn rejects_stale_sequence() {
        let env = setup(10);
        let mut ctx = env.ctx();
        let err = env
            .ante()
            .ante(&mut ctx, &trend_tx(b"alice", 5, Coins::empty(), ""))
            .unwrap_err();
        assert!(matches!(err, TxError::InvalidSequence { expected: 0, got: 5 }));
    }

    #[test]
    fn rejects_unknown_signer() {
        let env = setup(10);
        let mut ctx = env.ctx();
        let err = env
            .ante()
            .ante(&mut ctx, &trend_tx(b"mallory", 0, Coins::empty(), ""))
            .unwrap_err();
        assert!(matches!(err, TxError::UnknownAddress(_)));
    }

    #[test]
    fn rejects_unaffordable_fee() {
        let env = setup(2);
        let mut ctx = env.ctx();
        let err = env
            .ante()
            .ante(&mut ctx, &trend_tx(b"alice", 0, Coins::single("steak", 3), ""))
            .unwrap_err();
        assert!(matches!(err, TxError::InsufficientFunds { .. }));
    }

    #[test]
    fn rejects_long_memo() {
        let env = setup(2);
        let mut ctx = env.ctx();
        let memo = "x".repeat(257);
        let err = env
            .ante()
            .ante(&mut ctx, &trend_tx(b"alice", 0, Coins::empty(), &memo))
            .unwrap_err();
        assert!(matches!(err, TxError::MemoTooLarge { limit: 256, actual: 257 }));
    }

    #[test]
    fn rejects_foreign_public_key() {
        let env = setup(2);
        let mut ctx = env.ctx();
        let mut tx = trend_tx(b"alice", 0, Coins::empty(), "");
        tx.signatures[0].pub_key = hex::encode(b"mallory");
        let err = env.ante().ante(&mut ctx, &tx).unwrap_err();
        assert!(matches!(err, TxError::InvalidPubKey(_)));
    }

    #[test]
    fn rejects_missing_signature() {
        let env = setup(2);
        let mut ctx = env.ctx();
        let mut tx = trend_tx(b"alice", 0, Coins::empty(), "");
        tx.signatures.clear();
        let err = env.ante().ante(&mut ctx, &tx).unwrap_err();
        assert!(matches!(err, TxError::Unauthorized(_)));
    }
}
