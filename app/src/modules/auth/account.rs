//! Account shapes stored by the account keeper.
//!
//! Accounts are polymorphic: the store holds a tagged envelope, and the
//! tag decides which shape comes back out. This application writes
//! [`AppAccount`]s; bare [`BaseAccount`]s stay decodable so state written
//! by plain tooling still loads.

use serde::{Deserialize, Serialize};

use crate::codec::{unknown_type, Format, Interface};
use crate::config::{ACCOUNT_INTERFACE, TAG_APP_ACCOUNT, TAG_BASE_ACCOUNT};
use crate::error::CodecResult;
use crate::types::{Address, Coins};

/// Fields every account carries.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaseAccount {
    pub address: Address,
    pub coins: Coins,
    /// Hex-encoded public key, recorded on the first signed transaction.
    pub pub_key: Option<String>,
    pub account_number: u64,
    pub sequence: u64,
}

impl BaseAccount {
    pub fn new(address: Address) -> Self {
        Self {
            address,
            ..Self::default()
        }
    }
}

/// Application account: a base account with a display name.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppAccount {
    pub name: String,
    pub base: BaseAccount,
}

/// Any account the store may hold.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Account {
    Base(BaseAccount),
    App(AppAccount),
}

impl Account {
    /// The shape new accounts are created with.
    pub fn proto(address: Address) -> Self {
        Account::App(AppAccount {
            name: String::new(),
            base: BaseAccount::new(address),
        })
    }

    fn base(&self) -> &BaseAccount {
        match self {
            Account::Base(base) => base,
            Account::App(app) => &app.base,
        }
    }

    fn base_mut(&mut self) -> &mut BaseAccount {
        match self {
            Account::Base(base) => base,
            Account::App(app) => &mut app.base,
        }
    }

    pub fn address(&self) -> Address {
        self.base().address
    }

    pub fn coins(&self) -> &Coins {
        &self.base().coins
    }

    pub fn set_coins(&mut self, coins: Coins) {
        self.base_mut().coins = coins;
    }

    pub fn pub_key(&self) -> Option<&str> {
        self.base().pub_key.as_deref()
    }

    pub fn set_pub_key(&mut self, pub_key: String) {
        self.base_mut().pub_key = Some(pub_key);
    }

    pub fn account_number(&self) -> u64 {
        self.base().account_number
    }

    pub fn set_account_number(&mut self, number: u64) {
        self.base_mut().account_number = number;
    }

    pub fn sequence(&self) -> u64 {
        self.base().sequence
    }

    pub fn set_sequence(&mut self, sequence: u64) {
        self.base_mut().sequence = sequence;
    }
}

impl Interface for Account {
    const NAME: &'static str = ACCOUNT_INTERFACE;

    fn type_tag(&self) -> &'static str {
        match self {
            Account::Base(_) => TAG_BASE_ACCOUNT,
            Account::App(_) => TAG_APP_ACCOUNT,
        }
    }

    fn encode_value(&self, format: Format) -> CodecResult<Vec<u8>> {
        match self {
            Account::Base(base) => format.encode(base),
            Account::App(app) => format.encode(app),
        }
    }

    fn decode_value(tag: &str, format: Format, bytes: &[u8]) -> CodecResult<Self> {
        match tag {
            TAG_BASE_ACCOUNT => Ok(Account::Base(format.decode(bytes)?)),
            TAG_APP_ACCOUNT => Ok(Account::App(format.decode(bytes)?)),
            other => Err(unknown_type::<Self>(other)),
        }
    }
}
