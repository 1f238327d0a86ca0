//! # Billbank Core
//!
//! Domain types shared by every layer: money in minor units, actors and their
//! credentials, accounts ("bills") and transfer transactions.
//!
//! Nothing here performs I/O. Persistence lives in `billbank-persistence`,
//! orchestration in `billbank-engine`.

pub mod account;
pub mod actor;
pub mod credential;
pub mod error;
pub mod locale;
pub mod money;
pub mod transaction;

pub use account::Account;
pub use actor::{Actor, Role};
pub use credential::{ActorCredential, PinCode};
pub use error::{CoreError, CoreResult};
pub use locale::Locale;
pub use money::Amount;
pub use transaction::{AuthorizationKey, Transaction, TransactionStatus};
