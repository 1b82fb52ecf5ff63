mod transaction;
mod user;
mod wallet;

pub use transaction::{Transaction, TransactionStatus, TransactionType};
pub use user::{KycStatus, User};
pub use wallet::{Wallet, WalletStatus, WalletType};
