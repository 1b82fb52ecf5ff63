pub mod models;
pub mod transaction_repository;
pub mod uow;
pub mod user_repository;
pub mod wallet_repository;
