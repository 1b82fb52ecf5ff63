//! Arnés compartido de los tests de escenario: casos de uso reales cableados
//! sobre el backend en memoria, igual que `main.rs` los cablea sobre
//! PostgreSQL.

use std::sync::{Arc, Mutex};

use ledger_service::domain::entities::{Transaction, TransactionType, Wallet};
use ledger_service::domain::money::{Currency, Money};
use ledger_service::domain::types::{TransactionId, UserId, WalletId};
use ledger_service::domain::uow::UnitOfWork;
use ledger_service::infrastructure::memory::{
    MemoryEventPublisher, MemoryStore, MemoryTransactionRepository, MemoryUnitOfWork,
    MemoryUserRepository, MemoryWalletRepository,
};
use ledger_service::use_cases::cancel_transaction::CancelTransactionUseCase;
use ledger_service::use_cases::create_transaction::CreateTransactionUseCase;
use ledger_service::use_cases::create_user::{CreateUserCommand, CreateUserUseCase};
use ledger_service::use_cases::create_wallet::{CreateWalletCommand, CreateWalletUseCase};
use ledger_service::use_cases::credit_wallet::{CreditWalletCommand, CreditWalletUseCase};
use ledger_service::use_cases::debit_wallet::DebitWalletUseCase;
use ledger_service::use_cases::process_transaction::ProcessTransactionUseCase;
use ledger_service::use_cases::retry_transaction::RetryTransactionUseCase;
use ledger_service::use_cases::set_kyc_status::{SetKycStatusCommand, SetKycStatusUseCase};
use ledger_service::use_cases::transfer::TransferUseCase;

pub struct Harness {
    pub store: Arc<Mutex<MemoryStore>>,
    pub create_user: CreateUserUseCase,
    pub set_kyc_status: SetKycStatusUseCase,
    pub create_wallet: CreateWalletUseCase,
    pub credit_wallet: CreditWalletUseCase,
    pub debit_wallet: DebitWalletUseCase,
    pub create_transaction: Arc<CreateTransactionUseCase>,
    pub transfer: TransferUseCase,
    pub process_transaction: ProcessTransactionUseCase,
    pub cancel_transaction: CancelTransactionUseCase,
    pub retry_transaction: RetryTransactionUseCase,
}

impl Harness {
    pub fn new() -> Self {
        let memory_uow = MemoryUnitOfWork::new();
        let store = memory_uow.store();
        let uow: Arc<dyn UnitOfWork> = Arc::new(memory_uow);
        let user_repo = Arc::new(MemoryUserRepository::new());
        let wallet_repo = Arc::new(MemoryWalletRepository::new());
        let transaction_repo = Arc::new(MemoryTransactionRepository::new());
        let publisher = Arc::new(MemoryEventPublisher::new());

        let create_transaction = Arc::new(CreateTransactionUseCase::new(
            uow.clone(),
            wallet_repo.clone(),
            transaction_repo.clone(),
            publisher.clone(),
        ));

        Self {
            store,
            create_user: CreateUserUseCase::new(uow.clone(), user_repo.clone(), publisher.clone()),
            set_kyc_status: SetKycStatusUseCase::new(
                uow.clone(),
                user_repo.clone(),
                publisher.clone(),
            ),
            create_wallet: CreateWalletUseCase::new(
                uow.clone(),
                wallet_repo.clone(),
                user_repo.clone(),
                publisher.clone(),
            ),
            credit_wallet: CreditWalletUseCase::new(create_transaction.clone()),
            debit_wallet: DebitWalletUseCase::new(create_transaction.clone()),
            create_transaction: create_transaction.clone(),
            transfer: TransferUseCase::new(
                uow.clone(),
                wallet_repo.clone(),
                transaction_repo.clone(),
                publisher.clone(),
            ),
            process_transaction: ProcessTransactionUseCase::new(
                uow.clone(),
                wallet_repo.clone(),
                transaction_repo.clone(),
                publisher.clone(),
            ),
            cancel_transaction: CancelTransactionUseCase::new(
                uow.clone(),
                wallet_repo.clone(),
                transaction_repo.clone(),
                publisher.clone(),
            ),
            retry_transaction: RetryTransactionUseCase::new(
                uow,
                transaction_repo,
                publisher,
            ),
        }
    }

    /// Usuario con KYC aprobado, listo para emitir billeteras.
    pub async fn approved_user(&self, email: &str) -> UserId {
        let user = self
            .create_user
            .execute(CreateUserCommand {
                username: email.split('@').next().unwrap_or("user").to_string(),
                email: email.to_string(),
            })
            .await
            .expect("user creation should succeed");
        self.set_kyc_status
            .execute(SetKycStatusCommand {
                user_id: user.id().to_string(),
                approved: true,
                reason: None,
            })
            .await
            .expect("kyc approval should succeed");
        user.id()
    }

    /// Billetera del usuario con el saldo pedido, sembrado con un depósito
    /// real para que pase por el mismo camino que producción.
    pub async fn wallet_with_balance(
        &self,
        user_id: UserId,
        currency: &str,
        balance: &str,
    ) -> WalletId {
        let wallet = self
            .create_wallet
            .execute(CreateWalletCommand {
                user_id: user_id.to_string(),
                currency: currency.to_string(),
                daily_limit: None,
                monthly_limit: None,
            })
            .await
            .expect("wallet creation should succeed");

        let amount = Money::parse(balance, wallet.currency()).expect("valid seed balance");
        if amount.is_positive() {
            self.credit_wallet
                .execute(CreditWalletCommand {
                    wallet_id: wallet.id().to_string(),
                    amount: balance.to_string(),
                    idempotency_key: format!("seed-{}", wallet.id()),
                    description: "seed balance".to_string(),
                    external_reference: None,
                })
                .await
                .expect("seed credit should succeed");
        }
        wallet.id()
    }

    pub fn wallet(&self, id: WalletId) -> Wallet {
        self.store
            .lock()
            .unwrap()
            .wallets
            .get(&id)
            .cloned()
            .expect("wallet should exist in store")
    }

    pub fn transaction(&self, id: TransactionId) -> Transaction {
        self.store
            .lock()
            .unwrap()
            .transactions
            .get(&id)
            .cloned()
            .expect("transaction should exist in store")
    }

    pub fn event_count(&self) -> usize {
        self.store.lock().unwrap().events.len()
    }

    pub fn event_names_since(&self, mark: usize) -> Vec<String> {
        self.store.lock().unwrap().events[mark..]
            .iter()
            .map(|e| e.name().to_string())
            .collect()
    }

    /// Siembra el estado del flujo asíncrono: la billetera ya recibió el
    /// abono y la transacción quedó PENDING a la espera del veredicto
    /// externo.
    pub fn seed_pending_deposit(&self, wallet_id: WalletId, amount: &str) -> TransactionId {
        let mut store = self.store.lock().unwrap();
        let wallet = store
            .wallets
            .get_mut(&wallet_id)
            .expect("wallet should exist in store");
        let money = Money::parse(amount, wallet.currency()).expect("valid amount");
        wallet.credit(money).expect("seed credit should apply");

        let transaction = Transaction::new(
            wallet_id,
            format!("pending-{}", TransactionId::new()),
            TransactionType::Deposit,
            money,
            None,
            "async deposit".to_string(),
        )
        .expect("valid pending transaction");
        let id = transaction.id();
        store.transactions.insert(id, transaction);
        id
    }

    pub fn usd(&self, raw: &str) -> Money {
        Money::parse(raw, Currency::Usd).expect("valid usd amount")
    }
}
