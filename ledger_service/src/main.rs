use axum::{routing::get, Json};
use dotenvy::dotenv;
use sqlx::postgres::PgPoolOptions;
use std::env;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::FmtSubscriber;
use utoipa::OpenApi;

use ledger_service::{
    api::http_routes::{routes, AppState},
    infrastructure::{
        events::outbox_publisher::OutboxEventPublisher,
        persistence::{
            transaction_repository::PostgresTransactionRepository, uow::PgUnitOfWork,
            user_repository::PostgresUserRepository, wallet_repository::PostgresWalletRepository,
        },
    },
    jobs::retry::RetryFailedTransactionsJob,
    use_cases::{
        backoff::RetryPolicy, cancel_transaction::CancelTransactionUseCase,
        create_transaction::CreateTransactionUseCase, create_user::CreateUserUseCase,
        create_wallet::CreateWalletUseCase, credit_wallet::CreditWalletUseCase,
        debit_wallet::DebitWalletUseCase, get_transaction::GetTransactionUseCase,
        get_user::GetUserUseCase, get_user_wallets::GetUserWalletsUseCase,
        get_wallet::GetWalletUseCase, get_wallet_history::GetWalletHistoryUseCase,
        list_transactions::ListTransactionsUseCase, list_users::ListUsersUseCase,
        list_wallets::ListWalletsUseCase, process_transaction::ProcessTransactionUseCase,
        retry_transaction::RetryTransactionUseCase, set_kyc_status::SetKycStatusUseCase,
        transfer::TransferUseCase, update_wallet_limits::UpdateWalletLimitsUseCase,
        update_wallet_status::UpdateWalletStatusUseCase,
    },
};

#[derive(OpenApi)]
#[openapi(
    paths(
        ledger_service::api::http_routes::create_user,
        ledger_service::api::http_routes::list_users,
        ledger_service::api::http_routes::get_user_details,
        ledger_service::api::http_routes::set_kyc_status,
        ledger_service::api::http_routes::create_wallet,
        ledger_service::api::http_routes::get_wallet_details,
        ledger_service::api::http_routes::list_user_wallets,
        ledger_service::api::http_routes::list_wallets,
        ledger_service::api::http_routes::update_wallet_status,
        ledger_service::api::http_routes::update_wallet_limits,
        ledger_service::api::http_routes::credit_wallet,
        ledger_service::api::http_routes::debit_wallet,
        ledger_service::api::http_routes::get_wallet_history,
        ledger_service::api::http_routes::get_pending_wallet_transactions,
        ledger_service::api::http_routes::initiate_transaction,
        ledger_service::api::http_routes::transfer_between_wallets,
        ledger_service::api::http_routes::list_transactions,
        ledger_service::api::http_routes::get_transaction_details,
        ledger_service::api::http_routes::process_transaction,
        ledger_service::api::http_routes::cancel_transaction,
        ledger_service::api::http_routes::retry_transaction
    ),
    components(schemas(
        ledger_service::api::dto::CreateUserRequest,
        ledger_service::api::dto::SetKycStatusRequest,
        ledger_service::api::dto::CreateWalletRequest,
        ledger_service::api::dto::UpdateWalletStatusRequest,
        ledger_service::api::dto::UpdateWalletLimitsRequest,
        ledger_service::api::dto::WalletOperationRequest,
        ledger_service::api::dto::CreateTransactionRequest,
        ledger_service::api::dto::TransferRequest,
        ledger_service::api::dto::ProcessTransactionRequest,
        ledger_service::api::dto::CancelTransactionRequest,
        ledger_service::api::dto::UserResponse,
        ledger_service::api::dto::WalletResponse,
        ledger_service::api::dto::TransactionResponse,
        ledger_service::api::dto::WalletOperationResponse,
        ledger_service::api::response::ApiResponse<serde_json::Value>
    ))
)]
struct ApiDoc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Cargar variables de entorno
    dotenv().ok();

    // 2. Configurar Logging/Tracing
    let subscriber = FmtSubscriber::builder()
        .with_max_level(tracing::Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    info!("Starting Ledger Service...");

    // 3. Configurar Conexión a Base de Datos
    let database_url = env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await?;

    info!("Connected to Database");

    // 4. Instanciar Dependencias (Infraestructura)
    let uow = Arc::new(PgUnitOfWork::new(pool.clone()));
    let user_repo = Arc::new(PostgresUserRepository::new());
    let wallet_repo = Arc::new(PostgresWalletRepository::new());
    let transaction_repo = Arc::new(PostgresTransactionRepository::new());
    let publisher = Arc::new(OutboxEventPublisher::new());

    // 5. Instanciar Casos de Uso
    let create_transaction_use_case = Arc::new(CreateTransactionUseCase::new(
        uow.clone(),
        wallet_repo.clone(),
        transaction_repo.clone(),
        publisher.clone(),
    ));
    let retry_transaction_use_case = Arc::new(RetryTransactionUseCase::new(
        uow.clone(),
        transaction_repo.clone(),
        publisher.clone(),
    ));

    // 6. Job de recuperación: reabre periódicamente transacciones FAILED
    //    con reintentos disponibles.
    let retry_job = RetryFailedTransactionsJob::new(
        uow.clone(),
        transaction_repo.clone(),
        retry_transaction_use_case.clone(),
    );
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(60));
        loop {
            interval.tick().await;
            retry_job.run().await;
        }
    });

    let app_state = Arc::new(AppState {
        create_user_use_case: CreateUserUseCase::new(
            uow.clone(),
            user_repo.clone(),
            publisher.clone(),
        ),
        set_kyc_status_use_case: SetKycStatusUseCase::new(
            uow.clone(),
            user_repo.clone(),
            publisher.clone(),
        ),
        list_users_use_case: ListUsersUseCase::new(uow.clone(), user_repo.clone()),
        get_user_use_case: GetUserUseCase::new(uow.clone(), user_repo.clone()),
        create_wallet_use_case: CreateWalletUseCase::new(
            uow.clone(),
            wallet_repo.clone(),
            user_repo.clone(),
            publisher.clone(),
        ),
        get_wallet_use_case: GetWalletUseCase::new(uow.clone(), wallet_repo.clone()),
        get_user_wallets_use_case: GetUserWalletsUseCase::new(uow.clone(), wallet_repo.clone()),
        list_wallets_use_case: ListWalletsUseCase::new(uow.clone(), wallet_repo.clone()),
        update_wallet_status_use_case: UpdateWalletStatusUseCase::new(
            uow.clone(),
            wallet_repo.clone(),
            publisher.clone(),
        ),
        update_wallet_limits_use_case: UpdateWalletLimitsUseCase::new(
            uow.clone(),
            wallet_repo.clone(),
        ),
        credit_wallet_use_case: CreditWalletUseCase::new(create_transaction_use_case.clone()),
        debit_wallet_use_case: DebitWalletUseCase::new(create_transaction_use_case.clone()),
        create_transaction_use_case: create_transaction_use_case.clone(),
        transfer_use_case: TransferUseCase::new(
            uow.clone(),
            wallet_repo.clone(),
            transaction_repo.clone(),
            publisher.clone(),
        ),
        process_transaction_use_case: ProcessTransactionUseCase::new(
            uow.clone(),
            wallet_repo.clone(),
            transaction_repo.clone(),
            publisher.clone(),
        ),
        cancel_transaction_use_case: CancelTransactionUseCase::new(
            uow.clone(),
            wallet_repo.clone(),
            transaction_repo.clone(),
            publisher.clone(),
        ),
        retry_transaction_use_case: retry_transaction_use_case.clone(),
        get_transaction_use_case: GetTransactionUseCase::new(
            uow.clone(),
            transaction_repo.clone(),
        ),
        get_wallet_history_use_case: GetWalletHistoryUseCase::new(
            uow.clone(),
            transaction_repo.clone(),
        ),
        list_transactions_use_case: ListTransactionsUseCase::new(
            uow.clone(),
            transaction_repo.clone(),
        ),
        retry_policy: RetryPolicy::recommended(),
    });

    // 7. Configurar Rutas y Servidor HTTP
    let app = routes(app_state).route(
        "/api-docs/openapi.json",
        get(|| async { Json(ApiDoc::openapi()) }),
    );

    let host = env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
    let port = env::var("PORT").unwrap_or_else(|_| "3000".to_string());
    let addr = format!("{}:{}", host, port);

    info!("HTTP Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
