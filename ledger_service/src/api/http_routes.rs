use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::api::dto::{
    coerce_metadata, CancelTransactionRequest, CreateTransactionRequest,
    CreateTransactionResponse, CreateUserRequest, CreateWalletRequest, ListResponse,
    ListTransactionsParams, ListUsersParams, ListWalletsParams, ProcessTransactionRequest,
    SetKycStatusRequest, TransactionResponse, TransferRequest, TransferResponse,
    UpdateWalletLimitsRequest, UpdateWalletStatusRequest, UserResponse, UserWalletsParams,
    WalletOperationRequest, WalletOperationResponse, WalletResponse, DEFAULT_PAGE_LIMIT,
};
use crate::api::error::ApiError;
use crate::api::response::ApiResponse;
use crate::use_cases::backoff::RetryPolicy;
use crate::use_cases::cancel_transaction::{CancelTransactionCommand, CancelTransactionUseCase};
use crate::use_cases::create_transaction::{CreateTransactionCommand, CreateTransactionUseCase};
use crate::use_cases::create_user::{CreateUserCommand, CreateUserUseCase};
use crate::use_cases::create_wallet::{CreateWalletCommand, CreateWalletUseCase};
use crate::use_cases::credit_wallet::{CreditWalletCommand, CreditWalletUseCase};
use crate::use_cases::debit_wallet::{DebitWalletCommand, DebitWalletUseCase};
use crate::use_cases::get_transaction::GetTransactionUseCase;
use crate::use_cases::get_user::GetUserUseCase;
use crate::use_cases::get_user_wallets::GetUserWalletsUseCase;
use crate::use_cases::get_wallet::GetWalletUseCase;
use crate::use_cases::get_wallet_history::GetWalletHistoryUseCase;
use crate::use_cases::list_transactions::{ListTransactionsQuery, ListTransactionsUseCase};
use crate::use_cases::list_users::{ListUsersQuery, ListUsersUseCase};
use crate::use_cases::list_wallets::{ListWalletsQuery, ListWalletsUseCase};
use crate::use_cases::process_transaction::{
    ProcessTransactionCommand, ProcessTransactionUseCase,
};
use crate::use_cases::retry_transaction::{RetryTransactionCommand, RetryTransactionUseCase};
use crate::use_cases::set_kyc_status::{SetKycStatusCommand, SetKycStatusUseCase};
use crate::use_cases::transfer::{TransferCommand, TransferUseCase};
use crate::use_cases::update_wallet_limits::{
    UpdateWalletLimitsCommand, UpdateWalletLimitsUseCase,
};
use crate::use_cases::update_wallet_status::{
    UpdateWalletStatusCommand, UpdateWalletStatusUseCase,
};

// Estado compartido de la aplicación: un caso de uso por operación expuesta
// y la política de reintentos que envuelve toda escritura.
pub struct AppState {
    pub create_user_use_case: CreateUserUseCase,
    pub set_kyc_status_use_case: SetKycStatusUseCase,
    pub list_users_use_case: ListUsersUseCase,
    pub get_user_use_case: GetUserUseCase,
    pub create_wallet_use_case: CreateWalletUseCase,
    pub get_wallet_use_case: GetWalletUseCase,
    pub get_user_wallets_use_case: GetUserWalletsUseCase,
    pub list_wallets_use_case: ListWalletsUseCase,
    pub update_wallet_status_use_case: UpdateWalletStatusUseCase,
    pub update_wallet_limits_use_case: UpdateWalletLimitsUseCase,
    pub credit_wallet_use_case: CreditWalletUseCase,
    pub debit_wallet_use_case: DebitWalletUseCase,
    pub create_transaction_use_case: Arc<CreateTransactionUseCase>,
    pub transfer_use_case: TransferUseCase,
    pub process_transaction_use_case: ProcessTransactionUseCase,
    pub cancel_transaction_use_case: CancelTransactionUseCase,
    pub retry_transaction_use_case: Arc<RetryTransactionUseCase>,
    pub get_transaction_use_case: GetTransactionUseCase,
    pub get_wallet_history_use_case: GetWalletHistoryUseCase,
    pub list_transactions_use_case: ListTransactionsUseCase,
    pub retry_policy: RetryPolicy,
}

pub fn routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/users", post(create_user).get(list_users))
        .route("/users/{id}", get(get_user_details))
        .route("/users/{id}/kyc", post(set_kyc_status))
        .route("/users/{id}/wallets", get(list_user_wallets))
        .route("/wallets", post(create_wallet).get(list_wallets))
        .route("/wallets/{id}", get(get_wallet_details))
        .route("/wallets/{id}/status", post(update_wallet_status))
        .route("/wallets/{id}/limits", post(update_wallet_limits))
        .route("/wallets/{id}/credit", post(credit_wallet))
        .route("/wallets/{id}/debit", post(debit_wallet))
        .route("/wallets/{id}/transactions", get(get_wallet_history))
        .route(
            "/wallets/{id}/transactions/pending",
            get(get_pending_wallet_transactions),
        )
        .route(
            "/transactions",
            post(initiate_transaction).get(list_transactions),
        )
        .route("/transactions/transfer", post(transfer_between_wallets))
        .route("/transactions/{id}", get(get_transaction_details))
        .route("/transactions/{id}/process", post(process_transaction))
        .route("/transactions/{id}/cancel", post(cancel_transaction))
        .route("/transactions/{id}/retry", post(retry_transaction))
        .with_state(state) // Inyectamos el estado (Casos de Uso)
}

// Handler: Registrar un usuario
// POST /users
#[utoipa::path(
    post,
    path = "/users",
    request_body = CreateUserRequest,
    responses((status = 200, description = "Usuario creado"))
)]
pub async fn create_user(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateUserRequest>,
) -> Result<Json<ApiResponse<UserResponse>>, ApiError> {
    let cmd = CreateUserCommand {
        username: payload.username,
        email: payload.email,
    };
    let user = state
        .retry_policy
        .run(|| state.create_user_use_case.execute(cmd.clone()))
        .await?;
    Ok(Json(ApiResponse::success(UserResponse::from(&user))))
}

// Handler: Listar usuarios (paginado) o resolver por correo exacto
// GET /users
#[utoipa::path(
    get,
    path = "/users",
    params(ListUsersParams),
    responses((status = 200, description = "Página de usuarios"))
)]
pub async fn list_users(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListUsersParams>,
) -> Result<Json<ApiResponse<ListResponse<UserResponse>>>, ApiError> {
    if let Some(email) = &params.email {
        let user = state.get_user_use_case.by_email(email).await?;
        return Ok(Json(ApiResponse::success(ListResponse {
            items: vec![UserResponse::from(&user)],
            total_count: 1,
        })));
    }

    let page = state
        .list_users_use_case
        .execute(ListUsersQuery {
            offset: params.offset.unwrap_or(0),
            limit: params.limit.unwrap_or(DEFAULT_PAGE_LIMIT),
        })
        .await?;
    Ok(Json(ApiResponse::success(ListResponse {
        items: page.items.iter().map(UserResponse::from).collect(),
        total_count: page.total_count,
    })))
}

// Handler: Detalle de un usuario
// GET /users/{id}
#[utoipa::path(
    get,
    path = "/users/{id}",
    params(("id" = Uuid, Path, description = "Id del usuario")),
    responses((status = 200, description = "Detalle del usuario"))
)]
pub async fn get_user_details(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<UserResponse>>, ApiError> {
    let user = state.get_user_use_case.by_id(&id.to_string()).await?;
    Ok(Json(ApiResponse::success(UserResponse::from(&user))))
}

// Handler: Resolver el KYC de un usuario
// POST /users/{id}/kyc
#[utoipa::path(
    post,
    path = "/users/{id}/kyc",
    params(("id" = Uuid, Path, description = "Id del usuario")),
    request_body = SetKycStatusRequest,
    responses((status = 200, description = "KYC actualizado"))
)]
pub async fn set_kyc_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<SetKycStatusRequest>,
) -> Result<Json<ApiResponse<UserResponse>>, ApiError> {
    let cmd = SetKycStatusCommand {
        user_id: id.to_string(),
        approved: payload.approved,
        reason: payload.reason,
    };
    let user = state
        .retry_policy
        .run(|| state.set_kyc_status_use_case.execute(cmd.clone()))
        .await?;
    Ok(Json(ApiResponse::success(UserResponse::from(&user))))
}

// Handler: Emitir una billetera
// POST /wallets
#[utoipa::path(
    post,
    path = "/wallets",
    request_body = CreateWalletRequest,
    responses((status = 200, description = "Billetera creada"))
)]
pub async fn create_wallet(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateWalletRequest>,
) -> Result<Json<ApiResponse<WalletResponse>>, ApiError> {
    let cmd = CreateWalletCommand {
        user_id: payload.user_id.to_string(),
        currency: payload.currency,
        daily_limit: payload.daily_limit,
        monthly_limit: payload.monthly_limit,
    };
    let wallet = state
        .retry_policy
        .run(|| state.create_wallet_use_case.execute(cmd.clone()))
        .await?;
    Ok(Json(ApiResponse::success(WalletResponse::from_wallet(
        &wallet,
    )?)))
}

// Handler: Ver saldo y detalles de una billetera
// GET /wallets/{id}
#[utoipa::path(
    get,
    path = "/wallets/{id}",
    params(("id" = Uuid, Path, description = "Id de la billetera")),
    responses((status = 200, description = "Detalle de la billetera"))
)]
pub async fn get_wallet_details(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<WalletResponse>>, ApiError> {
    let wallet = state.get_wallet_use_case.execute(&id.to_string()).await?;
    Ok(Json(ApiResponse::success(WalletResponse::from_wallet(
        &wallet,
    )?)))
}

// Handler: Billeteras de un usuario (todas o la de una divisa concreta)
// GET /users/{id}/wallets
#[utoipa::path(
    get,
    path = "/users/{id}/wallets",
    params(("id" = Uuid, Path, description = "Id del usuario"), UserWalletsParams),
    responses((status = 200, description = "Billeteras del usuario"))
)]
pub async fn list_user_wallets(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Query(params): Query<UserWalletsParams>,
) -> Result<Json<ApiResponse<Vec<WalletResponse>>>, ApiError> {
    let wallets = match &params.currency {
        Some(currency) => vec![
            state
                .get_user_wallets_use_case
                .for_currency(&id.to_string(), currency)
                .await?,
        ],
        None => {
            state
                .get_user_wallets_use_case
                .execute(&id.to_string())
                .await?
        }
    };
    let body = wallets
        .iter()
        .map(WalletResponse::from_wallet)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Json(ApiResponse::success(body)))
}

// Handler: Listado filtrado de billeteras
// GET /wallets
#[utoipa::path(
    get,
    path = "/wallets",
    params(ListWalletsParams),
    responses((status = 200, description = "Página de billeteras"))
)]
pub async fn list_wallets(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListWalletsParams>,
) -> Result<Json<ApiResponse<ListResponse<WalletResponse>>>, ApiError> {
    let page = state
        .list_wallets_use_case
        .execute(ListWalletsQuery {
            user_id: params.user_id.map(|id| id.to_string()),
            currency: params.currency,
            status: params.status,
            offset: params.offset.unwrap_or(0),
            limit: params.limit.unwrap_or(DEFAULT_PAGE_LIMIT),
        })
        .await?;
    let items = page
        .items
        .iter()
        .map(WalletResponse::from_wallet)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Json(ApiResponse::success(ListResponse {
        items,
        total_count: page.total_count,
    })))
}

// Handler: Administrar estado de una billetera
// POST /wallets/{id}/status
#[utoipa::path(
    post,
    path = "/wallets/{id}/status",
    params(("id" = Uuid, Path, description = "Id de la billetera")),
    request_body = UpdateWalletStatusRequest,
    responses((status = 200, description = "Estado actualizado"))
)]
pub async fn update_wallet_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateWalletStatusRequest>,
) -> Result<Json<ApiResponse<WalletResponse>>, ApiError> {
    let cmd = UpdateWalletStatusCommand {
        wallet_id: id.to_string(),
        status: payload.status,
        reason: payload.reason,
    };
    let wallet = state
        .retry_policy
        .run(|| state.update_wallet_status_use_case.execute(cmd.clone()))
        .await?;
    Ok(Json(ApiResponse::success(WalletResponse::from_wallet(
        &wallet,
    )?)))
}

// Handler: Actualizar límites de una billetera
// POST /wallets/{id}/limits
#[utoipa::path(
    post,
    path = "/wallets/{id}/limits",
    params(("id" = Uuid, Path, description = "Id de la billetera")),
    request_body = UpdateWalletLimitsRequest,
    responses((status = 200, description = "Límites actualizados"))
)]
pub async fn update_wallet_limits(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateWalletLimitsRequest>,
) -> Result<Json<ApiResponse<WalletResponse>>, ApiError> {
    let cmd = UpdateWalletLimitsCommand {
        wallet_id: id.to_string(),
        daily_limit: payload.daily_limit,
        monthly_limit: payload.monthly_limit,
    };
    let wallet = state
        .retry_policy
        .run(|| state.update_wallet_limits_use_case.execute(cmd.clone()))
        .await?;
    Ok(Json(ApiResponse::success(WalletResponse::from_wallet(
        &wallet,
    )?)))
}

// Handler: Abonar a una billetera
// POST /wallets/{id}/credit
#[utoipa::path(
    post,
    path = "/wallets/{id}/credit",
    params(("id" = Uuid, Path, description = "Id de la billetera")),
    request_body = WalletOperationRequest,
    responses((status = 200, description = "Billetera abonada"))
)]
pub async fn credit_wallet(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<WalletOperationRequest>,
) -> Result<Json<ApiResponse<WalletOperationResponse>>, ApiError> {
    let cmd = CreditWalletCommand {
        wallet_id: id.to_string(),
        amount: payload.amount,
        idempotency_key: payload.idempotency_key,
        description: payload.description,
        external_reference: payload.external_reference,
    };
    let result = state
        .retry_policy
        .run(|| state.credit_wallet_use_case.execute(cmd.clone()))
        .await?;
    Ok(Json(ApiResponse::success(
        WalletOperationResponse::from_credit(&result)?,
    )))
}

// Handler: Cargar contra una billetera
// POST /wallets/{id}/debit
#[utoipa::path(
    post,
    path = "/wallets/{id}/debit",
    params(("id" = Uuid, Path, description = "Id de la billetera")),
    request_body = WalletOperationRequest,
    responses((status = 200, description = "Billetera cargada"))
)]
pub async fn debit_wallet(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<WalletOperationRequest>,
) -> Result<Json<ApiResponse<WalletOperationResponse>>, ApiError> {
    let cmd = DebitWalletCommand {
        wallet_id: id.to_string(),
        amount: payload.amount,
        idempotency_key: payload.idempotency_key,
        description: payload.description,
        external_reference: payload.external_reference,
    };
    let result = state
        .retry_policy
        .run(|| state.debit_wallet_use_case.execute(cmd.clone()))
        .await?;
    Ok(Json(ApiResponse::success(
        WalletOperationResponse::from_debit(&result)?,
    )))
}

// Handler: Historial de movimientos de una billetera
// GET /wallets/{id}/transactions
#[utoipa::path(
    get,
    path = "/wallets/{id}/transactions",
    params(("id" = Uuid, Path, description = "Id de la billetera")),
    responses((status = 200, description = "Historial de la billetera"))
)]
pub async fn get_wallet_history(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Vec<TransactionResponse>>>, ApiError> {
    let transactions = state
        .get_wallet_history_use_case
        .execute(&id.to_string())
        .await?;
    let body: Vec<TransactionResponse> =
        transactions.iter().map(TransactionResponse::from).collect();
    Ok(Json(ApiResponse::success(body)))
}

// Handler: Movimientos PENDING de una billetera
// GET /wallets/{id}/transactions/pending
#[utoipa::path(
    get,
    path = "/wallets/{id}/transactions/pending",
    params(("id" = Uuid, Path, description = "Id de la billetera")),
    responses((status = 200, description = "Movimientos pendientes"))
)]
pub async fn get_pending_wallet_transactions(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Vec<TransactionResponse>>>, ApiError> {
    let transactions = state
        .get_wallet_history_use_case
        .pending(&id.to_string())
        .await?;
    let body: Vec<TransactionResponse> =
        transactions.iter().map(TransactionResponse::from).collect();
    Ok(Json(ApiResponse::success(body)))
}

// Handler: Crear una transacción de efecto directo
// POST /transactions
#[utoipa::path(
    post,
    path = "/transactions",
    request_body = CreateTransactionRequest,
    responses((status = 200, description = "Transacción completada"))
)]
pub async fn initiate_transaction(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateTransactionRequest>,
) -> Result<Json<ApiResponse<CreateTransactionResponse>>, ApiError> {
    let cmd = CreateTransactionCommand {
        wallet_id: payload.wallet_id.to_string(),
        idempotency_key: payload.idempotency_key,
        transaction_type: payload.transaction_type,
        amount: payload.amount,
        destination_wallet_id: payload.destination_wallet_id.map(|id| id.to_string()),
        description: payload.description,
        external_reference: payload.external_reference,
        metadata: coerce_metadata(payload.metadata),
    };
    let result = state
        .retry_policy
        .run(|| state.create_transaction_use_case.execute(cmd.clone()))
        .await?;
    Ok(Json(ApiResponse::success(
        CreateTransactionResponse::from_result(&result)?,
    )))
}

// Handler: Transferir entre billeteras
// POST /transactions/transfer
#[utoipa::path(
    post,
    path = "/transactions/transfer",
    request_body = TransferRequest,
    responses((status = 200, description = "Transferencia completada"))
)]
pub async fn transfer_between_wallets(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<TransferRequest>,
) -> Result<Json<ApiResponse<TransferResponse>>, ApiError> {
    let cmd = TransferCommand {
        source_wallet_id: payload.source_wallet_id.to_string(),
        destination_wallet_id: payload.destination_wallet_id.to_string(),
        amount: payload.amount,
        idempotency_key: payload.idempotency_key,
        description: payload.description,
        external_reference: payload.external_reference,
        metadata: coerce_metadata(payload.metadata),
    };
    let result = state
        .retry_policy
        .run(|| state.transfer_use_case.execute(cmd.clone()))
        .await?;
    Ok(Json(ApiResponse::success(TransferResponse::from_result(
        &result,
    )?)))
}

// Handler: Listado filtrado de transacciones
// GET /transactions
#[utoipa::path(
    get,
    path = "/transactions",
    params(ListTransactionsParams),
    responses((status = 200, description = "Página de transacciones"))
)]
pub async fn list_transactions(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListTransactionsParams>,
) -> Result<Json<ApiResponse<ListResponse<TransactionResponse>>>, ApiError> {
    let page = state
        .list_transactions_use_case
        .execute(ListTransactionsQuery {
            wallet_id: params.wallet_id.map(|id| id.to_string()),
            status: params.status,
            transaction_type: params.transaction_type,
            offset: params.offset.unwrap_or(0),
            limit: params.limit.unwrap_or(DEFAULT_PAGE_LIMIT),
        })
        .await?;
    Ok(Json(ApiResponse::success(ListResponse {
        items: page.items.iter().map(TransactionResponse::from).collect(),
        total_count: page.total_count,
    })))
}

// Handler: Ver detalle de una transacción
// GET /transactions/{id}
#[utoipa::path(
    get,
    path = "/transactions/{id}",
    params(("id" = Uuid, Path, description = "Id de la transacción")),
    responses((status = 200, description = "Detalle de la transacción"))
)]
pub async fn get_transaction_details(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<TransactionResponse>>, ApiError> {
    let transaction = state
        .get_transaction_use_case
        .execute(&id.to_string())
        .await?;
    Ok(Json(ApiResponse::success(TransactionResponse::from(
        &transaction,
    ))))
}

// Handler: Resolver una transacción con el veredicto externo
// POST /transactions/{id}/process
#[utoipa::path(
    post,
    path = "/transactions/{id}/process",
    params(("id" = Uuid, Path, description = "Id de la transacción")),
    request_body = ProcessTransactionRequest,
    responses((status = 200, description = "Transacción resuelta"))
)]
pub async fn process_transaction(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ProcessTransactionRequest>,
) -> Result<Json<ApiResponse<TransactionResponse>>, ApiError> {
    let cmd = ProcessTransactionCommand {
        transaction_id: id.to_string(),
        success: payload.success,
        failure_reason: payload.failure_reason,
    };
    let transaction = state
        .retry_policy
        .run(|| state.process_transaction_use_case.execute(cmd.clone()))
        .await?;
    Ok(Json(ApiResponse::success(TransactionResponse::from(
        &transaction,
    ))))
}

// Handler: Cancelar una transacción abierta
// POST /transactions/{id}/cancel
#[utoipa::path(
    post,
    path = "/transactions/{id}/cancel",
    params(("id" = Uuid, Path, description = "Id de la transacción")),
    request_body = CancelTransactionRequest,
    responses((status = 200, description = "Transacción cancelada"))
)]
pub async fn cancel_transaction(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<CancelTransactionRequest>,
) -> Result<Json<ApiResponse<TransactionResponse>>, ApiError> {
    let cmd = CancelTransactionCommand {
        transaction_id: id.to_string(),
        reason: payload.reason,
    };
    let transaction = state
        .retry_policy
        .run(|| state.cancel_transaction_use_case.execute(cmd.clone()))
        .await?;
    Ok(Json(ApiResponse::success(TransactionResponse::from(
        &transaction,
    ))))
}

// Handler: Reintentar una transacción fallida
// POST /transactions/{id}/retry
#[utoipa::path(
    post,
    path = "/transactions/{id}/retry",
    params(("id" = Uuid, Path, description = "Id de la transacción")),
    responses((status = 200, description = "Transacción reabierta"))
)]
pub async fn retry_transaction(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<TransactionResponse>>, ApiError> {
    let cmd = RetryTransactionCommand {
        transaction_id: id.to_string(),
    };
    let transaction = state
        .retry_policy
        .run(|| state.retry_transaction_use_case.execute(cmd.clone()))
        .await?;
    Ok(Json(ApiResponse::success(TransactionResponse::from(
        &transaction,
    ))))
}
