use actix_web::{web, HttpResponse, Responder};
use log::error;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::blockchain::{Amount, Block, Blockchain, BlockchainError, MiningError, Transaction};

/// Data structure for the blockchain state
pub type BlockchainData = web::Data<Blockchain>;

/// Response for the chain endpoint
#[derive(Serialize, Deserialize, ToSchema)]
pub struct ChainResponse {
    /// The length of the chain
    pub length: usize,

    /// The blocks in the chain
    pub chain: Vec<Block>,

    /// Whether the chain is valid
    pub is_valid: bool,
}

/// Request for the transaction endpoint
#[derive(Serialize, Deserialize, ToSchema)]
pub struct TransactionRequest {
    /// The sender's identifier
    pub sender: String,

    /// The recipient's identifier
    pub recipient: String,

    /// The amount to transfer, as a decimal string with at most 2 places
    #[schema(example = "5.00")]
    pub amount: String,
}

/// Response for the transaction endpoint
#[derive(Serialize, Deserialize, ToSchema)]
pub struct TransactionResponse {
    /// The message
    pub message: String,

    /// The accepted transaction
    pub transaction: Transaction,

    /// The index of the block that will include this transaction
    pub block_index: u64,
}

/// Response for the mine endpoint
#[derive(Serialize, Deserialize, ToSchema)]
pub struct MineResponse {
    /// The message
    pub message: String,

    /// The newly mined block
    pub block: Block,
}

/// Balance of a single participant
#[derive(Serialize, Deserialize, ToSchema)]
pub struct BalanceResponse {
    pub participant: String,

    /// Balance in minor units
    #[schema(value_type = i64)]
    pub balance: Amount,

    /// Balance as a decimal string
    pub display: String,
}

impl BalanceResponse {
    fn new(participant: String, balance: Amount) -> Self {
        BalanceResponse {
            participant,
            display: balance.to_string(),
            balance,
        }
    }
}

fn error_body(message: String) -> serde_json::Value {
    serde_json::json!({ "error": message })
}

/// Maps a ledger error to its HTTP status
fn error_response(context: &str, err: BlockchainError) -> HttpResponse {
    let body = error_body(format!("{}: {}", context, err));
    match err {
        BlockchainError::TransactionError(_) => HttpResponse::BadRequest().json(body),
        BlockchainError::Halted | BlockchainError::IntegrityViolation(_) => {
            HttpResponse::Conflict().json(body)
        }
        BlockchainError::MiningError(MiningError::Cancelled)
        | BlockchainError::MiningError(MiningError::DeadlineExceeded) => {
            HttpResponse::ServiceUnavailable().json(body)
        }
        _ => HttpResponse::InternalServerError().json(body),
    }
}

/// Get the full blockchain
///
/// Returns the entire blockchain and its validity status. Unlike
/// `/validate`, an invalid chain does not halt the ledger here.
#[utoipa::path(
    get,
    path = "/api/v1/chain",
    responses(
        (status = 200, description = "Blockchain retrieved successfully", body = ChainResponse)
    )
)]
pub async fn get_chain(blockchain: BlockchainData) -> impl Responder {
    let chain = blockchain.get_chain();
    let is_valid = blockchain.is_chain_valid();

    let response = ChainResponse {
        length: chain.len(),
        chain,
        is_valid,
    };

    HttpResponse::Ok().json(response)
}

/// Get all pending transactions
///
/// Returns all transactions waiting to be included in a block
#[utoipa::path(
    get,
    path = "/api/v1/transactions/pending",
    responses(
        (status = 200, description = "Pending transactions retrieved successfully", body = Vec<Transaction>)
    )
)]
pub async fn get_pending_transactions(blockchain: BlockchainData) -> impl Responder {
    let transactions = blockchain.get_pending_transactions();
    HttpResponse::Ok().json(transactions)
}

/// Check that every pending transaction is still covered by balances
#[utoipa::path(
    get,
    path = "/api/v1/transactions/pending/verify",
    responses(
        (status = 200, description = "Pending transaction verification status", body = bool)
    )
)]
pub async fn verify_pending_transactions(blockchain: BlockchainData) -> impl Responder {
    HttpResponse::Ok().json(blockchain.verify_all_pending_transactions())
}

/// Create a new transaction
///
/// Adds a new transaction to the pending transactions
#[utoipa::path(
    post,
    path = "/api/v1/transactions/new",
    request_body = TransactionRequest,
    responses(
        (status = 201, description = "Transaction created successfully", body = TransactionResponse),
        (status = 400, description = "Invalid amount or insufficient funds"),
        (status = 409, description = "Ledger halted after a failed integrity check"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn new_transaction(
    blockchain: BlockchainData,
    transaction_req: web::Json<TransactionRequest>,
) -> impl Responder {
    let amount: Amount = match transaction_req.amount.parse() {
        Ok(amount) => amount,
        Err(err) => {
            return HttpResponse::BadRequest().json(error_body(format!(
                "Invalid amount {:?}: {}",
                transaction_req.amount, err
            )));
        }
    };

    match blockchain.submit_transaction(&transaction_req.recipient, &transaction_req.sender, amount)
    {
        Ok((transaction, block_index)) => {
            let response = TransactionResponse {
                message: "Transaction will be added to Block".to_string(),
                transaction,
                block_index,
            };

            HttpResponse::Created().json(response)
        }
        Err(err) => error_response("Failed to add transaction", err),
    }
}

/// Mine a new block
///
/// Creates a new block with all pending transactions and rewards the node owner
#[utoipa::path(
    post,
    path = "/api/v1/mine",
    responses(
        (status = 200, description = "Block mined successfully", body = MineResponse),
        (status = 409, description = "Ledger halted after a failed integrity check"),
        (status = 503, description = "Proof search cancelled or timed out"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn mine_block(blockchain: BlockchainData) -> impl Responder {
    let miner = blockchain.clone();

    // The proof search is CPU bound
    match web::block(move || miner.mine_block()).await {
        Ok(Ok(block)) => {
            let response = MineResponse {
                message: "New Block Mined".to_string(),
                block,
            };

            HttpResponse::Ok().json(response)
        }
        Ok(Err(err)) => error_response("Failed to mine block", err),
        Err(err) => {
            error!("Mining task failed: {}", err);
            HttpResponse::InternalServerError()
                .json(error_body(format!("Failed to mine block: {}", err)))
        }
    }
}

/// Check if the blockchain is valid
///
/// Validates the entire blockchain; a failure halts the ledger
#[utoipa::path(
    get,
    path = "/api/v1/validate",
    responses(
        (status = 200, description = "Blockchain validation status", body = bool)
    )
)]
pub async fn validate_chain(blockchain: BlockchainData) -> impl Responder {
    let is_valid = blockchain.verify_chain();
    HttpResponse::Ok().json(is_valid)
}

/// Get a participant's balance
///
/// Derived from committed and pending transactions
#[utoipa::path(
    get,
    path = "/api/v1/balance/{participant}",
    params(
        ("participant" = String, Path, description = "Participant identifier")
    ),
    responses(
        (status = 200, description = "Balance retrieved successfully", body = BalanceResponse),
        (status = 500, description = "Balance could not be derived")
    )
)]
pub async fn get_balance(
    blockchain: BlockchainData,
    participant: web::Path<String>,
) -> impl Responder {
    let participant = participant.into_inner();

    match blockchain.balance_of(&participant) {
        Ok(balance) => HttpResponse::Ok().json(BalanceResponse::new(participant, balance)),
        Err(err) => error_response("Failed to derive balance", err),
    }
}

/// Get all participants
///
/// Returns every identifier seen as sender or recipient, with its balance
#[utoipa::path(
    get,
    path = "/api/v1/participants",
    responses(
        (status = 200, description = "Participants retrieved successfully", body = Vec<BalanceResponse>),
        (status = 500, description = "A balance could not be derived")
    )
)]
pub async fn get_participants(blockchain: BlockchainData) -> impl Responder {
    let participants: Result<Vec<BalanceResponse>, BlockchainError> = blockchain
        .participants()
        .into_iter()
        .map(|participant| {
            let balance = blockchain.balance_of(&participant)?;
            Ok(BalanceResponse::new(participant, balance))
        })
        .collect();

    match participants {
        Ok(participants) => HttpResponse::Ok().json(participants),
        Err(err) => error_response("Failed to derive balances", err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::configure_routes;
    use crate::config::LedgerConfig;
    use actix_web::http::StatusCode;
    use actix_web::{test, App};

    fn test_blockchain() -> BlockchainData {
        web::Data::new(Blockchain::new(&LedgerConfig {
            difficulty: 1,
            ..LedgerConfig::default()
        }))
    }

    fn transfer(amount: &str) -> TransactionRequest {
        TransactionRequest {
            sender: "Max".to_string(),
            recipient: "Alice".to_string(),
            amount: amount.to_string(),
        }
    }

    #[actix_web::test]
    async fn test_get_chain_starts_at_genesis() {
        let app = test::init_service(
            App::new()
                .app_data(test_blockchain())
                .configure(configure_routes),
        )
        .await;

        let req = test::TestRequest::get().uri("/api/v1/chain").to_request();
        let resp: ChainResponse = test::call_and_read_body_json(&app, req).await;

        assert_eq!(resp.length, 1);
        assert!(resp.is_valid);
        assert_eq!(resp.chain[0].index, 0);
    }

    #[actix_web::test]
    async fn test_get_chain_reports_tampering_without_halting() {
        let blockchain = test_blockchain();
        blockchain.mine_block().unwrap();
        blockchain.mine_block().unwrap();
        blockchain.tamper(|blocks| {
            blocks[1].transactions[0].recipient = "Mallory".to_string();
        });
        let app = test::init_service(
            App::new()
                .app_data(blockchain.clone())
                .configure(configure_routes),
        )
        .await;

        let req = test::TestRequest::get().uri("/api/v1/chain").to_request();
        let resp: ChainResponse = test::call_and_read_body_json(&app, req).await;

        assert!(!resp.is_valid);
        assert!(!blockchain.is_halted());
    }

    #[actix_web::test]
    async fn test_transaction_flow() {
        let blockchain = test_blockchain();
        let app = test::init_service(
            App::new()
                .app_data(blockchain.clone())
                .configure(configure_routes),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/v1/transactions/new")
            .set_json(transfer("5.00"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let req = test::TestRequest::post().uri("/api/v1/mine").to_request();
        let mined: MineResponse = test::call_and_read_body_json(&app, req).await;
        assert_eq!(mined.block.index, 1);

        let req = test::TestRequest::post()
            .uri("/api/v1/transactions/new")
            .set_json(transfer("5.00"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        let accepted: TransactionResponse = test::read_body_json(resp).await;
        assert_eq!(accepted.block_index, 2);

        let req = test::TestRequest::get()
            .uri("/api/v1/transactions/pending/verify")
            .to_request();
        let verified: bool = test::call_and_read_body_json(&app, req).await;
        assert!(verified);

        let req = test::TestRequest::get()
            .uri("/api/v1/balance/Alice")
            .to_request();
        let balance: BalanceResponse = test::call_and_read_body_json(&app, req).await;
        assert_eq!(balance.balance, Amount::from_coins(5));
        assert_eq!(balance.display, "5.00");

        let req = test::TestRequest::get()
            .uri("/api/v1/participants")
            .to_request();
        let participants: Vec<BalanceResponse> = test::call_and_read_body_json(&app, req).await;
        let names: Vec<&str> = participants.iter().map(|p| p.participant.as_str()).collect();
        assert_eq!(names, vec!["Alice", "Max"]);
    }

    #[actix_web::test]
    async fn test_malformed_amount_is_rejected() {
        let blockchain = test_blockchain();
        let app = test::init_service(
            App::new()
                .app_data(blockchain.clone())
                .configure(configure_routes),
        )
        .await;

        for amount in ["five", "1.234"] {
            let req = test::TestRequest::post()
                .uri("/api/v1/transactions/new")
                .set_json(transfer(amount))
                .to_request();
            let resp = test::call_service(&app, req).await;
            assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        }
        assert!(blockchain.get_pending_transactions().is_empty());
    }

    #[actix_web::test]
    async fn test_validate_reports_valid_chain() {
        let app = test::init_service(
            App::new()
                .app_data(test_blockchain())
                .configure(configure_routes),
        )
        .await;

        let req = test::TestRequest::get().uri("/api/v1/validate").to_request();
        let valid: bool = test::call_and_read_body_json(&app, req).await;

        assert!(valid);
    }
}
