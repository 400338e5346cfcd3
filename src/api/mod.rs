// API module
//
// HTTP surface over the ledger, plus its OpenAPI description

pub mod handlers;
pub mod routes;

use utoipa::OpenApi;

use crate::blockchain::{Block, Transaction};

// Re-export main components for easier access
pub use routes::configure_routes;

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::get_chain,
        handlers::get_pending_transactions,
        handlers::verify_pending_transactions,
        handlers::new_transaction,
        handlers::mine_block,
        handlers::validate_chain,
        handlers::get_balance,
        handlers::get_participants
    ),
    components(
        schemas(
            Block,
            Transaction,
            handlers::ChainResponse,
            handlers::TransactionRequest,
            handlers::TransactionResponse,
            handlers::MineResponse,
            handlers::BalanceResponse
        )
    ),
    tags(
        (name = "ledger", description = "Proof-of-work ledger endpoints")
    ),
    info(
        title = "Proof-of-work Ledger API",
        version = "0.1.0",
        description = "Propose transfers, mine blocks and audit the chain",
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_lists_every_route() {
        let doc = ApiDoc::openapi();
        let paths: Vec<&String> = doc.paths.paths.keys().collect();

        assert!(paths.iter().any(|p| p.as_str() == "/api/v1/balance/{participant}"));
        assert!(paths.iter().any(|p| p.as_str() == "/api/v1/transactions/pending/verify"));
        assert_eq!(paths.len(), 8);
    }
}
