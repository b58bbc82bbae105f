pub mod bridge;
pub mod cost;
pub mod orchestrator;
pub mod receipts;
pub mod signer;

pub use bridge::{select_bridge, BridgeError, BridgeOption, BridgeQuote, BridgeRouter, StaticBridgeRouter};
pub use cost::{decompose, estimate_cost, ActionCost, CostEstimate, PlannedOperation};
pub use orchestrator::{ExecutionOrchestrator, ProgressCallback};
pub use receipts::ReceiptLog;
pub use signer::{DryRunSigner, SignerError, TransactionSigner};
