pub mod asset;
pub mod execution;
pub mod opportunity;
pub mod portfolio;
pub mod rebalance;
pub mod recommendation;

pub use asset::{is_stable_symbol, volatility_class, Asset, AssetKey, VolatilityClass};
pub use execution::{
    ActionStatus, ActionUpdate, ExecutionReceipt, FailedAction, Operation, OperationKind,
    RebalancingResult, ReceiptStatus, StrandedFunds,
};
pub use opportunity::{ApySample, OpportunityKey, RiskLevel, StrategyCategory, YieldOpportunity};
pub use portfolio::{annual_yield_usd, weighted_apy, ChainFailure, PortfolioSnapshot};
pub use rebalance::{PortfolioRebalanceReport, RebalancingAction, RiskChange};
pub use recommendation::{
    OptimizationCriteria, OptimizationReport, Recommendation, RecommendationRisk,
};
