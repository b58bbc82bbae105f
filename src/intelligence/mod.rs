pub mod recommender;
pub mod risk;
pub mod scorer;

pub use recommender::RecommendationEngine;
pub use risk::{
    impermanent_loss_pct, PortfolioRiskSummary, RiskAssessment, RiskCategory, RiskFactors,
    RiskModel, StressTestResults,
};
pub use scorer::{score_opportunity, OpportunityScore};
