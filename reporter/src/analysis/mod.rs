pub mod correlation;
pub mod group_comparison;
pub mod projection;
pub mod roc;
