use crate::types::{CostReport, TokenTotals};

const TOKENS_PER_MILLION: f64 = 1_000_000.0;

/// Per-million-token rates for one provider.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PricingModel {
    pub input_cost_per_million: f64,
    pub output_cost_per_million: f64,
}

impl PricingModel {
    pub const fn new(input_cost_per_million: f64, output_cost_per_million: f64) -> Self {
        Self {
            input_cost_per_million,
            output_cost_per_million,
        }
    }

    pub fn cost(&self, tokens: &TokenTotals) -> f64 {
        let input = tokens.input_tokens as f64 / TOKENS_PER_MILLION * self.input_cost_per_million;
        let output =
            tokens.output_tokens as f64 / TOKENS_PER_MILLION * self.output_cost_per_million;
        input + output
    }
}

/// The two price tables a report compares.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PricingTable {
    pub baseline: PricingModel,
    pub treated: PricingModel,
}

impl Default for PricingTable {
    fn default() -> Self {
        Self {
            baseline: PricingModel::new(10.0, 5.0),
            treated: PricingModel::new(1.5, 6.0),
        }
    }
}

pub fn compute_costs(tokens: &TokenTotals, pricing: &PricingTable) -> CostReport {
    let baseline_cost = pricing.baseline.cost(tokens);
    let treated_cost = pricing.treated.cost(tokens);
    CostReport {
        input_tokens: tokens.input_tokens,
        output_tokens: tokens.output_tokens,
        baseline_cost,
        treated_cost,
        saved: baseline_cost - treated_cost,
    }
}
