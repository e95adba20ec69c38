//! Static per-provider model pricing and cost estimation
//!
//! Each vendor publishes prices in its own unit (OpenAI per thousand tokens,
//! Anthropic and Google per million), so a table carries its unit alongside
//! the entries. Lookup is substring containment over the entries in declared
//! order, first match wins. More specific keys are therefore listed before
//! their prefixes: "gpt-4o-mini" before "gpt-4o" before "gpt-4".

/// Price of one model family, in USD per table unit
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelPricing {
    pub input: f64,
    pub output: f64,
}

/// An ordered, read-only price table
#[derive(Debug)]
pub struct PriceTable {
    /// Number of tokens one price unit covers
    pub tokens_per_unit: f64,
    pub entries: &'static [(&'static str, ModelPricing)],
}

impl PriceTable {
    /// First entry whose key is contained in `model`
    pub fn lookup(&self, model: &str) -> Option<&'static ModelPricing> {
        self.entries
            .iter()
            .find(|(key, _)| model.contains(key))
            .map(|(_, pricing)| pricing)
    }

    /// Estimate cost in USD; zero for models missing from the table
    pub fn estimate_cost(&self, model: &str, prompt_tokens: u32, completion_tokens: u32) -> f64 {
        let Some(pricing) = self.lookup(model) else {
            return 0.0;
        };
        let input_cost = (f64::from(prompt_tokens) / self.tokens_per_unit) * pricing.input;
        let output_cost = (f64::from(completion_tokens) / self.tokens_per_unit) * pricing.output;
        input_cost + output_cost
    }
}

const fn price(input: f64, output: f64) -> ModelPricing {
    ModelPricing { input, output }
}

/// OpenAI, USD per 1K tokens
pub static OPENAI_PRICING: PriceTable = PriceTable {
    tokens_per_unit: 1_000.0,
    entries: &[
        ("gpt-4o-mini", price(0.00015, 0.0006)),
        ("gpt-4o", price(0.005, 0.015)),
        ("gpt-4-turbo", price(0.01, 0.03)),
        ("gpt-4", price(0.03, 0.06)),
        ("gpt-3.5-turbo", price(0.0005, 0.0015)),
    ],
};

/// Anthropic, USD per 1M tokens
pub static ANTHROPIC_PRICING: PriceTable = PriceTable {
    tokens_per_unit: 1_000_000.0,
    entries: &[
        ("claude-3-5-sonnet", price(3.00, 15.00)),
        ("claude-3-opus", price(15.00, 75.00)),
        ("claude-3-sonnet", price(3.00, 15.00)),
        ("claude-3-haiku", price(0.25, 1.25)),
    ],
};

/// Google Gemini, USD per 1M tokens
pub static GEMINI_PRICING: PriceTable = PriceTable {
    tokens_per_unit: 1_000_000.0,
    entries: &[
        ("gemini-1.5-flash", price(0.35, 1.05)),
        ("gemini-1.5-pro", price(3.50, 10.50)),
        // Legacy
        ("gemini-pro", price(0.50, 1.50)),
    ],
};
