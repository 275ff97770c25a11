use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{non_blank, ValidationErrors};
use crate::analytics::math::round_to;
use crate::storage::{Quote, QuoteLineItem, QuoteStage};

/// One requested quote line.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QuoteLineInput {
    /// Product name.
    pub product: Option<String>,
    /// Units quoted.
    pub quantity: Option<f64>,
    /// Price per unit.
    pub unit_price: Option<f64>,
}

/// Fields accepted when creating a quote.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QuoteInput {
    /// Quote title.
    pub name: Option<String>,
    /// Opportunity being quoted.
    pub opportunity_id: Option<String>,
    /// Defaults to `Draft`.
    pub stage: Option<String>,
    /// Quoted lines.
    #[serde(default)]
    pub line_items: Vec<QuoteLineInput>,
    /// 0-100, defaults to 0.
    pub discount_percent: Option<f64>,
    /// Last day the quote holds.
    pub valid_until: Option<NaiveDate>,
}

/// A quote input that passed validation.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidQuote {
    /// Quote title.
    pub name: String,
    /// Opportunity being quoted.
    pub opportunity_id: Option<String>,
    /// Quote stage.
    pub stage: QuoteStage,
    /// Quoted lines.
    pub line_items: Vec<QuoteLineItem>,
    /// Discount on the subtotal, 0-100.
    pub discount_percent: f64,
    /// Last day the quote holds.
    pub valid_until: Option<NaiveDate>,
}

impl QuoteInput {
    /// Check every field, collecting all violations.
    pub fn validate(self) -> Result<ValidQuote, ValidationErrors> {
        let mut errors = ValidationErrors::new();

        let name = errors.require("name", self.name);
        let stage = errors
            .label("stage", self.stage.as_deref(), &QuoteStage::labels())
            .unwrap_or(QuoteStage::Draft);
        let discount_percent = self.discount_percent.unwrap_or(0.0);
        errors.range("discount_percent", discount_percent, 0.0, 100.0);

        if self.line_items.is_empty() {
            errors.add("line_items", "must contain at least one line");
        }
        let mut line_items = Vec::with_capacity(self.line_items.len());
        for (idx, line) in self.line_items.into_iter().enumerate() {
            let field = |name: &str| format!("line_items[{}].{}", idx, name);

            let product = errors.require(&field("product"), line.product);
            let quantity = line.quantity.unwrap_or(1.0);
            if quantity.is_nan() || quantity <= 0.0 {
                errors.add(field("quantity"), "must be greater than 0");
            }
            let unit_price = match line.unit_price {
                Some(price) => {
                    errors.non_negative(&field("unit_price"), price);
                    price
                }
                None => {
                    errors.add(field("unit_price"), "is required");
                    0.0
                }
            };
            if let Some(product) = product {
                line_items.push(QuoteLineItem {
                    product,
                    quantity,
                    unit_price,
                });
            }
        }

        let valid = name.map(|name| ValidQuote {
            name,
            opportunity_id: non_blank(self.opportunity_id),
            stage,
            line_items,
            discount_percent,
            valid_until: self.valid_until,
        });
        errors.finish(valid)
    }
}

impl ValidQuote {
    /// Σ quantity × unit price, before discount.
    pub fn subtotal(&self) -> f64 {
        self.line_items.iter().map(QuoteLineItem::line_total).sum()
    }

    /// Subtotal less the discount, two decimals.
    pub fn total(&self) -> f64 {
        round_to(self.subtotal() * (1.0 - self.discount_percent / 100.0), 2)
    }

    /// Build the stored record, stamped at `now`.
    pub fn into_record(self, now: DateTime<Utc>) -> Quote {
        let subtotal = round_to(self.subtotal(), 2);
        let total = self.total();
        Quote {
            id: Uuid::new_v4().to_string(),
            name: self.name,
            opportunity_id: self.opportunity_id,
            stage: self.stage,
            line_items: self.line_items,
            subtotal,
            discount_percent: self.discount_percent,
            total,
            valid_until: self.valid_until,
            created_at: now,
        }
    }
}
