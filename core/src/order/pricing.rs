// printflow/src/order/pricing.rs

//! PricingEngine. Pure functions, no I/O.
//!
//! Pages are summed per colour class across the whole order and the tier is
//! applied once per class, so a ten-file order shares one discount boundary.

use crate::order::item::{OrderItem, PrintType};
use serde::{Deserialize, Serialize};

/// Price of `total_pages` under a two-tier rate: `base_rate` up to and
/// including `threshold_pages`, `remainder_rate` for every page beyond.
pub fn tiered_price(total_pages: u64, threshold_pages: u64, base_rate: u64, remainder_rate: u64) -> u64 {
  if total_pages == 0 {
    return 0;
  }
  if total_pages <= threshold_pages {
    return total_pages.saturating_mul(base_rate);
  }
  threshold_pages
    .saturating_mul(base_rate)
    .saturating_add((total_pages - threshold_pages).saturating_mul(remainder_rate))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TierRates {
  pub threshold_pages: u64,
  pub base_rate: u64,
  pub remainder_rate: u64,
}

impl TierRates {
  pub const fn new(threshold_pages: u64, base_rate: u64, remainder_rate: u64) -> Self {
    Self {
      threshold_pages,
      base_rate,
      remainder_rate,
    }
  }

  pub fn price(&self, total_pages: u64) -> u64 {
    tiered_price(total_pages, self.threshold_pages, self.base_rate, self.remainder_rate)
  }
}

/// Rates per colour class. Amounts are in major currency units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingTable {
  pub bw: TierRates,
  pub color: TierRates,
}

impl Default for PricingTable {
  fn default() -> Self {
    Self {
      bw: TierRates::new(2, 10, 2),
      color: TierRates::new(1, 20, 5),
    }
  }
}

impl PricingTable {
  pub fn rates_for(&self, print_type: PrintType) -> &TierRates {
    match print_type {
      PrintType::Bw => &self.bw,
      PrintType::Color => &self.color,
    }
  }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderQuote {
  pub bw_pages: u64,
  pub color_pages: u64,
  pub bw_price: u64,
  pub color_price: u64,
  pub total: u64,
  /// Per-item share of `total`, index-aligned with the input slice.
  pub item_prices: Vec<u64>,
}

/// Prices a validated order.
///
/// Each item is charged its marginal contribution to its class price: the
/// class price with the item's pages added minus the class price before it.
/// The per-item prices therefore always sum to `total`.
pub fn aggregate(items: &[OrderItem], table: &PricingTable) -> OrderQuote {
  let mut quote = OrderQuote {
    item_prices: Vec::with_capacity(items.len()),
    ..OrderQuote::default()
  };

  for item in items {
    let pages = item.billable_pages();
    let rates = table.rates_for(item.print_type);
    let running = match item.print_type {
      PrintType::Bw => &mut quote.bw_pages,
      PrintType::Color => &mut quote.color_pages,
    };
    let before = rates.price(*running);
    *running = running.saturating_add(pages);
    quote.item_prices.push(rates.price(*running) - before);
  }

  quote.bw_price = table.bw.price(quote.bw_pages);
  quote.color_price = table.color.price(quote.color_pages);
  quote.total = quote.bw_price.saturating_add(quote.color_price);
  quote
}

/// Writes the allocated prices back onto the items.
pub fn apply_quote(items: &mut [OrderItem], quote: &OrderQuote) {
  for (item, price) in items.iter_mut().zip(quote.item_prices.iter()) {
    item.calculated_price = *price;
  }
}
