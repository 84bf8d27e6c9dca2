// printflow/src/order/mod.rs

pub mod item;
pub mod manifest;
pub mod pricing;

pub use item::{validate_items, OrderItem, OrderItemRequest, PrintType, PrinterRef};
pub use manifest::{build_order_notes, decode_manifest, Manifest};
pub use pricing::{aggregate, apply_quote, tiered_price, OrderQuote, PricingTable, TierRates};
