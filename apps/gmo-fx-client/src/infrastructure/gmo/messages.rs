//! GMO FX Stream Message Types
//!
//! Typed views over inbound stream frames. Callbacks receive the raw
//! [`Frame`](crate::domain::streaming::Frame) and may decode it with
//! `Frame::parse::<T>()` into one of these.
//!
//! Fields the server omits for some message kinds are optional, so a view
//! decodes every variant of its channel.
//!
//! # Channels
//!
//! ## Public stream
//! - `ticker`: [`TickerMessage`]
//!
//! ## Private stream
//! - `executionEvents`: [`ExecutionEvent`]
//! - `orderEvents`: [`OrderEvent`]
//! - `positionEvents`: [`PositionEvent`]
//! - `positionSummaryEvents`: [`PositionSummaryEvent`]

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;

use super::api_types::{ExchangeStatus, ExecutionType, OrderStatus, OrderType, SettleType, Side};

// =============================================================================
// Public Stream
// =============================================================================

/// Latest ask/bid for one symbol.
///
/// # Wire Format (JSON)
/// ```json
/// {"symbol":"USD_JPY","ask":"137.644","bid":"137.632","timestamp":"2018-03-30T12:34:56.789671Z","status":"OPEN"}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TickerMessage {
    /// Channel name, when the server includes it.
    #[serde(default)]
    pub channel: Option<String>,
    /// Symbol.
    pub symbol: String,
    /// Ask price.
    pub ask: Decimal,
    /// Bid price.
    pub bid: Decimal,
    /// Quote time.
    pub timestamp: DateTime<Utc>,
    /// Symbol status.
    #[serde(default)]
    pub status: Option<ExchangeStatus>,
}

impl TickerMessage {
    /// Ask minus bid.
    #[must_use]
    pub fn spread(&self) -> Decimal {
        self.ask - self.bid
    }
}

// =============================================================================
// Private Stream
// =============================================================================

/// A fill on the account.
///
/// `msgType` is `ER` (execution report).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionEvent {
    /// Channel name.
    pub channel: String,
    /// Settlement amount.
    #[serde(default)]
    pub amount: Option<Decimal>,
    /// Root order id.
    #[serde(default)]
    pub root_order_id: Option<u64>,
    /// Caller-assigned id, if set.
    #[serde(default)]
    pub client_order_id: Option<String>,
    /// Order id.
    pub order_id: u64,
    /// Execution id.
    #[serde(default)]
    pub execution_id: Option<u64>,
    /// Symbol.
    pub symbol: String,
    /// Settlement type.
    #[serde(default)]
    pub settle_type: Option<SettleType>,
    /// Order kind.
    #[serde(default)]
    pub order_type: Option<OrderType>,
    /// Execution type.
    #[serde(default)]
    pub execution_type: Option<ExecutionType>,
    /// Side.
    pub side: Side,
    /// Fill price.
    #[serde(default)]
    pub execution_price: Option<Decimal>,
    /// Filled quantity.
    #[serde(default)]
    pub execution_size: Option<Decimal>,
    /// Position id.
    #[serde(default)]
    pub position_id: Option<u64>,
    /// Realized P/L.
    #[serde(default)]
    pub loss_gain: Option<Decimal>,
    /// Settled swap.
    #[serde(default)]
    pub settled_swap: Option<Decimal>,
    /// Fee.
    #[serde(default)]
    pub fee: Option<Decimal>,
    /// Order price.
    #[serde(default)]
    pub order_price: Option<Decimal>,
    /// Cumulative filled quantity of the order.
    #[serde(default)]
    pub order_executed_size: Option<Decimal>,
    /// Order quantity.
    #[serde(default)]
    pub order_size: Option<Decimal>,
    /// Message kind.
    #[serde(default)]
    pub msg_type: Option<String>,
    /// Order time.
    #[serde(default)]
    pub order_timestamp: Option<DateTime<Utc>>,
    /// Fill time.
    #[serde(default)]
    pub execution_timestamp: Option<DateTime<Utc>>,
}

/// An order state change.
///
/// `msgType` is one of `NOR` (new), `CHG` (changed), `CAN` (cancelled),
/// `EXP` (expired).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderEvent {
    /// Channel name.
    pub channel: String,
    /// Root order id.
    #[serde(default)]
    pub root_order_id: Option<u64>,
    /// Caller-assigned id, if set.
    #[serde(default)]
    pub client_order_id: Option<String>,
    /// Order id.
    pub order_id: u64,
    /// Symbol.
    pub symbol: String,
    /// Side.
    pub side: Side,
    /// Order kind.
    #[serde(default)]
    pub order_type: Option<OrderType>,
    /// Execution type.
    #[serde(default)]
    pub execution_type: Option<ExecutionType>,
    /// Settlement type.
    #[serde(default)]
    pub settle_type: Option<SettleType>,
    /// Quantity.
    #[serde(default)]
    pub size: Option<Decimal>,
    /// Price.
    #[serde(default)]
    pub price: Option<Decimal>,
    /// Status.
    #[serde(default, rename = "orderStatus", alias = "status")]
    pub status: Option<OrderStatus>,
    /// Cancellation reason.
    #[serde(default)]
    pub cancel_type: Option<String>,
    /// Expiry date (`YYYYMMDD`).
    #[serde(default)]
    pub expiry: Option<String>,
    /// Event time.
    #[serde(default, rename = "orderTimestamp", alias = "timestamp")]
    pub timestamp: Option<DateTime<Utc>>,
    /// Message kind.
    #[serde(default)]
    pub msg_type: Option<String>,
}

/// A position open, change, or close.
///
/// `msgType` is one of `OPR` (opened), `CPR` (closed), `UPR` (updated).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionEvent {
    /// Channel name.
    pub channel: String,
    /// Position id.
    pub position_id: u64,
    /// Symbol.
    pub symbol: String,
    /// Side.
    pub side: Side,
    /// Quantity.
    #[serde(default)]
    pub size: Option<Decimal>,
    /// Quantity tied up in pending close orders.
    #[serde(default)]
    pub ordered_size: Option<Decimal>,
    /// Open price.
    #[serde(default)]
    pub price: Option<Decimal>,
    /// Unrealized P/L.
    #[serde(default)]
    pub loss_gain: Option<Decimal>,
    /// Accrued swap.
    #[serde(default)]
    pub total_swap: Option<Decimal>,
    /// Event time.
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    /// Message kind.
    #[serde(default)]
    pub msg_type: Option<String>,
}

/// Aggregated position for one symbol and side.
///
/// `msgType` is `INIT` (snapshot on subscribe), `UPDATE`, or `PERIODIC`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionSummaryEvent {
    /// Channel name.
    pub channel: String,
    /// Symbol.
    pub symbol: String,
    /// Side.
    pub side: Side,
    /// Average open price.
    #[serde(default)]
    pub average_position_rate: Option<Decimal>,
    /// Unrealized P/L.
    #[serde(default)]
    pub position_loss_gain: Option<Decimal>,
    /// Quantity in pending close orders.
    #[serde(default)]
    pub sum_ordered_size: Option<Decimal>,
    /// Total quantity.
    #[serde(default)]
    pub sum_position_size: Option<Decimal>,
    /// Accrued swap.
    #[serde(default)]
    pub sum_total_swap: Option<Decimal>,
    /// Event time.
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    /// Message kind.
    #[serde(default)]
    pub msg_type: Option<String>,
}
