//! GMO FX REST API request and response types.
//!
//! Requests carry their own parameter rules. `RequestBody::prepare` checks
//! them and drops fields that do not apply to the chosen order type, before
//! anything is signed or sent.

use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::error::ValidationError;

// =============================================================================
// Enums
// =============================================================================

/// Order side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    /// Buy.
    Buy,
    /// Sell.
    Sell,
}

/// Order execution type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ExecutionType {
    /// Market order.
    Market,
    /// Limit order.
    Limit,
    /// Stop order.
    Stop,
    /// One-cancels-other (limit and stop).
    Oco,
}

impl ExecutionType {
    /// Whether a limit price is required.
    #[must_use]
    pub const fn needs_limit_price(self) -> bool {
        matches!(self, Self::Limit | Self::Oco)
    }

    /// Whether a stop price is required.
    #[must_use]
    pub const fn needs_stop_price(self) -> bool {
        matches!(self, Self::Stop | Self::Oco)
    }
}

/// Settlement type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SettleType {
    /// Opens a position.
    Open,
    /// Closes a position.
    Close,
}

/// Order kind as reported by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderType {
    /// Single order.
    Normal,
    /// OCO pair.
    Oco,
    /// If-done pair.
    Ifd,
    /// If-done + OCO.
    Ifdoco,
    /// Forced liquidation.
    Losscut,
}

/// Order status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderStatus {
    /// Waiting for activation.
    Waiting,
    /// Resting on the book.
    Ordered,
    /// Change in progress.
    Modifying,
    /// Cancelled.
    Canceled,
    /// Filled.
    Executed,
    /// Expired.
    Expired,
}

/// Service status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ExchangeStatus {
    /// Trading.
    Open,
    /// Market closed.
    Close,
    /// Under maintenance.
    Maintenance,
}

/// Which side of the quote a kline is built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PriceType {
    /// Bid prices.
    Bid,
    /// Ask prices.
    Ask,
}

impl PriceType {
    /// Wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Bid => "BID",
            Self::Ask => "ASK",
        }
    }
}

/// Kline interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KlineInterval {
    /// 1 minute.
    Min1,
    /// 5 minutes.
    Min5,
    /// 10 minutes.
    Min10,
    /// 15 minutes.
    Min15,
    /// 30 minutes.
    Min30,
    /// 1 hour.
    Hour1,
    /// 4 hours.
    Hour4,
    /// 8 hours.
    Hour8,
    /// 12 hours.
    Hour12,
    /// 1 day.
    Day1,
    /// 1 week.
    Week1,
    /// 1 month.
    Month1,
}

impl KlineInterval {
    /// Wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Min1 => "1min",
            Self::Min5 => "5min",
            Self::Min10 => "10min",
            Self::Min15 => "15min",
            Self::Min30 => "30min",
            Self::Hour1 => "1hour",
            Self::Hour4 => "4hour",
            Self::Hour8 => "8hour",
            Self::Hour12 => "12hour",
            Self::Day1 => "1day",
            Self::Week1 => "1week",
            Self::Month1 => "1month",
        }
    }

    /// Whether the `date` parameter is a year (`YYYY`) rather than a day (`YYYYMMDD`).
    #[must_use]
    pub const fn uses_year_date(self) -> bool {
        !matches!(
            self,
            Self::Min1 | Self::Min5 | Self::Min10 | Self::Min15 | Self::Min30 | Self::Hour1
        )
    }
}

// =============================================================================
// Request Plumbing
// =============================================================================

/// A JSON request body with local parameter rules.
pub trait RequestBody: Serialize + Sized {
    /// Check parameter rules and drop fields that do not apply.
    fn prepare(self) -> Result<Self, ValidationError> {
        Ok(self)
    }
}

fn exactly_one(
    names: &'static [&'static str; 2],
    first: bool,
    second: bool,
) -> Result<(), ValidationError> {
    let [a, b] = *names;
    match (first, second) {
        (true, true) => Err(ValidationError::MutuallyExclusive {
            first: a,
            second: b,
        }),
        (false, false) => Err(ValidationError::MissingOneOf(names)),
        _ => Ok(()),
    }
}

/// Price fields shared by `order` and `closeOrder`.
fn check_prices(
    execution_type: ExecutionType,
    side: Side,
    limit_price: &mut Option<Decimal>,
    stop_price: &mut Option<Decimal>,
    lower_bound: &mut Option<Decimal>,
    upper_bound: &mut Option<Decimal>,
) -> Result<(), ValidationError> {
    if execution_type.needs_limit_price() {
        if limit_price.is_none() {
            return Err(ValidationError::MissingField {
                field: "limitPrice",
                condition: "executionType is LIMIT or OCO",
            });
        }
    } else {
        *limit_price = None;
    }

    if execution_type.needs_stop_price() {
        if stop_price.is_none() {
            return Err(ValidationError::MissingField {
                field: "stopPrice",
                condition: "executionType is STOP or OCO",
            });
        }
    } else {
        *stop_price = None;
    }

    // Bounds only apply to market orders, lower for SELL and upper for BUY.
    let market = execution_type == ExecutionType::Market;
    if !(market && side == Side::Sell) {
        *lower_bound = None;
    }
    if !(market && side == Side::Buy) {
        *upper_bound = None;
    }
    Ok(())
}

fn join_ids<T: ToString>(ids: &[T]) -> String {
    ids.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

// =============================================================================
// Query Parameters
// =============================================================================

/// Parameters for `GET /v1/orders`. Exactly one of the id lists must be set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrdersQuery {
    /// Order ids (up to 10).
    pub order_ids: Vec<u64>,
    /// Root order ids (up to 10).
    pub root_order_ids: Vec<u64>,
}

impl OrdersQuery {
    /// Validate and render query pairs.
    pub fn to_query(&self) -> Result<Vec<(&'static str, String)>, ValidationError> {
        exactly_one(
            &["orderId", "rootOrderId"],
            !self.order_ids.is_empty(),
            !self.root_order_ids.is_empty(),
        )?;
        Ok(if self.order_ids.is_empty() {
            vec![("rootOrderId", join_ids(&self.root_order_ids))]
        } else {
            vec![("orderId", join_ids(&self.order_ids))]
        })
    }
}

/// Paging parameters for active orders and open positions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageQuery {
    /// Restrict to one symbol.
    pub symbol: Option<String>,
    /// Return ids strictly below this one.
    pub prev_id: Option<u64>,
    /// Page size (server maximum 100).
    pub count: Option<u32>,
}

impl PageQuery {
    /// Render query pairs.
    #[must_use]
    pub fn to_query(&self) -> Vec<(&'static str, String)> {
        let mut query = Vec::new();
        if let Some(symbol) = &self.symbol {
            query.push(("symbol", symbol.clone()));
        }
        if let Some(prev_id) = self.prev_id {
            query.push(("prevId", prev_id.to_string()));
        }
        if let Some(count) = self.count {
            query.push(("count", count.to_string()));
        }
        query
    }
}

/// Parameters for `GET /v1/executions`. Exactly one of the two must be set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionsQuery {
    /// Order id.
    pub order_id: Option<u64>,
    /// Execution ids (up to 10).
    pub execution_ids: Vec<u64>,
}

impl ExecutionsQuery {
    /// Validate and render query pairs.
    pub fn to_query(&self) -> Result<Vec<(&'static str, String)>, ValidationError> {
        exactly_one(
            &["orderId", "executionId"],
            self.order_id.is_some(),
            !self.execution_ids.is_empty(),
        )?;
        Ok(match self.order_id {
            Some(order_id) => vec![("orderId", order_id.to_string())],
            None => vec![("executionId", join_ids(&self.execution_ids))],
        })
    }
}

// =============================================================================
// Order Requests
// =============================================================================

/// `POST /v1/speedOrder`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeedOrderRequest {
    /// Symbol, e.g. `USD_JPY`.
    pub symbol: String,
    /// Side.
    pub side: Side,
    /// Quantity.
    pub size: Decimal,
    /// Caller-assigned id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_order_id: Option<String>,
    /// Lowest acceptable fill price (SELL only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lower_bound: Option<Decimal>,
    /// Highest acceptable fill price (BUY only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upper_bound: Option<Decimal>,
    /// Allow opening an opposite position instead of netting.
    pub is_hedgeable: bool,
}

impl RequestBody for SpeedOrderRequest {}

/// `POST /v1/order`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderRequest {
    /// Symbol.
    pub symbol: String,
    /// Side.
    pub side: Side,
    /// Quantity.
    pub size: Decimal,
    /// Execution type.
    pub execution_type: ExecutionType,
    /// Caller-assigned id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_order_id: Option<String>,
    /// Limit price, required for LIMIT and OCO.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit_price: Option<Decimal>,
    /// Stop price, required for STOP and OCO.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_price: Option<Decimal>,
    /// Lower bound for MARKET SELL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lower_bound: Option<Decimal>,
    /// Upper bound for MARKET BUY.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upper_bound: Option<Decimal>,
}

impl OrderRequest {
    /// A market order.
    #[must_use]
    pub fn market(symbol: impl Into<String>, side: Side, size: Decimal) -> Self {
        Self {
            symbol: symbol.into(),
            side,
            size,
            execution_type: ExecutionType::Market,
            client_order_id: None,
            limit_price: None,
            stop_price: None,
            lower_bound: None,
            upper_bound: None,
        }
    }

    /// A limit order.
    #[must_use]
    pub fn limit(symbol: impl Into<String>, side: Side, size: Decimal, price: Decimal) -> Self {
        Self {
            execution_type: ExecutionType::Limit,
            limit_price: Some(price),
            ..Self::market(symbol, side, size)
        }
    }
}

impl RequestBody for OrderRequest {
    fn prepare(mut self) -> Result<Self, ValidationError> {
        check_prices(
            self.execution_type,
            self.side,
            &mut self.limit_price,
            &mut self.stop_price,
            &mut self.lower_bound,
            &mut self.upper_bound,
        )?;
        Ok(self)
    }
}

/// `POST /v1/ifdOrder`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IfdOrderRequest {
    /// Symbol.
    pub symbol: String,
    /// First leg side.
    pub first_side: Side,
    /// First leg type (LIMIT or STOP).
    pub first_execution_type: ExecutionType,
    /// First leg quantity.
    pub first_size: Decimal,
    /// First leg price.
    pub first_price: Decimal,
    /// Second leg type (LIMIT or STOP).
    pub second_execution_type: ExecutionType,
    /// Second leg quantity.
    pub second_size: Decimal,
    /// Second leg price.
    pub second_price: Decimal,
    /// Caller-assigned id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_order_id: Option<String>,
}

impl RequestBody for IfdOrderRequest {}

/// `POST /v1/ifoOrder`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IfoOrderRequest {
    /// Symbol.
    pub symbol: String,
    /// First leg side.
    pub first_side: Side,
    /// First leg type (LIMIT or STOP).
    pub first_execution_type: ExecutionType,
    /// First leg quantity.
    pub first_size: Decimal,
    /// First leg price.
    pub first_price: Decimal,
    /// Second (OCO) leg quantity.
    pub second_size: Decimal,
    /// Second leg limit price.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub second_limit_price: Option<Decimal>,
    /// Second leg stop price.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub second_stop_price: Option<Decimal>,
    /// Caller-assigned id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_order_id: Option<String>,
}

impl RequestBody for IfoOrderRequest {}

/// `POST /v1/changeOrder`. Exactly one of `order_id` and `client_order_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeOrderRequest {
    /// New price.
    pub price: Decimal,
    /// Order id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_id: Option<u64>,
    /// Caller-assigned id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_order_id: Option<String>,
}

impl RequestBody for ChangeOrderRequest {
    fn prepare(self) -> Result<Self, ValidationError> {
        exactly_one(
            &["orderId", "clientOrderId"],
            self.order_id.is_some(),
            self.client_order_id.is_some(),
        )?;
        Ok(self)
    }
}

/// `POST /v1/changeOcoOrder`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeOcoOrderRequest {
    /// Root order id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub root_order_id: Option<u64>,
    /// Caller-assigned id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_order_id: Option<String>,
    /// New limit price.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit_price: Option<Decimal>,
    /// New stop price.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_price: Option<Decimal>,
}

impl RequestBody for ChangeOcoOrderRequest {
    fn prepare(self) -> Result<Self, ValidationError> {
        exactly_one(
            &["rootOrderId", "clientOrderId"],
            self.root_order_id.is_some(),
            self.client_order_id.is_some(),
        )?;
        if self.limit_price.is_none() && self.stop_price.is_none() {
            return Err(ValidationError::MissingOneOf(&["limitPrice", "stopPrice"]));
        }
        Ok(self)
    }
}

/// `POST /v1/changeIfdOrder`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeIfdOrderRequest {
    /// Root order id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub root_order_id: Option<u64>,
    /// Caller-assigned id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_order_id: Option<String>,
    /// New first leg price.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_price: Option<Decimal>,
    /// New second leg price.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub second_price: Option<Decimal>,
}

impl RequestBody for ChangeIfdOrderRequest {
    fn prepare(self) -> Result<Self, ValidationError> {
        exactly_one(
            &["rootOrderId", "clientOrderId"],
            self.root_order_id.is_some(),
            self.client_order_id.is_some(),
        )?;
        if self.first_price.is_none() && self.second_price.is_none() {
            return Err(ValidationError::MissingOneOf(&["firstPrice", "secondPrice"]));
        }
        Ok(self)
    }
}

/// `POST /v1/changeIfoOrder`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeIfoOrderRequest {
    /// Root order id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub root_order_id: Option<u64>,
    /// Caller-assigned id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_order_id: Option<String>,
    /// New first leg price.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_price: Option<Decimal>,
    /// New second leg limit price.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub second_limit_price: Option<Decimal>,
    /// New second leg stop price.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub second_stop_price: Option<Decimal>,
}

impl RequestBody for ChangeIfoOrderRequest {
    fn prepare(self) -> Result<Self, ValidationError> {
        exactly_one(
            &["rootOrderId", "clientOrderId"],
            self.root_order_id.is_some(),
            self.client_order_id.is_some(),
        )?;
        if self.first_price.is_none()
            && self.second_limit_price.is_none()
            && self.second_stop_price.is_none()
        {
            return Err(ValidationError::MissingOneOf(&[
                "firstPrice",
                "secondLimitPrice",
                "secondStopPrice",
            ]));
        }
        Ok(self)
    }
}

/// `POST /v1/cancelOrders`. Exactly one of the id lists must be non-empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelOrdersRequest {
    /// Root order ids.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub root_order_ids: Vec<u64>,
    /// Caller-assigned ids.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub client_order_ids: Vec<String>,
}

impl RequestBody for CancelOrdersRequest {
    fn prepare(self) -> Result<Self, ValidationError> {
        exactly_one(
            &["rootOrderIds", "clientOrderIds"],
            !self.root_order_ids.is_empty(),
            !self.client_order_ids.is_empty(),
        )?;
        Ok(self)
    }
}

/// `POST /v1/cancelBulkOrder`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelBulkOrderRequest {
    /// Symbols whose orders are cancelled.
    pub symbols: Vec<String>,
    /// Restrict to one side.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub side: Option<Side>,
    /// Restrict to one settlement type.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub settle_type: Option<SettleType>,
}

impl RequestBody for CancelBulkOrderRequest {}

/// One position to settle in a close order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SettlePosition {
    /// Position id.
    pub position_id: u64,
    /// Quantity to settle.
    pub size: Decimal,
}

/// `POST /v1/closeOrder`. Exactly one of `size` and `settle_position`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CloseOrderRequest {
    /// Symbol.
    pub symbol: String,
    /// Side of the closing order.
    pub side: Side,
    /// Execution type.
    pub execution_type: ExecutionType,
    /// Caller-assigned id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_order_id: Option<String>,
    /// Total quantity to close across positions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<Decimal>,
    /// Limit price, required for LIMIT and OCO.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit_price: Option<Decimal>,
    /// Stop price, required for STOP and OCO.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_price: Option<Decimal>,
    /// Lower bound for MARKET SELL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lower_bound: Option<Decimal>,
    /// Upper bound for MARKET BUY.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upper_bound: Option<Decimal>,
    /// Specific positions to settle.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub settle_position: Vec<SettlePosition>,
}

impl RequestBody for CloseOrderRequest {
    fn prepare(mut self) -> Result<Self, ValidationError> {
        exactly_one(
            &["size", "settlePosition"],
            self.size.is_some(),
            !self.settle_position.is_empty(),
        )?;
        check_prices(
            self.execution_type,
            self.side,
            &mut self.limit_price,
            &mut self.stop_price,
            &mut self.lower_bound,
            &mut self.upper_bound,
        )?;
        Ok(self)
    }
}

/// Body for token extend and delete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TokenRequest<'a> {
    /// Access token.
    pub token: &'a str,
}

impl RequestBody for TokenRequest<'_> {}

/// Empty JSON object body.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EmptyBody {}

impl RequestBody for EmptyBody {}

// =============================================================================
// Responses
// =============================================================================

/// `GET /v1/status`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MarketStatus {
    /// Service status.
    pub status: ExchangeStatus,
}

/// Latest quote for one symbol.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Ticker {
    /// Symbol.
    pub symbol: String,
    /// Ask price.
    pub ask: Decimal,
    /// Bid price.
    pub bid: Decimal,
    /// Quote time.
    pub timestamp: DateTime<Utc>,
    /// Symbol status.
    pub status: ExchangeStatus,
}

/// One OHLC bar.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Kline {
    /// Bar open time as Unix milliseconds, in text.
    pub open_time: String,
    /// Open.
    pub open: Decimal,
    /// High.
    pub high: Decimal,
    /// Low.
    pub low: Decimal,
    /// Close.
    pub close: Decimal,
}

impl Kline {
    /// Bar open time.
    #[must_use]
    pub fn open_time(&self) -> Option<DateTime<Utc>> {
        let millis: i64 = self.open_time.parse().ok()?;
        Utc.timestamp_millis_opt(millis).single()
    }
}

/// Trading rules for one symbol.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SymbolRule {
    /// Symbol.
    pub symbol: String,
    /// Minimum opening order size.
    pub min_open_order_size: Decimal,
    /// Maximum order size.
    pub max_order_size: Decimal,
    /// Size increment.
    pub size_step: Decimal,
    /// Price increment.
    pub tick_size: Decimal,
}

/// Account balance summary.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Asset {
    /// Mark-to-market equity.
    pub equity: Decimal,
    /// Available trading margin.
    pub available_amount: Decimal,
    /// Cash balance.
    pub balance: Decimal,
    /// Estimated fees.
    pub estimated_trade_fee: Decimal,
    /// Margin in use.
    pub margin: Decimal,
    /// Maintenance margin ratio.
    pub margin_ratio: Decimal,
    /// Unrealized P/L.
    pub position_loss_gain: Decimal,
    /// Unsettled swap.
    pub total_swap: Decimal,
    /// Withdrawable amount.
    pub transferable_amount: Decimal,
}

/// Order record.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    /// Root order id.
    pub root_order_id: u64,
    /// Caller-assigned id, if set.
    pub client_order_id: Option<String>,
    /// Order id.
    pub order_id: u64,
    /// Symbol.
    pub symbol: String,
    /// Side.
    pub side: Side,
    /// Order kind.
    pub order_type: OrderType,
    /// Execution type.
    pub execution_type: ExecutionType,
    /// Settlement type.
    pub settle_type: SettleType,
    /// Quantity.
    pub size: Decimal,
    /// Price (LIMIT and STOP only).
    pub price: Option<Decimal>,
    /// Status.
    pub status: OrderStatus,
    /// Cancellation reason, for cancelled and expired orders.
    pub cancel_type: Option<String>,
    /// Expiry date (`YYYYMMDD`).
    pub expiry: Option<String>,
    /// Order time.
    pub timestamp: DateTime<Utc>,
}

/// Fill record.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Execution {
    /// Settlement amount.
    pub amount: Decimal,
    /// Execution id.
    pub execution_id: u64,
    /// Caller-assigned id, if set.
    pub client_order_id: Option<String>,
    /// Order id.
    pub order_id: u64,
    /// Position id.
    pub position_id: u64,
    /// Symbol.
    pub symbol: String,
    /// Side.
    pub side: Side,
    /// Settlement type.
    pub settle_type: SettleType,
    /// Filled quantity.
    pub size: Decimal,
    /// Fill price.
    pub price: Decimal,
    /// Realized P/L.
    pub loss_gain: Decimal,
    /// Fee.
    pub fee: Decimal,
    /// Settled swap.
    pub settled_swap: Decimal,
    /// Fill time.
    pub timestamp: DateTime<Utc>,
}

/// Open position.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    /// Position id.
    pub position_id: u64,
    /// Symbol.
    pub symbol: String,
    /// Side.
    pub side: Side,
    /// Quantity.
    pub size: Decimal,
    /// Quantity tied up in pending close orders.
    pub ordered_size: Decimal,
    /// Open price.
    pub price: Decimal,
    /// Unrealized P/L.
    pub loss_gain: Decimal,
    /// Accrued swap.
    pub total_swap: Decimal,
    /// Open time.
    pub timestamp: DateTime<Utc>,
}

/// Per-symbol, per-side position aggregate.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionSummary {
    /// Average open price.
    pub average_position_rate: Decimal,
    /// Unrealized P/L.
    pub position_loss_gain: Decimal,
    /// Side.
    pub side: Side,
    /// Quantity in pending close orders.
    pub sum_ordered_size: Decimal,
    /// Total quantity.
    pub sum_position_size: Decimal,
    /// Accrued swap.
    pub sum_total_swap: Decimal,
    /// Symbol.
    pub symbol: String,
}

/// One accepted cancellation.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelledOrder {
    /// Caller-assigned id, if set.
    pub client_order_id: Option<String>,
    /// Root order id.
    pub root_order_id: u64,
}

/// Paged list payload (`data.list`).
#[derive(Debug, Clone, Deserialize)]
#[serde(bound(deserialize = "T: serde::Deserialize<'de>"))]
pub struct ListData<T> {
    /// Items.
    #[serde(default)]
    pub list: Vec<T>,
}

/// Cancellation payload (`data.success`).
#[derive(Debug, Clone, Deserialize)]
pub struct CancelData {
    /// Accepted cancellations.
    #[serde(default)]
    pub success: Vec<CancelledOrder>,
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;
    use serde_json::json;
    use test_case::test_case;

    use super::*;

    fn order(execution_type: ExecutionType, side: Side) -> OrderRequest {
        OrderRequest {
            execution_type,
            ..OrderRequest::market("USD_JPY", side, dec!(10000))
        }
    }

    #[test_case(ExecutionType::Limit, "limitPrice" ; "limit needs limit price")]
    #[test_case(ExecutionType::Oco, "limitPrice" ; "oco needs limit price first")]
    #[test_case(ExecutionType::Stop, "stopPrice" ; "stop needs stop price")]
    fn order_missing_price(execution_type: ExecutionType, field: &str) {
        let err = order(execution_type, Side::Buy).prepare().unwrap_err();
        assert!(matches!(err, ValidationError::MissingField { field: f, .. } if f == field));
    }

    #[test]
    fn oco_needs_both_prices() {
        let mut req = order(ExecutionType::Oco, Side::Buy);
        req.limit_price = Some(dec!(150));
        let err = req.prepare().unwrap_err();
        assert!(matches!(err, ValidationError::MissingField { field: "stopPrice", .. }));
    }

    #[test]
    fn market_order_drops_irrelevant_fields() {
        let mut req = order(ExecutionType::Market, Side::Buy);
        req.limit_price = Some(dec!(150));
        req.lower_bound = Some(dec!(140));
        req.upper_bound = Some(dec!(160));
        let req = req.prepare().unwrap();
        assert_eq!(req.limit_price, None);
        assert_eq!(req.lower_bound, None);
        assert_eq!(req.upper_bound, Some(dec!(160)));
    }

    #[test]
    fn limit_order_serializes_camel_case_strings() {
        let req = OrderRequest::limit("USD_JPY", Side::Sell, dec!(10000), dec!(137.5))
            .prepare()
            .unwrap();
        let value = serde_json::to_value(&req).unwrap();
        assert_eq!(
            value,
            json!({
                "symbol": "USD_JPY",
                "side": "SELL",
                "size": "10000",
                "executionType": "LIMIT",
                "limitPrice": "137.5"
            })
        );
    }

    #[test_case(Some(1), Some("a"), true ; "both set")]
    #[test_case(None, None, true ; "neither set")]
    #[test_case(Some(1), None, false ; "order id only")]
    #[test_case(None, Some("a"), false ; "client id only")]
    fn change_order_id_rule(order_id: Option<u64>, client: Option<&str>, fails: bool) {
        let req = ChangeOrderRequest {
            price: dec!(140),
            order_id,
            client_order_id: client.map(str::to_string),
        };
        assert_eq!(req.prepare().is_err(), fails);
    }

    #[test]
    fn change_oco_needs_a_price() {
        let req = ChangeOcoOrderRequest {
            root_order_id: Some(1),
            ..Default::default()
        };
        assert_eq!(
            req.prepare().unwrap_err(),
            ValidationError::MissingOneOf(&["limitPrice", "stopPrice"])
        );
    }

    #[test]
    fn change_ifd_needs_a_price() {
        let req = ChangeIfdOrderRequest {
            client_order_id: Some("abc".to_string()),
            ..Default::default()
        };
        assert!(req.prepare().is_err());

        let req = ChangeIfdOrderRequest {
            client_order_id: Some("abc".to_string()),
            second_price: Some(dec!(141)),
            ..Default::default()
        };
        assert!(req.prepare().is_ok());
    }

    #[test]
    fn change_ifo_accepts_any_single_price() {
        let req = ChangeIfoOrderRequest {
            root_order_id: Some(7),
            second_stop_price: Some(dec!(132)),
            ..Default::default()
        };
        assert!(req.prepare().is_ok());

        let req = ChangeIfoOrderRequest {
            root_order_id: Some(7),
            ..Default::default()
        };
        assert!(req.prepare().is_err());
    }

    #[test]
    fn cancel_orders_requires_exactly_one_list() {
        assert_eq!(
            CancelOrdersRequest::default().prepare().unwrap_err(),
            ValidationError::MissingOneOf(&["rootOrderIds", "clientOrderIds"])
        );
        let both = CancelOrdersRequest {
            root_order_ids: vec![1],
            client_order_ids: vec!["a".to_string()],
        };
        assert!(matches!(
            both.prepare(),
            Err(ValidationError::MutuallyExclusive { .. })
        ));
        let ok = CancelOrdersRequest {
            root_order_ids: vec![1, 2],
            client_order_ids: vec![],
        };
        let value = serde_json::to_value(ok.prepare().unwrap()).unwrap();
        assert_eq!(value, json!({"rootOrderIds": [1, 2]}));
    }

    #[test]
    fn close_order_size_or_positions() {
        let base = CloseOrderRequest {
            symbol: "USD_JPY".to_string(),
            side: Side::Sell,
            execution_type: ExecutionType::Market,
            client_order_id: None,
            size: None,
            limit_price: None,
            stop_price: None,
            lower_bound: None,
            upper_bound: None,
            settle_position: vec![],
        };
        assert!(base.clone().prepare().is_err());

        let by_position = CloseOrderRequest {
            settle_position: vec![SettlePosition {
                position_id: 123,
                size: dec!(10000),
            }],
            ..base.clone()
        };
        let value = serde_json::to_value(by_position.prepare().unwrap()).unwrap();
        assert_eq!(value["settlePosition"][0]["positionId"], 123);

        let both = CloseOrderRequest {
            size: Some(dec!(1)),
            settle_position: vec![SettlePosition {
                position_id: 1,
                size: dec!(1),
            }],
            ..base
        };
        assert!(matches!(
            both.prepare(),
            Err(ValidationError::MutuallyExclusive { first: "size", .. })
        ));
    }

    #[test]
    fn orders_query_rules() {
        assert!(OrdersQuery::default().to_query().is_err());
        let query = OrdersQuery {
            order_ids: vec![],
            root_order_ids: vec![1, 2, 3],
        };
        assert_eq!(query.to_query().unwrap(), vec![("rootOrderId", "1,2,3".to_string())]);
    }

    #[test]
    fn executions_query_rules() {
        let both = ExecutionsQuery {
            order_id: Some(1),
            execution_ids: vec![2],
        };
        assert!(both.to_query().is_err());
        let by_execution = ExecutionsQuery {
            order_id: None,
            execution_ids: vec![5, 6],
        };
        assert_eq!(
            by_execution.to_query().unwrap(),
            vec![("executionId", "5,6".to_string())]
        );
    }

    #[test]
    fn page_query_skips_unset() {
        let query = PageQuery {
            symbol: Some("EUR_JPY".to_string()),
            prev_id: None,
            count: Some(10),
        };
        assert_eq!(
            query.to_query(),
            vec![("symbol", "EUR_JPY".to_string()), ("count", "10".to_string())]
        );
    }

    #[test]
    fn order_response_decodes() {
        let order: Order = serde_json::from_value(json!({
            "rootOrderId": 123456789,
            "orderId": 123456789,
            "symbol": "CAD_JPY",
            "side": "SELL",
            "orderType": "NORMAL",
            "executionType": "LIMIT",
            "settleType": "CLOSE",
            "size": "10000",
            "price": "110",
            "status": "CANCELED",
            "cancelType": "USER",
            "expiry": "20201113",
            "timestamp": "2020-10-14T20:18:59.343Z"
        }))
        .unwrap();
        assert_eq!(order.status, OrderStatus::Canceled);
        assert_eq!(order.client_order_id, None);
        assert_eq!(order.price, Some(dec!(110)));
    }

    #[test]
    fn list_payload_decodes_items_without_default() {
        let data: ListData<CancelledOrder> = serde_json::from_value(json!({
            "list": [{"clientOrderId": "abc", "rootOrderId": 7}]
        }))
        .unwrap();
        assert_eq!(data.list.len(), 1);
        assert_eq!(data.list[0].root_order_id, 7);

        let empty: ListData<Order> = serde_json::from_value(json!({})).unwrap();
        assert!(empty.list.is_empty());
    }

    #[test]
    fn kline_open_time() {
        let kline: Kline = serde_json::from_value(json!({
            "openTime": "1618588800000",
            "open": "141.365",
            "high": "141.368",
            "low": "141.360",
            "close": "141.362"
        }))
        .unwrap();
        assert_eq!(kline.open_time().unwrap().timestamp(), 1_618_588_800);
    }

    #[test]
    fn interval_date_format() {
        assert!(!KlineInterval::Hour1.uses_year_date());
        assert!(KlineInterval::Hour4.uses_year_date());
        assert_eq!(KlineInterval::Month1.as_str(), "1month");
    }
}
