//! Private REST API
//!
//! Signed account, order, and position operations plus the stream access
//! token lifecycle. Every call:
//!
//! 1. checks its parameter rules (no I/O on failure),
//! 2. waits on the GET or POST rate limiter,
//! 3. signs and sends the request.

use async_trait::async_trait;
use reqwest::Method;
use serde::de::DeserializeOwned;

use super::api_types::{
    Asset, CancelBulkOrderRequest, CancelData, CancelOrdersRequest, CancelledOrder,
    ChangeIfdOrderRequest, ChangeIfoOrderRequest, ChangeOcoOrderRequest, ChangeOrderRequest,
    CloseOrderRequest, EmptyBody, Execution, ExecutionsQuery, IfdOrderRequest, IfoOrderRequest,
    ListData, Order, OrderRequest, OrdersQuery, PageQuery, Position, PositionSummary, RequestBody,
    SpeedOrderRequest, TokenRequest,
};
use super::error::GmoError;
use super::http_client::{Envelope, GmoHttpClient};
use super::rate_limit::RateLimits;
use super::signer::RequestSigner;
use crate::application::ports::{TokenError, TokenProvider};
use crate::domain::streaming::AccessToken;
use crate::infrastructure::config::{Credentials, RestSettings};
use crate::infrastructure::metrics;

const WS_AUTH_PATH: &str = "/v1/ws-auth";

/// Client for the private REST endpoints.
#[derive(Debug, Clone)]
pub struct PrivateApi {
    http: GmoHttpClient,
    signer: RequestSigner,
    limits: RateLimits,
}

impl PrivateApi {
    /// Create a client.
    ///
    /// Pass the same `RateLimits` to several clients to throttle them jointly.
    pub fn new(
        settings: &RestSettings,
        credentials: &Credentials,
        limits: RateLimits,
    ) -> Result<Self, GmoError> {
        Ok(Self {
            http: GmoHttpClient::new(settings.private_url.clone(), settings.timeout)?,
            signer: RequestSigner::new(credentials).map_err(|_| GmoError::InvalidSecret)?,
            limits,
        })
    }

    // =========================================================================
    // Transport
    // =========================================================================

    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<Envelope<T>, GmoError> {
        self.limits.get.acquire().await;
        let auth = self.signer.headers(&Method::GET, path, "");
        self.http
            .send_signed(Method::GET, path, query, None, &auth)
            .await
    }

    async fn send<B: RequestBody, T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: B,
    ) -> Result<Envelope<T>, GmoError> {
        let body = serde_json::to_string(&body.prepare()?)?;
        self.limits.post.acquire().await;
        let auth = self.signer.headers(&method, path, &body);
        self.http
            .send_signed(method, path, &[], Some(body), &auth)
            .await
    }

    async fn get_list<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<Vec<T>, GmoError> {
        let envelope: Envelope<ListData<T>> = self.get(path, query).await?;
        Ok(envelope.data.map(|d| d.list).unwrap_or_default())
    }

    async fn post_orders<B: RequestBody>(&self, path: &str, body: B) -> Result<Vec<Order>, GmoError> {
        let envelope: Envelope<Vec<Order>> = self.send(Method::POST, path, body).await?;
        Ok(envelope.data.unwrap_or_default())
    }

    async fn post_cancel<B: RequestBody>(
        &self,
        path: &str,
        body: B,
    ) -> Result<Vec<CancelledOrder>, GmoError> {
        let envelope: Envelope<CancelData> = self.send(Method::POST, path, body).await?;
        Ok(envelope.data.map(|d| d.success).unwrap_or_default())
    }

    // =========================================================================
    // Account and Queries
    // =========================================================================

    /// Account balances.
    pub async fn account_assets(&self) -> Result<Vec<Asset>, GmoError> {
        let envelope: Envelope<Vec<Asset>> = self.get("/v1/account/assets", &[]).await?;
        Ok(envelope.data.unwrap_or_default())
    }

    /// Orders by order id or root order id.
    pub async fn orders(&self, query: &OrdersQuery) -> Result<Vec<Order>, GmoError> {
        let query = query.to_query()?;
        self.get_list("/v1/orders", &query).await
    }

    /// Resting orders, newest first.
    pub async fn active_orders(&self, query: &PageQuery) -> Result<Vec<Order>, GmoError> {
        self.get_list("/v1/activeOrders", &query.to_query()).await
    }

    /// Fills by order id or execution ids.
    pub async fn executions(&self, query: &ExecutionsQuery) -> Result<Vec<Execution>, GmoError> {
        let query = query.to_query()?;
        self.get_list("/v1/executions", &query).await
    }

    /// Most recent fills for a symbol (last day).
    pub async fn latest_executions(
        &self,
        symbol: &str,
        count: Option<u32>,
    ) -> Result<Vec<Execution>, GmoError> {
        let mut query = vec![("symbol", symbol.to_string())];
        if let Some(count) = count {
            query.push(("count", count.to_string()));
        }
        self.get_list("/v1/latestExecutions", &query).await
    }

    /// Open positions, newest first.
    pub async fn open_positions(&self, query: &PageQuery) -> Result<Vec<Position>, GmoError> {
        self.get_list("/v1/openPositions", &query.to_query()).await
    }

    /// Position aggregates, for one symbol or all.
    pub async fn position_summary(
        &self,
        symbol: Option<&str>,
    ) -> Result<Vec<PositionSummary>, GmoError> {
        let query: Vec<_> = symbol.map(|s| ("symbol", s.to_string())).into_iter().collect();
        self.get_list("/v1/positionSummary", &query).await
    }

    // =========================================================================
    // Orders
    // =========================================================================

    /// Immediate market order.
    pub async fn speed_order(&self, request: SpeedOrderRequest) -> Result<Vec<Order>, GmoError> {
        self.post_orders("/v1/speedOrder", request).await
    }

    /// New order.
    pub async fn order(&self, request: OrderRequest) -> Result<Vec<Order>, GmoError> {
        self.post_orders("/v1/order", request).await
    }

    /// If-done order.
    pub async fn ifd_order(&self, request: IfdOrderRequest) -> Result<Vec<Order>, GmoError> {
        self.post_orders("/v1/ifdOrder", request).await
    }

    /// If-done + OCO order.
    pub async fn ifo_order(&self, request: IfoOrderRequest) -> Result<Vec<Order>, GmoError> {
        self.post_orders("/v1/ifoOrder", request).await
    }

    /// Change a normal order's price.
    pub async fn change_order(&self, request: ChangeOrderRequest) -> Result<Vec<Order>, GmoError> {
        self.post_orders("/v1/changeOrder", request).await
    }

    /// Change an OCO order's prices.
    pub async fn change_oco_order(
        &self,
        request: ChangeOcoOrderRequest,
    ) -> Result<Vec<Order>, GmoError> {
        self.post_orders("/v1/changeOcoOrder", request).await
    }

    /// Change an IFD order's prices.
    pub async fn change_ifd_order(
        &self,
        request: ChangeIfdOrderRequest,
    ) -> Result<Vec<Order>, GmoError> {
        self.post_orders("/v1/changeIfdOrder", request).await
    }

    /// Change an IFDOCO order's prices.
    pub async fn change_ifo_order(
        &self,
        request: ChangeIfoOrderRequest,
    ) -> Result<Vec<Order>, GmoError> {
        self.post_orders("/v1/changeIfoOrder", request).await
    }

    /// Cancel orders by root order ids or client order ids.
    pub async fn cancel_orders(
        &self,
        request: CancelOrdersRequest,
    ) -> Result<Vec<CancelledOrder>, GmoError> {
        self.post_cancel("/v1/cancelOrders", request).await
    }

    /// Cancel every order matching symbols and optional side/settle filters.
    pub async fn cancel_bulk_order(
        &self,
        request: CancelBulkOrderRequest,
    ) -> Result<Vec<CancelledOrder>, GmoError> {
        self.post_cancel("/v1/cancelBulkOrder", request).await
    }

    /// Close positions.
    pub async fn close_order(&self, request: CloseOrderRequest) -> Result<Vec<Order>, GmoError> {
        self.post_orders("/v1/closeOrder", request).await
    }

    // =========================================================================
    // Stream Access Tokens
    // =========================================================================

    /// Issue a stream access token (valid 60 minutes, 5 per key).
    pub async fn issue_ws_token(&self) -> Result<String, GmoError> {
        let envelope: Envelope<String> = self.send(Method::POST, WS_AUTH_PATH, EmptyBody {}).await?;
        envelope.into_data()
    }

    /// Reset a token's validity to 60 minutes.
    pub async fn extend_ws_token(&self, token: &str) -> Result<(), GmoError> {
        let _: Envelope<serde_json::Value> = self
            .send(Method::PUT, WS_AUTH_PATH, TokenRequest { token })
            .await?;
        Ok(())
    }

    /// Revoke a token.
    pub async fn delete_ws_token(&self, token: &str) -> Result<(), GmoError> {
        let _: Envelope<serde_json::Value> = self
            .send(Method::DELETE, WS_AUTH_PATH, TokenRequest { token })
            .await?;
        Ok(())
    }
}

#[async_trait]
impl TokenProvider for PrivateApi {
    async fn issue_token(&self) -> Result<AccessToken, TokenError> {
        let result = match self.issue_ws_token().await {
            Ok(token) if token.is_empty() => Err(TokenError::EmptyToken),
            Ok(token) => Ok(AccessToken::new(token)),
            Err(e) => Err(e.into()),
        };
        metrics::record_token_operation("issue", result.is_ok());
        result
    }

    async fn extend_token(&self, token: &AccessToken) -> Result<(), TokenError> {
        let result = self.extend_ws_token(token.as_str()).await;
        metrics::record_token_operation("extend", result.is_ok());
        Ok(result?)
    }

    async fn delete_token(&self, token: &AccessToken) -> Result<(), TokenError> {
        let result = self.delete_ws_token(token.as_str()).await;
        metrics::record_token_operation("delete", result.is_ok());
        Ok(result?)
    }
}
