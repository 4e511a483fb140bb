use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;

use crate::exchange::{CreateOrderRequest, ExchangeApi};
use crate::prelude::*;
use crate::req::HttpClient;
use crate::types::{ActiveOrder, DayQuote, OrderBookDepth, OrderDetail, Position};

const SUCCESS_CODE: &str = "SUCCESS";

/// Standard response envelope. Every endpoint wraps its payload in
/// `{ "code": "SUCCESS", "data": ... }`.
#[derive(Deserialize, Debug)]
struct ApiResponse<T> {
    code: String,
    data: Option<T>,
    #[serde(default)]
    msg: Option<String>,
}

impl<T> ApiResponse<T> {
    fn into_data(self) -> Result<T> {
        if self.code != SUCCESS_CODE {
            return Err(Error::Api {
                code: self.code,
                message: self.msg.unwrap_or_default(),
            });
        }
        self.data
            .ok_or_else(|| Error::MalformedResponse("missing data field".to_string()))
    }
}

fn parse_envelope<T: DeserializeOwned>(text: &str) -> Result<T> {
    let envelope: ApiResponse<T> =
        serde_json::from_str(text).map_err(|e| Error::JsonParse(e.to_string()))?;
    envelope.into_data()
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct CreateOrderData {
    order_id: String,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct ActiveOrderPage {
    #[serde(default)]
    data_list: Vec<ActiveOrder>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct PositionPage {
    #[serde(default)]
    position_list: Vec<Position>,
}

/// REST client for the exchange's private and public endpoints.
#[derive(Debug)]
pub struct RestClient {
    http: HttpClient,
    account_id: String,
}

impl RestClient {
    pub fn new(http: HttpClient, account_id: String) -> Self {
        Self { http, account_id }
    }
}

#[async_trait]
impl ExchangeApi for RestClient {
    async fn get_order_book_depth(&self, contract_id: &str, limit: u32) -> Result<OrderBookDepth> {
        let text = self
            .http
            .get(
                "/api/v1/public/quote/getDepth",
                &[
                    ("contractId", contract_id.to_string()),
                    ("level", limit.to_string()),
                ],
            )
            .await?;
        let mut books: Vec<OrderBookDepth> = parse_envelope(&text)?;
        if books.is_empty() {
            return Err(Error::MalformedResponse("empty depth list".to_string()));
        }
        Ok(books.remove(0))
    }

    async fn create_limit_order(&self, req: CreateOrderRequest) -> Result<String> {
        let body = json!({
            "accountId": self.account_id,
            "contractId": req.contract_id,
            "size": req.size,
            "price": req.price,
            "side": req.side.as_str(),
            "type": "LIMIT",
            "timeInForce": if req.post_only { "POST_ONLY" } else { "GOOD_TIL_CANCEL" },
        });
        let text = self
            .http
            .post("/api/v1/private/order/createOrder", body.to_string())
            .await?;
        let data: CreateOrderData = parse_envelope(&text)?;
        Ok(data.order_id)
    }

    async fn cancel_order(&self, order_id: &str) -> Result<()> {
        let body = json!({
            "accountId": self.account_id,
            "orderIdList": [order_id],
        });
        let text = self
            .http
            .post("/api/v1/private/order/cancelOrderById", body.to_string())
            .await?;
        // cancel returns a per-id result map; the SUCCESS code is all we act on
        let envelope: ApiResponse<serde_json::Value> =
            serde_json::from_str(&text).map_err(|e| Error::JsonParse(e.to_string()))?;
        if envelope.code != SUCCESS_CODE {
            return Err(Error::Api {
                code: envelope.code,
                message: envelope.msg.unwrap_or_default(),
            });
        }
        Ok(())
    }

    async fn get_order_by_id(&self, order_id: &str) -> Result<OrderDetail> {
        let text = self
            .http
            .get(
                "/api/v1/private/order/getOrderById",
                &[
                    ("accountId", self.account_id.clone()),
                    ("orderIdList", order_id.to_string()),
                ],
            )
            .await?;
        let mut orders: Vec<OrderDetail> = parse_envelope(&text)?;
        if orders.is_empty() {
            return Err(Error::MalformedResponse(format!(
                "order {order_id} not in response"
            )));
        }
        Ok(orders.remove(0))
    }

    async fn get_active_orders(&self, contract_id: &str) -> Result<Vec<ActiveOrder>> {
        let text = self
            .http
            .get(
                "/api/v1/private/order/getActiveOrderPage",
                &[
                    ("accountId", self.account_id.clone()),
                    ("size", "200".to_string()),
                ],
            )
            .await?;
        let page: ActiveOrderPage = parse_envelope(&text)?;
        Ok(page
            .data_list
            .into_iter()
            .filter(|o| o.contract_id == contract_id)
            .collect())
    }

    async fn get_account_positions(&self) -> Result<Vec<Position>> {
        let text = self
            .http
            .get(
                "/api/v1/private/account/getAccountAsset",
                &[("accountId", self.account_id.clone())],
            )
            .await?;
        let page: PositionPage = parse_envelope(&text)?;
        Ok(page.position_list)
    }

    async fn get_24h_quote(&self, contract_id: &str) -> Result<DayQuote> {
        let text = self
            .http
            .get(
                "/api/v1/public/quote/getTicker",
                &[("contractId", contract_id.to_string())],
            )
            .await?;
        let mut quotes: Vec<DayQuote> = parse_envelope(&text)?;
        if quotes.is_empty() {
            return Err(Error::MalformedResponse("empty ticker list".to_string()));
        }
        Ok(quotes.remove(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_success_unwraps_data() {
        let text = r#"{"code":"SUCCESS","data":[{"bids":[{"price":"99.9","size":"1"}],"asks":[{"price":"100.1","size":"1"}]}]}"#;
        let books: Vec<OrderBookDepth> = parse_envelope(text).unwrap();
        assert_eq!(books[0].best_bid().unwrap(), 99.9);
    }

    #[test]
    fn envelope_error_code_maps_to_api_error() {
        let text = r#"{"code":"ORDER_PRICE_INVALID","msg":"price out of range"}"#;
        let result: Result<Vec<OrderDetail>> = parse_envelope(text);
        match result {
            Err(Error::Api { code, message }) => {
                assert_eq!(code, "ORDER_PRICE_INVALID");
                assert_eq!(message, "price out of range");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn envelope_missing_data_is_malformed() {
        let text = r#"{"code":"SUCCESS"}"#;
        let result: Result<Vec<OrderDetail>> = parse_envelope(text);
        assert!(matches!(result, Err(Error::MalformedResponse(_))));
    }

    #[test]
    fn envelope_garbage_is_json_parse_error() {
        let result: Result<Vec<OrderDetail>> = parse_envelope("<html>502</html>");
        assert!(matches!(result, Err(Error::JsonParse(_))));
    }
}
