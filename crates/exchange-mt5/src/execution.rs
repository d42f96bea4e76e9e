//! Order routing: margin estimates and market orders.

use rust_decimal::Decimal;
use tracing::{debug, info, warn};

use hedger_core::{Direction, GatewayError, MarketOrderRequest, OrderResult};

use crate::client::Mt5BridgeClient;
use crate::types::{MarginRequest, MarginResponse};

impl Mt5BridgeClient {
    /// Margin the terminal would block for this order.
    pub async fn margin(
        &self,
        direction: Direction,
        symbol: &str,
        volume: Decimal,
        price: Decimal,
    ) -> Result<Decimal, GatewayError> {
        let request = MarginRequest {
            direction,
            symbol: symbol.to_string(),
            volume,
            price,
        };
        let response: MarginResponse = self.post_json(&["margin"], &request).await?;
        debug!(symbol, %volume, %price, margin = %response.margin, "Margin estimated");
        Ok(response.margin)
    }

    /// Send a market order. Terminal rejections come back as a non-done retcode, not an error.
    pub async fn send_order(&self, request: &MarketOrderRequest) -> Result<OrderResult, GatewayError> {
        info!(
            symbol = request.symbol,
            direction = %request.direction,
            volume = %request.volume,
            price = %request.price,
            tag = request.tag,
            closing = ?request.position,
            "Sending market order"
        );

        let result: OrderResult = self.post_json(&["orders"], request).await?;

        if result.is_done() {
            info!(position = ?result.position_id, "Order executed");
        } else {
            warn!(retcode = result.retcode, comment = result.comment, "Order not executed");
        }
        Ok(result)
    }
}
