//! Paper terminal.
//!
//! Simulates a netting-free (hedging) account in memory: every market order opens its own
//! position, and closing orders reference a ticket. Floating profit is whatever the caller
//! sets with [`PaperTerminal::set_profit`]; there is no price simulation.

use std::collections::{BTreeMap, HashMap, VecDeque};

use async_trait::async_trait;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::{debug, info};

use hedger_core::{
    AccountSummary, BrokerGateway, Direction, GatewayError, MarketOrderRequest, OrderResult,
    Position, SymbolInfo, Ticket, Tick, RETCODE_DONE,
};

/// Invalid request (unknown symbol).
pub const RETCODE_INVALID: u32 = 10013;
/// Not enough free margin.
pub const RETCODE_NO_MONEY: u32 = 10019;
/// Referenced position no longer exists.
pub const RETCODE_POSITION_CLOSED: u32 = 10036;

const FIRST_TICKET: Ticket = 500_001;

#[derive(Debug)]
struct PaperState {
    balance: Decimal,
    leverage: Decimal,
    contract_size: Decimal,
    positions: BTreeMap<Ticket, Position>,
    ticks: HashMap<String, Tick>,
    symbols: HashMap<String, SymbolInfo>,
    next_ticket: Ticket,
    fetch_failures: u32,
    account_failures: u32,
    rejections: VecDeque<u32>,
    detached: bool,
    orders: Vec<MarketOrderRequest>,
    fill_lag: u32,
    /// Filled tickets still missing from listings, with the fetches left to skip.
    lagging: HashMap<Ticket, u32>,
}

impl PaperState {
    fn used_margin(&self) -> Decimal {
        self.positions
            .values()
            .map(|p| p.volume * self.contract_size * p.open_price / self.leverage)
            .sum()
    }

    fn account(&self) -> AccountSummary {
        let floating: Decimal = self.positions.values().map(|p| p.profit).sum();
        let equity = self.balance + floating;
        AccountSummary {
            balance: self.balance,
            equity,
            margin_free: equity - self.used_margin(),
        }
    }

    fn margin_for(&self, volume: Decimal, price: Decimal) -> Decimal {
        volume * self.contract_size * price / self.leverage
    }

    fn check_attached(&self) -> Result<(), GatewayError> {
        if self.detached {
            return Err(GatewayError::Terminal("paper terminal detached".to_string()));
        }
        Ok(())
    }
}

/// In-memory [`BrokerGateway`] with scripted failure injection.
#[derive(Debug)]
pub struct PaperTerminal {
    state: Mutex<PaperState>,
}

impl PaperTerminal {
    /// New terminal with the given balance, 1:100 leverage and 100-unit contracts.
    #[must_use]
    pub fn new(balance: Decimal) -> Self {
        Self {
            state: Mutex::new(PaperState {
                balance,
                leverage: dec!(100),
                contract_size: dec!(100),
                positions: BTreeMap::new(),
                ticks: HashMap::new(),
                symbols: HashMap::new(),
                next_ticket: FIRST_TICKET,
                fetch_failures: 0,
                account_failures: 0,
                rejections: VecDeque::new(),
                detached: false,
                orders: Vec::new(),
                fill_lag: 0,
                lagging: HashMap::new(),
            }),
        }
    }

    /// Register a tradable symbol with a quote (0.01 lot steps).
    #[must_use]
    pub fn with_symbol(self, symbol: &str, bid: Decimal, ask: Decimal) -> Self {
        {
            let mut state = self.state.lock();
            state.symbols.insert(
                symbol.to_string(),
                SymbolInfo {
                    symbol: symbol.to_string(),
                    visible: true,
                    volume_min: dec!(0.01),
                    volume_step: dec!(0.01),
                    volume_max: dec!(100),
                },
            );
            state.ticks.insert(symbol.to_string(), Tick { bid, ask });
        }
        self
    }

    pub fn set_tick(&self, symbol: &str, bid: Decimal, ask: Decimal) {
        self.state
            .lock()
            .ticks
            .insert(symbol.to_string(), Tick { bid, ask });
    }

    /// Hide a symbol from the market watch (signals for it are refused).
    pub fn hide_symbol(&self, symbol: &str) {
        if let Some(info) = self.state.lock().symbols.get_mut(symbol) {
            info.visible = false;
        }
    }

    /// Open a position directly, as if it had been placed by hand on the terminal.
    pub fn seed_position(
        &self,
        symbol: &str,
        direction: Direction,
        volume: Decimal,
        profit: Decimal,
        comment: &str,
    ) -> Ticket {
        let mut state = self.state.lock();
        let open_price = state
            .ticks
            .get(symbol)
            .and_then(|t| t.price_for(direction))
            .unwrap_or(Decimal::ONE);
        let ticket = state.next_ticket;
        state.next_ticket += 1;
        state.positions.insert(
            ticket,
            Position {
                ticket,
                symbol: symbol.to_string(),
                direction,
                volume,
                open_price,
                profit,
                stop_loss: None,
                take_profit: None,
                comment: comment.to_string(),
            },
        );
        ticket
    }

    /// Set the floating profit of an open position.
    pub fn set_profit(&self, ticket: Ticket, profit: Decimal) {
        if let Some(position) = self.state.lock().positions.get_mut(&ticket) {
            position.profit = profit;
        }
    }

    /// Close a position outside the hedger (stop-loss, take-profit, manual close).
    pub fn close_externally(&self, ticket: Ticket) -> Option<Position> {
        let mut state = self.state.lock();
        let position = state.positions.remove(&ticket)?;
        state.balance += position.profit;
        Some(position)
    }

    /// The next `n` position fetches fail with [`GatewayError::Unavailable`].
    pub fn fail_next_fetches(&self, n: u32) {
        self.state.lock().fetch_failures = n;
    }

    /// The next `n` account queries fail with [`GatewayError::Unavailable`].
    pub fn fail_next_account_queries(&self, n: u32) {
        self.state.lock().account_failures = n;
    }

    /// The next submitted order is answered with `retcode` and not executed.
    pub fn reject_next_order(&self, retcode: u32) {
        self.state.lock().rejections.push_back(retcode);
    }

    /// Positions opened by later orders are left out of the next `fetches` position listings,
    /// like a terminal that confirms a fill before reporting the position.
    pub fn lag_new_fills(&self, fetches: u32) {
        self.state.lock().fill_lag = fetches;
    }

    /// Every later call fails with [`GatewayError::Terminal`].
    pub fn detach(&self) {
        self.state.lock().detached = true;
    }

    #[must_use]
    pub fn open_positions(&self) -> Vec<Position> {
        self.state.lock().positions.values().cloned().collect()
    }

    #[must_use]
    pub fn position(&self, ticket: Ticket) -> Option<Position> {
        self.state.lock().positions.get(&ticket).cloned()
    }

    /// Every order request received, executed or not.
    #[must_use]
    pub fn submitted_orders(&self) -> Vec<MarketOrderRequest> {
        self.state.lock().orders.clone()
    }

    #[must_use]
    pub fn balance(&self) -> Decimal {
        self.state.lock().balance
    }
}

#[async_trait]
impl BrokerGateway for PaperTerminal {
    async fn list_open_positions(&self) -> Result<Vec<Position>, GatewayError> {
        let mut state = self.state.lock();
        state.check_attached()?;
        if state.fetch_failures > 0 {
            state.fetch_failures -= 1;
            return Err(GatewayError::Unavailable(
                "simulated positions fetch failure".to_string(),
            ));
        }
        let positions: Vec<Position> = state
            .positions
            .values()
            .filter(|p| !state.lagging.contains_key(&p.ticket))
            .cloned()
            .collect();
        state.lagging.retain(|_, left| {
            *left -= 1;
            *left > 0
        });
        Ok(positions)
    }

    async fn account_summary(&self) -> Result<AccountSummary, GatewayError> {
        let mut state = self.state.lock();
        state.check_attached()?;
        if state.account_failures > 0 {
            state.account_failures -= 1;
            return Err(GatewayError::Unavailable(
                "simulated account query failure".to_string(),
            ));
        }
        Ok(state.account())
    }

    async fn symbol_tick(&self, symbol: &str) -> Result<Option<Tick>, GatewayError> {
        let state = self.state.lock();
        state.check_attached()?;
        Ok(state.ticks.get(symbol).copied())
    }

    async fn symbol_info(&self, symbol: &str) -> Result<Option<SymbolInfo>, GatewayError> {
        let state = self.state.lock();
        state.check_attached()?;
        Ok(state.symbols.get(symbol).cloned())
    }

    async fn estimate_margin(
        &self,
        _direction: Direction,
        _symbol: &str,
        volume: Decimal,
        price: Decimal,
    ) -> Result<Decimal, GatewayError> {
        let state = self.state.lock();
        state.check_attached()?;
        Ok(state.margin_for(volume, price))
    }

    async fn submit_market_order(
        &self,
        request: &MarketOrderRequest,
    ) -> Result<OrderResult, GatewayError> {
        let mut state = self.state.lock();
        state.check_attached()?;
        state.orders.push(request.clone());

        if let Some(retcode) = state.rejections.pop_front() {
            debug!(retcode, symbol = request.symbol, "Paper order rejected (scripted)");
            return Ok(rejected(retcode, "scripted rejection"));
        }

        if !state.symbols.contains_key(&request.symbol) {
            return Ok(rejected(RETCODE_INVALID, "unknown symbol"));
        }

        if let Some(ticket) = request.position {
            let Some(position) = state.positions.remove(&ticket) else {
                return Ok(rejected(RETCODE_POSITION_CLOSED, "position already closed"));
            };
            state.balance += position.profit;
            info!(ticket, profit = %position.profit, "Paper position closed");
            return Ok(OrderResult {
                retcode: RETCODE_DONE,
                position_id: Some(ticket),
                comment: "closed".to_string(),
            });
        }

        let required = state.margin_for(request.volume, request.price);
        if required > state.account().margin_free {
            return Ok(rejected(RETCODE_NO_MONEY, "no money"));
        }

        let ticket = state.next_ticket;
        state.next_ticket += 1;
        state.positions.insert(
            ticket,
            Position {
                ticket,
                symbol: request.symbol.clone(),
                direction: request.direction,
                volume: request.volume,
                open_price: request.price,
                profit: Decimal::ZERO,
                stop_loss: None,
                take_profit: None,
                comment: request.tag.clone(),
            },
        );
        if state.fill_lag > 0 {
            let lag = state.fill_lag;
            state.lagging.insert(ticket, lag);
        }
        info!(
            ticket,
            symbol = request.symbol,
            direction = %request.direction,
            volume = %request.volume,
            "Paper position opened"
        );

        Ok(OrderResult {
            retcode: RETCODE_DONE,
            position_id: Some(ticket),
            comment: "done".to_string(),
        })
    }
}

fn rejected(retcode: u32, comment: &str) -> OrderResult {
    OrderResult {
        retcode,
        position_id: None,
        comment: comment.to_string(),
    }
}
