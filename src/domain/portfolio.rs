use crate::error::{MrError, Result};

use super::{Direction, Leg, Trade, TradeStatus};

/// The single open position of a rotation portfolio
#[derive(Debug, Clone, PartialEq)]
pub struct Holding {
    pub leg: Leg,
    pub direction: Option<Direction>,
    pub quantity: f64,
    pub entry_index: usize,
    pub entry_time: Option<String>,
    pub entry_num: f64,
    pub entry_den: f64,
    pub gross_notional_entry: f64,
    pub entry_cost: f64,
}

impl Holding {
    pub fn market_value(&self, num_price: f64, den_price: f64) -> f64 {
        self.quantity * self.leg.price(num_price, den_price)
    }
}

/// Cash plus at most one holding
///
/// Holding both legs at once is unrepresentable.
#[derive(Debug, Clone)]
pub struct Portfolio {
    job_id: String,
    cash: f64,
    cost_rate: f64,
    holding: Option<Holding>,
}

impl Portfolio {
    /// `cost_rate` is the fraction of traded notional paid per side
    pub fn new(job_id: impl Into<String>, cash: f64, cost_rate: f64) -> Self {
        Portfolio {
            job_id: job_id.into(),
            cash,
            cost_rate,
            holding: None,
        }
    }

    pub fn cash(&self) -> f64 {
        self.cash
    }

    pub fn holding(&self) -> Option<&Holding> {
        self.holding.as_ref()
    }

    pub fn held_leg(&self) -> Option<Leg> {
        self.holding.as_ref().map(|h| h.leg)
    }

    /// Mark-to-market value, ignoring exit costs
    pub fn equity(&self, num_price: f64, den_price: f64) -> f64 {
        self.cash
            + self
                .holding
                .as_ref()
                .map(|h| h.market_value(num_price, den_price))
                .unwrap_or(0.0)
    }

    /// Invest all cash in `leg`, paying costs on the traded notional
    pub fn buy(
        &mut self,
        leg: Leg,
        direction: Option<Direction>,
        index: usize,
        time: Option<String>,
        num_price: f64,
        den_price: f64,
    ) -> Result<()> {
        if let Some(h) = &self.holding {
            return Err(MrError::data(format!(
                "job {}: cannot buy {} while holding {}",
                self.job_id, leg, h.leg
            )));
        }
        let notional = self.cash / (1.0 + self.cost_rate);
        if !(notional.is_finite() && notional > 0.0) {
            return Err(MrError::InsufficientEquity {
                job_id: self.job_id.clone(),
                index,
                cash: self.cash,
            });
        }
        let cost = notional * self.cost_rate;
        let price = leg.price(num_price, den_price);
        self.holding = Some(Holding {
            leg,
            direction,
            quantity: notional / price,
            entry_index: index,
            entry_time: time,
            entry_num: num_price,
            entry_den: den_price,
            gross_notional_entry: notional,
            entry_cost: cost,
        });
        self.cash = 0.0;
        Ok(())
    }

    /// Liquidate the holding, if any, and return the completed trade
    pub fn sell(
        &mut self,
        index: usize,
        time: Option<String>,
        num_price: f64,
        den_price: f64,
        status: TradeStatus,
    ) -> Option<Trade> {
        let h = self.holding.take()?;
        let gross = h.market_value(num_price, den_price);
        let cost = gross * self.cost_rate;
        self.cash += gross - cost;

        let (qty_num, qty_den) = match h.leg {
            Leg::Numerator => (h.quantity, 0.0),
            Leg::Denominator => (0.0, h.quantity),
        };
        Some(Trade {
            job_id: self.job_id.clone(),
            leg: h.leg,
            direction: h.direction,
            status,
            entry_index: h.entry_index,
            exit_index: index,
            duration: index - h.entry_index,
            entry_time: h.entry_time,
            exit_time: time,
            entry_num: h.entry_num,
            entry_den: h.entry_den,
            exit_num: num_price,
            exit_den: den_price,
            qty_num,
            qty_den,
            gross_notional_entry: h.gross_notional_entry,
            gross_notional_exit: gross,
            pnl: (gross - cost) - (h.gross_notional_entry + h.entry_cost),
            costs: h.entry_cost + cost,
        })
    }
}
