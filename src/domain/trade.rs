use serde::{Deserialize, Serialize};
use std::fmt;

use super::Direction;

/// One leg of a ratio: the numerator basket or the denominator basket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Leg {
    Numerator,
    Denominator,
}

impl Leg {
    /// Leg to hold for a reversion direction: a ratio expected to rise
    /// favours the numerator, one expected to fall favours the denominator
    pub fn for_direction(direction: Direction) -> Self {
        match direction {
            Direction::Up => Leg::Numerator,
            Direction::Down => Leg::Denominator,
        }
    }

    pub fn price(&self, num_price: f64, den_price: f64) -> f64 {
        match self {
            Leg::Numerator => num_price,
            Leg::Denominator => den_price,
        }
    }
}

impl fmt::Display for Leg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Leg::Numerator => write!(f, "numerator"),
            Leg::Denominator => write!(f, "denominator"),
        }
    }
}

/// How a trade ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TradeStatus {
    /// Sold because the target leg flipped
    Closed,
    /// Liquidated at the end of the series
    Expired,
}

/// A completed round trip in one leg
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub job_id: String,
    /// Leg that was held
    pub leg: Leg,
    /// Signal direction that triggered the entry, None for the default entry
    pub direction: Option<Direction>,
    pub status: TradeStatus,
    pub entry_index: usize,
    pub exit_index: usize,
    pub duration: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_time: Option<String>,
    pub entry_num: f64,
    pub entry_den: f64,
    pub exit_num: f64,
    pub exit_den: f64,
    pub qty_num: f64,
    pub qty_den: f64,
    pub gross_notional_entry: f64,
    pub gross_notional_exit: f64,
    pub pnl: f64,
    pub costs: f64,
}

impl Trade {
    /// Quantity of the leg actually held
    pub fn quantity(&self) -> f64 {
        match self.leg {
            Leg::Numerator => self.qty_num,
            Leg::Denominator => self.qty_den,
        }
    }
}

impl fmt::Display for Trade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Trade {}: {} [{}..{}] {:.2} -> {:.2} pnl {:.2}",
            self.job_id,
            self.leg,
            self.entry_index,
            self.exit_index,
            self.gross_notional_entry,
            self.gross_notional_exit,
            self.pnl
        )
    }
}

/// Mark-to-market equity on one bar
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    pub index: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
    pub equity: f64,
}

/// Outcome of one backtest job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestResult {
    pub job_id: String,
    pub initial_cash: f64,
    pub final_equity: f64,
    pub total_return: f64,
    pub trade_count: usize,
    pub max_drawdown: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trades: Option<Vec<Trade>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub equity_curve: Option<Vec<EquityPoint>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_trade() -> Trade {
        Trade {
            job_id: "1:0/1:1".to_string(),
            leg: Leg::Denominator,
            direction: Some(Direction::Down),
            status: TradeStatus::Closed,
            entry_index: 2,
            exit_index: 5,
            duration: 3,
            entry_time: None,
            exit_time: None,
            entry_num: 1.0,
            entry_den: 2.0,
            exit_num: 1.1,
            exit_den: 2.2,
            qty_num: 0.0,
            qty_den: 50.0,
            gross_notional_entry: 100.0,
            gross_notional_exit: 110.0,
            pnl: 9.79,
            costs: 0.21,
        }
    }

    #[test]
    fn test_leg_for_direction() {
        assert_eq!(Leg::for_direction(Direction::Up), Leg::Numerator);
        assert_eq!(Leg::for_direction(Direction::Down), Leg::Denominator);
    }

    #[test]
    fn test_leg_price() {
        assert_eq!(Leg::Numerator.price(3.0, 4.0), 3.0);
        assert_eq!(Leg::Denominator.price(3.0, 4.0), 4.0);
    }

    #[test]
    fn test_trade_quantity() {
        let trade = sample_trade();
        assert_eq!(trade.quantity(), 50.0);
    }

    #[test]
    fn test_display_trade() {
        let trade = sample_trade();
        assert_eq!(
            format!("{}", trade),
            "Trade 1:0/1:1: denominator [2..5] 100.00 -> 110.00 pnl 9.79"
        );
    }

    #[test]
    fn test_trade_serializes_snake_case() {
        let json = serde_json::to_string(&sample_trade()).unwrap();
        assert!(json.contains("\"leg\":\"denominator\""));
        assert!(json.contains("\"status\":\"closed\""));
        assert!(!json.contains("entry_time"));
    }
}
