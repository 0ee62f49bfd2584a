//! Holding maintenance as pure `old portfolio -> new portfolio` functions.
//!
//! Nothing here touches the store; the caller persists the result with a version check.

use finance_core::{FinanceError, FinanceResult, Holding, HoldingUpdate, Portfolio};
use std::collections::HashSet;

pub fn add_holdings(portfolio: &Portfolio, new_holdings: Vec<Holding>) -> FinanceResult<Portfolio> {
    if new_holdings.is_empty() {
        return Err(FinanceError::InvalidInput("no holdings to add".into()));
    }

    let mut ids: HashSet<String> = portfolio.holdings.iter().map(|h| h.id.clone()).collect();
    for holding in &new_holdings {
        holding.validate()?;
        if !ids.insert(holding.id.clone()) {
            return Err(FinanceError::InvalidInput(format!("duplicate holding id {}", holding.id)));
        }
    }

    let mut next = portfolio.clone();
    next.holdings.extend(new_holdings);
    Ok(next)
}

pub fn update_holding(
    portfolio: &Portfolio,
    holding_id: &str,
    update: &HoldingUpdate,
) -> FinanceResult<Portfolio> {
    let mut next = portfolio.clone();
    let holding = next
        .holdings
        .iter_mut()
        .find(|h| h.id == holding_id)
        .ok_or_else(|| FinanceError::NotFound(format!("holding {}", holding_id)))?;

    if let Some(name) = &update.name {
        holding.name = name.clone();
    }
    if let Some(quantity) = update.quantity {
        holding.quantity = quantity;
    }
    if let Some(avg_buy_price) = update.avg_buy_price {
        holding.avg_buy_price = avg_buy_price;
    }
    if let Some(current_price) = update.current_price {
        holding.current_price = current_price;
    }
    if let Some(sector) = &update.sector {
        holding.sector = Some(sector.clone());
    }
    if let Some(exchange) = &update.exchange {
        holding.exchange = Some(exchange.clone());
    }

    holding.validate()?;
    Ok(next)
}

pub fn remove_holding(portfolio: &Portfolio, holding_id: &str) -> FinanceResult<Portfolio> {
    let mut next = portfolio.clone();
    let before = next.holdings.len();
    next.holdings.retain(|h| h.id != holding_id);
    if next.holdings.len() == before {
        return Err(FinanceError::NotFound(format!("holding {}", holding_id)));
    }
    Ok(next)
}
