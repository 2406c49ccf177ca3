//! Provider payload parsers.
//!
//! Each provider has its own payload shape. [`parse`] picks the parser from
//! the cafeteria's configured [`ProviderKind`]; the payload itself is never
//! inspected to guess its format.
//!
//! | Provider | Module | Payload |
//! |----------|--------|---------|
//! | Studierendenwerk Aachen | [`stw_aachen`] | weekly HTML table |
//! | OpenMensa | [`open_mensa`] | JSON array of meals per day |
//!
//! All parsers share the same tolerance rules: a broken meal is logged and
//! dropped, a missing price becomes `None`, unknown categories become
//! [`MealCategory::Other`](crate::models::MealCategory::Other), and only a
//! payload that cannot be read at all is a
//! [`ParseError::MalformedPayload`].

pub mod allergens;
pub mod category;
pub mod open_mensa;
pub mod stw_aachen;

use crate::config::ProviderKind;
use crate::error::ParseError;
use crate::models::{DailyMenu, RawPayload, round_price};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::instrument;

static PRICE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d+)(?:[.,](\d{1,2}))?").expect("price pattern is valid"));

/// Parse a raw payload into the menu of the payload's date.
#[instrument(level = "debug", skip_all, fields(cafeteria = %raw.cafeteria, date = %raw.date, ?kind))]
pub fn parse(kind: ProviderKind, raw: &RawPayload) -> Result<DailyMenu, ParseError> {
    match kind {
        ProviderKind::StwAachen => stw_aachen::parse_day(raw),
        ProviderKind::OpenMensa => open_mensa::parse_day(raw),
    }
}

/// Read the first amount from a price text such as `"3,50 €"`.
pub fn parse_price(text: &str) -> Option<f64> {
    let caps = PRICE.captures(text)?;
    let euros: f64 = caps.get(1)?.as_str().parse().ok()?;
    let cents = match caps.get(2) {
        Some(m) if m.as_str().len() == 1 => m.as_str().parse::<f64>().ok()? * 10.0,
        Some(m) => m.as_str().parse::<f64>().ok()?,
        None => 0.0,
    };
    round_price(euros + cents / 100.0)
}
