//! Data models for raw provider payloads and normalized daily menus.
//!
//! - [`RawPayload`]: provider bytes for one cafeteria and date, as fetched
//! - [`DailyMenu`]: the normalized menu of one cafeteria on one date
//! - [`Meal`] and [`MealCategory`]: the entries of a daily menu
//!
//! A `DailyMenu` is built fresh from every fetch, serialized straight to
//! disk and dropped. The JSON file is the record of that day's snapshot.

use chrono::{DateTime, NaiveDate, Utc};
use clap::ValueEnum;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Provider payload for one cafeteria and requested date.
///
/// Week-based providers return the same page for several dates, so the
/// body is shared rather than copied.
#[derive(Debug, Clone)]
pub struct RawPayload {
    /// Registry id of the cafeteria the payload belongs to.
    pub cafeteria: String,
    /// The date the payload was requested for.
    pub date: NaiveDate,
    /// Response body as received from the provider.
    pub body: Arc<str>,
}

/// The closed set of meal categories every provider label is mapped into.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema, ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
pub enum MealCategory {
    Main,
    Side,
    VeganAlternative,
    Dessert,
    Other,
}

/// A single dish on a daily menu.
///
/// Field order matches the exported JSON schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Meal {
    pub category: MealCategory,
    pub name: String,
    /// Price in the provider's currency, rounded to cents. `None` when the
    /// provider gave no price or it could not be read.
    pub price: Option<f64>,
    pub vegan: bool,
    pub vegetarian: bool,
    /// Allergen and additive codes. Extraction is best effort: providers mark
    /// allergens inconsistently and no guarantee is made that this set is
    /// complete or correct.
    pub allergens: BTreeSet<String>,
}

/// All meals one cafeteria offers on one date.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct DailyMenu {
    /// Serialized as `YYYY-MM-DD`.
    pub date: NaiveDate,
    pub cafeteria: String,
    /// Meals in provider order. Empty on closed days.
    pub meals: Vec<Meal>,
    /// When the payload was parsed. Not exported so unchanged upstream data
    /// produces identical files.
    #[serde(skip, default = "Utc::now")]
    pub fetched_at: DateTime<Utc>,
}

impl DailyMenu {
    pub fn new(cafeteria: &str, date: NaiveDate, meals: Vec<Meal>) -> Self {
        Self {
            date,
            cafeteria: cafeteria.to_string(),
            meals,
            fetched_at: Utc::now(),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.meals.is_empty()
    }

    /// Drop every meal outside `category`, keeping the order of the rest.
    pub fn retain_category(&mut self, category: MealCategory) {
        self.meals.retain(|meal| meal.category == category);
    }
}

/// Round a price to whole cents, dropping values that are not real amounts.
pub fn round_price(amount: f64) -> Option<f64> {
    if amount.is_finite() && amount >= 0.0 {
        Some((amount * 100.0).round() / 100.0)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_meal() -> Meal {
        Meal {
            category: MealCategory::VeganAlternative,
            name: "Gemüsecurry".to_string(),
            price: Some(2.9),
            vegan: true,
            vegetarian: true,
            allergens: ["F".to_string(), "A".to_string()].into_iter().collect(),
        }
    }

    #[test]
    fn test_daily_menu_serialization_schema() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 11).unwrap();
        let menu = DailyMenu::new("kmac", date, vec![sample_meal()]);

        let value = serde_json::to_value(&menu).unwrap();
        assert_eq!(value["date"], "2024-03-11");
        assert_eq!(value["cafeteria"], "kmac");
        assert!(value.get("fetched_at").is_none());

        let meal = &value["meals"][0];
        assert_eq!(meal["category"], "vegan-alternative");
        assert_eq!(meal["price"], 2.9);
        assert_eq!(meal["allergens"], serde_json::json!(["A", "F"]));
        assert_eq!(meal.as_object().unwrap().len(), 6);
    }

    #[test]
    fn test_missing_price_serializes_as_null() {
        let mut meal = sample_meal();
        meal.price = None;
        let value = serde_json::to_value(&meal).unwrap();
        assert!(value["price"].is_null());
    }

    #[test]
    fn test_daily_menu_deserialization() {
        let json = r#"{
            "date": "2024-03-12",
            "cafeteria": "vita",
            "meals": []
        }"#;

        let menu: DailyMenu = serde_json::from_str(json).unwrap();
        assert_eq!(menu.date, NaiveDate::from_ymd_opt(2024, 3, 12).unwrap());
        assert!(menu.is_closed());
    }

    #[test]
    fn test_retain_category() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 11).unwrap();
        let side = |name: &str| Meal {
            category: MealCategory::Side,
            name: name.to_string(),
            ..sample_meal()
        };
        let mut menu = DailyMenu::new("kmac", date, vec![side("Reis"), sample_meal(), side("Salat")]);

        menu.retain_category(MealCategory::Side);
        let names: Vec<&str> = menu.meals.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["Reis", "Salat"]);

        menu.retain_category(MealCategory::Dessert);
        assert!(menu.is_closed());
    }

    #[test]
    fn test_round_price() {
        assert_eq!(round_price(3.499999), Some(3.5));
        assert_eq!(round_price(2.0), Some(2.0));
        assert_eq!(round_price(-1.0), None);
        assert_eq!(round_price(f64::NAN), None);
    }
}
