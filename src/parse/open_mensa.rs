//! Parser for OpenMensa v2 day listings.
//!
//! `GET canteens/<id>/days/<date>/meals` answers with a JSON array:
//!
//! ```json
//! [
//!   {
//!     "id": 1,
//!     "name": "Currywurst (A,F)",
//!     "category": "Tellergericht",
//!     "prices": { "students": 3.5, "employees": 4.6, "others": 5.2 },
//!     "notes": ["Schwein", "Allergene: A, F"]
//!   }
//! ]
//! ```
//!
//! Anything but an array is malformed. Array entries are decoded one by one
//! so a single broken entry only costs that meal.

use super::allergens::{collect_allergens, is_allergen_code, remove_allergens};
use super::category::{infer_category, is_vegetarian_label};
use super::parse_price;
use crate::error::ParseError;
use crate::models::{DailyMenu, Meal, RawPayload, round_price};
use crate::utils::truncate_for_log;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeSet;
use tracing::{debug, warn};

#[derive(Debug, Deserialize)]
struct OpenMensaMeal {
    name: String,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    prices: Option<Value>,
    #[serde(default)]
    notes: Option<Value>,
}

pub fn parse_day(raw: &RawPayload) -> Result<DailyMenu, ParseError> {
    let entries: Vec<Value> = serde_json::from_str(&raw.body).map_err(|e| {
        debug!(body = %truncate_for_log(&raw.body, 200), "Undecodable meal listing");
        ParseError::malformed(&raw.cafeteria, raw.date, format!("expected a JSON array of meals: {e}"))
    })?;

    let mut meals = Vec::with_capacity(entries.len());
    for (index, entry) in entries.into_iter().enumerate() {
        match serde_json::from_value::<OpenMensaMeal>(entry) {
            Ok(meal) => match to_meal(meal) {
                Some(meal) => meals.push(meal),
                None => warn!(cafeteria = %raw.cafeteria, date = %raw.date, index, "Skipping meal without a name"),
            },
            Err(e) => {
                warn!(cafeteria = %raw.cafeteria, date = %raw.date, index, error = %e, "Skipping undecodable meal")
            }
        }
    }

    Ok(DailyMenu::new(&raw.cafeteria, raw.date, meals))
}

fn to_meal(meal: OpenMensaMeal) -> Option<Meal> {
    let name = remove_allergens(&meal.name);
    if name.is_empty() {
        return None;
    }

    let label = meal.category.unwrap_or_default();
    let notes = string_notes(meal.notes.as_ref());

    let mut allergens = collect_allergens(&meal.name);
    allergens.extend(note_allergens(&notes));

    let mentions = |needle: &str| notes.iter().any(|n| n.to_lowercase().contains(needle));
    let vegan = mentions("vegan") || label.to_lowercase().contains("vegan");
    let vegetarian = vegan
        || mentions("vegetari")
        || mentions("fleischlos")
        || is_vegetarian_label(&label);

    Some(Meal {
        category: infer_category(&label),
        name,
        price: meal.prices.as_ref().and_then(student_price),
        vegan,
        vegetarian,
        allergens,
    })
}

fn string_notes(notes: Option<&Value>) -> Vec<String> {
    match notes {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}

/// Codes from notes that are bare codes (`"A"`) or code lists
/// (`"Allergene: A, F"`).
fn note_allergens(notes: &[String]) -> BTreeSet<String> {
    let mut codes = BTreeSet::new();
    for note in notes {
        let list = match note.split_once(':') {
            Some((head, tail)) if head.to_lowercase().contains("allergen") => tail,
            _ => note.as_str(),
        };
        codes.extend(
            list.split(',')
                .map(str::trim)
                .filter(|code| is_allergen_code(code))
                .map(str::to_string),
        );
    }
    codes
}

/// Prefer the student price, fall back to the general one.
fn student_price(prices: &Value) -> Option<f64> {
    ["students", "others"]
        .iter()
        .filter_map(|key| prices.get(key))
        .find_map(|value| match value {
            Value::Number(n) => n.as_f64().and_then(round_price),
            Value::String(s) => parse_price(s),
            _ => None,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MealCategory;
    use chrono::NaiveDate;
    use std::sync::Arc;

    fn payload(body: &str) -> RawPayload {
        RawPayload {
            cafeteria: "mensa-nord".to_string(),
            date: NaiveDate::from_ymd_opt(2024, 3, 11).unwrap(),
            body: Arc::from(body),
        }
    }

    #[test]
    fn test_parse_meals() {
        let body = r#"[
            {"id": 1, "name": "Currywurst (A,F)", "category": "Tellergericht",
             "prices": {"students": 3.5, "employees": 4.6, "others": 5.2},
             "notes": ["Schwein", "Allergene: A, F, 3"]},
            {"id": 2, "name": "Reis", "category": "Beilagen",
             "prices": {"students": null, "others": null},
             "notes": ["vegan"]}
        ]"#;
        let menu = parse_day(&payload(body)).unwrap();
        assert_eq!(menu.date, NaiveDate::from_ymd_opt(2024, 3, 11).unwrap());
        assert_eq!(menu.meals.len(), 2);

        let wurst = &menu.meals[0];
        assert_eq!(wurst.name, "Currywurst");
        assert_eq!(wurst.category, MealCategory::Main);
        assert_eq!(wurst.price, Some(3.5));
        assert_eq!(wurst.allergens.iter().collect::<Vec<_>>(), vec!["3", "A", "F"]);
        assert!(!wurst.vegetarian);

        let reis = &menu.meals[1];
        assert_eq!(reis.category, MealCategory::Side);
        assert_eq!(reis.price, None);
        assert!(reis.vegan && reis.vegetarian);
    }

    #[test]
    fn test_price_fallbacks() {
        assert_eq!(student_price(&serde_json::json!({"students": "2,80 €"})), Some(2.8));
        assert_eq!(student_price(&serde_json::json!({"students": null, "others": 4.1})), Some(4.1));
        assert_eq!(student_price(&serde_json::json!({"students": "n/a"})), None);
        assert_eq!(student_price(&serde_json::json!([])), None);
    }

    #[test]
    fn test_one_corrupt_meal_among_five() {
        let body = r#"[
            {"name": "Pasta Arrabiata", "category": "Pasta", "prices": {"students": 2.5}},
            {"name": "Hähnchen", "category": "Hauptgericht", "prices": {"students": 3.9}},
            {"name": 17, "category": "Hauptgericht"},
            {"name": "Obstsalat", "category": "Dessert", "prices": {"students": "teuer"}},
            {"name": "Suppe", "category": "Aktion", "notes": "not-a-list"}
        ]"#;
        let menu = parse_day(&payload(body)).unwrap();
        let names: Vec<&str> = menu.meals.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["Pasta Arrabiata", "Hähnchen", "Obstsalat", "Suppe"]);
        assert_eq!(menu.meals[2].category, MealCategory::Dessert);
        assert_eq!(menu.meals[2].price, None);
        assert_eq!(menu.meals[3].category, MealCategory::Other);
    }

    #[test]
    fn test_empty_array_is_a_closed_day() {
        let menu = parse_day(&payload("[]")).unwrap();
        assert!(menu.is_closed());
    }

    #[test]
    fn test_non_array_is_malformed() {
        for body in ["<html>502 Bad Gateway</html>", r#"{"error": "gone"}"#, ""] {
            let err = parse_day(&payload(body)).unwrap_err();
            assert!(matches!(err, ParseError::MalformedPayload { .. }), "{body}");
        }
    }
}
