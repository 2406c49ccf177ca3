//! Mapping from provider category labels into [`MealCategory`].
//!
//! Providers label their meal lines freely ("Tellergericht", "Burger der
//! Woche", "Pizza of the Day", ...). Labels are matched case-insensitively
//! by keyword, first match wins, and anything unrecognized becomes
//! [`MealCategory::Other`].

use crate::models::MealCategory;

/// Keyword table, checked in order. Vegan and dessert keywords come before
/// the main-dish ones so "Vegane Empfehlung" is not read as a plain main.
const KEYWORDS: &[(&str, MealCategory)] = &[
    ("vegan", MealCategory::VeganAlternative),
    ("dessert", MealCategory::Dessert),
    ("nachtisch", MealCategory::Dessert),
    ("nachspeise", MealCategory::Dessert),
    ("süßspeise", MealCategory::Dessert),
    ("beilage", MealCategory::Side),
    ("side", MealCategory::Side),
    ("salat", MealCategory::Side),
    ("salad", MealCategory::Side),
    ("klassiker", MealCategory::Main),
    ("classics", MealCategory::Main),
    ("tellergericht", MealCategory::Main),
    ("stew", MealCategory::Main),
    ("empfehlung", MealCategory::Main),
    ("suggestion", MealCategory::Main),
    ("wok", MealCategory::Main),
    ("burger", MealCategory::Main),
    ("pizza", MealCategory::Main),
    ("pasta", MealCategory::Main),
    ("grill", MealCategory::Main),
    ("vegetarisch", MealCategory::Main),
    ("vegetarian", MealCategory::Main),
    ("hauptgericht", MealCategory::Main),
    ("tagesgericht", MealCategory::Main),
    ("main", MealCategory::Main),
    ("essen", MealCategory::Main),
];

/// Map a provider label to a category. Never fails.
pub fn infer_category(label: &str) -> MealCategory {
    let label = label.to_lowercase();
    KEYWORDS
        .iter()
        .find(|(keyword, _)| label.contains(keyword))
        .map(|(_, category)| *category)
        .unwrap_or(MealCategory::Other)
}

/// Whether a label marks a vegetarian line regardless of the dish text.
pub fn is_vegetarian_label(label: &str) -> bool {
    let label = label.to_lowercase();
    label.contains("vegetari") || label.contains("vegan") || label.contains("fleischlos")
}
