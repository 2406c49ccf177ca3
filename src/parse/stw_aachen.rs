//! Parser for Studierendenwerk Aachen weekly menu pages.
//!
//! One page covers a whole week. The menu table has one row per meal line and
//! one column per weekday:
//!
//! ```text
//! | label<br>price  | Monday | Tuesday | Wednesday | Thursday | Friday |   tr.main-dish
//! | side label      | Monday | Tuesday | Wednesday | Thursday | Friday |   tr.side-dish
//! ```
//!
//! Main cells hold the dish in a `.dish-text` element; the line's price sits
//! in the label cell after a line break. Side cells list alternatives joined
//! by "oder" (or "or" on the English pages). A page without any meal rows is
//! malformed; a row that is missing the requested day or has no dish text is
//! skipped on its own.

use super::allergens::{collect_allergens, remove_allergens};
use super::category::{infer_category, is_vegetarian_label};
use super::parse_price;
use crate::error::ParseError;
use crate::models::{DailyMenu, Meal, MealCategory, RawPayload};
use chrono::Datelike;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, warn};

static SEL_MAIN: Lazy<Selector> =
    Lazy::new(|| Selector::parse("tr.main-dish").expect("main row selector is valid"));
static SEL_SIDE: Lazy<Selector> =
    Lazy::new(|| Selector::parse("tr.side-dish").expect("side row selector is valid"));
static SEL_CELL: Lazy<Selector> =
    Lazy::new(|| Selector::parse("td").expect("cell selector is valid"));
static SEL_DISH_TEXT: Lazy<Selector> =
    Lazy::new(|| Selector::parse(".dish-text").expect("dish text selector is valid"));
static ALTERNATIVE_SEPARATOR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:^|\s+)(?:oder|or)(?:\s+|$)").expect("separator pattern is valid")
});

/// Days the week pages cover, Monday first.
pub const OPEN_DAYS: u32 = 5;

pub fn parse_day(raw: &RawPayload) -> Result<DailyMenu, ParseError> {
    let column = raw.date.weekday().num_days_from_monday();
    if column >= OPEN_DAYS {
        return Err(ParseError::malformed(
            &raw.cafeteria,
            raw.date,
            "week pages have no weekend column",
        ));
    }
    // The first cell of every row is the label, so days start at index 1.
    let column = column as usize + 1;

    let document = Html::parse_document(&raw.body);
    let main_rows: Vec<ElementRef> = document.select(&SEL_MAIN).collect();
    let side_rows: Vec<ElementRef> = document.select(&SEL_SIDE).collect();
    if main_rows.is_empty() && side_rows.is_empty() {
        return Err(ParseError::malformed(
            &raw.cafeteria,
            raw.date,
            "no meal rows found",
        ));
    }

    let mut meals = Vec::new();
    for (row_num, row) in main_rows.into_iter().enumerate() {
        match main_meal(row, column) {
            Ok(Some(meal)) => meals.push(meal),
            Ok(None) => {}
            Err(reason) => {
                warn!(cafeteria = %raw.cafeteria, date = %raw.date, row_num, reason, "Skipping main dish")
            }
        }
    }
    for (row_num, row) in side_rows.into_iter().enumerate() {
        match side_meals(row, column) {
            Ok(sides) => meals.extend(sides),
            Err(reason) => {
                warn!(cafeteria = %raw.cafeteria, date = %raw.date, row_num, reason, "Skipping side dish")
            }
        }
    }

    debug!(cafeteria = %raw.cafeteria, date = %raw.date, meals = meals.len(), "Parsed week page column");
    Ok(DailyMenu::new(&raw.cafeteria, raw.date, meals))
}

/// Label text and trailing price text of a row's first cell.
fn label_and_price(label_cell: ElementRef) -> (String, String) {
    let mut texts = label_cell.text().map(str::trim).filter(|t| !t.is_empty());
    let label = texts.next().unwrap_or_default().to_string();
    let price = texts.collect::<Vec<_>>().join(" ");
    (label, price)
}

/// `Ok(None)` means the line simply offers nothing that day.
fn main_meal(row: ElementRef, column: usize) -> Result<Option<Meal>, &'static str> {
    let cells: Vec<ElementRef> = row.select(&SEL_CELL).collect();
    let label_cell = *cells.first().ok_or("row has no cells")?;
    let cell = *cells.get(column).ok_or("row is missing the requested day")?;

    let Some(dish) = cell.select(&SEL_DISH_TEXT).next() else {
        return Ok(None);
    };

    let mut texts = dish.text();
    let first = texts.next().unwrap_or_default();
    let rest = texts.collect::<String>();

    let headline = remove_allergens(first);
    if headline.is_empty() {
        return Err("dish text is empty");
    }
    let details = remove_allergens(&rest);
    let name = if details.is_empty() {
        headline
    } else {
        format!("{headline} {details}")
    };

    let (label, price_text) = label_and_price(label_cell);
    let markup = cell.inner_html().to_lowercase();
    let vegan = markup.contains("vegan");
    let vegetarian = vegan || markup.contains("vegetari") || is_vegetarian_label(&label);

    Ok(Some(Meal {
        category: infer_category(&label),
        name,
        price: parse_price(&price_text),
        vegan,
        vegetarian,
        allergens: collect_allergens(&format!("{first} {rest}")),
    }))
}

fn side_meals(row: ElementRef, column: usize) -> Result<Vec<Meal>, &'static str> {
    let cells: Vec<ElementRef> = row.select(&SEL_CELL).collect();
    let cell = *cells.get(column).ok_or("row is missing the requested day")?;

    let text = cell.text().collect::<Vec<_>>().join(" ");
    let alternatives: Vec<&str> = ALTERNATIVE_SEPARATOR
        .split(&text)
        .map(str::trim)
        .filter(|alt| !remove_allergens(alt).is_empty())
        .collect();

    // Icons only tell us something when there is a single dish to pin them on.
    let markup_vegan = alternatives.len() == 1 && cell.inner_html().to_lowercase().contains("vegan");

    Ok(alternatives
        .into_iter()
        .map(|alt| {
            let lowered = alt.to_lowercase();
            let vegan = markup_vegan || lowered.contains("vegan");
            Meal {
                category: MealCategory::Side,
                name: remove_allergens(alt),
                price: None,
                vegan,
                vegetarian: vegan || lowered.contains("vegetari"),
                allergens: collect_allergens(alt),
            }
        })
        .collect())
}


#[cfg(test)]
mod tests {
    use super::fixtures::WEEK_PAGE;
    use super::*;
    use chrono::NaiveDate;
    use std::sync::Arc;

    fn payload(body: &str, date: NaiveDate) -> RawPayload {
        RawPayload {
            cafeteria: "kmac".to_string(),
            date,
            body: Arc::from(body),
        }
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    #[test]
    fn test_monday_column() {
        let menu = parse_day(&payload(WEEK_PAGE, day(11))).unwrap();
        assert_eq!(menu.date, day(11));
        assert_eq!(menu.cafeteria, "kmac");
        assert_eq!(menu.meals.len(), 2);

        let main = &menu.meals[0];
        assert_eq!(main.category, MealCategory::Main);
        assert_eq!(main.name, "Currywurst");
        assert_eq!(main.price, Some(3.5));
        assert!(!main.vegan && !main.vegetarian);
        assert_eq!(main.allergens.iter().collect::<Vec<_>>(), vec!["A", "F"]);

        let side = &menu.meals[1];
        assert_eq!(side.category, MealCategory::Side);
        assert_eq!(side.name, "Brokkoli");
        assert_eq!(side.price, None);
        assert!(side.vegan && side.vegetarian);
    }

    #[test]
    fn test_tuesday_column_with_details_and_alternatives() {
        let menu = parse_day(&payload(WEEK_PAGE, day(12))).unwrap();
        let names: Vec<&str> = menu.meals.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["Linseneintopf | Brötchen", "Tofu-Curry", "Erbsen", "Möhren"]
        );

        let vegan_line = &menu.meals[1];
        assert_eq!(vegan_line.category, MealCategory::VeganAlternative);
        assert!(vegan_line.vegan);
        assert_eq!(vegan_line.price, None, "unreadable price must not drop the meal");

        let erbsen = &menu.meals[2];
        assert_eq!(erbsen.allergens.iter().collect::<Vec<_>>(), vec!["A"]);
        assert!(!erbsen.vegan);
    }

    #[test]
    fn test_vegetarian_icon() {
        let menu = parse_day(&payload(WEEK_PAGE, day(13))).unwrap();
        assert_eq!(menu.meals.len(), 1);
        assert!(menu.meals[0].vegetarian);
        assert!(!menu.meals[0].vegan);
    }

    #[test]
    fn test_empty_column_is_a_closed_day() {
        let menu = parse_day(&payload(WEEK_PAGE, day(14))).unwrap();
        assert!(menu.is_closed());
    }

    #[test]
    fn test_weekend_is_malformed() {
        let err = parse_day(&payload(WEEK_PAGE, day(16))).unwrap_err();
        assert!(matches!(err, ParseError::MalformedPayload { .. }));
    }

    #[test]
    fn test_page_without_rows_is_malformed() {
        let err = parse_day(&payload("<html><body><p>Wartungsarbeiten</p></body></html>", day(11)))
            .unwrap_err();
        match err {
            ParseError::MalformedPayload { cafeteria, date, .. } => {
                assert_eq!(cafeteria, "kmac");
                assert_eq!(date, day(11));
            }
        }
    }

    #[test]
    fn test_one_corrupt_row_among_five() {
        let page = r#"<table>
          <tr class="main-dish"><td>Klassiker<br>4,20 €</td><td><span class="dish-text">Schnitzel (A)</span></td></tr>
          <tr class="main-dish"><td>Tellergericht<br>2,10 €</td><td><span class="dish-text">Eintopf</span></td></tr>
          <tr class="main-dish"><td>Wok<br>4,80 €</td><td><span class="dish-text"> (A,F) </span></td></tr>
          <tr class="main-dish"><td>Pizza des Tages<br>3,90</td><td><span class="dish-text">Pizza Margherita (A,G)</span></td></tr>
          <tr class="main-dish"><td>Burger der Woche<br>5,00 €</td><td><span class="dish-text">Veggieburger</span></td></tr>
        </table>"#;
        let menu = parse_day(&payload(page, day(11))).unwrap();
        let names: Vec<&str> = menu.meals.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["Schnitzel", "Eintopf", "Pizza Margherita", "Veggieburger"]);
        assert_eq!(menu.meals[2].price, Some(3.9));
    }

    #[test]
    fn test_short_row_is_skipped() {
        let page = r#"<table>
          <tr class="main-dish"><td>Klassiker<br>4,20 €</td><td><span class="dish-text">Schnitzel</span></td></tr>
          <tr class="main-dish"><td>Tellergericht<br>2,10 €</td><td></td><td></td><td><span class="dish-text">Eintopf</span></td></tr>
        </table>"#;
        let menu = parse_day(&payload(page, day(13))).unwrap();
        let names: Vec<&str> = menu.meals.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["Eintopf"]);
    }
}
