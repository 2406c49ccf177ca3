//! JSON day files.
//!
//! Each daily menu lands in its cafeteria's directory as `YYYYMMDD.json`:
//!
//! ```text
//! base_dir/
//! └── kmac/
//!     ├── 20240311.json
//!     └── 20240312.json
//! ```
//!
//! [`day_schema`] describes this format as JSON Schema.
//!
//! The file is first written as a hidden `.YYYYMMDD.json.tmp` next to its
//! final name and then renamed over it, so a reader never sees a partially
//! written menu. Re-exporting a day simply replaces the file.

use crate::models::DailyMenu;
use chrono::NaiveDate;
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, instrument, warn};

/// File name of a day's menu, e.g. `20240311.json`.
pub fn day_file_name(date: NaiveDate) -> String {
    format!("{}.json", date.format("%Y%m%d"))
}

/// Serialize `menu` as pretty JSON with a trailing newline.
pub fn render_daily_menu(menu: &DailyMenu) -> serde_json::Result<String> {
    let mut json = serde_json::to_string_pretty(menu)?;
    json.push('\n');
    Ok(json)
}

/// JSON schema of a day file.
pub fn day_schema() -> serde_json::Result<String> {
    let schema = schemars::schema_for!(DailyMenu);
    let mut json = serde_json::to_string_pretty(&schema)?;
    json.push('\n');
    Ok(json)
}

/// Atomically write `menu` into `dir`, returning the final path.
#[instrument(level = "debug", skip_all, fields(cafeteria = %menu.cafeteria, date = %menu.date))]
pub async fn write_daily_menu(menu: &DailyMenu, dir: &Path) -> io::Result<PathBuf> {
    let json = render_daily_menu(menu).map_err(io::Error::other)?;

    let file_name = day_file_name(menu.date);
    let path = dir.join(&file_name);
    let tmp = dir.join(format!(".{file_name}.tmp"));

    if let Err(e) = write_then_rename(&tmp, &path, json.as_bytes()).await {
        if let Err(cleanup) = fs::remove_file(&tmp).await {
            if cleanup.kind() != io::ErrorKind::NotFound {
                warn!(path = %tmp.display(), error = %cleanup, "Failed to remove temporary file");
            }
        }
        return Err(e);
    }

    debug!(path = %path.display(), bytes = json.len(), "Wrote daily menu");
    Ok(path)
}

async fn write_then_rename(tmp: &Path, path: &Path, bytes: &[u8]) -> io::Result<()> {
    fs::write(tmp, bytes).await?;
    fs::rename(tmp, path).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Meal, MealCategory};
    use std::collections::BTreeSet;

    fn menu() -> DailyMenu {
        let date = NaiveDate::from_ymd_opt(2024, 3, 11).unwrap();
        DailyMenu::new(
            "kmac",
            date,
            vec![Meal {
                category: MealCategory::Main,
                name: "Currywurst".to_string(),
                price: Some(3.5),
                vegan: false,
                vegetarian: false,
                allergens: BTreeSet::from(["A".to_string(), "F".to_string()]),
            }],
        )
    }

    #[test]
    fn test_day_file_name() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        assert_eq!(day_file_name(date), "20240102.json");
    }

    #[test]
    fn test_render_layout() {
        let json = render_daily_menu(&menu()).unwrap();
        assert!(json.ends_with("}\n"));

        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["date"], "2024-03-11");
        assert_eq!(value["cafeteria"], "kmac");
        assert_eq!(value["meals"][0]["category"], "main");
        assert_eq!(value["meals"][0]["price"], 3.5);
        assert_eq!(value["meals"][0]["allergens"], serde_json::json!(["A", "F"]));
        assert!(value.get("fetched_at").is_none());
    }

    #[test]
    fn test_day_schema_describes_file_format() {
        let schema: serde_json::Value = serde_json::from_str(&day_schema().unwrap()).unwrap();

        let properties = schema["properties"].as_object().unwrap();
        let mut fields: Vec<&str> = properties.keys().map(String::as_str).collect();
        fields.sort_unstable();
        assert_eq!(fields, vec!["cafeteria", "date", "meals"]);

        let categories = schema["$defs"]["MealCategory"]["enum"].as_array().unwrap();
        assert!(categories.contains(&serde_json::json!("vegan-alternative")));
        assert!(schema["$defs"]["Meal"]["properties"]["allergens"].is_object());
    }

    #[tokio::test]
    async fn test_write_replaces_and_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut menu = menu();

        let first = write_daily_menu(&menu, dir.path()).await.unwrap();
        menu.meals.clear();
        let second = write_daily_menu(&menu, dir.path()).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first, dir.path().join("20240311.json"));

        let written: DailyMenu = serde_json::from_str(&std::fs::read_to_string(&first).unwrap()).unwrap();
        assert!(written.meals.is_empty());

        let names: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(names, vec!["20240311.json".to_string()]);
    }

    #[tokio::test]
    async fn test_write_into_missing_dir_fails() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        assert!(write_daily_menu(&menu(), &missing).await.is_err());
        assert!(!missing.exists());
    }
}
