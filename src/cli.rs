//! Command-line interface definitions.
//!
//! The registry path can also be set once per machine through
//! `MENSA_REGISTRY`.

use crate::models::MealCategory;
use crate::runner::DEFAULT_CONCURRENCY;
use chrono::{Datelike, Days, NaiveDate, Weekday};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Export university cafeteria menus as one JSON file per cafeteria and day.
///
/// # Examples
///
/// ```sh
/// # Every cafeteria of the built-in registry into ./menus/<cafeteria>/
/// mensa_export export -o ./menus
///
/// # Two cafeterias, give up after two minutes
/// mensa_export export -m kmac -m vita -o ./menus --timeout 120
///
/// # Print tomorrow's menu of one cafeteria
/// mensa_export menu -m academica -d next
///
/// # Only its vegan line
/// mensa_export menu -m academica --only vegan-alternative
///
/// # Schema of the exported files
/// mensa_export schema
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// YAML cafeteria registry to use instead of the built-in one
    #[arg(long, global = true, env = "MENSA_REGISTRY")]
    pub registry: Option<PathBuf>,

    /// Log at debug level (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Export every available day of the selected cafeterias
    Export {
        /// Cafeteria id to export; repeat for several (default: all)
        #[arg(short = 'm', long = "mensa")]
        mensa: Vec<String>,

        /// Base output directory; each cafeteria gets its own subdirectory
        #[arg(short, long, default_value = ".")]
        output_dir: PathBuf,

        /// Cafeterias exported at the same time
        #[arg(short = 'j', long, default_value_t = DEFAULT_CONCURRENCY)]
        concurrency: usize,

        /// Stop issuing requests after this many seconds
        #[arg(long)]
        timeout: Option<u64>,
    },

    /// Print one day's menu as JSON
    Menu {
        /// Cafeteria id
        #[arg(short = 'm', long = "mensa")]
        mensa: String,

        /// Exact date (YYYY-MM-DD)
        #[arg(long, conflicts_with = "day")]
        date: Option<NaiveDate>,

        /// Relative day, used when no exact date is given
        #[arg(short, long, value_enum, default_value_t = MenuDay::Today)]
        day: MenuDay,

        /// Only print meals of this category
        #[arg(long, value_enum)]
        only: Option<MealCategory>,
    },

    /// List the cafeterias of the registry
    List,

    /// Print the JSON schema of the exported day files
    Schema,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuDay {
    Today,
    /// The next weekday after today
    Next,
}

impl MenuDay {
    pub fn resolve(self, today: NaiveDate) -> NaiveDate {
        match self {
            MenuDay::Today => today,
            MenuDay::Next => {
                let skip = match today.weekday() {
                    Weekday::Fri => 3,
                    Weekday::Sat => 2,
                    _ => 1,
                };
                today + Days::new(skip)
            }
        }
    }
}
