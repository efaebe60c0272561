use std::{fmt, path::PathBuf, str::FromStr};

use argh::FromArgs;
use chrono::NaiveDate;
use indexmap::IndexSet;
use log::LevelFilter;
use url::{ParseError, Url};

use crate::dataset::Entity;

const DEFAULT_URL: &str = "https://opendata.ecdc.europa.eu/covid19/casedistribution/csv";
const DEFAULT_COUNTRIES: [&str; 2] = ["Slovakia", "Czech Republic"];
const DEFAULT_TREND_DAYS: usize = 20;

#[derive(FromArgs, Debug)]
/// Cumulative totals and growth rates of COVID-19 cases from the ECDC daily export
pub struct Args {
    /// url of the daily CSV export, `{}` is replaced by the report date (YYYY-MM-DD)
    #[argh(option, short = 'u', default = "default_url()")]
    url: UrlTemplate,

    /// read the export from a local CSV file instead of downloading it
    #[argh(option, short = 'i')]
    input: Option<PathBuf>,

    /// country to compare, may be repeated (default: Slovakia, Czech Republic)
    #[argh(option, short = 'c')]
    country: Vec<String>,

    /// include the worldwide total
    #[argh(switch)]
    world: bool,

    /// include the EU and Non-EU aggregates
    #[argh(switch)]
    eu: bool,

    /// number of last days to show (default: all)
    #[argh(option, short = 'n')]
    last_days: Option<usize>,

    /// output format: table, json or csv
    #[argh(option, short = 'f', default = "OutputFormat::Table")]
    format: OutputFormat,

    /// render PNG charts into this directory
    #[argh(option, short = 'o')]
    out_dir: Option<PathBuf>,

    /// number of last days in the growth rate chart of the aggregates
    #[argh(option, default = "DEFAULT_TREND_DAYS")]
    trend_days: usize,

    /// report date to download, YYYY-MM-DD (default: today)
    #[argh(option)]
    date: Option<NaiveDate>,

    /// list the countries present in the export and exit
    #[argh(switch)]
    list_countries: bool,

    /// log debug messages
    #[argh(switch, short = 'v')]
    verbose: bool,
}

fn default_url() -> UrlTemplate {
    UrlTemplate(DEFAULT_URL.to_string())
}

/// Url with an optional `{}` placeholder for the report date.
#[derive(Debug, Clone, PartialEq)]
pub struct UrlTemplate(String);

impl UrlTemplate {
    pub fn for_date(&self, date: NaiveDate) -> Result<Url, ParseError> {
        Url::parse(&self.0.replace("{}", &date.format("%Y-%m-%d").to_string()))
    }
}

impl FromStr for UrlTemplate {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Url::parse(&s.replace("{}", "2020-01-01"))?;
        Ok(UrlTemplate(s.to_owned()))
    }
}

impl fmt::Display for UrlTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OutputFormat {
    Table,
    Json,
    Csv,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "table" => Ok(OutputFormat::Table),
            "json" => Ok(OutputFormat::Json),
            "csv" => Ok(OutputFormat::Csv),
            other => Err(format!("unknown output format {:?}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Input {
    Download(UrlTemplate),
    File(PathBuf),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub input: Input,
    pub entities: Vec<Entity>,
    pub last_days: Option<usize>,
    pub format: OutputFormat,
    pub chart_dir: Option<PathBuf>,
    pub trend_days: usize,
    pub date: Option<NaiveDate>,
    pub list_countries: bool,
    pub log_level: LevelFilter,
}

impl From<Args> for Config {
    fn from(args: Args) -> Self {
        let input = match args.input {
            Some(path) => Input::File(path),
            None => Input::Download(args.url),
        };

        let mut countries: IndexSet<String> = args
            .country
            .into_iter()
            .map(|country| country.trim().to_string())
            .filter(|country| !country.is_empty())
            .collect();
        if countries.is_empty() && !args.world && !args.eu {
            countries.extend(DEFAULT_COUNTRIES.iter().map(|c| c.to_string()));
        }

        let mut entities: Vec<Entity> = countries.into_iter().map(Entity::Country).collect();
        if args.world {
            entities.push(Entity::World);
        }
        if args.eu {
            entities.push(Entity::Eu);
            entities.push(Entity::NonEu);
        }

        Config {
            input,
            entities,
            last_days: args.last_days,
            format: args.format,
            chart_dir: args.out_dir,
            trend_days: args.trend_days,
            date: args.date,
            list_countries: args.list_countries,
            log_level: if args.verbose {
                LevelFilter::Debug
            } else {
                LevelFilter::Info
            },
        }
    }
}
