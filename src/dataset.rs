use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
    fs::File,
    io::Read,
    path::Path,
};

use anyhow::{Context, Result};
use chrono::{NaiveDate, NaiveDateTime};
use log::debug;
use serde::{Deserialize, Deserializer};

use crate::metrics::DailyRecord;

/// Anything a daily series can be built for.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Entity {
    Country(String),
    World,
    Eu,
    NonEu,
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Entity::Country(name) => write!(f, "{}", name),
            Entity::World => write!(f, "World"),
            Entity::Eu => write!(f, "EU"),
            Entity::NonEu => write!(f, "Non-EU"),
        }
    }
}

/// One line of the ECDC geographic distribution export.
#[derive(Debug, Clone, Deserialize)]
pub struct Row {
    #[serde(rename = "DateRep", alias = "dateRep", deserialize_with = "deserialize_date")]
    pub date_rep: NaiveDate,
    #[serde(rename = "CountryExp", alias = "countriesAndTerritories")]
    pub country: String,
    #[serde(
        rename = "NewConfCases",
        alias = "cases",
        deserialize_with = "csv::invalid_option"
    )]
    pub new_conf_cases: Option<f64>,
    #[serde(rename = "EU", default)]
    pub eu: Option<String>,
}

pub fn parse_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(value, "%d/%m/%Y"))
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S").map(|dt| dt.date()))
        .ok()
}

fn deserialize_date<'de, D>(deserializer: D) -> Result<NaiveDate, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    parse_date(&s).ok_or_else(|| serde::de::Error::custom(format!("invalid date: {:?}", s)))
}

#[derive(Debug, Clone, Default)]
pub struct Dataset {
    rows: Vec<Row>,
}

impl Dataset {
    pub fn from_reader<R: Read>(reader: R) -> Result<Dataset> {
        let mut csv = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
        let rows = csv
            .deserialize::<Row>()
            .enumerate()
            .map(|(line, row)| row.with_context(|| format!("unable to parse record {}", line + 1)))
            .collect::<Result<Vec<Row>>>()?;
        Ok(Dataset { rows })
    }

    pub fn from_path(path: &Path) -> Result<Dataset> {
        let file = File::open(path).with_context(|| format!("unable to open {}", path.display()))?;
        Dataset::from_reader(file)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn countries(&self) -> Vec<&str> {
        self.rows
            .iter()
            .map(|row| row.country.as_str())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    pub fn contains(&self, entity: &Entity) -> bool {
        match entity {
            Entity::Country(name) => self.rows.iter().any(|row| &row.country == name),
            Entity::World => !self.rows.is_empty(),
            Entity::Eu => self.rows.iter().any(is_eu),
            Entity::NonEu => self.rows.iter().any(is_non_eu),
        }
    }

    /// Number of distinct report dates.
    pub fn days_count(&self) -> usize {
        self.rows
            .iter()
            .map(|row| row.date_rep)
            .collect::<BTreeSet<_>>()
            .len()
    }

    /// Daily new cases of `entity`, ascending by date.
    ///
    /// Countries keep one record per row, missing values included. Aggregates
    /// sum the known values of all matching rows of a date and skip the rest.
    /// Rows without an EU marker belong to neither EU nor Non-EU.
    pub fn series(&self, entity: &Entity) -> Vec<DailyRecord> {
        match entity {
            Entity::Country(name) => {
                let mut records: Vec<DailyRecord> = self
                    .rows
                    .iter()
                    .filter(|row| &row.country == name)
                    .map(|row| DailyRecord {
                        date: row.date_rep,
                        new_cases: row.new_conf_cases,
                    })
                    .collect();
                records.sort_by_key(|record| record.date);
                records
            }
            Entity::World => self.sum_by_date(|_| true),
            Entity::Eu => self.sum_by_date(is_eu),
            Entity::NonEu => self.sum_by_date(is_non_eu),
        }
    }

    fn sum_by_date<F>(&self, include: F) -> Vec<DailyRecord>
    where
        F: Fn(&Row) -> bool,
    {
        let mut by_date: BTreeMap<NaiveDate, f64> = BTreeMap::new();
        for row in self.rows.iter().filter(|row| include(row)) {
            let sum = by_date.entry(row.date_rep).or_insert(0.0);
            match row.new_conf_cases {
                Some(cases) => *sum += cases,
                None => debug!(
                    "skipping missing new cases of {} on {}",
                    row.country, row.date_rep
                ),
            }
        }
        by_date
            .into_iter()
            .map(|(date, new_cases)| DailyRecord {
                date,
                new_cases: Some(new_cases),
            })
            .collect()
    }
}

fn is_eu(row: &Row) -> bool {
    row.eu.as_deref() == Some("EU")
}

fn is_non_eu(row: &Row) -> bool {
    match row.eu.as_deref() {
        Some(eu) => !eu.is_empty() && eu != "EU",
        None => false,
    }
}
