//! Ledger CSV import
//!
//! One generic format: `Date,Processed Date,Description,Amount,Category,
//! Subcategory`. Transaction ingestion proper (bank sync, scraping) lives
//! outside this crate; the importer exists so detection and budgeting
//! have a data path.

use chrono::NaiveDate;
use csv::ReaderBuilder;
use sha2::{Digest, Sha256};
use std::io::Read;
use tracing::debug;

use crate::error::{Error, Result};
use crate::models::NewTransaction;

/// Generate a unique hash for deduplication
fn generate_hash(
    date: &NaiveDate,
    description: &str,
    amount: f64,
    category_id: Option<i64>,
    sub_category_id: Option<i64>,
) -> String {
    let mut hasher = Sha256::new();
    hasher.update(date.to_string().as_bytes());
    hasher.update(description.as_bytes());
    hasher.update(amount.to_be_bytes());
    // Category ids distinguish otherwise identical rows the user has
    // split across categories
    hasher.update(category_id.unwrap_or(-1).to_be_bytes());
    hasher.update(sub_category_id.unwrap_or(-1).to_be_bytes());
    hex::encode(hasher.finalize())
}

fn parse_optional_id(field: Option<&str>) -> Result<Option<i64>> {
    match field.map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => s
            .parse::<i64>()
            .map(Some)
            .map_err(|_| Error::Import(format!("Invalid category id: {}", s))),
    }
}

fn parse_optional_date(field: Option<&str>) -> Result<Option<NaiveDate>> {
    match field.map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .map(Some)
            .map_err(|_| Error::Import(format!("Invalid date: {}", s))),
    }
}

/// Parse ledger CSV data into transactions
///
/// Format: Date,Processed Date,Description,Amount,Category,Subcategory
pub fn parse_ledger_csv<R: Read>(reader: R) -> Result<Vec<NewTransaction>> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let mut transactions = Vec::new();

    for result in rdr.records() {
        let record = result?;

        let date_str = record
            .get(0)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| Error::Import("Missing date".into()))?;
        let date = NaiveDate::parse_from_str(date_str, "%Y-%m-%d")
            .map_err(|_| Error::Import(format!("Invalid date: {}", date_str)))?;

        let processed_date = parse_optional_date(record.get(1))?;

        let description = record
            .get(2)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| Error::Import("Missing description".into()))?
            .to_string();

        let amount_str = record
            .get(3)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| Error::Import("Missing amount".into()))?;
        let amount: f64 = amount_str
            .parse()
            .map_err(|_| Error::Import(format!("Invalid amount: {}", amount_str)))?;

        let category_id = parse_optional_id(record.get(4))?;
        let sub_category_id = parse_optional_id(record.get(5))?;

        let import_hash =
            generate_hash(&date, &description, amount, category_id, sub_category_id);

        debug!(%date, description, amount, "Parsed ledger row");

        transactions.push(NewTransaction {
            date,
            processed_date,
            description,
            amount,
            category_id,
            sub_category_id,
            import_hash,
        });
    }

    Ok(transactions)
}
