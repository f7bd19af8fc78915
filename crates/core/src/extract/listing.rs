//! Raw listing payload and its projection into a typed record.

use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;

use crate::crawl::ListingCategory;
use crate::record::{Economy, LeaseEconomy, ListingRecord, SaleEconomy};

use super::text::{flatten_lines, parse_amount, parse_decimal, split_address};

/// What the in-page extraction snippet returns: every field a raw string,
/// defaulting to empty when the page lacked the section. Deserialization
/// therefore never fails on a sparse page.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawListing {
    pub title: String,
    pub description: String,
    pub area: String,
    pub energy: String,
    pub kind: String,
    pub usage: String,
    pub economy: String,
    pub floor_area: String,
    pub secondary_area: String,
    pub ground_area: String,
    pub facilities: String,
    pub equipment: String,
}

static PRICE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Kontantpris\s*(-?[\d.]+)").unwrap());
static RENTAL_INCOME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Årlig lejeindtægt\s*(-?[\d.]+)").unwrap());
static ANNUAL_LEASE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Årlig leje\s*(-?[\d.]+)").unwrap());
static OPERATING_COSTS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Driftsudgifter\s*(-?[\d.]+)").unwrap());
static ANNUAL_OPERATING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Årlige driftsudgifter\s*(-?[\d.]+)").unwrap());
static YIELD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Afkast\s*%\s*(-?[\d.,]+)\s*%").unwrap());
static PER_M2_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"pr\.?\s*m2\s*(-?[\d.]+)").unwrap());
static AMOUNT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"-?[\d][\d.]*").unwrap());

fn labeled_amount(re: &Regex, text: &str) -> Option<i64> {
    re.captures(text)
        .and_then(|caps| parse_amount(caps.get(1)?.as_str()))
}

/// Pulls the first number out of a short field like `120 m²`.
fn first_amount(text: &str) -> Option<i64> {
    AMOUNT_RE
        .find(text)
        .and_then(|m| parse_amount(m.as_str()))
}

fn sale_economy(text: &str) -> SaleEconomy {
    // `Årlig lejeindtægt pr. m2` lines would also match the plain label,
    // so per-m2 values are read from the remainder after each base label,
    // bounded at the next label so one listing's missing per-m2 line
    // cannot borrow the value under a later label.
    let per_m2 = |label_re: &Regex| -> Option<i64> {
        let caps = label_re.captures(text)?;
        let rest = &text[caps.get(0)?.end()..];
        let labels: [&Regex; 4] = [&PRICE_RE, &RENTAL_INCOME_RE, &OPERATING_COSTS_RE, &YIELD_RE];
        let end = labels
            .iter()
            .filter_map(|re| re.find(rest).map(|m| m.start()))
            .min()
            .unwrap_or(rest.len());
        PER_M2_RE
            .captures(&rest[..end])
            .and_then(|caps| parse_amount(caps.get(1)?.as_str()))
    };
    SaleEconomy {
        price: labeled_amount(&PRICE_RE, text),
        annual_rental_income: labeled_amount(&RENTAL_INCOME_RE, text),
        price_per_m2: per_m2(&PRICE_RE),
        annual_rental_income_per_m2: per_m2(&RENTAL_INCOME_RE),
        operating_costs: labeled_amount(&OPERATING_COSTS_RE, text),
        operating_costs_per_m2: per_m2(&OPERATING_COSTS_RE),
        yield_pct: YIELD_RE
            .captures(text)
            .and_then(|caps| parse_decimal(caps.get(1)?.as_str())),
    }
}

fn lease_economy(text: &str) -> LeaseEconomy {
    LeaseEconomy {
        annual_lease: labeled_amount(&ANNUAL_LEASE_RE, text),
        annual_operating_costs: labeled_amount(&ANNUAL_OPERATING_RE, text),
    }
}

/// Projects a raw payload into the typed record for one listing URL.
/// Unparseable numbers become `None`; nothing here fails.
pub fn build_record(category: ListingCategory, url: &str, raw: &RawListing) -> ListingRecord {
    let (address, postal_code, city) = split_address(&raw.title);
    let economy = match category {
        ListingCategory::Sale => Economy::Sale(sale_economy(&raw.economy)),
        ListingCategory::Lease => Economy::Lease(lease_economy(&raw.economy)),
    };
    ListingRecord {
        category,
        address,
        postal_code,
        city,
        description: flatten_lines(&raw.description),
        area_m2: first_amount(&raw.area),
        energy_rating: raw.energy.trim().to_string(),
        kind: raw.kind.trim().to_string(),
        usage: flatten_lines(&raw.usage),
        economy,
        floor_area_m2: first_amount(&raw.floor_area),
        secondary_area_m2: first_amount(&raw.secondary_area),
        ground_area_m2: first_amount(&raw.ground_area),
        facilities: flatten_lines(&raw.facilities),
        equipment: flatten_lines(&raw.equipment),
        url: url.to_string(),
    }
}
