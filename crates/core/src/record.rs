//! Typed listing records and their tabular projection.
//!
//! Numbers that failed to parse from the page stay `None` all the way
//! through the pipeline; only [`RecordTable`] turns them into the blank
//! cells the sink writes out.

use serde::Serialize;

use crate::crawl::ListingCategory;

/// One extracted listing page.
#[derive(Debug, Clone, Serialize)]
pub struct ListingRecord {
    pub category: ListingCategory,
    pub address: String,
    pub postal_code: String,
    pub city: String,
    pub description: String,
    pub area_m2: Option<i64>,
    pub energy_rating: String,
    pub kind: String,
    pub usage: String,
    pub economy: Economy,
    pub floor_area_m2: Option<i64>,
    pub secondary_area_m2: Option<i64>,
    pub ground_area_m2: Option<i64>,
    pub facilities: String,
    pub equipment: String,
    pub url: String,
}

/// Economic fields differ between the sale and lease index, so the record
/// carries one of two shapes.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Economy {
    Sale(SaleEconomy),
    Lease(LeaseEconomy),
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SaleEconomy {
    pub price: Option<i64>,
    pub annual_rental_income: Option<i64>,
    pub price_per_m2: Option<i64>,
    pub annual_rental_income_per_m2: Option<i64>,
    pub operating_costs: Option<i64>,
    pub operating_costs_per_m2: Option<i64>,
    pub yield_pct: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct LeaseEconomy {
    pub annual_lease: Option<i64>,
    pub annual_operating_costs: Option<i64>,
}

/// A single output cell. `Blank` renders as the empty string, which is the
/// absent-value convention the downstream spreadsheet expects.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Text(String),
    Int(i64),
    Float(f64),
    Blank,
}

impl std::fmt::Display for Cell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Cell::Text(s) => f.write_str(s),
            Cell::Int(n) => write!(f, "{n}"),
            Cell::Float(x) => write!(f, "{x}"),
            Cell::Blank => Ok(()),
        }
    }
}

impl From<Option<i64>> for Cell {
    fn from(value: Option<i64>) -> Self {
        value.map_or(Cell::Blank, Cell::Int)
    }
}

impl From<Option<f64>> for Cell {
    fn from(value: Option<f64>) -> Self {
        value.map_or(Cell::Blank, Cell::Float)
    }
}

impl From<String> for Cell {
    fn from(value: String) -> Self {
        Cell::Text(value)
    }
}

/// Header row plus data rows, ready for a [`crate::sink::RecordSink`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl RecordTable {
    /// Projects records into rows. The header set follows the first
    /// record's economy shape; a crawl never mixes shapes.
    pub fn from_records(records: &[ListingRecord]) -> Self {
        let Some(first) = records.first() else {
            return Self::default();
        };
        let headers = match first.economy {
            Economy::Sale(_) => SALE_HEADERS,
            Economy::Lease(_) => LEASE_HEADERS,
        };
        let rows = records.iter().map(record_row).collect();
        Self {
            headers: headers.iter().map(|h| h.to_string()).collect(),
            rows,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

const SALE_HEADERS: &[&str] = &[
    "Address",
    "Postal code",
    "City",
    "Description",
    "Area (m2)",
    "Energy rating",
    "Type",
    "Usage",
    "Price",
    "Annual rental income",
    "Price per m2",
    "Annual rental income per m2",
    "Operating costs",
    "Operating costs per m2",
    "Yield (%)",
    "Floor area (m2)",
    "Secondary area (m2)",
    "Ground area (m2)",
    "Facilities",
    "Technical equipment",
    "URL",
];

const LEASE_HEADERS: &[&str] = &[
    "Address",
    "Postal code",
    "City",
    "Description",
    "Area (m2)",
    "Energy rating",
    "Type",
    "Usage",
    "Annual lease",
    "Annual operating costs",
    "Floor area (m2)",
    "Secondary area (m2)",
    "Ground area (m2)",
    "Facilities",
    "Technical equipment",
    "URL",
];

fn record_row(record: &ListingRecord) -> Vec<Cell> {
    let mut row = vec![
        Cell::from(record.address.clone()),
        Cell::from(record.postal_code.clone()),
        Cell::from(record.city.clone()),
        Cell::from(record.description.clone()),
        Cell::from(record.area_m2),
        Cell::from(record.energy_rating.clone()),
        Cell::from(record.kind.clone()),
        Cell::from(record.usage.clone()),
    ];
    match &record.economy {
        Economy::Sale(sale) => {
            row.push(Cell::from(sale.price));
            row.push(Cell::from(sale.annual_rental_income));
            row.push(Cell::from(sale.price_per_m2));
            row.push(Cell::from(sale.annual_rental_income_per_m2));
            row.push(Cell::from(sale.operating_costs));
            row.push(Cell::from(sale.operating_costs_per_m2));
            row.push(Cell::from(sale.yield_pct));
        }
        Economy::Lease(lease) => {
            row.push(Cell::from(lease.annual_lease));
            row.push(Cell::from(lease.annual_operating_costs));
        }
    }
    row.push(Cell::from(record.floor_area_m2));
    row.push(Cell::from(record.secondary_area_m2));
    row.push(Cell::from(record.ground_area_m2));
    row.push(Cell::from(record.facilities.clone()));
    row.push(Cell::from(record.equipment.clone()));
    row.push(Cell::from(record.url.clone()));
    row
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawl::ListingCategory;

    fn sale_record(address: &str) -> ListingRecord {
        ListingRecord {
            category: ListingCategory::Sale,
            address: address.to_string(),
            postal_code: "8000".to_string(),
            city: "Aarhus C".to_string(),
            description: "Butik".to_string(),
            area_m2: Some(120),
            energy_rating: "C".to_string(),
            kind: "Butik".to_string(),
            usage: "Detail".to_string(),
            economy: Economy::Sale(SaleEconomy {
                price: Some(2_500_000),
                yield_pct: Some(-3.25),
                ..SaleEconomy::default()
            }),
            floor_area_m2: Some(120),
            secondary_area_m2: None,
            ground_area_m2: None,
            facilities: String::new(),
            equipment: String::new(),
            url: "https://example.test/1".to_string(),
        }
    }

    #[test]
    fn absent_numbers_render_blank() {
        let table = RecordTable::from_records(&[sale_record("Vestergade 1")]);
        let row = &table.rows[0];
        let rendered: Vec<String> = row.iter().map(ToString::to_string).collect();
        assert_eq!(rendered[0], "Vestergade 1");
        assert_eq!(rendered[8], "2500000");
        // Secondary area was None.
        let idx = table
            .headers
            .iter()
            .position(|h| h == "Secondary area (m2)")
            .unwrap();
        assert_eq!(rendered[idx], "");
    }

    #[test]
    fn header_count_matches_row_width() {
        let table = RecordTable::from_records(&[sale_record("Vestergade 1")]);
        assert_eq!(table.headers.len(), table.rows[0].len());
    }

    #[test]
    fn empty_input_yields_empty_table() {
        let table = RecordTable::from_records(&[]);
        assert!(table.is_empty());
        assert!(table.headers.is_empty());
    }

    #[test]
    fn negative_yield_renders_with_sign() {
        let table = RecordTable::from_records(&[sale_record("Vestergade 1")]);
        let idx = table.headers.iter().position(|h| h == "Yield (%)").unwrap();
        assert_eq!(table.rows[0][idx].to_string(), "-3.25");
    }
}
