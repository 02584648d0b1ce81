//! Header mapping, typed record projection and per-row validation.

use std::collections::HashMap;

use super::{ImportError, RawRow, ReferenceCatalogs};

/// Columns every import file must declare, in template order.
pub const REQUIRED_FIELDS: [&str; 21] = [
    "name",
    "sku",
    "slug",
    "description",
    "long_description",
    "category_slug",
    "collection_slug",
    "price",
    "original_price",
    "material",
    "care_instructions",
    "stock_quantity",
    "low_stock_threshold",
    "badge",
    "is_new_arrival",
    "is_best_seller",
    "is_celebrity_special",
    "is_active",
    "display_order",
    "enabled_options",
    "video_url",
];

/// Separator inside the `enabled_options` column.
pub const OPTION_DELIMITER: char = '|';

const DEFAULT_LOW_STOCK_THRESHOLD: i64 = 5;

/// Closed set of merchandising badges.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Badge {
    New,
    Bestseller,
    Sale,
    Limited,
    Exclusive,
}

impl Badge {
    pub const ALL: [Badge; 5] = [
        Badge::New,
        Badge::Bestseller,
        Badge::Sale,
        Badge::Limited,
        Badge::Exclusive,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Badge::New => "new",
            Badge::Bestseller => "bestseller",
            Badge::Sale => "sale",
            Badge::Limited => "limited",
            Badge::Exclusive => "exclusive",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|b| b.as_str().eq_ignore_ascii_case(s))
    }
}

/// Column positions keyed by lowercase field name.
#[derive(Clone, Debug)]
pub struct HeaderIndex {
    positions: HashMap<String, usize>,
}

impl HeaderIndex {
    pub fn from_row(row: &RawRow) -> Self {
        let mut positions = HashMap::new();
        for (i, name) in row.fields.iter().enumerate() {
            // First occurrence wins on duplicate column names.
            positions.entry(name.trim().to_lowercase()).or_insert(i);
        }
        Self { positions }
    }

    /// Required fields absent from the header, in template order.
    pub fn missing(&self) -> Vec<String> {
        REQUIRED_FIELDS
            .iter()
            .filter(|f| !self.positions.contains_key(**f))
            .map(|f| f.to_string())
            .collect()
    }

    /// Value of `field` in `row`; empty when the column or cell is absent.
    pub fn value<'a>(&self, row: &'a RawRow, field: &str) -> &'a str {
        self.positions.get(field).map_or("", |&i| row.get(i))
    }
}

/// Typed projection of one data row plus its validation state.
#[derive(Clone, Debug, PartialEq)]
pub struct ParsedProductRecord {
    pub row: usize,
    pub name: String,
    pub sku: String,
    pub slug: String,
    pub description: String,
    pub long_description: String,
    pub category_slug: String,
    pub collection_slug: String,
    pub price: f64,
    pub original_price: Option<f64>,
    pub material: String,
    pub care_instructions: String,
    pub stock_quantity: i64,
    pub low_stock_threshold: i64,
    pub badge: Option<Badge>,
    pub is_new_arrival: bool,
    pub is_best_seller: bool,
    pub is_celebrity_special: bool,
    pub is_active: bool,
    pub display_order: i64,
    pub enabled_options: String,
    pub video_url: String,
    /// Validation messages; empty means the record is eligible for upload.
    pub errors: Vec<String>,
    /// Filenames of images currently matched to this record's slug.
    pub images: Vec<String>,
}

impl ParsedProductRecord {
    pub fn is_eligible(&self) -> bool {
        self.errors.is_empty()
    }

    /// Option ids from `enabled_options`, empty tokens dropped.
    pub fn option_ids(&self) -> Vec<String> {
        self.enabled_options
            .split(OPTION_DELIMITER)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    }
}

/// Valid/invalid totals for the review stage.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RecordCounts {
    pub valid: usize,
    pub errors: usize,
}

pub fn count(records: &[ParsedProductRecord]) -> RecordCounts {
    let valid = records.iter().filter(|r| r.is_eligible()).count();
    RecordCounts {
        valid,
        errors: records.len() - valid,
    }
}

/// Lowercase, collapse non-alphanumeric runs to one hyphen, trim hyphens.
pub fn slugify(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut pending_hyphen = false;
    for c in s.chars().flat_map(char::to_lowercase) {
        if c.is_alphanumeric() {
            if pending_hyphen && !out.is_empty() {
                out.push('-');
            }
            pending_hyphen = false;
            out.push(c);
        } else {
            pending_hyphen = true;
        }
    }
    out
}

/// Build records from tokenized rows. The first row is the header.
///
/// Fails only when there is no header or it lacks required columns; row
/// problems are collected on each record instead.
pub fn build_records(
    rows: &[RawRow],
    catalogs: &ReferenceCatalogs,
) -> Result<Vec<ParsedProductRecord>, ImportError> {
    let (header_row, data) = rows.split_first().ok_or(ImportError::NoHeader)?;
    let header = HeaderIndex::from_row(header_row);

    let missing = header.missing();
    if !missing.is_empty() {
        return Err(ImportError::MissingColumns(missing));
    }

    Ok(data
        .iter()
        .map(|row| {
            let mut record = project(&header, row);
            record.errors = validate(&record, &header, row, catalogs);
            record
        })
        .collect())
}

fn project(header: &HeaderIndex, row: &RawRow) -> ParsedProductRecord {
    let get = |field: &str| header.value(row, field).to_string();

    let name = get("name");
    let sku = get("sku");
    let slug = derive_slug(header.value(row, "slug"), &name, &sku, row.line);

    ParsedProductRecord {
        row: row.line,
        slug,
        description: get("description"),
        long_description: get("long_description"),
        category_slug: get("category_slug"),
        collection_slug: get("collection_slug"),
        price: parse_number(header.value(row, "price")).unwrap_or(0.0),
        original_price: parse_number(header.value(row, "original_price")),
        material: get("material"),
        care_instructions: get("care_instructions"),
        stock_quantity: parse_int(header.value(row, "stock_quantity")).unwrap_or(0),
        low_stock_threshold: parse_int(header.value(row, "low_stock_threshold"))
            .unwrap_or(DEFAULT_LOW_STOCK_THRESHOLD),
        badge: Badge::parse(header.value(row, "badge")),
        is_new_arrival: parse_flag(header.value(row, "is_new_arrival")),
        is_best_seller: parse_flag(header.value(row, "is_best_seller")),
        is_celebrity_special: parse_flag(header.value(row, "is_celebrity_special")),
        is_active: !header.value(row, "is_active").eq_ignore_ascii_case("false"),
        display_order: parse_int(header.value(row, "display_order")).unwrap_or(0),
        enabled_options: get("enabled_options"),
        video_url: get("video_url"),
        name,
        sku,
        errors: Vec::new(),
        images: Vec::new(),
    }
}

/// Every applicable rule is checked; nothing short-circuits.
fn validate(
    record: &ParsedProductRecord,
    header: &HeaderIndex,
    row: &RawRow,
    catalogs: &ReferenceCatalogs,
) -> Vec<String> {
    let mut errors = Vec::new();

    if record.name.is_empty() {
        errors.push("Name is required".to_string());
    }

    if !parse_number(header.value(row, "price")).is_some_and(|p| p > 0.0) {
        errors.push("Price must be a positive number".to_string());
    }

    if !record.category_slug.is_empty() && catalogs.category_id(&record.category_slug).is_none() {
        errors.push(format!("Category '{}' not found", record.category_slug));
    }

    if !record.collection_slug.is_empty()
        && catalogs.collection_id(&record.collection_slug).is_none()
    {
        errors.push(format!("Collection '{}' not found", record.collection_slug));
    }

    let badge = header.value(row, "badge");
    if !badge.is_empty() && record.badge.is_none() {
        let allowed: Vec<&str> = Badge::ALL.iter().map(|b| b.as_str()).collect();
        errors.push(format!(
            "Badge '{}' must be one of: {}",
            badge,
            allowed.join(", ")
        ));
    }

    errors
}

fn derive_slug(explicit: &str, name: &str, sku: &str, line: usize) -> String {
    if !explicit.is_empty() {
        return explicit.to_string();
    }
    [name, sku]
        .into_iter()
        .map(slugify)
        .find(|s| !s.is_empty())
        .unwrap_or_else(|| format!("row-{line}"))
}

fn parse_number(s: &str) -> Option<f64> {
    s.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

fn parse_int(s: &str) -> Option<i64> {
    let s = s.trim();
    s.parse::<i64>()
        .ok()
        .or_else(|| parse_number(s).map(|v| v.trunc() as i64))
}

fn parse_flag(s: &str) -> bool {
    s.eq_ignore_ascii_case("true")
}
