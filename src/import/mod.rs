//! Catalog import pipeline: tokenizer, record builder, image matcher and
//! template generator.

mod catalogs;
mod error;
mod images;
mod records;
mod template;
mod tokenizer;

pub use catalogs::{CatalogEntry, ReferenceCatalogs};
pub use error::ImportError;
pub use images::{ImageAsset, ImageCandidate, MatchSummary, MatchedImageSet, token_for};
pub use records::{
    Badge, OPTION_DELIMITER, ParsedProductRecord, RecordCounts, REQUIRED_FIELDS, build_records,
    count, slugify,
};
pub use template::{render_template, template_file_name};
pub use tokenizer::{RawRow, decode, quote, tokenize};

#[cfg(test)]
pub(crate) use images::tests as fixtures;

/// Decode, tokenize and build records from an uploaded import file.
pub fn parse_import(
    bytes: &[u8],
    catalogs: &ReferenceCatalogs,
) -> Result<Vec<ParsedProductRecord>, ImportError> {
    let text = decode(bytes)?;
    let rows = tokenize(&text);
    let records = build_records(&rows, catalogs)?;
    let counts = count(&records);
    tracing::info!(
        "import parsed: {} rows ({} valid, {} with errors)",
        records.len(),
        counts.valid,
        counts.errors
    );
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_import_rejects_binary() {
        let catalogs = ReferenceCatalogs::default();
        assert!(matches!(
            parse_import(&[0xc3, 0x28], &catalogs),
            Err(ImportError::Unreadable(_))
        ));
    }

    #[test]
    fn test_parse_import_reports_missing_price() {
        let header: Vec<&str> = REQUIRED_FIELDS
            .iter()
            .copied()
            .filter(|f| *f != "price")
            .collect();
        let err = parse_import(header.join(",").as_bytes(), &ReferenceCatalogs::default())
            .unwrap_err();
        assert_eq!(err.to_string(), "missing required columns: price");
    }

    #[test]
    fn test_parse_import_header_only_is_ok() {
        let records =
            parse_import(REQUIRED_FIELDS.join(",").as_bytes(), &ReferenceCatalogs::default())
                .unwrap();
        assert!(records.is_empty());
    }
}
