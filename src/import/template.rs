//! Downloadable import template with reference data as comment lines.

use super::{Badge, OPTION_DELIMITER, REQUIRED_FIELDS, ReferenceCatalogs, quote};

/// Render the template: header, one example row, then `#` reference lines.
pub fn render_template(catalogs: &ReferenceCatalogs) -> String {
    let category = catalogs
        .categories
        .first()
        .map(|c| c.slug.as_str())
        .unwrap_or("");
    let collection = catalogs
        .collections
        .first()
        .map(|c| c.slug.as_str())
        .unwrap_or("");
    let options = catalogs
        .options
        .iter()
        .take(2)
        .map(|o| o.id.as_str())
        .collect::<Vec<_>>()
        .join(OPTION_DELIMITER.to_string().as_str());

    let example: Vec<String> = REQUIRED_FIELDS
        .iter()
        .map(|field| match *field {
            "name" => "Rose Gold Ring".to_string(),
            "sku" => "RGR-001".to_string(),
            "slug" => "rose-gold-ring".to_string(),
            "description" => "Delicate rose gold ring".to_string(),
            "long_description" => "Hand finished, with a brushed band, polished edges".to_string(),
            "category_slug" => category.to_string(),
            "collection_slug" => collection.to_string(),
            "price" => "2499".to_string(),
            "original_price" => "2999".to_string(),
            "material" => "Rose gold plated brass".to_string(),
            "care_instructions" => "Keep away from water and perfume".to_string(),
            "stock_quantity" => "25".to_string(),
            "low_stock_threshold" => "5".to_string(),
            "badge" => Badge::New.as_str().to_string(),
            "is_new_arrival" => "true".to_string(),
            "is_best_seller" => "false".to_string(),
            "is_celebrity_special" => "false".to_string(),
            "is_active" => "true".to_string(),
            "display_order" => "1".to_string(),
            "enabled_options" => options.clone(),
            _ => String::new(),
        })
        .map(|v| quote(&v))
        .collect();

    let mut lines = vec![REQUIRED_FIELDS.join(","), example.join(",")];
    lines.push(String::new());
    lines.push("# Reference data (lines starting with # are ignored on import)".to_string());
    lines.push(format!(
        "# Multiple enabled_options are separated by '{OPTION_DELIMITER}'. Images: <slug-or-sku>_<index>.<ext>"
    ));
    lines.push(format!(
        "# Badges: {}",
        Badge::ALL.map(Badge::as_str).join(" / ")
    ));
    lines.push("# Category slugs:".to_string());
    lines.extend(catalogs.categories.iter().map(|c| quote(&format!("#   {}", c.slug))));
    lines.push("# Collection slugs:".to_string());
    lines.extend(catalogs.collections.iter().map(|c| quote(&format!("#   {}", c.slug))));
    lines.push("# Option ids:".to_string());
    lines.extend(
        catalogs
            .options
            .iter()
            .map(|o| quote(&format!("#   {} ({})", o.id, o.name))),
    );

    let mut text = lines.join("\n");
    text.push('\n');
    text
}

/// Default download name, dated so repeated exports do not collide.
pub fn template_file_name(prefix: &str) -> String {
    format!("{}-{}.csv", prefix, chrono::Local::now().format("%Y-%m-%d"))
}
