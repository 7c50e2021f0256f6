//! Seed the catalog from a YAML file.
//!
//! Categories are matched by slug, sizes by name and products by slug, so a
//! file can be loaded repeatedly: existing rows are updated, new ones are
//! created. Stock is only set when a product is created.
//!
//! ```yaml
//! categories:
//!   - name: Shirts
//!     description: Button-downs and tees
//! sizes:
//!   - { name: S, sort_order: 1 }
//!   - { name: M, sort_order: 2 }
//! products:
//!   - name: Linen Shirt
//!     sku: LS-01
//!     category: shirts
//!     price: "49.50"
//!     stock: 12
//!     sizes: [S, M]
//! ```

use std::collections::{HashMap, HashSet};
use std::path::Path;

use rust_decimal::Decimal;
use serde::Deserialize;
use sqlx::PgPool;
use thiserror::Error;
use tracing::{error, info, warn};

use meridian_core::slug::{is_valid_slug, slugify};
use meridian_core::{CategoryId, SizeId};
use meridian_db::models::{ProductInput, Size};
use meridian_db::{CategoryRepository, ProductRepository, RepositoryError, SizeRepository};

use super::{ConnectError, connect};

/// Errors that stop a seed run.
#[derive(Debug, Error)]
pub enum SeedError {
    #[error(transparent)]
    Connect(#[from] ConnectError),

    #[error("Failed to read seed file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("{} validation errors found", .0.len())]
    Invalid(Vec<String>),

    #[error("Database error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Top-level seed document.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SeedFile {
    #[serde(default)]
    pub categories: Vec<CategorySeed>,
    #[serde(default)]
    pub sizes: Vec<SizeSeed>,
    #[serde(default)]
    pub products: Vec<ProductSeed>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CategorySeed {
    pub name: String,
    /// Derived from the name when omitted.
    pub slug: Option<String>,
    #[serde(default)]
    pub description: String,
}

impl CategorySeed {
    fn slug(&self) -> String {
        self.slug.clone().unwrap_or_else(|| slugify(&self.name))
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SizeSeed {
    pub name: String,
    #[serde(default)]
    pub sort_order: i32,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProductSeed {
    pub name: String,
    /// Derived from the name when omitted.
    pub slug: Option<String>,
    pub sku: String,
    /// Category slug.
    pub category: String,
    #[serde(default)]
    pub description: String,
    pub price: Decimal,
    pub compare_at_price: Option<Decimal>,
    #[serde(default)]
    pub stock: i32,
    #[serde(default = "default_active")]
    pub active: bool,
    #[serde(default)]
    pub featured: bool,
    pub subscription_price_id: Option<String>,
    /// Size names.
    #[serde(default)]
    pub sizes: Vec<String>,
}

const fn default_active() -> bool {
    true
}

impl ProductSeed {
    fn slug(&self) -> String {
        self.slug.clone().unwrap_or_else(|| slugify(&self.name))
    }

    fn input(&self, category_id: CategoryId) -> ProductInput {
        ProductInput {
            category_id,
            name: self.name.trim().to_owned(),
            slug: self.slug(),
            sku: self.sku.trim().to_uppercase(),
            description: self.description.trim().to_owned(),
            price: self.price,
            compare_at_price: self.compare_at_price,
            stock: self.stock,
            is_active: self.active,
            is_featured: self.featured,
            subscription_price_id: self.subscription_price_id.clone(),
        }
    }
}

/// Outcome of a seed run.
#[derive(Debug, Default)]
pub struct SeedReport {
    pub categories_created: usize,
    pub categories_updated: usize,
    pub sizes_created: usize,
    pub sizes_updated: usize,
    pub products_created: usize,
    pub products_updated: usize,
    /// Products skipped because their slug or SKU belongs to another product.
    pub conflicts: Vec<String>,
}

/// Check the whole file before touching the database.
#[must_use]
pub fn validate(seed: &SeedFile) -> Vec<String> {
    let mut errors = Vec::new();

    let mut category_slugs = HashSet::new();
    for category in &seed.categories {
        let slug = category.slug();
        if category.name.trim().is_empty() {
            errors.push("category with an empty name".to_owned());
        }
        if !is_valid_slug(&slug) {
            errors.push(format!("category '{}': invalid slug '{slug}'", category.name));
        }
        if !category_slugs.insert(slug.clone()) {
            errors.push(format!("category slug '{slug}' appears twice"));
        }
    }

    let mut size_names = HashSet::new();
    for size in &seed.sizes {
        let name = size.name.trim();
        if name.is_empty() {
            errors.push("size with an empty name".to_owned());
        }
        if !size_names.insert(name.to_owned()) {
            errors.push(format!("size '{name}' appears twice"));
        }
    }

    let mut product_slugs = HashSet::new();
    let mut skus = HashSet::new();
    for product in &seed.products {
        let label = format!("product '{}'", product.name);
        let slug = product.slug();
        let sku = product.sku.trim().to_uppercase();

        if product.name.trim().is_empty() {
            errors.push("product with an empty name".to_owned());
        }
        if !is_valid_slug(&slug) {
            errors.push(format!("{label}: invalid slug '{slug}'"));
        }
        if !product_slugs.insert(slug.clone()) {
            errors.push(format!("product slug '{slug}' appears twice"));
        }
        if sku.is_empty() || sku.chars().any(char::is_whitespace) {
            errors.push(format!("{label}: SKU must be non-empty without spaces"));
        } else if !skus.insert(sku.clone()) {
            errors.push(format!("SKU '{sku}' appears twice"));
        }
        if product.category.trim().is_empty() {
            errors.push(format!("{label}: missing category"));
        }
        if product.price.is_sign_negative() {
            errors.push(format!("{label}: negative price"));
        }
        if product.compare_at_price.is_some_and(|c| c <= product.price) {
            errors.push(format!("{label}: compare_at_price must exceed price"));
        }
        if product.stock < 0 {
            errors.push(format!("{label}: negative stock"));
        }
    }

    errors
}

/// Load a seed file and upsert its contents.
///
/// # Arguments
///
/// * `file_path` - Path to the YAML file
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed, fails validation,
/// references unknown categories or sizes, or a database operation fails.
/// Slug or SKU conflicts on individual products are reported, not returned.
pub async fn catalog(file_path: &str) -> Result<SeedReport, SeedError> {
    let path = Path::new(file_path);
    info!(path = %file_path, "Loading catalog seed");

    // Read and validate YAML before connecting to database
    let content = tokio::fs::read_to_string(path).await?;
    let seed: SeedFile = serde_yaml::from_str(&content)?;
    info!(
        categories = seed.categories.len(),
        sizes = seed.sizes.len(),
        products = seed.products.len(),
        "Parsed seed file"
    );

    let errors = validate(&seed);
    if !errors.is_empty() {
        error!("Seed validation failed:");
        for err in &errors {
            error!("  - {err}");
        }
        return Err(SeedError::Invalid(errors));
    }

    let pool = connect().await?;
    let report = apply(&pool, &seed).await?;

    info!("Seeding complete!");
    info!(
        "  Categories: {} created, {} updated",
        report.categories_created, report.categories_updated
    );
    info!(
        "  Sizes: {} created, {} updated",
        report.sizes_created, report.sizes_updated
    );
    info!(
        "  Products: {} created, {} updated",
        report.products_created, report.products_updated
    );
    if !report.conflicts.is_empty() {
        error!("  Conflicts: {}", report.conflicts.len());
        for conflict in &report.conflicts {
            error!("    - {conflict}");
        }
    }

    Ok(report)
}

async fn apply(pool: &PgPool, seed: &SeedFile) -> Result<SeedReport, SeedError> {
    let mut report = SeedReport::default();

    let categories = CategoryRepository::new(pool);
    for category in &seed.categories {
        let slug = category.slug();
        let name = category.name.trim();
        let description = category.description.trim();
        match categories.get_by_slug(&slug).await? {
            Some(existing) => {
                categories
                    .update(existing.id, name, &slug, description)
                    .await?;
                report.categories_updated += 1;
            }
            None => {
                categories.create(name, &slug, description).await?;
                report.categories_created += 1;
            }
        }
    }

    let sizes = SizeRepository::new(pool);
    let mut sizes_by_name: HashMap<String, Size> = sizes
        .list()
        .await?
        .into_iter()
        .map(|s| (s.name.clone(), s))
        .collect();
    for size in &seed.sizes {
        let name = size.name.trim();
        let saved = match sizes_by_name.get(name) {
            Some(existing) => {
                report.sizes_updated += 1;
                sizes.update(existing.id, name, size.sort_order).await?
            }
            None => {
                report.sizes_created += 1;
                sizes.create(name, size.sort_order).await?
            }
        };
        sizes_by_name.insert(saved.name.clone(), saved);
    }

    // Categories and sizes referenced by products must exist by now
    let mut category_ids: HashMap<&str, CategoryId> = HashMap::new();
    let mut missing = Vec::new();
    for product in &seed.products {
        let key = product.category.trim();
        if !category_ids.contains_key(key) {
            match categories.get_by_slug(key).await? {
                Some(c) => {
                    category_ids.insert(key, c.id);
                }
                None => missing.push(format!(
                    "product '{}': unknown category '{key}'",
                    product.name
                )),
            }
        }
        for size in &product.sizes {
            if !sizes_by_name.contains_key(size.trim()) {
                missing.push(format!("product '{}': unknown size '{size}'", product.name));
            }
        }
    }
    if !missing.is_empty() {
        for err in &missing {
            error!("  - {err}");
        }
        return Err(SeedError::Invalid(missing));
    }

    let products = ProductRepository::new(pool);
    for product in &seed.products {
        let Some(&category_id) = category_ids.get(product.category.trim()) else {
            continue;
        };
        let input = product.input(category_id);

        let result = match products.get_by_slug(&input.slug).await? {
            Some(existing) => products
                .update(existing.id, &input)
                .await
                .map(|p| (p, false)),
            None => products.create(&input).await.map(|p| (p, true)),
        };

        let (saved, created) = match result {
            Ok(saved) => saved,
            Err(RepositoryError::Conflict(msg)) => {
                warn!(sku = %input.sku, slug = %input.slug, "skipping product: {msg}");
                report
                    .conflicts
                    .push(format!("{} ({}): {msg}", input.sku, input.slug));
                continue;
            }
            Err(e) => return Err(e.into()),
        };

        let mut size_ids: Vec<SizeId> = product
            .sizes
            .iter()
            .filter_map(|name| sizes_by_name.get(name.trim()).map(|s| s.id))
            .collect();
        size_ids.sort_by_key(SizeId::as_i32);
        size_ids.dedup();
        sizes.set_for_product(saved.id, &size_ids).await?;

        if created {
            report.products_created += 1;
        } else {
            report.products_updated += 1;
        }
    }

    Ok(report)
}
