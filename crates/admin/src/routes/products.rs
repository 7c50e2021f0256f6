//! Product management route handlers.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form, Router,
    body::Bytes,
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use meridian_core::types::money::format_amount;
use meridian_core::{CategoryId, ProductId};
use meridian_db::models::Product;
use meridian_db::products::ProductFilter;
use meridian_db::{CategoryRepository, Paging, ProductRepository, SizeRepository, SettingsRepository};

use crate::error::{AppError, Result};
use crate::filters;
use crate::forms::{FieldErrors, ProductForm, StockForm};
use crate::middleware::{RequireAdminAuth, set_flash};
use crate::models::{CurrentAdmin, Flash};
use crate::services::Upload;
use crate::state::AppState;
use crate::views::{LayoutView, PaginationView, Section, push_query, upload_url};

const PER_PAGE: u32 = 25;

/// Multipart field carrying the product image.
const IMAGE_FIELD: &str = "image";

/// Product row in the listing.
#[derive(Debug, Clone)]
pub struct ProductRowView {
    pub id: i32,
    pub name: String,
    pub sku: String,
    pub price: String,
    pub stock: i32,
    pub is_active: bool,
    pub is_featured: bool,
    pub thumbnail: Option<String>,
}

/// Select or checkbox option.
#[derive(Debug, Clone)]
pub struct OptionView {
    pub id: i32,
    pub name: String,
    pub selected: bool,
}

/// Product listing template.
#[derive(Template, WebTemplate)]
#[template(path = "products/index.html")]
pub struct ProductsIndexTemplate {
    pub layout: LayoutView,
    pub products: Vec<ProductRowView>,
    pub categories: Vec<OptionView>,
    pub query: String,
    pub pagination: PaginationView,
}

/// Product editor template, used for both new and existing products.
#[derive(Template, WebTemplate)]
#[template(path = "products/form.html")]
pub struct ProductFormTemplate {
    pub layout: LayoutView,
    pub title: String,
    pub action: String,
    /// Set when editing, enables the image and stock panels.
    pub product_id: Option<i32>,
    pub image_url: Option<String>,
    pub stock: i32,
    pub form: ProductForm,
    pub errors: FieldErrors,
    pub categories: Vec<OptionView>,
    pub sizes: Vec<OptionView>,
}

/// Query parameters for the product listing.
#[derive(Debug, Default, Deserialize)]
pub struct ProductsQuery {
    pub q: Option<String>,
    pub category: Option<String>,
    pub page: Option<u32>,
}

/// Build the products router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/products", get(index).post(create))
        .route("/products/new", get(new_product))
        .route("/products/{id}", post(update))
        .route("/products/{id}/edit", get(edit))
        .route("/products/{id}/delete", post(delete))
        .route("/products/{id}/image", post(upload_image))
        .route("/products/{id}/stock", post(adjust_stock))
}

/// Product listing with search, category filter and paging.
///
/// GET /products
#[instrument(skip(admin, state, session))]
async fn index(
    RequireAdminAuth(admin): RequireAdminAuth,
    State(state): State<AppState>,
    session: Session,
    Query(query): Query<ProductsQuery>,
) -> Result<ProductsIndexTemplate> {
    let pool = state.pool();
    let settings = SettingsRepository::new(pool).store_settings().await?;
    let category_id = query
        .category
        .as_deref()
        .and_then(|c| c.trim().parse::<i32>().ok())
        .map(CategoryId::new);
    let search = query.q.clone().unwrap_or_default();

    let page = ProductRepository::new(pool)
        .list(&ProductFilter {
            category_id,
            search: Some(search.clone()),
            paging: Paging::new(query.page, PER_PAGE),
            ..ProductFilter::default()
        })
        .await?;

    let categories = CategoryRepository::new(pool)
        .list(false)
        .await?
        .into_iter()
        .map(|c| OptionView {
            id: c.category.id.as_i32(),
            selected: Some(c.category.id) == category_id,
            name: c.category.name,
        })
        .collect();

    let pagination = PaginationView::new(&page, |p| {
        let mut params = Vec::new();
        push_query(&mut params, "q", query.q.as_deref());
        push_query(&mut params, "category", query.category.as_deref());
        params.push(format!("page={p}"));
        format!("/products?{}", params.join("&"))
    });

    let products = page
        .items
        .iter()
        .map(|p| ProductRowView {
            id: p.id.as_i32(),
            name: p.name.clone(),
            sku: p.sku.clone(),
            price: format_amount(p.price, settings.currency),
            stock: p.stock,
            is_active: p.is_active,
            is_featured: p.is_featured,
            thumbnail: p.image_path.as_deref().map(upload_url),
        })
        .collect();

    Ok(ProductsIndexTemplate {
        layout: LayoutView::load(&session, &admin, Section::Products).await,
        products,
        categories,
        query: search,
        pagination,
    })
}

/// Blank product editor.
///
/// GET /products/new
async fn new_product(
    RequireAdminAuth(admin): RequireAdminAuth,
    State(state): State<AppState>,
    session: Session,
) -> Result<ProductFormTemplate> {
    render_form(&state, &session, &admin, None, ProductForm::new_product(), FieldErrors::default()).await
}

/// Create a product.
///
/// POST /products
#[instrument(skip(admin, state, session, body))]
async fn create(
    RequireAdminAuth(admin): RequireAdminAuth,
    State(state): State<AppState>,
    session: Session,
    body: Bytes,
) -> Result<Response> {
    let form = ProductForm::from_body(&body);
    let (input, size_ids) = match form.validate() {
        Ok(valid) => valid,
        Err(errors) => return invalid(&state, &session, &admin, None, form, errors).await,
    };

    let product = match ProductRepository::new(state.pool()).create(&input).await {
        Ok(product) => product,
        Err(e) => {
            let errors = FieldErrors::from_conflict(e, ProductForm::UNIQUE_FIELDS)?;
            return invalid(&state, &session, &admin, None, form, errors).await;
        }
    };
    SizeRepository::new(state.pool())
        .set_for_product(product.id, &size_ids)
        .await?;

    tracing::info!(product_id = %product.id, sku = %product.sku, "product created");
    set_flash(&session, Flash::success(format!("Created {}.", product.name))).await;
    Ok(Redirect::to(&format!("/products/{}/edit", product.id)).into_response())
}

/// Product editor for an existing product.
///
/// GET /products/{id}/edit
async fn edit(
    RequireAdminAuth(admin): RequireAdminAuth,
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<i32>,
) -> Result<ProductFormTemplate> {
    let product = find_product(&state, id).await?;
    let sizes = SizeRepository::new(state.pool())
        .list_for_product(product.id)
        .await?;
    let form = ProductForm::from_product(&product, &sizes);
    render_form(&state, &session, &admin, Some(&product), form, FieldErrors::default()).await
}

/// Save changes to a product.
///
/// POST /products/{id}
#[instrument(skip(admin, state, session, body))]
async fn update(
    RequireAdminAuth(admin): RequireAdminAuth,
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<i32>,
    body: Bytes,
) -> Result<Response> {
    let product = find_product(&state, id).await?;
    let mut form = ProductForm::from_body(&body);
    // Stock only moves through adjustments; the edit form does not post it.
    form.stock = product.stock.to_string();
    let (input, size_ids) = match form.validate() {
        Ok(valid) => valid,
        Err(errors) => return invalid(&state, &session, &admin, Some(&product), form, errors).await,
    };

    let updated = match ProductRepository::new(state.pool())
        .update(product.id, &input)
        .await
    {
        Ok(updated) => updated,
        Err(e) => {
            let errors = FieldErrors::from_conflict(e, ProductForm::UNIQUE_FIELDS)?;
            return invalid(&state, &session, &admin, Some(&product), form, errors).await;
        }
    };
    SizeRepository::new(state.pool())
        .set_for_product(updated.id, &size_ids)
        .await?;

    tracing::info!(product_id = %updated.id, "product updated");
    set_flash(&session, Flash::success("Product saved.")).await;
    Ok(Redirect::to(&format!("/products/{}/edit", updated.id)).into_response())
}

/// Delete a product and its image.
///
/// POST /products/{id}/delete
#[instrument(skip(_admin, state, session))]
async fn delete(
    RequireAdminAuth(_admin): RequireAdminAuth,
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<i32>,
) -> Result<Redirect> {
    let id = ProductId::new(id);
    let image = ProductRepository::new(state.pool()).delete(id).await?;
    if let Some(path) = image {
        remove_image(&state, &path).await;
    }

    tracing::info!(product_id = %id, "product deleted");
    set_flash(&session, Flash::success("Product deleted.")).await;
    Ok(Redirect::to("/products"))
}

/// Replace a product's image.
///
/// POST /products/{id}/image
#[instrument(skip(_admin, state, session, multipart))]
async fn upload_image(
    RequireAdminAuth(_admin): RequireAdminAuth,
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<i32>,
    mut multipart: Multipart,
) -> Result<Redirect> {
    let product = find_product(&state, id).await?;
    let back = format!("/products/{}/edit", product.id);

    let mut file = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?
    {
        if field.name() != Some(IMAGE_FIELD) {
            continue;
        }
        let file_name = field.file_name().unwrap_or_default().to_string();
        let content_type = field.content_type().unwrap_or_default().to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::BadRequest(e.to_string()))?;
        file = Some((file_name, content_type, bytes));
        break;
    }

    let Some((file_name, content_type, bytes)) = file else {
        set_flash(&session, Flash::error("Choose an image to upload.")).await;
        return Ok(Redirect::to(&back));
    };
    let upload = Upload {
        file_name: &file_name,
        content_type: &content_type,
        bytes: &bytes,
    };

    let relative = match state.uploads().save(&upload).await {
        Ok(relative) => relative,
        Err(e) if e.is_user_error() => {
            set_flash(&session, Flash::error(e.to_string())).await;
            return Ok(Redirect::to(&back));
        }
        Err(e) => return Err(e.into()),
    };

    let previous = match ProductRepository::new(state.pool())
        .set_image(product.id, Some(&relative))
        .await
    {
        Ok(previous) => previous,
        Err(e) => {
            remove_image(&state, &relative).await;
            return Err(e.into());
        }
    };
    if let Some(old) = previous {
        remove_image(&state, &old).await;
    }

    tracing::info!(product_id = %product.id, path = %relative, "product image replaced");
    set_flash(&session, Flash::success("Image uploaded.")).await;
    Ok(Redirect::to(&back))
}

/// Apply a signed stock adjustment.
///
/// POST /products/{id}/stock
#[instrument(skip(_admin, state, session, form))]
async fn adjust_stock(
    RequireAdminAuth(_admin): RequireAdminAuth,
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<i32>,
    Form(form): Form<StockForm>,
) -> Result<Redirect> {
    let id = ProductId::new(id);
    let back = format!("/products/{id}/edit");

    let delta = match form.validate() {
        Ok(delta) => delta,
        Err(errors) => {
            set_flash(&session, Flash::error(errors.summary())).await;
            return Ok(Redirect::to(&back));
        }
    };

    let stock = ProductRepository::new(state.pool())
        .adjust_stock(id, delta)
        .await?;
    tracing::info!(product_id = %id, delta, stock, "stock adjusted");
    set_flash(&session, Flash::success(format!("Stock is now {stock}."))).await;
    Ok(Redirect::to(&back))
}

async fn find_product(state: &AppState, id: i32) -> Result<Product> {
    ProductRepository::new(state.pool())
        .get_by_id(ProductId::new(id))
        .await?
        .ok_or_else(|| AppError::NotFound(format!("product {id}")))
}

/// Deleting a file that is already gone is not worth failing a request over.
async fn remove_image(state: &AppState, relative: &str) {
    if let Err(e) = state.uploads().remove(relative).await {
        tracing::warn!(error = %e, path = %relative, "failed to remove product image");
    }
}

/// Re-render the editor with validation messages.
async fn invalid(
    state: &AppState,
    session: &Session,
    admin: &CurrentAdmin,
    product: Option<&Product>,
    form: ProductForm,
    errors: FieldErrors,
) -> Result<Response> {
    let page = render_form(state, session, admin, product, form, errors).await?;
    Ok((StatusCode::UNPROCESSABLE_ENTITY, page).into_response())
}

async fn render_form(
    state: &AppState,
    session: &Session,
    admin: &CurrentAdmin,
    product: Option<&Product>,
    form: ProductForm,
    errors: FieldErrors,
) -> Result<ProductFormTemplate> {
    let pool = state.pool();
    let categories = CategoryRepository::new(pool)
        .list(false)
        .await?
        .into_iter()
        .map(|c| {
            let id = c.category.id.as_i32();
            OptionView {
                id,
                name: c.category.name,
                selected: form.is_category(&id),
            }
        })
        .collect();
    let sizes = SizeRepository::new(pool)
        .list()
        .await?
        .into_iter()
        .map(|s| {
            let id = s.id.as_i32();
            OptionView {
                id,
                name: s.name,
                selected: form.has_size(&id),
            }
        })
        .collect();

    let (title, action) = match product {
        Some(p) => (format!("Edit {}", p.name), format!("/products/{}", p.id)),
        None => ("New product".to_string(), "/products".to_string()),
    };

    Ok(ProductFormTemplate {
        layout: LayoutView::load(session, admin, Section::Products).await,
        title,
        action,
        product_id: product.map(|p| p.id.as_i32()),
        image_url: product.and_then(|p| p.image_path.as_deref()).map(upload_url),
        stock: product.map_or(0, |p| p.stock),
        form,
        errors,
        categories,
        sizes,
    })
}
