//! Cart route handlers.
//!
//! Forms post and redirect back with a flash message. Requests sent by HTMX
//! (`HX-Request` header) get the cart count fragment instead, with an
//! `HX-Trigger: cart-updated` header so other elements can refresh.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{AppendHeaders, IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use meridian_core::types::money::format_amount;
use meridian_core::{ProductId, SizeId};

use crate::error::{AppError, Result, add_breadcrumb};
use crate::filters;
use crate::middleware::{OptionalAuth, safe_return_path, set_flash};
use crate::models::Flash;
use crate::services::cart::{CartError, CartItem, CartOwner, CartService};
use crate::services::promotion;
use crate::state::AppState;
use crate::views::{LayoutView, upload_url};

/// Cart line display data for templates.
#[derive(Clone)]
pub struct CartItemView {
    pub product_id: i32,
    pub size_id: Option<i32>,
    pub name: String,
    pub slug: String,
    pub size_name: Option<String>,
    pub image_url: Option<String>,
    pub unit_price: String,
    pub line_total: String,
    pub quantity: u32,
    pub available: bool,
    pub notice: Option<String>,
}

impl CartItemView {
    fn new(
        item: &CartItem,
        problem: Option<&CartError>,
        currency: meridian_core::CurrencyCode,
    ) -> Self {
        let notice = match problem {
            Some(CartError::InsufficientStock { available, .. }) => {
                Some(format!("Only {available} left"))
            }
            Some(_) => Some("No longer available".to_string()),
            None => None,
        };

        Self {
            product_id: item.product_id.as_i32(),
            size_id: item.size_id.map(|s| s.as_i32()),
            name: item.product_name.clone(),
            slug: item.product_slug.clone(),
            size_name: item.size_name.clone(),
            image_url: item.image_path.as_deref().map(upload_url),
            unit_price: format_amount(item.unit_price, currency),
            line_total: format_amount(item.line_total(), currency),
            quantity: item.quantity,
            available: problem.is_none(),
            notice,
        }
    }
}

/// Cart page template.
#[derive(Template, WebTemplate)]
#[template(path = "cart/show.html")]
pub struct CartShowTemplate {
    pub layout: LayoutView,
    pub items: Vec<CartItemView>,
    pub item_count: u32,
    pub subtotal: String,
    pub shipping: String,
    pub tax: String,
    pub total: String,
    pub free_shipping_message: Option<String>,
    pub can_checkout: bool,
    pub guest: bool,
}

/// Cart count badge fragment template (for HTMX).
#[derive(Template, WebTemplate)]
#[template(path = "partials/cart_count.html")]
pub struct CartCountTemplate {
    pub count: u32,
}

/// Add to cart form data.
#[derive(Debug, Deserialize)]
pub struct AddToCartForm {
    pub product_id: i32,
    /// Empty when the product has no sizes.
    pub size_id: Option<String>,
    pub quantity: Option<u32>,
    pub return_to: Option<String>,
}

/// Update cart form data.
#[derive(Debug, Deserialize)]
pub struct UpdateCartForm {
    pub product_id: i32,
    pub size_id: Option<String>,
    pub quantity: u32,
}

/// Remove from cart form data.
#[derive(Debug, Deserialize)]
pub struct RemoveFromCartForm {
    pub product_id: i32,
    pub size_id: Option<String>,
}

fn parse_size(value: Option<&str>) -> Option<SizeId> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .and_then(|v| v.parse().ok())
        .map(SizeId::new)
}

fn is_htmx(headers: &HeaderMap) -> bool {
    headers.contains_key("HX-Request")
}

/// Turn shopper-facing cart errors into a flash; pass internal ones up.
async fn flash_cart_error(session: &Session, err: CartError) -> Result<()> {
    if err.is_internal() {
        return Err(err.into());
    }
    set_flash(session, Flash::error(err.to_string())).await;
    Ok(())
}

/// Display cart page.
#[instrument(skip(state, session, user))]
pub async fn show(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(user): OptionalAuth,
) -> Result<CartShowTemplate> {
    let settings = state.store_settings().await?;
    let owner = CartOwner::resolve(user.as_ref(), &session);
    let summary = CartService::new(state.pool())
        .summary(owner, &settings.pricing_rules())
        .await?;
    let guest = user.is_none();
    let layout = LayoutView::load(&state, &session, user).await?;

    let currency = settings.currency;
    let totals = summary.totals;
    Ok(CartShowTemplate {
        layout,
        items: summary
            .items
            .iter()
            .map(|i| CartItemView::new(i, summary.problem_with(i).as_ref(), currency))
            .collect(),
        item_count: totals.item_count,
        subtotal: format_amount(totals.subtotal, currency),
        shipping: format_amount(totals.shipping, currency),
        tax: format_amount(totals.tax, currency),
        total: format_amount(totals.total, currency),
        free_shipping_message: promotion::free_shipping_message(&settings, totals.subtotal),
        can_checkout: !summary.is_empty() && summary.first_problem().is_none(),
        guest,
    })
}

/// Add item to cart.
#[instrument(skip(state, session, user, headers))]
pub async fn add(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(user): OptionalAuth,
    headers: HeaderMap,
    Form(form): Form<AddToCartForm>,
) -> Result<Response> {
    let owner = CartOwner::resolve(user.as_ref(), &session);
    let cart = CartService::new(state.pool());
    let product_id = ProductId::new(form.product_id);
    let quantity = form.quantity.unwrap_or(1);

    let result = cart
        .add(owner, product_id, parse_size(form.size_id.as_deref()), quantity)
        .await;

    if is_htmx(&headers) {
        return match result {
            Ok(_) => {
                let count = cart.item_count(owner).await?;
                Ok((
                    AppendHeaders([("HX-Trigger", "cart-updated")]),
                    CartCountTemplate { count },
                )
                    .into_response())
            }
            Err(e) if !e.is_internal() => {
                Ok((StatusCode::UNPROCESSABLE_ENTITY, e.to_string()).into_response())
            }
            Err(e) => Err(e.into()),
        };
    }

    match result {
        Ok(_) => {
            add_breadcrumb(
                "cart",
                "Added to cart",
                Some(&[("product_id", &form.product_id.to_string())]),
            );
            set_flash(&session, Flash::success("Added to your cart.")).await;
            Ok(Redirect::to("/cart").into_response())
        }
        Err(e) => {
            flash_cart_error(&session, e).await?;
            let back = form
                .return_to
                .as_deref()
                .map_or("/cart", |p| safe_return_path(Some(p)));
            Ok(Redirect::to(back).into_response())
        }
    }
}

/// Update cart item quantity. Zero removes the line.
#[instrument(skip(state, session, user))]
pub async fn update(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(user): OptionalAuth,
    Form(form): Form<UpdateCartForm>,
) -> Result<Redirect> {
    let owner = CartOwner::resolve(user.as_ref(), &session);
    let result = CartService::new(state.pool())
        .set_quantity(
            owner,
            ProductId::new(form.product_id),
            parse_size(form.size_id.as_deref()),
            form.quantity,
        )
        .await;

    match result {
        Ok(()) => set_flash(&session, Flash::success("Cart updated.")).await,
        Err(e) => flash_cart_error(&session, e).await?,
    }
    Ok(Redirect::to("/cart"))
}

/// Remove item from cart.
#[instrument(skip(state, session, user))]
pub async fn remove(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(user): OptionalAuth,
    Form(form): Form<RemoveFromCartForm>,
) -> Result<Redirect> {
    let owner = CartOwner::resolve(user.as_ref(), &session);
    let result = CartService::new(state.pool())
        .remove(
            owner,
            ProductId::new(form.product_id),
            parse_size(form.size_id.as_deref()),
        )
        .await;

    match result {
        Ok(()) => set_flash(&session, Flash::info("Item removed.")).await,
        Err(e) => flash_cart_error(&session, e).await?,
    }
    Ok(Redirect::to("/cart"))
}

/// Get cart count badge (HTMX).
#[instrument(skip(state, session, user))]
pub async fn count(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(user): OptionalAuth,
) -> Result<CartCountTemplate> {
    let owner = CartOwner::resolve(user.as_ref(), &session);
    let count = CartService::new(state.pool())
        .item_count(owner)
        .await
        .map_err(AppError::from)?;
    Ok(CartCountTemplate { count })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_size() {
        assert_eq!(parse_size(Some("3")), Some(SizeId::new(3)));
        assert_eq!(parse_size(Some("")), None);
        assert_eq!(parse_size(Some("abc")), None);
        assert_eq!(parse_size(None), None);
    }

    #[test]
    fn test_is_htmx() {
        let mut headers = HeaderMap::new();
        assert!(!is_htmx(&headers));
        headers.insert("HX-Request", "true".parse().unwrap_or_else(|_| unreachable!()));
        assert!(is_htmx(&headers));
    }
}
