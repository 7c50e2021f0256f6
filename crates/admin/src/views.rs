//! View models shared by admin templates.

use tower_sessions::Session;

use meridian_core::OrderStatus;
use meridian_db::Page;

use crate::middleware::take_flash;
use crate::models::{CurrentAdmin, Flash};

/// Navigation sections, used to highlight the current one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    Dashboard,
    Products,
    Categories,
    Sizes,
    Orders,
    Reviews,
    Settings,
}

impl Section {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Dashboard => "dashboard",
            Self::Products => "products",
            Self::Categories => "categories",
            Self::Sizes => "sizes",
            Self::Orders => "orders",
            Self::Reviews => "reviews",
            Self::Settings => "settings",
        }
    }
}

/// Data every page built on `base.html` needs.
#[derive(Debug, Clone)]
pub struct LayoutView {
    pub admin_name: String,
    pub admin_email: String,
    pub section: Section,
    pub flash: Option<Flash>,
}

impl LayoutView {
    /// Build the layout, consuming any pending flash message.
    pub async fn load(session: &Session, admin: &CurrentAdmin, section: Section) -> Self {
        Self {
            admin_name: admin.name.clone(),
            admin_email: admin.email.to_string(),
            section,
            flash: take_flash(session).await,
        }
    }

    /// CSS class for the navigation link to `section`.
    #[must_use]
    pub fn nav_class(&self, section: &str) -> &'static str {
        if self.section.as_str() == section {
            "nav-link active"
        } else {
            "nav-link"
        }
    }
}

/// Previous/next links for a paged listing.
#[derive(Debug, Clone)]
pub struct PaginationView {
    pub page: u32,
    pub total_pages: u32,
    pub total: i64,
    pub prev_url: Option<String>,
    pub next_url: Option<String>,
}

impl PaginationView {
    /// Build links with `url_for(page)` producing the URL of a page.
    pub fn new<T>(page: &Page<T>, url_for: impl Fn(u32) -> String) -> Self {
        Self {
            page: page.page,
            total_pages: page.total_pages(),
            total: page.total,
            prev_url: page.has_prev().then(|| url_for(page.page - 1)),
            next_url: page.has_next().then(|| url_for(page.page + 1)),
        }
    }

    #[must_use]
    pub const fn is_needed(&self) -> bool {
        self.total_pages > 1
    }
}

/// Badge class for an order status.
#[must_use]
pub const fn status_class(status: OrderStatus) -> &'static str {
    match status {
        OrderStatus::Pending | OrderStatus::Processing => "badge badge-warn",
        OrderStatus::Paid | OrderStatus::Shipped | OrderStatus::Delivered => "badge badge-ok",
        OrderStatus::PaymentFailed => "badge badge-bad",
        OrderStatus::Cancelled | OrderStatus::Refunded => "badge badge-muted",
    }
}

/// Public URL of an uploaded file.
#[must_use]
pub fn upload_url(relative: &str) -> String {
    format!("/uploads/{}", relative.trim_start_matches('/'))
}

/// Append `key=value` to a query string under construction, skipping empty values.
pub fn push_query(query: &mut Vec<String>, key: &str, value: Option<&str>) {
    if let Some(value) = value.map(str::trim).filter(|v| !v.is_empty()) {
        query.push(format!("{key}={}", urlencoding::encode(value)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pagination_links() {
        let page = Page {
            items: vec![1, 2],
            page: 1,
            per_page: 2,
            total: 5,
        };
        let view = PaginationView::new(&page, |p| format!("/orders?page={p}"));
        assert_eq!(view.total_pages, 3);
        assert!(view.prev_url.is_none());
        assert_eq!(view.next_url.as_deref(), Some("/orders?page=2"));
    }

    #[test]
    fn test_push_query_encodes_and_skips_blank() {
        let mut query = Vec::new();
        push_query(&mut query, "q", Some("linen & wool"));
        push_query(&mut query, "status", Some("  "));
        push_query(&mut query, "category", None);
        assert_eq!(query, vec!["q=linen%20%26%20wool".to_string()]);
    }

    #[test]
    fn test_nav_class_marks_current_section() {
        let layout = LayoutView {
            admin_name: "Ops".to_string(),
            admin_email: "ops@meridian.shop".to_string(),
            section: Section::Orders,
            flash: None,
        };
        assert_eq!(layout.nav_class("orders"), "nav-link active");
        assert_eq!(layout.nav_class("products"), "nav-link");
    }

    #[test]
    fn test_status_classes() {
        assert_eq!(status_class(OrderStatus::Paid), "badge badge-ok");
        assert_eq!(status_class(OrderStatus::Refunded), "badge badge-muted");
    }
}
