//! Shared API response types

use serde::Serialize;

use crate::models::{Attraction, PagedResult};
use crate::services::messages::Message;

/// Paginated list response
#[derive(Debug, Serialize)]
pub struct PagedResponse<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: u32,
    pub per_page: u32,
    pub total_pages: u32,
    pub has_next: bool,
    pub has_prev: bool,
}

impl<T> From<PagedResult<T>> for PagedResponse<T> {
    fn from(result: PagedResult<T>) -> Self {
        Self {
            total_pages: result.total_pages(),
            has_next: result.has_next(),
            has_prev: result.has_prev(),
            total: result.total,
            page: result.page,
            per_page: result.per_page,
            items: result.items,
        }
    }
}

/// Any body plus the notices to show alongside it
#[derive(Debug, Serialize)]
pub struct WithMessages<T> {
    #[serde(flatten)]
    pub body: T,
    pub messages: Vec<Message>,
}

impl<T> WithMessages<T> {
    pub fn new(body: T, message: Message) -> Self {
        Self {
            body,
            messages: vec![message],
        }
    }
}

/// An attraction with its public image URL
#[derive(Debug, Serialize)]
pub struct AttractionResponse {
    #[serde(flatten)]
    pub attraction: Attraction,
    pub image_url: Option<String>,
}

impl From<Attraction> for AttractionResponse {
    fn from(attraction: Attraction) -> Self {
        Self {
            image_url: attraction.image_url(),
            attraction,
        }
    }
}

/// Category choice for filter and form controls
#[derive(Debug, Serialize)]
pub struct CategoryChoice {
    pub code: &'static str,
    pub label: &'static str,
}
