//! Services container: listing catalog and reviews.
//!
//! Owns the listing slice plus a secondary `reviews` collection. Listing
//! creation is a two-step remote sequence (blob upload, then record write)
//! with no rollback: an upload failure prevents the write entirely, while a
//! write failure after a successful upload leaves the blob orphaned.

use std::sync::{Arc, Mutex, PoisonError};

use chrono::Utc;

use crate::error::{Error, Result};
use crate::gateway::{
    collections::{REVIEWS, SERVICES},
    from_document, to_fields, BlobStore, DocumentStore, Gateway, Query,
};
use crate::types::{ImageUpload, ListingPatch, NewListing, NewReview, Review, ServiceListing};

use super::slice::{Slice, SliceState};

/// Intents the dispatch channel routes to this container
#[derive(Debug, Clone)]
pub enum ServicesIntent {
    List,
    ListByCategory(String),
    GetById(String),
    Create {
        listing: NewListing,
        image: Option<ImageUpload>,
    },
    Update {
        id: String,
        patch: ListingPatch,
        image: Option<ImageUpload>,
    },
    Delete(String),
    CreateReview(NewReview),
    ListReviews {
        service_id: String,
    },
}

pub struct ServicesContainer {
    gateway: Arc<dyn Gateway>,
    slice: Slice<ServiceListing>,
    reviews: Mutex<Vec<Review>>,
}

impl ServicesContainer {
    pub fn new(gateway: Arc<dyn Gateway>) -> Self {
        Self {
            gateway,
            slice: Slice::new(),
            reviews: Mutex::new(Vec::new()),
        }
    }

    /// Snapshot of the listing slice
    pub fn state(&self) -> SliceState<ServiceListing> {
        self.slice.snapshot()
    }

    /// Snapshot of the loaded reviews
    pub fn reviews(&self) -> Vec<Review> {
        self.reviews
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn set_reviews(&self, reviews: Vec<Review>) {
        *self.reviews.lock().unwrap_or_else(PoisonError::into_inner) = reviews;
    }

    pub async fn handle(&self, intent: ServicesIntent) {
        let result = match intent {
            ServicesIntent::List => self.list().await.map(|_| ()),
            ServicesIntent::ListByCategory(tag) => {
                self.list_by_category(&tag).await.map(|_| ())
            }
            ServicesIntent::GetById(id) => self.get_by_id(&id).await.map(|_| ()),
            ServicesIntent::Create { listing, image } => {
                self.create(listing, image).await.map(|_| ())
            }
            ServicesIntent::Update { id, patch, image } => {
                self.update(&id, patch, image).await.map(|_| ())
            }
            ServicesIntent::Delete(id) => self.delete(&id).await,
            ServicesIntent::CreateReview(review) => self.create_review(review).await.map(|_| ()),
            ServicesIntent::ListReviews { service_id } => {
                self.list_reviews(&service_id).await.map(|_| ())
            }
        };

        if let Err(e) = result {
            tracing::debug!(error = %e, "services intent rejected");
        }
    }

    /// Full catalog read, in storage-default order
    pub async fn list(&self) -> Result<Vec<ServiceListing>> {
        self.slice.begin();
        let result = self.fetch(Query::new()).await;
        self.slice
            .settle(result, |state, items| state.items = items.clone())
    }

    /// Equality-filtered catalog read, in storage-default order
    pub async fn list_by_category(&self, tag: &str) -> Result<Vec<ServiceListing>> {
        self.slice.begin();
        let result = self.fetch(Query::new().eq("category", tag)).await;
        self.slice
            .settle(result, |state, items| state.items = items.clone())
    }

    async fn fetch(&self, query: Query) -> Result<Vec<ServiceListing>> {
        let docs = self.gateway.query(SERVICES, &query).await?;
        docs.iter().map(from_document).collect()
    }

    pub async fn get_by_id(&self, id: &str) -> Result<ServiceListing> {
        self.slice.begin();
        let result = self.read_listing(id).await;
        self.slice
            .settle(result, |state, listing| state.current = Some(listing.clone()))
    }

    async fn read_listing(&self, id: &str) -> Result<ServiceListing> {
        match self.gateway.get(SERVICES, id).await? {
            Some(doc) => from_document(&doc),
            None => Err(Error::NotFound(format!("service not found: {}", id))),
        }
    }

    /// Create a listing, uploading the image first when one is supplied.
    /// The upload must succeed before the record write is attempted.
    pub async fn create(
        &self,
        listing: NewListing,
        image: Option<ImageUpload>,
    ) -> Result<ServiceListing> {
        self.slice.begin();
        let result = self.do_create(listing, image).await;
        self.slice.settle(result, |state, listing| {
            state.items.push(listing.clone());
            state.current = Some(listing.clone());
        })
    }

    async fn do_create(
        &self,
        listing: NewListing,
        image: Option<ImageUpload>,
    ) -> Result<ServiceListing> {
        listing.validate()?;

        let image_url = match image {
            Some(image) => self.upload_image(&image).await?,
            None => String::new(),
        };

        let mut record = ServiceListing {
            id: String::new(),
            provider_id: listing.provider_id,
            title: listing.title,
            description: listing.description,
            category: listing.category,
            price: listing.price,
            image_url,
            location: listing.location,
            rating: 0.0,
            review_count: 0,
            created_at: Utc::now(),
        };
        record.id = self
            .gateway
            .insert(SERVICES, to_fields(&record)?)
            .await?;

        tracing::info!(service_id = %record.id, category = %record.category, "listing created");
        Ok(record)
    }

    async fn upload_image(&self, image: &ImageUpload) -> Result<String> {
        let path = format!(
            "services/{}_{}",
            Utc::now().timestamp_millis(),
            image.file_name
        );
        self.gateway.upload(&path, &image.bytes).await
    }

    /// Shallow-merge the supplied fields; an optional new image upload
    /// overwrites the stored URL. Fulfills with the stored result.
    pub async fn update(
        &self,
        id: &str,
        patch: ListingPatch,
        image: Option<ImageUpload>,
    ) -> Result<ServiceListing> {
        self.slice.begin();
        let result = self.do_update(id, patch, image).await;
        self.slice.settle(result, |state, listing| {
            if let Some(existing) = state.items.iter_mut().find(|l| l.id == listing.id) {
                *existing = listing.clone();
            }
            state.current = Some(listing.clone());
        })
    }

    async fn do_update(
        &self,
        id: &str,
        mut patch: ListingPatch,
        image: Option<ImageUpload>,
    ) -> Result<ServiceListing> {
        patch.validate()?;

        if let Some(image) = image {
            patch.image_url = Some(self.upload_image(&image).await?);
        }

        self.gateway.update(SERVICES, id, to_fields(&patch)?).await?;
        self.read_listing(id).await
    }

    /// Remove the listing. Bookings referencing it are not cascaded.
    pub async fn delete(&self, id: &str) -> Result<()> {
        self.slice.begin();
        let result = self.gateway.delete(SERVICES, id).await;
        let id = id.to_string();
        self.slice.settle(result, move |state, _| {
            state.items.retain(|l| l.id != id);
            if state.current.as_ref().is_some_and(|l| l.id == id) {
                state.current = None;
            }
        })
    }

    /// Create a review for a booked service. Listing aggregates are not
    /// touched here; the gateway platform maintains them.
    pub async fn create_review(&self, review: NewReview) -> Result<Review> {
        self.slice.begin();
        let result = self.do_create_review(review).await;
        let result = self.slice.settle(result, |_, _| {});
        if let Ok(review) = &result {
            let mut reviews = self.reviews();
            reviews.push(review.clone());
            self.set_reviews(reviews);
        }
        result
    }

    async fn do_create_review(&self, review: NewReview) -> Result<Review> {
        review.validate()?;

        let mut record = Review {
            id: String::new(),
            service_id: review.service_id,
            booking_id: review.booking_id,
            customer_id: review.customer_id,
            provider_id: review.provider_id,
            rating: review.rating,
            comment: review.comment,
            created_at: Utc::now(),
        };
        record.id = self.gateway.insert(REVIEWS, to_fields(&record)?).await?;
        Ok(record)
    }

    /// All reviews for one service, in storage-default order
    pub async fn list_reviews(&self, service_id: &str) -> Result<Vec<Review>> {
        self.slice.begin();
        let result = self.fetch_reviews(service_id).await;
        let result = self.slice.settle(result, |_, _| {});
        if let Ok(reviews) = &result {
            self.set_reviews(reviews.clone());
        }
        result
    }

    async fn fetch_reviews(&self, service_id: &str) -> Result<Vec<Review>> {
        let docs = self
            .gateway
            .query(REVIEWS, &Query::new().eq("service_id", service_id))
            .await?;
        docs.iter().map(from_document::<Review>).collect()
    }
}
