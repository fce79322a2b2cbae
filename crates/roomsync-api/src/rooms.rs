// Room catalogue endpoints
//
// Listing, detail, reviews, and the lookup tables (amenities, categories)
// a host needs when creating a room.

use tracing::debug;

use crate::client::ApiClient;
use crate::error::Error;
use crate::models::{Amenity, Category, CreateRoomRequest, Review, RoomDetail, RoomPk, RoomSummary};

impl ApiClient {
    /// List all rooms.
    ///
    /// `GET room/`
    pub async fn list_rooms(&self) -> Result<Vec<RoomSummary>, Error> {
        let url = self.api_url("room/")?;
        debug!("listing rooms");
        self.get(url).await
    }

    /// Fetch the detail view of one room.
    ///
    /// `GET room/{pk}`
    pub async fn get_room(&self, pk: RoomPk) -> Result<RoomDetail, Error> {
        let url = self.api_url(&format!("room/{pk}"))?;
        self.get(url).await
    }

    /// `GET room/{pk}/reviews`
    pub async fn room_reviews(&self, pk: RoomPk) -> Result<Vec<Review>, Error> {
        let url = self.api_url(&format!("room/{pk}/reviews"))?;
        self.get(url).await
    }

    /// `GET room/amenity`
    pub async fn list_amenities(&self) -> Result<Vec<Amenity>, Error> {
        let url = self.api_url("room/amenity")?;
        self.get(url).await
    }

    /// `GET category`
    pub async fn list_categories(&self) -> Result<Vec<Category>, Error> {
        let url = self.api_url("category")?;
        self.get(url).await
    }

    /// Create a room owned by the current user.
    ///
    /// `POST room/` (CSRF)
    pub async fn create_room(&self, body: &CreateRoomRequest) -> Result<RoomDetail, Error> {
        let url = self.api_url("room/")?;
        debug!(name = %body.name, "creating room");
        self.post(url, body).await
    }
}
