// Marketplace REST payloads
//
// Request and response bodies for the `/api/v1/` surface. The backend's
// serializers omit or null-out fields depending on who is asking (anonymous
// vs owner), so optional fields use `#[serde(default)]` liberally.

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};

/// Primary key of a room.
pub type RoomPk = u64;

// ── Users ────────────────────────────────────────────────────────────

/// The authenticated user (`auth/me`) or a room owner / reviewer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    #[serde(default)]
    pub pk: Option<u64>,
    pub username: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default)]
    pub is_host: bool,
}

impl User {
    /// Name to show for this user: the full name when set, else the username.
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .filter(|name| !name.is_empty())
            .unwrap_or(&self.username)
    }
}

/// Body of `POST auth/login`.
#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

/// Body of `POST auth/login` and OAuth code exchanges on success.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub user: Option<User>,
}

/// Body of `POST auth/{provider}`.
#[derive(Debug, Clone, Serialize)]
pub struct OAuthCode<'a> {
    pub code: &'a str,
}

// ── Rooms ────────────────────────────────────────────────────────────

/// A photo attached to a room.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Photo {
    #[serde(default)]
    pub pk: Option<u64>,
    pub file: String,
    #[serde(default)]
    pub description: String,
}

/// Room as returned by `GET room/`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomSummary {
    pub pk: RoomPk,
    pub name: String,
    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub city: String,
    pub price: u64,
    #[serde(default, deserialize_with = "lenient_rating")]
    pub rating: Option<f64>,
    #[serde(default)]
    pub is_owner: bool,
    #[serde(default)]
    pub photos: Vec<Photo>,
}

impl RoomSummary {
    /// The photo shown on listing cards.
    pub fn cover_photo(&self) -> Option<&Photo> {
        self.photos.first()
    }
}

/// Room as returned by `GET room/{pk}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomDetail {
    pub pk: RoomPk,
    pub name: String,
    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub city: String,
    pub price: u64,
    #[serde(default)]
    pub rooms: u32,
    #[serde(default)]
    pub toilets: u32,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub pet_friendly: bool,
    #[serde(default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub owner: Option<User>,
    #[serde(default)]
    pub amenities: Vec<Amenity>,
    #[serde(default)]
    pub category: Option<Category>,
    #[serde(default, deserialize_with = "lenient_rating")]
    pub rating: Option<f64>,
    #[serde(default)]
    pub is_owner: bool,
    #[serde(default)]
    pub is_liked: bool,
    #[serde(default)]
    pub photos: Vec<Photo>,
}

/// A guest review from `GET room/{pk}/reviews`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Review {
    #[serde(default)]
    pub user: Option<User>,
    pub payload: String,
    pub rating: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Amenity {
    #[serde(default)]
    pub pk: Option<u64>,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    #[serde(default)]
    pub pk: Option<u64>,
    pub name: String,
    #[serde(default)]
    pub kind: Option<String>,
}

/// Body of `POST room/`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateRoomRequest {
    pub name: String,
    pub country: String,
    pub city: String,
    pub price: u64,
    pub rooms: u32,
    pub toilets: u32,
    pub description: String,
    pub address: String,
    #[serde(default)]
    pub pet_friendly: bool,
    pub kind: String,
    pub category: u64,
    #[serde(default)]
    pub amenities: Vec<u64>,
}

// ── Media ────────────────────────────────────────────────────────────

/// One-time direct-upload URL from `POST media/photos/get-url`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct UploadUrl {
    pub id: String,
    #[serde(rename = "uploadURL")]
    pub upload_url: String,
}

/// Response of the image host after a direct upload.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct UploadedImage {
    pub result: UploadedImageResult,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct UploadedImageResult {
    pub id: String,
}

/// Body of `POST room/{pk}/photo`.
#[derive(Debug, Clone, Serialize)]
pub struct CreatePhotoRequest<'a> {
    pub description: &'a str,
    pub file: &'a str,
}

// ── Bookings ─────────────────────────────────────────────────────────

/// Response of `GET room/{pk}/booking/check`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Availability {
    pub ok: bool,
}

/// Body of `POST room/{pk}/booking`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreateBookingRequest {
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub guests: u32,
}

/// A booking as echoed back by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    #[serde(default)]
    pub pk: Option<u64>,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    #[serde(default)]
    pub guests: u32,
}

// ── Helpers ──────────────────────────────────────────────────────────

/// Ratings arrive as a number, a numeric string, or a placeholder string
/// like `"No Reviews"` when the room has none.
fn lenient_rating<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::Number(n)) => n.as_f64(),
        Some(serde_json::Value::String(s)) => s.parse().ok(),
        _ => None,
    })
}
