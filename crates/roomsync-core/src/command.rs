// ── Command API ──
//
// Every write against the marketplace flows through a unified `Command`
// enum. Each variant names the cached reads it makes stale once it
// succeeds; the facade routes it to the right endpoint.

use chrono::NaiveDate;
use secrecy::SecretString;

use roomsync_api::OAuthProvider;
use roomsync_api::models::{Booking, CreateRoomRequest, Photo, RoomDetail, RoomPk, User};

use crate::query_key;
use crate::store::KeyMatch;

/// All write operations against the marketplace backend.
#[derive(Debug, Clone)]
pub enum Command {
    // ── Session ──────────────────────────────────────────────────────
    Login {
        email: String,
        password: SecretString,
    },
    OAuthLogin {
        provider: OAuthProvider,
        code: String,
    },
    Logout,

    // ── Hosting ──────────────────────────────────────────────────────
    CreateRoom(CreateRoomRequest),
    /// Get an upload URL, push the bytes to the image host, then attach
    /// the delivered image to the room.
    UploadRoomPhoto {
        room: RoomPk,
        file_name: String,
        bytes: Vec<u8>,
        description: String,
    },

    // ── Bookings ─────────────────────────────────────────────────────
    CreateBooking {
        room: RoomPk,
        check_in: NaiveDate,
        check_out: NaiveDate,
        guests: u32,
    },
}

impl Command {
    /// Stable name used in logs and mutation events.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Login { .. } => "login",
            Self::OAuthLogin { .. } => "oauth_login",
            Self::Logout => "logout",
            Self::CreateRoom(_) => "create_room",
            Self::UploadRoomPhoto { .. } => "upload_room_photo",
            Self::CreateBooking { .. } => "create_booking",
        }
    }

    /// Cached reads made stale by a successful run.
    pub fn invalidations(&self) -> Vec<KeyMatch> {
        match self {
            Self::Login { .. } | Self::OAuthLogin { .. } | Self::Logout => {
                vec![KeyMatch::Exact(query_key!["me"])]
            }
            Self::CreateRoom(_) => vec![KeyMatch::Prefix(query_key!["rooms"])],
            Self::UploadRoomPhoto { room, .. } => {
                vec![KeyMatch::Exact(query_key!["rooms", *room])]
            }
            Self::CreateBooking { room, .. } => vec![
                KeyMatch::Prefix(query_key!["check", *room]),
                KeyMatch::Exact(query_key!["rooms", *room]),
            ],
        }
    }
}

/// Result of a successfully executed [`Command`].
#[derive(Debug, Clone)]
pub enum CommandResult {
    Ok,
    LoggedIn(Option<User>),
    Room(RoomDetail),
    Photo(Photo),
    Booking(Booking),
}
