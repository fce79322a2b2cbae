//! Room browsing handlers.

use tabled::Tabled;

use roomsync_core::{Marketplace, Review, RoomDetail, RoomSummary};

use crate::cli::{GlobalOpts, RoomsArgs, RoomsCommand};
use crate::error::CliError;
use crate::output;

use super::util::or_dash;

// ── Table rows ──────────────────────────────────────────────────────

#[derive(Tabled)]
struct RoomRow {
    #[tabled(rename = "PK")]
    pk: u64,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "City")]
    city: String,
    #[tabled(rename = "Country")]
    country: String,
    #[tabled(rename = "Price")]
    price: u64,
    #[tabled(rename = "Rating")]
    rating: String,
    #[tabled(rename = "Photos")]
    photos: usize,
}

impl From<&RoomSummary> for RoomRow {
    fn from(r: &RoomSummary) -> Self {
        Self {
            pk: r.pk,
            name: r.name.clone(),
            city: r.city.clone(),
            country: r.country.clone(),
            price: r.price,
            rating: or_dash(r.rating.map(|v| format!("{v:.1}"))),
            photos: r.photos.len(),
        }
    }
}

#[derive(Tabled)]
struct ReviewRow {
    #[tabled(rename = "User")]
    user: String,
    #[tabled(rename = "Rating")]
    rating: u8,
    #[tabled(rename = "Review")]
    payload: String,
}

impl From<&Review> for ReviewRow {
    fn from(r: &Review) -> Self {
        Self {
            user: or_dash(r.user.as_ref().map(|u| u.display_name().to_owned())),
            rating: r.rating,
            payload: r.payload.clone(),
        }
    }
}

fn room_detail(r: &RoomDetail) -> String {
    let amenities = r
        .amenities
        .iter()
        .map(|a| a.name.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    output::detail_lines(&[
        ("PK", r.pk.to_string()),
        ("Name", r.name.clone()),
        ("Location", format!("{}, {}", r.city, r.country)),
        ("Address", r.address.clone()),
        ("Price", r.price.to_string()),
        ("Rooms", r.rooms.to_string()),
        ("Toilets", r.toilets.to_string()),
        ("Kind", or_dash(r.kind.as_deref())),
        ("Category", or_dash(r.category.as_ref().map(|c| c.name.as_str()))),
        ("Pet friendly", r.pet_friendly.to_string()),
        ("Host", or_dash(r.owner.as_ref().map(|o| o.display_name()))),
        ("Rating", or_dash(r.rating.map(|v| format!("{v:.1}")))),
        ("Amenities", amenities),
        ("Photos", r.photos.len().to_string()),
        ("Description", r.description.clone()),
    ])
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(
    marketplace: &Marketplace,
    args: RoomsArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let out = match args.command {
        RoomsCommand::List => {
            let rooms = marketplace.load_rooms().await?;
            output::render_list(
                &global.output,
                rooms.as_slice(),
                |r| RoomRow::from(r),
                |r| r.pk.to_string(),
            )
        }
        RoomsCommand::Show { room } => {
            let room = marketplace.load_room(room).await?;
            output::render_single(&global.output, room.as_ref(), room_detail, |r| {
                r.pk.to_string()
            })
        }
        RoomsCommand::Reviews { room } => {
            let reviews = marketplace.load_reviews(room).await?;
            output::render_list(
                &global.output,
                reviews.as_slice(),
                |r| ReviewRow::from(r),
                |r| r.payload.clone(),
            )
        }
    };
    output::print_output(&out, global.quiet);
    Ok(())
}
