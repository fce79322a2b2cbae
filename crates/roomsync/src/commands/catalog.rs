//! Amenity and category handlers.

use tabled::Tabled;

use roomsync_core::{Amenity, Category, Marketplace};

use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::output;

use super::util::or_dash;

#[derive(Tabled)]
struct AmenityRow {
    #[tabled(rename = "PK")]
    pk: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Description")]
    description: String,
}

impl From<&Amenity> for AmenityRow {
    fn from(a: &Amenity) -> Self {
        Self {
            pk: or_dash(a.pk),
            name: a.name.clone(),
            description: a.description.clone().unwrap_or_default(),
        }
    }
}

#[derive(Tabled)]
struct CategoryRow {
    #[tabled(rename = "PK")]
    pk: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Kind")]
    kind: String,
}

impl From<&Category> for CategoryRow {
    fn from(c: &Category) -> Self {
        Self {
            pk: or_dash(c.pk),
            name: c.name.clone(),
            kind: or_dash(c.kind.as_deref()),
        }
    }
}

pub async fn amenities(marketplace: &Marketplace, global: &GlobalOpts) -> Result<(), CliError> {
    let amenities = marketplace.load_amenities().await?;
    let out = output::render_list(
        &global.output,
        amenities.as_slice(),
        |a| AmenityRow::from(a),
        |a| a.name.clone(),
    );
    output::print_output(&out, global.quiet);
    Ok(())
}

pub async fn categories(marketplace: &Marketplace, global: &GlobalOpts) -> Result<(), CliError> {
    let categories = marketplace.load_categories().await?;
    let out = output::render_list(
        &global.output,
        categories.as_slice(),
        |c| CategoryRow::from(c),
        |c| c.name.clone(),
    );
    output::print_output(&out, global.quiet);
    Ok(())
}
