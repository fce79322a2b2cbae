//! Command dispatch: bridges CLI args -> core queries/Commands -> output formatting.

pub mod auth;
pub mod booking;
pub mod catalog;
pub mod config_cmd;
pub mod hosting;
pub mod rooms;
pub mod util;

use roomsync_config::Config;
use roomsync_core::Marketplace;

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

/// Dispatch a backend-bound command to the appropriate handler.
pub async fn dispatch(
    cmd: Command,
    marketplace: &Marketplace,
    cfg: &Config,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match cmd {
        Command::Rooms(args) => rooms::handle(marketplace, args, global).await,
        Command::Amenities => catalog::amenities(marketplace, global).await,
        Command::Categories => catalog::categories(marketplace, global).await,
        Command::Whoami => auth::whoami(marketplace, cfg, global).await,
        Command::Login(args) => auth::login(marketplace, args, cfg, global).await,
        Command::Logout => auth::logout(marketplace, cfg, global).await,
        Command::Oauth(args) => auth::oauth(marketplace, args, global).await,
        Command::Availability(args) => booking::availability(marketplace, args, global).await,
        Command::Book(args) => booking::book(marketplace, args, cfg, global).await,
        Command::UploadPhoto(args) => hosting::upload_photo(marketplace, args, cfg, global).await,
        Command::CreateRoom(args) => hosting::create_room(marketplace, args, cfg, global).await,
        // Config and Completions are handled before dispatch
        Command::Config(_) | Command::Completions(_) => unreachable!(),
    }
}
