//! Host-side handlers: create rooms, upload photos.

use roomsync_config::Config;
use roomsync_core::{Command as CoreCommand, CommandResult, CreateRoomRequest, Marketplace};

use crate::cli::{CreateRoomArgs, GlobalOpts, UploadPhotoArgs};
use crate::error::CliError;
use crate::output;

use super::util;

fn unexpected(result: &CommandResult) -> CliError {
    CliError::Server {
        message: format!("unexpected command result: {result:?}"),
    }
}

pub async fn upload_photo(
    marketplace: &Marketplace,
    args: UploadPhotoArgs,
    cfg: &Config,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let file_name = args
        .file
        .file_name()
        .and_then(|n| n.to_str())
        .map(str::to_owned)
        .ok_or_else(|| CliError::Validation {
            field: "file".into(),
            reason: format!("not a file path: {}", args.file.display()),
        })?;
    let bytes = tokio::fs::read(&args.file).await?;

    util::require_session(marketplace, cfg, global).await?;
    let result = marketplace
        .execute(CoreCommand::UploadRoomPhoto {
            room: args.room,
            file_name,
            bytes,
            description: args.description,
        })
        .await?;

    let photo = match result {
        CommandResult::Photo(photo) => photo,
        other => return Err(unexpected(&other)),
    };
    let out = output::render_single(
        &global.output,
        &photo,
        |p| format!("Photo uploaded: {}", p.file),
        |p| p.file.clone(),
    );
    output::print_output(&out, global.quiet);
    Ok(())
}

pub async fn create_room(
    marketplace: &Marketplace,
    args: CreateRoomArgs,
    cfg: &Config,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let body: CreateRoomRequest = util::read_json_file(&args.file)?;

    util::require_session(marketplace, cfg, global).await?;
    let result = marketplace.execute(CoreCommand::CreateRoom(body)).await?;

    let room = match result {
        CommandResult::Room(room) => room,
        other => return Err(unexpected(&other)),
    };
    let out = output::render_single(
        &global.output,
        &room,
        |r| format!("Room created: {} (pk {})", r.name, r.pk),
        |r| r.pk.to_string(),
    );
    output::print_output(&out, global.quiet);
    Ok(())
}
