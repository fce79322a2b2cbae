//! Availability and booking handlers.

use roomsync_config::Config;
use roomsync_core::{AvailabilityState, Booking, Marketplace};

use crate::cli::{BookArgs, GlobalOpts, StayArgs};
use crate::error::CliError;
use crate::output;

use super::util;

fn availability_detail(room: u64, state: &AvailabilityState, color: bool) -> String {
    let ok = state.can_book();
    let stay = state.range.map_or_else(
        || "-".into(),
        |r| format!("{r} ({} nights)", r.nights()),
    );
    let mut lines = vec![
        ("Room", room.to_string()),
        ("Stay", stay),
        (
            "Status",
            output::status_label(if ok { "available" } else { "unavailable" }, ok, color),
        ),
    ];
    if let Some(warning) = state.warning() {
        lines.push(("Note", warning.to_owned()));
    }
    output::detail_lines(&lines)
}

fn booking_detail(room: u64, booking: &Booking) -> String {
    output::detail_lines(&[
        ("Booking", util::or_dash(booking.pk)),
        ("Room", room.to_string()),
        ("Check-in", booking.check_in.to_string()),
        ("Check-out", booking.check_out.to_string()),
        ("Guests", booking.guests.to_string()),
    ])
}

/// Select the stay and wait for the check; a failed check is an error.
async fn checked(
    marketplace: &Marketplace,
    stay: &StayArgs,
) -> Result<(roomsync_core::AvailabilityChecker, AvailabilityState), CliError> {
    let checker = marketplace.availability(stay.room);
    checker.select(stay.check_in, stay.check_out)?;
    let state = checker.settled().await;
    if let Some(err) = state.error.clone() {
        return Err(err.into());
    }
    Ok((checker, state))
}

// ── Handlers ────────────────────────────────────────────────────────

pub async fn availability(
    marketplace: &Marketplace,
    args: StayArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let (_, state) = checked(marketplace, &args).await?;
    let color = output::should_color(&global.color);
    let out = output::render_single(
        &global.output,
        &state,
        |s| availability_detail(args.room, s, color),
        |s| s.can_book().to_string(),
    );
    output::print_output(&out, global.quiet);
    Ok(())
}

pub async fn book(
    marketplace: &Marketplace,
    args: BookArgs,
    cfg: &Config,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    util::require_session(marketplace, cfg, global).await?;

    let (checker, state) = checked(marketplace, &args.stay).await?;
    if !state.can_book() {
        return Err(CliError::Unavailable {
            room: args.stay.room,
            check_in: args.stay.check_in.to_string(),
            check_out: args.stay.check_out.to_string(),
        });
    }

    let booking = checker.book(args.guests).await?;
    let out = output::render_single(
        &global.output,
        &booking,
        |b| booking_detail(args.stay.room, b),
        |b| util::or_dash(b.pk),
    );
    output::print_output(&out, global.quiet);
    Ok(())
}
