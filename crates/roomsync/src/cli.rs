//! Clap derive structures for the `roomsync` CLI.
//!
//! Defines the complete command tree, global flags, and shared types.

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand, ValueEnum};

use roomsync_core::{OAuthProvider, RoomPk};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// roomsync -- browse, book, and host rooms from the terminal
#[derive(Debug, Parser)]
#[command(
    name = "roomsync",
    version,
    about = "Browse and book rooms on the rental marketplace",
    long_about = "A command-line client for the room rental marketplace.\n\n\
        Lists rooms and reviews, checks availability before booking,\n\
        and manages hosted rooms and photos.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Backend profile to use
    #[arg(long, short = 'p', env = "ROOMSYNC_PROFILE", global = true)]
    pub profile: Option<String>,

    /// API root URL, e.g. http://127.0.0.1:8000/api/v1/ (overrides profile)
    #[arg(long, short = 'u', env = "ROOMSYNC_BASE_URL", global = true)]
    pub base_url: Option<String>,

    /// Login email (overrides profile)
    #[arg(long, env = "ROOMSYNC_EMAIL", global = true)]
    pub email: Option<String>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "ROOMSYNC_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Request timeout in seconds (overrides profile)
    #[arg(long, env = "ROOMSYNC_TIMEOUT", global = true)]
    pub timeout: Option<u64>,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
    /// Plain text, one value per line (scripting)
    Plain,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Browse rooms
    #[command(alias = "r")]
    Rooms(RoomsArgs),

    /// List amenities rooms can offer
    Amenities,

    /// List room categories
    Categories,

    /// Show the signed-in user
    Whoami,

    /// Sign in with email and password
    Login(LoginArgs),

    /// End the current session
    Logout,

    /// Sign in with an OAuth authorization code
    Oauth(OAuthArgs),

    /// Check whether a room is free for a stay
    #[command(alias = "check")]
    Availability(StayArgs),

    /// Book a room after confirming availability
    Book(BookArgs),

    /// Upload a photo to a room you host
    UploadPhoto(UploadPhotoArgs),

    /// Create a room from a JSON file
    CreateRoom(CreateRoomArgs),

    /// Manage CLI configuration and profiles
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Rooms ────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct RoomsArgs {
    #[command(subcommand)]
    pub command: RoomsCommand,
}

#[derive(Debug, Subcommand)]
pub enum RoomsCommand {
    /// List all rooms
    #[command(alias = "ls")]
    List,

    /// Show one room
    #[command(alias = "get")]
    Show {
        /// Room primary key
        room: RoomPk,
    },

    /// List a room's reviews
    Reviews {
        /// Room primary key
        room: RoomPk,
    },
}

// ── Session ──────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct LoginArgs {
    /// Store the password in the system keyring for this profile
    #[arg(long)]
    pub remember: bool,
}

#[derive(Debug, Args)]
pub struct OAuthArgs {
    /// Identity provider (github, kakao)
    pub provider: OAuthProvider,

    /// Authorization code returned by the provider
    pub code: String,
}

// ── Bookings ─────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct StayArgs {
    /// Room primary key
    pub room: RoomPk,

    /// Check-in date (YYYY-MM-DD)
    pub check_in: NaiveDate,

    /// Check-out date (YYYY-MM-DD)
    pub check_out: NaiveDate,
}

#[derive(Debug, Args)]
pub struct BookArgs {
    #[command(flatten)]
    pub stay: StayArgs,

    /// Number of guests
    #[arg(long, short = 'g', default_value = "1")]
    pub guests: u32,
}

// ── Hosting ──────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct UploadPhotoArgs {
    /// Room primary key
    pub room: RoomPk,

    /// Image file to upload
    pub file: PathBuf,

    /// Caption shown with the photo
    #[arg(long, short = 'd', default_value = "")]
    pub description: String,
}

#[derive(Debug, Args)]
pub struct CreateRoomArgs {
    /// JSON file with the room fields
    pub file: PathBuf,
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Display current configuration (secrets masked)
    Show,

    /// Print the config file path
    Path,

    /// List configured profiles
    Profiles,

    /// Set the default profile
    Use {
        /// Profile name to set as default
        name: String,
    },

    /// Store a password in the system keyring
    SetPassword {
        /// Profile to store the password for (defaults to the active one)
        #[arg(long)]
        profile: Option<String>,
    },
}

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
