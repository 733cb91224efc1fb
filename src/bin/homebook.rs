//! CLI binary for browsing and booking property listings.

use std::fs;
use std::io::{self, Write as _};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, Color, Table};
use homebook::error::HomebookError;
use homebook::marketplace::{BookingRequest, ListingFilter, MarketplaceBlocking};
use homebook::models::{
    BookedReservation, Category, Listing, ListingId, NewListing, Reservation, User, UserId,
};
use homebook::storage::{BlockingStorage, FileStorage};
use owo_colors::OwoColorize;

/// Environment variable holding the acting user's ID.
const USER_ENV: &str = "HOMEBOOK_USER";

/// Property marketplace: list, browse and book homes.
#[derive(Debug, Parser)]
#[command(name = "homebook", version, about)]
struct Cli {
    /// Override the storage directory (default: XDG data dir).
    #[arg(long, global = true, value_name = "DIR")]
    data_dir: Option<PathBuf>,
    /// Act as the user with this ID.
    #[arg(long = "as", global = true, env = "HOMEBOOK_USER", value_name = "USER_ID")]
    caller: Option<String>,
    /// Subcommand to execute.
    #[command(subcommand)]
    command: Command,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
enum Command {
    /// Browse available listings, optionally filtered.
    Listings(ListingArgs),
    /// Show a single listing.
    Show {
        /// Listing ID.
        id: String,
    },
    /// Publish a new listing (sellers only).
    AddListing(AddListingArgs),
    /// Delete one of your listings.
    DeleteListing {
        /// Listing ID.
        id: String,
    },
    /// Book a listing.
    Book {
        /// Listing ID.
        id: String,
    },
    /// List the listings you have booked.
    Bookings,
    /// List your listings that are still available.
    MyListings,
    /// List your listings that have been booked.
    Sold,
    /// List all users.
    Users,
    /// Import users from a JSON file.
    ImportUsers {
        /// Path to a JSON array of users.
        file: PathBuf,
    },
}

/// Arguments for the `listings` subcommand.
#[derive(Debug, Args)]
struct ListingArgs {
    /// Exact location.
    #[arg(long)]
    location: Option<String>,
    /// Property category (house, apartment, villa, condo).
    #[arg(long, value_parser = parse_category)]
    category: Option<Category>,
    /// Minimum price (inclusive).
    #[arg(long)]
    min_price: Option<f64>,
    /// Maximum price (inclusive).
    #[arg(long)]
    max_price: Option<f64>,
}

/// Arguments for the `add-listing` subcommand.
#[derive(Debug, Args)]
struct AddListingArgs {
    /// Short headline.
    #[arg(long)]
    title: String,
    /// Asking price.
    #[arg(long)]
    price: f64,
    /// Location.
    #[arg(long)]
    location: String,
    /// Property category (house, apartment, villa, condo).
    #[arg(long, value_parser = parse_category)]
    category: Category,
    /// Free-text description.
    #[arg(long, default_value = "")]
    description: String,
    /// Image URL or path.
    #[arg(long)]
    image: Option<String>,
}

/// Parses a category name for clap.
fn parse_category(s: &str) -> Result<Category, String> {
    s.parse()
}

/// Builds a [`ListingFilter`] from CLI arguments.
fn build_filter(args: &ListingArgs) -> ListingFilter {
    let mut filter = ListingFilter::new();
    if let Some(location) = args.location.as_deref() {
        filter = filter.location(location);
    }
    if let Some(category) = args.category {
        filter = filter.category(category);
    }
    if let Some(min) = args.min_price {
        filter = filter.min_price(min);
    }
    if let Some(max) = args.max_price {
        filter = filter.max_price(max);
    }
    filter
}

/// Reads a JSON array of users from `path`.
fn load_users(path: &Path) -> homebook::error::Result<Vec<User>> {
    let contents =
        fs::read_to_string(path).map_err(|err| HomebookError::Storage(Box::new(err)))?;
    serde_json::from_str(&contents).map_err(HomebookError::from)
}

/// Runs the CLI, returning an appropriate exit code.
fn run() -> io::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let _dotenv = dotenvy::dotenv();

    let cli = Cli::parse();

    let storage = match create_storage(cli.data_dir) {
        Ok(storage) => storage,
        Err(err) => return report("failed to initialize storage", &err),
    };

    let market = match MarketplaceBlocking::builder().storage(storage).build() {
        Ok(market) => market,
        Err(err) => return report("failed to build marketplace", &err),
    };

    let caller = cli
        .caller
        .filter(|id| !id.trim().is_empty())
        .map(UserId::from);
    dispatch(&market, caller.as_ref(), cli.command)
}

/// Creates the storage backend, using `data_dir` if provided or the
/// default XDG data directory otherwise.
fn create_storage(data_dir: Option<PathBuf>) -> homebook::error::Result<FileStorage> {
    let dir = match data_dir {
        Some(dir) => dir,
        None => FileStorage::default_dir()?,
    };
    FileStorage::new(dir)
}

/// Dispatches to the appropriate subcommand handler.
fn dispatch<S: BlockingStorage>(
    market: &MarketplaceBlocking<S>,
    caller: Option<&UserId>,
    command: Command,
) -> io::Result<ExitCode> {
    match command {
        Command::Listings(args) => cmd_listings(market, &args),
        Command::Show { id } => cmd_show(market, &ListingId::from(id)),
        Command::AddListing(args) => cmd_add_listing(market, caller, args),
        Command::DeleteListing { id } => cmd_delete_listing(market, caller, &ListingId::from(id)),
        Command::Book { id } => cmd_book(market, caller, ListingId::from(id)),
        Command::Bookings => cmd_bookings(market, caller),
        Command::MyListings => cmd_my_listings(market, caller),
        Command::Sold => cmd_sold(market, caller),
        Command::Users => cmd_users(market),
        Command::ImportUsers { file } => cmd_import_users(market, &file),
    }
}

/// Writes an error line to stderr and returns a failure exit code.
fn report(context: &str, err: &HomebookError) -> io::Result<ExitCode> {
    let mut stderr = io::stderr().lock();
    writeln!(stderr, "{} {context}: {err}", "error:".red().bold())?;
    if matches!(err, HomebookError::Unauthenticated) {
        writeln!(
            stderr,
            "  {} pass --as <USER_ID> or set {USER_ENV}",
            "hint:".cyan()
        )?;
    }
    Ok(ExitCode::FAILURE)
}

/// Executes the `listings` subcommand: browses available listings.
fn cmd_listings<S: BlockingStorage>(
    market: &MarketplaceBlocking<S>,
    args: &ListingArgs,
) -> io::Result<ExitCode> {
    match market.browse(&build_filter(args)) {
        Ok(listings) => {
            print_listings_table("Available Listings", &listings)?;
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => report("failed to read listings", &err),
    }
}

/// Executes the `show` subcommand: prints one listing and whether it is
/// booked.
fn cmd_show<S: BlockingStorage>(
    market: &MarketplaceBlocking<S>,
    id: &ListingId,
) -> io::Result<ExitCode> {
    let listing = match market.listing(id) {
        Ok(listing) => listing,
        Err(err) => return report("failed to read listing", &err),
    };
    match market.storage().active_reservation(id) {
        Ok(reservation) => {
            print_listing_detail(&listing, reservation.as_ref())?;
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => report("failed to read reservations", &err),
    }
}

/// Executes the `add-listing` subcommand.
fn cmd_add_listing<S: BlockingStorage>(
    market: &MarketplaceBlocking<S>,
    caller: Option<&UserId>,
    args: AddListingArgs,
) -> io::Result<ExitCode> {
    let new_listing = NewListing {
        title: args.title,
        description: args.description,
        price: args.price,
        location: args.location,
        category: args.category,
        image: args.image,
    };
    match market.create_listing(caller, new_listing) {
        Ok(listing) => {
            writeln!(
                io::stdout().lock(),
                "{} {}",
                "Listing created:".green().bold(),
                listing.id
            )?;
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => report("failed to create listing", &err),
    }
}

/// Executes the `delete-listing` subcommand.
fn cmd_delete_listing<S: BlockingStorage>(
    market: &MarketplaceBlocking<S>,
    caller: Option<&UserId>,
    id: &ListingId,
) -> io::Result<ExitCode> {
    match market.delete_listing(id, caller) {
        Ok(()) => {
            writeln!(
                io::stdout().lock(),
                "{} {id}",
                "Listing deleted:".green().bold()
            )?;
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => report("failed to delete listing", &err),
    }
}

/// Executes the `book` subcommand.
fn cmd_book<S: BlockingStorage>(
    market: &MarketplaceBlocking<S>,
    caller: Option<&UserId>,
    id: ListingId,
) -> io::Result<ExitCode> {
    let request = BookingRequest::new(id, caller.cloned());
    match market.book_listing(&request) {
        Ok(booked) => {
            let mut out = io::stdout().lock();
            writeln!(
                out,
                "{} {} {}",
                "Booked".green().bold(),
                booked.listing.title,
                format_args!("({})", booked.listing.id).dimmed()
            )?;
            writeln!(
                out,
                "  {} {} on {}",
                "Reservation:".bold(),
                booked.reservation.id,
                booked.reservation.booking_date
            )?;
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => report("booking failed", &err),
    }
}

/// Executes the `bookings` subcommand.
fn cmd_bookings<S: BlockingStorage>(
    market: &MarketplaceBlocking<S>,
    caller: Option<&UserId>,
) -> io::Result<ExitCode> {
    match market.booked_listings(caller) {
        Ok(booked) => {
            print_bookings_table("My Bookings", &booked)?;
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => report("failed to read bookings", &err),
    }
}

/// Executes the `my-listings` subcommand.
fn cmd_my_listings<S: BlockingStorage>(
    market: &MarketplaceBlocking<S>,
    caller: Option<&UserId>,
) -> io::Result<ExitCode> {
    let Some(owner) = caller else {
        return report("failed to read listings", &HomebookError::Unauthenticated);
    };
    match market.seller_listings(owner) {
        Ok(listings) => {
            print_listings_table("My Listings", &listings)?;
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => report("failed to read listings", &err),
    }
}

/// Executes the `sold` subcommand.
fn cmd_sold<S: BlockingStorage>(
    market: &MarketplaceBlocking<S>,
    caller: Option<&UserId>,
) -> io::Result<ExitCode> {
    match market.sold_listings(caller) {
        Ok(sold) => {
            print_bookings_table("Sold Listings", &sold)?;
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => report("failed to read sold listings", &err),
    }
}

/// Executes the `users` subcommand.
fn cmd_users<S: BlockingStorage>(market: &MarketplaceBlocking<S>) -> io::Result<ExitCode> {
    match market.users() {
        Ok(users) => {
            print_users_table(&users)?;
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => report("failed to read users", &err),
    }
}

/// Executes the `import-users` subcommand.
fn cmd_import_users<S: BlockingStorage>(
    market: &MarketplaceBlocking<S>,
    file: &Path,
) -> io::Result<ExitCode> {
    let users = match load_users(file) {
        Ok(users) => users,
        Err(err) => return report("failed to read user file", &err),
    };
    match market.import_users(users) {
        Ok(count) => {
            writeln!(
                io::stdout().lock(),
                "{} {count} user(s)",
                "Imported".green().bold()
            )?;
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => report("import failed", &err),
    }
}

// ── Output formatting ────────────────────────────────────────────────

/// Returns a table with the shared preset and a cyan header row.
fn new_table(headers: &[&str]) -> Table {
    let mut table = Table::new();
    _ = table.load_preset(UTF8_FULL);
    _ = table.set_header(
        headers
            .iter()
            .map(|header| Cell::new(header).fg(Color::Cyan))
            .collect::<Vec<_>>(),
    );
    table
}

/// Prints a titled table, or a dimmed placeholder when there are no rows.
fn print_titled(title: &str, count: usize, table: &Table) -> io::Result<()> {
    let mut out = io::stdout().lock();
    if count == 0 {
        writeln!(out, "{}", format_args!("{title}: none.").dimmed())?;
        return Ok(());
    }
    writeln!(
        out,
        "{} {}",
        title.green().bold(),
        format_args!("({count})").dimmed()
    )?;
    writeln!(out)?;
    writeln!(out, "{table}")?;
    Ok(())
}

/// Prints listings in a table.
fn print_listings_table(title: &str, listings: &[Listing]) -> io::Result<()> {
    let mut table = new_table(&["ID", "Title", "Category", "Location", "Price"]);
    for listing in listings {
        _ = table.add_row(vec![
            Cell::new(&listing.id).fg(Color::DarkGrey),
            Cell::new(&listing.title),
            Cell::new(listing.category),
            Cell::new(&listing.location),
            Cell::new(format!("{:.2}", listing.price)),
        ]);
    }
    print_titled(title, listings.len(), &table)
}

/// Prints reservations joined with their listings in a table.
fn print_bookings_table(title: &str, booked: &[BookedReservation]) -> io::Result<()> {
    let mut table = new_table(&["Listing", "Location", "Price", "Buyer", "Booked on"]);
    for entry in booked {
        _ = table.add_row(vec![
            Cell::new(&entry.listing.title),
            Cell::new(&entry.listing.location),
            Cell::new(format!("{:.2}", entry.listing.price)),
            Cell::new(&entry.requester.username),
            Cell::new(entry.reservation.booking_date),
        ]);
    }
    print_titled(title, booked.len(), &table)
}

/// Prints users in a table.
fn print_users_table(users: &[User]) -> io::Result<()> {
    let mut table = new_table(&["ID", "Username", "Email", "Role", "Listings"]);
    for user in users {
        _ = table.add_row(vec![
            Cell::new(&user.id).fg(Color::DarkGrey),
            Cell::new(&user.username),
            Cell::new(&user.email),
            Cell::new(user.role),
            Cell::new(user.listings.len()),
        ]);
    }
    print_titled("Users", users.len(), &table)
}

/// Prints a single listing with its booking state.
fn print_listing_detail(listing: &Listing, reservation: Option<&Reservation>) -> io::Result<()> {
    let mut out = io::stdout().lock();
    writeln!(out, "{}", listing.title.green().bold())?;
    writeln!(out)?;
    writeln!(out, "  {} {}", "ID:".bold(), listing.id)?;
    writeln!(out, "  {} {}", "Category:".bold(), listing.category)?;
    writeln!(out, "  {} {}", "Location:".bold(), listing.location)?;
    writeln!(out, "  {} {:.2}", "Price:".bold(), listing.price)?;
    writeln!(out, "  {} {}", "Seller:".bold(), listing.owner)?;
    if let Some(image) = listing.image.as_deref() {
        writeln!(out, "  {} {image}", "Image:".bold())?;
    }
    if !listing.description.is_empty() {
        writeln!(out)?;
        writeln!(out, "  {}", listing.description)?;
    }
    writeln!(out)?;
    match reservation {
        Some(booked) => writeln!(
            out,
            "  {} {}",
            "Booked".red().bold(),
            format_args!("on {}", booked.booking_date).dimmed()
        )?,
        None => writeln!(out, "  {}", "Available".green().bold())?,
    }
    Ok(())
}

/// Entry point.
fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(err) => {
            let _ignored = writeln!(io::stderr(), "fatal I/O error: {err}");
            ExitCode::FAILURE
        }
    }
}
