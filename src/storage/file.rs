//! JSON-file-based storage backend.
//!
//! Stores each entity type in a separate JSON file under a configurable
//! directory (default: `$XDG_DATA_HOME/homebook/`).

use std::collections::HashSet;
use std::fs;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};

use serde::Serialize;

use crate::error::{HomebookError, Result};
use crate::marketplace::ListingFilter;
use crate::models::{Listing, ListingId, Reservation, User, UserId};

use super::{ReserveOutcome, rules};

/// Application name used for the XDG data directory.
const APP_NAME: &str = "homebook";

/// File name for listings.
const LISTINGS_FILE: &str = "listings.json";
/// File name for users.
const USERS_FILE: &str = "users.json";
/// File name for reservations.
const RESERVATIONS_FILE: &str = "reservations.json";
/// Sentinel file used for cross-process file locking.
const LOCK_FILE: &str = "storage.lock";

/// File-backed storage that persists marketplace data as JSON files.
///
/// # Concurrency
///
/// Thread safety within a single process is provided by an in-process
/// [`Mutex`]. Cross-process safety is achieved via an advisory file lock
/// on `storage.lock` (using [`std::fs::File::lock`] /
/// [`std::fs::File::lock_shared`]).
///
/// Read operations acquire a shared lock (allowing concurrent readers),
/// while write operations acquire an exclusive lock. Read-check-write
/// sequences such as the conditional reservation insert run entirely
/// under the exclusive lock, so two CLI processes booking the same
/// listing cannot both succeed.
///
/// # File layout
///
/// ```text
/// <dir>/
///   storage.lock          (cross-process lock sentinel)
///   listings.json
///   users.json
///   reservations.json
/// ```
#[derive(Debug)]
pub struct FileStorage {
    /// Root directory containing all JSON files.
    dir: PathBuf,
    /// Mutex serializing concurrent in-process access.
    lock: Mutex<()>,
    /// Sentinel file for cross-process advisory locking.
    lock_file: fs::File,
}

impl FileStorage {
    /// Creates a new file storage rooted at the given directory.
    ///
    /// Creates the directory (and parents) if it does not exist. Also
    /// opens (or creates) the `storage.lock` sentinel file used for
    /// cross-process advisory locking.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or the lock
    /// file cannot be opened.
    #[inline]
    pub fn new(dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(&dir).map_err(storage_io_error)?;
        let lock_file = fs::OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(dir.join(LOCK_FILE))
            .map_err(storage_io_error)?;
        Ok(Self {
            dir,
            lock: Mutex::new(()),
            lock_file,
        })
    }

    /// Returns the default XDG-compliant data directory for this application.
    ///
    /// On Linux: `$XDG_DATA_HOME/homebook/` (typically
    /// `~/.local/share/homebook/`).
    ///
    /// # Errors
    ///
    /// Returns an error if the platform data directory cannot be determined.
    #[inline]
    pub fn default_dir() -> Result<PathBuf> {
        dirs::data_dir()
            .map(|data_path| data_path.join(APP_NAME))
            .ok_or_else(|| {
                HomebookError::Storage("could not determine platform data directory".into())
            })
    }

    // ── Private helpers ─────────────────────────────────────────────

    /// Returns the full path for a given file name.
    fn path(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    /// Acquires an in-process mutex guard and a shared (read) file lock,
    /// executes `op`, then releases the file lock.
    fn with_shared_lock<R, F: FnOnce() -> Result<R>>(&self, op: F) -> Result<R> {
        let _guard: MutexGuard<'_, ()> = self.lock.lock().map_err(|err| lock_poison_error(&err))?;
        self.lock_file.lock_shared().map_err(storage_io_error)?;
        let result = op();
        // An unlock failure only replaces a successful result.
        if let Err(err) = self.lock_file.unlock()
            && result.is_ok()
        {
            return Err(storage_io_error(err));
        }
        result
    }

    /// Acquires an in-process mutex guard and an exclusive (write) file
    /// lock, executes `op`, then releases the file lock.
    fn with_exclusive_lock<R, F: FnOnce() -> Result<R>>(&self, op: F) -> Result<R> {
        let _guard: MutexGuard<'_, ()> = self.lock.lock().map_err(|err| lock_poison_error(&err))?;
        self.lock_file.lock().map_err(storage_io_error)?;
        let result = op();
        if let Err(err) = self.lock_file.unlock()
            && result.is_ok()
        {
            return Err(storage_io_error(err));
        }
        result
    }

    /// Reads and deserializes a JSON file. Returns an empty `Vec` if the
    /// file does not exist.
    fn read_entities<T: serde::de::DeserializeOwned>(&self, name: &str) -> Result<Vec<T>> {
        let path = self.path(name);
        match fs::read_to_string(&path) {
            Ok(contents) => serde_json::from_str(&contents).map_err(HomebookError::from),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(err) => Err(storage_io_error(err)),
        }
    }

    /// Atomically writes a serialized JSON file (write-to-tmp then rename).
    fn write_entities<T: Serialize>(&self, name: &str, items: &[T]) -> Result<()> {
        let staged = self.stage_entities(name, items)?;
        commit(&[staged])
    }

    /// Serializes `items` into `<name>.tmp` and returns the staged pair.
    ///
    /// Nothing is visible to readers until [`commit`] renames it.
    fn stage_entities<T: Serialize>(&self, name: &str, items: &[T]) -> Result<Staged> {
        let staged = Staged {
            tmp: self.path(&format!("{name}.tmp")),
            target: self.path(name),
        };
        let json = serde_json::to_string_pretty(items).map_err(HomebookError::from)?;
        fs::write(&staged.tmp, json).map_err(storage_io_error)?;
        Ok(staged)
    }

    /// Writes listings and users together: both files are staged before
    /// either is renamed, so a failed write leaves both untouched.
    fn write_listings_and_users(
        &self,
        listings: &[Listing],
        users: Option<&[User]>,
    ) -> Result<()> {
        let staged_listings = self.stage_entities(LISTINGS_FILE, listings)?;
        let Some(users) = users else {
            return commit(&[staged_listings]);
        };
        match self.stage_entities(USERS_FILE, users) {
            Ok(staged_users) => commit(&[staged_listings, staged_users]),
            Err(err) => {
                let _removed = fs::remove_file(&staged_listings.tmp);
                Err(err)
            }
        }
    }

    /// Reads a file under the shared lock and post-processes its contents.
    fn read_with<T, R, F>(&self, name: &str, op: F) -> Result<R>
    where
        T: serde::de::DeserializeOwned,
        F: FnOnce(Vec<T>) -> R,
    {
        self.with_shared_lock(|| self.read_entities(name).map(op))
    }

    /// Stores a listing and links it to its owner.
    fn write_listing(&self, listing: Listing) -> Result<()> {
        self.with_exclusive_lock(|| {
            let mut listings: Vec<Listing> = self.read_entities(LISTINGS_FILE)?;
            let mut users: Vec<User> = self.read_entities(USERS_FILE)?;
            let owner_known = users.iter().any(|user| user.id == listing.owner);
            rules::insert_listing(&mut listings, &mut users, listing)?;
            self.write_listings_and_users(&listings, owner_known.then_some(users.as_slice()))
        })
    }

    /// Deletes a listing after ownership and reservation checks.
    fn remove_listing(&self, id: &ListingId, caller: &UserId) -> Result<()> {
        self.with_exclusive_lock(|| {
            let mut listings: Vec<Listing> = self.read_entities(LISTINGS_FILE)?;
            let mut users: Vec<User> = self.read_entities(USERS_FILE)?;
            let reservations: Vec<Reservation> = self.read_entities(RESERVATIONS_FILE)?;
            rules::delete_listing(&mut listings, &mut users, &reservations, id, caller)?;
            self.write_listings_and_users(&listings, Some(&users))
        })
    }

    /// Inserts users after uniqueness checks.
    fn write_users(&self, items: Vec<User>) -> Result<()> {
        if items.is_empty() {
            return Ok(());
        }
        self.with_exclusive_lock(|| {
            let mut users: Vec<User> = self.read_entities(USERS_FILE)?;
            rules::check_new_users(&users, &items)?;
            users.extend(items);
            self.write_entities(USERS_FILE, &users)
        })
    }

    /// Conditional insert of a reservation.
    fn write_reservation(&self, reservation: Reservation) -> Result<ReserveOutcome> {
        self.with_exclusive_lock(|| {
            let listings: Vec<Listing> = self.read_entities(LISTINGS_FILE)?;
            let mut reservations: Vec<Reservation> = self.read_entities(RESERVATIONS_FILE)?;
            let outcome = rules::reserve(&listings, &mut reservations, reservation);
            if matches!(outcome, ReserveOutcome::Reserved(_)) {
                self.write_entities(RESERVATIONS_FILE, &reservations)?;
            }
            Ok(outcome)
        })
    }

    /// Returns all listings, oldest first.
    fn read_listings(&self) -> Result<Vec<Listing>> {
        self.read_with(LISTINGS_FILE, |mut listings: Vec<Listing>| {
            rules::sort_listings(&mut listings);
            listings
        })
    }

    /// Returns a single listing by ID.
    fn read_listing(&self, id: &ListingId) -> Result<Option<Listing>> {
        self.read_with(LISTINGS_FILE, |listings: Vec<Listing>| {
            listings.into_iter().find(|listing| listing.id == *id)
        })
    }

    /// Returns listings matching `filter`.
    fn read_matching(&self, filter: &ListingFilter) -> Result<Vec<Listing>> {
        self.read_with(LISTINGS_FILE, |listings: Vec<Listing>| {
            rules::matching_listings(&listings, filter)
        })
    }

    /// Returns a single user by ID.
    fn read_user(&self, id: &UserId) -> Result<Option<User>> {
        self.read_with(USERS_FILE, |users: Vec<User>| {
            users.into_iter().find(|user| user.id == *id)
        })
    }

    /// Returns the active reservation for a listing.
    fn read_active(&self, listing: &ListingId) -> Result<Option<Reservation>> {
        self.read_with(RESERVATIONS_FILE, |reservations: Vec<Reservation>| {
            rules::active_for(&reservations, listing).cloned()
        })
    }

    /// Returns reservations made by `requester`, oldest first.
    fn read_by_requester(&self, requester: &UserId) -> Result<Vec<Reservation>> {
        self.read_with(RESERVATIONS_FILE, |reservations: Vec<Reservation>| {
            let mut found: Vec<Reservation> = reservations
                .into_iter()
                .filter(|reservation| reservation.requester == *requester)
                .collect();
            rules::sort_reservations(&mut found);
            found
        })
    }

    /// Returns all reservations, oldest first.
    fn read_reservations(&self) -> Result<Vec<Reservation>> {
        self.read_with(RESERVATIONS_FILE, |mut reservations: Vec<Reservation>| {
            rules::sort_reservations(&mut reservations);
            reservations
        })
    }

    /// Returns IDs of listings with an active reservation.
    fn read_active_ids(&self) -> Result<HashSet<ListingId>> {
        self.read_with(RESERVATIONS_FILE, |reservations: Vec<Reservation>| {
            rules::active_listing_ids(&reservations)
        })
    }

    /// Deletes all entity files.
    ///
    /// The `storage.lock` sentinel is kept.
    fn clear_all(&self) -> Result<()> {
        self.with_exclusive_lock(|| {
            for name in [LISTINGS_FILE, USERS_FILE, RESERVATIONS_FILE] {
                let path = self.path(name);
                match fs::remove_file(&path) {
                    Ok(()) => {}
                    Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
                    Err(err) => return Err(storage_io_error(err)),
                }
            }
            Ok(())
        })
    }
}

// ── Free-standing helpers ───────────────────────────────────────────────

/// A serialized file waiting in its `.tmp` sibling to be renamed into place.
#[derive(Debug)]
struct Staged {
    /// Temporary file holding the new contents.
    tmp: PathBuf,
    /// Final location.
    target: PathBuf,
}

/// Renames staged files into place, in order.
fn commit(staged: &[Staged]) -> Result<()> {
    for file in staged {
        fs::rename(&file.tmp, &file.target).map_err(storage_io_error)?;
    }
    Ok(())
}

/// Wraps an I/O error into a [`HomebookError::Storage`].
fn storage_io_error(err: std::io::Error) -> HomebookError {
    HomebookError::Storage(Box::new(err))
}

/// Wraps a mutex poison error into a [`HomebookError::Storage`].
fn lock_poison_error<T>(err: &std::sync::PoisonError<T>) -> HomebookError {
    HomebookError::Storage(err.to_string().into())
}

// ── BlockingStorage implementation ──────────────────────────────────────

#[cfg(feature = "blocking")]
impl super::BlockingStorage for FileStorage {
    #[inline]
    fn listings(&self) -> Result<Vec<Listing>> {
        self.read_listings()
    }

    #[inline]
    fn listing(&self, id: &ListingId) -> Result<Option<Listing>> {
        self.read_listing(id)
    }

    #[inline]
    fn find_listings(&self, filter: &ListingFilter) -> Result<Vec<Listing>> {
        self.read_matching(filter)
    }

    #[inline]
    fn insert_listing(&self, listing: Listing) -> Result<()> {
        self.write_listing(listing)
    }

    #[inline]
    fn delete_listing(&self, id: &ListingId, caller: &UserId) -> Result<()> {
        self.remove_listing(id, caller)
    }

    #[inline]
    fn users(&self) -> Result<Vec<User>> {
        self.with_shared_lock(|| self.read_entities(USERS_FILE))
    }

    #[inline]
    fn user(&self, id: &UserId) -> Result<Option<User>> {
        self.read_user(id)
    }

    #[inline]
    fn insert_users(&self, items: Vec<User>) -> Result<()> {
        self.write_users(items)
    }

    #[inline]
    fn reserve(&self, reservation: Reservation) -> Result<ReserveOutcome> {
        self.write_reservation(reservation)
    }

    #[inline]
    fn active_reservation(&self, listing: &ListingId) -> Result<Option<Reservation>> {
        self.read_active(listing)
    }

    #[inline]
    fn reservations_by_requester(&self, requester: &UserId) -> Result<Vec<Reservation>> {
        self.read_by_requester(requester)
    }

    #[inline]
    fn active_listing_ids(&self) -> Result<HashSet<ListingId>> {
        self.read_active_ids()
    }

    #[inline]
    fn reservations(&self) -> Result<Vec<Reservation>> {
        self.read_reservations()
    }

    #[inline]
    fn clear(&self) -> Result<()> {
        self.clear_all()
    }
}

// ── Storage (async) implementation ──────────────────────────────────────

#[cfg(feature = "async")]
impl super::Storage for FileStorage {
    #[inline]
    fn listings(&self) -> impl Future<Output = Result<Vec<Listing>>> + Send {
        core::future::ready(self.read_listings())
    }

    #[inline]
    fn listing(&self, id: &ListingId) -> impl Future<Output = Result<Option<Listing>>> + Send {
        core::future::ready(self.read_listing(id))
    }

    #[inline]
    fn find_listings(
        &self,
        filter: &ListingFilter,
    ) -> impl Future<Output = Result<Vec<Listing>>> + Send {
        core::future::ready(self.read_matching(filter))
    }

    #[inline]
    fn insert_listing(&self, listing: Listing) -> impl Future<Output = Result<()>> + Send {
        core::future::ready(self.write_listing(listing))
    }

    #[inline]
    fn delete_listing(
        &self,
        id: &ListingId,
        caller: &UserId,
    ) -> impl Future<Output = Result<()>> + Send {
        core::future::ready(self.remove_listing(id, caller))
    }

    #[inline]
    fn users(&self) -> impl Future<Output = Result<Vec<User>>> + Send {
        core::future::ready(self.with_shared_lock(|| self.read_entities(USERS_FILE)))
    }

    #[inline]
    fn user(&self, id: &UserId) -> impl Future<Output = Result<Option<User>>> + Send {
        core::future::ready(self.read_user(id))
    }

    #[inline]
    fn insert_users(&self, items: Vec<User>) -> impl Future<Output = Result<()>> + Send {
        core::future::ready(self.write_users(items))
    }

    #[inline]
    fn reserve(
        &self,
        reservation: Reservation,
    ) -> impl Future<Output = Result<ReserveOutcome>> + Send {
        core::future::ready(self.write_reservation(reservation))
    }

    #[inline]
    fn active_reservation(
        &self,
        listing: &ListingId,
    ) -> impl Future<Output = Result<Option<Reservation>>> + Send {
        core::future::ready(self.read_active(listing))
    }

    #[inline]
    fn reservations_by_requester(
        &self,
        requester: &UserId,
    ) -> impl Future<Output = Result<Vec<Reservation>>> + Send {
        core::future::ready(self.read_by_requester(requester))
    }

    #[inline]
    fn active_listing_ids(&self) -> impl Future<Output = Result<HashSet<ListingId>>> + Send {
        core::future::ready(self.read_active_ids())
    }

    #[inline]
    fn reservations(&self) -> impl Future<Output = Result<Vec<Reservation>>> + Send {
        core::future::ready(self.read_reservations())
    }

    #[inline]
    fn clear(&self) -> impl Future<Output = Result<()>> + Send {
        core::future::ready(self.clear_all())
    }
}
