//! Process-wide library settings.
//!
//! [`Settings`] holds the **valuation date** — the date at which all pricing
//! calls are performed. It is a process-wide singleton accessed via a
//! `std::sync::OnceLock`; the date itself is stored as a day serial so this
//! crate stays free of any date library.
//!
//! Thread safety: the valuation date is stored behind a `Mutex` so that it
//! can be changed from any thread. Each test that changes the valuation date
//! should restore it when done (or use a dedicated test date).

use std::sync::{Mutex, OnceLock};

/// Process-wide settings used by the pricekit-rs library.
///
/// Currently the only setting is the **valuation date**. Engines read it
/// once at the top of each `price()` call; hosts set it before pricing.
pub struct Settings {
    /// The current valuation date (days since the Common Era).
    valuation_date: Mutex<Option<i32>>,
}

static INSTANCE: OnceLock<Settings> = OnceLock::new();

impl Settings {
    /// Return a reference to the global singleton.
    pub fn instance() -> &'static Settings {
        INSTANCE.get_or_init(|| Settings {
            valuation_date: Mutex::new(None),
        })
    }

    /// Return the current valuation date serial (days since CE).
    ///
    /// Returns `None` if no valuation date has been set; callers fall back
    /// to the latest trading day on or before today.
    pub fn valuation_date_serial(&self) -> Option<i32> {
        *self
            .valuation_date
            .lock()
            .expect("Settings mutex poisoned")
    }

    /// Set the valuation date as a day serial.
    pub fn set_valuation_date_serial(&self, serial: i32) {
        *self
            .valuation_date
            .lock()
            .expect("Settings mutex poisoned") = Some(serial);
    }

    /// Clear the valuation date, resetting it to "use today".
    pub fn reset_valuation_date(&self) {
        *self
            .valuation_date
            .lock()
            .expect("Settings mutex poisoned") = None;
    }
}
