pub mod console;
pub mod http;

use anyhow::{Context, Result};
use reqwest::StatusCode;
use tracing::{debug, info, warn};

pub const CONFIRM_MESSAGE: &str = "Are you sure you want to delete this venue?";

const VENUES_PREFIX: &str = "/venues/";
const HOME: &str = "/";

/// Blocking yes/no prompt shown before anything is deleted.
pub trait Confirm {
    fn confirm(&self, message: &str) -> bool;
}

pub trait VenueRemover {
    /// Issue `DELETE path`. `Ok` carries whatever status the server answered
    /// with; `Err` means the request never completed.
    fn delete(&self, path: &str) -> Result<StatusCode>;
}

pub trait Navigator {
    fn navigate(&self, location: &str) -> Result<()>;
}

/// The delete button of a venue page. `data_id` is its `data-id` attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteControl {
    pub data_id: String,
}

impl DeleteControl {
    pub fn new(data_id: impl Into<String>) -> Self {
        Self {
            data_id: data_id.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClickOutcome {
    /// The user said no. Nothing was sent.
    Declined,
    /// The request completed and the user was sent home.
    Deleted { status: StatusCode },
}

/// A click handler attached to a [`DeleteControl`]. Dropping it, or calling
/// [`Binding::unbind`], detaches the handler.
pub struct Binding {
    control: DeleteControl,
    confirm: Box<dyn Confirm>,
    remover: Box<dyn VenueRemover>,
    navigator: Box<dyn Navigator>,
}

/// Attach the delete handler to `control`, if there is one.
pub fn bind(
    control: Option<DeleteControl>,
    confirm: Box<dyn Confirm>,
    remover: Box<dyn VenueRemover>,
    navigator: Box<dyn Navigator>,
) -> Option<Binding> {
    let Some(control) = control else {
        debug!("No delete control present, handler not bound");
        return None;
    };

    debug!(venue_id = %control.data_id, "Delete handler bound");

    Some(Binding {
        control,
        confirm,
        remover,
        navigator,
    })
}

impl Binding {
    /// Run one click: confirm, delete, then go home.
    ///
    /// Any completed response counts as success, including error statuses.
    /// Overlapping clicks are not guarded against.
    pub fn click(&self) -> Result<ClickOutcome> {
        if !self.confirm.confirm(CONFIRM_MESSAGE) {
            debug!(venue_id = %self.control.data_id, "Venue deletion declined");
            return Ok(ClickOutcome::Declined);
        }

        let path = format!("{VENUES_PREFIX}{}", self.control.data_id);
        info!(venue_id = %self.control.data_id, path = %path, "Deleting venue");

        let status = self
            .remover
            .delete(&path)
            .with_context(|| format!("Failed to delete venue {}", self.control.data_id))?;

        if !status.is_success() {
            warn!(
                venue_id = %self.control.data_id,
                status = status.as_u16(),
                "Venue deletion answered with a non-success status"
            );
        }

        self.navigator
            .navigate(HOME)
            .context("Failed to navigate after deleting venue")?;

        Ok(ClickOutcome::Deleted { status })
    }

    pub fn unbind(self) -> DeleteControl {
        debug!(venue_id = %self.control.data_id, "Delete handler unbound");
        self.control
    }
}
