//! Plugin options

use crate::config::Settings;

/// Behavior switches of the change-log plugin
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Options {
    /// Store a field diff on update records
    pub compute_diff: bool,
    /// Skip update records whose watched fields did not change
    pub lazy_update: bool,
    /// Fields watched by `lazy_update`; empty watches every loggable field
    pub lazy_update_fields: Vec<String>,
    /// Return create/delete change-log failures from the host hooks
    /// instead of logging and discarding them
    pub propagate_create_delete_errors: bool,
}

impl Options {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable diff computation on updates
    pub fn with_compute_diff(mut self) -> Self {
        self.compute_diff = true;
        self
    }

    /// Enable the lazy-update check on the given fields
    pub fn with_lazy_update<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.lazy_update = true;
        self.lazy_update_fields = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Surface create/delete failures to the caller
    pub fn with_propagated_errors(mut self) -> Self {
        self.propagate_create_delete_errors = true;
        self
    }
}

impl From<&Settings> for Options {
    fn from(settings: &Settings) -> Self {
        Self {
            compute_diff: settings.compute_diff,
            lazy_update: settings.lazy_update,
            lazy_update_fields: settings.lazy_update_fields.clone(),
            propagate_create_delete_errors: settings.propagate_create_delete_errors,
        }
    }
}
