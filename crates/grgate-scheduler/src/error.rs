//! Job processing errors.

use grgate_config::TemplateError;
use grgate_core::PlatformError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("couldn't {context}: {source}")]
    Platform {
        context: String,
        #[source]
        source: PlatformError,
    },

    #[error(transparent)]
    Template(#[from] TemplateError),
}

impl SchedulerError {
    pub(crate) fn platform(context: impl Into<String>) -> impl FnOnce(PlatformError) -> Self {
        let context = context.into();
        move |source| SchedulerError::Platform { context, source }
    }
}

pub type SchedulerResult<T> = std::result::Result<T, SchedulerError>;
