use serde::de::DeserializeOwned;

use crate::error::AttendanceError;

pub mod attendance;
pub mod regularization;
pub mod report;

/// Parses a JSON body that may be left out entirely. An empty (or blank)
/// body yields `T::default()`; anything else must parse.
pub(crate) fn optional_json<T>(body: &[u8]) -> Result<T, AttendanceError>
where
    T: DeserializeOwned + Default,
{
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body)
        .map_err(|e| AttendanceError::validation(format!("Invalid request body: {e}")))
}
