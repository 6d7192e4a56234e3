//! CLI output: error mapping from domain errors to stable CLI surface.

use crate::error::ApiError;

/// Exit status for invalid input.
pub const EXIT_CLIENT_ERROR: i32 = 2;
/// Exit status for every other failure.
pub const EXIT_FAILURE: i32 = 1;

/// Map domain/service errors to a string for CLI output.
pub fn map_error(e: &ApiError) -> String {
    format!("error: {}", e)
}

pub fn exit_code(e: &ApiError) -> i32 {
    if e.is_client_error() {
        EXIT_CLIENT_ERROR
    } else {
        EXIT_FAILURE
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StorageError;

    #[test]
    fn client_errors_exit_with_two() {
        assert_eq!(exit_code(&ApiError::InvalidRequest("blank topic".into())), 2);
        assert_eq!(
            exit_code(&StorageError::LessonNotFound("missing".into()).into()),
            2
        );
        assert_eq!(exit_code(&ApiError::Generation("backend down".into())), 1);
    }
}
