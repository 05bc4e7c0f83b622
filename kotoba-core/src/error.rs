//! The seven error categories surfaced to HTTP clients (spec §7).

use serde::{Deserialize, Serialize};

/// A category a failure is mapped onto before it reaches a client or an
/// `error` event. Never carries file paths, stack traces, or internal
/// identifiers — those are logged, not returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Malformed path, unsupported extension, schema violation.
    Validation,
    /// Referenced file or folder does not exist.
    NotFound,
    /// Missing or invalid bearer token.
    Auth,
    /// A worker slot is occupied, the engine mutex timed out, or shutdown
    /// is already in progress.
    Busy,
    /// An optional collaborator (exporter/diarizer/corrector) isn't
    /// installed.
    Unsupported,
    /// Unexpected failure; details are logged, not returned.
    Internal,
    /// Cooperative cancellation reached a checkpoint; not a failure, but
    /// modeled alongside the other categories since it also terminates a
    /// pipeline without a `finished` event (spec §4.5).
    Cancelled,
}

impl ErrorCategory {
    /// Localized, short, user-facing message. Never mentions paths.
    pub fn message(self) -> &'static str {
        match self {
            ErrorCategory::Validation => "リクエストの内容が正しくありません",
            ErrorCategory::NotFound => "指定されたファイルまたはフォルダが見つかりません",
            ErrorCategory::Auth => "認証が必要です",
            ErrorCategory::Busy => "別の処理が実行中です",
            ErrorCategory::Unsupported => "この機能は利用できません",
            ErrorCategory::Internal => "内部エラーが発生しました",
            ErrorCategory::Cancelled => "処理はキャンセルされました",
        }
    }

    /// The conventional HTTP status for this category, used by the
    /// server crate's `IntoResponse` impl.
    ///
    /// `Cancelled` shares `Busy`'s 409 rather than 200: a cancelled
    /// pipeline returns an error body (`{"detail": ...}`), not the
    /// route's documented success shape, so it must not be
    /// status-compatible with a completed request.
    pub fn http_status_code(self) -> u16 {
        match self {
            ErrorCategory::Validation => 400,
            ErrorCategory::NotFound => 404,
            ErrorCategory::Auth => 401,
            ErrorCategory::Busy => 409,
            ErrorCategory::Unsupported => 501,
            ErrorCategory::Internal => 500,
            ErrorCategory::Cancelled => 409,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_never_contains_path_separators() {
        for cat in [
            ErrorCategory::Validation,
            ErrorCategory::NotFound,
            ErrorCategory::Auth,
            ErrorCategory::Busy,
            ErrorCategory::Unsupported,
            ErrorCategory::Internal,
            ErrorCategory::Cancelled,
        ] {
            assert!(!cat.message().contains('/'));
            assert!(!cat.message().contains('\\'));
        }
    }

    #[test]
    fn busy_maps_to_409() {
        assert_eq!(ErrorCategory::Busy.http_status_code(), 409);
    }

    #[test]
    fn cancelled_is_not_status_compatible_with_success() {
        assert_eq!(ErrorCategory::Cancelled.http_status_code(), 409);
        assert_ne!(ErrorCategory::Cancelled.http_status_code(), 200);
    }
}
