//! Core request and result types

use crate::error::{Error, Result};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// A request to package one user's study data over an inclusive date range.
///
/// Deserialized from the intake JSON:
///
/// ```json
/// { "studyId": "...", "userId": "...", "startDate": "YYYY-MM-DD", "endDate": "YYYY-MM-DD" }
/// ```
///
/// Unknown fields are ignored. Deserialization does not validate; call
/// [`PackageRequest::validate`] (the packager does this on entry).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageRequest {
    study_id: String,
    user_id: String,
    start_date: NaiveDate,
    end_date: NaiveDate,
}

impl PackageRequest {
    /// Construct a request, validating all fields.
    pub fn new(
        study_id: impl Into<String>,
        user_id: impl Into<String>,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Self> {
        let request = Self {
            study_id: study_id.into(),
            user_id: user_id.into(),
            start_date,
            end_date,
        };
        request.validate()?;
        Ok(request)
    }

    /// ID of the study to get user data from
    pub fn study_id(&self) -> &str {
        &self.study_id
    }

    /// ID of the user requesting their data
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Start date (inclusive) of data to fetch
    pub fn start_date(&self) -> NaiveDate {
        self.start_date
    }

    /// End date (inclusive) of data to fetch
    pub fn end_date(&self) -> NaiveDate {
        self.end_date
    }

    /// Check that both IDs are non-empty and the date range is not inverted.
    pub fn validate(&self) -> Result<()> {
        if self.study_id.is_empty() {
            return Err(Error::Validation("studyId must be specified".into()));
        }
        if self.user_id.is_empty() {
            return Err(Error::Validation("userId must be specified".into()));
        }
        if self.start_date > self.end_date {
            return Err(Error::Validation(
                "startDate can't be after endDate".into(),
            ));
        }
        Ok(())
    }
}

/// Account information resolved for the requesting user. Immutable after construction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AccountInfo {
    email_address: String,
    user_id: String,
    health_code: Option<String>,
}

impl AccountInfo {
    /// Construct account info; email address and user ID are required.
    ///
    /// An account without a health code is possible, if unlikely.
    pub fn new(
        email_address: impl Into<String>,
        user_id: impl Into<String>,
        health_code: Option<String>,
    ) -> Result<Self> {
        let email_address = email_address.into();
        let user_id = user_id.into();
        if email_address.is_empty() {
            return Err(Error::Validation("emailAddress must be specified".into()));
        }
        if user_id.is_empty() {
            return Err(Error::Validation("userId must be specified".into()));
        }
        Ok(Self {
            email_address,
            user_id,
            health_code,
        })
    }

    /// Account's registered email address
    pub fn email_address(&self) -> &str {
        &self.email_address
    }

    /// Account's ID
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Account's health code, keying the user's rows in the data tables
    pub fn health_code(&self) -> Option<&str> {
        self.health_code.as_deref()
    }
}

/// A time-limited download URL for the finished archive
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresignedUrlInfo {
    /// Pre-signed GET URL
    pub url: String,
    /// Absolute instant the URL stops working
    pub expires_at: DateTime<Utc>,
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    #[test]
    fn request_parses_from_intake_json() {
        let request: PackageRequest = serde_json::from_str(
            r#"{"studyId":"sleep-study","userId":"user-1","startDate":"2015-03-09","endDate":"2015-09-17"}"#,
        )
        .unwrap();
        assert_eq!(request.study_id(), "sleep-study");
        assert_eq!(request.user_id(), "user-1");
        assert_eq!(request.start_date(), date("2015-03-09"));
        assert_eq!(request.end_date(), date("2015-09-17"));
        request.validate().unwrap();
    }

    #[test]
    fn request_ignores_unknown_json_fields() {
        let request: PackageRequest = serde_json::from_str(
            r#"{"studyId":"s","userId":"u","startDate":"2015-01-01","endDate":"2015-01-02","extra":42}"#,
        )
        .unwrap();
        request.validate().unwrap();
    }

    #[test]
    fn request_rejects_empty_study_id() {
        let err =
            PackageRequest::new("", "user-1", date("2015-01-01"), date("2015-01-02")).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert!(err.to_string().contains("studyId"));
    }

    #[test]
    fn request_rejects_empty_user_id() {
        let err =
            PackageRequest::new("study", "", date("2015-01-01"), date("2015-01-02")).unwrap_err();
        assert!(err.to_string().contains("userId"));
    }

    #[test]
    fn request_rejects_inverted_date_range() {
        let err = PackageRequest::new("study", "user", date("2015-01-02"), date("2015-01-01"))
            .unwrap_err();
        assert!(err.to_string().contains("startDate"));
    }

    #[test]
    fn request_allows_single_day_range() {
        PackageRequest::new("study", "user", date("2015-01-01"), date("2015-01-01")).unwrap();
    }

    #[test]
    fn account_requires_email_and_user_id() {
        assert!(AccountInfo::new("", "user", None).is_err());
        assert!(AccountInfo::new("a@example.com", "", None).is_err());

        let account = AccountInfo::new("a@example.com", "user", None).unwrap();
        assert_eq!(account.email_address(), "a@example.com");
        assert_eq!(account.user_id(), "user");
        assert_eq!(account.health_code(), None);
    }

    #[test]
    fn account_carries_optional_health_code() {
        let account =
            AccountInfo::new("a@example.com", "user", Some("health-1".to_string())).unwrap();
        assert_eq!(account.health_code(), Some("health-1"));
    }
}
