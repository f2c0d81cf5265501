use chrono::{DateTime, Duration, Utc};

use crate::auth::AccessTokenResponse;

use super::types::*;

/// The access/refresh token pair for the connected mailbox.
///
/// Exactly one record is current at a time; it is overwritten on every
/// successful authorization or refresh.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TokenRecord {
    pub access_token: AccessToken,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<RefreshToken>,
    pub token_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<Scope>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_domain: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl TokenRecord {
    pub fn from_response(response: AccessTokenResponse, created_at: DateTime<Utc>) -> Self {
        Self {
            access_token: response.access_token,
            refresh_token: response.refresh_token,
            token_type: response.token_type.unwrap_or_else(|| "Bearer".to_string()),
            scope: response.scope,
            expires_in: response.expires_in,
            api_domain: response.api_domain,
            created_at,
        }
    }

    /// Builds the record that replaces this one after a refresh grant.
    ///
    /// Providers usually do not rotate refresh tokens, so the one used for
    /// the grant is kept unless the response carries a new one.
    pub fn refreshed(
        response: AccessTokenResponse,
        used: &RefreshToken,
        previous: Option<&TokenRecord>,
        now: DateTime<Utc>,
    ) -> Self {
        let created_at = stamp_after(previous.map(|p| p.created_at), now);
        let scope = response
            .scope
            .clone()
            .or_else(|| previous.and_then(|p| p.scope.clone()));
        let api_domain = response
            .api_domain
            .clone()
            .or_else(|| previous.and_then(|p| p.api_domain.clone()));

        let mut record = Self::from_response(response, created_at);
        if record.refresh_token.is_none() {
            record.refresh_token = Some(used.clone());
        }
        record.scope = scope;
        record.api_domain = api_domain;
        record
    }

    /// `None` when the lifetime is unknown or does not fit the calendar.
    pub fn expiry(&self) -> Option<Expiry> {
        self.expires_in
            .and_then(Duration::try_seconds)
            .and_then(|lifetime| self.created_at.checked_add_signed(lifetime))
            .map(Expiry::at)
    }

    /// A record without a known lifetime is only replaced when the provider
    /// rejects it.
    pub fn is_expired(&self, now: DateTime<Utc>, skew: Duration) -> bool {
        self.expiry()
            .map(|e| e.has_passed(now.checked_add_signed(skew).unwrap_or(now)))
            .unwrap_or(false)
    }
}

/// Clock stamp that is strictly later than `previous`.
pub fn stamp_after(previous: Option<DateTime<Utc>>, now: DateTime<Utc>) -> DateTime<Utc> {
    match previous {
        Some(p) if p >= now => p + Duration::microseconds(1),
        _ => now,
    }
}

/// Where a session stands in the authorization-code flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowPhase {
    Idle,
    AwaitingProviderRedirect,
    AwaitingCallback,
    TokenExchangeInFlight,
    Authenticated,
    Failed,
}

impl std::fmt::Display for FlowPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::AwaitingProviderRedirect => "awaiting_provider_redirect",
            Self::AwaitingCallback => "awaiting_callback",
            Self::TokenExchangeInFlight => "token_exchange_in_flight",
            Self::Authenticated => "authenticated",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct ConnectionStatus {
    pub is_connected: bool,
    pub connected_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl ConnectionStatus {
    pub fn disconnected() -> Self {
        Self {
            is_connected: false,
            connected_at: None,
            expires_at: None,
        }
    }
}

impl From<&TokenRecord> for ConnectionStatus {
    fn from(record: &TokenRecord) -> Self {
        Self {
            is_connected: true,
            connected_at: Some(record.created_at),
            expires_at: record.expiry().map(|e| e.as_datetime()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(refresh: Option<&str>) -> AccessTokenResponse {
        AccessTokenResponse {
            access_token: AccessToken("new-access".to_string()),
            refresh_token: refresh.map(|r| RefreshToken(r.to_string())),
            expires_in: Some(3600),
            token_type: Some("Bearer".to_string()),
            scope: None,
            api_domain: None,
        }
    }

    fn previous(created_at: DateTime<Utc>) -> TokenRecord {
        TokenRecord {
            access_token: AccessToken("old-access".to_string()),
            refresh_token: Some(RefreshToken("R".to_string())),
            token_type: "Bearer".to_string(),
            scope: Some(Scope::from_delimited_parts("ZohoMail.messages.READ")),
            expires_in: Some(3600),
            api_domain: Some("https://www.zohoapis.com".to_string()),
            created_at,
        }
    }

    #[test]
    fn refresh_keeps_previous_refresh_token_when_none_issued() {
        let now = Utc::now();
        let prior = previous(now - Duration::hours(2));
        let used = RefreshToken("R".to_string());

        let record = TokenRecord::refreshed(response(None), &used, Some(&prior), now);

        assert_eq!(record.refresh_token, Some(used));
        assert_eq!(record.access_token.secret(), "new-access");
        assert_eq!(record.scope, prior.scope);
        assert_eq!(record.api_domain, prior.api_domain);
        assert!(record.created_at > prior.created_at);
    }

    #[test]
    fn out_of_range_lifetime_has_no_expiry() {
        let mut record = previous(Utc::now());
        record.expires_in = Some(i64::MAX);

        assert_eq!(record.expiry(), None);
        assert!(!record.is_expired(Utc::now(), Duration::seconds(60)));
        let status = ConnectionStatus::from(&record);
        assert!(status.is_connected);
        assert_eq!(status.expires_at, None);
    }

    #[test]
    fn refresh_takes_rotated_refresh_token() {
        let now = Utc::now();
        let used = RefreshToken("R".to_string());

        let record = TokenRecord::refreshed(response(Some("R2")), &used, None, now);

        assert_eq!(record.refresh_token, Some(RefreshToken("R2".to_string())));
    }

    #[test]
    fn stamp_is_strictly_after_previous_even_with_clock_skew() {
        let now = Utc::now();
        assert!(stamp_after(Some(now), now) > now);
        assert!(stamp_after(Some(now + Duration::seconds(5)), now) > now + Duration::seconds(5));
        assert_eq!(stamp_after(Some(now - Duration::seconds(5)), now), now);
        assert_eq!(stamp_after(None, now), now);
    }

    #[test]
    fn expiry_accounts_for_skew() {
        let now = Utc::now();
        let record = previous(now - Duration::seconds(3550));

        assert!(!record.is_expired(now, Duration::zero()));
        assert!(record.is_expired(now, Duration::seconds(60)));
    }

    #[test]
    fn record_without_lifetime_never_expires_locally() {
        let mut record = previous(Utc::now() - Duration::days(30));
        record.expires_in = None;
        assert!(!record.is_expired(Utc::now(), Duration::seconds(60)));
        assert_eq!(record.expiry(), None);
    }

    #[test]
    fn persisted_record_round_trips_through_json() {
        let record = previous(Utc::now());
        let json = serde_json::to_string(&record).unwrap();
        let back: TokenRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record);
    }
}
