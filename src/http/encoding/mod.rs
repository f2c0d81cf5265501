pub mod error;
pub mod reply;

use std::convert::Infallible;

use warp::Filter;

use crate::core::types::SessionId;

pub const SESSION_COOKIE: &str = "hrassist_session";

#[derive(Debug, Clone)]
pub struct CookieSettings {
    pub secure: bool,
    pub max_age_secs: i64,
}

impl CookieSettings {
    pub fn session_cookie(&self, session: &SessionId) -> String {
        format!(
            "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}{}",
            SESSION_COOKIE,
            session.as_ref(),
            self.max_age_secs,
            if self.secure { "; Secure" } else { "" }
        )
    }
}

/// The browser session, when the request carries a non-empty session cookie.
pub fn session() -> impl Filter<Extract = (Option<SessionId>,), Error = Infallible> + Clone {
    warp::cookie::optional::<String>(SESSION_COOKIE)
        .map(|c: Option<String>| c.filter(|s| !s.is_empty()).map(SessionId))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cookie_is_http_only_and_lax() {
        let settings = CookieSettings {
            secure: true,
            max_age_secs: 900,
        };
        let cookie = settings.session_cookie(&SessionId("abc".to_string()));

        assert_eq!(
            cookie,
            "hrassist_session=abc; Path=/; HttpOnly; SameSite=Lax; Max-Age=900; Secure"
        );
    }

    #[tokio::test]
    async fn empty_cookie_is_no_session() {
        let found = warp::test::request()
            .header("cookie", "hrassist_session=")
            .filter(&session())
            .await
            .unwrap();
        assert!(found.is_none());

        let found = warp::test::request()
            .header("cookie", "hrassist_session=xyz")
            .filter(&session())
            .await
            .unwrap();
        assert_eq!(found, Some(SessionId("xyz".to_string())));
    }
}
