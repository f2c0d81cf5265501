use std::sync::Arc;

use tracing::{event, Level};
use warp::Filter;

use crate::auth::{AuthError, CallbackQuery};
use crate::core::types::SessionId;
use crate::http::encoding::{self, error::AuthRejection, reply};
use crate::http::server::Server;

pub fn callback_endpoint(
    server: Arc<Server>,
) -> impl warp::Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
    let with_server = warp::any().map(move || server.clone());

    warp::path("oauthredirect")
        .and(warp::path::end())
        .and(warp::get())
        .and(with_server)
        .and(encoding::session())
        .and(warp::query::<CallbackQuery>())
        .and_then(
            |server: Arc<Server>, session: Option<SessionId>, query: CallbackQuery| async move {
                let result = match session {
                    Some(session) => server.client.handle_callback(&session, query).await,
                    None => {
                        event!(Level::WARN, "Callback arrived without a session cookie");
                        Err(AuthError::InvalidState)
                    }
                };

                reply::reply(
                    result
                        .map(|_| reply::see_other(&server.landing_path))
                        .map_err(AuthRejection::Callback),
                )
            },
        )
}
