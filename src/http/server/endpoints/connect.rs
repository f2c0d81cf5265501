use std::sync::Arc;

use warp::http::header;
use warp::Filter;

use crate::core::types::SessionId;
use crate::http::encoding::{error::AuthRejection, reply};
use crate::http::server::Server;
use crate::util::random::FromRandom;

/// Starts a flow under a freshly minted session and sends the browser to
/// the provider.
pub fn connect_endpoint(
    server: Arc<Server>,
) -> impl warp::Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
    let with_server = warp::any().map(move || server.clone());

    warp::path!("connect" / "zoho")
        .and(warp::get().or(warp::post()).unify())
        .and(with_server)
        .and_then(|server: Arc<Server>| async move {
            let session = SessionId::from_random();
            let result = server
                .client
                .initiate(&session)
                .await
                .map(|url| {
                    warp::reply::with_header(
                        reply::see_other(url.as_str()),
                        header::SET_COOKIE,
                        server.cookies.session_cookie(&session),
                    )
                })
                .map_err(AuthRejection::Initiate);
            reply::reply(result)
        })
}
