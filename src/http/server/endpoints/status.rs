use std::sync::Arc;

use warp::Filter;

use crate::http::encoding::{error::AuthRejection, reply};
use crate::http::server::Server;

#[derive(serde::Serialize)]
struct TokenGranted {
    success: bool,
    access_token: String,
}

pub fn status_endpoint(
    server: Arc<Server>,
) -> impl warp::Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
    let with_server = warp::any().map(move || server.clone());

    let dashboard = warp::path("dashboard")
        .and(warp::path::end())
        .and(warp::get())
        .and(with_server.clone())
        .and_then(|server: Arc<Server>| async move {
            let status = server.client.connection_status().await;
            reply::json_encode(Ok(status))
        });

    let token = warp::path!("api" / "token")
        .and(warp::get())
        .and(with_server)
        .and_then(|server: Arc<Server>| async move {
            let result = server
                .client
                .access_token()
                .await
                .map(|t| TokenGranted {
                    success: true,
                    access_token: t.secret().to_string(),
                })
                .map_err(AuthRejection::Token);
            reply::json_encode(result)
        });

    let health = warp::path("health")
        .and(warp::path::end())
        .and(warp::get())
        .map(|| "ok");

    dashboard.or(token).or(health)
}
