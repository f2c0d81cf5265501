use std::net::SocketAddr;
use std::sync::Arc;

use warp::Filter;

use crate::provider::OAuth2Client;

mod endpoints;

use endpoints::{
    callback::callback_endpoint, connect::connect_endpoint, status::status_endpoint,
};

use super::encoding::{error::handle_reject, CookieSettings};

#[derive(Debug)]
pub struct Server {
    client: Arc<OAuth2Client>,
    landing_path: String,
    cookies: CookieSettings,
}

impl Server {
    pub fn new(client: Arc<OAuth2Client>, landing_path: String, cookie_secure: bool) -> Self {
        let cookies = CookieSettings {
            secure: cookie_secure,
            max_age_secs: client.config().flow_ttl.num_seconds(),
        };
        Self {
            client,
            landing_path,
            cookies,
        }
    }

    pub fn routes(
        self: Arc<Self>,
    ) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
        connect_endpoint(self.clone())
            .or(callback_endpoint(self.clone()))
            .or(status_endpoint(self))
            .recover(handle_reject)
            .with(warp::log("http-api"))
    }

    pub async fn serve(self, addr: SocketAddr) {
        let routes = Arc::new(self).routes();
        warp::serve(routes).run(addr).await;
    }
}
