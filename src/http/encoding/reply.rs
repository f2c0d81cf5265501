use warp::http::{header, StatusCode};
use warp::reply::{Reply, Response};
use warp::Rejection;

use super::error::AuthRejection;

/// `303 See Other` to `location`.
pub fn see_other(location: &str) -> Response {
    warp::reply::with_header(
        warp::reply::with_status(warp::reply(), StatusCode::SEE_OTHER),
        header::LOCATION,
        location,
    )
    .into_response()
}

pub fn json_encode(
    value: Result<impl serde::Serialize, AuthRejection>,
) -> Result<Response, Rejection> {
    value
        .map(|v| warp::reply::json(&v).into_response())
        .map_err(warp::reject::custom)
}

pub fn reply<T>(result: Result<T, AuthRejection>) -> Result<Response, Rejection>
where
    T: Reply,
{
    result
        .map(|t| t.into_response())
        .map_err(warp::reject::custom)
}
