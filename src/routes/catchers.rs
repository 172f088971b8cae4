//! JSON error catchers. The route layer answers its own domain failures;
//! these cover everything Rocket rejects before or outside a handler, so
//! clients always see the same `{status, message}` body shape.

use rocket::http::Status;
use rocket::response::status;
use rocket::serde::json::Json;
use rocket::{Request, catch};
use serde::Serialize;

use crate::auth::guards::GuardError;

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub status: u16,
    pub message: String,
}

#[catch(400)]
pub fn bad_request(_req: &Request) -> Json<ErrorBody> {
    Json(ErrorBody {
        status: 400,
        message: "bad request".into(),
    })
}

/// A failed request guard lands here; the guard leaves its public message
/// in the request-local cache so the specific kind (expired vs. invalid
/// token) reaches the caller.
#[catch(401)]
pub fn unauthorized(req: &Request) -> Json<ErrorBody> {
    let message = req
        .local_cache(|| GuardError(None))
        .0
        .clone()
        .unwrap_or_else(|| "unauthorized".into());
    Json(ErrorBody {
        status: 401,
        message,
    })
}

#[catch(403)]
pub fn forbidden(req: &Request) -> Json<ErrorBody> {
    let message = req
        .local_cache(|| GuardError(None))
        .0
        .clone()
        .unwrap_or_else(|| "forbidden".into());
    Json(ErrorBody {
        status: 403,
        message,
    })
}

#[catch(404)]
pub fn not_found(_req: &Request) -> Json<ErrorBody> {
    Json(ErrorBody {
        status: 404,
        message: "not found".into(),
    })
}

/// Rocket answers 422 when a JSON body parses but misses required fields;
/// the wire contract treats that as a plain validation failure.
#[catch(422)]
pub fn unprocessable_entity(_req: &Request) -> status::Custom<Json<ErrorBody>> {
    status::Custom(
        Status::BadRequest,
        Json(ErrorBody {
            status: 400,
            message: "malformed or missing request fields".into(),
        }),
    )
}

#[catch(500)]
pub fn internal_error(_req: &Request) -> Json<ErrorBody> {
    Json(ErrorBody {
        status: 500,
        message: "internal server error".into(),
    })
}
