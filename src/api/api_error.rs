use crate::error::Error;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

pub(crate) struct APIError(anyhow::Error);

impl IntoResponse for APIError {
    fn into_response(self) -> Response {
        let any_err = self.0;
        let status = if let Some(err) = any_err.downcast_ref::<Error>() {
            match err {
                Error::HostNotFound => StatusCode::NOT_FOUND,
                Error::InvalidHostAmount(_)
                | Error::InvalidHostIdCount(_)
                | Error::InvalidHostId(_) => StatusCode::BAD_REQUEST,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            }
        } else if let Some(rejection) = any_err.downcast_ref::<JsonRejection>() {
            match rejection {
                JsonRejection::JsonDataError(_) => StatusCode::UNPROCESSABLE_ENTITY,
                JsonRejection::JsonSyntaxError(_) => StatusCode::BAD_REQUEST,
                JsonRejection::MissingJsonContentType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            }
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };

        // Internal details stay out of responses.
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!("internal error handling API request: {any_err:?}");
            "internal server error, please try again".to_string()
        } else {
            format!("{any_err}")
        };

        let body = Json(json!({
            "error": { "message": message },
        }));
        (status, body).into_response()
    }
}

impl<E> From<E> for APIError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}
