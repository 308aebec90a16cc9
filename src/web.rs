//! # Web front
//! `GET /` shows the form, `POST /run` dispatches a submission and shows the form again with the outcome.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::rejection::FormRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Form, Router};
use log::error;

use crate::dispatch::{Dispatcher, Operation, FUNCTION_FIELD};

pub mod view;

use view::Outcome;

#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<Dispatcher>,
}

pub fn router(dispatcher: Arc<Dispatcher>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/run", post(run))
        .route("/healthz", get(healthz))
        .with_state(AppState { dispatcher })
}

async fn index() -> Response {
    page(StatusCode::OK, None, None)
}

async fn run(State(state): State<AppState>, form: Result<Form<HashMap<String, String>>, FormRejection>) -> Response {
    let Form(form) = match form {
        Ok(form) => form,
        Err(rejection) => {
            return page(StatusCode::BAD_REQUEST, None, Some(Outcome::Error(rejection.body_text())));
        }
    };
    let selected = form.get(FUNCTION_FIELD).and_then(|name| name.trim().parse::<Operation>().ok());
    match state.dispatcher.dispatch_form(&form).await {
        Ok(result) => page(StatusCode::OK, selected, Some(Outcome::Result(result.into_string()))),
        Err(e) => {
            let status = if e.is_client_error() { StatusCode::BAD_REQUEST } else { StatusCode::SERVICE_UNAVAILABLE };
            page(status, selected, Some(Outcome::Error(e.to_string())))
        }
    }
}

async fn healthz(State(state): State<AppState>) -> String {
    format!("ok\nmodel: {}\n", state.dispatcher.model_name())
}

fn page(status: StatusCode, selected: Option<Operation>, outcome: Option<Outcome>) -> Response {
    match view::render_page(selected, outcome.as_ref()) {
        Ok(html) => (status, Html(html)).into_response(),
        Err(e) => {
            error!("failed to render page: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "failed to render page").into_response()
        }
    }
}
