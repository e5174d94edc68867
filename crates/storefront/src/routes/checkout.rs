//! Checkout route handlers.
//!
//! Every handler works on the visitor's [`CheckoutSession`] under its mutex,
//! calling `refresh()` first so a Pix payment settled in the background is
//! reflected before anything else happens.

use std::convert::Infallible;

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Json,
    extract::State,
    http::{StatusCode, header},
    response::{
        IntoResponse, Response, Sse,
        sse::{Event, KeepAlive},
    },
};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use futures::Stream;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::checkout::{
    CheckoutError, CheckoutSession, CheckoutView, ConfirmationSummary, FormPatch, PaymentArtifact,
    PixCheck, SharedSession, mask,
};
use crate::error::{AppError, Result, add_breadcrumb};
use crate::filters;
use crate::middleware::Visitor;
use crate::postal::ResolvedAddress;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostalCodeRequest {
    pub postal_code: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostalCodeResponse {
    /// `None` while fewer than 8 digits have been typed.
    pub resolved: Option<ResolvedAddress>,
    pub checkout: CheckoutView,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentCheckResponse {
    pub result: PixCheck,
    /// Transient notice shown when the payment is not confirmed yet.
    pub message: Option<&'static str>,
    pub checkout: CheckoutView,
}

/// Printable receipt.
#[derive(Template, WebTemplate)]
#[template(path = "checkout/receipt.html")]
pub struct ReceiptTemplate {
    pub summary: ConfirmationSummary,
    pub vehicle_line: Option<String>,
}

async fn current_session(state: &AppState, visitor: uuid::Uuid) -> Result<SharedSession> {
    state
        .checkouts()
        .get(visitor)
        .await
        .ok_or(AppError::Checkout(CheckoutError::NoActiveCheckout))
}

/// POST /checkout
///
/// Starts (or restarts) checkout from the buyer and cart in the store.
#[instrument(skip_all, fields(%visitor))]
pub async fn start(
    State(state): State<AppState>,
    Visitor(visitor): Visitor,
) -> Result<(StatusCode, Json<CheckoutView>)> {
    let buyer_id = state.store().buyer_id(visitor).await;
    let cart = state.store().cart(visitor).await;

    let session = CheckoutSession::start(buyer_id, cart)?;
    let view = session.view();
    state.checkouts().insert(visitor, session).await;
    add_breadcrumb("checkout", "Checkout started", None);

    Ok((StatusCode::CREATED, Json(view)))
}

/// GET /checkout
pub async fn show(
    State(state): State<AppState>,
    Visitor(visitor): Visitor,
) -> Result<Json<CheckoutView>> {
    let shared = current_session(&state, visitor).await?;
    let mut session = shared.lock().await;
    session.refresh();
    Ok(Json(session.view()))
}

/// DELETE /checkout
///
/// Abandons the checkout; a running Pix monitor stops with it.
#[instrument(skip_all, fields(%visitor))]
pub async fn abandon(State(state): State<AppState>, Visitor(visitor): Visitor) -> Result<StatusCode> {
    if state.checkouts().remove(visitor).await {
        add_breadcrumb("checkout", "Checkout abandoned", None);
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(CheckoutError::NoActiveCheckout.into())
    }
}

/// POST /checkout/postal-code
#[instrument(skip_all, fields(%visitor))]
pub async fn postal_code(
    State(state): State<AppState>,
    Visitor(visitor): Visitor,
    Json(request): Json<PostalCodeRequest>,
) -> Result<Json<PostalCodeResponse>> {
    let shared = current_session(&state, visitor).await?;
    let mut session = shared.lock().await;

    let resolved = session
        .resolve_postal_code(&request.postal_code, state.postal())
        .await?;

    Ok(Json(PostalCodeResponse {
        resolved,
        checkout: session.view(),
    }))
}

/// PATCH /checkout/form
pub async fn update_form(
    State(state): State<AppState>,
    Visitor(visitor): Visitor,
    Json(patch): Json<FormPatch>,
) -> Result<Json<CheckoutView>> {
    let shared = current_session(&state, visitor).await?;
    let mut session = shared.lock().await;
    session.update_form(patch)?;
    Ok(Json(session.view()))
}

/// POST /checkout/submit
#[instrument(skip_all, fields(%visitor))]
pub async fn submit(
    State(state): State<AppState>,
    Visitor(visitor): Visitor,
) -> Result<Json<CheckoutView>> {
    let shared = current_session(&state, visitor).await?;
    let mut session = shared.lock().await;

    session
        .submit(state.api(), &state.config().checkout)
        .await?;

    let method = session.form().payment_method.to_string();
    add_breadcrumb("checkout", "Order submitted", Some(&[("method", method.as_str())]));
    Ok(Json(session.view()))
}

/// POST /checkout/payment/check
///
/// Pix "I already paid".
#[instrument(skip_all, fields(%visitor))]
pub async fn check_payment(
    State(state): State<AppState>,
    Visitor(visitor): Visitor,
) -> Result<Json<PaymentCheckResponse>> {
    let shared = current_session(&state, visitor).await?;
    let mut session = shared.lock().await;

    let result = session.check_payment().await?;
    let message = (result == PixCheck::NotYetConfirmed)
        .then_some("Pagamento ainda não confirmado. Aguarde alguns instantes e tente novamente.");

    Ok(Json(PaymentCheckResponse {
        result,
        message,
        checkout: session.view(),
    }))
}

/// POST /checkout/payment/confirm
///
/// Boleto "I already paid" and card "continue".
#[instrument(skip_all, fields(%visitor))]
pub async fn confirm_payment(
    State(state): State<AppState>,
    Visitor(visitor): Visitor,
) -> Result<Json<CheckoutView>> {
    let shared = current_session(&state, visitor).await?;
    let mut session = shared.lock().await;
    session.confirm_payment()?;
    Ok(Json(session.view()))
}

/// GET /checkout/payment/events
///
/// Pix countdown and status as SSE `pix` events until the charge settles.
pub async fn payment_events(
    State(state): State<AppState>,
    Visitor(visitor): Visitor,
) -> Result<Sse<impl Stream<Item = std::result::Result<Event, Infallible>>>> {
    let shared = current_session(&state, visitor).await?;
    let mut rx = {
        let session = shared.lock().await;
        session
            .order()
            .and_then(|order| order.flow.pix_monitor())
            .map(crate::checkout::PixMonitor::subscribe)
            .ok_or(CheckoutError::InvalidStep {
                step: session.step(),
                action: "follow Pix payment",
            })?
    };

    let stream = async_stream::stream! {
        loop {
            let pix = *rx.borrow_and_update();
            let payload = serde_json::json!({
                "status": pix.status,
                "secondsLeft": pix.seconds_left,
                "countdown": mask::format_countdown(pix.seconds_left),
            });
            yield Ok(Event::default().event("pix").data(payload.to_string()));

            if pix.status.is_terminal() || rx.changed().await.is_err() {
                break;
            }
        }
    };

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

/// GET /checkout/payment/pix-qr.png
pub async fn pix_qr_code(
    State(state): State<AppState>,
    Visitor(visitor): Visitor,
) -> Result<Response> {
    let shared = current_session(&state, visitor).await?;
    let encoded = {
        let session = shared.lock().await;
        match session.order().map(|order| order.flow.artifact()) {
            Some(PaymentArtifact::Pix {
                qr_code_base64: Some(encoded),
                ..
            }) => encoded,
            _ => return Err(AppError::NotFound("Pix QR code".to_string())),
        }
    };

    // The backend sometimes sends a data URL instead of bare base64
    let bare = encoded
        .split_once("base64,")
        .map_or(encoded.as_str(), |(_, data)| data);
    let png = BASE64
        .decode(bare.trim())
        .map_err(|e| AppError::Internal(format!("Invalid Pix QR code: {e}")))?;

    Ok((
        [
            (header::CONTENT_TYPE, "image/png"),
            (header::CACHE_CONTROL, "no-store"),
        ],
        png,
    )
        .into_response())
}

/// GET /checkout/confirmation
pub async fn confirmation(
    State(state): State<AppState>,
    Visitor(visitor): Visitor,
) -> Result<Json<ConfirmationSummary>> {
    let shared = current_session(&state, visitor).await?;
    let mut session = shared.lock().await;
    session.refresh();
    Ok(Json(session.confirmation(&state.config().merchant)?))
}

/// GET /checkout/receipt
pub async fn receipt(
    State(state): State<AppState>,
    Visitor(visitor): Visitor,
) -> Result<ReceiptTemplate> {
    let shared = current_session(&state, visitor).await?;
    let mut session = shared.lock().await;
    session.refresh();
    let summary = session.confirmation(&state.config().merchant)?;

    let vehicle_line = summary.vehicle.as_ref().map(|v| {
        let mut parts = vec![v.model.clone()];
        if let Some(year) = v.year {
            parts.push(year.to_string());
        }
        if let Some(color) = &v.color {
            parts.push(color.clone());
        }
        if let Some(plate) = &v.plate {
            parts.push(format!("Placa {plate}"));
        }
        parts.join(" · ")
    });

    Ok(ReceiptTemplate {
        summary,
        vehicle_line,
    })
}
