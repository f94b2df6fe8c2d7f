use std::collections::BTreeMap;

use axum::{
    extract::{Query, State},
    http::{Extensions, HeaderMap},
    response::{IntoResponse, Redirect},
    Extension, Json,
};
use std::sync::Arc;

use crate::{
    errors::{ok, AppError},
    extractors::AppJson,
    middlewares::{auth::JwtClaims, rate_limit::extract_client_ip_from},
    models::payment::CreatePaymentUrlRequest,
    services::{payment_service::PaymentService, AppState},
};

/// POST /api/payment/create_payment_url
pub async fn create_payment_url(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    headers: HeaderMap,
    extensions: Extensions,
    AppJson(req): AppJson<CreatePaymentUrlRequest>,
) -> Result<impl IntoResponse, AppError> {
    let client_ip = extract_client_ip_from(&headers, &extensions);
    let response = PaymentService::new(&state)
        .create_payment_url(&claims.sub, req, &client_ip)
        .await?;
    Ok(ok("Payment URL created", response))
}

/// GET /api/payment/vnpay_ipn
///
/// The gateway expects `{RspCode, Message}` with status 200 in every case.
pub async fn vnpay_ipn(
    State(state): State<Arc<AppState>>,
    Query(params): Query<BTreeMap<String, String>>,
) -> impl IntoResponse {
    let ack = PaymentService::new(&state).handle_ipn(&params).await;
    Json(ack)
}

/// GET /api/payment/vnpay_return
pub async fn vnpay_return(
    State(state): State<Arc<AppState>>,
    Query(params): Query<BTreeMap<String, String>>,
) -> impl IntoResponse {
    let target = PaymentService::new(&state).return_redirect(&params);
    Redirect::to(&target)
}
