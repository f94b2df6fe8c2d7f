use std::collections::BTreeMap;

use anyhow::Context;
use mongodb::{
    bson::{self, doc},
    Collection,
};
use rand::Rng;

use crate::errors::{AppError, AppResult};
use crate::metrics::{record_payment_callback, track_db_operation};
use crate::models::payment::{
    CreatePaymentUrlRequest, IpnAck, OrderStatus, PaymentOrder, PaymentUrlResponse, Settlement,
};
use crate::models::user::User;
use crate::models::{new_id, now_millis};
use crate::services::user_service::UserService;
use crate::services::vnpay::PaymentRequest;
use crate::services::{AppState, PAYMENT_ORDERS, USERS};

const RESPONSE_CODE: &str = "vnp_ResponseCode";
const TXN_REF: &str = "vnp_TxnRef";
const AMOUNT: &str = "vnp_Amount";
const TRANSACTION_NO: &str = "vnp_TransactionNo";

/// Merchant reference: creation time plus a random suffix.
pub fn new_txn_ref() -> String {
    let suffix: u32 = rand::rng().random_range(0..1_000_000);
    format!("{}{:06}", chrono::Utc::now().format("%d%H%M%S"), suffix)
}

pub struct PaymentService<'a> {
    state: &'a AppState,
    orders: Collection<PaymentOrder>,
}

impl<'a> PaymentService<'a> {
    pub fn new(state: &'a AppState) -> Self {
        Self {
            orders: state.mongo.collection::<PaymentOrder>(PAYMENT_ORDERS),
            state,
        }
    }

    /// Records a pending membership order and returns the signed gateway URL.
    pub async fn create_payment_url(
        &self,
        user_id: &str,
        req: CreatePaymentUrlRequest,
        client_ip: &str,
    ) -> AppResult<PaymentUrlResponse> {
        let user = UserService::new(self.state.mongo.clone()).get(user_id).await?;
        let active = user
            .instructor_information
            .as_ref()
            .and_then(|info| info.active_plan(chrono::Utc::now()));
        if let Some(plan) = active {
            return Err(AppError::InvalidOperation(format!(
                "Your {} membership is still active",
                plan.as_str()
            )));
        }

        let amount = req.plan.price_vnd(&self.state.config.pricing);
        let txn_ref = new_txn_ref();
        let order_info = req
            .order_description
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("Membership {} for {}", req.plan.as_str(), user.email));

        let url = self.state.vnpay.build_payment_url(&PaymentRequest {
            txn_ref: txn_ref.clone(),
            amount_vnd: amount,
            order_info,
            locale: req.language,
            bank_code: req.bank_code,
            client_ip: client_ip.to_string(),
            created_at: chrono::Utc::now(),
        })?;

        let now = now_millis();
        let order = PaymentOrder {
            id: new_id(),
            txn_ref: txn_ref.clone(),
            user_id: user_id.to_string(),
            plan: req.plan,
            amount,
            status: OrderStatus::Pending,
            gateway_transaction_no: None,
            response_code: None,
            paid_at: None,
            membership_activated: false,
            created_at: now,
            updated_at: now,
        };
        track_db_operation("insert_one", PAYMENT_ORDERS, self.orders.insert_one(&order))
            .await
            .context("Failed to record payment order")?;

        tracing::info!(user_id, txn_ref = %txn_ref, amount, plan = req.plan.as_str(), "Payment order created");
        Ok(PaymentUrlResponse {
            vnp_url: url,
            txn_ref,
        })
    }

    /// Server-to-server confirmation. Always answers with an acknowledgement.
    pub async fn handle_ipn(&self, params: &BTreeMap<String, String>) -> IpnAck {
        if !self.state.vnpay.verify(params) {
            record_payment_callback("vnpay", "bad_checksum");
            tracing::warn!("VNPay IPN with invalid signature");
            return IpnAck::BAD_CHECKSUM;
        }
        match self.settle(params).await {
            Ok(ack) => ack,
            Err(e) => {
                record_payment_callback("vnpay", "error");
                tracing::error!("VNPay IPN failed: {}", e);
                IpnAck::UNKNOWN_ERROR
            }
        }
    }

    async fn settle(&self, params: &BTreeMap<String, String>) -> AppResult<IpnAck> {
        let txn_ref = params.get(TXN_REF).map(String::as_str).unwrap_or_default();
        let Some(order) = self
            .orders
            .find_one(doc! { "txn_ref": txn_ref })
            .await
            .context("Failed to load payment order")?
        else {
            record_payment_callback("vnpay", "unknown_order");
            return Ok(IpnAck::ORDER_NOT_FOUND);
        };

        let amount_matches = params
            .get(AMOUNT)
            .and_then(|a| a.parse::<u64>().ok())
            .is_some_and(|a| a == order.amount * 100);
        if !amount_matches {
            record_payment_callback("vnpay", "invalid_amount");
            return Ok(IpnAck::INVALID_AMOUNT);
        }
        match order.settlement() {
            Settlement::AlreadyConfirmed => {
                record_payment_callback("vnpay", "already_confirmed");
                return Ok(IpnAck::ALREADY_CONFIRMED);
            }
            Settlement::ResumeActivation => {
                tracing::warn!(txn_ref, "Resuming membership activation for paid order");
                let paid_at = order.paid_at.unwrap_or(order.updated_at);
                self.activate_membership(&order, paid_at).await?;
                record_payment_callback("vnpay", "paid");
                return Ok(IpnAck::SUCCESS);
            }
            Settlement::Record => {}
        }

        let response_code = params.get(RESPONSE_CODE).cloned().unwrap_or_default();
        let paid = response_code == "00";
        let status = if paid { "paid" } else { "failed" };
        let now = now_millis();

        let result = track_db_operation(
            "update_one",
            PAYMENT_ORDERS,
            self.orders.update_one(
                doc! { "_id": &order.id, "status": "pending" },
                doc! { "$set": {
                    "status": status,
                    "response_code": &response_code,
                    "gateway_transaction_no": params.get(TRANSACTION_NO).cloned(),
                    "paid_at": if paid { Some(now) } else { None },
                    "updatedAt": now,
                } },
            ),
        )
        .await
        .context("Failed to settle payment order")?;
        if result.modified_count == 0 {
            record_payment_callback("vnpay", "already_confirmed");
            return Ok(IpnAck::ALREADY_CONFIRMED);
        }

        if paid {
            // A failure here leaves the order paid but unactivated; the gateway's retry resumes it.
            self.activate_membership(&order, now).await?;
            tracing::info!(user_id = %order.user_id, txn_ref, plan = order.plan.as_str(), "Membership activated");
        } else {
            tracing::info!(txn_ref, response_code = %response_code, "Payment failed at gateway");
        }
        record_payment_callback("vnpay", status);
        Ok(IpnAck::SUCCESS)
    }

    /// Writes the whole sub-document (the field may be null on plain subscribers),
    /// then marks the order activated. Repeating it with the same `plan_start` is harmless.
    async fn activate_membership(&self, order: &PaymentOrder, plan_start: i64) -> AppResult<()> {
        let users = self.state.mongo.collection::<User>(USERS);
        let user = users
            .find_one(doc! { "_id": &order.user_id })
            .await
            .context("Failed to load buyer")?
            .ok_or_else(|| AppError::not_found("User"))?;
        let mut info = user.instructor_information.unwrap_or_default();
        info.plan_type = Some(order.plan);
        info.plan_start = Some(plan_start);
        let info = bson::to_bson(&info).context("Failed to encode membership")?;

        let now = now_millis();
        users
            .update_one(
                doc! { "_id": &order.user_id },
                doc! { "$set": { "instructor_information": info, "updatedAt": now } },
            )
            .await
            .context("Failed to activate membership")?;

        track_db_operation(
            "update_one",
            PAYMENT_ORDERS,
            self.orders.update_one(
                doc! { "_id": &order.id },
                doc! { "$set": { "membership_activated": true, "updatedAt": now } },
            ),
        )
        .await
        .context("Failed to mark membership activated")?;
        Ok(())
    }

    pub fn return_redirect(&self, params: &BTreeMap<String, String>) -> String {
        self.state.vnpay.return_redirect(params).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn txn_refs_are_numeric_and_distinct() {
        let a = new_txn_ref();
        let b = new_txn_ref();
        assert_eq!(a.len(), 14);
        assert!(a.chars().all(|c| c.is_ascii_digit()));
        assert_ne!(a, b);
    }
}
