use serde::{Deserialize, Serialize};

use crate::models::membership::PlanType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Paid,
    Failed,
}

/// Membership purchase through the redirect gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentOrder {
    #[serde(rename = "_id")]
    pub id: String,
    pub txn_ref: String,
    pub user_id: String,
    pub plan: PlanType,
    /// VND, before the gateway's x100 scaling.
    pub amount: u64,
    pub status: OrderStatus,
    pub gateway_transaction_no: Option<String>,
    pub response_code: Option<String>,
    /// Set when the order flips to `paid`; the membership starts here.
    #[serde(default)]
    pub paid_at: Option<i64>,
    /// Set once the buyer's membership has been written.
    #[serde(default)]
    pub membership_activated: bool,
    #[serde(rename = "createdAt")]
    pub created_at: i64,
    #[serde(rename = "updatedAt")]
    pub updated_at: i64,
}

/// What a verified gateway confirmation does with an existing order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settlement {
    /// First confirmation: record the gateway result.
    Record,
    /// Paid earlier but the membership write never landed.
    ResumeActivation,
    AlreadyConfirmed,
}

impl PaymentOrder {
    pub fn settlement(&self) -> Settlement {
        match self.status {
            OrderStatus::Pending => Settlement::Record,
            OrderStatus::Paid if !self.membership_activated => Settlement::ResumeActivation,
            OrderStatus::Paid | OrderStatus::Failed => Settlement::AlreadyConfirmed,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreatePaymentUrlRequest {
    pub plan: PlanType,
    #[serde(rename = "orderDescription")]
    pub order_description: Option<String>,
    #[serde(rename = "bankCode")]
    pub bank_code: Option<String>,
    pub language: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PaymentUrlResponse {
    #[serde(rename = "vnpUrl")]
    pub vnp_url: String,
    pub txn_ref: String,
}

/// Acknowledgement body the gateway expects from the IPN endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IpnAck {
    #[serde(rename = "RspCode")]
    pub rsp_code: &'static str,
    #[serde(rename = "Message")]
    pub message: &'static str,
}

impl IpnAck {
    pub const SUCCESS: IpnAck = IpnAck {
        rsp_code: "00",
        message: "Confirm Success",
    };
    pub const ORDER_NOT_FOUND: IpnAck = IpnAck {
        rsp_code: "01",
        message: "Order not found",
    };
    pub const ALREADY_CONFIRMED: IpnAck = IpnAck {
        rsp_code: "02",
        message: "Order already confirmed",
    };
    pub const INVALID_AMOUNT: IpnAck = IpnAck {
        rsp_code: "04",
        message: "Invalid amount",
    };
    pub const BAD_CHECKSUM: IpnAck = IpnAck {
        rsp_code: "97",
        message: "Fail checksum",
    };
    pub const UNKNOWN_ERROR: IpnAck = IpnAck {
        rsp_code: "99",
        message: "Unknown error",
    };
}
