use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Local lifecycle status of a payment transaction.
///
/// `Pending` is the only valid initial value. The other three are terminal:
/// once reached, the status never moves again.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionStatus {
    Pending,
    Approved,
    Declined,
    Voided,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "PENDING",
            TransactionStatus::Approved => "APPROVED",
            TransactionStatus::Declined => "DECLINED",
            TransactionStatus::Voided => "VOIDED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, TransactionStatus::Pending)
    }

    /// Map a status string reported by the processor.
    ///
    /// The processor also reports `ERROR` for transactions that failed on its
    /// side; locally those are declined.
    pub fn from_processor(value: &str) -> Option<Self> {
        match value.trim().to_uppercase().as_str() {
            "PENDING" => Some(TransactionStatus::Pending),
            "APPROVED" => Some(TransactionStatus::Approved),
            "DECLINED" | "ERROR" => Some(TransactionStatus::Declined),
            "VOIDED" => Some(TransactionStatus::Voided),
            _ => None,
        }
    }
}

impl std::fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for TransactionStatus {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "PENDING" => Ok(TransactionStatus::Pending),
            "APPROVED" => Ok(TransactionStatus::Approved),
            "DECLINED" => Ok(TransactionStatus::Declined),
            "VOIDED" => Ok(TransactionStatus::Voided),
            other => Err(format!("unknown transaction status: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum PaymentMethod {
    /// Colombian bank transfer (Pagos Seguros en Línea).
    #[default]
    #[serde(rename = "PSE")]
    Pse,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Pse => "PSE",
        }
    }
}

/// Kind of person paying through PSE.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum UserType {
    #[default]
    Natural,
    Legal,
}

impl UserType {
    /// Numeric code the processor expects in `payment_method.user_type`.
    pub fn processor_code(&self) -> u8 {
        match self {
            UserType::Natural => 0,
            UserType::Legal => 1,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            UserType::Natural => "natural",
            UserType::Legal => "legal",
        }
    }
}

/// One cart line at payment time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LineItem {
    pub name: String,
    pub unit_price: i64,
    pub quantity: u32,
}

/// Merchant-scoped proof that the payer accepted the processor's terms.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcceptanceToken {
    pub token: String,
    pub contract_id: String,
    pub permalink: Option<String>,
}

/// PSE specific part of a transaction request.
#[derive(Debug, Clone)]
pub struct PsePaymentDetails {
    pub user_type: UserType,
    pub user_legal_id: String,
    pub user_legal_id_type: String,
    pub financial_institution_code: String,
    pub payment_description: String,
}

/// Everything the processor needs to create a transaction. The integrity
/// signature is computed by the client, which owns the secret.
#[derive(Debug, Clone)]
pub struct CreateTransactionRequest {
    pub acceptance_token: String,
    pub amount_in_cents: i64,
    pub currency: String,
    pub reference: String,
    pub customer_email: String,
    pub customer_full_name: String,
    pub customer_phone: String,
    pub redirect_url: Option<String>,
    pub payment_method: PsePaymentDetails,
}

/// Typed view of a transaction as the processor reports it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessorTransaction {
    pub id: String,
    pub reference: Option<String>,
    pub status: TransactionStatus,
    pub status_message: Option<String>,
    pub payment_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FinancialInstitution {
    #[serde(rename = "codigo")]
    pub code: String,
    #[serde(rename = "nombre")]
    pub name: String,
}
