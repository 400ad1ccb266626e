use crate::config::ProcessorConfig;
use crate::middleware::logging::log_external_call;
use crate::payments::error::{PaymentError, PaymentResult};
use crate::payments::polling::PollPolicy;
use crate::payments::provider::PaymentProcessor;
use crate::payments::signature::integrity_signature;
use crate::payments::types::{
    AcceptanceToken, CreateTransactionRequest, FinancialInstitution, ProcessorTransaction,
    TransactionStatus,
};
use crate::payments::utils::PaymentHttpClient;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Instant;
use tracing::info;

/// HTTP client for the Wompi REST API (PSE only).
pub struct WompiProcessor {
    base_url: String,
    public_key: String,
    private_key: String,
    integrity_secret: String,
    poll_policy: PollPolicy,
    http: PaymentHttpClient,
}

impl WompiProcessor {
    pub fn new(config: &ProcessorConfig) -> PaymentResult<Self> {
        let http = PaymentHttpClient::new(config.request_timeout, config.max_retries)?;
        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            public_key: config.public_key.clone(),
            private_key: config.private_key.clone(),
            integrity_secret: config.integrity_secret.clone(),
            poll_policy: PollPolicy {
                interval: config.poll_interval,
                max_attempts: config.poll_attempts,
            },
            http,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[async_trait]
impl PaymentProcessor for WompiProcessor {
    async fn get_acceptance_token(&self) -> PaymentResult<AcceptanceToken> {
        let started = Instant::now();
        let result: PaymentResult<WompiEnvelope<MerchantData>> = self
            .http
            .get_json(&self.endpoint(&format!("/merchants/{}", self.public_key)), None)
            .await;
        log_external_call("wompi", "get_merchant", started.elapsed(), result.is_ok());

        let merchant = result?
            .data
            .ok_or_else(|| PaymentError::upstream("merchant response without data"))?;
        let acceptance = merchant
            .presigned_acceptance
            .filter(|a| !a.acceptance_token.trim().is_empty())
            .ok_or_else(|| PaymentError::upstream("merchant response without acceptance token"))?;

        Ok(AcceptanceToken {
            token: acceptance.acceptance_token,
            contract_id: merchant
                .id
                .map(|id| id.to_string())
                .unwrap_or_default(),
            permalink: acceptance.permalink,
        })
    }

    async fn create_transaction(
        &self,
        request: CreateTransactionRequest,
    ) -> PaymentResult<ProcessorTransaction> {
        let signature = integrity_signature(
            &request.reference,
            request.amount_in_cents,
            &request.currency,
            &self.integrity_secret,
        );
        let payment = &request.payment_method;

        let payload = serde_json::json!({
            "acceptance_token": request.acceptance_token,
            "amount_in_cents": request.amount_in_cents,
            "currency": request.currency,
            "customer_email": request.customer_email,
            "reference": request.reference,
            "redirect_url": request.redirect_url,
            "signature": signature,
            "customer_data": {
                "full_name": request.customer_full_name,
                "phone_number": request.customer_phone,
            },
            "payment_method": {
                "type": "PSE",
                "user_type": payment.user_type.processor_code(),
                "user_legal_id_type": payment.user_legal_id_type,
                "user_legal_id": payment.user_legal_id,
                "financial_institution_code": payment.financial_institution_code,
                "payment_description": payment.payment_description,
            },
        });

        let started = Instant::now();
        let result: PaymentResult<WompiEnvelope<TransactionData>> = self
            .http
            .post_json(
                &self.endpoint("/transactions"),
                Some(&self.private_key),
                &payload,
            )
            .await;
        log_external_call(
            "wompi",
            "create_transaction",
            started.elapsed(),
            result.is_ok(),
        );

        let transaction = result?
            .data
            .ok_or_else(|| PaymentError::upstream("transaction response without data"))?
            .into_processor_transaction()?;

        info!(
            reference = %request.reference,
            transaction_id = %transaction.id,
            status = %transaction.status,
            "processor transaction created"
        );

        Ok(transaction)
    }

    async fn get_transaction(&self, transaction_id: &str) -> PaymentResult<ProcessorTransaction> {
        let started = Instant::now();
        let result: PaymentResult<WompiEnvelope<TransactionData>> = self
            .http
            .get_json(
                &self.endpoint(&format!("/transactions/{}", transaction_id)),
                Some(&self.public_key),
            )
            .await;
        log_external_call("wompi", "get_transaction", started.elapsed(), result.is_ok());

        result?
            .data
            .ok_or_else(|| PaymentError::upstream("transaction response without data"))?
            .into_processor_transaction()
    }

    async fn list_financial_institutions(&self) -> PaymentResult<Vec<FinancialInstitution>> {
        let started = Instant::now();
        let result: PaymentResult<WompiEnvelope<Vec<FinancialInstitutionData>>> = self
            .http
            .get_json_retrying(
                &self.endpoint("/pse/financial_institutions"),
                Some(&self.public_key),
            )
            .await;
        log_external_call(
            "wompi",
            "list_financial_institutions",
            started.elapsed(),
            result.is_ok(),
        );

        Ok(result?
            .data
            .unwrap_or_default()
            .into_iter()
            .map(|bank| FinancialInstitution {
                code: bank.financial_institution_code,
                name: bank.financial_institution_name,
            })
            .collect())
    }

    fn poll_policy(&self) -> PollPolicy {
        self.poll_policy
    }

    fn name(&self) -> &'static str {
        "wompi"
    }
}

#[derive(Debug, Deserialize)]
struct WompiEnvelope<T> {
    data: Option<T>,
}

#[derive(Debug, Deserialize)]
struct MerchantData {
    id: Option<serde_json::Value>,
    presigned_acceptance: Option<PresignedAcceptance>,
}

#[derive(Debug, Deserialize)]
struct PresignedAcceptance {
    acceptance_token: String,
    permalink: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TransactionData {
    id: String,
    reference: Option<String>,
    status: String,
    status_message: Option<String>,
    payment_method: Option<TransactionPaymentMethod>,
}

#[derive(Debug, Deserialize)]
struct TransactionPaymentMethod {
    extra: Option<PaymentMethodExtra>,
}

#[derive(Debug, Deserialize)]
struct PaymentMethodExtra {
    async_payment_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FinancialInstitutionData {
    financial_institution_code: String,
    financial_institution_name: String,
}

impl TransactionData {
    fn into_processor_transaction(self) -> PaymentResult<ProcessorTransaction> {
        let status = TransactionStatus::from_processor(&self.status).ok_or_else(|| {
            PaymentError::upstream(format!("unrecognized transaction status: {}", self.status))
        })?;
        let payment_url = self
            .payment_method
            .and_then(|method| method.extra)
            .and_then(|extra| extra.async_payment_url)
            .filter(|url| !url.trim().is_empty());

        Ok(ProcessorTransaction {
            id: self.id,
            reference: self.reference,
            status,
            status_message: self.status_message,
            payment_url,
        })
    }
}
