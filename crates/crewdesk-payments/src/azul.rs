use hmac::{Hmac, Mac};
use sha2::Sha512;

use crewdesk_types::api::AzulPaymentResponse;

use crate::PaymentError;

type HmacSha512 = Hmac<Sha512>;

/// Merchant credentials and redirect URLs for the Azul hosted payment page.
/// Built once from the environment at startup and passed down; handlers never
/// touch process-wide state.
#[derive(Debug, Clone)]
pub struct AzulConfig {
    pub merchant_id: String,
    pub merchant_name: String,
    pub merchant_type: String,
    pub currency_code: String,
    pub approved_url: String,
    pub declined_url: String,
    pub cancel_url: String,
    pub auth_key: String,
    pub form_url: String,
}

impl AzulConfig {
    pub fn from_env() -> Result<Self, PaymentError> {
        let var = |name: &'static str| {
            std::env::var(name).map_err(|_| PaymentError::MissingField(name))
        };
        Ok(Self {
            merchant_id: var("AZUL_MERCHANT_ID")?,
            merchant_name: var("AZUL_MERCHANT_NAME")?,
            merchant_type: var("AZUL_MERCHANT_TYPE")?,
            currency_code: std::env::var("AZUL_CURRENCY_CODE").unwrap_or_else(|_| "$".into()),
            approved_url: var("AZUL_APPROVED_URL")?,
            declined_url: var("AZUL_DECLINED_URL")?,
            cancel_url: var("AZUL_CANCEL_URL")?,
            auth_key: var("AZUL_AUTH_KEY")?,
            form_url: std::env::var("AZUL_FORM_URL")
                .unwrap_or_else(|_| "https://pagos.azul.com.do/PaymentPage/".into()),
        })
    }

    /// Build the signed form payload for the hosted payment page.
    ///
    /// The field sequence below is external protocol: the payment page
    /// recomputes the hash over the exact same byte sequence, so any
    /// reordering or omission silently breaks the signature. The six
    /// custom-field placeholders ("0"/"") are part of the signed string even
    /// though this integration never uses them.
    ///
    /// `amount` and `itbis` are pre-formatted minor-unit strings with no
    /// separators ("2900" means 29.00).
    pub fn build_form(
        &self,
        order_id: &str,
        amount: &str,
        itbis: &str,
    ) -> Result<AzulPaymentResponse, PaymentError> {
        if order_id.trim().is_empty() {
            return Err(PaymentError::MissingField("order_id"));
        }
        if amount.trim().is_empty() {
            return Err(PaymentError::MissingField("amount"));
        }
        if itbis.trim().is_empty() {
            return Err(PaymentError::MissingField("itbis"));
        }

        let fields: Vec<(String, String)> = vec![
            ("MerchantId".into(), self.merchant_id.clone()),
            ("MerchantName".into(), self.merchant_name.clone()),
            ("MerchantType".into(), self.merchant_type.clone()),
            ("CurrencyCode".into(), self.currency_code.clone()),
            ("OrderNumber".into(), order_id.into()),
            ("Amount".into(), amount.into()),
            ("ITBIS".into(), itbis.into()),
            ("ApprovedUrl".into(), self.approved_url.clone()),
            ("DeclinedUrl".into(), self.declined_url.clone()),
            ("CancelUrl".into(), self.cancel_url.clone()),
            ("UseCustomField1".into(), "0".into()),
            ("CustomField1Label".into(), String::new()),
            ("CustomField1Value".into(), String::new()),
            ("UseCustomField2".into(), "0".into()),
            ("CustomField2Label".into(), String::new()),
            ("CustomField2Value".into(), String::new()),
        ];

        let mut signed = String::new();
        for (_, value) in &fields {
            signed.push_str(value);
        }
        signed.push_str(&self.auth_key);

        let mut mac = HmacSha512::new_from_slice(self.auth_key.as_bytes())
            .map_err(|e| PaymentError::Provider(format!("HMAC init: {e}")))?;
        mac.update(signed.as_bytes());
        let auth_hash = hex::encode(mac.finalize().into_bytes());

        let mut fields = fields;
        fields.push(("AuthHash".into(), auth_hash));

        Ok(AzulPaymentResponse {
            form_url: self.form_url.clone(),
            fields,
        })
    }
}
