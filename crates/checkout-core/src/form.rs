//! Card and Delivery Form
//!
//! Raw input captured on the card/delivery step. The raw card number and CVC
//! live only in these in-memory values; the persisted checkout keeps the
//! card token, the network and the last four digits.

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::outcome::Outcome;
use crate::validation::{
    mask_card_number, validate_address, validate_card_holder, validate_card_number,
    validate_city, validate_cvc, validate_email, validate_expiry_date_at, validate_name,
    validate_phone,
};

/// Everything the card/delivery step collects
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutForm {
    pub card_number: String,
    pub cvc: String,
    pub expiry_month: String,
    pub expiry_year: String,
    pub card_holder: String,

    pub name: String,
    pub email: String,
    pub phone: String,

    pub address: String,
    pub city: String,
    #[serde(default)]
    pub postal_code: String,
}

impl std::fmt::Debug for CheckoutForm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CheckoutForm")
            .field("card_number", &mask_card_number(&self.card_number))
            .field("cvc", &"***")
            .field("expiry", &format_args!("{}/{}", self.expiry_month, self.expiry_year))
            .field("card_holder", &self.card_holder)
            .field("name", &self.name)
            .field("email", &self.email)
            .field("phone", &self.phone)
            .field("address", &self.address)
            .field("city", &self.city)
            .field("postal_code", &self.postal_code)
            .finish()
    }
}

impl CheckoutForm {
    /// Run every field check in display order, reporting the first failure
    pub fn validate(&self) -> Outcome<()> {
        self.validate_at(Utc::now().date_naive())
    }

    /// [`CheckoutForm::validate`] with an explicit "today" for the expiry check
    pub fn validate_at(&self, today: NaiveDate) -> Outcome<()> {
        let expiry = format!("{}/{}", self.expiry_month, self.expiry_year);

        let checks = [
            (validate_card_number(&self.card_number), "Invalid card number"),
            (validate_expiry_date_at(&expiry, today), "Invalid expiry date"),
            (validate_cvc(&self.cvc), "Invalid CVC"),
            (validate_card_holder(&self.card_holder), "Invalid card holder name"),
            (validate_name(&self.name), "Name must be at least 3 characters"),
            (validate_email(&self.email), "Invalid email"),
            (validate_phone(&self.phone), "Invalid phone number"),
            (validate_address(&self.address), "Address must be at least 10 characters"),
            (validate_city(&self.city), "Invalid city"),
        ];

        Outcome::combine(checks.into_iter().map(|(passed, message)| {
            if passed { Outcome::success(()) } else { Outcome::failure(message) }
        }))
        .map(|_| ())
    }

    /// Card fields in the shape the tokenization service expects
    pub fn card_details(&self) -> CardDetails {
        CardDetails {
            number: self.card_number.chars().filter(|c| !c.is_whitespace()).collect(),
            cvc: self.cvc.clone(),
            exp_month: self.expiry_month.clone(),
            exp_year: self.expiry_year.clone(),
            card_holder: self.card_holder.clone(),
        }
    }

    pub fn customer(&self) -> CustomerInfo {
        CustomerInfo {
            name: self.name.clone(),
            email: self.email.clone(),
            phone: self.phone.clone(),
        }
    }

    pub fn delivery(&self) -> DeliveryInfo {
        DeliveryInfo {
            address: self.address.clone(),
            city: self.city.clone(),
            postal_code: self.postal_code.clone(),
        }
    }
}

/// Raw card data sent to the tokenizer and nowhere else
#[derive(Clone, Serialize)]
pub struct CardDetails {
    pub number: String,
    pub cvc: String,
    pub exp_month: String,
    pub exp_year: String,
    pub card_holder: String,
}

impl std::fmt::Debug for CardDetails {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CardDetails")
            .field("number", &mask_card_number(&self.number))
            .field("cvc", &"***")
            .field("exp_month", &self.exp_month)
            .field("exp_year", &self.exp_year)
            .field("card_holder", &self.card_holder)
            .finish()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerInfo {
    pub name: String,
    pub email: String,
    pub phone: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryInfo {
    pub address: String,
    pub city: String,
    pub postal_code: String,
}
