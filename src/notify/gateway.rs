// src/notify/gateway.rs
use std::str::FromStr;

use anyhow::{anyhow, bail, Result};

/// US carriers with an email-to-SMS gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Carrier {
    Att,
    Verizon,
    TMobile,
    Sprint,
    UsCellular,
    Boost,
    Cricket,
    MetroPcs,
    Virgin,
    GoogleFi,
}

impl Carrier {
    pub fn gateway_domain(self) -> &'static str {
        match self {
            Carrier::Att => "txt.att.net",
            Carrier::Verizon => "vtext.com",
            Carrier::TMobile => "tmomail.net",
            Carrier::Sprint => "messaging.sprintpcs.com",
            Carrier::UsCellular => "email.uscc.net",
            Carrier::Boost => "sms.myboostmobile.com",
            Carrier::Cricket => "sms.cricketwireless.net",
            Carrier::MetroPcs => "mymetropcs.com",
            Carrier::Virgin => "vmobl.com",
            Carrier::GoogleFi => "msg.fi.google.com",
        }
    }
}

impl FromStr for Carrier {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let key: String = s
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();
        Ok(match key.as_str() {
            "att" => Carrier::Att,
            "verizon" => Carrier::Verizon,
            "tmobile" => Carrier::TMobile,
            "sprint" => Carrier::Sprint,
            "uscellular" => Carrier::UsCellular,
            "boost" | "boostmobile" => Carrier::Boost,
            "cricket" => Carrier::Cricket,
            "metropcs" | "metro" => Carrier::MetroPcs,
            "virgin" | "virginmobile" => Carrier::Virgin,
            "googlefi" | "fi" => Carrier::GoogleFi,
            _ => return Err(anyhow!("unknown carrier {s:?}")),
        })
    }
}

/// `"(619) 555-0100", "AT&T"` → `"6195550100@txt.att.net"`.
pub fn sms_gateway_address(number: &str, carrier: &str) -> Result<String> {
    let mut digits: String = number.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.len() == 11 && digits.starts_with('1') {
        digits.remove(0);
    }
    if digits.len() != 10 {
        bail!("phone number {number:?} is not a 10-digit US number");
    }
    let carrier: Carrier = carrier.parse()?;
    Ok(format!("{digits}@{}", carrier.gateway_domain()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_gateway_addresses() {
        assert_eq!(
            sms_gateway_address("(619) 555-0100", "AT&T").unwrap(),
            "6195550100@txt.att.net"
        );
        assert_eq!(
            sms_gateway_address("+1 858 555 0199", "T-Mobile").unwrap(),
            "8585550199@tmomail.net"
        );
    }

    #[test]
    fn rejects_bad_numbers_and_carriers() {
        assert!(sms_gateway_address("555-0100", "verizon").is_err());
        assert!(sms_gateway_address("6195550100", "carrier pigeon").is_err());
    }
}
