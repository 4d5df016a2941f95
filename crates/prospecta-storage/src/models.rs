//! Registry entities as stored in the relational backend.

use serde::{Deserialize, Serialize};

/// A company, keyed by its 8-digit base-id (`cnpj_basico`).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Company {
    pub base_id: String,
    pub legal_name: String,
    pub legal_nature: String,
    pub responsible_qualification: String,
    pub size: String,
    pub responsible_federative_entity: String,
    pub share_capital: f64,
}

impl Company {
    /// Creates a company with the given base-id and legal name; other fields empty.
    pub fn new(base_id: impl Into<String>, legal_name: impl Into<String>) -> Self {
        Self {
            base_id: base_id.into(),
            legal_name: legal_name.into(),
            ..Default::default()
        }
    }
}

/// A single establishment (head office or branch) of a company.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Establishment {
    pub id: i64,
    /// Raw 14-digit CNPJ without punctuation.
    pub cnpj: String,
    pub base_id: String,
    pub order: String,
    pub check_digits: String,
    /// "1" for head office, "2" for branch.
    pub head_office_flag: String,
    pub trade_name: String,
    pub registration_status: String,
    pub registration_status_date: String,
    pub registration_status_reason: String,
    pub foreign_city: String,
    pub country: String,
    pub activity_start: String,
    pub primary_activity: String,
    /// Comma-delimited list of secondary activity codes.
    pub secondary_activities: String,
    pub street_type: String,
    pub street: String,
    pub number: String,
    pub complement: String,
    pub district: String,
    pub postal_code: String,
    pub state: String,
    pub municipality: String,
    pub phone1_area: String,
    pub phone1: String,
    pub phone2_area: String,
    pub phone2: String,
    pub fax_area: String,
    pub fax: String,
    pub email: String,
    pub special_status: String,
    pub special_status_date: String,
}

impl Establishment {
    /// Creates an establishment with identity fields set; other fields empty.
    pub fn new(id: i64, cnpj: impl Into<String>, base_id: impl Into<String>) -> Self {
        Self {
            id,
            cnpj: cnpj.into(),
            base_id: base_id.into(),
            ..Default::default()
        }
    }

    /// Renders the CNPJ as `XX.XXX.XXX/XXXX-XX`.
    ///
    /// Values that are not exactly 14 characters long are returned unchanged.
    pub fn formatted_cnpj(&self) -> String {
        let cnpj = self.cnpj.as_str();
        if cnpj.len() != 14 || !cnpj.is_ascii() {
            return cnpj.to_string();
        }
        format!(
            "{}.{}.{}/{}-{}",
            &cnpj[0..2],
            &cnpj[2..5],
            &cnpj[5..8],
            &cnpj[8..12],
            &cnpj[12..14]
        )
    }

    /// Whether this establishment is the company's head office.
    pub fn is_head_office(&self) -> bool {
        self.head_office_flag == "1"
    }
}

/// A partner (shareholder or administrator) of a company.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Partner {
    pub cnpj: String,
    pub base_id: String,
    pub partner_kind: String,
    pub name: String,
    pub document: String,
    pub qualification: String,
    pub joined_on: String,
    pub country: String,
    pub legal_representative: String,
    pub representative_name: String,
    pub representative_qualification: String,
    pub age_range: String,
}

impl Partner {
    /// Creates a partner of the given company with a name; other fields empty.
    pub fn new(base_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            base_id: base_id.into(),
            name: name.into(),
            ..Default::default()
        }
    }
}

/// An economic activity code (CNAE) and its description.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ActivityCode {
    pub code: String,
    pub description: String,
}

impl ActivityCode {
    pub fn new(code: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            description: description.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_formats_fourteen_digit_cnpj() {
        let est = Establishment::new(1, "12345678000195", "12345678");
        assert_eq!(est.formatted_cnpj(), "12.345.678/0001-95");
    }

    #[test]
    fn test_leaves_short_cnpj_unformatted() {
        let est = Establishment::new(1, "1234567", "1234567");
        assert_eq!(est.formatted_cnpj(), "1234567");
    }

    #[test]
    fn test_head_office_flag() {
        let mut est = Establishment::new(1, "12345678000195", "12345678");
        est.head_office_flag = "1".to_string();
        assert!(est.is_head_office());
        est.head_office_flag = "2".to_string();
        assert!(!est.is_head_office());
    }
}
