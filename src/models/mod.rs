use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

// ── Identifier ────────────────────────────────────────────────────────────────

/// Token the directory site uses to key a company in its own backend.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identifier(String);

impl Identifier {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Identifier {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

// ── Detail record ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Phone {
    #[serde(rename = "type")]
    pub kind: String,
    pub number: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Product {
    pub code: String,
    pub name: String,
}

/// `null` or an absent key reads as the type's empty value.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// One company's export profile, decoded from its detail page.
///
/// JSON keys match the artifacts the earlier scripts wrote (`cep`, `site`,
/// `activity`). Those files carry no `id` and write `null` for every field of
/// a row-less page; both read back as empty values, and
/// [`crate::storage::ArtifactStore::read_record`] fills the id from the file
/// name.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DetailRecord {
    #[serde(default, deserialize_with = "null_as_default")]
    pub id: Identifier,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub address: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub district: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub city: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub state: String,
    #[serde(rename = "cep", default)]
    pub postal_code: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub phones: Vec<Phone>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub emails: Vec<String>,
    #[serde(rename = "site", default)]
    pub website: Option<String>,
    #[serde(default)]
    pub contact_name: Option<String>,
    #[serde(default)]
    pub export_price_range: Option<String>,
    #[serde(rename = "activity", default, deserialize_with = "null_as_default")]
    pub activity_sector: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub countries: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub products: Vec<Product>,
}

impl DetailRecord {
    /// Record for a page that carried no table rows at all. Every field is
    /// left empty; the site serves such pages for withdrawn companies.
    pub fn unpopulated(id: Identifier) -> Self {
        Self {
            id,
            name: String::new(),
            address: String::new(),
            district: String::new(),
            city: String::new(),
            state: String::new(),
            postal_code: None,
            phones: Vec::new(),
            emails: Vec::new(),
            website: None,
            contact_name: None,
            export_price_range: None,
            activity_sector: String::new(),
            countries: Vec::new(),
            products: Vec::new(),
        }
    }

    pub fn is_unpopulated(&self) -> bool {
        *self == Self::unpopulated(self.id.clone())
    }
}

fn or_dash(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or("—")
}

impl fmt::Display for DetailRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let phones: Vec<String> = self
            .phones
            .iter()
            .map(|p| format!("{} {}", p.kind, p.number))
            .collect();
        let products: Vec<String> = self
            .products
            .iter()
            .map(|p| format!("{} {}", p.code, p.name))
            .collect();

        writeln!(f, "ID                 : {}", self.id)?;
        writeln!(f, "Name               : {}", self.name)?;
        writeln!(f, "Address            : {}", self.address)?;
        writeln!(f, "District           : {}", self.district)?;
        writeln!(f, "City               : {}", self.city)?;
        writeln!(f, "State              : {}", self.state)?;
        writeln!(f, "CEP                : {}", or_dash(&self.postal_code))?;
        writeln!(f, "Phones             : {}", phones.join(", "))?;
        writeln!(f, "Emails             : {}", self.emails.join(", "))?;
        writeln!(f, "Site               : {}", or_dash(&self.website))?;
        writeln!(f, "Contact name       : {}", or_dash(&self.contact_name))?;
        writeln!(f, "Export price range : {}", or_dash(&self.export_price_range))?;
        writeln!(f, "Activity sector    : {}", self.activity_sector)?;
        writeln!(f, "Countries          : {}", self.countries.join(", "))?;
        write!(f, "Products           : {}", products.join("; "))
    }
}
