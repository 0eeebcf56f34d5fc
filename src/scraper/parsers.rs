use crate::models::{DetailRecord, Identifier};
use scraper::{ElementRef, Html, Selector};
use thiserror::Error;
use tracing::{debug, warn};

use super::cleaner::{self, FieldError, starts_with_label, strip_label};

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("invalid selector {selector:?}: {reason}")]
    Selector { selector: &'static str, reason: String },

    #[error("company {id}: {source}")]
    Field {
        id: Identifier,
        #[source]
        source: FieldError,
    },
}

fn selector(css: &'static str) -> Result<Selector, ParseError> {
    Selector::parse(css).map_err(|e| ParseError::Selector {
        selector: css,
        reason: e.to_string(),
    })
}

fn element_text(el: ElementRef<'_>) -> String {
    el.text().collect::<String>()
}

// ── Listing page ──────────────────────────────────────────────────────────────

/// Pull the argument out of a click handler such as `pop_detail('4711');`.
///
/// Ids become file names and URL path segments, so anything carrying a path
/// separator or `..` is refused.
pub fn id_from_onclick(handler: &str) -> Option<Identifier> {
    let open = handler.find('(')?;
    let close = handler.rfind(')')?;
    if close <= open {
        return None;
    }
    let arg = handler[open + 1..close]
        .trim()
        .trim_matches(|c| c == '\'' || c == '"')
        .trim();
    if arg.is_empty() || arg.contains(['/', '\\']) || arg.contains("..") {
        return None;
    }
    Some(Identifier::new(arg))
}

/// Company ids linked from one listing page.
pub fn parse_listing_page(html: &str) -> Result<Vec<Identifier>, ParseError> {
    let doc = Html::parse_document(html);
    let link_sel = selector(r##"a[href="#pop_detail"]"##)?;

    let mut ids = Vec::new();
    for link in doc.select(&link_sel) {
        match link.value().attr("onclick").and_then(id_from_onclick) {
            Some(id) => ids.push(id),
            None => warn!("Detail link without usable onclick: {}", link.html()),
        }
    }
    Ok(ids)
}

// ── Detail page ───────────────────────────────────────────────────────────────

/// Where one field lives in the detail table: rows are matched by their
/// leading label, with the historical row index as a fallback.
struct RowField {
    name: &'static str,
    labels: &'static [&'static str],
    position: usize,
}

const ADDRESS: RowField = RowField {
    name: "address",
    labels: &["Endereço", "EndereÃ§o"],
    position: 1,
};
const PHONES: RowField = RowField {
    name: "phones",
    labels: &["Tel", "Telefone", "Fone", "Fax", "Celular"],
    position: 2,
};
const EMAILS: RowField = RowField {
    name: "emails",
    labels: &["E-mail", "Email"],
    position: 3,
};
const SITE_CONTACT: RowField = RowField {
    name: "site",
    labels: &["Site", "Home page", "Contato"],
    position: 4,
};
const PRICE_RANGE: RowField = RowField {
    name: "export_price_range",
    labels: &["Faixa"],
    position: 5,
};
const ACTIVITY_SECTOR: RowField = RowField {
    name: "activity_sector",
    labels: &["Setor de atividade"],
    position: 6,
};

const ROW_FIELDS: [&RowField; 6] = [
    &ADDRESS,
    &PHONES,
    &EMAILS,
    &SITE_CONTACT,
    &PRICE_RANGE,
    &ACTIVITY_SECTOR,
];

/// Same idea for the `thead` sections that list countries and products.
struct SectionField {
    labels: &'static [&'static str],
    position: usize,
}

const COUNTRIES: SectionField = SectionField {
    labels: &["Países", "Paises", "PaÃ­ses", "Destino", "Destinos"],
    position: 2,
};
const PRODUCTS: SectionField = SectionField {
    labels: &["Produtos", "Produto"],
    position: 4,
};

/// Row 0 is the company header; fields start below it.
const FIRST_FIELD_ROW: usize = 1;

/// Row texts of a detail page plus lookups by field.
struct DetailTable {
    rows: Vec<String>,
}

impl DetailTable {
    fn field_rows(&self) -> impl Iterator<Item = &String> {
        self.rows.iter().skip(FIRST_FIELD_ROW)
    }

    fn claimed_by_other(&self, row: &str, field: &RowField) -> bool {
        ROW_FIELDS
            .iter()
            .filter(|other| other.name != field.name)
            .any(|other| starts_with_label(row, other.labels))
    }

    fn row(&self, field: &RowField) -> Option<&str> {
        if let Some(row) = self.field_rows().find(|r| starts_with_label(r, field.labels)) {
            return Some(row.as_str());
        }
        if field.position < FIRST_FIELD_ROW {
            return None;
        }
        self.rows
            .get(field.position)
            .map(String::as_str)
            .filter(|row| !self.claimed_by_other(row, field))
    }

    fn required(&self, field: &RowField) -> Result<&str, FieldError> {
        self.row(field)
            .ok_or(FieldError::Missing { field: field.name })
    }
}

fn section_cells(doc: &Html, field: &SectionField) -> Result<Vec<String>, ParseError> {
    let thead_sel = selector("thead")?;
    let header_sel = selector("th")?;
    let cell_sel = selector("td")?;

    let sections: Vec<ElementRef<'_>> = doc.select(&thead_sel).collect();
    let labelled = sections.iter().find(|section| {
        section
            .select(&header_sel)
            .next()
            .is_some_and(|th| starts_with_label(&element_text(th), field.labels))
    });

    let Some(section) = labelled.or_else(|| sections.get(field.position)) else {
        return Ok(Vec::new());
    };

    Ok(section
        .select(&cell_sel)
        .map(|td| element_text(td).trim().to_string())
        .filter(|text| !text.is_empty())
        .collect())
}

/// Decode one saved detail page.
///
/// A page without any `<tr>` yields [`DetailRecord::unpopulated`].
pub fn parse_detail(id: &Identifier, html: &str) -> Result<DetailRecord, ParseError> {
    let doc = Html::parse_document(html);
    let row_sel = selector("tr")?;
    let name_sel = selector("h3")?;

    let table = DetailTable {
        rows: doc
            .select(&row_sel)
            .map(|tr| element_text(tr).trim().to_string())
            .collect(),
    };

    if table.rows.is_empty() {
        debug!("{}: no table rows, leaving record unpopulated", id);
        return Ok(DetailRecord::unpopulated(id.clone()));
    }

    let field_err = |source: FieldError| ParseError::Field {
        id: id.clone(),
        source,
    };

    let name = doc
        .select(&name_sel)
        .next()
        .map(|h3| element_text(h3).trim().to_string())
        .ok_or(FieldError::Missing { field: "name" })
        .map_err(field_err)?;

    let address_line = table.required(&ADDRESS).map_err(field_err)?;
    let address = cleaner::split_address(strip_label(address_line, ADDRESS.labels))
        .map_err(field_err)?;

    let phones = table
        .required(&PHONES)
        .and_then(cleaner::parse_phones)
        .map_err(field_err)?;

    let emails = cleaner::parse_emails(table.required(&EMAILS).map_err(field_err)?);

    let (website, contact_name) = table
        .row(&SITE_CONTACT)
        .map(cleaner::parse_site_contact)
        .unwrap_or((None, None));

    let export_price_range = table.row(&PRICE_RANGE).and_then(cleaner::parse_price_range);

    let activity_sector =
        cleaner::parse_activity_sector(table.required(&ACTIVITY_SECTOR).map_err(field_err)?);

    let countries = section_cells(&doc, &COUNTRIES)?;
    let products = section_cells(&doc, &PRODUCTS)?
        .iter()
        .map(|cell| cleaner::parse_product(cell))
        .collect();

    Ok(DetailRecord {
        id: id.clone(),
        name,
        address: address.street,
        district: address.district,
        city: address.city,
        state: address.state,
        postal_code: address.postal_code,
        phones,
        emails,
        website,
        contact_name,
        export_price_range,
        activity_sector,
        countries,
        products,
    })
}

/// Whole visible text of a page, for diagnostics when decoding fails.
pub fn page_text(html: &str) -> String {
    let doc = Html::parse_document(html);
    doc.root_element().text().collect::<Vec<_>>().join(" ")
}
