use crate::config::EntityEntry;

/// Ten largest NIFTY-50 constituents and their common headline aliases
///
/// Order matters: it is the tie-break order when several companies appear in
/// one headline.
const DEFAULT_TABLE: &[(&str, &[&str])] = &[
    ("Reliance", &["Reliance Industries", "Reliance", "RIL"]),
    ("TCS", &["Tata Consultancy Services", "TCS", "Tata Consultancy"]),
    ("HDFC Bank", &["HDFC Bank", "HDFC"]),
    ("ICICI Bank", &["ICICI Bank", "ICICI"]),
    ("Bharti Airtel", &["Bharti Airtel", "Airtel"]),
    ("SBI", &["State Bank of India", "SBI"]),
    ("Infosys", &["Infosys"]),
    ("LIC", &["Life Insurance Corporation", "LIC"]),
    ("HUL", &["Hindustan Unilever", "HUL"]),
    ("ITC", &["ITC"]),
];

/// Returns the built-in entity table as configuration entries
pub fn default_entities() -> Vec<EntityEntry> {
    DEFAULT_TABLE
        .iter()
        .map(|(name, aliases)| EntityEntry {
            name: name.to_string(),
            aliases: aliases.iter().map(|a| a.to_string()).collect(),
        })
        .collect()
}
