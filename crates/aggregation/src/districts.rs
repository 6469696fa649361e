//! National Capital Region district aliases.
//!
//! A trend query for a district alias aggregates over all of its member
//! cities; any other slug is treated as a single region.

/// District alias to member region slugs.
pub static NCR_DISTRICTS: &[(&str, &[&str])] = &[
    ("capital-district", &["manila"]),
    (
        "eastern-manila",
        &["mandaluyong", "marikina", "pasig", "quezon-city", "san-juan"],
    ),
    (
        "northern-manila",
        &["caloocan", "malabon", "navotas", "valenzuela"],
    ),
    (
        "southern-manila",
        &[
            "las-pinas",
            "makati",
            "muntinlupa",
            "paranaque",
            "pasay",
            "pateros",
            "taguig",
        ],
    ),
];

/// Member slugs of a district alias.
pub fn district_members(alias: &str) -> Option<&'static [&'static str]> {
    NCR_DISTRICTS
        .iter()
        .find(|(name, _)| *name == alias)
        .map(|(_, members)| *members)
}

/// Region slugs a trend query for `slug` covers.
pub fn resolve_slugs(slug: &str) -> Vec<&str> {
    match district_members(slug) {
        Some(members) => members.to_vec(),
        None => vec![slug],
    }
}
