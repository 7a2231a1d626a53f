//! Static catalog of selectable regions and their cities.
//!
//! City names are only unique within a region ("San Fernando" exists in both
//! Region I and Region III), so lookups always go through the region.

/// Region → cities, in declaration order.
const REGIONS: &[(&str, &[&str])] = &[
    ("NCR", &["Manila", "Quezon City", "Pasig"]),
    ("CAR", &["Baguio", "La Trinidad"]),
    ("Region I", &["San Fernando", "Laoag"]),
    ("Region II", &["Tuguegarao", "Ilagan"]),
    ("Region III", &["San Fernando", "Balanga"]),
    ("Region IV-A", &["Calamba", "Lucena"]),
    ("Region IV-B", &["Puerto Princesa", "Calapan"]),
    ("Region V", &["Legazpi", "Naga"]),
    ("Region VI", &["Iloilo City", "Bacolod"]),
    ("Region VII", &["Cebu City", "Tagbilaran"]),
    ("Region VIII", &["Tacloban", "Catbalogan"]),
    ("Region IX", &["Zamboanga City", "Dipolog"]),
    ("Region X", &["Cagayan de Oro", "Malaybalay"]),
    ("Region XI", &["Davao City", "Tagum"]),
    ("Region XII", &["Koronadal", "Kidapawan"]),
    ("Region XIII", &["Butuan", "Surigao"]),
    ("BARMM", &["Cotabato City", "Marawi"]),
];

/// All region names, sorted.
pub fn list_regions() -> Vec<&'static str> {
    let mut regions: Vec<&'static str> = REGIONS.iter().map(|(region, _)| *region).collect();
    regions.sort_unstable();
    regions
}

/// Sorted cities for a region, or `None` if the region is not in the catalog.
pub fn list_cities(region: &str) -> Option<Vec<&'static str>> {
    REGIONS
        .iter()
        .find(|(name, _)| *name == region)
        .map(|(_, cities)| {
            let mut cities = cities.to_vec();
            cities.sort_unstable();
            cities
        })
}

/// Whether `city` is a catalog city of `region`.
pub fn contains(region: &str, city: &str) -> bool {
    REGIONS
        .iter()
        .any(|(name, cities)| *name == region && cities.contains(&city))
}

/// Every (region, city) pair in declaration order.
pub fn pairs() -> impl Iterator<Item = (&'static str, &'static str)> {
    REGIONS
        .iter()
        .flat_map(|(region, cities)| cities.iter().map(move |city| (*region, *city)))
}
