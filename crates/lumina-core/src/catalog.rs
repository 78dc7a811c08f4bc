//! The fixed product catalog and lookups over it.

use std::collections::HashSet;

use rust_decimal::Decimal;
use rust_stemmers::{Algorithm, Stemmer};
use serde::{Deserialize, Serialize};

/// Pseudo category that matches every product in the shop filter.
pub const ALL_CATEGORY: &str = "All";

pub const CATEGORIES: [&str; 7] = [
    ALL_CATEGORY,
    "Watches",
    "Footwear",
    "Cameras",
    "Furniture",
    "Electronics",
    "Accessories",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vendor {
    pub id: String,
    pub name: String,
    pub verified: bool,
    pub rating: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    pub name: String,
    pub brand: String,
    /// Unit price in the store currency.
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    pub rating: f32,
    pub reviews: u32,
    pub image: String,
    pub description: String,
    pub category: String,
    pub features: Vec<String>,
    pub vendor: Vendor,
}

/// The slice of a product the concierge gets to see.
#[derive(Serialize)]
struct PromptProduct<'a> {
    id: &'a str,
    name: &'a str,
    brand: &'a str,
    #[serde(with = "rust_decimal::serde::float")]
    price: Decimal,
    description: &'a str,
    features: &'a [String],
}

#[derive(Debug, Clone, Default)]
pub struct Catalog {
    products: Vec<Product>,
}

impl Catalog {
    pub fn new(products: Vec<Product>) -> Self {
        Self { products }
    }

    /// The storefront's built-in collection.
    pub fn builtin() -> Self {
        let prestige = vendor("v1", "Prestige Time", 4.9);
        Self::new(vec![
            product(
                "1",
                "Elysium Chronograph",
                "Rolex",
                12500,
                (4.9, 128),
                "photo-1523170335258-f5ed11844a49",
                "A masterwork of horology, the Elysium Chronograph features a perpetual movement and a dial crafted from meteorite.",
                "Watches",
                &["Automatic Movement", "Sapphire Crystal", "100m Water Resistance"],
                prestige.clone(),
            ),
            product(
                "2",
                "AeroBlade Runner",
                "Nike x Off-White",
                850,
                (4.7, 340),
                "photo-1552346154-21d32810aba3",
                "Limited edition sneakers designed for the urban avant-garde. Featuring self-lacing technology.",
                "Footwear",
                &["Self-lacing", "Reactive Foam", "Limited Edition"],
                vendor("v2", "SneakerHeadz", 4.8),
            ),
            product(
                "3",
                "Leica Q3 Monochrom",
                "Leica",
                5995,
                (5.0, 45),
                "photo-1516035069371-29a1b244cc32",
                "Capture the world in stunning black and white with the legendary Leica optics.",
                "Cameras",
                &["47MP Sensor", "Summilux Lens", "OLED Viewfinder"],
                vendor("v3", "Camera Haus", 5.0),
            ),
            product(
                "4",
                "Eames Lounge Chair",
                "Herman Miller",
                6400,
                (4.9, 890),
                "photo-1567538096630-e0c55bd6374c",
                "The epitome of mid-century modern comfort. Hand-assembled with premium leather and wood.",
                "Furniture",
                &["Walnut Veneer", "Premium Leather", "Ergonomic Design"],
                vendor("v4", "Modern Living", 4.7),
            ),
            product(
                "5",
                "MacBook Pro M3 Max",
                "Apple",
                3199,
                (4.8, 1200),
                "photo-1517336714731-489689fd1ca4",
                "Mind-blowing performance for pros. The M3 Max chip tears through heavy workflows.",
                "Electronics",
                &["M3 Max Chip", "Liquid Retina XDR", "22h Battery Life"],
                vendor("v5", "Tech Giant", 4.6),
            ),
            product(
                "6",
                "Voyager Weekender",
                "Louis Vuitton",
                2800,
                (4.6, 56),
                "photo-1553062407-98eeb64c6a62",
                "Travel in style with this iconic canvas duffle bag. Durable, spacious, and timeless.",
                "Accessories",
                &["Monogram Canvas", "Leather Trim", "TSA Lock"],
                prestige,
            ),
        ])
    }

    pub fn products(&self) -> &[Product] {
        &self.products
    }

    pub fn len(&self) -> usize {
        self.products.len()
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Product> {
        self.products.iter().find(|p| p.id == id)
    }

    /// Resolve candidate ids against the catalog.
    ///
    /// Keeps the order of `ids`, drops repeats, and skips ids that name no
    /// product.
    pub fn lookup<S: AsRef<str>>(&self, ids: &[S]) -> Vec<&Product> {
        let mut seen = HashSet::new();
        ids.iter()
            .map(AsRef::as_ref)
            .filter(|id| seen.insert(*id))
            .filter_map(|id| self.get(id))
            .collect()
    }

    pub fn by_category(&self, category: &str) -> Vec<&Product> {
        if category == ALL_CATEGORY {
            return self.products.iter().collect();
        }
        self.products
            .iter()
            .filter(|p| p.category == category)
            .collect()
    }

    pub fn featured(&self, count: usize) -> &[Product] {
        &self.products[..count.min(self.products.len())]
    }

    /// Distinct vendors in the order they first appear.
    pub fn vendors(&self) -> Vec<&Vendor> {
        let mut seen = HashSet::new();
        self.products
            .iter()
            .map(|p| &p.vendor)
            .filter(|v| seen.insert(v.id.as_str()))
            .collect()
    }

    /// Keyword search over name, brand, description, category and features.
    ///
    /// Words are stemmed so "watch" finds the Watches category; every query
    /// word must match.
    pub fn search(&self, query: &str) -> Vec<&Product> {
        let stemmer = Stemmer::create(Algorithm::English);
        let terms = stems(&stemmer, query);
        if terms.is_empty() {
            return self.products.iter().collect();
        }

        self.products
            .iter()
            .filter(|product| {
                let mut haystack = format!(
                    "{} {} {} {}",
                    product.name, product.brand, product.description, product.category
                );
                for feature in &product.features {
                    haystack.push(' ');
                    haystack.push_str(feature);
                }
                let words = stems(&stemmer, &haystack);
                terms.iter().all(|term| words.contains(term))
            })
            .collect()
    }

    /// JSON array of the fields a recommendation needs. Vendor, rating and
    /// review data stay out of the prompt.
    pub fn prompt_excerpt(&self) -> serde_json::Result<String> {
        let excerpt: Vec<PromptProduct<'_>> = self
            .products
            .iter()
            .map(|p| PromptProduct {
                id: &p.id,
                name: &p.name,
                brand: &p.brand,
                price: p.price,
                description: &p.description,
                features: &p.features,
            })
            .collect();
        serde_json::to_string(&excerpt)
    }
}

fn stems(stemmer: &Stemmer, text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|word| !word.is_empty())
        .map(|word| stemmer.stem(&word.to_lowercase()).into_owned())
        .collect()
}

fn vendor(id: &str, name: &str, rating: f32) -> Vendor {
    Vendor {
        id: id.to_string(),
        name: name.to_string(),
        verified: true,
        rating,
    }
}

#[allow(clippy::too_many_arguments)]
fn product(
    id: &str,
    name: &str,
    brand: &str,
    price: i64,
    (rating, reviews): (f32, u32),
    photo: &str,
    description: &str,
    category: &str,
    features: &[&str],
    vendor: Vendor,
) -> Product {
    Product {
        id: id.to_string(),
        name: name.to_string(),
        brand: brand.to_string(),
        price: Decimal::from(price),
        rating,
        reviews,
        image: format!("https://images.unsplash.com/{photo}?auto=format&fit=crop&q=80&w=800"),
        description: description.to_string(),
        category: category.to_string(),
        features: features.iter().map(|f| f.to_string()).collect(),
        vendor,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(products: &[&Product]) -> Vec<String> {
        products.iter().map(|p| p.id.clone()).collect()
    }

    #[test]
    fn test_lookup_keeps_model_order_and_drops_unknown() {
        let catalog = Catalog::builtin();
        let found = catalog.lookup(&["5", "999", "2", "5", "1"]);
        assert_eq!(ids(&found), vec!["5", "2", "1"]);
    }

    #[test]
    fn test_lookup_empty_and_all_unknown() {
        let catalog = Catalog::builtin();
        assert!(catalog.lookup::<&str>(&[]).is_empty());
        assert!(catalog.lookup(&["x", "", "42"]).is_empty());
    }

    #[test]
    fn test_lookup_against_custom_catalog() {
        let builtin = Catalog::builtin();
        let only_two = Catalog::new(vec![builtin.get("2").cloned().unwrap()]);
        let found = only_two.lookup(&["2".to_string(), "999".to_string()]);
        assert_eq!(ids(&found), vec!["2"]);
    }

    #[test]
    fn test_by_category() {
        let catalog = Catalog::builtin();
        assert_eq!(catalog.by_category(ALL_CATEGORY).len(), catalog.len());
        assert_eq!(ids(&catalog.by_category("Cameras")), vec!["3"]);
        assert!(catalog.by_category("Jewelry").is_empty());
    }

    #[test]
    fn test_every_product_has_a_listed_category() {
        let catalog = Catalog::builtin();
        for product in catalog.products() {
            assert!(CATEGORIES.contains(&product.category.as_str()), "{}", product.category);
        }
    }

    #[test]
    fn test_vendors_are_distinct() {
        let catalog = Catalog::builtin();
        let vendors: Vec<&str> = catalog.vendors().iter().map(|v| v.id.as_str()).collect();
        assert_eq!(vendors, vec!["v1", "v2", "v3", "v4", "v5"]);
    }

    #[test]
    fn test_featured_is_clamped() {
        let catalog = Catalog::builtin();
        assert_eq!(catalog.featured(3).len(), 3);
        assert_eq!(catalog.featured(50).len(), catalog.len());
    }

    #[test]
    fn test_search_stems_words() {
        let catalog = Catalog::builtin();
        assert_eq!(ids(&catalog.search("watches")), vec!["1"]);
        assert_eq!(ids(&catalog.search("Leather")), vec!["4", "6"]);
        assert_eq!(ids(&catalog.search("leather canvas")), vec!["6"]);
        assert!(catalog.search("submarine").is_empty());
        assert_eq!(catalog.search("  ").len(), catalog.len());
    }

    #[test]
    fn test_prompt_excerpt_fields() {
        let catalog = Catalog::builtin();
        let excerpt = catalog.prompt_excerpt().unwrap();
        let value: serde_json::Value = serde_json::from_str(&excerpt).unwrap();
        let first = value.as_array().unwrap()[0].as_object().unwrap();

        let mut keys: Vec<&str> = first.keys().map(String::as_str).collect();
        keys.sort_unstable();
        assert_eq!(keys, vec!["brand", "description", "features", "id", "name", "price"]);
        assert_eq!(first["price"].as_f64(), Some(12500.0));
        assert!(!excerpt.contains("Prestige Time"));
        assert!(!excerpt.contains("unsplash"));
    }
}
